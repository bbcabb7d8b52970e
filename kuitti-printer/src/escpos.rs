//! ESC/POS command builder
//!
//! Provides a fluent API for building ESC/POS print data.

use crate::barcode::escpos_code39;
use crate::encoding::encode_cp1252;
use crate::error::PrintResult;
use crate::qr::{QrOptions, encode_qr};

/// ESC t 16: Windows-1252
const CODE_PAGE_WPC1252: u8 = 16;

/// ESC/POS command builder
///
/// Builds ESC/POS byte sequences for thermal printers.
/// Text is converted to Windows-1252 as it is written, so command
/// parameters never pass through the text conversion.
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
    qr: QrOptions,
}

impl EscPosBuilder {
    /// Create a new builder with the specified paper width in characters
    ///
    /// Common widths:
    /// - 58mm paper: 32 characters
    /// - 80mm paper: 48 characters
    pub fn new(width: usize) -> Self {
        let mut buf = Vec::with_capacity(4096);
        // Initialize printer (ESC @)
        buf.extend_from_slice(&[0x1B, 0x40]);
        // Select character code table (ESC t n)
        buf.extend_from_slice(&[0x1B, 0x74, CODE_PAGE_WPC1252]);
        Self {
            buf,
            width,
            qr: QrOptions::default(),
        }
    }

    /// Use a specific QR layout (clones in ESC/POS emulation may want another)
    pub fn with_qr(mut self, qr: QrOptions) -> Self {
        self.qr = qr;
        self
    }

    /// Get the configured paper width
    pub fn width(&self) -> usize {
        self.width
    }

    // === Text Output ===

    /// Write text (Windows-1252 encoded)
    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(&encode_cp1252(s));
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Write empty line
    pub fn newline(&mut self) -> &mut Self {
        self.buf.push(b'\n');
        self
    }

    /// Write multiple empty lines
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        // ESC d n - Print and feed n lines
        self.buf.extend_from_slice(&[0x1B, 0x64, lines]);
        self
    }

    // === Alignment ===

    /// Align text to center
    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x01]);
        self
    }

    /// Align text to left (default)
    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x00]);
        self
    }

    // === Text Style ===

    /// Enable bold text
    pub fn bold(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x01]);
        self
    }

    /// Disable bold text
    pub fn bold_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x00]);
        self
    }

    /// Enable underline (1 dot)
    pub fn underline(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x2D, 0x01]);
        self
    }

    /// Disable underline
    pub fn underline_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x2D, 0x00]);
        self
    }

    // === Paper Control ===

    /// Feed and full cut
    pub fn cut(&mut self) -> &mut Self {
        // GS V 65 n - Feed n lines, then full cut
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x41, 0x03]);
        self
    }

    // === Cash Drawer ===

    /// Open cash drawer (pin 2)
    pub fn open_drawer(&mut self) -> &mut Self {
        // ESC p m t1 t2 - Generate pulse on pin m
        self.buf.extend_from_slice(&[0x1B, 0x70, 0x00, 25, 250]);
        self
    }

    // === Barcodes ===

    /// Print a QR code using the configured layout
    pub fn qr_code(&mut self, data: &str) -> PrintResult<&mut Self> {
        let cmd = encode_qr(data.as_bytes(), &self.qr)?;
        self.buf.extend_from_slice(&cmd);
        Ok(self)
    }

    /// Print a Code39 barcode
    pub fn barcode(&mut self, data: &str) -> PrintResult<&mut Self> {
        let cmd = escpos_code39(data)?;
        self.buf.extend_from_slice(&cmd);
        Ok(self)
    }

    // === Raw Commands ===

    /// Write raw bytes directly
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    // === Build ===

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new(48)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preamble() {
        let data = EscPosBuilder::new(48).build();
        assert_eq!(data, vec![0x1B, 0x40, 0x1B, 0x74, 0x10]);
    }

    #[test]
    fn test_text_is_cp1252() {
        let mut b = EscPosBuilder::new(32);
        b.line("Yhteensä 12,50 €");
        let data = b.build();
        let body = &data[5..];
        assert!(body.contains(&0xE4));
        assert!(body.contains(&0x80));
        assert_eq!(*body.last().unwrap(), b'\n');
    }

    #[test]
    fn test_styles_and_cut() {
        let mut b = EscPosBuilder::new(32);
        b.bold().underline().text("X").underline_off().bold_off().cut();
        let data = b.build();
        assert_eq!(
            &data[5..],
            &[
                0x1B, 0x45, 0x01, 0x1B, 0x2D, 0x01, b'X', 0x1B, 0x2D, 0x00, 0x1B, 0x45, 0x00,
                0x1D, 0x56, 0x41, 0x03
            ]
        );
    }

    #[test]
    fn test_binary_parameters_survive() {
        // A module size >= 0x80 would be mangled by a post-pass text conversion
        let mut b = EscPosBuilder::new(48);
        b.raw(&[0x1D, 0x28, 0x6B, 0x83, 0x00]);
        let data = b.build();
        assert_eq!(&data[5..], &[0x1D, 0x28, 0x6B, 0x83, 0x00]);
    }

    #[test]
    fn test_drawer_kick() {
        let mut b = EscPosBuilder::new(48);
        b.open_drawer();
        assert_eq!(&b.build()[5..], &[0x1B, 0x70, 0x00, 0x19, 0xFA]);
    }
}
