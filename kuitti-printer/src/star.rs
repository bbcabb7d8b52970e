//! StarPRNT command builder
//!
//! Same vocabulary as [`EscPosBuilder`](crate::EscPosBuilder), Star byte
//! sequences. Note that `ESC a` feeds lines and `ESC d` cuts in StarPRNT,
//! the opposite of what the same letters do in ESC/POS.

use shared::PrinterFamily;

use crate::barcode::star_code39;
use crate::encoding::encode_cp1252;
use crate::error::PrintResult;
use crate::qr::{QrOptions, encode_qr};

/// ESC GS t 32: Windows-1252
const CODE_PAGE_WPC1252: u8 = 32;

/// StarPRNT command builder
pub struct StarBuilder {
    buf: Vec<u8>,
    width: usize,
    qr: QrOptions,
}

impl StarBuilder {
    pub fn new(width: usize) -> Self {
        let mut buf = Vec::with_capacity(4096);
        // ESC @
        buf.extend_from_slice(&[0x1B, 0x40]);
        // ESC GS t n
        buf.extend_from_slice(&[0x1B, 0x1D, 0x74, CODE_PAGE_WPC1252]);
        Self {
            buf,
            width,
            qr: QrOptions::for_family(PrinterFamily::Star),
        }
    }

    pub fn with_qr(mut self, qr: QrOptions) -> Self {
        self.qr = qr;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(&encode_cp1252(s));
        self
    }

    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    pub fn newline(&mut self) -> &mut Self {
        self.buf.push(b'\n');
        self
    }

    /// ESC a n - Feed n lines
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, lines]);
        self
    }

    /// ESC GS a 1
    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x1D, 0x61, 0x01]);
        self
    }

    /// ESC GS a 0
    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x1D, 0x61, 0x00]);
        self
    }

    pub fn bold(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x01]);
        self
    }

    pub fn bold_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x00]);
        self
    }

    pub fn underline(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x2D, 0x01]);
        self
    }

    pub fn underline_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x2D, 0x00]);
        self
    }

    /// ESC d 2 - Feed to cut position, partial cut
    pub fn cut(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x64, 0x02]);
        self
    }

    /// BEL - Fire the drawer kick connector
    pub fn open_drawer(&mut self) -> &mut Self {
        self.buf.push(0x07);
        self
    }

    pub fn qr_code(&mut self, data: &str) -> PrintResult<&mut Self> {
        let cmd = encode_qr(data.as_bytes(), &self.qr)?;
        self.buf.extend_from_slice(&cmd);
        Ok(self)
    }

    pub fn barcode(&mut self, data: &str) -> PrintResult<&mut Self> {
        let cmd = star_code39(data)?;
        self.buf.extend_from_slice(&cmd);
        Ok(self)
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for StarBuilder {
    fn default() -> Self {
        Self::new(48)
    }
}
