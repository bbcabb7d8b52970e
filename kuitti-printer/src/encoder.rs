//! Protocol encoders
//!
//! Both families walk the same [`PrintDocument`]; only the command builder
//! differs. Output is a pure function of the document and the QR options,
//! so the same document always yields the same bytes.

use shared::PrinterFamily;
use tracing::debug;

use crate::document::{DocLine, PrintDocument, parse_markers};
use crate::error::PrintResult;
use crate::escpos::EscPosBuilder;
use crate::qr::{QrMethod, QrOptions};
use crate::star::StarBuilder;

/// Serializes documents for one printer family
pub trait Encoder: Send + Sync {
    fn family(&self) -> PrinterFamily;

    fn qr_options(&self) -> QrOptions;

    /// Encode a full document
    fn encode(&self, doc: &PrintDocument) -> PrintResult<Vec<u8>>;

    /// Encode raw text, one printed line per `\n`
    fn encode_text(&self, width: usize, text: &str) -> PrintResult<Vec<u8>> {
        self.encode(&PrintDocument::from_text(width, text))
    }

    /// Init followed by a drawer pulse, nothing printed
    fn drawer_kick(&self) -> Vec<u8>;
}

/// Pick the encoder for a printer family
///
/// `qr_method` overrides the family default (Star clones disagree on layout).
pub fn encoder_for(family: PrinterFamily, qr_method: Option<QrMethod>) -> Box<dyn Encoder> {
    let mut qr = QrOptions::for_family(family);
    if let Some(method) = qr_method {
        qr.method = method;
    }
    match family {
        PrinterFamily::Escpos => Box::new(EscPosEncoder::new(qr)),
        PrinterFamily::Star => Box::new(StarEncoder::new(qr)),
    }
}

/// Generic ESC/POS printers
#[derive(Debug, Clone, Default)]
pub struct EscPosEncoder {
    qr: QrOptions,
}

impl EscPosEncoder {
    pub fn new(qr: QrOptions) -> Self {
        Self { qr }
    }
}

impl Encoder for EscPosEncoder {
    fn family(&self) -> PrinterFamily {
        PrinterFamily::Escpos
    }

    fn qr_options(&self) -> QrOptions {
        self.qr
    }

    fn encode(&self, doc: &PrintDocument) -> PrintResult<Vec<u8>> {
        let bytes = render(EscPosBuilder::new(doc.width).with_qr(self.qr), doc)?;
        debug!(family = "escpos", lines = doc.lines.len(), bytes = bytes.len(), "encoded document");
        Ok(bytes)
    }

    fn drawer_kick(&self) -> Vec<u8> {
        let mut b = EscPosBuilder::default();
        b.open_drawer();
        b.build()
    }
}

/// Star printers in StarPRNT mode
#[derive(Debug, Clone)]
pub struct StarEncoder {
    qr: QrOptions,
}

impl StarEncoder {
    pub fn new(qr: QrOptions) -> Self {
        Self { qr }
    }
}

impl Default for StarEncoder {
    fn default() -> Self {
        Self::new(QrOptions::for_family(PrinterFamily::Star))
    }
}

impl Encoder for StarEncoder {
    fn family(&self) -> PrinterFamily {
        PrinterFamily::Star
    }

    fn qr_options(&self) -> QrOptions {
        self.qr
    }

    fn encode(&self, doc: &PrintDocument) -> PrintResult<Vec<u8>> {
        let bytes = render(StarBuilder::new(doc.width).with_qr(self.qr), doc)?;
        debug!(family = "star", qr = %self.qr.method, lines = doc.lines.len(), bytes = bytes.len(), "encoded document");
        Ok(bytes)
    }

    fn drawer_kick(&self) -> Vec<u8> {
        let mut b = StarBuilder::default();
        b.open_drawer();
        b.build()
    }
}

/// Shared vocabulary of the two builders
trait CommandStream {
    fn text(&mut self, s: &str);
    fn newline(&mut self);
    fn set_bold(&mut self, on: bool);
    fn set_underline(&mut self, on: bool);
    fn center(&mut self);
    fn left(&mut self);
    fn feed(&mut self, lines: u8);
    fn qr(&mut self, data: &str) -> PrintResult<()>;
    fn barcode(&mut self, data: &str) -> PrintResult<()>;
    fn cut(&mut self);
    fn finish(self) -> Vec<u8>;
}

macro_rules! impl_command_stream {
    ($builder:ty) => {
        impl CommandStream for $builder {
            fn text(&mut self, s: &str) {
                <$builder>::text(self, s);
            }
            fn newline(&mut self) {
                <$builder>::newline(self);
            }
            fn set_bold(&mut self, on: bool) {
                if on { self.bold() } else { self.bold_off() };
            }
            fn set_underline(&mut self, on: bool) {
                if on { self.underline() } else { self.underline_off() };
            }
            fn center(&mut self) {
                <$builder>::center(self);
            }
            fn left(&mut self) {
                <$builder>::left(self);
            }
            fn feed(&mut self, lines: u8) {
                <$builder>::feed(self, lines);
            }
            fn qr(&mut self, data: &str) -> PrintResult<()> {
                self.qr_code(data).map(|_| ())
            }
            fn barcode(&mut self, data: &str) -> PrintResult<()> {
                <$builder>::barcode(self, data).map(|_| ())
            }
            fn cut(&mut self) {
                <$builder>::cut(self);
            }
            fn finish(self) -> Vec<u8> {
                self.build()
            }
        }
    };
}

impl_command_stream!(EscPosBuilder);
impl_command_stream!(StarBuilder);

fn render<B: CommandStream>(mut b: B, doc: &PrintDocument) -> PrintResult<Vec<u8>> {
    for line in &doc.lines {
        match line {
            DocLine::Text(text) => {
                let mut bold = false;
                let mut underline = false;
                for span in parse_markers(text) {
                    if span.bold != bold {
                        b.set_bold(span.bold);
                        bold = span.bold;
                    }
                    if span.underline != underline {
                        b.set_underline(span.underline);
                        underline = span.underline;
                    }
                    b.text(&span.text);
                }
                // Styles never leak into the next line
                if underline {
                    b.set_underline(false);
                }
                if bold {
                    b.set_bold(false);
                }
                b.newline();
            }
            DocLine::Qr(data) => {
                b.center();
                b.qr(data)?;
                b.newline();
                b.left();
            }
            DocLine::Barcode(data) => {
                b.center();
                b.barcode(data)?;
                b.left();
            }
            DocLine::Feed(n) => b.feed(*n),
        }
    }
    if doc.cut {
        b.cut();
    }
    Ok(b.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::bold;

    fn sample() -> PrintDocument {
        let mut doc = PrintDocument::new(48);
        doc.text(bold("TILAUS #1042")).text("Tomaatti    ILMAINEN").qr("1042");
        doc
    }

    #[test]
    fn test_encoding_is_deterministic() {
        for family in [PrinterFamily::Escpos, PrinterFamily::Star] {
            let enc = encoder_for(family, None);
            assert_eq!(enc.encode(&sample()).unwrap(), enc.encode(&sample()).unwrap());
        }
    }

    #[test]
    fn test_escpos_bold_line() {
        let mut doc = PrintDocument::new(48);
        doc.text("**AB**c");
        doc.cut = false;
        let bytes = EscPosEncoder::default().encode(&doc).unwrap();
        assert_eq!(
            &bytes[5..],
            &[0x1B, 0x45, 0x01, b'A', b'B', 0x1B, 0x45, 0x00, b'c', b'\n']
        );
    }

    #[test]
    fn test_star_closes_styles_at_line_end() {
        let mut doc = PrintDocument::new(48);
        doc.text("__U__").text("**B**");
        doc.cut = false;
        let bytes = StarEncoder::default().encode(&doc).unwrap();
        assert_eq!(
            &bytes[6..],
            &[
                0x1B, 0x2D, 0x01, b'U', 0x1B, 0x2D, 0x00, b'\n', 0x1B, 0x45, 0x01, b'B', 0x1B,
                0x45, 0x00, b'\n'
            ]
        );
    }

    #[test]
    fn test_qr_override_applies_to_star() {
        let enc = encoder_for(PrinterFamily::Star, Some(QrMethod::StarD1));
        assert_eq!(enc.qr_options().method, QrMethod::StarD1);
        let enc = encoder_for(PrinterFamily::Star, None);
        assert_eq!(enc.qr_options().method, QrMethod::StarSubFunction);
    }

    #[test]
    fn test_invalid_barcode_is_encoding_error() {
        let mut doc = PrintDocument::new(48);
        doc.barcode("#");
        let err = EscPosEncoder::default().encode(&doc).unwrap_err();
        assert!(matches!(err, crate::PrintError::ProtocolEncoding(_)));
    }

    #[test]
    fn test_drawer_kick_sequences() {
        assert_eq!(
            EscPosEncoder::default().drawer_kick(),
            vec![0x1B, 0x40, 0x1B, 0x74, 0x10, 0x1B, 0x70, 0x00, 0x19, 0xFA]
        );
        assert_eq!(*StarEncoder::default().drawer_kick().last().unwrap(), 0x07);
    }
}
