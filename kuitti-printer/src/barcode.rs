//! Code39 barcodes for order tags
//!
//! Only Code39 is emitted: order numbers are short numeric tags and every
//! supported printer reads Code39 without a checksum.

use crate::error::{PrintError, PrintResult};

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;
const RS: u8 = 0x1E;

/// Bar height in dots
pub const BARCODE_HEIGHT: u8 = 80;

/// Longest payload accepted for a single tag
pub const MAX_CODE39_LEN: usize = 64;

fn validate_code39(data: &str) -> PrintResult<Vec<u8>> {
    if data.is_empty() {
        return Err(PrintError::ProtocolEncoding("barcode data is empty".to_string()));
    }
    if data.len() > MAX_CODE39_LEN {
        return Err(PrintError::ProtocolEncoding(format!(
            "barcode data too long: {} chars",
            data.len()
        )));
    }

    let upper = data.to_ascii_uppercase();
    if let Some(bad) = upper
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || " -.$/+%".contains(*c)))
    {
        return Err(PrintError::ProtocolEncoding(format!(
            "'{}' cannot be encoded in Code39",
            bad
        )));
    }
    Ok(upper.into_bytes())
}

/// ESC/POS Code39: `GS h`, `GS w`, `GS H 2`, then `GS k 4 data NUL`
pub fn escpos_code39(data: &str) -> PrintResult<Vec<u8>> {
    let payload = validate_code39(data)?;

    let mut buf = Vec::with_capacity(payload.len() + 13);
    buf.extend_from_slice(&[GS, b'h', BARCODE_HEIGHT]);
    buf.extend_from_slice(&[GS, b'w', 0x02]);
    // HRI below the bars
    buf.extend_from_slice(&[GS, b'H', 0x02]);
    buf.extend_from_slice(&[GS, b'k', 0x04]);
    buf.extend_from_slice(&payload);
    buf.push(0x00);
    Ok(buf)
}

/// StarPRNT Code39: `ESC b n1 n2 n3 n4 data RS`
///
/// n1 = '4' (Code39), n2 = '2' (HRI under, line feed), n3 = '1' (2-dot
/// module), n4 = height.
pub fn star_code39(data: &str) -> PrintResult<Vec<u8>> {
    let payload = validate_code39(data)?;

    let mut buf = Vec::with_capacity(payload.len() + 7);
    buf.extend_from_slice(&[ESC, b'b', 0x34, 0x32, 0x31, BARCODE_HEIGHT]);
    buf.extend_from_slice(&payload);
    buf.push(RS);
    Ok(buf)
}
