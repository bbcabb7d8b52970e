//! QR code command builders
//!
//! The two printer families disagree on the 2D barcode sub-protocol, and
//! Star-compatible clones disagree among themselves on the exact byte layout.
//! The layout is therefore a [`QrMethod`] chosen per printer rather than one
//! hard-coded sequence.
//!
//! | Method | Settings | Store data | Print |
//! |--------|----------|------------|-------|
//! | `EscPosFunction` | `GS ( k` fn 165/167/169 | fn 180, `pL pH` = len + 3 | fn 181 |
//! | `StarSubFunction` | `ESC GS y S` 0x30 model, 0x31 cell, 0x32 ECC | `ESC GS y D nL nH` | `ESC GS y P` |
//! | `StarD1` | `ESC GS y S` 0x30 model, 0x31 ECC, 0x32 cell | `ESC GS y D 1 0 nL nH` | `ESC GS y P` |

use std::fmt;
use std::str::FromStr;

use shared::PrinterFamily;

use crate::error::{PrintError, PrintResult};

pub const ESC: u8 = 0x1B;
pub const GS: u8 = 0x1D;

/// Largest payload a QR symbol holds (version 40, byte mode, level L)
pub const MAX_QR_DATA: usize = 2953;

/// Error correction level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QrErrorLevel {
    /// ~7% recovery
    L,
    /// ~15% recovery
    #[default]
    M,
    /// ~25% recovery
    Q,
    /// ~30% recovery
    H,
}

impl QrErrorLevel {
    /// ESC/POS function 169 value: 48..=51
    pub fn escpos_value(self) -> u8 {
        48 + self.index()
    }

    /// StarPRNT value: 0..=3
    pub fn star_value(self) -> u8 {
        self.index()
    }

    fn index(self) -> u8 {
        match self {
            QrErrorLevel::L => 0,
            QrErrorLevel::M => 1,
            QrErrorLevel::Q => 2,
            QrErrorLevel::H => 3,
        }
    }
}

/// Byte layout used to print a QR symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QrMethod {
    /// ESC/POS `GS ( k` function codes (also understood by clones in emulation)
    EscPosFunction,
    /// StarPRNT `ESC GS y S` sub-function stream with `ESC GS y D nL nH`
    StarSubFunction,
    /// StarPRNT manual layout with `ESC GS y D 1 m nL nH`
    StarD1,
}

impl QrMethod {
    pub const ALL: [QrMethod; 3] = [
        QrMethod::StarSubFunction,
        QrMethod::StarD1,
        QrMethod::EscPosFunction,
    ];

    /// Method tried first for a printer family
    pub fn default_for(family: PrinterFamily) -> Self {
        match family {
            PrinterFamily::Escpos => QrMethod::EscPosFunction,
            PrinterFamily::Star => QrMethod::StarSubFunction,
        }
    }

    /// Next layout to try when this one prints no visible symbol
    pub fn fallback(self) -> Option<QrMethod> {
        match self {
            QrMethod::StarSubFunction => Some(QrMethod::StarD1),
            QrMethod::StarD1 => Some(QrMethod::EscPosFunction),
            QrMethod::EscPosFunction => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QrMethod::EscPosFunction => "escpos",
            QrMethod::StarSubFunction => "sub-function",
            QrMethod::StarD1 => "d1",
        }
    }
}

impl fmt::Display for QrMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QrMethod {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "escpos" | "esc-pos" | "gs-k" => Ok(QrMethod::EscPosFunction),
            "sub-function" | "subfunction" | "star" => Ok(QrMethod::StarSubFunction),
            "d1" | "star-d1" => Ok(QrMethod::StarD1),
            other => Err(PrintError::InvalidConfig(format!(
                "Unknown QR method: {}",
                other
            ))),
        }
    }
}

/// QR rendering options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrOptions {
    pub method: QrMethod,
    /// Module (cell) size in dots
    pub module_size: u8,
    pub error_level: QrErrorLevel,
}

impl QrOptions {
    pub fn for_family(family: PrinterFamily) -> Self {
        Self {
            method: QrMethod::default_for(family),
            module_size: 4,
            error_level: QrErrorLevel::M,
        }
    }

    pub fn with_method(mut self, method: QrMethod) -> Self {
        self.method = method;
        self
    }
}

impl Default for QrOptions {
    fn default() -> Self {
        Self::for_family(PrinterFamily::Escpos)
    }
}

/// Build the full QR sequence for `data` using the configured method
pub fn encode_qr(data: &[u8], options: &QrOptions) -> PrintResult<Vec<u8>> {
    if data.is_empty() {
        return Err(PrintError::ProtocolEncoding("QR data is empty".to_string()));
    }
    if data.len() > MAX_QR_DATA {
        return Err(PrintError::ProtocolEncoding(format!(
            "QR data too long: {} bytes (max {})",
            data.len(),
            MAX_QR_DATA
        )));
    }

    Ok(match options.method {
        QrMethod::EscPosFunction => escpos_qr(data, options.module_size, options.error_level),
        QrMethod::StarSubFunction => {
            star_sub_function_qr(data, options.module_size, options.error_level)
        }
        QrMethod::StarD1 => star_d1_qr(data, options.module_size, options.error_level),
    })
}

/// ESC/POS `GS ( k` sequence
///
/// Size: 1-16 (module size in dots)
pub fn escpos_qr(data: &[u8], size: u8, level: QrErrorLevel) -> Vec<u8> {
    let size = size.clamp(1, 16);
    let mut buf = Vec::with_capacity(data.len() + 40);

    // Function 165: Select model (Model 2)
    buf.extend_from_slice(&[GS, 0x28, 0x6B, 0x04, 0x00, 0x31, 0x41, 0x32, 0x00]);

    // Function 167: Set module size
    buf.extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x43, size]);

    // Function 169: Set error correction
    buf.extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x45, level.escpos_value()]);

    // Function 180: Store data
    let [p_l, p_h] = u16_le(data.len() + 3);
    buf.extend_from_slice(&[GS, 0x28, 0x6B, p_l, p_h, 0x31, 0x50, 0x30]);
    buf.extend_from_slice(data);

    // Function 181: Print
    buf.extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x51, 0x30]);

    buf
}

/// StarPRNT sub-function stream (model, cell size, ECC, store, print)
///
/// Size: 1-8 (cell size in dots)
pub fn star_sub_function_qr(data: &[u8], size: u8, level: QrErrorLevel) -> Vec<u8> {
    let size = size.clamp(1, 8);
    let [n_l, n_h] = u16_le(data.len());

    let mut buf = Vec::with_capacity(data.len() + 32);
    buf.extend_from_slice(&[ESC, GS, b'y', b'S', 0x30, 0x02]);
    buf.extend_from_slice(&[ESC, GS, b'y', b'S', 0x31, size]);
    buf.extend_from_slice(&[ESC, GS, b'y', b'S', 0x32, level.star_value()]);
    buf.extend_from_slice(&[ESC, GS, b'y', 0x44, n_l, n_h]);
    buf.extend_from_slice(data);
    buf.extend_from_slice(&[ESC, GS, b'y', 0x50]);
    buf
}

/// StarPRNT manual layout (model, ECC, cell size, `D 1` auto-mode store, print)
pub fn star_d1_qr(data: &[u8], size: u8, level: QrErrorLevel) -> Vec<u8> {
    let size = size.clamp(1, 8);
    let [n_l, n_h] = u16_le(data.len());

    let mut buf = Vec::with_capacity(data.len() + 34);
    buf.extend_from_slice(&[ESC, GS, b'y', b'S', 0x30, 0x02]);
    buf.extend_from_slice(&[ESC, GS, b'y', b'S', 0x31, level.star_value()]);
    buf.extend_from_slice(&[ESC, GS, b'y', b'S', 0x32, size]);
    buf.extend_from_slice(&[ESC, GS, b'y', 0x44, 0x31, 0x00, n_l, n_h]);
    buf.extend_from_slice(data);
    buf.extend_from_slice(&[ESC, GS, b'y', 0x50]);
    buf
}

fn u16_le(value: usize) -> [u8; 2] {
    [(value & 0xFF) as u8, ((value >> 8) & 0xFF) as u8]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escpos_qr_exact_bytes() {
        let cmd = escpos_qr(b"1042", 4, QrErrorLevel::M);
        let expected: Vec<u8> = [
            &[0x1D, 0x28, 0x6B, 0x04, 0x00, 0x31, 0x41, 0x32, 0x00][..],
            &[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x43, 0x04],
            &[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x45, 0x31],
            &[0x1D, 0x28, 0x6B, 0x07, 0x00, 0x31, 0x50, 0x30],
            b"1042",
            &[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x51, 0x30],
        ]
        .concat();
        assert_eq!(cmd, expected);
    }

    #[test]
    fn test_escpos_store_length_is_little_endian() {
        let data = vec![b'A'; 300];
        let cmd = escpos_qr(&data, 4, QrErrorLevel::L);
        // Store header starts after model (9) + size (8) + ECC (8)
        let store = &cmd[25..33];
        // 300 + 3 = 303 = 0x012F
        assert_eq!(store, &[0x1D, 0x28, 0x6B, 0x2F, 0x01, 0x31, 0x50, 0x30]);
        assert_eq!(cmd[22..25], [0x31, 0x45, 48]);
    }

    #[test]
    fn test_star_sub_function_layout() {
        let cmd = star_sub_function_qr(b"AB", 5, QrErrorLevel::Q);
        let expected: Vec<u8> = [
            &[0x1B, 0x1D, 0x79, 0x53, 0x30, 0x02][..],
            &[0x1B, 0x1D, 0x79, 0x53, 0x31, 0x05],
            &[0x1B, 0x1D, 0x79, 0x53, 0x32, 0x02],
            &[0x1B, 0x1D, 0x79, 0x44, 0x02, 0x00],
            b"AB",
            &[0x1B, 0x1D, 0x79, 0x50],
        ]
        .concat();
        assert_eq!(cmd, expected);
    }

    #[test]
    fn test_star_d1_layout() {
        let cmd = star_d1_qr(b"AB", 5, QrErrorLevel::Q);
        assert_eq!(cmd[6..12], [0x1B, 0x1D, 0x79, 0x53, 0x31, 0x02]);
        assert_eq!(cmd[12..18], [0x1B, 0x1D, 0x79, 0x53, 0x32, 0x05]);
        assert_eq!(cmd[18..26], [0x1B, 0x1D, 0x79, 0x44, 0x31, 0x00, 0x02, 0x00]);
        assert!(cmd.ends_with(&[b'A', b'B', 0x1B, 0x1D, 0x79, 0x50]));
    }

    #[test]
    fn test_module_size_is_clamped() {
        let cmd = star_sub_function_qr(b"x", 20, QrErrorLevel::M);
        assert_eq!(cmd[11], 8);
        let cmd = escpos_qr(b"x", 0, QrErrorLevel::M);
        assert_eq!(cmd[16], 1);
    }

    #[test]
    fn test_method_selection_and_fallback_chain() {
        assert_eq!(QrMethod::default_for(PrinterFamily::Star), QrMethod::StarSubFunction);
        assert_eq!(QrMethod::default_for(PrinterFamily::Escpos), QrMethod::EscPosFunction);
        assert_eq!(QrMethod::StarSubFunction.fallback(), Some(QrMethod::StarD1));
        assert_eq!(QrMethod::StarD1.fallback(), Some(QrMethod::EscPosFunction));
        assert_eq!(QrMethod::EscPosFunction.fallback(), None);
        assert_eq!("d1".parse::<QrMethod>().unwrap(), QrMethod::StarD1);
        assert!("raster".parse::<QrMethod>().is_err());
    }

    #[test]
    fn test_encode_qr_rejects_bad_payloads() {
        let opts = QrOptions::default();
        assert!(matches!(encode_qr(b"", &opts), Err(PrintError::ProtocolEncoding(_))));
        let big = vec![b'a'; MAX_QR_DATA + 1];
        assert!(matches!(encode_qr(&big, &opts), Err(PrintError::ProtocolEncoding(_))));
    }
}
