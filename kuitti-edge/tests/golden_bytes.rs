//! Byte-exact output of both encoder families

use kuitti_printer::{PrintDocument, QrMethod, encoder_for};
use shared::PrinterFamily;

fn document() -> PrintDocument {
    let mut doc = PrintDocument::new(32);
    doc.text("**Hei**").text("__Ok__ ä €").feed(1);
    doc
}

#[test]
fn test_escpos_golden() {
    let bytes = encoder_for(PrinterFamily::Escpos, None)
        .encode(&document())
        .unwrap();
    #[rustfmt::skip]
    let expected: Vec<u8> = vec![
        0x1B, 0x40,             // ESC @
        0x1B, 0x74, 0x10,       // ESC t 16 (WPC1252)
        0x1B, 0x45, 0x01, b'H', b'e', b'i', 0x1B, 0x45, 0x00, b'\n',
        0x1B, 0x2D, 0x01, b'O', b'k', 0x1B, 0x2D, 0x00, b' ', 0xE4, b' ', 0x80, b'\n',
        0x1B, 0x64, 0x01,       // ESC d 1
        0x1D, 0x56, 0x41, 0x03, // GS V 65 3
    ];
    assert_eq!(bytes, expected);
}

#[test]
fn test_star_golden() {
    let bytes = encoder_for(PrinterFamily::Star, None)
        .encode(&document())
        .unwrap();
    #[rustfmt::skip]
    let expected: Vec<u8> = vec![
        0x1B, 0x40,             // ESC @
        0x1B, 0x1D, 0x74, 0x20, // ESC GS t 32 (WPC1252)
        0x1B, 0x45, 0x01, b'H', b'e', b'i', 0x1B, 0x45, 0x00, b'\n',
        0x1B, 0x2D, 0x01, b'O', b'k', 0x1B, 0x2D, 0x00, b' ', 0xE4, b' ', 0x80, b'\n',
        0x1B, 0x61, 0x01,       // ESC a 1 (feed)
        0x1B, 0x64, 0x02,       // ESC d 2 (partial cut)
    ];
    assert_eq!(bytes, expected);
}

#[test]
fn test_drawer_kick_golden() {
    assert_eq!(
        encoder_for(PrinterFamily::Escpos, None).drawer_kick(),
        vec![0x1B, 0x40, 0x1B, 0x74, 0x10, 0x1B, 0x70, 0x00, 25, 250]
    );
    assert_eq!(
        encoder_for(PrinterFamily::Star, None).drawer_kick(),
        vec![0x1B, 0x40, 0x1B, 0x1D, 0x74, 0x20, 0x07]
    );
}

#[test]
fn test_star_qr_method_changes_only_the_symbol() {
    let mut doc = PrintDocument::new(48);
    doc.text("A").qr("1042");
    doc.cut = false;

    let sub = encoder_for(PrinterFamily::Star, Some(QrMethod::StarSubFunction))
        .encode(&doc)
        .unwrap();
    let d1 = encoder_for(PrinterFamily::Star, Some(QrMethod::StarD1))
        .encode(&doc)
        .unwrap();
    assert_ne!(sub, d1);
    // Same init, code page and text line before the symbol
    assert_eq!(sub[..8], d1[..8]);
}
