//! Whole-pipeline scenario tests: open a synthetic PDF's bytes and check
//! the text that comes out the other end, exercising every layer (xref,
//! parser, content interpreter, security handler, layout analyzer) at
//! once rather than one component in isolation.
//!
//! Each test builds its fixture PDF by hand — same approach as
//! `document.rs`'s unit test, just with more object kinds per fixture.

use aes::Aes128;
use cipher::block_padding::Pkcs7;
use cipher::{BlockEncryptMut, KeyIvInit};
use digest::Digest;
use md5::Md5;
use pdftotext_rs::document::{Document, OpenOptions};
use pdftotext_rs::error::{Error, NullReporter};
use pdftotext_rs::layout::{LayoutControl, LayoutMode};
use std::rc::Rc;

const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08, 0x2E, 0x2E, 0x00,
    0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Assembles `N 0 obj ... endobj` bodies (already-numbered 1..=N) into a
/// complete PDF with a classic xref table and trailer.
fn assemble_pdf(bodies: &[Vec<u8>], root: u32, encrypt_ref: Option<u32>, file_id: &[u8]) -> Vec<u8> {
    let mut out = b"%PDF-1.7\n".to_vec();
    let mut offsets = Vec::with_capacity(bodies.len());
    for body in bodies {
        offsets.push(out.len());
        out.extend_from_slice(body);
    }
    let xref_pos = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", bodies.len() + 1).as_bytes());
    for off in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    let id_lit = std::str::from_utf8(file_id).unwrap();
    out.extend_from_slice(
        format!("trailer\n<< /Size {} /Root {} 0 R /ID [({id_lit}) ({id_lit})]", bodies.len() + 1, root).as_bytes(),
    );
    if let Some(enc_ref) = encrypt_ref {
        out.extend_from_slice(format!(" /Encrypt {enc_ref} 0 R").as_bytes());
    }
    out.extend_from_slice(b" >>\nstartxref\n");
    out.extend_from_slice(format!("{xref_pos}\n").as_bytes());
    out.extend_from_slice(b"%%EOF");
    out
}

fn obj(num: u32, dict_and_stream: &str) -> Vec<u8> {
    format!("{num} 0 obj\n{dict_and_stream}\nendobj\n").into_bytes()
}

fn content_obj(num: u32, content: &str) -> Vec<u8> {
    format!("{num} 0 obj\n<< /Length {} >>\nstream\n{content}\nendstream\nendobj\n", content.len()).into_bytes()
}

const CATALOG: u32 = 1;
const PAGES: u32 = 2;
const PAGE: u32 = 3;
const CONTENT: u32 = 4;
const FONT: u32 = 5;

fn text_block(x: f64, y: f64, size: f64, text: &str) -> String {
    format!("BT /F1 {size} Tf {x} {y} Td ({text}) Tj ET\n")
}

/// Builds a single-page document: one text content stream, an optional
/// `/Rotate` entry, and a Helvetica Type1 font under `/F1`.
fn single_page_pdf(content: &str, rotate: Option<i32>) -> Vec<u8> {
    let rotate_entry = rotate.map(|r| format!(" /Rotate {r}")).unwrap_or_default();
    let bodies = vec![
        obj(CATALOG, &format!("<< /Type /Catalog /Pages {PAGES} 0 R >>")),
        obj(PAGES, &format!("<< /Type /Pages /Kids [{PAGE} 0 R] /Count 1 >>")),
        obj(
            PAGE,
            &format!(
                "<< /Type /Page /Parent {PAGES} 0 R /MediaBox [0 0 612 792]{rotate_entry} \
                 /Resources << /Font << /F1 {FONT} 0 R >> >> /Contents {CONTENT} 0 R >>"
            ),
        ),
        content_obj(CONTENT, content),
        obj(FONT, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>"),
    ];
    assemble_pdf(&bodies, CATALOG, None, b"0123456789ABCDEF")
}

fn open(data: Vec<u8>) -> Document {
    Document::open_bytes(Rc::from(data.into_boxed_slice()), OpenOptions::default(), &NullReporter).unwrap()
}

fn extract(doc: &Document, mode: LayoutMode) -> String {
    let control = LayoutControl { mode, ..LayoutControl::default() };
    doc.extract_page_text(1, &control, &NullReporter).unwrap()
}

// Scenario 1: hello world, single page, one line.
#[test]
fn hello_world_single_line() {
    let doc = open(single_page_pdf("BT /F1 12 Tf 72 720 Td (Hello) Tj ET", None));
    assert_eq!(doc.num_pages(), 1);
    let text = extract(&doc, LayoutMode::ReadingOrder);
    assert_eq!(text.trim_end_matches('\n'), "Hello");
}

// Scenario 2: two columns — reading order visits column 1 before column 2.
#[test]
fn two_columns_reading_order_visits_left_column_first() {
    let mut content = String::new();
    for i in 1..=20 {
        let y = 720.0 - (i as f64 - 1.0) * 30.0;
        content.push_str(&text_block(72.0, y, 10.0, &format!("ColOneLine{i}")));
        content.push_str(&text_block(320.0, y, 10.0, &format!("ColTwoLine{i}")));
    }
    let doc = open(single_page_pdf(&content, None));
    let text = extract(&doc, LayoutMode::ReadingOrder);

    let last_col1 = text.rfind("ColOneLine").expect("column one text missing");
    let first_col2 = text.find("ColTwoLine").expect("column two text missing");
    assert!(last_col1 < first_col2, "reading order should exhaust column one before column two:\n{text}");
}

// Scenario 2 (physical layout leg): both columns still appear somewhere
// in physical-layout mode, side by side rather than serialized away.
#[test]
fn two_columns_physical_layout_keeps_both_columns() {
    let mut content = String::new();
    for i in 1..=5 {
        let y = 720.0 - (i as f64 - 1.0) * 30.0;
        content.push_str(&text_block(72.0, y, 10.0, &format!("L{i}")));
        content.push_str(&text_block(320.0, y, 10.0, &format!("R{i}")));
    }
    let doc = open(single_page_pdf(&content, None));
    let text = extract(&doc, LayoutMode::PhysicalLayout);
    for i in 1..=5 {
        assert!(text.contains(&format!("L{i}")), "missing L{i} in:\n{text}");
        assert!(text.contains(&format!("R{i}")), "missing R{i} in:\n{text}");
    }
}

// Scenario 3: AES-128 encrypted document, user password "test".
#[test]
fn encrypted_aes128_document_requires_correct_password() {
    let file_id = b"0123456789ABCDEF";
    let user_password = b"test";
    let owner_password = b"ownersecret";
    let key_length = 16usize;
    let rev = 4;
    let p: i32 = -4;

    let o_entry = compute_o(rev, key_length, owner_password, user_password);
    let file_key = compute_file_key(rev, key_length, &o_entry, p, file_id, user_password, true);
    let u_entry = compute_u(rev, &file_key, file_id);

    let plain_content = "BT /F1 12 Tf 72 720 Td (Hello) Tj ET";
    let object_key = object_key_aes(&file_key, key_length, CONTENT, 0);
    let iv: [u8; 16] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
    let ciphertext = aes128_cbc_encrypt(&object_key, &iv, plain_content.as_bytes());
    let mut payload = iv.to_vec();
    payload.extend_from_slice(&ciphertext);

    let mut content_body = format!("{CONTENT} 0 obj\n<< /Length {} >>\nstream\n", payload.len()).into_bytes();
    content_body.extend_from_slice(&payload);
    content_body.extend_from_slice(b"\nendstream\nendobj\n");

    const ENCRYPT: u32 = 6;
    let encrypt_dict = format!(
        "<< /Filter /Standard /V 4 /R 4 /Length 128 /P {p} /EncryptMetadata true \
         /CF << /StdCF << /CFM /AESV2 /AuthEvent /DocOpen /Length 16 >> >> \
         /StmF /StdCF /StrF /StdCF /O <{}> /U <{}> >>",
        hex_lit(&o_entry),
        hex_lit(&u_entry)
    );

    let bodies = vec![
        obj(CATALOG, &format!("<< /Type /Catalog /Pages {PAGES} 0 R >>")),
        obj(PAGES, &format!("<< /Type /Pages /Kids [{PAGE} 0 R] /Count 1 >>")),
        obj(
            PAGE,
            &format!(
                "<< /Type /Page /Parent {PAGES} 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 {FONT} 0 R >> >> /Contents {CONTENT} 0 R >>"
            ),
        ),
        content_body,
        obj(FONT, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>"),
        obj(ENCRYPT, &encrypt_dict),
    ];
    let data = assemble_pdf(&bodies, CATALOG, Some(ENCRYPT), file_id);

    let wrong = Document::open_bytes(
        Rc::from(data.clone().into_boxed_slice()),
        OpenOptions { owner_password: b"", user_password: b"wrong" },
        &NullReporter,
    );
    assert!(matches!(wrong, Err(Error::PermissionDenied)));

    let doc = Document::open_bytes(
        Rc::from(data.into_boxed_slice()),
        OpenOptions { owner_password: b"", user_password },
        &NullReporter,
    )
    .unwrap();
    let text = extract(&doc, LayoutMode::ReadingOrder);
    assert_eq!(text.trim_end_matches('\n'), "Hello");
}

// Scenario 4: a rotated page still extracts its text in upright reading order.
#[test]
fn rotated_page_extracts_legible_text() {
    let doc = open(single_page_pdf("BT /F1 12 Tf 100 100 Td (Rotated) Tj ET", Some(90)));
    let text = extract(&doc, LayoutMode::ReadingOrder);
    assert_eq!(text.trim_end_matches('\n'), "Rotated");
}

// Scenario 5: a hyphenated line break joins back into one word.
#[test]
fn hyphenated_line_break_joins_in_reading_order() {
    let mut content = String::new();
    content.push_str(&text_block(72.0, 720.0, 12.0, "This is a hyphen-"));
    content.push_str(&text_block(72.0, 706.0, 12.0, "ated example."));
    let doc = open(single_page_pdf(&content, None));
    let text = extract(&doc, LayoutMode::ReadingOrder);
    assert!(text.contains("hyphenated"), "expected hyphen to be joined across lines, got:\n{text}");
    assert!(!text.contains("hyphen-\nated"), "hyphen should not survive the join:\n{text}");
}

// Scenario 6: a word drawn twice with a tiny offset (faked bold) appears once.
#[test]
fn fake_bold_word_appears_once() {
    let mut content = String::new();
    content.push_str(&text_block(72.0, 720.0, 12.0, "Bold"));
    content.push_str(&text_block(72.4, 720.0, 12.0, "Bold"));
    let doc = open(single_page_pdf(&content, None));
    let text = extract(&doc, LayoutMode::ReadingOrder);
    assert_eq!(text.matches("Bold").count(), 1, "fake-bold doubling should dedup, got:\n{text}");
}

// Invariant: a bad page number yields an empty page rather than aborting
// the whole extraction (spec.md §7).
#[test]
fn extracting_an_out_of_range_page_range_yields_empty_pages_not_a_panic() {
    let doc = open(single_page_pdf("BT /F1 12 Tf 72 720 Td (Hello) Tj ET", None));
    let control = LayoutControl::default();
    let pages = doc.extract_text_range(1, 5, &control, &NullReporter).unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].trim_end_matches('\n'), "Hello");
}

fn hex_lit(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn pad_password(pw: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let n = pw.len().min(32);
    out[..n].copy_from_slice(&pw[..n]);
    out[n..].copy_from_slice(&PADDING[..32 - n]);
    out
}

fn compute_o(rev: i32, key_length: usize, owner_password: &[u8], user_password: &[u8]) -> Vec<u8> {
    let mut digest = Md5::digest(pad_password(owner_password)).to_vec();
    if rev >= 3 {
        for _ in 0..50 {
            digest = Md5::digest(&digest[..key_length]).to_vec();
        }
    }
    digest.truncate(key_length);

    let mut result = pad_password(user_password).to_vec();
    for i in 0u8..=19 {
        let round_key: Vec<u8> = digest.iter().map(|b| b ^ i).collect();
        result = rc4(&round_key, &result);
    }
    result
}

fn compute_file_key(
    rev: i32,
    key_length: usize,
    o: &[u8],
    p: i32,
    file_id: &[u8],
    user_password: &[u8],
    encrypt_metadata: bool,
) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(pad_password(user_password));
    hasher.update(&o[..o.len().min(32)]);
    hasher.update(p.to_le_bytes());
    hasher.update(file_id);
    if rev >= 4 && !encrypt_metadata {
        hasher.update([0xff, 0xff, 0xff, 0xff]);
    }
    let mut digest = hasher.finalize().to_vec();
    if rev >= 3 {
        for _ in 0..50 {
            let mut h = Md5::new();
            h.update(&digest[..key_length]);
            digest = h.finalize().to_vec();
        }
    }
    digest.truncate(key_length);
    digest
}

fn compute_u(rev: i32, key: &[u8], file_id: &[u8]) -> Vec<u8> {
    if rev == 2 {
        return rc4(key, &PADDING);
    }
    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(file_id);
    let mut enc = rc4(key, &hasher.finalize());
    for i in 1u8..=19 {
        let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
        enc = rc4(&round_key, &enc);
    }
    enc
}

fn object_key_aes(file_key: &[u8], key_length: usize, num: u32, gen: u16) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(file_key);
    hasher.update([(num & 0xff) as u8, ((num >> 8) & 0xff) as u8, ((num >> 16) & 0xff) as u8]);
    hasher.update([(gen & 0xff) as u8, ((gen >> 8) & 0xff) as u8]);
    hasher.update(b"sAlT");
    let digest = hasher.finalize();
    let n = (key_length + 5).min(16);
    digest[..n].to_vec()
}

fn aes128_cbc_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Vec<u8> {
    type Enc = cbc::Encryptor<Aes128>;
    let cipher = Enc::new_from_slices(key, iv).expect("16-byte key/iv");
    cipher.encrypt_padded_vec_mut::<Pkcs7>(data)
}

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut s: [u8; 256] = [0; 256];
    for (i, v) in s.iter_mut().enumerate() {
        *v = i as u8;
    }
    let mut j: u8 = 0;
    for i in 0..256 {
        j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
        s.swap(i, j as usize);
    }
    let mut out = Vec::with_capacity(data.len());
    let (mut i, mut j) = (0u8, 0u8);
    for &byte in data {
        i = i.wrapping_add(1);
        j = j.wrapping_add(s[i as usize]);
        s.swap(i as usize, j as usize);
        let k = s[(s[i as usize].wrapping_add(s[j as usize])) as usize];
        out.push(byte ^ k);
    }
    out
}
