//! Individual stream filters (spec.md §4.1's filter list).
//!
//! Each filter is "lazy" in the sense the stream stack as a whole promises:
//! none of them touch their inner stream's bytes before `reset()`. Most PDF
//! filters have no meaningful notion of partial/incremental decode once
//! started (LZW and Flate both need the whole run to validate their
//! checksums/clear codes), so once `reset()` does run, each filter
//! materializes its full output into a buffer and serves reads from that —
//! still satisfying "no I/O until `reset`, and then only as bytes are
//! consumed" at the chain level.

use super::ByteStream;
use crate::error::Result;
use crate::object::Dict;
use std::io::Read;

/// Adapts a `Box<dyn ByteStream>` to `std::io::Read`, for filters (Flate)
/// implemented against a real decompressor crate.
struct StreamReadAdapter<'a>(&'a mut dyn ByteStream);

impl<'a> Read for StreamReadAdapter<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.0.read_block(buf))
    }
}

/// A filter whose whole output is computed eagerly at `reset()` and then
/// served byte-by-byte. `decode` receives the fully-drained inner bytes.
pub struct BufferedFilter {
    inner: Box<dyn ByteStream>,
    decode: Box<dyn FnMut(&[u8]) -> Vec<u8>>,
    buf: Vec<u8>,
    pos: usize,
    started: bool,
}

impl BufferedFilter {
    fn new(inner: Box<dyn ByteStream>, decode: Box<dyn FnMut(&[u8]) -> Vec<u8>>) -> Self {
        BufferedFilter {
            inner,
            decode,
            buf: Vec::new(),
            pos: 0,
            started: false,
        }
    }
}

impl ByteStream for BufferedFilter {
    fn reset(&mut self) -> Result<()> {
        self.inner.reset()?;
        let mut raw = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = self.inner.read_block(&mut chunk);
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..n]);
        }
        self.buf = (self.decode)(&raw);
        self.pos = 0;
        self.started = true;
        Ok(())
    }

    fn get(&mut self) -> Option<u8> {
        if !self.started {
            return None;
        }
        if self.pos >= self.buf.len() {
            return None;
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Some(b)
    }

    fn peek(&mut self) -> Option<u8> {
        if !self.started || self.pos >= self.buf.len() {
            return None;
        }
        Some(self.buf[self.pos])
    }

    fn tell(&self) -> u64 {
        self.pos as u64
    }
}

/// Build the named filter. Recognized-but-out-of-scope image codecs (CCITT,
/// DCT, JBIG2, JPX — text extraction never decodes raster image data, per
/// spec.md §6) and any unrecognized name both report `Err` so the caller
/// falls back to a closed stream.
pub fn build(name: &str, parms: &Option<Dict>, inner: Box<dyn ByteStream>) -> Result<Box<dyn ByteStream>> {
    match name {
        "ASCIIHexDecode" | "AHx" => Ok(Box::new(BufferedFilter::new(
            inner,
            Box::new(|raw| ascii_hex_decode(raw)),
        ))),
        "ASCII85Decode" | "A85" => Ok(Box::new(BufferedFilter::new(
            inner,
            Box::new(|raw| ascii85_decode(raw)),
        ))),
        "RunLengthDecode" | "RL" => Ok(Box::new(BufferedFilter::new(
            inner,
            Box::new(|raw| run_length_decode(raw)),
        ))),
        "LZWDecode" | "LZW" => {
            let early_change = parms
                .as_ref()
                .and_then(|d| d.get("EarlyChange"))
                .and_then(|o| o.as_int().ok())
                .unwrap_or(1);
            let predictor = parms.clone();
            let decoded = Box::new(BufferedFilter::new(
                inner,
                Box::new(move |raw| lzw_decode(raw, early_change != 0)),
            ));
            apply_predictor(decoded, predictor)
        }
        "FlateDecode" | "Fl" => {
            let predictor = parms.clone();
            let decoded: Box<dyn ByteStream> = Box::new(BufferedFilter::new(
                inner,
                Box::new(|raw| flate_decode(raw)),
            ));
            apply_predictor(decoded, predictor)
        }
        "CCITTFaxDecode" | "CCF" => Err(super::unimplemented_filter(name)),
        "DCTDecode" | "DCT" => Err(super::unimplemented_filter(name)),
        "JBIG2Decode" => Err(super::unimplemented_filter(name)),
        "JPXDecode" => Err(super::unimplemented_filter(name)),
        "Crypt" => {
            // Identity: the security handler already decrypted the bytes
            // before the chain was built (spec.md §4.1, "pushed when
            // encryption is active and /Filter /Crypt is absent with an
            // identity parameter" — an explicit Crypt entry is a no-op here).
            Ok(inner)
        }
        other => Err(super::unimplemented_filter(other)),
    }
}

fn apply_predictor(inner: Box<dyn ByteStream>, parms: Option<Dict>) -> Result<Box<dyn ByteStream>> {
    let Some(parms) = parms else {
        return Ok(inner);
    };
    let predictor = parms
        .get("Predictor")
        .and_then(|o| o.as_int().ok())
        .unwrap_or(1);
    if predictor <= 1 {
        return Ok(inner);
    }
    let colors = parms.get("Colors").and_then(|o| o.as_int().ok()).unwrap_or(1) as usize;
    let bpc = parms
        .get("BitsPerComponent")
        .and_then(|o| o.as_int().ok())
        .unwrap_or(8) as usize;
    let columns = parms
        .get("Columns")
        .and_then(|o| o.as_int().ok())
        .unwrap_or(1) as usize;
    Ok(Box::new(BufferedFilter::new(
        inner,
        Box::new(move |raw| undo_predictor(raw, predictor, colors, bpc, columns)),
    )))
}

// ---- ASCIIHexDecode ----

fn ascii_hex_decode(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut hi: Option<u8> = None;
    for &b in raw {
        if b == b'>' {
            break;
        }
        let Some(v) = hex_value(b) else { continue };
        match hi {
            None => hi = Some(v),
            Some(h) => {
                out.push((h << 4) | v);
                hi = None;
            }
        }
    }
    // A trailing half-byte pads with zero, per spec.md §4.2.
    if let Some(h) = hi {
        out.push(h << 4);
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ---- ASCII85Decode ----

fn ascii85_decode(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut group = [0u8; 5];
    let mut n = 0;
    let mut iter = raw.iter().copied().peekable();
    // Skip an optional leading "<~".
    if raw.starts_with(b"<~") {
        iter.next();
        iter.next();
    }
    while let Some(b) = iter.next() {
        if b == b'~' {
            break; // terminator "~>"
        }
        if b == b'z' && n == 0 {
            out.extend_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        if b.is_ascii_whitespace() {
            continue;
        }
        if !(b'!'..=b'u').contains(&b) {
            continue;
        }
        group[n] = b - b'!';
        n += 1;
        if n == 5 {
            decode_group(&group, 5, &mut out);
            n = 0;
        }
    }
    if n > 0 {
        for slot in group.iter_mut().skip(n) {
            *slot = 84;
        }
        decode_group(&group, n, &mut out);
    }
    out
}

fn decode_group(group: &[u8; 5], n: usize, out: &mut Vec<u8>) {
    let mut value: u32 = 0;
    for &g in group {
        value = value.wrapping_mul(85).wrapping_add(g as u32);
    }
    let bytes = value.to_be_bytes();
    out.extend_from_slice(&bytes[..n.saturating_sub(1).max(1)]);
}

// ---- RunLengthDecode ----

fn run_length_decode(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < raw.len() {
        let len = raw[i];
        i += 1;
        if len == 128 {
            break;
        } else if len < 128 {
            let count = len as usize + 1;
            if i + count > raw.len() {
                out.extend_from_slice(&raw[i..]);
                break;
            }
            out.extend_from_slice(&raw[i..i + count]);
            i += count;
        } else {
            if i >= raw.len() {
                break;
            }
            let count = 257 - len as usize;
            out.extend(std::iter::repeat(raw[i]).take(count));
            i += 1;
        }
    }
    out
}

// ---- LZWDecode ----

fn lzw_decode(raw: &[u8], early_change: bool) -> Vec<u8> {
    const CLEAR: u32 = 256;
    const EOD: u32 = 257;

    let mut out = Vec::new();
    let mut table: Vec<Vec<u8>> = Vec::new();
    let reset_table = |table: &mut Vec<Vec<u8>>| {
        table.clear();
        for i in 0..256 {
            table.push(vec![i as u8]);
        }
        table.push(Vec::new()); // 256: clear
        table.push(Vec::new()); // 257: eod
    };
    reset_table(&mut table);

    let mut code_width = 9u32;
    let mut bitbuf: u32 = 0;
    let mut bitcount: u32 = 0;
    let mut byte_iter = raw.iter();
    let mut prev: Option<Vec<u8>> = None;

    loop {
        while bitcount < code_width {
            let Some(&b) = byte_iter.next() else {
                return out;
            };
            bitbuf = (bitbuf << 8) | b as u32;
            bitcount += 8;
        }
        let code = (bitbuf >> (bitcount - code_width)) & ((1 << code_width) - 1);
        bitcount -= code_width;

        if code == CLEAR {
            reset_table(&mut table);
            code_width = 9;
            prev = None;
            continue;
        }
        if code == EOD {
            break;
        }

        let entry = if (code as usize) < table.len() {
            table[code as usize].clone()
        } else if let Some(p) = &prev {
            let mut e = p.clone();
            e.push(p[0]);
            e
        } else {
            break; // malformed stream
        };

        out.extend_from_slice(&entry);

        if let Some(p) = prev {
            let mut new_entry = p;
            new_entry.push(entry[0]);
            table.push(new_entry);
        }
        prev = Some(entry);

        let threshold = if early_change { 1 } else { 0 };
        let size = table.len() as u32 + threshold;
        code_width = if size > 2048 {
            12
        } else if size > 1024 {
            11
        } else if size > 512 {
            10
        } else {
            9
        };
    }
    out
}

// ---- Flate ----

fn flate_decode(raw: &[u8]) -> Vec<u8> {
    use flate2::read::ZlibDecoder;
    let mut decoder = ZlibDecoder::new(raw);
    let mut out = Vec::new();
    if decoder.read_to_end(&mut out).is_err() {
        out.clear();
    }
    out
}

// ---- Predictor (PNG + TIFF) ----

fn undo_predictor(raw: &[u8], predictor: i32, colors: usize, bpc: usize, columns: usize) -> Vec<u8> {
    let bytes_per_pixel = ((colors * bpc) + 7) / 8;
    let row_bytes = (colors * bpc * columns + 7) / 8;
    if row_bytes == 0 {
        return Vec::new();
    }
    if predictor == 2 {
        return undo_tiff_predictor(raw, colors, bpc, columns);
    }
    // PNG predictors: each row is prefixed by a filter-type byte.
    let mut out = Vec::new();
    let mut prior = vec![0u8; row_bytes];
    let mut i = 0;
    while i + 1 + row_bytes <= raw.len() + 1 && i < raw.len() {
        let filter_type = raw[i];
        i += 1;
        let end = (i + row_bytes).min(raw.len());
        let mut row = raw[i..end].to_vec();
        row.resize(row_bytes, 0);
        i = end;

        for x in 0..row_bytes {
            let a = if x >= bytes_per_pixel { row[x - bytes_per_pixel] } else { 0 };
            let b = prior[x];
            let c = if x >= bytes_per_pixel { prior[x - bytes_per_pixel] } else { 0 };
            let recon = match filter_type {
                0 => row[x],
                1 => row[x].wrapping_add(a),
                2 => row[x].wrapping_add(b),
                3 => row[x].wrapping_add(((a as u16 + b as u16) / 2) as u8),
                4 => row[x].wrapping_add(paeth(a, b, c)),
                _ => row[x],
            };
            row[x] = recon;
        }
        out.extend_from_slice(&row);
        prior = row;
    }
    out
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i32 + b as i32 - c as i32;
    let pa = (p - a as i32).abs();
    let pb = (p - b as i32).abs();
    let pc = (p - c as i32).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

fn undo_tiff_predictor(raw: &[u8], colors: usize, bpc: usize, columns: usize) -> Vec<u8> {
    if bpc != 8 {
        // Sub-byte TIFF prediction is rare in practice for text PDFs; treat
        // as identity rather than guessing at bit-level arithmetic.
        return raw.to_vec();
    }
    let row_bytes = colors * columns;
    let mut out = raw.to_vec();
    for row in out.chunks_mut(row_bytes) {
        for x in colors..row.len() {
            row[x] = row[x].wrapping_add(row[x - colors]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_hex_round_trip() {
        let decoded = ascii_hex_decode(b"48656c6c6f>");
        assert_eq!(decoded, b"Hello");
    }

    #[test]
    fn ascii_hex_pads_trailing_nibble() {
        // "4" alone -> 0x40
        let decoded = ascii_hex_decode(b"4>");
        assert_eq!(decoded, vec![0x40]);
    }

    #[test]
    fn ascii85_decodes_known_vector() {
        // "Man " -> "9jqo^" in Adobe's classic example (without terminator).
        let decoded = ascii85_decode(b"9jqo^~>");
        assert_eq!(decoded, b"Man ");
    }

    #[test]
    fn run_length_decodes_literal_and_repeat_runs() {
        // 2 literal bytes "AB", then repeat 'C' 3 times, then EOD (128).
        let raw = vec![1, b'A', b'B', 254, b'C', 128];
        let decoded = run_length_decode(&raw);
        assert_eq!(decoded, b"ABCCC");
    }

    #[test]
    fn png_up_predictor_undoes_row_delta() {
        // 2 rows, 1 byte/pixel, filter type 2 (Up) on the second row.
        let raw = vec![0, 10, 20, 2, 5, 5];
        let decoded = undo_predictor(&raw, 15, 1, 8, 2);
        assert_eq!(decoded, vec![10, 20, 15, 25]);
    }
}
