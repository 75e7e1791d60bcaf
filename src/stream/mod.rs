//! Stream stack (spec.md §4.1, component C1).
//!
//! A stream is a sequence of decoded bytes. Streams compose: a
//! [`MemoryStream`] wraps a byte range of the (fully buffered, random-access)
//! source file; filter streams wrap an inner stream and transform bytes on
//! demand. Decoding is lazy — it happens at [`ByteStream::reset`], not at
//! construction — so building a filter chain for a stream object that is
//! never read costs nothing.
//!
//! Per spec.md: `read_block` returns 0 only at EOF, an unknown filter makes
//! the stream fail-closed (the image codecs out of scope for this crate —
//! CCITT, DCT, JBIG2, JPX — are recognized names that fail closed rather
//! than unrecognized ones, since §6 says image decoding is never invoked in
//! text-extraction mode).

pub mod filters;

use crate::error::{Error, Result};
use crate::object::{Dict, Object, RawStream};
use std::rc::Rc;

/// Where a `seek` measures from.
#[derive(Debug, Clone, Copy)]
pub enum Whence {
    Start,
    Current,
}

/// Common interface for every layer of the stream stack.
pub trait ByteStream {
    /// (Re)start decoding from the beginning. Filters that buffer their
    /// entire output lazily compute it here, on first call.
    fn reset(&mut self) -> Result<()>;

    /// Next decoded byte, or `None` at EOF.
    fn get(&mut self) -> Option<u8>;

    /// Next decoded byte without consuming it.
    fn peek(&mut self) -> Option<u8>;

    /// Fill as much of `buf` as there is data for; returns the number of
    /// bytes written. Returns 0 only once the stream is exhausted.
    fn read_block(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.get() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Read up to and including the next `\n`, or to EOF. Returns the
    /// number of bytes read (the line, without a trailing-newline
    /// guarantee if EOF was hit first).
    fn read_line(&mut self, buf: &mut Vec<u8>) -> usize {
        let start = buf.len();
        while let Some(b) = self.get() {
            buf.push(b);
            if b == b'\n' {
                break;
            }
        }
        buf.len() - start
    }

    /// Current position, in decoded bytes since `reset`.
    fn tell(&self) -> u64;

    /// Reposition to an absolute offset, if this layer supports random
    /// access. Default no-op: most filter layers only ever move forward
    /// and don't need to support it; [`MemoryStream`] overrides it.
    fn seek(&mut self, _pos: u64) {}

    fn close(&mut self) {}
}

/// A base stream over a byte range of the source file (already fully
/// buffered, since the engine is random access, not streaming).
pub struct MemoryStream {
    data: Rc<[u8]>,
    start: usize,
    len: usize,
    pos: usize,
}

impl MemoryStream {
    pub fn new(data: Rc<[u8]>, start: usize, len: usize) -> Self {
        MemoryStream {
            data,
            start,
            len,
            pos: 0,
        }
    }

    pub fn whole(data: Rc<[u8]>) -> Self {
        let len = data.len();
        MemoryStream::new(data, 0, len)
    }

    pub fn seek(&mut self, pos: u64, whence: Whence) {
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => self.pos,
        };
        let target = (base as i64 + pos as i64).max(0) as usize;
        self.pos = target.min(self.len);
    }
}

impl ByteStream for MemoryStream {
    fn reset(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }

    fn get(&mut self) -> Option<u8> {
        if self.pos >= self.len {
            return None;
        }
        let b = self.data[self.start + self.pos];
        self.pos += 1;
        Some(b)
    }

    fn peek(&mut self) -> Option<u8> {
        if self.pos >= self.len {
            return None;
        }
        Some(self.data[self.start + self.pos])
    }

    fn tell(&self) -> u64 {
        self.pos as u64
    }

    fn seek(&mut self, pos: u64) {
        self.pos = (pos as usize).min(self.len);
    }
}

/// A filter that failed to build or whose bytes were malformed: per
/// spec.md §4.1, the stream fails closed (reads as immediately EOF) rather
/// than propagating a hard error, so a caller skipping over one bad image
/// stream does not lose the rest of the page.
pub struct ClosedStream;

impl ByteStream for ClosedStream {
    fn reset(&mut self) -> Result<()> {
        Ok(())
    }
    fn get(&mut self) -> Option<u8> {
        None
    }
    fn peek(&mut self) -> Option<u8> {
        None
    }
    fn tell(&self) -> u64 {
        0
    }
}

/// Entry point: given a stream's dict and its raw (still filtered) bytes,
/// build the full decode chain described by `/Filter` (a name or array of
/// names) and `/DecodeParms` (a dict or array of dicts, one per filter).
///
/// `decrypt` is called to strip the security handler's crypt filter first,
/// when encryption is active and this isn't a metadata stream with
/// `/EncryptMetadata false` (spec.md §4.6); passing `None` means either
/// there's no encryption or the caller already decrypted the raw bytes.
pub fn decode_chain(
    dict: &Dict,
    raw: &RawStream,
    decrypt: Option<&dyn Fn(&[u8]) -> Vec<u8>>,
) -> Box<dyn ByteStream> {
    let bytes: Rc<[u8]> = match decrypt {
        Some(f) => Rc::from(f(&raw.bytes)),
        None => raw.bytes.clone(),
    };

    let filter_names = filter_names(dict);
    let parms = decode_parms(dict, filter_names.len());

    let mut stream: Box<dyn ByteStream> = Box::new(MemoryStream::whole(bytes));
    for (name, parm) in filter_names.iter().zip(parms.iter()) {
        stream = match filters::build(name, parm, stream) {
            Ok(s) => s,
            Err(_) => Box::new(ClosedStream),
        };
    }
    stream
}

fn filter_names(dict: &Dict) -> Vec<String> {
    match dict.get("Filter") {
        Some(Object::Name(n)) => vec![n.to_string()],
        Some(Object::Array(a)) => a
            .iter()
            .filter_map(|o| o.as_name().ok().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_parms(dict: &Dict, filter_count: usize) -> Vec<Option<Dict>> {
    match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
        Some(Object::Dict(d)) => vec![Some(d.clone())],
        Some(Object::Array(a)) => a
            .iter()
            .map(|o| match o {
                Object::Dict(d) => Some(d.clone()),
                _ => None,
            })
            .collect(),
        _ => vec![None; filter_count],
    }
}

/// Read the fully decoded bytes of a stream object, clamped to `/Length`
/// when present and valid (spec.md §8, "Stream length" invariant).
pub fn decoded_bytes(
    dict: &Dict,
    raw: &RawStream,
    decrypt: Option<&dyn Fn(&[u8]) -> Vec<u8>>,
) -> Result<Vec<u8>> {
    let mut chain = decode_chain(dict, raw, decrypt);
    chain.reset()?;
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = chain.read_block(&mut buf);
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    Ok(out)
}

pub(crate) fn unimplemented_filter(name: &str) -> Error {
    Error::Unimplemented(format!("stream filter /{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_stream_reports_eof_with_zero_reads() {
        let data: Rc<[u8]> = Rc::from(&b"abc"[..]);
        let mut s = MemoryStream::whole(data);
        s.reset().unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(s.read_block(&mut buf), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(s.read_block(&mut buf), 0);
        assert_eq!(s.get(), None);
    }

    #[test]
    fn unknown_filter_fails_closed() {
        let mut dict = Dict::new();
        dict.insert(Rc::from("Filter"), Object::Name(Rc::from("NoSuchFilter")));
        let raw = RawStream {
            bytes: Rc::from(&b"whatever"[..]),
        };
        let bytes = decoded_bytes(&dict, &raw, None).unwrap();
        assert!(bytes.is_empty());
    }
}
