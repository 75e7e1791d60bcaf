//! Cross-reference table (spec.md §4.5, component C5).
//!
//! Locates objects by (num, gen). Reads the file tail for `startxref`,
//! follows classic tables, xref streams, hybrid `/XRefStm` files, and
//! `/Prev` chains; falls back to a whole-file `N G obj` scan when the tail
//! is damaged. `fetch` returns a deep (non-ref) `Object`, resolving
//! compressed entries through a 4-entry LRU object-stream cache.

use crate::error::{Diagnostic, Error, ErrorKind, Reporter, Result};
use crate::lexer::{Lexer, Token};
use crate::object::{Dict, MAX_RESOLVE_DEPTH, Name, Object, Ref};
use crate::parser::Parser;
use crate::stream::{self, MemoryStream};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One slot in the cross-reference table.
#[derive(Debug, Clone, Copy)]
pub enum XRefEntry {
    Free,
    Uncompressed { offset: u64, gen: u16 },
    Compressed { stream_num: u32, index: u32 },
}

/// Decrypts strings and streams given the enclosing indirect object's
/// (num, gen). Implemented by the security handler (C6); `XRef` holds one
/// optionally, installed once `/Encrypt` has been validated.
pub trait Decryptor {
    fn decrypt_bytes(&self, num: u32, gen: u16, bytes: &[u8]) -> Vec<u8>;
}

struct ObjStmCache {
    entries: RefCell<Vec<(u32, Rc<Vec<(u32, Object)>>)>>,
}

const OBJ_STREAM_CACHE_SIZE: usize = 4;

impl ObjStmCache {
    fn new() -> Self {
        ObjStmCache {
            entries: RefCell::new(Vec::new()),
        }
    }

    fn get(&self, num: u32) -> Option<Rc<Vec<(u32, Object)>>> {
        let mut e = self.entries.borrow_mut();
        if let Some(pos) = e.iter().position(|(n, _)| *n == num) {
            let item = e.remove(pos);
            let val = item.1.clone();
            e.push(item);
            return Some(val);
        }
        None
    }

    fn insert(&self, num: u32, objs: Rc<Vec<(u32, Object)>>) {
        let mut e = self.entries.borrow_mut();
        if e.len() >= OBJ_STREAM_CACHE_SIZE {
            e.remove(0);
        }
        e.push((num, objs));
    }
}

pub struct XRef {
    data: Rc<[u8]>,
    entries: HashMap<u32, XRefEntry>,
    pub trailer: Dict,
    pub root: Ref,
    last_xref_pos: u64,
    objstm_cache: ObjStmCache,
    decryptor: Option<Rc<dyn Decryptor>>,
    encrypt_ref: Option<Ref>,
}

impl XRef {
    /// Build the table from the tail of `data`; repairs by scan if the
    /// tail is damaged or no trailer `/Root` can be found.
    pub fn open(data: Rc<[u8]>, reporter: &dyn Reporter) -> Result<Self> {
        let mut entries = HashMap::new();
        let mut trailer = Dict::new();
        let mut last_xref_pos = 0u64;

        let start = find_start_xref(&data);
        let mut ok = false;
        if let Some(pos) = start {
            let mut visited = Vec::new();
            ok = read_xref_chain(&data, pos, &mut entries, &mut trailer, &mut visited).is_ok();
            last_xref_pos = pos;
        }

        if !ok || trailer.get("Root").is_none() {
            reporter.report(Diagnostic {
                kind: ErrorKind::SyntaxWarning,
                position: start,
                message: "cross-reference table damaged, repairing by scan".into(),
            });
            entries.clear();
            repair_by_scan(&data, &mut entries, &mut trailer)?;
        }

        let root = match trailer.get("Root") {
            Some(Object::Ref(r)) => *r,
            _ => return Err(Error::SyntaxError("no /Root entry in trailer".into())),
        };

        let encrypt_ref = match trailer.get("Encrypt") {
            Some(Object::Ref(r)) => Some(*r),
            _ => None,
        };

        Ok(XRef {
            data,
            entries,
            trailer,
            root,
            last_xref_pos,
            objstm_cache: ObjStmCache::new(),
            decryptor: None,
            encrypt_ref,
        })
    }

    pub fn last_xref_pos(&self) -> u64 {
        self.last_xref_pos
    }

    pub fn num_objects(&self) -> usize {
        self.entries.len()
    }

    pub fn encrypt_ref(&self) -> Option<Ref> {
        self.encrypt_ref
    }

    pub fn set_decryptor(&mut self, d: Rc<dyn Decryptor>) {
        self.decryptor = Some(d);
    }

    /// The raw, still-encrypted `/Encrypt` dict bytes, fetched without
    /// decryption (spec.md §4.6: "the `/Encrypt` dictionary itself ... is
    /// never decrypted").
    pub fn fetch_encrypt_dict(&self) -> Result<Option<Object>> {
        let Some(r) = self.encrypt_ref else {
            return Ok(None);
        };
        let entry = self
            .entries
            .get(&r.num)
            .copied()
            .ok_or_else(|| Error::SyntaxError("missing /Encrypt object".into()))?;
        match entry {
            XRefEntry::Uncompressed { offset, .. } => {
                let mut p = Parser::new(self.data.clone(), offset);
                let (_, _, obj) = parse_indirect_header(&mut p)?;
                Ok(Some(obj))
            }
            _ => Err(Error::SyntaxError("/Encrypt entry is not a direct object".into())),
        }
    }

    /// Deep (non-ref) fetch of object (num, gen). `depth` guards against
    /// cyclic `/Length`/object-stream references, per spec.md §8's
    /// recursion bound.
    pub fn fetch(&self, num: u32, gen: u16, depth: u32) -> Result<Object> {
        if depth > MAX_RESOLVE_DEPTH {
            return Err(Error::RecursionLimit("xref fetch"));
        }
        let Some(entry) = self.entries.get(&num).copied() else {
            return Ok(Object::Null);
        };
        match entry {
            XRefEntry::Free => Ok(Object::Null),
            XRefEntry::Uncompressed { offset, gen: eg } => {
                let _ = (gen, eg); // generation mismatches are tolerated, matching lenient readers
                self.fetch_uncompressed(num, offset, depth)
            }
            XRefEntry::Compressed { stream_num, index } => self.fetch_compressed(stream_num, index, depth),
        }
    }

    pub fn fetch_ref(&self, r: Ref, depth: u32) -> Result<Object> {
        self.fetch(r.num, r.gen, depth)
    }

    /// `resolve(obj, depth) = obj` if not a ref, else the fetched referent.
    pub fn resolve(&self, obj: &Object, depth: u32) -> Result<Object> {
        match obj {
            Object::Ref(r) => self.fetch_ref(*r, depth + 1),
            other => Ok(other.clone()),
        }
    }

    fn fetch_uncompressed(&self, num: u32, offset: u64, depth: u32) -> Result<Object> {
        if offset as usize >= self.data.len() {
            return Ok(Object::Error);
        }
        let mut p = Parser::new(self.data.clone(), offset);
        let lengths = |r: Ref| -> Result<i64> {
            match self.fetch(r.num, r.gen, depth + 1)? {
                Object::Int(n) => Ok(n as i64),
                _ => Err(Error::SyntaxError("/Length did not resolve to an int".into())),
            }
        };
        let (_got_num, _got_gen, mut obj) = parse_indirect_header_with(&mut p, &lengths)?;

        if let Some(d) = self.decryptor.as_ref() {
            decrypt_object_strings(&mut obj, num, 0, d.as_ref());
        }
        Ok(obj)
    }

    fn fetch_compressed(&self, stream_num: u32, index: u32, depth: u32) -> Result<Object> {
        let objs = self.object_stream(stream_num, depth)?;
        match objs.get(index as usize) {
            Some((_, obj)) => Ok(obj.clone()),
            None => Ok(Object::Null),
        }
    }

    fn object_stream(&self, stream_num: u32, depth: u32) -> Result<Rc<Vec<(u32, Object)>>> {
        if let Some(cached) = self.objstm_cache.get(stream_num) {
            return Ok(cached);
        }
        let stream_obj = self.fetch(stream_num, 0, depth + 1)?;
        let Object::Stream(dict, raw) = &stream_obj else {
            return Err(Error::SyntaxError("object stream entry is not a stream".into()));
        };

        let decrypt: Option<Box<dyn Fn(&[u8]) -> Vec<u8>>> = self.decryptor.as_ref().map(|d| {
            let d = d.clone();
            let n = stream_num;
            Box::new(move |b: &[u8]| d.decrypt_bytes(n, 0, b)) as Box<dyn Fn(&[u8]) -> Vec<u8>>
        });
        let decrypt_ref: Option<&dyn Fn(&[u8]) -> Vec<u8>> = decrypt.as_deref();
        let bytes = stream::decoded_bytes(dict, raw, decrypt_ref)?;

        let n = dict.get("N").and_then(|o| o.as_int().ok()).unwrap_or(0).max(0) as usize;
        let first = dict.get("First").and_then(|o| o.as_int().ok()).unwrap_or(0).max(0) as u64;

        let header: Rc<[u8]> = Rc::from(bytes.as_slice());
        let mut header_lexer = Lexer::new(MemoryStream::whole(header.clone()));
        let mut pairs = Vec::with_capacity(n);
        for _ in 0..n {
            let a = header_lexer.next_token();
            let b = header_lexer.next_token();
            let (Token::Int(onum), Token::Int(ooff)) = (a, b) else {
                break;
            };
            pairs.push((onum as u32, ooff as u64));
        }

        let mut out = Vec::with_capacity(pairs.len());
        for (onum, ooff) in pairs {
            let mut p = Parser::new(header.clone(), first + ooff);
            let obj = p.parse_object().unwrap_or(Object::Error);
            out.push((onum, obj));
        }
        let rc = Rc::new(out);
        self.objstm_cache.insert(stream_num, rc.clone());
        Ok(rc)
    }
}

fn parse_indirect_header(p: &mut Parser) -> Result<(u32, u16, Object)> {
    parse_indirect_header_with(p, &|_| Err(Error::Unimplemented("indirect Length".into())))
}

fn parse_indirect_header_with(
    p: &mut Parser,
    lengths: &crate::parser::LengthResolver,
) -> Result<(u32, u16, Object)> {
    // `N G obj` precedes the object body; tolerate its absence (some
    // generators omit it for objects referenced only from xref streams).
    let save = p.pos();
    let header = read_two_ints_and_keyword(p, "obj");
    match header {
        Some((n, g)) => {
            let obj = p.parse_object_with(lengths)?;
            Ok((n as u32, g as u16, obj))
        }
        None => {
            p.seek(save);
            let obj = p.parse_object_with(lengths)?;
            Ok((0, 0, obj))
        }
    }
}

fn read_two_ints_and_keyword(p: &mut Parser, keyword: &str) -> Option<(i32, i32)> {
    let a = p.parse_object().ok()?;
    let b = p.parse_object().ok()?;
    let (Object::Int(n), Object::Int(g)) = (a, b) else {
        return None;
    };
    let save = p.pos();
    match p.parse_object() {
        Ok(Object::Command(k)) if k.as_ref() == keyword => Some((n, g)),
        _ => {
            p.seek(save);
            None
        }
    }
}

fn decrypt_object_strings(obj: &mut Object, num: u32, gen: u16, d: &dyn Decryptor) {
    match obj {
        Object::String(s) => {
            *s = d.decrypt_bytes(num, gen, s);
        }
        Object::Array(items) => {
            for it in items {
                decrypt_object_strings(it, num, gen, d);
            }
        }
        Object::Dict(dict) | Object::Stream(dict, _) => {
            let keys: Vec<Name> = dict.iter().map(|(k, _)| k.clone()).collect();
            for k in keys {
                if let Some(v) = dict.get(&k).cloned() {
                    let mut v = v;
                    decrypt_object_strings(&mut v, num, gen, d);
                    dict.insert(k, v);
                }
            }
        }
        _ => {}
    }
}

fn find_start_xref(data: &[u8]) -> Option<u64> {
    const NEEDLE: &[u8] = b"startxref";
    let tail_start = data.len().saturating_sub(2048);
    let window = &data[tail_start..];
    let rel = window.windows(NEEDLE.len()).rposition(|w| w == NEEDLE)?;
    let mut i = tail_start + rel + NEEDLE.len();
    while i < data.len() && (data[i] as char).is_whitespace() {
        i += 1;
    }
    let start_digits = i;
    while i < data.len() && data[i].is_ascii_digit() {
        i += 1;
    }
    std::str::from_utf8(&data[start_digits..i]).ok()?.parse().ok()
}

/// Follows `/Prev` (and, for hybrid files, `/XRefStm`) chains, merging
/// entries so that earlier (closer to EOF) sections win per PDF's
/// update-overlay semantics.
fn read_xref_chain(
    data: &Rc<[u8]>,
    start: u64,
    entries: &mut HashMap<u32, XRefEntry>,
    trailer: &mut Dict,
    visited: &mut Vec<u64>,
) -> Result<()> {
    if visited.contains(&start) || visited.len() > 64 {
        return Ok(());
    }
    visited.push(start);

    let section_trailer = read_xref_section(data, start, entries)?;

    if let Some(Object::Int(hybrid)) = section_trailer.get("XRefStm") {
        let _ = read_xref_chain(data, *hybrid as u64, entries, trailer, visited);
    }

    for (k, v) in section_trailer.iter() {
        if !trailer.contains_key(k) {
            trailer.insert(k.clone(), v.clone());
        }
    }

    if let Some(Object::Int(prev)) = section_trailer.get("Prev") {
        read_xref_chain(data, *prev as u64, entries, trailer, visited)?;
    }

    Ok(())
}

fn read_xref_section(data: &Rc<[u8]>, pos: u64, entries: &mut HashMap<u32, XRefEntry>) -> Result<Dict> {
    let slice = &data[pos as usize..];
    let is_classic = slice.starts_with(b"xref");
    if is_classic {
        read_classic_xref_table(data, pos, entries)
    } else {
        read_xref_stream(data, pos, entries)
    }
}

/// Reads a raw token, consuming a pushed-back one first. Classic xref
/// tables are read straight off the [`Lexer`] rather than through
/// [`Parser`]: consecutive bare integers (`first count`, then three
/// per-entry fields) would otherwise trip the parser's `int int R`
/// lookahead, which is only meaningful for real indirect references.
fn lex_next(lex: &mut Lexer<MemoryStream>, pending: &mut Option<Token>) -> Token {
    pending.take().unwrap_or_else(|| lex.next_token())
}

fn lex_push(pending: &mut Option<Token>, t: Token) {
    *pending = Some(t);
}

fn read_classic_xref_table(data: &Rc<[u8]>, pos: u64, entries: &mut HashMap<u32, XRefEntry>) -> Result<Dict> {
    let mut stream = MemoryStream::whole(data.clone());
    stream.seek(pos);
    let mut lex = Lexer::new(stream);
    let mut pending: Option<Token> = None;

    let kw = lex_next(&mut lex, &mut pending);
    if !matches!(&kw, Token::Keyword(k) if k == "xref") {
        return Err(Error::SyntaxError("expected 'xref' keyword".into()));
    }

    loop {
        let t1 = lex_next(&mut lex, &mut pending);
        let first = match t1 {
            Token::Int(n) => n,
            other => {
                lex_push(&mut pending, other);
                break;
            }
        };
        let t2 = lex_next(&mut lex, &mut pending);
        let count = match t2 {
            Token::Int(n) => n,
            other => {
                lex_push(&mut pending, other);
                break;
            }
        };
        for i in 0..count {
            let off_tok = lex_next(&mut lex, &mut pending);
            let gen_tok = lex_next(&mut lex, &mut pending);
            let kind_tok = lex_next(&mut lex, &mut pending);
            let num = (first + i) as u32;
            if entries.contains_key(&num) {
                continue; // a later (closer-to-EOF) section already supplied this slot
            }
            let offset = match off_tok {
                Token::Int(n) => n as u64,
                _ => 0,
            };
            let gen = match gen_tok {
                Token::Int(n) => n as u16,
                _ => 0,
            };
            let is_free = matches!(kind_tok, Token::Keyword(ref k) if k == "f");
            entries.insert(
                num,
                if is_free {
                    XRefEntry::Free
                } else {
                    XRefEntry::Uncompressed { offset, gen }
                },
            );
        }
    }

    let trailer_tok = lex_next(&mut lex, &mut pending);
    if matches!(&trailer_tok, Token::Keyword(k) if k == "trailer") {
        let mut p = Parser::new(data.clone(), lex.pos());
        match p.parse_object()? {
            Object::Dict(d) => Ok(d),
            _ => Ok(Dict::new()),
        }
    } else {
        Ok(Dict::new())
    }
}

fn read_xref_stream(data: &Rc<[u8]>, pos: u64, entries: &mut HashMap<u32, XRefEntry>) -> Result<Dict> {
    let mut p = Parser::new(data.clone(), pos);
    let (_, _, obj) = parse_indirect_header(&mut p)?;
    let Object::Stream(dict, raw) = obj else {
        return Err(Error::SyntaxError("expected xref stream object".into()));
    };

    let bytes = stream::decoded_bytes(&dict, &raw, None)?;
    let widths: Vec<usize> = match dict.get("W") {
        Some(Object::Array(a)) => a.iter().map(|o| o.as_int().unwrap_or(0).max(0) as usize).collect(),
        _ => return Err(Error::SyntaxError("xref stream missing /W".into())),
    };
    if widths.len() != 3 {
        return Err(Error::SyntaxError("xref stream /W must have 3 entries".into()));
    }
    let size = dict.get("Size").and_then(|o| o.as_int().ok()).unwrap_or(0);
    let index: Vec<i32> = match dict.get("Index") {
        Some(Object::Array(a)) => a.iter().filter_map(|o| o.as_int().ok()).collect(),
        _ => vec![0, size],
    };

    let row_width = widths[0] + widths[1] + widths[2];
    let mut cursor = 0usize;
    for pair in index.chunks(2) {
        let [first, count] = [pair[0], *pair.get(1).unwrap_or(&0)];
        for i in 0..count {
            if cursor + row_width > bytes.len() {
                break;
            }
            let row = &bytes[cursor..cursor + row_width];
            cursor += row_width;
            let mut off = 0usize;
            let field_type = if widths[0] == 0 {
                1
            } else {
                let v = read_be(&row[off..off + widths[0]]);
                off += widths[0];
                v as u32
            };
            let f2 = read_be(&row[off..off + widths[1]]);
            off += widths[1];
            let f3 = read_be(&row[off..off + widths[2]]);

            let num = (first + i) as u32;
            if entries.contains_key(&num) {
                continue;
            }
            let entry = match field_type {
                0 => XRefEntry::Free,
                1 => XRefEntry::Uncompressed {
                    offset: f2,
                    gen: f3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_num: f2 as u32,
                    index: f3 as u32,
                },
                _ => continue,
            };
            entries.insert(num, entry);
        }
    }

    Ok(dict)
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

/// Rebuilds the table from scratch by scanning the whole buffer for
/// `N G obj` headers (spec.md §4.5 `repair()`); also locates a `trailer`
/// keyword if one survives, else falls back to the first `/Type /Catalog`
/// object found.
fn repair_by_scan(data: &[u8], entries: &mut HashMap<u32, XRefEntry>, trailer: &mut Dict) -> Result<()> {
    let rc: Rc<[u8]> = Rc::from(data);
    let mut i = 0usize;
    let mut catalog_ref: Option<Ref> = None;

    while i < data.len() {
        if let Some((num, gen, consumed)) = match_obj_header(data, i) {
            entries.insert(num, XRefEntry::Uncompressed { offset: i as u64, gen });
            if catalog_ref.is_none() {
                let mut p = Parser::new(rc.clone(), i as u64);
                if let Ok((_, _, obj)) = parse_indirect_header(&mut p) {
                    if let Ok(d) = obj.as_dict() {
                        if matches!(d.get("Type"), Some(Object::Name(n)) if n.as_ref() == "Catalog") {
                            catalog_ref = Some(Ref::new(num, gen));
                        }
                    }
                }
            }
            i += consumed;
        } else {
            i += 1;
        }
    }

    if let Some(tpos) = find_last_trailer(data) {
        let mut p = Parser::new(rc.clone(), tpos as u64 + 7);
        if let Ok(Object::Dict(d)) = p.parse_object() {
            for (k, v) in d.iter() {
                trailer.insert(k.clone(), v.clone());
            }
        }
    }

    if trailer.get("Root").is_none() {
        if let Some(r) = catalog_ref {
            trailer.insert(Rc::from("Root"), Object::Ref(r));
        } else {
            return Err(Error::SyntaxError("repair scan found no /Catalog object".into()));
        }
    }

    Ok(())
}

fn match_obj_header(data: &[u8], at: usize) -> Option<(u32, u16, usize)> {
    let mut i = at;
    if i >= data.len() || !data[i].is_ascii_digit() {
        return None;
    }
    // Require a delimiter-or-start boundary before the number so "1211 0
    // obj" inside a string literal doesn't false-positive as often (best
    // effort; the repair scan is inherently heuristic).
    if at > 0 && (data[at - 1].is_ascii_alphanumeric() || data[at - 1] == b'.') {
        return None;
    }
    let num_start = i;
    while i < data.len() && data[i].is_ascii_digit() {
        i += 1;
    }
    let num: u32 = std::str::from_utf8(&data[num_start..i]).ok()?.parse().ok()?;
    if i >= data.len() || !(data[i] as char).is_whitespace() {
        return None;
    }
    while i < data.len() && (data[i] as char).is_whitespace() {
        i += 1;
    }
    let gen_start = i;
    while i < data.len() && data[i].is_ascii_digit() {
        i += 1;
    }
    if i == gen_start {
        return None;
    }
    let gen: u16 = std::str::from_utf8(&data[gen_start..i]).ok()?.parse().ok()?;
    while i < data.len() && (data[i] as char).is_whitespace() {
        i += 1;
    }
    if !data[i..].starts_with(b"obj") {
        return None;
    }
    i += 3;
    Some((num, gen, i - at))
}

fn find_last_trailer(data: &[u8]) -> Option<usize> {
    const NEEDLE: &[u8] = b"trailer";
    data.windows(NEEDLE.len()).rposition(|w| w == NEEDLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NullReporter;

    fn body_with_xref(body: &str, offsets: &[(u32, u64)], root: u32, size: u32) -> Vec<u8> {
        let mut out = body.as_bytes().to_vec();
        let xref_pos = out.len();
        out.extend_from_slice(b"xref\n");
        out.extend_from_slice(format!("0 {}\n", size).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for (_, off) in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        out.extend_from_slice(b"trailer\n");
        out.extend_from_slice(format!("<< /Size {} /Root {} 0 R >>\n", size, root).as_bytes());
        out.extend_from_slice(b"startxref\n");
        out.extend_from_slice(format!("{}\n", xref_pos).as_bytes());
        out.extend_from_slice(b"%%EOF");
        out
    }

    #[test]
    fn classic_table_resolves_catalog() {
        let mut body = String::new();
        let obj1 = body.len();
        body.push_str("1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let obj2 = body.len();
        body.push_str("2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");

        let data = body_with_xref(&body, &[(1, obj1 as u64), (2, obj2 as u64)], 1, 3);
        let xref = XRef::open(Rc::from(data.as_slice()), &NullReporter).unwrap();
        assert_eq!(xref.root, Ref::new(1, 0));
        let catalog = xref.fetch(1, 0, 0).unwrap();
        let dict = catalog.as_dict().unwrap();
        assert_eq!(dict.get("Type").unwrap().as_name().unwrap(), "Catalog");
    }

    #[test]
    fn damaged_tail_falls_back_to_repair_scan() {
        let mut body = String::new();
        body.push_str("%PDF-1.7\n");
        body.push_str("1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        body.push_str("2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        body.push_str("trailer\n<< /Root 1 0 R >>\n");
        // No xref/startxref at all: forces repair().
        let xref = XRef::open(Rc::from(body.as_bytes()), &NullReporter).unwrap();
        let catalog = xref.fetch(1, 0, 0).unwrap();
        assert_eq!(catalog.as_dict().unwrap().get("Type").unwrap().as_name().unwrap(), "Catalog");
    }

    #[test]
    fn resolve_is_identity_on_non_ref() {
        let mut body = String::new();
        let obj1 = body.len();
        body.push_str("1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let obj2 = body.len();
        body.push_str("2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        let data = body_with_xref(&body, &[(1, obj1 as u64), (2, obj2 as u64)], 1, 3);
        let xref = XRef::open(Rc::from(data.as_slice()), &NullReporter).unwrap();
        let direct = Object::Int(42);
        assert_eq!(xref.resolve(&direct, 0).unwrap(), direct);
    }
}
