//! Document façade.
//!
//! Ties the cross-reference table (C5), security handler (C6), catalog
//! (C7), content-stream interpreter (C8/C9) and layout analyzer (C10)
//! together into the one entry point callers actually want: open a file,
//! ask for page N's text. There's no teacher precedent for a
//! whole-document object in `Rick-Wilson-pdf-handouts` (it only ever
//! opens a PDF to read/write isolated pieces of it via `lopdf`), so the
//! shape here is this crate's own, following the component wiring
//! spec.md §2's data-flow paragraph describes.

use crate::catalog::Catalog;
use crate::content::{FontCache, Interpreter};
use crate::error::{Error, Reporter, Result};
use crate::layout::{layout_page, LayoutControl, LayoutMode};
use crate::object::{Object, Ref};
use crate::security::SecurityHandler;
use crate::textpage::{Bbox, TextPageAccumulator};
use crate::xref::XRef;
use std::path::Path;
use std::rc::Rc;

pub struct OpenOptions<'a> {
    pub owner_password: &'a [u8],
    pub user_password: &'a [u8],
}

impl Default for OpenOptions<'_> {
    fn default() -> Self {
        OpenOptions { owner_password: b"", user_password: b"" }
    }
}

pub struct Document {
    xref: Rc<XRef>,
    catalog: Catalog,
    fonts: FontCache,
    permissions: i32,
}

impl Document {
    pub fn open_file(path: &Path, options: OpenOptions, reporter: &dyn Reporter) -> Result<Document> {
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        Document::open_bytes(Rc::from(bytes.into_boxed_slice()), options, reporter)
    }

    pub fn open_bytes(data: Rc<[u8]>, options: OpenOptions, reporter: &dyn Reporter) -> Result<Document> {
        let mut xref = XRef::open(data.clone(), reporter)?;
        let mut permissions = -1i32;

        if let Some(encrypt_ref) = xref.encrypt_ref() {
            let encrypt_obj = xref.fetch_ref(encrypt_ref, 0)?;
            let encrypt_dict = encrypt_obj.as_dict()?.clone();
            let file_id = file_id_bytes(&xref)?;
            let handler = SecurityHandler::new(&encrypt_dict, &file_id, options.owner_password, options.user_password)?;
            permissions = handler.permissions();
            xref.set_decryptor(Rc::new(handler));
        }

        let xref = Rc::new(xref);
        let catalog = Catalog::open(xref.clone())?;

        Ok(Document {
            xref,
            catalog,
            fonts: FontCache::new(),
            permissions,
        })
    }

    pub fn num_pages(&self) -> usize {
        self.catalog.num_pages()
    }

    pub fn permissions(&self) -> i32 {
        self.permissions
    }

    pub fn media_box(&self, page_no: usize) -> Result<[f64; 4]> {
        Ok(self.catalog.page(page_no)?.attrs.media_box)
    }

    /// Runs the content-stream interpreter over page `n` and lays out the
    /// resulting characters per `control`, returning the page's text.
    pub fn extract_page_text(&self, page_no: usize, control: &LayoutControl, reporter: &dyn Reporter) -> Result<String> {
        let media_box = self.media_box(page_no)?;
        let mut sink = TextPageAccumulator::new();
        let mut interp = Interpreter::new(&self.xref, &self.fonts, reporter);
        interp.run_page(&self.catalog, page_no, &mut sink)?;

        for (bbox, uri) in self.link_annotations(page_no)? {
            sink.add_link(bbox, uri);
        }

        let chars = sink.finish();
        Ok(layout_page(chars, media_box, control))
    }

    /// Extracts every page's text, each page separated by a form-feed
    /// marker if `control`'s caller wants one (left to the CLI, which
    /// owns [`crate::encoding::OutputEncoder`]).
    pub fn extract_text_range(&self, first: usize, last: usize, control: &LayoutControl, reporter: &dyn Reporter) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for n in first..=last.min(self.num_pages()) {
            // A bad page yields empty text rather than aborting the
            // document (spec.md §7: "A bad page does not abort the
            // document; it yields an empty page").
            match self.extract_page_text(n, control, reporter) {
                Ok(text) => out.push(text),
                Err(_) => out.push(String::new()),
            }
        }
        Ok(out)
    }

    fn link_annotations(&self, page_no: usize) -> Result<Vec<(Bbox, String)>> {
        let page_ref = match self.catalog.page_ref(page_no) {
            Some(r) => r,
            None => return Ok(Vec::new()),
        };
        let page_obj = self.xref.fetch_ref(page_ref, 0)?;
        let Ok(dict) = page_obj.as_dict() else {
            return Ok(Vec::new());
        };
        let Some(annots_obj) = dict.get("Annots") else {
            return Ok(Vec::new());
        };
        let resolved = self.xref.resolve(annots_obj, 0)?;
        let Ok(items) = resolved.as_array() else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for item in items {
            let annot = self.xref.resolve(item, 0)?;
            let Ok(annot_dict) = annot.as_dict() else {
                continue;
            };
            let subtype = annot_dict.get("Subtype").and_then(|o| o.as_name().ok()).unwrap_or("");
            if subtype != "Link" {
                continue;
            }
            let Some(rect) = read_rect(annot_dict.get("Rect")) else {
                continue;
            };
            let uri = annot_dict
                .get("A")
                .and_then(|o| self.xref.resolve(o, 0).ok())
                .and_then(|a| a.as_dict().ok().cloned())
                .and_then(|a| a.get("URI").and_then(|o| o.as_str_bytes().ok()).map(|b| b.to_vec()))
                .map(|b| String::from_utf8_lossy(&b).into_owned());
            if let Some(uri) = uri {
                out.push((
                    Bbox { xmin: rect[0], ymin: rect[1], xmax: rect[2], ymax: rect[3] },
                    uri,
                ));
            }
        }
        Ok(out)
    }

    pub fn info_title(&self) -> Result<Option<String>> {
        let Some(info) = self.catalog.info_dict()? else {
            return Ok(None);
        };
        Ok(info.get("Title").and_then(|o| o.as_str_bytes().ok()).map(|b| decode_info_string(b)))
    }
}

fn decode_info_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .map(|c| if c.len() == 2 { ((c[0] as u16) << 8) | c[1] as u16 } else { c[0] as u16 })
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

fn read_rect(obj: Option<&Object>) -> Option<[f64; 4]> {
    let arr = obj?.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (i, o) in arr.iter().enumerate() {
        out[i] = o.as_f64().ok()?;
    }
    Some([out[0].min(out[2]), out[1].min(out[3]), out[0].max(out[2]), out[1].max(out[3])])
}

fn file_id_bytes(xref: &XRef) -> Result<Vec<u8>> {
    match xref.trailer.get("ID") {
        Some(Object::Array(items)) => Ok(items.first().and_then(|o| o.as_str_bytes().ok()).map(|b| b.to_vec()).unwrap_or_default()),
        _ => Ok(Vec::new()),
    }
}

impl Default for LayoutMode {
    fn default() -> Self {
        LayoutMode::ReadingOrder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NullReporter;

    fn single_page_pdf(content: &str) -> Vec<u8> {
        let mut body = String::new();
        body.push_str("%PDF-1.7\n");
        let o1 = body.len();
        body.push_str("1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let o2 = body.len();
        body.push_str("2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>\nendobj\n");
        let o3 = body.len();
        body.push_str("3 0 obj\n<< /Type /Page /Parent 2 0 R /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>\nendobj\n");
        let o4 = body.len();
        body.push_str(&format!("4 0 obj\n<< /Length {} >>\nstream\n{}\nendstream\nendobj\n", content.len(), content));
        let o5 = body.len();
        body.push_str("5 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>\nendobj\n");

        let mut out = body.into_bytes();
        let xref_pos = out.len();
        out.extend_from_slice(b"xref\n0 6\n0000000000 65535 f \n");
        for off in [o1, o2, o3, o4, o5] {
            out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        out.extend_from_slice(b"trailer\n<< /Size 6 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n", xref_pos).as_bytes());
        out.extend_from_slice(b"%%EOF");
        out
    }

    #[test]
    fn hello_world_single_line() {
        let data = single_page_pdf("BT /F1 12 Tf 72 720 Td (Hello) Tj ET");
        let doc = Document::open_bytes(Rc::from(data.as_slice()), OpenOptions::default(), &NullReporter).unwrap();
        assert_eq!(doc.num_pages(), 1);
        let control = LayoutControl::default();
        let text = doc.extract_page_text(1, &control, &NullReporter).unwrap();
        assert_eq!(text.trim_end(), "Hello");
    }
}
