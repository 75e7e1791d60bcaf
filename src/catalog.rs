//! Catalog & page tree (spec.md §4.7, component C7).
//!
//! Resolves the page tree from the document root and flattens it into a
//! 1-based array of pages, propagating inheritable attributes
//! (`MediaBox`, `CropBox`, `Rotate`, `Resources`) from ancestors to each
//! leaf. Per REDESIGN FLAGS §9 ("reference cycles in the page tree:
//! replace parent pointers with an arena-and-index scheme"), there are no
//! parent back-pointers at all: the tree is walked once, top-down, with a
//! visited-refs guard that breaks cycles, and the result is a flat
//! `Vec<Page>` indexed by page number rather than a live tree a caller
//! could walk back up through.
//!
//! `original_source/xpdf/Catalog.hh` additionally exposes base URI,
//! metadata, struct-tree root, outline, AcroForm, OCProperties, named
//! destinations and embedded files; kept here as raw read-only accessors
//! (SPEC_FULL.md §4.7).

use crate::error::{Error, Result};
use crate::object::{Dict, Object, Ref, MAX_RESOLVE_DEPTH};
use crate::xref::XRef;
use std::rc::Rc;

/// Inheritable page attributes, resolved down to one leaf.
#[derive(Debug, Clone)]
pub struct PageAttrs {
    pub media_box: [f64; 4],
    pub crop_box: Option<[f64; 4]>,
    pub rotate: i32,
    pub resources: Option<Dict>,
}

impl Default for PageAttrs {
    fn default() -> Self {
        // US Letter, matching the original's fallback when a malformed
        // document omits /MediaBox everywhere up the chain.
        PageAttrs {
            media_box: [0.0, 0.0, 612.0, 792.0],
            crop_box: None,
            rotate: 0,
            resources: None,
        }
    }
}

/// One flattened leaf page.
#[derive(Debug, Clone)]
pub struct Page {
    pub obj_ref: Ref,
    pub attrs: PageAttrs,
}

pub struct Catalog {
    xref: Rc<XRef>,
    root_dict: Dict,
    pages: Vec<Page>,
    page_refs: Vec<Ref>,
}

impl Catalog {
    pub fn open(xref: Rc<XRef>) -> Result<Self> {
        let root_obj = xref.fetch_ref(xref.root, 0)?;
        let root_dict = root_obj.as_dict()?.clone();

        let pages_ref = match root_dict.get("Pages") {
            Some(Object::Ref(r)) => *r,
            _ => return Err(Error::SyntaxError("catalog has no /Pages entry".into())),
        };

        let mut pages = Vec::new();
        let mut visited = Vec::new();
        flatten_page_tree(&xref, pages_ref, PageAttrs::default(), &mut pages, &mut visited, 0)?;

        if pages.is_empty() {
            return Err(Error::SyntaxError("document has no pages".into()));
        }

        let page_refs = pages.iter().map(|p| p.obj_ref).collect();

        Ok(Catalog {
            xref,
            root_dict,
            pages,
            page_refs,
        })
    }

    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// 1-based page access, matching spec.md's "exposes page N by number".
    pub fn page(&self, n: usize) -> Result<&Page> {
        self.pages
            .get(n.wrapping_sub(1))
            .ok_or_else(|| Error::General(format!("page {n} out of range (1..={})", self.pages.len())))
    }

    pub fn page_ref(&self, n: usize) -> Option<Ref> {
        self.page_refs.get(n.wrapping_sub(1)).copied()
    }

    /// The page's content stream bytes, concatenating a `/Contents` array
    /// with a single space between streams (spec.md §4.8: "one or more
    /// streams concatenated").
    pub fn page_content(&self, n: usize) -> Result<Vec<u8>> {
        let page = self.page(n)?;
        let page_obj = self.xref.fetch_ref(page.obj_ref, 0)?;
        let dict = page_obj.as_dict()?;
        let mut out = Vec::new();
        match dict.get("Contents") {
            Some(Object::Ref(r)) => append_stream_bytes(&self.xref, *r, &mut out)?,
            Some(Object::Array(items)) => {
                for item in items {
                    if let Object::Ref(r) = item {
                        append_stream_bytes(&self.xref, *r, &mut out)?;
                        out.push(b' ');
                    }
                }
            }
            _ => {}
        }
        Ok(out)
    }

    pub fn page_resources(&self, n: usize) -> Result<Dict> {
        Ok(self.page(n)?.attrs.resources.clone().unwrap_or_default())
    }

    pub fn info_dict(&self) -> Result<Option<Dict>> {
        match self.trailer_info_ref() {
            Some(r) => Ok(self.xref.fetch_ref(r, 0)?.as_dict().ok().cloned()),
            None => Ok(None),
        }
    }

    fn trailer_info_ref(&self) -> Option<Ref> {
        match self.xref.trailer.get("Info") {
            Some(Object::Ref(r)) => Some(*r),
            _ => None,
        }
    }

    pub fn outline(&self) -> Option<&Object> {
        self.root_dict.get("Outlines")
    }

    pub fn acro_form(&self) -> Option<&Object> {
        self.root_dict.get("AcroForm")
    }

    pub fn struct_tree_root(&self) -> Option<&Object> {
        self.root_dict.get("StructTreeRoot")
    }

    pub fn oc_properties(&self) -> Option<&Dict> {
        self.root_dict.get("OCProperties").and_then(|o| o.as_dict().ok())
    }

    pub fn base_uri(&self) -> Option<&[u8]> {
        self.root_dict.get("URI").and_then(|o| o.as_dict().ok()).and_then(|d| d.get("Base")).and_then(|o| o.as_str_bytes().ok())
    }

    /// The dests name tree or dictionary, raw (spec.md §4.7: "also exposes
    /// ... named destinations"; SPEC_FULL keeps this a raw accessor).
    pub fn dests(&self) -> Option<&Object> {
        self.root_dict.get("Dests")
    }

    pub fn named_dest(&self, name: &[u8]) -> Result<Option<Object>> {
        let Some(Object::Ref(r)) = self.root_dict.get("Names") else {
            return Ok(None);
        };
        let names = self.xref.fetch_ref(*r, 0)?;
        let Ok(names_dict) = names.as_dict() else {
            return Ok(None);
        };
        let Some(Object::Ref(dests_ref)) = names_dict.get("Dests") else {
            return Ok(None);
        };
        let tree = self.xref.fetch_ref(*dests_ref, 0)?;
        find_in_name_tree(&self.xref, &tree, name, 0)
    }

    /// Optional-content visibility: `/OFF` wins, then `/ON`, then the
    /// default config's `/BaseState` (spec.md §4.7: "evaluate visibility
    /// expressions").
    pub fn is_ocg_visible(&self, ocg: Ref) -> bool {
        let Some(ocp) = self.oc_properties() else {
            return true;
        };
        let Some(d) = ocp.get("D").and_then(|o| o.as_dict().ok()) else {
            return true;
        };
        if ref_in_array(d.get("OFF"), ocg) {
            return false;
        }
        if ref_in_array(d.get("ON"), ocg) {
            return true;
        }
        !matches!(d.get("BaseState"), Some(Object::Name(n)) if n.as_ref() == "OFF")
    }

    /// Embedded files (`/Names /EmbeddedFiles` name tree), returned as raw
    /// (name, file-spec-dict) pairs; no attachment-content helper beyond
    /// that (out of scope per spec.md §1).
    pub fn embedded_files(&self) -> Result<Vec<(Vec<u8>, Dict)>> {
        let Some(Object::Ref(r)) = self.root_dict.get("Names") else {
            return Ok(Vec::new());
        };
        let names = self.xref.fetch_ref(*r, 0)?;
        let Ok(names_dict) = names.as_dict() else {
            return Ok(Vec::new());
        };
        let Some(Object::Ref(ef_ref)) = names_dict.get("EmbeddedFiles") else {
            return Ok(Vec::new());
        };
        let tree = self.xref.fetch_ref(*ef_ref, 0)?;
        let mut out = Vec::new();
        collect_name_tree_leaves(&self.xref, &tree, &mut out, 0)?;
        Ok(out)
    }
}

fn append_stream_bytes(xref: &XRef, r: Ref, out: &mut Vec<u8>) -> Result<()> {
    let obj = xref.fetch_ref(r, 0)?;
    if let Object::Stream(dict, raw) = &obj {
        let bytes = crate::stream::decoded_bytes(dict, raw, None)?;
        out.extend_from_slice(&bytes);
    }
    Ok(())
}

fn ref_in_array(obj: Option<&Object>, target: Ref) -> bool {
    match obj {
        Some(Object::Array(items)) => items.iter().any(|o| matches!(o, Object::Ref(r) if *r == target)),
        _ => false,
    }
}

#[allow(clippy::too_many_arguments)]
fn flatten_page_tree(
    xref: &XRef,
    node_ref: Ref,
    inherited: PageAttrs,
    out: &mut Vec<Page>,
    visited: &mut Vec<Ref>,
    depth: u32,
) -> Result<()> {
    if depth > MAX_RESOLVE_DEPTH {
        return Err(Error::RecursionLimit("page tree nesting"));
    }
    if visited.contains(&node_ref) {
        return Ok(()); // cyclic /Kids reference; silently stop (REDESIGN FLAGS §9)
    }
    visited.push(node_ref);

    let node_obj = xref.fetch_ref(node_ref, 0)?;
    let Ok(dict) = node_obj.as_dict() else {
        return Ok(());
    };

    let attrs = inherit_attrs(&inherited, dict);

    let is_pages = matches!(dict.get("Type"), Some(Object::Name(n)) if n.as_ref() == "Pages");
    match dict.get("Kids") {
        Some(Object::Array(kids)) if is_pages || dict.get("Type").is_none() => {
            for kid in kids {
                if let Object::Ref(kid_ref) = kid {
                    flatten_page_tree(xref, *kid_ref, attrs.clone(), out, visited, depth + 1)?;
                }
            }
        }
        _ => {
            out.push(Page {
                obj_ref: node_ref,
                attrs,
            });
        }
    }

    Ok(())
}

fn inherit_attrs(parent: &PageAttrs, node: &Dict) -> PageAttrs {
    let media_box = read_box(node.get("MediaBox")).unwrap_or(parent.media_box);
    let crop_box = read_box(node.get("CropBox")).or(parent.crop_box);
    let rotate = node
        .get("Rotate")
        .and_then(|o| o.as_int().ok())
        .map(normalize_rotation)
        .unwrap_or(parent.rotate);
    let resources = node
        .get("Resources")
        .and_then(|o| o.as_dict().ok())
        .cloned()
        .or_else(|| parent.resources.clone());
    PageAttrs {
        media_box,
        crop_box,
        rotate,
        resources,
    }
}

fn normalize_rotation(deg: i32) -> i32 {
    ((deg % 360) + 360) % 360
}

fn read_box(obj: Option<&Object>) -> Option<[f64; 4]> {
    let arr = obj?.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (i, o) in arr.iter().enumerate() {
        out[i] = o.as_f64().ok()?;
    }
    Some(out)
}

/// Name trees (`ISO 32000-1 §7.9.6`): either `/Names` (flat, sorted
/// key/value pairs) or `/Kids` (subtrees with `/Limits` bounds).
fn find_in_name_tree(xref: &XRef, node: &Object, key: &[u8], depth: u32) -> Result<Option<Object>> {
    if depth > MAX_RESOLVE_DEPTH {
        return Err(Error::RecursionLimit("name tree nesting"));
    }
    let Ok(dict) = node.as_dict() else {
        return Ok(None);
    };
    if let Some(Object::Array(names)) = dict.get("Names") {
        let mut i = 0;
        while i + 1 < names.len() {
            if let Ok(b) = names[i].as_str_bytes() {
                if b == key {
                    return Ok(Some(names[i + 1].clone()));
                }
            }
            i += 2;
        }
        return Ok(None);
    }
    if let Some(Object::Array(kids)) = dict.get("Kids") {
        for kid in kids {
            if let Object::Ref(r) = kid {
                let kid_obj = xref.fetch_ref(*r, 0)?;
                if let Some(found) = find_in_name_tree(xref, &kid_obj, key, depth + 1)? {
                    return Ok(Some(found));
                }
            }
        }
    }
    Ok(None)
}

fn collect_name_tree_leaves(xref: &XRef, node: &Object, out: &mut Vec<(Vec<u8>, Dict)>, depth: u32) -> Result<()> {
    if depth > MAX_RESOLVE_DEPTH {
        return Err(Error::RecursionLimit("name tree nesting"));
    }
    let Ok(dict) = node.as_dict() else {
        return Ok(());
    };
    if let Some(Object::Array(names)) = dict.get("Names") {
        let mut i = 0;
        while i + 1 < names.len() {
            if let Ok(b) = names[i].as_str_bytes() {
                let value = match &names[i + 1] {
                    Object::Ref(r) => xref.fetch_ref(*r, 0)?,
                    other => other.clone(),
                };
                if let Ok(d) = value.as_dict() {
                    out.push((b.to_vec(), d.clone()));
                }
            }
            i += 2;
        }
    }
    if let Some(Object::Array(kids)) = dict.get("Kids") {
        for kid in kids {
            if let Object::Ref(r) = kid {
                let kid_obj = xref.fetch_ref(*r, 0)?;
                collect_name_tree_leaves(xref, &kid_obj, out, depth + 1)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NullReporter;

    fn build_simple_doc() -> Vec<u8> {
        let mut body = String::new();
        body.push_str("%PDF-1.7\n");
        let o1 = body.len();
        body.push_str("1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let o2 = body.len();
        body.push_str("2 0 obj\n<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 612 792] >>\nendobj\n");
        let o3 = body.len();
        body.push_str("3 0 obj\n<< /Type /Page /Parent 2 0 R /Rotate 90 >>\nendobj\n");
        let o4 = body.len();
        body.push_str("4 0 obj\n<< /Type /Page /Parent 2 0 R >>\nendobj\n");

        let mut out = body.into_bytes();
        let xref_pos = out.len();
        out.extend_from_slice(b"xref\n0 5\n0000000000 65535 f \n");
        for off in [o1, o2, o3, o4] {
            out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        out.extend_from_slice(b"trailer\n<< /Size 5 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n", xref_pos).as_bytes());
        out.extend_from_slice(b"%%EOF");
        out
    }

    #[test]
    fn flattens_two_leaf_pages_with_inherited_media_box() {
        let data = build_simple_doc();
        let xref = Rc::new(XRef::open(Rc::from(data.as_slice()), &NullReporter).unwrap());
        let catalog = Catalog::open(xref).unwrap();
        assert_eq!(catalog.num_pages(), 2);
        assert_eq!(catalog.page(1).unwrap().attrs.media_box, [0.0, 0.0, 612.0, 792.0]);
        assert_eq!(catalog.page(1).unwrap().attrs.rotate, 90);
        assert_eq!(catalog.page(2).unwrap().attrs.rotate, 0);
    }

    #[test]
    fn out_of_range_page_is_an_error() {
        let data = build_simple_doc();
        let xref = Rc::new(XRef::open(Rc::from(data.as_slice()), &NullReporter).unwrap());
        let catalog = Catalog::open(xref).unwrap();
        assert!(catalog.page(3).is_err());
        assert!(catalog.page(0).is_err());
    }
}
