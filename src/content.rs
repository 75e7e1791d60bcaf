//! Content-stream interpreter (spec.md §4.8, component C8).
//!
//! Walks a decoded content stream operator-by-operator, maintaining a
//! `q`/`Q` graphics-state stack, and turns `Tj`/`TJ`/`'`/`"` text-showing
//! operators into positioned [`crate::textpage::TextChar`]s fed to a
//! [`TextPageAccumulator`]. Recurses into Form/Image XObjects (`Do`) up to
//! a fixed depth. No rendering happens: paths are tracked only enough to
//! resolve clip bboxes for `Tr` modes 4–7.
//!
//! There's no teacher precedent for an operator-dispatch loop in this
//! codebase (the teacher only ever writes PDF content, never reads it);
//! the operator set and the device-space glyph math below follow
//! `original_source/xpdf/TextOutputDev.hh`'s `drawChar`/`beginString` and
//! spec.md §4.8 directly.

use crate::catalog::Catalog;
use crate::error::{Error, Reporter, Result};
use crate::font::Font;
use crate::graphics::{color_space_from_name, color_to_rgb, ColorSpaceKind, GraphicsState, Matrix, TextRenderMode};
use crate::object::{Dict, Object, Ref};
use crate::parser::Parser;
use crate::textpage::{Bbox, RawChar, TextPageAccumulator};
use crate::xref::XRef;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Hard cap on nested Form XObject `Do` recursion (spec.md §8).
pub const MAX_XOBJECT_DEPTH: u32 = 30;

/// Per-document font cache, keyed by the font dictionary's indirect
/// reference, cleared between documents but shared across a document's
/// pages (spec.md §5: "a font cache... cleared between documents").
#[derive(Default)]
pub struct FontCache {
    fonts: RefCell<HashMap<Ref, Rc<Font>>>,
}

impl FontCache {
    pub fn new() -> Self {
        FontCache::default()
    }

    fn get_or_load(&self, xref: &XRef, font_ref: Ref, font_dict: &Dict) -> Result<Rc<Font>> {
        if let Some(f) = self.fonts.borrow().get(&font_ref) {
            return Ok(f.clone());
        }
        let font = Rc::new(Font::load(xref, font_ref, font_dict)?);
        self.fonts.borrow_mut().insert(font_ref, font.clone());
        Ok(font)
    }
}

fn normalize_rotation(ctm: &Matrix) -> u8 {
    let (x, y) = (ctm.0[0], ctm.0[1]);
    let angle = y.atan2(x).to_degrees();
    let a = ((angle.round() as i64).rem_euclid(360)) as i64;
    if (45..135).contains(&a) {
        1
    } else if (135..225).contains(&a) {
        2
    } else if (225..315).contains(&a) {
        3
    } else {
        0
    }
}

/// The CTM a page's `/Rotate` bakes in before any content operator runs:
/// one 90°-clockwise turn per 90 degrees of `/Rotate`, composed onto
/// itself rather than hand-derived per quadrant. `layout.rs`'s
/// `rotate_bbox`/`unrotate_bbox` pair already undoes whatever rotation
/// `normalize_rotation` reads back off a char's CTM, regardless of which
/// of the four quadrant buckets it lands in, so only the turn count (not
/// its bucket label) needs to be right here.
fn page_rotation_ctm(rotate: i32, media_box: [f64; 4]) -> Matrix {
    let [mx0, my0, mx1, _my1] = media_box;
    let quarter_turn = Matrix::new(0.0, -1.0, 1.0, 0.0, mx0 - my0, mx1);
    let turns = rotate.div_euclid(90).rem_euclid(4);
    let mut ctm = Matrix::IDENTITY;
    for _ in 0..turns {
        ctm = ctm.concat(&quarter_turn);
    }
    ctm
}

struct MarkedContentSpan {
    has_actual_text: bool,
}

pub struct Interpreter<'a> {
    xref: &'a XRef,
    fonts: &'a FontCache,
    reporter: &'a dyn Reporter,
    stack: Vec<GraphicsState>,
    state: GraphicsState,
    text_matrix: Matrix,
    text_line_matrix: Matrix,
    in_text: bool,
    marked_content_stack: Vec<MarkedContentSpan>,
    char_pos_counter: usize,
    pending_clip: Option<[f64; 4]>,
    path_bbox: Option<[f64; 4]>,
}

impl<'a> Interpreter<'a> {
    pub fn new(xref: &'a XRef, fonts: &'a FontCache, reporter: &'a dyn Reporter) -> Self {
        Interpreter {
            xref,
            fonts,
            reporter,
            stack: Vec::new(),
            state: GraphicsState::default(),
            text_matrix: Matrix::IDENTITY,
            text_line_matrix: Matrix::IDENTITY,
            in_text: false,
            marked_content_stack: Vec::new(),
            char_pos_counter: 0,
            pending_clip: None,
            path_bbox: None,
        }
    }

    /// Runs one page's content against `sink`. The initial CTM bakes in
    /// the page's `/Rotate` (spec.md §8, "Rotation closure"; §4.10
    /// scenario 4): a page whose content was authored unrotated but is
    /// declared `/Rotate 90` must still come out of the layout analyzer
    /// in visually-upright reading order, so the quarter turns are
    /// applied here, before a single content operator runs, rather than
    /// threaded through the layout analyzer as a separate step.
    pub fn run_page(
        &mut self,
        catalog: &Catalog,
        page_no: usize,
        sink: &mut TextPageAccumulator,
    ) -> Result<()> {
        let content = catalog.page_content(page_no)?;
        let resources = catalog.page_resources(page_no)?;
        let page = catalog.page(page_no)?;
        self.state.ctm = page_rotation_ctm(page.attrs.rotate, page.attrs.media_box);
        self.run(&content, &resources, sink, 0)
    }

    fn run(&mut self, content: &[u8], resources: &Dict, sink: &mut TextPageAccumulator, depth: u32) -> Result<()> {
        if depth > MAX_XOBJECT_DEPTH {
            return Err(Error::RecursionLimit("XObject nesting"));
        }
        let data: Rc<[u8]> = Rc::from(content);
        let mut parser = Parser::new(data, 0);
        let mut operands: Vec<Object> = Vec::new();

        loop {
            let tok = parser.next_content_token()?;
            match tok {
                Object::Eof => break,
                Object::Command(ref op) => {
                    let op_name = op.as_ref();
                    if op_name == "BI" {
                        self.skip_inline_image(&mut parser);
                        operands.clear();
                        continue;
                    }
                    self.dispatch(op_name, &operands, resources, sink, depth)?;
                    operands.clear();
                }
                other => operands.push(other),
            }
        }
        Ok(())
    }

    fn skip_inline_image(&mut self, parser: &mut Parser) {
        // Consume BI's key/value pairs until ID, then raw-copy the image
        // data; the bytes themselves are discarded (images carry no text).
        loop {
            match parser.next_content_token() {
                Ok(Object::Command(ref k)) if k.as_ref() == "ID" => break,
                Ok(Object::Eof) | Err(_) => return,
                _ => continue,
            }
        }
        let _ = parser.skip_inline_image_data();
    }

    fn num(operands: &[Object], i: usize) -> f64 {
        operands.get(i).and_then(|o| o.as_f64().ok()).unwrap_or(0.0)
    }

    fn dispatch(
        &mut self,
        op: &str,
        operands: &[Object],
        resources: &Dict,
        sink: &mut TextPageAccumulator,
        depth: u32,
    ) -> Result<()> {
        match op {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(s) = self.stack.pop() {
                    self.state = s;
                }
            }
            "cm" => {
                let m = Matrix::new(
                    Self::num(operands, 0),
                    Self::num(operands, 1),
                    Self::num(operands, 2),
                    Self::num(operands, 3),
                    Self::num(operands, 4),
                    Self::num(operands, 5),
                );
                self.state.ctm = m.concat(&self.state.ctm);
            }
            "w" => self.state.line_width = Self::num(operands, 0),
            "gs" => self.apply_ext_gstate(operands, resources),

            "re" => {
                let x = Self::num(operands, 0);
                let y = Self::num(operands, 1);
                let w = Self::num(operands, 2);
                let h = Self::num(operands, 3);
                self.extend_path_bbox([x, y, x + w, y + h]);
            }
            "m" | "l" | "c" | "v" | "y" => {
                let x = Self::num(operands, operands.len().saturating_sub(2));
                let y = Self::num(operands, operands.len().saturating_sub(1));
                self.extend_path_bbox([x, y, x, y]);
            }
            "h" => {}
            "W" | "W*" => {
                self.pending_clip = self.path_bbox;
            }
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" | "n" => {
                if let Some(clip) = self.pending_clip.take() {
                    self.state.clip_bbox = Some(intersect(self.state.clip_bbox, device_bbox(&self.state.ctm, clip)));
                }
                let is_fill = matches!(op, "f" | "F" | "f*" | "B" | "B*" | "b" | "b*");
                if is_fill {
                    if let Some(b) = self.path_bbox {
                        self.maybe_record_underline(b, sink);
                    }
                }
                self.path_bbox = None;
            }

            "CS" => {
                if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                    self.state.stroke_space = color_space_from_name(name);
                }
            }
            "cs" => {
                if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                    self.state.fill_space = color_space_from_name(name);
                }
            }
            "SC" | "SCN" => {
                let vals: Vec<f64> = operands.iter().filter_map(|o| o.as_f64().ok()).collect();
                self.state.stroke_color = color_to_rgb(self.state.stroke_space, &vals);
            }
            "sc" | "scn" => {
                let vals: Vec<f64> = operands.iter().filter_map(|o| o.as_f64().ok()).collect();
                self.state.fill_color = color_to_rgb(self.state.fill_space, &vals);
            }
            "G" => {
                self.state.stroke_space = ColorSpaceKind::DeviceGray;
                self.state.stroke_color = color_to_rgb(ColorSpaceKind::DeviceGray, &[Self::num(operands, 0)]);
            }
            "g" => {
                self.state.fill_space = ColorSpaceKind::DeviceGray;
                self.state.fill_color = color_to_rgb(ColorSpaceKind::DeviceGray, &[Self::num(operands, 0)]);
            }
            "RG" => {
                self.state.stroke_space = ColorSpaceKind::DeviceRGB;
                self.state.stroke_color = [Self::num(operands, 0), Self::num(operands, 1), Self::num(operands, 2)];
            }
            "rg" => {
                self.state.fill_space = ColorSpaceKind::DeviceRGB;
                self.state.fill_color = [Self::num(operands, 0), Self::num(operands, 1), Self::num(operands, 2)];
            }
            "K" => {
                self.state.stroke_space = ColorSpaceKind::DeviceCMYK;
                self.state.stroke_color = color_to_rgb(
                    ColorSpaceKind::DeviceCMYK,
                    &[Self::num(operands, 0), Self::num(operands, 1), Self::num(operands, 2), Self::num(operands, 3)],
                );
            }
            "k" => {
                self.state.fill_space = ColorSpaceKind::DeviceCMYK;
                self.state.fill_color = color_to_rgb(
                    ColorSpaceKind::DeviceCMYK,
                    &[Self::num(operands, 0), Self::num(operands, 1), Self::num(operands, 2), Self::num(operands, 3)],
                );
            }

            "Tc" => self.state.char_spacing = Self::num(operands, 0),
            "Tw" => self.state.word_spacing = Self::num(operands, 0),
            "Tz" => self.state.horiz_scale = Self::num(operands, 0) / 100.0,
            "TL" => self.state.leading = Self::num(operands, 0),
            "Tf" => self.apply_font(operands, resources),
            "Tr" => self.state.render_mode = TextRenderMode(operands.first().and_then(|o| o.as_int().ok()).unwrap_or(0)),
            "Ts" => self.state.rise = Self::num(operands, 0),

            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.text_line_matrix = Matrix::IDENTITY;
                self.in_text = true;
            }
            "ET" => self.in_text = false,
            "Td" => {
                let t = Matrix::new(1.0, 0.0, 0.0, 1.0, Self::num(operands, 0), Self::num(operands, 1));
                self.text_line_matrix = t.concat(&self.text_line_matrix);
                self.text_matrix = self.text_line_matrix;
            }
            "TD" => {
                self.state.leading = -Self::num(operands, 1);
                let t = Matrix::new(1.0, 0.0, 0.0, 1.0, Self::num(operands, 0), Self::num(operands, 1));
                self.text_line_matrix = t.concat(&self.text_line_matrix);
                self.text_matrix = self.text_line_matrix;
            }
            "Tm" => {
                let t = Matrix::new(
                    Self::num(operands, 0),
                    Self::num(operands, 1),
                    Self::num(operands, 2),
                    Self::num(operands, 3),
                    Self::num(operands, 4),
                    Self::num(operands, 5),
                );
                self.text_line_matrix = t;
                self.text_matrix = t;
            }
            "T*" => {
                let t = Matrix::new(1.0, 0.0, 0.0, 1.0, 0.0, -self.state.leading);
                self.text_line_matrix = t.concat(&self.text_line_matrix);
                self.text_matrix = self.text_line_matrix;
            }
            "Tj" => {
                if let Some(Object::String(bytes)) = operands.first() {
                    self.show_text(bytes, sink);
                }
            }
            "'" => {
                let t = Matrix::new(1.0, 0.0, 0.0, 1.0, 0.0, -self.state.leading);
                self.text_line_matrix = t.concat(&self.text_line_matrix);
                self.text_matrix = self.text_line_matrix;
                if let Some(Object::String(bytes)) = operands.first() {
                    self.show_text(bytes, sink);
                }
            }
            "\"" => {
                self.state.word_spacing = Self::num(operands, 0);
                self.state.char_spacing = Self::num(operands, 1);
                let t = Matrix::new(1.0, 0.0, 0.0, 1.0, 0.0, -self.state.leading);
                self.text_line_matrix = t.concat(&self.text_line_matrix);
                self.text_matrix = self.text_line_matrix;
                if let Some(Object::String(bytes)) = operands.get(2) {
                    self.show_text(bytes, sink);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes) => self.show_text(bytes, sink),
                            Object::Int(_) | Object::Real(_) => {
                                let adj = item.as_f64().unwrap_or(0.0);
                                let tx = -adj / 1000.0 * self.state.font_size * self.state.horiz_scale;
                                let t = Matrix::new(1.0, 0.0, 0.0, 1.0, tx, 0.0);
                                self.text_matrix = t.concat(&self.text_matrix);
                            }
                            _ => {}
                        }
                    }
                }
            }

            "BMC" => self.marked_content_stack.push(MarkedContentSpan { has_actual_text: false }),
            "BDC" => {
                let actual_text = self.extract_actual_text(operands, resources);
                let has = actual_text.is_some();
                if let Some(text) = actual_text {
                    sink.begin_actual_text(text, self.char_pos_counter);
                }
                self.marked_content_stack.push(MarkedContentSpan { has_actual_text: has });
            }
            "EMC" => {
                if let Some(span) = self.marked_content_stack.pop() {
                    if span.has_actual_text {
                        sink.end_actual_text();
                    }
                }
            }

            "Do" => self.do_xobject(operands, resources, sink, depth)?,

            _ => {} // unrecognized/irrelevant operator: ignore (line style, rendering intent, etc.)
        }
        Ok(())
    }

    /// A filled path that's much wider than it is tall, at the device
    /// scale a typical underline rule would be, is recorded so the layout
    /// analyzer can attach it to the word it sits under (spec.md §4.9:
    /// "thin horizontal rectangles from fill operations").
    fn maybe_record_underline(&self, device_box: [f64; 4], sink: &mut TextPageAccumulator) {
        let width = device_box[2] - device_box[0];
        let height = device_box[3] - device_box[1];
        if height > 0.0 && height <= 3.0 && width >= height * 3.0 {
            sink.add_underline(Bbox {
                xmin: device_box[0],
                ymin: device_box[1],
                xmax: device_box[2],
                ymax: device_box[3],
            });
        }
    }

    fn extend_path_bbox(&mut self, user_box: [f64; 4]) {
        let dbox = device_bbox(&self.state.ctm, user_box);
        self.path_bbox = Some(match self.path_bbox {
            Some(b) => union_box(b, dbox),
            None => dbox,
        });
    }

    fn apply_ext_gstate(&mut self, operands: &[Object], resources: &Dict) {
        let Some(name) = operands.first().and_then(|o| o.as_name().ok()) else {
            return;
        };
        let Some(Object::Dict(res_gs)) = resources.get("ExtGState") else {
            return;
        };
        let Some(gs_ref) = res_gs.get(name) else {
            return;
        };
        let Ok(gs_obj) = self.xref.resolve(gs_ref, 0) else {
            return;
        };
        let Ok(dict) = gs_obj.as_dict() else {
            return;
        };
        if let Some(ca) = dict.get("ca").and_then(|o| o.as_f64().ok()) {
            self.state.fill_alpha = ca;
        }
    }

    fn apply_font(&mut self, operands: &[Object], resources: &Dict) {
        let Some(name) = operands.first().and_then(|o| o.as_name().ok()) else {
            return;
        };
        self.state.font_size = Self::num(operands, 1);
        let Some(Object::Dict(res_fonts)) = resources.get("Font") else {
            return;
        };
        let Some(font_obj_ref) = res_fonts.get(name) else {
            return;
        };
        let Object::Ref(font_ref) = font_obj_ref else {
            return;
        };
        let Ok(font_obj) = self.xref.fetch_ref(*font_ref, 0) else {
            return;
        };
        let Ok(font_dict) = font_obj.as_dict() else {
            return;
        };
        if let Ok(font) = self.fonts.get_or_load(self.xref, *font_ref, font_dict) {
            self.state.font = Some(font);
        }
    }

    fn extract_actual_text(&self, operands: &[Object], resources: &Dict) -> Option<Vec<u32>> {
        let props = match operands.get(1) {
            Some(Object::Dict(d)) => Some(d.clone()),
            Some(Object::Name(n)) => resources
                .get("Properties")
                .and_then(|o| o.as_dict().ok())
                .and_then(|d| d.get(n.as_ref()))
                .and_then(|o| self.xref.resolve(o, 0).ok())
                .and_then(|o| o.as_dict().ok().cloned()),
            _ => None,
        }?;
        let bytes = props.get("ActualText")?.as_str_bytes().ok()?;
        Some(decode_pdf_text_string(bytes))
    }

    fn do_xobject(
        &mut self,
        operands: &[Object],
        resources: &Dict,
        sink: &mut TextPageAccumulator,
        depth: u32,
    ) -> Result<()> {
        let Some(name) = operands.first().and_then(|o| o.as_name().ok()) else {
            return Ok(());
        };
        let Some(Object::Dict(res_xobj)) = resources.get("XObject") else {
            return Ok(());
        };
        let Some(xobj_ref_obj) = res_xobj.get(name) else {
            return Ok(());
        };
        let xobj = self.xref.resolve(xobj_ref_obj, 0)?;
        let Object::Stream(dict, raw) = &xobj else {
            return Ok(());
        };
        let subtype = dict.get("Subtype").and_then(|o| o.as_name().ok()).unwrap_or("");
        if subtype != "Form" {
            return Ok(()); // Image XObjects carry no text
        }

        let form_matrix = dict
            .get("Matrix")
            .and_then(|o| o.as_array().ok())
            .filter(|a| a.len() == 6)
            .map(|a| {
                let mut m = [0.0; 6];
                for (i, v) in a.iter().enumerate() {
                    m[i] = v.as_f64().unwrap_or(0.0);
                }
                Matrix(m)
            })
            .unwrap_or(Matrix::IDENTITY);

        let form_resources = dict
            .get("Resources")
            .and_then(|o| o.as_dict().ok())
            .cloned()
            .unwrap_or_else(|| resources.clone());

        let bytes = crate::stream::decoded_bytes(dict, raw, None)?;

        let saved_state = self.state.clone();
        self.state.ctm = form_matrix.concat(&self.state.ctm);
        let result = self.run(&bytes, &form_resources, sink, depth + 1);
        self.state = saved_state;
        result
    }

    fn show_text(&mut self, bytes: &[u8], sink: &mut TextPageAccumulator) {
        let Some(font) = self.state.font.clone() else {
            return;
        };
        let rot = normalize_rotation(&self.text_matrix.concat(&self.state.ctm));
        for (code, nbytes) in font.decode_string(bytes) {
            let width = font.width(code);
            let is_space = nbytes == 1 && code == 0x20;

            let rendering_matrix = Matrix::new(
                self.state.font_size * self.state.horiz_scale,
                0.0,
                0.0,
                self.state.font_size,
                0.0,
                self.state.rise,
            )
            .concat(&self.text_matrix)
            .concat(&self.state.ctm);

            let glyph_origin = rendering_matrix.apply(0.0, 0.0);
            let advance_width = width * self.state.font_size + self.state.char_spacing + if is_space { self.state.word_spacing } else { 0.0 };
            let glyph_end = rendering_matrix.apply(width, 0.0);
            let ascent_pt = rendering_matrix.apply(0.0, font.ascent);
            let descent_pt = rendering_matrix.apply(0.0, font.descent);

            let xs = [glyph_origin.0, glyph_end.0, ascent_pt.0, descent_pt.0];
            let ys = [glyph_origin.1, glyph_end.1, ascent_pt.1, descent_pt.1];
            let bbox = Bbox {
                xmin: xs.iter().cloned().fold(f64::INFINITY, f64::min),
                ymin: ys.iter().cloned().fold(f64::INFINITY, f64::min),
                xmax: xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                ymax: ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            };

            let clipped = if let Some(clip) = self.state.clip_bbox {
                !boxes_overlap(clip, [bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax])
            } else {
                false
            };
            let invisible = self.state.render_mode.is_invisible() || self.state.fill_alpha <= 0.0;

            for cp in font.to_unicode(code) {
                sink.add_char(RawChar {
                    unicode: cp,
                    char_pos: self.char_pos_counter,
                    bbox,
                    font: font.clone(),
                    font_size: self.state.font_size,
                    rgb: self.state.fill_color,
                    rot,
                    clipped,
                    invisible,
                });
            }
            self.char_pos_counter += nbytes as usize;

            let advance = Matrix::new(1.0, 0.0, 0.0, 1.0, advance_width * self.state.horiz_scale, 0.0);
            self.text_matrix = advance.concat(&self.text_matrix);
        }
    }
}

fn device_bbox(ctm: &Matrix, user_box: [f64; 4]) -> [f64; 4] {
    let corners = [
        ctm.apply(user_box[0], user_box[1]),
        ctm.apply(user_box[2], user_box[1]),
        ctm.apply(user_box[2], user_box[3]),
        ctm.apply(user_box[0], user_box[3]),
    ];
    let xs: Vec<f64> = corners.iter().map(|c| c.0).collect();
    let ys: Vec<f64> = corners.iter().map(|c| c.1).collect();
    [
        xs.iter().cloned().fold(f64::INFINITY, f64::min),
        ys.iter().cloned().fold(f64::INFINITY, f64::min),
        xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    ]
}

fn union_box(a: [f64; 4], b: [f64; 4]) -> [f64; 4] {
    [a[0].min(b[0]), a[1].min(b[1]), a[2].max(b[2]), a[3].max(b[3])]
}

fn intersect(existing: Option<[f64; 4]>, new: [f64; 4]) -> [f64; 4] {
    match existing {
        Some(e) => [e[0].max(new[0]), e[1].max(new[1]), e[2].min(new[2]), e[3].min(new[3])],
        None => new,
    }
}

fn boxes_overlap(a: [f64; 4], b: [f64; 4]) -> bool {
    a[0] <= b[2] && b[0] <= a[2] && a[1] <= b[3] && b[1] <= a[3]
}

/// PDF text strings are UTF-16BE (with a `\xFE\xFF` BOM) or PDFDocEncoding;
/// `/ActualText` values use the same rule as `/Info` dictionary strings.
fn decode_pdf_text_string(bytes: &[u8]) -> Vec<u32> {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        bytes[2..]
            .chunks(2)
            .map(|c| if c.len() == 2 { ((c[0] as u32) << 8) | c[1] as u32 } else { c[0] as u32 })
            .collect()
    } else {
        bytes.iter().map(|&b| b as u32).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_is_derived_from_ctm_angle() {
        assert_eq!(normalize_rotation(&Matrix::IDENTITY), 0);
        assert_eq!(normalize_rotation(&Matrix::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0)), 1);
    }

    #[test]
    fn boxes_overlap_detects_disjoint_rects() {
        assert!(!boxes_overlap([0.0, 0.0, 1.0, 1.0], [2.0, 2.0, 3.0, 3.0]));
        assert!(boxes_overlap([0.0, 0.0, 2.0, 2.0], [1.0, 1.0, 3.0, 3.0]));
    }

    #[test]
    fn pdf_text_string_decodes_utf16be_bom() {
        let bytes = [0xFE, 0xFF, 0x00, 0x41, 0x00, 0x42];
        assert_eq!(decode_pdf_text_string(&bytes), vec![0x41, 0x42]);
    }

    #[test]
    fn page_rotation_ctm_is_identity_for_an_upright_page() {
        let mb = [0.0, 0.0, 612.0, 792.0];
        assert_eq!(page_rotation_ctm(0, mb), Matrix::IDENTITY);
        assert_eq!(page_rotation_ctm(360, mb), Matrix::IDENTITY);
    }

    #[test]
    fn page_rotation_ctm_turns_land_in_four_distinct_buckets() {
        let mb = [0.0, 0.0, 612.0, 792.0];
        let buckets: Vec<u8> =
            [0, 90, 180, 270].iter().map(|&rot| normalize_rotation(&page_rotation_ctm(rot, mb))).collect();
        let mut sorted = buckets.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3], "each quarter turn must land in its own rotate_bbox bucket: {buckets:?}");
    }

    #[test]
    fn page_rotation_ctm_is_a_rigid_motion_not_a_reflection() {
        let mb = [0.0, 0.0, 612.0, 792.0];
        for rot in [90, 180, 270] {
            let m = page_rotation_ctm(rot, mb);
            let [a, b, c, d, _, _] = m.0;
            let det = a * d - b * c;
            assert!((det - 1.0).abs() < 1e-9, "rotate {rot} must preserve orientation, got det {det}");
        }
    }
}
