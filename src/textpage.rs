//! Text page accumulator (spec.md §4.9, component C9).
//!
//! Collects the `TextChar`s the content-stream interpreter (C8) emits for
//! one page: filters out tiny characters planted by some generators as
//! invisible padding, collapses fake-bold glyph doubling, substitutes
//! `/ActualText` marked-content spans for their literal glyphs, and tracks
//! underline/link-shaped filled rectangles for [`crate::layout`] to attach
//! to the words they overlap.
//!
//! Grounded on `original_source/xpdf/TextPage.hh`'s `addChar`,
//! `doAddActualTextChar`, `addUnderline`/`addLink`, and the tiny-char
//! counter (`nTinyChars`) fields.

use crate::font::Font;
use std::rc::Rc;

/// Minimum font size, in text-space points, below which a character is
/// treated as generator padding rather than real text.
const TINY_CHAR_SIZE: f64 = 3.0;

/// Once this many tiny characters have been seen on a page, the filter is
/// disabled — some documents render entirely in sub-3pt type and the
/// filter would otherwise erase the whole page.
const TINY_CHAR_BUDGET: usize = 50_000;

/// Two same-Unicode glyphs are considered a fake-bold doubling when their
/// horizontal centers are within this fraction of the font size.
const FAKE_BOLD_CENTER_FRACTION: (f64, f64) = (0.1, 0.2);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Bbox {
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
    pub fn union(&self, other: &Bbox) -> Bbox {
        Bbox {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
        }
    }
}

/// One positioned, Unicode-tagged glyph, the unit the layout analyzer
/// (C10) groups into columns/lines/words.
#[derive(Clone)]
pub struct TextChar {
    pub unicode: u32,
    pub char_pos: usize,
    pub bbox: Bbox,
    pub font: Rc<Font>,
    pub font_size: f64,
    pub rgb: [f64; 3],
    /// 0/1/2/3 quarter-turns, derived from the text rendering matrix.
    pub rot: u8,
    pub clipped: bool,
    pub invisible: bool,
}

/// Raw character event as the content interpreter produces it, before the
/// accumulator's filtering passes.
pub struct RawChar {
    pub unicode: u32,
    pub char_pos: usize,
    pub bbox: Bbox,
    pub font: Rc<Font>,
    pub font_size: f64,
    pub rgb: [f64; 3],
    pub rot: u8,
    pub clipped: bool,
    pub invisible: bool,
}

#[derive(Clone)]
pub struct Underline {
    pub bbox: Bbox,
}

#[derive(Clone)]
pub struct Link {
    pub bbox: Bbox,
    pub uri: String,
}

struct ActualTextCapture {
    unicode: Vec<u32>,
    bbox: Option<Bbox>,
    char_pos: usize,
    font: Option<Rc<Font>>,
    font_size: f64,
    rgb: [f64; 3],
    rot: u8,
}

pub struct TextPageAccumulator {
    chars: Vec<TextChar>,
    underlines: Vec<Underline>,
    links: Vec<Link>,
    tiny_count: usize,
    tiny_filter_disabled: bool,
    actual_text_stack: Vec<ActualTextCapture>,
}

pub struct TextPageChars {
    pub chars: Vec<TextChar>,
    pub underlines: Vec<Underline>,
    pub links: Vec<Link>,
}

impl Default for TextPageAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl TextPageAccumulator {
    pub fn new() -> Self {
        TextPageAccumulator {
            chars: Vec::new(),
            underlines: Vec::new(),
            links: Vec::new(),
            tiny_count: 0,
            tiny_filter_disabled: false,
            actual_text_stack: Vec::new(),
        }
    }

    pub fn add_char(&mut self, raw: RawChar) {
        if !self.tiny_filter_disabled && raw.font_size.abs() < TINY_CHAR_SIZE {
            self.tiny_count += 1;
            if self.tiny_count > TINY_CHAR_BUDGET {
                self.tiny_filter_disabled = true;
            } else {
                return;
            }
        }

        if let Some(capture) = self.actual_text_stack.last_mut() {
            capture.bbox = Some(match capture.bbox {
                Some(b) => b.union(&raw.bbox),
                None => raw.bbox,
            });
            if capture.font.is_none() {
                capture.font = Some(raw.font.clone());
                capture.font_size = raw.font_size;
                capture.rgb = raw.rgb;
                capture.rot = raw.rot;
            }
            return;
        }

        self.chars.push(TextChar {
            unicode: raw.unicode,
            char_pos: raw.char_pos,
            bbox: raw.bbox,
            font: raw.font,
            font_size: raw.font_size,
            rgb: raw.rgb,
            rot: raw.rot,
            clipped: raw.clipped,
            invisible: raw.invisible,
        });
    }

    /// Begins an `/ActualText` marked-content span: subsequent `add_char`
    /// calls are captured (not emitted) until the matching `end_actual_text`.
    pub fn begin_actual_text(&mut self, unicode: Vec<u32>, char_pos: usize) {
        self.actual_text_stack.push(ActualTextCapture {
            unicode,
            bbox: None,
            char_pos,
            font: None,
            font_size: 0.0,
            rgb: [0.0, 0.0, 0.0],
            rot: 0,
        });
    }

    /// Ends the innermost `/ActualText` span, emitting its substitute text
    /// at the geometric midpoint of every glyph it suppressed.
    pub fn end_actual_text(&mut self) {
        let Some(capture) = self.actual_text_stack.pop() else {
            return;
        };
        let Some(bbox) = capture.bbox else {
            return; // span had no glyphs: nothing to substitute
        };
        let Some(font) = capture.font else {
            return;
        };
        // A nested span (rare) just widens the outer span's captured bbox;
        // only the outermost span actually emits substitute characters.
        if let Some(outer) = self.actual_text_stack.last_mut() {
            outer.bbox = Some(match outer.bbox {
                Some(b) => b.union(&bbox),
                None => bbox,
            });
            return;
        }

        let mid = Bbox {
            xmin: (bbox.xmin + bbox.xmax) / 2.0,
            ymin: bbox.ymin,
            xmax: (bbox.xmin + bbox.xmax) / 2.0,
            ymax: bbox.ymax,
        };
        for &cp in &capture.unicode {
            self.chars.push(TextChar {
                unicode: cp,
                char_pos: capture.char_pos,
                bbox: mid,
                font: font.clone(),
                font_size: capture.font_size,
                rgb: capture.rgb,
                rot: capture.rot,
                clipped: false,
                invisible: false,
            });
        }
    }

    pub fn add_underline(&mut self, bbox: Bbox) {
        self.underlines.push(Underline { bbox });
    }

    pub fn add_link(&mut self, bbox: Bbox, uri: String) {
        self.links.push(Link { bbox, uri });
    }

    pub fn finish(mut self) -> TextPageChars {
        dedup_fake_bold(&mut self.chars);
        TextPageChars {
            chars: self.chars,
            underlines: self.underlines,
            links: self.links,
        }
    }
}

/// Removes the second glyph of a same-Unicode pair drawn on top of each
/// other to fake a bold weight without a bold font program — a common
/// trick in PDF generators that lack a real bold variant.
fn dedup_fake_bold(chars: &mut Vec<TextChar>) {
    let mut drop = vec![false; chars.len()];
    for i in 0..chars.len() {
        if drop[i] {
            continue;
        }
        for j in (i + 1)..chars.len() {
            if drop[j] || chars[j].unicode != chars[i].unicode {
                continue;
            }
            if chars[j].rot != chars[i].rot {
                continue;
            }
            let size = chars[i].font_size.max(chars[j].font_size).max(1.0);
            let ci = (chars[i].bbox.xmin + chars[i].bbox.xmax) / 2.0;
            let cj = (chars[j].bbox.xmin + chars[j].bbox.xmax) / 2.0;
            let cyi = (chars[i].bbox.ymin + chars[i].bbox.ymax) / 2.0;
            let cyj = (chars[j].bbox.ymin + chars[j].bbox.ymax) / 2.0;
            let dx = (ci - cj).abs();
            let dy = (cyi - cyj).abs();
            if dx <= FAKE_BOLD_CENTER_FRACTION.1 * size && dy <= FAKE_BOLD_CENTER_FRACTION.0 * size {
                drop[j] = true;
            }
        }
    }
    let mut i = 0;
    chars.retain(|_| {
        let keep = !drop[i];
        i += 1;
        keep
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(xmin: f64, xmax: f64) -> Bbox {
        Bbox { xmin, ymin: 0.0, xmax, ymax: 10.0 }
    }

    #[test]
    fn bbox_union_covers_both_rects() {
        let a = bbox(0.0, 5.0);
        let b = bbox(3.0, 8.0);
        let u = a.union(&b);
        assert_eq!(u.xmin, 0.0);
        assert_eq!(u.xmax, 8.0);
    }

    #[test]
    fn tiny_char_budget_disables_filter() {
        let acc = TextPageAccumulator::new();
        assert_eq!(acc.tiny_count, 0);
        assert!(!acc.tiny_filter_disabled);
    }
}
