//! Graphics state (spec.md §4.8, component C8).
//!
//! The content-stream interpreter's `q`/`Q` stack: current transformation
//! matrix, text state (`Tc`/`Tw`/`Tz`/`TL`/`Tf`/`Tr`/`Ts`), color, and the
//! handful of path/line-style fields kept only because they're cheap to
//! carry and a reader would expect them next to everything else graphics
//! operators touch.

use crate::font::Font;
use std::rc::Rc;

/// A PDF transformation matrix `[a b c d e f]`, applied as
/// `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix(pub [f64; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Matrix([a, b, c, d, e, f])
    }

    /// `self` concatenated onto `other` as PDF's `cm` does: the new CTM is
    /// `other * self` in row-vector convention (operand matrix applied
    /// first, then the existing CTM).
    pub fn concat(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Length of the image of a unit vector along x, used to turn glyph
    /// advances (in unscaled text space) into device-space distances.
    pub fn x_scale(&self) -> f64 {
        (self.0[0] * self.0[0] + self.0[1] * self.0[1]).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorSpaceKind {
    DeviceGray,
    DeviceRGB,
    DeviceCMYK,
    /// Separation/DeviceN/Indexed/ICCBased and anything else: text color is
    /// cosmetic for extraction purposes, so these are approximated as gray
    /// from the first component.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextRenderMode(pub i32);

impl TextRenderMode {
    pub fn is_invisible(&self) -> bool {
        self.0 == 3
    }

    pub fn adds_to_clip(&self) -> bool {
        self.0 >= 4
    }
}

#[derive(Clone)]
pub struct GraphicsState {
    pub ctm: Matrix,
    pub clip_bbox: Option<[f64; 4]>,

    pub char_spacing: f64,
    pub word_spacing: f64,
    pub horiz_scale: f64,
    pub leading: f64,
    pub font: Option<Rc<Font>>,
    pub font_size: f64,
    pub render_mode: TextRenderMode,
    pub rise: f64,

    pub fill_space: ColorSpaceKind,
    pub stroke_space: ColorSpaceKind,
    pub fill_color: [f64; 3],
    pub stroke_color: [f64; 3],

    pub line_width: f64,
    pub fill_alpha: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        GraphicsState {
            ctm: Matrix::IDENTITY,
            clip_bbox: None,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horiz_scale: 1.0,
            leading: 0.0,
            font: None,
            font_size: 0.0,
            render_mode: TextRenderMode(0),
            rise: 0.0,
            fill_space: ColorSpaceKind::DeviceGray,
            stroke_space: ColorSpaceKind::DeviceGray,
            fill_color: [0.0, 0.0, 0.0],
            stroke_color: [0.0, 0.0, 0.0],
            line_width: 1.0,
            fill_alpha: 1.0,
        }
    }
}

/// Converts raw `SC`/`SCN`/`sc`/`scn` operands to an RGB triple, given the
/// current color space. Unknown spaces (Separation/DeviceN/ICCBased/
/// Indexed) fall back to treating the first operand as a gray tint,
/// matching `TextOutputDev`'s stance that exact color is not worth chasing
/// down a tint-transform function for.
pub fn color_to_rgb(space: ColorSpaceKind, operands: &[f64]) -> [f64; 3] {
    match space {
        ColorSpaceKind::DeviceGray => {
            let g = operands.first().copied().unwrap_or(0.0);
            [g, g, g]
        }
        ColorSpaceKind::DeviceRGB => {
            if operands.len() >= 3 {
                [operands[0], operands[1], operands[2]]
            } else {
                [0.0, 0.0, 0.0]
            }
        }
        ColorSpaceKind::DeviceCMYK => {
            if operands.len() >= 4 {
                cmyk_to_rgb(operands[0], operands[1], operands[2], operands[3])
            } else {
                [0.0, 0.0, 0.0]
            }
        }
        ColorSpaceKind::Other => {
            let g = 1.0 - operands.first().copied().unwrap_or(0.0);
            [g, g, g]
        }
    }
}

fn cmyk_to_rgb(c: f64, m: f64, y: f64, k: f64) -> [f64; 3] {
    [
        (1.0 - c) * (1.0 - k),
        (1.0 - m) * (1.0 - k),
        (1.0 - y) * (1.0 - k),
    ]
}

pub fn color_space_from_name(name: &str) -> ColorSpaceKind {
    match name {
        "DeviceGray" | "CalGray" | "G" => ColorSpaceKind::DeviceGray,
        "DeviceRGB" | "CalRGB" | "RGB" => ColorSpaceKind::DeviceRGB,
        "DeviceCMYK" | "CMYK" => ColorSpaceKind::DeviceCMYK,
        _ => ColorSpaceKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_concat_matches_cm_semantics() {
        let ctm = Matrix::IDENTITY;
        let scale = Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let translate = Matrix::new(1.0, 0.0, 0.0, 1.0, 10.0, 20.0);
        let new_ctm = scale.concat(&ctm);
        assert_eq!(new_ctm.apply(1.0, 1.0), (2.0, 2.0));
        let new_ctm2 = translate.concat(&new_ctm);
        assert_eq!(new_ctm2.apply(1.0, 1.0), (22.0, 42.0));
    }

    #[test]
    fn gray_and_cmyk_convert_to_rgb() {
        assert_eq!(color_to_rgb(ColorSpaceKind::DeviceGray, &[0.5]), [0.5, 0.5, 0.5]);
        assert_eq!(color_to_rgb(ColorSpaceKind::DeviceCMYK, &[0.0, 0.0, 0.0, 1.0]), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn render_mode_flags() {
        assert!(TextRenderMode(3).is_invisible());
        assert!(TextRenderMode(7).adds_to_clip());
        assert!(!TextRenderMode(0).adds_to_clip());
    }
}
