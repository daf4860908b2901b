use std::path::{Path, PathBuf};

use anyhow::Context as _;
use rand::Rng;

use crate::{
    color::{ColorSlot, ColorState},
    error::{GifweaveError, GifweaveResult},
    frame::RawFrame,
    layout::{CaptionLayout, Placement, TextMetrics, layout_caption},
};

/// The font/metrics boundary: measure a line of text and draw it onto a
/// frame at a baseline position.
pub trait FontRaster {
    fn measure(&self, text: &str, size: f32) -> TextMetrics;
    fn rasterize(&self, frame: &mut RawFrame, text: &str, x: i32, y: i32, size: f32, rgb: [u8; 3]);
}

pub struct FontdueRaster {
    font: fontdue::Font,
}

impl FontdueRaster {
    pub fn from_bytes(bytes: &[u8]) -> GifweaveResult<Self> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| GifweaveError::config(format!("failed to parse font: {e}")))?;
        Ok(Self { font })
    }

    pub fn from_path(path: &Path) -> GifweaveResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read font file '{}'", path.display()))?;
        Self::from_bytes(&bytes)
    }
}

impl FontRaster for FontdueRaster {
    fn measure(&self, text: &str, size: f32) -> TextMetrics {
        let mut width = 0.0f32;
        let mut ascent = 0i32;
        let mut descent = 0i32;

        for ch in text.chars() {
            let m = self.font.metrics(ch, size);
            ascent = ascent.max(m.height as i32 + m.ymin);
            descent = descent.max(-m.ymin);
            width += m.advance_width;
        }

        TextMetrics {
            width: width.round() as i32,
            height: ascent,
            baseline: descent.max(0),
        }
    }

    fn rasterize(&self, frame: &mut RawFrame, text: &str, x: i32, y: i32, size: f32, rgb: [u8; 3]) {
        let mut cursor = x as f32;
        for ch in text.chars() {
            let (m, bitmap) = self.font.rasterize(ch, size);
            let gx0 = cursor.round() as i32 + m.xmin;
            let gy0 = y - (m.height as i32 + m.ymin);

            for by in 0..m.height {
                for bx in 0..m.width {
                    let coverage = bitmap[by * m.width + bx];
                    if coverage == 0 {
                        continue;
                    }
                    let px = gx0 + bx as i32;
                    let py = gy0 + by as i32;
                    if px < 0 || py < 0 || px >= frame.width as i32 || py >= frame.height as i32 {
                        continue;
                    }
                    let dst = frame.pixel(px as u32, py as u32);
                    frame.set_pixel(px as u32, py as u32, blend(dst, rgb, coverage));
                }
            }
            cursor += m.advance_width;
        }
    }
}

fn blend(dst: [u8; 3], src: [u8; 3], coverage: u8) -> [u8; 3] {
    let cov = u16::from(coverage);
    let inv = 255 - cov;
    [
        ((u16::from(src[0]) * cov + u16::from(dst[0]) * inv + 127) / 255) as u8,
        ((u16::from(src[1]) * cov + u16::from(dst[1]) * inv + 127) / 255) as u8,
        ((u16::from(src[2]) * cov + u16::from(dst[2]) * inv + 127) / 255) as u8,
    ]
}

/// Which of the four outline directions to draw.
#[derive(Clone, Copy, Debug)]
pub struct OutlineSides {
    pub left: bool,
    pub right: bool,
    pub top: bool,
    pub bottom: bool,
}

impl Default for OutlineSides {
    fn default() -> Self {
        Self {
            left: true,
            right: true,
            top: true,
            bottom: true,
        }
    }
}

pub struct CaptionStyle<'a> {
    pub font: &'a dyn FontRaster,
    pub fontsize: f32,
    pub placement: Placement,
    /// Background rectangle opacity, 0..1.
    pub opacity: f32,
    pub outline_width: i32,
    pub outline_sides: OutlineSides,
}

/// Draw one caption onto a frame: background rectangle first, then the
/// outline re-draws, then the glyphs. `colors` carries the resolved-color
/// state from frame to frame.
pub fn draw_caption<R: Rng>(
    frame: &mut RawFrame,
    lines: &[String],
    style: &CaptionStyle<'_>,
    colors: &mut ColorState,
    rng: &mut R,
) {
    let metrics: Vec<TextMetrics> = lines
        .iter()
        .map(|l| style.font.measure(l, style.fontsize))
        .collect();
    let layout = layout_caption(frame.width, frame.height, &metrics, &style.placement);

    let font_rgb = colors
        .resolve(ColorSlot::Font, rng)
        .unwrap_or([255, 255, 255]);

    if let Some(bg_rgb) = colors.resolve(ColorSlot::Background, rng) {
        draw_background(frame, &layout, style, bg_rgb);
    }

    if let Some(outline_rgb) = colors.resolve(ColorSlot::Outline, rng) {
        let ow = style.outline_width.max(1);
        let sides = style.outline_sides;
        let offsets = [
            (sides.left, (-ow, 0)),
            (sides.right, (ow, 0)),
            (sides.top, (0, -ow)),
            (sides.bottom, (0, ow)),
        ];
        for (line, placed) in lines.iter().zip(&layout.lines) {
            for (enabled, (dx, dy)) in offsets {
                if enabled {
                    style.font.rasterize(
                        frame,
                        line,
                        placed.x + dx,
                        placed.y + dy,
                        style.fontsize,
                        outline_rgb,
                    );
                }
            }
        }
    }

    for (line, placed) in lines.iter().zip(&layout.lines) {
        style
            .font
            .rasterize(frame, line, placed.x, placed.y, style.fontsize, font_rgb);
    }
}

fn draw_background(
    frame: &mut RawFrame,
    layout: &CaptionLayout,
    style: &CaptionStyle<'_>,
    rgb: [u8; 3],
) {
    if layout.lines.is_empty() {
        return;
    }
    let padding = style.placement.padding;
    let baseline_ext = if style.placement.descender {
        layout.lines.last().map_or(0, |l| l.baseline)
    } else {
        0
    };

    let x0 = (layout.min_rect_x - padding).max(0);
    let y0 = (layout.min_rect_y - padding).max(0);
    let x1 = (layout.max_rect_x + padding).min(frame.width as i32);
    let y1 = (layout.max_rect_y + padding + baseline_ext).min(frame.height as i32);

    let op = style.opacity.clamp(0.0, 1.0);
    let cov = (op * 255.0).round() as u8;
    for y in y0..y1 {
        for x in x0..x1 {
            let dst = frame.pixel(x as u32, y as u32);
            frame.set_pixel(x as u32, y as u32, blend(dst, rgb, cov));
        }
    }
}

/// Best-effort lookup of a usable default TTF when no font is configured.
pub fn find_system_font() -> Option<PathBuf> {
    const CANDIDATES: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ];
    CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}
