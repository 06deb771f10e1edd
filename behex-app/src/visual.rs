use std::sync::Arc;

use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use behex_core::Result;
use tiny_skia::{
    FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, PremultipliedColorU8,
    Rect, Transform,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrowDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ArrowDirection {
    fn angle(self) -> f32 {
        match self {
            ArrowDirection::Right => 0.0,
            ArrowDirection::Down => 90.0,
            ArrowDirection::Left => 180.0,
            ArrowDirection::Up => 270.0,
        }
    }
}

#[derive(Clone)]
pub enum VisualKind {
    Circle { radius: f32 },
    Rect { width: f32, height: f32 },
    Arrow { direction: ArrowDirection, size: f32 },
    Cross { size: f32, thickness: f32 },
    /// Pre-rasterized content: rendered text or a loaded image.
    Bitmap(Arc<Pixmap>),
}

/// A drawable stimulus, placed relative to the screen center.
#[derive(Clone)]
pub struct Visual {
    pub kind: VisualKind,
    pub color: [u8; 4],
    /// Offset from the screen center, in pixels.
    pub offset: (f32, f32),
}

impl Visual {
    pub fn circle(radius: f32, color: [u8; 4]) -> Self {
        Visual { kind: VisualKind::Circle { radius }, color, offset: (0.0, 0.0) }
    }

    pub fn rect(width: f32, height: f32, color: [u8; 4]) -> Self {
        Visual {
            kind: VisualKind::Rect { width, height },
            color,
            offset: (0.0, 0.0),
        }
    }

    pub fn arrow(direction: ArrowDirection, size: f32, color: [u8; 4]) -> Self {
        Visual {
            kind: VisualKind::Arrow { direction, size },
            color,
            offset: (0.0, 0.0),
        }
    }

    pub fn cross(size: f32, thickness: f32, color: [u8; 4]) -> Self {
        Visual {
            kind: VisualKind::Cross { size, thickness },
            color,
            offset: (0.0, 0.0),
        }
    }

    pub fn bitmap(pixmap: Pixmap) -> Self {
        Visual {
            kind: VisualKind::Bitmap(Arc::new(pixmap)),
            color: [255, 255, 255, 255],
            offset: (0.0, 0.0),
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.offset = (x, y);
        self
    }

    /// Rasterize onto the back canvas.
    pub fn rasterize(&self, canvas: &mut Pixmap) -> Result<()> {
        let cx = canvas.width() as f32 / 2.0 + self.offset.0;
        let cy = canvas.height() as f32 / 2.0 + self.offset.1;
        let mut paint = Paint::default();
        paint.anti_alias = true;
        let [r, g, b, a] = self.color;
        paint.set_color_rgba8(r, g, b, a);

        match &self.kind {
            VisualKind::Circle { radius } => {
                let mut pb = PathBuilder::new();
                pb.push_circle(cx, cy, *radius);
                let path = pb.finish().ok_or_else(|| {
                    behex_core::Error::display("degenerate circle path")
                })?;
                canvas.fill_path(
                    &path,
                    &paint,
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }
            VisualKind::Rect { width, height } => {
                let rect = Rect::from_xywh(
                    cx - width / 2.0,
                    cy - height / 2.0,
                    *width,
                    *height,
                )
                .ok_or_else(|| {
                    behex_core::Error::display("degenerate rectangle")
                })?;
                canvas.fill_rect(rect, &paint, Transform::identity(), None);
            }
            VisualKind::Arrow { direction, size } => {
                let s = *size;
                let mut pb = PathBuilder::new();
                // right-pointing arrow; rotation handles the rest
                pb.move_to(cx - s, cy - s * 0.15);
                pb.line_to(cx + s * 0.2, cy - s * 0.15);
                pb.line_to(cx + s * 0.2, cy - s * 0.45);
                pb.line_to(cx + s, cy);
                pb.line_to(cx + s * 0.2, cy + s * 0.45);
                pb.line_to(cx + s * 0.2, cy + s * 0.15);
                pb.line_to(cx - s, cy + s * 0.15);
                pb.close();
                let path = pb.finish().ok_or_else(|| {
                    behex_core::Error::display("degenerate arrow path")
                })?;
                let transform =
                    Transform::from_rotate_at(direction.angle(), cx, cy);
                canvas.fill_path(
                    &path,
                    &paint,
                    FillRule::Winding,
                    transform,
                    None,
                );
            }
            VisualKind::Cross { size, thickness } => {
                let horizontal = Rect::from_xywh(
                    cx - size / 2.0,
                    cy - thickness / 2.0,
                    *size,
                    *thickness,
                );
                let vertical = Rect::from_xywh(
                    cx - thickness / 2.0,
                    cy - size / 2.0,
                    *thickness,
                    *size,
                );
                for rect in [horizontal, vertical].into_iter().flatten() {
                    canvas.fill_rect(
                        rect,
                        &paint,
                        Transform::identity(),
                        None,
                    );
                }
            }
            VisualKind::Bitmap(pixmap) => {
                let x = (cx - pixmap.width() as f32 / 2.0).round() as i32;
                let y = (cy - pixmap.height() as f32 / 2.0).round() as i32;
                canvas.draw_pixmap(
                    x,
                    y,
                    pixmap.as_ref().as_ref(),
                    &PixmapPaint::default(),
                    Transform::identity(),
                    None,
                );
            }
        }
        Ok(())
    }
}

/// Rasterize multi-line text to a transparent pixmap, lines centered and
/// stacked at 1.3× the glyph size.
pub fn render_text(
    font: &FontVec,
    text: &str,
    size_px: f32,
    color: [u8; 4],
) -> Result<Pixmap> {
    let lines: Vec<Option<Pixmap>> = text
        .lines()
        .map(|line| render_line(font, line.trim_end(), size_px, color))
        .collect();
    let line_height = (size_px * 1.3).ceil() as u32;
    let width = lines
        .iter()
        .flatten()
        .map(Pixmap::width)
        .max()
        .unwrap_or(1)
        .max(1);
    let height = (lines.len() as u32 * line_height).max(1);

    let mut out = Pixmap::new(width, height)
        .ok_or_else(|| behex_core::Error::display("empty text pixmap"))?;
    for (index, line) in lines.iter().enumerate() {
        if let Some(line) = line {
            let x = ((width - line.width()) / 2) as i32;
            let y = (index as u32 * line_height) as i32;
            out.draw_pixmap(
                x,
                y,
                line.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }
    }
    Ok(out)
}

fn render_line(
    font: &FontVec,
    text: &str,
    size_px: f32,
    color: [u8; 4],
) -> Option<Pixmap> {
    if text.trim().is_empty() {
        return None;
    }
    let scale = PxScale::from(size_px);
    let scaled = font.as_scaled(scale);

    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += scaled.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, scaled.ascent()),
        });
        pen_x += scaled.h_advance(id);
    }

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for glyph in &glyphs {
        if let Some(outline) = font.outline_glyph(glyph.clone()) {
            let bounds = outline.px_bounds();
            min_x = min_x.min(bounds.min.x);
            min_y = min_y.min(bounds.min.y);
            max_x = max_x.max(bounds.max.x);
            max_y = max_y.max(bounds.max.y);
        }
    }
    if min_x == f32::INFINITY {
        return None;
    }

    let width = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let height = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pixmap = Pixmap::new(width, height)?;
    let stride = pixmap.width() as usize;
    let pixels = pixmap.pixels_mut();

    for glyph in &glyphs {
        if let Some(outline) = font.outline_glyph(glyph.clone()) {
            let bounds = outline.px_bounds();
            outline.draw(|x, y, coverage| {
                if coverage <= f32::EPSILON {
                    return;
                }
                let px = (x as f32 + bounds.min.x - min_x).floor() as i32;
                let py = (y as f32 + bounds.min.y - min_y).floor() as i32;
                if px < 0 || py < 0 || px >= width as i32 || py >= height as i32
                {
                    return;
                }
                let index = py as usize * stride + px as usize;

                // premultiply by coverage and alpha
                let alpha = (coverage * color[3] as f32 / 255.0).clamp(0.0, 1.0);
                let premul = |channel: u8| (channel as f32 * alpha) as u8;
                let src = PremultipliedColorU8::from_rgba(
                    premul(color[0]),
                    premul(color[1]),
                    premul(color[2]),
                    (alpha * 255.0) as u8,
                );
                if let Some(src) = src {
                    // on glyph overlap, keep the heavier coverage
                    if pixels[index].alpha() < src.alpha() {
                        pixels[index] = src;
                    }
                }
            });
        }
    }
    Some(pixmap)
}
