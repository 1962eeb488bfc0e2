use ab_glyph::{point, Font, FontVec, Glyph, PxScale, ScaleFont};
use anyhow::{anyhow, bail, Result};
use arit_core::{BarScene, Scene};
use arit_timing::Timer;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tiny_skia::{
    Color, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, PremultipliedColorU8, Rect,
    Transform,
};
use tracing::{debug, warn};

const BACKGROUND: [u8; 4] = [0, 0, 0, 255];
const BAR_BACKGROUND: [u8; 4] = [255, 255, 255, 255];
const BAR_FILL: [u8; 4] = [135, 206, 235, 255];
const TEXT: [u8; 4] = [255, 255, 255, 255];

const MESSAGE_PX: f32 = 28.0;
const COUNTDOWN_PX: f32 = 72.0;
/// Target arrow size and gap to the bar, cm.
const ARROW_CM: f64 = 0.8;
const ARROW_GAP_CM: f64 = 0.1;

/// Fonts tried when no font file is configured.
const SYSTEM_FONTS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub fn load_font(path: Option<&Path>) -> Option<FontVec> {
    let candidates: Vec<&Path> = match path {
        Some(p) => vec![p],
        None => SYSTEM_FONTS.iter().map(Path::new).collect(),
    };
    for candidate in candidates {
        match std::fs::read(candidate).map(FontVec::try_from_vec) {
            Ok(Ok(font)) => {
                debug!(path = %candidate.display(), "font loaded");
                return Some(font);
            }
            Ok(Err(e)) => warn!(path = %candidate.display(), error = %e, "invalid font file"),
            Err(_) if path.is_none() => {}
            Err(e) => warn!(path = %candidate.display(), error = %e, "font not readable"),
        }
    }
    warn!("no font available, text will not be drawn");
    None
}

struct TextCache {
    font: FontVec,
    map: HashMap<(String, u32), Arc<Pixmap>>,
}

impl TextCache {
    fn get_or_render(&mut self, text: &str, size_px: f32) -> Option<Arc<Pixmap>> {
        let key = (text.to_string(), size_px.to_bits());
        if let Some(p) = self.map.get(&key) {
            return Some(Arc::clone(p));
        }
        let pm = Arc::new(render_text_pixmap(text, size_px, &self.font, TEXT)?);
        self.map.insert(key, Arc::clone(&pm));
        Some(pm)
    }
}

/// Rasterises `text` with each line centred. `None` for text with no visible glyphs.
pub fn render_text_pixmap(
    text: &str,
    font_size: f32,
    font: &FontVec,
    color: [u8; 4],
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);
    let line_height = sf.height() + sf.line_gap();

    // 1) Lay out each line from x = 0, then centre lines on the widest
    let mut lines: Vec<(Vec<Glyph>, f32)> = Vec::new();
    for (row, line) in text.lines().enumerate() {
        let baseline = sf.ascent() + row as f32 * line_height;
        let mut pen_x = 0.0f32;
        let mut glyphs = Vec::<Glyph>::new();
        for ch in line.chars() {
            let id = font.glyph_id(ch);
            if let Some(prev) = glyphs.last() {
                pen_x += sf.kern(prev.id, id);
            }
            glyphs.push(Glyph {
                id,
                scale,
                position: point(pen_x, baseline),
            });
            pen_x += sf.h_advance(id);
        }
        lines.push((glyphs, pen_x));
    }
    let widest = lines.iter().map(|(_, w)| *w).fold(0.0f32, f32::max);
    let glyphs: Vec<Glyph> = lines
        .into_iter()
        .flat_map(|(glyphs, width)| {
            let shift = (widest - width) * 0.5;
            glyphs.into_iter().map(move |mut g| {
                g.position.x += shift;
                g
            })
        })
        .collect();

    // 2) Union pixel bounds from outlined glyphs
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    if outlines.is_empty() {
        return None;
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();

    // 3) Rasterise with premultiplied over-blending
    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            let a = (cov * color[3] as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a * 255.0) as u8;
            let inv = 1.0 - a;
            let bg = dst[i];
            let blend = |s: u8, d: u8| ((s as f32 * a) as u8).saturating_add((d as f32 * inv) as u8);
            let r = blend(color[0], bg.red());
            let g = blend(color[1], bg.green());
            let bl = blend(color[2], bg.blue());
            let al = sa.saturating_add((bg.alpha() as f32 * inv) as u8);
            // from_rgba rejects a channel above alpha.
            if let Some(px) = PremultipliedColorU8::from_rgba(r.min(al), g.min(al), bl.min(al), al) {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}

#[derive(Debug, Clone, Copy)]
pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
}

/// Software renderer for the bar task. Draws a [`Scene`] into an RGBA frame.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),
    pixels_per_cm: f64,

    text_cache: Option<TextCache>,
    canvas: Pixmap,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32, pixels_per_cm: f64, font: Option<FontVec>) -> Result<Self> {
        let canvas = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| anyhow!("cannot allocate {width}x{height} canvas"))?;
        Ok(SkiaRenderer {
            width: canvas.width(),
            height: canvas.height(),
            center: (width as f32 / 2.0, height as f32 / 2.0),
            pixels_per_cm,
            text_cache: font.map(|font| TextCache {
                font,
                map: HashMap::new(),
            }),
            canvas,
        })
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        self.canvas = Pixmap::new(new_width.max(1), new_height.max(1))
            .ok_or_else(|| anyhow!("cannot allocate {new_width}x{new_height} canvas"))?;
        self.width = self.canvas.width();
        self.height = self.canvas.height();
        self.center = (self.width as f32 / 2.0, self.height as f32 / 2.0);
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn render_frame<T: Timer>(
        &mut self,
        scene: &Scene,
        frame_buffer: &mut [u8],
        timer: &T,
    ) -> Result<FrameStats> {
        if frame_buffer.len() != self.canvas.data().len() {
            bail!(
                "frame buffer is {} bytes, canvas needs {}",
                frame_buffer.len(),
                self.canvas.data().len()
            );
        }

        let t_clear = {
            let t = timer.now();
            self.canvas.fill(rgba(BACKGROUND));
            timer.elapsed(t)
        };

        let t_draw = {
            let t = timer.now();
            self.draw_scene(scene);
            timer.elapsed(t)
        };

        let t_copy = {
            let t = timer.now();
            frame_buffer.copy_from_slice(self.canvas.data());
            timer.elapsed(t)
        };

        Ok(FrameStats {
            clear: t_clear,
            draw: t_draw,
            copy: t_copy,
            total: t_clear + t_draw + t_copy,
        })
    }

    fn draw_scene(&mut self, scene: &Scene) {
        let mut message_y = self.center.1;
        if let Some(bar) = &scene.bar {
            let top = self.draw_bar(bar);
            message_y = top * 0.5;
        }
        if let Some(text) = &scene.message {
            self.blit_text(text, MESSAGE_PX, (self.center.0, message_y));
        }
        if let Some(n) = scene.countdown {
            self.blit_text(&n.to_string(), COUNTDOWN_PX, (self.center.0, message_y));
        }
    }

    /// Draws bar, fill and target arrows; returns the bar's top edge in pixels.
    fn draw_bar(&mut self, bar: &BarScene) -> f32 {
        let pixels_per_cm = self.pixels_per_cm;
        let px = |cm: f64| (cm * pixels_per_cm) as f32;
        let bar_w = px(bar.bar_width_cm);
        let bar_h = px(bar.bar_height_cm);
        let left = self.center.0 - bar_w * 0.5;
        let top = self.center.1 - bar_h * 0.5;
        let bottom = top + bar_h;

        self.fill_rect(left, top, bar_w, bar_h, BAR_BACKGROUND);
        let fill = px(bar.fill_cm.clamp(0.0, bar.bar_height_cm));
        self.fill_rect(left, bottom - fill, bar_w, fill, BAR_FILL);

        let target_y = bottom - px(bar.target_cm);
        let size = px(ARROW_CM);
        let gap = px(ARROW_GAP_CM);
        self.fill_triangle(
            (left - gap, target_y),
            (left - gap - size, target_y - size * 0.5),
            (left - gap - size, target_y + size * 0.5),
            bar.arrow_color,
        );
        let right = left + bar_w;
        self.fill_triangle(
            (right + gap, target_y),
            (right + gap + size, target_y - size * 0.5),
            (right + gap + size, target_y + size * 0.5),
            bar.arrow_color,
        );
        top
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: [u8; 4]) {
        let Some(rect) = Rect::from_xywh(x, y, w, h) else {
            return;
        };
        let mut paint = Paint::default();
        paint.anti_alias = false;
        paint.set_color(rgba(color));
        self.canvas.fill_rect(rect, &paint, Transform::identity(), None);
    }

    fn fill_triangle(&mut self, a: (f32, f32), b: (f32, f32), c: (f32, f32), color: [u8; 4]) {
        let mut pb = PathBuilder::new();
        pb.move_to(a.0, a.1);
        pb.line_to(b.0, b.1);
        pb.line_to(c.0, c.1);
        pb.close();
        let Some(path) = pb.finish() else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(rgba(color));
        self.canvas
            .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    fn blit_text(&mut self, text: &str, size_px: f32, pos: (f32, f32)) {
        let Some(cache) = self.text_cache.as_mut() else {
            return;
        };
        let Some(pm) = cache.get_or_render(text, size_px) else {
            return;
        };
        let x = (pos.0 - pm.width() as f32 * 0.5) as i32;
        let y = (pos.1 - pm.height() as f32 * 0.5).max(0.0) as i32;
        self.canvas.draw_pixmap(
            x,
            y,
            Pixmap::as_ref(&pm),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
}

fn rgba(c: [u8; 4]) -> Color {
    Color::from_rgba8(c[0], c[1], c[2], c[3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use arit_timing::ManualTimer;

    const W: u32 = 400;
    const H: u32 = 800;
    const PPCM: f64 = 37.8;

    fn pixel(frame: &[u8], x: u32, y: u32) -> [u8; 4] {
        let i = ((y * W + x) * 4) as usize;
        [frame[i], frame[i + 1], frame[i + 2], frame[i + 3]]
    }

    fn bar(fill_cm: f64) -> Scene {
        Scene {
            message: None,
            bar: Some(BarScene {
                bar_height_cm: 15.0,
                bar_width_cm: 3.0,
                fill_cm,
                target_cm: 12.0,
                arrow_color: [0, 128, 0, 255],
            }),
            countdown: None,
        }
    }

    #[test]
    fn bar_fills_from_the_bottom() {
        let mut r = SkiaRenderer::new(W, H, PPCM, None).unwrap();
        let mut frame = vec![0u8; (W * H * 4) as usize];
        r.render_frame(&bar(7.5), &mut frame, &ManualTimer::new())
            .unwrap();

        assert_eq!(pixel(&frame, 10, 10), BACKGROUND);
        // Bar spans y 116.5..683.5, filled below y 400.
        assert_eq!(pixel(&frame, 200, 600), BAR_FILL);
        assert_eq!(pixel(&frame, 200, 200), BAR_BACKGROUND);
    }

    #[test]
    fn target_arrows_use_scene_colour() {
        let mut r = SkiaRenderer::new(W, H, PPCM, None).unwrap();
        let mut frame = vec![0u8; (W * H * 4) as usize];
        r.render_frame(&bar(0.0), &mut frame, &ManualTimer::new())
            .unwrap();
        // Target at 12 cm: y = 683.5 - 453.6; left arrow tip 3.8 px left of x 143.3.
        assert_eq!(pixel(&frame, 118, 230), [0, 128, 0, 255]);
        assert_eq!(pixel(&frame, 282, 230), [0, 128, 0, 255]);
    }

    #[test]
    fn rejects_mismatched_frame_buffer() {
        let mut r = SkiaRenderer::new(W, H, PPCM, None).unwrap();
        let mut frame = vec![0u8; 16];
        assert!(r
            .render_frame(&Scene::default(), &mut frame, &ManualTimer::new())
            .is_err());
    }

    #[test]
    fn resize_changes_frame_size() {
        let mut r = SkiaRenderer::new(W, H, PPCM, None).unwrap();
        r.resize(64, 32).unwrap();
        assert_eq!(r.size(), (64, 32));
        let mut frame = vec![0u8; 64 * 32 * 4];
        r.render_frame(&Scene::message("hi"), &mut frame, &ManualTimer::new())
            .unwrap();
    }
}
