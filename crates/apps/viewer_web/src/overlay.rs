use foundation::math::Vec2;
use gpu::OverlayFrame;
use scene::labels::LabelStyle;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

/// Transparent 2D canvas stacked over the 3D surface for the hover label.
pub struct LabelCanvas {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    pixel_ratio: f64,
}

impl LabelCanvas {
    pub fn from_canvas(canvas: HtmlCanvasElement) -> Result<Self, JsValue> {
        let ctx = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
            .dyn_into::<CanvasRenderingContext2d>()?;
        Ok(Self {
            canvas,
            ctx,
            pixel_ratio: 1.0,
        })
    }

    pub fn set_size(&mut self, width_px: u32, height_px: u32, pixel_ratio: f64) {
        self.canvas.set_width(width_px);
        self.canvas.set_height(height_px);
        self.pixel_ratio = pixel_ratio;
    }

    /// Clears the canvas and draws at most one label, in CSS pixels.
    pub fn draw(&self, overlay: &OverlayFrame<'_>) {
        let ctx = &self.ctx;
        let pr = self.pixel_ratio;
        let _ = ctx.set_transform(pr, 0.0, 0.0, pr, 0.0, 0.0);
        let (w, h) = overlay.viewport;
        ctx.clear_rect(0.0, 0.0, w, h);

        let Some(label) = overlay.label else {
            return;
        };
        let style = overlay.style;
        let (x, y) = label_origin(label.position, style);

        ctx.set_font(&style.font);
        ctx.set_text_align("left");
        ctx.set_text_baseline("middle");
        // Halo first so the fill stays crisp on top.
        ctx_set_stroke_style(ctx, &css_rgba(style.halo_color));
        ctx.set_line_width(f64::from(style.halo_width_px));
        let _ = ctx.stroke_text(label.text, x, y);
        ctx_set_fill_style(ctx, &css_rgba(style.color));
        let _ = ctx.fill_text(label.text, x, y);
    }
}

fn ctx_set_fill_style(ctx: &CanvasRenderingContext2d, value: &str) {
    let _ = js_sys::Reflect::set(
        ctx.as_ref(),
        &JsValue::from_str("fillStyle"),
        &JsValue::from_str(value),
    );
}

fn ctx_set_stroke_style(ctx: &CanvasRenderingContext2d, value: &str) {
    let _ = js_sys::Reflect::set(
        ctx.as_ref(),
        &JsValue::from_str("strokeStyle"),
        &JsValue::from_str(value),
    );
}

pub fn label_origin(anchor: Vec2, style: &LabelStyle) -> (f64, f64) {
    (
        anchor.x + f64::from(style.offset_px[0]),
        anchor.y + f64::from(style.offset_px[1]),
    )
}

/// `[r, g, b, a]` in 0..=1 to a CSS `rgba()` string.
pub fn css_rgba(color: [f32; 4]) -> String {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "rgba({},{},{},{})",
        channel(color[0]),
        channel(color[1]),
        channel(color[2]),
        (color[3].clamp(0.0, 1.0) * 100.0).round() / 100.0
    )
}
