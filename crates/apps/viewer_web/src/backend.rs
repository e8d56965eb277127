use gpu::{OverlayFrame, RenderBackend, RenderFrame, RenderTarget};
use scene::components::TextureSlot;
use tracing::{info, warn};
use web_sys::HtmlCanvasElement;

use crate::assets::DecodedImage;
use crate::overlay::LabelCanvas;
use crate::wgpu::{WgpuContext, render_frame, resize_wgpu, upload_texture};

/// Browser render target: a wgpu surface plus the 2D label canvas.
///
/// The GPU context arrives asynchronously after mount. Until then frames
/// draw only the overlay, and decoded textures wait in `pending_textures`.
pub struct WebBackend {
    surface_canvas: HtmlCanvasElement,
    labels: LabelCanvas,
    gpu: Option<WgpuContext>,
    pending_textures: Vec<(TextureSlot, DecodedImage)>,
    size_px: (u32, u32),
}

impl WebBackend {
    pub fn new(surface_canvas: HtmlCanvasElement, labels: LabelCanvas) -> Self {
        Self {
            surface_canvas,
            labels,
            gpu: None,
            pending_textures: Vec::new(),
            size_px: (1, 1),
        }
    }

    pub fn surface_canvas(&self) -> &HtmlCanvasElement {
        &self.surface_canvas
    }

    pub fn attach_gpu(&mut self, mut ctx: WgpuContext) {
        resize_wgpu(&mut ctx, self.size_px.0, self.size_px.1);
        for (slot, image) in self.pending_textures.drain(..) {
            upload_texture(&mut ctx, slot, &image);
        }
        self.gpu = Some(ctx);
        info!(width = self.size_px.0, height = self.size_px.1, "gpu surface ready");
    }

    pub fn set_texture(&mut self, slot: TextureSlot, image: DecodedImage) {
        match self.gpu.as_mut() {
            Some(ctx) => upload_texture(ctx, slot, &image),
            None => {
                self.pending_textures.retain(|(pending, _)| *pending != slot);
                self.pending_textures.push((slot, image));
            }
        }
    }
}

impl RenderTarget for WebBackend {
    fn set_size(&mut self, width_px: u32, height_px: u32, pixel_ratio: f64) {
        self.surface_canvas.set_width(width_px);
        self.surface_canvas.set_height(height_px);
        self.labels.set_size(width_px, height_px, pixel_ratio);
        if let Some(ctx) = self.gpu.as_mut() {
            resize_wgpu(ctx, width_px, height_px);
        }
        self.size_px = (width_px, height_px);
    }
}

impl RenderBackend for WebBackend {
    fn render_scene(&mut self, frame: &RenderFrame) {
        let Some(ctx) = self.gpu.as_mut() else {
            return;
        };
        if let Err(err) = render_frame(ctx, frame) {
            warn!(error = ?err, "scene render failed");
        }
    }

    fn render_overlay(&mut self, overlay: &OverlayFrame<'_>) {
        self.labels.draw(overlay);
    }
}
