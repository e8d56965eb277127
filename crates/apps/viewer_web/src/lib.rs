use console_error_panic_hook::set_once;
use std::cell::RefCell;
use std::rc::Rc;

use runtime::{AssetError, FrameTicket, LoopToken};
use tracing::{debug, info, warn};
use viewer::{AssetKind, AssetRequest, GlobeViewer};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Element, HtmlCanvasElement, KeyboardEvent, Window};

mod assets;
mod backend;
mod host;
mod overlay;
mod wgpu;

use backend::WebBackend;
use host::{
    EventListener, FrameDriver, PerformanceClock, SharedViewer, WeakViewer, container_size,
    pointer_position, with_viewer,
};
use overlay::LabelCanvas;

const SURFACE_CANVAS_STYLE: &str = "position:absolute;inset:0;width:100%;height:100%;display:block;";
const LABEL_CANVAS_STYLE: &str =
    "position:absolute;inset:0;width:100%;height:100%;display:block;pointer-events:none;";

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    set_once();
    #[cfg(target_arch = "wasm32")]
    tracing_wasm::set_as_global_default();
    Ok(())
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// One globe attached to a DOM container. Dropping it unmounts.
#[wasm_bindgen]
pub struct GlobeMount {
    session: Option<Session>,
}

struct Session {
    viewer: SharedViewer,
    token: LoopToken,
    frames: FrameDriver,
    listeners: Vec<EventListener>,
    canvases: Vec<Element>,
}

impl Session {
    fn close(self) -> Result<(), JsValue> {
        let Session {
            viewer,
            token,
            frames,
            listeners,
            canvases,
        } = self;
        frames.cancel();
        drop(listeners);
        let backend = viewer
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("viewer is busy"))?
            .unmount(token)
            .map_err(js_error)?;
        drop(backend);
        for canvas in canvases {
            canvas.remove();
        }
        Ok(())
    }
}

#[wasm_bindgen]
impl GlobeMount {
    /// Stop rendering, detach listeners and free the scene. Safe to call twice.
    pub fn unmount(&mut self) -> Result<(), JsValue> {
        match self.session.take() {
            Some(session) => session.close(),
            None => Ok(()),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_loaded(&self) -> bool {
        self.session
            .as_ref()
            .and_then(|s| s.viewer.try_borrow().ok().map(|v| v.is_loaded()))
            .unwrap_or(false)
    }

    /// `callback` runs once when every asset has settled; immediately if already loaded.
    pub fn set_on_loaded(&self, callback: js_sys::Function) -> Result<(), JsValue> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| JsValue::from_str("globe is not mounted"))?;
        let viewer = session
            .viewer
            .try_borrow()
            .map_err(|_| JsValue::from_str("viewer is busy"))?;
        viewer.on_loaded(move || {
            if let Err(err) = callback.call0(&JsValue::NULL) {
                warn!(error = ?err, "loaded callback threw");
            }
        });
        Ok(())
    }

    pub fn zoom_in(&self) -> bool {
        self.with_session_viewer(|v| v.zoom_in()).unwrap_or(false)
    }

    pub fn zoom_out(&self) -> bool {
        self.with_session_viewer(|v| v.zoom_out()).unwrap_or(false)
    }

    /// Set the camera zoom multiplier to `factor`, clamped to the configured range.
    pub fn apply_discrete_zoom(&self, factor: f64) -> bool {
        self.with_session_viewer(|v| v.apply_discrete_zoom(factor))
            .unwrap_or(false)
    }
}

impl GlobeMount {
    fn with_session_viewer<R>(&self, f: impl FnOnce(&mut GlobeViewer<WebBackend>) -> R) -> Option<R> {
        let session = self.session.as_ref()?;
        with_viewer(&Rc::downgrade(&session.viewer), f)
    }
}

impl Drop for GlobeMount {
    fn drop(&mut self) {
        if let Err(err) = self.unmount() {
            warn!(error = ?err, "unmount on drop failed");
        }
    }
}

/// Mount a globe into the element with id `container_id`.
///
/// `pois_json` accepts an events payload, a record array or plain
/// `{label, lat, lon}` points. `config_json` may be empty or partial. The
/// container should be positioned; both canvases stack inside it.
#[wasm_bindgen]
pub fn mount_globe(
    container_id: &str,
    pois_json: &str,
    config_json: &str,
) -> Result<GlobeMount, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("window missing"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("document missing"))?;
    let container = document
        .get_element_by_id(container_id)
        .ok_or_else(|| JsValue::from_str("container missing"))?;

    let mut viewer: GlobeViewer<WebBackend> =
        GlobeViewer::from_json(config_json, pois_json).map_err(js_error)?;
    // Nothing is attached to the DOM yet, so an early return leaves no trace.
    let requests = viewer.request_assets().map_err(js_error)?;

    let mut canvases = CanvasGuard::default();
    let surface_canvas = create_canvas(&document, &container, SURFACE_CANVAS_STYLE)?;
    canvases.push(&surface_canvas);
    let label_canvas = create_canvas(&document, &container, LABEL_CANVAS_STYLE)?;
    canvases.push(&label_canvas);
    let backend = WebBackend::new(surface_canvas, LabelCanvas::from_canvas(label_canvas)?);

    let clock = PerformanceClock::from_window(&window)?;
    let token = viewer
        .mount(backend, container_size(&container, &window), &clock)
        .map_err(js_error)?;
    let ticket = token.ticket();

    let viewer: SharedViewer = Rc::new(RefCell::new(viewer));
    let weak = Rc::downgrade(&viewer);

    spawn_gpu_init(&viewer, ticket);
    for request in requests {
        spawn_asset(request, weak.clone());
    }
    let listeners = attach_listeners(&window, &container, &viewer, weak.clone())?;
    let frames = FrameDriver::start(window, weak, clock, ticket)?;

    info!(container = container_id, "globe mount ready");
    Ok(GlobeMount {
        session: Some(Session {
            viewer,
            token,
            frames,
            listeners,
            canvases: canvases.keep(),
        }),
    })
}

/// Canvases added by a mount in progress; removed again unless the mount completes.
#[derive(Default)]
struct CanvasGuard(Vec<Element>);

impl CanvasGuard {
    fn push(&mut self, canvas: &HtmlCanvasElement) {
        self.0.push(canvas.clone().unchecked_into());
    }

    fn keep(mut self) -> Vec<Element> {
        std::mem::take(&mut self.0)
    }
}

impl Drop for CanvasGuard {
    fn drop(&mut self) {
        for canvas in self.0.drain(..) {
            canvas.remove();
        }
    }
}

fn create_canvas(
    document: &Document,
    container: &Element,
    style: &str,
) -> Result<HtmlCanvasElement, JsValue> {
    let canvas = document
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()?;
    canvas.set_attribute("style", style)?;
    container.append_child(&canvas)?;
    Ok(canvas)
}

fn spawn_gpu_init(viewer: &SharedViewer, ticket: FrameTicket) {
    let Some(canvas) = viewer
        .borrow()
        .backend()
        .map(|b| b.surface_canvas().clone())
    else {
        return;
    };
    let weak = Rc::downgrade(viewer);
    spawn_local(async move {
        match wgpu::init_wgpu(canvas).await {
            Ok(ctx) => {
                let attached = with_viewer(&weak, |v| {
                    if !v.is_live(ticket) {
                        return false;
                    }
                    match v.backend_mut() {
                        Some(backend) => {
                            backend.attach_gpu(ctx);
                            true
                        }
                        None => false,
                    }
                });
                if attached != Some(true) {
                    debug!("gpu ready after unmount; dropped");
                }
            }
            Err(err) => warn!(error = ?err, "wgpu init failed"),
        }
    });
}

/// Fetch one asset and settle its signal. Textures land in the backend if
/// the viewer is still mounted; failures still settle the gate.
fn spawn_asset(request: AssetRequest, viewer: WeakViewer) {
    let AssetRequest {
        kind,
        source,
        signal,
    } = request;
    spawn_local(async move {
        let outcome: Result<(), AssetError> = match kind {
            AssetKind::Texture(slot) => match assets::fetch_texture(&source).await {
                Ok(image) => {
                    debug!(asset = signal.name(), width = image.width, height = image.height, "texture decoded");
                    with_viewer(&viewer, |v| {
                        if let Some(backend) = v.backend_mut() {
                            backend.set_texture(slot, image);
                        }
                    });
                    Ok(())
                }
                Err(err) => Err(err),
            },
            AssetKind::Font => assets::load_font(&source).await,
        };
        signal.resolve(outcome);
    });
}

fn attach_listeners(
    window: &Window,
    container: &Element,
    viewer: &SharedViewer,
    weak: WeakViewer,
) -> Result<Vec<EventListener>, JsValue> {
    let surface = viewer
        .borrow()
        .backend()
        .map(|b| b.surface_canvas().clone())
        .ok_or_else(|| JsValue::from_str("globe is not mounted"))?;

    let mut listeners = Vec::with_capacity(5);

    let v = weak.clone();
    listeners.push(EventListener::new(&surface, "pointerdown", move |event| {
        if let Some(pos) = pointer_position(&event) {
            with_viewer(&v, |viewer| viewer.on_pointer_down(pos));
        }
    })?);

    let v = weak.clone();
    listeners.push(EventListener::new(&surface, "pointermove", move |event| {
        if let Some(pos) = pointer_position(&event) {
            with_viewer(&v, |viewer| viewer.on_pointer_move(pos));
        }
    })?);

    let v = weak.clone();
    listeners.push(EventListener::new(window, "pointerup", move |_event| {
        with_viewer(&v, |viewer| viewer.on_pointer_up());
    })?);

    let v = weak.clone();
    listeners.push(EventListener::new(window, "keydown", move |event| {
        let Some(key) = event.dyn_ref::<KeyboardEvent>().map(|k| k.key()) else {
            return;
        };
        with_viewer(&v, |viewer| viewer.on_key(&key));
    })?);

    let v = weak;
    let resize_window = window.clone();
    let resize_container = container.clone();
    listeners.push(EventListener::new(window, "resize", move |_event| {
        let size = container_size(&resize_container, &resize_window);
        with_viewer(&v, |viewer| viewer.on_resize(size));
    })?);

    Ok(listeners)
}
