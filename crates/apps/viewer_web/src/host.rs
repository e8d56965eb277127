//! Browser plumbing: clock, DOM listeners, the animation-frame chain.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use foundation::math::Vec2;
use foundation::time::Time;
use gpu::ViewportSize;
use runtime::{Clock, FrameTicket};
use tracing::{debug, warn};
use viewer::GlobeViewer;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Element, Event, EventTarget, MouseEvent, Performance, Window};

use crate::backend::WebBackend;

pub type SharedViewer = Rc<RefCell<GlobeViewer<WebBackend>>>;
pub type WeakViewer = Weak<RefCell<GlobeViewer<WebBackend>>>;

/// Run `f` against the viewer unless it is gone or already borrowed.
pub fn with_viewer<R>(
    viewer: &WeakViewer,
    f: impl FnOnce(&mut GlobeViewer<WebBackend>) -> R,
) -> Option<R> {
    let viewer = viewer.upgrade()?;
    let mut viewer = viewer.try_borrow_mut().ok()?;
    Some(f(&mut viewer))
}

/// `performance.now()` in seconds.
#[derive(Clone)]
pub struct PerformanceClock {
    performance: Performance,
}

impl PerformanceClock {
    pub fn from_window(window: &Window) -> Result<Self, JsValue> {
        let performance = window
            .performance()
            .ok_or_else(|| JsValue::from_str("performance missing"))?;
        Ok(Self { performance })
    }
}

impl Clock for PerformanceClock {
    fn now(&self) -> Time {
        Time(self.performance.now() / 1000.0)
    }
}

/// A DOM listener that unregisters itself when dropped.
pub struct EventListener {
    target: EventTarget,
    kind: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl EventListener {
    pub fn new(
        target: &EventTarget,
        kind: &'static str,
        f: impl FnMut(Event) + 'static,
    ) -> Result<Self, JsValue> {
        let callback = Closure::<dyn FnMut(Event)>::new(f);
        target.add_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            kind,
            callback,
        })
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.kind, self.callback.as_ref().unchecked_ref());
    }
}

type FrameCallback = Closure<dyn FnMut(f64)>;

/// Self-rescheduling `requestAnimationFrame` chain for one mounted viewer.
///
/// The callback holds only weak references, so dropping the driver (or the
/// viewer) ends the chain. A callback whose ticket went stale stops without
/// scheduling another.
pub struct FrameDriver {
    window: Window,
    handle: Rc<Cell<Option<i32>>>,
    callback: Rc<RefCell<Option<FrameCallback>>>,
}

impl FrameDriver {
    pub fn start(
        window: Window,
        viewer: WeakViewer,
        clock: PerformanceClock,
        ticket: FrameTicket,
    ) -> Result<Self, JsValue> {
        let callback: Rc<RefCell<Option<FrameCallback>>> = Rc::new(RefCell::new(None));
        let handle = Rc::new(Cell::new(None));

        let next = Rc::downgrade(&callback);
        let raf_window = window.clone();
        let raf_handle = Rc::clone(&handle);
        let tick = Closure::<dyn FnMut(f64)>::new(move |_timestamp: f64| {
            raf_handle.set(None);
            let Some(viewer) = viewer.upgrade() else {
                return;
            };
            // A busy viewer skips this refresh but keeps the chain alive.
            let live = match viewer.try_borrow_mut() {
                Ok(mut viewer) => viewer.frame(ticket, &clock).is_some(),
                Err(_) => true,
            };
            if !live {
                debug!("frame callback after unmount");
                return;
            }
            let Some(next) = next.upgrade() else {
                return;
            };
            if let Some(cb) = next.borrow().as_ref() {
                match raf_window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                    Ok(id) => raf_handle.set(Some(id)),
                    Err(err) => warn!(error = ?err, "requestAnimationFrame failed"),
                }
            }
        });

        let id = window.request_animation_frame(tick.as_ref().unchecked_ref())?;
        handle.set(Some(id));
        *callback.borrow_mut() = Some(tick);
        Ok(Self {
            window,
            handle,
            callback,
        })
    }

    /// Cancel the pending frame and drop the callback. Idempotent.
    pub fn cancel(&self) {
        if let Some(id) = self.handle.take() {
            let _ = self.window.cancel_animation_frame(id);
        }
        self.callback.borrow_mut().take();
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Container size in CSS pixels, falling back to the window when the
/// container has not been laid out.
pub fn container_size(container: &Element, window: &Window) -> ViewportSize {
    let mut width = f64::from(container.client_width());
    let mut height = f64::from(container.client_height());
    if width <= 0.0 || height <= 0.0 {
        width = window
            .inner_width()
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(1.0);
        height = window
            .inner_height()
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(1.0);
    }
    ViewportSize::new(width, height, window.device_pixel_ratio())
}

/// Pointer position relative to the event target, in CSS pixels.
pub fn pointer_position(event: &Event) -> Option<Vec2> {
    let event = event.dyn_ref::<MouseEvent>()?;
    Some(Vec2::new(
        f64::from(event.offset_x()),
        f64::from(event.offset_y()),
    ))
}
