//! Host-agnostic globe viewer: mount -> frame* -> unmount.
//!
//! Hosts feed window and pointer events in, schedule `frame` once per display
//! refresh with the ticket from `mount`, and resolve the asset signals from
//! `request_assets` as downloads finish.

use foundation::math::{GeoPoint, Vec2};
use gpu::{
    AppliedViewport, CameraRig, PerspectiveCamera, RenderBackend, RenderTarget, Renderer,
    ViewportManager, ViewportSize, project_to_screen,
};
use runtime::{
    AssetSignal, Clock, Frame, FrameStages, FrameTicket, LoadProgressGate, LoopError, LoopToken,
    RenderLoop,
};
use scene::components::TextureSlot;
use scene::entity::MarkerId;
use scene::interaction::{HoverOutcome, InteractionState, InteractionTracker};
use scene::labels::LabelStyle;
use scene::SceneGraph;
use tracing::{debug, info};

use crate::config::GlobeConfig;
use crate::error::ViewerError;
use crate::keys::{KeyAction, KeyBindings};
use crate::poi::points_from_json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetKind {
    Texture(TextureSlot),
    Font,
}

/// One asset the host must fetch, with the signal to resolve when done.
#[derive(Debug)]
pub struct AssetRequest {
    pub kind: AssetKind,
    /// URL for textures, CSS font shorthand for fonts.
    pub source: String,
    pub signal: AssetSignal,
}

pub struct GlobeViewer<B: RenderBackend> {
    config: GlobeConfig,
    label_style: LabelStyle,
    keys: KeyBindings,
    points: Vec<GeoPoint>,
    graph: SceneGraph,
    rig: CameraRig,
    viewport: ViewportManager,
    tracker: InteractionTracker,
    render_loop: RenderLoop,
    gate: LoadProgressGate,
    assets_requested: bool,
    backend: Option<B>,
}

impl<B: RenderBackend> GlobeViewer<B> {
    /// Validates `config` and every point, then builds the scene.
    pub fn new(config: GlobeConfig, points: Vec<GeoPoint>) -> Result<Self, ViewerError> {
        config.validate()?;
        for point in &points {
            point
                .project(config.globe_radius)
                .map_err(|source| ViewerError::InvalidPoint {
                    label: point.label().to_string(),
                    source,
                })?;
        }

        let rig = rig_for(&config);
        let mut viewer = Self {
            label_style: config.label_style(),
            keys: KeyBindings::default(),
            points,
            graph: SceneGraph::with_marker_style(config.marker_style()),
            rig,
            viewport: ViewportManager::new(config.max_pixel_ratio),
            tracker: InteractionTracker::new(config.label_lift),
            render_loop: RenderLoop::new(),
            gate: LoadProgressGate::new(),
            assets_requested: false,
            backend: None,
            config,
        };
        viewer.build_scene()?;
        Ok(viewer)
    }

    pub fn from_json(config_json: &str, pois_json: &str) -> Result<Self, ViewerError> {
        let config = GlobeConfig::from_json_str(config_json)?;
        let points = points_from_json(pois_json)?;
        Self::new(config, points)
    }

    fn fresh_rig(&self) -> CameraRig {
        rig_for(&self.config)
    }

    fn build_scene(&mut self) -> Result<(), ViewerError> {
        let config = &self.config;
        self.graph.build_background(
            config.background_radius,
            config.sphere_segments,
            TextureSlot::Starfield,
        );
        self.graph
            .build_globe(&config.globe_params(), TextureSlot::GlobeSurface);
        self.graph.set_lights(config.light_rig());
        let count = self
            .graph
            .add_markers(&self.points)
            .map_err(|source| ViewerError::InvalidPoint {
                label: String::new(),
                source,
            })?
            .len();
        debug!(markers = count, "scene built");
        Ok(())
    }

    /// Register every asset the scene needs and seal the gate.
    ///
    /// Callable once; the gate reports `Loaded` after all returned signals settle.
    pub fn request_assets(&mut self) -> Result<Vec<AssetRequest>, ViewerError> {
        if self.assets_requested {
            return Err(ViewerError::Asset(runtime::AssetError::GateSealed));
        }
        let wanted = [
            (
                AssetKind::Texture(TextureSlot::GlobeSurface),
                "globe-texture",
                self.config.globe_texture.clone(),
            ),
            (
                AssetKind::Texture(TextureSlot::Starfield),
                "background-texture",
                self.config.background_texture.clone(),
            ),
            (AssetKind::Font, "label-font", self.config.label_font.clone()),
        ];
        let mut requests = Vec::with_capacity(wanted.len());
        for (kind, name, source) in wanted {
            let signal = self.gate.register(name)?;
            requests.push(AssetRequest {
                kind,
                source,
                signal,
            });
        }
        self.gate.seal();
        self.assets_requested = true;
        Ok(requests)
    }

    /// Attach a backend and start the loop. The returned token is required by `unmount`.
    pub fn mount(
        &mut self,
        backend: B,
        size: ViewportSize,
        clock: &dyn Clock,
    ) -> Result<LoopToken, ViewerError> {
        if self.render_loop.is_running() {
            return Err(LoopError::AlreadyRunning.into());
        }
        if self.graph.globe().is_none() {
            self.build_scene()?;
        }
        self.tracker = InteractionTracker::new(self.config.label_lift);
        self.viewport = ViewportManager::new(self.config.max_pixel_ratio);
        self.rig = self.fresh_rig();
        self.backend = Some(backend);
        self.on_resize(size);

        let token = self.render_loop.start(clock)?;
        info!(markers = self.graph.markers().len(), "globe mounted");
        Ok(token)
    }

    /// Stop the loop, release the scene and hand the backend back for disposal.
    pub fn unmount(&mut self, token: LoopToken) -> Result<B, ViewerError> {
        self.render_loop.stop(token)?;
        let freed = self.graph.release();
        info!(freed, "globe unmounted");
        self.backend.take().ok_or(ViewerError::Loop(LoopError::NotRunning))
    }

    pub fn is_mounted(&self) -> bool {
        self.render_loop.is_running()
    }

    /// Whether a callback holding `ticket` should keep scheduling frames.
    pub fn is_live(&self, ticket: FrameTicket) -> bool {
        self.render_loop.is_live(ticket)
    }

    /// Run one loop iteration. `None` once the ticket's run has been unmounted.
    pub fn frame(&mut self, ticket: FrameTicket, clock: &dyn Clock) -> Option<Frame> {
        let backend = self.backend.as_mut()?;
        let mut stages = ViewerStages {
            graph: &mut self.graph,
            rig: &mut self.rig,
            tracker: &self.tracker,
            backend,
            label_style: &self.label_style,
            viewport: self.viewport.css_size(),
            auto_rotate_speed: self.config.auto_rotate_speed,
        };
        self.render_loop.run_frame(ticket, clock, &mut stages)
    }

    pub fn on_resize(&mut self, size: ViewportSize) -> Option<AppliedViewport> {
        match self.backend.as_mut() {
            Some(backend) => {
                let target: &mut dyn RenderTarget = backend;
                self.viewport.on_resize(size, &mut self.rig, &mut [target])
            }
            None => self.viewport.on_resize(size, &mut self.rig, &mut []),
        }
    }

    /// Returns `true` if this press took control away from auto-rotation.
    pub fn on_pointer_down(&mut self, pos: Vec2) -> bool {
        self.rig.begin_drag(pos);
        self.tracker.on_pointer_down(pos)
    }

    pub fn on_pointer_move(&mut self, pos: Vec2) -> HoverOutcome {
        let (_, height) = self.viewport.css_size();
        if self.tracker.is_pointer_pressed() {
            self.rig.drag_to(pos, height);
        }
        let camera = self.rig.camera();
        self.tracker.on_pointer_move(
            pos,
            self.viewport.css_size(),
            &mut self.graph,
            |ndc| camera.ray_through_ndc(ndc),
        )
    }

    pub fn on_pointer_up(&mut self) {
        self.rig.end_drag();
        self.tracker.on_pointer_up();
    }

    /// Key press by DOM `KeyboardEvent.key`. Unbound keys are ignored.
    pub fn on_key(&mut self, key: &str) -> Option<KeyAction> {
        let action = self.keys.action_for(key)?;
        match action {
            KeyAction::ZoomIn => self.zoom_in(),
            KeyAction::ZoomOut => self.zoom_out(),
        };
        Some(action)
    }

    /// One fov step in. Also ends auto-rotation.
    pub fn zoom_in(&mut self) -> bool {
        self.tracker.on_keyboard_zoom();
        self.rig.zoom_in()
    }

    pub fn zoom_out(&mut self) -> bool {
        self.tracker.on_keyboard_zoom();
        self.rig.zoom_out()
    }

    pub fn apply_discrete_zoom(&mut self, factor: f64) -> bool {
        self.tracker.on_keyboard_zoom();
        self.rig.apply_discrete_zoom(factor)
    }

    pub fn is_loaded(&self) -> bool {
        self.gate.is_loaded()
    }

    pub fn on_loaded(&self, f: impl FnOnce() + 'static) {
        self.gate.on_loaded(f);
    }

    pub fn gate(&self) -> &LoadProgressGate {
        &self.gate
    }

    pub fn interaction_state(&self) -> InteractionState {
        self.tracker.state()
    }

    pub fn config(&self) -> &GlobeConfig {
        &self.config
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        self.rig.camera()
    }

    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    pub fn viewport(&self) -> Option<AppliedViewport> {
        self.viewport.current()
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.backend.as_mut()
    }

    /// Where a marker currently appears, in CSS pixels. `None` if behind the camera.
    pub fn marker_screen_position(&self, id: MarkerId) -> Option<Vec2> {
        let world = self.graph.markers().world_position(id)?;
        project_to_screen(self.rig.camera(), world, self.viewport.css_size())
    }
}

fn rig_for(config: &GlobeConfig) -> CameraRig {
    CameraRig::new(config.camera(1.0), config.zoom_limits(), config.orbit_params())
}

struct ViewerStages<'a, B: RenderBackend> {
    graph: &'a mut SceneGraph,
    rig: &'a mut CameraRig,
    tracker: &'a InteractionTracker,
    backend: &'a mut B,
    label_style: &'a LabelStyle,
    viewport: (f64, f64),
    auto_rotate_speed: f64,
}

impl<B: RenderBackend> FrameStages for ViewerStages<'_, B> {
    fn update_controls(&mut self, frame: &Frame) {
        self.rig.update(frame.dt_s);
    }

    fn advance_scene(&mut self, frame: &Frame) {
        if !self.tracker.is_user_controlled() {
            self.graph
                .set_globe_rotation(frame.elapsed.seconds() * self.auto_rotate_speed);
        }
    }

    fn render_scene(&mut self, _frame: &Frame) {
        let scene = Renderer::collect(self.graph, self.rig.camera());
        self.backend.render_scene(&scene);
    }

    fn render_overlay(&mut self, _frame: &Frame) {
        let overlay =
            Renderer::collect_overlay(self.graph, self.rig.camera(), self.viewport, self.label_style);
        self.backend.render_overlay(&overlay);
    }
}

#[cfg(test)]
mod tests {
    use super::{AssetKind, GlobeViewer};
    use crate::config::GlobeConfig;
    use crate::error::ViewerError;
    use crate::keys::KeyAction;
    use crate::poi::sample_points;
    use foundation::math::{GeoPoint, Vec2};
    use gpu::{OverlayFrame, RenderBackend, RenderFrame, RenderTarget, ViewportSize};
    use pretty_assertions::assert_eq;
    use runtime::{AssetError, ManualClock};
    use scene::entity::MarkerId;
    use scene::interaction::{HoverOutcome, InteractionState};
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct RecordingBackend {
        sizes: Vec<(u32, u32, f64)>,
        events: Vec<&'static str>,
        scenes: Vec<RenderFrame>,
        labels: Vec<Option<String>>,
    }

    impl RenderTarget for RecordingBackend {
        fn set_size(&mut self, width_px: u32, height_px: u32, pixel_ratio: f64) {
            self.sizes.push((width_px, height_px, pixel_ratio));
        }
    }

    impl RenderBackend for RecordingBackend {
        fn render_scene(&mut self, frame: &RenderFrame) {
            self.events.push("scene");
            self.scenes.push(frame.clone());
        }

        fn render_overlay(&mut self, overlay: &OverlayFrame<'_>) {
            self.events.push("overlay");
            self.labels.push(overlay.label.map(|l| l.text.to_string()));
        }
    }

    const SIZE: ViewportSize = ViewportSize {
        width: 1280.0,
        height: 720.0,
        device_pixel_ratio: 1.0,
    };

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn mounted() -> (GlobeViewer<RecordingBackend>, ManualClock, runtime::LoopToken) {
        let mut viewer =
            GlobeViewer::new(GlobeConfig::default(), sample_points()).expect("valid viewer");
        let clock = ManualClock::new(100.0);
        let token = viewer
            .mount(RecordingBackend::default(), SIZE, &clock)
            .expect("mounted");
        (viewer, clock, token)
    }

    #[test]
    fn ten_sample_markers_sit_at_projected_positions() {
        let (viewer, _, _) = mounted();
        let markers = viewer.graph().markers();
        assert_eq!(markers.len(), 10);
        for (marker, point) in markers.iter().zip(sample_points()) {
            assert_eq!(marker.label(), point.label());
            let expected = point.project(3.0).expect("valid");
            assert_close(marker.local_position.x, expected.x, 1e-12);
            assert_close(marker.local_position.y, expected.y, 1e-12);
            assert_close(marker.local_position.z, expected.z, 1e-12);
        }
    }

    #[test]
    fn hovering_brussels_shows_only_brussels() {
        let (mut viewer, clock, token) = mounted();
        // Let auto-rotation turn Brussels toward the camera, then freeze it.
        clock.advance(46.5);
        viewer.frame(token.ticket(), &clock);
        viewer.on_pointer_down(Vec2::new(0.0, 0.0));
        viewer.on_pointer_up();

        let brussels = viewer.marker_screen_position(MarkerId(0)).expect("visible");
        assert_eq!(viewer.on_pointer_move(brussels), HoverOutcome::Hit(MarkerId(0)));
        assert_eq!(viewer.graph().label().visible_text(), Some("Brussels"));

        clock.advance(1.0 / 60.0);
        viewer.frame(token.ticket(), &clock);
        let backend = viewer.backend().expect("mounted");
        assert_eq!(backend.labels.last(), Some(&Some("Brussels".to_string())));
    }

    #[test]
    fn stages_run_in_order_every_frame() {
        let (mut viewer, clock, token) = mounted();
        for _ in 0..3 {
            clock.advance(0.016);
            viewer.frame(token.ticket(), &clock).expect("live");
        }
        let backend = viewer.backend().expect("mounted");
        assert_eq!(
            backend.events,
            vec!["scene", "overlay", "scene", "overlay", "scene", "overlay"]
        );
        assert_eq!(backend.scenes[0].commands.len(), 3 + 10);
    }

    #[test]
    fn idle_globe_rotates_with_elapsed_time_until_user_takes_control() {
        let (mut viewer, clock, token) = mounted();
        viewer.frame(token.ticket(), &clock);
        assert_eq!(viewer.graph().globe_rotation(), 0.0);

        clock.advance(2.0);
        viewer.frame(token.ticket(), &clock);
        assert_close(viewer.graph().globe_rotation(), 0.2, 1e-12);

        assert!(viewer.on_pointer_down(Vec2::new(5.0, 5.0)));
        assert!(!viewer.on_pointer_down(Vec2::new(6.0, 5.0)));
        clock.advance(3.0);
        viewer.frame(token.ticket(), &clock);
        assert_close(viewer.graph().globe_rotation(), 0.2, 1e-12);
        assert_eq!(viewer.interaction_state(), InteractionState::UserControlled);
    }

    #[test]
    fn zoom_keys_step_fov_and_take_control() {
        let (mut viewer, _, _) = mounted();
        let start = viewer.camera().fov_deg();
        assert_eq!(viewer.on_key("z"), Some(KeyAction::ZoomIn));
        assert_close(viewer.camera().fov_deg(), start - 5.0, 1e-12);
        assert_eq!(viewer.on_key("e"), Some(KeyAction::ZoomOut));
        assert_close(viewer.camera().fov_deg(), start, 1e-12);
        assert_eq!(viewer.on_key("q"), None);
        assert_eq!(viewer.interaction_state(), InteractionState::UserControlled);
    }

    #[test]
    fn resize_is_idempotent_and_reaches_backend() {
        let (mut viewer, _, _) = mounted();
        let bigger = ViewportSize::new(1600.0, 900.0, 3.0);
        assert!(viewer.on_resize(bigger).is_some());
        let aspect = viewer.camera().aspect();
        assert_eq!(viewer.on_resize(bigger), None);
        assert_eq!(viewer.camera().aspect(), aspect);

        let backend = viewer.backend().expect("mounted");
        assert_eq!(backend.sizes, vec![(1280, 720, 1.0), (3200, 1800, 2.0)]);
    }

    #[test]
    fn unmount_stops_frames_and_returns_backend() {
        let (mut viewer, clock, token) = mounted();
        let ticket = token.ticket();
        viewer.frame(ticket, &clock).expect("live");

        let backend = viewer.unmount(token).expect("unmounted");
        assert_eq!(backend.events.len(), 2);
        assert!(!viewer.is_mounted());
        assert!(viewer.frame(ticket, &clock).is_none());
        assert!(viewer.graph().markers().is_empty());
    }

    #[test]
    fn remount_rebuilds_scene_and_old_tickets_stay_dead() {
        let (mut viewer, clock, token) = mounted();
        let old = token.ticket();
        let default_fov = viewer.camera().fov_deg();
        let default_position = viewer.camera().position();

        assert!(viewer.zoom_in());
        assert!(viewer.zoom_in());
        assert!(viewer.apply_discrete_zoom(3.0));
        viewer.on_pointer_down(Vec2::new(100.0, 100.0));
        viewer.on_pointer_move(Vec2::new(400.0, 100.0));
        clock.advance(0.1);
        viewer.frame(old, &clock);
        assert!(viewer.camera().position() != default_position);
        viewer.unmount(token).expect("unmounted");

        let token = viewer
            .mount(RecordingBackend::default(), SIZE, &clock)
            .expect("remounted");
        assert_eq!(viewer.graph().markers().len(), 10);
        assert!(viewer.frame(old, &clock).is_none());
        assert_eq!(viewer.interaction_state(), InteractionState::Idle);
        assert_close(viewer.camera().fov_deg(), default_fov, 1e-12);
        assert_eq!(viewer.camera().zoom(), 1.0);
        assert_eq!(viewer.camera().position(), default_position);
        assert!(!viewer.rig().orbit().is_dragging());
        assert!(viewer.frame(token.ticket(), &clock).is_some());
    }

    #[test]
    fn double_mount_is_rejected() {
        let (mut viewer, clock, _token) = mounted();
        let err = viewer
            .mount(RecordingBackend::default(), SIZE, &clock)
            .map(|_| ())
            .unwrap_err();
        assert_eq!(err, ViewerError::Loop(runtime::LoopError::AlreadyRunning));
    }

    #[test]
    fn gate_opens_after_all_assets_settle_even_on_failure() {
        let (mut viewer, _, _) = mounted();
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        viewer.on_loaded(move || counter.set(counter.get() + 1));

        let requests = viewer.request_assets().expect("first request");
        assert_eq!(requests.len(), 3);
        assert!(matches!(requests[0].kind, AssetKind::Texture(_)));
        assert_eq!(requests[0].source, "/Albedo-diffuse.jpg");
        assert!(viewer.request_assets().is_err());

        let mut requests = requests.into_iter();
        let globe = requests.next().expect("globe");
        let background = requests.next().expect("background");
        let font = requests.next().expect("font");

        globe.signal.resolve(Ok(()));
        background
            .signal
            .resolve(Err(AssetError::Fetch("404".to_string())));
        assert!(!viewer.is_loaded());
        font.signal.resolve(Ok(()));

        assert!(viewer.is_loaded());
        assert_eq!(fired.get(), 1);
        assert_eq!(viewer.gate().failures().len(), 1);
    }

    #[test]
    fn assets_are_requested_before_any_backend_exists() {
        let mut viewer =
            GlobeViewer::<RecordingBackend>::new(GlobeConfig::default(), sample_points())
                .expect("valid viewer");
        let requests = viewer.request_assets().expect("requested unmounted");
        assert_eq!(requests.len(), 3);
        assert!(viewer.backend().is_none());

        let clock = ManualClock::new(0.0);
        let token = viewer
            .mount(RecordingBackend::default(), SIZE, &clock)
            .expect("mounted");
        for request in requests {
            request.signal.resolve(Ok(()));
        }
        assert!(viewer.is_loaded());
        assert!(viewer.frame(token.ticket(), &clock).is_some());
    }

    #[test]
    fn invalid_point_fails_fast_with_label() {
        let config = GlobeConfig {
            globe_radius: 3.0,
            ..GlobeConfig::default()
        };
        let ok = GlobeViewer::<RecordingBackend>::new(
            config,
            vec![GeoPoint::new(0.0, 0.0, "ok").expect("valid")],
        );
        assert!(ok.is_ok());

        let err = GlobeViewer::<RecordingBackend>::from_json(
            "",
            r#"[{ "label": "bad", "lat": 0.0, "lon": 200.0 }]"#,
        )
        .map(|_| ())
        .unwrap_err();
        assert!(matches!(err, ViewerError::InvalidPoint { ref label, .. } if label == "bad"));
    }

    #[test]
    fn pointer_outside_canvas_is_a_quiet_miss() {
        let (mut viewer, _, _) = mounted();
        assert_eq!(viewer.on_pointer_move(Vec2::new(-20.0, 5000.0)), HoverOutcome::Miss);
        assert_eq!(viewer.on_pointer_move(Vec2::new(f64::NAN, 1.0)), HoverOutcome::Miss);
        assert!(!viewer.graph().label().is_visible());
    }
}
