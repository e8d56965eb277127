use foundation::math::Vec2;
use tracing::debug;

use crate::SceneGraph;
use crate::entity::MarkerId;
use crate::picking::Ray;

/// Whether the user has taken control of the globe this session.
///
/// `UserControlled` is terminal: nothing moves the state back to `Idle`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    UserControlled,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HoverOutcome {
    Hit(MarkerId),
    Miss,
}

/// Pointer position normalized to device coordinates in `[-1, 1]`, `+y` up.
///
/// `None` when the pointer is outside the viewport or the input is not finite.
pub fn pointer_to_ndc(pos: Vec2, viewport: (f64, f64)) -> Option<Vec2> {
    let (w, h) = viewport;
    if !(pos.x.is_finite() && pos.y.is_finite() && w.is_finite() && h.is_finite()) {
        return None;
    }
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    if pos.x < 0.0 || pos.y < 0.0 || pos.x > w || pos.y > h {
        return None;
    }
    Some(Vec2::new(2.0 * pos.x / w - 1.0, 1.0 - 2.0 * pos.y / h))
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionTracker {
    state: InteractionState,
    pointer_pressed: bool,
    last_pointer: Option<Vec2>,
    hovered: Option<MarkerId>,
    label_lift: f64,
}

impl Default for InteractionTracker {
    fn default() -> Self {
        Self::new(1.07)
    }
}

impl InteractionTracker {
    /// `label_lift` scales the globe radius to place hover labels just above the surface.
    pub fn new(label_lift: f64) -> Self {
        Self {
            state: InteractionState::Idle,
            pointer_pressed: false,
            last_pointer: None,
            hovered: None,
            label_lift,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn is_user_controlled(&self) -> bool {
        self.state == InteractionState::UserControlled
    }

    pub fn is_pointer_pressed(&self) -> bool {
        self.pointer_pressed
    }

    pub fn last_pointer(&self) -> Option<Vec2> {
        self.last_pointer
    }

    pub fn hovered(&self) -> Option<MarkerId> {
        self.hovered
    }

    /// Returns `true` only for the call that moved the session out of `Idle`.
    pub fn on_pointer_down(&mut self, pos: Vec2) -> bool {
        self.pointer_pressed = true;
        self.last_pointer = Some(pos);
        self.take_control("pointer-down")
    }

    pub fn on_pointer_up(&mut self) {
        self.pointer_pressed = false;
    }

    pub fn on_keyboard_zoom(&mut self) -> bool {
        self.take_control("keyboard-zoom")
    }

    fn take_control(&mut self, cause: &'static str) -> bool {
        if self.state == InteractionState::UserControlled {
            return false;
        }
        self.state = InteractionState::UserControlled;
        debug!(cause, "user took control; auto-rotation stops");
        true
    }

    /// Hover hit-test for a pointer at `pos` (CSS pixels from the top-left).
    ///
    /// `make_ray` maps normalized device coordinates to a world-space ray.
    /// A hit shows that marker's label; anything else hides it.
    pub fn on_pointer_move<F>(
        &mut self,
        pos: Vec2,
        viewport: (f64, f64),
        graph: &mut SceneGraph,
        make_ray: F,
    ) -> HoverOutcome
    where
        F: FnOnce(Vec2) -> Option<Ray>,
    {
        self.last_pointer = Some(pos);

        let hit = pointer_to_ndc(pos, viewport)
            .and_then(make_ray)
            .and_then(|ray| graph.markers().hit_test(ray));

        match hit {
            Some(hit) if graph.show_marker_label(hit.marker, self.label_lift) => {
                self.hovered = Some(hit.marker);
                HoverOutcome::Hit(hit.marker)
            }
            _ => {
                graph.hide_label();
                self.hovered = None;
                HoverOutcome::Miss
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{HoverOutcome, InteractionState, InteractionTracker, pointer_to_ndc};
    use crate::SceneGraph;
    use crate::components::TextureSlot;
    use crate::entity::MarkerId;
    use crate::picking::Ray;
    use crate::prefabs::GlobeParams;
    use foundation::math::{GeoPoint, Vec2, Vec3};
    use pretty_assertions::assert_eq;

    // Orthographic stand-in camera looking down -Z: NDC maps to x/y in [-4, 4].
    fn ortho_ray(ndc: Vec2) -> Option<Ray> {
        Some(Ray::new(
            Vec3::new(ndc.x * 4.0, ndc.y * 4.0, 10.0),
            Vec3::new(0.0, 0.0, -1.0),
        ))
    }

    fn globe_with_front_marker() -> SceneGraph {
        let mut graph = SceneGraph::new();
        graph.build_globe(&GlobeParams::default(), TextureSlot::GlobeSurface);
        // lat 0, lon -90 sits on +Z, at the viewport center.
        graph
            .add_markers(&[GeoPoint::new(0.0, -90.0, "Front").expect("valid")])
            .expect("valid");
        graph
    }

    #[test]
    fn first_pointer_down_takes_control_once() {
        let mut tracker = InteractionTracker::default();
        assert_eq!(tracker.state(), InteractionState::Idle);

        assert!(tracker.on_pointer_down(Vec2::new(10.0, 10.0)));
        assert!(!tracker.on_pointer_down(Vec2::new(12.0, 10.0)));
        assert_eq!(tracker.state(), InteractionState::UserControlled);
    }

    #[test]
    fn control_is_sticky_for_any_event_sequence() {
        let mut tracker = InteractionTracker::default();
        let mut graph = globe_with_front_marker();
        tracker.on_keyboard_zoom();

        tracker.on_pointer_up();
        tracker.on_pointer_move(Vec2::new(400.0, 300.0), (800.0, 600.0), &mut graph, ortho_ray);
        tracker.on_pointer_move(Vec2::new(-5.0, 9000.0), (800.0, 600.0), &mut graph, ortho_ray);
        tracker.on_pointer_down(Vec2::new(1.0, 1.0));
        tracker.on_pointer_up();
        assert!(!tracker.on_keyboard_zoom());
        assert!(tracker.is_user_controlled());
    }

    #[test]
    fn hover_does_not_take_control() {
        let mut tracker = InteractionTracker::default();
        let mut graph = globe_with_front_marker();
        tracker.on_pointer_move(Vec2::new(400.0, 300.0), (800.0, 600.0), &mut graph, ortho_ray);
        assert_eq!(tracker.state(), InteractionState::Idle);
    }

    #[test]
    fn hovering_marker_shows_its_label_and_leaving_hides_it() {
        let mut tracker = InteractionTracker::default();
        let mut graph = globe_with_front_marker();

        let outcome =
            tracker.on_pointer_move(Vec2::new(400.0, 300.0), (800.0, 600.0), &mut graph, ortho_ray);
        assert_eq!(outcome, HoverOutcome::Hit(MarkerId(0)));
        assert_eq!(graph.label().visible_text(), Some("Front"));
        let anchor = graph.label_world_position().expect("visible");
        assert!((anchor.length() - 3.0 * 1.07).abs() < 1e-9);

        let outcome =
            tracker.on_pointer_move(Vec2::new(10.0, 10.0), (800.0, 600.0), &mut graph, ortho_ray);
        assert_eq!(outcome, HoverOutcome::Miss);
        assert_eq!(graph.label().visible_text(), None);
        assert_eq!(tracker.hovered(), None);
    }

    #[test]
    fn pointer_outside_viewport_is_a_miss() {
        let mut tracker = InteractionTracker::default();
        let mut graph = globe_with_front_marker();
        tracker.on_pointer_move(Vec2::new(400.0, 300.0), (800.0, 600.0), &mut graph, ortho_ray);

        for pos in [
            Vec2::new(-1.0, 300.0),
            Vec2::new(801.0, 300.0),
            Vec2::new(400.0, f64::NAN),
        ] {
            let outcome = tracker.on_pointer_move(pos, (800.0, 600.0), &mut graph, ortho_ray);
            assert_eq!(outcome, HoverOutcome::Miss);
        }
        assert!(!graph.label().is_visible());
    }

    #[test]
    fn empty_group_always_misses() {
        let mut tracker = InteractionTracker::default();
        let mut graph = SceneGraph::new();
        graph.build_globe(&GlobeParams::default(), TextureSlot::GlobeSurface);
        for x in [0.0, 200.0, 400.0, 800.0] {
            for y in [0.0, 300.0, 600.0] {
                let outcome =
                    tracker.on_pointer_move(Vec2::new(x, y), (800.0, 600.0), &mut graph, ortho_ray);
                assert_eq!(outcome, HoverOutcome::Miss);
            }
        }
    }

    #[test]
    fn ndc_mapping() {
        assert_eq!(pointer_to_ndc(Vec2::new(0.0, 0.0), (100.0, 50.0)), Some(Vec2::new(-1.0, 1.0)));
        assert_eq!(pointer_to_ndc(Vec2::new(100.0, 50.0), (100.0, 50.0)), Some(Vec2::new(1.0, -1.0)));
        assert_eq!(pointer_to_ndc(Vec2::new(50.0, 25.0), (0.0, 50.0)), None);
    }
}
