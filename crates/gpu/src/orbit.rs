//! Damped drag-to-orbit around a fixed target.
//!
//! Drag input accumulates into a pending spherical delta; each frame applies
//! an exponentially decaying share of it, so motion eases out after release.

use std::f64::consts::{PI, TAU};

use foundation::math::{Vec2, Vec3};

/// Pending deltas below this are dropped (radians).
const SETTLE_EPSILON: f64 = 1e-6;

/// Largest frame step fed into damping, to avoid jumps after a stall.
const MAX_STEP_S: f64 = 0.1;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OrbitParams {
    pub rotate_speed: f64,
    /// Exponential damping rate per second. `0` applies drag input immediately.
    pub damping: f64,
    pub min_polar_rad: f64,
    pub max_polar_rad: f64,
}

impl Default for OrbitParams {
    fn default() -> Self {
        Self {
            rotate_speed: 1.0,
            damping: 3.0,
            min_polar_rad: 0.01,
            max_polar_rad: PI - 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    params: OrbitParams,
    target: Vec3,
    radius: f64,
    /// Azimuth about +Y, measured from +Z toward +X.
    theta: f64,
    /// Polar angle from +Y.
    phi: f64,
    pending_theta: f64,
    pending_phi: f64,
    drag_from: Option<Vec2>,
}

impl OrbitControls {
    pub fn new(position: Vec3, target: Vec3, params: OrbitParams) -> Self {
        let rel = position - target;
        let radius = rel.length();
        let (theta, phi) = if radius > 0.0 {
            (rel.x.atan2(rel.z), (rel.y / radius).clamp(-1.0, 1.0).acos())
        } else {
            (0.0, 0.5 * PI)
        };
        Self {
            params,
            target,
            radius,
            theta,
            phi: phi.clamp(params.min_polar_rad, params.max_polar_rad),
            pending_theta: 0.0,
            pending_phi: 0.0,
            drag_from: None,
        }
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn azimuth(&self) -> f64 {
        self.theta
    }

    pub fn polar(&self) -> f64 {
        self.phi
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_from.is_some()
    }

    pub fn is_settled(&self) -> bool {
        self.pending_theta == 0.0 && self.pending_phi == 0.0
    }

    pub fn begin_drag(&mut self, pos: Vec2) {
        self.drag_from = Some(pos);
    }

    /// A full viewport height of drag turns the camera by one revolution.
    pub fn drag_to(&mut self, pos: Vec2, viewport_height: f64) {
        let Some(from) = self.drag_from else {
            return;
        };
        if !(pos.x.is_finite() && pos.y.is_finite()) {
            return;
        }
        let delta = pos - from;
        let h = if viewport_height.is_finite() { viewport_height.max(1.0) } else { 1.0 };
        self.pending_theta -= TAU * delta.x / h * self.params.rotate_speed;
        self.pending_phi -= TAU * delta.y / h * self.params.rotate_speed;
        self.drag_from = Some(pos);
    }

    pub fn end_drag(&mut self) {
        self.drag_from = None;
    }

    /// Apply a damped share of the pending rotation and return the camera position.
    pub fn update(&mut self, dt_s: f64) -> Vec3 {
        let dt = if dt_s.is_finite() { dt_s.clamp(0.0, MAX_STEP_S) } else { 0.0 };
        let alpha = if self.params.damping > 0.0 {
            1.0 - (-self.params.damping * dt).exp()
        } else {
            1.0
        };

        let d_theta = self.pending_theta * alpha;
        let d_phi = self.pending_phi * alpha;
        self.theta += d_theta;
        self.phi = (self.phi + d_phi).clamp(self.params.min_polar_rad, self.params.max_polar_rad);
        self.pending_theta -= d_theta;
        self.pending_phi -= d_phi;
        if self.pending_theta.abs() < SETTLE_EPSILON {
            self.pending_theta = 0.0;
        }
        if self.pending_phi.abs() < SETTLE_EPSILON {
            self.pending_phi = 0.0;
        }

        self.position()
    }

    pub fn position(&self) -> Vec3 {
        let (sin_phi, cos_phi) = self.phi.sin_cos();
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        self.target
            + Vec3::new(
                self.radius * sin_phi * sin_theta,
                self.radius * cos_phi,
                self.radius * sin_phi * cos_theta,
            )
    }
}

#[cfg(test)]
mod tests {
    use super::{OrbitControls, OrbitParams};
    use foundation::math::{Vec2, Vec3};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn controls() -> OrbitControls {
        OrbitControls::new(Vec3::new(0.0, 1.0, 10.0), Vec3::ZERO, OrbitParams::default())
    }

    #[test]
    fn resting_controls_keep_position() {
        let mut orbit = controls();
        let p = orbit.update(0.016);
        assert_close(p.x, 0.0, 1e-12);
        assert_close(p.y, 1.0, 1e-12);
        assert_close(p.z, 10.0, 1e-12);
        assert!(orbit.is_settled());
    }

    #[test]
    fn drag_eases_toward_target_angle() {
        let mut orbit = controls();
        orbit.begin_drag(Vec2::new(100.0, 100.0));
        orbit.drag_to(Vec2::new(250.0, 100.0), 600.0);
        orbit.end_drag();

        let first = orbit.update(1.0 / 60.0);
        // Damped: the first frame only covers part of the quarter turn.
        assert!(first.x < 0.0);
        assert!(orbit.azimuth() > -0.5 * std::f64::consts::PI);

        for _ in 0..2000 {
            orbit.update(1.0 / 60.0);
        }
        assert!(orbit.is_settled());
        assert_close(orbit.azimuth(), -0.5 * std::f64::consts::PI, 1e-5);
        assert_close(orbit.position().length(), 101f64.sqrt(), 1e-9);
    }

    #[test]
    fn polar_angle_is_clamped() {
        let mut orbit = controls();
        orbit.begin_drag(Vec2::new(0.0, 0.0));
        orbit.drag_to(Vec2::new(0.0, 10_000.0), 100.0);
        for _ in 0..600 {
            orbit.update(0.1);
        }
        assert!(orbit.polar() >= OrbitParams::default().min_polar_rad);
    }

    #[test]
    fn moves_without_drag_are_ignored() {
        let mut orbit = controls();
        orbit.drag_to(Vec2::new(500.0, 500.0), 600.0);
        assert!(orbit.is_settled());
    }

    #[test]
    fn zero_damping_applies_immediately() {
        let params = OrbitParams {
            damping: 0.0,
            ..OrbitParams::default()
        };
        let mut orbit = OrbitControls::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, params);
        orbit.begin_drag(Vec2::new(0.0, 0.0));
        orbit.drag_to(Vec2::new(-150.0, 0.0), 600.0);
        orbit.update(0.0);
        assert_close(orbit.azimuth(), 0.5 * std::f64::consts::PI, 1e-12);
        assert!(orbit.is_settled());
    }
}
