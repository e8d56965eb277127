//! Perspective camera and the zoom/orbit rig around it.
//!
//! Every field that feeds the projection is private. The only way to change
//! fov, aspect or zoom is through a setter that recomputes the projection
//! matrix before returning, so a render can never observe a stale frustum.

use foundation::math::{Mat4, Vec2, Vec3, mat4_look_at_rh, mat4_mul, mat4_perspective_rh_z0};
use scene::picking::Ray;

use crate::orbit::{OrbitControls, OrbitParams};

#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    fov_deg: f64,
    aspect: f64,
    zoom: f64,
    near: f64,
    far: f64,
    position: Vec3,
    target: Vec3,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(fov_deg: f64, aspect: f64, near: f64, far: f64) -> Self {
        let mut camera = Self {
            fov_deg,
            aspect: sanitize_aspect(aspect),
            zoom: 1.0,
            near,
            far,
            position: Vec3::new(0.0, 0.0, 10.0),
            target: Vec3::ZERO,
            projection: [[0.0; 4]; 4],
        };
        camera.update_projection();
        camera
    }

    pub fn fov_deg(&self) -> f64 {
        self.fov_deg
    }

    pub fn aspect(&self) -> f64 {
        self.aspect
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn near(&self) -> f64 {
        self.near
    }

    pub fn far(&self) -> f64 {
        self.far
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Vertical fov after the zoom multiplier, in radians.
    pub fn effective_fov_rad(&self) -> f64 {
        let half = 0.5 * self.fov_deg.to_radians();
        2.0 * (half.tan() / self.zoom).atan()
    }

    pub fn set_fov(&mut self, fov_deg: f64) {
        self.fov_deg = fov_deg;
        self.update_projection();
    }

    pub fn set_aspect(&mut self, aspect: f64) {
        self.aspect = sanitize_aspect(aspect);
        self.update_projection();
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
        self.update_projection();
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    fn update_projection(&mut self) {
        self.projection =
            mat4_perspective_rh_z0(self.effective_fov_rad(), self.aspect, self.near, self.far);
    }

    pub fn view(&self) -> Mat4 {
        mat4_look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn view_proj(&self) -> Mat4 {
        mat4_mul(self.projection, self.view())
    }

    // Orthonormal camera basis: (right, up, forward).
    fn basis(&self) -> Option<(Vec3, Vec3, Vec3)> {
        let forward = (self.target - self.position).normalized()?;
        let right = forward.cross(Vec3::Y).normalized()?;
        let up = right.cross(forward);
        Some((right, up, forward))
    }

    /// A point given in the camera's (right, up, back) frame, in world space.
    pub fn camera_to_world(&self, offset: Vec3) -> Vec3 {
        match self.basis() {
            Some((right, up, forward)) => {
                self.position + right.scale(offset.x) + up.scale(offset.y)
                    - forward.scale(offset.z)
            }
            None => self.position + offset,
        }
    }

    /// World-space ray from the eye through a point in normalized device coordinates.
    pub fn ray_through_ndc(&self, ndc: Vec2) -> Option<Ray> {
        if !(ndc.x.is_finite() && ndc.y.is_finite()) {
            return None;
        }
        let (right, up, forward) = self.basis()?;
        let tan_half = (0.5 * self.effective_fov_rad()).tan();
        let dir = forward
            + right.scale(ndc.x * tan_half * self.aspect)
            + up.scale(ndc.y * tan_half);
        Some(Ray::new(self.position, dir.normalized()?))
    }

    /// Inverse of [`Self::ray_through_ndc`]. `None` for points at or behind the near plane.
    pub fn world_to_ndc(&self, p: Vec3) -> Option<Vec2> {
        let (right, up, forward) = self.basis()?;
        let rel = p - self.position;
        let depth = rel.dot(forward);
        if depth <= self.near {
            return None;
        }
        let tan_half = (0.5 * self.effective_fov_rad()).tan();
        Some(Vec2::new(
            rel.dot(right) / (depth * tan_half * self.aspect),
            rel.dot(up) / (depth * tan_half),
        ))
    }
}

fn sanitize_aspect(aspect: f64) -> f64 {
    if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ZoomLimits {
    pub fov_step_deg: f64,
    pub min_fov_deg: f64,
    pub max_fov_deg: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            fov_step_deg: 5.0,
            min_fov_deg: 20.0,
            max_fov_deg: 75.0,
            min_zoom: 0.5,
            max_zoom: 4.0,
        }
    }
}

/// Camera plus its two zoom entry points and drag-to-orbit.
///
/// Pan and wheel zoom are not offered; framing changes only through
/// [`CameraRig::zoom_in`], [`CameraRig::zoom_out`] and
/// [`CameraRig::apply_discrete_zoom`].
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRig {
    camera: PerspectiveCamera,
    limits: ZoomLimits,
    orbit: OrbitControls,
}

impl CameraRig {
    pub fn new(camera: PerspectiveCamera, limits: ZoomLimits, orbit: OrbitParams) -> Self {
        let orbit = OrbitControls::new(camera.position(), camera.target(), orbit);
        let fov = camera.fov_deg().clamp(limits.min_fov_deg, limits.max_fov_deg);
        let mut rig = Self {
            camera,
            limits,
            orbit,
        };
        rig.camera.set_fov(fov);
        rig
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn limits(&self) -> ZoomLimits {
        self.limits
    }

    pub fn orbit(&self) -> &OrbitControls {
        &self.orbit
    }

    /// Narrow the fov by one step. Returns `false` when already at the clamp.
    pub fn zoom_in(&mut self) -> bool {
        self.step_fov(-self.limits.fov_step_deg)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.step_fov(self.limits.fov_step_deg)
    }

    fn step_fov(&mut self, delta_deg: f64) -> bool {
        let current = self.camera.fov_deg();
        let next = (current + delta_deg).clamp(self.limits.min_fov_deg, self.limits.max_fov_deg);
        if next == current {
            return false;
        }
        self.camera.set_fov(next);
        true
    }

    /// Set the absolute zoom multiplier, clamped to the configured range.
    pub fn apply_discrete_zoom(&mut self, factor: f64) -> bool {
        if !factor.is_finite() {
            return false;
        }
        let next = factor.clamp(self.limits.min_zoom, self.limits.max_zoom);
        if next == self.camera.zoom() {
            return false;
        }
        self.camera.set_zoom(next);
        true
    }

    pub fn set_aspect(&mut self, aspect: f64) {
        self.camera.set_aspect(aspect);
    }

    pub fn begin_drag(&mut self, pos: Vec2) {
        self.orbit.begin_drag(pos);
    }

    pub fn drag_to(&mut self, pos: Vec2, viewport_height: f64) {
        self.orbit.drag_to(pos, viewport_height);
    }

    pub fn end_drag(&mut self) {
        self.orbit.end_drag();
    }

    /// Advance orbit damping by `dt_s` and move the camera accordingly.
    pub fn update(&mut self, dt_s: f64) {
        let position = self.orbit.update(dt_s);
        self.camera.set_position(position);
        self.camera.look_at(self.orbit.target());
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraRig, PerspectiveCamera, ZoomLimits};
    use crate::orbit::OrbitParams;
    use foundation::math::{Vec2, Vec3, mat4_perspective_rh_z0};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn rig() -> CameraRig {
        let mut camera = PerspectiveCamera::new(47.5, 16.0 / 9.0, 0.1, 110.0);
        camera.set_position(Vec3::new(0.0, 1.0, 10.0));
        CameraRig::new(camera, ZoomLimits::default(), OrbitParams::default())
    }

    #[test]
    fn setters_keep_projection_current() {
        let mut camera = PerspectiveCamera::new(47.5, 1.0, 0.1, 110.0);
        camera.set_aspect(2.0);
        camera.set_fov(30.0);
        let expected = mat4_perspective_rh_z0(30f64.to_radians(), 2.0, 0.1, 110.0);
        for (col, expected_col) in camera.projection().iter().zip(expected.iter()) {
            for (a, b) in col.iter().zip(expected_col.iter()) {
                assert_close(f64::from(*a), f64::from(*b), 1e-6);
            }
        }

        camera.set_zoom(2.0);
        assert!(camera.projection()[1][1] > expected[1][1]);
    }

    #[test]
    fn invalid_aspect_falls_back_to_square() {
        let mut camera = PerspectiveCamera::new(47.5, 1.5, 0.1, 110.0);
        camera.set_aspect(0.0);
        assert_eq!(camera.aspect(), 1.0);
        camera.set_aspect(f64::NAN);
        assert_eq!(camera.aspect(), 1.0);
    }

    #[test]
    fn zoom_in_then_out_restores_fov() {
        let mut rig = rig();
        let start = rig.camera().fov_deg();
        assert!(rig.zoom_in());
        assert_close(rig.camera().fov_deg(), start - 5.0, 1e-12);
        assert!(rig.zoom_out());
        assert_close(rig.camera().fov_deg(), start, 1e-12);
    }

    #[test]
    fn zoom_saturates_at_clamp() {
        let mut rig = rig();
        for _ in 0..20 {
            rig.zoom_in();
        }
        assert_eq!(rig.camera().fov_deg(), 20.0);
        assert!(!rig.zoom_in());
        assert_eq!(rig.camera().fov_deg(), 20.0);

        for _ in 0..20 {
            rig.zoom_out();
        }
        assert_eq!(rig.camera().fov_deg(), 75.0);
        assert!(!rig.zoom_out());
    }

    #[test]
    fn discrete_zoom_is_absolute_and_clamped() {
        let mut rig = rig();
        assert!(rig.apply_discrete_zoom(2.0));
        assert_eq!(rig.camera().zoom(), 2.0);
        assert!(!rig.apply_discrete_zoom(2.0));
        rig.apply_discrete_zoom(10.0);
        assert_eq!(rig.camera().zoom(), 4.0);
        rig.apply_discrete_zoom(0.01);
        assert_eq!(rig.camera().zoom(), 0.5);
        assert!(!rig.apply_discrete_zoom(f64::NAN));
    }

    #[test]
    fn ndc_ray_and_projection_agree() {
        let mut camera = PerspectiveCamera::new(47.5, 1.6, 0.1, 110.0);
        camera.set_position(Vec3::new(0.0, 1.0, 10.0));
        let p = Vec3::new(1.2, -0.4, 2.5);
        let ndc = camera.world_to_ndc(p).expect("in front");
        let ray = camera.ray_through_ndc(ndc).expect("ray");

        // `p` lies on the ray.
        let rel = p - ray.origin;
        let t = rel.dot(ray.dir);
        let off = rel - ray.dir.scale(t);
        assert!(off.length() < 1e-9);
    }

    #[test]
    fn center_ray_points_at_target() {
        let camera = PerspectiveCamera::new(47.5, 1.0, 0.1, 110.0);
        let ray = camera.ray_through_ndc(Vec2::new(0.0, 0.0)).expect("ray");
        assert_close(ray.dir.z, -1.0, 1e-12);
        assert_eq!(camera.world_to_ndc(Vec3::new(0.0, 0.0, 20.0)), None);
    }

    #[test]
    fn initial_fov_is_clamped_into_limits() {
        let camera = PerspectiveCamera::new(90.0, 1.0, 0.1, 110.0);
        let rig = CameraRig::new(camera, ZoomLimits::default(), OrbitParams::default());
        assert_eq!(rig.camera().fov_deg(), 75.0);
    }
}
