use foundation::math::Vec3;

/// Local transform: scale, then rotation about +Y, then translation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation_y: f64,
    pub scale: [f64; 3],
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation_y: 0.0,
            scale: [1.0, 1.0, 1.0],
        }
    }

    pub fn translate(position: Vec3) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    pub fn scaled(scale: [f64; 3]) -> Self {
        Self {
            scale,
            ..Self::identity()
        }
    }

    /// Map a point from this transform's local frame into its parent frame.
    pub fn apply(&self, p: Vec3) -> Vec3 {
        let scaled = Vec3::new(p.x * self.scale[0], p.y * self.scale[1], p.z * self.scale[2]);
        scaled.rotate_y(self.rotation_y) + self.position
    }

    /// `parent * self`, assuming rotations only about +Y.
    pub fn then_parent(&self, parent: &Transform) -> Transform {
        Transform {
            position: parent.apply(self.position),
            rotation_y: parent.rotation_y + self.rotation_y,
            scale: [
                parent.scale[0] * self.scale[0],
                parent.scale[1] * self.scale[1],
                parent.scale[2] * self.scale[2],
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Transform;
    use foundation::math::Vec3;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn identity_is_origin() {
        let transform = Transform::identity();
        assert_eq!(transform.position, Vec3::ZERO);
        assert_eq!(transform.apply(Vec3::new(1.0, 2.0, 3.0)), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn child_of_rotated_parent_rotates_with_it() {
        let mut parent = Transform::identity();
        parent.rotation_y = std::f64::consts::PI;
        let child = Transform::translate(Vec3::new(2.0, 0.0, 0.0));
        let world = child.then_parent(&parent);
        assert_close(world.position.x, -2.0, 1e-12);
        assert_close(world.position.z, 0.0, 1e-12);
        assert_close(world.rotation_y, std::f64::consts::PI, 1e-12);
    }
}
