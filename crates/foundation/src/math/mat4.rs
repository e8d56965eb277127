//! Column-major 4x4 matrix helpers (WGSL layout, right-handed, depth in [0, 1]).

use super::Vec3;

pub type Mat4 = [[f32; 4]; 4];

pub const MAT4_IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Column-major matrix multiply: `a * b`.
pub fn mat4_mul(a: Mat4, b: Mat4) -> Mat4 {
    let mut c = [[0.0f32; 4]; 4];
    for col in 0..4 {
        for row in 0..4 {
            c[col][row] = a[0][row] * b[col][0]
                + a[1][row] * b[col][1]
                + a[2][row] * b[col][2]
                + a[3][row] * b[col][3];
        }
    }
    c
}

pub fn mat4_mul_vec4(m: Mat4, v: [f32; 4]) -> [f32; 4] {
    let mut out = [0.0f32; 4];
    for (row, slot) in out.iter_mut().enumerate() {
        *slot = m[0][row] * v[0] + m[1][row] * v[1] + m[2][row] * v[2] + m[3][row] * v[3];
    }
    out
}

pub fn mat4_perspective_rh_z0(fov_y_rad: f64, aspect: f64, near: f64, far: f64) -> Mat4 {
    let f = 1.0 / (0.5 * fov_y_rad).tan();
    let m00 = (f / aspect) as f32;
    let m11 = f as f32;
    let m22 = (far / (near - far)) as f32;
    let m23 = ((near * far) / (near - far)) as f32;

    // Column-major form of:
    // [ m00,  0,   0,   0 ]
    // [  0,  m11,  0,   0 ]
    // [  0,   0,  m22, m23 ]
    // [  0,   0,  -1,   0 ]
    [
        [m00, 0.0, 0.0, 0.0],
        [0.0, m11, 0.0, 0.0],
        [0.0, 0.0, m22, -1.0],
        [0.0, 0.0, m23, 0.0],
    ]
}

pub fn mat4_look_at_rh(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let f = (target - eye).normalized().unwrap_or(Vec3::new(0.0, 0.0, -1.0));
    let s = f.cross(up).normalized().unwrap_or(Vec3::new(1.0, 0.0, 0.0));
    let u = s.cross(f);

    let ex = -s.dot(eye);
    let ey = -u.dot(eye);
    let ez = f.dot(eye);

    [
        [s.x as f32, u.x as f32, (-f.x) as f32, 0.0],
        [s.y as f32, u.y as f32, (-f.y) as f32, 0.0],
        [s.z as f32, u.z as f32, (-f.z) as f32, 0.0],
        [ex as f32, ey as f32, ez as f32, 1.0],
    ]
}

/// Model matrix: uniform `scale`, then rotation about +Y, then translation.
pub fn mat4_model(translation: Vec3, rotation_y_rad: f64, scale: [f64; 3]) -> Mat4 {
    let (s, c) = rotation_y_rad.sin_cos();
    [
        [(c * scale[0]) as f32, 0.0, (-s * scale[0]) as f32, 0.0],
        [0.0, scale[1] as f32, 0.0, 0.0],
        [(s * scale[2]) as f32, 0.0, (c * scale[2]) as f32, 0.0],
        [
            translation.x as f32,
            translation.y as f32,
            translation.z as f32,
            1.0,
        ],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32, eps: f32) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn identity_is_neutral() {
        let m = mat4_perspective_rh_z0(1.0, 1.5, 0.1, 100.0);
        assert_eq!(mat4_mul(MAT4_IDENTITY, m), m);
        assert_eq!(mat4_mul(m, MAT4_IDENTITY), m);
    }

    #[test]
    fn perspective_maps_near_and_far_to_unit_depth() {
        let m = mat4_perspective_rh_z0(1.0, 1.0, 0.5, 50.0);
        let near = mat4_mul_vec4(m, [0.0, 0.0, -0.5, 1.0]);
        let far = mat4_mul_vec4(m, [0.0, 0.0, -50.0, 1.0]);
        assert_close(near[2] / near[3], 0.0, 1e-5);
        assert_close(far[2] / far[3], 1.0, 1e-5);
    }

    #[test]
    fn look_at_puts_target_on_negative_z() {
        let view = mat4_look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let p = mat4_mul_vec4(view, [0.0, 0.0, 0.0, 1.0]);
        assert_close(p[0], 0.0, 1e-6);
        assert_close(p[1], 0.0, 1e-6);
        assert_close(p[2], -10.0, 1e-5);
    }

    #[test]
    fn model_matrix_matches_vector_rotation() {
        let angle = 0.7;
        let v = Vec3::new(1.0, 2.0, 3.0);
        let m = mat4_model(Vec3::ZERO, angle, [1.0, 1.0, 1.0]);
        let p = mat4_mul_vec4(m, [1.0, 2.0, 3.0, 1.0]);
        let r = v.rotate_y(angle);
        assert_close(p[0], r.x as f32, 1e-5);
        assert_close(p[1], r.y as f32, 1e-5);
        assert_close(p[2], r.z as f32, 1e-5);
    }
}
