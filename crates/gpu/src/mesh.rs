/// Interleaved vertex for lit, textured spheres.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SphereVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SphereMesh {
    pub vertices: Vec<SphereVertex>,
    pub indices: Vec<u32>,
}

/// UV sphere of unit radius.
///
/// Vertices follow the same lat/lon convention as the geographic projector,
/// so an equirectangular map lines up with projected markers: `u = 0` at
/// longitude -180, `v = 0` at the north pole.
pub fn generate_sphere_mesh(lat_segments: u32, lon_segments: u32) -> SphereMesh {
    let lat_segments = lat_segments.max(3);
    let lon_segments = lon_segments.max(3);

    let mut vertices = Vec::with_capacity(((lat_segments + 1) * (lon_segments + 1)) as usize);
    for lat in 0..=lat_segments {
        let v = lat as f32 / lat_segments as f32;
        let phi = v * std::f32::consts::PI;
        let (sin_phi, cos_phi) = phi.sin_cos();

        for lon in 0..=lon_segments {
            let u = lon as f32 / lon_segments as f32;
            let theta = u * std::f32::consts::TAU;
            let (sin_theta, cos_theta) = theta.sin_cos();

            let p = [-sin_phi * cos_theta, cos_phi, sin_phi * sin_theta];
            vertices.push(SphereVertex {
                position: p,
                normal: p,
                uv: [u, v],
            });
        }
    }

    let stride = lon_segments + 1;
    let mut indices = Vec::with_capacity((lat_segments * lon_segments * 6) as usize);
    for lat in 0..lat_segments {
        for lon in 0..lon_segments {
            let i0 = lat * stride + lon;
            let i1 = i0 + 1;
            let i2 = i0 + stride;
            let i3 = i2 + 1;

            // Degenerate triangles at the poles are skipped.
            if lat != 0 {
                indices.extend_from_slice(&[i0, i2, i1]);
            }
            if lat != lat_segments - 1 {
                indices.extend_from_slice(&[i1, i2, i3]);
            }
        }
    }

    SphereMesh { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::generate_sphere_mesh;
    use foundation::math::project;

    #[test]
    fn vertices_lie_on_unit_sphere() {
        let mesh = generate_sphere_mesh(16, 32);
        assert_eq!(mesh.vertices.len(), 17 * 33);
        for v in &mesh.vertices {
            let [x, y, z] = v.position;
            let len = (x * x + y * y + z * z).sqrt();
            assert!((len - 1.0).abs() < 1e-5);
        }
        let max = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < max));
        assert_eq!(mesh.indices.len() % 3, 0);
    }

    #[test]
    fn uv_matches_geographic_projection() {
        let mesh = generate_sphere_mesh(4, 8);
        // Row 2 is the equator; column 2 is u = 0.25, i.e. longitude -90.
        let v = mesh.vertices[2 * 9 + 2];
        assert_eq!(v.uv, [0.25, 0.5]);
        let expected = project(0.0, -90.0, 1.0).expect("valid");
        assert!((f64::from(v.position[0]) - expected.x).abs() < 1e-6);
        assert!((f64::from(v.position[1]) - expected.y).abs() < 1e-6);
        assert!((f64::from(v.position[2]) - expected.z).abs() < 1e-6);
    }

    #[test]
    fn segment_counts_have_a_floor() {
        let mesh = generate_sphere_mesh(0, 1);
        assert_eq!(mesh.vertices.len(), 4 * 4);
    }
}
