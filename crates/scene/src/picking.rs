use foundation::math::Vec3;
use foundation::math::precision::stable_total_cmp_f64;

use crate::entity::MarkerId;
use crate::graph::MarkerGroup;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.dir.scale(t)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickHit {
    pub marker: MarkerId,
    pub distance: f64,
    pub point: Vec3,
}

/// Ray cast against the marker group only.
///
/// Ordering contract:
/// - The closest entry point along the (normalized) ray wins.
/// - Equal distances resolve to the lower `MarkerId`.
///
/// An empty group, a degenerate ray or a non-finite ray is always a miss.
pub fn pick_markers(group: &MarkerGroup<'_>, ray: Ray, marker_radius: f64) -> Option<PickHit> {
    if group.is_empty() || !marker_radius.is_finite() || marker_radius <= 0.0 {
        return None;
    }
    let dir = ray.dir.normalized()?;
    if !finite(ray.origin) || !finite(dir) {
        return None;
    }
    let ray = Ray::new(ray.origin, dir);

    let mut best: Option<(f64, MarkerId)> = None;
    for (id, center) in group.world_positions() {
        let Some(t) = ray_sphere_hit_t(ray, center, marker_radius) else {
            continue;
        };
        best = match best {
            None => Some((t, id)),
            Some((bt, bid)) => {
                let ord = stable_total_cmp_f64(t, bt).then_with(|| id.cmp(&bid));
                if ord.is_lt() { Some((t, id)) } else { Some((bt, bid)) }
            }
        };
    }

    let (t, marker) = best?;
    Some(PickHit {
        marker,
        distance: t,
        point: ray.at(t),
    })
}

/// Screen picking wrapper.
///
/// The caller supplies the screen->ray mapping via `make_ray`.
pub fn pick_screen<F>(
    group: &MarkerGroup<'_>,
    x_px: f64,
    y_px: f64,
    marker_radius: f64,
    make_ray: F,
) -> Option<PickHit>
where
    F: FnOnce(f64, f64) -> Option<Ray>,
{
    let ray = make_ray(x_px, y_px)?;
    pick_markers(group, ray, marker_radius)
}

fn finite(v: Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

// `dir` must be unit length. Returns the entry distance, or 0 when the origin is inside.
fn ray_sphere_hit_t(ray: Ray, center: Vec3, radius: f64) -> Option<f64> {
    let oc = ray.origin - center;
    let b = oc.dot(ray.dir);
    let c = oc.dot(oc) - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let t_near = -b - sq;
    let t_far = -b + sq;
    if t_far < 0.0 {
        return None;
    }
    Some(t_near.max(0.0))
}
