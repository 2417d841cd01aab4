//! # Bounding Volumes
//!
//! Axis-aligned boxes for picking, spheres for culling, and the six-plane
//! view frustum both are tested against.
//!
//! The frustum is extracted from a view-projection matrix that already
//! includes the wgpu clip-space correction, so the near plane is `z = 0`
//! rather than `z = -w`.

use cgmath::{InnerSpace, Matrix, Matrix4, Vector3, Vector4};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Aabb {
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point. An empty iterator yields a
    /// zero-sized box at the origin.
    pub fn from_points(points: impl IntoIterator<Item = Vector3<f32>>) -> Self {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.0));
        };
        iter.fold(Self::new(first, first), |mut acc, p| {
            acc.min = Vector3::new(acc.min.x.min(p.x), acc.min.y.min(p.y), acc.min.z.min(p.z));
            acc.max = Vector3::new(acc.max.x.max(p.x), acc.max.y.max(p.y), acc.max.z.max(p.z));
            acc
        })
    }

    pub fn center(&self) -> Vector3<f32> {
        (self.min + self.max) * 0.5
    }

    /// Distance from the centre to a corner.
    pub fn radius(&self) -> f32 {
        (self.max - self.min).magnitude() * 0.5
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::from_points([self.min, self.max, other.min, other.max])
    }

    /// Slab test. Returns the distance along `direction` (in units of its
    /// length) to the entry point, or to the exit point when the origin is
    /// inside the box. Misses and boxes entirely behind the origin yield `None`.
    pub fn intersect_ray(&self, origin: Vector3<f32>, direction: Vector3<f32>) -> Option<f32> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;

        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            if d.abs() < f32::EPSILON {
                // Parallel to this slab: must already lie between its planes.
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let mut t0 = (self.min[axis] - o) * inv;
            let mut t1 = (self.max[axis] - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }

        if t_max < 0.0 {
            return None;
        }
        Some(if t_min >= 0.0 { t_min } else { t_max })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vector3<f32>,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: Vector3<f32>, radius: f32) -> Self {
        Self { center, radius }
    }
}

impl From<Aabb> for BoundingSphere {
    fn from(aabb: Aabb) -> Self {
        Self::new(aabb.center(), aabb.radius())
    }
}

/// Plane `normal . p + d = 0` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub d: f32,
}

impl Plane {
    /// Normalises `(a, b, c, d)`. A degenerate row produces a plane with a
    /// zero normal whose distance is always 0, so it never culls anything.
    pub fn from_vec4(v: Vector4<f32>) -> Self {
        let normal = v.truncate();
        let length = normal.magnitude();
        if length < 1e-8 {
            return Self {
                normal: Vector3::new(0.0, 0.0, 0.0),
                d: 0.0,
            };
        }
        Self {
            normal: normal / length,
            d: v.w / length,
        }
    }

    pub fn signed_distance(&self, point: Vector3<f32>) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// Six inward-facing planes: left, right, bottom, top, near, far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    pub fn from_view_projection(m: &Matrix4<f32>) -> Self {
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);

        Self {
            planes: [
                Plane::from_vec4(r3 + r0),
                Plane::from_vec4(r3 - r0),
                Plane::from_vec4(r3 + r1),
                Plane::from_vec4(r3 - r1),
                // Depth range is [0, 1]
                Plane::from_vec4(r2),
                Plane::from_vec4(r3 - r2),
            ],
        }
    }

    /// False only when the sphere lies entirely on the negative side of at
    /// least one plane.
    pub fn intersects_sphere(&self, center: Vector3<f32>, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(center) >= -radius)
    }

    pub fn contains_point(&self, point: Vector3<f32>) -> bool {
        self.intersects_sphere(point, 0.0)
    }
}
