//! # Primitive Shape Generation
//!
//! All shapes are centred on the origin with outward normals.

use std::f32::consts::PI;

use super::GeometryData;

/// Axis-aligned cube spanning `[-half_extent, half_extent]` on every axis.
///
/// Each face has its own four vertices so normals stay flat.
pub fn generate_cube(half_extent: f32) -> GeometryData {
    // (normal, tangent, bitangent) with tangent x bitangent = normal
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    const CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut data = GeometryData::default();
    for (normal, tangent, bitangent) in FACES {
        let base = data.positions.len() as u32;
        for (u, v) in CORNERS {
            let position = [
                (normal[0] + u * tangent[0] + v * bitangent[0]) * half_extent,
                (normal[1] + u * tangent[1] + v * bitangent[1]) * half_extent,
                (normal[2] + u * tangent[2] + v * bitangent[2]) * half_extent,
            ];
            data.positions.push(position);
            data.normals.push(normal);
        }
        data.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    data
}

/// UV sphere with `longitude_segments` around Y and `latitude_segments` pole to pole.
pub fn generate_sphere(radius: f32, longitude_segments: u32, latitude_segments: u32) -> GeometryData {
    let longitude_segments = longitude_segments.max(3);
    let latitude_segments = latitude_segments.max(2);
    let mut data = GeometryData::default();

    for lat in 0..=latitude_segments {
        let theta = lat as f32 * PI / latitude_segments as f32;
        let (sin_theta, cos_theta) = theta.sin_cos();
        for lon in 0..=longitude_segments {
            let phi = lon as f32 * 2.0 * PI / longitude_segments as f32;
            let (sin_phi, cos_phi) = phi.sin_cos();
            let normal = [sin_theta * cos_phi, cos_theta, sin_theta * sin_phi];
            data.positions
                .push([normal[0] * radius, normal[1] * radius, normal[2] * radius]);
            data.normals.push(normal);
        }
    }

    let stride = longitude_segments + 1;
    for lat in 0..latitude_segments {
        for lon in 0..longitude_segments {
            let a = lat * stride + lon;
            let b = a + stride;
            data.indices.extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
        }
    }
    data
}

/// Flat plane in XZ facing +Y.
pub fn generate_plane(width: f32, depth: f32, width_segments: u32, depth_segments: u32) -> GeometryData {
    let width_segments = width_segments.max(1);
    let depth_segments = depth_segments.max(1);
    let mut data = GeometryData::default();

    for row in 0..=depth_segments {
        let z = -depth * 0.5 + depth * row as f32 / depth_segments as f32;
        for col in 0..=width_segments {
            let x = -width * 0.5 + width * col as f32 / width_segments as f32;
            data.positions.push([x, 0.0, z]);
            data.normals.push([0.0, 1.0, 0.0]);
        }
    }

    let stride = width_segments + 1;
    for row in 0..depth_segments {
        for col in 0..width_segments {
            let a = row * stride + col;
            let b = a + stride;
            data.indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Vector3};

    fn triangle_normal(data: &GeometryData, tri: usize) -> Vector3<f32> {
        let p = |i: usize| Vector3::from(data.positions[data.indices[tri * 3 + i] as usize]);
        (p(1) - p(0)).cross(p(2) - p(0))
    }

    fn assert_outward_winding(data: &GeometryData) {
        for tri in 0..data.triangle_count() {
            let face = triangle_normal(data, tri);
            if face.magnitude2() < 1e-12 {
                continue; // collapsed triangles at the sphere poles
            }
            let n = Vector3::from(data.normals[data.indices[tri * 3] as usize]);
            assert!(face.dot(n) > 0.0, "triangle {} is wound inward", tri);
        }
    }

    #[test]
    fn test_cube_bounds_and_counts() {
        let cube = generate_cube(1.0);
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);

        let bounds = cube.bounds();
        assert_eq!(bounds.min, Vector3::new(-1.0, -1.0, -1.0));
        assert_eq!(bounds.max, Vector3::new(1.0, 1.0, 1.0));
        assert_outward_winding(&cube);
    }

    #[test]
    fn test_sphere_is_on_radius() {
        let sphere = generate_sphere(2.0, 16, 8);
        for p in &sphere.positions {
            assert!((Vector3::from(*p).magnitude() - 2.0).abs() < 1e-4);
        }
        assert_outward_winding(&sphere);
    }

    #[test]
    fn test_plane_faces_up() {
        let plane = generate_plane(4.0, 2.0, 2, 2);
        assert_eq!(plane.vertex_count(), 9);
        assert_eq!(plane.triangle_count(), 8);
        assert_outward_winding(&plane);

        let bounds = plane.bounds();
        assert_eq!(bounds.min, Vector3::new(-2.0, 0.0, -1.0));
        assert_eq!(bounds.max, Vector3::new(2.0, 0.0, 1.0));
    }
}
