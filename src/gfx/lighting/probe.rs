//! Box-projected reflection probes sampled in IBL mode.

use cgmath::Vector3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectionProbe {
    /// Capture point the environment map was rendered from.
    pub position: Vector3<f32>,
    /// Blend radius around `position`.
    pub radius: f32,
    /// World-space box the reflection rays are projected onto.
    pub box_min: Vector3<f32>,
    pub box_max: Vector3<f32>,
    pub intensity: f32,
}

impl ReflectionProbe {
    /// Probe centred in a box of the given half extents.
    pub fn new(position: Vector3<f32>, half_extent: Vector3<f32>) -> Self {
        let half_extent = Vector3::new(half_extent.x.abs(), half_extent.y.abs(), half_extent.z.abs());
        Self {
            position,
            radius: half_extent.x.max(half_extent.y).max(half_extent.z),
            box_min: position - half_extent,
            box_max: position + half_extent,
            intensity: 1.0,
        }
    }

    pub fn contains(&self, point: Vector3<f32>) -> bool {
        (0..3).all(|axis| point[axis] >= self.box_min[axis] && point[axis] <= self.box_max[axis])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_box_contains() {
        let probe = ReflectionProbe::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(2.0, 1.0, -1.0));
        assert_eq!(probe.box_min, Vector3::new(-1.0, -1.0, -1.0));
        assert_eq!(probe.radius, 2.0);
        assert!(probe.contains(Vector3::new(2.5, 0.5, 0.0)));
        assert!(!probe.contains(Vector3::new(3.5, 0.0, 0.0)));
    }
}
