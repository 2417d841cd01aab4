use cgmath::Vector3;

use super::light::{Light, LightType};
use super::probe::ReflectionProbe;

/// Slots per light type in the lights uniform block.
pub const MAX_LIGHTS_PER_KIND: usize = 8;
pub const MAX_REFLECTION_PROBES: usize = 8;

/// Insertion-ordered lights grouped by type, plus reflection probes.
///
/// Collections may grow past the uniform capacity; only the first
/// [`MAX_LIGHTS_PER_KIND`] visible lights of each type are ever uploaded.
#[derive(Default)]
pub struct LightRegistry {
    directional: Vec<Light>,
    point: Vec<Light>,
    spot: Vec<Light>,
    probes: Vec<ReflectionProbe>,
}

impl LightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, light_type: LightType) -> &Vec<Light> {
        match light_type {
            LightType::Directional => &self.directional,
            LightType::Point => &self.point,
            LightType::Spot => &self.spot,
        }
    }

    fn collection_mut(&mut self, light_type: LightType) -> &mut Vec<Light> {
        match light_type {
            LightType::Directional => &mut self.directional,
            LightType::Point => &mut self.point,
            LightType::Spot => &mut self.spot,
        }
    }

    /// Appends the light to its type's collection and returns where it went.
    pub fn add(&mut self, light: Light) -> (LightType, usize) {
        let light_type = light.light_type();
        let lights = self.collection_mut(light_type);
        lights.push(light);
        if lights.len() > MAX_LIGHTS_PER_KIND {
            log::warn!(
                "{} light #{} exceeds the {} uploaded per frame",
                light_type.label(),
                lights.len(),
                MAX_LIGHTS_PER_KIND
            );
        }
        (light_type, lights.len() - 1)
    }

    pub fn remove(&mut self, light_type: LightType, index: usize) -> Option<Light> {
        let lights = self.collection_mut(light_type);
        (index < lights.len()).then(|| lights.remove(index))
    }

    pub fn get(&self, light_type: LightType, index: usize) -> Option<&Light> {
        self.collection(light_type).get(index)
    }

    pub fn get_mut(&mut self, light_type: LightType, index: usize) -> Option<&mut Light> {
        self.collection_mut(light_type).get_mut(index)
    }

    pub fn lights(&self, light_type: LightType) -> &[Light] {
        self.collection(light_type)
    }

    pub fn lights_mut(&mut self, light_type: LightType) -> &mut [Light] {
        self.collection_mut(light_type)
    }

    /// The lights that reach the GPU this frame, in slot order.
    pub fn packed(&self, light_type: LightType) -> impl Iterator<Item = &Light> {
        self.collection(light_type)
            .iter()
            .filter(|light| light.visible)
            .take(MAX_LIGHTS_PER_KIND)
    }

    pub fn packed_mut(&mut self, light_type: LightType) -> impl Iterator<Item = &mut Light> {
        self.collection_mut(light_type)
            .iter_mut()
            .filter(|light| light.visible)
            .take(MAX_LIGHTS_PER_KIND)
    }

    pub fn len(&self) -> usize {
        self.directional.len() + self.point.len() + self.spot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn update_shadow_matrices(&mut self, focus: Vector3<f32>) {
        for light_type in LightType::ALL {
            for light in self.collection_mut(light_type) {
                light.update_shadow(focus);
            }
        }
    }

    pub fn probes(&self) -> &[ReflectionProbe] {
        &self.probes
    }

    pub fn probes_mut(&mut self) -> &mut [ReflectionProbe] {
        &mut self.probes
    }

    pub fn add_probe(&mut self, probe: ReflectionProbe) -> usize {
        self.probes.push(probe);
        if self.probes.len() > MAX_REFLECTION_PROBES {
            log::warn!(
                "reflection probe #{} exceeds the {} uploaded per frame",
                self.probes.len(),
                MAX_REFLECTION_PROBES
            );
        }
        self.probes.len() - 1
    }

    pub fn remove_probe(&mut self, index: usize) -> Option<ReflectionProbe> {
        (index < self.probes.len()).then(|| self.probes.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_groups_by_type_in_insertion_order() {
        let mut registry = LightRegistry::new();
        assert_eq!(
            registry.add(Light::point(Vector3::new(1.0, 0.0, 0.0), 5.0, 64)),
            (LightType::Point, 0)
        );
        assert_eq!(
            registry.add(Light::directional(-Vector3::unit_y(), 64)),
            (LightType::Directional, 0)
        );
        assert_eq!(
            registry.add(Light::point(Vector3::new(2.0, 0.0, 0.0), 5.0, 64)),
            (LightType::Point, 1)
        );

        assert_eq!(registry.len(), 3);
        let second = registry.get(LightType::Point, 1).unwrap();
        assert_eq!(second.kind().position(), Some(Vector3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_packing_caps_at_max() {
        let mut registry = LightRegistry::new();
        for i in 0..10 {
            registry.add(Light::point(Vector3::new(i as f32, 0.0, 0.0), 5.0, 64));
        }
        assert_eq!(registry.lights(LightType::Point).len(), 10);
        assert_eq!(registry.packed(LightType::Point).count(), MAX_LIGHTS_PER_KIND);
    }

    #[test]
    fn test_hidden_lights_are_not_packed() {
        let mut registry = LightRegistry::new();
        for i in 0..3 {
            registry.add(Light::point(Vector3::new(i as f32, 0.0, 0.0), 5.0, 64));
        }
        registry.get_mut(LightType::Point, 0).unwrap().visible = false;

        let packed: Vec<_> = registry
            .packed(LightType::Point)
            .map(|light| light.kind().position().unwrap().x)
            .collect();
        assert_eq!(packed, vec![1.0, 2.0]);
    }

    #[test]
    fn test_remove_out_of_range_is_none() {
        let mut registry = LightRegistry::new();
        registry.add(Light::directional(-Vector3::unit_y(), 64));
        assert!(registry.remove(LightType::Directional, 3).is_none());
        assert!(registry.remove(LightType::Directional, 0).is_some());
        assert!(registry.is_empty());
        assert!(registry.remove_probe(0).is_none());
    }
}
