//! The editor's world: node tree, camera, lights and render flags.
//!
//! All state the renderer reads lives here and is passed to it by
//! reference, so there are no process-wide globals. Structural edits return
//! a [`SceneError`] and leave the tree untouched when refused.

use std::rc::Rc;

use cgmath::{Matrix4, SquareMatrix, Vector3};

use super::node::{NodeId, NodeIdAllocator, SceneNode};
use super::object::{Model, RenderObject};
use super::transform::Transform;
use crate::assets::AssetManager;
use crate::error::SceneError;
use crate::gfx::camera::Camera;
use crate::gfx::geometry::Frustum;
use crate::gfx::lighting::{Light, LightRegistry, LightType};
use crate::gfx::picking::{pick_node, MouseRay};
use crate::gfx::rendering::settings::{RenderMode, RenderSettings};

/// A model path waiting to be loaded at the end of the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLoad {
    pub path: String,
    pub parent: NodeId,
}

pub struct Scene {
    root: SceneNode,
    ids: NodeIdAllocator,
    pub camera: Camera,
    pub lights: LightRegistry,
    pub settings: RenderSettings,
    /// Centre of the area directional shadow maps cover.
    pub shadow_focus: Vector3<f32>,
    pending_loads: Vec<PendingLoad>,
    structure_changed: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(Camera::default())
    }
}

impl Scene {
    pub fn new(camera: Camera) -> Self {
        Self {
            root: SceneNode::new(NodeId::ROOT, "Root"),
            ids: NodeIdAllocator::default(),
            camera,
            lights: LightRegistry::new(),
            settings: RenderSettings::default(),
            shadow_focus: Vector3::new(0.0, 0.0, 0.0),
            pending_loads: Vec::new(),
            structure_changed: true,
        }
    }

    pub fn root(&self) -> &SceneNode {
        &self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.root.find(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.root.find_mut(id)
    }

    /// Number of nodes including the root.
    pub fn node_count(&self) -> usize {
        self.root.subtree_len()
    }

    fn node_or_err(&mut self, id: NodeId) -> Result<&mut SceneNode, SceneError> {
        self.root.find_mut(id).ok_or(SceneError::NodeNotFound(id))
    }

    pub fn add_node(&mut self, parent: NodeId, name: &str) -> Result<NodeId, SceneError> {
        let node = SceneNode::new(self.ids.allocate(), name);
        self.attach(parent, node)
    }

    /// Adds a node displaying `model`, with a collider fitted to its bounds.
    pub fn add_object_node(
        &mut self,
        parent: NodeId,
        name: &str,
        model: Rc<Model>,
    ) -> Result<NodeId, SceneError> {
        let node = SceneNode::with_object(self.ids.allocate(), name, RenderObject::new(model));
        self.attach(parent, node)
    }

    fn attach(&mut self, parent: NodeId, node: SceneNode) -> Result<NodeId, SceneError> {
        let parent_node = self
            .root
            .find_mut(parent)
            .ok_or(SceneError::ParentNotFound(parent))?;
        let id = parent_node.add_child(node);
        log::debug!("Added node {:?} under {:?}", id, parent);
        Ok(id)
    }

    /// Removes `id` and its whole subtree.
    pub fn remove_node(&mut self, id: NodeId) -> Result<SceneNode, SceneError> {
        if id == NodeId::ROOT {
            return Err(SceneError::RootRemoval);
        }
        let parent = self
            .root
            .find(id)
            .ok_or(SceneError::NodeNotFound(id))?
            .parent()
            .ok_or(SceneError::ParentNotFound(id))?;
        let removed = self
            .node_or_err(parent)?
            .detach(id)
            .ok_or(SceneError::NodeNotFound(id))?;
        log::debug!("Removed node {:?} ({} nodes)", id, removed.subtree_len());
        Ok(removed)
    }

    /// Deep-copies `id` next to the original. The copy shares models, gets
    /// fresh ids and a unique name, and replaces the original in the
    /// selection.
    pub fn duplicate_node(&mut self, id: NodeId) -> Result<NodeId, SceneError> {
        if id == NodeId::ROOT {
            return Err(SceneError::RootImmutable("duplicated"));
        }
        let original = self.root.find(id).ok_or(SceneError::NodeNotFound(id))?;
        let parent = original.parent().ok_or(SceneError::ParentNotFound(id))?;
        let mut copy = original.duplicate(&mut self.ids);
        copy.set_name(self.ensure_unique_name(original.name()));

        let was_selected = original.is_selected();
        copy.set_selected(was_selected);
        let copy_id = self.attach(parent, copy)?;
        if was_selected {
            self.node_or_err(id)?.set_selected(false);
        }
        Ok(copy_id)
    }

    /// Moves `id` under `new_parent`, keeping its local transform.
    pub fn reparent(&mut self, id: NodeId, new_parent: NodeId) -> Result<(), SceneError> {
        if id == NodeId::ROOT {
            return Err(SceneError::RootImmutable("reparented"));
        }
        let node = self.root.find(id).ok_or(SceneError::NodeNotFound(id))?;
        if node.contains(new_parent) {
            return Err(SceneError::CyclicReparent {
                node: id,
                new_parent,
            });
        }
        if !self.root.contains(new_parent) {
            return Err(SceneError::ParentNotFound(new_parent));
        }
        if node.parent() == Some(new_parent) {
            return Ok(());
        }

        let detached = self.remove_node(id)?;
        self.attach(new_parent, detached)?;
        self.structure_changed = true;
        Ok(())
    }

    /// `base` if no node uses it yet, otherwise the first free `"stem (n)"`.
    pub fn ensure_unique_name(&self, base: &str) -> String {
        let mut taken = Vec::new();
        self.root.walk(&mut |node, _| taken.push(node.name()));
        if !taken.contains(&base) {
            return base.to_owned();
        }

        let stem = strip_copy_suffix(base);
        (1..)
            .map(|n| format!("{} ({})", stem, n))
            .find(|candidate| !taken.contains(&candidate.as_str()))
            .unwrap_or_else(|| base.to_owned())
    }

    pub fn set_node_transform(&mut self, id: NodeId, transform: Transform) -> Result<(), SceneError> {
        self.node_or_err(id)?.set_transform(transform);
        Ok(())
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        if self.settings.mode != mode {
            log::debug!("Render mode set to {}", mode.label());
            self.settings.mode = mode;
        }
    }

    /// Refreshes the camera and every stale world matrix.
    pub fn update_scene_graph(&mut self) {
        self.camera.refresh();
        self.root
            .update(&Matrix4::identity(), std::mem::take(&mut self.structure_changed));
    }

    pub fn update_shadow_matrices(&mut self) {
        self.lights.update_shadow_matrices(self.shadow_focus);
    }

    pub fn frustum(&self) -> &Frustum {
        self.camera.frustum()
    }

    /// Selected nodes in traversal order.
    pub fn selection(&self) -> Vec<NodeId> {
        let mut selected = Vec::new();
        self.root.walk(&mut |node, _| {
            if node.is_selected() {
                selected.push(node.id());
            }
        });
        selected
    }

    pub fn has_selection(&self) -> bool {
        !self.selection().is_empty()
    }

    pub fn clear_selection(&mut self) {
        self.root.walk_mut(&mut |node| node.set_selected(false));
    }

    /// Applies a pick result to the selection.
    ///
    /// | hit  | multi-select | effect                       |
    /// |------|--------------|------------------------------|
    /// | none | off          | selection cleared            |
    /// | none | on           | unchanged                    |
    /// | node | on           | node toggled, others kept    |
    /// | node | off          | selection becomes just node  |
    pub fn apply_pick(&mut self, hit: Option<NodeId>, multi_select: bool) {
        match (hit, multi_select) {
            (None, false) => self.clear_selection(),
            (None, true) => {}
            (Some(id), true) => {
                if let Some(node) = self.root.find_mut(id) {
                    let selected = node.is_selected();
                    node.set_selected(!selected);
                }
            }
            (Some(id), false) => {
                self.clear_selection();
                if let Some(node) = self.root.find_mut(id) {
                    node.set_selected(true);
                }
            }
        }
    }

    /// Traces a ray through the pixel at `screen` and updates the selection.
    pub fn pick(
        &mut self,
        screen: (f32, f32),
        viewport: (f32, f32),
        multi_select: bool,
    ) -> Option<NodeId> {
        self.camera.refresh();
        let mut ray = MouseRay::from_screen(screen, viewport, &self.camera.view_projection());
        let hit = pick_node(&self.root, &mut ray).map(|hit| hit.node);
        self.apply_pick(hit, multi_select);
        hit
    }

    /// Queues `path` to be loaded under `parent` once the frame is done.
    pub fn queue_model_load(&mut self, path: impl Into<String>, parent: NodeId) {
        self.pending_loads.push(PendingLoad {
            path: path.into(),
            parent,
        });
    }

    pub fn pending_loads(&self) -> &[PendingLoad] {
        &self.pending_loads
    }

    /// Loads every queued model and adds a node for each. Failed loads are
    /// logged and dropped. A parent removed since queueing is replaced by
    /// the root.
    pub fn drain_pending_loads(&mut self, assets: &mut AssetManager) -> Vec<NodeId> {
        let mut added = Vec::new();
        for load in std::mem::take(&mut self.pending_loads) {
            let model = match assets.load_model(&load.path) {
                Ok(model) => model,
                Err(err) => {
                    log::error!("{}", err);
                    continue;
                }
            };
            let parent = if self.root.contains(load.parent) {
                load.parent
            } else {
                log::warn!("Parent {:?} of '{}' is gone, adding to root", load.parent, load.path);
                NodeId::ROOT
            };
            let name = self.ensure_unique_name(model.name());
            if let Ok(id) = self.add_object_node(parent, &name, model) {
                added.push(id);
            }
        }
        added
    }

    pub fn add_light(&mut self, light: Light) -> (LightType, usize) {
        let slot = self.lights.add(light);
        log::debug!("Added {} light #{}", slot.0.label(), slot.1);
        slot
    }

    pub fn remove_light(&mut self, light_type: LightType, index: usize) -> Option<Light> {
        self.lights.remove(light_type, index)
    }

    pub fn light_mut(&mut self, light_type: LightType, index: usize) -> Option<&mut Light> {
        self.lights.get_mut(light_type, index)
    }

    /// Mutable access to every node for GPU preparation.
    pub(crate) fn root_mut(&mut self) -> &mut SceneNode {
        &mut self.root
    }
}

fn strip_copy_suffix(name: &str) -> &str {
    if let Some(open) = name.rfind(" (") {
        let digits = &name[open + 2..];
        if let Some(number) = digits.strip_suffix(')') {
            if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
                return &name[..open];
            }
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::BUILTIN_CUBE;
    use crate::gfx::geometry::generate_cube;
    use crate::gfx::scene::Material;
    use approx::assert_relative_eq;

    fn cube() -> Rc<Model> {
        Rc::new(Model::from_geometry("Cube", &generate_cube(1.0), Material::default()))
    }

    #[test]
    fn test_end_to_end_update_and_pick() {
        let mut scene = Scene::default();
        let child = scene.add_object_node(NodeId::ROOT, "Cube", cube()).unwrap();
        scene
            .node_mut(child)
            .unwrap()
            .set_position(Vector3::new(5.0, 0.0, 0.0));
        scene.update_scene_graph();

        let world = scene.node(child).unwrap().world_matrix();
        assert_eq!(world.w.truncate(), Vector3::new(5.0, 0.0, 0.0));

        let mut ray = MouseRay::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(5.0, 0.0, 0.0));
        let hit = pick_node(scene.root(), &mut ray).unwrap();
        assert_eq!(hit.node, child);
        assert!(ray.hit);
        assert_relative_eq!(ray.distance, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_root_cannot_be_removed_or_duplicated() {
        let mut scene = Scene::default();
        assert_eq!(scene.remove_node(NodeId::ROOT).err(), Some(SceneError::RootRemoval));
        assert_eq!(
            scene.duplicate_node(NodeId::ROOT).err(),
            Some(SceneError::RootImmutable("duplicated"))
        );
        assert_eq!(scene.node_count(), 1);
    }

    #[test]
    fn test_remove_unknown_node_is_rejected() {
        let mut scene = Scene::default();
        scene.add_node(NodeId::ROOT, "a").unwrap();
        let missing = scene.ids.allocate();
        assert_eq!(scene.remove_node(missing).err(), Some(SceneError::NodeNotFound(missing)));
        assert_eq!(scene.node_count(), 2);
    }

    #[test]
    fn test_remove_drops_subtree() {
        let mut scene = Scene::default();
        let group = scene.add_node(NodeId::ROOT, "group").unwrap();
        let leaf = scene.add_object_node(group, "leaf", cube()).unwrap();

        let removed = scene.remove_node(group).unwrap();
        assert_eq!(removed.subtree_len(), 2);
        assert!(scene.node(leaf).is_none());
        assert_eq!(scene.node_count(), 1);
    }

    #[test]
    fn test_add_under_missing_parent_fails() {
        let mut scene = Scene::default();
        let missing = scene.ids.allocate();
        assert_eq!(
            scene.add_node(missing, "orphan").err(),
            Some(SceneError::ParentNotFound(missing))
        );
    }

    #[test]
    fn test_duplicate_names_and_shares_model() {
        let mut scene = Scene::default();
        let model = cube();
        let original = scene.add_object_node(NodeId::ROOT, "Cube", Rc::clone(&model)).unwrap();

        let first = scene.duplicate_node(original).unwrap();
        let second = scene.duplicate_node(first).unwrap();

        assert_eq!(scene.node(first).unwrap().name(), "Cube (1)");
        assert_eq!(scene.node(second).unwrap().name(), "Cube (2)");
        assert!(scene.node(second).unwrap().is_dirty());
        let shared = scene.node(second).unwrap().object().unwrap().model();
        assert!(Rc::ptr_eq(shared, &model));
    }

    #[test]
    fn test_duplicate_moves_selection_to_copy() {
        let mut scene = Scene::default();
        let original = scene.add_object_node(NodeId::ROOT, "Cube", cube()).unwrap();
        scene.apply_pick(Some(original), false);

        let copy = scene.duplicate_node(original).unwrap();
        assert_eq!(scene.selection(), vec![copy]);
    }

    #[test]
    fn test_reparent_rejects_cycles() {
        let mut scene = Scene::default();
        let a = scene.add_node(NodeId::ROOT, "a").unwrap();
        let b = scene.add_node(a, "b").unwrap();

        assert_eq!(
            scene.reparent(a, b).err(),
            Some(SceneError::CyclicReparent { node: a, new_parent: b })
        );
        assert_eq!(
            scene.reparent(a, a).err(),
            Some(SceneError::CyclicReparent { node: a, new_parent: a })
        );
        assert_eq!(
            scene.reparent(NodeId::ROOT, a).err(),
            Some(SceneError::RootImmutable("reparented"))
        );
        assert_eq!(scene.node(b).unwrap().parent(), Some(a));
    }

    #[test]
    fn test_reparent_moves_under_new_parent() {
        let mut scene = Scene::default();
        let a = scene.add_node(NodeId::ROOT, "a").unwrap();
        let b = scene.add_node(NodeId::ROOT, "b").unwrap();
        scene.node_mut(a).unwrap().set_position(Vector3::new(1.0, 0.0, 0.0));
        scene.node_mut(b).unwrap().set_position(Vector3::new(0.0, 2.0, 0.0));
        scene.update_scene_graph();

        scene.reparent(b, a).unwrap();
        scene.update_scene_graph();

        let b_node = scene.node(b).unwrap();
        assert_eq!(b_node.parent(), Some(a));
        assert_eq!(b_node.world_matrix().w.truncate(), Vector3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_selection_toggle_with_modifier() {
        let mut scene = Scene::default();
        let a = scene.add_object_node(NodeId::ROOT, "a", cube()).unwrap();
        let b = scene.add_object_node(NodeId::ROOT, "b", cube()).unwrap();

        scene.apply_pick(Some(a), false);
        scene.apply_pick(Some(b), true);
        assert_eq!(scene.selection(), vec![a, b]);

        scene.apply_pick(Some(b), true);
        assert_eq!(scene.selection(), vec![a]);

        scene.apply_pick(None, true);
        assert_eq!(scene.selection(), vec![a]);

        scene.apply_pick(Some(b), false);
        assert_eq!(scene.selection(), vec![b]);

        scene.apply_pick(None, false);
        assert!(scene.selection().is_empty());
    }

    #[test]
    fn test_pick_through_camera_selects_node() {
        let mut scene = Scene::new(Camera::new(cgmath::Point3::new(0.0, 0.0, 10.0), -90.0, 0.0, 1.0));
        let target = scene.add_object_node(NodeId::ROOT, "Cube", cube()).unwrap();
        scene.update_scene_graph();

        assert_eq!(scene.pick((50.0, 50.0), (100.0, 100.0), false), Some(target));
        assert_eq!(scene.selection(), vec![target]);

        assert_eq!(scene.pick((0.0, 0.0), (100.0, 100.0), false), None);
        assert!(scene.selection().is_empty());
    }

    #[test]
    fn test_drain_pending_loads() {
        let mut scene = Scene::default();
        let mut assets = AssetManager::new();
        scene.queue_model_load(BUILTIN_CUBE, NodeId::ROOT);
        scene.queue_model_load("missing/file.obj", NodeId::ROOT);
        scene.queue_model_load(BUILTIN_CUBE, NodeId::ROOT);

        let added = scene.drain_pending_loads(&mut assets);
        assert_eq!(added.len(), 2);
        assert!(scene.pending_loads().is_empty());
        assert_eq!(scene.node(added[1]).unwrap().name(), "Cube (1)");
        assert_eq!(assets.model_count(), 1);
    }

    #[test]
    fn test_strip_copy_suffix() {
        assert_eq!(strip_copy_suffix("Cube (3)"), "Cube");
        assert_eq!(strip_copy_suffix("Cube (x)"), "Cube (x)");
        assert_eq!(strip_copy_suffix("Cube"), "Cube");
    }

    #[test]
    fn test_lights_round_trip_through_scene() {
        let mut scene = Scene::default();
        let (kind, index) = scene.add_light(Light::point(Vector3::new(0.0, 3.0, 0.0), 8.0, 64));
        scene.light_mut(kind, index).unwrap().power = 5.0;
        scene.update_shadow_matrices();
        assert_eq!(scene.remove_light(kind, index).unwrap().power, 5.0);
    }
}
