//! # Scene Graph Nodes
//!
//! A [`SceneNode`] owns its children by value, so removing a node drops its
//! whole subtree. The parent link is a plain [`NodeId`], never a reference.
//!
//! World matrices are cached per node and refreshed by [`SceneNode::update`],
//! which walks the tree top-down once per frame:
//!
//! 1. a node is recomputed if it is dirty itself or any ancestor was
//! 2. recomputation also refreshes the sphere collider's world bounds
//! 3. the payload's transform mirror is synced on every visit
//!
//! Every transform setter marks the node dirty. New and duplicated nodes
//! start dirty, so their first update is always correct even when the
//! parent is clean.

use cgmath::{InnerSpace, Matrix4, Quaternion, SquareMatrix, Vector3};

use super::object::RenderObject;
use super::transform::Transform;
use crate::gfx::geometry::Aabb;

/// Stable identifier of a node within one scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Hands out increasing ids; 0 is reserved for the root.
#[derive(Debug)]
pub struct NodeIdAllocator {
    next: u64,
}

impl Default for NodeIdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl NodeIdAllocator {
    pub fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// Largest basis-vector length of `m`, i.e. the biggest axis scale.
pub fn max_axis_scale(m: &Matrix4<f32>) -> f32 {
    m.x.truncate()
        .magnitude()
        .max(m.y.truncate().magnitude())
        .max(m.z.truncate().magnitude())
}

/// Culling sphere in local space plus its derived world-space copy.
///
/// Non-uniform scale is folded into the radius by taking the largest axis,
/// which over-approximates the true ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereCollider {
    pub local_center: Vector3<f32>,
    pub local_radius: f32,
    world_center: Vector3<f32>,
    world_radius: f32,
}

impl SphereCollider {
    pub fn new(local_center: Vector3<f32>, local_radius: f32) -> Self {
        Self {
            local_center,
            local_radius,
            world_center: local_center,
            world_radius: local_radius,
        }
    }

    pub fn from_bounds(bounds: &Aabb) -> Self {
        Self::new(bounds.center(), bounds.radius())
    }

    pub fn world_center(&self) -> Vector3<f32> {
        self.world_center
    }

    pub fn world_radius(&self) -> f32 {
        self.world_radius
    }

    pub fn update_world(&mut self, world: &Matrix4<f32>) {
        self.world_center = (*world * self.local_center.extend(1.0)).truncate();
        self.world_radius = self.local_radius * max_axis_scale(world);
    }
}

pub struct SceneNode {
    id: NodeId,
    name: String,
    transform: Transform,
    world_matrix: Matrix4<f32>,
    dirty: bool,
    selected: bool,
    parent: Option<NodeId>,
    children: Vec<SceneNode>,
    object: Option<RenderObject>,
    collider: Option<SphereCollider>,
}

impl SceneNode {
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            transform: Transform::default(),
            world_matrix: Matrix4::identity(),
            dirty: true,
            selected: false,
            parent: None,
            children: Vec::new(),
            object: None,
            collider: None,
        }
    }

    /// Node carrying `object`, with a collider fitted to its model bounds.
    pub fn with_object(id: NodeId, name: impl Into<String>, object: RenderObject) -> Self {
        let mut node = Self::new(id, name);
        node.collider = Some(SphereCollider::from_bounds(&object.local_bounds()));
        node.object = Some(object);
        node
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn is_root(&self) -> bool {
        self.id == NodeId::ROOT
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.dirty = true;
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.transform.set_position(position);
        self.dirty = true;
    }

    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.transform.set_scale(scale);
        self.dirty = true;
    }

    pub fn set_rotation(&mut self, rotation: Quaternion<f32>) {
        self.transform.set_rotation(rotation);
        self.dirty = true;
    }

    pub fn set_rotation_euler(&mut self, degrees: [f32; 3]) {
        self.transform.set_rotation_euler(degrees);
        self.dirty = true;
    }

    /// Cached world matrix; only current after an update pass.
    pub fn world_matrix(&self) -> Matrix4<f32> {
        self.world_matrix
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    pub fn object(&self) -> Option<&RenderObject> {
        self.object.as_ref()
    }

    pub fn object_mut(&mut self) -> Option<&mut RenderObject> {
        self.object.as_mut()
    }

    pub fn set_object(&mut self, object: Option<RenderObject>) {
        self.object = object;
    }

    pub fn collider(&self) -> Option<&SphereCollider> {
        self.collider.as_ref()
    }

    /// Replacing the collider forces its world bounds to be recomputed.
    pub fn set_collider(&mut self, collider: Option<SphereCollider>) {
        self.collider = collider;
        self.dirty = true;
    }

    /// Refreshes cached world state for this subtree.
    pub fn update(&mut self, parent_world: &Matrix4<f32>, parent_dirty: bool) {
        let effective_dirty = self.dirty || parent_dirty;
        if effective_dirty {
            self.world_matrix = *parent_world * self.transform.model_matrix();
            if let Some(collider) = &mut self.collider {
                collider.update_world(&self.world_matrix);
            }
            self.dirty = false;
        }

        if let Some(object) = &mut self.object {
            object.sync_transform(&self.transform);
        }

        let world = self.world_matrix;
        for child in &mut self.children {
            child.update(&world, effective_dirty);
        }
    }

    /// Attaches `child` as the last child and returns its id.
    pub fn add_child(&mut self, mut child: SceneNode) -> NodeId {
        child.parent = Some(self.id);
        child.dirty = true;
        let id = child.id;
        self.children.push(child);
        id
    }

    /// Removes `id` from anywhere below this node and hands it back with its
    /// parent link cleared.
    pub fn detach(&mut self, id: NodeId) -> Option<SceneNode> {
        if let Some(index) = self.children.iter().position(|c| c.id == id) {
            let mut node = self.children.remove(index);
            node.parent = None;
            return Some(node);
        }
        self.children.iter_mut().find_map(|child| child.detach(id))
    }

    pub fn find(&self, id: NodeId) -> Option<&SceneNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    /// True if `id` is this node or one of its descendants.
    pub fn contains(&self, id: NodeId) -> bool {
        self.find(id).is_some()
    }

    /// Deep copy with fresh ids. Models are shared, GPU resources are not,
    /// and every copied node starts dirty and unselected.
    pub fn duplicate(&self, ids: &mut NodeIdAllocator) -> SceneNode {
        let id = ids.allocate();
        let children = self
            .children
            .iter()
            .map(|child| {
                let mut copy = child.duplicate(ids);
                copy.parent = Some(id);
                copy
            })
            .collect();

        SceneNode {
            id,
            name: self.name.clone(),
            transform: self.transform,
            world_matrix: self.world_matrix,
            dirty: true,
            selected: false,
            parent: self.parent,
            children,
            object: self.object.as_ref().map(RenderObject::duplicate),
            collider: self.collider,
        }
    }

    /// Pre-order traversal with depth, root at depth 0.
    pub fn walk<'a, F: FnMut(&'a SceneNode, usize)>(&'a self, f: &mut F) {
        self.walk_at(0, f);
    }

    fn walk_at<'a, F: FnMut(&'a SceneNode, usize)>(&'a self, depth: usize, f: &mut F) {
        f(self, depth);
        for child in &self.children {
            child.walk_at(depth + 1, f);
        }
    }

    pub fn walk_mut<F: FnMut(&mut SceneNode)>(&mut self, f: &mut F) {
        f(self);
        for child in &mut self.children {
            child.walk_mut(f);
        }
    }

    /// Number of nodes in this subtree, including itself.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(SceneNode::subtree_len).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{Deg, Rotation3};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn assert_matrix_eq(a: &Matrix4<f32>, b: &Matrix4<f32>) {
        let a: &[f32; 16] = a.as_ref();
        let b: &[f32; 16] = b.as_ref();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-3, max_relative = 1e-4);
        }
    }

    fn random_transform(rng: &mut StdRng) -> Transform {
        Transform::new(
            Vector3::new(
                rng.random_range(-5.0..5.0),
                rng.random_range(-5.0..5.0),
                rng.random_range(-5.0..5.0),
            ),
            Quaternion::from_angle_y(Deg(rng.random_range(-180.0..180.0)))
                * Quaternion::from_angle_x(Deg(rng.random_range(-180.0..180.0))),
            Vector3::new(
                rng.random_range(0.5..2.0),
                rng.random_range(0.5..2.0),
                rng.random_range(0.5..2.0),
            ),
        )
    }

    /// Random tree of `count` nodes below a root, each attached under a
    /// randomly chosen existing node.
    fn random_tree(rng: &mut StdRng, count: usize) -> (SceneNode, Vec<NodeId>) {
        let mut ids = NodeIdAllocator::default();
        let mut root = SceneNode::new(NodeId::ROOT, "root");
        let mut all = vec![NodeId::ROOT];
        for i in 0..count {
            let parent = all[rng.random_range(0..all.len())];
            let mut node = SceneNode::new(ids.allocate(), format!("node {}", i));
            node.set_transform(random_transform(rng));
            if rng.random_bool(0.5) {
                node.set_collider(Some(SphereCollider::new(Vector3::new(0.0, 0.0, 0.0), 1.0)));
            }
            let id = root.find_mut(parent).unwrap().add_child(node);
            all.push(id);
        }
        (root, all)
    }

    fn assert_world_matches_ancestor_chain(node: &SceneNode, parent_world: Matrix4<f32>) {
        let expected = parent_world * node.transform().model_matrix();
        assert_matrix_eq(&node.world_matrix(), &expected);
        for child in node.children() {
            assert_world_matches_ancestor_chain(child, expected);
        }
    }

    #[test]
    fn test_update_composes_ancestor_chain() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let (mut root, _) = random_tree(&mut rng, 30);
            root.update(&Matrix4::identity(), true);
            assert_world_matches_ancestor_chain(&root, Matrix4::identity());
        }
    }

    #[test]
    fn test_second_update_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(11);
        let (mut root, ids) = random_tree(&mut rng, 40);
        root.update(&Matrix4::identity(), true);

        let before: Vec<Matrix4<f32>> = ids
            .iter()
            .map(|id| root.find(*id).unwrap().world_matrix())
            .collect();
        root.update(&Matrix4::identity(), false);

        for (id, world) in ids.iter().zip(before) {
            let node = root.find(*id).unwrap();
            assert_eq!(node.world_matrix(), world);
            assert!(!node.is_dirty());
        }
    }

    #[test]
    fn test_dirty_ancestor_recomputes_clean_descendants() {
        let mut rng = StdRng::seed_from_u64(23);
        let (mut root, ids) = random_tree(&mut rng, 40);
        root.update(&Matrix4::identity(), true);

        // Pick an interior node and move it
        let interior = ids
            .iter()
            .copied()
            .find(|id| *id != NodeId::ROOT && !root.find(*id).unwrap().children().is_empty())
            .unwrap();
        root.find_mut(interior)
            .unwrap()
            .set_position(Vector3::new(100.0, -50.0, 25.0));

        let descendants: Vec<NodeId> = {
            let mut out = Vec::new();
            root.find(interior).unwrap().walk(&mut |n, depth| {
                if depth > 0 {
                    out.push(n.id());
                }
            });
            out
        };
        for id in &descendants {
            assert!(!root.find(*id).unwrap().is_dirty());
        }

        root.update(&Matrix4::identity(), false);
        assert_world_matches_ancestor_chain(&root, Matrix4::identity());
    }

    #[test]
    fn test_new_child_of_clean_parent_is_computed() {
        let mut root = SceneNode::new(NodeId::ROOT, "root");
        root.set_position(Vector3::new(1.0, 2.0, 3.0));
        root.update(&Matrix4::identity(), true);

        let mut ids = NodeIdAllocator::default();
        let mut child = SceneNode::new(ids.allocate(), "late");
        child.set_position(Vector3::new(1.0, 0.0, 0.0));
        let id = root.add_child(child);
        assert!(root.find(id).unwrap().is_dirty());

        root.update(&Matrix4::identity(), false);
        let world = root.find(id).unwrap().world_matrix();
        assert_eq!(world.w.truncate(), Vector3::new(2.0, 2.0, 3.0));
    }

    #[test]
    fn test_collider_radius_uses_largest_axis() {
        let mut node = SceneNode::new(NodeId::ROOT, "root");
        node.set_collider(Some(SphereCollider::new(Vector3::new(1.0, 0.0, 0.0), 2.0)));
        node.set_position(Vector3::new(0.0, 5.0, 0.0));
        node.set_scale(Vector3::new(1.0, 3.0, 0.5));
        node.update(&Matrix4::identity(), false);

        let collider = node.collider().unwrap();
        assert_relative_eq!(collider.world_radius(), 6.0, epsilon = 1e-5);
        assert_eq!(collider.world_center(), Vector3::new(1.0, 5.0, 0.0));
    }

    #[test]
    fn test_duplicate_assigns_fresh_ids_and_marks_dirty() {
        let mut rng = StdRng::seed_from_u64(3);
        let (mut root, _) = random_tree(&mut rng, 10);
        root.update(&Matrix4::identity(), true);
        root.set_selected(true);

        let mut ids = NodeIdAllocator::default();
        // Skip past every id already in the tree
        for _ in 0..=10 {
            ids.allocate();
        }
        let copy = root.duplicate(&mut ids);

        assert_eq!(copy.subtree_len(), root.subtree_len());
        copy.walk(&mut |node, _| {
            assert!(node.is_dirty());
            assert!(!node.is_selected());
            assert!(!root.contains(node.id()));
        });
        for child in copy.children() {
            assert_eq!(child.parent(), Some(copy.id()));
        }
    }

    fn cube_object() -> RenderObject {
        use crate::gfx::geometry::generate_cube;
        use crate::gfx::scene::{Material, Model};
        use std::rc::Rc;

        let model = Model::from_geometry("cube", &generate_cube(1.0), Material::default());
        RenderObject::new(Rc::new(model))
    }

    #[test]
    fn test_update_mirrors_local_transform_into_object() {
        let mut ids = NodeIdAllocator::default();
        let mut root = SceneNode::new(NodeId::ROOT, "root");
        let group = root.add_child(SceneNode::new(ids.allocate(), "group"));
        let cube = root
            .find_mut(group)
            .unwrap()
            .add_child(SceneNode::with_object(ids.allocate(), "cube", cube_object()));
        root.update(&Matrix4::identity(), true);

        let node = root.find_mut(cube).unwrap();
        node.set_position(Vector3::new(4.0, -1.0, 2.5));
        node.set_scale(Vector3::new(2.0, 0.5, 3.0));
        node.set_rotation(Quaternion::from_angle_z(Deg(35.0)));
        root.update(&Matrix4::identity(), false);

        let node = root.find(cube).unwrap();
        assert_eq!(node.object().unwrap().transform(), node.transform());

        // A stale mirror under a moved parent is refreshed even though the
        // node itself is clean.
        root.find_mut(cube)
            .unwrap()
            .object_mut()
            .unwrap()
            .sync_transform(&Transform::default());
        root.find_mut(group)
            .unwrap()
            .set_position(Vector3::new(0.0, 10.0, 0.0));
        assert!(!root.find(cube).unwrap().is_dirty());
        root.update(&Matrix4::identity(), false);

        let node = root.find(cube).unwrap();
        assert_eq!(node.object().unwrap().transform(), node.transform());
        assert_eq!(node.transform().position(), Vector3::new(4.0, -1.0, 2.5));
    }

    #[test]
    fn test_detach_removes_subtree() {
        let mut ids = NodeIdAllocator::default();
        let mut root = SceneNode::new(NodeId::ROOT, "root");
        let a = root.add_child(SceneNode::new(ids.allocate(), "a"));
        let b = root
            .find_mut(a)
            .unwrap()
            .add_child(SceneNode::new(ids.allocate(), "b"));

        let detached = root.detach(a).unwrap();
        assert_eq!(detached.parent(), None);
        assert!(detached.contains(b));
        assert!(!root.contains(a));
        assert!(!root.contains(b));
        assert!(root.detach(a).is_none());
    }

    #[test]
    fn test_rotation_propagates_to_child_position() {
        let mut ids = NodeIdAllocator::default();
        let mut root = SceneNode::new(NodeId::ROOT, "root");
        root.set_rotation(Quaternion::from_angle_y(Deg(90.0)));
        let mut child = SceneNode::new(ids.allocate(), "child");
        child.set_position(Vector3::new(1.0, 0.0, 0.0));
        let id = root.add_child(child);
        root.update(&Matrix4::identity(), true);

        let p = root.find(id).unwrap().world_matrix().w.truncate();
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, -1.0, epsilon = 1e-5);
    }
}
