//! Loaded scene graph: nodes, meshes, skins and the root orientation the
//! interaction loop rotates.

use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra::{Matrix4, Point3, Vector3};

use crate::animation::AnimationClip;
use crate::geometry::{Aabb, Mesh, Primitive};
use crate::transform::{transform_normal, NodeTransform, Orientation};

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Current local transform; animation writes here.
    pub transform: NodeTransform,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            transform: NodeTransform::identity(),
            mesh: None,
            skin: None,
        }
    }

    pub fn with_transform(mut self, transform: NodeTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_mesh(mut self, mesh: usize) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_skin(mut self, skin: usize) -> Self {
        self.skin = Some(skin);
        self
    }
}

/// Joint nodes and their inverse bind matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Matrix4<f32>>,
}

/// Root of a loaded asset. Rotating the model means changing `orientation`.
#[derive(Debug)]
pub struct Model {
    id: u64,
    nodes: Vec<Node>,
    /// Local transform of each node as loaded.
    rest_pose: Vec<NodeTransform>,
    roots: Vec<usize>,
    meshes: Vec<Mesh>,
    skins: Vec<Skin>,
    pub orientation: Orientation,
}

impl Model {
    pub fn new() -> Self {
        Self {
            id: NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
            rest_pose: Vec::new(),
            roots: Vec::new(),
            meshes: Vec::new(),
            skins: Vec::new(),
            orientation: Orientation::default(),
        }
    }

    /// A single-node model showing one mesh.
    pub fn from_mesh(mesh: Mesh) -> Self {
        let mut model = Self::new();
        let name = mesh.name.clone();
        let mesh = model.add_mesh(mesh);
        let node = model.add_node(Node::new(name).with_mesh(mesh), None);
        model.add_root(node);
        model
    }

    /// Identifies this model instance; renderers key GPU caches on it.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn add_skin(&mut self, skin: Skin) -> usize {
        self.skins.push(skin);
        self.skins.len() - 1
    }

    /// Insert a node, linking it under `parent` when given.
    pub fn add_node(&mut self, mut node: Node, parent: Option<usize>) -> usize {
        let index = self.nodes.len();
        node.parent = None;
        node.children.clear();
        self.rest_pose.push(node.transform);
        self.nodes.push(node);
        if let Some(parent) = parent {
            self.set_parent(index, parent);
        }
        index
    }

    /// Move `child` under `parent`. Out-of-range indices and self-parenting
    /// are ignored.
    pub fn set_parent(&mut self, child: usize, parent: usize) {
        if child == parent || child >= self.nodes.len() || parent >= self.nodes.len() {
            return;
        }
        if let Some(old) = self.nodes[child].parent.take() {
            self.nodes[old].children.retain(|&c| c != child);
        }
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    pub fn add_root(&mut self, node: usize) {
        if !self.roots.contains(&node) {
            self.roots.push(node);
        }
    }

    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    #[inline]
    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    #[inline]
    pub fn skins(&self) -> &[Skin] {
        &self.skins
    }

    /// Transform `node` had when it was added.
    pub fn rest_transform(&self, node: usize) -> Option<&NodeTransform> {
        self.rest_pose.get(node)
    }

    pub fn local_transform_mut(&mut self, node: usize) -> Option<&mut NodeTransform> {
        self.nodes.get_mut(node).map(|n| &mut n.transform)
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }

    /// Matrix applied on top of every node: the root orientation.
    pub fn root_matrix(&self) -> Matrix4<f32> {
        self.orientation.matrix()
    }

    /// World matrix of every node, root orientation included. `None` for
    /// nodes not reachable from a root; those are not part of the scene.
    pub fn world_matrices(&self) -> Vec<Option<Matrix4<f32>>> {
        let root = self.root_matrix();
        let mut world = vec![None; self.nodes.len()];
        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<(usize, Matrix4<f32>)> = self
            .roots
            .iter()
            .filter(|&&r| r < self.nodes.len())
            .map(|&r| (r, root))
            .collect();

        while let Some((index, parent)) = stack.pop() {
            if visited[index] {
                continue;
            }
            visited[index] = true;
            let node = &self.nodes[index];
            let matrix = parent * node.transform.matrix();
            world[index] = Some(matrix);
            for &child in &node.children {
                if child < self.nodes.len() {
                    stack.push((child, matrix));
                }
            }
        }
        world
    }

    /// Everything a renderer needs for this frame, one item per primitive.
    pub fn draw_items(&self) -> Vec<DrawItem<'_>> {
        let world = self.world_matrices();
        let mut items = Vec::new();

        for (index, node) in self.nodes.iter().enumerate() {
            let Some(node_world) = world[index] else {
                continue;
            };
            let Some(mesh) = node.mesh.and_then(|m| self.meshes.get(m)) else {
                continue;
            };
            let skin = node.skin.and_then(|s| self.skins.get(s));
            let joint_matrices = skin.map(|skin| joint_matrices(skin, &world));

            for primitive in &mesh.primitives {
                let item = match (&joint_matrices, &primitive.skin_weights) {
                    (Some(joints), Some(_)) => DrawItem {
                        primitive,
                        transform: Matrix4::identity(),
                        skinned: Some(skin_primitive(primitive, joints)),
                    },
                    _ => DrawItem {
                        primitive,
                        transform: node_world,
                        skinned: None,
                    },
                };
                items.push(item);
            }
        }
        items
    }

    /// Bounds of the current pose, in world space.
    pub fn bounds(&self) -> Option<Aabb> {
        let mut bounds: Option<Aabb> = None;
        for item in self.draw_items() {
            for p in item.positions() {
                let p = item.transform.transform_point(p);
                match bounds.as_mut() {
                    Some(b) => b.include(&p),
                    None => bounds = Some(Aabb::new(p, p)),
                }
            }
        }
        bounds
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

/// A clone is a separate instance and gets its own id, so renderer caches
/// never confuse it with the original.
impl Clone for Model {
    fn clone(&self) -> Self {
        Self {
            id: NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed),
            nodes: self.nodes.clone(),
            rest_pose: self.rest_pose.clone(),
            roots: self.roots.clone(),
            meshes: self.meshes.clone(),
            skins: self.skins.clone(),
            orientation: self.orientation,
        }
    }
}

/// One primitive placed in the world for the current frame.
#[derive(Debug, Clone)]
pub struct DrawItem<'a> {
    pub primitive: &'a Primitive,
    /// Model-to-world transform for `positions()`.
    pub transform: Matrix4<f32>,
    /// CPU-skinned vertices, already in world space.
    pub skinned: Option<SkinnedVertices>,
}

impl DrawItem<'_> {
    pub fn positions(&self) -> &[Point3<f32>] {
        match &self.skinned {
            Some(skinned) => &skinned.positions,
            None => &self.primitive.positions,
        }
    }

    pub fn normals(&self) -> &[Vector3<f32>] {
        match &self.skinned {
            Some(skinned) => &skinned.normals,
            None => &self.primitive.normals,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkinnedVertices {
    pub positions: Vec<Point3<f32>>,
    pub normals: Vec<Vector3<f32>>,
}

fn joint_matrices(skin: &Skin, world: &[Option<Matrix4<f32>>]) -> Vec<Matrix4<f32>> {
    skin.joints
        .iter()
        .enumerate()
        .map(|(slot, &joint)| {
            let joint_world = world
                .get(joint)
                .copied()
                .flatten()
                .unwrap_or_else(Matrix4::identity);
            let inverse_bind = skin
                .inverse_bind_matrices
                .get(slot)
                .copied()
                .unwrap_or_else(Matrix4::identity);
            joint_world * inverse_bind
        })
        .collect()
}

fn skin_primitive(primitive: &Primitive, joints: &[Matrix4<f32>]) -> SkinnedVertices {
    let Some(influences) = &primitive.skin_weights else {
        return SkinnedVertices {
            positions: primitive.positions.clone(),
            normals: primitive.normals.clone(),
        };
    };

    let mut positions = Vec::with_capacity(primitive.positions.len());
    let mut normals = Vec::with_capacity(primitive.normals.len());
    for (i, position) in primitive.positions.iter().enumerate() {
        let mut matrix = Matrix4::zeros();
        let mut total = 0.0;
        if let (Some(slots), Some(weights)) = (influences.joints.get(i), influences.weights.get(i)) {
            for (slot, weight) in slots.iter().zip(weights) {
                if *weight <= 0.0 {
                    continue;
                }
                if let Some(joint) = joints.get(usize::from(*slot)) {
                    matrix += joint * *weight;
                    total += weight;
                }
            }
        }
        let matrix = if total > 0.0 {
            matrix / total
        } else {
            Matrix4::identity()
        };

        positions.push(matrix.transform_point(position));
        let normal = primitive.normals.get(i).copied().unwrap_or_else(Vector3::y);
        normals.push(transform_normal(&matrix, &normal));
    }

    SkinnedVertices { positions, normals }
}

/// What a loader hands to the interaction loop.
#[derive(Debug, Clone)]
pub struct LoadedAsset {
    pub model: Model,
    pub clips: Vec<AnimationClip>,
}

impl LoadedAsset {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            clips: Vec::new(),
        }
    }

    pub fn with_clips(mut self, clips: Vec<AnimationClip>) -> Self {
        self.clips = clips;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SkinWeights;

    fn two_level_model() -> Model {
        let mut model = Model::new();
        let mesh = model.add_mesh(Mesh::new("cube").with_primitive(Primitive::cube(1.0)));
        let parent = model.add_node(
            Node::new("parent").with_transform(NodeTransform::from_trs(
                [0.0, 2.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
                [1.0, 1.0, 1.0],
            )),
            None,
        );
        model.add_root(parent);
        model.add_node(
            Node::new("child")
                .with_mesh(mesh)
                .with_transform(NodeTransform::from_trs(
                    [1.0, 0.0, 0.0],
                    [0.0, 0.0, 0.0, 1.0],
                    [1.0, 1.0, 1.0],
                )),
            Some(parent),
        );
        model
    }

    #[test]
    fn test_world_matrices_compose_parents() {
        let model = two_level_model();
        let world = model.world_matrices();
        let origin = world[1].unwrap().transform_point(&Point3::origin());
        assert!((origin - Point3::new(1.0, 2.0, 0.0)).norm() < 1e-6);
        assert_eq!(model.nodes()[0].children, vec![1]);
    }

    #[test]
    fn test_orientation_applies_to_whole_model() {
        let mut model = two_level_model();
        model.orientation.rotate(0.0, std::f32::consts::PI, 0.0);
        let world = model.world_matrices();
        let origin = world[1].unwrap().transform_point(&Point3::origin());
        assert!((origin - Point3::new(-1.0, 2.0, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn test_draw_items_one_per_primitive() {
        let model = two_level_model();
        let items = model.draw_items();
        assert_eq!(items.len(), 1);
        assert!(items[0].skinned.is_none());
        assert_eq!(model.triangle_count(), 12);
    }

    #[test]
    fn test_model_ids_are_unique() {
        assert_ne!(Model::new().id(), Model::new().id());
        let model = two_level_model();
        let copy = model.clone();
        assert_ne!(copy.id(), model.id());
        assert_eq!(copy.nodes(), model.nodes());
    }

    #[test]
    fn test_nodes_outside_roots_are_not_drawn() {
        let mut model = two_level_model();
        let mesh = model.add_mesh(Mesh::new("stray").with_primitive(Primitive::cube(1.0)));
        let stray = model.add_node(
            Node::new("stray")
                .with_mesh(mesh)
                .with_transform(NodeTransform::from_trs(
                    [100.0, 0.0, 0.0],
                    [0.0, 0.0, 0.0, 1.0],
                    [1.0, 1.0, 1.0],
                )),
            None,
        );

        assert!(model.world_matrices()[stray].is_none());
        assert_eq!(model.draw_items().len(), 1);
        let bounds = model.bounds().unwrap();
        assert!((bounds.center() - Point3::new(1.0, 2.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_rest_pose_survives_local_edits() {
        let mut model = two_level_model();
        model.local_transform_mut(1).unwrap().translation = Vector3::new(9.0, 9.0, 9.0);
        let rest = model.rest_transform(1).unwrap();
        assert_eq!(rest.translation, Vector3::new(1.0, 0.0, 0.0));
        assert!(model.rest_transform(5).is_none());
    }

    #[test]
    fn test_bounds_follow_node_transforms() {
        let bounds = two_level_model().bounds().unwrap();
        assert!((bounds.center() - Point3::new(1.0, 2.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_skinned_vertices_follow_joint() {
        let mut model = Model::new();
        let mut primitive = Primitive::cube(1.0);
        let count = primitive.positions.len();
        primitive.skin_weights = Some(SkinWeights {
            joints: vec![[0, 0, 0, 0]; count],
            weights: vec![[1.0, 0.0, 0.0, 0.0]; count],
        });
        let mesh = model.add_mesh(Mesh::new("skinned").with_primitive(primitive));
        let joint = model.add_node(Node::new("joint"), None);
        let skin = model.add_skin(Skin {
            joints: vec![joint],
            inverse_bind_matrices: vec![Matrix4::identity()],
        });
        let holder = model.add_node(Node::new("holder").with_mesh(mesh).with_skin(skin), None);
        model.add_root(joint);
        model.add_root(holder);

        model
            .local_transform_mut(joint)
            .unwrap()
            .translation = Vector3::new(0.0, 3.0, 0.0);

        let items = model.draw_items();
        let skinned = items[0].skinned.as_ref().unwrap();
        let bounds = Aabb::from_points(skinned.positions.iter()).unwrap();
        assert!((bounds.center() - Point3::new(0.0, 3.0, 0.0)).norm() < 1e-5);
    }
}
