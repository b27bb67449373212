//! Scene graph
//!
//! A slotmap-backed node hierarchy. Keys stay stable across removals, so a
//! caller can hold a [`NodeKey`] without worrying about index invalidation;
//! accessing a removed node simply returns `None`.

use nalgebra::Matrix4;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Stable handle to a scene node
    pub struct NodeKey;
}

/// One node in the hierarchy
pub struct SceneNode {
    pub name: String,
    /// Transform relative to the parent
    pub transform: Matrix4<f32>,
    /// Index into the caller's mesh table, if this node draws anything
    pub mesh: Option<usize>,
    pub parent: Option<NodeKey>,
    pub children: Vec<NodeKey>,
}

/// Node hierarchy with stable keys
#[derive(Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeKey, SceneNode>,
    roots: Vec<NodeKey>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node under `parent`, or as a root when `parent` is `None`
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        transform: Matrix4<f32>,
        mesh: Option<usize>,
        parent: Option<NodeKey>,
    ) -> NodeKey {
        let key = self.nodes.insert(SceneNode {
            name: name.into(),
            transform,
            mesh,
            parent,
            children: Vec::new(),
        });

        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent_node) => parent_node.children.push(key),
            None => self.roots.push(key),
        }

        key
    }

    pub fn get(&self, key: NodeKey) -> Option<&SceneNode> {
        self.nodes.get(key)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut SceneNode> {
        self.nodes.get_mut(key)
    }

    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Composed transform from the root down to `key`
    pub fn world_transform(&self, key: NodeKey) -> Option<Matrix4<f32>> {
        let node = self.nodes.get(key)?;
        let local = node.transform;
        match node.parent {
            Some(parent) => self.world_transform(parent).map(|world| world * local),
            None => Some(local),
        }
    }

    /// Remove a node and all of its descendants. Held keys to removed nodes
    /// become dangling and resolve to `None`.
    pub fn remove_subtree(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.remove(key) else {
            return;
        };

        match node.parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent_node) => parent_node.children.retain(|&c| c != key),
            None => self.roots.retain(|&r| r != key),
        }

        let mut pending = node.children;
        while let Some(child) = pending.pop() {
            if let Some(child_node) = self.nodes.remove(child) {
                pending.extend(child_node.children);
            }
        }
    }

    /// Iterate nodes depth-first, yielding each key with its world transform
    pub fn walk(&self) -> Vec<(NodeKey, Matrix4<f32>)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(NodeKey, Matrix4<f32>)> = self
            .roots
            .iter()
            .rev()
            .map(|&key| (key, Matrix4::identity()))
            .collect();

        while let Some((key, parent_world)) = stack.pop() {
            if let Some(node) = self.nodes.get(key) {
                let world = parent_world * node.transform;
                out.push((key, world));
                for &child in node.children.iter().rev() {
                    stack.push((child, world));
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn translation(x: f32, y: f32, z: f32) -> Matrix4<f32> {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    #[test]
    fn world_transform_composes_down_the_chain() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node("root", translation(1.0, 0.0, 0.0), None, None);
        let child = graph.add_node("child", translation(0.0, 2.0, 0.0), Some(0), Some(root));

        let world = graph.world_transform(child).expect("node exists");
        assert_relative_eq!(world[(0, 3)], 1.0);
        assert_relative_eq!(world[(1, 3)], 2.0);
    }

    #[test]
    fn keys_stay_valid_after_unrelated_removal() {
        let mut graph = SceneGraph::new();
        let a = graph.add_node("a", Matrix4::identity(), None, None);
        let b = graph.add_node("b", Matrix4::identity(), None, None);

        graph.remove_subtree(a);
        assert!(graph.get(a).is_none());
        assert_eq!(graph.get(b).expect("b survives").name, "b");
    }

    #[test]
    fn remove_subtree_takes_descendants() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node("root", Matrix4::identity(), None, None);
        let child = graph.add_node("child", Matrix4::identity(), None, Some(root));
        let grandchild = graph.add_node("grandchild", Matrix4::identity(), None, Some(child));
        let other = graph.add_node("other", Matrix4::identity(), None, None);

        graph.remove_subtree(root);
        assert!(graph.get(root).is_none());
        assert!(graph.get(child).is_none());
        assert!(graph.get(grandchild).is_none());
        assert!(graph.get(other).is_some());
        assert_eq!(graph.roots(), &[other]);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn walk_visits_every_node_with_world_transforms() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node("root", translation(1.0, 0.0, 0.0), None, None);
        graph.add_node("child", translation(0.0, 1.0, 0.0), None, Some(root));

        let visited = graph.walk();
        assert_eq!(visited.len(), 2);
        let (_, child_world) = visited[1];
        assert_relative_eq!(child_world[(0, 3)], 1.0);
        assert_relative_eq!(child_world[(1, 3)], 1.0);
    }
}
