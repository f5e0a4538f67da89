// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! An arena-backed scene hierarchy.
//!
//! Nodes live in one `Vec` in breadth-first order. Each node stores the range
//! of its children and the range of its mesh references as plain integers, so
//! the whole graph is trivially cloneable and serializable and parents always
//! precede their children.

use crate::math::Mat4;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A nested node description, the shape importers and tests build graphs from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDesc {
    /// Node name, used to place lights.
    pub name: String,
    /// Parent-relative transform.
    #[serde(default = "identity")]
    pub transform: Mat4,
    /// Indices into the mesh library instanced at this node.
    #[serde(default)]
    pub meshes: Vec<usize>,
    /// Child nodes.
    #[serde(default)]
    pub children: Vec<NodeDesc>,
}

fn identity() -> Mat4 {
    Mat4::IDENTITY
}

impl NodeDesc {
    /// A node with no mesh and no child.
    pub fn new(name: impl Into<String>, transform: Mat4) -> Self {
        Self {
            name: name.into(),
            transform,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Adds mesh references.
    pub fn with_meshes(mut self, meshes: impl IntoIterator<Item = usize>) -> Self {
        self.meshes.extend(meshes);
        self
    }

    /// Adds a child node.
    pub fn with_child(mut self, child: NodeDesc) -> Self {
        self.children.push(child);
        self
    }
}

/// A node stored in the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    /// Node name.
    pub name: String,
    /// Parent-relative transform.
    pub transform: Mat4,
    /// First entry in the graph's mesh-reference table.
    pub first_mesh: u32,
    /// Number of mesh references.
    pub mesh_count: u32,
    /// Index of the first child node.
    pub first_child: u32,
    /// Number of children.
    pub child_count: u32,
}

/// A mesh instance produced by flattening the graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatInstance {
    /// Index into the mesh library.
    pub mesh: usize,
    /// Accumulated local-to-world transform.
    pub world: Mat4,
}

/// The scene hierarchy. Node `0` is the root.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
    mesh_refs: Vec<usize>,
}

impl SceneGraph {
    /// Builds the arena from a nested description, breadth first.
    pub fn from_root(root: NodeDesc) -> Self {
        let mut graph = SceneGraph::default();
        graph.nodes.push(SceneNode {
            name: root.name.clone(),
            transform: root.transform,
            first_mesh: 0,
            mesh_count: 0,
            first_child: 0,
            child_count: 0,
        });

        let mut queue = VecDeque::from([(0usize, root)]);
        while let Some((index, desc)) = queue.pop_front() {
            let first_mesh = graph.mesh_refs.len() as u32;
            graph.mesh_refs.extend_from_slice(&desc.meshes);
            let first_child = graph.nodes.len() as u32;

            for child in desc.children {
                graph.nodes.push(SceneNode {
                    name: child.name.clone(),
                    transform: child.transform,
                    first_mesh: 0,
                    mesh_count: 0,
                    first_child: 0,
                    child_count: 0,
                });
                queue.push_back((graph.nodes.len() - 1, child));
            }

            let child_end = graph.nodes.len() as u32;
            let node = &mut graph.nodes[index];
            node.first_mesh = first_mesh;
            node.mesh_count = desc.meshes.len() as u32;
            node.first_child = first_child;
            node.child_count = child_end - first_child;
        }
        graph
    }

    /// All nodes, parents before children.
    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    /// Child indices of `node`.
    pub fn children(&self, node: usize) -> std::ops::Range<usize> {
        let n = &self.nodes[node];
        n.first_child as usize..(n.first_child + n.child_count) as usize
    }

    /// Mesh-library indices referenced by `node`.
    pub fn meshes_of(&self, node: usize) -> &[usize] {
        let n = &self.nodes[node];
        &self.mesh_refs[n.first_mesh as usize..(n.first_mesh + n.mesh_count) as usize]
    }

    /// Accumulates every node's world transform top-down.
    pub fn world_transforms(&self) -> Vec<Mat4> {
        let mut worlds = vec![Mat4::IDENTITY; self.nodes.len()];
        if let Some(root) = self.nodes.first() {
            worlds[0] = root.transform;
        }
        for index in 0..self.nodes.len() {
            let parent = worlds[index];
            for child in self.children(index) {
                worlds[child] = parent * self.nodes[child].transform;
            }
        }
        worlds
    }

    /// Every mesh instance with its world transform, in node order.
    pub fn flatten(&self) -> Vec<FlatInstance> {
        let worlds = self.world_transforms();
        (0..self.nodes.len())
            .flat_map(|node| {
                let world = worlds[node];
                self.meshes_of(node)
                    .iter()
                    .map(move |&mesh| FlatInstance { mesh, world })
            })
            .collect()
    }

    /// The world transform of the first node called `name`.
    pub fn world_transform_of(&self, name: &str) -> Option<Mat4> {
        let index = self.nodes.iter().position(|n| n.name == name)?;
        Some(self.world_transforms()[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;
    use approx::assert_relative_eq;

    fn translation(x: f32, y: f32, z: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(x, y, z))
    }

    fn sample() -> SceneGraph {
        SceneGraph::from_root(
            NodeDesc::new("root", translation(1.0, 0.0, 0.0))
                .with_child(
                    NodeDesc::new("arm", translation(0.0, 2.0, 0.0))
                        .with_meshes([0])
                        .with_child(
                            NodeDesc::new("hand", translation(0.0, 0.0, 3.0)).with_meshes([1, 2]),
                        ),
                )
                .with_child(NodeDesc::new("lamp", translation(-5.0, 0.0, 0.0))),
        )
    }

    #[test]
    fn test_breadth_first_layout() {
        let graph = sample();
        let names: Vec<_> = graph.nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["root", "arm", "lamp", "hand"]);
        assert_eq!(graph.children(0), 1..3);
        assert_eq!(graph.children(1), 3..4);
        assert!(graph.children(2).is_empty());
        assert_eq!(graph.meshes_of(3), &[1, 2]);
    }

    #[test]
    fn test_child_ranges_of_deep_chain() {
        let graph = SceneGraph::from_root(
            NodeDesc::new("a", Mat4::IDENTITY).with_child(
                NodeDesc::new("b", Mat4::IDENTITY)
                    .with_child(NodeDesc::new("c", Mat4::IDENTITY))
                    .with_child(NodeDesc::new("d", Mat4::IDENTITY).with_meshes([4])),
            ),
        );
        assert_eq!(graph.nodes().len(), 4);
        assert_eq!(graph.children(0), 1..2);
        assert_eq!(graph.children(1), 2..4);
        assert!(graph.children(2).is_empty());
        assert!(graph.children(3).is_empty());
        assert_eq!(graph.meshes_of(3), &[4]);
    }

    #[test]
    fn test_flatten_accumulates_parent_transforms() {
        let instances = sample().flatten();
        assert_eq!(instances.len(), 3);

        let arm = instances[0];
        assert_eq!(arm.mesh, 0);
        let p = arm.world.transform_point3(Vec3::ZERO);
        assert_relative_eq!(p.x, 1.0);
        assert_relative_eq!(p.y, 2.0);

        let hand = instances[1];
        let p = hand.world.transform_point3(Vec3::ZERO);
        assert_relative_eq!(p.x, 1.0);
        assert_relative_eq!(p.y, 2.0);
        assert_relative_eq!(p.z, 3.0);
        assert_eq!(instances[2].world, hand.world);
    }

    #[test]
    fn test_world_transform_of_named_node() {
        let graph = sample();
        let lamp = graph.world_transform_of("lamp").unwrap();
        assert_relative_eq!(lamp.transform_point3(Vec3::ZERO).x, -4.0);
        assert!(graph.world_transform_of("missing").is_none());
    }

    #[test]
    fn test_graph_round_trips_through_ron() {
        let graph = sample();
        let text = ron::to_string(&graph).unwrap();
        let back: SceneGraph = ron::from_str(&text).unwrap();
        assert_eq!(back, graph);
    }
}
