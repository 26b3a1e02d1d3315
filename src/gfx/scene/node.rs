//! Scene graph
//!
//! A tree of local transforms. Each node references meshes by index into the
//! scene's flat mesh array, so one mesh can be instanced by several nodes.
//! Traversal is pre-order and composes `world = parent_world * local`.

use cgmath::{Matrix4, SquareMatrix};

/// Receives one call per (node, mesh reference) during [`Node::draw`].
pub trait MeshVisitor {
    fn visit(&mut self, mesh: usize, world: &Matrix4<f32>);
}

impl<F> MeshVisitor for F
where
    F: FnMut(usize, &Matrix4<f32>),
{
    fn visit(&mut self, mesh: usize, world: &Matrix4<f32>) {
        self(mesh, world)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub transform: Matrix4<f32>,
    pub meshes: Vec<usize>,
    pub children: Vec<Node>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            transform: Matrix4::identity(),
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl Node {
    pub fn new(transform: Matrix4<f32>) -> Self {
        Self {
            transform,
            ..Default::default()
        }
    }

    pub fn with_meshes(mut self, meshes: impl IntoIterator<Item = usize>) -> Self {
        self.meshes.extend(meshes);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Pre-multiplies this node's transform, e.g. with a coordinate-system
    /// correction applied once at load time.
    pub fn apply_transform(&mut self, correction: Matrix4<f32>) {
        self.transform = correction * self.transform;
    }

    /// Visits every mesh reference in pre-order with its accumulated world transform.
    pub fn draw(&self, visitor: &mut impl MeshVisitor) {
        self.draw_with(&Matrix4::identity(), visitor);
    }

    fn draw_with(&self, parent: &Matrix4<f32>, visitor: &mut impl MeshVisitor) {
        let world = parent * self.transform;
        for &mesh in &self.meshes {
            visitor.visit(mesh, &world);
        }
        for child in &self.children {
            child.draw_with(&world, visitor);
        }
    }

    /// Lazy form of [`Node::draw`], yielding the same pairs in the same order.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![(self, Matrix4::identity())],
            current: None,
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Node::node_count).sum::<usize>()
    }

    /// Total number of mesh references in the subtree, i.e. draws per pass.
    pub fn mesh_reference_count(&self) -> usize {
        self.meshes.len()
            + self
                .children
                .iter()
                .map(Node::mesh_reference_count)
                .sum::<usize>()
    }
}

/// Iterator returned by [`Node::walk`].
pub struct Walk<'a> {
    stack: Vec<(&'a Node, Matrix4<f32>)>,
    current: Option<(std::slice::Iter<'a, usize>, Matrix4<f32>)>,
}

impl Iterator for Walk<'_> {
    type Item = (usize, Matrix4<f32>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((meshes, world)) = &mut self.current {
                if let Some(&mesh) = meshes.next() {
                    return Some((mesh, *world));
                }
                self.current = None;
            }

            let (node, parent) = self.stack.pop()?;
            let world = parent * node.transform;
            // Reversed so the first child is popped first.
            for child in node.children.iter().rev() {
                self.stack.push((child, world));
            }
            self.current = Some((node.meshes.iter(), world));
        }
    }
}
