//! Structural keys for the detector's sketches
//!
//! Node and edge keys are variants of one enum, so the derived `Hash` writes
//! the variant discriminant before any payload: an edge key can never hash
//! the same byte stream as a node key. Each `NodeId` hashes its own variant
//! tag and length-framed payload, which keeps `(src, dst)` pairs injective
//! even when identifiers contain characters like `->` or `,`.

use crate::types::NodeId;

/// Key fed into a [`CountMinSketch`](super::CountMinSketch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SketchKey<'a> {
    /// A single endpoint (source or destination dimension)
    Node(&'a NodeId),
    /// A directed edge `src -> dst`
    Edge(&'a NodeId, &'a NodeId),
}

impl<'a> SketchKey<'a> {
    /// Key for a node
    pub fn node(id: &'a NodeId) -> Self {
        SketchKey::Node(id)
    }

    /// Key for the edge `src -> dst`
    pub fn edge(src: &'a NodeId, dst: &'a NodeId) -> Self {
        SketchKey::Edge(src, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(key: &SketchKey<'_>) -> u64 {
        let mut h = DefaultHasher::new();
        key.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_separator_in_identifier_does_not_collide() {
        let (a, b) = (NodeId::from("X->Y"), NodeId::from("Z"));
        let (c, d) = (NodeId::from("X"), NodeId::from("Y->Z"));
        let left = SketchKey::edge(&a, &b);
        let right = SketchKey::edge(&c, &d);
        assert_ne!(left, right);
        assert_ne!(hash_of(&left), hash_of(&right));
    }

    #[test]
    fn test_direction_matters() {
        let (a, b) = (NodeId::from("a"), NodeId::from("b"));
        assert_ne!(hash_of(&SketchKey::edge(&a, &b)), hash_of(&SketchKey::edge(&b, &a)));
    }

    #[test]
    fn test_node_and_edge_spaces_are_disjoint() {
        let a = NodeId::from("a");
        assert_ne!(SketchKey::node(&a), SketchKey::edge(&a, &a));
        assert_ne!(hash_of(&SketchKey::node(&a)), hash_of(&SketchKey::edge(&a, &a)));
    }
}
