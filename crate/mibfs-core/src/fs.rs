//! The exported filesystem: nodes, the tree that holds them and the
//! FUSE frontend that serves them.

pub mod error;
pub mod fuse;
pub mod node;
pub mod tree;
