//! Shared foundation types for the Rill compiler.
//!
//! Home of the two identities every later stage leans on: byte `Span`s for
//! diagnostics and stable `NodeId`s for AST nodes. Both are plain values so
//! that every compilation unit can own its own allocator state.

pub mod node;
pub mod span;

pub use node::{NodeAlloc, NodeId};
pub use span::Span;
