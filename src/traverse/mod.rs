//! Traversal
//!
//! The two traversal surfaces of the engine: the passive depth-first
//! [`Visitor`] and the active focus-stack [`Navigator`].

mod navigator;
mod visitor;

pub use navigator::{FluentNavigator, Navigator};
pub use visitor::{Visitor, visit};
