//! Layout core for retained-mode UI trees.
//!
//! A [`LayoutTree`] owns the nodes, a [`LayoutManager`] drives measure and
//! arrange over it until the tree converges, and the transition layer turns
//! geometry changes between passes into ghost animations.

pub mod config;
pub mod error;
pub mod style;
pub mod transition;
pub mod view;

pub use config::*;
pub use error::*;
pub use style::*;
pub use view::*;
