mod geometry;
mod grid_length;
mod layout_props;
mod layout_state;

pub use geometry::*;
pub use grid_length::*;
pub use layout_props::*;
pub use layout_state::*;
