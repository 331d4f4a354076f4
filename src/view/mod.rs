pub(crate) mod base_component;
pub mod components;
pub mod layout_manager;
pub mod viewport;

pub use base_component::{LayoutCx, LayoutTree, Layoutable, NodeId, TransitionId};
pub use components::*;
pub use layout_manager::{
    EffectiveViewportChangedEvent, EffectiveViewportHandler, LayoutControl, LayoutManager,
    RenderInvalidation, RenderInvalidationKind, SizeChangedEvent, SizeChangedHandler,
};
pub use viewport::*;
