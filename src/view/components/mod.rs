mod canvas;
mod content_box;
mod grid;
mod panel;
mod stack_panel;

pub use canvas::*;
pub use content_box::*;
pub use grid::*;
pub use panel::*;
pub use stack_panel::*;

/// Implements the `Any` plumbing of [`Layoutable`](crate::view::Layoutable).
macro_rules! impl_layoutable_any {
    () => {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}

pub(crate) use impl_layoutable_any;
