use crate::view::NodeId;

pub type LayoutResult<T> = Result<T, LayoutError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("layout cycle detected after {iterations} iterations")]
    LayoutCycleExceeded {
        iterations: u32,
        diagnostics: Vec<String>,
    },

    #[error("layout traversal exceeded depth {depth}")]
    LayoutDepthExceeded { depth: usize },

    #[error("invalid grid track length: {input:?}")]
    InvalidTrackLength { input: String },

    #[error("unsupported operation: {operation}")]
    UnsupportedOperation { operation: &'static str },

    #[error("stale transition state on node {node:?}")]
    StaleTransitionState { node: NodeId },

    #[error("node {node:?} is not part of the layout tree")]
    MissingNode { node: NodeId },
}

impl LayoutError {
    pub fn invalid_track_length(input: impl Into<String>) -> Self {
        Self::InvalidTrackLength {
            input: input.into(),
        }
    }

    pub const fn unsupported(operation: &'static str) -> Self {
        Self::UnsupportedOperation { operation }
    }

    /// Only a cycle or a runaway depth leaves the tree in a state that
    /// further layout cannot trust.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::LayoutCycleExceeded { .. } | Self::LayoutDepthExceeded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            LayoutError::invalid_track_length("2**")
                .to_string()
                .contains("invalid grid track length")
        );
        assert!(
            LayoutError::unsupported("reorder")
                .to_string()
                .starts_with("unsupported operation")
        );
        let cycle = LayoutError::LayoutCycleExceeded {
            iterations: 250,
            diagnostics: Vec::new(),
        };
        assert_eq!(
            cycle.to_string(),
            "layout cycle detected after 250 iterations"
        );
    }

    #[test]
    fn only_cycle_and_depth_are_fatal() {
        let node = NodeId::from(KeyData::from_ffi(1));
        assert!(LayoutError::LayoutDepthExceeded { depth: 251 }.is_fatal());
        assert!(!LayoutError::StaleTransitionState { node }.is_fatal());
        assert!(!LayoutError::unsupported("reorder").is_fatal());
    }
}
