use bitflags::bitflags;

use crate::error::{LayoutError, LayoutResult};
use crate::view::base_component::NodeId;

bitflags! {
    /// Union of the effective unit types a cell spans on one axis.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CellUnitTypes: u8 {
        const AUTO = 1 << 0;
        const PIXEL = 1 << 1;
        const STAR = 1 << 2;
    }
}

impl CellUnitTypes {
    pub fn is_auto(self) -> bool {
        self.contains(Self::AUTO)
    }

    pub fn is_star(self) -> bool {
        self.contains(Self::STAR)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub(crate) struct GridFlags: u8 {
        const HAS_STAR_ROWS = 1 << 0;
        const HAS_STAR_COLUMNS = 1 << 1;
        const HAS_AUTO_ROWS_AND_STAR_COLUMN = 1 << 2;
    }
}

/// Attached placement of a child inside a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub row: usize,
    pub column: usize,
    pub row_span: usize,
    pub column_span: usize,
}

impl Default for GridCell {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl GridCell {
    pub const fn new(row: usize, column: usize) -> Self {
        Self {
            row,
            column,
            row_span: 1,
            column_span: 1,
        }
    }

    pub const fn span(mut self, row_span: usize, column_span: usize) -> Self {
        self.row_span = if row_span == 0 { 1 } else { row_span };
        self.column_span = if column_span == 0 { 1 } else { column_span };
        self
    }

    /// Builds a cell from signed attached values as they arrive from markup
    /// or bindings. Negative indices and non-positive spans are rejected.
    pub fn try_new(row: i32, column: i32, row_span: i32, column_span: i32) -> LayoutResult<Self> {
        let index = |value: i32| usize::try_from(value).ok();
        let span = |value: i32| usize::try_from(value).ok().filter(|span| *span > 0);
        match (index(row), index(column), span(row_span), span(column_span)) {
            (Some(row), Some(column), Some(row_span), Some(column_span)) => Ok(Self {
                row,
                column,
                row_span,
                column_span,
            }),
            _ => Err(LayoutError::invalid_track_length(format!(
                "cell row={row} column={column} row_span={row_span} column_span={column_span}"
            ))),
        }
    }

    /// Index and span clamped to a track count.
    pub(crate) fn clamp_row(&self, count: usize) -> (usize, usize) {
        clamp_range(self.row, self.row_span, count)
    }

    pub(crate) fn clamp_column(&self, count: usize) -> (usize, usize) {
        clamp_range(self.column, self.column_span, count)
    }
}

fn clamp_range(index: usize, span: usize, count: usize) -> (usize, usize) {
    let index = index.min(count.saturating_sub(1));
    let span = span.max(1).min(count - index);
    (index, span)
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CellCache {
    pub child: NodeId,
    pub row: usize,
    pub row_span: usize,
    pub column: usize,
    pub column_span: usize,
    pub row_types: CellUnitTypes,
    pub column_types: CellUnitTypes,
}

/// Cells partitioned by measure order; each group keeps child order.
#[derive(Clone, Debug, Default)]
pub(crate) struct CellGroups {
    pub group1: Vec<usize>,
    pub group2: Vec<usize>,
    pub group3: Vec<usize>,
    pub group4: Vec<usize>,
}
