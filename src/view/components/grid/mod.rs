mod cells;
mod definitions;
mod resolver;

pub use cells::{CellUnitTypes, GridCell};
pub use definitions::TrackDefinition;

use cells::{CellCache, CellGroups, GridFlags};
use resolver::{
    SpanEntry, available_size_for_range, desired_inner_size, ensure_min_size_in_definition_range,
    final_size_for_range, length_type_for_range, register_span, resolve_star, set_final_size,
    validate_definitions,
};

use super::impl_layoutable_any;
use crate::error::LayoutResult;
use crate::style::{Rect, Size, Thickness};
use crate::view::base_component::{LayoutCx, Layoutable, NodeId};

/// Proportional grid panel.
///
/// Children are placed through their attached [`GridCell`]. Tracks are sized
/// in four cell groups so that Auto tracks see the content of Pixel and Auto
/// cells before star space is handed out.
#[derive(Clone, Debug)]
pub struct Grid {
    rows: Vec<TrackDefinition>,
    columns: Vec<TrackDefinition>,
    has_user_rows: bool,
    has_user_columns: bool,
    row_spacing: f32,
    column_spacing: f32,
    padding: Thickness,
    flags: GridFlags,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    pub fn new() -> Self {
        Self {
            rows: vec![TrackDefinition::default()],
            columns: vec![TrackDefinition::default()],
            has_user_rows: false,
            has_user_columns: false,
            row_spacing: 0.0,
            column_spacing: 0.0,
            padding: Thickness::ZERO,
            flags: GridFlags::empty(),
        }
    }

    pub fn rows(mut self, rows: impl IntoIterator<Item = TrackDefinition>) -> Self {
        self.set_rows(rows);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = TrackDefinition>) -> Self {
        self.set_columns(columns);
        self
    }

    pub fn row_spacing(mut self, spacing: f32) -> Self {
        self.row_spacing = spacing.max(0.0);
        self
    }

    pub fn column_spacing(mut self, spacing: f32) -> Self {
        self.column_spacing = spacing.max(0.0);
        self
    }

    pub fn padding(mut self, padding: Thickness) -> Self {
        self.padding = padding;
        self
    }

    /// Replaces the row definitions. An empty list leaves one implicit
    /// `1*` row.
    pub fn set_rows(&mut self, rows: impl IntoIterator<Item = TrackDefinition>) {
        let rows: Vec<TrackDefinition> = rows.into_iter().collect();
        self.has_user_rows = !rows.is_empty();
        self.rows = if rows.is_empty() { vec![TrackDefinition::default()] } else { rows };
    }

    pub fn set_columns(&mut self, columns: impl IntoIterator<Item = TrackDefinition>) {
        let columns: Vec<TrackDefinition> = columns.into_iter().collect();
        self.has_user_columns = !columns.is_empty();
        self.columns = if columns.is_empty() { vec![TrackDefinition::default()] } else { columns };
    }

    pub fn row_definitions(&self) -> &[TrackDefinition] {
        &self.rows
    }

    pub fn column_definitions(&self) -> &[TrackDefinition] {
        &self.columns
    }

    pub fn row_sizes(&self) -> Vec<f32> {
        self.rows.iter().map(TrackDefinition::actual_size).collect()
    }

    pub fn column_sizes(&self) -> Vec<f32> {
        self.columns.iter().map(TrackDefinition::actual_size).collect()
    }

    fn has_definitions(&self) -> bool {
        self.has_user_rows || self.has_user_columns
    }

    fn combined_row_spacing(&self) -> f32 {
        self.row_spacing * self.rows.len().saturating_sub(1) as f32
    }

    fn combined_column_spacing(&self) -> f32 {
        self.column_spacing * self.columns.len().saturating_sub(1) as f32
    }

    fn validate_cells(&mut self, cx: &LayoutCx<'_>, children: &[NodeId]) -> (Vec<CellCache>, CellGroups) {
        self.flags = GridFlags::empty();
        let mut cells = Vec::with_capacity(children.len());
        let mut groups = CellGroups::default();

        for (index, &child) in children.iter().enumerate() {
            let cell = cx.grid_cell(child);
            let (row, row_span) = cell.clamp_row(self.rows.len());
            let (column, column_span) = cell.clamp_column(self.columns.len());
            let row_types = length_type_for_range(&self.rows, row, row_span);
            let column_types = length_type_for_range(&self.columns, column, column_span);

            if !row_types.is_star() {
                if !column_types.is_star() {
                    groups.group1.push(index);
                } else {
                    groups.group3.push(index);
                    if row_types.is_auto() {
                        self.flags |= GridFlags::HAS_AUTO_ROWS_AND_STAR_COLUMN;
                    }
                }
            } else {
                self.flags |= GridFlags::HAS_STAR_ROWS;
                if column_types.is_auto() && !column_types.is_star() {
                    groups.group2.push(index);
                } else {
                    groups.group4.push(index);
                }
            }
            if column_types.is_star() {
                self.flags |= GridFlags::HAS_STAR_COLUMNS;
            }

            cells.push(CellCache {
                child,
                row,
                row_span,
                column,
                column_span,
                row_types,
                column_types,
            });
        }

        (cells, groups)
    }

    fn measure_cell(&self, cx: &mut LayoutCx<'_>, cell: &CellCache, force_infinite_row: bool) -> LayoutResult<Size> {
        let width = if cell.column_types.is_auto() && !cell.column_types.is_star() {
            f32::INFINITY
        } else {
            available_size_for_range(&self.columns, cell.column, cell.column_span, self.column_spacing)
        };
        let height = if force_infinite_row || (cell.row_types.is_auto() && !cell.row_types.is_star()) {
            f32::INFINITY
        } else {
            available_size_for_range(&self.rows, cell.row, cell.row_span, self.row_spacing)
        };
        cx.measure_child(cell.child, Size::new(width, height))
    }

    fn measure_cells_group(
        &mut self,
        cx: &mut LayoutCx<'_>,
        cells: &[CellCache],
        group: &[usize],
        ignore_columns: bool,
        force_infinite_rows: bool,
    ) -> LayoutResult<()> {
        if group.is_empty() {
            return Ok(());
        }

        let mut spans: Vec<SpanEntry> = Vec::new();
        for &index in group {
            let cell = &cells[index];
            let desired = self.measure_cell(cx, cell, force_infinite_rows)?;

            if !ignore_columns {
                if cell.column_span == 1 {
                    self.columns[cell.column].update_effective_min(desired.width);
                } else {
                    register_span(&mut spans, cell.column, cell.column_span, desired.width, true);
                }
            }
            if !force_infinite_rows {
                if cell.row_span == 1 {
                    self.rows[cell.row].update_effective_min(desired.height);
                } else {
                    register_span(&mut spans, cell.row, cell.row_span, desired.height, false);
                }
            }
        }

        for span in spans {
            if span.is_column {
                ensure_min_size_in_definition_range(
                    &mut self.columns,
                    span.start,
                    span.count,
                    self.column_spacing,
                    span.desired,
                );
            } else {
                ensure_min_size_in_definition_range(
                    &mut self.rows,
                    span.start,
                    span.count,
                    self.row_spacing,
                    span.desired,
                );
            }
        }
        Ok(())
    }

    fn resolve_star_rows(&mut self, available: f32, scale: Option<f32>) {
        if self.flags.contains(GridFlags::HAS_STAR_ROWS) {
            resolve_star(&mut self.rows, available, scale);
        }
    }

    fn resolve_star_columns(&mut self, available: f32, scale: Option<f32>) {
        if self.flags.contains(GridFlags::HAS_STAR_COLUMNS) {
            resolve_star(&mut self.columns, available, scale);
        }
    }
}

impl Layoutable for Grid {
    fn measure_override(&mut self, cx: &mut LayoutCx<'_>, available: Size) -> LayoutResult<Size> {
        let scale = cx.rounding_scale();
        let padding = self.padding;
        let mut inner = Size::new(
            (available.width - padding.horizontal()).max(0.0),
            (available.height - padding.vertical()).max(0.0),
        );
        let children = cx.children();

        if !self.has_definitions() {
            let mut desired = Size::ZERO;
            for &child in &children {
                desired = desired.max(cx.measure_child(child, inner)?);
            }
            return Ok(Size::new(
                desired.width + padding.horizontal(),
                desired.height + padding.vertical(),
            ));
        }

        validate_definitions(&mut self.rows, inner.height == f32::INFINITY, scale);
        validate_definitions(&mut self.columns, inner.width == f32::INFINITY, scale);

        let combined_row_spacing = self.combined_row_spacing();
        let combined_column_spacing = self.combined_column_spacing();
        inner.width -= combined_column_spacing;
        inner.height -= combined_row_spacing;

        let (cells, groups) = self.validate_cells(cx, &children);

        self.measure_cells_group(cx, &cells, &groups.group1, false, false)?;

        if !self.flags.contains(GridFlags::HAS_AUTO_ROWS_AND_STAR_COLUMN) {
            self.resolve_star_rows(inner.height, scale);
            self.measure_cells_group(cx, &cells, &groups.group2, false, false)?;
            self.resolve_star_columns(inner.width, scale);
            self.measure_cells_group(cx, &cells, &groups.group3, false, false)?;
        } else if groups.group2.is_empty() {
            self.resolve_star_columns(inner.width, scale);
            self.measure_cells_group(cx, &cells, &groups.group3, false, false)?;
            self.resolve_star_rows(inner.height, scale);
        } else {
            // Auto rows depend on star columns and the other way around.
            // Measure group 2 for width only, settle columns and group 3,
            // then revisit group 2 for height.
            self.measure_cells_group(cx, &cells, &groups.group2, false, true)?;
            self.resolve_star_columns(inner.width, scale);
            self.measure_cells_group(cx, &cells, &groups.group3, false, false)?;
            self.resolve_star_rows(inner.height, scale);
            self.measure_cells_group(cx, &cells, &groups.group2, true, false)?;
        }

        self.measure_cells_group(cx, &cells, &groups.group4, false, false)?;

        Ok(Size::new(
            desired_inner_size(&self.columns) + combined_column_spacing + padding.horizontal(),
            desired_inner_size(&self.rows) + combined_row_spacing + padding.vertical(),
        ))
    }

    fn arrange_override(&mut self, cx: &mut LayoutCx<'_>, final_size: Size) -> LayoutResult<Size> {
        let padding = self.padding;
        let inner = Rect::new(
            padding.left,
            padding.top,
            (final_size.width - padding.horizontal()).max(0.0),
            (final_size.height - padding.vertical()).max(0.0),
        );
        let children = cx.children();

        if !self.has_definitions() {
            let mut slot = inner;
            for child in children {
                let desired = cx.desired_size(child);
                slot.width = slot.width.max(desired.width);
                slot.height = slot.height.max(desired.height);
                cx.arrange_child(child, slot)?;
            }
            return Ok(final_size);
        }

        let scale = cx.rounding_scale();
        let row_space = inner.height - self.combined_row_spacing();
        let column_space = inner.width - self.combined_column_spacing();
        set_final_size(&mut self.rows, row_space, scale);
        set_final_size(&mut self.columns, column_space, scale);

        for child in children {
            let cell = cx.grid_cell(child);
            let (row, row_span) = cell.clamp_row(self.rows.len());
            let (column, column_span) = cell.clamp_column(self.columns.len());
            let slot = Rect::new(
                self.columns[column].offset() + inner.x + self.column_spacing * column as f32,
                self.rows[row].offset() + inner.y + self.row_spacing * row as f32,
                final_size_for_range(&self.columns, column, column_span, self.column_spacing),
                final_size_for_range(&self.rows, row, row_span, self.row_spacing),
            );
            cx.arrange_child(child, slot)?;
        }

        Ok(final_size)
    }

    fn supports_reordering(&self) -> bool {
        false
    }

    fn kind_name(&self) -> &'static str {
        "Grid"
    }

    impl_layoutable_any!();
}

#[cfg(test)]
mod tests {
    use super::{Grid, GridCell, TrackDefinition};
    use crate::style::{Size, Thickness};
    use crate::view::base_component::NodeId;
    use crate::view::components::{ContentBox, Orientation, StackPanel};
    use crate::view::{LayoutManager, LayoutTree};
    use glam::Vec2;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn grid_with(grid: Grid, cells: &[(GridCell, Size)]) -> (LayoutTree, NodeId, Vec<NodeId>) {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(grid);
        tree.set_root(root).unwrap();
        let mut children = Vec::new();
        for &(cell, size) in cells {
            let child = tree.create_node(ContentBox::new(size));
            tree.add_child(root, child).unwrap();
            tree.set_grid_cell(child, cell).unwrap();
            children.push(child);
        }
        (tree, root, children)
    }

    fn column_sizes(tree: &LayoutTree, grid: NodeId) -> Vec<f32> {
        tree.behavior::<Grid>(grid).unwrap().column_sizes()
    }

    fn row_sizes(tree: &LayoutTree, grid: NodeId) -> Vec<f32> {
        tree.behavior::<Grid>(grid).unwrap().row_sizes()
    }

    #[test_log::test]
    fn star_columns_share_what_auto_leaves() {
        let grid = Grid::new().columns([
            TrackDefinition::star(1.0),
            TrackDefinition::star(2.0),
            TrackDefinition::auto(),
        ]);
        let (mut tree, root, children) =
            grid_with(grid, &[(GridCell::new(0, 2), Size::new(60.0, 10.0))]);

        LayoutManager::new()
            .update_layout(&mut tree, Size::new(300.0, 100.0))
            .unwrap();

        assert_eq!(column_sizes(&tree, root), vec![80.0, 160.0, 60.0]);
        assert_eq!(tree.desired_size(root), Size::new(60.0, 10.0));
        assert_eq!(tree.visual_offset(children[0]), Vec2::new(240.0, 0.0));
        assert_eq!(tree.render_size(children[0]), Size::new(60.0, 100.0));
    }

    #[test]
    fn capped_star_column_releases_space() {
        let grid = Grid::new().columns([
            TrackDefinition::star(1.0).max(40.0),
            TrackDefinition::star(1.0),
        ]);
        let (mut tree, root, _) = grid_with(grid, &[]);

        LayoutManager::new()
            .update_layout(&mut tree, Size::new(200.0, 50.0))
            .unwrap();

        assert_eq!(column_sizes(&tree, root), vec![40.0, 160.0]);
    }

    #[test]
    fn pixel_and_auto_tracks_follow_content() {
        let grid = Grid::new()
            .columns([
                TrackDefinition::pixel(50.0),
                TrackDefinition::auto(),
                TrackDefinition::pixel(30.0),
            ])
            .rows([TrackDefinition::auto(), TrackDefinition::auto()]);
        let (mut tree, root, children) = grid_with(
            grid,
            &[
                (GridCell::new(0, 1), Size::new(70.0, 20.0)),
                (GridCell::new(1, 0), Size::new(10.0, 15.0)),
            ],
        );

        LayoutManager::new()
            .update_layout(&mut tree, Size::new(400.0, 400.0))
            .unwrap();

        assert_eq!(column_sizes(&tree, root), vec![50.0, 70.0, 30.0]);
        assert_eq!(row_sizes(&tree, root), vec![20.0, 15.0]);
        assert_eq!(tree.desired_size(root), Size::new(150.0, 35.0));
        assert_eq!(tree.visual_offset(children[0]), Vec2::new(50.0, 0.0));
        assert_eq!(tree.visual_offset(children[1]), Vec2::new(0.0, 20.0));
    }

    #[test]
    fn spacing_and_padding_shift_cells() {
        let grid = Grid::new()
            .columns([TrackDefinition::star(1.0), TrackDefinition::star(1.0)])
            .column_spacing(10.0)
            .padding(Thickness::uniform(5.0));
        let (mut tree, root, children) =
            grid_with(grid, &[(GridCell::new(0, 1), Size::new(20.0, 20.0))]);

        LayoutManager::new()
            .update_layout(&mut tree, Size::new(210.0, 50.0))
            .unwrap();

        assert_eq!(column_sizes(&tree, root), vec![95.0, 95.0]);
        assert_eq!(tree.visual_offset(children[0]), Vec2::new(110.0, 5.0));
        assert_eq!(tree.render_size(children[0]), Size::new(95.0, 40.0));
    }

    #[test]
    fn spanning_cell_covers_tracks_and_spacing() {
        let grid = Grid::new()
            .columns([TrackDefinition::pixel(40.0), TrackDefinition::pixel(60.0)])
            .column_spacing(4.0);
        let (mut tree, _, children) = grid_with(
            grid,
            &[(GridCell::new(0, 0).span(1, 2), Size::new(10.0, 10.0))],
        );

        LayoutManager::new()
            .update_layout(&mut tree, Size::new(300.0, 30.0))
            .unwrap();

        assert_eq!(tree.render_size(children[0]), Size::new(104.0, 30.0));
    }

    #[test]
    fn out_of_range_cells_are_clamped() {
        let grid = Grid::new().columns([TrackDefinition::pixel(40.0), TrackDefinition::pixel(60.0)]);
        let (mut tree, _, children) = grid_with(
            grid,
            &[(GridCell::new(3, 7).span(1, 4), Size::new(10.0, 10.0))],
        );

        LayoutManager::new()
            .update_layout(&mut tree, Size::new(300.0, 30.0))
            .unwrap();

        assert_eq!(tree.visual_offset(children[0]), Vec2::new(40.0, 0.0));
        assert_eq!(tree.render_size(children[0]).width, 60.0);
    }

    #[test]
    fn auto_rows_against_star_columns_settle() {
        let grid = Grid::new()
            .columns([TrackDefinition::auto(), TrackDefinition::star(1.0)])
            .rows([TrackDefinition::auto(), TrackDefinition::star(1.0)]);
        let (mut tree, root, children) = grid_with(
            grid,
            &[
                (GridCell::new(1, 0), Size::new(50.0, 30.0)),
                (GridCell::new(0, 1), Size::new(80.0, 20.0)),
            ],
        );

        LayoutManager::new()
            .update_layout(&mut tree, Size::new(300.0, 200.0))
            .unwrap();

        assert_eq!(tree.desired_size(root), Size::new(130.0, 50.0));
        assert_eq!(column_sizes(&tree, root), vec![50.0, 250.0]);
        assert_eq!(row_sizes(&tree, root), vec![20.0, 180.0]);
        assert_eq!(tree.visual_offset(children[0]), Vec2::new(0.0, 20.0));
        assert_eq!(tree.render_size(children[1]), Size::new(250.0, 20.0));
    }

    #[test]
    fn grid_without_definitions_stacks_children() {
        let (mut tree, root, children) = grid_with(
            Grid::new(),
            &[
                (GridCell::default(), Size::new(30.0, 10.0)),
                (GridCell::default(), Size::new(10.0, 40.0)),
            ],
        );

        LayoutManager::new()
            .update_layout(&mut tree, Size::new(100.0, 100.0))
            .unwrap();

        assert_eq!(tree.desired_size(root), Size::new(30.0, 40.0));
        assert_eq!(tree.render_size(children[0]), Size::new(100.0, 100.0));
        assert_eq!(tree.visual_offset(children[1]), Vec2::ZERO);
    }

    #[test]
    fn star_rows_become_auto_when_unbounded() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(StackPanel::new(Orientation::Vertical));
        tree.set_root(root).unwrap();
        let grid = tree.create_node(Grid::new().rows([TrackDefinition::star(1.0), TrackDefinition::star(1.0)]));
        tree.add_child(root, grid).unwrap();
        for (row, height) in [(0, 25.0), (1, 5.0)] {
            let child = tree.create_node(ContentBox::new(Size::new(10.0, height)));
            tree.add_child(grid, child).unwrap();
            tree.set_grid_cell(child, GridCell::new(row, 0)).unwrap();
        }

        LayoutManager::new()
            .update_layout(&mut tree, Size::new(50.0, 100.0))
            .unwrap();

        assert_eq!(tree.desired_size(grid), Size::new(10.0, 30.0));
        assert_eq!(row_sizes(&tree, grid), vec![25.0, 5.0]);
    }

    #[test_log::test]
    fn out_of_domain_tracks_size_like_auto() {
        let cases = [
            TrackDefinition::pixel(-10.0),
            TrackDefinition::pixel(f32::NAN),
            TrackDefinition::pixel(f32::INFINITY),
            TrackDefinition::star(0.0),
            TrackDefinition::star(-1.0),
        ];
        for column in cases {
            let (mut tree, root, children) = grid_with(
                Grid::new().columns([column]),
                &[(GridCell::new(0, 0), Size::new(50.0, 10.0))],
            );

            LayoutManager::new()
                .update_layout(&mut tree, Size::new(300.0, 100.0))
                .unwrap();

            assert_eq!(column_sizes(&tree, root), vec![50.0], "{column:?}");
            assert_eq!(tree.desired_size(root).width, 50.0);
            assert_eq!(tree.render_size(children[0]).width, 50.0);
        }
    }

    #[test]
    fn zero_star_beside_other_tracks_stays_a_star() {
        let grid = Grid::new().columns([TrackDefinition::star(0.0), TrackDefinition::star(1.0)]);
        let (mut tree, root, _) = grid_with(grid, &[]);

        LayoutManager::new()
            .update_layout(&mut tree, Size::new(300.0, 100.0))
            .unwrap();

        assert_eq!(column_sizes(&tree, root), vec![0.0, 300.0]);
    }

    proptest! {
        #[test]
        fn render_sizes_are_never_negative(
            tracks in prop::collection::vec((0u8..3, 0.0f32..120.0), 1..5),
            contents in prop::collection::vec((0usize..5, 0.0f32..200.0, 0.0f32..200.0), 0..6),
            width in 0.0f32..400.0,
            height in 0.0f32..400.0,
        ) {
            let columns: Vec<TrackDefinition> = tracks
                .iter()
                .map(|&(kind, value)| match kind {
                    0 => TrackDefinition::auto(),
                    1 => TrackDefinition::pixel(value),
                    _ => TrackDefinition::star(value / 10.0),
                })
                .collect();
            let grid = Grid::new().columns(columns.clone()).rows(columns);
            let cells: Vec<(GridCell, Size)> = contents
                .iter()
                .map(|&(index, w, h)| (GridCell::new(index, index), Size::new(w, h)))
                .collect();
            let (mut tree, root, children) = grid_with(grid, &cells);

            LayoutManager::new().update_layout(&mut tree, Size::new(width, height)).unwrap();

            for node in std::iter::once(root).chain(children) {
                let size = tree.render_size(node);
                prop_assert!(size.width >= 0.0 && size.height >= 0.0);
            }
        }
    }
}
