//! Grid sizing: how many rows fit and how large a cell gets.

use smithay::utils::{Logical, Size};

use super::{Orientation, MIN_CELL_SIZE, SPACING};

/// Row layout for a given extent across the icon flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub rows: i32,
    pub cell_size: i32,
    /// Distance from the start of the extent that centers the rows in use.
    pub offset: i32,
}

/// Computes the rows and cell size for `extent`, the size orthogonal to the icon flow.
///
/// Picks the smallest row count whose rows of `max_cell_size` cover the extent, stepping back
/// one row when that overshoots. `visible` is the number of laid-out icons, used to center
/// only the rows that are actually filled.
pub fn compute_grid(extent: i32, max_cell_size: i32, visible: usize) -> Grid {
    let extent = i64::from(extent.max(0));
    let max_cell_size = i64::from(max_cell_size.max(MIN_CELL_SIZE));
    let spacing = i64::from(SPACING);

    let row_span = |rows: i64| rows * max_cell_size + (rows - 1) * spacing;

    let step = max_cell_size + spacing;
    let mut rows = ((extent + spacing + step - 1) / step).max(1);
    if rows > 1 && row_span(rows) > extent {
        rows -= 1;
    }

    let cell_size = ((extent - (rows - 1) * spacing) / rows)
        .min(max_cell_size)
        .max(0);

    let used = rows.min(i64::try_from(visible).unwrap_or(i64::MAX));
    let offset = ((extent - (used * cell_size + (used - 1) * spacing)) / 2).max(0);

    // Everything here is bounded by the i32 extent.
    Grid {
        rows: rows as i32,
        cell_size: cell_size as i32,
        offset: offset as i32,
    }
}

/// Fractional number of cells the visible icons want.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellCount {
    pub cells: f64,
    /// Widest block of a non-square icon in a multi-row layout.
    pub min_seq_cells: Option<i32>,
    /// Icons that take part in the layout.
    pub visible: usize,
    /// Hidden icons, whether shown or not.
    pub hidden: usize,
}

impl CellCount {
    pub fn new() -> Self {
        Self {
            cells: 0.,
            min_seq_cells: None,
            visible: 0,
            hidden: 0,
        }
    }

    /// Adds one laid-out icon with the given aspect ratio along the packing axis.
    pub fn add(&mut self, ratio: f64, rows: i32) {
        self.visible += 1;

        if ratio <= 1. {
            self.cells += 1.;
            return;
        }

        if rows > 1 {
            // Align to whole blocks so the icon never straddles a row break.
            let blocks = ratio.ceil();
            let blocks_i = blocks as i32;
            self.min_seq_cells = Some(self.min_seq_cells.map_or(blocks_i, |m| m.max(blocks_i)));
            self.cells += blocks;
        } else {
            self.cells += ratio;
        }
    }

    /// Size needed to show all counted cells in `rows` rows of `cell_size`.
    pub fn requested_size(
        &self,
        orientation: Orientation,
        rows: i32,
        cell_size: i32,
    ) -> Size<i32, Logical> {
        if self.cells <= 0. {
            return Size::from((0, 0));
        }

        let rows_f = f64::from(rows.max(1));
        let mut cols = (self.cells / rows_f).ceil();
        if cols * rows_f < self.cells {
            cols += 1.;
        }
        if let Some(min) = self.min_seq_cells {
            cols = cols.max(f64::from(min));
        }
        // Saturates for absurdly wide icons.
        let cols = cols as i32;

        let packing = cell_size
            .saturating_mul(cols)
            .saturating_add((cols - 1).saturating_mul(SPACING));
        let across = cell_size * rows + (rows - 1) * SPACING;
        orientation.size(packing, across)
    }
}

impl Default for CellCount {
    fn default() -> Self {
        Self::new()
    }
}
