//! Grid-packing layout for tray icons.
//!
//! Icons flow along the *packing* axis (horizontal for a horizontal tray) and wrap into rows
//! stacked along the other axis. The number of rows and the square cell size follow from the
//! extent the host gives the tray across the flow, capped by a configured maximum cell size.
//!
//! Non-square icons take `ratio` cells along the packing axis. With more than one row they are
//! rounded up to whole blocks of cells, so that rows stay aligned.

use std::cmp::Ordering;
use std::collections::HashMap;

use slotmap::{new_key_type, SlotMap};
use smithay::utils::{Logical, Point, Rectangle, Size};

use crate::icon::IconHandle;
use crate::observer::{ObserverId, Observers};

pub use self::grid::{compute_grid, CellCount, Grid};

pub mod grid;


/// Gap between adjacent cells and rows.
pub const SPACING: i32 = 2;

/// Position used for icons that are in the tray but not shown.
pub const OFFSCREEN: i32 = -9999;

/// Placement never shrinks cells below this size.
pub const MIN_CELL_SIZE: i32 = 1;

pub const SIZE_MAX_MIN: i32 = systray_config::SIZE_MAX_MIN as i32;
pub const SIZE_MAX_MAX: i32 = systray_config::SIZE_MAX_MAX as i32;
pub const SIZE_MAX_DEFAULT: i32 = systray_config::SIZE_MAX_DEFAULT as i32;

new_key_type! {
    /// Key of an icon owned by a tray container.
    pub struct IconKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

impl Orientation {
    /// Builds a size from lengths along the packing axis and across it.
    pub fn size(self, packing: i32, across: i32) -> Size<i32, Logical> {
        match self {
            Orientation::Horizontal => Size::from((packing, across)),
            Orientation::Vertical => Size::from((across, packing)),
        }
    }

    /// Builds a rectangle from packing-axis and row-axis coordinates.
    pub fn rect(self, p: i32, r: i32, length: i32, thickness: i32) -> Rectangle<i32, Logical> {
        match self {
            Orientation::Horizontal => {
                Rectangle::new(Point::from((p, r)), Size::from((length, thickness)))
            }
            Orientation::Vertical => {
                Rectangle::new(Point::from((r, p)), Size::from((thickness, length)))
            }
        }
    }

    /// Extent across the icon flow.
    pub fn across(self, size: Size<i32, Logical>) -> i32 {
        match self {
            Orientation::Horizontal => size.h,
            Orientation::Vertical => size.w,
        }
    }
}

/// Some icon implementations request 1×1 to signal that they are invisible.
pub fn is_degenerate(size: Size<i32, Logical>) -> bool {
    size.w <= 1 || size.h <= 1
}

/// Aspect ratio of a requested size along the packing axis.
pub fn packing_ratio(size: Size<i32, Logical>, orientation: Orientation) -> f64 {
    if size.w == size.h {
        return 1.;
    }

    let (along, across) = match orientation {
        Orientation::Horizontal => (size.w, size.h),
        Orientation::Vertical => (size.h, size.w),
    };
    f64::from(along) / f64::from(across)
}

/// Icon sort order: hidden icons first, then by name (absent names first), then by window.
pub fn compare_icons(a: &IconHandle, b: &IconHandle) -> Ordering {
    b.is_hidden()
        .cmp(&a.is_hidden())
        .then_with(|| a.name().cmp(&b.name()))
        .then_with(|| a.window().cmp(&b.window()))
}

/// The number of counted hidden icons changed between two sizing passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HiddenCountChanged {
    pub old: usize,
    pub new: usize,
}

impl HiddenCountChanged {
    pub fn had_hidden(&self) -> bool {
        self.old > 0
    }

    pub fn has_hidden(&self) -> bool {
        self.new > 0
    }
}

/// Where the layout put one icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconPlacement {
    pub key: IconKey,
    pub rect: Rectangle<i32, Logical>,
    /// `false` for icons parked at [`OFFSCREEN`].
    pub on_canvas: bool,
}

impl IconPlacement {
    fn offscreen(key: IconKey, cell_size: i32) -> Self {
        // Still hand out a normal size: some icons only set themselves up on the first real
        // resize.
        Self {
            key,
            rect: Rectangle::new(
                Point::from((OFFSCREEN, OFFSCREEN)),
                Size::from((cell_size, cell_size)),
            ),
            on_canvas: false,
        }
    }
}

#[derive(Debug)]
pub struct LayoutEngine {
    /// Icons in display order.
    order: Vec<IconKey>,
    max_cell_size: i32,
    /// Extent across the icon flow that the host makes available.
    allocated_extent: i32,
    orientation: Orientation,
    show_hidden: bool,
    /// Counted hidden icons as of the last sizing pass.
    n_hidden: usize,
    /// Laid-out icons as of the last sizing pass.
    n_visible: usize,
    hidden_observers: Observers<HiddenCountChanged>,
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            max_cell_size: SIZE_MAX_DEFAULT,
            allocated_extent: SIZE_MAX_DEFAULT,
            orientation: Orientation::Horizontal,
            show_hidden: true,
            n_hidden: 0,
            n_visible: 0,
            hidden_observers: Observers::new(),
        }
    }

    pub fn order(&self) -> &[IconKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: IconKey) -> bool {
        self.order.contains(&key)
    }

    pub fn max_cell_size(&self) -> i32 {
        self.max_cell_size
    }

    /// Sets the maximum cell size, clamped to the accepted range.
    ///
    /// Returns whether the value changed.
    pub fn set_max_cell_size(&mut self, size: i32) -> bool {
        let size = size.clamp(SIZE_MAX_MIN, SIZE_MAX_MAX);
        if self.max_cell_size == size {
            return false;
        }
        self.max_cell_size = size;
        true
    }

    pub fn allocated_extent(&self) -> i32 {
        self.allocated_extent
    }

    pub fn set_allocated_extent(&mut self, extent: i32) -> bool {
        let extent = extent.max(0);
        if self.allocated_extent == extent {
            return false;
        }
        self.allocated_extent = extent;
        true
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) -> bool {
        if self.orientation == orientation {
            return false;
        }
        self.orientation = orientation;
        true
    }

    pub fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    pub fn set_show_hidden(&mut self, show_hidden: bool) -> bool {
        if self.show_hidden == show_hidden {
            return false;
        }
        self.show_hidden = show_hidden;
        true
    }

    /// Laid-out icons as of the last sizing pass.
    pub fn visible_count(&self) -> usize {
        self.n_visible
    }

    /// Whether the last sizing pass counted any hidden icon.
    pub fn has_hidden(&self) -> bool {
        self.n_hidden > 0
    }

    pub fn hidden_count(&self) -> usize {
        self.n_hidden
    }

    pub fn connect_hidden_count_changed(
        &mut self,
        callback: impl FnMut(&HiddenCountChanged) + 'static,
    ) -> ObserverId {
        self.hidden_observers.connect(callback)
    }

    pub fn disconnect(&mut self, id: ObserverId) -> bool {
        self.hidden_observers.disconnect(id)
    }

    /// Inserts an icon at its sorted position.
    pub fn insert(&mut self, icons: &SlotMap<IconKey, IconHandle>, key: IconKey) {
        let Some(icon) = icons.get(key) else {
            return;
        };
        if self.contains(key) {
            return;
        }

        let idx = self.order.partition_point(|other| {
            icons
                .get(*other)
                .map_or(true, |other| compare_icons(other, icon) != Ordering::Greater)
        });
        self.order.insert(idx, key);
    }

    pub fn remove(&mut self, key: IconKey) -> bool {
        let Some(idx) = self.order.iter().position(|k| *k == key) else {
            return false;
        };
        self.order.remove(idx);
        true
    }

    /// Sorts all icons again, after names or hidden flags changed.
    pub fn resort(&mut self, icons: &SlotMap<IconKey, IconHandle>) {
        self.order.retain(|key| icons.contains_key(*key));
        self.order
            .sort_by(|a, b| compare_icons(&icons[*a], &icons[*b]));
    }

    /// Counts the cells wanted by the icons for a layout with `rows` rows.
    pub fn count_cells(&self, icons: &SlotMap<IconKey, IconHandle>, rows: i32) -> CellCount {
        let mut count = CellCount::new();

        for icon in self.order.iter().filter_map(|key| icons.get(*key)) {
            let req = icon.requisition();
            if is_degenerate(req) {
                continue;
            }

            let hidden = icon.is_hidden();
            if hidden {
                count.hidden += 1;
                if !self.show_hidden {
                    continue;
                }
            }

            count.add(packing_ratio(req, self.orientation), rows);
        }

        count
    }

    /// Computes the size the tray wants for the current allocated extent.
    ///
    /// Notifies hidden-count observers when the number of counted hidden icons changed since
    /// the previous call.
    pub fn requested_size(&mut self, icons: &SlotMap<IconKey, IconHandle>) -> Size<i32, Logical> {
        let grid = compute_grid(self.allocated_extent, self.max_cell_size, 0);
        let count = self.count_cells(icons, grid.rows);
        self.n_visible = count.visible;

        debug!(
            "requested cells={}, rows={}, cell_size={}, visible={}",
            count.cells, grid.rows, grid.cell_size, count.visible
        );

        let size = count.requested_size(self.orientation, grid.rows, grid.cell_size);

        if count.hidden != self.n_hidden {
            let change = HiddenCountChanged {
                old: self.n_hidden,
                new: count.hidden,
            };
            debug!("hidden icons changed ({} -> {})", change.old, change.new);

            self.n_hidden = count.hidden;
            self.hidden_observers.emit(&change);
        }

        size
    }

    /// Places every icon inside `allocation`.
    ///
    /// Hidden icons that are not shown and icons with a degenerate requisition get parked at
    /// [`OFFSCREEN`]. When the icons do not fit, a wide icon can be moved one position later
    /// in the order, or the cell size shrinks by one; either way placement starts over.
    pub fn allocate(
        &mut self,
        icons: &SlotMap<IconKey, IconHandle>,
        allocation: Rectangle<i32, Logical>,
    ) -> Vec<IconPlacement> {
        let orientation = self.orientation;
        let visible = self.count_cells(icons, 1).visible;
        let grid = compute_grid(orientation.across(allocation.size), self.max_cell_size, visible);
        let multi_row = grid.rows > 1;

        debug!(
            "allocate rows={}, cell_size={}, offset={}, allocation={allocation:?}, {orientation:?}",
            grid.rows, grid.cell_size, grid.offset
        );

        let loc = allocation.loc;
        let size = allocation.size;
        let (p_start, p_end, r_start, r_end) = match orientation {
            Orientation::Horizontal => (
                loc.x,
                loc.x.saturating_add(size.w),
                loc.y.saturating_add(grid.offset),
                loc.y.saturating_add(size.h),
            ),
            Orientation::Vertical => (
                loc.y,
                loc.y.saturating_add(size.h),
                loc.x.saturating_add(grid.offset),
                loc.x.saturating_add(size.w),
            ),
        };

        let mut cell = grid.cell_size;
        // Furthest position each icon was moved to in this pass. Icons only ever move forward
        // from there, so the restarts are bounded.
        let mut deferred_to = HashMap::new();

        'restart: loop {
            let mut placements = Vec::with_capacity(self.order.len());
            let mut p = p_start;
            let mut r = r_start;

            for idx in 0..self.order.len() {
                let key = self.order[idx];
                let Some(icon) = icons.get(key) else {
                    continue;
                };

                let req = icon.requisition();
                if is_degenerate(req) || (icon.is_hidden() && !self.show_hidden) {
                    placements.push(IconPlacement::offscreen(key, cell));
                    continue;
                }

                // Narrow icons keep their aspect inside a full cell.
                let ratio = packing_ratio(req, orientation);
                let cells = if multi_row {
                    ratio.max(1.).ceil()
                } else {
                    ratio.max(1.)
                };
                let length = ((f64::from(cell) * ratio) as i32).max(cell.min(1));
                let span = (f64::from(cell) * cells) as i32;
                let inset = (span - length) / 2;

                if p.saturating_add(span) > p_end {
                    if ratio >= 2.
                        && idx + 1 < self.order.len()
                        && p > p_start
                        && deferred_to.get(&key).map_or(true, |to| idx >= *to)
                    {
                        deferred_to.insert(key, idx + 1);
                        // Maybe the next icon still fits on this row.
                        trace!("icon {idx} does not fit, moving it one position later");
                        self.order.swap(idx, idx + 1);
                        continue 'restart;
                    }

                    if p > p_start {
                        p = p_start;
                        r = r.saturating_add(cell).saturating_add(SPACING);
                    }

                    if r.saturating_add(cell) > r_end || p.saturating_add(span) > p_end {
                        if cell > MIN_CELL_SIZE {
                            cell -= 1;
                            debug!("row overflow at {r}, restart with cell_size={cell}");
                            continue 'restart;
                        }

                        warn!("icons do not fit into {allocation:?} even at the minimum cell size");
                    }
                }

                placements.push(IconPlacement {
                    key,
                    rect: orientation.rect(p.saturating_add(inset), r, length, cell),
                    on_canvas: true,
                });

                p = p.saturating_add(span).saturating_add(SPACING);
            }

            for placement in &placements {
                trace!(
                    "allocated {:?} at {:?}",
                    icons.get(placement.key).map(|icon| icon.name()),
                    placement.rect
                );
            }

            break placements;
        }
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}
