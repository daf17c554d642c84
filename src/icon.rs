//! Embedded foreign icon windows.
//!
//! An [`IconHandle`] wraps one window owned by another process that has been docked into the
//! tray. The handle decides at embedding time whether the window can be composited, lazily
//! resolves its display name, and takes care of redrawing when the layout moves or resizes it.

use std::cell::OnceCell;
use std::fmt;

use smithay::utils::{Logical, Rectangle, Size};

/// Identifier of a foreign window on the display server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Error probing a foreign window.
#[derive(Debug, thiserror::Error)]
pub enum ForeignWindowProbeError {
    #[error("window {0} does not exist or its attributes are unreadable")]
    WindowGone(WindowId),
    #[error("visual {visual:#x} of window {window} is unknown to the screen")]
    UnknownVisual { window: WindowId, visual: u32 },
    #[error("display connection failed: {0}")]
    Connection(String),
}

/// Color layout of the visual a foreign window renders with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualInfo {
    pub depth: u8,
    /// Number of bits used by the red, green and blue channels together.
    pub color_bits: u32,
}

impl VisualInfo {
    pub const fn opaque(depth: u8) -> Self {
        Self {
            depth,
            color_bits: depth as u32,
        }
    }

    pub const fn argb32() -> Self {
        Self {
            depth: 32,
            color_bits: 24,
        }
    }

    /// Whether the visual leaves bits over for an alpha channel.
    pub fn has_alpha(&self) -> bool {
        self.color_bits < u32::from(self.depth)
    }
}

/// Window metadata properties that can carry a display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameProperty {
    /// `_NET_WM_NAME`, UTF-8. Set by GTK icon implementations.
    NetWmName,
    /// `WM_NAME`, legacy string. Set by Qt icon implementations.
    WmName,
}

impl NameProperty {
    pub fn atom_name(self) -> &'static str {
        match self {
            NameProperty::NetWmName => "_NET_WM_NAME",
            NameProperty::WmName => "WM_NAME",
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            NameProperty::NetWmName => "UTF8_STRING",
            NameProperty::WmName => "STRING",
        }
    }
}

/// The display server operations that icon embedding needs.
pub trait ForeignDisplay {
    /// Reads the attributes of a window and returns the visual it renders with.
    fn probe_visual(&self, window: WindowId) -> Result<VisualInfo, ForeignWindowProbeError>;

    /// Whether the display can composite windows with an alpha channel.
    fn supports_composite(&self) -> bool;

    /// Reads a textual window property.
    ///
    /// Returns `None` unless the property exists with the expected type, 8-bit format, is
    /// non-empty and valid UTF-8.
    fn text_property(&self, window: WindowId, property: NameProperty) -> Option<String>;

    /// Invalidates an area of the tray window, forcing it to be redrawn.
    fn invalidate(&mut self, area: Rectangle<i32, Logical>);

    /// Sends a synthetic expose event to a foreign window.
    fn send_expose(&mut self, window: WindowId, size: Size<i32, Logical>) -> anyhow::Result<()>;
}

/// How an embedded window gets drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    /// Alpha-capable visual, drawn on an always-transparent background.
    Composited,
    /// Opaque visual that needs explicit repaint requests when it moves.
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedState {
    Created,
    Embedded(EmbedMode),
    Unembedded,
}

/// Identifies the container that currently owns an icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(pub(crate) u64);

#[derive(Debug)]
pub struct IconHandle {
    window: WindowId,
    state: EmbedState,
    /// Resolved once, `Some(None)` when the window carries no usable name.
    name: OnceCell<Option<String>>,
    hidden: bool,
    /// Size the icon window asks for.
    requisition: Size<i32, Logical>,
    /// Last rectangle the layout gave to the icon.
    allocation: Rectangle<i32, Logical>,
    mapped: bool,
    parent: Option<ContainerId>,
}

impl IconHandle {
    /// Embeds a foreign window, probing its visual for compositing support.
    pub fn embed(
        display: &impl ForeignDisplay,
        window: WindowId,
    ) -> Result<Self, ForeignWindowProbeError> {
        let mut icon = Self {
            window,
            state: EmbedState::Created,
            name: OnceCell::new(),
            hidden: false,
            requisition: Size::from((1, 1)),
            allocation: Rectangle::from_size(Size::from((1, 1))),
            mapped: false,
            parent: None,
        };

        let visual = display.probe_visual(window)?;
        let mode = if visual.has_alpha() && display.supports_composite() {
            EmbedMode::Composited
        } else {
            EmbedMode::Legacy
        };
        icon.state = EmbedState::Embedded(mode);

        debug!("embedded icon window {window} ({mode:?}, visual {visual:?})");
        Ok(icon)
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn state(&self) -> EmbedState {
        self.state
    }

    pub fn is_composited(&self) -> bool {
        self.state == EmbedState::Embedded(EmbedMode::Composited)
    }

    /// Returns the display name, reading it from the window on first use.
    ///
    /// `_NET_WM_NAME` is tried first, then `WM_NAME`. The result is lower-cased and kept for
    /// the lifetime of the handle, including when neither property is present.
    pub fn resolve_name(&self, display: &impl ForeignDisplay) -> Option<&str> {
        self.name
            .get_or_init(|| {
                let name = display
                    .text_property(self.window, NameProperty::NetWmName)
                    .or_else(|| display.text_property(self.window, NameProperty::WmName))
                    .map(|name| name.to_lowercase());
                if name.is_none() {
                    debug!("icon window {} has no usable name", self.window);
                }
                name
            })
            .as_deref()
    }

    /// Returns the display name if it has already been resolved.
    pub fn name(&self) -> Option<&str> {
        self.name.get().and_then(Option::as_deref)
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn requisition(&self) -> Size<i32, Logical> {
        self.requisition
    }

    /// Records the size the icon window asked for.
    pub fn set_requisition(&mut self, size: Size<i32, Logical>) {
        self.requisition = size;
    }

    pub fn allocation(&self) -> Rectangle<i32, Logical> {
        self.allocation
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    pub fn set_mapped(&mut self, mapped: bool) {
        self.mapped = mapped;
    }

    pub fn parent(&self) -> Option<ContainerId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ContainerId>) {
        self.parent = parent;
    }

    /// Moves and resizes the icon, redrawing whatever the change uncovers.
    pub fn size_allocate(
        &mut self,
        display: &mut impl ForeignDisplay,
        allocation: Rectangle<i32, Logical>,
    ) {
        let EmbedState::Embedded(mode) = self.state else {
            return;
        };

        let old = self.allocation;
        let moved = old.loc != allocation.loc;
        let resized = old.size != allocation.size;
        let redraw = (moved || resized) && self.mapped;

        // The old area has to go on both sides of the change, otherwise the composited icon
        // leaves a ghost behind.
        if redraw && mode == EmbedMode::Composited {
            display.invalidate(old);
        }

        self.allocation = allocation;

        if !redraw {
            return;
        }

        match mode {
            EmbedMode::Composited => display.invalidate(old),
            EmbedMode::Legacy if moved => self.force_redraw(display),
            EmbedMode::Legacy => (),
        }
    }

    /// Asks the foreign window to repaint its whole area.
    pub fn force_redraw(&self, display: &mut impl ForeignDisplay) {
        if !self.mapped {
            return;
        }

        if let Err(err) = display.send_expose(self.window, self.allocation.size) {
            debug!("error sending expose to {}: {err:?}", self.window);
        }
    }

    /// Takes the window out of the tray. The handle is gone afterwards.
    pub fn unembed(mut self) {
        self.mapped = false;
        self.parent = None;
        self.state = EmbedState::Unembedded;
        debug!("unembedded icon window {}", self.window);
    }
}


#[cfg(test)]
mod tests {
    use smithay::utils::Point;

    use super::test_display::{DisplayCall, FakeWindow, TestDisplay};
    use super::*;

    fn rect(x: i32, y: i32, w: i32, h: i32) -> Rectangle<i32, Logical> {
        Rectangle::new(Point::from((x, y)), Size::from((w, h)))
    }

    #[test]
    fn alpha_visual_embeds_composited() {
        let display = TestDisplay::new();
        display.add_named(WindowId(1), "nm-applet", VisualInfo::argb32());
        display.add_named(WindowId(2), "xclock", VisualInfo::opaque(24));

        let composited = IconHandle::embed(&display, WindowId(1)).unwrap();
        assert_eq!(
            composited.state(),
            EmbedState::Embedded(EmbedMode::Composited)
        );

        let legacy = IconHandle::embed(&display, WindowId(2)).unwrap();
        assert_eq!(legacy.state(), EmbedState::Embedded(EmbedMode::Legacy));
    }

    #[test]
    fn alpha_visual_without_composite_support_is_legacy() {
        let display = TestDisplay::new();
        display.set_supports_composite(false);
        display.add_named(WindowId(1), "nm-applet", VisualInfo::argb32());

        let icon = IconHandle::embed(&display, WindowId(1)).unwrap();
        assert!(!icon.is_composited());
    }

    #[test]
    fn probing_destroyed_window_fails() {
        let display = TestDisplay::new();
        let err = IconHandle::embed(&display, WindowId(9)).unwrap_err();
        assert!(matches!(err, ForeignWindowProbeError::WindowGone(WindowId(9))));
    }

    #[test]
    fn name_falls_back_to_wm_name_and_is_memoized() {
        let display = TestDisplay::new();
        display.add_window(
            WindowId(1),
            FakeWindow {
                visual: VisualInfo::opaque(24),
                net_wm_name: None,
                wm_name: Some("Workrave".to_owned()),
            },
        );

        let icon = IconHandle::embed(&display, WindowId(1)).unwrap();
        assert_eq!(icon.name(), None);
        assert_eq!(icon.resolve_name(&display), Some("workrave"));
        assert_eq!(display.name_reads(), 2);

        // The window changing its title afterwards does not matter.
        display.add_named(WindowId(1), "Other", VisualInfo::opaque(24));
        assert_eq!(icon.resolve_name(&display), Some("workrave"));
        assert_eq!(display.name_reads(), 2);
    }

    #[test]
    fn missing_name_is_memoized_as_absent() {
        let display = TestDisplay::new();
        display.add_window(
            WindowId(1),
            FakeWindow {
                visual: VisualInfo::opaque(24),
                net_wm_name: None,
                wm_name: None,
            },
        );

        let icon = IconHandle::embed(&display, WindowId(1)).unwrap();
        assert_eq!(icon.resolve_name(&display), None);
        assert_eq!(icon.resolve_name(&display), None);
        assert_eq!(display.name_reads(), 2);
    }

    #[test]
    fn composited_move_invalidates_old_area_twice() {
        let mut display = TestDisplay::new();
        display.add_named(WindowId(1), "a", VisualInfo::argb32());
        let mut icon = IconHandle::embed(&display, WindowId(1)).unwrap();
        icon.set_mapped(true);

        icon.size_allocate(&mut display, rect(0, 0, 22, 22));
        display.take_calls();

        icon.size_allocate(&mut display, rect(24, 0, 22, 22));
        assert_eq!(
            display.take_calls(),
            [
                DisplayCall::Invalidate(rect(0, 0, 22, 22)),
                DisplayCall::Invalidate(rect(0, 0, 22, 22)),
            ]
        );
        assert_eq!(icon.allocation(), rect(24, 0, 22, 22));
    }

    #[test]
    fn legacy_icon_only_repaints_on_move() {
        let mut display = TestDisplay::new();
        display.add_named(WindowId(1), "a", VisualInfo::opaque(24));
        let mut icon = IconHandle::embed(&display, WindowId(1)).unwrap();
        icon.set_mapped(true);

        icon.size_allocate(&mut display, rect(0, 0, 22, 22));
        display.take_calls();

        // Resize in place.
        icon.size_allocate(&mut display, rect(0, 0, 20, 20));
        assert_eq!(display.take_calls(), []);

        icon.size_allocate(&mut display, rect(4, 0, 20, 20));
        assert_eq!(
            display.take_calls(),
            [DisplayCall::Expose(WindowId(1), Size::from((20, 20)))]
        );
    }

    #[test]
    fn unmapped_icon_is_not_redrawn() {
        let mut display = TestDisplay::new();
        display.add_named(WindowId(1), "a", VisualInfo::argb32());
        let mut icon = IconHandle::embed(&display, WindowId(1)).unwrap();

        icon.size_allocate(&mut display, rect(10, 10, 22, 22));
        assert_eq!(display.take_calls(), []);
        assert_eq!(icon.allocation(), rect(10, 10, 22, 22));
    }

    #[test]
    fn unchanged_allocation_does_nothing() {
        let mut display = TestDisplay::new();
        display.add_named(WindowId(1), "a", VisualInfo::argb32());
        let mut icon = IconHandle::embed(&display, WindowId(1)).unwrap();
        icon.set_mapped(true);

        icon.size_allocate(&mut display, rect(0, 0, 22, 22));
        display.take_calls();
        icon.size_allocate(&mut display, rect(0, 0, 22, 22));
        assert_eq!(display.take_calls(), []);
    }
}
