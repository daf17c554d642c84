//! X11 implementation of the foreign window seam, on top of `x11rb`.

use anyhow::Context;
use smithay::utils::{Logical, Rectangle, Size};
use x11rb::connection::Connection;
use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ConnectionExt as _, EventMask, ExposeEvent, Window, EXPOSE_EVENT,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::icon::{ForeignDisplay, ForeignWindowProbeError, NameProperty, VisualInfo, WindowId};

x11rb::atom_manager! {
    pub Atoms: AtomsCookie {
        _NET_WM_NAME,
        UTF8_STRING,
    }
}

pub struct X11Display {
    conn: RustConnection,
    screen: usize,
    atoms: Atoms,
    composite: bool,
    /// Tray window that icons are embedded into, invalidated on redraws.
    parent: Option<Window>,
}

impl X11Display {
    /// Connects to the display named by `$DISPLAY`.
    pub fn connect() -> anyhow::Result<Self> {
        let (conn, screen) = x11rb::connect(None).context("error connecting to the X server")?;

        let atoms = Atoms::new(&conn)
            .context("error interning atoms")?
            .reply()
            .context("error interning atoms")?;

        let composite = conn
            .query_extension(b"Composite")
            .context("error querying the Composite extension")?
            .reply()
            .context("error querying the Composite extension")?
            .present;
        debug!("connected to X11 screen {screen}, composite: {composite}");

        Ok(Self {
            conn,
            screen,
            atoms,
            composite,
            parent: None,
        })
    }

    pub fn screen(&self) -> usize {
        self.screen
    }

    pub fn set_parent(&mut self, parent: Option<Window>) {
        self.parent = parent;
    }

    fn find_visual(&self, visual_id: u32) -> Option<VisualInfo> {
        self.conn
            .setup()
            .roots
            .iter()
            .flat_map(|screen| &screen.allowed_depths)
            .find_map(|depth| {
                depth
                    .visuals
                    .iter()
                    .find(|visual| visual.visual_id == visual_id)
                    .map(|visual| VisualInfo {
                        depth: depth.depth,
                        color_bits: (visual.red_mask | visual.green_mask | visual.blue_mask)
                            .count_ones(),
                    })
            })
    }
}

fn connection_error(err: ConnectionError) -> ForeignWindowProbeError {
    ForeignWindowProbeError::Connection(err.to_string())
}

impl ForeignDisplay for X11Display {
    fn probe_visual(&self, window: WindowId) -> Result<VisualInfo, ForeignWindowProbeError> {
        let attributes = self
            .conn
            .get_window_attributes(window.0)
            .map_err(connection_error)?
            .reply()
            .map_err(|err| match err {
                ReplyError::X11Error(_) => ForeignWindowProbeError::WindowGone(window),
                ReplyError::ConnectionError(err) => connection_error(err),
            })?;

        self.find_visual(attributes.visual)
            .ok_or(ForeignWindowProbeError::UnknownVisual {
                window,
                visual: attributes.visual,
            })
    }

    fn supports_composite(&self) -> bool {
        self.composite
    }

    fn text_property(&self, window: WindowId, property: NameProperty) -> Option<String> {
        let (name, ty): (Atom, Atom) = match property {
            NameProperty::NetWmName => (self.atoms._NET_WM_NAME, self.atoms.UTF8_STRING),
            NameProperty::WmName => (AtomEnum::WM_NAME.into(), AtomEnum::STRING.into()),
        };

        let reply = self
            .conn
            .get_property(false, window.0, name, ty, 0, u32::MAX)
            .ok()?
            .reply()
            .ok()?;

        if reply.type_ != ty || reply.format != 8 || reply.value.is_empty() {
            trace!(
                "ignoring {} on {window}: type {}, format {}",
                property.atom_name(),
                reply.type_,
                reply.format
            );
            return None;
        }

        match String::from_utf8(reply.value) {
            Ok(text) => Some(text),
            Err(err) => {
                debug!("{} on {window} is not valid UTF-8: {err}", property.atom_name());
                None
            }
        }
    }

    fn invalidate(&mut self, area: Rectangle<i32, Logical>) {
        let Some(parent) = self.parent else {
            return;
        };

        let (Ok(x), Ok(y), Ok(w), Ok(h)) = (
            i16::try_from(area.loc.x),
            i16::try_from(area.loc.y),
            u16::try_from(area.size.w),
            u16::try_from(area.size.h),
        ) else {
            trace!("not invalidating out of range area {area:?}");
            return;
        };

        if let Err(err) = self.conn.clear_area(true, parent, x, y, w, h) {
            debug!("error invalidating {area:?}: {err:?}");
        }
        if let Err(err) = self.conn.flush() {
            debug!("error flushing after invalidating {area:?}: {err:?}");
        }
    }

    fn send_expose(&mut self, window: WindowId, size: Size<i32, Logical>) -> anyhow::Result<()> {
        let event = ExposeEvent {
            response_type: EXPOSE_EVENT,
            sequence: 0,
            window: window.0,
            x: 0,
            y: 0,
            width: u16::try_from(size.w.max(0)).unwrap_or(u16::MAX),
            height: u16::try_from(size.h.max(0)).unwrap_or(u16::MAX),
            count: 0,
        };

        self.conn
            .send_event(false, window.0, EventMask::EXPOSURE, event)
            .context("error sending expose")?;
        self.conn.sync().context("error syncing after expose")?;
        Ok(())
    }
}
