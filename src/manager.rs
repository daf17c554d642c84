//! The selection owner that talks to icon applications.
//!
//! The container only drives the manager through [`TrayManager`]. What the manager learns in
//! return comes back as [`ManagerEvent`]s, handed to
//! [`TrayContainer::handle_manager_event`](crate::tray::TrayContainer::handle_manager_event).

use crate::icon::{IconHandle, WindowId};
use crate::layout::Orientation;

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("another tray already owns the selection on screen {0}")]
    SelectionOwned(usize),
    #[error("screen {0} does not exist")]
    NoSuchScreen(usize),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub trait TrayManager {
    /// Claims the tray selection on `screen`.
    fn register(&mut self, screen: usize) -> Result<(), RegistrationError>;

    /// Gives the selection up. Called at most once per successful registration.
    fn unregister(&mut self);

    /// Tells icon applications which way the tray flows.
    fn set_orientation(&mut self, orientation: Orientation);
}

#[derive(Debug)]
pub enum ManagerEvent {
    /// An application docked a window.
    IconAdded(IconHandle),
    /// A docked window went away.
    IconRemoved(WindowId),
    /// Some other tray took the selection over.
    OwnershipLost,
}

impl<T: TrayManager + ?Sized> TrayManager for Box<T> {
    fn register(&mut self, screen: usize) -> Result<(), RegistrationError> {
        (**self).register(screen)
    }

    fn unregister(&mut self) {
        (**self).unregister()
    }

    fn set_orientation(&mut self, orientation: Orientation) {
        (**self).set_orientation(orientation)
    }
}
