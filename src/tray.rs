//! The notification area container.
//!
//! A [`TrayContainer`] owns the embedded icons, feeds them through the [`LayoutEngine`] whenever
//! something changes, and applies the resulting geometry back onto the icon windows. It also
//! keeps the name → hidden policy and drives the [`TrayManager`] lifecycle.

use slotmap::SlotMap;
use smithay::utils::{Logical, Rectangle, Size};
use systray_config::{NameList, Tray};

use crate::deferred::DeferredTask;
use crate::icon::{ContainerId, ForeignDisplay, IconHandle, WindowId};
use crate::layout::{HiddenCountChanged, IconKey, LayoutEngine, Orientation};
use crate::manager::{ManagerEvent, RegistrationError, TrayManager};
use crate::names::{self, NamePolicy};
use crate::observer::{ObserverId, Observers};
use crate::utils::id::IdCounter;

static CONTAINER_ID_COUNTER: IdCounter = IdCounter::new();

impl ContainerId {
    fn next() -> ContainerId {
        ContainerId(CONTAINER_ID_COUNTER.next())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AddIconError {
    #[error("icon window {0} is owned by another tray")]
    OwnedElsewhere(WindowId),
    #[error("icon window {0} is already in this tray")]
    Duplicate(WindowId),
}

/// Changes that configuration collaborators may want to hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayEvent {
    NamesVisibleChanged,
    NamesHiddenChanged,
    /// Another tray took the selection over; this one stays empty from now on.
    OwnershipLost,
}

/// One extra paint pass for a composited icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositePass {
    pub key: IconKey,
    pub window: WindowId,
    /// Icon area clipped to the exposed area.
    pub clip: Rectangle<i32, Logical>,
}

/// A known application name as shown in a configuration UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub name: String,
    pub title: String,
    pub icon_name: Option<String>,
    pub hidden: bool,
}

type ManagerFactory = Box<dyn FnMut() -> Box<dyn TrayManager>>;

pub struct TrayContainer<D: ForeignDisplay> {
    id: ContainerId,
    icons: SlotMap<IconKey, IconHandle>,
    engine: LayoutEngine,
    names: NamePolicy,
    display: D,
    manager: Option<Box<dyn TrayManager>>,
    manager_factory: ManagerFactory,
    pending_registration: Option<DeferredTask>,
    screen: usize,
    /// Whether the tray window itself is composited.
    composited: bool,
    allocation: Option<Rectangle<i32, Logical>>,
    requisition: Size<i32, Logical>,
    observers: Observers<TrayEvent>,
}

impl<D: ForeignDisplay> TrayContainer<D> {
    pub fn new(
        display: D,
        manager_factory: impl FnMut() -> Box<dyn TrayManager> + 'static,
    ) -> Self {
        Self {
            id: ContainerId::next(),
            icons: SlotMap::with_key(),
            engine: LayoutEngine::new(),
            names: NamePolicy::new(),
            display,
            manager: None,
            manager_factory: Box::new(manager_factory),
            pending_registration: None,
            screen: 0,
            composited: false,
            allocation: None,
            requisition: Size::from((0, 0)),
            observers: Observers::new(),
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn engine(&self) -> &LayoutEngine {
        &self.engine
    }

    pub fn icon(&self, key: IconKey) -> Option<&IconHandle> {
        self.icons.get(key)
    }

    /// Icons in display order.
    pub fn icons(&self) -> impl Iterator<Item = (IconKey, &IconHandle)> + '_ {
        self.engine
            .order()
            .iter()
            .filter_map(|key| self.icons.get(*key).map(|icon| (*key, icon)))
    }

    pub fn find_window(&self, window: WindowId) -> Option<IconKey> {
        self.icons
            .iter()
            .find(|(_, icon)| icon.window() == window)
            .map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    pub fn connect(&mut self, callback: impl FnMut(&TrayEvent) + 'static) -> ObserverId {
        self.observers.connect(callback)
    }

    pub fn disconnect(&mut self, id: ObserverId) -> bool {
        self.observers.disconnect(id)
    }

    pub fn connect_hidden_count_changed(
        &mut self,
        callback: impl FnMut(&HiddenCountChanged) + 'static,
    ) -> ObserverId {
        self.engine.connect_hidden_count_changed(callback)
    }

    pub fn disconnect_hidden_count_changed(&mut self, id: ObserverId) -> bool {
        self.engine.disconnect(id)
    }

    /// Takes ownership of an embedded icon and lays it out at its sorted position.
    pub fn add_icon(&mut self, mut icon: IconHandle) -> Result<IconKey, AddIconError> {
        let window = icon.window();
        if icon.parent().is_some_and(|parent| parent != self.id) {
            return Err(AddIconError::OwnedElsewhere(window));
        }
        if self.find_window(window).is_some() {
            return Err(AddIconError::Duplicate(window));
        }

        if let Some(name) = icon.resolve_name(&self.display) {
            let (hidden, inserted) = self.names.lookup_or_insert(name);
            icon.set_hidden(hidden);
            if inserted {
                self.observers.emit(&TrayEvent::NamesVisibleChanged);
            }
        }

        debug!(
            "added {:?} icon window {window} (hidden={})",
            icon.name(),
            icon.is_hidden()
        );

        icon.set_parent(Some(self.id));
        icon.set_mapped(true);

        let key = self.icons.insert(icon);
        self.engine.insert(&self.icons, key);
        self.relayout();
        Ok(key)
    }

    /// Embeds a window by id. Windows that cannot be probed are skipped.
    pub fn embed_window(&mut self, window: WindowId) -> Option<IconKey> {
        let icon = match IconHandle::embed(&self.display, window) {
            Ok(icon) => icon,
            Err(err) => {
                warn!("not embedding icon window {window}: {err}");
                return None;
            }
        };

        match self.add_icon(icon) {
            Ok(key) => Some(key),
            Err(err) => {
                warn!("{err}");
                None
            }
        }
    }

    pub fn remove_icon(&mut self, key: IconKey) -> bool {
        let Some(icon) = self.icons.remove(key) else {
            return false;
        };
        self.engine.remove(key);

        debug!("removed {:?} icon window {}", icon.name(), icon.window());
        icon.unembed();

        self.relayout();
        true
    }

    pub fn remove_window(&mut self, window: WindowId) -> bool {
        match self.find_window(window) {
            Some(key) => self.remove_icon(key),
            None => false,
        }
    }

    /// Records the size an icon window asked for.
    pub fn set_icon_requisition(&mut self, key: IconKey, size: Size<i32, Logical>) -> bool {
        let Some(icon) = self.icons.get_mut(key) else {
            return false;
        };
        if icon.requisition() == size {
            return false;
        }

        icon.set_requisition(size);
        self.relayout();
        true
    }

    pub fn handle_manager_event(&mut self, event: ManagerEvent) {
        match event {
            ManagerEvent::IconAdded(icon) => {
                if let Err(err) = self.add_icon(icon) {
                    warn!("{err}");
                }
            }
            ManagerEvent::IconRemoved(window) => {
                if !self.remove_window(window) {
                    debug!("removed icon window {window} was not in the tray");
                }
            }
            ManagerEvent::OwnershipLost => self.ownership_lost(),
        }
    }

    fn ownership_lost(&mut self) {
        error!(
            "most likely another widget took over the function of a notification area, \
             this area will be unused"
        );

        // The selection is gone already, nothing to unregister.
        self.manager = None;
        self.remove_all_icons();
        self.observers.emit(&TrayEvent::OwnershipLost);
    }

    fn remove_all_icons(&mut self) {
        let keys = self.engine.order().to_vec();
        for key in keys {
            self.engine.remove(key);
            if let Some(icon) = self.icons.remove(key) {
                icon.unembed();
            }
        }
        self.icons.clear();
        self.relayout();
    }

    pub fn orientation(&self) -> Orientation {
        self.engine.orientation()
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        if !self.engine.set_orientation(orientation) {
            return;
        }

        if let Some(manager) = &mut self.manager {
            manager.set_orientation(orientation);
        }
        self.relayout();
    }

    pub fn max_cell_size(&self) -> i32 {
        self.engine.max_cell_size()
    }

    /// Sets the maximum icon size, clamped to the accepted range.
    pub fn set_max_cell_size(&mut self, size: i32) {
        if self.engine.set_max_cell_size(size) {
            self.relayout();
        }
    }

    pub fn allocated_extent(&self) -> i32 {
        self.engine.allocated_extent()
    }

    /// Sets the extent the host makes available across the icon flow.
    pub fn set_allocated_extent(&mut self, extent: i32) {
        if self.engine.set_allocated_extent(extent) {
            self.relayout();
        }
    }

    pub fn show_hidden(&self) -> bool {
        self.engine.show_hidden()
    }

    pub fn set_show_hidden(&mut self, show_hidden: bool) {
        if self.engine.set_show_hidden(show_hidden) {
            self.relayout();
        }
    }

    pub fn has_hidden(&self) -> bool {
        self.engine.has_hidden()
    }

    /// Size the tray wants, as of the last layout.
    pub fn requisition(&self) -> Size<i32, Logical> {
        self.requisition
    }

    pub fn allocation(&self) -> Option<Rectangle<i32, Logical>> {
        self.allocation
    }

    /// Places the icons inside the area the host gave the tray.
    pub fn size_allocate(&mut self, allocation: Rectangle<i32, Logical>) {
        self.allocation = Some(allocation);
        self.relayout();
    }

    /// Recomputes the requested size, and the icon geometry if the tray has an allocation.
    pub fn relayout(&mut self) {
        self.requisition = self.engine.requested_size(&self.icons);

        let Some(allocation) = self.allocation else {
            return;
        };

        for placement in self.engine.allocate(&self.icons, allocation) {
            if let Some(icon) = self.icons.get_mut(placement.key) {
                icon.size_allocate(&mut self.display, placement.rect);
            }
        }
    }

    pub fn is_composited(&self) -> bool {
        self.composited
    }

    /// Extra paint passes needed for composited icons inside the exposed `area`.
    ///
    /// Empty unless the tray window itself is composited.
    pub fn composite_passes(&self, area: Rectangle<i32, Logical>) -> Vec<CompositePass> {
        if !self.composited {
            return Vec::new();
        }

        self.icons()
            .filter(|(_, icon)| icon.is_composited())
            .filter_map(|(key, icon)| {
                let rect = icon.allocation();
                // Skip icons parked offscreen.
                if rect.loc.x < 0 || rect.loc.y < 0 {
                    return None;
                }

                let clip = rect.intersection(area)?;
                Some(CompositePass {
                    key,
                    window: icon.window(),
                    clip,
                })
            })
            .collect()
    }

    pub fn visible_names(&self) -> Vec<String> {
        self.names.visible_names()
    }

    pub fn hidden_names(&self) -> Vec<String> {
        self.names.hidden_names()
    }

    /// Replaces every visible name.
    pub fn set_visible_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update_names(|policy| policy.replace(false, names));
    }

    /// Replaces every hidden name.
    pub fn set_hidden_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update_names(|policy| policy.replace(true, names));
    }

    pub fn set_name_hidden(&mut self, name: &str, hidden: bool) {
        self.update_names(|policy| policy.set_hidden(name, hidden));
    }

    pub fn clear_names(&mut self) {
        self.update_names(NamePolicy::clear);
    }

    fn update_names(&mut self, f: impl FnOnce(&mut NamePolicy)) {
        let visible_before = self.names.visible_names();
        let hidden_before = self.names.hidden_names();

        f(&mut self.names);

        if visible_before == self.names.visible_names()
            && hidden_before == self.names.hidden_names()
        {
            return;
        }

        // Running applications dropped from both lists get recorded as visible again.
        let mut recorded = false;
        let mut resort = false;
        for icon in self.icons.values_mut() {
            let Some(name) = icon.name() else {
                continue;
            };
            let (hidden, inserted) = self.names.lookup_or_insert(name);
            recorded |= inserted;
            if icon.is_hidden() != hidden {
                icon.set_hidden(hidden);
                resort = true;
            }
        }

        if resort {
            self.engine.resort(&self.icons);
            self.relayout();
        }

        let visible_changed = recorded || visible_before != self.names.visible_names();
        let hidden_changed = hidden_before != self.names.hidden_names();
        if visible_changed {
            self.observers.emit(&TrayEvent::NamesVisibleChanged);
        }
        if hidden_changed {
            self.observers.emit(&TrayEvent::NamesHiddenChanged);
        }
    }

    /// Every recorded application with its title, for a configuration UI.
    pub fn applications(&self) -> Vec<Application> {
        self.names
            .iter()
            .map(|(name, hidden)| Application {
                name: name.to_owned(),
                title: names::display_title(name).into_owned(),
                icon_name: names::icon_name(name).map(|icon| icon.into_owned()),
                hidden,
            })
            .collect()
    }

    pub fn apply_config(&mut self, config: &Tray) {
        self.set_max_cell_size(i32::from(config.size_max));
        self.set_show_hidden(config.show_hidden);
        self.update_names(|policy| {
            policy.replace(false, config.names_visible.names.iter().cloned());
            policy.replace(true, config.names_hidden.names.iter().cloned());
        });
    }

    pub fn tray_config(&self) -> Tray {
        let size_max = u16::try_from(self.engine.max_cell_size())
            .unwrap_or(systray_config::SIZE_MAX_DEFAULT);

        Tray {
            size_max,
            show_hidden: self.engine.show_hidden(),
            names_visible: NameList::new(self.names.visible_names()),
            names_hidden: NameList::new(self.names.hidden_names()),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.manager.is_some()
    }

    pub fn pending_registration(&self) -> Option<&DeferredTask> {
        self.pending_registration
            .as_ref()
            .filter(|task| task.is_pending())
    }

    /// Drops the manager and schedules a new registration on `screen`.
    ///
    /// Returns the task to run once the event loop is idle. A registration that was still
    /// pending is cancelled.
    pub fn screen_changed(&mut self, screen: usize) -> DeferredTask {
        self.stop_manager();
        self.screen = screen;

        if let Some(task) = self.pending_registration.take() {
            task.cancel();
        }

        let task = DeferredTask::new();
        self.pending_registration = Some(task.clone());
        task
    }

    /// Restarts the manager so that icons get embedded again with the new compositing state.
    pub fn composited_changed(&mut self, composited: bool) -> Option<DeferredTask> {
        if self.composited == composited {
            return None;
        }

        self.composited = composited;
        Some(self.screen_changed(self.screen))
    }

    /// Creates a manager and claims the tray selection, if `task` is still the latest one.
    ///
    /// A failure is final for this attempt; nothing is retried.
    pub fn run_deferred_registration(
        &mut self,
        task: &DeferredTask,
    ) -> Result<(), RegistrationError> {
        let current = self
            .pending_registration
            .as_ref()
            .is_some_and(|pending| pending.same_task(task));
        if !current || !task.claim() {
            trace!("ignoring stale registration task");
            return Ok(());
        }
        self.pending_registration = None;

        let mut manager = (self.manager_factory)();
        match manager.register(self.screen) {
            Ok(()) => {
                debug!("registered the notification area on screen {}", self.screen);
                manager.set_orientation(self.engine.orientation());
                self.manager = Some(manager);
                Ok(())
            }
            Err(err) => {
                error!("unable to start the notification area: {err}");
                Err(err)
            }
        }
    }

    fn stop_manager(&mut self) {
        let Some(mut manager) = self.manager.take() else {
            return;
        };

        manager.unregister();
        // The windows belong to the old selection; the next manager embeds them again.
        self.remove_all_icons();
    }

    /// Cancels a pending registration and gives the selection up.
    pub fn teardown(&mut self) {
        if let Some(task) = self.pending_registration.take() {
            task.cancel();
        }
        self.stop_manager();
    }
}

impl<D: ForeignDisplay> Drop for TrayContainer<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
