use std::cell::RefCell;
use std::rc::Rc;

use smithay::utils::{Point, Rectangle, Size};

use super::*;
use crate::icon::test_display::{DisplayCall, FakeWindow};
use crate::icon::{EmbedState, IconHandle, VisualInfo, WindowId};
use crate::layout::{HiddenCountChanged, Orientation, OFFSCREEN};
use crate::manager::ManagerEvent;
use crate::tray::{AddIconError, TrayEvent};

#[test]
fn icons_are_kept_sorted() {
    let mut f = Fixture::new();
    f.add_icon("thunar", (22, 22));
    f.add_icon("Pidgin", (22, 22));
    f.add_icon("audacious2", (22, 22));

    assert_eq!(f.names(), ["audacious2", "pidgin", "thunar"]);
    assert_eq!(f.tray.requisition(), Size::from((70, 22)));
}

#[test]
fn unknown_names_are_recorded_visible() {
    let mut f = Fixture::new();
    f.add_icon("thunar", (22, 22));
    f.add_icon("pidgin", (22, 22));

    assert_eq!(f.tray.visible_names(), ["pidgin", "thunar"]);
    assert!(f.tray.hidden_names().is_empty());
    assert_eq!(
        f.take_events(),
        [TrayEvent::NamesVisibleChanged, TrayEvent::NamesVisibleChanged]
    );

    // A second window of a known application changes nothing.
    f.add_icon("thunar", (22, 22));
    assert!(f.take_events().is_empty());
}

#[test]
fn nameless_icon_stays_visible_and_unrecorded() {
    let mut f = Fixture::new();
    let window = WindowId(0x42);
    f.display.add_window(
        window,
        FakeWindow {
            visual: VisualInfo::opaque(24),
            net_wm_name: None,
            wm_name: None,
        },
    );
    f.add_icon("b", (22, 22));

    let key = f.tray.embed_window(window).unwrap();
    f.tray.set_icon_requisition(key, Size::from((22, 22)));

    assert!(!f.tray.icon(key).unwrap().is_hidden());
    assert_eq!(f.tray.visible_names(), ["b"]);
    assert_eq!(f.names(), ["<none>", "b"]);
}

#[test]
fn adding_the_same_window_twice_fails() {
    let mut f = Fixture::new();
    let window = f.new_window("thunar", VisualInfo::opaque(24));
    assert!(f.tray.embed_window(window).is_some());
    assert!(f.tray.embed_window(window).is_none());

    let icon = IconHandle::embed(&f.display, window).unwrap();
    assert!(matches!(
        f.tray.add_icon(icon),
        Err(AddIconError::Duplicate(w)) if w == window
    ));
    assert_eq!(f.tray.len(), 1);
}

#[test]
fn icon_owned_by_another_tray_is_rejected() {
    let mut f = Fixture::new();
    let other = Fixture::new();

    let window = f.new_window("thunar", VisualInfo::opaque(24));
    let mut icon = IconHandle::embed(&f.display, window).unwrap();
    icon.set_parent(Some(other.tray.id()));

    assert!(matches!(
        f.tray.add_icon(icon),
        Err(AddIconError::OwnedElsewhere(_))
    ));
    assert!(f.tray.is_empty());
}

#[test]
fn vanished_window_is_skipped() {
    let mut f = Fixture::new();
    let window = f.new_window("thunar", VisualInfo::opaque(24));
    f.display.destroy_window(window);

    assert_eq!(f.tray.embed_window(window), None);
    assert!(f.tray.is_empty());
}

#[test]
fn removing_icon_shrinks_request() {
    let mut f = Fixture::new();
    let a = f.add_icon("a", (22, 22));
    f.add_icon("b", (22, 22));
    f.add_icon("c", (44, 22));
    assert_eq!(f.tray.requisition(), Size::from((94, 22)));

    assert!(f.tray.remove_icon(a));
    assert!(!f.tray.remove_icon(a));
    assert_eq!(f.tray.requisition(), Size::from((70, 22)));
    assert_eq!(f.names(), ["b", "c"]);
}

#[test]
fn degenerate_icon_requests_nothing() {
    let mut f = Fixture::new();
    let key = f.add_icon("invisible", (1, 1));
    assert_eq!(f.tray.requisition(), Size::from((0, 0)));

    f.allocate(22, 24);
    assert_eq!(f.allocation_of(key).loc, Point::from((OFFSCREEN, OFFSCREEN)));

    f.tray.set_icon_requisition(key, Size::from((22, 22)));
    assert_eq!(f.tray.requisition(), Size::from((22, 22)));
    assert_eq!(
        f.allocation_of(key),
        Rectangle::new(Point::from((0, 1)), Size::from((22, 22)))
    );
}

#[test]
fn huge_requisition_does_not_overflow() {
    let mut f = Fixture::new();
    let key = f.add_icon("huge", (i32::MAX, 2));
    assert_eq!(f.tray.requisition(), Size::from((i32::MAX, 22)));

    f.allocate(100, 24);
    let allocation = f.allocation_of(key);
    assert_eq!(allocation.loc, Point::from((0, 1)));
    assert_eq!(allocation.size.h, 1);
}

#[test]
fn max_cell_size_is_clamped() {
    let mut f = Fixture::new();
    f.tray.set_max_cell_size(100);
    assert_eq!(f.tray.max_cell_size(), 64);
    f.tray.set_max_cell_size(3);
    assert_eq!(f.tray.max_cell_size(), 12);
}

#[test]
fn extent_change_relayouts() {
    let mut f = Fixture::new();
    for name in ["a", "b", "c", "d"] {
        f.add_icon(name, (22, 22));
    }
    assert_eq!(f.tray.requisition(), Size::from((94, 22)));

    f.tray.set_allocated_extent(46);
    assert_eq!(f.tray.requisition(), Size::from((46, 46)));

    f.tray.set_allocated_extent(-10);
    assert_eq!(f.tray.allocated_extent(), 0);
}

#[test]
fn orientation_swaps_request() {
    let mut f = Fixture::new();
    f.add_icon("a", (22, 22));
    f.add_icon("b", (22, 22));

    f.tray.set_orientation(Orientation::Vertical);
    assert_eq!(f.tray.requisition(), Size::from((22, 46)));
}

#[test]
fn hiding_hidden_icons_parks_them_offscreen() {
    let mut f = Fixture::new();
    f.tray.set_hidden_names(["b"]);
    let a = f.add_icon("a", (22, 22));
    let b = f.add_icon("b", (22, 22));
    f.allocate(46, 24);

    assert_eq!(f.names(), ["b", "a"]);
    assert_eq!(f.allocation_of(b).loc, Point::from((0, 1)));
    assert_eq!(f.allocation_of(a).loc, Point::from((24, 1)));

    f.tray.set_show_hidden(false);
    assert_eq!(f.tray.requisition(), Size::from((22, 22)));
    assert_eq!(f.allocation_of(b).loc, Point::from((OFFSCREEN, OFFSCREEN)));
    assert_eq!(f.allocation_of(a).loc, Point::from((0, 1)));
    assert_eq!(f.tray.len(), 2);
    assert!(f.tray.has_hidden());
}

#[test]
fn hidden_count_changes_are_forwarded() {
    let mut f = Fixture::new();
    let changes = Rc::new(RefCell::new(Vec::new()));
    let c = changes.clone();
    f.tray
        .connect_hidden_count_changed(move |change| c.borrow_mut().push(*change));

    f.add_icon("a", (22, 22));
    f.add_icon("b", (22, 22));
    assert!(changes.borrow().is_empty());

    f.tray.set_hidden_names(["a"]);
    assert_eq!(*changes.borrow(), [HiddenCountChanged { old: 0, new: 1 }]);

    f.tray.set_hidden_names(["a", "b"]);
    assert_eq!(
        *changes.borrow(),
        [
            HiddenCountChanged { old: 0, new: 1 },
            HiddenCountChanged { old: 1, new: 2 },
        ]
    );
}

#[test]
fn moved_legacy_icon_gets_expose() {
    let mut f = Fixture::new();
    f.allocate(94, 24);
    let b = f.add_icon("b", (22, 22));
    let b_window = f.tray.icon(b).unwrap().window();
    assert_eq!(f.allocation_of(b).loc, Point::from((0, 1)));
    f.display.take_calls();

    f.add_icon("a", (22, 22));
    assert_eq!(f.allocation_of(b).loc, Point::from((24, 1)));
    assert!(f
        .display
        .take_calls()
        .contains(&DisplayCall::Expose(b_window, Size::from((22, 22)))));
}

#[test]
fn moved_composited_icon_invalidates_old_area() {
    let mut f = Fixture::new();
    f.allocate(94, 24);
    let b = f.add_icon_with_visual("b", (22, 22), VisualInfo::argb32());
    let b_window = f.tray.icon(b).unwrap().window();
    assert!(f.tray.icon(b).unwrap().is_composited());
    f.display.take_calls();

    f.add_icon("a", (22, 22));
    let old = Rectangle::new(Point::from((0, 1)), Size::from((22, 22)));
    let calls = f.display.take_calls();
    assert_eq!(
        calls
            .iter()
            .filter(|call| **call == DisplayCall::Invalidate(old))
            .count(),
        2
    );
    assert!(!calls
        .iter()
        .any(|call| matches!(call, DisplayCall::Expose(w, _) if *w == b_window)));
}

#[test]
fn composite_passes_clip_composited_icons() {
    let mut f = Fixture::new();
    assert!(f.tray.composited_changed(true).is_some());

    let a = f.add_icon_with_visual("a", (22, 22), VisualInfo::argb32());
    f.add_icon("b", (22, 22));
    let c = f.add_icon_with_visual("c", (22, 22), VisualInfo::argb32());
    f.allocate(70, 24);

    let area = Rectangle::new(Point::from((10, 0)), Size::from((100, 100)));
    let passes = f.tray.composite_passes(area);
    assert_eq!(passes.len(), 2);
    assert_eq!(passes[0].key, a);
    assert_eq!(
        passes[0].clip,
        Rectangle::new(Point::from((10, 1)), Size::from((12, 22)))
    );
    assert_eq!(passes[1].key, c);
    assert_eq!(
        passes[1].clip,
        Rectangle::new(Point::from((48, 1)), Size::from((22, 22)))
    );

    // Parked icons are never painted.
    f.tray.set_hidden_names(["c"]);
    f.tray.set_show_hidden(false);
    let passes = f.tray.composite_passes(area);
    assert_eq!(passes.len(), 1);
    assert_eq!(passes[0].key, a);

    assert!(f.tray.composited_changed(false).is_some());
    assert!(f.tray.composite_passes(area).is_empty());
}

#[test]
fn removed_icon_is_unembedded_by_manager_event() {
    let mut f = Fixture::new();
    f.register();
    let window = f.new_window("thunar", VisualInfo::opaque(24));

    let icon = IconHandle::embed(&f.display, window).unwrap();
    assert!(matches!(icon.state(), EmbedState::Embedded(_)));
    f.tray.handle_manager_event(ManagerEvent::IconAdded(icon));
    let key = f.tray.find_window(window).unwrap();
    assert_eq!(f.tray.icon(key).unwrap().parent(), Some(f.tray.id()));
    assert!(f.tray.icon(key).unwrap().is_mapped());

    f.tray.handle_manager_event(ManagerEvent::IconRemoved(window));
    assert!(f.tray.is_empty());

    // Unknown windows are ignored.
    f.tray.handle_manager_event(ManagerEvent::IconRemoved(window));
}
