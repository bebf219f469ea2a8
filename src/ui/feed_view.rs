// Vertical feed of full-viewport reels
// Scroll position decides the single visible reel; idle scrolling snaps to a reel boundary

use gtk4::prelude::*;
use gtk4::{Adjustment, Align, Box as GtkBox, Label, Orientation, PolicyType, ScrolledWindow};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::reel_widget::ReelWidget;
use crate::feed::{is_visible, snap_offset, step_index, FeedVisibility, Step, VisibilityChange};
use crate::models::VideoEntry;
use crate::playback::{BackendKind, Notifier};

/// Offsets closer than this to the snap target count as aligned
const SNAP_TOLERANCE_PX: f64 = 0.5;

/// Callback type for active reel changes
pub type ActiveChangedCallback = Box<dyn Fn(Option<usize>, usize)>;

pub struct FeedView {
    scrolled_window: ScrolledWindow,
    column: GtkBox,
    reels: RefCell<Vec<Rc<ReelWidget>>>,
    visibility: RefCell<FeedVisibility>,
    snap_delay: Duration,
    snap_timer: RefCell<Option<glib::SourceId>>,
    on_active_changed: RefCell<Option<ActiveChangedCallback>>,
}

impl FeedView {
    pub fn new(snap_delay: Duration) -> Rc<Self> {
        let column = GtkBox::new(Orientation::Vertical, 0);
        column.add_css_class("feed-column");

        let scrolled_window = ScrolledWindow::builder()
            .hscrollbar_policy(PolicyType::Never)
            .vscrollbar_policy(PolicyType::External)
            .kinetic_scrolling(true)
            .propagate_natural_width(false)
            .propagate_natural_height(false)
            .hexpand(true)
            .vexpand(true)
            .child(&column)
            .build();
        scrolled_window.set_min_content_width(0);
        scrolled_window.set_min_content_height(0);
        scrolled_window.add_css_class("feed");

        let view = Rc::new(Self {
            scrolled_window,
            column,
            reels: RefCell::new(Vec::new()),
            visibility: RefCell::new(FeedVisibility::new(0)),
            snap_delay,
            snap_timer: RefCell::new(None),
            on_active_changed: RefCell::new(None),
        });

        view.connect_scroll_signals();
        view
    }

    fn connect_scroll_signals(self: &Rc<Self>) {
        let vadj = self.scrolled_window.vadjustment();

        let view_weak = Rc::downgrade(self);
        vadj.connect_value_changed(move |adj| {
            if let Some(view) = view_weak.upgrade() {
                view.refresh_visibility(adj);
                view.schedule_snap();
            }
        });

        let view_weak = Rc::downgrade(self);
        vadj.connect_page_size_notify(move |adj| {
            if let Some(view) = view_weak.upgrade() {
                view.on_viewport_resized(adj);
            }
        });
    }

    pub fn widget(&self) -> &ScrolledWindow {
        &self.scrolled_window
    }

    /// Replace the feed content, one reel per entry
    pub fn set_entries(
        self: &Rc<Self>,
        entries: &[VideoEntry],
        backend: BackendKind,
        notifier: Rc<dyn Notifier>,
    ) {
        for reel in self.reels.borrow_mut().drain(..) {
            reel.set_visible(false);
        }
        while let Some(child) = self.column.first_child() {
            self.column.remove(&child);
        }

        let vadj = self.scrolled_window.vadjustment();
        let height = vadj.page_size().round() as i32;

        let reels: Vec<Rc<ReelWidget>> = entries
            .iter()
            .map(|entry| {
                let reel = ReelWidget::new(entry, backend, notifier.clone());
                if height > 0 {
                    reel.set_viewport_height(height);
                }
                self.column.append(reel.widget());
                reel
            })
            .collect();

        if reels.is_empty() {
            let placeholder = Label::new(Some("> No videos in feed"));
            placeholder.set_halign(Align::Center);
            placeholder.set_valign(Align::Center);
            placeholder.set_vexpand(true);
            placeholder.add_css_class("muted");
            self.column.append(&placeholder);
        }

        tracing::info!(count = reels.len(), "Feed populated");
        *self.reels.borrow_mut() = reels;
        self.visibility.borrow_mut().reset(entries.len());

        vadj.set_value(0.0);
        self.refresh_visibility(&vadj);
    }

    fn len(&self) -> usize {
        self.reels.borrow().len()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.visibility.borrow().active()
    }

    pub fn active_reel(&self) -> Option<Rc<ReelWidget>> {
        let active = self.active_index()?;
        self.reels.borrow().get(active).cloned()
    }

    /// Scroll one reel forward or back
    pub fn step(&self, step: Step) {
        let target = step_index(self.active_index(), self.len(), step);
        if let Some(index) = target {
            self.scroll_to_index(index);
        }
    }

    pub fn scroll_to_index(&self, index: usize) {
        let vadj = self.scrolled_window.vadjustment();
        let target = snap_offset(index, vadj.page_size());
        tracing::debug!(index, target, "Scrolling to reel");
        vadj.set_value(target);
    }

    /// Pause every reel, e.g. before the window goes away
    pub fn pause_all(&self) {
        for reel in self.reels.borrow().iter() {
            reel.set_visible(false);
        }
    }

    /// Connect callback for active reel changes, called with (active, count)
    pub fn connect_active_changed<F>(&self, callback: F)
    where
        F: Fn(Option<usize>, usize) + 'static,
    {
        *self.on_active_changed.borrow_mut() = Some(Box::new(callback));
    }

    fn refresh_visibility(&self, adj: &Adjustment) {
        let change = self
            .visibility
            .borrow_mut()
            .update(adj.value(), adj.page_size());
        if let Some(change) = change {
            self.apply_change(change);
        }
    }

    fn apply_change(&self, change: VisibilityChange) {
        tracing::debug!(
            previous = ?change.previous,
            current = ?change.current,
            "Active reel changed"
        );

        // Pause the outgoing reel before starting the incoming one
        {
            let reels = self.reels.borrow();
            for index in [change.previous, change.current].into_iter().flatten() {
                if let Some(reel) = reels.get(index) {
                    reel.set_visible(is_visible(index, change.current));
                }
            }
        }

        if let Some(ref callback) = *self.on_active_changed.borrow() {
            callback(change.current, self.len());
        }
    }

    fn on_viewport_resized(self: &Rc<Self>, adj: &Adjustment) {
        let height = adj.page_size().round() as i32;
        if height <= 0 {
            return;
        }
        for reel in self.reels.borrow().iter() {
            reel.set_viewport_height(height);
        }

        // Reels only grow after the next layout pass, so realign from idle
        let active = self.active_index();
        let view_weak = Rc::downgrade(self);
        glib::idle_add_local_once(move || {
            let Some(view) = view_weak.upgrade() else {
                return;
            };
            match active {
                Some(index) => view.scroll_to_index(index),
                None => {
                    let vadj = view.scrolled_window.vadjustment();
                    view.refresh_visibility(&vadj);
                }
            }
        });
    }

    fn schedule_snap(self: &Rc<Self>) {
        if let Some(id) = self.snap_timer.borrow_mut().take() {
            id.remove();
        }

        let view_weak = Rc::downgrade(self);
        let id = glib::timeout_add_local_once(self.snap_delay, move || {
            if let Some(view) = view_weak.upgrade() {
                view.snap_timer.borrow_mut().take();
                view.snap_to_active();
            }
        });
        *self.snap_timer.borrow_mut() = Some(id);
    }

    fn snap_to_active(&self) {
        let Some(index) = self.active_index() else {
            return;
        };
        let vadj = self.scrolled_window.vadjustment();
        let target = snap_offset(index, vadj.page_size());
        if (vadj.value() - target).abs() > SNAP_TOLERANCE_PX {
            vadj.set_value(target);
        }
    }
}

impl Drop for FeedView {
    fn drop(&mut self) {
        if let Some(id) = self.snap_timer.get_mut().take() {
            id.remove();
        }
    }
}
