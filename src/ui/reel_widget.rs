// One full-viewport reel: the video surface with its overlays
// Product tags on top, action column bottom-right, progress bar along the bottom edge

use gtk4::prelude::*;
use gtk4::{
    Align, Box as GtkBox, Button, FlowBox, GestureClick, Label, Orientation, Overflow, Overlay,
    ProgressBar, SelectionMode,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::models::VideoEntry;
use crate::playback::{create_backend, BackendKind, Notifier, PlayerState, ReelController};

/// How long the play glyph stays up after a tap on the video
const GLYPH_REVEAL: Duration = Duration::from_secs(3);
const CONTROL_SPACING: i32 = 16;
const EDGE_MARGIN: i32 = 16;

fn play_label(is_playing: bool) -> &'static str {
    if is_playing {
        "[PAUSE]"
    } else {
        "[PLAY]"
    }
}

fn like_label(is_liked: bool) -> &'static str {
    if is_liked {
        "[LIKE -]"
    } else {
        "[LIKE +]"
    }
}

fn mute_label(is_muted: bool) -> &'static str {
    if is_muted {
        "[MUTED]"
    } else {
        "[SOUND]"
    }
}

/// Format seconds as MM:SS, or HH:MM:SS past the hour
fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() {
        seconds.max(0.0).floor() as i64
    } else {
        0
    };
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

fn time_text(position: f64, duration: f64) -> String {
    if duration.is_finite() && duration > 0.0 {
        format!("{} / {}", format_timestamp(position), format_timestamp(duration))
    } else {
        format_timestamp(position)
    }
}

pub struct ReelWidget {
    entry_id: String,
    overlay: Overlay,
    controller: Rc<ReelController>,
    play_button: Button,
    like_button: Button,
    mute_button: Button,
    progress_bar: ProgressBar,
    time_label: Label,
    glyph_timer: RefCell<Option<glib::SourceId>>,
}

impl ReelWidget {
    pub fn new(entry: &VideoEntry, backend: BackendKind, notifier: Rc<dyn Notifier>) -> Rc<Self> {
        tracing::debug!(id = %entry.id, remote = entry.is_uri(), ?backend, "Building reel");
        let handle = create_backend(backend, &entry.video_url);
        let controller = ReelController::new(handle.backend, notifier);

        let overlay = Overlay::new();
        overlay.set_hexpand(true);
        overlay.set_vexpand(true);
        overlay.set_overflow(Overflow::Hidden);
        overlay.add_css_class("reel");
        overlay.set_child(Some(&handle.surface));

        // Darkens the top and bottom edges so the overlays stay readable
        let shade = GtkBox::new(Orientation::Vertical, 0);
        shade.set_hexpand(true);
        shade.set_vexpand(true);
        shade.set_can_target(false);
        shade.add_css_class("reel-shade");
        overlay.add_overlay(&shade);

        if !entry.products.is_empty() {
            overlay.add_overlay(&Self::build_product_tags(entry));
        }

        let like_button = Button::with_label(like_label(false));
        like_button.add_css_class("reel-action");
        let share_button = Button::with_label("[SHARE]");
        share_button.add_css_class("reel-action");
        let mute_button = Button::with_label(mute_label(true));
        mute_button.add_css_class("reel-action");

        let actions = GtkBox::new(Orientation::Vertical, CONTROL_SPACING);
        actions.set_halign(Align::End);
        actions.set_valign(Align::End);
        actions.set_margin_end(EDGE_MARGIN);
        actions.set_margin_bottom(EDGE_MARGIN * 3);
        actions.add_css_class("reel-actions");
        actions.append(&like_button);
        actions.append(&share_button);
        actions.append(&mute_button);
        overlay.add_overlay(&actions);

        let play_button = Button::with_label(play_label(false));
        play_button.set_halign(Align::Center);
        play_button.set_valign(Align::Center);
        play_button.add_css_class("play-glyph");
        overlay.add_overlay(&play_button);

        let time_label = Label::new(Some(&format_timestamp(0.0)));
        time_label.set_halign(Align::Start);
        time_label.set_margin_start(EDGE_MARGIN);
        time_label.add_css_class("reel-time");

        let progress_bar = ProgressBar::new();
        progress_bar.set_hexpand(true);
        progress_bar.add_css_class("reel-progress");

        let bottom = GtkBox::new(Orientation::Vertical, 4);
        bottom.set_valign(Align::End);
        bottom.set_hexpand(true);
        bottom.append(&time_label);
        bottom.append(&progress_bar);
        overlay.add_overlay(&bottom);

        let reel = Rc::new(Self {
            entry_id: entry.id.clone(),
            overlay,
            controller,
            play_button,
            like_button,
            mute_button,
            progress_bar,
            time_label,
            glyph_timer: RefCell::new(None),
        });

        reel.connect_signals(&share_button);
        reel.render(&reel.controller.state());
        reel
    }

    fn build_product_tags(entry: &VideoEntry) -> FlowBox {
        let tags = FlowBox::new();
        tags.set_selection_mode(SelectionMode::None);
        tags.set_valign(Align::Start);
        tags.set_halign(Align::Start);
        tags.set_margin_top(EDGE_MARGIN);
        tags.set_margin_start(EDGE_MARGIN);
        tags.set_margin_end(EDGE_MARGIN);
        tags.set_column_spacing(8);
        tags.set_row_spacing(8);
        tags.set_max_children_per_line(4);
        tags.add_css_class("product-tags");

        for product in &entry.products {
            let tag = Label::new(Some(&product.tag_label()));
            tag.add_css_class("product-tag");
            if !product.description.is_empty() {
                tag.set_tooltip_text(Some(&product.description));
            }
            tags.append(&tag);
        }
        tags
    }

    fn connect_signals(self: &Rc<Self>, share_button: &Button) {
        let reel_weak = Rc::downgrade(self);
        self.controller.connect_state_changed(move |state| {
            if let Some(reel) = reel_weak.upgrade() {
                reel.render(state);
            }
        });

        let reel_weak = Rc::downgrade(self);
        self.play_button.connect_clicked(move |_| {
            if let Some(reel) = reel_weak.upgrade() {
                reel.toggle_play();
            }
        });

        let reel_weak = Rc::downgrade(self);
        self.like_button.connect_clicked(move |_| {
            if let Some(reel) = reel_weak.upgrade() {
                reel.controller.toggle_like();
            }
        });

        let reel_weak = Rc::downgrade(self);
        share_button.connect_clicked(move |_| {
            if let Some(reel) = reel_weak.upgrade() {
                reel.controller.share();
            }
        });

        let reel_weak = Rc::downgrade(self);
        self.mute_button.connect_clicked(move |_| {
            if let Some(reel) = reel_weak.upgrade() {
                reel.controller.toggle_mute();
            }
        });

        let seek_click = GestureClick::new();
        seek_click.set_button(1);
        let reel_weak = Rc::downgrade(self);
        seek_click.connect_pressed(move |_, _n, x, _y| {
            let Some(reel) = reel_weak.upgrade() else {
                return;
            };
            let width = f64::from(reel.progress_bar.width());
            if let Some(target) = reel.controller.seek_to_click(x, width) {
                tracing::debug!(id = %reel.entry_id, target, "Seek");
            }
        });
        self.progress_bar.add_controller(seek_click);

        // Taps on the video itself; buttons claim their own clicks first
        let tap = GestureClick::new();
        tap.set_button(1);
        let reel_weak = Rc::downgrade(self);
        tap.connect_released(move |_, _n, _x, _y| {
            if let Some(reel) = reel_weak.upgrade() {
                reel.reveal_glyph();
            }
        });
        self.overlay.add_controller(tap);
    }

    fn render(&self, state: &PlayerState) {
        self.play_button.set_label(play_label(state.is_playing));
        self.like_button.set_label(like_label(state.is_liked));
        self.mute_button.set_label(mute_label(state.is_muted));

        if state.is_liked {
            self.like_button.add_css_class("liked");
        } else {
            self.like_button.remove_css_class("liked");
        }
        if state.is_playing {
            self.overlay.add_css_class("playing");
        } else {
            self.overlay.remove_css_class("playing");
        }

        self.progress_bar.set_fraction(state.progress / 100.0);

        let backend = self.controller.backend();
        self.time_label
            .set_text(&time_text(backend.position(), backend.duration()));
    }

    /// Show the play glyph for a few seconds, as hover does for pointers
    fn reveal_glyph(self: &Rc<Self>) {
        if let Some(id) = self.glyph_timer.borrow_mut().take() {
            id.remove();
        }
        self.play_button.add_css_class("revealed");

        let reel_weak = Rc::downgrade(self);
        let id = glib::timeout_add_local_once(GLYPH_REVEAL, move || {
            if let Some(reel) = reel_weak.upgrade() {
                reel.glyph_timer.borrow_mut().take();
                reel.play_button.remove_css_class("revealed");
            }
        });
        *self.glyph_timer.borrow_mut() = Some(id);
    }

    pub fn widget(&self) -> &Overlay {
        &self.overlay
    }

    /// Make the reel exactly one viewport tall
    pub fn set_viewport_height(&self, height: i32) {
        self.overlay.set_size_request(-1, height.max(1));
    }

    /// Forward the feed's visibility flag; play attempts run on the main loop
    pub fn set_visible(&self, visible: bool) {
        tracing::debug!(id = %self.entry_id, visible, "Reel visibility");
        if let Some(attempt) = self.controller.set_visible(visible) {
            glib::spawn_future_local(attempt);
        }
    }

    pub fn toggle_play(self: &Rc<Self>) {
        if let Some(attempt) = self.controller.toggle_play() {
            glib::spawn_future_local(attempt);
        }
        self.reveal_glyph();
    }

    pub fn toggle_mute(&self) {
        self.controller.toggle_mute();
    }

    pub fn toggle_like(&self) {
        self.controller.toggle_like();
    }

    pub fn share(&self) {
        self.controller.share();
    }
}
