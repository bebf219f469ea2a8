// Main window for the reelfeed player
// Portrait ApplicationWindow holding the feed, a position counter and toasts

use gdk4::Display;
use gtk4::prelude::*;
use gtk4::{
    Align, Application, ApplicationWindow, CssProvider, Label, Overlay, Settings,
    STYLE_PROVIDER_PRIORITY_APPLICATION,
};
use std::cell::RefCell;
use std::path::Path;
use std::rc::{Rc, Weak};
use std::time::Duration;

use super::feed_view::FeedView;
use super::keybindings::{FeedAction, Keybindings};
use super::toast::ToastOverlay;
use crate::config::Config;
use crate::feed::Step;
use crate::models::VideoEntry;
use crate::playback::Notifier;

const DEFAULT_WIDTH: i32 = 420;
const DEFAULT_HEIGHT: i32 = 760;
/// Startup problems stay on screen longer than reel toasts
const STARTUP_TOAST: Duration = Duration::from_secs(4);

const FALLBACK_CSS: &str = r#"
* {
    border-radius: 0;
    box-shadow: none;
    background-image: none;
}

window {
    background-color: #0a0a0a;
    color: #e0e0e0;
}

button {
    background-color: rgba(10, 10, 10, 0.55);
    border: 1px solid #333333;
    color: #e0e0e0;
}

button:hover {
    background-color: rgba(224, 224, 224, 0.10);
    border-color: #555555;
}

.feed, .feed-column {
    background-color: #000000;
}

.reel {
    background-color: #000000;
}

.reel-shade {
    background-image: linear-gradient(to bottom,
        rgba(0, 0, 0, 0.45) 0%,
        rgba(0, 0, 0, 0) 20%,
        rgba(0, 0, 0, 0) 75%,
        rgba(0, 0, 0, 0.55) 100%);
}

.product-tag {
    background-color: rgba(10, 10, 10, 0.70);
    border: 1px solid #00ff88;
    color: #00ff88;
    padding: 2px 6px;
    font-family: monospace;
}

.reel-action {
    min-width: 84px;
    font-family: monospace;
}

.reel-action.liked {
    border-color: #ff3366;
    color: #ff3366;
}

.play-glyph {
    opacity: 0;
    font-family: monospace;
    font-size: 18px;
    padding: 12px 18px;
    transition: opacity 150ms ease-out;
}

.reel:hover .play-glyph,
.play-glyph.revealed {
    opacity: 1;
}

.reel-time {
    color: #e0e0e0;
    font-family: monospace;
    font-size: 11px;
}

progressbar.reel-progress > trough {
    min-height: 6px;
    background-color: rgba(224, 224, 224, 0.20);
}

progressbar.reel-progress > trough > progress {
    min-height: 6px;
    background-color: #00ff88;
}

.reel-counter {
    background-color: rgba(10, 10, 10, 0.70);
    color: #888888;
    font-family: monospace;
    padding: 2px 6px;
}

.toast {
    background-color: rgba(10, 10, 10, 0.85);
    border: 1px solid #00ff88;
    padding: 8px 14px;
}

.toast-label {
    color: #00ff88;
    font-family: monospace;
}

.muted {
    color: #666666;
}
"#;

fn load_css() {
    let provider = CssProvider::new();

    // Try to load from file first, fall back to embedded CSS
    let css_path = concat!(env!("CARGO_MANIFEST_DIR"), "/src/style.css");

    if Path::new(css_path).exists() {
        provider.load_from_path(css_path);
        tracing::info!("Loaded CSS from: {}", css_path);
    } else {
        provider.load_from_string(FALLBACK_CSS);
        tracing::info!("Loaded fallback embedded CSS");
    }

    if let Some(display) = Display::default() {
        gtk4::style_context_add_provider_for_display(
            &display,
            &provider,
            STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    }
}

/// Text for the position counter, e.g. "> 2/3"
fn counter_text(active: Option<usize>, count: usize) -> String {
    match active {
        Some(index) if index < count => format!("> {}/{}", index + 1, count),
        _ => format!("> -/{}", count),
    }
}

/// Main window for the reel feed
pub struct MainWindow {
    self_weak: RefCell<Weak<MainWindow>>,
    window: ApplicationWindow,
    feed_view: Rc<FeedView>,
    toasts: Rc<ToastOverlay>,
    counter_label: Label,
    keybindings: Keybindings,
}

impl MainWindow {
    /// Build the window and populate the feed.
    ///
    /// `load_warning` is shown as a toast once the window is up, for feeds
    /// that failed to load and were replaced by the sample.
    pub fn new(
        app: &Application,
        config: &Config,
        entries: &[VideoEntry],
        load_warning: Option<String>,
    ) -> Rc<Self> {
        load_css();
        if let Some(settings) = Settings::default() {
            settings.set_gtk_application_prefer_dark_theme(true);
        }

        let window = ApplicationWindow::builder()
            .application(app)
            .title("reelfeed")
            .default_width(DEFAULT_WIDTH)
            .default_height(DEFAULT_HEIGHT)
            .build();

        let feed_view = FeedView::new(config.snap_delay);
        let toasts = ToastOverlay::new();

        let counter_label = Label::new(Some(&counter_text(None, entries.len())));
        counter_label.set_halign(Align::End);
        counter_label.set_valign(Align::Start);
        counter_label.set_margin_top(8);
        counter_label.set_margin_end(8);
        counter_label.set_can_target(false);
        counter_label.add_css_class("reel-counter");

        let root = Overlay::new();
        root.set_child(Some(feed_view.widget()));
        root.add_overlay(&counter_label);
        root.add_overlay(toasts.widget());
        window.set_child(Some(&root));

        let main_window = Rc::new(Self {
            self_weak: RefCell::new(Weak::new()),
            window,
            feed_view,
            toasts,
            counter_label,
            keybindings: Keybindings::new(),
        });
        *main_window.self_weak.borrow_mut() = Rc::downgrade(&main_window);

        main_window.connect_signals();
        main_window
            .feed_view
            .set_entries(entries, config.backend, main_window.toasts.notifier());

        if let Some(warning) = load_warning {
            main_window
                .toasts
                .notifier()
                .notify(&warning, STARTUP_TOAST);
        }

        main_window
    }

    fn connect_signals(&self) {
        self.keybindings.attach(&self.window);

        let window_weak = self.self_weak.borrow().clone();
        self.keybindings.connect_action(move |action| {
            if let Some(window) = window_weak.upgrade() {
                window.handle_action(action);
            }
        });

        let counter = self.counter_label.clone();
        self.feed_view.connect_active_changed(move |active, count| {
            counter.set_text(&counter_text(active, count));
        });

        let window_weak = self.self_weak.borrow().clone();
        self.window.connect_close_request(move |_| {
            if let Some(window) = window_weak.upgrade() {
                window.feed_view.pause_all();
            }
            glib::Propagation::Proceed
        });
    }

    fn handle_action(&self, action: FeedAction) {
        match action {
            FeedAction::Next => self.feed_view.step(Step::Next),
            FeedAction::Previous => self.feed_view.step(Step::Previous),
            FeedAction::ToggleFullscreen => self.toggle_fullscreen(),
            FeedAction::Close => self.window.close(),
            FeedAction::TogglePlay
            | FeedAction::ToggleMute
            | FeedAction::ToggleLike
            | FeedAction::Share => {
                let Some(reel) = self.feed_view.active_reel() else {
                    tracing::debug!(?action, "No active reel");
                    return;
                };
                match action {
                    FeedAction::TogglePlay => reel.toggle_play(),
                    FeedAction::ToggleMute => reel.toggle_mute(),
                    FeedAction::ToggleLike => reel.toggle_like(),
                    _ => reel.share(),
                }
            }
        }
    }

    /// Toggle fullscreen mode for the app window
    fn toggle_fullscreen(&self) {
        if self.window.is_fullscreen() {
            self.window.unfullscreen();
        } else {
            self.window.fullscreen();
        }
    }

    /// Present the window
    pub fn present(&self) {
        self.window.present();
    }
}
