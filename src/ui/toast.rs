// Transient toast messages layered over the feed
// Reels push messages through a channel; the overlay drains it on the main loop

use gtk4::prelude::*;
use gtk4::{Align, Label, Revealer, RevealerTransitionType};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::playback::Notifier;

const TOAST_TRANSITION_MS: u32 = 150;

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub message: String,
    pub duration: Duration,
}

/// `Notifier` that forwards messages to a `ToastOverlay`
pub struct ChannelNotifier {
    sender: async_channel::Sender<Toast>,
}

impl ChannelNotifier {
    pub fn new(sender: async_channel::Sender<Toast>) -> Self {
        Self { sender }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, message: &str, duration: Duration) {
        let toast = Toast {
            message: message.to_string(),
            duration,
        };
        if self.sender.try_send(toast).is_err() {
            tracing::debug!(text = message, "Toast dropped, overlay is gone");
        }
    }
}

pub struct ToastOverlay {
    revealer: Revealer,
    label: Label,
    sender: async_channel::Sender<Toast>,
    hide_timer: RefCell<Option<glib::SourceId>>,
}

impl ToastOverlay {
    pub fn new() -> Rc<Self> {
        let label = Label::new(None);
        label.set_wrap(true);
        label.set_max_width_chars(32);
        label.add_css_class("toast-label");

        let revealer = Revealer::builder()
            .transition_type(RevealerTransitionType::Crossfade)
            .transition_duration(TOAST_TRANSITION_MS)
            .reveal_child(false)
            .halign(Align::Center)
            .valign(Align::Start)
            .margin_top(48)
            .can_target(false)
            .child(&label)
            .build();
        revealer.add_css_class("toast");

        let (sender, receiver) = async_channel::unbounded::<Toast>();

        let overlay = Rc::new(Self {
            revealer,
            label,
            sender,
            hide_timer: RefCell::new(None),
        });

        let overlay_weak = Rc::downgrade(&overlay);
        glib::spawn_future_local(async move {
            while let Ok(toast) = receiver.recv().await {
                let Some(overlay) = overlay_weak.upgrade() else {
                    break;
                };
                overlay.show(&toast);
            }
        });

        overlay
    }

    pub fn widget(&self) -> &Revealer {
        &self.revealer
    }

    pub fn notifier(&self) -> Rc<dyn Notifier> {
        Rc::new(ChannelNotifier::new(self.sender.clone()))
    }

    /// Show a message now; a newer toast replaces the one on screen
    pub fn show(self: &Rc<Self>, toast: &Toast) {
        if let Some(id) = self.hide_timer.borrow_mut().take() {
            id.remove();
        }

        self.label.set_text(&toast.message);
        self.revealer.set_reveal_child(true);

        let overlay_weak = Rc::downgrade(self);
        let id = glib::timeout_add_local_once(toast.duration, move || {
            if let Some(overlay) = overlay_weak.upgrade() {
                overlay.hide_timer.borrow_mut().take();
                overlay.revealer.set_reveal_child(false);
            }
        });
        *self.hide_timer.borrow_mut() = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_notifier_forwards_message() {
        let (sender, receiver) = async_channel::unbounded();
        let notifier = ChannelNotifier::new(sender);
        notifier.notify("Added to likes", Duration::from_millis(1500));

        let toast = receiver.try_recv().expect("toast queued");
        assert_eq!(toast.message, "Added to likes");
        assert_eq!(toast.duration, Duration::from_millis(1500));
    }

    #[test]
    fn test_channel_notifier_survives_closed_overlay() {
        let (sender, receiver) = async_channel::unbounded();
        drop(receiver);
        let notifier = ChannelNotifier::new(sender);
        notifier.notify("Sharing functionality coming soon!", Duration::from_secs(1));
    }
}
