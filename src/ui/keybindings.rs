// Keybindings for the reel feed
//
// Keybindings:
// - j / Down / Page Down: Next reel
// - k / Up / Page Up: Previous reel
// - Space: Play/pause the active reel
// - m: Toggle mute
// - l: Toggle like
// - s: Share
// - f: Toggle fullscreen
// - q / Escape: Close the window

use gdk4::{Key, ModifierType};
use gtk4::prelude::*;
use gtk4::{EventControllerKey, PropagationPhase, Widget};
use std::cell::RefCell;
use std::rc::Rc;

/// Something the keyboard can ask the feed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedAction {
    Next,
    Previous,
    TogglePlay,
    ToggleMute,
    ToggleLike,
    Share,
    ToggleFullscreen,
    Close,
}

/// Map a key to its feed action, if any
pub fn action_for_key(keyval: Key) -> Option<FeedAction> {
    match keyval {
        Key::j | Key::J | Key::Down | Key::Page_Down | Key::KP_Down | Key::KP_Page_Down => {
            Some(FeedAction::Next)
        }
        Key::k | Key::K | Key::Up | Key::Page_Up | Key::KP_Up | Key::KP_Page_Up => {
            Some(FeedAction::Previous)
        }
        Key::space => Some(FeedAction::TogglePlay),
        Key::m | Key::M => Some(FeedAction::ToggleMute),
        Key::l | Key::L => Some(FeedAction::ToggleLike),
        Key::s | Key::S => Some(FeedAction::Share),
        Key::f | Key::F | Key::F11 => Some(FeedAction::ToggleFullscreen),
        Key::q | Key::Q | Key::Escape => Some(FeedAction::Close),
        _ => None,
    }
}

/// Callback type for feed actions
pub type ActionCallback = Box<dyn Fn(FeedAction)>;

pub struct Keybindings {
    controller: EventControllerKey,
    on_action: Rc<RefCell<Option<ActionCallback>>>,
}

impl Keybindings {
    pub fn new() -> Self {
        let controller = EventControllerKey::new();
        // Capture so the focused button does not swallow Space
        controller.set_propagation_phase(PropagationPhase::Capture);

        let on_action: Rc<RefCell<Option<ActionCallback>>> = Rc::new(RefCell::new(None));

        let on_action_clone = on_action.clone();
        controller.connect_key_pressed(move |_, keyval, _keycode, modifiers| {
            // Leave Ctrl/Alt shortcuts to GTK
            if modifiers.intersects(ModifierType::CONTROL_MASK | ModifierType::ALT_MASK) {
                return glib::Propagation::Proceed;
            }

            let Some(action) = action_for_key(keyval) else {
                return glib::Propagation::Proceed;
            };
            match *on_action_clone.borrow() {
                Some(ref callback) => {
                    tracing::debug!(?action, "Key action");
                    callback(action);
                    glib::Propagation::Stop
                }
                None => glib::Propagation::Proceed,
            }
        });

        Self {
            controller,
            on_action,
        }
    }

    /// Attach the keybindings to a widget
    pub fn attach(&self, widget: &impl IsA<Widget>) {
        widget.add_controller(self.controller.clone());
    }

    /// Connect callback for feed actions
    pub fn connect_action<F>(&self, callback: F)
    where
        F: Fn(FeedAction) + 'static,
    {
        *self.on_action.borrow_mut() = Some(Box::new(callback));
    }
}

impl Default for Keybindings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_keys() {
        for key in [Key::j, Key::Down, Key::Page_Down] {
            assert_eq!(action_for_key(key), Some(FeedAction::Next));
        }
        for key in [Key::k, Key::Up, Key::Page_Up] {
            assert_eq!(action_for_key(key), Some(FeedAction::Previous));
        }
    }

    #[test]
    fn test_reel_action_keys() {
        assert_eq!(action_for_key(Key::space), Some(FeedAction::TogglePlay));
        assert_eq!(action_for_key(Key::m), Some(FeedAction::ToggleMute));
        assert_eq!(action_for_key(Key::l), Some(FeedAction::ToggleLike));
        assert_eq!(action_for_key(Key::s), Some(FeedAction::Share));
        assert_eq!(action_for_key(Key::f), Some(FeedAction::ToggleFullscreen));
        assert_eq!(action_for_key(Key::Escape), Some(FeedAction::Close));
        assert_eq!(action_for_key(Key::q), Some(FeedAction::Close));
    }

    #[test]
    fn test_unbound_keys() {
        assert_eq!(action_for_key(Key::a), None);
        assert_eq!(action_for_key(Key::Return), None);
        assert_eq!(action_for_key(Key::Left), None);
    }
}
