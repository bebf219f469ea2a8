//! Per-reel playback state machine.
//!
//! A reel is either paused or playing. Visibility changes from the feed and
//! user toggles issue play/pause requests; each request takes a fresh sequence
//! number and the outcome of a play attempt is only applied if its number is
//! still current. A pause therefore always wins over a play attempt that
//! resolves after it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture;

use super::backend::PlaybackBackend;

/// How long like/share notifications stay on screen
pub const NOTIFY_DURATION: Duration = Duration::from_millis(1500);

pub const LIKED_MESSAGE: &str = "Added to likes";
pub const UNLIKED_MESSAGE: &str = "Removed from likes";
pub const SHARE_MESSAGE: &str = "Sharing functionality coming soon!";

/// Transient user-visible notifications
pub trait Notifier {
    fn notify(&self, message: &str, duration: Duration);
}

/// UI state of a single reel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub is_playing: bool,
    pub is_muted: bool,
    /// Playback position in percent, always within [0, 100]
    pub progress: f64,
    pub is_liked: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            is_playing: false,
            is_muted: true,
            progress: 0.0,
            is_liked: false,
        }
    }
}

/// Callback type for state changes
pub type StateCallback = Box<dyn Fn(&PlayerState) + 'static>;

/// Playback position as a percentage of the duration.
///
/// Unknown or zero durations report 0.
pub fn progress_percent(position: f64, duration: f64) -> f64 {
    if !duration.is_finite() || duration <= 0.0 || !position.is_finite() {
        return 0.0;
    }
    (position / duration * 100.0).clamp(0.0, 100.0)
}

/// Fraction of the progress bar under a click, clamped to [0, 1]
pub fn seek_fraction(click_x: f64, bar_width: f64) -> Option<f64> {
    if !bar_width.is_finite() || bar_width <= 0.0 || !click_x.is_finite() {
        return None;
    }
    Some((click_x / bar_width).clamp(0.0, 1.0))
}

pub struct ReelController {
    backend: Rc<dyn PlaybackBackend>,
    notifier: Rc<dyn Notifier>,
    state: Cell<PlayerState>,
    visible: Cell<bool>,
    /// Whether the latest request asked for playback
    play_requested: Cell<bool>,
    request_seq: Cell<u64>,
    state_callbacks: RefCell<Vec<StateCallback>>,
}

impl ReelController {
    pub fn new(backend: Rc<dyn PlaybackBackend>, notifier: Rc<dyn Notifier>) -> Rc<Self> {
        let state = PlayerState::default();
        backend.set_muted(state.is_muted);

        let controller = Rc::new(Self {
            backend,
            notifier,
            state: Cell::new(state),
            visible: Cell::new(false),
            play_requested: Cell::new(false),
            request_seq: Cell::new(0),
            state_callbacks: RefCell::new(Vec::new()),
        });

        let controller_weak = Rc::downgrade(&controller);
        controller
            .backend
            .connect_time_update(Box::new(move |position, duration| {
                if let Some(controller) = controller_weak.upgrade() {
                    controller.on_time_update(position, duration);
                }
            }));

        controller
    }

    pub fn state(&self) -> PlayerState {
        self.state.get()
    }

    pub fn backend(&self) -> &Rc<dyn PlaybackBackend> {
        &self.backend
    }

    /// Register a callback for state changes
    pub fn connect_state_changed<F: Fn(&PlayerState) + 'static>(&self, callback: F) {
        self.state_callbacks.borrow_mut().push(Box::new(callback));
    }

    /// React to the feed's visibility flag.
    ///
    /// Becoming visible returns the play attempt, which the caller spawns on
    /// the main loop. Becoming hidden pauses synchronously.
    pub fn set_visible(self: &Rc<Self>, visible: bool) -> Option<LocalBoxFuture<'static, ()>> {
        if self.visible.replace(visible) == visible {
            return None;
        }

        if visible {
            Some(self.request_play())
        } else {
            self.request_pause();
            None
        }
    }

    /// User play/pause toggle. Only the visible reel may start playing.
    pub fn toggle_play(self: &Rc<Self>) -> Option<LocalBoxFuture<'static, ()>> {
        if self.state.get().is_playing {
            self.request_pause();
            None
        } else if !self.visible.get() {
            tracing::debug!("Ignoring play toggle on hidden reel");
            None
        } else {
            self.update(|state| state.is_playing = true);
            Some(self.request_play())
        }
    }

    pub fn toggle_mute(&self) {
        let muted = !self.state.get().is_muted;
        self.backend.set_muted(muted);
        self.update(|state| state.is_muted = muted);
    }

    pub fn on_time_update(&self, position: f64, duration: f64) {
        let progress = progress_percent(position, duration);
        self.update(|state| state.progress = progress);
    }

    /// Seek to the point of the progress bar that was clicked.
    ///
    /// Returns the new position in seconds, or `None` if the bar or the
    /// duration is unknown or the backend dropped the seek.
    pub fn seek_to_click(&self, click_x: f64, bar_width: f64) -> Option<f64> {
        let fraction = seek_fraction(click_x, bar_width)?;
        let duration = self.backend.duration();
        if !duration.is_finite() || duration <= 0.0 {
            return None;
        }

        let target = fraction * duration;
        if !self.backend.seek(target) {
            return None;
        }
        self.update(|state| state.progress = fraction * 100.0);
        Some(target)
    }

    pub fn toggle_like(&self) {
        let liked = !self.state.get().is_liked;
        self.update(|state| state.is_liked = liked);
        let message = if liked { LIKED_MESSAGE } else { UNLIKED_MESSAGE };
        self.notifier.notify(message, NOTIFY_DURATION);
    }

    pub fn share(&self) {
        self.notifier.notify(SHARE_MESSAGE, NOTIFY_DURATION);
    }

    fn next_request(&self) -> u64 {
        let token = self.request_seq.get().wrapping_add(1);
        self.request_seq.set(token);
        token
    }

    fn is_current(&self, token: u64) -> bool {
        self.request_seq.get() == token
    }

    fn request_play(self: &Rc<Self>) -> LocalBoxFuture<'static, ()> {
        let token = self.next_request();
        self.play_requested.set(true);
        tracing::debug!(token, "Requesting playback");
        Box::pin(self.clone().run_play_attempt(token))
    }

    fn request_pause(&self) {
        self.next_request();
        self.play_requested.set(false);
        self.backend.pause();
        self.update(|state| state.is_playing = false);
    }

    /// Play, and on rejection force mute and try exactly once more
    async fn run_play_attempt(self: Rc<Self>, token: u64) {
        let outcome = match self.backend.play().await {
            Ok(()) => Ok(()),
            Err(err) => {
                if !self.is_current(token) {
                    self.settle_stale(token);
                    return;
                }
                tracing::debug!(token, error = %err, "Playback rejected, retrying muted");
                self.backend.set_muted(true);
                self.update(|state| state.is_muted = true);
                self.backend.play().await
            }
        };

        if !self.is_current(token) {
            self.settle_stale(token);
            return;
        }

        match outcome {
            Ok(()) => self.update(|state| state.is_playing = true),
            Err(err) => {
                tracing::warn!(token, error = %err, "Playback retry failed, staying paused");
                self.play_requested.set(false);
                self.update(|state| state.is_playing = false);
            }
        }
    }

    /// A newer request owns the backend. If that request was a pause, stop
    /// whatever the late attempt may have started.
    fn settle_stale(&self, token: u64) {
        tracing::debug!(token, current = self.request_seq.get(), "Discarding stale play outcome");
        if !self.play_requested.get() {
            self.backend.pause();
        }
    }

    fn update(&self, apply: impl FnOnce(&mut PlayerState)) {
        let mut state = self.state.get();
        apply(&mut state);
        if state == self.state.get() {
            return;
        }
        self.state.set(state);
        for callback in self.state_callbacks.borrow().iter() {
            callback(&state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::backend::{PlayFuture, PlaybackError, TimeUpdateCallback};
    use futures::channel::oneshot;
    use futures::executor::{block_on, LocalPool};
    use futures::task::LocalSpawnExt;
    use std::collections::VecDeque;

    enum Script {
        Now(Result<(), PlaybackError>),
        Later(oneshot::Receiver<Result<(), PlaybackError>>),
    }

    #[derive(Default)]
    struct FakeBackend {
        scripts: RefCell<VecDeque<Script>>,
        calls: RefCell<Vec<String>>,
        playing: Rc<Cell<bool>>,
        muted: Cell<bool>,
        duration: Cell<f64>,
        position: Cell<f64>,
        unseekable: Cell<bool>,
        time_update: RefCell<Option<TimeUpdateCallback>>,
    }

    impl FakeBackend {
        fn script(&self, script: Script) {
            self.scripts.borrow_mut().push_back(script);
        }

        fn deferred(&self) -> oneshot::Sender<Result<(), PlaybackError>> {
            let (tx, rx) = oneshot::channel();
            self.script(Script::Later(rx));
            tx
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn emit_time(&self, position: f64, duration: f64) {
            self.position.set(position);
            self.duration.set(duration);
            if let Some(callback) = self.time_update.borrow().as_ref() {
                callback(position, duration);
            }
        }
    }

    impl PlaybackBackend for FakeBackend {
        fn play(&self) -> PlayFuture {
            self.calls.borrow_mut().push("play".to_string());
            let script = self
                .scripts
                .borrow_mut()
                .pop_front()
                .unwrap_or(Script::Now(Ok(())));
            let playing = self.playing.clone();
            Box::pin(async move {
                let result = match script {
                    Script::Now(result) => result,
                    Script::Later(rx) => rx.await.unwrap_or(Err(PlaybackError::NotReady)),
                };
                if result.is_ok() {
                    playing.set(true);
                }
                result
            })
        }

        fn pause(&self) {
            self.calls.borrow_mut().push("pause".to_string());
            self.playing.set(false);
        }

        fn set_muted(&self, muted: bool) {
            self.calls.borrow_mut().push(format!("mute:{}", muted));
            self.muted.set(muted);
        }

        fn seek(&self, seconds: f64) -> bool {
            self.calls.borrow_mut().push(format!("seek:{:.1}", seconds));
            if self.unseekable.get() {
                return false;
            }
            self.position.set(seconds);
            true
        }

        fn position(&self) -> f64 {
            self.position.get()
        }

        fn duration(&self) -> f64 {
            self.duration.get()
        }

        fn connect_time_update(&self, callback: TimeUpdateCallback) {
            *self.time_update.borrow_mut() = Some(callback);
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: RefCell<Vec<(String, Duration)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, message: &str, duration: Duration) {
            self.messages
                .borrow_mut()
                .push((message.to_string(), duration));
        }
    }

    fn setup() -> (Rc<FakeBackend>, Rc<RecordingNotifier>, Rc<ReelController>) {
        let backend = Rc::new(FakeBackend::default());
        let notifier = Rc::new(RecordingNotifier::default());
        let controller = ReelController::new(backend.clone(), notifier.clone());
        backend.calls.borrow_mut().clear();
        (backend, notifier, controller)
    }

    #[test]
    fn test_initial_state_is_muted_and_paused() {
        let backend = Rc::new(FakeBackend::default());
        let notifier = Rc::new(RecordingNotifier::default());
        let controller = ReelController::new(backend.clone(), notifier);

        assert_eq!(controller.state(), PlayerState::default());
        assert!(controller.state().is_muted);
        assert!(backend.muted.get());
    }

    #[test]
    fn test_visible_starts_playback() {
        let (backend, _, controller) = setup();

        let attempt = controller.set_visible(true).expect("play attempt");
        block_on(attempt);

        assert!(controller.state().is_playing);
        assert!(backend.playing.get());
        assert_eq!(backend.calls(), vec!["play"]);
    }

    #[test]
    fn test_repeated_visibility_is_ignored() {
        let (_, _, controller) = setup();
        block_on(controller.set_visible(true).unwrap());
        assert!(controller.set_visible(true).is_none());
    }

    #[test]
    fn test_rejection_forces_mute_and_retries_once() {
        let (backend, notifier, controller) = setup();
        controller.toggle_mute();
        assert!(!controller.state().is_muted);

        backend.script(Script::Now(Err(PlaybackError::Rejected("autoplay".into()))));
        block_on(controller.set_visible(true).unwrap());

        let state = controller.state();
        assert!(state.is_muted);
        assert!(state.is_playing);
        assert_eq!(backend.calls(), vec!["mute:false", "play", "mute:true", "play"]);
        assert!(notifier.messages.borrow().is_empty());
    }

    #[test]
    fn test_second_rejection_stays_paused_silently() {
        let (backend, notifier, controller) = setup();
        backend.script(Script::Now(Err(PlaybackError::Rejected("autoplay".into()))));
        backend.script(Script::Now(Err(PlaybackError::Timeout(Duration::from_secs(5)))));

        block_on(controller.set_visible(true).unwrap());

        let state = controller.state();
        assert!(state.is_muted);
        assert!(!state.is_playing);
        assert_eq!(
            backend.calls().iter().filter(|c| *c == "play").count(),
            2
        );
        assert!(notifier.messages.borrow().is_empty());
    }

    #[test]
    fn test_hidden_pauses_playing_reel() {
        let (backend, _, controller) = setup();
        block_on(controller.set_visible(true).unwrap());
        assert!(controller.state().is_playing);

        assert!(controller.set_visible(false).is_none());
        assert!(!controller.state().is_playing);
        assert!(!backend.playing.get());
        assert_eq!(backend.calls().last().map(String::as_str), Some("pause"));
    }

    #[test]
    fn test_pause_wins_over_late_play() {
        let (backend, _, controller) = setup();
        let resolve = backend.deferred();

        let mut pool = LocalPool::new();
        pool.spawner()
            .spawn_local(controller.set_visible(true).unwrap())
            .unwrap();
        pool.run_until_stalled();
        assert_eq!(backend.calls(), vec!["play"]);

        controller.set_visible(false);
        resolve.send(Ok(())).unwrap();
        pool.run_until_stalled();

        assert!(!controller.state().is_playing);
        assert!(!backend.playing.get());
        assert_eq!(backend.calls(), vec!["play", "pause", "pause"]);
    }

    #[test]
    fn test_pause_wins_over_late_rejection() {
        let (backend, _, controller) = setup();
        let resolve = backend.deferred();

        let mut pool = LocalPool::new();
        pool.spawner()
            .spawn_local(controller.set_visible(true).unwrap())
            .unwrap();
        pool.run_until_stalled();

        controller.set_visible(false);
        resolve
            .send(Err(PlaybackError::Rejected("late".into())))
            .unwrap();
        pool.run_until_stalled();

        // No muted retry for an attempt that was superseded.
        assert!(!backend.calls().contains(&"mute:true".to_string()));
        assert!(!controller.state().is_playing);
        assert!(!backend.playing.get());
    }

    #[test]
    fn test_stale_success_does_not_pause_newer_attempt() {
        let (backend, _, controller) = setup();
        let first = backend.deferred();
        let second = backend.deferred();

        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        spawner
            .spawn_local(controller.set_visible(true).unwrap())
            .unwrap();
        pool.run_until_stalled();
        controller.set_visible(false);
        spawner
            .spawn_local(controller.set_visible(true).unwrap())
            .unwrap();
        pool.run_until_stalled();

        first.send(Ok(())).unwrap();
        pool.run_until_stalled();
        assert_eq!(backend.calls(), vec!["play", "pause", "play"]);

        second.send(Ok(())).unwrap();
        pool.run_until_stalled();
        assert!(controller.state().is_playing);
        assert!(backend.playing.get());
    }

    #[test]
    fn test_toggle_play_flips_and_rolls_back_on_failure() {
        let (backend, _, controller) = setup();
        block_on(controller.set_visible(true).unwrap());

        assert!(controller.toggle_play().is_none());
        assert!(!controller.state().is_playing);
        assert!(!backend.playing.get());

        let attempt = controller.toggle_play().expect("play attempt");
        assert!(controller.state().is_playing);
        block_on(attempt);
        assert!(controller.state().is_playing);
        assert!(backend.playing.get());

        assert!(controller.toggle_play().is_none());
        backend.script(Script::Now(Err(PlaybackError::NotReady)));
        backend.script(Script::Now(Err(PlaybackError::NotReady)));
        let attempt = controller.toggle_play().unwrap();
        assert!(controller.state().is_playing);
        block_on(attempt);
        assert!(!controller.state().is_playing);
    }

    #[test]
    fn test_toggle_play_ignored_on_hidden_reel() {
        let (backend, _, controller) = setup();
        block_on(controller.set_visible(true).unwrap());
        controller.set_visible(false);
        backend.calls.borrow_mut().clear();

        assert!(controller.toggle_play().is_none());
        assert!(!controller.state().is_playing);
        assert!(!backend.playing.get());
        assert!(backend.calls().is_empty());

        // Scrolling back still starts playback normally.
        block_on(controller.set_visible(true).expect("play attempt"));
        assert!(controller.state().is_playing);
    }

    #[test]
    fn test_mute_is_independent_of_play_state() {
        let (backend, _, controller) = setup();
        controller.toggle_mute();
        assert!(!controller.state().is_muted);
        assert!(!backend.muted.get());
        assert!(!controller.state().is_playing);

        controller.toggle_mute();
        assert!(controller.state().is_muted);
        assert!(backend.muted.get());
    }

    #[test]
    fn test_progress_follows_time_updates() {
        let (backend, _, controller) = setup();

        backend.emit_time(30.0, 120.0);
        assert!((controller.state().progress - 25.0).abs() < 1e-9);

        backend.emit_time(130.0, 120.0);
        assert_eq!(controller.state().progress, 100.0);

        backend.emit_time(5.0, 0.0);
        assert_eq!(controller.state().progress, 0.0);

        backend.emit_time(5.0, f64::NAN);
        assert_eq!(controller.state().progress, 0.0);
    }

    #[test]
    fn test_progress_percent_bounds() {
        for step in 0..50 {
            let position = step as f64 * 7.3 - 20.0;
            let progress = progress_percent(position, 100.0);
            assert!((0.0..=100.0).contains(&progress));
        }
        assert!((progress_percent(12.0, 48.0) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_seek_to_click() {
        let (backend, _, controller) = setup();
        backend.duration.set(120.0);

        let target = controller.seek_to_click(50.0, 200.0).unwrap();
        assert!((target - 30.0).abs() < 1e-9);
        assert!((backend.position.get() - 30.0).abs() < 1e-9);
        assert!((controller.state().progress - 25.0).abs() < 1e-9);
        assert_eq!(backend.calls(), vec!["seek:30.0"]);
    }

    #[test]
    fn test_seek_ignored_without_duration_or_width() {
        let (backend, _, controller) = setup();
        assert_eq!(controller.seek_to_click(50.0, 200.0), None);

        backend.duration.set(60.0);
        assert_eq!(controller.seek_to_click(50.0, 0.0), None);
        assert!(backend.calls().is_empty());

        let target = controller.seek_to_click(500.0, 200.0).unwrap();
        assert!((target - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_dropped_seek_keeps_progress() {
        let (backend, _, controller) = setup();
        backend.duration.set(120.0);
        backend.emit_time(12.0, 120.0);
        backend.unseekable.set(true);

        assert_eq!(controller.seek_to_click(150.0, 200.0), None);
        assert!((controller.state().progress - 10.0).abs() < 1e-9);
        assert!((backend.position.get() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_like_twice_restores_and_notifies_both_labels() {
        let (_, notifier, controller) = setup();
        let original = controller.state().is_liked;

        controller.toggle_like();
        assert!(controller.state().is_liked);
        controller.toggle_like();
        assert_eq!(controller.state().is_liked, original);

        let messages = notifier.messages.borrow();
        assert_eq!(
            *messages,
            vec![
                (LIKED_MESSAGE.to_string(), NOTIFY_DURATION),
                (UNLIKED_MESSAGE.to_string(), NOTIFY_DURATION),
            ]
        );
    }

    #[test]
    fn test_share_always_same_notification() {
        let (_, notifier, controller) = setup();
        controller.share();
        controller.toggle_like();
        controller.share();

        let messages = notifier.messages.borrow();
        assert_eq!(messages[0].0, SHARE_MESSAGE);
        assert_eq!(messages[2].0, SHARE_MESSAGE);
        assert_eq!(messages[0], messages[2]);
    }

    #[test]
    fn test_state_callbacks_fire_on_change_only() {
        let (backend, _, controller) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        controller.connect_state_changed(move |state| {
            seen_clone.borrow_mut().push(*state);
        });

        backend.emit_time(10.0, 100.0);
        backend.emit_time(10.0, 100.0);
        controller.toggle_like();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].is_liked);
    }
}
