use std::rc::Rc;
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{self, Either, LocalBoxFuture};
use gtk4::glib;
use gtk4::prelude::*;
use thiserror::Error;

use super::media_file::MediaFileBackend;
use super::mpv::MpvBackend;

/// How long a backend waits for its media to become ready before rejecting a play request
pub const PREPARE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a play request, resolved once the backend knows whether playback started
pub type PlayFuture = LocalBoxFuture<'static, Result<(), PlaybackError>>;

/// Callback type for time updates (position, duration) in seconds
pub type TimeUpdateCallback = Box<dyn Fn(f64, f64) + 'static>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    #[error("playback rejected: {0}")]
    Rejected(String),
    #[error("playback backend not ready")]
    NotReady,
    #[error("timed out after {0:?} waiting for media")]
    Timeout(Duration),
}

/// Media playback primitive driven by a reel.
///
/// Everything except `play` is fire-and-forget; `play` resolves once the
/// backend knows whether playback actually started.
pub trait PlaybackBackend {
    fn play(&self) -> PlayFuture;
    fn pause(&self);
    fn set_muted(&self, muted: bool);
    /// Jump to an absolute position in seconds. Returns false if the
    /// backend could not seek, e.g. on a live or non-seekable stream.
    fn seek(&self, seconds: f64) -> bool;
    fn position(&self) -> f64;
    fn duration(&self) -> f64;
    fn connect_time_update(&self, callback: TimeUpdateCallback);
}

/// Which playback implementation renders the reels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// GTK's own media stream painted into a `Picture`
    #[default]
    Gtk,
    /// libmpv rendering into a `GLArea`
    Mpv,
}

impl BackendKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gtk" | "gstreamer" | "media-file" => Some(Self::Gtk),
            "mpv" | "libmpv" => Some(Self::Mpv),
            _ => None,
        }
    }
}

/// A backend together with the widget it draws into
pub struct BackendHandle {
    pub backend: Rc<dyn PlaybackBackend>,
    pub surface: gtk4::Widget,
}

pub fn create_backend(kind: BackendKind, source: &str) -> BackendHandle {
    match kind {
        BackendKind::Gtk => {
            let backend = Rc::new(MediaFileBackend::new(source));
            let surface = backend.widget().clone().upcast::<gtk4::Widget>();
            BackendHandle { backend, surface }
        }
        BackendKind::Mpv => {
            let backend = Rc::new(MpvBackend::new(source));
            let surface = backend.widget().clone().upcast::<gtk4::Widget>();
            BackendHandle { backend, surface }
        }
    }
}

/// Wait for a readiness signal from the main loop, giving up after `timeout`
pub(crate) async fn wait_ready(
    ready: oneshot::Receiver<Result<(), PlaybackError>>,
    timeout: Duration,
) -> Result<(), PlaybackError> {
    let timer = glib::timeout_future(timeout);
    match future::select(ready, timer).await {
        Either::Left((Ok(result), _)) => result,
        Either::Left((Err(_canceled), _)) => Err(PlaybackError::NotReady),
        Either::Right(((), _)) => Err(PlaybackError::Timeout(timeout)),
    }
}

pub(crate) fn micros_to_secs(micros: i64) -> f64 {
    micros as f64 / 1_000_000.0
}

pub(crate) fn secs_to_micros(seconds: f64) -> i64 {
    (seconds.max(0.0) * 1_000_000.0).round() as i64
}
