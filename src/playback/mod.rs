//! Reel playback: the backend contract, the per-reel state machine and the
//! two concrete backends.

pub mod backend;
pub mod controller;
pub mod media_file;
pub mod mpv;

pub use backend::{create_backend, BackendKind};
pub use controller::{Notifier, PlayerState, ReelController};
