//! Playback through GTK's own `MediaFile` stream, painted into a `Picture`.

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::oneshot;
use gtk4::prelude::*;
use gtk4::{ContentFit, MediaFile, Picture};

use super::backend::{
    micros_to_secs, secs_to_micros, wait_ready, PlayFuture, PlaybackBackend, PlaybackError,
    TimeUpdateCallback, PREPARE_TIMEOUT,
};

type ReadySender = Rc<RefCell<Option<oneshot::Sender<Result<(), PlaybackError>>>>>;

pub struct MediaFileBackend {
    stream: MediaFile,
    picture: Picture,
}

impl MediaFileBackend {
    pub fn new(source: &str) -> Self {
        let file = if source.contains("://") {
            gio::File::for_uri(source)
        } else {
            gio::File::for_path(source)
        };

        let stream = MediaFile::for_file(&file);
        stream.set_loop(true);
        stream.set_muted(true);

        let picture = Picture::for_paintable(&stream);
        picture.set_content_fit(ContentFit::Cover);
        picture.set_can_shrink(true);
        picture.set_hexpand(true);
        picture.set_vexpand(true);
        picture.add_css_class("reel-video");

        let source_label = source.to_string();
        stream.connect_error_notify(move |stream| {
            if let Some(err) = stream.error() {
                tracing::warn!(source = %source_label, error = %err, "Media stream error");
            }
        });

        Self { stream, picture }
    }

    pub fn widget(&self) -> &Picture {
        &self.picture
    }
}

fn stream_error(stream: &MediaFile) -> Option<PlaybackError> {
    stream
        .error()
        .map(|err| PlaybackError::Rejected(err.message().to_string()))
}

/// Resolve once the stream is prepared or has failed
async fn wait_prepared(stream: &MediaFile) -> Result<(), PlaybackError> {
    let (tx, rx) = oneshot::channel();
    let sender: ReadySender = Rc::new(RefCell::new(Some(tx)));

    let prepared_sender = sender.clone();
    let prepared_id = stream.connect_prepared_notify(move |stream| {
        if stream.is_prepared() {
            if let Some(tx) = prepared_sender.borrow_mut().take() {
                let _ = tx.send(Ok(()));
            }
        }
    });

    let error_sender = sender.clone();
    let error_id = stream.connect_error_notify(move |stream| {
        if let Some(err) = stream_error(stream) {
            if let Some(tx) = error_sender.borrow_mut().take() {
                let _ = tx.send(Err(err));
            }
        }
    });

    let outcome = wait_ready(rx, PREPARE_TIMEOUT).await;
    stream.disconnect(prepared_id);
    stream.disconnect(error_id);
    outcome
}

impl PlaybackBackend for MediaFileBackend {
    fn play(&self) -> PlayFuture {
        let stream = self.stream.clone();
        Box::pin(async move {
            if let Some(err) = stream_error(&stream) {
                return Err(err);
            }
            if !stream.is_prepared() {
                wait_prepared(&stream).await?;
            }

            stream.play();
            if stream.is_playing() {
                Ok(())
            } else {
                Err(stream_error(&stream).unwrap_or_else(|| {
                    PlaybackError::Rejected("stream refused to start".to_string())
                }))
            }
        })
    }

    fn pause(&self) {
        self.stream.pause();
    }

    fn set_muted(&self, muted: bool) {
        self.stream.set_muted(muted);
    }

    fn seek(&self, seconds: f64) -> bool {
        if !self.stream.is_seekable() {
            tracing::debug!("Ignoring seek on non-seekable stream");
            return false;
        }
        self.stream.seek(secs_to_micros(seconds));
        true
    }

    fn position(&self) -> f64 {
        micros_to_secs(self.stream.timestamp())
    }

    fn duration(&self) -> f64 {
        micros_to_secs(self.stream.duration())
    }

    fn connect_time_update(&self, callback: TimeUpdateCallback) {
        self.stream.connect_timestamp_notify(move |stream| {
            callback(
                micros_to_secs(stream.timestamp()),
                micros_to_secs(stream.duration()),
            );
        });
    }
}
