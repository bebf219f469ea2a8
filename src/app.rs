use anyhow::Context;
use gtk4::prelude::*;
use gtk4::Application;
use std::path::Path;

use crate::config::Config;
use crate::models::{sample_feed, FeedSource, VideoEntry};
use crate::ui::MainWindow;

const APP_ID: &str = "com.reelfeed.Reels";

pub struct ReelfeedApp {
    app: Application,
}

impl ReelfeedApp {
    pub fn new() -> Self {
        let app = Application::builder()
            .application_id(APP_ID)
            .flags(gio::ApplicationFlags::HANDLES_OPEN)
            .build();

        app.connect_activate(Self::on_activate);
        app.connect_open(Self::on_open);

        Self { app }
    }

    pub fn run(&self) -> i32 {
        self.app.run().into()
    }

    fn on_activate(app: &Application) {
        Self::open_window(app, None);
    }

    fn on_open(app: &Application, files: &[gio::File], _hint: &str) {
        let path = files.first().and_then(|f| f.path());
        Self::open_window(app, path.as_deref());
    }

    fn open_window(app: &Application, feed_path: Option<&Path>) {
        let config = Config::from_env();
        let source = FeedSource::resolve(feed_path, config.feed_path.as_deref());
        tracing::info!(source = %source.describe(), backend = ?config.backend, "Starting feed");

        let (entries, warning) = match load_entries(&source) {
            Ok(entries) => (entries, None),
            Err(err) => {
                tracing::warn!("Falling back to the sample feed: {err:#}");
                (sample_feed(), Some(format!("Feed error: {err:#}")))
            }
        };

        let window = MainWindow::new(app, &config, &entries, warning);
        window.present();
        // Keep the window alive by storing it on the Application.
        unsafe {
            app.set_data("main-window", window);
        }
    }
}

impl Default for ReelfeedApp {
    fn default() -> Self {
        Self::new()
    }
}

fn load_entries(source: &FeedSource) -> anyhow::Result<Vec<VideoEntry>> {
    source
        .load()
        .with_context(|| format!("loading feed from {}", source.describe()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_entries_reports_source_in_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let source = FeedSource::File(file.path().to_path_buf());

        let err = load_entries(&source).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.starts_with("loading feed from "));
        assert!(message.contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_load_entries_sample() {
        let entries = load_entries(&FeedSource::Sample).unwrap();
        assert_eq!(entries, sample_feed());
    }
}
