use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::{Product, VideoEntry};

const FEED_FILE_NAME: &str = "feed.json";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to read feed file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse feed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate entry id {0:?}")]
    DuplicateEntry(String),
    #[error("duplicate product id {product:?} in entry {entry:?}")]
    DuplicateProduct { entry: String, product: String },
    #[error("entry {0:?} has an empty video url")]
    EmptyUrl(String),
    #[error("product {product:?} in entry {entry:?} has an invalid price")]
    InvalidPrice { entry: String, product: String },
}

/// Where the feed entries come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Sample,
    File(PathBuf),
}

impl FeedSource {
    /// Pick the feed source: explicit path, then env override, then the
    /// user's config dir, then the built-in sample.
    pub fn resolve(cli_path: Option<&Path>, env_path: Option<&Path>) -> Self {
        if let Some(path) = cli_path.or(env_path) {
            return Self::File(path.to_path_buf());
        }
        match default_feed_path() {
            Some(path) if path.is_file() => Self::File(path),
            _ => Self::Sample,
        }
    }

    pub fn load(&self) -> Result<Vec<VideoEntry>, FeedError> {
        match self {
            Self::Sample => Ok(sample_feed()),
            Self::File(path) => load_feed_file(path),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Sample => "built-in sample".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// `<config dir>/reelfeed/feed.json`
pub fn default_feed_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "reelfeed", "reelfeed")
        .map(|dirs| dirs.config_dir().join(FEED_FILE_NAME))
}

pub fn load_feed_file(path: &Path) -> Result<Vec<VideoEntry>, FeedError> {
    let text = std::fs::read_to_string(path).map_err(|source| FeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let entries = parse_feed(&text)?;
    tracing::info!(path = %path.display(), entries = entries.len(), "Loaded feed file");
    Ok(entries)
}

pub fn parse_feed(text: &str) -> Result<Vec<VideoEntry>, FeedError> {
    let entries: Vec<VideoEntry> = serde_json::from_str(text)?;
    validate(&entries)?;
    Ok(entries)
}

fn validate(entries: &[VideoEntry]) -> Result<(), FeedError> {
    let mut entry_ids = HashSet::new();
    for entry in entries {
        if !entry_ids.insert(entry.id.as_str()) {
            return Err(FeedError::DuplicateEntry(entry.id.clone()));
        }
        if entry.video_url.trim().is_empty() {
            return Err(FeedError::EmptyUrl(entry.id.clone()));
        }

        let mut product_ids = HashSet::new();
        for product in &entry.products {
            if !product_ids.insert(product.id.as_str()) {
                return Err(FeedError::DuplicateProduct {
                    entry: entry.id.clone(),
                    product: product.id.clone(),
                });
            }
            if !product.price.is_finite() || product.price < 0.0 {
                return Err(FeedError::InvalidPrice {
                    entry: entry.id.clone(),
                    product: product.id.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Built-in feed used when no feed file is configured
pub fn sample_feed() -> Vec<VideoEntry> {
    vec![
        VideoEntry::new(
            "1",
            "https://storage.googleapis.com/gtv-videos-bucket/sample/ForBiggerBlazes.mp4",
            vec![Product::new(
                "p1",
                "Premium Collection",
                129.99,
                "Limited edition set",
            )],
        ),
        VideoEntry::new(
            "2",
            "https://storage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4",
            vec![Product::new(
                "p2",
                "Designer Special",
                299.99,
                "Luxury collection",
            )],
        ),
        VideoEntry::new(
            "3",
            "https://storage.googleapis.com/gtv-videos-bucket/sample/ElephantsDream.mp4",
            vec![Product::new(
                "p3",
                "Featured Items",
                399.99,
                "Premium selection",
            )],
        ),
    ]
}
