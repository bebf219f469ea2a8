pub mod feed_source;
pub mod video_entry;

pub use feed_source::*;
pub use video_entry::*;
