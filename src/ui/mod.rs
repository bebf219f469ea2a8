pub mod feed_view;
pub mod keybindings;
pub mod reel_widget;
pub mod toast;
pub mod window;

pub use window::MainWindow;
