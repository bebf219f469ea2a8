mod app;
mod config;
mod feed;
mod models;
mod playback;
mod ui;

use app::ReelfeedApp;

fn main() {
    // libmpv requires the C numeric locale; GTK may later adjust locale again.
    std::env::set_var("LC_NUMERIC", "C");
    unsafe {
        libc::setlocale(libc::LC_NUMERIC, b"C\0".as_ptr().cast());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("reelfeed=info")),
        )
        .init();

    let app = ReelfeedApp::new();
    std::process::exit(app.run());
}
