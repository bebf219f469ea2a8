//! Playback through libmpv embedded in a GTK4 GLArea
//!
//! Each reel owns its own mpv instance, created when the GLArea is realized
//! and torn down with it. mpv opens files asynchronously, so play requests
//! wait until the poll timer has seen the file loaded, or reject once mpv has
//! sat idle with nothing loaded.

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::rc::Rc;

use futures::channel::oneshot;
use glib::clone;
use gtk4::gdk;
use gtk4::prelude::*;
use gtk4::{glib, GLArea};
use libmpv2::render::{OpenGLInitParams, RenderContext, RenderParam, RenderParamApiType};
use libmpv2::Mpv;
use once_cell::sync::OnceCell;

use super::backend::{
    wait_ready, PlayFuture, PlaybackBackend, PlaybackError, TimeUpdateCallback, PREPARE_TIMEOUT,
};

type ReadySender = oneshot::Sender<Result<(), PlaybackError>>;

const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);
/// Consecutive idle polls with no file before the load counts as failed
const IDLE_POLLS_BEFORE_FAILURE: u32 = 3;

/// Ensure epoxy is initialized once
static EPOXY_INITIALIZED: OnceCell<()> = OnceCell::new();

fn ensure_epoxy_initialized() {
    EPOXY_INITIALIZED.get_or_init(|| {
        // GTK4 already links epoxy, so symbols are in the current process
        epoxy::load_with(|s| unsafe {
            let handle = libc::dlopen(std::ptr::null(), libc::RTLD_NOW | libc::RTLD_GLOBAL);
            if handle.is_null() {
                return std::ptr::null();
            }
            let Ok(c_str) = std::ffi::CString::new(s) else {
                libc::dlclose(handle);
                return std::ptr::null();
            };
            let sym = libc::dlsym(handle, c_str.as_ptr());
            libc::dlclose(handle);
            sym
        });
    });
}

/// GL context wrapper for OpenGL init params (unit type since we use epoxy)
struct GlContext;

/// Progress of the `loadfile` issued at realize
#[derive(Debug, Clone, PartialEq, Eq)]
enum LoadState {
    /// Not loaded yet; counts consecutive polls that found mpv idle
    Pending { idle_polls: u32 },
    Loaded,
    Failed(String),
}

impl Default for LoadState {
    fn default() -> Self {
        Self::Pending { idle_polls: 0 }
    }
}

/// Advance the load state from one poll of mpv's `file-format` and
/// `idle-active` properties. A failure is final.
fn next_load_state(current: &LoadState, file_loaded: bool, idle: bool) -> LoadState {
    if let LoadState::Failed(_) = current {
        return current.clone();
    }
    if file_loaded {
        return LoadState::Loaded;
    }
    if !idle {
        return LoadState::Pending { idle_polls: 0 };
    }

    let idle_polls = match current {
        LoadState::Pending { idle_polls } => idle_polls + 1,
        _ => 1,
    };
    if idle_polls >= IDLE_POLLS_BEFORE_FAILURE {
        LoadState::Failed("mpv is idle with no file loaded".to_string())
    } else {
        LoadState::Pending { idle_polls }
    }
}

/// What a play request should do right now
#[derive(Debug, PartialEq)]
enum Readiness {
    Ready,
    Wait,
    Reject(PlaybackError),
}

fn play_readiness(has_player: bool, init_failed: bool, load: &LoadState) -> Readiness {
    if init_failed {
        return Readiness::Reject(PlaybackError::NotReady);
    }
    match load {
        LoadState::Failed(reason) => Readiness::Reject(PlaybackError::Rejected(reason.clone())),
        LoadState::Loaded if has_player => Readiness::Ready,
        _ => Readiness::Wait,
    }
}

#[derive(Default)]
struct MpvState {
    mpv: Option<Mpv>,
    render_ctx: Option<RenderContext>,
    /// Play requests waiting for the file to load
    waiters: Vec<ReadySender>,
    init_failed: bool,
    load: LoadState,
    muted: bool,
}

impl MpvState {
    fn resolve_waiters(&mut self, result: Result<(), PlaybackError>) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(result.clone());
        }
    }

    fn fail_load(&mut self, reason: String) {
        self.load = LoadState::Failed(reason.clone());
        self.resolve_waiters(Err(PlaybackError::Rejected(reason)));
    }

    fn advance_load(&mut self, file_loaded: bool, idle: bool) {
        let next = next_load_state(&self.load, file_loaded, idle);
        if next == self.load {
            return;
        }
        match &next {
            LoadState::Loaded => {
                tracing::debug!("mpv file loaded");
                self.resolve_waiters(Ok(()));
            }
            LoadState::Failed(reason) => {
                tracing::warn!(reason = %reason, "mpv could not load the file");
                self.resolve_waiters(Err(PlaybackError::Rejected(reason.clone())));
            }
            LoadState::Pending { .. } => {}
        }
        self.load = next;
    }
}

fn set_paused(state: &RefCell<MpvState>, paused: bool) -> Result<(), PlaybackError> {
    let state = state.borrow();
    let mpv = state.mpv.as_ref().ok_or(PlaybackError::NotReady)?;
    mpv.set_property("pause", paused)
        .map_err(|e| PlaybackError::Rejected(e.to_string()))
}

pub struct MpvBackend {
    gl_area: GLArea,
    source: String,
    state: Rc<RefCell<MpvState>>,
    initialized: Rc<Cell<bool>>,
    time_callbacks: Rc<RefCell<Vec<TimeUpdateCallback>>>,
    time_timer: Rc<RefCell<Option<glib::SourceId>>>,
}

impl MpvBackend {
    pub fn new(source: &str) -> Self {
        let gl_area = GLArea::new();
        gl_area.set_auto_render(false);
        gl_area.set_has_depth_buffer(false);
        gl_area.set_has_stencil_buffer(false);
        gl_area.set_hexpand(true);
        gl_area.set_vexpand(true);
        gl_area.add_css_class("reel-video");

        // Use GLES if available for better compatibility
        gl_area.set_allowed_apis(gdk::GLAPI::GL | gdk::GLAPI::GLES);

        let backend = Self {
            gl_area,
            source: source.to_string(),
            state: Rc::new(RefCell::new(MpvState {
                muted: true,
                ..MpvState::default()
            })),
            initialized: Rc::new(Cell::new(false)),
            time_callbacks: Rc::new(RefCell::new(Vec::new())),
            time_timer: Rc::new(RefCell::new(None)),
        };

        backend.setup_gl_callbacks();
        backend
    }

    pub fn widget(&self) -> &GLArea {
        &self.gl_area
    }

    fn setup_gl_callbacks(&self) {
        let state = self.state.clone();
        let initialized = self.initialized.clone();
        let time_callbacks = self.time_callbacks.clone();
        let time_timer = self.time_timer.clone();
        let source = self.source.clone();

        // Realize callback - initialize mpv when GL context is ready
        self.gl_area.connect_realize(clone!(
            #[strong]
            state,
            #[strong]
            initialized,
            #[strong]
            time_callbacks,
            #[strong]
            time_timer,
            move |gl_area| {
                gl_area.make_current();
                if let Some(err) = gl_area.error() {
                    tracing::error!("GLArea error on realize: {}", err);
                    let mut state = state.borrow_mut();
                    state.init_failed = true;
                    state.resolve_waiters(Err(PlaybackError::Rejected(err.to_string())));
                    return;
                }

                if initialized.get() {
                    return;
                }

                ensure_epoxy_initialized();

                let muted = state.borrow().muted;
                match Self::init_mpv(muted) {
                    Ok((mpv, render_ctx)) => {
                        let load_result = mpv.command("loadfile", &[source.as_str(), "replace"]);
                        let mut state_mut = state.borrow_mut();
                        state_mut.mpv = Some(mpv);
                        state_mut.render_ctx = Some(render_ctx);
                        state_mut.init_failed = false;
                        state_mut.load = LoadState::default();
                        initialized.set(true);
                        tracing::info!(source = %source, "mpv initialized");
                        if let Err(e) = load_result {
                            tracing::error!(source = %source, "Failed to load file: {}", e);
                            state_mut.fail_load(e.to_string());
                        }
                        drop(state_mut);

                        Self::start_time_timer_handle(
                            state.clone(),
                            time_callbacks.clone(),
                            time_timer.clone(),
                            gl_area.clone(),
                        );
                        gl_area.queue_render();
                    }
                    Err(e) => {
                        tracing::error!("Failed to initialize mpv: {}", e);
                        let mut state = state.borrow_mut();
                        state.init_failed = true;
                        state.resolve_waiters(Err(PlaybackError::Rejected(e.to_string())));
                    }
                }
            }
        ));

        // Unrealize callback - clean up mpv
        self.gl_area.connect_unrealize(clone!(
            #[strong]
            state,
            #[strong]
            initialized,
            #[strong]
            time_timer,
            move |gl_area| {
                gl_area.make_current();
                Self::stop_time_timer_handle(&time_timer);
                let mut state = state.borrow_mut();
                // Drop render context first, then mpv
                state.render_ctx = None;
                state.mpv = None;
                state.load = LoadState::default();
                state.resolve_waiters(Err(PlaybackError::NotReady));
                initialized.set(false);
                tracing::debug!("mpv cleaned up");
            }
        ));

        // Render callback - draw the video frame
        self.gl_area.connect_render(clone!(
            #[strong]
            state,
            move |gl_area, _gl_context| {
                let state = state.borrow();
                if let Some(ref render_ctx) = state.render_ctx {
                    let scale = gl_area.scale_factor();
                    let width = gl_area.width() * scale;
                    let height = gl_area.height() * scale;

                    // flip=true because GTK's coordinate system is flipped
                    if let Err(e) = render_ctx.render::<GlContext>(0, width, height, true) {
                        tracing::error!("mpv render error: {}", e);
                    }
                }
                glib::Propagation::Stop
            }
        ));

        self.gl_area
            .connect_resize(move |gl_area, _width, _height| {
                gl_area.queue_render();
            });
    }

    fn init_mpv(muted: bool) -> Result<(Mpv, RenderContext), Box<dyn std::error::Error>> {
        // GTK initialization may reset locale after program start; enforce this
        // right before touching libmpv, which requires LC_NUMERIC=C.
        let locale_set = unsafe { libc::setlocale(libc::LC_NUMERIC, b"C\0".as_ptr().cast()) };
        if locale_set.is_null() {
            tracing::warn!("Failed to set LC_NUMERIC=C before mpv init");
        }

        let mut mpv = Mpv::with_initializer(|init| {
            init.set_option("hwdec", "auto-safe")?;
            init.set_option("vo", "libmpv")?;
            init.set_option("ao", "pipewire,pulse,alsa")?;
            // Reels loop and start paused; the feed decides when to play
            init.set_option("loop-file", "inf")?;
            init.set_option("pause", "yes")?;
            init.set_option("mute", if muted { "yes" } else { "no" })?;
            init.set_option("cache", "yes")?;
            init.set_option("demuxer-max-bytes", "50MiB")?;
            init.set_option("osd-level", 0i64)?;
            init.set_option("terminal", false)?;
            init.set_option("input-default-bindings", false)?;
            init.set_option("msg-level", "all=warn")?;
            Ok(())
        })?;

        fn get_proc_address(_ctx: &GlContext, name: &str) -> *mut c_void {
            epoxy::get_proc_addr(name) as *mut c_void
        }

        let gl_init_params = OpenGLInitParams {
            get_proc_address,
            ctx: GlContext,
        };

        let render_params = vec![
            RenderParam::ApiType(RenderParamApiType::OpenGl),
            RenderParam::InitParams(gl_init_params),
        ];

        // SAFETY: We have exclusive access to mpv here during initialization
        let render_ctx =
            unsafe { RenderContext::new(mpv.ctx.as_mut(), render_params.into_iter())? };

        Ok((mpv, render_ctx))
    }

    fn start_time_timer_handle(
        state: Rc<RefCell<MpvState>>,
        time_callbacks: Rc<RefCell<Vec<TimeUpdateCallback>>>,
        time_timer: Rc<RefCell<Option<glib::SourceId>>>,
        gl_area: GLArea,
    ) {
        Self::stop_time_timer_handle(&time_timer);

        // Poll load state and position; this also drives frame redraws
        let source_id = glib::timeout_add_local(POLL_INTERVAL, move || {
            let mut state_mut = state.borrow_mut();
            let Some(ref mpv) = state_mut.mpv else {
                return glib::ControlFlow::Continue;
            };
            let position: f64 = mpv.get_property("time-pos").unwrap_or(0.0);
            let duration: f64 = mpv.get_property("duration").unwrap_or(0.0);
            let paused: bool = mpv.get_property("pause").unwrap_or(true);
            let file_loaded = mpv.get_property::<String>("file-format").is_ok();
            let idle: bool = mpv.get_property("idle-active").unwrap_or(false);
            state_mut.advance_load(file_loaded, idle);
            drop(state_mut);

            for callback in time_callbacks.borrow().iter() {
                callback(position, duration);
            }

            if !paused {
                gl_area.queue_render();
            }
            glib::ControlFlow::Continue
        });

        *time_timer.borrow_mut() = Some(source_id);
    }

    fn stop_time_timer_handle(time_timer: &Rc<RefCell<Option<glib::SourceId>>>) {
        if let Some(source_id) = time_timer.borrow_mut().take() {
            source_id.remove();
        }
    }
}

impl PlaybackBackend for MpvBackend {
    fn play(&self) -> PlayFuture {
        let state = self.state.clone();
        let gl_area = self.gl_area.clone();

        Box::pin(async move {
            let ready = {
                let mut state_mut = state.borrow_mut();
                let has_player = state_mut.mpv.is_some();
                match play_readiness(has_player, state_mut.init_failed, &state_mut.load) {
                    Readiness::Ready => None,
                    Readiness::Reject(err) => return Err(err),
                    Readiness::Wait => {
                        let (tx, rx) = oneshot::channel();
                        state_mut.waiters.push(tx);
                        Some(rx)
                    }
                }
            };
            if let Some(ready) = ready {
                tracing::debug!("mpv file not loaded yet; waiting");
                wait_ready(ready, PREPARE_TIMEOUT).await?;
            }

            set_paused(&state, false)?;
            gl_area.queue_render();
            Ok(())
        })
    }

    fn pause(&self) {
        if let Err(e) = set_paused(&self.state, true) {
            tracing::debug!("mpv pause ignored: {}", e);
        }
    }

    fn set_muted(&self, muted: bool) {
        let mut state = self.state.borrow_mut();
        state.muted = muted;
        if let Some(ref mpv) = state.mpv {
            if let Err(e) = mpv.set_property("mute", muted) {
                tracing::debug!("mpv mute ignored: {}", e);
            }
        }
    }

    fn seek(&self, seconds: f64) -> bool {
        let state = self.state.borrow();
        let Some(ref mpv) = state.mpv else {
            return false;
        };
        let pos_str = format!("{:.3}", seconds.max(0.0));
        if let Err(e) = mpv.command("seek", &[&pos_str, "absolute"]) {
            tracing::warn!("mpv seek failed: {}", e);
            return false;
        }
        drop(state);
        self.gl_area.queue_render();
        true
    }

    fn position(&self) -> f64 {
        let state = self.state.borrow();
        state
            .mpv
            .as_ref()
            .and_then(|mpv| mpv.get_property("time-pos").ok())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> f64 {
        let state = self.state.borrow();
        state
            .mpv
            .as_ref()
            .and_then(|mpv| mpv.get_property("duration").ok())
            .unwrap_or(0.0)
    }

    fn connect_time_update(&self, callback: TimeUpdateCallback) {
        self.time_callbacks.borrow_mut().push(callback);
    }
}

impl Drop for MpvBackend {
    fn drop(&mut self) {
        Self::stop_time_timer_handle(&self.time_timer);
    }
}
