pub mod api;
pub mod audio;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod search;
pub mod shell;

use api::client::SupabaseClient;
use api::Backend;
use audio::device::PlaybackDevice;
use audio::queue::{PlaybackQueue, Transition};
use audio::surface::PlayerSurface;
use config::AppConfig;
use error::AppResult;
use events::{EventHub, PlayerEvent};
use search::SearchController;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// How often progress is reported and the device checked for track end.
const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Everything a running player owns. Built once at startup and shared
/// with the view layer and the tick loop.
pub struct AppState<B: Backend> {
    pub backend: Arc<B>,
    pub config: RwLock<AppConfig>,
    pub config_path: PathBuf,
    pub playback_queue: RwLock<PlaybackQueue>,
    pub player: Mutex<PlayerSurface>,
    pub search: SearchController<B>,
    pub events: EventHub,
}

impl<B: Backend> AppState<B> {
    pub fn new(
        backend: Arc<B>,
        config: AppConfig,
        config_path: PathBuf,
        device: Box<dyn PlaybackDevice>,
    ) -> Self {
        Self::with_queue(backend, config, config_path, device, PlaybackQueue::new())
    }

    pub fn with_queue(
        backend: Arc<B>,
        config: AppConfig,
        config_path: PathBuf,
        device: Box<dyn PlaybackDevice>,
        queue: PlaybackQueue,
    ) -> Self {
        let events = EventHub::new();
        let player = PlayerSurface::new(device, events.clone(), config.volume, config.muted);
        let search = SearchController::new(
            Arc::clone(&backend),
            Duration::from_millis(config.search_debounce_ms),
            config.search_limit,
        );
        Self {
            backend,
            config: RwLock::new(config),
            config_path,
            playback_queue: RwLock::new(queue),
            player: Mutex::new(player),
            search,
            events,
        }
    }

    /// Run queue operations under one write lock and hand the resulting
    /// transition to the player before anyone else can touch the queue.
    pub async fn dispatch<F>(&self, op: F) -> Transition
    where
        F: FnOnce(&mut PlaybackQueue) -> Transition,
    {
        let mut queue = self.playback_queue.write().await;
        let transition = op(&mut queue);
        log::debug!("dispatch -> {}", transition_name(&transition));
        self.player.lock().await.apply(&transition);
        transition
    }

    /// One beat of the time-update loop. The end check and the advance
    /// share one queue write lock so a concurrent skip cannot make the
    /// same end advance twice.
    pub async fn tick(&self) {
        let mut queue = self.playback_queue.write().await;
        let mut player = self.player.lock().await;
        if player.is_playing() {
            self.events.emit(PlayerEvent::Progress(player.progress()));
        }
        if !player.poll_ended() {
            return;
        }

        log::debug!("track ended");
        self.events.emit(PlayerEvent::TrackEnded);
        let transition = queue.on_track_ended();
        log::debug!("dispatch -> {}", transition_name(&transition));
        player.apply(&transition);
    }
}

fn transition_name(transition: &Transition) -> &'static str {
    match transition {
        Transition::Load(_) => "load",
        Transition::Resume => "resume",
        Transition::Pause => "pause",
        Transition::Restart => "restart",
        Transition::Idle => "idle",
    }
}

fn spawn_ticker<B: Backend>(state: Arc<AppState<B>>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            state.tick().await;
        }
    })
}

fn init_logging() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("mymusic=info"),
    )
    .format_timestamp_millis()
    .try_init();
}

fn build_runtime() -> AppResult<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn load_config() -> AppConfig {
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config: {}. Using defaults.", e);
        let defaults = AppConfig::default();
        if let Err(save_err) = defaults.save() {
            log::error!("Failed to save default config: {}", save_err);
        }
        defaults
    });
    config.apply_env_overrides();
    config
}

#[cfg(feature = "audio-output")]
fn output_device(client: &SupabaseClient) -> AppResult<Box<dyn PlaybackDevice>> {
    let player = audio::player::AudioPlayer::new(client.http_client().clone())?;
    Ok(Box::new(player))
}

#[cfg(not(feature = "audio-output"))]
fn output_device(_client: &SupabaseClient) -> AppResult<Box<dyn PlaybackDevice>> {
    log::info!("Built without audio output; playback is timed silently");
    Ok(Box::new(audio::device::ClockDevice::new()))
}

async fn start() -> AppResult<()> {
    let config = load_config();
    config.validate()?;
    let config_path = AppConfig::config_path()?;

    let client = Arc::new(SupabaseClient::new(Arc::new(RwLock::new(config.clone())))?);
    let device = output_device(&client)?;
    let state = Arc::new(AppState::new(client, config, config_path, device));

    let ticker = spawn_ticker(Arc::clone(&state));
    let result = shell::run(Arc::clone(&state)).await;
    ticker.abort();
    result
}

/// Interactive player.
pub fn run() {
    init_logging();
    let outcome = build_runtime().and_then(|runtime| runtime.block_on(start()));
    if let Err(e) = outcome {
        log::error!("{}", e);
        eprintln!("mymusic: {}", e);
        std::process::exit(1);
    }
}

/// Ping the catalog so the hosted project is not paused for inactivity.
/// Returns the process exit code.
pub fn keep_alive() -> i32 {
    init_logging();
    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start runtime: {}", e);
            return 1;
        }
    };

    runtime.block_on(async {
        let mut config = AppConfig::load().unwrap_or_default();
        config.apply_env_overrides();
        if let Err(e) = config.validate() {
            log::error!("Missing backend configuration: {}", e);
            return 1;
        }

        let client = match SupabaseClient::new(Arc::new(RwLock::new(config))) {
            Ok(client) => client,
            Err(e) => {
                log::error!("Failed to create client: {}", e);
                return 1;
            }
        };

        log::info!("Running keep-alive check...");
        match commands::admin_commands::keep_alive(&client).await {
            Ok(rows) => {
                log::info!("Backend is active ({} row(s) returned)", rows);
                0
            }
            Err(e) => {
                log::error!("Keep-alive query failed: {}", e);
                1
            }
        }
    })
}
