//! Line-oriented terminal front end.

use crate::api::models::{format_date, format_duration, Category, Song, SongFilter};
use crate::api::upload::{MediaFile, UploadRequest};
use crate::api::Backend;
use crate::commands::{
    admin_commands, browse_commands, playback_commands, queue_commands, search_commands,
};
use crate::error::{AppError, AppResult};
use crate::events::{PlaybackState, PlayerEvent};
use crate::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;

const HELP: &str = "\
Browse:   ls [category] | recent | view list|compact
Play:     play <n> | playall | shuffle | main | pause | next | prev
Player:   seek <secs|m:ss> | vol <0-100> | mute | status
Queue:    queue | jump <n> | shuffle-mode | loop
Search:   search | search <query> | pick <n>
Admin:    upload --title T --author A --category C --audio FILE --image FILE [--album X] [--duration S]
          rm <n>
Other:    help | quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    List,
    Compact,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List(SongFilter),
    View(ViewMode),
    Play(usize),
    PlayAll,
    ShufflePlay,
    MainPlay,
    TogglePlay,
    Next,
    Previous,
    Seek(f64),
    Volume(f32),
    Mute,
    Status,
    Queue,
    Jump(usize),
    ToggleShuffle,
    ToggleLoop,
    ToggleSearch,
    Search(String),
    Pick(usize),
    Upload(UploadArgs),
    Delete(usize),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UploadArgs {
    pub title: String,
    pub author: String,
    pub album: String,
    pub category: Option<Category>,
    pub audio: Option<PathBuf>,
    pub image: Option<PathBuf>,
    pub duration: Option<u32>,
}

/// Split a line into words, honouring single and double quotes.
pub fn split_args(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if quote.is_some() {
        return Err("unterminated quote".into());
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// One-based row number from the user to a zero-based index.
fn row(arg: Option<&String>) -> Result<usize, String> {
    let n: usize = arg
        .ok_or("expected a number")?
        .parse()
        .map_err(|_| "expected a number".to_string())?;
    n.checked_sub(1).ok_or_else(|| "rows start at 1".to_string())
}

/// `90`, `90.5` or `1:30`.
pub fn parse_position(text: &str) -> Result<f64, String> {
    let bad = || format!("bad position: {}", text);
    match text.split_once(':') {
        Some((m, s)) => {
            let minutes: u32 = m.parse().map_err(|_| bad())?;
            let seconds: f64 = s.parse().map_err(|_| bad())?;
            Ok(f64::from(minutes) * 60.0 + seconds)
        }
        None => text.parse().map_err(|_| bad()),
    }
}

fn parse_upload(args: &[String]) -> Result<UploadArgs, String> {
    let mut upload = UploadArgs::default();
    let mut it = args.iter();
    while let Some(flag) = it.next() {
        let value = it
            .next()
            .ok_or_else(|| format!("{} needs a value", flag))?
            .clone();
        match flag.as_str() {
            "--title" => upload.title = value,
            "--author" => upload.author = value,
            "--album" => upload.album = value,
            "--category" => {
                upload.category = Some(value.parse().map_err(|e: AppError| e.to_string())?)
            }
            "--audio" => upload.audio = Some(PathBuf::from(value)),
            "--image" => upload.image = Some(PathBuf::from(value)),
            "--duration" => {
                upload.duration = Some(value.parse().map_err(|_| "bad duration".to_string())?)
            }
            other => return Err(format!("unknown option {}", other)),
        }
    }
    Ok(upload)
}

pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let words = split_args(line)?;
    let Some((name, args)) = words.split_first() else {
        return Ok(None);
    };

    let command = match name.as_str() {
        "ls" => match args.first() {
            Some(c) => Command::List(SongFilter::category(
                c.parse().map_err(|e: AppError| e.to_string())?,
            )),
            None => Command::List(SongFilter::all()),
        },
        "recent" => Command::List(SongFilter::recent()),
        "view" => match args.first().map(String::as_str) {
            Some("list") => Command::View(ViewMode::List),
            Some("compact") => Command::View(ViewMode::Compact),
            _ => return Err("view list|compact".into()),
        },
        "play" => Command::Play(row(args.first())?),
        "playall" => Command::PlayAll,
        "shuffle" => Command::ShufflePlay,
        "main" => Command::MainPlay,
        "pause" | "toggle" => Command::TogglePlay,
        "next" => Command::Next,
        "prev" => Command::Previous,
        "seek" => Command::Seek(parse_position(args.first().ok_or("seek <secs|m:ss>")?)?),
        "vol" => {
            let percent: f32 = args
                .first()
                .ok_or("vol <0-100>")?
                .parse()
                .map_err(|_| "vol <0-100>".to_string())?;
            Command::Volume(percent / 100.0)
        }
        "mute" => Command::Mute,
        "status" => Command::Status,
        "queue" => Command::Queue,
        "jump" => Command::Jump(row(args.first())?),
        "shuffle-mode" => Command::ToggleShuffle,
        "loop" => Command::ToggleLoop,
        "search" if args.is_empty() => Command::ToggleSearch,
        "search" | "/" => Command::Search(args.join(" ")),
        "pick" => Command::Pick(row(args.first())?),
        "upload" => Command::Upload(parse_upload(args)?),
        "rm" => Command::Delete(row(args.first())?),
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command '{}' (try help)", other)),
    };
    Ok(Some(command))
}

fn render_row(n: usize, song: &Song, view: ViewMode, current: Option<&str>) -> String {
    let marker = if current == Some(song.id.as_str()) { '>' } else { ' ' };
    match view {
        ViewMode::Compact => format!("{}{:>3}. {} - {}", marker, n, song.title, song.author),
        ViewMode::List => format!(
            "{}{:>3}. {:<32} {:<20} {:<20} {:<12} {}",
            marker,
            n,
            song.title,
            song.author,
            song.album,
            format_date(&song.created_at),
            format_duration(song.duration)
        ),
    }
}

fn render_event(event: &PlayerEvent) -> Option<String> {
    match event {
        PlayerEvent::TrackChanged(t) => Some(format!(
            "Now playing: {} - {} [{}]",
            t.title,
            t.author,
            format_duration(t.duration)
        )),
        PlayerEvent::StateChanged(s) => Some(
            match s.state {
                PlaybackState::Playing => "Playing",
                PlaybackState::Paused => "Paused",
                PlaybackState::Stopped => "Stopped",
            }
            .to_string(),
        ),
        PlayerEvent::Error(e) => Some(format!("Error ({}): {}", e.kind, e.message)),
        PlayerEvent::Progress(_) | PlayerEvent::TrackEnded | PlayerEvent::QueueChanged => None,
    }
}

struct Shell<B: Backend> {
    state: Arc<AppState<B>>,
    listing: Vec<Song>,
    view: ViewMode,
    input: Lines<BufReader<Stdin>>,
}

impl<B: Backend> Shell<B> {
    async fn current_id(&self) -> Option<String> {
        self.state
            .playback_queue
            .read()
            .await
            .current_song()
            .map(|s| s.id.clone())
    }

    async fn print_listing(&self, filter: &SongFilter) {
        let header = browse_commands::listing_header(filter);
        println!("{}\n{}", header.title, header.description);
        let current = self.current_id().await;
        for (i, song) in self.listing.iter().enumerate() {
            println!("{}", render_row(i + 1, song, self.view, current.as_deref()));
        }
        if self.listing.is_empty() {
            println!("  (no songs)");
        }
    }

    async fn status(&self) {
        let player = self.state.player.lock().await;
        let Some(song) = player.loaded() else {
            println!("Nothing playing");
            return;
        };
        let progress = player.progress();
        println!(
            "{} - {}  {} / {}  vol {:.0}%{}",
            song.title,
            song.author,
            format_duration(progress.position as u32),
            format_duration(progress.duration as u32),
            player.volume() * 100.0,
            if player.is_muted() { " (muted)" } else { "" }
        );
    }

    async fn print_queue(&self) -> AppResult<()> {
        let queue = queue_commands::get_queue(&*self.state).await?;
        println!(
            "Queue: {} songs  shuffle {}  loop {}",
            queue.songs.len(),
            if queue.is_shuffle { "on" } else { "off" },
            if queue.is_looping { "on" } else { "off" }
        );
        let current = queue.current_song.as_ref().map(|s| s.id.as_str());
        for (i, song) in queue.songs.iter().enumerate() {
            println!("{}", render_row(i + 1, song, ViewMode::Compact, current));
        }
        Ok(())
    }

    fn listed(&self, index: usize) -> AppResult<&Song> {
        self.listing
            .get(index)
            .ok_or_else(|| AppError::NotFound(format!("No song at row {}", index + 1)))
    }

    async fn confirm(&mut self, prompt: &str) -> AppResult<bool> {
        println!("{} [y/N]", prompt);
        let answer = self.input.next_line().await?.unwrap_or_default();
        Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
    }

    async fn upload(&self, args: UploadArgs) -> AppResult<()> {
        let (Some(audio), Some(image)) = (&args.audio, &args.image) else {
            return Err(AppError::InvalidInput(
                "Please select both audio and image files".into(),
            ));
        };
        let category = args
            .category
            .ok_or_else(|| AppError::InvalidInput("Category is required".into()))?;
        let request = UploadRequest {
            title: args.title,
            author: args.author,
            album: args.album,
            category,
            audio: MediaFile::read(audio).await?,
            image: MediaFile::read(image).await?,
            duration: args.duration,
        };
        let song = admin_commands::upload_song(&self.state, request).await?;
        println!(
            "Song uploaded successfully: {} ({})",
            song.title,
            format_duration(song.duration)
        );
        Ok(())
    }

    /// Returns false when the shell should exit.
    async fn execute(&mut self, command: Command) -> AppResult<bool> {
        let owned = Arc::clone(&self.state);
        let state: &AppState<B> = &owned;
        match command {
            Command::List(filter) => {
                self.listing = browse_commands::list_songs(state, filter).await?;
                self.print_listing(&filter).await;
            }
            Command::View(mode) => self.view = mode,
            Command::Play(index) => {
                playback_commands::play_songs(state, self.listing.clone(), index).await?
            }
            Command::PlayAll => playback_commands::play_all(state, self.listing.clone()).await?,
            Command::ShufflePlay => {
                playback_commands::shuffle_play(state, self.listing.clone()).await?
            }
            Command::MainPlay => playback_commands::main_play(state, self.listing.clone()).await?,
            Command::TogglePlay => {
                playback_commands::toggle_play(state).await?;
            }
            Command::Next => {
                playback_commands::next_track(state).await?;
            }
            Command::Previous => {
                playback_commands::previous_track(state).await?;
            }
            Command::Seek(position) => {
                let at = playback_commands::seek(state, position).await?;
                println!("Seek to {}", format_duration(at as u32));
            }
            Command::Volume(volume) => {
                let set = playback_commands::set_volume(state, volume).await?;
                println!("Volume {:.0}%", set * 100.0);
            }
            Command::Mute => {
                let muted = playback_commands::toggle_mute(state).await?;
                println!("{}", if muted { "Muted" } else { "Unmuted" });
            }
            Command::Status => self.status().await,
            Command::Queue => self.print_queue().await?,
            Command::Jump(index) => queue_commands::play_queue_track(state, index).await?,
            Command::ToggleShuffle => {
                let on = queue_commands::toggle_shuffle(state).await?;
                println!("Shuffle {}", if on { "on" } else { "off" });
            }
            Command::ToggleLoop => {
                let on = queue_commands::toggle_loop(state).await?;
                println!("Loop {}", if on { "on" } else { "off" });
            }
            Command::ToggleSearch => {
                let open = search_commands::toggle_search(state);
                println!("Search {}", if open { "open" } else { "closed" });
            }
            Command::Search(query) => {
                state.search.open();
                search_commands::search(state, &query);
            }
            Command::Pick(index) => search_commands::pick_search_result(state, index).await?,
            Command::Upload(args) => self.upload(args).await?,
            Command::Delete(index) => {
                let song = self.listed(index)?.clone();
                if self
                    .confirm(&format!("Delete \"{}\"?", song.title))
                    .await?
                {
                    admin_commands::delete_song(state, &song.id).await?;
                    self.listing.retain(|s| s.id != song.id);
                    println!("Deleted {}", song.title);
                }
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => {
                if let Err(e) = playback_commands::save_player_prefs(state).await {
                    log::warn!("Failed to save player prefs: {}", e);
                }
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn spawn_printers<B: Backend>(state: &AppState<B>) -> Vec<tokio::task::JoinHandle<()>> {
    let mut events = state.events.subscribe();
    let event_printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = render_event(&event) {
                        println!("{}", line);
                    }
                }
                Err(RecvError::Lagged(skipped)) => log::debug!("skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut results = state.search.subscribe();
    let result_printer = tokio::spawn(async move {
        while results.changed().await.is_ok() {
            let snapshot = results.borrow_and_update().clone();
            if let Some(error) = &snapshot.error {
                println!("Search failed: {}", error);
            } else if snapshot.query.trim().is_empty() {
                continue;
            } else if snapshot.results.is_empty() {
                println!("No results found for \"{}\"", snapshot.query);
            } else {
                for (i, song) in snapshot.results.iter().enumerate() {
                    println!("{}", render_row(i + 1, song, ViewMode::Compact, None));
                }
                println!("(pick <n> to play)");
            }
        }
    });

    vec![event_printer, result_printer]
}

pub async fn run<B: Backend>(state: Arc<AppState<B>>) -> AppResult<()> {
    let printers = spawn_printers(&state);
    let mut shell = Shell {
        state,
        listing: Vec::new(),
        view: ViewMode::List,
        input: BufReader::new(tokio::io::stdin()).lines(),
    };

    println!("mymusic - type 'help' for commands");
    if let Err(e) = shell.execute(Command::List(SongFilter::all())).await {
        println!("Could not load songs: {}", e);
    }

    while let Some(line) = shell.input.next_line().await? {
        let command = match parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };
        match shell.execute(command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                log::debug!("command failed: {:?}", e);
                println!("Error: {}", e);
            }
        }
    }

    for printer in printers {
        printer.abort();
    }
    Ok(())
}
