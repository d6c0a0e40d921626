use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::mpsc::Sender;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;

use crate::app::Jukebox;
use crate::error::{PlayerError, Result};
use crate::library::{Track, TrackId};

use super::button::ButtonAction;

const DEFAULT_HISTORY_HOURS: i64 = 24;
const MAX_HISTORY_HOURS: i64 = 24 * 365 * 10;
const MOST_LISTENED_TOP: usize = 10;

/// One line of the control protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List,
    Play(TrackId),
    Random,
    Stop,
    Pause,
    Resume,
    VolumeUp,
    VolumeDown,
    Mute,
    Unmute,
    State,
    /// State plus volume, library size and history size.
    Status,
    Info(TrackId),
    Add(PathBuf),
    Remove(TrackId),
    /// Sessions of the last `hours` hours.
    History { hours: i64 },
    Button(ButtonAction),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{0}' expects {1}")]
    MissingArgument(&'static str, &'static str),
    #[error("invalid track id '{0}'")]
    InvalidId(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

fn track_id(verb: &'static str, arg: Option<&str>) -> std::result::Result<TrackId, ParseError> {
    let raw = arg.ok_or(ParseError::MissingArgument(verb, "a track id"))?;
    raw.parse()
        .map_err(|_| ParseError::InvalidId(raw.to_string()))
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, Some(rest.trim()).filter(|r| !r.is_empty())),
            None => (line, None),
        };

        let cmd = match verb.to_ascii_lowercase().as_str() {
            "" => return Err(ParseError::Empty),
            "list" | "ls" => Command::List,
            "play" => Command::Play(track_id("play", rest)?),
            "random" => Command::Random,
            "stop" => Command::Stop,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "up" => Command::VolumeUp,
            "down" => Command::VolumeDown,
            "mute" => Command::Mute,
            "unmute" => Command::Unmute,
            "state" => Command::State,
            "status" => Command::Status,
            "info" => Command::Info(track_id("info", rest)?),
            "add" => {
                let path = rest.ok_or(ParseError::MissingArgument("add", "a file path"))?;
                Command::Add(PathBuf::from(path))
            }
            "rm" => Command::Remove(track_id("rm", rest)?),
            "history" => {
                let hours = match rest {
                    Some(raw) => raw
                        .parse::<i64>()
                        .ok()
                        .filter(|h| (1..=MAX_HISTORY_HOURS).contains(h))
                        .ok_or_else(|| {
                            ParseError::InvalidArgument(format!("'{raw}' is not a valid number of hours"))
                        })?,
                    None => DEFAULT_HISTORY_HOURS,
                };
                Command::History { hours }
            }
            "button" => {
                let raw = rest.ok_or(ParseError::MissingArgument("button", "'stop' or 'change'"))?;
                Command::Button(raw.parse().map_err(ParseError::InvalidArgument)?)
            }
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }
}

/// Outcome of a successfully executed command.
#[derive(Debug, PartialEq)]
pub enum Reply {
    Done,
    Text(String),
    Json(Value),
    Quit,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Done => f.write_str("ok"),
            Reply::Text(s) => f.write_str(s),
            Reply::Json(v) => {
                let pretty = serde_json::to_string_pretty(v).map_err(|_| fmt::Error)?;
                f.write_str(&pretty)
            }
            Reply::Quit => f.write_str("bye"),
        }
    }
}

const HELP: &str = "\
list | play <id> | random | stop | pause | resume
up | down | mute | unmute | state | status
info <id> | add <file> | rm <id> | history [hours]
button <stop|change> | help | quit";

/// Executes protocol commands against a shared jukebox.
pub struct Console {
    jukebox: Arc<Jukebox>,
    buttons: Sender<ButtonAction>,
}

impl Console {
    /// `buttons` feeds the button listener, so `button` lines behave exactly
    /// like hardware presses.
    pub fn new(jukebox: Arc<Jukebox>, buttons: Sender<ButtonAction>) -> Self {
        Self { jukebox, buttons }
    }

    pub fn execute(&self, cmd: Command) -> Result<Reply> {
        let jb = &self.jukebox;
        let reply = match cmd {
            Command::List => Reply::Json(json!(jb.list_tracks())),
            Command::Play(id) => {
                jb.play_track(&id)?;
                Reply::Json(json!(jb.state()))
            }
            Command::Random => Reply::Json(json!(jb.play_random_track()?)),
            Command::Stop => {
                jb.stop();
                Reply::Done
            }
            Command::Pause => Reply::Json(json!({ "paused": jb.pause() })),
            Command::Resume => Reply::Json(json!({ "resumed": jb.resume() })),
            Command::VolumeUp => Reply::Json(json!(jb.increase_volume())),
            Command::VolumeDown => Reply::Json(json!(jb.decrease_volume())),
            Command::Mute => Reply::Json(json!(jb.mute(true))),
            Command::Unmute => Reply::Json(json!(jb.mute(false))),
            Command::State => Reply::Json(json!(jb.state())),
            Command::Status => {
                let state = jb.state();
                Reply::Json(json!({
                    "paused": state.is_paused(),
                    "state": state,
                    "volume": jb.volume(),
                    "tracks": jb.track_count(),
                    "sessions": jb.history().len(),
                }))
            }
            Command::Info(id) => Reply::Json(json!(jb.track(&id)?)),
            Command::Add(path) => Reply::Json(json!(self.add_file(&path)?)),
            Command::Remove(id) => Reply::Json(json!(jb.remove_track(&id)?)),
            Command::History { hours } => {
                let since = Utc::now() - chrono::Duration::hours(hours);
                let history = jb.history();
                Reply::Json(json!({
                    "since": since,
                    "listened": history.listened_since(since),
                    "most_listened": history.most_listened(since, MOST_LISTENED_TOP),
                }))
            }
            Command::Button(action) => {
                self.buttons
                    .send(action)
                    .map_err(|_| PlayerError::ControlClosed)?;
                Reply::Done
            }
            Command::Help => Reply::Text(HELP.to_string()),
            Command::Quit => Reply::Quit,
        };
        Ok(reply)
    }

    fn add_file(&self, path: &Path) -> Result<Track> {
        let hint = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PlayerError::UnsupportedFormat(path.display().to_string()))?;
        let mut file = File::open(path).map_err(|e| PlayerError::io("open", path, e))?;
        self.jukebox.add_track(hint, &mut file)
    }
}
