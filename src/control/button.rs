use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::app::Jukebox;

/// A classified button press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    /// Stop whatever is playing.
    Stop,
    /// Switch to a random track.
    Change,
}

impl FromStr for ButtonAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop" => Ok(ButtonAction::Stop),
            "change" => Ok(ButtonAction::Change),
            other => Err(format!("unknown button action '{other}'")),
        }
    }
}

impl fmt::Display for ButtonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ButtonAction::Stop => "stop",
            ButtonAction::Change => "change",
        })
    }
}

/// Apply button actions from `rx` until every sender is gone.
pub fn spawn_button_listener(
    rx: Receiver<ButtonAction>,
    jukebox: Arc<Jukebox>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("button-listener".to_string())
        .spawn(move || {
            for action in rx {
                info!(%action, "button pressed");
                match action {
                    ButtonAction::Stop => jukebox.stop(),
                    ButtonAction::Change => {
                        if let Err(e) = jukebox.play_random_track() {
                            warn!(error = %e, "cannot change track");
                        }
                    }
                }
            }
        })
}
