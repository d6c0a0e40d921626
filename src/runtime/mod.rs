use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::Jukebox;
use crate::audio::{Engine, RodioOutput, VolumeState};
use crate::control::{spawn_button_listener, ButtonAction, Command, Console, Reply};
use crate::history::ListeningLog;
use crate::library::Registry;

mod logging;
mod settings;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (mut settings, fallback) = settings::load_settings();
    logging::init(&settings.log);
    if let Some(reason) = fallback {
        warn!(%reason, "using default settings");
    }

    if let Some(dir) = env::args_os().nth(1) {
        settings.library.storage_path = PathBuf::from(dir);
    }
    info!(storage = %settings.library.storage_path.display(), "starting hifi-player");

    let registry = Registry::scan(&settings.library.storage_path, &settings.library)?;
    if registry.is_empty() {
        warn!("library is empty; add tracks with 'add <file>'");
    } else {
        info!(tracks = registry.len(), "library scanned");
    }

    let history = Arc::new(ListeningLog::new(settings.history.capacity));
    let engine = Engine::start(
        RodioOutput::open_default,
        history.clone(),
        VolumeState::from_settings(&settings.volume),
        &settings.engine,
    )?;
    let jukebox = Arc::new(Jukebox::new(registry, engine, history));

    let (button_tx, button_rx) = mpsc::channel::<ButtonAction>();
    let listener = spawn_button_listener(button_rx, jukebox.clone())?;
    let console = Console::new(jukebox.clone(), button_tx);

    let stdin = io::stdin();
    let result = serve(&console, stdin.lock(), io::stdout());

    // Closing the console drops the last button sender.
    drop(console);
    if listener.join().is_err() {
        warn!("button listener panicked");
    }
    jukebox.shutdown();

    result.map_err(Into::into)
}

/// Execute one command per input line until `quit` or end of input.
fn serve(console: &Console, input: impl BufRead, mut out: impl Write) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let cmd = match line.parse::<Command>() {
            Ok(cmd) => cmd,
            Err(e) => {
                writeln!(out, "error: {e}")?;
                continue;
            }
        };

        match console.execute(cmd) {
            Ok(Reply::Quit) => break,
            Ok(reply) => writeln!(out, "{reply}")?,
            Err(e) => {
                warn!(error = %e, "command failed");
                writeln!(out, "error: {e}")?;
            }
        }
        out.flush()?;
    }
    Ok(())
}
