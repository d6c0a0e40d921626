mod app;
mod audio;
mod config;
mod control;
mod error;
mod history;
mod library;
mod runtime;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    runtime::run()
}
