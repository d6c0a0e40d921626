//! External control surfaces.
//!
//! `button` turns already classified hardware button presses into player
//! actions; `command` is the line-oriented protocol the binary reads on
//! stdin.

mod button;
mod command;

pub use button::{spawn_button_listener, ButtonAction};
pub use command::{Command, Console, ParseError, Reply};
