//! Terminal front end: session loop, heartbeat loop, input and rendering.

pub mod console;
mod heartbeat;
pub mod input;
mod runner;
pub mod session;
mod signal;

pub use console::Console;
pub use heartbeat::run_heartbeat;
pub use runner::run;
pub use session::{Presenter, SessionRunner, UserCommand};
