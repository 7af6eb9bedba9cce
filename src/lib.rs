pub mod book;
pub mod cli;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod game;
pub mod pgn;
pub mod search;
pub mod session;
pub mod transposition;
pub mod uci;

pub use cli::Console;
pub use config::Config;
pub use engine::{EngineKind, Mover};
pub use game::{DrawKind, Game, Outcome};
pub use session::{Session, SessionSettings, SessionState};
