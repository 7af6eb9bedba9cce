use crate::book::OpeningBook;
use crate::session::SessionSettings;
use anyhow::{Context, Result};
use clap::Parser;
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "blindfold", about = "Play blindfold chess in the terminal", version)]
pub struct Config {
    /// Polyglot opening book consulted for engine moves
    #[arg(long, default_value = "book.bin")]
    pub book: PathBuf,

    /// Never consult the opening book
    #[arg(long)]
    pub no_book: bool,

    /// Probability of consulting the book on each engine move
    #[arg(long, default_value_t = 0.5, value_parser = parse_chance)]
    pub book_chance: f64,

    /// Engine think time per move in milliseconds (random 100-500 if unset)
    #[arg(long)]
    pub movetime: Option<u64>,

    /// Start new games from this position
    #[arg(long)]
    pub fen: Option<String>,

    /// Directory for saved PGN files
    #[arg(long, default_value = ".")]
    pub pgn_dir: PathBuf,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log engine and session activity to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            book: PathBuf::from("book.bin"),
            no_book: false,
            book_chance: 0.5,
            movetime: None,
            fen: None,
            pgn_dir: PathBuf::from("."),
            seed: None,
            verbose: false,
        }
    }
}

fn parse_chance(s: &str) -> Result<f64, String> {
    let chance: f64 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if (0.0..=1.0).contains(&chance) {
        Ok(chance)
    } else {
        Err(format!("{chance} is not between 0 and 1"))
    }
}

impl Config {
    pub fn book_path(&self) -> Option<&Path> {
        (!self.no_book).then_some(self.book.as_path())
    }

    pub fn start_position(&self) -> Result<Chess> {
        let Some(fen) = &self.fen else {
            return Ok(Chess::default());
        };
        let parsed: Fen = fen.parse().with_context(|| format!("invalid FEN `{fen}`"))?;
        parsed
            .into_position(CastlingMode::Standard)
            .with_context(|| format!("illegal position `{fen}`"))
    }

    pub fn session_settings(&self) -> Result<SessionSettings> {
        Ok(SessionSettings {
            book_chance: self.book_chance,
            movetime: self.movetime.map(Duration::from_millis),
            start: self.start_position()?,
            seed: self.seed,
        })
    }

    /// A missing or unreadable book just means playing without one.
    pub fn load_book(&self) -> Option<OpeningBook> {
        let path = self.book_path()?;
        if !path.is_file() {
            log::debug!("no opening book at {}", path.display());
            return None;
        }
        match OpeningBook::open(path) {
            Ok(book) => {
                log::info!("loaded {} book entries from {}", book.len(), path.display());
                Some(book)
            }
            Err(err) => {
                log::warn!("ignoring opening book {}: {}", path.display(), err);
                None
            }
        }
    }
}
