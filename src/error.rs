use std::io;
use thiserror::Error;

/// Failures of a move backend. Any of these ends the current game.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine command is empty or badly quoted")]
    EmptyCommand,
    #[error("could not start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("engine i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("engine closed its output while waiting for `{expected}`")]
    Disconnected { expected: &'static str },
    #[error("engine answered with an unusable move `{0}`")]
    BadMove(String),
    #[error("engine found no move")]
    NoMove,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoveError {
    #[error("'{0}' is not a legal move")]
    Illegal(String),
    #[error("it is not your turn")]
    NotYourTurn,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a game is already in progress")]
    GameInProgress,
    #[error("no game is in progress")]
    NoGame,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PgnError {
    #[error("illegal move `{san}` at ply {ply}")]
    IllegalMove { san: String, ply: usize },
    #[error("unterminated comment in movetext")]
    UnterminatedComment,
}

#[derive(Debug, Error)]
pub enum BookError {
    #[error("cannot read opening book: {0}")]
    Io(#[from] io::Error),
    #[error("opening book has {0} bytes, not a whole number of entries")]
    Truncated(usize),
}
