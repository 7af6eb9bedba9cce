/// Normalize user input: `:show`, ` SHOW ` and `show` all become `show`.
///
/// Returns `None` for blank input, which callers ignore.
pub fn parse_command(raw: &str) -> Option<String> {
    let text = strip_sentinel(raw);
    if text.is_empty() {
        return None;
    }
    Some(text.to_lowercase())
}

fn strip_sentinel(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix(':').unwrap_or(trimmed).trim()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Show,
    Moves,
    Fen,
    Pgn,
    Resign,
    Quit,
    Start,
    /// Anything else: a candidate move, case preserved.
    Move(String),
}

impl Command {
    pub fn parse(raw: &str) -> Option<Command> {
        let normalized = parse_command(raw)?;
        let command = match normalized.as_str() {
            "help" => Command::Help,
            "show" => Command::Show,
            "moves" => Command::Moves,
            "fen" => Command::Fen,
            "pgn" => Command::Pgn,
            "resign" => Command::Resign,
            "quit" => Command::Quit,
            "start" => Command::Start,
            _ => Command::Move(strip_sentinel(raw).to_string()),
        };
        Some(command)
    }
}

pub const HELP: &str = "\
Lobby:
  start  start a new game
  help   show this help
  quit   quit

In-game:
  show   show the board
  moves  show legal moves (SAN)
  fen    show FEN
  pgn    show PGN so far
  resign resign the game

Or type a move in SAN, e.g. e4, Nf3, exd5, a8=Q.";
