//! Turning the running movetext into a finished PGN game.

use crate::error::PgnError;
use chrono::{Local, NaiveDate};
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{Chess, Color, EnPassantMode, Position};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const EVENT: &str = "Blind-chess match";
pub const SITE: &str = "Terminal";
pub const PLAYER: &str = "Me";
const LINE_WIDTH: usize = 80;
const RESULTS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Move { san: String, color: Color, fullmove: u32 },
    Comment(String),
}

/// A parsed game: ordered headers plus validated movetext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgnGame {
    headers: Vec<(String, String)>,
    nodes: Vec<Node>,
    result: String,
}

impl PgnGame {
    /// Read movetext, replaying every move from `start`.
    pub fn read(movetext: &str, start: &Chess) -> Result<Self, PgnError> {
        let mut position = start.clone();
        let mut nodes = Vec::new();
        let mut result = None;
        let mut ply = 0;

        for token in tokenize(movetext)? {
            match token {
                Token::Comment(text) => nodes.push(Node::Comment(text)),
                Token::Word(word) if RESULTS.contains(&word) => {
                    result = Some(word.to_string());
                }
                Token::Word(word) => {
                    let word = strip_move_number(word);
                    if word.is_empty() {
                        continue;
                    }
                    ply += 1;
                    let illegal = || PgnError::IllegalMove {
                        san: word.to_string(),
                        ply,
                    };
                    let san: SanPlus = word.parse().map_err(|_| illegal())?;
                    let m = san.san.to_move(&position).map_err(|_| illegal())?;
                    let color = position.turn();
                    let fullmove = position.fullmoves().get();
                    let san = SanPlus::from_move_and_play_unchecked(&mut position, &m);
                    nodes.push(Node::Move {
                        san: san.to_string(),
                        color,
                        fullmove,
                    });
                }
            }
        }

        let result = result.unwrap_or_else(|| "*".to_string());
        let mut game = PgnGame {
            headers: seven_tag_roster(),
            nodes,
            result: result.clone(),
        };
        game.set_header("Result", &result);
        let fen = fen_of(start);
        if fen != fen_of(&Chess::default()) {
            game.set_header("SetUp", "1");
            game.set_header("FEN", &fen);
        }
        Ok(game)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        match self.headers.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    pub fn result(&self) -> &str {
        &self.result
    }

    pub fn move_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Move { .. }))
            .count()
    }

    fn movetext_tokens(&self) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut after_comment = true;
        for node in &self.nodes {
            match node {
                Node::Move { san, color: Color::White, fullmove } => {
                    tokens.push(format!("{fullmove}."));
                    tokens.push(san.clone());
                    after_comment = false;
                }
                Node::Move { san, color: Color::Black, fullmove } => {
                    if after_comment {
                        tokens.push(format!("{fullmove}..."));
                    }
                    tokens.push(san.clone());
                    after_comment = false;
                }
                Node::Comment(text) => {
                    tokens.push(format!("{{ {text} }}"));
                    after_comment = true;
                }
            }
        }
        tokens.push(self.result.clone());
        tokens
    }
}

impl fmt::Display for PgnGame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            writeln!(f, "[{} \"{}\"]", name, escape(value))?;
        }
        writeln!(f)?;

        let mut line = String::new();
        for token in self.movetext_tokens() {
            if !line.is_empty() && line.len() + 1 + token.len() > LINE_WIDTH {
                writeln!(f, "{line}")?;
                line.clear();
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&token);
        }
        write!(f, "{line}")
    }
}

fn seven_tag_roster() -> Vec<(String, String)> {
    [
        ("Event", "?"),
        ("Site", "?"),
        ("Date", "????.??.??"),
        ("Round", "?"),
        ("White", "?"),
        ("Black", "?"),
        ("Result", "*"),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect()
}

fn fen_of(position: &Chess) -> String {
    Fen::from_position(position.clone(), EnPassantMode::Legal).to_string()
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    Comment(String),
}

fn tokenize(text: &str) -> Result<Vec<Token<'_>>, PgnError> {
    let mut tokens = Vec::new();
    let mut rest = text;
    loop {
        rest = rest.trim_start();
        let Some(first) = rest.chars().next() else {
            break;
        };
        match first {
            '{' => {
                let end = rest.find('}').ok_or(PgnError::UnterminatedComment)?;
                tokens.push(Token::Comment(rest[1..end].trim().to_string()));
                rest = &rest[end + 1..];
            }
            ';' => {
                let end = rest.find('\n').unwrap_or(rest.len());
                tokens.push(Token::Comment(rest[1..end].trim().to_string()));
                rest = &rest[end..];
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '{' || c == ';')
                    .unwrap_or(rest.len());
                tokens.push(Token::Word(&rest[..end]));
                rest = &rest[end..];
            }
        }
    }
    Ok(tokens)
}

/// `12.`, `12...` and `12.Nf3` all lose their move number.
fn strip_move_number(word: &str) -> &str {
    let digits = word.trim_start_matches(|c: char| c.is_ascii_digit());
    if digits.len() < word.len() && digits.starts_with('.') {
        digits.trim_start_matches('.')
    } else {
        word
    }
}

/// Build the final PGN for a game played from `start`.
pub fn assemble(
    pgn_text: &str,
    start: &Chess,
    player_color: Color,
    engine_name: &str,
    date: NaiveDate,
) -> Result<PgnGame, PgnError> {
    let wrapped = format!("{pgn_text}\n\n");
    let mut game = PgnGame::read(&wrapped, start)?;
    let bot = format!("{engine_name} Bot");
    let (white, black) = match player_color {
        Color::White => (PLAYER, bot.as_str()),
        Color::Black => (bot.as_str(), PLAYER),
    };
    game.set_header("Event", EVENT);
    game.set_header("Site", SITE);
    game.set_header("White", white);
    game.set_header("Black", black);
    game.set_header("Date", &date.format("%Y-%m-%d").to_string());
    Ok(game)
}

/// [`assemble`] from the standard start position, dated today.
pub fn finalize_pgn(pgn_text: &str, player_color: Color, engine_name: &str) -> Result<PgnGame, PgnError> {
    assemble(
        pgn_text,
        &Chess::default(),
        player_color,
        engine_name,
        Local::now().date_naive(),
    )
}

pub fn slugify_filename(name: &str) -> String {
    let mut slug = String::new();
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        "bot".to_string()
    } else {
        slug.to_string()
    }
}

/// Write `game` into `dir` as `<date>_<engine>.pgn`, never overwriting.
pub fn save_pgn(dir: &Path, game: &PgnGame, engine_name: &str, date: NaiveDate) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let stem = format!("{}_{}", date.format("%Y-%m-%d"), slugify_filename(engine_name));
    let mut path = dir.join(format!("{stem}.pgn"));
    let mut n = 2;
    while path.exists() {
        path = dir.join(format!("{stem}_{n}.pgn"));
        n += 1;
    }
    fs::write(&path, format!("{game}\n"))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::CastlingMode;
    use std::env;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn test_finalize_pgn_headers() {
        let game = finalize_pgn("1. e4 e5", Color::White, "sunfish").unwrap();
        assert_eq!(game.header("Event"), Some("Blind-chess match"));
        assert_eq!(game.header("Site"), Some("Terminal"));
        assert_eq!(game.header("White"), Some("Me"));
        assert_eq!(game.header("Black"), Some("sunfish Bot"));
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        assert_eq!(game.header("Date"), Some(today.as_str()));
        assert_eq!(game.move_count(), 2);
    }

    #[test]
    fn test_headers_follow_player_color() {
        let game = assemble("", &Chess::default(), Color::Black, "andoma", date()).unwrap();
        assert_eq!(game.header("White"), Some("andoma Bot"));
        assert_eq!(game.header("Black"), Some("Me"));
    }

    #[test]
    fn test_export_format() {
        let text = "\n1. e4 e5\n2. Nf3 Nc6 { white resigns. } 0-1";
        let game = assemble(text, &Chess::default(), Color::White, "random", date()).unwrap();
        let expected = "\
[Event \"Blind-chess match\"]
[Site \"Terminal\"]
[Date \"2024-03-09\"]
[Round \"?\"]
[White \"Me\"]
[Black \"random Bot\"]
[Result \"0-1\"]

1. e4 e5 2. Nf3 Nc6 { white resigns. } 0-1";
        assert_eq!(game.to_string(), expected);
        assert_eq!(game.result(), "0-1");
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let text = "\n1. d4 d5\n2. c4 { The game is a draw. } 1/2-1/2";
        let a = assemble(text, &Chess::default(), Color::Black, "uci", date()).unwrap();
        let b = assemble(text, &Chess::default(), Color::Black, "uci", date()).unwrap();
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_empty_movetext() {
        let game = assemble("", &Chess::default(), Color::White, "random", date()).unwrap();
        assert!(game.to_string().ends_with("[Result \"*\"]\n\n*"));
    }

    #[test]
    fn test_long_games_wrap() {
        let mut text = String::new();
        for n in 1..=10 {
            let moves = if n % 2 == 1 { "Nf3 Nf6" } else { "Ng1 Ng8" };
            text.push_str(&format!("\n{n}. {moves}"));
        }
        let game = assemble(&text, &Chess::default(), Color::White, "random", date()).unwrap();
        let rendered = game.to_string();
        let movetext: Vec<&str> = rendered.split("\n\n").nth(1).unwrap().lines().collect();
        assert!(movetext.len() > 1);
        assert!(movetext.iter().all(|line| line.len() <= LINE_WIDTH));
        assert_eq!(game.move_count(), 20);
    }

    #[test]
    fn test_illegal_movetext() {
        let err = assemble("1. e4 e4", &Chess::default(), Color::White, "random", date()).unwrap_err();
        assert_eq!(
            err,
            PgnError::IllegalMove {
                san: "e4".to_string(),
                ply: 2
            }
        );
        assert_eq!(
            assemble("1. e4 { oops", &Chess::default(), Color::White, "random", date()).unwrap_err(),
            PgnError::UnterminatedComment
        );
    }

    #[test]
    fn test_custom_start_gets_fen_header() {
        let fen = "7k/5Q2/7K/8/8/8/8/8 w - - 0 1";
        let start: Chess = fen
            .parse::<Fen>()
            .unwrap()
            .into_position(CastlingMode::Standard)
            .unwrap();
        let game = assemble("\n1. Qg7# { white wins by checkmate. } 1-0", &start, Color::White, "random", date()).unwrap();
        assert_eq!(game.header("SetUp"), Some("1"));
        assert_eq!(game.header("FEN"), Some(fen));
        assert!(game.to_string().ends_with("1. Qg7# { white wins by checkmate. } 1-0"));
    }

    #[test]
    fn test_black_move_after_comment_is_numbered() {
        let text = "1. e4 { book } e5";
        let game = assemble(text, &Chess::default(), Color::White, "random", date()).unwrap();
        assert!(game.to_string().ends_with("1. e4 { book } 1... e5 *"));
    }

    #[test]
    fn test_strip_move_number() {
        assert_eq!(strip_move_number("12."), "");
        assert_eq!(strip_move_number("3..."), "");
        assert_eq!(strip_move_number("4.Nf3"), "Nf3");
        assert_eq!(strip_move_number("e4"), "e4");
    }

    #[test]
    fn test_slugify_filename() {
        assert_eq!(slugify_filename("My Bot 2!"), "my_bot_2");
        assert_eq!(slugify_filename("   "), "bot");
        assert_eq!(slugify_filename("Stockfish 16.1"), "stockfish_16_1");
    }

    #[test]
    fn test_save_pgn_never_overwrites() {
        let dir = env::temp_dir().join(format!("blindfold-pgn-{}", std::process::id()));
        let game = assemble("1. e4", &Chess::default(), Color::White, "My Bot", date()).unwrap();
        let first = save_pgn(&dir, &game, "My Bot", date()).unwrap();
        let second = save_pgn(&dir, &game, "My Bot", date()).unwrap();
        assert_eq!(first.file_name().unwrap(), "2024-03-09_my_bot.pgn");
        assert_eq!(second.file_name().unwrap(), "2024-03-09_my_bot_2.pgn");
        let written = fs::read_to_string(&first).unwrap();
        assert!(written.contains("[White \"Me\"]"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
