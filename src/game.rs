use crate::engine::EngineKind;
use crate::error::MoveError;
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{Chess, Color, EnPassantMode, Move, Position, Square};
use std::fmt::{self, Write};

/// Books are only consulted while fewer white moves than this have been played.
pub const BOOK_MOVE_LIMIT: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    Stalemate,
    InsufficientMaterial,
    FiftyMoves,
    ThreefoldRepetition,
}

impl fmt::Display for DrawKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DrawKind::Stalemate => "Stalemate",
            DrawKind::InsufficientMaterial => "Insufficient Material",
            DrawKind::FiftyMoves => "Fifty-move rule",
            DrawKind::ThreefoldRepetition => "Threefold repetition",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Draw(DrawKind),
    Checkmate { winner: Color },
    Resignation { loser: Color },
}

impl Outcome {
    pub fn result(&self) -> &'static str {
        match *self {
            Outcome::Draw(_) => "1/2-1/2",
            Outcome::Checkmate { winner } => win_for(winner),
            Outcome::Resignation { loser } => win_for(!loser),
        }
    }

    pub fn annotation(&self) -> String {
        match *self {
            Outcome::Draw(_) => "The game is a draw.".to_string(),
            Outcome::Checkmate { winner } => format!("{} wins by checkmate.", color_name(winner)),
            Outcome::Resignation { loser } => format!("{} resigns.", color_name(loser)),
        }
    }
}

fn win_for(color: Color) -> &'static str {
    match color {
        Color::White => "1-0",
        Color::Black => "0-1",
    }
}

pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

fn zobrist(position: &Chess) -> u64 {
    position.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0
}

/// One game: the position, who plays what, and the running movetext.
///
/// The side to move is always read from the position itself.
#[derive(Debug, Clone)]
pub struct Game {
    position: Chess,
    start: Chess,
    engine_kind: EngineKind,
    engine_name: String,
    player_color: Color,
    move_count: u32,
    pgn_text: String,
    ended: bool,
    outcome: Option<Outcome>,
    // Keys of every position since the last irreversible move, current one last.
    repetitions: Vec<u64>,
}

impl Game {
    pub fn new(engine_kind: EngineKind, engine_name: &str, player_color: Color) -> Self {
        Self::from_position(Chess::default(), engine_kind, engine_name, player_color)
    }

    pub fn from_position(
        position: Chess,
        engine_kind: EngineKind,
        engine_name: &str,
        player_color: Color,
    ) -> Self {
        let mut game = Game {
            start: position.clone(),
            position,
            engine_kind,
            engine_name: engine_name.to_string(),
            player_color,
            move_count: 0,
            pgn_text: String::new(),
            ended: false,
            outcome: None,
            repetitions: Vec::new(),
        };
        game.reset();
        game
    }

    pub fn reset(&mut self) {
        self.position = self.start.clone();
        self.move_count = self.start.fullmoves().get() - 1;
        self.pgn_text.clear();
        self.ended = false;
        self.outcome = None;
        self.repetitions = vec![zobrist(&self.position)];
    }

    pub fn position(&self) -> &Chess {
        &self.position
    }

    pub fn start_position(&self) -> &Chess {
        &self.start
    }

    pub fn turn(&self) -> Color {
        self.position.turn()
    }

    pub fn player_color(&self) -> Color {
        self.player_color
    }

    pub fn engine_kind(&self) -> EngineKind {
        self.engine_kind
    }

    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    /// The engine's name, with its kind when the two differ (`Stockfish 16 (uci)`).
    pub fn opponent(&self) -> String {
        if self.engine_name == self.engine_kind.name() {
            self.engine_name.clone()
        } else {
            format!("{} ({})", self.engine_name, self.engine_kind)
        }
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn pgn_text(&self) -> &str {
        &self.pgn_text
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_player_turn(&self) -> bool {
        self.turn() == self.player_color
    }

    /// Resolve SAN (or, failing that, UCI notation) against the current position.
    pub fn parse_move(&self, text: &str) -> Result<Move, MoveError> {
        let illegal = || MoveError::Illegal(text.to_string());
        if let Ok(san) = text.parse::<SanPlus>() {
            if let Ok(m) = san.san.to_move(&self.position) {
                return Ok(m);
            }
        }
        let uci = text.parse::<UciMove>().map_err(|_| illegal())?;
        uci.to_move(&self.position).map_err(|_| illegal())
    }

    /// Play a legal move and append its SAN to the movetext. Returns the SAN.
    pub fn play(&mut self, m: &Move) -> String {
        let mover = self.position.turn();
        let fullmoves = self.position.fullmoves().get();
        if self.position.is_irreversible(m) {
            self.repetitions.clear();
        }
        let san = SanPlus::from_move_and_play_unchecked(&mut self.position, m).to_string();
        self.repetitions.push(zobrist(&self.position));

        match mover {
            Color::White => {
                self.move_count += 1;
                // Infallible: writing into a String.
                let _ = write!(self.pgn_text, "\n{}. {}", self.move_count, san);
            }
            Color::Black if self.pgn_text.is_empty() => {
                let _ = write!(self.pgn_text, "\n{}... {}", fullmoves, san);
            }
            Color::Black => {
                let _ = write!(self.pgn_text, " {}", san);
            }
        }
        san
    }

    /// First matching draw condition, checked in a fixed order.
    pub fn draw_kind(&self) -> Option<DrawKind> {
        if self.position.is_stalemate() {
            Some(DrawKind::Stalemate)
        } else if self.position.is_insufficient_material() {
            Some(DrawKind::InsufficientMaterial)
        } else if self.can_claim_fifty_moves() {
            Some(DrawKind::FiftyMoves)
        } else if self.can_claim_threefold_repetition() {
            Some(DrawKind::ThreefoldRepetition)
        } else {
            None
        }
    }

    pub fn is_checkmate(&self) -> bool {
        self.position.is_checkmate()
    }

    fn can_claim_fifty_moves(&self) -> bool {
        let halfmoves = self.position.halfmoves();
        let moves = self.position.legal_moves();
        if halfmoves >= 100 && !moves.is_empty() {
            return true;
        }
        // A claim is also allowed when the next quiet move reaches the limit.
        halfmoves >= 99 && moves.iter().any(|m| !m.is_zeroing())
    }

    fn can_claim_threefold_repetition(&self) -> bool {
        let current = zobrist(&self.position);
        if self.occurrences(current) >= 3 {
            return true;
        }
        self.position.legal_moves().iter().any(|m| {
            if self.position.is_irreversible(m) {
                return false;
            }
            let mut next = self.position.clone();
            next.play_unchecked(m);
            self.occurrences(zobrist(&next)) >= 2
        })
    }

    fn occurrences(&self, key: u64) -> usize {
        self.repetitions.iter().filter(|&&k| k == key).count()
    }

    /// Append the result annotation and mark the game as over.
    pub fn conclude(&mut self, outcome: Outcome) {
        let _ = write!(self.pgn_text, " {{ {} }} {}", outcome.annotation(), outcome.result());
        self.outcome = Some(outcome);
        self.ended = true;
    }

    pub fn legal_moves_san(&self) -> Vec<String> {
        self.position
            .legal_moves()
            .iter()
            .map(|m| SanPlus::from_move(self.position.clone(), m).to_string())
            .collect()
    }

    pub fn fen(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    /// Plain 8x8 diagram, rank 8 first, `.` for empty squares.
    pub fn board_diagram(&self) -> String {
        let board = self.position.board();
        let mut rows = Vec::with_capacity(8);
        for rank in (0..8u32).rev() {
            let row: Vec<String> = (0..8u32)
                .map(|file| {
                    board
                        .piece_at(Square::new(rank * 8 + file))
                        .map_or('.', |piece| piece.char())
                        .to_string()
                })
                .collect();
            rows.push(row.join(" "));
        }
        rows.join("\n")
    }
}
