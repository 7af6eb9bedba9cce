use crate::book::OpeningBook;
use crate::engine::{EngineKind, Mover};
use crate::error::{MoveError, SessionError};
use crate::game::{Game, Outcome, BOOK_MOVE_LIMIT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shakmaty::{Chess, Color, Move};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Think time drawn per engine move when no fixed time is configured.
pub const DEFAULT_THINK_MS: RangeInclusive<u64> = 100..=500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Lobby,
    AwaitingHumanMove,
    AwaitingEngineMove,
    Ended,
}

/// How engine moves are produced.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub book_chance: f64,
    pub movetime: Option<Duration>,
    pub start: Chess,
    pub seed: Option<u64>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            book_chance: 0.5,
            movetime: None,
            start: Chess::default(),
            seed: None,
        }
    }
}

/// What happened on one half-move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub san: String,
    pub from_book: bool,
    pub outcome: Option<Outcome>,
}

struct ActiveGame {
    game: Game,
    mover: Box<dyn Mover>,
}

/// The lobby / in-game state machine. At most one game runs at a time and
/// its engine lives exactly as long as the game does.
pub struct Session {
    active: Option<ActiveGame>,
    book: Option<OpeningBook>,
    settings: SessionSettings,
    rng: StdRng,
}

impl Session {
    pub fn new(settings: SessionSettings, book: Option<OpeningBook>) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            active: None,
            book,
            settings,
            rng,
        }
    }

    pub fn state(&self) -> SessionState {
        match &self.active {
            None => SessionState::Lobby,
            Some(active) if active.game.is_ended() => SessionState::Ended,
            Some(active) if active.game.is_player_turn() => SessionState::AwaitingHumanMove,
            Some(_) => SessionState::AwaitingEngineMove,
        }
    }

    pub fn game(&self) -> Option<&Game> {
        self.active.as_ref().map(|active| &active.game)
    }

    pub fn has_book(&self) -> bool {
        self.book.is_some()
    }

    /// Seed for a new engine, drawn from the session RNG so that seeded
    /// sessions replay identically.
    pub fn engine_seed(&mut self) -> u64 {
        self.rng.gen()
    }

    pub fn random_color(&mut self) -> Color {
        if self.rng.gen_bool(0.5) {
            Color::White
        } else {
            Color::Black
        }
    }

    pub fn start(
        &mut self,
        kind: EngineKind,
        mover: Box<dyn Mover>,
        player_color: Color,
    ) -> Result<SessionState, SessionError> {
        if self.active.is_some() {
            return Err(SessionError::GameInProgress);
        }
        let game = Game::from_position(self.settings.start.clone(), kind, mover.name(), player_color);
        log::info!("new game: player {:?} against {} ({})", player_color, mover.name(), kind);
        self.active = Some(ActiveGame { game, mover });
        Ok(self.state())
    }

    /// Let the engine move if it is its turn. Returns `None` otherwise.
    pub fn advance_turn(&mut self) -> Result<Option<TurnReport>, SessionError> {
        if self.state() != SessionState::AwaitingEngineMove {
            return Ok(None);
        }
        self.play_engine_move().map(Some)
    }

    /// Ask the engine (or the book) for a move and play it, whoever is to move.
    ///
    /// An engine failure abandons the game: the engine is dropped and the
    /// session is back in the lobby when this returns.
    pub fn play_engine_move(&mut self) -> Result<TurnReport, SessionError> {
        let budget = self.think_time();
        let book_move = self.book_move();
        let active = self.active.as_mut().ok_or(SessionError::NoGame)?;

        let (m, from_book) = match book_move {
            Some(m) => (m, true),
            None => match active.mover.propose(active.game.position(), budget) {
                Ok(m) => (m, false),
                Err(err) => {
                    log::error!("{} failed: {}", active.mover.name(), err);
                    self.active = None;
                    return Err(err.into());
                }
            },
        };
        log::debug!("engine move {:?} (book: {}, budget {:?})", m, from_book, budget);

        let engine_side = !active.game.player_color();
        Ok(apply(&mut active.game, &m, engine_side, from_book))
    }

    pub fn submit_move(&mut self, text: &str) -> Result<TurnReport, MoveError> {
        if self.state() != SessionState::AwaitingHumanMove {
            return Err(MoveError::NotYourTurn);
        }
        let Some(active) = self.active.as_mut() else {
            return Err(MoveError::NotYourTurn);
        };
        let m = active.game.parse_move(text)?;
        let player = active.game.player_color();
        Ok(apply(&mut active.game, &m, player, false))
    }

    pub fn resign(&mut self) -> Result<Outcome, SessionError> {
        let active = self
            .active
            .as_mut()
            .filter(|active| !active.game.is_ended())
            .ok_or(SessionError::NoGame)?;
        let outcome = Outcome::Resignation {
            loser: active.game.player_color(),
        };
        active.game.conclude(outcome);
        Ok(outcome)
    }

    /// Leave a finished game and return to the lobby, releasing the engine.
    pub fn finish(&mut self) -> Option<Game> {
        if self.state() != SessionState::Ended {
            return None;
        }
        self.active.take().map(|active| active.game)
    }

    /// Drop whatever game is running, finished or not.
    pub fn quit(&mut self) {
        if let Some(active) = self.active.take() {
            log::info!("closing game against {}", active.mover.name());
        }
    }

    fn think_time(&mut self) -> Duration {
        match self.settings.movetime {
            Some(movetime) => movetime,
            None => Duration::from_millis(self.rng.gen_range(DEFAULT_THINK_MS)),
        }
    }

    fn book_move(&mut self) -> Option<Move> {
        let active = self.active.as_ref()?;
        let book = self.book.as_ref()?;
        if active.game.move_count() >= BOOK_MOVE_LIMIT {
            return None;
        }
        if !self.rng.gen_bool(self.settings.book_chance.clamp(0.0, 1.0)) {
            return None;
        }
        let m = book.weighted_choice(active.game.position(), &mut self.rng);
        if m.is_none() {
            log::debug!("position not in book");
        }
        m
    }
}

/// Play `m`, then settle the game: draws first, then checkmate credited to `mover`.
fn apply(game: &mut Game, m: &Move, mover: Color, from_book: bool) -> TurnReport {
    let san = game.play(m);
    let outcome = if let Some(kind) = game.draw_kind() {
        Some(Outcome::Draw(kind))
    } else if game.is_checkmate() {
        Some(Outcome::Checkmate { winner: mover })
    } else {
        None
    };
    if let Some(outcome) = outcome {
        game.conclude(outcome);
    }
    TurnReport {
        san,
        from_book,
        outcome,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::game::tests::position;
    use crate::game::DrawKind;
    use shakmaty::uci::UciMove;
    use shakmaty::Position;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Plays a fixed list of UCI moves, then fails.
    pub(crate) struct Scripted {
        moves: VecDeque<&'static str>,
        pub(crate) dropped: Rc<Cell<bool>>,
    }

    impl Scripted {
        pub(crate) fn new(moves: &[&'static str]) -> Self {
            Self {
                moves: moves.iter().copied().collect(),
                dropped: Rc::new(Cell::new(false)),
            }
        }
    }

    impl Mover for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn propose(&mut self, position: &Chess, _budget: Duration) -> Result<Move, EngineError> {
            let text = self.moves.pop_front().ok_or(EngineError::Disconnected { expected: "bestmove" })?;
            text.parse::<UciMove>()
                .ok()
                .and_then(|uci| uci.to_move(position).ok())
                .ok_or_else(|| EngineError::BadMove(text.to_string()))
        }
    }

    impl Drop for Scripted {
        fn drop(&mut self) {
            self.dropped.set(true);
        }
    }

    fn session() -> Session {
        settings_session(SessionSettings {
            seed: Some(1),
            book_chance: 0.0,
            ..SessionSettings::default()
        })
    }

    fn settings_session(settings: SessionSettings) -> Session {
        Session::new(settings, None)
    }

    #[test]
    fn test_lobby_until_start() {
        let mut session = session();
        assert_eq!(session.state(), SessionState::Lobby);
        assert!(session.advance_turn().unwrap().is_none());
        assert_eq!(session.submit_move("e4"), Err(MoveError::NotYourTurn));
        assert!(matches!(session.resign(), Err(SessionError::NoGame)));
    }

    #[test]
    fn test_engine_moves_first_when_player_is_black() {
        let mut session = session();
        let state = session
            .start(EngineKind::Random, Box::new(Scripted::new(&["e2e4"])), Color::Black)
            .unwrap();
        assert_eq!(state, SessionState::AwaitingEngineMove);

        let report = session.advance_turn().unwrap().unwrap();
        assert_eq!(report.san, "e4");
        assert_eq!(report.outcome, None);

        let game = session.game().unwrap();
        assert!(game.pgn_text().starts_with("\n1. e4"));
        assert_eq!(game.turn(), Color::Black);
        assert_eq!(game.move_count(), 1);
        assert_eq!(session.state(), SessionState::AwaitingHumanMove);
    }

    #[test]
    fn test_human_then_engine() {
        let mut session = session();
        let state = session
            .start(EngineKind::Random, Box::new(Scripted::new(&["e7e5"])), Color::White)
            .unwrap();
        assert_eq!(state, SessionState::AwaitingHumanMove);
        assert!(session.advance_turn().unwrap().is_none());

        session.submit_move("e4").unwrap();
        assert_eq!(session.state(), SessionState::AwaitingEngineMove);
        let report = session.advance_turn().unwrap().unwrap();
        assert_eq!(report.san, "e5");
        assert_eq!(session.game().unwrap().pgn_text(), "\n1. e4 e5");
        assert_eq!(session.game().unwrap().move_count(), 1);
    }

    #[test]
    fn test_illegal_move_leaves_state_alone() {
        let mut session = session();
        session
            .start(EngineKind::Random, Box::new(Scripted::new(&[])), Color::White)
            .unwrap();
        let fen = session.game().unwrap().fen();
        assert_eq!(
            session.submit_move("Qh5"),
            Err(MoveError::Illegal("Qh5".to_string()))
        );
        let game = session.game().unwrap();
        assert_eq!(game.fen(), fen);
        assert!(game.pgn_text().is_empty());
        assert_eq!(session.state(), SessionState::AwaitingHumanMove);
    }

    #[test]
    fn test_start_rejected_while_active() {
        let mut session = session();
        session
            .start(EngineKind::Random, Box::new(Scripted::new(&[])), Color::White)
            .unwrap();
        let again = session.start(EngineKind::Random, Box::new(Scripted::new(&[])), Color::White);
        assert!(matches!(again, Err(SessionError::GameInProgress)));
    }

    #[test]
    fn test_engine_checkmate() {
        let mut session = settings_session(SessionSettings {
            seed: Some(1),
            book_chance: 0.0,
            start: position("7k/5Q2/7K/8/8/8/8/8 w - - 0 1"),
            movetime: None,
        });
        session
            .start(EngineKind::Random, Box::new(Scripted::new(&["f7g7"])), Color::White)
            .unwrap();
        let report = session.play_engine_move().unwrap();
        assert_eq!(report.outcome, Some(Outcome::Checkmate { winner: Color::Black }));

        let game = session.game().unwrap();
        assert!(game.is_ended());
        assert!(game.position().is_checkmate());
        assert!(game.pgn_text().contains("black wins by checkmate."));
        assert!(game.pgn_text().ends_with("0-1"));
        assert_eq!(session.state(), SessionState::Ended);
    }

    #[test]
    fn test_engine_checkmate_result_follows_player_color() {
        let mut session = settings_session(SessionSettings {
            seed: Some(1),
            book_chance: 0.0,
            start: position("7k/5Q2/7K/8/8/8/8/8 w - - 0 1"),
            movetime: None,
        });
        session
            .start(EngineKind::Random, Box::new(Scripted::new(&["f7g7"])), Color::Black)
            .unwrap();
        let report = session.advance_turn().unwrap().unwrap();
        assert_eq!(report.outcome, Some(Outcome::Checkmate { winner: Color::White }));
        assert!(session
            .game()
            .unwrap()
            .pgn_text()
            .ends_with("{ white wins by checkmate. } 1-0"));
    }

    #[test]
    fn test_human_checkmate() {
        let mut session = settings_session(SessionSettings {
            seed: Some(1),
            book_chance: 0.0,
            start: position("7k/5Q2/7K/8/8/8/8/8 w - - 0 1"),
            movetime: None,
        });
        session
            .start(EngineKind::Random, Box::new(Scripted::new(&[])), Color::White)
            .unwrap();
        let report = session.submit_move("Qg7").unwrap();
        assert_eq!(report.san, "Qg7#");
        assert_eq!(report.outcome, Some(Outcome::Checkmate { winner: Color::White }));
        assert!(session.game().unwrap().pgn_text().ends_with("{ white wins by checkmate. } 1-0"));
    }

    #[test]
    fn test_draw_ends_game() {
        let mut session = settings_session(SessionSettings {
            seed: Some(1),
            book_chance: 0.0,
            start: position("7k/8/8/8/8/8/6q1/7K w - - 0 1"),
            movetime: None,
        });
        session
            .start(EngineKind::Random, Box::new(Scripted::new(&[])), Color::White)
            .unwrap();
        let report = session.submit_move("Kxg2").unwrap();
        assert_eq!(report.outcome, Some(Outcome::Draw(DrawKind::InsufficientMaterial)));
        assert_eq!(session.state(), SessionState::Ended);
        assert!(session
            .game()
            .unwrap()
            .pgn_text()
            .ends_with("{ The game is a draw. } 1/2-1/2"));
    }

    #[test]
    fn test_resign_as_white() {
        let mut session = session();
        session
            .start(EngineKind::Random, Box::new(Scripted::new(&[])), Color::White)
            .unwrap();
        let outcome = session.resign().unwrap();
        assert_eq!(outcome.result(), "0-1");
        assert!(session.game().unwrap().pgn_text().ends_with("{ white resigns. } 0-1"));
        assert_eq!(session.state(), SessionState::Ended);
    }

    #[test]
    fn test_resign_as_black() {
        let mut session = session();
        session
            .start(EngineKind::Random, Box::new(Scripted::new(&["d2d4"])), Color::Black)
            .unwrap();
        session.advance_turn().unwrap();
        let outcome = session.resign().unwrap();
        assert_eq!(outcome.result(), "1-0");
    }

    #[test]
    fn test_finish_returns_to_lobby_and_drops_engine() {
        let mut session = session();
        let mover = Scripted::new(&[]);
        let dropped = Rc::clone(&mover.dropped);
        session
            .start(EngineKind::Random, Box::new(mover), Color::White)
            .unwrap();
        assert!(session.finish().is_none());
        session.resign().unwrap();
        assert!(!dropped.get());

        let game = session.finish().unwrap();
        assert!(game.is_ended());
        assert!(dropped.get());
        assert_eq!(session.state(), SessionState::Lobby);
    }

    #[test]
    fn test_engine_failure_abandons_game() {
        let mut session = session();
        let mover = Scripted::new(&[]);
        let dropped = Rc::clone(&mover.dropped);
        session
            .start(EngineKind::Uci, Box::new(mover), Color::Black)
            .unwrap();
        let err = session.advance_turn().unwrap_err();
        assert!(matches!(err, SessionError::Engine(_)));
        assert!(dropped.get());
        assert_eq!(session.state(), SessionState::Lobby);
    }

    #[test]
    fn test_quit_drops_engine() {
        let mut session = session();
        let mover = Scripted::new(&[]);
        let dropped = Rc::clone(&mover.dropped);
        session
            .start(EngineKind::Random, Box::new(mover), Color::White)
            .unwrap();
        session.quit();
        assert!(dropped.get());
        assert_eq!(session.state(), SessionState::Lobby);
    }

    #[test]
    fn test_book_overrides_engine() {
        // e2e4 for the start position, always consulted.
        let mut bytes = 0x463b_9618_1691_fc9c_u64.to_be_bytes().to_vec();
        bytes.extend_from_slice(&((12u16 << 6) | 28).to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        let book = OpeningBook::from_bytes(&bytes).unwrap();

        let settings = SessionSettings {
            seed: Some(5),
            book_chance: 1.0,
            ..SessionSettings::default()
        };
        let mut session = Session::new(settings, Some(book));
        assert!(session.has_book());
        session
            .start(EngineKind::Random, Box::new(Scripted::new(&["d2d4"])), Color::Black)
            .unwrap();
        let report = session.advance_turn().unwrap().unwrap();
        assert!(report.from_book);
        assert_eq!(report.san, "e4");
    }

    #[test]
    fn test_book_also_covers_uci_engines() {
        let mut bytes = 0x463b_9618_1691_fc9c_u64.to_be_bytes().to_vec();
        bytes.extend_from_slice(&((11u16 << 6) | 27).to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        let book = OpeningBook::from_bytes(&bytes).unwrap();

        let settings = SessionSettings {
            seed: Some(5),
            book_chance: 1.0,
            ..SessionSettings::default()
        };
        let mut session = Session::new(settings, Some(book));
        session
            .start(EngineKind::Uci, Box::new(Scripted::new(&["e2e4"])), Color::Black)
            .unwrap();
        let report = session.advance_turn().unwrap().unwrap();
        assert!(report.from_book);
        assert_eq!(report.san, "d4");
    }

    #[test]
    fn test_missing_book_entry_falls_back_to_engine() {
        let book = OpeningBook::from_bytes(&[]).unwrap();
        let settings = SessionSettings {
            seed: Some(5),
            book_chance: 1.0,
            ..SessionSettings::default()
        };
        let mut session = Session::new(settings, Some(book));
        session
            .start(EngineKind::Random, Box::new(Scripted::new(&["d2d4"])), Color::Black)
            .unwrap();
        let report = session.advance_turn().unwrap().unwrap();
        assert!(!report.from_book);
        assert_eq!(report.san, "d4");
    }
}
