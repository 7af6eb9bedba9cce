use crate::error::EngineError;
use crate::search::Search;
use crate::uci::UciEngine;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use shakmaty::{Chess, Move, Position};
use std::fmt;
use std::time::Duration;

/// A source of moves for the side the human is not playing.
pub trait Mover {
    fn name(&self) -> &str;

    /// Choose a legal move in `position`, spending at most about `budget`.
    fn propose(&mut self, position: &Chess, budget: Duration) -> Result<Move, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Random,
    Andoma,
    Sunfish,
    Uci,
}

impl EngineKind {
    pub const ALL: [EngineKind; 4] = [
        EngineKind::Random,
        EngineKind::Andoma,
        EngineKind::Sunfish,
        EngineKind::Uci,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EngineKind::Random => "random",
            EngineKind::Andoma => "andoma",
            EngineKind::Sunfish => "sunfish",
            EngineKind::Uci => "uci",
        }
    }

    /// Accepts a menu number (`1`-`4`) or a name.
    pub fn from_choice(choice: &str) -> Option<Self> {
        let choice = choice.trim().to_lowercase();
        if let Ok(index) = choice.parse::<usize>() {
            return index.checked_sub(1).and_then(|i| Self::ALL.get(i).copied());
        }
        Self::ALL.into_iter().find(|kind| kind.name() == choice)
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build the backend for `kind`. External engines are started and
/// handshaken here, so a broken command fails before any game exists.
pub fn open(kind: EngineKind, seed: u64, uci_command: Option<&str>) -> Result<Box<dyn Mover>, EngineError> {
    let mover: Box<dyn Mover> = match kind {
        EngineKind::Random => Box::new(RandomMover::new(seed)),
        EngineKind::Andoma => Box::new(Andoma::new()),
        EngineKind::Sunfish => Box::new(Sunfish::new()),
        EngineKind::Uci => Box::new(UciEngine::spawn(uci_command.unwrap_or_default())?),
    };
    Ok(mover)
}

pub struct RandomMover {
    rng: StdRng,
}

impl RandomMover {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Mover for RandomMover {
    fn name(&self) -> &str {
        "random"
    }

    fn propose(&mut self, position: &Chess, _budget: Duration) -> Result<Move, EngineError> {
        position
            .legal_moves()
            .choose(&mut self.rng)
            .cloned()
            .ok_or(EngineError::NoMove)
    }
}

/// Fixed-depth alpha-beta player.
pub struct Andoma {
    search: Search,
}

impl Andoma {
    pub const DEPTH: u32 = 4;

    pub fn new() -> Self {
        let mut search = Search::new();
        search.set_max_depth(Self::DEPTH);
        Self { search }
    }
}

impl Default for Andoma {
    fn default() -> Self {
        Self::new()
    }
}

impl Mover for Andoma {
    fn name(&self) -> &str {
        "andoma"
    }

    fn propose(&mut self, position: &Chess, budget: Duration) -> Result<Move, EngineError> {
        let best = self.search.find_best_move(position, budget);
        log::debug!("andoma searched {} nodes", self.search.nodes_searched());
        best.ok_or(EngineError::NoMove)
    }
}

/// Time-bounded iterative-deepening player.
pub struct Sunfish {
    search: Search,
}

impl Sunfish {
    pub const MAX_DEPTH: u32 = 32;

    pub fn new() -> Self {
        let mut search = Search::new();
        search.set_max_depth(Self::MAX_DEPTH);
        Self { search }
    }
}

impl Default for Sunfish {
    fn default() -> Self {
        Self::new()
    }
}

impl Mover for Sunfish {
    fn name(&self) -> &str {
        "sunfish"
    }

    fn propose(&mut self, position: &Chess, budget: Duration) -> Result<Move, EngineError> {
        let best = self.search.iterative_deepening(position, budget);
        log::debug!("sunfish searched {} nodes", self.search.nodes_searched());
        best.ok_or(EngineError::NoMove)
    }
}
