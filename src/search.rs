use crate::evaluation::Evaluator;
use crate::transposition::{NodeType, TranspositionEntry, TranspositionTable};
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{Chess, EnPassantMode, Move, Position};
use std::time::{Duration, Instant};

pub const MATE: i32 = 1_000_000;
const INFINITY: i32 = MATE + 1;
const MAX_PLY: u32 = 64;

/// Alpha-beta negamax over shakmaty positions, shared by the built-in engines.
pub struct Search {
    evaluator: Evaluator,
    transposition_table: TranspositionTable,
    max_depth: u32,
    nodes_searched: u64,
    deadline: Instant,
    stopped: bool,
}

impl Default for Search {
    fn default() -> Self {
        Self::new()
    }
}

impl Search {
    pub fn new() -> Self {
        Self {
            evaluator: Evaluator::new(),
            transposition_table: TranspositionTable::new(1_000_000),
            max_depth: 4,
            nodes_searched: 0,
            deadline: Instant::now(),
            stopped: false,
        }
    }

    pub fn set_max_depth(&mut self, depth: u32) {
        self.max_depth = depth.clamp(1, MAX_PLY);
    }

    pub fn nodes_searched(&self) -> u64 {
        self.nodes_searched
    }

    /// Search to the configured depth. If the budget runs out first, the best
    /// move among those already examined is returned.
    pub fn find_best_move(&mut self, position: &Chess, budget: Duration) -> Option<Move> {
        self.begin(budget);
        let depth = self.max_depth;
        match self.search_root(position, depth) {
            Some((best_move, _)) => Some(best_move),
            None => self.fallback(position),
        }
    }

    /// Deepen one ply at a time until the budget is spent, keeping the result
    /// of the last iteration that finished.
    pub fn iterative_deepening(&mut self, position: &Chess, budget: Duration) -> Option<Move> {
        self.begin(budget);
        let mut best = None;
        for depth in 1..=self.max_depth {
            let result = self.search_root(position, depth);
            if self.stopped {
                break;
            }
            if let Some((best_move, score)) = result {
                log::trace!("depth {depth}: score {score}, {} nodes", self.nodes_searched);
                best = Some(best_move);
                if score.abs() >= MATE - MAX_PLY as i32 {
                    break;
                }
            }
        }
        best.or_else(|| self.fallback(position))
    }

    fn begin(&mut self, budget: Duration) {
        self.nodes_searched = 0;
        self.stopped = false;
        self.deadline = Instant::now() + budget;
    }

    fn fallback(&self, position: &Chess) -> Option<Move> {
        let mut moves: Vec<Move> = position.legal_moves().into_iter().collect();
        self.order_moves(&mut moves, None);
        moves.into_iter().next()
    }

    fn search_root(&mut self, position: &Chess, depth: u32) -> Option<(Move, i32)> {
        let hash = position_hash(position);
        let mut moves: Vec<Move> = position.legal_moves().into_iter().collect();
        let hash_move = self.transposition_table.best_move(hash).cloned();
        self.order_moves(&mut moves, hash_move.as_ref());

        let mut best: Option<(Move, i32)> = None;
        let mut alpha = -INFINITY;
        let beta = INFINITY;

        for mv in moves {
            let mut child = position.clone();
            child.play_unchecked(&mv);
            let score = -self.negamax(&child, depth - 1, 1, -beta, -alpha);
            if self.stopped {
                break;
            }
            if best.as_ref().map_or(true, |(_, best_score)| score > *best_score) {
                best = Some((mv, score));
            }
            alpha = alpha.max(score);
        }

        if let Some((best_move, score)) = &best {
            if !self.stopped {
                self.transposition_table.store(
                    hash,
                    TranspositionEntry {
                        depth,
                        score: *score,
                        node_type: NodeType::Exact,
                        best_move: Some(best_move.clone()),
                    },
                );
            }
        }
        best
    }

    fn negamax(&mut self, position: &Chess, depth: u32, ply: u32, alpha: i32, beta: i32) -> i32 {
        self.nodes_searched += 1;
        if self.out_of_time() {
            return 0;
        }

        let moves = position.legal_moves();
        if moves.is_empty() {
            return if position.is_check() { -MATE + ply as i32 } else { 0 };
        }
        if position.is_insufficient_material() || position.halfmoves() >= 100 {
            return 0;
        }
        if depth == 0 || ply >= MAX_PLY {
            return self.quiescence_search(position, ply, alpha, beta);
        }

        let hash = position_hash(position);
        if let Some(score) = self.transposition_table.probe(hash, depth, alpha, beta) {
            return score;
        }

        let mut moves: Vec<Move> = moves.into_iter().collect();
        let hash_move = self.transposition_table.best_move(hash).cloned();
        self.order_moves(&mut moves, hash_move.as_ref());

        let original_alpha = alpha;
        let mut alpha = alpha;
        let mut best_score = -INFINITY;
        let mut best_move = None;

        for mv in moves {
            let mut child = position.clone();
            child.play_unchecked(&mv);
            let score = -self.negamax(&child, depth - 1, ply + 1, -beta, -alpha);
            if self.stopped {
                return 0;
            }

            if score > best_score {
                best_score = score;
                best_move = Some(mv);
            }
            alpha = alpha.max(score);
            if alpha >= beta {
                break;
            }
        }

        let node_type = if best_score <= original_alpha {
            NodeType::UpperBound
        } else if best_score >= beta {
            NodeType::LowerBound
        } else {
            NodeType::Exact
        };
        self.transposition_table.store(
            hash,
            TranspositionEntry {
                depth,
                score: best_score,
                node_type,
                best_move,
            },
        );

        best_score
    }

    fn quiescence_search(&mut self, position: &Chess, ply: u32, mut alpha: i32, beta: i32) -> i32 {
        self.nodes_searched += 1;
        if self.out_of_time() {
            return 0;
        }

        let stand_pat = self.evaluator.evaluate(position);
        if stand_pat >= beta || ply >= MAX_PLY {
            return stand_pat.min(beta);
        }
        alpha = alpha.max(stand_pat);

        // Only captures and promotions
        let mut moves: Vec<Move> = position
            .legal_moves()
            .into_iter()
            .filter(|mv| mv.is_capture() || mv.is_promotion())
            .collect();
        self.order_moves(&mut moves, None);

        for mv in moves {
            let mut child = position.clone();
            child.play_unchecked(&mv);
            let score = -self.quiescence_search(&child, ply + 1, -beta, -alpha);
            if self.stopped {
                return 0;
            }
            if score >= beta {
                return beta;
            }
            alpha = alpha.max(score);
        }

        alpha
    }

    fn order_moves(&self, moves: &mut [Move], hash_move: Option<&Move>) {
        moves.sort_by_cached_key(|mv| {
            // Hash move first, then MVV-LVA captures, then promotions.
            if hash_move == Some(mv) {
                return i32::MIN;
            }
            let victim = mv.capture().map_or(0, |role| self.evaluator.piece_value(role));
            let attacker = self.evaluator.piece_value(mv.role()) / 100;
            let promotion = mv.promotion().map_or(0, |role| self.evaluator.piece_value(role));
            if victim > 0 {
                -(victim * 10 - attacker) - promotion
            } else {
                -promotion
            }
        });
    }

    fn out_of_time(&mut self) -> bool {
        if !self.stopped && self.nodes_searched % 1024 == 0 && Instant::now() >= self.deadline {
            self.stopped = true;
        }
        self.stopped
    }
}

fn position_hash(position: &Chess) -> u64 {
    position.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0
}
