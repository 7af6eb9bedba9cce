//! Read-only Polyglot opening books.
//!
//! A book is a flat file of 16-byte big-endian records sorted by position key:
//! `key: u64, move: u16, weight: u16, learn: u32`.

use crate::error::BookError;
use rand::Rng;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{Chess, EnPassantMode, Move, Position, Role, Square};
use std::fs;
use std::path::Path;

const ENTRY_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookEntry {
    pub key: u64,
    pub raw_move: u16,
    pub weight: u16,
    pub learn: u32,
}

impl BookEntry {
    fn decode(bytes: &[u8]) -> Self {
        let mut key = [0u8; 8];
        key.copy_from_slice(&bytes[0..8]);
        BookEntry {
            key: u64::from_be_bytes(key),
            raw_move: u16::from_be_bytes([bytes[8], bytes[9]]),
            weight: u16::from_be_bytes([bytes[10], bytes[11]]),
            learn: u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        }
    }

    /// Match the packed move against the legal moves of `position`.
    ///
    /// Castling is stored as king-takes-rook, which is how shakmaty
    /// reports the destination of a castling move as well.
    pub fn to_move(&self, position: &Chess) -> Option<Move> {
        let raw = u32::from(self.raw_move);
        let to = Square::new(raw & 0x3f);
        let from = Square::new((raw >> 6) & 0x3f);
        let promotion = match (raw >> 12) & 0x7 {
            1 => Some(Role::Knight),
            2 => Some(Role::Bishop),
            3 => Some(Role::Rook),
            4 => Some(Role::Queen),
            _ => None,
        };
        position
            .legal_moves()
            .into_iter()
            .find(|m| m.from() == Some(from) && m.to() == to && m.promotion() == promotion)
    }
}

pub fn polyglot_key(position: &Chess) -> u64 {
    position.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0
}

#[derive(Debug, Clone, Default)]
pub struct OpeningBook {
    entries: Vec<BookEntry>,
}

impl OpeningBook {
    pub fn open(path: &Path) -> Result<Self, BookError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BookError> {
        if bytes.len() % ENTRY_SIZE != 0 {
            return Err(BookError::Truncated(bytes.len()));
        }
        let mut entries: Vec<BookEntry> = bytes.chunks_exact(ENTRY_SIZE).map(BookEntry::decode).collect();
        // Lookups rely on key order; tolerate books written unsorted.
        entries.sort_by_key(|entry| entry.key);
        Ok(OpeningBook { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries_for(&self, position: &Chess) -> &[BookEntry] {
        let key = polyglot_key(position);
        let lo = self.entries.partition_point(|entry| entry.key < key);
        let hi = self.entries.partition_point(|entry| entry.key <= key);
        &self.entries[lo..hi]
    }

    /// Pick a legal book move with probability proportional to its weight.
    pub fn weighted_choice<R: Rng + ?Sized>(&self, position: &Chess, rng: &mut R) -> Option<Move> {
        let candidates: Vec<(Move, u32)> = self
            .entries_for(position)
            .iter()
            .filter_map(|entry| Some((entry.to_move(position)?, u32::from(entry.weight))))
            .collect();
        let total: u32 = candidates.iter().map(|(_, weight)| weight).sum();
        if total == 0 {
            return None;
        }
        let mut pick = rng.gen_range(0..total);
        for (m, weight) in candidates {
            if pick < weight {
                return Some(m);
            }
            pick -= weight;
        }
        None
    }
}

pub fn book_status_line(path: Option<&Path>, chance: f64) -> String {
    match path {
        Some(path) if path.is_file() => {
            format!("Opening book: {} ({}%)", path.display(), (chance * 100.0).round() as u32)
        }
        _ => "Opening book: none".to_string(),
    }
}
