use shakmaty::Move;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Exact,
    LowerBound,
    UpperBound,
}

#[derive(Debug, Clone)]
pub struct TranspositionEntry {
    pub depth: u32,
    pub score: i32,
    pub node_type: NodeType,
    pub best_move: Option<Move>,
}

/// Search results keyed by Zobrist hash, bounded in size.
pub struct TranspositionTable {
    table: HashMap<u64, TranspositionEntry>,
    size: usize,
}

impl TranspositionTable {
    pub fn new(size: usize) -> Self {
        Self {
            table: HashMap::with_capacity(size.min(1 << 16)),
            size,
        }
    }

    pub fn store(&mut self, hash: u64, entry: TranspositionEntry) {
        if self.table.len() >= self.size && !self.table.contains_key(&hash) {
            // Evict an arbitrary entry when full.
            if let Some(&victim) = self.table.keys().next() {
                self.table.remove(&victim);
            }
        }
        self.table.insert(hash, entry);
    }

    pub fn probe(&self, hash: u64, depth: u32, alpha: i32, beta: i32) -> Option<i32> {
        let entry = self.table.get(&hash)?;
        if entry.depth < depth {
            return None;
        }
        match entry.node_type {
            NodeType::Exact => Some(entry.score),
            NodeType::LowerBound if entry.score >= beta => Some(entry.score),
            NodeType::UpperBound if entry.score <= alpha => Some(entry.score),
            _ => None,
        }
    }

    pub fn best_move(&self, hash: u64) -> Option<&Move> {
        self.table.get(&hash).and_then(|entry| entry.best_move.as_ref())
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(depth: u32, score: i32, node_type: NodeType) -> TranspositionEntry {
        TranspositionEntry {
            depth,
            score,
            node_type,
            best_move: None,
        }
    }

    #[test]
    fn test_probe_respects_bounds() {
        let mut table = TranspositionTable::new(16);
        table.store(1, entry(3, 50, NodeType::Exact));
        table.store(2, entry(3, 80, NodeType::LowerBound));
        table.store(3, entry(3, -20, NodeType::UpperBound));

        assert_eq!(table.probe(1, 3, -100, 100), Some(50));
        assert_eq!(table.probe(1, 4, -100, 100), None);
        assert_eq!(table.probe(2, 2, 0, 60), Some(80));
        assert_eq!(table.probe(2, 2, 0, 100), None);
        assert_eq!(table.probe(3, 1, 0, 100), Some(-20));
        assert_eq!(table.probe(3, 1, -50, 100), None);
    }

    #[test]
    fn test_size_is_bounded() {
        let mut table = TranspositionTable::new(4);
        for hash in 0..10 {
            table.store(hash, entry(1, 0, NodeType::Exact));
        }
        assert_eq!(table.len(), 4);
        table.clear();
        assert!(table.is_empty());
    }
}
