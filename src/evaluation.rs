use shakmaty::{attacks, Bitboard, Board, Chess, Color, Piece, Position, Role, Square};

/// Static evaluation for the built-in engines.
///
/// Tables are written from white's point of view with rank 8 on the first row.
pub struct Evaluator {
    // Piece values
    pub pawn_value: i32,
    pub knight_value: i32,
    pub bishop_value: i32,
    pub rook_value: i32,
    pub queen_value: i32,
    pub king_value: i32,

    // Positional bonuses
    pub pawn_position_bonus: [[i32; 8]; 8],
    pub knight_position_bonus: [[i32; 8]; 8],
    pub bishop_position_bonus: [[i32; 8]; 8],
    pub rook_position_bonus: [[i32; 8]; 8],
    pub queen_position_bonus: [[i32; 8]; 8],
    pub king_position_bonus: [[i32; 8]; 8],
    pub king_endgame_position_bonus: [[i32; 8]; 8],

    // Mobility weights, per attacked square
    pub knight_mobility_weight: i32,
    pub bishop_mobility_weight: i32,
    pub rook_mobility_weight: i32,
    pub queen_mobility_weight: i32,

    // Pawn structure weights
    pub doubled_pawn_penalty: i32,
    pub isolated_pawn_penalty: i32,
    pub passed_pawn_bonus: i32,
    pub connected_pawn_bonus: i32,

    // King safety weights
    pub pawn_shield_bonus: i32,
    pub open_file_penalty: i32,
    pub semi_open_file_penalty: i32,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            pawn_value: 100,
            knight_value: 320,
            bishop_value: 330,
            rook_value: 500,
            queen_value: 900,
            king_value: 20000,

            // Central control and advancement
            pawn_position_bonus: [
                [0, 0, 0, 0, 0, 0, 0, 0],
                [50, 50, 50, 50, 50, 50, 50, 50],
                [10, 10, 20, 30, 30, 20, 10, 10],
                [5, 5, 10, 25, 25, 10, 5, 5],
                [0, 0, 0, 20, 20, 0, 0, 0],
                [5, -5, -10, 0, 0, -10, -5, 5],
                [5, 10, 10, -20, -20, 10, 10, 5],
                [0, 0, 0, 0, 0, 0, 0, 0],
            ],

            knight_position_bonus: [
                [-50, -40, -30, -30, -30, -30, -40, -50],
                [-40, -20, 0, 0, 0, 0, -20, -40],
                [-30, 0, 10, 15, 15, 10, 0, -30],
                [-30, 5, 15, 20, 20, 15, 5, -30],
                [-30, 0, 15, 20, 20, 15, 0, -30],
                [-30, 5, 10, 15, 15, 10, 5, -30],
                [-40, -20, 0, 5, 5, 0, -20, -40],
                [-50, -40, -30, -30, -30, -30, -40, -50],
            ],

            // Long diagonals
            bishop_position_bonus: [
                [-20, -10, -10, -10, -10, -10, -10, -20],
                [-10, 0, 0, 0, 0, 0, 0, -10],
                [-10, 0, 5, 10, 10, 5, 0, -10],
                [-10, 5, 5, 10, 10, 5, 5, -10],
                [-10, 0, 10, 10, 10, 10, 0, -10],
                [-10, 10, 10, 10, 10, 10, 10, -10],
                [-10, 5, 0, 0, 0, 0, 5, -10],
                [-20, -10, -10, -10, -10, -10, -10, -20],
            ],

            rook_position_bonus: [
                [0, 0, 0, 0, 0, 0, 0, 0],
                [5, 10, 10, 10, 10, 10, 10, 5],
                [-5, 0, 0, 0, 0, 0, 0, -5],
                [-5, 0, 0, 0, 0, 0, 0, -5],
                [-5, 0, 0, 0, 0, 0, 0, -5],
                [-5, 0, 0, 0, 0, 0, 0, -5],
                [-5, 0, 0, 0, 0, 0, 0, -5],
                [0, 0, 0, 5, 5, 0, 0, 0],
            ],

            queen_position_bonus: [
                [-20, -10, -10, -5, -5, -10, -10, -20],
                [-10, 0, 0, 0, 0, 0, 0, -10],
                [-10, 0, 5, 5, 5, 5, 0, -10],
                [-5, 0, 5, 5, 5, 5, 0, -5],
                [0, 0, 5, 5, 5, 5, 0, -5],
                [-10, 5, 5, 5, 5, 5, 0, -10],
                [-10, 0, 5, 0, 0, 0, 0, -10],
                [-20, -10, -10, -5, -5, -10, -10, -20],
            ],

            // Stay behind the pawns while pieces are on the board
            king_position_bonus: [
                [-30, -40, -40, -50, -50, -40, -40, -30],
                [-30, -40, -40, -50, -50, -40, -40, -30],
                [-30, -40, -40, -50, -50, -40, -40, -30],
                [-30, -40, -40, -50, -50, -40, -40, -30],
                [-20, -30, -30, -40, -40, -30, -30, -20],
                [-10, -20, -20, -20, -20, -20, -20, -10],
                [20, 20, 0, 0, 0, 0, 20, 20],
                [20, 30, 10, 0, 0, 10, 30, 20],
            ],

            // Centralize once the heavy pieces are gone
            king_endgame_position_bonus: [
                [-50, -40, -30, -20, -20, -30, -40, -50],
                [-30, -20, -10, 0, 0, -10, -20, -30],
                [-30, -10, 20, 30, 30, 20, -10, -30],
                [-30, -10, 30, 40, 40, 30, -10, -30],
                [-30, -10, 30, 40, 40, 30, -10, -30],
                [-30, -10, 20, 30, 30, 20, -10, -30],
                [-30, -30, 0, 0, 0, 0, -30, -30],
                [-50, -30, -30, -30, -30, -30, -30, -50],
            ],

            knight_mobility_weight: 2,
            bishop_mobility_weight: 3,
            rook_mobility_weight: 2,
            queen_mobility_weight: 1,

            doubled_pawn_penalty: -10,
            isolated_pawn_penalty: -20,
            passed_pawn_bonus: 20,
            connected_pawn_bonus: 10,

            pawn_shield_bonus: 5,
            open_file_penalty: -15,
            semi_open_file_penalty: -10,
        }
    }

    /// Score in centipawns from the point of view of the side to move.
    pub fn evaluate(&self, position: &Chess) -> i32 {
        let board = position.board();
        let score = self.evaluate_side(board, Color::White) - self.evaluate_side(board, Color::Black);
        match position.turn() {
            Color::White => score,
            Color::Black => -score,
        }
    }

    fn evaluate_side(&self, board: &Board, color: Color) -> i32 {
        let is_endgame = self.is_endgame(board);
        let mut score = 0;
        for square in board.by_color(color) {
            if let Some(piece) = board.piece_at(square) {
                score += self.piece_value(piece.role) + self.position_bonus(piece, square, is_endgame);
            }
        }
        score += self.evaluate_mobility(board, color);
        score += self.evaluate_pawn_structure(board, color);
        score += self.evaluate_king_safety(board, color);
        score
    }

    pub fn piece_value(&self, role: Role) -> i32 {
        match role {
            Role::Pawn => self.pawn_value,
            Role::Knight => self.knight_value,
            Role::Bishop => self.bishop_value,
            Role::Rook => self.rook_value,
            Role::Queen => self.queen_value,
            Role::King => self.king_value,
        }
    }

    fn position_bonus(&self, piece: Piece, square: Square, is_endgame: bool) -> i32 {
        let index = square as usize;
        let file = index % 8;
        let rank = index / 8;
        // Row 0 of every table is the far rank for the side owning the piece.
        let row = match piece.color {
            Color::White => 7 - rank,
            Color::Black => rank,
        };
        let table = match piece.role {
            Role::Pawn => &self.pawn_position_bonus,
            Role::Knight => &self.knight_position_bonus,
            Role::Bishop => &self.bishop_position_bonus,
            Role::Rook => &self.rook_position_bonus,
            Role::Queen => &self.queen_position_bonus,
            Role::King if is_endgame => &self.king_endgame_position_bonus,
            Role::King => &self.king_position_bonus,
        };
        table[row][file]
    }

    fn is_endgame(&self, board: &Board) -> bool {
        (board.queens() | board.rooks()).count() <= 2
    }

    fn evaluate_mobility(&self, board: &Board, color: Color) -> i32 {
        let own = board.by_color(color);
        let occupied = board.occupied();
        let mut score = 0;
        for square in own {
            let Some(piece) = board.piece_at(square) else {
                continue;
            };
            let weight = match piece.role {
                Role::Knight => self.knight_mobility_weight,
                Role::Bishop => self.bishop_mobility_weight,
                Role::Rook => self.rook_mobility_weight,
                Role::Queen => self.queen_mobility_weight,
                Role::Pawn | Role::King => continue,
            };
            let reachable = attacks::attacks(square, piece, occupied) & !own;
            score += weight * reachable.count() as i32;
        }
        score
    }

    fn evaluate_pawn_structure(&self, board: &Board, color: Color) -> i32 {
        let own = pawn_files(board.pawns() & board.by_color(color));
        let theirs = pawn_files(board.pawns() & board.by_color(!color));
        let mut score = 0;

        for file in 0..8 {
            let count = own[file];
            if count == 0 {
                continue;
            }
            if count > 1 {
                score += self.doubled_pawn_penalty * (count - 1);
            }
            let left = file.checked_sub(1).map_or(0, |f| own[f]);
            let right = if file < 7 { own[file + 1] } else { 0 };
            if left == 0 && right == 0 {
                score += self.isolated_pawn_penalty;
            }
            let their_left = file.checked_sub(1).map_or(0, |f| theirs[f]);
            let their_right = if file < 7 { theirs[file + 1] } else { 0 };
            if theirs[file] == 0 && their_left == 0 && their_right == 0 {
                score += self.passed_pawn_bonus;
            }
            if right > 0 {
                score += self.connected_pawn_bonus;
            }
        }
        score
    }

    fn evaluate_king_safety(&self, board: &Board, color: Color) -> i32 {
        let Some(king) = board.king_of(color) else {
            return 0;
        };
        let index = king as usize;
        let (rank, file) = ((index / 8) as i32, (index % 8) as i32);
        let own_pawns = board.pawns() & board.by_color(color);
        let their_pawns = board.pawns() & board.by_color(!color);
        let mut score = 0;

        let shield_rank = match color {
            Color::White => rank + 1,
            Color::Black => rank - 1,
        };
        if (0..8).contains(&shield_rank) {
            for shield_file in (file - 1)..=(file + 1) {
                if (0..8).contains(&shield_file) {
                    let square = Square::new((shield_rank * 8 + shield_file) as u32);
                    if own_pawns.contains(square) {
                        score += self.pawn_shield_bonus;
                    }
                }
            }
        }

        let own_on_file = pawn_files(own_pawns)[file as usize] > 0;
        let theirs_on_file = pawn_files(their_pawns)[file as usize] > 0;
        if !own_on_file && !theirs_on_file {
            score += self.open_file_penalty;
        } else if !own_on_file {
            score += self.semi_open_file_penalty;
        }
        score
    }
}

fn pawn_files(pawns: Bitboard) -> [i32; 8] {
    let mut files = [0; 8];
    for square in pawns {
        files[square as usize % 8] += 1;
    }
    files
}
