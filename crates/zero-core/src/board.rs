//! Thin board adapter (spec §2.1): exposes exactly the rule-engine
//! operations the search core needs, backed by the `board-game` crate's
//! `ChessBoard` (which itself wraps the `chess` crate). Move generation,
//! make/unmake, game-over detection and Zobrist hashing are the rule
//! engine's job, not ours — we only translate its API into the shape the
//! tree and the encoder expect.

use std::fmt;

use board_game::board::Board as BgBoard;
use board_game::games::chess::ChessBoard;
use chess::{ChessMove, Color, File, Piece, Rank, Square};

/// A chess position plus the bookkeeping (repetition count, move counters)
/// that `board-game`'s `ChessBoard` already tracks for us.
#[derive(Clone)]
pub struct Position {
    inner: ChessBoard,
}

/// Outcome of [`Position::terminal`]. Chess is strictly alternating with no
/// "you just won on your own turn" state, so the only terminal states
/// reachable before the side to move acts are a draw or their own loss.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Terminal {
    Ongoing,
    Draw,
    LossForSideToMove,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CastlingRights {
    pub own_king_side: bool,
    pub own_queen_side: bool,
    pub opp_king_side: bool,
    pub opp_queen_side: bool,
}

/// A legal (or at least rule-engine-accepted) chess move, with the
/// capture/pawn-move classification baked in at construction time since
/// that's a property of the position it was generated from.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct Move {
    mv: ChessMove,
    is_capture: bool,
    is_pawn_move: bool,
}

impl Move {
    pub fn from_square(&self) -> Square {
        self.mv.get_source()
    }

    pub fn to_square(&self) -> Square {
        self.mv.get_dest()
    }

    pub fn promotion_piece(&self) -> Option<Piece> {
        self.mv.get_promotion()
    }

    pub fn is_capture(&self) -> bool {
        self.is_capture
    }

    pub fn is_pawn_move(&self) -> bool {
        self.is_pawn_move
    }

    pub fn to_uci(&self) -> String {
        self.mv.to_string()
    }

    /// Renders this move as SAN in the position it was played from.
    pub fn to_san(&self, before: &Position) -> String {
        let inner = before.inner.inner();
        let piece = inner
            .piece_on(self.mv.get_source())
            .expect("move source must hold a piece");
        let dest = self.mv.get_dest();

        let castle_delta =
            self.mv.get_source().get_file().to_index() as i8 - dest.get_file().to_index() as i8;
        if piece == Piece::King && castle_delta.abs() == 2 {
            return if castle_delta < 0 { "O-O".to_string() } else { "O-O-O".to_string() };
        }

        let mut s = String::new();

        if piece != Piece::Pawn {
            s.push(piece_letter(piece));

            let others: Vec<Move> = before
                .legal_moves()
                .into_iter()
                .filter(|m| {
                    m.mv.get_dest() == dest
                        && m.mv != self.mv
                        && inner.piece_on(m.mv.get_source()) == Some(piece)
                })
                .collect();

            if !others.is_empty() {
                let same_file = others
                    .iter()
                    .any(|m| m.mv.get_source().get_file() == self.mv.get_source().get_file());
                let same_rank = others
                    .iter()
                    .any(|m| m.mv.get_source().get_rank() == self.mv.get_source().get_rank());

                if !same_file {
                    s.push(file_char(self.mv.get_source().get_file()));
                } else if !same_rank {
                    s.push(rank_char(self.mv.get_source().get_rank()));
                } else {
                    s.push(file_char(self.mv.get_source().get_file()));
                    s.push(rank_char(self.mv.get_source().get_rank()));
                }
            }
        } else if self.is_capture {
            s.push(file_char(self.mv.get_source().get_file()));
        }

        if self.is_capture {
            s.push('x');
        }
        s.push(file_char(dest.get_file()));
        s.push(rank_char(dest.get_rank()));

        if let Some(promo) = self.mv.get_promotion() {
            s.push('=');
            s.push(piece_letter(promo));
        }

        let mut after = before.clone();
        after.make_move(*self);
        match after.terminal() {
            Terminal::LossForSideToMove => s.push('#'),
            _ if after.in_check() => s.push('+'),
            _ => {}
        }

        s
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uci())
    }
}

fn piece_letter(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'P',
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
    }
}

fn file_char(file: File) -> char {
    (b'a' + file.to_index() as u8) as char
}

fn rank_char(rank: Rank) -> char {
    (b'1' + rank.to_index() as u8) as char
}

impl Position {
    pub fn start() -> Self {
        Position { inner: ChessBoard::default() }
    }

    pub fn from_board_game(inner: ChessBoard) -> Self {
        Position { inner }
    }

    pub fn inner(&self) -> &ChessBoard {
        &self.inner
    }

    /// All legal moves from this position, classified (capture / pawn-move)
    /// as they're generated.
    pub fn legal_moves(&self) -> Vec<Move> {
        let inner = self.inner.inner();
        let mut moves = Vec::new();
        self.inner.available_moves().for_each(|mv| {
            let is_pawn_move = inner.piece_on(mv.get_source()) == Some(Piece::Pawn);
            let is_capture = inner.piece_on(mv.get_dest()).is_some()
                || (is_pawn_move && inner.en_passant() == Some(mv.get_dest()));
            moves.push(Move { mv, is_capture, is_pawn_move });
        });
        moves
    }

    pub fn make_move(&mut self, mv: Move) {
        self.inner.play(mv.mv);
    }

    /// 64-bit Zobrist hash, stable across clones (spec §3).
    pub fn hash(&self) -> u64 {
        self.inner.inner().get_hash()
    }

    pub fn side_to_move(&self) -> Color {
        self.inner.inner().side_to_move()
    }

    pub fn terminal(&self) -> Terminal {
        match self.inner.outcome() {
            None => Terminal::Ongoing,
            Some(outcome) if outcome.is_draw() => Terminal::Draw,
            Some(_) => Terminal::LossForSideToMove,
        }
    }

    pub fn in_check(&self) -> bool {
        self.inner.inner().checkers().popcnt() > 0
    }

    pub fn castling_rights(&self) -> CastlingRights {
        let color = self.side_to_move();
        let own = self.inner.inner().castle_rights(color);
        let opp = self.inner.inner().castle_rights(!color);
        CastlingRights {
            own_king_side: own.has_kingside(),
            own_queen_side: own.has_queenside(),
            opp_king_side: opp.has_kingside(),
            opp_queen_side: opp.has_queenside(),
        }
    }

    pub fn en_passant_square(&self) -> Option<Square> {
        self.inner.inner().en_passant()
    }

    /// Occupancy bitboard (as 64 bools, a8..h1 order is caller's choice) for
    /// one piece type and color.
    pub fn piece_bitboard(&self, piece: Piece, color: Color) -> u64 {
        let pieces = *self.inner.inner().pieces(piece);
        let colored = *self.inner.inner().color_combined(color);
        (pieces & colored).0
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.inner.inner().piece_on(sq)
    }

    /// Whether this is a 1-fold-or-greater repetition of a prior position,
    /// as tracked by `board-game`'s repetition counter — used directly by
    /// the plane encoder's repetition planes (spec §4.1).
    pub fn repetitions(&self) -> u8 {
        self.inner.repetitions
    }

    pub fn parse_san(&self, san: &str) -> Option<Move> {
        let cleaned = san.trim_end_matches(['+', '#']);
        self.legal_moves()
            .into_iter()
            .find(|m| m.to_san(self).trim_end_matches(['+', '#']) == cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_position_has_twenty_legal_moves() {
        let pos = Position::start();
        assert_eq!(pos.legal_moves().len(), 20);
        assert_eq!(pos.terminal(), Terminal::Ongoing);
    }

    #[test]
    fn hash_changes_after_move() {
        let mut pos = Position::start();
        let h0 = pos.hash();
        let mv = pos.legal_moves()[0];
        pos.make_move(mv);
        assert_ne!(h0, pos.hash());
    }

    #[test]
    fn opening_move_is_not_capture() {
        let pos = Position::start();
        assert!(pos.legal_moves().iter().all(|m| !m.is_capture()));
    }
}
