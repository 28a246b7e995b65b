//! Bijection between legal chess moves and flat indices in a `73·8·8`
//! policy tensor (spec §4.2). The classification scheme — queen
//! directions/distances, knight hops, underpromotions — is ported from the
//! teacher's `alpha-zero/src/mapping/chess.rs` `ClassifiedPovMove`; we keep
//! the geometric classify/reconstruct approach rather than the spec's
//! literal precomputed lookup table, since both describe the same
//! bijection and the geometric version needs no static table to build or
//! validate (see DESIGN.md).

use chess::{Color, Piece, Rank, Square};

use crate::board::{Move, Position};

const QUEEN_DIRECTION_COUNT: usize = 8;
const QUEEN_DISTANCE_COUNT: usize = 7;
const KNIGHT_DIRECTION_COUNT: usize = 8;
const UNDERPROMOTION_DIRECTION_COUNT: usize = 3;
const UNDERPROMOTION_PIECE_COUNT: usize = 3;

const QUEEN_CHANNELS: usize = QUEEN_DIRECTION_COUNT * QUEEN_DISTANCE_COUNT;
const KNIGHT_CHANNELS: usize = KNIGHT_DIRECTION_COUNT;
const UNDERPROMOTION_CHANNELS: usize = UNDERPROMOTION_DIRECTION_COUNT * UNDERPROMOTION_PIECE_COUNT;

/// Total planes in the policy tensor (spec §4.2: "73×8×8").
pub const POLICY_PLANES: usize = QUEEN_CHANNELS + KNIGHT_CHANNELS + UNDERPROMOTION_CHANNELS;
pub const POLICY_SIZE: usize = POLICY_PLANES * 8 * 8;

// Clockwise from due north, matching the teacher's convention exactly.
const QUEEN_DIRECTIONS: [(isize, isize); QUEEN_DIRECTION_COUNT] =
    [(1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0), (-1, -1), (0, -1), (1, -1)];

// Clockwise from NNE.
const KNIGHT_DELTAS: [(isize, isize); KNIGHT_DIRECTION_COUNT] =
    [(2, 1), (1, 2), (-1, 2), (-2, 1), (-2, -1), (-1, -2), (1, -2), (2, -1)];

// Queen is deliberately absent: a queen promotion is just a one-step slide
// onto the back rank and uses the ordinary queen planes (spec §4.2).
const UNDERPROMOTION_PIECES: [Piece; UNDERPROMOTION_PIECE_COUNT] = [Piece::Rook, Piece::Bishop, Piece::Knight];

#[derive(Debug, Copy, Clone)]
enum ClassifiedPovMove {
    Queen { direction: usize, distance_m1: usize },
    Knight { direction: usize },
    UnderPromotion { direction: usize, piece: usize },
}

impl ClassifiedPovMove {
    fn to_channel(self) -> usize {
        match self {
            ClassifiedPovMove::Queen { direction, distance_m1 } => direction * QUEEN_DISTANCE_COUNT + distance_m1,
            ClassifiedPovMove::Knight { direction } => QUEEN_CHANNELS + direction,
            ClassifiedPovMove::UnderPromotion { direction, piece } => {
                QUEEN_CHANNELS + KNIGHT_CHANNELS + direction * UNDERPROMOTION_PIECE_COUNT + piece
            }
        }
    }

    /// Classify a move already viewed from its own side-to-move's POV
    /// (i.e. squares already mirrored if Black is moving).
    fn from_pov_move(from: Square, to: Square, promotion: Option<Piece>) -> Self {
        let rank_delta = to.get_rank().to_index() as isize - from.get_rank().to_index() as isize;
        let file_delta = to.get_file().to_index() as isize - from.get_file().to_index() as isize;

        if let Some(piece) = promotion {
            if let Some(piece_idx) = UNDERPROMOTION_PIECES.iter().position(|&p| p == piece) {
                let direction = (file_delta.signum() + 1) as usize;
                return ClassifiedPovMove::UnderPromotion { direction, piece: piece_idx };
            }
        }

        if let Some(direction) = QUEEN_DIRECTIONS.iter().position(|&d| d == (rank_delta.signum(), file_delta.signum())) {
            let distance = rank_delta.abs().max(file_delta.abs());
            let (rank_dir, file_dir) = QUEEN_DIRECTIONS[direction];
            if rank_delta == rank_dir * distance && file_delta == file_dir * distance {
                return ClassifiedPovMove::Queen { direction, distance_m1: (distance - 1) as usize };
            }
        }

        if let Some(direction) = KNIGHT_DELTAS.iter().position(|&d| d == (rank_delta, file_delta)) {
            return ClassifiedPovMove::Knight { direction };
        }

        unreachable!("every legal chess move is a queen-line, knight-hop, or underpromotion move");
    }
}

/// Mirrors a square vertically when Black is to move, so the encoding is
/// always from the mover's own perspective (spec §4.1, §4.2).
fn square_pov(color: Color, sq: Square) -> Square {
    match color {
        Color::White => sq,
        Color::Black => Square::make_square(Rank::from_index(7 - sq.get_rank().to_index()), sq.get_file()),
    }
}

fn flat_index_for_move(color: Color, mv: Move) -> usize {
    let from_pov = square_pov(color, mv.from_square());
    let to_pov = square_pov(color, mv.to_square());
    let channel = ClassifiedPovMove::from_pov_move(from_pov, to_pov, mv.promotion_piece()).to_channel();
    channel * 64 + from_pov.to_index()
}

/// **move_map_to_policy** (spec §4.2): dense `[73·8·8]` vector, zero
/// everywhere except the flat indices of the moves in `priors`.
pub fn move_map_to_policy(priors: &[(Move, f32)], color: Color) -> Vec<f32> {
    let mut policy = vec![0.0f32; POLICY_SIZE];
    for &(mv, p) in priors {
        policy[flat_index_for_move(color, mv)] = p;
    }
    policy
}

/// **policy_to_move_map** (spec §4.2): for every legal move in `position`,
/// look up its raw logit in `policy`, then apply a numerically-stable
/// softmax across exactly those logits so the returned priors sum to 1.
pub fn policy_to_move_map(policy: &[f32], position: &Position) -> Vec<(Move, f32)> {
    let color = position.side_to_move();
    let legal_moves = position.legal_moves();

    let logits: Vec<f32> = legal_moves.iter().map(|&mv| policy[flat_index_for_move(color, mv)]).collect();
    let max_logit = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let exps: Vec<f32> = logits.iter().map(|&l| (l - max_logit).exp()).collect();
    let sum: f32 = exps.iter().sum();

    legal_moves
        .into_iter()
        .zip(exps)
        .map(|(mv, e)| (mv, if sum > 0.0 { e / sum } else { 0.0 }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_round_trips_through_softmax() {
        let position = Position::start();
        let moves = position.legal_moves();
        let uniform: Vec<(Move, f32)> = moves.iter().map(|&m| (m, 1.0)).collect();

        let dense = move_map_to_policy(&uniform, position.side_to_move());
        let recovered = policy_to_move_map(&dense, &position);

        let sum: f32 = recovered.iter().map(|(_, p)| p).sum();
        assert!((sum - 1.0).abs() < 1e-4, "softmax priors should sum to 1, got {sum}");
        assert_eq!(recovered.len(), moves.len());
    }

    #[test]
    fn every_legal_move_maps_to_a_distinct_flat_index() {
        let position = Position::start();
        let moves = position.legal_moves();
        let mut indices: Vec<usize> =
            moves.iter().map(|&m| flat_index_for_move(position.side_to_move(), m)).collect();
        indices.sort_unstable();
        let before = indices.len();
        indices.dedup();
        assert_eq!(indices.len(), before, "two distinct legal moves collided on the same policy index");
    }

    #[test]
    fn promotion_moves_classify_as_underpromotion_or_fall_through_to_queen_plane() {
        let board: board_game::games::chess::ChessBoard = "8/P7/8/8/8/8/8/k6K w - - 0 1".parse().unwrap();
        let position = Position::from_board_game(board);
        for mv in position.legal_moves() {
            let _ = flat_index_for_move(position.side_to_move(), mv);
        }
    }
}
