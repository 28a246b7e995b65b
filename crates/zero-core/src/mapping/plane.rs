//! Board-state encoder (spec §4.1): turns a node plus its history window
//! into a dense `[14·H + 6, 8, 8]` tensor of 0/1 values. Ported from the
//! teacher's `alpha-zero/src/mapping/chess.rs` `ChessStdMapper::append_board_to`,
//! generalized from "current position only" to an `H`-deep history window
//! and restructured to take the traversed-history slice explicitly rather
//! than reading it off a single board's repetition counter.

use chess::{Color, Piece, Rank, Square, ALL_FILES, ALL_PIECES, ALL_RANKS};

use crate::board::Position;

const ALL_RANKS_REV: [Rank; 8] = [
    Rank::Eighth,
    Rank::Seventh,
    Rank::Sixth,
    Rank::Fifth,
    Rank::Fourth,
    Rank::Third,
    Rank::Second,
    Rank::First,
];

const PLANES_PER_SLICE: usize = 14;
const TAIL_PLANES: usize = 6;

pub fn tensor_planes(history_window: usize) -> usize {
    PLANES_PER_SLICE * history_window + TAIL_PLANES
}

/// Encodes `current` plus up to `history_window - 1` of its own preceding
/// positions (`history`, oldest first, as tracked by `Tree::traversed_history`
/// plus any in-tree ancestors) into a flat `[14·H + 6, 8, 8]` tensor, newest
/// slice first. Slices beyond what `history` actually has are zero-filled
/// (spec §4.1, "early game").
pub fn encode(current: &Position, history: &[Position], history_window: usize) -> Vec<f32> {
    assert!(history_window >= 1, "history window must be at least one slice");

    let mut out = Vec::with_capacity(tensor_planes(history_window) * 64);

    let mut slice = Some(current.clone());
    let mut remaining_history = history.iter().rev();

    for _ in 0..history_window {
        match &slice {
            Some(position) => append_time_slice(&mut out, position),
            None => out.extend(std::iter::repeat(0.0f32).take(PLANES_PER_SLICE * 64)),
        }
        slice = remaining_history.next().cloned();
    }

    append_tail_planes(&mut out, current);

    debug_assert_eq!(out.len(), tensor_planes(history_window) * 64);
    out
}

/// One time slice: 12 piece-occupancy planes (own then opponent, each
/// `{P,N,B,R,Q,K}`) followed by 2 repetition planes, all from `position`'s
/// own side-to-move's perspective (mirrored vertically when Black is to
/// move, spec §4.1).
fn append_time_slice(out: &mut Vec<f32>, position: &Position) {
    let pov = position.side_to_move();
    let pov_colors = [pov, !pov];
    let pov_ranks = if pov == Color::White { &ALL_RANKS } else { &ALL_RANKS_REV };

    for &color in &pov_colors {
        for piece in ALL_PIECES {
            for &rank in pov_ranks {
                for file in ALL_FILES {
                    let square = Square::make_square(rank, file);
                    let value = position.piece_at(square) == Some(piece) && color_at(position, square) == Some(color);
                    out.push(value as u8 as f32);
                }
            }
        }
    }

    let repetitions = position.repetitions();
    out.extend(std::iter::repeat((repetitions & 1) as f32).take(64));
    out.extend(std::iter::repeat(((repetitions >> 1) & 1) as f32).take(64));
}

fn color_at(position: &Position, square: Square) -> Option<Color> {
    for &piece in &ALL_PIECES {
        for &color in &[Color::White, Color::Black] {
            if position.piece_bitboard(piece, color) & (1u64 << square.to_index()) != 0 {
                return Some(color);
            }
        }
    }
    None
}

/// Side-to-move plane, four castling-rights planes, and the en-passant-file
/// plane (spec §4.1). All from `current`'s own perspective.
fn append_tail_planes(out: &mut Vec<f32>, current: &Position) {
    out.extend(std::iter::repeat((current.side_to_move() == Color::Black) as u8 as f32).take(64));

    let rights = current.castling_rights();
    for has_right in [rights.own_king_side, rights.own_queen_side, rights.opp_king_side, rights.opp_queen_side] {
        out.extend(std::iter::repeat(has_right as u8 as f32).take(64));
    }

    let pov = current.side_to_move();
    let pov_ranks = if pov == Color::White { &ALL_RANKS } else { &ALL_RANKS_REV };
    let ep_file = current.en_passant_square().map(|sq| pov_square(pov, sq).get_file());
    for &rank in pov_ranks {
        for file in ALL_FILES {
            out.push((Some(file) == ep_file) as u8 as f32);
        }
    }
}

fn pov_square(pov: Color, sq: Square) -> Square {
    match pov {
        Color::White => sq,
        Color::Black => Square::make_square(Rank::from_index(7 - sq.get_rank().to_index()), sq.get_file()),
    }
}
