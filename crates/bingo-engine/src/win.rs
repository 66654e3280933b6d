//! Bingo line detection.

use bingo_core::types::{Card, LineKind, WinningLine, GRID_SIZE};

/// Every line in scan priority order: rows top to bottom, columns left to
/// right, then the main diagonal and the anti-diagonal.
pub fn lines() -> impl Iterator<Item = LineKind> {
    (0..GRID_SIZE)
        .map(LineKind::Row)
        .chain((0..GRID_SIZE).map(LineKind::Column))
        .chain([LineKind::Diagonal, LineKind::AntiDiagonal])
}

/// First completed line under the fixed priority order, if any.
///
/// Rescans the whole card on every call. The free space is always filled,
/// so lines through the centre need only their other four squares.
pub fn check(card: &Card) -> Option<WinningLine> {
    lines()
        .find(|kind| {
            kind.cells()
                .iter()
                .all(|&(r, c)| card.squares[r][c].is_filled)
        })
        .map(WinningLine::new)
}
