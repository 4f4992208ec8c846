// Removal of the footer row the stat export appends after the last game.

use moneyball_core::config::TrailerPolicy;

use crate::identity::PLAYER_FIELD;
use crate::table::StatRow;

/// Drop the last row unconditionally. Zero or one rows leave nothing.
pub fn filter_trailer<T>(mut rows: Vec<T>) -> Vec<T> {
    rows.pop();
    rows
}

/// Whether a row reads like an export footer rather than a game: every
/// value blank, or a `Player` column with no name in it.
pub fn looks_like_trailer(row: &StatRow) -> bool {
    row.is_blank() || row.get(PLAYER_FIELD).is_some_and(str::is_empty)
}

/// Apply the configured trailer policy to a file's parsed rows.
pub fn apply_trailer_policy(mut rows: Vec<StatRow>, policy: TrailerPolicy) -> Vec<StatRow> {
    match policy {
        TrailerPolicy::Positional => filter_trailer(rows),
        TrailerPolicy::Detect => {
            if rows.last().is_some_and(looks_like_trailer) {
                rows.pop();
            }
            rows
        }
    }
}
