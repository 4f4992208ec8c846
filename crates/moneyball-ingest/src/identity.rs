// Document keys and player facts derived from a parsed stat row.

use std::path::Path;

use moneyball_core::store::Document;
use serde_json::Value;

use crate::table::StatRow;

/// Column holding the player's full display name.
pub const PLAYER_FIELD: &str = "Player";

/// Columns searched, in order, for the game date.
pub const DATE_FIELDS: [&str; 2] = ["Date", "date"];

/// Extension stripped from an ingested file's name to form its source name.
pub const SOURCE_EXTENSION: &str = ".csv";

/// The file's base name without directories or the `.csv` suffix.
pub fn source_name(file_name: &str) -> &str {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);
    base.strip_suffix(SOURCE_EXTENSION).unwrap_or(base)
}

/// The row's game date: the first non-blank of `Date`, `date`, then the
/// first column. Trimmed, so padding never changes a key.
pub fn resolve_date(row: &StatRow) -> Option<&str> {
    DATE_FIELDS
        .iter()
        .filter_map(|f| row.get(f))
        .chain(row.first_value())
        .map(str::trim)
        .find(|v| !v.is_empty())
}

/// Key of a game-stat document: `{source name}_{date}`. `None` when the
/// row carries no date at all.
pub fn derive_game_stat_key(file_name: &str, row: &StatRow) -> Option<String> {
    let date = resolve_date(row)?;
    Some(format!("{}_{}", source_name(file_name), date))
}

/// Key of a player document: the lowercased name with each whitespace run
/// collapsed to one underscore and no leading or trailing separator.
pub fn derive_player_key(full_name: &str) -> String {
    full_name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// First/last name split of a player's full name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerFacts {
    pub first_name: String,
    pub last_name: String,
}

impl PlayerFacts {
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("first_name".into(), Value::String(self.first_name.clone()));
        doc.insert("last_name".into(), Value::String(self.last_name.clone()));
        doc
    }
}

/// Split a full name on whitespace: the first token is the first name, the
/// rest (single-space joined) the last name. `None` for a blank name.
pub fn extract_player_facts(full_name: &str) -> Option<PlayerFacts> {
    let mut tokens = full_name.split_whitespace();
    let first_name = tokens.next()?.to_string();
    let last_name = tokens.collect::<Vec<_>>().join(" ");
    Some(PlayerFacts {
        first_name,
        last_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::parse_line;

    fn row(header_line: &str, line: &str) -> StatRow {
        let headers: Vec<String> = header_line.split(',').map(String::from).collect();
        parse_line(line, &headers)
    }

    // -- Game-stat keys --

    #[test]
    fn game_stat_key_uses_source_name_and_date() {
        let r = row("Date,Player,H", "2024-05-01,Shohei Ohtani,2");
        assert_eq!(
            derive_game_stat_key("ohtani.csv", &r).as_deref(),
            Some("ohtani_2024-05-01")
        );
    }

    #[test]
    fn game_stat_key_is_deterministic() {
        let r = row("Date,Player,H", "2024-05-01,Shohei Ohtani,2");
        let a = derive_game_stat_key("ohtani.csv", &r);
        let b = derive_game_stat_key("ohtani.csv", &r.clone());
        assert_eq!(a, b);
    }

    #[test]
    fn lowercase_date_column_is_used() {
        let r = row("Rk,date,H", "1,2024-06-10,0");
        assert_eq!(
            derive_game_stat_key("trout.csv", &r).as_deref(),
            Some("trout_2024-06-10")
        );
    }

    #[test]
    fn falls_back_to_first_column() {
        let r = row("Gtm,Opp,H", "12,SEA,3");
        assert_eq!(derive_game_stat_key("judge.csv", &r).as_deref(), Some("judge_12"));
    }

    #[test]
    fn blank_date_falls_through_to_next_source() {
        let r = row("Rk,Date,date", "5,,2024-07-04");
        assert_eq!(
            derive_game_stat_key("x.csv", &r).as_deref(),
            Some("x_2024-07-04")
        );
    }

    #[test]
    fn trailing_space_in_date_does_not_change_key() {
        let padded = StatRow::from_pairs([("Date", "2024-05-01 "), ("Player", "Shohei Ohtani")]);
        let clean = StatRow::from_pairs([("Date", "2024-05-01"), ("Player", "Shohei Ohtani")]);
        assert_eq!(
            derive_game_stat_key("ohtani.csv", &padded).as_deref(),
            Some("ohtani_2024-05-01")
        );
        assert_eq!(
            derive_game_stat_key("ohtani.csv", &padded),
            derive_game_stat_key("ohtani.csv", &clean)
        );
    }

    #[test]
    fn no_date_anywhere_yields_no_key() {
        let r = row("Date,Player", ",Shohei Ohtani");
        assert!(derive_game_stat_key("ohtani.csv", &r).is_none());
    }

    #[test]
    fn source_name_strips_directories_and_extension() {
        assert_eq!(source_name("ohtani.csv"), "ohtani");
        assert_eq!(source_name("uploads/2024/ohtani.csv"), "ohtani");
        assert_eq!(source_name("ohtani"), "ohtani");
        assert_eq!(source_name("ohtani.csv.bak"), "ohtani.csv.bak");
    }

    // -- Player keys --

    #[test]
    fn player_key_examples() {
        assert_eq!(derive_player_key("Shohei Ohtani"), "shohei_ohtani");
        assert_eq!(derive_player_key("  Mike   Trout "), "mike_trout");
        assert_eq!(derive_player_key("Ronald Acuña Jr."), "ronald_acuña_jr.");
        assert_eq!(derive_player_key("Ichiro\tSuzuki"), "ichiro_suzuki");
    }

    #[test]
    fn player_key_is_stable_across_spacing_variants() {
        let variants = ["Mike Trout", " Mike Trout", "Mike  Trout", "MIKE TROUT\n"];
        for v in variants {
            assert_eq!(derive_player_key(v), "mike_trout", "variant {v:?}");
        }
    }

    // -- Player facts --

    #[test]
    fn facts_split_first_and_last() {
        assert_eq!(
            extract_player_facts("Shohei Ohtani"),
            Some(PlayerFacts {
                first_name: "Shohei".into(),
                last_name: "Ohtani".into()
            })
        );
    }

    #[test]
    fn single_token_name_has_empty_last_name() {
        assert_eq!(
            extract_player_facts("Ichiro"),
            Some(PlayerFacts {
                first_name: "Ichiro".into(),
                last_name: String::new()
            })
        );
    }

    #[test]
    fn multi_token_last_name_is_single_spaced() {
        let facts = extract_player_facts("Vladimir  Guerrero   Jr.").unwrap();
        assert_eq!(facts.first_name, "Vladimir");
        assert_eq!(facts.last_name, "Guerrero Jr.");
    }

    #[test]
    fn blank_name_has_no_facts() {
        assert!(extract_player_facts("").is_none());
        assert!(extract_player_facts("   ").is_none());
    }

    #[test]
    fn facts_document_has_both_fields() {
        let doc = extract_player_facts("Shohei Ohtani").unwrap().to_document();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc["first_name"], Value::String("Shohei".into()));
        assert_eq!(doc["last_name"], Value::String("Ohtani".into()));
    }
}
