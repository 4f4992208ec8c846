// Comma-split table parsing for per-game stat exports.
//
// The exports are plain comma-separated lines: no quoting, no escapes, no
// embedded newlines. The first line holds the column headers, some of which
// may be blank.

use std::collections::BTreeMap;

use moneyball_core::store::Document;
use serde_json::Value;

/// Field separator of the export format.
pub const DELIMITER: u8 = b',';

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One data line zipped against the file's headers.
///
/// Rows built by the parser hold trimmed values. When two headers share a
/// name, the later column's value wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRow {
    fields: BTreeMap<String, String>,
    first_header: Option<String>,
}

impl StatRow {
    /// Build a row from `(field, value)` pairs in column order. Values are
    /// kept exactly as given.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut fields = BTreeMap::new();
        let mut first_header = None;
        for (k, v) in pairs {
            let k = k.into();
            if first_header.is_none() {
                first_header = Some(k.clone());
            }
            fields.insert(k, v.into());
        }
        Self {
            fields,
            first_header,
        }
    }

    /// Value of the named field, if the file has that column.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Value of whichever column comes first in the header line.
    pub fn first_value(&self) -> Option<&str> {
        self.first_header.as_deref().and_then(|h| self.get(h))
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when every value is empty.
    pub fn is_blank(&self) -> bool {
        self.fields.values().all(String::is_empty)
    }

    /// The row as a store document: every field stored as a string.
    pub fn to_document(&self) -> Document {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }
}

/// A parsed export: canonical headers plus every data row in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<StatRow>,
}

// ---------------------------------------------------------------------------
// Header normalizer / row parser
// ---------------------------------------------------------------------------

/// Canonical header list for the raw header fields of a file.
///
/// Blank headers become `{prefix}_{index}` with a zero-based column index,
/// so the output has one non-empty name per input field.
pub fn normalize_headers<'a, I>(raw: I, prefix: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    raw.into_iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.trim();
            if h.is_empty() {
                format!("{prefix}_{i}")
            } else {
                h.to_string()
            }
        })
        .collect()
}

/// Header list for a whole header line. A blank line (empty file) has no
/// headers at all.
pub fn normalize_header_line(line: &str, prefix: &str) -> Vec<String> {
    if line.trim().is_empty() {
        return Vec::new();
    }
    normalize_headers(line.split(DELIMITER as char), prefix)
}

/// Zip one line's values against `headers`. Missing trailing values become
/// empty strings; values past the last header are dropped.
pub fn parse_row<'a, I>(values: I, headers: &[String]) -> StatRow
where
    I: IntoIterator<Item = &'a str>,
{
    let mut values = values.into_iter();
    let fields = headers
        .iter()
        .map(|h| {
            let v = values.next().map(str::trim).unwrap_or_default();
            (h.clone(), v.to_string())
        })
        .collect();
    StatRow {
        fields,
        first_header: headers.first().cloned(),
    }
}

/// [`parse_row`] over a raw line.
pub fn parse_line(line: &str, headers: &[String]) -> StatRow {
    parse_row(line.split(DELIMITER as char), headers)
}

// ---------------------------------------------------------------------------
// Whole-file parsing
// ---------------------------------------------------------------------------

/// Parse a whole export into headers and rows.
///
/// Leading/trailing whitespace of the text (and a UTF-8 BOM) is ignored, and
/// blank lines anywhere (empty or whitespace-only) never turn into rows.
/// Quote characters are ordinary data.
pub fn parse_table(text: &str, prefix: &str) -> Result<Table, csv::Error> {
    let body = text.trim_start_matches('\u{feff}').trim();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(body.as_bytes());

    let mut records = reader.records();
    let headers = match records.next() {
        Some(record) => normalize_headers(record?.iter(), prefix),
        None => return Ok(Table::default()),
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        if is_blank_line(&record) {
            continue;
        }
        rows.push(parse_row(record.iter(), &headers));
    }

    Ok(Table { headers, rows })
}

/// A whitespace-only line. The reader already drops empty lines; these are
/// dropped the same way. A line of bare delimiters is still a row.
fn is_blank_line(record: &csv::StringRecord) -> bool {
    record.len() == 1 && record.iter().all(|v| v.trim().is_empty())
}
