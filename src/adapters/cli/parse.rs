//! Two-stage parsing of vendor tool output
//!
//! Vendor management tools print loosely structured text that varies across
//! firmware revisions: fields reorder, optional sections come and go, extra
//! fields appear. Parsing is therefore split in two stages. The first stage
//! tolerantly extracts blank-line separated blocks into ordered named-field
//! records, ignoring anything it does not recognize. The second stage
//! strictly projects required fields into typed entities and fails loud,
//! naming the missing field and the raw block it was expected in.

use crate::error::{Error, Result};
use indexmap::IndexMap;

// =============================================================================
// Raw Records
// =============================================================================

/// One named-field block extracted from tool output
///
/// Keys are normalized (lowercased, spaces and dashes folded to
/// underscores), so `Free Capacity`, `free-capacity` and `FREE_CAPACITY`
/// all address the same field. The original block text is kept for error
/// snippets.
#[derive(Debug, Clone)]
pub struct RawRecord {
    fields: IndexMap<String, String>,
    raw: String,
}

impl RawRecord {
    /// Look up a field by any of the given aliases, first match wins
    pub fn get(&self, aliases: &[&str]) -> Option<&str> {
        aliases
            .iter()
            .find_map(|name| self.fields.get(&normalize_key(name)))
            .map(|s| s.as_str())
    }

    /// Require a field, naming the primary alias in the error
    pub fn require(&self, aliases: &[&str]) -> Result<&str> {
        self.get(aliases)
            .ok_or_else(|| Error::missing_field(aliases[0], &self.raw))
    }

    /// Require a field and parse it as a byte count
    pub fn require_u64(&self, aliases: &[&str]) -> Result<u64> {
        let text = self.require(aliases)?;
        text.trim().parse::<u64>().map_err(|_| Error::Parse {
            field: aliases[0].to_string(),
            snippet: format!("'{}' is not a byte count in: {}", text, self.raw.trim()),
        })
    }

    /// Raw block text, for diagnostics
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[cfg(test)]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut fields = IndexMap::new();
        let mut raw = String::new();
        for (k, v) in pairs {
            fields.insert(normalize_key(k), v.to_string());
            raw.push_str(&format!("{}: {}\n", k, v));
        }
        Self { fields, raw }
    }
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}

// =============================================================================
// Stage One: Tolerant Extraction
// =============================================================================

/// Split tool output into named-field records
///
/// Blocks are separated by blank lines. Within a block, a line contributes
/// a field if it contains a `:` or `=` separator; decoration lines (rules,
/// banners, unseparated prose) are skipped. Duplicate keys keep the first
/// value seen.
pub fn parse_blocks(stdout: &str) -> Vec<RawRecord> {
    let mut records = Vec::new();
    let mut fields: IndexMap<String, String> = IndexMap::new();
    let mut raw = String::new();

    let mut flush = |fields: &mut IndexMap<String, String>, raw: &mut String| {
        if !fields.is_empty() {
            records.push(RawRecord {
                fields: std::mem::take(fields),
                raw: std::mem::take(raw),
            });
        } else {
            raw.clear();
        }
    };

    for line in stdout.lines() {
        if line.trim().is_empty() {
            flush(&mut fields, &mut raw);
            continue;
        }
        raw.push_str(line);
        raw.push('\n');

        if let Some((key, value)) = split_field(line) {
            fields.entry(normalize_key(key)).or_insert_with(|| value.trim().to_string());
        }
    }
    flush(&mut fields, &mut raw);

    records
}

/// Split a line at the first `:` or `=`, whichever comes first
fn split_field(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':');
    let equals = line.find('=');
    let at = match (colon, equals) {
        (Some(c), Some(e)) => c.min(e),
        (Some(c), None) => c,
        (None, Some(e)) => e,
        (None, None) => return None,
    };
    let (key, rest) = line.split_at(at);
    if key.trim().is_empty() {
        return None;
    }
    Some((key, &rest[1..]))
}
