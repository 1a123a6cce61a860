//! SQL extraction from free-text model output.
//!
//! Extraction is a textual heuristic. Nothing here parses or sanitizes SQL;
//! whatever comes back is executed as-is against the warehouse.

use regex::Regex;

pub trait SqlExtractor: Send + Sync {
    /// The statement to execute, or `None` if the text does not look like SQL.
    fn extract(&self, response: &str) -> Option<String>;
}

/// Accepts the whole trimmed response if it mentions `SELECT` (any case)
/// and contains a `;` anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordExtractor;

impl SqlExtractor for KeywordExtractor {
    fn extract(&self, response: &str) -> Option<String> {
        let has_select = response.to_uppercase().contains("SELECT");
        (has_select && response.contains(';')).then(|| response.trim().to_string())
    }
}

/// Takes the body of the first ```` ```sql ```` fenced block.
#[derive(Debug, Clone, Copy, Default)]
pub struct FencedBlockExtractor;

const FENCED_SQL: &str = r"(?is)```sql[ \t]*\r?\n(.*?)```";

impl SqlExtractor for FencedBlockExtractor {
    fn extract(&self, response: &str) -> Option<String> {
        let re = Regex::new(FENCED_SQL).ok()?;
        let body = re.captures(response)?.get(1)?.as_str().trim();
        (!body.is_empty()).then(|| body.to_string())
    }
}
