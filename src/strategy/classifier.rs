//! Lightweight heuristic query classification

use super::context::StrategyContext;
use super::scenario::Scenario;
use crate::error::{Result, RetrievalError};
use regex::Regex;

const TROUBLESHOOTING_PATTERN: &str = r"(?i)\b(errors?|fail(s|ed|ing|ure)?|broken|crash(es|ed|ing)?|exceptions?|not working|does(n'?t| not) work|issues?|bugs?|fix|troubleshoot\w*|debug\w*|timeout|timed out|refused|denied|stack ?trace)\b";

const PRECISE_PATTERN: &str = r#"(?i)(^\s*(what|who|when|where|which)\s+(is|are|was|were)\b|\bdefin(e|ition)\b|"[^"]+"|\b\w+[_:/]\w+\b|\bv?\d+\.\d+(\.\d+)?\b)"#;

const BROAD_PATTERN: &str = r"(?i)\b(overview|summar(y|ize|ise)|compare|comparison|differences?|explain|list|options|alternatives|best practices?|pros and cons|how (do|does|can|should|to)\b)";

/// Queries with at most this many terms are treated as precise lookups
const SHORT_QUERY_TERMS: usize = 3;

/// Queries with more terms than this are treated as exploratory
const LONG_QUERY_TERMS: usize = 24;

/// Maps a request context onto a [`Scenario`]
pub struct QueryClassifier {
    troubleshooting: Regex,
    precise: Regex,
    broad: Regex,
}

impl QueryClassifier {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                RetrievalError::Config(format!("Invalid classifier pattern: {}", e))
            })
        };

        Ok(Self {
            troubleshooting: compile(TROUBLESHOOTING_PATTERN)?,
            precise: compile(PRECISE_PATTERN)?,
            broad: compile(BROAD_PATTERN)?,
        })
    }

    /// Classify a request. Checks run in priority order; the first match wins.
    pub fn classify(&self, ctx: &StrategyContext) -> Scenario {
        if ctx.document_id.is_some() {
            return Scenario::DocumentFocused;
        }

        let query = ctx.query.trim();
        let terms = query.split_whitespace().count();

        if self.troubleshooting.is_match(query) {
            Scenario::Troubleshooting
        } else if self.broad.is_match(query) || terms > LONG_QUERY_TERMS {
            Scenario::Broad
        } else if self.precise.is_match(query) || (terms > 0 && terms <= SHORT_QUERY_TERMS) {
            Scenario::Precise
        } else {
            Scenario::Default
        }
    }
}
