//! Verse specifications like `16`, `1-5` or `1-3/7/9-10`

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("number regex is valid"));

/// Inclusive verse range, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseSpan {
    pub start: u32,
    pub end: u32,
}

impl VerseSpan {
    pub fn single(verse: u32) -> Self {
        Self {
            start: verse,
            end: verse,
        }
    }

    /// The verses of `content` covered by this span
    pub fn select<'a>(&self, content: &'a [String]) -> &'a [String] {
        let start = (self.start as usize).saturating_sub(1).min(content.len());
        let end = (self.end as usize).min(content.len());
        if start >= end {
            &[]
        } else {
            &content[start..end]
        }
    }
}

/// Parse a `/`-separated list of single verses and two-value spans
///
/// Segments without numbers, or with more than two, are ignored. Any number
/// that is zero or beyond `verse_count` is returned as the error.
pub fn parse_verse_spec(spec: &str, verse_count: usize) -> Result<Vec<VerseSpan>, u64> {
    let mut spans = Vec::new();

    for segment in spec.split('/') {
        let mut numbers = Vec::with_capacity(2);
        for found in NUMBER.find_iter(segment) {
            let n = found.as_str().parse::<u64>().unwrap_or(u64::MAX);
            if n == 0 || n > verse_count as u64 {
                return Err(n);
            }
            numbers.push(n as u32);
        }

        match numbers.as_slice() {
            [verse] => spans.push(VerseSpan::single(*verse)),
            [start, end] => spans.push(VerseSpan {
                start: *start,
                end: *end,
            }),
            _ => {}
        }
    }

    Ok(spans)
}
