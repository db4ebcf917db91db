//! Scripture Module
//!
//! The reference-resolution collaborator behind the HTTP endpoints.
//!
//! ## Responsibilities
//! - `find`: references mentioned in free text, in order of appearance
//! - `parse`: structure of one reference, optionally with verse text
//! - Chapter and verse lookups with explicit domain errors
//!
//! [`ScriptureSource`] is the seam; [`Corpus`] is the file-backed implementation.

mod corpus;
mod verses;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use corpus::Corpus;
pub use verses::{parse_verse_spec, VerseSpan};

/// Books that number their divisions as sections rather than chapters
const SECTION_BOOKS: &[&str] = &["dc"];

/// One book of a volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub slug: String,
    pub name: String,
    pub volume: String,
    /// Chapters in order, each a list of verse texts
    pub chapters: Vec<Vec<String>>,
}

impl Book {
    /// "chapter" or "section"
    pub fn division(&self) -> &'static str {
        if SECTION_BOOKS.contains(&self.slug.as_str()) {
            "section"
        } else {
            "chapter"
        }
    }

    pub fn chapter(&self, number: u32) -> Option<&[String]> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.chapters.get(index).map(Vec::as_slice)
    }
}

/// Filters accepted by [`ScriptureSource::find`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindFilters {
    pub books: Vec<String>,
    pub volumes: Vec<String>,
}

impl FindFilters {
    pub fn allows(&self, book: &Book) -> bool {
        (self.books.is_empty() || self.books.iter().any(|b| b == &book.slug))
            && (self.volumes.is_empty() || self.volumes.iter().any(|v| v == &book.volume))
    }
}

/// A reference found in text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceMatch {
    /// Display form, e.g. `John 3:16-17`
    pub reference: String,
    pub book: String,
    pub volume: String,
    pub chapter: Option<u32>,
    pub verses: Vec<VerseSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<String>>,
}

/// Result of [`ScriptureSource::parse`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedReference {
    pub input: String,
    pub references: Vec<ReferenceMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("{0} is not a valid book")]
    UnknownBook(String),

    #[error("Invalid chapter {0}")]
    InvalidChapter(String),

    #[error("Invalid {division} for {book} {chapter}")]
    ChapterOutOfRange {
        division: &'static str,
        book: String,
        chapter: String,
    },

    #[error("Verse out of range {book} {chapter}:{verse}")]
    VerseOutOfRange { book: String, chapter: u32, verse: u64 },

    #[error("Internal server error")]
    Internal(String),
}

/// Reference resolution engine
pub trait ScriptureSource: Send + Sync {
    /// References found in `query`, filtered and capped at `max_results`
    fn find(&self, query: &str, filters: &FindFilters, max_results: usize) -> Vec<ReferenceMatch>;

    /// Structure of `reference`; `with_content` attaches verse text
    fn parse(&self, reference: &str, with_content: bool) -> ParsedReference;

    fn book(&self, slug: &str) -> Option<&Book>;

    /// Verse text for `/:book/:chapter/:verses`
    ///
    /// `chapter` is the numeric chapter if the path segment was numeric;
    /// `raw_chapter` is the segment as written, for error messages.
    fn lookup(
        &self,
        slug: &str,
        chapter: Option<i64>,
        raw_chapter: &str,
        verses: Option<&str>,
    ) -> Result<Vec<String>, LookupError> {
        let book = self
            .book(slug)
            .ok_or_else(|| LookupError::UnknownBook(slug.to_string()))?;

        let number = match chapter {
            Some(n) if n != 0 => n,
            _ => return Err(LookupError::InvalidChapter(raw_chapter.to_string())),
        };

        let content = u32::try_from(number)
            .ok()
            .and_then(|n| book.chapter(n).map(|content| (n, content)));
        let (number, content) = content.ok_or_else(|| LookupError::ChapterOutOfRange {
            division: book.division(),
            book: book.name.clone(),
            chapter: raw_chapter.to_string(),
        })?;

        let spec = match verses {
            Some(spec) if !spec.is_empty() => spec,
            _ => return Ok(content.to_vec()),
        };

        let spans = parse_verse_spec(spec, content.len()).map_err(|verse| {
            LookupError::VerseOutOfRange {
                book: book.name.clone(),
                chapter: number,
                verse,
            }
        })?;

        Ok(spans
            .iter()
            .flat_map(|span| span.select(content))
            .cloned()
            .collect())
    }
}
