//! File-backed scripture corpus
//!
//! ## File Format
//! ```json
//! { "books": [ { "slug": "john", "name": "John", "volume": "nt",
//!                "chapters": [["In the beginning was the Word...", "..."]] } ] }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use super::verses::{parse_verse_spec, VerseSpan};
use super::{Book, FindFilters, ParsedReference, ReferenceMatch, ScriptureSource};
use crate::error::{GatewayError, Result};

#[derive(Deserialize)]
struct CorpusFile {
    books: Vec<Book>,
}

pub struct Corpus {
    books: Vec<Book>,
    by_slug: HashMap<String, usize>,
    /// Lowercased name or slug -> book index
    aliases: HashMap<String, usize>,
    /// None for an empty corpus
    pattern: Option<Regex>,
}

impl Corpus {
    pub fn new(books: Vec<Book>) -> Result<Self> {
        let by_slug = books
            .iter()
            .enumerate()
            .map(|(i, book)| (book.slug.clone(), i))
            .collect();

        let mut aliases = HashMap::new();
        for (i, book) in books.iter().enumerate() {
            aliases.entry(normalize(&book.slug)).or_insert(i);
            aliases.entry(normalize(&book.name)).or_insert(i);
        }

        let pattern = build_pattern(&books)?;

        Ok(Self {
            books,
            by_slug,
            aliases,
            pattern,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: CorpusFile = serde_json::from_str(json)?;
        Self::new(file.books)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("cannot read corpus {}: {}", path.display(), e))
        })?;
        let corpus = Self::from_json(&json)?;
        tracing::info!(books = corpus.books.len(), path = %path.display(), "corpus loaded");
        Ok(corpus)
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    /// Every well-formed reference in `text`, in order of appearance
    fn extract(&self, text: &str) -> Vec<(&Book, ReferenceMatch)> {
        let mut found = Vec::new();
        let Some(pattern) = &self.pattern else {
            return found;
        };

        for caps in pattern.captures_iter(text) {
            let Some(book) = caps
                .get(1)
                .and_then(|m| self.aliases.get(&normalize(m.as_str())))
                .map(|&i| &self.books[i])
            else {
                continue;
            };

            let chapter = match caps.get(2) {
                Some(m) => match m.as_str().parse::<u32>() {
                    Ok(n) if book.chapter(n).is_some() => Some(n),
                    _ => continue,
                },
                None => None,
            };

            let verses = match (chapter.and_then(|n| book.chapter(n)), caps.get(3)) {
                (Some(content), Some(spec)) => {
                    match parse_verse_spec(&spec.as_str().replace(',', "/"), content.len()) {
                        Ok(spans) => spans,
                        Err(_) => continue,
                    }
                }
                _ => Vec::new(),
            };

            found.push((
                book,
                ReferenceMatch {
                    reference: display(book, chapter, &verses),
                    book: book.slug.clone(),
                    volume: book.volume.clone(),
                    chapter,
                    verses,
                    content: None,
                },
            ));
        }

        found
    }
}

impl ScriptureSource for Corpus {
    fn find(&self, query: &str, filters: &FindFilters, max_results: usize) -> Vec<ReferenceMatch> {
        self.extract(query)
            .into_iter()
            .filter(|(book, _)| filters.allows(book))
            .map(|(_, found)| found)
            .take(max_results)
            .collect()
    }

    fn parse(&self, reference: &str, with_content: bool) -> ParsedReference {
        let references = self
            .extract(reference)
            .into_iter()
            .map(|(book, mut found)| {
                if with_content {
                    found.content = found.chapter.and_then(|n| book.chapter(n)).map(|content| {
                        if found.verses.is_empty() {
                            content.to_vec()
                        } else {
                            found
                                .verses
                                .iter()
                                .flat_map(|span| span.select(content))
                                .cloned()
                                .collect()
                        }
                    });
                }
                found
            })
            .collect();

        ParsedReference {
            input: reference.to_string(),
            references,
        }
    }

    fn book(&self, slug: &str) -> Option<&Book> {
        self.by_slug.get(slug).map(|&i| &self.books[i])
    }
}

fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches('.')
        .to_lowercase()
}

/// `(<book>)[.] [<chapter>[:<verses>]]`, longest alias first
fn build_pattern(books: &[Book]) -> Result<Option<Regex>> {
    let mut aliases: Vec<String> = books
        .iter()
        .flat_map(|book| [book.name.as_str(), book.slug.as_str()])
        .map(|alias| {
            alias
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .filter(|alias| !alias.is_empty())
        .collect();
    aliases.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    aliases.dedup();

    if aliases.is_empty() {
        return Ok(None);
    }

    let pattern = format!(
        r"\b({})\.?(?:\s+(\d+)(?:\s*:\s*(\d+(?:\s*-\s*\d+)?(?:\s*,\s*\d+(?:\s*-\s*\d+)?)*))?)?\b",
        aliases.join("|")
    );

    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| GatewayError::Config(format!("corpus book names: {}", e)))
}

fn display(book: &Book, chapter: Option<u32>, verses: &[VerseSpan]) -> String {
    let mut out = book.name.clone();
    if let Some(chapter) = chapter {
        out.push_str(&format!(" {}", chapter));
        if !verses.is_empty() {
            let spans: Vec<String> = verses
                .iter()
                .map(|span| {
                    if span.start == span.end {
                        span.start.to_string()
                    } else {
                        format!("{}-{}", span.start, span.end)
                    }
                })
                .collect();
            out.push_str(&format!(":{}", spans.join(", ")));
        }
    }
    out
}
