//! Sentence splitting capabilities used by the chunker.
//!
//! Two strategies are provided:
//!
//! - [`PunctuationSplitter`] - splits after each `[.!?]+` match that occurs
//!   outside double-quoted spans
//! - [`AbbreviationAwareSplitter`] - additionally requires a following space,
//!   skips known abbreviations and initials, and closes a quoted sentence after
//!   its closing quote
//!
//! Both return trimmed, non-empty sentences in document order.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// A run of terminators.
static TERMINAL_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[.!?]+").expect("unreachable error: failed to compile terminal pattern")
});

/// A run of terminators followed by any closing brackets, apostrophes or quotes.
static CLOSED_TERMINAL_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[.!?]+[)\]'"\x{2019}\x{201D}]*"#)
        .expect("unreachable error: failed to compile closed terminal pattern")
});

/// Splits text into an ordered sequence of sentences.
pub trait SentenceSplitter: Send + Sync {
    fn split(&self, text: &str) -> Vec<String>;
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Quote state after reading `segment`, starting from `in_quote`.
fn quote_state(segment: &str, mut in_quote: bool) -> bool {
    for c in segment.chars() {
        match c {
            '"' => in_quote = !in_quote,
            '\u{201C}' => in_quote = true,
            '\u{201D}' => in_quote = false,
            _ => {}
        }
    }
    in_quote
}

fn push_sentence(out: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Splits on sentence-ending punctuation outside quoted spans.
///
/// `"Stop." she said. Then left!` yields `"Stop." she said.` and `Then left!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PunctuationSplitter;

impl SentenceSplitter for PunctuationSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;
        let mut scanned = 0;
        let mut in_quote = false;

        for run in TERMINAL_RUN.find_iter(text) {
            in_quote = quote_state(&text[scanned..run.start()], in_quote);
            scanned = run.end();
            if !in_quote {
                push_sentence(&mut sentences, &text[start..run.end()]);
                start = run.end();
            }
        }

        push_sentence(&mut sentences, &text[start..]);
        sentences
    }
}

const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "mt", "vs", "etc", "e.g", "i.e", "inc",
    "ltd", "co", "corp", "no", "fig", "approx", "dept", "est", "u.s", "jan", "feb", "mar", "apr",
    "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec",
];

/// Splits on sentence-ending punctuation while respecting abbreviations and quotes.
///
/// A terminator only ends a sentence when it is followed by whitespace or the
/// end of input (so `3.14` and `example.com` stay intact). A period after a
/// known abbreviation (`Dr.`, `e.g.`) or a single capital initial (`J. Smith`)
/// does not end a sentence. A terminator inside a quotation ends the sentence
/// only when the closing quote follows it directly.
#[derive(Debug, Clone)]
pub struct AbbreviationAwareSplitter {
    abbreviations: HashSet<String>,
}

impl AbbreviationAwareSplitter {
    pub fn new() -> Self {
        Self { abbreviations: DEFAULT_ABBREVIATIONS.iter().map(|a| (*a).to_string()).collect() }
    }

    /// Add abbreviations (case-insensitive, without the trailing period).
    pub fn with_abbreviations<I, S>(mut self, abbreviations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.abbreviations.extend(
            abbreviations
                .into_iter()
                .map(|a| a.as_ref().trim_end_matches('.').to_lowercase()),
        );
        self
    }

    /// Whether the word immediately before a period is an abbreviation or initial.
    fn ends_with_abbreviation(&self, prefix: &str) -> bool {
        let word = prefix
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or("")
            .trim_start_matches(['(', '[', '"', '\'', '\u{201C}']);
        if word.is_empty() {
            return false;
        }
        let mut chars = word.chars();
        if let (Some(first), None) = (chars.next(), chars.next()) {
            if first.is_uppercase() {
                return true;
            }
        }
        self.abbreviations.contains(&word.to_lowercase())
    }
}

impl Default for AbbreviationAwareSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl SentenceSplitter for AbbreviationAwareSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;
        let mut scanned = 0;
        let mut in_quote = false;

        for run in CLOSED_TERMINAL_RUN.find_iter(text) {
            in_quote = quote_state(&text[scanned..run.start()], in_quote);
            let matched = run.as_str();
            let terminals = matched.find(|c| !is_terminal(c)).unwrap_or(matched.len());

            // Closers end the sentence with it; a quote that does not close one
            // opens the next span and is left for the following scan.
            let mut end = run.start() + terminals;
            for (offset, c) in matched[terminals..].char_indices() {
                match c {
                    '"' | '\u{201D}' if in_quote => in_quote = false,
                    '"' | '\u{201D}' => break,
                    _ => {}
                }
                end = run.start() + terminals + offset + c.len_utf8();
            }
            scanned = end;

            let at_boundary = text[end..].chars().next().is_none_or(char::is_whitespace);
            let abbreviation = end == run.start() + 1
                && matched.starts_with('.')
                && self.ends_with_abbreviation(&text[start..run.start()]);

            if at_boundary && !in_quote && !abbreviation {
                push_sentence(&mut sentences, &text[start..end]);
                start = end;
            }
        }

        push_sentence(&mut sentences, &text[start..]);
        sentences
    }
}
