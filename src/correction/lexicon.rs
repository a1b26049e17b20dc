use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::{NoExpand, Regex};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

use super::TextCorrector;
use crate::config::CorrectionConfig;

/// Built-in English word frequency list
const EMBEDDED_WORDS: &str = include_str!("../../data/en_words.txt");

/// Words longer than this only get single-edit candidates
const MAX_DOUBLE_EDIT_LEN: usize = 12;

const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

/// Regular endings and the text that restores the base word.
///
/// Longer endings come first so `-ies` is tried before `-s`.
const SUFFIX_RULES: &[(&str, &str)] = &[
    ("ness", ""),
    ("ment", ""),
    ("less", ""),
    ("ally", ""),
    ("iest", "y"),
    ("ies", "y"),
    ("ied", "y"),
    ("ier", "y"),
    ("ily", "y"),
    ("ing", ""),
    ("ing", "e"),
    ("est", ""),
    ("est", "e"),
    ("ful", ""),
    ("es", ""),
    ("ed", ""),
    ("ed", "e"),
    ("er", ""),
    ("er", "e"),
    ("ly", ""),
    ("s", ""),
];

/// Shortest base a suffix may be stripped down to
const MIN_BASE_LEN: usize = 3;

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"[A-Za-z0-9']+").expect("token pattern is valid"))
}

/// Known words with their corpus counts.
///
/// Rank is insertion order and breaks ties between equal counts.
#[derive(Debug, Clone, Default)]
pub struct WordFrequencies {
    counts: HashMap<String, (u64, usize)>,
}

impl WordFrequencies {
    /// The list shipped with the crate
    pub fn embedded() -> Self {
        let mut words = Self::default();
        words.extend_from_str(EMBEDDED_WORDS);
        words
    }

    /// Add `word count` lines; a bare word counts once, `#` starts a comment
    pub fn extend_from_str(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let Some(word) = parts.next() else { continue };
            let count = parts.next().and_then(|c| c.parse().ok()).unwrap_or(1);
            self.add(word, count);
        }
    }

    /// Load additional words from a file
    pub fn extend_from_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dictionary {}", path.display()))?;
        let before = self.len();
        self.extend_from_str(&content);
        info!(
            "📚 Loaded {} new words from: {}",
            self.len() - before,
            path.display()
        );
        Ok(())
    }

    pub fn add(&mut self, word: &str, count: u64) {
        let rank = self.counts.len();
        let entry = self.counts.entry(word.to_lowercase()).or_insert((0, rank));
        entry.0 = entry.0.saturating_add(count);
    }

    pub fn contains(&self, word: &str) -> bool {
        self.counts.contains_key(word)
    }

    /// Listed, or a regular inflection of a listed word (`boxes`, `lifting`,
    /// `stopped`, `happily`)
    pub fn is_known(&self, word: &str) -> bool {
        self.contains(word)
            || base_forms(word)
                .iter()
                .any(|base| base.chars().count() >= MIN_BASE_LEN && self.contains(base))
    }

    pub fn count(&self, word: &str) -> Option<u64> {
        self.counts.get(word).map(|(count, _)| *count)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Most frequent known word among the candidates
    fn best_known<I, S>(&self, candidates: I) -> Option<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut best: Option<((u64, Reverse<usize>), String)> = None;
        for candidate in candidates {
            let candidate = candidate.as_ref();
            if let Some(&(count, rank)) = self.counts.get(candidate) {
                let key = (count, Reverse(rank));
                if best.as_ref().map_or(true, |(best_key, _)| key > *best_key) {
                    best = Some((key, candidate.to_string()));
                }
            }
        }
        best.map(|(_, word)| word)
    }
}

/// Candidate base words for `word` under [`SUFFIX_RULES`], including the
/// undoubled consonant form (`running` -> `run`)
fn base_forms(word: &str) -> Vec<String> {
    let mut bases = Vec::new();
    for (suffix, restore) in SUFFIX_RULES {
        let Some(stem) = word.strip_suffix(suffix) else {
            continue;
        };
        if stem.is_empty() {
            continue;
        }
        bases.push(format!("{}{}", stem, restore));

        if restore.is_empty() {
            let mut chars = stem.chars().rev();
            if let (Some(last), Some(before)) = (chars.next(), chars.next()) {
                if last == before && !"aeiou".contains(last) {
                    bases.push(stem[..stem.len() - last.len_utf8()].to_string());
                }
            }
        }
    }
    bases
}

/// All strings one delete, transpose, replace or insert away from `word`
fn edits1(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let n = chars.len();
    let mut edits = Vec::with_capacity(54 * n + 25);

    for i in 0..n {
        let mut deleted = chars.clone();
        deleted.remove(i);
        edits.push(deleted.into_iter().collect());
    }

    for i in 0..n.saturating_sub(1) {
        let mut transposed = chars.clone();
        transposed.swap(i, i + 1);
        edits.push(transposed.into_iter().collect());
    }

    for i in 0..n {
        for c in ALPHABET.chars() {
            if chars[i] != c {
                let mut replaced = chars.clone();
                replaced[i] = c;
                edits.push(replaced.into_iter().collect());
            }
        }
    }

    for i in 0..=n {
        for c in ALPHABET.chars() {
            let mut inserted = chars.clone();
            inserted.insert(i, c);
            edits.push(inserted.into_iter().collect());
        }
    }

    edits
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Casing {
    Lower,
    Title,
    Upper,
    Mixed,
}

fn casing(word: &str) -> Casing {
    let mut chars = word.chars().filter(|c| c.is_alphabetic());
    let Some(first) = chars.next() else {
        return Casing::Mixed;
    };
    let rest: Vec<char> = chars.collect();

    if first.is_lowercase() && rest.iter().all(|c| c.is_lowercase()) {
        Casing::Lower
    } else if first.is_uppercase() && rest.iter().all(|c| c.is_lowercase()) {
        Casing::Title
    } else if first.is_uppercase() && rest.iter().all(|c| c.is_uppercase()) {
        Casing::Upper
    } else {
        Casing::Mixed
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Dictionary-frequency spelling corrector.
///
/// Unknown lowercase words are replaced by the most frequent known word one
/// edit away, else two edits away. Regular inflections of listed words count
/// as known. Capitalized words are only corrected at
/// the start of a sentence so names survive; all-caps, mixed-case, single
/// letters and anything with digits are left alone. Configured phrase
/// corrections run first.
#[derive(Debug, Clone)]
pub struct LexiconCorrector {
    words: WordFrequencies,
    phrases: Vec<(Regex, String)>,
}

impl LexiconCorrector {
    pub fn new() -> Self {
        Self::with_words(WordFrequencies::embedded())
    }

    pub fn with_words(words: WordFrequencies) -> Self {
        Self {
            words,
            phrases: Vec::new(),
        }
    }

    pub fn from_config(config: &CorrectionConfig) -> Result<Self> {
        let mut words = WordFrequencies::embedded();
        if let Some(path) = &config.dictionary_file {
            words.extend_from_file(path)?;
        }

        debug!("Spelling dictionary holds {} words", words.len());

        let mut corrector = Self::with_words(words);
        for (wrong, right) in &config.phrase_corrections {
            corrector = corrector.with_phrase(wrong, right)?;
        }
        Ok(corrector)
    }

    /// Add a case-insensitive whole-phrase replacement
    pub fn with_phrase(mut self, wrong: &str, right: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(wrong.trim())))
            .with_context(|| format!("Invalid phrase correction: {}", wrong))?;
        self.phrases.push((pattern, right.to_string()));
        // Longest phrase first so shorter ones cannot split it
        self.phrases
            .sort_by(|a, b| b.0.as_str().len().cmp(&a.0.as_str().len()));
        Ok(self)
    }

    /// Best replacement for an unknown lowercase word
    pub fn suggest(&self, word: &str) -> Option<String> {
        if self.words.contains(word) {
            return Some(word.to_string());
        }

        let single = edits1(word);
        if let Some(best) = self.words.best_known(&single) {
            return Some(best);
        }

        if word.chars().count() > MAX_DOUBLE_EDIT_LEN {
            return None;
        }
        self.words
            .best_known(single.iter().flat_map(|edit| edits1(edit)))
    }

    /// Correct a whole transcript
    pub fn correct_text(&self, text: &str) -> String {
        let mut text = text.to_string();
        for (pattern, replacement) in &self.phrases {
            text = pattern
                .replace_all(&text, NoExpand(replacement))
                .into_owned();
        }

        let mut corrected = String::with_capacity(text.len());
        let mut last = 0;
        for token in token_regex().find_iter(&text) {
            corrected.push_str(&text[last..token.start()]);
            let sentence_start = text[..token.start()]
                .trim_end()
                .chars()
                .last()
                .map_or(true, |c| matches!(c, '.' | '!' | '?'));
            corrected.push_str(&self.correct_token(token.as_str(), sentence_start));
            last = token.end();
        }
        corrected.push_str(&text[last..]);
        corrected
    }

    fn correct_token(&self, token: &str, sentence_start: bool) -> String {
        let core = token.trim_matches('\'');
        if core.is_empty() {
            return token.to_string();
        }
        let prefix_len = token.len() - token.trim_start_matches('\'').len();
        let (prefix, rest) = token.split_at(prefix_len);
        let suffix = &rest[core.len()..];

        match self.correct_word(core, sentence_start) {
            Some(fixed) => format!("{}{}{}", prefix, fixed, suffix),
            None => token.to_string(),
        }
    }

    fn correct_word(&self, word: &str, sentence_start: bool) -> Option<String> {
        if word.chars().count() < 2 || word.chars().any(|c| c.is_ascii_digit()) {
            return None;
        }

        let case = casing(word);
        let correctable = match case {
            Casing::Lower => true,
            Casing::Title => sentence_start,
            Casing::Upper | Casing::Mixed => false,
        };
        if !correctable {
            return None;
        }

        let lower = word.to_lowercase();
        if self.words.is_known(&lower) || lower.contains('\'') {
            return None;
        }

        let suggestion = self.suggest(&lower)?;
        debug!("Spelling: '{}' -> '{}'", word, suggestion);
        Some(match case {
            Casing::Title => capitalize(&suggestion),
            _ => suggestion,
        })
    }
}

impl Default for LexiconCorrector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextCorrector for LexiconCorrector {
    async fn correct(&self, text: &str) -> String {
        self.correct_text(text)
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}
