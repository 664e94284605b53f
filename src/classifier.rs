//! Vocabulary-based content classification.
//!
//! An article is classified by scanning its text for two fixed term lists:
//! spine procedures and financial/market terms. Matching is
//! case-insensitive. A term edge that is a word character must sit on a
//! word boundary, so `fusion` does not match inside `confusion`, while a
//! symbol such as `$` matches anywhere.
//!
//! Matches come back in vocabulary order, de-duplicated, spelled the way the
//! vocabulary spells them. The category is the source site's label, not a
//! property of the text.

use crate::config::Vocabularies;
use crate::errors::ConfigError;
use crate::models::Classification;
use crate::utils::normalize_text;
use itertools::Itertools;
use regex::Regex;
use tracing::debug;

/// A compiled term list.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    terms: Vec<(String, Regex)>,
}

impl Vocabulary {
    pub fn new<S: AsRef<str>>(terms: &[S]) -> Result<Self, ConfigError> {
        let terms = terms
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .unique_by(|t| t.to_lowercase())
            .map(|t| {
                term_pattern(t)
                    .map(|re| (t.to_string(), re))
                    .map_err(|e| ConfigError::Invalid(format!("bad vocabulary term '{t}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { terms })
    }

    /// Terms found in `text`, in vocabulary order.
    pub fn matches(&self, text: &str) -> Vec<String> {
        self.terms
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(term, _)| term.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }
}

fn term_pattern(term: &str) -> Result<Regex, regex::Error> {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let mut pattern = String::from("(?i)");
    if is_word(term.chars().next()) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(term));
    if is_word(term.chars().last()) {
        pattern.push_str(r"\b");
    }
    Regex::new(&pattern)
}

/// Stateless classifier over the procedure and financial vocabularies.
#[derive(Debug, Clone)]
pub struct Classifier {
    procedures: Vocabulary,
    financial: Vocabulary,
}

impl Classifier {
    pub fn new(vocabularies: &Vocabularies) -> Result<Self, ConfigError> {
        let procedures = Vocabulary::new(&vocabularies.procedures)?;
        let financial = Vocabulary::new(&vocabularies.financial)?;
        debug!(
            procedures = procedures.len(),
            financial = financial.len(),
            "Compiled vocabularies"
        );
        Ok(Self {
            procedures,
            financial,
        })
    }

    /// Classify article text that came from a site labelled `category_label`.
    pub fn classify(&self, text: &str, category_label: &str) -> Classification {
        let normalized = normalize_text(text);
        Classification {
            content_length: normalized.chars().count(),
            spine_procedures: self.procedures.matches(&normalized),
            financial_mentions: self.financial.matches(&normalized),
            category: category_label.to_string(),
        }
    }
}
