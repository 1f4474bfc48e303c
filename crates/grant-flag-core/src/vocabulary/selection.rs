use std::collections::HashSet;

use thiserror::Error;

use super::{Phrase, Tier, Vocabulary};

/// Name of the tier built from ad hoc keywords.
pub const CUSTOM_TIER_NAME: &str = "Custom keywords";

/// What the caller asked to scan for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Select every tier of the vocabulary.
    pub all_tiers: bool,
    /// Whole tiers, by name.
    pub tiers: Vec<String>,
    /// Individual vocabulary phrases; each selects its owning tier(s) restricted to it.
    pub phrases: Vec<String>,
    /// Free keywords outside the vocabulary, scanned as their own tier.
    pub keywords: Vec<String>,
}

/// Problems with a selection, reported to the user instead of running the scan.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("select at least one category, phrase or keyword to analyze")]
    NothingSelected,
    #[error("unknown tier `{0}`")]
    UnknownTier(String),
    #[error("phrase `{0}` is not part of any tier")]
    UnknownPhrase(String),
}

impl Selection {
    pub fn all() -> Self {
        Self {
            all_tiers: true,
            ..Self::default()
        }
    }

    pub fn with_tier(mut self, name: impl Into<String>) -> Self {
        self.tiers.push(name.into());
        self
    }

    pub fn with_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.phrases.push(phrase.into());
        self
    }

    /// Add comma-separated keywords; blank entries are dropped.
    pub fn with_keywords(mut self, list: &str) -> Self {
        self.keywords.extend(
            list.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
        );
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.all_tiers
            && self.tiers.iter().all(|t| t.trim().is_empty())
            && self.phrases.iter().all(|p| p.trim().is_empty())
            && self.keywords.iter().all(|k| k.trim().is_empty())
    }

    /// Turn the selection into the tiers to scan, in vocabulary order with the
    /// keyword tier last.
    pub fn resolve(&self, vocabulary: &Vocabulary) -> Result<Vec<Tier>, SelectionError> {
        if self.is_empty() {
            return Err(SelectionError::NothingSelected);
        }

        let mut whole: HashSet<&str> = HashSet::new();
        for name in self.tiers.iter().filter(|n| !n.trim().is_empty()) {
            let tier = vocabulary
                .tier(name)
                .ok_or_else(|| SelectionError::UnknownTier(name.clone()))?;
            whole.insert(tier.name.as_str());
        }

        let mut wanted: Vec<String> = Vec::new();
        for phrase in self.phrases.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            let key = phrase.to_lowercase();
            let known = vocabulary
                .all()
                .iter()
                .any(|tier| tier.phrases.iter().any(|p| p.key() == key));
            if !known {
                return Err(SelectionError::UnknownPhrase(phrase.to_string()));
            }
            wanted.push(key);
        }

        let mut resolved = Vec::new();
        for tier in vocabulary.all() {
            if self.all_tiers || whole.contains(tier.name.as_str()) {
                resolved.push(tier.clone());
                continue;
            }
            let keep: HashSet<usize> = tier
                .phrases
                .iter()
                .enumerate()
                .filter(|(_, phrase)| wanted.contains(&phrase.key()))
                .map(|(idx, _)| idx)
                .collect();
            if !keep.is_empty() {
                resolved.push(tier.restricted(&keep));
            }
        }

        let mut seen = HashSet::new();
        let keywords: Vec<Phrase> = self
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty() && seen.insert(k.to_lowercase()))
            .map(Phrase::literal)
            .collect();
        if !keywords.is_empty() {
            resolved.push(Tier {
                name: CUSTOM_TIER_NAME.to_string(),
                phrases: keywords,
            });
        }

        if resolved.is_empty() {
            return Err(SelectionError::NothingSelected);
        }
        Ok(resolved)
    }
}
