use std::{collections::HashSet, fmt};

use once_cell::sync::OnceCell;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod loader;
mod selection;

pub use selection::{Selection, SelectionError, CUSTOM_TIER_NAME};

const BUILTIN_VOCABULARY: &str = include_str!("../../../../vocabularies/default.yaml");

static BUILTIN: OnceCell<Vocabulary> = OnceCell::new();

/// One flag entry within a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Phrase {
    /// Literal text matched case-insensitively.
    Literal(String),
    /// Regular expression compiled case-insensitively.
    Pattern { pattern: String },
}

impl Phrase {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn pattern(source: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: source.into(),
        }
    }

    /// Literal text or regex source, as declared.
    pub fn text(&self) -> &str {
        match self {
            Self::Literal(text) => text,
            Self::Pattern { pattern } => pattern,
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Self::Pattern { .. })
    }

    /// Case-insensitive identity used for duplicate detection and selection.
    pub(crate) fn key(&self) -> String {
        self.text().trim().to_lowercase()
    }
}

impl fmt::Display for Phrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.write_str(text),
            Self::Pattern { pattern } => write!(f, "/{pattern}/"),
        }
    }
}

/// Named bucket of flag phrases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub name: String,
    pub phrases: Vec<Phrase>,
}

impl Tier {
    /// Construct a tier, validating invariants before returning.
    pub fn new(name: impl Into<String>, phrases: Vec<Phrase>) -> Result<Self, VocabularyError> {
        let tier = Self {
            name: name.into(),
            phrases,
        };
        tier.validate()?;
        Ok(tier)
    }

    /// Convenience constructor for literal-only tiers.
    pub fn literals<I, S>(name: impl Into<String>, phrases: I) -> Result<Self, VocabularyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, phrases.into_iter().map(Phrase::literal).collect())
    }

    pub fn validate(&self) -> Result<(), VocabularyError> {
        if self.name.trim().is_empty() {
            return Err(VocabularyError::BlankTierName);
        }
        if self.phrases.is_empty() {
            return Err(VocabularyError::EmptyTier {
                tier: self.name.clone(),
            });
        }
        let mut seen = HashSet::new();
        for phrase in &self.phrases {
            if phrase.text().trim().is_empty() {
                return Err(VocabularyError::BlankPhrase {
                    tier: self.name.clone(),
                });
            }
            if !seen.insert(phrase.key()) {
                return Err(VocabularyError::DuplicatePhrase {
                    tier: self.name.clone(),
                    phrase: phrase.text().to_string(),
                });
            }
            if let Phrase::Pattern { pattern } = phrase {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| VocabularyError::InvalidPattern {
                        tier: self.name.clone(),
                        pattern: pattern.clone(),
                        message: err.to_string(),
                    })?;
            }
        }
        Ok(())
    }

    /// Copy of this tier keeping only the phrases at `keep`, in declared order.
    pub(crate) fn restricted(&self, keep: &HashSet<usize>) -> Self {
        Self {
            name: self.name.clone(),
            phrases: self
                .phrases
                .iter()
                .enumerate()
                .filter(|(idx, _)| keep.contains(idx))
                .map(|(_, phrase)| phrase.clone())
                .collect(),
        }
    }
}

/// Errors emitted while validating vocabulary definitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VocabularyError {
    #[error("vocabulary must define at least one tier")]
    NoTiers,
    #[error("tier name must not be blank")]
    BlankTierName,
    #[error("tier name `{tier}` is reserved for ad hoc keywords")]
    ReservedTierName { tier: String },
    #[error("duplicate tier `{tier}`")]
    DuplicateTier { tier: String },
    #[error("tier `{tier}` must list at least one phrase")]
    EmptyTier { tier: String },
    #[error("tier `{tier}` contains a blank phrase")]
    BlankPhrase { tier: String },
    #[error("tier `{tier}` lists phrase `{phrase}` more than once")]
    DuplicatePhrase { tier: String, phrase: String },
    #[error("tier `{tier}` pattern `{pattern}` is not a valid regex: {message}")]
    InvalidPattern {
        tier: String,
        pattern: String,
        message: String,
    },
    #[error("failed to parse vocabulary: {0}")]
    Parse(String),
}

#[derive(Deserialize)]
struct VocabularyDocument {
    tiers: Vec<Tier>,
}

/// Ordered, read-only table of tiers, most severe first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vocabulary {
    tiers: Vec<Tier>,
}

impl Vocabulary {
    pub fn new(tiers: Vec<Tier>) -> Result<Self, VocabularyError> {
        if tiers.is_empty() {
            return Err(VocabularyError::NoTiers);
        }
        let mut names = HashSet::new();
        for tier in &tiers {
            tier.validate()?;
            if tier.name.trim().eq_ignore_ascii_case(CUSTOM_TIER_NAME) {
                return Err(VocabularyError::ReservedTierName {
                    tier: tier.name.clone(),
                });
            }
            if !names.insert(tier.name.trim().to_lowercase()) {
                return Err(VocabularyError::DuplicateTier {
                    tier: tier.name.clone(),
                });
            }
        }
        Ok(Self { tiers })
    }

    /// The table shipped in `vocabularies/default.yaml`.
    pub fn builtin() -> Result<&'static Vocabulary, VocabularyError> {
        BUILTIN.get_or_try_init(|| Self::from_yaml_str(BUILTIN_VOCABULARY))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, VocabularyError> {
        let doc: VocabularyDocument =
            serde_yaml::from_str(raw).map_err(|err| VocabularyError::Parse(err.to_string()))?;
        Self::new(doc.tiers)
    }

    pub fn from_json5_str(raw: &str) -> Result<Self, VocabularyError> {
        let doc: VocabularyDocument =
            json5::from_str(raw).map_err(|err| VocabularyError::Parse(err.to_string()))?;
        Self::new(doc.tiers)
    }

    /// Tier names in declaration order.
    pub fn tiers(&self) -> impl Iterator<Item = &str> {
        self.tiers.iter().map(|tier| tier.name.as_str())
    }

    /// Phrases of the named tier (exact name first, then case-insensitive).
    pub fn lookup(&self, tier_name: &str) -> Option<&[Phrase]> {
        self.tier(tier_name).map(|tier| tier.phrases.as_slice())
    }

    pub fn tier(&self, tier_name: &str) -> Option<&Tier> {
        self.tiers
            .iter()
            .find(|tier| tier.name == tier_name)
            .or_else(|| {
                let wanted = tier_name.trim().to_lowercase();
                self.tiers
                    .iter()
                    .find(|tier| tier.name.trim().to_lowercase() == wanted)
            })
    }

    pub fn all(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}
