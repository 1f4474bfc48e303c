use std::str::FromStr;

use aho_corasick::AhoCorasick;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    award::AwardRecord,
    error::AnalysisError,
    vocabulary::{Phrase, Tier},
};

/// How a literal phrase must sit inside the abstract to count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Anywhere, including inside longer words ("race" hits "embrace").
    #[default]
    Substring,
    /// Only where the neighbouring characters are not alphanumeric.
    WholeWord,
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "substring" => Ok(Self::Substring),
            "whole_word" | "word" => Ok(Self::WholeWord),
            other => Err(format!(
                "unknown match mode `{other}` (expected `substring` or `whole-word`)"
            )),
        }
    }
}

impl MatchMode {
    /// Whether the occurrence `text[start..end]` counts under this mode.
    pub fn accepts(self, text: &str, start: usize, end: usize) -> bool {
        match self {
            Self::Substring => true,
            Self::WholeWord => {
                let before = text[..start].chars().next_back();
                let after = text[end..].chars().next();
                !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
            }
        }
    }
}

/// Phrases of one tier found in one abstract, in the tier's declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierHit {
    pub tier: String,
    pub phrases: Vec<Phrase>,
}

/// Per-tier outcome of classifying a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    hits: Vec<TierHit>,
}

impl Classification {
    /// Matched phrases for `tier`; empty when the tier did not match or is unknown.
    pub fn get(&self, tier: &str) -> &[Phrase] {
        self.hits
            .iter()
            .find(|hit| hit.tier == tier)
            .map(|hit| hit.phrases.as_slice())
            .unwrap_or(&[])
    }

    /// Hits in tier order, one entry per classified tier.
    pub fn iter(&self) -> impl Iterator<Item = &TierHit> {
        self.hits.iter()
    }

    pub(crate) fn at(&self, idx: usize) -> &[Phrase] {
        self.hits
            .get(idx)
            .map(|hit| hit.phrases.as_slice())
            .unwrap_or(&[])
    }

    /// True when no tier matched.
    pub fn is_empty(&self) -> bool {
        self.hits.iter().all(|hit| hit.phrases.is_empty())
    }
}

struct CompiledTier {
    tier: Tier,
    /// Automaton over lowercased literals plus the phrase index of each automaton pattern.
    literals: Option<(AhoCorasick, Vec<usize>)>,
    patterns: Vec<(Regex, usize)>,
}

/// Matches abstracts against a fixed list of tiers.
pub struct Classifier {
    tiers: Vec<CompiledTier>,
    mode: MatchMode,
}

impl Classifier {
    pub fn new(tiers: &[Tier], mode: MatchMode) -> Result<Self, AnalysisError> {
        let tiers = tiers
            .iter()
            .map(Self::compile_tier)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tiers, mode })
    }

    fn compile_tier(tier: &Tier) -> Result<CompiledTier, AnalysisError> {
        let matcher_error = |message: String| AnalysisError::Matcher {
            tier: tier.name.clone(),
            message,
        };

        let mut literal_texts = Vec::new();
        let mut literal_ids = Vec::new();
        let mut patterns = Vec::new();
        for (idx, phrase) in tier.phrases.iter().enumerate() {
            match phrase {
                Phrase::Literal(text) => {
                    literal_texts.push(text.to_lowercase());
                    literal_ids.push(idx);
                }
                Phrase::Pattern { pattern } => {
                    let regex = RegexBuilder::new(pattern)
                        .case_insensitive(true)
                        .build()
                        .map_err(|err| matcher_error(err.to_string()))?;
                    patterns.push((regex, idx));
                }
            }
        }

        let literals = if literal_texts.is_empty() {
            None
        } else {
            let automaton =
                AhoCorasick::new(&literal_texts).map_err(|err| matcher_error(err.to_string()))?;
            Some((automaton, literal_ids))
        };

        Ok(CompiledTier {
            tier: tier.clone(),
            literals,
            patterns,
        })
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Tier names in classification order.
    pub fn tier_names(&self) -> impl Iterator<Item = &str> {
        self.tiers.iter().map(|compiled| compiled.tier.name.as_str())
    }

    pub fn tiers(&self) -> impl Iterator<Item = &Tier> {
        self.tiers.iter().map(|compiled| &compiled.tier)
    }

    /// Evaluate every tier against the record's abstract.
    pub fn classify(&self, record: &AwardRecord) -> Classification {
        self.classify_text(&record.abstract_text)
    }

    pub fn classify_text(&self, text: &str) -> Classification {
        let lowered = if text.trim().is_empty() {
            None
        } else {
            Some(text.to_lowercase())
        };
        let hits = self
            .tiers
            .iter()
            .map(|compiled| TierHit {
                tier: compiled.tier.name.clone(),
                phrases: match &lowered {
                    Some(lowered) => self.scan_tier(compiled, text, lowered),
                    None => Vec::new(),
                },
            })
            .collect();
        Classification { hits }
    }

    #[instrument(name = "classify_records", skip_all, fields(records = records.len(), tiers = self.tiers.len()))]
    pub fn classify_all(&self, records: &[AwardRecord]) -> Vec<Classification> {
        let classified: Vec<_> = records.iter().map(|record| self.classify(record)).collect();
        let matched = classified.iter().filter(|c| !c.is_empty()).count();
        debug!(matched, "classification completed");
        classified
    }

    fn scan_tier(&self, compiled: &CompiledTier, original: &str, lowered: &str) -> Vec<Phrase> {
        let mut found = vec![false; compiled.tier.phrases.len()];

        if let Some((automaton, literal_ids)) = &compiled.literals {
            for mat in automaton.find_overlapping_iter(lowered) {
                let Some(&phrase_idx) = literal_ids.get(mat.pattern().as_usize()) else {
                    continue;
                };
                if found[phrase_idx] {
                    continue;
                }
                if self.accepts(lowered, mat.start(), mat.end()) {
                    found[phrase_idx] = true;
                }
            }
        }

        for (regex, phrase_idx) in &compiled.patterns {
            found[*phrase_idx] = regex
                .find_iter(original)
                .filter(|m| m.start() < m.end())
                .any(|m| self.accepts(original, m.start(), m.end()));
        }

        compiled
            .tier
            .phrases
            .iter()
            .zip(found)
            .filter(|(_, hit)| *hit)
            .map(|(phrase, _)| phrase.clone())
            .collect()
    }

    fn accepts(&self, text: &str, start: usize, end: usize) -> bool {
        self.mode.accepts(text, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::award::{AwardDetails, AwardRecord};
    use rust_decimal::Decimal;

    fn record(abstract_text: &str) -> AwardRecord {
        AwardRecord {
            ordinal: 0,
            id: "A".into(),
            title: String::new(),
            awardee: String::new(),
            abstract_text: abstract_text.into(),
            funding: Decimal::ZERO,
            details: AwardDetails::default(),
        }
    }

    fn dei() -> Tier {
        Tier::literals("DEI", ["diversity", "equity", "inclusion"]).unwrap()
    }

    #[test]
    fn reports_matches_in_declared_order_case_insensitively() {
        let classifier = Classifier::new(&[dei()], MatchMode::Substring).unwrap();
        let result = classifier.classify(&record("EQUITY first, then Diversity."));
        assert_eq!(
            result.get("DEI"),
            &[Phrase::literal("diversity"), Phrase::literal("equity")]
        );
    }

    #[test]
    fn tiers_are_evaluated_independently() {
        let buzz = Tier::literals("Buzz", ["synergy", "leverage"]).unwrap();
        let classifier = Classifier::new(&[dei(), buzz], MatchMode::Substring).unwrap();
        let result = classifier.classify(&record("We leverage diversity for synergy."));
        assert_eq!(result.get("DEI"), &[Phrase::literal("diversity")]);
        assert_eq!(
            result.get("Buzz"),
            &[Phrase::literal("synergy"), Phrase::literal("leverage")]
        );
        assert_eq!(result.iter().count(), 2);
    }

    #[test]
    fn nested_phrases_are_all_reported() {
        let tier = Tier::literals("Nested", ["neurodiversity", "diversity"]).unwrap();
        let classifier = Classifier::new(&[tier], MatchMode::Substring).unwrap();
        let result = classifier.classify(&record("a study of neurodiversity"));
        assert_eq!(result.get("Nested").len(), 2);
    }

    #[test]
    fn empty_abstract_matches_nothing() {
        let any = Tier::new("Any", vec![Phrase::pattern(r"\s*")]).unwrap();
        let classifier = Classifier::new(&[dei(), any], MatchMode::Substring).unwrap();
        assert!(classifier.classify(&record("")).is_empty());
        assert!(classifier.classify(&record("   ")).is_empty());
    }

    #[test]
    fn substring_mode_matches_inside_words() {
        let tier = Tier::literals("Race", ["race"]).unwrap();
        let classifier = Classifier::new(&[tier.clone()], MatchMode::Substring).unwrap();
        assert_eq!(classifier.classify(&record("we embrace change")).get("Race").len(), 1);

        let strict = Classifier::new(&[tier], MatchMode::WholeWord).unwrap();
        assert!(strict.classify(&record("we embrace change")).is_empty());
        assert_eq!(strict.classify(&record("the race, again")).get("Race").len(), 1);
    }

    #[test]
    fn whole_word_mode_handles_punctuated_phrases() {
        let tier = Tier::literals("Id", ["LGBTQ+"]).unwrap();
        let classifier = Classifier::new(&[tier], MatchMode::WholeWord).unwrap();
        assert!(!classifier.classify(&record("for LGBTQ+ students")).is_empty());
        assert!(classifier.classify(&record("xLGBTQ+ students")).is_empty());
    }

    #[test]
    fn pattern_phrases_match_case_insensitively_and_skip_zero_width() {
        let tier = Tier::new(
            "Buzz",
            vec![Phrase::literal("synergy"), Phrase::pattern(r"block\s?chain"), Phrase::pattern("^")],
        )
        .unwrap();
        let classifier = Classifier::new(&[tier], MatchMode::Substring).unwrap();
        let result = classifier.classify(&record("A BLOCK CHAIN ledger"));
        assert_eq!(result.get("Buzz"), &[Phrase::pattern(r"block\s?chain")]);
    }

    #[test]
    fn unknown_tier_lookup_is_empty() {
        let classifier = Classifier::new(&[dei()], MatchMode::Substring).unwrap();
        assert!(classifier.classify(&record("equity")).get("Other").is_empty());
    }

    #[test]
    fn parses_match_mode_names() {
        assert_eq!("whole-word".parse::<MatchMode>(), Ok(MatchMode::WholeWord));
        assert_eq!("Substring".parse::<MatchMode>(), Ok(MatchMode::Substring));
        assert!("fuzzy".parse::<MatchMode>().is_err());
    }
}
