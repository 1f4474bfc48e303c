use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    award::AwardRecord,
    classifier::{Classification, MatchMode},
    vocabulary::{Phrase, Tier},
};

/// One record matched by one tier, with the tier phrases it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult<'a> {
    pub record: &'a AwardRecord,
    pub tier: String,
    /// Never empty; a subset of the tier's phrases in declared order.
    pub matched: Vec<Phrase>,
}

/// Matches, total funding and count for one tier over one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierAggregate<'a> {
    pub tier: String,
    /// Descending by funding; equal amounts keep source order.
    pub matches: Vec<MatchResult<'a>>,
    pub total_funding: Decimal,
    pub count: usize,
}

impl<'a> TierAggregate<'a> {
    fn new(tier: &str, mut matches: Vec<MatchResult<'a>>) -> Self {
        matches.sort_by(|a, b| {
            b.record
                .funding
                .cmp(&a.record.funding)
                .then_with(|| a.record.ordinal.cmp(&b.record.ordinal))
        });
        let total_funding = saturating_sum(matches.iter().map(|m| m.record.funding));
        Self {
            tier: tier.to_string(),
            count: matches.len(),
            matches,
            total_funding,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Sum that clamps at [`Decimal::MAX`] instead of overflowing.
fn saturating_sum(amounts: impl IntoIterator<Item = Decimal>) -> Decimal {
    amounts.into_iter().fold(Decimal::ZERO, |total, amount| {
        total.checked_add(amount).unwrap_or(Decimal::MAX)
    })
}

/// Group classified records per tier, in tier declaration order.
///
/// Every tier yields an aggregate, empty ones with count and total zero.
/// `classified[i]` must be the classification of `records[i]` against `tiers`.
pub fn aggregate<'a>(
    records: &'a [AwardRecord],
    classified: &[Classification],
    tiers: &[Tier],
) -> Vec<TierAggregate<'a>> {
    tiers
        .iter()
        .enumerate()
        .map(|(tier_idx, tier)| {
            let matches = records
                .iter()
                .zip(classified)
                .filter_map(|(record, classification)| {
                    let matched = classification.at(tier_idx);
                    (!matched.is_empty()).then(|| MatchResult {
                        record,
                        tier: tier.name.clone(),
                        matched: matched.to_vec(),
                    })
                })
                .collect();
            TierAggregate::new(&tier.name, matches)
        })
        .collect()
}

/// A record ranked across all tiers, with every phrase it matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedAward<'a> {
    pub rank: usize,
    pub record: &'a AwardRecord,
    pub tiers: Vec<String>,
    pub matched: Vec<Phrase>,
}

/// The `n` highest-funded distinct records across all tier matches.
///
/// Descending funding, ties by source order; a record matching several
/// tiers appears once.
pub fn top_n<'a>(aggregates: &[TierAggregate<'a>], n: usize) -> Vec<RankedAward<'a>> {
    let mut distinct: BTreeMap<usize, RankedAward<'a>> = BTreeMap::new();
    for aggregate in aggregates {
        for result in &aggregate.matches {
            let entry = distinct
                .entry(result.record.ordinal)
                .or_insert_with(|| RankedAward {
                    rank: 0,
                    record: result.record,
                    tiers: Vec::new(),
                    matched: Vec::new(),
                });
            entry.tiers.push(aggregate.tier.clone());
            for phrase in &result.matched {
                if !entry.matched.contains(phrase) {
                    entry.matched.push(phrase.clone());
                }
            }
        }
    }

    let mut ranked: Vec<_> = distinct.into_values().collect();
    ranked.sort_by(|a, b| b.record.funding.cmp(&a.record.funding));
    ranked.truncate(n);
    for (idx, award) in ranked.iter_mut().enumerate() {
        award.rank = idx + 1;
    }
    ranked
}

/// Result of one classification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis<'a> {
    pub tiers: Vec<TierAggregate<'a>>,
    pub records_scanned: usize,
    /// Records that matched at least one tier, each counted once.
    pub distinct_matches: usize,
    /// Funding of the distinct matched records.
    pub total_funding: Decimal,
    /// How literals had to sit in the abstract to count.
    pub match_mode: MatchMode,
}

impl<'a> Analysis<'a> {
    pub fn new(tiers: Vec<TierAggregate<'a>>, records_scanned: usize) -> Self {
        let mut distinct: BTreeMap<usize, Decimal> = BTreeMap::new();
        for result in tiers.iter().flat_map(|t| &t.matches) {
            distinct.insert(result.record.ordinal, result.record.funding);
        }
        Self {
            records_scanned,
            distinct_matches: distinct.len(),
            total_funding: saturating_sum(distinct.values().copied()),
            match_mode: MatchMode::default(),
            tiers,
        }
    }

    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    pub fn tier(&self, name: &str) -> Option<&TierAggregate<'a>> {
        self.tiers.iter().find(|t| t.tier == name)
    }

    pub fn top_n(&self, n: usize) -> Vec<RankedAward<'a>> {
        top_n(&self.tiers, n)
    }

    /// True when no tier matched any record.
    pub fn is_empty(&self) -> bool {
        self.distinct_matches == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        award::{AwardDetails, AwardRecord},
        classifier::{Classifier, MatchMode},
    };

    fn record(ordinal: usize, id: &str, abstract_text: &str, funding: i64) -> AwardRecord {
        AwardRecord {
            ordinal,
            id: id.into(),
            title: format!("Title {id}"),
            awardee: format!("Awardee {id}"),
            abstract_text: abstract_text.into(),
            funding: Decimal::new(funding, 0),
            details: AwardDetails::default(),
        }
    }

    fn run<'a>(records: &'a [AwardRecord], tiers: &[Tier]) -> Analysis<'a> {
        let classifier = Classifier::new(tiers, MatchMode::Substring).unwrap();
        let classified = classifier.classify_all(records);
        Analysis::new(aggregate(records, &classified, tiers), records.len())
    }

    #[test]
    fn single_record_match_with_both_phrases() {
        let records = vec![
            record(0, "A", "this study explores diversity and equity", 1000),
            record(1, "B", "a novel sensor design", 5000),
        ];
        let tiers = vec![Tier::literals("DEI", ["diversity", "equity"]).unwrap()];
        let analysis = run(&records, &tiers);
        let dei = analysis.tier("DEI").unwrap();
        assert_eq!(dei.count, 1);
        assert_eq!(dei.total_funding, Decimal::new(1000, 0));
        assert_eq!(dei.matches[0].record.id, "A");
        assert_eq!(
            dei.matches[0].matched,
            vec![Phrase::literal("diversity"), Phrase::literal("equity")]
        );
    }

    #[test]
    fn equal_funding_keeps_source_order() {
        let records = vec![
            record(0, "X", "equity", 2000),
            record(1, "Z", "equity", 3000),
            record(2, "Y", "equity", 2000),
        ];
        let tiers = vec![Tier::literals("DEI", ["equity"]).unwrap()];
        let analysis = run(&records, &tiers);
        let ids: Vec<_> = analysis.tiers[0]
            .matches
            .iter()
            .map(|m| m.record.id.as_str())
            .collect();
        assert_eq!(ids, vec!["Z", "X", "Y"]);
    }

    #[test]
    fn empty_tiers_are_kept_with_zero_totals() {
        let records = vec![record(0, "A", "synergy", 10)];
        let tiers = vec![
            Tier::literals("DEI", ["equity"]).unwrap(),
            Tier::literals("Buzz", ["synergy"]).unwrap(),
        ];
        let analysis = run(&records, &tiers);
        let names: Vec<_> = analysis.tiers.iter().map(|t| t.tier.as_str()).collect();
        assert_eq!(names, vec!["DEI", "Buzz"]);
        assert!(analysis.tiers[0].is_empty());
        assert_eq!(analysis.tiers[0].count, 0);
        assert_eq!(analysis.tiers[0].total_funding, Decimal::ZERO);
    }

    #[test]
    fn oversized_amounts_do_not_overflow_totals() {
        let mut records = vec![record(0, "A", "equity", 0), record(1, "B", "equity", 0)];
        for record in &mut records {
            record.funding = Decimal::MAX;
        }
        let tiers = vec![Tier::literals("DEI", ["equity"]).unwrap()];
        let analysis = run(&records, &tiers);
        assert_eq!(analysis.tiers[0].count, 2);
        assert_eq!(analysis.tiers[0].total_funding, Decimal::MAX);
        assert_eq!(analysis.total_funding, Decimal::MAX);
    }

    #[test]
    fn top_n_picks_highest_funded() {
        let records = vec![
            record(0, "A", "synergy", 300),
            record(1, "B", "synergy", 900),
            record(2, "C", "synergy", 500),
        ];
        let tiers = vec![Tier::literals("Buzz", ["synergy"]).unwrap()];
        let analysis = run(&records, &tiers);
        let top = analysis.top_n(1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].record.id, "B");
        assert_eq!(top[0].rank, 1);
        assert_eq!(analysis.top_n(10).len(), 3);
    }

    #[test]
    fn records_in_several_tiers_count_once_overall() {
        let records = vec![
            record(0, "A", "equity and synergy", 700),
            record(1, "B", "synergy", 700),
        ];
        let tiers = vec![
            Tier::literals("DEI", ["equity"]).unwrap(),
            Tier::literals("Buzz", ["synergy"]).unwrap(),
        ];
        let analysis = run(&records, &tiers);
        assert_eq!(analysis.distinct_matches, 2);
        assert_eq!(analysis.total_funding, Decimal::new(1400, 0));

        let top = analysis.top_n(5);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].record.id, "A");
        assert_eq!(top[0].tiers, vec!["DEI".to_string(), "Buzz".to_string()]);
        assert_eq!(
            top[0].matched,
            vec![Phrase::literal("equity"), Phrase::literal("synergy")]
        );
    }

    #[test]
    fn sums_are_exact_for_cents() {
        let mut records = Vec::new();
        for ordinal in 0..10 {
            let mut r = record(ordinal, "R", "equity", 0);
            r.funding = Decimal::new(10, 2);
            records.push(r);
        }
        let tiers = vec![Tier::literals("DEI", ["equity"]).unwrap()];
        let analysis = run(&records, &tiers);
        assert_eq!(analysis.tiers[0].total_funding, Decimal::new(1, 0));
    }
}
