use tracing::{info, instrument};

use crate::{
    aggregate::{aggregate, Analysis},
    award::{AwardRecord, FundingField, RawAward},
    classifier::{Classifier, MatchMode},
    error::AnalysisError,
    vocabulary::{Selection, Vocabulary},
};

/// Everything one analysis needs, owned by the caller and passed explicitly.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    records: Vec<AwardRecord>,
    vocabulary: Vocabulary,
    match_mode: MatchMode,
}

impl AnalysisContext {
    pub fn new(records: Vec<AwardRecord>, vocabulary: Vocabulary, match_mode: MatchMode) -> Self {
        Self {
            records,
            vocabulary,
            match_mode,
        }
    }

    /// Normalize raw source records and build a context around them.
    pub fn from_raw(
        raws: Vec<RawAward>,
        funding_field: FundingField,
        vocabulary: Vocabulary,
        match_mode: MatchMode,
    ) -> Self {
        Self::new(AwardRecord::ingest(raws, funding_field), vocabulary, match_mode)
    }

    pub fn records(&self) -> &[AwardRecord] {
        &self.records
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    /// Classify and aggregate the loaded records for the selected tiers.
    ///
    /// Nothing is classified when the selection is empty or no records are loaded.
    #[instrument(name = "analyze", skip_all, fields(records = self.records.len(), mode = ?self.match_mode))]
    pub fn run(&self, selection: &Selection) -> Result<Analysis<'_>, AnalysisError> {
        let tiers = selection.resolve(&self.vocabulary)?;
        if self.records.is_empty() {
            return Err(AnalysisError::NoRecords);
        }
        let classifier = Classifier::new(&tiers, self.match_mode)?;
        let classified = classifier.classify_all(&self.records);
        let analysis = Analysis::new(
            aggregate(&self.records, &classified, &tiers),
            self.records.len(),
        )
        .with_match_mode(self.match_mode);
        info!(
            tiers = analysis.tiers.len(),
            matched = analysis.distinct_matches,
            total_funding = %analysis.total_funding,
            "analysis completed"
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::{SelectionError, Tier};
    use rust_decimal::Decimal;

    fn raw(id: &str, abstract_text: &str, amount: &str) -> RawAward {
        RawAward {
            id: id.into(),
            abstract_text: abstract_text.into(),
            funds_obligated_amt: amount.into(),
            ..RawAward::default()
        }
    }

    fn vocab() -> Vocabulary {
        Vocabulary::new(vec![Tier::literals("DEI", ["diversity", "equity"]).unwrap()]).unwrap()
    }

    #[test]
    fn empty_selection_skips_classification() {
        let ctx = AnalysisContext::from_raw(
            vec![raw("A", "equity", "10")],
            FundingField::Obligated,
            vocab(),
            MatchMode::Substring,
        );
        let err = ctx.run(&Selection::default()).unwrap_err();
        assert_eq!(err, AnalysisError::Selection(SelectionError::NothingSelected));
    }

    #[test]
    fn no_records_is_reported() {
        let ctx = AnalysisContext::new(Vec::new(), vocab(), MatchMode::Substring);
        assert_eq!(ctx.run(&Selection::all()).unwrap_err(), AnalysisError::NoRecords);
    }

    #[test]
    fn malformed_inputs_degrade_to_no_match_and_zero_funding() {
        let ctx = AnalysisContext::from_raw(
            vec![raw("A", "", "12"), raw("B", "equity", "not a number")],
            FundingField::Obligated,
            vocab(),
            MatchMode::Substring,
        );
        let analysis = ctx.run(&Selection::all()).unwrap();
        let dei = &analysis.tiers[0];
        assert_eq!(dei.count, 1);
        assert_eq!(dei.matches[0].record.id, "B");
        assert_eq!(dei.total_funding, Decimal::ZERO);
    }

    #[test]
    fn maximum_size_amounts_do_not_abort_the_run() {
        let huge = "79228162514264337593543950335";
        let ctx = AnalysisContext::from_raw(
            vec![raw("A", "equity", huge), raw("B", "equity", huge), raw("C", "equity", "7")],
            FundingField::Obligated,
            vocab(),
            MatchMode::Substring,
        );
        let analysis = ctx.run(&Selection::all()).unwrap();
        assert_eq!(analysis.tiers[0].count, 3);
        assert_eq!(analysis.tiers[0].total_funding, Decimal::new(7, 0));
        assert_eq!(analysis.total_funding, Decimal::new(7, 0));
    }

    #[test]
    fn analysis_records_the_match_mode() {
        let ctx = AnalysisContext::from_raw(
            vec![raw("A", "equity", "1")],
            FundingField::Obligated,
            vocab(),
            MatchMode::WholeWord,
        );
        assert_eq!(ctx.run(&Selection::all()).unwrap().match_mode, MatchMode::WholeWord);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let ctx = AnalysisContext::from_raw(
            vec![
                raw("A", "diversity", "5"),
                raw("B", "equity", "5"),
                raw("C", "equity and diversity", "9"),
            ],
            FundingField::Obligated,
            vocab(),
            MatchMode::Substring,
        );
        let first = ctx.run(&Selection::all()).unwrap();
        let second = ctx.run(&Selection::all()).unwrap();
        assert_eq!(first, second);
    }
}
