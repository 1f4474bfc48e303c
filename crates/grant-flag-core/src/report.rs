use std::fmt::Write;

use regex::RegexBuilder;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::{
    aggregate::{Analysis, RankedAward},
    award::AwardRecord,
    classifier::MatchMode,
    vocabulary::Phrase,
};

pub const DEFAULT_TITLE: &str = "NSF Awards Analysis Report";

/// Format styles supported by [`render_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Presentation-neutral result of one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub title: String,
    pub records_scanned: usize,
    pub distinct_matches: usize,
    pub total_funding: Decimal,
    /// Tiers with at least one match, in tier order.
    pub sections: Vec<ReportSection>,
    /// Selected tiers that matched nothing.
    pub empty_tiers: Vec<String>,
    /// Highest-funded matches across all tiers; empty unless requested.
    pub top: Vec<ReportLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
    pub tier: String,
    pub total_funding: Decimal,
    pub count: usize,
    pub lines: Vec<ReportLine>,
}

/// One award as shown to the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLine {
    pub rank: usize,
    pub id: String,
    pub title: String,
    pub awardee: String,
    pub funding: Decimal,
    pub abstract_text: String,
    /// Abstract with every matched phrase wrapped in `**`.
    pub highlighted_abstract: String,
    pub matched_phrases: Vec<String>,
}

impl ReportLine {
    fn new(rank: usize, record: &AwardRecord, matched: &[Phrase], mode: MatchMode) -> Self {
        Self {
            rank,
            id: record.id.clone(),
            title: record.title.clone(),
            awardee: record.awardee.clone(),
            funding: record.funding,
            abstract_text: record.abstract_text.clone(),
            highlighted_abstract: highlight(&record.abstract_text, matched, mode),
            matched_phrases: matched.iter().map(|p| p.text().to_string()).collect(),
        }
    }

    fn from_ranked(award: &RankedAward<'_>, mode: MatchMode) -> Self {
        Self::new(award.rank, award.record, &award.matched, mode)
    }
}

impl Report {
    /// Build the report for every non-empty tier of `analysis`.
    pub fn assemble(analysis: &Analysis<'_>) -> Self {
        let mut sections = Vec::new();
        let mut empty_tiers = Vec::new();
        for aggregate in &analysis.tiers {
            if aggregate.is_empty() {
                empty_tiers.push(aggregate.tier.clone());
                continue;
            }
            sections.push(ReportSection {
                tier: aggregate.tier.clone(),
                total_funding: aggregate.total_funding,
                count: aggregate.count,
                lines: aggregate
                    .matches
                    .iter()
                    .enumerate()
                    .map(|(idx, m)| {
                        ReportLine::new(idx + 1, m.record, &m.matched, analysis.match_mode)
                    })
                    .collect(),
            });
        }
        Self {
            title: DEFAULT_TITLE.to_string(),
            records_scanned: analysis.records_scanned,
            distinct_matches: analysis.distinct_matches,
            total_funding: analysis.total_funding,
            sections,
            empty_tiers,
            top: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Attach the `n` highest-funded matches across all tiers.
    pub fn with_top(mut self, analysis: &Analysis<'_>, n: usize) -> Self {
        self.top = analysis
            .top_n(n)
            .iter()
            .map(|award| ReportLine::from_ranked(award, analysis.match_mode))
            .collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Shorthand for [`Report::assemble`].
pub fn assemble(analysis: &Analysis<'_>) -> Report {
    Report::assemble(analysis)
}

/// Column widths for the ranked summary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableWidths {
    pub awardee: usize,
    pub title: usize,
}

impl Default for TableWidths {
    fn default() -> Self {
        Self {
            awardee: 20,
            title: 30,
        }
    }
}

/// One row of the ranked summary table, already formatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub rank: usize,
    pub awardee: String,
    pub funding: String,
    pub title: String,
}

pub fn summary_rows(lines: &[ReportLine], widths: TableWidths) -> Vec<SummaryRow> {
    lines
        .iter()
        .map(|line| SummaryRow {
            rank: line.rank,
            awardee: truncate_chars(&line.awardee, widths.awardee),
            funding: format_currency(line.funding),
            title: truncate_chars(&line.title, widths.title),
        })
        .collect()
}

/// Produce a report string using the desired format.
pub fn render_report(
    report: &Report,
    format: OutputFormat,
    widths: TableWidths,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(report, widths),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

fn render_human(report: &Report, widths: TableWidths) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "{}", report.title)?;
    writeln!(
        out,
        "Scanned {} award(s); {} matched, total funding {}",
        report.records_scanned,
        report.distinct_matches,
        format_currency(report.total_funding)
    )?;

    if report.is_empty() {
        writeln!(out)?;
        writeln!(out, "No matches found.")?;
        return Ok(out);
    }

    for section in &report.sections {
        writeln!(out)?;
        writeln!(out, "{} Matches:", section.tier)?;
        writeln!(out, "{}", "=".repeat(50))?;
        writeln!(out, "Total Funding: {}", format_currency(section.total_funding))?;
        writeln!(out, "Number of Awards: {}", section.count)?;
        writeln!(out)?;
        for line in &section.lines {
            writeln!(out, "Title: {}", line.title)?;
            writeln!(out, "Awardee: {}", line.awardee)?;
            writeln!(out, "Amount: {}", format_currency(line.funding))?;
            writeln!(out, "Abstract: {}", single_line(&line.highlighted_abstract))?;
            writeln!(out, "Matched Words: {}", line.matched_phrases.join(", "))?;
            writeln!(out, "{}", "-".repeat(40))?;
        }
    }

    if !report.empty_tiers.is_empty() {
        writeln!(out)?;
        writeln!(out, "No matches in: {}", report.empty_tiers.join(", "))?;
    }

    if !report.top.is_empty() {
        writeln!(out)?;
        writeln!(out, "Top {} Most-Funded Projects", report.top.len())?;
        writeln!(
            out,
            "{:<4} {:<aw$} {:>16} {}",
            "Rank",
            "Awardee",
            "Funding",
            "Title",
            aw = widths.awardee
        )?;
        for row in summary_rows(&report.top, widths) {
            writeln!(
                out,
                "{:<4} {:<aw$} {:>16} {}",
                row.rank,
                row.awardee,
                row.funding,
                row.title,
                aw = widths.awardee
            )?;
        }
    }

    Ok(out)
}

fn single_line(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}

/// Wrap every case-insensitive occurrence of the matched phrases in `**`.
///
/// Occurrences the match mode rejects stay plain. Overlapping or touching
/// occurrences are marked as one run; the abstract keeps its casing.
pub fn highlight(text: &str, matched: &[Phrase], mode: MatchMode) -> String {
    if matched.is_empty() || text.is_empty() {
        return text.to_string();
    }

    let mut spans = Vec::new();
    for phrase in matched {
        let source = match phrase {
            Phrase::Literal(literal) => regex::escape(literal),
            Phrase::Pattern { pattern } => pattern.clone(),
        };
        let Ok(regex) = RegexBuilder::new(&source).case_insensitive(true).build() else {
            continue;
        };
        let mut from = 0;
        while let Some(hit) = regex.find_at(text, from) {
            if hit.start() < hit.end() && mode.accepts(text, hit.start(), hit.end()) {
                spans.push((hit.start(), hit.end()));
            }
            // Restart one character later so overlapping occurrences are seen.
            match text[hit.start()..].chars().next() {
                Some(c) => from = hit.start() + c.len_utf8(),
                None => break,
            }
        }
    }

    spans.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }

    let mut out = String::with_capacity(text.len() + merged.len() * 4);
    let mut cursor = 0;
    for (start, end) in merged {
        out.push_str(&text[cursor..start]);
        out.push_str("**");
        out.push_str(&text[start..end]);
        out.push_str("**");
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// `$1,234.56`; rounding happens here and nowhere earlier.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let fixed = format!("{:.2}", rounded.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::new();
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${grouped}.{cents}")
}

/// First `width` characters of `text`.
pub fn truncate_chars(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}
