use std::{fs::File, io::BufWriter, path::Path};

use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};
use tracing::{info, instrument};

use crate::{
    error::ExportError,
    report::{format_currency, summary_rows, Report, ReportLine, TableWidths},
};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const PT_TO_MM: f32 = 0.3528;
/// Average Helvetica glyph width as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.5;

/// Replace characters the built-in PDF fonts cannot encode with `?`.
pub fn to_latin1(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '\r')
        .map(|c| match c {
            '\t' => ' ',
            c if (c as u32) < 0x20 && c != '\n' => '?',
            c if (c as u32) <= 0xFF => c,
            _ => '?',
        })
        .collect()
}

/// Greedy word wrap to at most `max_chars` characters per line.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word.to_string();
            while word.chars().count() > max_chars {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let head: String = word.chars().take(max_chars).collect();
                word = word.chars().skip(max_chars).collect();
                lines.push(head);
            }
            let needed = current.chars().count()
                + word.chars().count()
                + usize::from(!current.is_empty());
            if needed > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        lines.push(current);
    }
    lines
}

struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, ExportError> {
        let (doc, page, layer) =
            PdfDocument::new(to_latin1(title), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|err| ExportError::Layout(format!("{err:?}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|err| ExportError::Layout(format!("{err:?}")))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn line_height(size: f32) -> f32 {
        size * PT_TO_MM * 1.5
    }

    fn ensure_room(&mut self, size: f32) {
        if self.y - Self::line_height(size) < MARGIN {
            self.new_page();
        }
    }

    fn text_at(&self, text: &str, size: f32, bold: bool, x: f32) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer
            .use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn advance(&mut self, size: f32) {
        self.y -= Self::line_height(size);
    }

    fn heading(&mut self, text: &str, size: f32) {
        let text = to_latin1(text);
        self.ensure_room(size);
        let width = text.chars().count() as f32 * size * PT_TO_MM * GLYPH_WIDTH;
        let x = ((PAGE_WIDTH - width) / 2.0).max(MARGIN);
        self.advance(size);
        self.text_at(&text, size, true, x);
        self.advance(size * 0.5);
    }

    fn paragraph(&mut self, text: &str, size: f32, bold: bool) {
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        let max_chars = (usable / (size * PT_TO_MM * GLYPH_WIDTH)).floor().max(10.0) as usize;
        for line in wrap(&to_latin1(text), max_chars) {
            self.ensure_room(size);
            self.advance(size);
            self.text_at(&line, size, bold, MARGIN);
        }
    }

    fn row(&mut self, cells: &[(&str, f32)], size: f32, bold: bool) {
        self.ensure_room(size);
        self.advance(size);
        for (text, x) in cells {
            self.text_at(&to_latin1(text), size, bold, *x);
        }
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn save(self, path: &Path) -> Result<(), ExportError> {
        let io_error = |source| ExportError::Io {
            path: path.display().to_string(),
            source,
        };
        let file = File::create(path).map_err(io_error)?;
        self.doc
            .save(&mut BufWriter::new(file))
            .map_err(|err| ExportError::Layout(format!("{err:?}")))
    }
}

const COLUMNS: [f32; 4] = [MARGIN, MARGIN + 15.0, MARGIN + 65.0, MARGIN + 105.0];

/// Write `report` as a PDF: summary page with the ranked table, then the
/// full abstracts of the ranked awards (or of every match when no ranking
/// was attached).
#[instrument(name = "export_pdf", skip_all, fields(path = %path.display()))]
pub fn write_pdf(report: &Report, path: &Path, widths: TableWidths) -> Result<(), ExportError> {
    if report.is_empty() {
        return Err(ExportError::Empty);
    }

    let detail: Vec<&ReportLine> = if report.top.is_empty() {
        report.sections.iter().flat_map(|s| &s.lines).collect()
    } else {
        report.top.iter().collect()
    };

    let mut pdf = PageWriter::new(&report.title)?;
    pdf.heading(&report.title, 16.0);
    pdf.paragraph(
        &format!(
            "{} award(s) scanned, {} matched, total funding {}",
            report.records_scanned,
            report.distinct_matches,
            format_currency(report.total_funding)
        ),
        11.0,
        false,
    );
    pdf.gap(4.0);

    for section in &report.sections {
        pdf.paragraph(
            &format!(
                "{}: {} award(s), {}",
                section.tier,
                section.count,
                format_currency(section.total_funding)
            ),
            11.0,
            false,
        );
    }
    if !report.empty_tiers.is_empty() {
        pdf.paragraph(
            &format!("No matches in: {}", report.empty_tiers.join(", ")),
            11.0,
            false,
        );
    }

    if !report.top.is_empty() {
        pdf.gap(6.0);
        pdf.heading(
            &format!("Top {} Most-Funded Projects", report.top.len()),
            14.0,
        );
        let header = [
            ("Rank", COLUMNS[0]),
            ("Awardee", COLUMNS[1]),
            ("Funding", COLUMNS[2]),
            ("Title", COLUMNS[3]),
        ];
        pdf.row(&header, 11.0, true);
        for row in summary_rows(&report.top, widths) {
            let rank = row.rank.to_string();
            pdf.row(
                &[
                    (rank.as_str(), COLUMNS[0]),
                    (row.awardee.as_str(), COLUMNS[1]),
                    (row.funding.as_str(), COLUMNS[2]),
                    (row.title.as_str(), COLUMNS[3]),
                ],
                10.0,
                false,
            );
        }
    }

    pdf.new_page();
    pdf.heading("Full Abstracts", 16.0);
    for (idx, line) in detail.iter().enumerate() {
        pdf.paragraph(&format!("{}. {}", idx + 1, line.title), 12.0, true);
        pdf.paragraph(&format!("Awardee: {}", line.awardee), 11.0, false);
        pdf.paragraph(
            &format!("Funding: {}", format_currency(line.funding)),
            11.0,
            false,
        );
        if !line.matched_phrases.is_empty() {
            pdf.paragraph(
                &format!("Matched: {}", line.matched_phrases.join(", ")),
                11.0,
                false,
            );
        }
        pdf.paragraph("Abstract:", 11.0, false);
        pdf.paragraph(&line.abstract_text, 11.0, false);
        pdf.gap(5.0);
    }

    pdf.save(path)?;
    info!(entries = detail.len(), "report exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        award::{AwardDetails, AwardRecord},
        classifier::MatchMode,
        pipeline::AnalysisContext,
        vocabulary::{Selection, Tier, Vocabulary},
    };
    use rust_decimal::Decimal;
    use std::fs;

    fn report(top: usize) -> Report {
        let vocabulary =
            Vocabulary::new(vec![Tier::literals("DEI", ["equity"]).unwrap()]).unwrap();
        let records = (0..30)
            .map(|i| AwardRecord {
                ordinal: i,
                id: i.to_string(),
                title: format!("Project {i} on équité and equity"),
                awardee: "Zürich – Institute ✓".into(),
                abstract_text: "equity ".repeat(200),
                funding: Decimal::new(1000 + i as i64, 0),
                details: AwardDetails::default(),
            })
            .collect();
        let ctx = AnalysisContext::new(records, vocabulary, MatchMode::Substring);
        let analysis = ctx.run(&Selection::all()).unwrap();
        Report::assemble(&analysis).with_top(&analysis, top)
    }

    #[test]
    fn writes_a_multi_page_pdf() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("report.pdf");
        write_pdf(&report(10), &path, TableWidths::default()).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn empty_reports_are_rejected() {
        let mut empty = report(0);
        empty.sections.clear();
        let temp = tempfile::tempdir().unwrap();
        let err = write_pdf(&empty, &temp.path().join("x.pdf"), TableWidths::default())
            .unwrap_err();
        assert!(matches!(err, ExportError::Empty));
    }

    #[test]
    fn unwritable_paths_report_the_cause() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("missing-dir").join("report.pdf");
        let err = write_pdf(&report(3), &path, TableWidths::default()).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
        assert!(err.to_string().contains("missing-dir"));
    }

    #[test]
    fn latin1_fallback_substitutes_unencodable_characters() {
        assert_eq!(to_latin1("Zürich – ✓\tok\r\n"), "Zürich ? ? ok\n");
    }

    #[test]
    fn wraps_on_word_boundaries_and_splits_long_words() {
        let lines = wrap("alpha beta gamma\nabcdefghijkl", 10);
        assert_eq!(lines, vec!["alpha beta", "gamma", "abcdefghij", "kl"]);
    }
}
