use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument};

use super::AwardSource;
use crate::award::RawAward;

/// On-disk layouts understood by [`FileAwardSource`] and the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            _ => bail!(
                "unsupported award file {} (expected .csv or .json)",
                path.display()
            ),
        }
    }
}

/// Awards from a single CSV or JSON file; the year is not consulted.
pub struct FileAwardSource {
    path: PathBuf,
}

impl FileAwardSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AwardSource for FileAwardSource {
    #[instrument(name = "load_file", skip(self), fields(path = %self.path.display()))]
    async fn load(&self, _year: u16) -> Result<Vec<RawAward>> {
        read_awards(&self.path)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Read awards from `path`, choosing the parser by extension.
pub fn read_awards(path: &Path) -> Result<Vec<RawAward>> {
    let format = FileFormat::from_path(path)?;
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read award file at {}", path.display()))?;
    let awards = match format {
        FileFormat::Csv => parse_csv(&raw),
        FileFormat::Json => parse_json(&raw),
    }
    .with_context(|| format!("malformed award file at {}", path.display()))?;
    debug!(count = awards.len(), "awards read from file");
    Ok(awards)
}

/// Parse CSV with a header row naming award fields.
pub fn parse_csv(raw: &str) -> Result<Vec<RawAward>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(raw.as_bytes());
    let headers = reader.headers().context("missing CSV header row")?.clone();
    let mut awards = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("invalid CSV row {}", idx + 2))?;
        awards.push(RawAward::from_csv_record(&headers, &record));
    }
    Ok(awards)
}

/// Parse a JSON array of award objects.
pub fn parse_json(raw: &str) -> Result<Vec<RawAward>> {
    serde_json::from_str(raw).context("expected a JSON array of award objects")
}

pub fn write_json(path: &Path, awards: &[RawAward]) -> Result<()> {
    let body = serde_json::to_string_pretty(awards).context("failed to encode awards as JSON")?;
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}

pub fn write_csv(path: &Path, awards: &[RawAward]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    if awards.is_empty() {
        writer.write_record(RawAward::FIELDS)?;
    }
    for award in awards {
        writer
            .serialize(award)
            .with_context(|| format!("failed to write award {} to CSV", award.id))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))
}
