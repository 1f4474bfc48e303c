use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, instrument, warn};

use super::{
    file_source::{read_awards, write_csv, write_json},
    AwardSource,
};
use crate::award::RawAward;

/// Write-through cache in front of another source, one folder per year.
///
/// Layout: `<dir>/awards_<year>/<year>_awards.json` plus a `.csv` twin.
/// A readable cache short-circuits the inner source; an unreadable one is
/// logged and refetched. Cache write failures never fail the load.
pub struct CachedSource<S> {
    inner: S,
    dir: PathBuf,
    refresh: bool,
}

impl<S: AwardSource> CachedSource<S> {
    pub fn new(inner: S, dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            dir: dir.into(),
            refresh: false,
        }
    }

    /// Ignore existing cache entries (they are still rewritten after fetching).
    pub fn refreshing(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn folder(&self, year: u16) -> PathBuf {
        self.dir.join(format!("awards_{year}"))
    }

    pub fn json_path(&self, year: u16) -> PathBuf {
        self.folder(year).join(format!("{year}_awards.json"))
    }

    pub fn csv_path(&self, year: u16) -> PathBuf {
        self.folder(year).join(format!("{year}_awards.csv"))
    }

    /// Cached awards for `year`, `None` when nothing usable is stored.
    pub fn read_cached(&self, year: u16) -> Option<Vec<RawAward>> {
        let candidates = [self.json_path(year), self.csv_path(year)];
        let path = candidates.iter().find(|path| path.exists())?;
        match read_awards(path) {
            Ok(awards) => {
                info!(path = %path.display(), count = awards.len(), "loaded awards from cache");
                Some(awards)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %format!("{err:#}"), "error reading cached data; refetching");
                None
            }
        }
    }

    pub fn store(&self, year: u16, awards: &[RawAward]) -> Result<()> {
        let folder = self.folder(year);
        fs::create_dir_all(&folder)
            .with_context(|| format!("failed to create cache folder {}", folder.display()))?;
        write_json(&self.json_path(year), awards)?;
        write_csv(&self.csv_path(year), awards)?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl<S: AwardSource> AwardSource for CachedSource<S> {
    #[instrument(name = "load_cached", skip(self), fields(dir = %self.dir.display()))]
    async fn load(&self, year: u16) -> Result<Vec<RawAward>> {
        if !self.refresh {
            if let Some(awards) = self.read_cached(year) {
                return Ok(awards);
            }
        }

        info!(source = %self.inner.describe(), "no usable cache; fetching");
        let awards = self.inner.load(year).await?;
        if awards.is_empty() {
            return Ok(awards);
        }
        match self.store(year, &awards) {
            Ok(()) => info!(count = awards.len(), path = %self.json_path(year).display(), "cached awards for future use"),
            Err(err) => warn!(error = %format!("{err:#}"), "could not cache data"),
        }
        Ok(awards)
    }

    fn describe(&self) -> String {
        format!("{} (cached in {})", self.inner.describe(), self.dir.display())
    }
}
