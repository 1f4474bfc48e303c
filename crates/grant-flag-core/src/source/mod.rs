use anyhow::Result as AnyResult;
use async_trait::async_trait;

use crate::award::RawAward;

pub mod cache;
pub mod file_source;
pub mod nsf_api;

pub use cache::CachedSource;
pub use file_source::FileAwardSource;
pub use nsf_api::NsfApiSource;

/// Supplier of the raw award sequence for one award year.
///
/// Implementations return records in source order and perform a single
/// attempt; failures propagate to the caller.
#[async_trait]
pub trait AwardSource: Send + Sync {
    async fn load(&self, year: u16) -> AnyResult<Vec<RawAward>>;

    /// Short human-readable origin, used in logs and reports.
    fn describe(&self) -> String;
}

#[async_trait]
impl<S: AwardSource + ?Sized> AwardSource for Box<S> {
    async fn load(&self, year: u16) -> AnyResult<Vec<RawAward>> {
        (**self).load(year).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
