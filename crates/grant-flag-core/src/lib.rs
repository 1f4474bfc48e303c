pub mod aggregate;
pub mod award;
pub mod classifier;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod report;
pub mod settings;
pub mod source;
pub mod vocabulary;

pub use aggregate::{aggregate, top_n, Analysis, MatchResult, RankedAward, TierAggregate};
pub use award::{parse_amount, AwardRecord, FundingField, RawAward};
pub use classifier::{Classification, Classifier, MatchMode};
pub use error::{AnalysisError, ExportError};
pub use pipeline::AnalysisContext;
pub use report::{render_report, OutputFormat, Report, TableWidths};
pub use settings::AppSettings;
pub use source::{AwardSource, CachedSource, FileAwardSource, NsfApiSource};
pub use vocabulary::{
    loader::{load_or_builtin, load_vocabulary},
    Phrase, Selection, SelectionError, Tier, Vocabulary, VocabularyError,
};
