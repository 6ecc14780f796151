//! `crossfund-linkage`: cross-source identity association engine.
//!
//! Pure engine crate: receives canonical bank, IM-payment, wallet-payment
//! and call records, returns canonical identities, cash classifications,
//! ranked association edges and amount highlights. Report rendering lives
//! elsewhere.

pub mod associate;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod highlight;
pub mod identity;
pub mod ingest;
pub mod model;
pub mod normalize;
pub mod rank;
pub mod summary;
pub mod timestamp;
pub mod union_find;

pub use config::AnalysisConfig;
pub use engine::run;
pub use error::{Diagnostic, LinkageError};
pub use ingest::{load_csv_file, load_csv_records};
pub use model::{
    AmountHighlight, AnalysisInput, AnalysisResult, AssociationEdge, CanonicalIdentity,
    CashClassification, CashLabel, RawRecord, Source,
};
