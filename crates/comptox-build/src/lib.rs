//! ComptoxAI build engine: entity resolution and merge.
//!
//! For every incoming row the engine decides whether the row names an entity
//! the graph already holds (merge onto it) or a new one (create it), then
//! links entities with typed relationships:
//!
//! ```text
//!  rows ─▶ SourceImporter ─▶ NodeMerger ─┬─ resolve_any ─▶ GraphStore (read)
//!                                        └─ PropertyApplier ─▶ GraphStore (write)
//!        ─▶ Linker ─▶ resolve ×2 ─▶ edge_exists? ─▶ create_edge (+ inverse)
//!
//!  Orchestrator: topological order over `requires`, one ImportStageResult per
//!  importer, cancellation at row boundaries.
//! ```
//!
//! Re-running the whole pipeline against the same store changes nothing:
//! merges find what the first run created, multi-valued slots suppress
//! duplicates, and edges are written only when absent.

pub mod apply;
pub mod cancel;
pub mod error;
pub mod importer;
pub mod link;
pub mod merge;
pub mod normalize;
pub mod orchestrator;
pub mod resolve;
pub mod summary;

pub use apply::{apply, ApplyOutcome, PropertyApplier};
pub use cancel::CancelToken;
pub use error::BuildError;
pub use importer::{BuildContext, SourceImporter};
pub use link::{split_compound, LinkOutcome, LinkRequest, Linker};
pub use merge::{MergeOutcome, NodeMerger, NodeRecord};
pub use normalize::{local_key, normalize, NormalizeError};
pub use orchestrator::{plan, BuildReport, Orchestrator, StageReport, StageStatus};
pub use resolve::{resolve, resolve_any, MatchKey, Resolution};
pub use summary::ImportStageResult;
