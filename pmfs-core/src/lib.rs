pub mod ai;
pub mod attachments;
pub mod codec;
pub mod config;
pub mod dedup;
pub mod error;
pub mod export;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod paths;
pub mod reconcile;
pub mod store;
pub mod suggest;

// Re-export commonly used types
pub use ai::{
    AiClient, AiError, AiMode, ExtractionOracle, FnModel, LanguageModel, ModelOracle, Prompt,
    PromptCatalog, SimilarityOracle,
};
pub use config::Config;
pub use dedup::{deduplicate, Deduplicator};
pub use error::{PmfsError, Result};
pub use lifecycle::Analyst;
pub use models::{
    Attachment, ChangeLog, Condition, Database, DesignAspect, GateResult, Intelligence, Product,
    Project, ProjectData, Requirement,
};
pub use notify::{ChangeNotifier, ProjectChanged, Subscription};
pub use paths::Layout;
pub use reconcile::{ImportBatch, ImportMode, ImportReport, ProjectMetadata};
pub use store::Store;
