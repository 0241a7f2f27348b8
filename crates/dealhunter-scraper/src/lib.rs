pub mod analyze;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fallback;
pub(crate) mod heuristics;
pub mod matcher;
pub mod page;
pub mod price;
pub(crate) mod retry;
pub mod session;
pub mod shipping;

pub use analyze::{Analyzer, ModelAnalyzer, PatternAnalyzer, ProductAnalyzer};
pub use engine::{Engine, EngineSettings};
pub use error::EngineError;
pub use extract::extract_fields;
pub use fallback::{extract_static, HttpFetcher};
pub use matcher::{match_listing, search_across_retailers, similarity, SearchSettings};
pub use page::{ImageInfo, RenderedPage};
pub use session::{
    ChromiumProvider, ChromiumSession, ChromiumSettings, LaunchCandidate, LoadSignal, Navigation,
    Session, SessionProvider,
};
