pub mod asset_store;
pub mod browser;
pub mod capture_engine;
pub mod config;
pub mod crawl_frontier;
pub mod dom_rewriter;
pub mod interaction;
pub mod network_recorder;
pub mod offline_runtime;
pub mod single_file;
pub mod utils;

pub use asset_store::AssetResolver;
pub use browser::{ChromiumDriver, DriverError, DriverResult, PageDriver};
pub use capture_engine::{
    CaptureError, CaptureReport, CaptureResult, CaptureSession, CaptureState, LogProgress,
    NoOpProgress, PageOutput, ProgressReporter, capture, capture_with_progress,
};
pub use config::{CaptureJob, CaptureMode, InteractionPolicy, ScrollStrategy};
pub use crawl_frontier::CrawlFrontier;
pub use dom_rewriter::DomRewriter;
pub use interaction::{ActionKind, ActionLog, InteractionAction, InteractionEngine};
pub use network_recorder::{NetworkRecorder, ObservedResponse, ResponseSubscription};
