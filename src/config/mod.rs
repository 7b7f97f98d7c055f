//! Configuration for capture runs
//!
//! This module provides the `CaptureJob` struct, its type-safe builder and the
//! interaction policy with its JSON override.

pub mod builder;
pub mod policy;
pub mod types;

pub use builder::{CaptureJobBuilder, Complete, WithOutputDir};
pub use policy::InteractionPolicy;
pub use types::{CaptureJob, CaptureMode, ScrollStrategy};
