//! SkuMap Common Library
//!
//! Shared code for the SkuMap services including:
//! - Catalog models and repository patterns
//! - SKU similarity scoring and batch detection
//! - CSV/JSON interchange of the catalog
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod interchange;
pub mod matching;
pub mod metrics;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, MappingWithVariations, Repository};
pub use errors::{AppError, Result};
pub use matching::{DetectionEngine, DetectionResult};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
