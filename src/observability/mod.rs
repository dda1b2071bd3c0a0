//! Observability for the variant store
//!
//! - Structured logging (JSON lines, deterministic key order)
//! - Scope-based lifecycle events
//! - Slow-operation warnings
//!
//! # Usage
//!
//! ```ignore
//! use variant_store::observability::{Logger, ObservationScope, Timer};
//!
//! Logger::warn("QUERY_UNSUPPORTED_FILTER", &[("param", "missingAlleles")]);
//!
//! let timer = Timer::new();
//! // ... ALTER ...
//! timer.warn_if_slow("ALTER_ADD", Duration::from_secs(10), &[]);
//! ```

mod logger;
mod scope;

pub use logger::{LogStream, Logger, Severity};
pub use scope::{ObservationScope, Timer, SLOW_OPERATION_EVENT};
