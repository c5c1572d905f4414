//! Analytics module
//!
//! Provides:
//! - Conversion counts and rates per marketing dimension
//! - Plain-text conversion reports

pub mod conversion;

pub use conversion::{conversion_rate, summarize, ConversionRow, ConversionSummary};
