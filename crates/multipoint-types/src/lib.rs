// ─────────────────────────────────────────────────────────────────────
// Motor MDO — Multipoint Aggregation Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Type definitions, configuration, and error hierarchy for the
//! multipoint aggregation kernel.

pub mod config;
pub mod error;
pub mod stack;

pub use config::{AggregatorConfig, AggregatorKind, ExpShift, HarmonicMode};
pub use error::{AggregationError, AggregationResult};
pub use stack::MultipointStack;
