// src/core/mod.rs

// The analysis engine. Everything below `core` is free of presentation
// concerns; the binary only formats what `Analyzer` returns.

/// Data structures shared by every stage, from `AnalysisTarget` to
/// `AnalysisRecord`.
pub mod models;

pub mod error;
pub mod clock;

pub mod rate_limiter;
pub mod cache;

/// Concurrent signal sources (DNS, TLS, HEAD, redirects, timing, WHOIS).
pub mod scanner;

pub mod typosquat;
pub mod fingerprint;
pub mod risk;

/// Request orchestration: validation, caching, admission, fan-out, scoring.
pub mod analyzer;
