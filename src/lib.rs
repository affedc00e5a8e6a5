//! Batching client for the Droidtown Loki bulk intent-matching API.
//!
//! Free-text input is segmented, chunked to the remote per-request limit,
//! and matched one chunk at a time; each matched intent runs through a
//! registered handler that extracts slot values, and everything folds into
//! one accumulator returned to the caller. All remote failures come back
//! as data, never as errors.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod accumulator;
pub mod batch;
pub mod client;
pub mod config;
pub mod handler;
pub mod logging;
pub mod merge;
