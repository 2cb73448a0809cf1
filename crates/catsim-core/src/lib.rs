//! catsim-core: adaptive testing simulation engine.
//!
//! This crate provides the 2PL response model, response simulation, MLE and
//! WLE ability estimation, maximum-information item selection, the adaptive
//! session loop, aggregate statistics, configuration parsing, and the batch
//! engine that runs many sessions concurrently.

pub mod config;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod irt;
pub mod model;
pub mod parser;
pub mod report;
pub mod selector;
pub mod session;
pub mod simulator;
pub mod statistics;
