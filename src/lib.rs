// src/lib.rs

pub mod config;
pub mod engine;
pub mod evaluator;
pub mod heuristics;
pub mod llm;
pub mod metrics;
pub mod questions;
pub mod report;
pub mod server;
pub mod store;
