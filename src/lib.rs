// src/lib.rs — Library root for mathsel

pub mod cli;
pub mod core;
pub mod data;
pub mod evaluator;
pub mod infra;
pub mod prompts;
pub mod provider;
