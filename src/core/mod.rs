// src/core/mod.rs — Strategies, reconciliation and the task loop

pub mod aggregate;
pub mod driver;
pub mod reconcile;
pub mod record;
pub mod retry;
pub mod strategy;
pub mod types;
