// src/data/mod.rs — Dataset input and result output

pub mod dataset;
pub mod log;
