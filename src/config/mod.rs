//! Configuration module for ngramlab
//!
//! This module handles:
//! - Ingest settings (batch size, token length limit, total-count policy)
//! - Evaluation settings (sentence limits, factors, result filters)
//! - Loading `ngramlab.toml` / `.ngramlabrc.json`

mod lab_config;

pub use lab_config::{
    load_config, EvalConfig, IngestConfig, LabConfig, TotalTokenPolicy, DEFAULT_EVAL_FACTORS,
};
