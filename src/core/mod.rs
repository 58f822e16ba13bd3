//! Core orchestration for Redfire DTMF

pub mod engine;

pub use engine::{AnalysisReport, DtmfEngine};
