// ApexSEO: similarity and scoring engine for site content analysis
//
// This is the library root. Each module corresponds to a major subsystem
// of the analysis pipeline.

pub mod cannibalization;
pub mod cluster;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod output;
pub mod pipeline;
pub mod scoring;
pub mod status;
pub mod vector;
