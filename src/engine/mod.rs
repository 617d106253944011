//! Core engine — the discover → enrich → merge run.

pub mod scanner;
pub mod enricher;
pub mod merger;
pub mod pipeline;
