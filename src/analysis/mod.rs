// src/analysis/mod.rs
// The `llm(data, question)` pipeline: a planner pass compiles the question
// into a flat list of typed operations, the runtime executes them
// deterministically, and a reporter pass turns the results into visual
// descriptors plus a summary for the Pilot.

pub mod ops;
pub mod plan;
pub mod preview;
pub mod report;
pub mod runner;
pub mod value;

pub use runner::{AnalysisOutcome, run_analysis};
pub use value::{AnalysisStore, AnalysisValue};
