//! The quantum-branching turn pipeline.
//!
//! Dataflow: managers/store -> manifest builder -> (predictor, anticipation
//! loop) -> branch generator -> validators -> branch cache. At turn time:
//! player input -> matcher -> cache -> collapse -> dice + managers ->
//! narrative out.

pub mod anticipation;
pub mod cache;
pub mod collapse;
pub mod generator;
pub mod matcher;
pub mod oracle;
pub mod predictor;
pub mod tools;
pub mod turn;
pub mod validators;

#[cfg(test)]
mod e2e_tests;

pub use anticipation::{AnticipationConfig, AnticipationHandle, AnticipationLoop};
pub use cache::BranchCache;
pub use collapse::{CollapseError, CollapseManager, CollapseOutcome};
pub use generator::{BranchGenerator, GeneratorError};
pub use matcher::ActionMatcher;
pub use oracle::GmDecisionOracle;
pub use predictor::ActionPredictor;
pub use turn::TurnPipeline;
pub use validators::{BranchValidator, DeltaValidator, NarrativeValidator, ValidationIssue};
