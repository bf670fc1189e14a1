pub mod average;
pub mod custom;
pub mod db;
pub mod error;
pub mod impact;
pub mod models;
pub mod period;
pub mod report;
pub mod score;
pub mod tree;

#[cfg(test)]
mod testing;

pub use average::{compute_average, AverageCalculator, CoefficientPolicy, OwnCoefficients};
pub use custom::{compute_custom_average, main_custom_average};
pub use error::{EngineError, Result, TreeDefect};
pub use impact::{grade_impact, what_if, GradeEdit, Impact, Scope};
pub use score::Score;
pub use tree::SubjectTree;
