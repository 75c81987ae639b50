pub mod batch;
pub mod evaluation;
pub mod loaders;
pub mod roster;
pub mod rubric;
pub mod submission;

pub use batch::{BatchRun, BatchSummary, RetryPolicy, UnitFailure, UnitOutcome, UnitReport};
pub use evaluation::{
    CostInfo, CostLedger, EvaluationKey, EvaluationResult, EvaluationStatus, StageScore,
};
pub use loaders::{load_roster, load_rubric, load_submission_units};
pub use roster::{RosterEntry, RosterScope};
pub use rubric::{PerformanceLevel, Rubric, RubricPhase};
pub use submission::{Exercise, ParsedSubmission, SubmissionUnit, UnitKind};
