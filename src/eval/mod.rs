//! Run evaluation: scoring heuristics and the background worker pool

mod dispatcher;
mod scorer;

pub use dispatcher::{evaluate_run, DispatchError, EvalDispatcher, EvalOutcome, JobState};
pub use scorer::{OfflineBasicScorer, ScoreCard, Scorer};
