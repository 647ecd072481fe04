//! Data persistence layer
//!
//! SQLite-backed storage for runs, their step traces, and eval history.

mod database;
mod eval;
mod migrations;
mod models;
mod row;
mod run;
mod step;

pub use database::{Database, DatabaseError};
pub use eval::EvalStore;
pub use migrations::MIGRATIONS;
pub use models::{
    Eval, NewEval, NewStep, Run, RunDetail, RunOrigin, RunStatus, RunUpdate, Step, StepType,
    UnknownVariant,
};
pub use run::RunStore;
pub use step::StepStore;

pub(crate) use models::now;
