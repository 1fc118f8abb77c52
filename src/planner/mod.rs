//! Session-level engine object, view filtering, and cast plans.

pub mod filter;
pub mod plan;
pub mod state;

pub use filter::BuffFilter;
pub use plan::{build_plan, write_csv, BuffOutcome, BuffReport, CastPlan, CastRequest};
pub use state::{BufferState, HostSignal};
