pub mod task;

pub use task::{TaskOutcome, TaskRecord, TaskState, UnknownTaskState};
