pub mod analyze;
pub mod task;
