pub mod types;

pub use types::{PlayerError, ScheduleError};
