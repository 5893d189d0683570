#![forbid(unsafe_code)]

pub mod confusion;
pub mod error;
pub mod feedback;
pub mod model;
pub mod policy;
pub mod scheduler;
pub mod time;

pub use confusion::{ConfusionSignal, ConfusionTracker, TurnBranch};
pub use error::{ErrorKind, ValidationError};
pub use time::Clock;
