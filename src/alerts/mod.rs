//! Threshold alerting
//!
//! Periodically checks the latest value of each tracked signal against a
//! condition and notifies each new breach once.

pub mod checker;
pub mod condition;

pub use checker::{AlertChecker, CheckerConfig, CheckerHandle, TickReport};
pub use condition::{Comparison, Condition};
