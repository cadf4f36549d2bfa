//! Draft synchronization: optimistic local mutation, remote convergence.

mod manager;
mod session;

pub use manager::{PayOutcome, SplitStore, DEFAULT_DEBOUNCE};
