//! rateio-sync: client-side state store for splitting shared bills.
//!
//! The crate centers on [`SplitStore`], a reconciler that owns one mutable
//! split draft in memory, applies local mutations optimistically, and
//! converges the draft with a remote HTTP authority under debouncing,
//! in-flight request deduplication, and a participants-before-items
//! ordering constraint.

pub mod api;
pub mod config;
pub mod model;
pub mod sync;

pub use api::{ApiError, HttpSplitApi, SplitApi, TokenProvider};
pub use config::ApiConfig;
pub use model::{AllocationMode, Draft, Extra, ExtraKind, Item, Participant, Share, SplitStatus};
pub use sync::{PayOutcome, SplitStore};
