//! Barrage traffic generation
//!
//! An attack cycle sends requests against one [`AttackTarget`] at a fixed
//! rate for a fixed duration and returns one [`Outcome`] per request, in
//! completion order. Targets are validated when they are built, so a cycle
//! itself never fails: transport errors and non-2xx answers are outcomes.
//!
//! [`Outcome`]: barrage_types::Outcome

pub mod generator;
pub mod summary;
pub mod target;

pub use generator::{planned_hits, AttackerConfig, HttpAttacker, TrafficGenerator};
pub use summary::CycleSummary;
pub use target::AttackTarget;
