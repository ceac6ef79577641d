//! Badges, achievements and challenges.
//!
//! Evaluation is batched per dirty kid by [`GamificationEngine`]. The
//! submodules hold the per-record rules and stay free of store access, except
//! [`awards`], which applies award manifests.

pub mod achievements;
pub mod awards;
pub mod cumulative;
mod engine;
pub mod periodic;

pub use engine::GamificationEngine;
