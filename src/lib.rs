//! `mowas-beacon`: a long-running personal warning beacon for the German
//! civil-protection feed (MOWAS/BBK).
//!
//! Split into a thin binary (`src/main.rs`, wiring and startup) and this
//! library, the way the teacher's `tests/specs.rs`/`tests/server.rs`
//! black-box the CLI — here the pipeline's core (lifecycle, matching,
//! enrichment, dispatch) is exposed as a library so `tests/scenarios.rs` can
//! drive it directly against in-memory fixtures, with no network and no
//! subprocess involved.

pub use anyhow::Result;

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod enrich;
pub mod errors;
pub mod feed;
pub mod geomatch;
pub mod grid;
pub mod lifecycle;
pub mod model;
pub mod scheduler;
pub mod warncell;
