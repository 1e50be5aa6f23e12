//! Common test infrastructure
//!
//! CSV fixture writers and a recording playlist creator shared by the
//! end-to-end tests. Tests should only import from this module.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestWorkspace, TWO_MOODS};
//!
//! #[test]
//! fn test_cluster_two_moods() {
//!     let workspace = TestWorkspace::new();
//!     let path = workspace.write_embeddings("audio.csv", TWO_MOODS);
//!     // ...
//! }
//! ```

#![allow(dead_code)]

mod constants;
mod fixtures;
mod recorder;

// Public API - this is what tests import
pub use constants::*;
pub use fixtures::{EmbeddingRow, TestWorkspace};
pub use recorder::RecordingCreator;
