//! Playlist Clusterer Library
//!
//! Groups songs by their embeddings and turns the groups into playlists.
//! The modules are exposed for the binary and the integration tests.

pub mod cli_style;
pub mod clustering;
pub mod config;
pub mod pipeline;
pub mod playlists;
pub mod report;
pub mod tracks;
