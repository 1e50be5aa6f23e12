use serde::Serialize;
use thiserror::Error;

/// A playlist to be created from one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistRequest {
    pub name: String,
    /// Native track URIs, in table order.
    pub track_uris: Vec<String>,
    pub description: String,
    pub public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedPlaylist {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub tracks_added: usize,
}

/// A request that the service did not fulfil.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistFailure {
    pub name: String,
    pub error: String,
}

pub type PlaylistOutcome = Result<CreatedPlaylist, PlaylistFailure>;

/// Session-level failures: nothing could be submitted.
#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid track URIs: {0:?}")]
    InvalidTrackUris(Vec<String>),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Service responded with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
