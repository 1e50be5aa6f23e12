//! Playlist materialization: cluster rows in, playlists on the music
//! service out.

mod creator;
mod materializer;
mod models;
mod spotify;
mod uri;

pub use creator::PlaylistCreator;
pub use materializer::{
    build_playlist_requests, materialize_playlists, playlist_description, ClusterPlaylistResult,
    InvalidTrackUri, MaterializeOptions, MaterializeSummary, PlannedPlaylist, PlaylistPlan,
};
pub use models::{CreatedPlaylist, PlaylistError, PlaylistFailure, PlaylistOutcome, PlaylistRequest};
pub use spotify::{
    is_valid_spotify_uri, SpotifyCredentials, SpotifySession, DEFAULT_REDIRECT_URI,
    MAX_TRACKS_PER_REQUEST,
};
pub use uri::TrackUriScheme;
