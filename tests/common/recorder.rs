//! A playlist creator that records what it was asked to create.

use playlist_clusterer::playlists::{
    CreatedPlaylist, PlaylistCreator, PlaylistError, PlaylistFailure, PlaylistOutcome,
    PlaylistRequest,
};

#[derive(Debug, Default)]
pub struct RecordingCreator {
    /// Every batch received, one entry per session call.
    pub batches: Vec<Vec<PlaylistRequest>>,
    /// Requests whose name is listed here fail.
    pub failing_names: Vec<String>,
}

impl RecordingCreator {
    pub fn failing(names: &[&str]) -> Self {
        Self {
            batches: Vec::new(),
            failing_names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn requests(&self) -> Vec<&PlaylistRequest> {
        self.batches.iter().flatten().collect()
    }
}

impl PlaylistCreator for RecordingCreator {
    fn create_playlists(
        &mut self,
        requests: &[PlaylistRequest],
    ) -> Result<Vec<PlaylistOutcome>, PlaylistError> {
        self.batches.push(requests.to_vec());

        Ok(requests
            .iter()
            .enumerate()
            .map(|(i, request)| {
                if self.failing_names.contains(&request.name) {
                    Err(PlaylistFailure {
                        name: request.name.clone(),
                        error: "rejected by test".to_string(),
                    })
                } else {
                    Ok(CreatedPlaylist {
                        id: format!("playlist-{}", i),
                        name: request.name.clone(),
                        url: Some(format!("https://open.spotify.com/playlist/playlist-{}", i)),
                        tracks_added: request.track_uris.len(),
                    })
                }
            })
            .collect())
    }
}
