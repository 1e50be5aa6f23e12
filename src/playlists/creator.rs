use super::models::{PlaylistError, PlaylistOutcome, PlaylistRequest};

/// Something that can turn playlist requests into real playlists.
///
/// All requests of one call share a session. One outcome is returned per
/// request, in request order; a failed request never stops the others. An
/// `Err` means the session itself could not be established.
#[cfg_attr(test, mockall::automock)]
pub trait PlaylistCreator {
    fn create_playlists(
        &mut self,
        requests: &[PlaylistRequest],
    ) -> Result<Vec<PlaylistOutcome>, PlaylistError>;
}
