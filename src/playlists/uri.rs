//! Conversion of track locators into the service's native URI form.

use regex::Regex;
use std::sync::LazyLock;

const SPOTIFY_ID_LEN: usize = 22;

static TRACK_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[A-Za-z0-9]+$").expect("Invalid Regex, this should be fixed at compile time.")
});

/// How a music service spells its track URIs and web links.
///
/// A native URI is `{native_prefix}{id}`; a web locator contains
/// `{web_marker}{id}`, optionally followed by a query string or fragment.
/// Ids are alphanumeric and, when `id_len` is set, exactly that long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackUriScheme {
    pub native_prefix: String,
    pub web_marker: String,
    pub id_len: Option<usize>,
}

impl Default for TrackUriScheme {
    fn default() -> Self {
        Self::spotify()
    }
}

impl TrackUriScheme {
    pub fn new(native_prefix: impl Into<String>, web_marker: impl Into<String>) -> Self {
        Self {
            native_prefix: native_prefix.into(),
            web_marker: web_marker.into(),
            id_len: None,
        }
    }

    pub fn with_id_len(mut self, len: usize) -> Self {
        self.id_len = Some(len);
        self
    }

    /// Spotify track ids are 22 base62 characters.
    pub fn spotify() -> Self {
        Self::new("spotify:track:", "open.spotify.com/track/").with_id_len(SPOTIFY_ID_LEN)
    }

    fn is_valid_id(&self, id: &str) -> bool {
        self.id_len.map_or(true, |len| id.len() == len) && TRACK_ID.is_match(id)
    }

    /// The native URI for `locator`, or `None` when it is neither a native
    /// URI nor a recognized web link with a plain alphanumeric id.
    pub fn to_native(&self, locator: &str) -> Option<String> {
        let locator = locator.trim();

        let id = if let Some(id) = locator.strip_prefix(&self.native_prefix) {
            id
        } else {
            let (_, tail) = locator.rsplit_once(&self.web_marker)?;
            tail.split(['?', '#']).next().unwrap_or_default()
        };

        self.is_valid_id(id)
            .then(|| format!("{}{}", self.native_prefix, id))
    }

    pub fn is_native(&self, uri: &str) -> bool {
        uri.strip_prefix(&self.native_prefix)
            .is_some_and(|id| self.is_valid_id(id))
    }
}
