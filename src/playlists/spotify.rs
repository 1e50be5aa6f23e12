//! Spotify Web API session implementing [`PlaylistCreator`].
//!
//! Authentication tries, in order: a ready access token, a refresh token
//! exchanged with the client credentials, and finally the interactive
//! authorization-code flow (the user opens a URL and pastes back the code).

use super::creator::PlaylistCreator;
use super::models::{CreatedPlaylist, PlaylistError, PlaylistFailure, PlaylistOutcome, PlaylistRequest};
use super::uri::TrackUriScheme;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tracing::{debug, error, info};

const API_BASE: &str = "https://api.spotify.com/v1";
const ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
const SCOPES: &str = "playlist-modify-public playlist-modify-private";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8888/callback";

/// The service accepts at most this many tracks per add request.
pub const MAX_TRACKS_PER_REQUEST: usize = 100;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpotifyCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SpotifyCredentials {
    pub fn redirect_uri(&self) -> &str {
        self.redirect_uri.as_deref().unwrap_or(DEFAULT_REDIRECT_URI)
    }

    fn client_pair(&self) -> Result<(&str, &str), PlaylistError> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Ok((id, secret)),
            _ => Err(PlaylistError::MissingCredentials(
                "SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set".to_string(),
            )),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserResponse {
    id: String,
}

#[derive(Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistResponse {
    id: String,
    name: String,
    external_urls: Option<ExternalUrls>,
}

/// `true` for `spotify:track:` followed by a 22 character alphanumeric id.
pub fn is_valid_spotify_uri(uri: &str) -> bool {
    TrackUriScheme::spotify().is_native(uri)
}

/// Pull the authorization code out of whatever the user pasted: either the
/// bare code or the full redirect URL.
fn extract_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match input.split_once('?') {
        Some((_, query)) => query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "code")
            .and_then(|(_, value)| urlencoding::decode(value).ok())
            .map(|value| value.into_owned()),
        None => Some(input.to_string()),
    }
}

fn check_status(response: Response) -> Result<Response, PlaylistError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(PlaylistError::Api {
        status: status.as_u16(),
        body,
    })
}

pub struct SpotifySession {
    client: Client,
    credentials: SpotifyCredentials,
    api_base: String,
    accounts_base: String,
    access_token: Option<String>,
    user_id: Option<String>,
}

impl SpotifySession {
    pub fn new(credentials: SpotifyCredentials, timeout: Duration) -> Result<Self, PlaylistError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            credentials,
            api_base: API_BASE.to_string(),
            accounts_base: ACCOUNTS_BASE.to_string(),
            access_token: None,
            user_id: None,
        })
    }

    pub fn authorize_url(&self) -> Result<String, PlaylistError> {
        let (client_id, _) = self.credentials.client_pair()?;
        Ok(format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}",
            self.accounts_base,
            urlencoding::encode(client_id),
            urlencoding::encode(self.credentials.redirect_uri()),
            urlencoding::encode(SCOPES)
        ))
    }

    fn request_token(&self, params: &[(&str, &str)]) -> Result<String, PlaylistError> {
        let (client_id, client_secret) = self.credentials.client_pair()?;
        let response = self
            .client
            .post(format!("{}/api/token", self.accounts_base))
            .basic_auth(client_id, Some(client_secret))
            .form(params)
            .send()?;
        let token: TokenResponse = check_status(response)
            .map_err(|e| PlaylistError::Authentication(e.to_string()))?
            .json()?;
        Ok(token.access_token)
    }

    fn authorization_code_flow(&self) -> Result<String, PlaylistError> {
        let url = self.authorize_url()?;
        println!("Open this URL in your browser to authorize playlist creation:");
        println!();
        println!("  {}", url);
        println!();
        print!("Paste the code (or the full redirect URL) here: ");
        io::stdout().flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        let code = extract_code(&line).ok_or_else(|| {
            PlaylistError::Authentication("no authorization code provided".to_string())
        })?;

        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", self.credentials.redirect_uri()),
        ])
    }

    fn authenticate(&mut self) -> Result<String, PlaylistError> {
        if let Some(token) = &self.access_token {
            return Ok(token.clone());
        }

        let token = if let Some(token) = self.credentials.access_token.clone() {
            debug!("Using provided Spotify access token");
            token
        } else if let Some(refresh) = self.credentials.refresh_token.clone() {
            info!("Refreshing Spotify access token");
            self.request_token(&[("grant_type", "refresh_token"), ("refresh_token", &refresh)])?
        } else {
            self.authorization_code_flow()?
        };

        self.access_token = Some(token.clone());
        Ok(token)
    }

    fn current_user(&mut self, token: &str) -> Result<String, PlaylistError> {
        if let Some(id) = &self.user_id {
            return Ok(id.clone());
        }

        let response = self
            .client
            .get(format!("{}/me", self.api_base))
            .bearer_auth(token)
            .send()?;
        let user: UserResponse = check_status(response)
            .map_err(|e| PlaylistError::Authentication(e.to_string()))?
            .json()?;

        info!("Authenticated as Spotify user {}", user.id);
        self.user_id = Some(user.id.clone());
        Ok(user.id)
    }

    fn create_one(
        &self,
        token: &str,
        user_id: &str,
        request: &PlaylistRequest,
    ) -> Result<CreatedPlaylist, PlaylistError> {
        let invalid: Vec<String> = request
            .track_uris
            .iter()
            .filter(|uri| !is_valid_spotify_uri(uri))
            .cloned()
            .collect();
        if !invalid.is_empty() {
            return Err(PlaylistError::InvalidTrackUris(invalid));
        }

        let response = self
            .client
            .post(format!(
                "{}/users/{}/playlists",
                self.api_base,
                urlencoding::encode(user_id)
            ))
            .bearer_auth(token)
            .json(&json!({
                "name": request.name,
                "description": request.description,
                "public": request.public,
            }))
            .send()?;
        let playlist: PlaylistResponse = check_status(response)?.json()?;

        let mut tracks_added = 0;
        for chunk in request.track_uris.chunks(MAX_TRACKS_PER_REQUEST) {
            let response = self
                .client
                .post(format!("{}/playlists/{}/tracks", self.api_base, playlist.id))
                .bearer_auth(token)
                .json(&json!({ "uris": chunk }))
                .send()?;
            check_status(response)?;
            tracks_added += chunk.len();
            debug!("Added {} tracks to playlist {}", tracks_added, playlist.id);
        }

        Ok(CreatedPlaylist {
            id: playlist.id,
            name: playlist.name,
            url: playlist.external_urls.and_then(|urls| urls.spotify),
            tracks_added,
        })
    }
}

impl PlaylistCreator for SpotifySession {
    fn create_playlists(
        &mut self,
        requests: &[PlaylistRequest],
    ) -> Result<Vec<PlaylistOutcome>, PlaylistError> {
        let token = self.authenticate()?;
        let user_id = self.current_user(&token)?;

        let outcomes = requests
            .iter()
            .map(|request| {
                self.create_one(&token, &user_id, request).map_err(|e| {
                    error!("Failed to create playlist '{}': {}", request.name, e);
                    PlaylistFailure {
                        name: request.name.clone(),
                        error: e.to_string(),
                    }
                })
            })
            .collect();

        Ok(outcomes)
    }
}
