//! Shared constants for end-to-end tests
//!
//! Fixture songs live here so every test agrees on names, artists and URIs.

use super::fixtures::EmbeddingRow;

// ============================================================================
// Embedding fixtures
// ============================================================================

/// Two well separated moods, four songs each. Calm songs sit near the origin,
/// loud songs near (10, 10).
pub const TWO_MOODS: &[EmbeddingRow] = &[
    EmbeddingRow::new("Still Water", "The Calm", "spotify:track:4uLU6hMCjMI75M1A2tKUQC", &[0.0, 0.1]),
    EmbeddingRow::new("Low Tide", "The Calm", "spotify:track:6rqhFgbbKwnb9MLmUQDhG6", &[0.2, 0.0]),
    EmbeddingRow::new("Fog", "Quiet Hours", "https://open.spotify.com/track/0VjIjW4GlUZAMYd2vXMi3b?si=abc", &[0.1, 0.2]),
    EmbeddingRow::new("Moss", "Quiet Hours", "spotify:track:3n3Ppam7vgaVa1iaRUc9Lp", &[0.3, 0.1]),
    EmbeddingRow::new("Thunder", "Loud Noises", "spotify:track:7qiZfU4dY1lWllzX7mPBI3", &[10.0, 10.1]),
    EmbeddingRow::new("Riot", "Loud Noises", "spotify:track:1zi7xx7UVEFkmKfv06H8x0", &[10.2, 9.9]),
    EmbeddingRow::new("Stampede", "Amplifier", "https://open.spotify.com/track/2takcwOaAZWiXQijPHIx7B", &[9.9, 10.0]),
    EmbeddingRow::new("Avalanche", "Amplifier", "spotify:track:5ChkMS8OtdzJeqyybCc9R5", &[10.1, 10.2]),
];

/// Lyrics-side embeddings for the first six `TWO_MOODS` songs, in a different
/// order. "Stampede" and "Avalanche" are missing here.
pub const TWO_MOODS_LYRICS: &[EmbeddingRow] = &[
    EmbeddingRow::new("Riot", "Loud Noises", "spotify:track:1zi7xx7UVEFkmKfv06H8x0", &[5.0]),
    EmbeddingRow::new("Still Water", "The Calm", "spotify:track:4uLU6hMCjMI75M1A2tKUQC", &[-5.0]),
    EmbeddingRow::new("Low Tide", "The Calm", "spotify:track:6rqhFgbbKwnb9MLmUQDhG6", &[-5.1]),
    EmbeddingRow::new("Fog", "Quiet Hours", "spotify:track:0VjIjW4GlUZAMYd2vXMi3b", &[-4.9]),
    EmbeddingRow::new("Moss", "Quiet Hours", "spotify:track:3n3Ppam7vgaVa1iaRUc9Lp", &[-5.2]),
    EmbeddingRow::new("Thunder", "Loud Noises", "spotify:track:7qiZfU4dY1lWllzX7mPBI3", &[5.1]),
];

pub const CALM_SONGS: [&str; 4] = ["Still Water", "Low Tide", "Fog", "Moss"];
pub const LOUD_SONGS: [&str; 4] = ["Thunder", "Riot", "Stampede", "Avalanche"];

/// Embedding file header.
pub const EMBEDDING_HEADER: &str = "song_name,artist,song_uri,embedding";
