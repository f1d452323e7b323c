//!
//! src/fetch.rs
//!
//! Defines methods for hitting the spotify endpoints and parsing
//! search results into flat track records
//!

use reqwest::{Client, header, redirect};
use serde::Deserialize;

use crate::config::{HttpConfig, SpotifyConfig};
use crate::types::TrackRecord;
use crate::EtlError;

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

pub fn base_client(http: &HttpConfig) -> Result<Client, EtlError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_helper(http)
        .default_headers(h)
        .build()
        .map_err(|e| EtlError::Http(format!("build client: {e}")))
}

/// Wire shape of the client-credentials token grant
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Wire shape of GET /v1/search?type=track, trimmed to the fields
/// the extractor maps into TrackRecord
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub tracks: TracksPage,
}

#[derive(Debug, Deserialize)]
pub struct TracksPage {
    pub items: Vec<TrackItem>,
}

#[derive(Debug, Deserialize)]
pub struct TrackItem {
    pub name: String,
    pub artists: Vec<ArtistRef>,
    pub popularity: i64,
}

#[derive(Debug, Deserialize)]
pub struct ArtistRef {
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct SpotifyClient {
    pub http: Client,
    pub cfg: SpotifyConfig
}

impl SpotifyClient {
    pub fn new(http_config: &HttpConfig, cfg: &SpotifyConfig) ->
        Result<Self, EtlError> {

        let http = base_client(http_config)?;
        Ok( Self {
            http,
            cfg: cfg.clone()
        })
    }

    pub fn token_request(&self) -> reqwest::RequestBuilder {
        self.http
            .post(self.cfg.token_url.clone())
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
    }

    /// GET /v1/search?type=track&q=...&limit=
    pub fn search(&self, query: &str, limit: u32, bearer: &str) ->
        reqwest::RequestBuilder {
        let url = self.cfg.api_base.join("search").unwrap();
        self.http.get(url).bearer_auth(bearer).query(&[
            ("type", "track"),
            ("q", query),
            ("limit", &limit.to_string()),
        ])
    }

    /// Exchange client credentials for a bearer token
    pub async fn request_token(&self) -> Result<TokenResponse, EtlError> {
        let response = self.token_request()
            .basic_auth(&self.cfg.client_id, Some(&self.cfg.client_secret))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EtlError::Auth(
                format!("token request failed: {}", response.status())
            ));
        }
        Ok(response.json::<TokenResponse>().await?)
    }

    /// Run a track search and parse the typed page of results
    pub async fn search_tracks(&self, query: &str, limit: u32, bearer: &str) ->
        Result<SearchResponse, EtlError> {
        let response = self.search(query, limit, bearer).send().await?;

        if !response.status().is_success() {
            return Err(EtlError::Http(
                format!("search failed: {}", response.status())
            ));
        }
        Ok(response.json::<SearchResponse>().await?)
    }
}

/// Flatten a search page into track records. One record per item;
/// an item with no credited artist is a parse failure, matching the
/// source api contract that every track carries at least one artist.
pub fn tracks_from_search(results: &SearchResponse) ->
    Result<Vec<TrackRecord>, EtlError> {

    results.tracks.items.iter()
        .map(|item| {
            let artist = item.artists.first()
                .ok_or_else(|| EtlError::Parse(
                    format!("track '{}' has no artists", item.name)
                ))?;
            Ok(TrackRecord {
                track_name: item.name.clone(),
                artist_name: artist.name.clone(),
                popularity: item.popularity,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_fixture() -> SearchResponse {
        serde_json::from_str(r#"{
            "tracks": {
                "items": [
                    {
                        "name": "Love Story",
                        "artists": [{"name": "Taylor Swift"}],
                        "popularity": 80
                    },
                    {
                        "name": "Obscure B-Side",
                        "artists": [
                            {"name": "Taylor Swift"},
                            {"name": "Someone Else"}
                        ],
                        "popularity": 20
                    }
                ]
            }
        }"#).unwrap()
    }

    #[test]
    fn one_record_per_item_with_exact_field_mapping() {
        let results = search_fixture();
        let records = tracks_from_search(&results).unwrap();

        assert_eq!(records.len(), results.tracks.items.len());
        assert_eq!(records[0], TrackRecord {
            track_name: "Love Story".to_string(),
            artist_name: "Taylor Swift".to_string(),
            popularity: 80,
        });
        // first credited artist wins
        assert_eq!(records[1].artist_name, "Taylor Swift");
        assert_eq!(records[1].popularity, 20);
    }

    #[test]
    fn empty_page_yields_empty_list() {
        let results: SearchResponse =
            serde_json::from_str(r#"{"tracks": {"items": []}}"#).unwrap();
        assert!(tracks_from_search(&results).unwrap().is_empty());
    }

    #[test]
    fn missing_artist_is_a_parse_error() {
        let results: SearchResponse = serde_json::from_str(r#"{
            "tracks": {
                "items": [
                    {"name": "Orphan", "artists": [], "popularity": 10}
                ]
            }
        }"#).unwrap();
        assert!(matches!(
            tracks_from_search(&results),
            Err(EtlError::Parse(_))
        ));
    }
}
