use std::time;
use url::Url;
use crate::EtlError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 16;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

/// Defaults for the etl stage parameters
pub const DEFAULT_SEARCH_QUERY: &str = "Taylor Swift";
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
pub const DEFAULT_POPULARITY_THRESHOLD: i64 = 50;

/// Wrapper over env::var to return an invalid environment var error
fn env_check(s: &str) -> Result<String, EtlError> {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(EtlError::Config(format!("{s} was not set"))),
    }
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_host(url: &Url, expected_host: &str) -> Result<(), String> {
    match url.host_str() {
        Some(h) if h.eq_ignore_ascii_case(expected_host) => Ok(()),
        Some(h) => Err(
            format!("Unexpected host for {url} (got {h}, expected {expected_host})")
        ),
        None => Err(format!("URL missing host: {url}"))
    }
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

/// Configuration that Spotify expects when hitting endpoints
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: Url,
    pub api_base: Url,
}

fn build_spotify() -> Result<SpotifyConfig, EtlError> {
    let client_id     = env_check("SPOTIFY_CLIENT_ID")?;
    let client_secret = env_check("SPOTIFY_CLIENT_SECRET")?;

    // form urls
    let token_url = std::env::var("SPOTIFY_TOKEN_URL")
        .unwrap_or_else(|_| "https://accounts.spotify.com/api/token".to_string());

    let api_base  = std::env::var("SPOTIFY_API_BASE")
        .unwrap_or_else(|_| "https://api.spotify.com/v1/".to_string());

    let token_url = Url::parse(&token_url)
        .map_err(|_| EtlError::Config(
            "SPOTIFY_TOKEN_URL invalid".to_string()
        ))?;

    let mut api_base  = Url::parse(&api_base)
        .map_err(|_| EtlError::Config(
            "SPOTIFY_API_BASE invalid".to_string()
        ))?;

    // ensure valid https and hostname for both urls
    ensure_https(&token_url).map_err(EtlError::Config)?;
    ensure_https(&api_base).map_err(EtlError::Config)?;
    ensure_host(&token_url, "accounts.spotify.com")
        .map_err(EtlError::Config)?;
    ensure_host(&api_base, "api.spotify.com")
        .map_err(EtlError::Config)?;

    ensure_trailing_slash(&mut api_base);

    Ok( SpotifyConfig { client_id, client_secret, token_url, api_base })
}

///
/// Configuration for the stage parameters: what to search for, how many
/// results to request, and the popularity cutoff the transformer applies
///
#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub search_query: String,        // default "Taylor Swift"
    pub search_limit: u32,           // default 10
    pub popularity_threshold: i64,   // keep strictly greater, default 50
}

fn build_etl() -> EtlConfig {
    let env_to_uint = |s: &str, default: u32| -> u32 {
        match std::env::var(s) {
            Ok(s) => s.parse::<u32>().unwrap_or(default),
            Err(_) => default
        }
    };

    let env_to_int = |s: &str, default: i64| -> i64 {
        match std::env::var(s) {
            Ok(s) => s.parse::<i64>().unwrap_or(default),
            Err(_) => default
        }
    };

    let search_query = std::env::var("ETL_SEARCH_QUERY")
        .unwrap_or_else(|_| DEFAULT_SEARCH_QUERY.to_string());
    let search_limit = env_to_uint("ETL_SEARCH_LIMIT", DEFAULT_SEARCH_LIMIT);
    let popularity_threshold =
        env_to_int("ETL_POPULARITY_THRESHOLD", DEFAULT_POPULARITY_THRESHOLD);

    EtlConfig { search_query, search_limit, popularity_threshold }
}

///
/// Configuration for Http timeouts, pools, etc.
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
        }
    }
}

///
/// Configuration for persistent storage in sqlite db
///
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub db_url: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_url: "sqlite:./data/etl.db".to_string(),
        }
    }
}

fn build_persistence() -> PersistenceConfig {
    match std::env::var("ETL_DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => PersistenceConfig { db_url: url },
        _ => PersistenceConfig::default()
    }
}

///
/// Configuration for Logger
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub include_file_line: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,track_etl=debug,reqwest=warn".to_string(),
            format: LogFormat::Json,
            include_file_line: true,
            include_target: true,
        }
    }
}

///
/// AppConfig which holds everything the stages need
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub spotify: SpotifyConfig,
    pub etl: EtlConfig,
    pub http: HttpConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, EtlError> {
    dotenvy::dotenv().ok();

    let spotify     = build_spotify()?;
    let etl         = build_etl();
    let http        = HttpConfig::default();
    let persistence = build_persistence();
    let logging     = LoggingConfig::default();

    Ok( AppConfig { spotify, etl, http, persistence, logging } )
}
