use std::env;
use std::fmt;

use url::Url;

use crate::error::ApiError;

pub const DEFAULT_QUIZ_SERVICE_URL: &str = "http://localhost:8080/api/quiz";
pub const DEFAULT_STATS_SERVICE_URL: &str = "http://localhost:8080/api/stats";

/// Endpoints and credentials for the HTTP clients.
///
/// The access token is handed in explicitly; clients never look it up on their own.
#[derive(Clone)]
pub struct ApiConfig {
    pub quiz_base_url: Url,
    pub stats_base_url: Url,
    pub access_token: Option<String>,
}

impl ApiConfig {
    #[must_use]
    pub fn new(quiz_base_url: Url, stats_base_url: Url) -> Self {
        Self {
            quiz_base_url,
            stats_base_url,
            access_token: None,
        }
    }

    /// Blank tokens are treated as absent.
    #[must_use]
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        self
    }

    /// Read `QUIZ_SERVICE_URL`, `STATS_SERVICE_URL` and `QUIZ_ACCESS_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` if a configured URL does not parse.
    pub fn from_env() -> Result<Self, ApiError> {
        let quiz = env::var("QUIZ_SERVICE_URL").unwrap_or_else(|_| DEFAULT_QUIZ_SERVICE_URL.into());
        let stats =
            env::var("STATS_SERVICE_URL").unwrap_or_else(|_| DEFAULT_STATS_SERVICE_URL.into());
        let config = Self::new(Url::parse(&quiz)?, Url::parse(&stats)?)
            .with_access_token(env::var("QUIZ_ACCESS_TOKEN").ok());
        Ok(config)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            quiz_base_url: Url::parse(DEFAULT_QUIZ_SERVICE_URL)
                .expect("default quiz url should be valid"),
            stats_base_url: Url::parse(DEFAULT_STATS_SERVICE_URL)
                .expect("default stats url should be valid"),
            access_token: None,
        }
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("quiz_base_url", &self.quiz_base_url.as_str())
            .field("stats_base_url", &self.stats_base_url.as_str())
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Append path segments to a service base URL, keeping its own path.
///
/// Each segment is percent-encoded, so opaque ids containing `/`, `?` or `#`
/// stay a single segment.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
