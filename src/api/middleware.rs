//! Bearer-key authentication for the collection API.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware::Next,
    response::Response,
};

/// Who may call the API and from which browser origins.
#[derive(Clone, Debug, Default)]
pub struct SecurityConfig {
    /// Required bearer key. `None` leaves the API open.
    pub api_key: Option<String>,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

/// Outcome of checking one request's credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Open,
    Granted,
    Missing,
    Invalid,
}

impl SecurityConfig {
    /// Read `CAMPUS_API_KEY` and `CAMPUS_CORS_ORIGINS` (comma-separated).
    /// Blank values count as unset.
    pub fn from_env() -> Self {
        Self {
            api_key: non_blank_var("CAMPUS_API_KEY"),
            cors_origins: non_blank_var("CAMPUS_CORS_ORIGINS")
                .map(|s| parse_origins(&s))
                .unwrap_or_default(),
        }
    }

    /// No key, any origin. For local use and tests.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn allow_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cors_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    fn check(&self, authorization: Option<&str>) -> Access {
        let Some(expected) = &self.api_key else {
            return Access::Open;
        };
        match authorization.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(token) if token == expected => Access::Granted,
            Some(_) => Access::Invalid,
            None => Access::Missing,
        }
    }
}

fn non_blank_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}

/// Reject requests that do not carry the configured bearer key.
pub async fn auth_middleware(
    State(config): State<SecurityConfig>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match config.check(authorization) {
        Access::Open | Access::Granted => Ok(next.run(request).await),
        Access::Invalid => {
            tracing::warn!(path = %request.uri().path(), "Invalid API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        Access::Missing => {
            tracing::warn!(path = %request.uri().path(), "Missing or malformed Authorization header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
