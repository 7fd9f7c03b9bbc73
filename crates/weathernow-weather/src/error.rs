//! Weather-specific error types.

use thiserror::Error;
use weathernow_core::{AppError, ErrorKind};

/// Location service errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location information unavailable")]
    Unavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

impl LocationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionDenied => ErrorKind::GeolocationDenied,
            Self::Unavailable => ErrorKind::GeolocationUnavailable,
            Self::Timeout => ErrorKind::GeolocationTimeout,
            Self::Other(_) => ErrorKind::Unknown,
        }
    }
}

/// Weather provider errors
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API key is not configured")]
    MissingApiKey,

    #[error("API key rejected")]
    Unauthorized,

    #[error("Rate limited{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<u64> },

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(#[source] reqwest::Error),

    #[error("Upstream returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("No previous search to retry")]
    NoPreviousSearch,
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    retry_after
        .map(|secs| format!(", retry after {} seconds", secs))
        .unwrap_or_default()
}

impl WeatherError {
    /// Classification attached at the point of failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::MissingApiKey | Self::Unauthorized => ErrorKind::Unauthorized,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::NetworkUnavailable(_) => ErrorKind::NetworkUnavailable,
            Self::Api { .. } | Self::Parse(_) | Self::NoPreviousSearch => ErrorKind::Unknown,
            Self::Location(e) => e.kind(),
        }
    }

    /// User-friendly error message for display.
    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }

    /// Whether a caller-initiated retry is worth offering.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<reqwest::Error> for WeatherError {
    /// Transport-level failures carry no HTTP response; body decode errors do.
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            WeatherError::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            WeatherError::Api {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            WeatherError::NetworkUnavailable(e)
        }
    }
}

impl From<WeatherError> for AppError {
    fn from(e: WeatherError) -> Self {
        AppError::service(e.kind(), e.to_string())
    }
}

impl From<LocationError> for AppError {
    fn from(e: LocationError) -> Self {
        AppError::service(e.kind(), e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_kinds() {
        assert_eq!(WeatherError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(WeatherError::Unauthorized.kind(), ErrorKind::Unauthorized);
        assert_eq!(WeatherError::MissingApiKey.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            WeatherError::RateLimited { retry_after: None }.kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(
            WeatherError::Api { status: 500, message: String::new() }.kind(),
            ErrorKind::Unknown
        );
    }

    #[test]
    fn test_location_kinds() {
        assert_eq!(
            WeatherError::from(LocationError::PermissionDenied).kind(),
            ErrorKind::GeolocationDenied
        );
        assert_eq!(LocationError::Unavailable.kind(), ErrorKind::GeolocationUnavailable);
        assert_eq!(LocationError::Timeout.kind(), ErrorKind::GeolocationTimeout);
        assert_eq!(LocationError::Other("x".into()).kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_rate_limited_message() {
        let err = WeatherError::RateLimited { retry_after: Some(30) };
        assert!(err.to_string().contains("30"));
        assert!(err.is_retryable());
        assert_eq!(WeatherError::RateLimited { retry_after: None }.to_string(), "Rate limited");
    }

    #[test]
    fn test_app_error_keeps_kind() {
        let app: AppError = WeatherError::NotFound("Atlantis".into()).into();
        assert_eq!(app.kind(), ErrorKind::NotFound);
        assert!(app.to_string().contains("Atlantis"));
    }
}
