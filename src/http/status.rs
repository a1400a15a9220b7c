//! Classification of unsuccessful HTTP responses into user-facing errors.

use reqwest::StatusCode;
use thiserror::Error;

/// An HTTP response that arrived but did not succeed.
#[derive(Debug, Error)]
pub enum HttpStatusError {
    /// Resource not found (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),
    /// Authentication required or rejected (HTTP 401/403)
    #[error("Access denied: {0}. Check the registry credentials.")]
    Unauthorized(String),
    /// Other 4xx responses
    #[error("Request error: {0}")]
    ClientError(String),
    /// 5xx responses
    #[error("Registry error: {0}")]
    ServerError(String),
}

/// Converts an error produced by `error_for_status()` into a friendlier error.
/// Errors without a status (connect failures, timeouts) are passed through unchanged.
pub fn classify_status(error: reqwest::Error) -> anyhow::Error {
    let Some(status) = error.status() else {
        return anyhow::Error::from(error);
    };
    let url = error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "<unknown url>".to_string());

    let classified = match status {
        StatusCode::NOT_FOUND => HttpStatusError::NotFound(url),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            HttpStatusError::Unauthorized(format!("HTTP {} from {}", status.as_u16(), url))
        }
        s if s.is_client_error() => {
            HttpStatusError::ClientError(format!("HTTP {} from {}", s.as_u16(), url))
        }
        s => HttpStatusError::ServerError(format!("HTTP {} from {}", s.as_u16(), url)),
    };
    anyhow::Error::from(classified)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn status_error(code: usize) -> reqwest::Error {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(code)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let response = client.get(server.url()).send().await.unwrap();
        response.error_for_status().unwrap_err()
    }

    #[test]
    fn test_http_status_error_display() {
        let err = HttpStatusError::NotFound("https://registry/pkg".to_string());
        assert!(err.to_string().contains("Not found"));

        let err = HttpStatusError::Unauthorized("HTTP 401".to_string());
        assert!(err.to_string().contains("Access denied"));

        let err = HttpStatusError::ServerError("HTTP 502".to_string());
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[tokio::test]
    async fn test_classify_status_not_found() {
        let err = classify_status(status_error(404).await);
        assert!(matches!(
            err.downcast_ref::<HttpStatusError>(),
            Some(HttpStatusError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_classify_status_unauthorized() {
        let err = classify_status(status_error(401).await);
        assert!(matches!(
            err.downcast_ref::<HttpStatusError>(),
            Some(HttpStatusError::Unauthorized(_))
        ));

        let err = classify_status(status_error(403).await);
        assert!(matches!(
            err.downcast_ref::<HttpStatusError>(),
            Some(HttpStatusError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_classify_status_other_client_error() {
        let err = classify_status(status_error(400).await);
        assert!(matches!(
            err.downcast_ref::<HttpStatusError>(),
            Some(HttpStatusError::ClientError(_))
        ));
    }

    #[tokio::test]
    async fn test_classify_status_server_error() {
        let err = classify_status(status_error(503).await);
        assert!(matches!(
            err.downcast_ref::<HttpStatusError>(),
            Some(HttpStatusError::ServerError(_))
        ));
    }
}
