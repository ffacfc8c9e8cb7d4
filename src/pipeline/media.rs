//! Download of images referenced by the messaging webhook.

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Media server answered {0}")]
    Status(StatusCode),

    #[error("Media body is empty")]
    EmptyBody,
}

/// Fetch the bytes behind `url`. Non-2xx answers and empty bodies are errors.
pub async fn download_media(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Err(FetchError::EmptyBody);
    }

    tracing::debug!(size = bytes.len(), "Media downloaded");
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::Router;

    async fn spawn_media_server() -> String {
        let app = Router::new()
            .route("/img.jpg", get(|| async { vec![0xFFu8, 0xD8, 0xFF, 0xE0] }))
            .route("/empty.jpg", get(|| async { Vec::<u8>::new() }))
            .route("/gone.jpg", get(|| async { AxumStatus::NOT_FOUND }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn downloads_body_bytes() {
        let base = spawn_media_server().await;
        let client = reqwest::Client::new();
        let bytes = download_media(&client, &format!("{base}/img.jpg")).await.unwrap();
        assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[tokio::test]
    async fn non_success_status_is_error() {
        let base = spawn_media_server().await;
        let client = reqwest::Client::new();
        let err = download_media(&client, &format!("{base}/gone.jpg")).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(s) if s == StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn empty_body_is_error() {
        let base = spawn_media_server().await;
        let client = reqwest::Client::new();
        let err = download_media(&client, &format!("{base}/empty.jpg")).await.unwrap_err();
        assert!(matches!(err, FetchError::EmptyBody));
    }

    #[tokio::test]
    async fn invalid_url_is_request_error() {
        let client = reqwest::Client::new();
        let err = download_media(&client, "not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::Request(_)));
    }
}
