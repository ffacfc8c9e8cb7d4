//! HTTP router for both ingestion channels and the static pages.
//!
//! Routes:
//! - `GET /` upload page, `GET /datos` extracted-data page
//! - `GET /health`
//! - `POST /upload`, `POST /upload_file` (multipart, JSON replies)
//! - `POST /whatsapp` (form-encoded webhook, TwiML replies)

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the application router over shared core state.
pub fn app_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

pub(crate) fn build_router(ctx: ApiContext) -> Router {
    let body_limit = ctx.core.config().max_upload_bytes;

    Router::new()
        .route("/", get(endpoints::home::index))
        .route("/datos", get(endpoints::home::datos))
        .route("/health", get(endpoints::health::check))
        .route("/upload", post(endpoints::upload::upload))
        .route("/upload_file", post(endpoints::upload::upload_file))
        .route("/whatsapp", post(endpoints::whatsapp::receive))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::{AppConfig, MatchOrder};
    use crate::db;
    use crate::pipeline::extraction::ocr::MockOcrEngine;
    use crate::pipeline::extraction::types::OcrEngine;

    const ANA: &str = "Nombre: Ana Ruiz\nDirección: Calle 5";
    const BOUNDARY: &str = "docmatch-test-boundary";

    fn test_core(
        dir: &std::path::Path,
        ocr: Arc<dyn OcrEngine>,
        order: MatchOrder,
    ) -> Arc<CoreState> {
        let mut config = AppConfig::from_lookup(|_| None).unwrap();
        config.db_path = dir.join("documentos.db");
        config.upload_dir = dir.join("uploads");
        config.match_order = order;
        Arc::new(CoreState::with_engine(config, ocr).unwrap())
    }

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 24, Rgb([250, 250, 250])));
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, ImageOutputFormat::Png).unwrap();
        cursor.into_inner()
    }

    fn multipart_request(uri: &str, field: &str, filename: Option<&str>, bytes: &[u8]) -> Request<Body> {
        let disposition = match filename {
            Some(name) => format!("form-data; name=\"{field}\"; filename=\"{name}\""),
            None => format!("form-data; name=\"{field}\""),
        };
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Disposition: {disposition}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn form_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/whatsapp")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    fn record_count(core: &CoreState) -> i64 {
        db::count_records(&core.open_db().unwrap()).unwrap()
    }

    fn staged_files(core: &CoreState) -> usize {
        std::fs::read_dir(core.upload_dir()).unwrap().count()
    }

    /// Serve `bytes` at `/media` (or 404 when `None`) on an ephemeral port.
    async fn media_server(bytes: Option<Vec<u8>>) -> String {
        let app = match bytes {
            Some(bytes) => Router::new().route("/media", get(move || async move { bytes })),
            None => Router::new(),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/media")
    }

    #[tokio::test]
    async fn upload_returns_fields_without_storing() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_core(dir.path(), Arc::new(MockOcrEngine::new(ANA)), MatchOrder::LookupFirst);
        let app = app_router(core.clone());

        let response = app
            .oneshot(multipart_request("/upload", "file", Some("id.png"), &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json, serde_json::json!({"nombre": "Ana Ruiz", "direccion": "Calle 5"}));
        assert_eq!(record_count(&core), 0);
        assert_eq!(staged_files(&core), 0);
    }

    #[tokio::test]
    async fn upload_without_labels_returns_sentinels() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_core(
            dir.path(),
            Arc::new(MockOcrEngine::new("REPUBLICA\nDOCUMENTO DE IDENTIDAD")),
            MatchOrder::LookupFirst,
        );

        let response = app_router(core)
            .oneshot(multipart_request("/upload", "file", Some("id.png"), &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["nombre"], "No se encontró el nombre");
        assert_eq!(json["direccion"], "No se encontró la dirección");
    }

    #[tokio::test]
    async fn upload_without_file_part_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_core(dir.path(), Arc::new(MockOcrEngine::new(ANA)), MatchOrder::LookupFirst);

        let response = app_router(core)
            .oneshot(multipart_request("/upload", "other", None, b"hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "No se envió ningún archivo");
    }

    #[tokio::test]
    async fn upload_with_empty_filename_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_core(dir.path(), Arc::new(MockOcrEngine::new(ANA)), MatchOrder::LookupFirst);

        let response = app_router(core)
            .oneshot(multipart_request("/upload_file", "file", Some(""), &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "El archivo está vacío");
    }

    #[tokio::test]
    async fn non_multipart_upload_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_core(dir.path(), Arc::new(MockOcrEngine::new(ANA)), MatchOrder::LookupFirst);

        let request = Request::builder()
            .method("POST")
            .uri("/upload_file")
            .body(Body::empty())
            .unwrap();
        let response = app_router(core).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_with_413() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::from_lookup(|_| None).unwrap();
        config.db_path = dir.path().join("documentos.db");
        config.upload_dir = dir.path().join("uploads");
        config.max_upload_bytes = 1024;
        let core = Arc::new(
            CoreState::with_engine(config, Arc::new(MockOcrEngine::new(ANA))).unwrap(),
        );

        let response = app_router(core.clone())
            .oneshot(multipart_request("/upload_file", "file", Some("big.png"), &vec![0u8; 64 * 1024]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let json = body_json(response).await;
        assert_eq!(json["error"], "El archivo es demasiado grande");
        assert_eq!(record_count(&core), 0);
    }

    #[tokio::test]
    async fn upload_file_reports_no_match_then_match() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_core(dir.path(), Arc::new(MockOcrEngine::new(ANA)), MatchOrder::LookupFirst);
        let image = png_bytes();

        let first = app_router(core.clone())
            .oneshot(multipart_request("/upload_file", "file", Some("a.png"), &image))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let json = body_json(first).await;
        assert_eq!(json["nombre"], "Ana Ruiz");
        assert_eq!(json["resultado"], serde_json::json!({"mensaje": "No se encontraron coincidencias"}));

        let second = app_router(core.clone())
            .oneshot(multipart_request("/upload_file", "file", Some("b.png"), &image))
            .await
            .unwrap();
        let json = body_json(second).await;
        assert_eq!(json["resultado"]["id"], 1);
        assert_eq!(json["resultado"]["nombre"], "Ana Ruiz");
        assert_eq!(json["resultado"]["direccion"], "Calle 5");
        assert!(json["resultado"]["imagen"].as_str().is_some_and(|s| !s.is_empty()));
        assert!(json["resultado"]["fecha_ingreso"].is_string());

        assert_eq!(record_count(&core), 2);
        assert_eq!(staged_files(&core), 0);
    }

    #[tokio::test]
    async fn insert_first_matches_the_new_record() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_core(dir.path(), Arc::new(MockOcrEngine::new(ANA)), MatchOrder::InsertFirst);

        let response = app_router(core.clone())
            .oneshot(multipart_request("/upload_file", "file", Some("a.png"), &png_bytes()))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["resultado"]["id"], 1);
        assert_eq!(record_count(&core), 1);
    }

    #[tokio::test]
    async fn webhook_without_media_prompts_for_image() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_core(dir.path(), Arc::new(MockOcrEngine::new(ANA)), MatchOrder::LookupFirst);

        for body in ["Body=hola", "MediaUrl0=&Body=hola"] {
            let response = app_router(core.clone()).oneshot(form_request(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers().get(header::CONTENT_TYPE).unwrap(),
                "application/xml"
            );
            let xml = body_string(response).await;
            assert!(xml.contains("<Message>Por favor, envía una imagen para procesar.</Message>"));
        }
        assert_eq!(record_count(&core), 0);
    }

    #[tokio::test]
    async fn webhook_ingests_downloaded_image() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_core(dir.path(), Arc::new(MockOcrEngine::new(ANA)), MatchOrder::LookupFirst);
        let url = media_server(Some(png_bytes())).await;
        let body = format!("MediaUrl0={}", url.replace(':', "%3A").replace('/', "%2F"));

        let response = app_router(core.clone()).oneshot(form_request(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let xml = body_string(response).await;
        assert!(xml.contains(
            "<Message>Nombre: Ana Ruiz\nDirección: Calle 5\nResultado: No se encontraron coincidencias</Message>"
        ));

        let response = app_router(core.clone()).oneshot(form_request(&body)).await.unwrap();
        let xml = body_string(response).await;
        assert!(xml.contains("Resultado: Coincidencia encontrada (registro 1)"));

        assert_eq!(record_count(&core), 2);
        assert_eq!(staged_files(&core), 0);

        // The stored image is the normalized JPEG, not the downloaded PNG.
        let stored = db::get_record(&core.open_db().unwrap(), 1).unwrap().unwrap();
        assert_eq!(&stored.image[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn webhook_apologizes_when_download_fails() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_core(dir.path(), Arc::new(MockOcrEngine::new(ANA)), MatchOrder::LookupFirst);
        let url = media_server(None).await;
        let body = format!("MediaUrl0={}", url.replace(':', "%3A").replace('/', "%2F"));

        let response = app_router(core.clone()).oneshot(form_request(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let xml = body_string(response).await;
        assert!(xml.contains("Hubo un error al procesar tu imagen. Por favor, intenta nuevamente."));
        assert_eq!(record_count(&core), 0);
    }

    #[tokio::test]
    async fn static_pages_render() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_core(dir.path(), Arc::new(MockOcrEngine::new("")), MatchOrder::LookupFirst);

        let response = app_router(core.clone())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("/upload_file"));

        let response = app_router(core.clone())
            .oneshot(
                Request::builder()
                    .uri("/datos?nombre=%3Cb%3EAna%3C%2Fb%3E")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let html = body_string(response).await;
        assert!(html.contains("&lt;b&gt;Ana&lt;/b&gt;"));
        assert!(html.contains("No disponible"));

        let response = app_router(core)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["store_reachable"], true);
    }
}
