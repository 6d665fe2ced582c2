//! Remote classification over HTTP
//!
//! The service contract: `POST` a multipart form to the prediction endpoint,
//! get back `{"result": {"pred": ...}}` or `{"prediction": ...}` on success,
//! or any non-2xx status with a plain-text explanation.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde_json::Value;

use crate::camera::ImageRef;
use crate::error::ClassifyError;
use crate::payload::{PayloadBuilder, PayloadKind};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/predict";

/// Label shown when the response carries no usable prediction
pub const UNKNOWN_RESPONSE: &str = "Unknown response";

/// Parse a prediction endpoint, accepting only http(s)
pub fn parse_endpoint(raw: &str) -> Result<Url, ClassifyError> {
    let raw = raw.trim();
    let invalid = |reason: String| ClassifyError::Endpoint {
        endpoint: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(invalid(format!(
            "unsupported scheme '{}', use http or https",
            scheme
        ))),
    }
}

#[async_trait]
pub trait Predictor: Send + Sync {
    async fn classify(&self, image: &ImageRef) -> Result<String, ClassifyError>;
}

pub struct HttpPredictor {
    client: reqwest::Client,
    endpoint: Url,
    payload: Box<dyn PayloadBuilder>,
}

impl HttpPredictor {
    pub fn new(endpoint: Url, kind: PayloadKind) -> Result<Self, ClassifyError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, endpoint, kind))
    }

    pub fn with_client(client: reqwest::Client, endpoint: Url, kind: PayloadKind) -> Self {
        let payload = kind.builder(client.clone());
        Self {
            client,
            endpoint,
            payload,
        }
    }

    pub fn payload_kind(&self) -> PayloadKind {
        self.payload.kind()
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn classify(&self, image: &ImageRef) -> Result<String, ClassifyError> {
        let form = self.payload.build(image).await?;

        // No Content-Type here: the client writes it with the multipart boundary
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(ClassifyError::Api { status, body });
        }

        let body = response.text().await?;
        log::debug!("API response: {}", body);
        let data: Value = serde_json::from_str(&body)?;
        Ok(extract_label(&data))
    }
}

/// Pick the label out of a success body
///
/// `result.pred` wins over `prediction`. A field only counts when it is
/// truthy: `null`, `false`, `0` and `""` fall through to the next candidate.
pub fn extract_label(data: &Value) -> String {
    [data.pointer("/result/pred"), data.get("prediction")]
        .into_iter()
        .flatten()
        .find_map(truthy_label)
        .unwrap_or_else(|| UNKNOWN_RESPONSE.to_string())
}

fn truthy_label(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Multipart;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::Router;
    use serde_json::json;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Spin up a prediction stub on an ephemeral port and return its URL
    async fn serve(app: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{}/predict", addr)).unwrap()
    }

    fn fixed(status: StatusCode, body: &'static str) -> Router {
        Router::new().route("/predict", post(move || async move { (status, body) }))
    }

    // Local stubs must not be routed through a proxy from the environment
    fn local_predictor(url: Url, kind: PayloadKind) -> HttpPredictor {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpPredictor::with_client(client, url, kind)
    }

    fn leaf_image() -> (tempfile::NamedTempFile, ImageRef) {
        let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        file.write_all(b"\xFF\xD8\xFF\xE0leaf-pixels").unwrap();
        let image = ImageRef::from_path(file.path());
        (file, image)
    }

    #[test]
    fn test_parse_endpoint_schemes() {
        let url = parse_endpoint(" https://example.com:8443/v1/predict ").unwrap();
        assert_eq!(url.port(), Some(8443));

        let err = parse_endpoint("ftp://example.com/predict").unwrap_err();
        assert!(matches!(err, ClassifyError::Endpoint { .. }));
        assert!(err.to_string().contains("ftp"));

        assert!(parse_endpoint("not a url").is_err());
    }

    #[test]
    fn test_extract_nested_pred() {
        assert_eq!(extract_label(&json!({"result": {"pred": "healthy"}})), "healthy");
    }

    #[test]
    fn test_extract_top_level_prediction() {
        assert_eq!(extract_label(&json!({"prediction": "blight"})), "blight");
    }

    #[test]
    fn test_nested_pred_preferred() {
        let data = json!({"result": {"pred": "healthy"}, "prediction": "blight"});
        assert_eq!(extract_label(&data), "healthy");
    }

    #[test]
    fn test_falsy_values_fall_through() {
        let data = json!({"result": {"pred": ""}, "prediction": "blight"});
        assert_eq!(extract_label(&data), "blight");
        let data = json!({"result": {"pred": null}, "prediction": 0});
        assert_eq!(extract_label(&data), UNKNOWN_RESPONSE);
    }

    #[test]
    fn test_non_string_labels() {
        assert_eq!(extract_label(&json!({"prediction": 3})), "3");
        assert_eq!(extract_label(&json!({"prediction": true})), "true");
    }

    #[test]
    fn test_missing_fields_use_placeholder() {
        assert_eq!(extract_label(&json!({"status": "ok"})), UNKNOWN_RESPONSE);
        assert_eq!(extract_label(&json!(["healthy"])), UNKNOWN_RESPONSE);
        assert_eq!(extract_label(&json!({"result": "healthy"})), UNKNOWN_RESPONSE);
    }

    #[tokio::test]
    async fn test_classify_success() {
        let url = serve(fixed(StatusCode::OK, r#"{"result":{"pred":"healthy"}}"#)).await;
        let (_file, image) = leaf_image();

        for kind in [PayloadKind::Uri, PayloadKind::Blob] {
            let predictor = local_predictor(url.clone(), kind);
            assert_eq!(predictor.payload_kind(), kind);
            assert_eq!(predictor.classify(&image).await.unwrap(), "healthy");
        }
    }

    #[tokio::test]
    async fn test_classify_api_error_carries_body() {
        let url = serve(fixed(StatusCode::INTERNAL_SERVER_ERROR, "model exploded")).await;
        let (_file, image) = leaf_image();
        let predictor = local_predictor(url, PayloadKind::Uri);

        match predictor.classify(&image).await {
            Err(ClassifyError::Api { status, body }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "model exploded");
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_classify_invalid_json() {
        let url = serve(fixed(StatusCode::OK, "<html>not json</html>")).await;
        let (_file, image) = leaf_image();
        let predictor = local_predictor(url, PayloadKind::Uri);

        let err = predictor.classify(&image).await.unwrap_err();
        assert!(matches!(err, ClassifyError::Decode(_)));
    }

    #[tokio::test]
    async fn test_classify_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (_file, image) = leaf_image();
        let url = Url::parse(&format!("http://{}/predict", addr)).unwrap();
        let predictor = local_predictor(url, PayloadKind::Uri);

        let err = predictor.classify(&image).await.unwrap_err();
        assert!(matches!(err, ClassifyError::Network(_)));
    }

    #[tokio::test]
    async fn test_request_shape() {
        async fn inspect(headers: HeaderMap, mut multipart: Multipart) -> impl IntoResponse {
            let accept = headers.get("accept").and_then(|v| v.to_str().ok());
            let content_type = headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if accept != Some("application/json")
                || !content_type.starts_with("multipart/form-data; boundary=")
            {
                return (StatusCode::BAD_REQUEST, "bad headers".to_string());
            }

            let mut parts = Vec::new();
            while let Ok(Some(field)) = multipart.next_field().await {
                let name = field.name().map(str::to_string);
                let file_name = field.file_name().map(str::to_string);
                let mime = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.unwrap_or_default();
                parts.push((name, file_name, mime, bytes.len()));
            }

            match parts.as_slice() {
                [(Some(name), Some(file_name), Some(mime), len)]
                    if name == "file"
                        && file_name == "leaf.jpg"
                        && mime == "image/jpeg"
                        && *len > 0 =>
                {
                    (StatusCode::OK, r#"{"prediction":"blight"}"#.to_string())
                }
                _ => (StatusCode::BAD_REQUEST, format!("bad parts: {:?}", parts)),
            }
        }

        let url = serve(Router::new().route("/predict", post(inspect))).await;
        let (_file, image) = leaf_image();

        for kind in [PayloadKind::Uri, PayloadKind::Blob] {
            let predictor = local_predictor(url.clone(), kind);
            assert_eq!(predictor.classify(&image).await.unwrap(), "blight");
        }
    }

    #[tokio::test]
    async fn test_same_image_same_label() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/predict",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    r#"{"result":{"pred":"early_blight"}}"#
                }
            }),
        );
        let url = serve(app).await;
        let (_file, image) = leaf_image();
        let predictor = local_predictor(url, PayloadKind::Uri);

        let first = predictor.classify(&image).await.unwrap();
        let second = predictor.classify(&image).await.unwrap();
        assert_eq!(first, "early_blight");
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_blob_fetches_remote_reference() {
        let app = Router::new()
            .route(
                "/leaf.jpg",
                axum::routing::get(|| async { b"\xFF\xD8\xFFremote".to_vec() }),
            )
            .route("/predict", post(|| async { r#"{"prediction":"healthy"}"# }));
        let url = serve(app).await;
        let image = ImageRef::new(url.join("/leaf.jpg").unwrap().to_string());

        let predictor = local_predictor(url, PayloadKind::Blob);
        assert_eq!(predictor.classify(&image).await.unwrap(), "healthy");
    }
}
