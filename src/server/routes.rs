//! API route handlers.

use std::time::Duration;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::app::pipeline::{ForecastRun, run_forecast};
use crate::domain::{DateRange, ForecastConfig, InputOrigin, Manifest};
use crate::error::{AppError, PipelineError};
use crate::fit::check_horizon;
use crate::io::fetch::FileFetcher;
use crate::server::AppState;
use crate::server::store::ArtifactStore;

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MANIFEST_HEADER: &str = "x-forecast-manifest";

#[derive(Debug, Deserialize)]
pub struct ForecastRequest {
    pub file_url: String,
    /// `YYYY-MM-DD`
    pub forecast_start: String,
    /// `YYYY-MM-DD`
    pub forecast_end: String,
}

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub message: String,
    pub download_url: String,
    pub manifest: Manifest,
}

/// JSON error body: `{"error": ..., "stage": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    stage: Option<&'static str>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            stage: None,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::InvalidDateRange(_) => StatusCode::BAD_REQUEST,
            _ if err.is_client_error() => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
            stage: Some(err.stage().as_str()),
        }
    }
}

/// Download failures: bad URL is the caller's fault, anything else is upstream's.
impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = match err.exit_code() {
            2 => StatusCode::BAD_REQUEST,
            4 => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.message())
    }
}

/// Local failures (artifact store, HTTP client setup) are ours.
fn internal(err: AppError) -> ApiError {
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.message())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "request failed");
        } else {
            tracing::warn!(status = %self.status, error = %self.message, "request rejected");
        }
        let body = serde_json::json!({
            "error": self.message,
            "stage": self.stage,
        });
        (self.status, Json(body)).into_response()
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Download a spreadsheet, forecast it, store the workbook and return its link.
pub async fn forecast(
    State(state): State<AppState>,
    Json(req): Json<ForecastRequest>,
) -> Result<Json<ForecastResponse>, ApiError> {
    let range = DateRange::parse(&req.forecast_start, &req.forecast_end)?;
    check_horizon(&range, &state.config.forecast)?;

    let store = state.store.clone();
    let timeout = state.config.fetch_timeout;
    let config = state.config.forecast.clone();
    let (manifest, name) = run_blocking(move || {
        forecast_from_url(&req.file_url, &range, &config, timeout, &store)
    })
    .await?;

    Ok(Json(ForecastResponse {
        message: "Forecast complete".to_string(),
        download_url: state.download_url(&name),
        manifest,
    }))
}

fn forecast_from_url(
    url: &str,
    range: &DateRange,
    config: &ForecastConfig,
    timeout: Duration,
    store: &ArtifactStore,
) -> Result<(Manifest, String), ApiError> {
    let payload = FileFetcher::new(timeout).map_err(internal)?.fetch(url)?;
    let run = run_forecast(&payload, &InputOrigin::Url(url.to_string()), range, config)?;
    let name = store.save(&run.workbook).map_err(internal)?;
    Ok((run.manifest, name))
}

/// Forecast an uploaded spreadsheet and stream the workbook back.
///
/// Multipart fields: `file`, `forecast_start`, `forecast_end`.
pub async fn forecast_upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response, ApiError> {
    let mut file: Option<(Option<String>, Vec<u8>)> = None;
    let mut start: Option<String> = None;
    let mut end: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("Failed to read upload: {e}")))?;
                file = Some((filename, data.to_vec()));
            }
            "forecast_start" | "forecast_end" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("Failed to read `{name}`: {e}")))?;
                if name == "forecast_start" {
                    start = Some(text);
                } else {
                    end = Some(text);
                }
            }
            _ => {}
        }
    }

    let missing = |field: &str| ApiError::new(StatusCode::BAD_REQUEST, format!("Missing multipart field `{field}`"));
    let start = start.ok_or_else(|| missing("forecast_start"))?;
    let end = end.ok_or_else(|| missing("forecast_end"))?;
    let (filename, payload) = file.ok_or_else(|| missing("file"))?;

    let range = DateRange::parse(&start, &end)?;
    check_horizon(&range, &state.config.forecast)?;
    let config = state.config.forecast.clone();
    let run: ForecastRun = run_blocking(move || {
        let origin = InputOrigin::Upload { filename };
        run_forecast(&payload, &origin, &range, &config).map_err(ApiError::from)
    })
    .await?;

    let manifest = ascii_json(&run.manifest)?;
    let disposition = format!(
        "attachment; filename=\"forecast_{}.xlsx\"",
        uuid::Uuid::new_v4().simple()
    );
    let headers = [
        (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
        (header::CONTENT_DISPOSITION, disposition),
        (HeaderName::from_static(MANIFEST_HEADER), manifest),
    ];
    Ok((StatusCode::OK, headers, run.workbook).into_response())
}

/// Serve a stored workbook.
pub async fn get_file(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "File not found" })),
        )
            .into_response()
    };

    let Some(path) = state.store.path_for(&filename) else {
        return not_found();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let headers = [
                (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
                (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
            ];
            (StatusCode::OK, headers, bytes).into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => not_found(),
        Err(e) => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to read {filename}: {e}")).into_response(),
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Forecast worker failed: {e}")))?
}

/// JSON with every non-ASCII character `\u`-escaped, safe for a header value.
fn ascii_json(manifest: &Manifest) -> Result<String, ApiError> {
    let json = serde_json::to_string(manifest)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to encode manifest: {e}")))?;
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        if ch.is_ascii() && !ch.is_ascii_control() {
            out.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::server::store::is_artifact_name;
    use crate::server::{ServerConfig, router};

    const BOUNDARY: &str = "storecast-boundary";

    fn test_state() -> AppState {
        let dir = std::env::temp_dir().join(format!("storecast-routes-{}", uuid::Uuid::new_v4().simple()));
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            public_base_url: "https://forecast.example.com/".to_string(),
            fetch_timeout: Duration::from_secs(5),
            forecast: ForecastConfig::default(),
        };
        AppState::new(config, ArtifactStore::open(dir).unwrap())
    }

    fn sales_csv(days: usize) -> String {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        let mut csv = String::from("Date,StoreA,StoreB\n");
        for i in 0..days {
            let date = start + chrono::Duration::days(i as i64);
            csv.push_str(&format!("{date},{},\n", 100 + i));
        }
        csv
    }

    fn multipart_body(fields: &[(&str, &str)], file: Option<&str>) -> Body {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        if let Some(content) = file {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"sales.csv\"\r\nContent-Type: text/csv\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        Body::from(body)
    }

    /// Serve `csv` at `/sales.csv` on a local port.
    async fn serve_csv(csv: String) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().route("/sales.csv", axum::routing::get(move || async move { csv }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/sales.csv")
    }

    fn forecast_request(file_url: &str, start: &str, end: &str) -> Request<Body> {
        let body = serde_json::json!({
            "file_url": file_url,
            "forecast_start": start,
            "forecast_end": end,
        });
        Request::builder()
            .method("POST")
            .uri("/forecast")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn upload_request(body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/forecast/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(body)
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn upload_streams_workbook_with_manifest() {
        let app = router(test_state());
        let csv = sales_csv(30);
        let body = multipart_body(
            &[("forecast_start", "2025-01-01"), ("forecast_end", "2025-01-31")],
            Some(&csv),
        );
        let response = app.oneshot(upload_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
            XLSX_CONTENT_TYPE
        );

        let manifest: serde_json::Value =
            serde_json::from_str(response.headers()[MANIFEST_HEADER].to_str().unwrap()).unwrap();
        assert_eq!(manifest["included_series"], serde_json::json!(["StoreA"]));
        assert_eq!(manifest["excluded_series"][0]["name"], "StoreB");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn reversed_range_is_a_bad_request() {
        let app = router(test_state());
        let csv = sales_csv(10);
        let body = multipart_body(
            &[("forecast_start", "2025-02-01"), ("forecast_end", "2025-01-01")],
            Some(&csv),
        );
        let response = app.oneshot(upload_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["stage"], "dispatch");
    }

    #[tokio::test]
    async fn missing_file_field_is_a_bad_request() {
        let app = router(test_state());
        let body = multipart_body(&[("forecast_start", "2025-01-01"), ("forecast_end", "2025-01-02")], None);
        let response = app.oneshot(upload_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Missing multipart field `file`");
    }

    #[tokio::test]
    async fn unusable_data_is_unprocessable() {
        let app = router(test_state());
        let body = multipart_body(
            &[("forecast_start", "2025-01-01"), ("forecast_end", "2025-01-02")],
            Some("Day,StoreA\n2025-01-01,1\n"),
        );
        let response = app.oneshot(upload_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["stage"], "normalize");
    }

    #[tokio::test]
    async fn stored_files_are_served_and_others_are_not() {
        let state = test_state();
        let name = state.store.save(b"PK-workbook").unwrap();
        assert_eq!(
            state.download_url(&name),
            format!("https://forecast.example.com/files/{name}")
        );

        let app = router(state);
        let response = app
            .clone()
            .oneshot(Request::builder().uri(format!("/files/{name}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"PK-workbook");

        let response = app
            .oneshot(Request::builder().uri("/files/notes.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "File not found");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn url_forecast_returns_a_working_download_link() {
        let url = serve_csv(sales_csv(30)).await;
        let app = router(test_state());

        let response = app
            .clone()
            .oneshot(forecast_request(&url, "2025-01-01", "2025-01-31"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Forecast complete");
        assert_eq!(body["manifest"]["included_series"], serde_json::json!(["StoreA"]));
        assert_eq!(body["manifest"]["excluded_series"][0]["name"], "StoreB");

        let link = body["download_url"].as_str().unwrap();
        let name = link.strip_prefix("https://forecast.example.com/files/").unwrap();
        assert!(is_artifact_name(name), "{name}");

        let response = app
            .oneshot(Request::builder().uri(format!("/files/{name}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn storage_failure_is_an_internal_error() {
        let url = serve_csv(sales_csv(30)).await;
        let state = test_state();
        std::fs::remove_dir_all(state.store.dir()).unwrap();

        let response = router(state)
            .oneshot(forecast_request(&url, "2025-01-01", "2025-01-31"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("Failed to create"), "{body}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_download_is_a_bad_gateway() {
        // Bind then drop to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/sales.csv");
        let response = router(test_state())
            .oneshot(forecast_request(&url, "2025-01-01", "2025-01-31"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn oversized_range_is_rejected_before_downloading() {
        // Nothing listens here: reaching the download would give 502, not 400.
        let response = router(test_state())
            .oneshot(forecast_request("http://127.0.0.1:9/sales.csv", "2025-01-01", "2045-01-01"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["stage"], "dispatch");
    }

    #[test]
    fn manifest_header_is_ascii() {
        let manifest = Manifest {
            included_series: vec!["Tienda Ñuñoa".to_string()],
            excluded_series: Vec::new(),
        };
        let encoded = ascii_json(&manifest).unwrap();
        assert!(encoded.is_ascii());
        let decoded: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded["included_series"][0], "Tienda Ñuñoa");
    }
}
