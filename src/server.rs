//! HTTP server for the dashboard.
//!
//! Routes:
//! - `GET /`         conversion chart (optional `?feature=<column>`) and prediction form
//! - `GET /result`   prediction for the query-string record
//! - `GET /health`   liveness probe
//! - `GET /metrics`  Prometheus metrics

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::analytics::summarize;
use crate::chart::{build_chart, components};
use crate::config::Config;
use crate::dataset::{EventTable, GroupingKey};
use crate::formatter::format_prediction;
use crate::metrics;
use crate::pages::{self, FormField, IndexPage};
use crate::prediction::{loader_for, PredictionService, QueryRecord};
use crate::{Error, Result};

pub type HttpResponse = Response<Full<Bytes>>;

/// Immutable state shared by every request.
pub struct AppState {
    pub table: EventTable,
    pub predictor: PredictionService,
    pub default_grouping: GroupingKey,
    pub loaded_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(table: EventTable, predictor: PredictionService, default_grouping: GroupingKey) -> Self {
        Self {
            table,
            predictor,
            default_grouping,
            loaded_at: Utc::now(),
        }
    }

    /// Load the dataset and wire the predictor described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let table = EventTable::load(&config.dataset_path)?;
        let loader = loader_for(&config.model_path, config.cache_model);
        let predictor = PredictionService::new(loader, config.decision_rule);
        Ok(Self::new(table, predictor, config.default_grouping))
    }
}

fn html_response(status: StatusCode, body: String) -> HttpResponse {
    let mut response = Response::new(Full::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

fn text_response(status: StatusCode, body: &'static str) -> HttpResponse {
    let mut response = Response::new(Full::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn error_response(route: &str, err: &Error) -> HttpResponse {
    if err.is_client_error() {
        warn!(route, "Rejected request: {}", err);
        html_response(
            StatusCode::BAD_REQUEST,
            pages::render_error("Bad request", &err.to_string()),
        )
    } else {
        error!(route, "Request failed: {}", err);
        html_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            pages::render_error(
                "Internal server error",
                "The server failed to complete the request.",
            ),
        )
    }
}

fn method_not_allowed() -> HttpResponse {
    let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static("GET"));
    response
}

fn index(state: &AppState, query: &str) -> Result<String> {
    let params = QueryRecord::from_query_string(query);
    let key = match params.get("feature") {
        Some(name) => name.parse::<GroupingKey>()?,
        None => state.default_grouping,
    };

    let summary = summarize(&state.table, key);
    let chart = components(&build_chart(&summary, key.column_name()))?;

    let feature_names = GroupingKey::column_names();
    let form_fields: Vec<FormField> = GroupingKey::ALL
        .iter()
        .map(|k| {
            // An empty cell is still a valid model input.
            let mut options = Vec::new();
            if state.table.has_missing(*k) {
                options.push(String::new());
            }
            options.extend(state.table.distinct_values(*k));
            FormField {
                name: k.column_name().to_string(),
                options,
            }
        })
        .collect();
    let loaded_at = state.loaded_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();

    Ok(pages::render_index(&IndexPage {
        chart: &chart,
        feature_names: &feature_names,
        current_feature_name: key.column_name(),
        form_fields: &form_fields,
        total_users: summary.total_users,
        total_converted: summary.total_converted,
        loaded_at: &loaded_at,
    }))
}

async fn result(state: Arc<AppState>, query: &str) -> Result<String> {
    let record = QueryRecord::from_query_string(query);
    info!(?record, "Prediction requested");

    // The model file is read from disk; keep it off the async workers.
    let predictor = state.predictor.clone();
    let prediction = tokio::task::spawn_blocking(move || predictor.predict(&record))
        .await
        .map_err(|e| Error::Model(format!("prediction task failed: {}", e)))??;

    let text = format_prediction(prediction.label, prediction.probability);
    info!(
        label = %prediction.label,
        probability = prediction.probability,
        "Prediction served"
    );
    Ok(pages::render_result(&text))
}

fn route_name(path: &str) -> &'static str {
    match path {
        "/" => "index",
        "/result" => "result",
        "/health" => "health",
        "/metrics" => "metrics",
        _ => "not_found",
    }
}

/// Dispatch a request to its handler.
pub async fn route(state: Arc<AppState>, method: &Method, uri: &Uri) -> HttpResponse {
    let path = uri.path();
    let query = uri.query().unwrap_or("");
    let name = route_name(path);

    let _inflight = metrics::record_request_start(name);
    let start = Instant::now();

    let response = match (name, method) {
        ("index", &Method::GET) => match index(&state, query) {
            Ok(body) => html_response(StatusCode::OK, body),
            Err(err) => error_response(name, &err),
        },
        ("result", &Method::GET) => match result(Arc::clone(&state), query).await {
            Ok(body) => html_response(StatusCode::OK, body),
            Err(err) => error_response(name, &err),
        },
        ("health", &Method::GET) => text_response(StatusCode::OK, "ok"),
        ("metrics", &Method::GET) => metrics::metrics_response(),
        ("not_found", _) => text_response(StatusCode::NOT_FOUND, "not found"),
        _ => method_not_allowed(),
    };

    metrics::record_request_result(name, start.elapsed(), response.status());
    response
}

async fn handle_request(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> std::result::Result<HttpResponse, Infallible> {
    let (parts, _body) = req.into_parts();
    Ok(route(state, &parts.method, &parts.uri).await)
}

/// Accept connections on `listener` until the task is dropped.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(Arc::clone(&state), req));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Connection error: {}", err);
            }
        });
    }
}

/// Bind `addr` and serve until Ctrl+C.
pub async fn run(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, rows = state.table.len(), "Dashboard listening");

    tokio::select! {
        result = serve(listener, state) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::EventRecord;
    use crate::prediction::{DecisionRule, FileModelLoader};
    use http_body_util::BodyExt;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MODEL_JSON: &str = r#"{
        "feature_names": ["marketing_channel", "subscribing_channel", "age_group"],
        "classes": ["False", "True"],
        "intercept": 0.0,
        "weights": {
            "marketing_channel": { "Email": 2.0, "Push": -2.0 },
            "subscribing_channel": { "Email": 0.0 },
            "age_group": { "19-24 years": 0.0 }
        }
    }"#;

    fn state_with_model(model_path: &std::path::Path) -> Arc<AppState> {
        let table = EventTable::new(vec![
            EventRecord::new("u1", true, "Email", "Email", "19-24 years"),
            EventRecord::new("u2", false, "Push", "Email", "19-24 years"),
            EventRecord::new("u3", false, "Push", "Email", "19-24 years"),
        ]);
        let predictor = PredictionService::new(
            Arc::new(FileModelLoader::new(model_path)),
            DecisionRule::default(),
        );
        Arc::new(AppState::new(table, predictor, GroupingKey::MarketingChannel))
    }

    fn model_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MODEL_JSON.as_bytes()).unwrap();
        file
    }

    async fn get(state: Arc<AppState>, method: Method, uri: &str) -> (StatusCode, String) {
        let uri: Uri = uri.parse().unwrap();
        let response = route(state, &method, &uri).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_index_renders_default_chart() {
        let file = model_file();
        let (status, body) = get(state_with_model(file.path()), Method::GET, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Conversion by marketing_channel"));
        assert!(body.contains("1 of 3 users converted"));
        assert!(body.contains(r#"name="subscribing_channel""#));
    }

    #[tokio::test]
    async fn test_index_selects_feature() {
        let file = model_file();
        let (status, body) =
            get(state_with_model(file.path()), Method::GET, "/?feature=age_group").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Conversion by age_group"));
    }

    #[tokio::test]
    async fn test_index_unknown_feature_is_bad_request() {
        let file = model_file();
        let (status, body) =
            get(state_with_model(file.path()), Method::GET, "/?feature=region").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Unknown column: region"));
    }

    #[tokio::test]
    async fn test_result_predicts_conversion() {
        let file = model_file();
        let (status, body) = get(
            state_with_model(file.path()),
            Method::GET,
            "/result?marketing_channel=Email&subscribing_channel=Email&age_group=19-24+years",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Model predicts: True"));
        assert!(body.contains("User will convert with probability: 88.08%"));
    }

    #[tokio::test]
    async fn test_result_predicts_no_conversion() {
        let file = model_file();
        let (status, body) = get(
            state_with_model(file.path()),
            Method::GET,
            "/result?marketing_channel=Push&subscribing_channel=Email&age_group=19-24+years",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Model predicts: False"));
        assert!(body.contains("User will not convert with probability: 88.08%"));
    }

    #[tokio::test]
    async fn test_result_missing_feature_is_bad_request() {
        let file = model_file();
        let (status, body) = get(
            state_with_model(file.path()),
            Method::GET,
            "/result?marketing_channel=Email",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("subscribing_channel, age_group"));
    }

    #[tokio::test]
    async fn test_result_missing_model_is_server_error() {
        let state = state_with_model(std::path::Path::new("/nonexistent/model.json"));
        let (status, body) = get(
            state,
            Method::GET,
            "/result?marketing_channel=Email&subscribing_channel=Email&age_group=19-24+years",
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("/nonexistent"));
    }

    #[tokio::test]
    async fn test_result_unknown_category_is_server_error() {
        let file = model_file();
        let (status, _) = get(
            state_with_model(file.path()),
            Method::GET,
            "/result?marketing_channel=Fax&subscribing_channel=Email&age_group=19-24+years",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_result_post_is_not_allowed() {
        let file = model_file();
        let uri: Uri = "/result".parse().unwrap();
        let response = route(state_with_model(file.path()), &Method::POST, &uri).await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(ALLOW).unwrap(), "GET");
    }

    #[tokio::test]
    async fn test_health_and_not_found() {
        let file = model_file();
        let state = state_with_model(file.path());

        let (status, body) = get(Arc::clone(&state), Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");

        let (status, _) = get(state, Method::GET, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let file = model_file();
        let (status, body) = get(state_with_model(file.path()), Method::GET, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("conversion_dashboard_requests_total"));
    }

    #[test]
    fn test_app_state_from_config_missing_dataset() {
        let mut config = Config::defaults();
        config.dataset_path = "/nonexistent/marketing.csv".into();
        let err = AppState::from_config(&config).err().unwrap();
        assert!(matches!(err, Error::Dataset(_)));
    }
}
