//! The measurement API and dashboard assets served in normal operation.

use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use common::{ContainerWeight, MeasurementReport};
use log::{debug, error, info, warn};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::{
    adc::AdcLines, error::AssetNotFound, measurement::MeasurementState, sampler::with_estimator,
    scale::SharedEstimator,
};

pub struct DataService<L> {
    measurements: Arc<MeasurementState>,
    estimator: SharedEstimator<L>,
    web_root: Arc<PathBuf>,
    tare_samples: usize,
}

impl<L> Clone for DataService<L> {
    fn clone(&self) -> Self {
        Self {
            measurements: self.measurements.clone(),
            estimator: self.estimator.clone(),
            web_root: self.web_root.clone(),
            tare_samples: self.tare_samples,
        }
    }
}

impl<L: AdcLines + 'static> DataService<L> {
    pub fn new(
        measurements: Arc<MeasurementState>,
        estimator: SharedEstimator<L>,
        web_root: PathBuf,
        tare_samples: usize,
    ) -> Self {
        Self {
            measurements,
            estimator,
            web_root: Arc::new(web_root),
            tare_samples,
        }
    }
}

pub fn router<L: AdcLines + 'static>(service: DataService<L>) -> Router {
    Router::new()
        .route("/api/measurements", get(measurements::<L>))
        .route("/api/tare", get(tare::<L>).post(tare::<L>))
        .route(
            "/api/reset_container",
            get(reset_container::<L>).post(reset_container::<L>),
        )
        .route("/api/container", post(set_container::<L>))
        .fallback(static_asset::<L>)
        .layer(CorsLayer::permissive())
        .with_state(service)
}

async fn measurements<L: AdcLines + 'static>(
    State(service): State<DataService<L>>,
) -> Json<MeasurementReport> {
    Json(service.measurements.read().into())
}

/// The read happens on the blocking pool and waits its turn behind the
/// sampler, so a stalled converter holds up this request only.
async fn tare<L: AdcLines + 'static>(State(service): State<DataService<L>>) -> Response {
    let samples = service.tare_samples;
    match with_estimator(&service.estimator, move |scale| scale.tare(samples)).await {
        Ok(()) => {
            info!("Scale tared on request");
            Json(json!({ "status": "ok", "message": "Scale tared" })).into_response()
        }
        Err(e) => {
            error!("Tare failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn reset_container<L: AdcLines + 'static>(
    State(service): State<DataService<L>>,
) -> Json<serde_json::Value> {
    service.measurements.reset_container_weight();
    info!("Container weight reset");
    Json(json!({ "status": "ok", "message": "Container weight reset" }))
}

async fn set_container<L: AdcLines + 'static>(
    State(service): State<DataService<L>>,
    Json(container): Json<ContainerWeight>,
) -> Response {
    let weight = container.weight_g;
    if !weight.is_finite() || weight < 0.0 {
        warn!("Rejected container weight {}", weight);
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "message": "weight_g must be a non-negative number" })),
        )
            .into_response();
    }

    service.measurements.set_container_weight(weight);
    info!("Container weight set to {}g", weight);
    Json(json!({ "status": "ok", "container_weight_g": weight })).into_response()
}

async fn static_asset<L: AdcLines + 'static>(
    State(service): State<DataService<L>>,
    uri: Uri,
) -> Result<Response, AssetNotFound> {
    let (contents, content_type) = load_asset(&service.web_root, uri.path()).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], contents).into_response())
}

impl IntoResponse for AssetNotFound {
    fn into_response(self) -> Response {
        debug!("{}", self);
        (
            StatusCode::NOT_FOUND,
            Html("<html><body><h1>404 Not Found</h1></body></html>"),
        )
            .into_response()
    }
}

/// Reads the percent-encoded `request_path` from under `root`. The root
/// path maps to `index.html`; anything that would climb out of `root` is
/// not found.
pub async fn load_asset(
    root: &Path,
    request_path: &str,
) -> Result<(Vec<u8>, &'static str), AssetNotFound> {
    let not_found = || AssetNotFound(request_path.to_string());

    let decoded = urlencoding::decode(request_path).map_err(|_| not_found())?;
    let relative = match decoded.trim_start_matches('/') {
        "" => "index.html",
        path => path,
    };
    let relative = Path::new(relative);
    if !relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return Err(not_found());
    }

    let path = root.join(relative);
    let contents = tokio::fs::read(&path).await.map_err(|_| not_found())?;
    Ok((contents, content_type(&path)))
}

pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        _ => "application/octet-stream",
    }
}
