//! API Service - Read API over the normalized NFHS data model
//!
//! Endpoints:
//! - GET /health - Health check
//! - GET /states - State dropdown options
//! - GET /domains - District indicator domains
//! - GET /indicator-options - Indicators within a domain
//! - GET /district-series - Per-district values for one indicator/round
//! - GET /state-series - Urban/rural/total for one state indicator
//! - GET /matched-indicator - State counterpart of a district indicator
//! - GET /geometry - Boundary features, full or per state
//! - GET /equity - Disaggregated slice for one equity indicator
//! - GET /equity-indicators - Equity indicator metadata
//! - GET /aspirational - Cohort flags for one district
//! - GET /report - Data-quality report text
//! - POST /refresh - Rebuild the model and swap it atomically

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use pipeline::district::SurveyRound;
use pipeline::equity::Disaggregation;
use pipeline::geo::FeatureCollection;
use pipeline::model::build_data_model;
use pipeline::state::Gender;
use pipeline::{NormalizedDataModel, PipelineConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tower_http::cors::{Any, CorsLayer};

// ============================================================================
// State
// ============================================================================

struct AppState {
    /// Swapped whole on refresh; readers clone the Arc and never see a
    /// partial model.
    model: RwLock<Arc<NormalizedDataModel>>,
    cfg: PipelineConfig,
}

impl AppState {
    fn model(&self) -> Arc<NormalizedDataModel> {
        match self.model.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

#[derive(Serialize)]
struct StatesResponse {
    states: Vec<String>,
}

#[derive(Serialize)]
struct DomainsResponse {
    domains: Vec<String>,
}

#[derive(Serialize)]
struct IndicatorOptionsResponse {
    domain: String,
    indicators: Vec<String>,
}

#[derive(Serialize)]
struct DistrictSeriesRow {
    state: String,
    district: String,
    value: Option<f64>,
    geo_label: Option<String>,
}

#[derive(Serialize)]
struct DistrictSeriesResponse {
    indicator: String,
    round: String,
    inverse_scale: bool,
    rows: Vec<DistrictSeriesRow>,
}

#[derive(Serialize)]
struct StateSeriesResponse {
    state: String,
    indicator: String,
    round: String,
    urban: Option<f64>,
    rural: Option<f64>,
    total: Option<f64>,
}

#[derive(Serialize)]
struct MatchedIndicatorResponse {
    domain: String,
    district_indicator: String,
    state_indicator: Option<String>,
}

#[derive(Serialize)]
struct EquityResponse {
    state: String,
    indicator: String,
    indicator_type: String,
    color: String,
    year: String,
    disaggregation: String,
    values: BTreeMap<String, Option<f64>>,
}

#[derive(Serialize)]
struct EquityIndicatorInfo {
    indicator: String,
    indicator_type: String,
    color: String,
    default_selected: bool,
    disaggregations: Vec<String>,
}

#[derive(Serialize)]
struct AspirationalResponse {
    state: String,
    district: String,
    cohorts: BTreeMap<String, bool>,
}

#[derive(Serialize)]
struct RefreshResponse {
    ok: bool,
    district_records: usize,
    state_records: usize,
    quality_defects: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn not_found(message: impl Into<String>) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn bad_request(message: impl Into<String>) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Query params
// ============================================================================

#[derive(Deserialize)]
struct IndicatorOptionsQuery {
    domain: String,
}

#[derive(Deserialize)]
struct DistrictSeriesQuery {
    indicator: String,
    round: String,
    state: Option<String>,
}

#[derive(Deserialize)]
struct StateSeriesQuery {
    state: String,
    indicator: String,
    round: String,
    gender: Option<String>,
}

#[derive(Deserialize)]
struct MatchedIndicatorQuery {
    domain: String,
    district_indicator: String,
}

#[derive(Deserialize)]
struct GeometryQuery {
    state: Option<String>,
}

#[derive(Deserialize)]
struct EquityQuery {
    state: String,
    indicator: String,
    year: String,
    disaggregation: String,
}

#[derive(Deserialize)]
struct AspirationalQuery {
    state: String,
    district: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: "0.1.0",
    })
}

async fn states_handler(State(state): State<Arc<AppState>>) -> Json<StatesResponse> {
    let model = state.model();
    Json(StatesResponse {
        states: model.state_options(),
    })
}

async fn domains_handler(State(state): State<Arc<AppState>>) -> Json<DomainsResponse> {
    let model = state.model();
    Json(DomainsResponse {
        domains: model.district.domains(),
    })
}

async fn indicator_options_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IndicatorOptionsQuery>,
) -> impl IntoResponse {
    let model = state.model();
    let indicators: Vec<String> = model
        .indicator_options(&params.domain)
        .into_iter()
        .map(String::from)
        .collect();
    if indicators.is_empty() {
        return not_found(format!("Unknown domain '{}'", params.domain));
    }
    Json(IndicatorOptionsResponse {
        domain: params.domain,
        indicators,
    })
    .into_response()
}

async fn district_series_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DistrictSeriesQuery>,
) -> impl IntoResponse {
    let Some(round) = SurveyRound::parse(&params.round) else {
        return bad_request(format!("Unknown survey round '{}'", params.round));
    };
    let model = state.model();
    let rows: Vec<DistrictSeriesRow> = model
        .district_series(params.state.as_deref(), &params.indicator, round)
        .into_iter()
        .map(|r| DistrictSeriesRow {
            state: r.state,
            district: r.district,
            value: r.value,
            geo_label: r.geo_label,
        })
        .collect();
    Json(DistrictSeriesResponse {
        inverse_scale: model.uses_inverse_scale(&params.indicator),
        indicator: params.indicator,
        round: round.label().to_string(),
        rows,
    })
    .into_response()
}

async fn state_series_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StateSeriesQuery>,
) -> impl IntoResponse {
    let gender = match params.gender.as_deref() {
        None => None,
        Some(text) if text.eq_ignore_ascii_case("female") => Some(Gender::Female),
        Some(text) if text.eq_ignore_ascii_case("male") => Some(Gender::Male),
        Some(other) => return bad_request(format!("Unknown gender '{}'", other)),
    };
    let model = state.model();
    match model.state_series(&params.state, &params.indicator, &params.round, gender) {
        Some(values) => Json(StateSeriesResponse {
            state: params.state,
            indicator: params.indicator,
            round: params.round,
            urban: values.urban,
            rural: values.rural,
            total: values.total,
        })
        .into_response(),
        None => not_found("No state series for that selection"),
    }
}

async fn matched_indicator_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MatchedIndicatorQuery>,
) -> impl IntoResponse {
    let model = state.model();
    let known = model
        .taxonomy
        .iter()
        .any(|c| c.domain == params.domain && c.district_indicator == params.district_indicator);
    if !known {
        return not_found("Unknown domain/indicator pair");
    }
    Json(MatchedIndicatorResponse {
        state_indicator: model
            .matched_state_indicator(&params.domain, &params.district_indicator)
            .map(String::from),
        domain: params.domain,
        district_indicator: params.district_indicator,
    })
    .into_response()
}

async fn geometry_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GeometryQuery>,
) -> impl IntoResponse {
    let model = state.model();
    match model.geometry(params.state.as_deref()) {
        Some(collection) => Json::<FeatureCollection>(collection.clone()).into_response(),
        None => not_found(format!(
            "No boundaries for state '{}'",
            params.state.unwrap_or_default()
        )),
    }
}

async fn equity_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EquityQuery>,
) -> impl IntoResponse {
    let Some(disaggregation) = Disaggregation::parse(&params.disaggregation) else {
        return bad_request(format!(
            "Unknown disaggregation '{}'",
            params.disaggregation
        ));
    };
    let model = state.model();
    let Some(config) = model.equity.config_for(&params.indicator) else {
        return not_found(format!("Unknown equity indicator '{}'", params.indicator));
    };
    let indicator_type = config.indicator_type.clone();
    let color = config.color.to_string();
    match model.equity_series(&params.state, &params.indicator, &params.year, disaggregation) {
        Some(values) => Json(EquityResponse {
            state: params.state,
            indicator: params.indicator,
            indicator_type,
            color,
            year: params.year,
            disaggregation: disaggregation.label().to_string(),
            values: values
                .into_iter()
                .map(|(category, value)| (category.to_string(), value))
                .collect(),
        })
        .into_response(),
        None => not_found("No equity record for that selection"),
    }
}

async fn equity_indicators_handler(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<EquityIndicatorInfo>> {
    let model = state.model();
    Json(
        model
            .equity
            .configs
            .iter()
            .map(|c| EquityIndicatorInfo {
                indicator: c.indicator.clone(),
                indicator_type: c.indicator_type.clone(),
                color: c.color.to_string(),
                default_selected: c.default_selected,
                disaggregations: c
                    .disaggregations
                    .iter()
                    .map(|d| d.label().to_string())
                    .collect(),
            })
            .collect(),
    )
}

async fn aspirational_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AspirationalQuery>,
) -> impl IntoResponse {
    let model = state.model();
    match model.aspirational_flags(&params.state, &params.district) {
        Some(flags) => Json(AspirationalResponse {
            state: params.state,
            district: params.district,
            cohorts: flags
                .as_pairs()
                .into_iter()
                .map(|(cohort, member)| (cohort.to_string(), member))
                .collect(),
        })
        .into_response(),
        None => not_found("District not in the aspirational registry"),
    }
}

async fn report_handler(State(state): State<Arc<AppState>>) -> String {
    state.model().quality.render()
}

async fn refresh_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cfg = state.cfg.clone();
    let built = tokio::task::spawn_blocking(move || build_data_model(&cfg)).await;
    match built {
        Ok(Ok(model)) => {
            let model = Arc::new(model);
            let response = RefreshResponse {
                ok: true,
                district_records: model.district.records.len(),
                state_records: model.state.records.len(),
                quality_defects: model.quality.total_defects(),
            };
            match state.model.write() {
                Ok(mut guard) => *guard = model,
                Err(poisoned) => *poisoned.into_inner() = model,
            }
            Json(response).into_response()
        }
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Refresh task failed: {}", e),
            }),
        )
            .into_response(),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./datasets".to_string());
    let bind = std::env::var("API_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    println!("=== NFHS Dashboard API ===");
    println!("Data dir: {}", data_dir);
    println!("Building model...");

    let cfg = PipelineConfig {
        data_dir: PathBuf::from(data_dir),
        ..PipelineConfig::default()
    };
    let model = build_data_model(&cfg).context("Failed to build the data model")?;
    println!(
        "Model ready: {} district records, {} state records, {} quality defects",
        model.district.records.len(),
        model.state.records.len(),
        model.quality.total_defects()
    );

    let state = Arc::new(AppState {
        model: RwLock::new(Arc::new(model)),
        cfg,
    });

    // CORS for the dashboard frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/states", get(states_handler))
        .route("/domains", get(domains_handler))
        .route("/indicator-options", get(indicator_options_handler))
        .route("/district-series", get(district_series_handler))
        .route("/state-series", get(state_series_handler))
        .route("/matched-indicator", get(matched_indicator_handler))
        .route("/geometry", get(geometry_handler))
        .route("/equity", get(equity_handler))
        .route("/equity-indicators", get(equity_indicators_handler))
        .route("/aspirational", get(aspirational_handler))
        .route("/report", get(report_handler))
        .route("/refresh", post(refresh_handler))
        .layer(cors)
        .with_state(state);

    println!("API listening on http://{}", bind);
    println!("\nEndpoints:");
    println!("  GET  /health");
    println!("  GET  /states");
    println!("  GET  /domains");
    println!("  GET  /indicator-options?domain=");
    println!("  GET  /district-series?indicator=&round=&state=");
    println!("  GET  /state-series?state=&indicator=&round=&gender=");
    println!("  GET  /matched-indicator?domain=&district_indicator=");
    println!("  GET  /geometry?state=");
    println!("  GET  /equity?state=&indicator=&year=&disaggregation=");
    println!("  GET  /equity-indicators");
    println!("  GET  /aspirational?state=&district=");
    println!("  GET  /report");
    println!("  POST /refresh");

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
