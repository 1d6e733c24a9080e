//! REST handlers for the port-call servicing tracker
//!
//! Thin mapping from HTTP parameters to the shared FleetService; all payloads
//! are JSON (rendering the list/form views is the frontend's concern).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Form, Json,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

use super::service::{
    AnalyticsReport, BreakdownRow, FilterParams, FleetService, OperationDetail, OperationFilter,
    OperationSummary, ShipSummary,
};
use crate::charts;
use crate::models::{NamedRef, OperationInput, PollutantLine};

// ============================================================================
// Response Types (JSON-serializable versions)
// ============================================================================

#[derive(Serialize)]
pub struct OperationRow {
    pub id: i64,
    pub ship: String,
    pub port: String,
    pub contractor: String,
    pub date: NaiveDate,
    pub has_documents: bool,
    pub total_cost: f64,
}

impl From<OperationSummary> for OperationRow {
    fn from(op: OperationSummary) -> Self {
        Self {
            id: op.id,
            ship: op.ship,
            port: op.port,
            contractor: op.contractor,
            date: op.date,
            has_documents: op.has_documents,
            total_cost: op.total_cost,
        }
    }
}

#[derive(Serialize)]
pub struct ListResponse {
    pub operations: Vec<OperationRow>,
    pub filters: FilterParams,
}

#[derive(Serialize)]
pub struct OperationDetailResponse {
    pub id: i64,
    pub ship: String,
    pub port: String,
    pub contractor: String,
    pub date: NaiveDate,
    pub has_documents: bool,
    pub pollutants: Vec<PollutantLine>,
    pub total_cost: f64,
}

impl From<OperationDetail> for OperationDetailResponse {
    fn from(op: OperationDetail) -> Self {
        Self {
            id: op.id,
            ship: op.ship,
            port: op.port,
            contractor: op.contractor,
            date: op.date,
            has_documents: op.has_documents,
            pollutants: op.pollutants,
            total_cost: op.total_cost,
        }
    }
}

/// Lookup lists a frontend needs to render the create/edit form
#[derive(Serialize)]
pub struct FormContext {
    pub ships: Vec<NamedRef>,
    pub ports: Vec<NamedRef>,
    pub contractors: Vec<NamedRef>,
    pub pollutants: Vec<NamedRef>,
}

#[derive(Serialize)]
pub struct EditContext {
    pub operation: OperationDetailResponse,
    #[serde(flatten)]
    pub form: FormContext,
}

#[derive(Serialize)]
pub struct ShipSummaryResponse {
    pub ship_id: i64,
    pub ship: String,
    pub operation_count: i64,
    pub total_volume: f64,
    pub total_cost: f64,
    pub pollutants: Vec<String>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl From<ShipSummary> for ShipSummaryResponse {
    fn from(s: ShipSummary) -> Self {
        Self {
            ship_id: s.ship_id,
            ship: s.ship,
            operation_count: s.operation_count,
            total_volume: s.total_volume,
            total_cost: s.total_cost,
            pollutants: s.pollutants,
            first_date: s.first_date,
            last_date: s.last_date,
        }
    }
}

#[derive(Serialize)]
pub struct BreakdownRowResponse {
    pub ship: String,
    pub pollutant: String,
    pub volume: f64,
    pub cost: f64,
}

impl From<BreakdownRow> for BreakdownRowResponse {
    fn from(row: BreakdownRow) -> Self {
        Self {
            ship: row.ship,
            pollutant: row.pollutant,
            volume: row.volume,
            cost: row.cost,
        }
    }
}

/// Rendered charts, opaque SVG documents; pies keyed by ship name
#[derive(Serialize)]
pub struct ChartsResponse {
    pub volume_by_ship: String,
    pub cost_by_ship: BTreeMap<String, String>,
}

#[derive(Serialize)]
pub struct AnalyticsResponse {
    pub cutoff: NaiveDate,
    pub summary: Vec<ShipSummaryResponse>,
    pub breakdown: Vec<BreakdownRowResponse>,
    pub charts: ChartsResponse,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Deserialize)]
pub struct AnalyticsParams {
    pub cutoff: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub type AppState = Arc<FleetService>;

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /
pub async fn list_operations(
    State(service): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<ListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let filter = OperationFilter::from_params(&params);
    match service.list_operations(&filter).await {
        Ok(operations) => Ok(Json(ListResponse {
            operations: operations.into_iter().map(OperationRow::from).collect(),
            filters: params,
        })),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() }))),
    }
}

/// GET /operation/:id
pub async fn operation_detail(
    State(service): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OperationDetailResponse>, (StatusCode, Json<ErrorResponse>)> {
    match service.operation_detail(id).await {
        Ok(Some(operation)) => Ok(Json(OperationDetailResponse::from(operation))),
        Ok(None) => Err((StatusCode::NOT_FOUND, Json(ErrorResponse {
            error: format!("Operation {} not found", id),
        }))),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() }))),
    }
}

/// GET /create
pub async fn create_context(
    State(service): State<AppState>,
) -> Result<Json<FormContext>, (StatusCode, Json<ErrorResponse>)> {
    match form_context(&service).await {
        Ok(context) => Ok(Json(context)),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() }))),
    }
}

/// POST /create
pub async fn create_operation(
    State(service): State<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Redirect, (StatusCode, Json<ErrorResponse>)> {
    let input = parse_submission(&service, &form).await?;
    match service.create_operation(&input).await {
        Ok(_) => Ok(Redirect::to("/")),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() }))),
    }
}

/// GET /edit/:id
pub async fn edit_context(
    State(service): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<EditContext>, (StatusCode, Json<ErrorResponse>)> {
    let operation = match service.operation_detail(id).await {
        Ok(Some(operation)) => operation,
        Ok(None) => {
            return Err((StatusCode::NOT_FOUND, Json(ErrorResponse {
                error: format!("Operation {} not found", id),
            })))
        }
        Err(e) => return Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() }))),
    };
    match form_context(&service).await {
        Ok(form) => Ok(Json(EditContext {
            operation: OperationDetailResponse::from(operation),
            form,
        })),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() }))),
    }
}

/// POST /edit/:id
pub async fn update_operation(
    State(service): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Redirect, (StatusCode, Json<ErrorResponse>)> {
    let input = parse_submission(&service, &form).await?;
    match service.update_operation(id, &input).await {
        Ok(true) => Ok(Redirect::to("/")),
        Ok(false) => Err((StatusCode::NOT_FOUND, Json(ErrorResponse {
            error: format!("Operation {} not found", id),
        }))),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() }))),
    }
}

/// POST /delete/:id
pub async fn delete_operation(
    State(service): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Redirect, (StatusCode, Json<ErrorResponse>)> {
    match service.delete_operation(id).await {
        Ok(true) => Ok(Redirect::to("/")),
        Ok(false) => Err((StatusCode::NOT_FOUND, Json(ErrorResponse {
            error: format!("Operation {} not found", id),
        }))),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() }))),
    }
}

/// GET /analytics
pub async fn analytics(
    State(service): State<AppState>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<AnalyticsResponse>, (StatusCode, Json<ErrorResponse>)> {
    // Malformed cutoff degrades to "as of today", like the list filters.
    let cutoff = params
        .cutoff
        .as_deref()
        .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
        .unwrap_or_else(|| Local::now().date_naive());

    let report = match service.analytics(cutoff).await {
        Ok(report) => report,
        Err(e) => return Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() }))),
    };
    match render_charts(&report) {
        Ok(charts) => Ok(Json(AnalyticsResponse {
            cutoff: report.cutoff,
            summary: report.summary.into_iter().map(ShipSummaryResponse::from).collect(),
            breakdown: report.breakdown.into_iter().map(BreakdownRowResponse::from).collect(),
            charts,
        })),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() }))),
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn form_context(service: &FleetService) -> anyhow::Result<FormContext> {
    Ok(FormContext {
        ships: service.ships().await?,
        ports: service.ports().await?,
        contractors: service.contractors().await?,
        pollutants: service.pollutants().await?,
    })
}

/// Validate a create/edit submission against the current pollutant set.
/// Malformed main fields reject the submission; malformed per-substance
/// amounts only drop that substance and are logged.
async fn parse_submission(
    service: &FleetService,
    form: &HashMap<String, String>,
) -> Result<OperationInput, (StatusCode, Json<ErrorResponse>)> {
    let pollutants = match service.pollutants().await {
        Ok(pollutants) => pollutants,
        Err(e) => return Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() }))),
    };
    match OperationInput::from_form(form, &pollutants) {
        Ok((input, skipped)) => {
            for skip in &skipped {
                warn!(
                    pollutant_id = skip.pollutant_id,
                    field = skip.field,
                    value = %skip.value,
                    "Dropping line item with unparsable amount"
                );
            }
            Ok(input)
        }
        Err(message) => Err((StatusCode::UNPROCESSABLE_ENTITY, Json(ErrorResponse { error: message }))),
    }
}

fn render_charts(report: &AnalyticsReport) -> anyhow::Result<ChartsResponse> {
    let names: Vec<String> = report.summary.iter().map(|s| s.ship.clone()).collect();
    let volumes: Vec<f64> = report.summary.iter().map(|s| s.total_volume).collect();
    let volume_by_ship = charts::volume_bar_chart(&names, &volumes)?;

    // One pie per ship that actually appears in the breakdown.
    let mut per_ship: BTreeMap<&str, (Vec<String>, Vec<f64>)> = BTreeMap::new();
    for row in &report.breakdown {
        let entry = per_ship.entry(row.ship.as_str()).or_default();
        entry.0.push(row.pollutant.clone());
        entry.1.push(row.cost);
    }

    let mut cost_by_ship = BTreeMap::new();
    for (ship, (labels, costs)) in per_ship {
        if let Some(svg) = charts::cost_pie_chart(ship, &labels, &costs)? {
            cost_by_ship.insert(ship.to_string(), svg);
        }
    }

    Ok(ChartsResponse {
        volume_by_ship,
        cost_by_ship,
    })
}
