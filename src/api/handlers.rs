use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::{Incident, IncidentSource, IncidentStatus, NewIncident};
use crate::state::{IncidentQuery, DEFAULT_LIMIT, DEFAULT_PAGE};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let report = state.service.health().await?;

    Ok(Json(HealthResponse {
        status: if report.cache_reachable {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        incidents: report.incidents,
        cache_reachable: report.cache_reachable,
        cache_degraded_events: report.cache_degraded_events,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub incidents: u64,
    pub cache_reachable: bool,
    pub cache_degraded_events: u64,
}

/// Create an incident
pub async fn create_incident(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateIncidentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateIncidentResponse>)> {
    let Json(request) = payload?;
    let draft = NewIncident::new(
        request.message,
        IncidentStatus::parse(&request.incident_type)?,
        IncidentSource::parse(&request.source)?,
    );

    let created = state.service.create_incident(draft).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateIncidentResponse {
            message: "Incident created".to_string(),
            id: created.id,
        }),
    ))
}

/// Enum fields arrive as strings so unknown values surface as validation errors.
/// Missing or mistyped fields are rejected by the extractor and mapped the same way.
#[derive(Debug, Deserialize)]
pub struct CreateIncidentRequest {
    #[serde(alias = "incident_message")]
    pub message: String,
    #[serde(rename = "type", alias = "incident_type")]
    pub incident_type: String,
    pub source: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateIncidentResponse {
    pub message: String,
    pub id: i64,
}

/// List incidents
pub async fn list_incidents(
    State(state): State<AppState>,
    params: std::result::Result<Query<ListIncidentsParams>, QueryRejection>,
) -> Result<Json<Vec<Incident>>> {
    let Query(params) = params?;
    let query = params.into_query()?;
    let incidents = state.service.list_incidents(query).await?;

    Ok(Json(incidents))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListIncidentsParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "type", alias = "status")]
    pub incident_type: Option<String>,
    pub source: Option<String>,
}

impl ListIncidentsParams {
    pub fn into_query(self) -> Result<IncidentQuery> {
        let page = positive("page", self.page.unwrap_or(DEFAULT_PAGE as i64))?;
        let limit = positive("limit", self.limit.unwrap_or(DEFAULT_LIMIT as i64))?;

        // An empty filter (`?type=`) means no filter
        let incident_type = match self.incident_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => Some(IncidentStatus::parse(value)?),
        };
        let source = match self.source.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => Some(IncidentSource::parse(value)?),
        };

        Ok(IncidentQuery {
            page,
            limit,
            incident_type,
            source,
        })
    }
}

fn positive(name: &str, value: i64) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v >= 1)
        .ok_or_else(|| AppError::Validation(format!("{} must be a positive integer", name)))
}

/// Get incident by ID
pub async fn get_incident(
    State(state): State<AppState>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Incident>> {
    let Path(id) = id?;
    let incident = state.service.get_incident(id).await?;
    Ok(Json(incident))
}

/// Update incident status
pub async fn update_status(
    State(state): State<AppState>,
    params: std::result::Result<Query<UpdateStatusParams>, QueryRejection>,
) -> Result<Json<Incident>> {
    let Query(params) = params?;
    let status = IncidentStatus::parse(&params.status)?;
    let incident = state.service.update_status(params.incident_id, status).await?;

    Ok(Json(incident))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusParams {
    #[serde(alias = "id")]
    pub incident_id: i64,
    #[serde(alias = "type")]
    pub status: String,
}
