pub mod engine;
pub mod numbering;
pub mod sla;
pub mod store;
pub mod types;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::classifier::parse_classification;
use crate::shared::state::AppState;
use self::engine::{CreateTicket, EngineError, UpdateTicket};
use self::types::{
    Ticket, TicketActivity, TicketCategory, TicketFilter, TicketPriority, TicketStatus,
};

// TODO: resolve the actor from the auth layer instead of this placeholder.
const DEFAULT_ACTOR: i32 = 1;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum TicketApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("{0}")]
    Validation(String),
}

impl IntoResponse for TicketApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::Engine(EngineError::NotFound(_) | EngineError::NumberNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            Self::Engine(EngineError::NumberConflict) => StatusCode::CONFLICT,
            Self::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: String,
    pub category: TicketCategory,
    pub user_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<TicketCategory>,
    pub priority: Option<TicketPriority>,
    pub status: Option<TicketStatus>,
    pub assigned_to_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: TicketStatus,
}

#[derive(Debug, Deserialize)]
pub struct AssignTicketRequest {
    pub assigned_to_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub category: Option<TicketCategory>,
    pub user_id: Option<i32>,
    pub assigned_to_id: Option<i32>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TicketListResponse {
    pub tickets: Vec<Ticket>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Deserialize)]
pub struct ActivityListQuery {
    pub limit: Option<i64>,
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<Ticket>), TicketApiError> {
    let creator = req.user_id.unwrap_or(DEFAULT_ACTOR);
    let ticket = state.engine.create(
        CreateTicket {
            title: req.title,
            description: req.description,
            category: req.category,
        },
        creator,
    )?;
    submit_for_classification(&state, &ticket);
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Best-effort triage: runs off the request path with the client's timeout.
/// Any failure is logged and the ticket simply stays unclassified.
fn submit_for_classification(state: &Arc<AppState>, ticket: &Ticket) {
    if !state.classifier.is_configured() {
        return;
    }
    let classifier = state.classifier.clone();
    let engine = state.engine.clone();
    let ticket_id = ticket.id;
    let title = ticket.title.clone();
    let description = ticket.description.clone();
    tokio::spawn(async move {
        match classifier.classify(ticket_id, &title, &description).await {
            Ok(payload) => {
                let classification = parse_classification(&payload);
                if let Err(e) = engine.apply_classification(ticket_id, &classification) {
                    warn!(ticket_id, error = %e, "failed to apply AI classification");
                }
            }
            Err(e) => warn!(ticket_id, error = %e, "AI classification failed"),
        }
    });
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<TicketListResponse>, TicketApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let filter = TicketFilter {
        status: query.status,
        priority: query.priority,
        category: query.category,
        user_id: query.user_id,
        assigned_to_id: query.assigned_to_id,
        search: query.search,
        offset: (page - 1) * page_size,
        limit: page_size,
    };
    let (tickets, total) = state.engine.list(&filter)?;
    Ok(Json(TicketListResponse {
        tickets,
        total,
        page,
        page_size,
    }))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<Ticket>, TicketApiError> {
    Ok(Json(state.engine.ticket(id)?))
}

pub async fn get_ticket_by_number(
    State(state): State<Arc<AppState>>,
    Path(ticket_number): Path<String>,
) -> Result<Json<Ticket>, TicketApiError> {
    Ok(Json(state.engine.ticket_by_number(&ticket_number)?))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<UpdateTicketRequest>,
) -> Result<Json<Ticket>, TicketApiError> {
    let ticket = state.engine.update(
        id,
        UpdateTicket {
            title: req.title,
            description: req.description,
            category: req.category,
            priority: req.priority,
            status: req.status,
            assigned_to_id: req.assigned_to_id,
        },
        DEFAULT_ACTOR,
    )?;
    Ok(Json(ticket))
}

pub async fn change_ticket_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<Ticket>, TicketApiError> {
    Ok(Json(state.engine.change_status(id, req.status, DEFAULT_ACTOR)?))
}

pub async fn assign_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<AssignTicketRequest>,
) -> Result<Json<Ticket>, TicketApiError> {
    Ok(Json(
        state
            .engine
            .assign(id, req.assigned_to_id, DEFAULT_ACTOR)?,
    ))
}

pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<TicketActivity>), TicketApiError> {
    let activity = state.engine.add_comment(id, req.comment, DEFAULT_ACTOR)?;
    Ok((StatusCode::CREATED, Json(activity)))
}

pub async fn list_activities(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(query): Query<ActivityListQuery>,
) -> Result<Json<Vec<TicketActivity>>, TicketApiError> {
    Ok(Json(state.engine.activities(id, query.limit)?))
}

pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, TicketApiError> {
    state.engine.cancel(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Out-of-band classification results, e.g. from the classification
/// pipeline's own webhook callback.
pub async fn receive_classification(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, TicketApiError> {
    let ticket_id = payload
        .get("ticket_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| TicketApiError::Validation("ticket_id is required".to_string()))?
        as i32;
    let classification = parse_classification(&payload);
    let ticket = state.engine.apply_classification(ticket_id, &classification)?;
    Ok(Json(json!({
        "status": "success",
        "ticket_number": ticket.ticket_number,
        "classification": {
            "category": ticket.category,
            "priority": ticket.priority,
            "confidence": ticket.ai_confidence,
        },
    })))
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/number/:ticket_number", get(get_ticket_by_number))
        .route(
            "/api/tickets/:id",
            get(get_ticket).patch(update_ticket).delete(delete_ticket),
        )
        .route("/api/tickets/:id/status", patch(change_ticket_status))
        .route("/api/tickets/:id/assign", patch(assign_ticket))
        .route("/api/tickets/:id/comments", post(add_comment))
        .route("/api/tickets/:id/activities", get(list_activities))
        .route("/api/webhooks/classification", post(receive_classification))
}
