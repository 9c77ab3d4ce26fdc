// Event CRUD HTTP routes

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use cadence_core::{Event, EventQuery, EventStore, Frequency, ValidationErrors};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common::{ApiError, DataResponse, ErrorResponse, ListResponse, ValidationErrorResponse};
use super::validation::{parse_event_payload, parse_timestamp};
use crate::services::{EventService, EventWithChildren};

/// Event payload accepted by create and update. Every field is validated
/// and all failures are reported together.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventPayload {
    /// Up to 50 characters.
    #[schema(example = "Team sync")]
    pub title: String,
    /// Up to 255 characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Start with explicit UTC offset.
    #[schema(example = "2024-05-06T10:00:00+02:00")]
    pub starts_at: String,
    /// End with explicit UTC offset, after `starts_at`.
    #[schema(example = "2024-05-06T11:00:00+02:00")]
    pub ends_at: String,
    pub recurrent: bool,
    /// Required when `recurrent` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    /// Last allowed occurrence start, after `ends_at`. Required when
    /// `recurrent` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "2024-06-30T00:00:00+02:00")]
    pub repeat_until: Option<String>,
}

/// Event as returned by the API, with its series children when requested
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventResource {
    #[serde(flatten)]
    pub event: Event,
    /// Generated occurrences, present with `include=events`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<Event>>,
}

/// Recurrence fields are only shown for recurrent events
fn public(event: Event) -> Event {
    if event.recurrent {
        event
    } else {
        Event {
            frequency: None,
            repeat_until: None,
            ..event
        }
    }
}

impl From<EventWithChildren> for EventResource {
    fn from(view: EventWithChildren) -> Self {
        Self {
            event: public(view.event),
            events: view
                .children
                .map(|children| children.into_iter().map(public).collect()),
        }
    }
}

impl From<Event> for EventResource {
    fn from(event: Event) -> Self {
        Self {
            event: public(event),
            events: None,
        }
    }
}

/// Query parameters for listing events
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListEventsQuery {
    /// Only events starting at or after this time
    #[serde(rename = "filter[starts_after]")]
    pub starts_after: Option<String>,
    /// Only events starting at or before this time
    #[serde(rename = "filter[ends_before]")]
    pub ends_before: Option<String>,
    /// Comma-separated relations to embed; `events` adds series children
    pub include: Option<String>,
}

/// Query parameters for fetching one event
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GetEventQuery {
    /// Comma-separated relations to embed; `events` adds series children
    pub include: Option<String>,
}

fn includes_children(include: Option<&str>) -> bool {
    include.is_some_and(|raw| raw.split(',').any(|part| part.trim() == "events"))
}

/// Parse a filter timestamp. A `+` offset sent unencoded arrives as a space.
fn parse_filter(
    field: &str,
    raw: Option<&str>,
    errors: &mut ValidationErrors,
) -> Option<DateTime<FixedOffset>> {
    let raw = raw?.trim();
    let repaired = match raw.len().checked_sub(6) {
        Some(split) if raw.is_char_boundary(split) && raw[split..].starts_with(' ') => {
            format!("{}+{}", &raw[..split], &raw[split + 1..])
        }
        _ => raw.to_string(),
    };
    match parse_timestamp(&repaired) {
        Some(parsed) => Some(parsed),
        None => {
            errors.add(
                field,
                format!(
                    "The {} filter must match the format Y-m-d\\TH:i:sP.",
                    field.replace('_', " ")
                ),
            );
            None
        }
    }
}

impl ListEventsQuery {
    fn to_query(&self) -> Result<EventQuery, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let starts_after = parse_filter("starts_after", self.starts_after.as_deref(), &mut errors);
        let ends_before = parse_filter("ends_before", self.ends_before.as_deref(), &mut errors);
        if errors.is_empty() {
            Ok(EventQuery {
                starts_after,
                ends_before,
            })
        } else {
            Err(errors)
        }
    }
}

/// App state for event routes
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EventService>,
}

impl AppState {
    pub fn new(store: Arc<dyn EventStore>, max_series_occurrences: usize) -> Self {
        Self {
            service: Arc::new(EventService::new(store, max_series_occurrences)),
        }
    }
}

/// Create event routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/events", get(list_events).post(create_event))
        .route(
            "/v1/events/:event_id",
            get(get_event)
                .put(update_event)
                .patch(update_event)
                .delete(delete_event),
        )
        .with_state(state)
}

/// GET /v1/events - List events ordered by start
#[utoipa::path(
    get,
    path = "/v1/events",
    params(ListEventsQuery),
    responses(
        (status = 200, description = "List of events", body = ListResponse<EventResource>),
        (status = 422, description = "Malformed filter", body = ValidationErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListEventsQuery>,
) -> Result<Json<ListResponse<EventResource>>, ApiError> {
    let query = params.to_query()?;
    let events = state
        .service
        .list(&query, includes_children(params.include.as_deref()))
        .await?;

    Ok(Json(ListResponse::new(
        events.into_iter().map(EventResource::from).collect(),
    )))
}

/// POST /v1/events - Create an event, materializing its series
#[utoipa::path(
    post,
    path = "/v1/events",
    request_body = EventPayload,
    responses(
        (status = 201, description = "Event created", body = DataResponse<EventResource>),
        (status = 422, description = "Invalid payload or overlapping period", body = ValidationErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn create_event(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<DataResponse<EventResource>>), ApiError> {
    let draft = parse_event_payload(&payload)?;
    let event = state.service.create(draft).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(EventResource::from(event))),
    ))
}

/// GET /v1/events/{event_id} - Get event by ID
#[utoipa::path(
    get,
    path = "/v1/events/{event_id}",
    params(
        ("event_id" = Uuid, Path, description = "Event ID"),
        GetEventQuery
    ),
    responses(
        (status = 200, description = "Event found", body = DataResponse<EventResource>),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(params): Query<GetEventQuery>,
) -> Result<Json<DataResponse<EventResource>>, ApiError> {
    let view = state
        .service
        .get(event_id, includes_children(params.include.as_deref()))
        .await?;

    Ok(Json(DataResponse::new(EventResource::from(view))))
}

/// PUT|PATCH /v1/events/{event_id} - Replace an event, propagating to its series
#[utoipa::path(
    put,
    path = "/v1/events/{event_id}",
    params(
        ("event_id" = Uuid, Path, description = "Event ID")
    ),
    request_body = EventPayload,
    responses(
        (status = 200, description = "Event updated", body = DataResponse<EventResource>),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 422, description = "Invalid payload or overlapping period", body = ValidationErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn update_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> Result<Json<DataResponse<EventResource>>, ApiError> {
    let draft = parse_event_payload(&payload)?;
    let event = state.service.update(event_id, draft).await?;

    Ok(Json(DataResponse::new(EventResource::from(event))))
}

/// DELETE /v1/events/{event_id} - Delete an event and the occurrences it owns
#[utoipa::path(
    delete,
    path = "/v1/events/{event_id}",
    params(
        ("event_id" = Uuid, Path, description = "Event ID")
    ),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn delete_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.service.delete(event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
