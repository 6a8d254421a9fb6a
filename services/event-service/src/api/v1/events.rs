//! User event API endpoints.
//!
//! Events belong to the account that created them. Deleting that account
//! removes them through the message bus, not through this API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, FixedOffset, Utc};
use pridr_id::UserEventId;
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, FieldError};
use crate::api::request_context::RequestContext;
use crate::db::{NewUserEvent, StoreError, UserEventRow, UserEventUpdate};
use crate::state::AppState;

/// Longest accepted event name, in characters.
pub const MAX_NAME_LEN: usize = 30;

/// Create user event routes.
///
/// Nested under /api/v1/event.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route(
            "/{event_id}",
            get(get_event).patch(update_event).delete(delete_event),
        )
        .route("/addProfile/{event_id}", patch(add_profiles))
        .route("/removeProfile/{event_id}", patch(remove_profiles))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserEventRequest {
    pub name: String,

    /// Any offset is accepted; stored as UTC.
    pub date: DateTime<FixedOffset>,

    #[serde(default)]
    pub profile_ids: Vec<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserEventRequest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileIdsRequest {
    pub profile_ids: Vec<i32>,
}

/// Response for a single user event.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct UserEventResponse {
    pub id: i32,
    pub name: String,
    pub date: DateTime<Utc>,
    pub profile_ids: Vec<i32>,
    pub created_on: DateTime<Utc>,
}

impl From<UserEventRow> for UserEventResponse {
    fn from(row: UserEventRow) -> Self {
        Self {
            id: row.id.value(),
            name: row.name,
            date: row.date,
            profile_ids: row.profile_ids,
            created_on: row.created_on,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// List all user events.
///
/// GET /api/v1/event
async fn list_events(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<UserEventResponse>>, ApiError> {
    let rows = state
        .db()
        .user_events()
        .list()
        .await
        .map_err(|e| internal(e, &ctx.request_id, "Failed to list user events"))?;

    Ok(Json(rows.into_iter().map(UserEventResponse::from).collect()))
}

/// Get a user event by ID.
///
/// GET /api/v1/event/{event_id}
async fn get_event(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(event_id): Path<String>,
) -> Result<Json<UserEventResponse>, ApiError> {
    let event_id = parse_event_id(&event_id, &ctx.request_id)?;

    let row = state
        .db()
        .user_events()
        .get(event_id)
        .await
        .map_err(|e| internal(e, &ctx.request_id, "Failed to get user event"))?;

    row.map(|row| Json(row.into()))
        .ok_or_else(|| not_found(event_id, &ctx.request_id))
}

/// Create a user event owned by the caller.
///
/// POST /api/v1/event
async fn create_event(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateUserEventRequest>,
) -> Result<Json<UserEventResponse>, ApiError> {
    validate_name(&req.name, &ctx.request_id)?;

    let row = state
        .db()
        .user_events()
        .create(NewUserEvent {
            name: req.name,
            date: req.date.with_timezone(&Utc),
            profile_ids: dedup(req.profile_ids),
            created_by: ctx.account_id.clone(),
        })
        .await
        .map_err(|e| internal(e, &ctx.request_id, "Failed to create user event"))?;

    tracing::info!(
        request_id = %ctx.request_id,
        event_id = %row.id,
        account_id = %ctx.account_id,
        "User event created"
    );

    Ok(Json(row.into()))
}

/// Rename or reschedule a user event.
///
/// PATCH /api/v1/event/{event_id}
async fn update_event(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(event_id): Path<String>,
    Json(req): Json<UpdateUserEventRequest>,
) -> Result<Json<UserEventResponse>, ApiError> {
    let event_id = parse_event_id(&event_id, &ctx.request_id)?;

    if req.name.is_none() && req.date.is_none() {
        return Err(
            ApiError::bad_request("invalid_update", "No updatable fields provided")
                .with_request_id(ctx.request_id.clone()),
        );
    }
    if let Some(name) = &req.name {
        validate_name(name, &ctx.request_id)?;
    }

    let update = UserEventUpdate {
        name: req.name,
        date: req.date.map(|d| d.with_timezone(&Utc)),
    };

    let row = state
        .db()
        .user_events()
        .update(event_id, update)
        .await
        .map_err(|e| internal(e, &ctx.request_id, "Failed to update user event"))?;

    row.map(|row| Json(row.into()))
        .ok_or_else(|| not_found(event_id, &ctx.request_id))
}

/// Attach profiles to a user event. Already attached ids are left alone.
///
/// PATCH /api/v1/event/addProfile/{event_id}
async fn add_profiles(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(event_id): Path<String>,
    Json(req): Json<ProfileIdsRequest>,
) -> Result<Json<UserEventResponse>, ApiError> {
    let event_id = parse_event_id(&event_id, &ctx.request_id)?;
    edit_profiles(&state, &ctx, event_id, |row| row.add_profiles(&req.profile_ids)).await
}

/// Detach profiles from a user event. Unknown ids are ignored.
///
/// PATCH /api/v1/event/removeProfile/{event_id}
async fn remove_profiles(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(event_id): Path<String>,
    Json(req): Json<ProfileIdsRequest>,
) -> Result<Json<UserEventResponse>, ApiError> {
    let event_id = parse_event_id(&event_id, &ctx.request_id)?;
    edit_profiles(&state, &ctx, event_id, |row| row.remove_profiles(&req.profile_ids)).await
}

/// Delete a user event.
///
/// DELETE /api/v1/event/{event_id}
async fn delete_event(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let event_id = parse_event_id(&event_id, &ctx.request_id)?;

    let deleted = state
        .db()
        .user_events()
        .delete(event_id)
        .await
        .map_err(|e| internal(e, &ctx.request_id, "Failed to delete user event"))?;

    if !deleted {
        return Err(not_found(event_id, &ctx.request_id));
    }

    tracing::info!(
        request_id = %ctx.request_id,
        event_id = %event_id,
        account_id = %ctx.account_id,
        "User event deleted"
    );

    Ok((StatusCode::OK, "Event Deleted"))
}

// =============================================================================
// Helpers
// =============================================================================

async fn edit_profiles(
    state: &AppState,
    ctx: &RequestContext,
    event_id: UserEventId,
    edit: impl FnOnce(&mut UserEventRow),
) -> Result<Json<UserEventResponse>, ApiError> {
    let repo = state.db().user_events();

    let mut row = repo
        .get(event_id)
        .await
        .map_err(|e| internal(e, &ctx.request_id, "Failed to load user event"))?
        .ok_or_else(|| not_found(event_id, &ctx.request_id))?;

    edit(&mut row);

    let row = repo
        .set_profile_ids(event_id, &row.profile_ids)
        .await
        .map_err(|e| internal(e, &ctx.request_id, "Failed to update profiles"))?;

    row.map(|row| Json(row.into()))
        .ok_or_else(|| not_found(event_id, &ctx.request_id))
}

fn parse_event_id(raw: &str, request_id: &str) -> Result<UserEventId, ApiError> {
    raw.parse::<i32>().map(UserEventId::new).map_err(|_| {
        ApiError::bad_request("invalid_event_id", "Event ID must be an integer")
            .with_request_id(request_id)
    })
}

fn validate_name(name: &str, request_id: &str) -> Result<(), ApiError> {
    let message = if name.trim().is_empty() {
        "Event name cannot be empty"
    } else if name.chars().count() > MAX_NAME_LEN {
        "Event name cannot exceed 30 characters"
    } else {
        return Ok(());
    };

    Err(ApiError::bad_request("invalid_name", message)
        .with_request_id(request_id)
        .with_details(vec![FieldError {
            field: "name".to_string(),
            message: message.to_string(),
        }]))
}

fn dedup(profile_ids: Vec<i32>) -> Vec<i32> {
    let mut unique = Vec::with_capacity(profile_ids.len());
    for id in profile_ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}

fn not_found(event_id: UserEventId, request_id: &str) -> ApiError {
    ApiError::not_found(
        "user_event_not_found",
        format!("User event {event_id} not found"),
    )
    .with_request_id(request_id)
}

fn internal(err: StoreError, request_id: &str, message: &'static str) -> ApiError {
    tracing::error!(error = %err, request_id = %request_id, "{message}");
    ApiError::internal("internal_error", message).with_request_id(request_id)
}
