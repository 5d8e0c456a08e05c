use crate::dispatch::{DispatchError, Dispatcher, InboundEvent};
use crate::models::{
    CandidatesQuery, CandidatesResponse, ErrorResponse, EventResponse, HealthResponse,
    InboundEventRequest, MatchesResponse, UserId,
};
use crate::services::ProfileStore;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

/// Header carrying the shared secret of the platform adapter
pub const GATEWAY_TOKEN_HEADER: &str = "X-Gateway-Token";

const MAX_CANDIDATES: u16 = 100;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProfileStore>,
    pub dispatcher: Arc<Dispatcher>,
    /// Expected `X-Gateway-Token` on every route but health; `None` accepts any caller
    pub inbound_secret: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/events", web::post().to(receive_event))
        .route("/users/{id}/candidates", web::get().to(get_candidates))
        .route("/users/{id}/matches", web::get().to(get_matches));
}

fn error_response(status: actix_web::http::StatusCode, error: &str, message: String) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        error: error.to_string(),
        message,
        status_code: status.as_u16(),
    })
}

/// Check `X-Gateway-Token` against the configured secret
///
/// Everything except the health check sits behind it.
fn authorize(state: &AppState, req: &HttpRequest) -> Result<(), HttpResponse> {
    let Some(secret) = &state.inbound_secret else {
        return Ok(());
    };

    let provided = req
        .headers()
        .get(GATEWAY_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    if provided == Some(secret.as_str()) {
        return Ok(());
    }

    tracing::warn!("Rejected {} {} with missing or invalid gateway token", req.method(), req.path());
    Err(error_response(
        actix_web::http::StatusCode::UNAUTHORIZED,
        "unauthorized",
        "Invalid gateway token".to_string(),
    ))
}

/// Map a dispatch failure to its HTTP status
fn dispatch_error_response(err: &DispatchError) -> HttpResponse {
    use actix_web::http::StatusCode;

    match err {
        DispatchError::Validation(message) => {
            error_response(StatusCode::BAD_REQUEST, "invalid_event", message.clone())
        }
        DispatchError::StateViolation(_) => {
            error_response(StatusCode::CONFLICT, "state_violation", err.to_string())
        }
        DispatchError::ProfileRequired => {
            error_response(StatusCode::CONFLICT, "profile_required", err.to_string())
        }
        DispatchError::UnknownUser(_) => {
            error_response(StatusCode::CONFLICT, "unknown_user", err.to_string())
        }
        DispatchError::Store(e) if e.is_retryable() => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", e.to_string())
        }
        DispatchError::Store(e) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = state.store.health_check().await.unwrap_or(false);
    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Inbound platform event endpoint
///
/// POST /api/v1/events
///
/// Request body:
/// ```json
/// {
///   "eventId": "string",
///   "platformUserId": 123456,
///   "displayName": "string",
///   "kind": "command|text|photo|location|action|blocked",
///   "command": "find",
///   "text": "string",
///   "actionData": "like:12"
/// }
/// ```
async fn receive_event(
    state: web::Data<AppState>,
    req: web::Json<InboundEventRequest>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Err(denied) = authorize(&state, &http_req) {
        return denied;
    }

    if let Err(errors) = req.validate() {
        tracing::info!(
            "Validation failed for event from {}: {:?}",
            req.platform_user_id,
            errors
        );
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let request = req.into_inner();
    let platform_id = request.platform_user_id;
    let event = match InboundEvent::try_from(request) {
        Ok(event) => event,
        Err(e) => {
            state.dispatcher.reject(platform_id, &e);
            return dispatch_error_response(&DispatchError::from(e));
        }
    };

    let event_id = event.event_id.clone();
    tracing::debug!(event_id = %event_id, "Dispatching {}", event.payload.name());

    match state.dispatcher.handle(event).await {
        Ok(reply) => HttpResponse::Ok().json(EventResponse {
            accepted: true,
            event_id,
            reply,
        }),
        Err(e) => dispatch_error_response(&e),
    }
}

/// Ranked candidates for a user
///
/// GET /api/v1/users/{id}/candidates?limit=20
async fn get_candidates(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<CandidatesQuery>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Err(denied) = authorize(&state, &http_req) {
        return denied;
    }

    let user = UserId(path.into_inner());
    let limit = usize::from(query.limit.min(MAX_CANDIDATES));

    match state.dispatcher.rank_for(user, limit).await {
        Ok(result) => {
            tracing::info!(
                "Returning {} candidates for user {} (from {} considered)",
                result.candidates.len(),
                user,
                result.total_considered
            );
            HttpResponse::Ok().json(CandidatesResponse {
                candidates: result.candidates,
                total_considered: result.total_considered,
            })
        }
        Err(DispatchError::ProfileRequired) => error_response(
            actix_web::http::StatusCode::NOT_FOUND,
            "profile_not_found",
            format!("No profile for user {}", user),
        ),
        Err(e) => {
            tracing::error!("Failed to rank candidates for {}: {}", user, e);
            dispatch_error_response(&e)
        }
    }
}

/// Active matches of a user
///
/// GET /api/v1/users/{id}/matches
async fn get_matches(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Err(denied) = authorize(&state, &http_req) {
        return denied;
    }

    let user = UserId(path.into_inner());

    match state.store.active_matches(user).await {
        Ok(matches) => HttpResponse::Ok().json(MatchesResponse { matches }),
        Err(e) => {
            tracing::error!("Failed to fetch matches for {}: {}", user, e);
            dispatch_error_response(&DispatchError::Store(e))
        }
    }
}
