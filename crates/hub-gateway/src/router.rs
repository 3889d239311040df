//! Hub endpoint routing.
//!
//! `/`, `/subscribe` and `/publish` all land on the same handler; the form's
//! `hub.mode` decides what happens.

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use hub_core::{HubApi, HubError, SubscribeOutcome};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::debug;

use crate::error::ApiError;
use crate::form::{require_form, FormFields};
use crate::middleware::TracingLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Protocol engine.
    pub hub: Arc<dyn HubApi>,
}

/// Build the hub router with its middleware stack.
pub fn build_router(hub: Arc<dyn HubApi>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", any(hub_endpoint))
        .route("/subscribe", any(hub_endpoint))
        .route("/publish", any(hub_endpoint))
        .with_state(AppState { hub })
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TracingLayer::new())
}

async fn hub_endpoint(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let result = match method {
        Method::POST => handle_post(&state, &headers, &body).await,
        Method::GET => handle_get(&state, query.as_deref().unwrap_or_default()),
        _ => Ok(method_not_allowed()),
    };
    result.unwrap_or_else(|err| {
        debug!(error = %err.0, "Request rejected");
        err.into_response()
    })
}

async fn handle_post(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, ApiError> {
    require_form(headers)?;
    let form = FormFields::parse(body);

    match form.first("hub.mode") {
        Some("subscribe") | Some("unsubscribe") => {
            let outcome = state.hub.subscribe(form.subscription_request()).await?;
            Ok(match outcome {
                SubscribeOutcome::Verified => StatusCode::NO_CONTENT.into_response(),
                SubscribeOutcome::Accepted => StatusCode::ACCEPTED.into_response(),
            })
        }
        Some("publish") => {
            state.hub.publish(form.publish_request()).await?;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Some(other) if !other.is_empty() => Err(HubError::InvalidMode(other.to_string()).into()),
        _ => Err(HubError::MissingField { field: "hub.mode" }.into()),
    }
}

fn handle_get(state: &AppState, query: &str) -> Result<Response, ApiError> {
    let form = FormFields::parse(query.as_bytes());
    if form.first("hub.mode") != Some("status") {
        return Ok(method_not_allowed());
    }

    let status = state.hub.subscription_status(
        form.first("hub.topic").unwrap_or_default(),
        form.first("hub.callback").unwrap_or_default(),
    )?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        status.as_str(),
    )
        .into_response())
}

fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "GET, POST")],
        "use POST with an application/x-www-form-urlencoded body",
    )
        .into_response()
}
