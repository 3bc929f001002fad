use super::AppState;
use super::error::ApiError;
use crate::domain::payment::{PaymentView, format_timestamp};
use crate::domain::validation::{CreatePaymentRequest, ListPaymentsQuery, ValidationErrors};
use crate::error::PaymentError;
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ListPaymentsResponse {
    pub payments: Vec<PaymentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub count: usize,
}

pub async fn create_payment(
    State(state): State<AppState>,
    body: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::MalformedBody(rejection.body_text()))?;

    let input = request.validate().map_err(|errors| {
        tracing::warn!(%errors, "Validation failed");
        PaymentError::ValidationError(errors)
    })?;

    let outcome = state.coordinator.create(input).await?;
    let status = if outcome.is_replay() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome.into_body())).into_response())
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaymentView>, ApiError> {
    tracing::info!(payment_id = %id, "Fetching payment");
    let payment = state.paginator.get(&id).await.inspect_err(|e| {
        if matches!(e, PaymentError::NotFound(_)) {
            tracing::warn!(payment_id = %id, "Payment not found");
        }
    })?;
    Ok(Json(PaymentView::from(&payment)))
}

pub async fn list_payments(
    State(state): State<AppState>,
    query: Result<Query<ListPaymentsQuery>, QueryRejection>,
) -> Result<Json<ListPaymentsResponse>, ApiError> {
    let Query(query) = query.map_err(|rejection| {
        let mut errors = ValidationErrors::new();
        errors.add("query", rejection.body_text());
        ApiError::InvalidQuery(errors)
    })?;
    let request = query.validate().map_err(ApiError::InvalidQuery)?;

    tracing::info!(status = ?request.status, limit = request.limit, "Listing payments");
    let page = state
        .paginator
        .list(request.status, request.limit, request.cursor.as_deref())
        .await
        .map_err(|e| match e {
            PaymentError::ValidationError(errors) => ApiError::InvalidQuery(errors),
            other => ApiError::Payment(other),
        })?;

    let payments: Vec<PaymentView> = page.items.iter().map(PaymentView::from).collect();
    Ok(Json(ListPaymentsResponse {
        count: payments.len(),
        payments,
        next_cursor: page.next_cursor,
    }))
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "payflow-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": format_timestamp(&Utc::now()),
    }))
}
