//! HTTP handlers for the `/api` routes.
//!
//! Success bodies are JSON envelopes `{"msg":"success","data":...}`;
//! failures are short plain-text messages terminated by a newline.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::Span;

use chainwatch_core::error::WatchError;
use chainwatch_core::types::Transaction;

use crate::facade::QueryFacade;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub facade: Arc<dyn QueryFacade>,
    pub span: Span,
}

impl ApiState {
    pub fn new(facade: Arc<dyn QueryFacade>, span: Span) -> Self {
        Self { facade, span }
    }
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub msg: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn success(data: Option<T>) -> Self {
        Self {
            msg: "success",
            data,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentBlock {
    pub current_block: u64,
}

#[derive(Debug, Serialize)]
pub struct TransactionList {
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    pub address: Option<String>,
}

impl AddressQuery {
    fn required(self) -> Result<String, ApiError> {
        match self.address {
            Some(a) if !a.trim().is_empty() => Ok(a),
            _ => Err(ApiError::MissingAddress),
        }
    }
}

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Client-visible failure of an API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    MissingAddress,
    AlreadySubscribed,
    UnknownAddress,
    MethodNotAllowed,
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingAddress => StatusCode::BAD_REQUEST,
            Self::AlreadySubscribed => StatusCode::CONFLICT,
            Self::UnknownAddress => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingAddress => "address query param is required",
            Self::AlreadySubscribed => "provided address is already subscribed",
            Self::UnknownAddress => "the address does not exist in our records",
            Self::MethodNotAllowed => "method not allowed",
            Self::Internal => "internal server error",
        }
    }
}

impl From<WatchError> for ApiError {
    fn from(e: WatchError) -> Self {
        match e {
            WatchError::AlreadyRegistered(_) => Self::AlreadySubscribed,
            WatchError::AddressNotFound(_) => Self::UnknownAddress,
            _ => Self::Internal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", self.message()),
        )
            .into_response()
    }
}

fn fail(span: &Span, route: &'static str, e: WatchError) -> ApiError {
    let api = ApiError::from(e.clone());
    if api == ApiError::Internal {
        tracing::error!(parent: span, route, error = %e, "Request failed");
    } else {
        tracing::warn!(parent: span, route, error = %e, "Request rejected");
    }
    api
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

/// `GET /api/block`
pub async fn current_block(
    State(state): State<ApiState>,
) -> Result<Json<ApiResponse<CurrentBlock>>, ApiError> {
    let current_block = state
        .facade
        .current_block()
        .await
        .map_err(|e| fail(&state.span, "block", e))?;
    Ok(Json(ApiResponse::success(Some(CurrentBlock { current_block }))))
}

/// `POST /api/subscribe?address=...`
pub async fn subscribe(
    State(state): State<ApiState>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let address = query.required()?;
    state
        .facade
        .subscribe(&address)
        .await
        .map_err(|e| fail(&state.span, "subscribe", e))?;
    Ok(Json(ApiResponse::success(None)))
}

/// `GET /api/transactions?address=...`
pub async fn transactions(
    State(state): State<ApiState>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<ApiResponse<TransactionList>>, ApiError> {
    let address = query.required()?;
    let transactions = state
        .facade
        .transactions(&address)
        .await
        .map_err(|e| fail(&state.span, "transactions", e))?;
    Ok(Json(ApiResponse::success(Some(TransactionList { transactions }))))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_errors_map_to_client_errors() {
        assert_eq!(
            ApiError::from(WatchError::AlreadyRegistered("0xa".into())),
            ApiError::AlreadySubscribed
        );
        assert_eq!(
            ApiError::from(WatchError::AddressNotFound("0xa".into())),
            ApiError::UnknownAddress
        );
        assert_eq!(
            ApiError::from(WatchError::Unavailable("down".into())),
            ApiError::Internal
        );
    }

    #[test]
    fn envelope_omits_missing_data() {
        let json = serde_json::to_string(&ApiResponse::<()>::success(None)).unwrap();
        assert_eq!(json, r#"{"msg":"success"}"#);

        let json = serde_json::to_string(&ApiResponse::success(Some(CurrentBlock {
            current_block: 100,
        })))
        .unwrap();
        assert_eq!(json, r#"{"msg":"success","data":{"currentBlock":100}}"#);
    }

    #[test]
    fn blank_address_is_missing() {
        let q = AddressQuery {
            address: Some("  ".into()),
        };
        assert_eq!(q.required().unwrap_err(), ApiError::MissingAddress);
    }
}
