//! Order placement and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Money, Order, OrderRequest};
use orchestrator::{OrderRejection, RejectionReason};
use order_store::OrderRepository;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

/// Message returned with a placed order.
pub const ORDER_PLACED_MESSAGE: &str = "Order Placed";

// -- Response types --

#[derive(Serialize)]
pub struct OrderPlacedResponse {
    pub order_id: String,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub created_at: DateTime<Utc>,
    pub line_items: Vec<LineItemResponse>,
    pub total: Money,
}

#[derive(Serialize)]
pub struct LineItemResponse {
    pub sku_code: String,
    pub quantity: u32,
    pub price: Money,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id().to_string(),
            created_at: order.created_at(),
            line_items: order
                .line_items()
                .iter()
                .map(|item| LineItemResponse {
                    sku_code: item.sku_code().as_str().to_string(),
                    quantity: item.quantity(),
                    price: item.unit_price(),
                })
                .collect(),
            total: order.total_amount(),
        }
    }
}

// -- Handlers --

/// POST /api/order: validate, check stock, save and announce an order.
#[tracing::instrument(skip(state, body))]
pub async fn place(
    State(state): State<Arc<AppState>>,
    body: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    let Json(request) = body.map_err(|rejection| {
        ApiError::Rejected(OrderRejection {
            reason: RejectionReason::InvalidRequest,
            skus: Vec::new(),
            message: rejection.body_text(),
        })
    })?;

    let confirmation = state.orchestrator.place_order(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderPlacedResponse {
            order_id: confirmation.order_id.to_string(),
            message: ORDER_PLACED_MESSAGE,
        }),
    ))
}

/// GET /api/order/{id}: return a placed order.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id =
        OrderId::parse(&id).map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))?;

    let order = state
        .orchestrator
        .repository()
        .find_by_id(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order not found: {order_id}")))?;

    Ok(Json(OrderResponse::from(&order)))
}
