//! Order creation, lookup, and listing handlers.
//!
//! Creation debits the ledger and persists the order in one atomic unit,
//! then responds without waiting on the order index. The listing endpoint
//! reads the index only, so a freshly created order may be absent there
//! until the consumer catches up; the lookup endpoint reads the primary
//! records and sees it immediately.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use payflow_core::{Order, OrderCreated, OrderId, OrderIndexEntry, OrderStatus};
use payflow_store::{Store, StoreError};

use crate::error::ApiError;
use crate::idempotency::{fingerprint, run_idempotent};
use crate::identity::{IdemKey, UserIdentity};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 100;

/// An order as exposed on the wire.
#[derive(Debug, Serialize)]
pub struct OrderBody {
    /// Order id.
    pub order_id: String,
    /// Owning user id.
    pub user_id: String,
    /// Debited amount in minor currency units.
    pub amount: i64,
    /// Caller-supplied description.
    pub description: String,
    /// Order status.
    pub status: OrderStatus,
    /// Creation timestamp, RFC 3339.
    pub created_at: String,
}

impl From<&Order> for OrderBody {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id.to_string(),
            user_id: order.user_id.to_string(),
            amount: order.amount,
            description: order.description.clone(),
            status: order.status,
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

impl From<&OrderIndexEntry> for OrderBody {
    fn from(entry: &OrderIndexEntry) -> Self {
        Self {
            order_id: entry.order_id.to_string(),
            user_id: entry.user_id.to_string(),
            amount: entry.amount,
            description: entry.description.clone(),
            status: entry.status,
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// Create order request body.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Amount to debit, in minor currency units. Must be positive.
    pub amount: i64,
    /// Free-text description. Must not be blank.
    pub description: String,
}

/// Order response wrapper.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    /// The calling user id.
    pub user_id: String,
    /// The order.
    pub order: OrderBody,
}

/// Create an order: debit the ledger and persist the order atomically.
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    identity: UserIdentity,
    key: IdemKey,
    Json(body): Json<CreateOrderRequest>,
) -> Result<Response, ApiError> {
    if body.amount <= 0 {
        return Err(ApiError::BadRequest("amount must be > 0".into()));
    }
    let description = body.description.trim();
    if description.is_empty() {
        return Err(ApiError::BadRequest("description is required".into()));
    }

    let fp = fingerprint("create_order", &[&body.amount.to_string(), description]);

    let response = run_idempotent(&state, &identity.user_id, &key, fp, || {
        let order = Order::new(identity.user_id.clone(), body.amount, description.to_string());
        let event = OrderCreated::for_order(&order);

        let balance = match state.store.debit_and_insert_order(&order, &event) {
            Ok(balance) => balance,
            Err(StoreError::NotFound) => {
                return Err(ApiError::NotFound("account not found".into()));
            }
            Err(StoreError::InsufficientFunds { balance, required }) => {
                return Err(ApiError::InsufficientFunds { balance, required });
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(
            user_id = %identity.user_id,
            order_id = %order.order_id,
            amount = %order.amount,
            new_balance = %balance,
            "order created"
        );

        let response = serde_json::to_value(OrderResponse {
            user_id: identity.user_id.to_string(),
            order: OrderBody::from(&order),
        })?;
        Ok((StatusCode::CREATED, response))
    })
    .await?;

    // Wake the index consumer; its poll interval covers a lost nudge.
    state.index_nudge.notify_one();

    Ok(response)
}

/// Get an order by id from the primary records.
///
/// Immediately consistent with creation. Orders belonging to other users
/// are reported as not found.
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    identity: UserIdentity,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = order_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid order_id".into()))?;

    let order = state
        .store
        .get_order(&order_id)?
        .filter(|order| order.user_id == identity.user_id)
        .ok_or_else(|| ApiError::NotFound("order not found".into()))?;

    Ok(Json(OrderResponse {
        user_id: identity.user_id.to_string(),
        order: OrderBody::from(&order),
    }))
}

/// Order list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    /// Maximum number of orders to return (default 50, capped at 100).
    pub limit: Option<usize>,
    /// Opaque pagination token from a previous response.
    pub page_token: Option<String>,
}

/// List orders response.
#[derive(Debug, Serialize)]
pub struct ListOrdersResponse {
    /// The calling user id.
    pub user_id: String,
    /// Orders, newest first.
    pub orders: Vec<OrderBody>,
    /// Token for the next page, present while more orders remain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// List the calling user's orders from the read model.
///
/// Eventually consistent: a freshly created order may be missing here and
/// appear on a later call.
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    identity: UserIdentity,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ListOrdersResponse>, ApiError> {
    let limit = match query.limit {
        None | Some(0) => DEFAULT_LIST_LIMIT,
        Some(n) => n.min(MAX_LIST_LIMIT),
    };
    let offset = match &query.page_token {
        Some(token) => decode_page_token(token)?,
        None => 0,
    };

    // Fetch one extra entry to learn whether another page exists.
    let mut entries = state
        .store
        .list_index_entries(&identity.user_id, limit + 1, offset)?;
    let has_more = entries.len() > limit;
    entries.truncate(limit);

    Ok(Json(ListOrdersResponse {
        user_id: identity.user_id.to_string(),
        orders: entries.iter().map(OrderBody::from).collect(),
        next_page_token: has_more.then(|| encode_page_token(offset + limit)),
    }))
}

fn encode_page_token(offset: usize) -> String {
    BASE64.encode(offset.to_string())
}

fn decode_page_token(token: &str) -> Result<usize, ApiError> {
    let invalid = || ApiError::BadRequest("invalid page_token".into());
    let bytes = BASE64.decode(token).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    text.parse().map_err(|_| invalid())
}
