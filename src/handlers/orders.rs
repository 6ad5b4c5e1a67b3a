use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::order_service::SharedOrderService;
use crate::domain::order::{LineItem, Order};
use crate::errors::AppError;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct LineItemRequest {
    pub item_id: Uuid,
    pub quantity: u32,
    /// Unit price in the smallest currency unit, e.g. 500 for 5.00
    pub price: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub line_items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    /// Either "shipped" or "completed"
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LineItemResponse {
    pub item_id: Uuid,
    pub quantity: u32,
    pub price: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub order_id: u64,
    pub customer_id: Uuid,
    pub line_items: Vec<LineItemResponse>,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<LineItemRequest> for LineItem {
    fn from(l: LineItemRequest) -> Self {
        LineItem {
            item_id: l.item_id,
            quantity: l.quantity,
            price: l.price,
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        OrderResponse {
            order_id: o.order_id,
            customer_id: o.customer_id,
            line_items: o
                .line_items
                .into_iter()
                .map(|l| LineItemResponse {
                    item_id: l.item_id,
                    quantity: l.quantity,
                    price: l.price,
                })
                .collect(),
            created_at: o.created_at,
            shipped_at: o.shipped_at,
            completed_at: o.completed_at,
        }
    }
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListOrdersParams {
    /// Continuation token from the previous page; 0 starts from the beginning.
    #[serde(default)]
    pub cursor: u64,
    /// Requested page size. Defaults to 50, maximum 100.
    pub size: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    /// Cursor for the next page; absent once the listing is complete.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub next: u64,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /
///
/// Liveness check.
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// POST /orders
///
/// Creates an order with a server-assigned identifier and creation time.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = OrderResponse),
        (status = 400, description = "Malformed request body"),
        (status = 409, description = "No free order identifier could be assigned"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    service: web::Data<SharedOrderService>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let line_items = body.line_items.into_iter().map(LineItem::from).collect();

    let order = service.create_order(body.customer_id, line_items).await?;

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

/// GET /orders
///
/// Returns one page of orders. Follow `next` until it is absent to see every
/// order; pages carry no particular order and may vary in length.
#[utoipa::path(
    get,
    path = "/orders",
    params(ListOrdersParams),
    responses(
        (status = 200, description = "One page of orders", body = ListOrdersResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    service: web::Data<SharedOrderService>,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();

    let page = service.list_orders(params.cursor, params.size).await?;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: page.orders.into_iter().map(OrderResponse::from).collect(),
        next: page.cursor,
    }))
}

/// GET /orders/{id}
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = u64, Path, description = "Order identifier"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    service: web::Data<SharedOrderService>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let order = service.get_order(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// PUT /orders/{id}
///
/// Moves the order to "shipped" or "completed". Orders ship once and complete
/// once, and only after shipping.
#[utoipa::path(
    put,
    path = "/orders/{id}",
    params(
        ("id" = u64, Path, description = "Order identifier"),
    ),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = OrderResponse),
        (status = 400, description = "Transition not allowed or unknown status"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn update_order(
    service: web::Data<SharedOrderService>,
    path: web::Path<u64>,
    body: web::Json<UpdateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let order = service
        .update_status(path.into_inner(), &body.status)
        .await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// DELETE /orders/{id}
#[utoipa::path(
    delete,
    path = "/orders/{id}",
    params(
        ("id" = u64, Path, description = "Order identifier"),
    ),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn delete_order(
    service: web::Data<SharedOrderService>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    service.delete_order(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
