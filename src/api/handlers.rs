use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::dto::*;
use super::{ApiError, AppState};
use crate::domain::aggregates::{Negotiation, Order, Product, Subject};
use crate::domain::services::{Evaluation, PriceBounds};
use crate::domain::value_objects::{DiscountPercent, GeoPoint, Price};
use crate::MarketError;

type ApiResult<T> = Result<T, ApiError>;

pub async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "bargain-market"}))
}

#[tracing::instrument(skip(s, r), fields(shop_id = %r.shop_id))]
pub async fn create_product(State(s): State<AppState>, Json(r): Json<CreateProductRequest>) -> ApiResult<(StatusCode, Json<ProductView>)> {
    r.validate()?;
    let mut product = Product::create(r.shop_id, r.name, Price::new(r.price)?)
        .with_further_rounds(r.allow_further_rounds)
        .with_stock(r.stock.unwrap_or(0));
    if let Some(description) = r.description {
        product = product.with_description(description);
    }
    if let Some(min_price) = r.min_price {
        let max_discount = r.max_discount_percentage.map(DiscountPercent::new).transpose()?.unwrap_or_default();
        product = product.with_negotiation(min_price, max_discount)?;
    }
    s.store.save_product(&product).await?;
    tracing::info!(product_id = %product.id(), negotiable = product.is_negotiable(), "product created");
    Ok((StatusCode::CREATED, Json(ProductView::from(&product))))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<ProductView>> {
    let product = s.store.product(id).await?.ok_or(MarketError::ProductNotFound)?;
    Ok(Json(ProductView::from(&product)))
}

#[tracing::instrument(skip(s, r), fields(customer_id = %r.customer_id))]
pub async fn negotiate_price(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<PriceOfferRequest>) -> ApiResult<Json<Value>> {
    let product = s.store.product(id).await?.ok_or(MarketError::ProductNotFound)?;
    if !product.is_negotiable() {
        return Err(MarketError::InvalidOperation("This product does not support price negotiation".into()).into());
    }

    let (customer_id, offered) = (r.customer_id, r.offered_price);
    let evaluator = s.evaluator;
    let subject = Subject::Product(product.id());
    let mut negotiation = s
        .store
        .record_offer(subject, customer_id, Box::new(move |existing: Option<Negotiation>| -> crate::Result<Negotiation> {
            let mut n = existing
                .unwrap_or_else(|| Negotiation::open(subject, customer_id, product.price().value(), offered));
            n.ensure_accepts_offers(product.allows_further_rounds())?;
            n.evaluate_offer(&product, &evaluator, offered)?;
            Ok(n)
        }))
        .await?;

    s.events.publish(negotiation.take_events()).await;
    tracing::info!(negotiation_id = %negotiation.id(), status = negotiation.status().as_str(), rounds = negotiation.rounds(), "price offer processed");
    Ok(Json(price_offer_body(&negotiation)))
}

#[tracing::instrument(skip(s, r), fields(customer_id = %r.customer_id))]
pub async fn accept_negotiation(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<AcceptRequest>) -> ApiResult<Json<Value>> {
    let mut negotiation = s.store.accept_counter(id, r.customer_id).await?;
    s.events.publish(negotiation.take_events()).await;

    let message = match negotiation.subject() {
        Subject::Product(_) => "Negotiation accepted and item added to cart",
        Subject::Delivery(_) => "Delivery fee negotiation accepted",
    };
    tracing::info!(negotiation_id = %id, final_price = ?negotiation.final_price(), "counter-offer accepted");
    Ok(Json(json!({
        "status": "success",
        "message": message,
        "final_price": negotiation.final_price(),
    })))
}

pub async fn get_negotiation(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    let negotiation = s.store.negotiation(id).await?.ok_or(MarketError::NegotiationNotFound)?;
    let body = match negotiation.subject() {
        Subject::Product(_) => price_offer_body(&negotiation),
        Subject::Delivery(_) => delivery_offer_body(&negotiation),
    };
    Ok(Json(body))
}

/// Stateless evaluation: the caller supplies bounds and session state.
pub async fn evaluate_offer(State(s): State<AppState>, Json(r): Json<EvaluateRequest>) -> ApiResult<Json<Evaluation>> {
    let max_discount = r.max_discount_percentage.map(DiscountPercent::new).transpose()?.unwrap_or_default();
    let bounds = PriceBounds::new(r.list_price, r.min_price, max_discount)?;
    Ok(Json(s.evaluator.evaluate(&bounds, r.offered_price, &r.session)?))
}

#[tracing::instrument(skip(s, r), fields(customer_id = %r.customer_id))]
pub async fn create_order(State(s): State<AppState>, Json(r): Json<CreateOrderRequest>) -> ApiResult<(StatusCode, Json<OrderView>)> {
    r.validate()?;
    let order = Order::create(
        r.customer_id,
        GeoPoint::new(r.shop_lat, r.shop_lng)?,
        GeoPoint::new(r.delivery_lat, r.delivery_lng)?,
        r.subtotal,
    )?;
    s.store.save_order(&order).await?;
    tracing::info!(order_id = %order.id(), "order created");
    Ok((StatusCode::CREATED, Json(OrderView::from(&order))))
}

pub async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<OrderView>> {
    let order = s.store.order(id).await?.ok_or(MarketError::OrderNotFound)?;
    Ok(Json(OrderView::from(&order)))
}

pub async fn delivery_quote(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    let order = s.store.order(id).await?.ok_or(MarketError::OrderNotFound)?;
    let quote = order.quote_delivery(s.delivery);
    Ok(Json(json!({
        "order_id": order.id(),
        "distance_km": quote.distance_km,
        "base_fee": quote.base_fee,
    })))
}

#[tracing::instrument(skip(s, r), fields(customer_id = %r.customer_id))]
pub async fn negotiate_delivery_fee(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<DeliveryOfferRequest>) -> ApiResult<Json<Value>> {
    let order = s.store.order(id).await?.ok_or(MarketError::OrderNotFound)?;
    order.ensure_owned_by(r.customer_id)?;

    let quote = order.quote_delivery(s.delivery);
    let (customer_id, offered) = (r.customer_id, r.offered_fee);
    let evaluator = s.evaluator;
    let subject = Subject::Delivery(order.id());
    let mut negotiation = s
        .store
        .record_offer(subject, customer_id, Box::new(move |existing: Option<Negotiation>| -> crate::Result<Negotiation> {
            let mut n = existing.unwrap_or_else(|| Negotiation::open(subject, customer_id, quote.base_fee, offered));
            n.ensure_accepts_offers(true)?;
            n.evaluate_offer(&quote, &evaluator, offered)?;
            Ok(n)
        }))
        .await?;

    s.events.publish(negotiation.take_events()).await;
    tracing::info!(negotiation_id = %negotiation.id(), status = negotiation.status().as_str(), "delivery offer processed");
    Ok(Json(delivery_offer_body(&negotiation)))
}

pub async fn get_cart(State(s): State<AppState>, Path(customer_id): Path<Uuid>) -> ApiResult<Json<Value>> {
    let cart = s.store.cart(customer_id).await?;
    Ok(Json(json!({
        "customer_id": cart.customer_id(),
        "items": cart.items(),
        "subtotal": cart.subtotal(),
    })))
}
