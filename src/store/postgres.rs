use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;
use uuid::Uuid;

use super::{newly_accepted, MarketStore, OfferFn, Settlement};
use crate::domain::aggregates::{Cart, CartItem, Negotiation, Order, Product, Subject};
use crate::domain::services::Decision;
use crate::domain::value_objects::{DiscountPercent, GeoPoint, Price};
use crate::{MarketError, Result};

const NEGOTIATION_COLUMNS: &str = "id, subject_kind, subject_id, customer_id, status, initial_price, \
    offered_price, counter_price, final_price, rounds, last_decision, last_message, continue_negotiation, \
    created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, shop_id, name, description, price, min_price, max_discount_percentage, \
    allow_further_rounds, stock, created_at";

const ORDER_COLUMNS: &str = "id, customer_id, shop_lat, shop_lng, delivery_lat, delivery_lng, subtotal, \
    delivery_fee, created_at, updated_at";

/// PostgreSQL store. Offers take a transaction-scoped advisory lock on
/// (subject, customer) before reading the active record.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool { &self.pool }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    shop_id: Uuid,
    name: String,
    description: Option<String>,
    price: f64,
    min_price: Option<f64>,
    max_discount_percentage: f64,
    allow_further_rounds: bool,
    stock: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = MarketError;
    fn try_from(r: ProductRow) -> Result<Self> {
        Ok(Product {
            id: r.id,
            shop_id: r.shop_id,
            name: r.name,
            description: r.description,
            price: Price::new(r.price)?,
            min_price: r.min_price,
            max_discount: DiscountPercent::new(r.max_discount_percentage)?,
            allow_further_rounds: r.allow_further_rounds,
            stock: to_u32(r.stock, "stock")?,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    shop_lat: f64,
    shop_lng: f64,
    delivery_lat: f64,
    delivery_lng: f64,
    subtotal: f64,
    delivery_fee: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = MarketError;
    fn try_from(r: OrderRow) -> Result<Self> {
        Ok(Order {
            id: r.id,
            customer_id: r.customer_id,
            shop_location: GeoPoint::new(r.shop_lat, r.shop_lng)?,
            delivery_location: GeoPoint::new(r.delivery_lat, r.delivery_lng)?,
            subtotal: r.subtotal,
            delivery_fee: r.delivery_fee,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NegotiationRow {
    id: Uuid,
    subject_kind: String,
    subject_id: Uuid,
    customer_id: Uuid,
    status: String,
    initial_price: f64,
    offered_price: f64,
    counter_price: Option<f64>,
    final_price: Option<f64>,
    rounds: i32,
    last_decision: Option<String>,
    last_message: Option<String>,
    continue_negotiation: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<NegotiationRow> for Negotiation {
    type Error = MarketError;
    fn try_from(r: NegotiationRow) -> Result<Self> {
        Ok(Negotiation {
            id: r.id,
            subject: Subject::from_parts(&r.subject_kind, r.subject_id)?,
            customer_id: r.customer_id,
            status: r.status.parse()?,
            initial_price: r.initial_price,
            offered_price: r.offered_price,
            counter_price: r.counter_price,
            final_price: r.final_price,
            rounds: to_u32(r.rounds, "rounds")?,
            last_decision: r.last_decision.as_deref().map(str::parse::<Decision>).transpose()?,
            last_message: r.last_message,
            continue_negotiation: r.continue_negotiation,
            created_at: r.created_at,
            updated_at: r.updated_at,
            events: vec![],
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    product_id: Uuid,
    quantity: i32,
    unit_price: f64,
    negotiated_price: Option<f64>,
}

fn corrupt(message: String) -> MarketError {
    MarketError::Storage(sqlx::Error::Decode(message.into()))
}

fn to_u32(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| corrupt(format!("negative {column}: {value}")))
}

fn to_i32(value: u32, column: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| MarketError::InvalidArgument(format!("{column} {value} out of range")))
}

async fn upsert_negotiation(conn: &mut PgConnection, n: &Negotiation) -> Result<()> {
    sqlx::query(
        "INSERT INTO negotiations (id, subject_kind, subject_id, customer_id, status, initial_price, offered_price, \
         counter_price, final_price, rounds, last_decision, last_message, continue_negotiation, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, offered_price = EXCLUDED.offered_price, \
         counter_price = EXCLUDED.counter_price, final_price = EXCLUDED.final_price, rounds = EXCLUDED.rounds, \
         last_decision = EXCLUDED.last_decision, last_message = EXCLUDED.last_message, \
         continue_negotiation = EXCLUDED.continue_negotiation, updated_at = EXCLUDED.updated_at",
    )
    .bind(n.id())
    .bind(n.subject().kind())
    .bind(n.subject().id())
    .bind(n.customer_id())
    .bind(n.status().as_str())
    .bind(n.initial_price())
    .bind(n.offered_price())
    .bind(n.counter_price())
    .bind(n.final_price())
    .bind(to_i32(n.rounds(), "rounds")?)
    .bind(n.last_decision().map(|d| d.as_str()))
    .bind(n.last_message())
    .bind(n.continue_negotiation())
    .bind(n.created_at())
    .bind(n.updated_at())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn settle(conn: &mut PgConnection, negotiation: &Negotiation) -> Result<()> {
    match Settlement::for_negotiation(negotiation) {
        Some(Settlement::CartLine { customer_id, product_id, negotiated_price }) => {
            let row = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"))
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or(MarketError::ProductNotFound)?;
            let mut product = Product::try_from(row)?;

            let has_line = sqlx::query_scalar::<_, i32>("SELECT 1 FROM cart_items WHERE customer_id = $1 AND product_id = $2")
                .bind(customer_id)
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?
                .is_some();
            if !has_line {
                product.update_stock(-1)?;
                sqlx::query("UPDATE products SET stock = $2 WHERE id = $1")
                    .bind(product_id)
                    .bind(to_i32(product.stock(), "stock")?)
                    .execute(&mut *conn)
                    .await?;
            }

            let unit_price = product.price().value();
            sqlx::query(
                "INSERT INTO cart_items (customer_id, product_id, quantity, unit_price, negotiated_price) \
                 VALUES ($1, $2, 1, $3, $4) \
                 ON CONFLICT (customer_id, product_id) DO UPDATE SET negotiated_price = EXCLUDED.negotiated_price",
            )
            .bind(customer_id)
            .bind(product_id)
            .bind(unit_price)
            .bind(negotiated_price)
            .execute(&mut *conn)
            .await?;
        }
        Some(Settlement::DeliveryFee { order_id, fee }) => {
            let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
                .bind(order_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or(MarketError::OrderNotFound)?;
            let mut order = Order::try_from(row)?;
            order.set_delivery_fee(fee)?;
            sqlx::query("UPDATE orders SET delivery_fee = $2, updated_at = $3 WHERE id = $1")
                .bind(order.id())
                .bind(order.delivery_fee())
                .bind(order.updated_at)
                .execute(&mut *conn)
                .await?;
        }
        None => {}
    }
    Ok(())
}

#[async_trait]
impl MarketStore for PgStore {
    async fn save_product(&self, p: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (id, shop_id, name, description, price, min_price, max_discount_percentage, \
             allow_further_rounds, stock, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, description = EXCLUDED.description, \
             price = EXCLUDED.price, min_price = EXCLUDED.min_price, \
             max_discount_percentage = EXCLUDED.max_discount_percentage, \
             allow_further_rounds = EXCLUDED.allow_further_rounds, stock = EXCLUDED.stock",
        )
        .bind(p.id())
        .bind(p.shop_id())
        .bind(p.name())
        .bind(p.description())
        .bind(p.price().value())
        .bind(p.min_price())
        .bind(p.max_discount().percent())
        .bind(p.allows_further_rounds())
        .bind(to_i32(p.stock(), "stock")?)
        .bind(p.created_at())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    async fn save_order(&self, o: &Order) -> Result<()> {
        sqlx::query(
            "INSERT INTO orders (id, customer_id, shop_lat, shop_lng, delivery_lat, delivery_lng, subtotal, \
             delivery_fee, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE SET subtotal = EXCLUDED.subtotal, delivery_fee = EXCLUDED.delivery_fee, \
             updated_at = EXCLUDED.updated_at",
        )
        .bind(o.id())
        .bind(o.customer_id())
        .bind(o.shop_location().lat())
        .bind(o.shop_location().lng())
        .bind(o.delivery_location().lat())
        .bind(o.delivery_location().lng())
        .bind(o.subtotal())
        .bind(o.delivery_fee())
        .bind(o.created_at())
        .bind(o.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn cart(&self, customer_id: Uuid) -> Result<Cart> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            "SELECT product_id, quantity, unit_price, negotiated_price FROM cart_items \
             WHERE customer_id = $1 ORDER BY product_id",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        let items = rows
            .into_iter()
            .map(|r| {
                Ok(CartItem {
                    product_id: r.product_id,
                    quantity: to_u32(r.quantity, "quantity")?,
                    unit_price: r.unit_price,
                    negotiated_price: r.negotiated_price,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Cart::restore(customer_id, items))
    }

    async fn negotiation(&self, id: Uuid) -> Result<Option<Negotiation>> {
        sqlx::query_as::<_, NegotiationRow>(&format!("SELECT {NEGOTIATION_COLUMNS} FROM negotiations WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Negotiation::try_from)
            .transpose()
    }

    async fn record_offer(&self, subject: Subject, customer_id: Uuid, apply: OfferFn) -> Result<Negotiation> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("negotiation:{subject}:{customer_id}"))
            .execute(&mut *tx)
            .await?;

        let active = sqlx::query_as::<_, NegotiationRow>(&format!(
            "SELECT {NEGOTIATION_COLUMNS} FROM negotiations \
             WHERE subject_kind = $1 AND subject_id = $2 AND customer_id = $3 \
             AND status IN ('pending', 'counter_offer') ORDER BY created_at DESC LIMIT 1 FOR UPDATE"
        ))
        .bind(subject.kind())
        .bind(subject.id())
        .bind(customer_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(Negotiation::try_from)
        .transpose()?;
        let before = active.as_ref().map(|n| n.status());

        let negotiation = apply(active)?;
        if newly_accepted(before, &negotiation) {
            settle(&mut *tx, &negotiation).await?;
        }
        upsert_negotiation(&mut *tx, &negotiation).await?;
        tx.commit().await?;
        Ok(negotiation)
    }

    async fn accept_counter(&self, negotiation_id: Uuid, customer_id: Uuid) -> Result<Negotiation> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, NegotiationRow>(&format!(
            "SELECT {NEGOTIATION_COLUMNS} FROM negotiations WHERE id = $1 FOR UPDATE"
        ))
        .bind(negotiation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(MarketError::NegotiationNotFound)?;

        let mut negotiation = Negotiation::try_from(row)?;
        negotiation.accept_counter(customer_id)?;
        settle(&mut *tx, &negotiation).await?;
        upsert_negotiation(&mut *tx, &negotiation).await?;
        tx.commit().await?;
        Ok(negotiation)
    }
}
