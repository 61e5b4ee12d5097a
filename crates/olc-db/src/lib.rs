use anyhow::{Context, Result};
use olc_schemas::{Order, OrderId};
use sqlx::types::Json;
use sqlx::Row;
use sqlx::postgres::PgPoolOptions;

pub use sqlx::PgPool;

mod store;

pub use store::{snapshot_from_window, PgOrderStore};

pub const ENV_DB_URL: &str = "OLC_DATABASE_URL";

/// Connect to Postgres with an explicit URL and pool size.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (orders, membership): (bool, bool) = sqlx::query_as::<_, (bool, bool)>(
        r#"
        select
          exists (
            select 1 from information_schema.tables
            where table_schema='public' and table_name='orders'
          ),
          exists (
            select 1 from information_schema.tables
            where table_schema='public' and table_name='cache_membership'
          )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok,
        has_orders_table: orders,
        has_cache_membership_table: membership,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_orders_table: bool,
    pub has_cache_membership_table: bool,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Insert an order and return its id.
///
/// Idempotent on `order_uid`: a redelivered order returns the id it was
/// first stored under and its payload is left untouched.
pub async fn insert_order(pool: &PgPool, order: &Order) -> Result<OrderId> {
    let (id,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        insert into orders (order_uid, payload)
        values ($1, $2)
        on conflict (order_uid) do update
          set order_uid = excluded.order_uid
        returning order_id
        "#,
    )
    .bind(&order.order_uid)
    .bind(Json(order))
    .fetch_one(pool)
    .await
    .context("insert_order failed")?;

    Ok(OrderId(id))
}

/// Fetch one order by id. `Ok(None)` when the id is unknown.
pub async fn fetch_order(pool: &PgPool, id: OrderId) -> Result<Option<Order>> {
    let row = sqlx::query(
        r#"
        select payload
        from orders
        where order_id = $1
        "#,
    )
    .bind(id.get())
    .fetch_optional(pool)
    .await
    .context("fetch_order failed")?;

    match row {
        Some(r) => {
            let Json(order): Json<Order> = r.try_get("payload").context("decode order payload")?;
            Ok(Some(order))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Cache membership
// ---------------------------------------------------------------------------

/// Append one cache-membership row.
pub async fn insert_cache_membership(pool: &PgPool, id: OrderId) -> Result<()> {
    sqlx::query(
        r#"
        insert into cache_membership (order_id) values ($1)
        "#,
    )
    .bind(id.get())
    .execute(pool)
    .await
    .context("insert_cache_membership failed")?;
    Ok(())
}

/// The newest `capacity` membership rows with their orders, oldest first.
pub async fn load_cache_window(pool: &PgPool, capacity: usize) -> Result<Vec<(OrderId, Order)>> {
    let limit = i64::try_from(capacity).context("capacity does not fit in i64")?;

    let rows = sqlx::query(
        r#"
        select m.order_id, o.payload
        from (
          select seq, order_id
          from cache_membership
          order by seq desc
          limit $1
        ) m
        join orders o on o.order_id = m.order_id
        order by m.seq asc
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("load_cache_window failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        let id: i64 = r.try_get("order_id")?;
        let Json(order): Json<Order> = r.try_get("payload").context("decode order payload")?;
        out.push((OrderId(id), order));
    }
    Ok(out)
}

/// Delete membership rows older than the newest `keep`. Returns the number
/// of rows removed.
pub async fn trim_cache_membership(pool: &PgPool, keep: usize) -> Result<u64> {
    let offset = i64::try_from(keep).context("keep does not fit in i64")?;

    let res = sqlx::query(
        r#"
        delete from cache_membership
        where seq <= (
          select seq
          from cache_membership
          order by seq desc
          offset $1
          limit 1
        )
        "#,
    )
    .bind(offset)
    .execute(pool)
    .await
    .context("trim_cache_membership failed")?;
    Ok(res.rows_affected())
}

/// Delete every membership row. Returns the number of rows removed.
pub async fn clear_cache_membership(pool: &PgPool) -> Result<u64> {
    let res = sqlx::query("delete from cache_membership")
        .execute(pool)
        .await
        .context("clear_cache_membership failed")?;
    Ok(res.rows_affected())
}
