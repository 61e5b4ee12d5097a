use anyhow::{Context, Result};
use olc_schemas::{OrderId, OrderView};

pub async fn get(id: OrderId, raw: bool) -> Result<()> {
    let (_cfg, pool) = super::connect().await?;
    let order = olc_db::fetch_order(&pool, id)
        .await?
        .with_context(|| format!("order {id} not found"))?;

    let out = if raw {
        serde_json::to_string_pretty(&order)
    } else {
        serde_json::to_string_pretty(&OrderView::from(&order))
    }
    .context("serialize order")?;
    println!("{}", out);
    Ok(())
}
