use anyhow::{bail, Result};

/// Print the membership window a restart with `capacity` would restore.
pub async fn inspect(capacity: Option<usize>) -> Result<()> {
    let (cfg, pool) = super::connect().await?;
    let capacity = capacity.unwrap_or(cfg.cache_size);
    if capacity == 0 {
        println!("capacity=0 cache_disabled=true");
        return Ok(());
    }

    let window = olc_db::load_cache_window(&pool, capacity).await?;
    let n = window.len();
    println!("capacity={} resident_slots={}", capacity, n);
    for (slot, (id, order)) in window.iter().enumerate() {
        println!("slot={} order_id={} order_uid={}", slot, id, order.order_uid);
    }
    // A full window wraps the write cursor back to slot 0.
    let next_pos = if n >= capacity { 0 } else { n };
    println!("next_pos={}", next_pos);
    Ok(())
}

/// Delete all persisted membership rows.
pub async fn clear(yes: bool) -> Result<()> {
    if !yes {
        bail!(
            "REFUSING CLEAR: the next daemon start will begin with a cold cache. \
             Re-run with: `olc cache clear --yes`"
        );
    }
    let (_cfg, pool) = super::connect().await?;
    let n = olc_db::clear_cache_membership(&pool).await?;
    println!("cleared_rows={}", n);
    Ok(())
}
