//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `softrecord_core` linkage.
//! - Walk one record through load, soft delete and reload on an in-memory
//!   database.
//! - Keep output deterministic for quick local sanity checks.

use softrecord_core::db::open_db_in_memory;
use softrecord_core::{
    default_log_level, init_logging, EntityCache, EntityLoader, EntitySchema, SoftDeletable,
    SoftDeleteController, SqliteQueryLayer, SqliteTransactionManager,
};
use std::error::Error;
use std::sync::Arc;

const LOG_DIR_ENV: &str = "SOFTRECORD_LOG_DIR";

fn main() -> Result<(), Box<dyn Error>> {
    println!("softrecord_core ping={}", softrecord_core::ping());
    println!("softrecord_core version={}", softrecord_core::core_version());

    if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
        init_logging(default_log_level(), &log_dir)?;
    }

    let conn = open_db_in_memory()?;
    conn.execute_batch(
        "CREATE TABLE posts (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            is_deleted INTEGER NOT NULL DEFAULT 0
        );
        INSERT INTO posts (title) VALUES ('hello'), ('world');",
    )?;

    let schema = Arc::new(
        EntitySchema::builder("post", "posts")
            .attributes(["id", "title", "version", "is_deleted"])
            .lock_attribute("version")
            .build()?,
    );
    let query = SqliteQueryLayer::new(&conn);
    let transactions = SqliteTransactionManager::new(&conn);
    let controller = SoftDeleteController::new(&query, &transactions);

    let cache = EntityCache::new();
    let loader = EntityLoader::new(&query, &cache, Arc::clone(&schema));
    let posts = loader.get_by_ids([1, 2])?;
    println!("demo loaded={} cached={}", posts.len(), cache.len());

    if let Some(first) = posts.get(&1) {
        let rows = controller.delete(&mut first.borrow_mut(), false)?;
        println!("demo soft_delete id=1 rows={rows}");
    }

    let fresh_cache = EntityCache::new();
    let reloaded = EntityLoader::new(&query, &fresh_cache, schema).get_by_id(1)?;
    println!(
        "demo reload id=1 is_deleted={}",
        reloaded.borrow().is_soft_deleted()
    );
    Ok(())
}
