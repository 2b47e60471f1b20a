//! Product catalog: fetched from the backend, cached locally, browsed
//! offline.
//!
//! The cache holds the last successful sync; the register keeps selling
//! from it when the backend is unreachable.

use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api;
use crate::db::DbState;

const PRODUCTS_CACHE_KEY: &str = "products";

/// A sellable product as served by the backend. Parsing is lenient:
/// only `id`, `name`, and `price` are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

/// Fetch the catalog from the backend and replace the local cache.
///
/// Entries that do not parse are dropped with a warning rather than
/// failing the sync. Returns the number of products cached.
pub async fn sync_products(db: &DbState) -> Result<usize, String> {
    let payload = api::get_products().await?;

    let raw_items = payload
        .as_array()
        .cloned()
        .ok_or_else(|| "Backend catalog response is not a list".to_string())?;

    let mut products = Vec::with_capacity(raw_items.len());
    for item in raw_items {
        match serde_json::from_value::<Product>(item) {
            Ok(p) => products.push(p),
            Err(e) => warn!("Skipping catalog entry that does not parse: {e}"),
        }
    }

    let data = serde_json::to_string(&products).map_err(|e| format!("serialize catalog: {e}"))?;

    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO catalog_cache (cache_key, data, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(cache_key) DO UPDATE SET
            data = excluded.data,
            updated_at = excluded.updated_at",
        params![PRODUCTS_CACHE_KEY, data],
    )
    .map_err(|e| format!("store catalog: {e}"))?;

    info!(count = products.len(), "Product catalog synced");
    Ok(products.len())
}

/// The cached catalog. An absent or damaged cache reads as empty so the
/// register still opens before the first sync.
pub fn products(db: &DbState) -> Result<Vec<Product>, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;

    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM catalog_cache WHERE cache_key = ?1",
            params![PRODUCTS_CACHE_KEY],
            |row| row.get(0),
        )
        .ok();

    let raw = match data {
        Some(raw) => raw,
        None => return Ok(Vec::new()),
    };

    match serde_json::from_str::<Vec<Product>>(&raw) {
        Ok(products) => Ok(products),
        Err(e) => {
            warn!("Cached catalog is malformed: {e}");
            Ok(Vec::new())
        }
    }
}

// ---------------------------------------------------------------------------
// Browsing helpers
// ---------------------------------------------------------------------------

/// Case-insensitive search over product names and descriptions. An empty
/// query matches everything.
pub fn search_products(products: &[Product], query: &str) -> Vec<Product> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return products.to_vec();
    }
    products
        .iter()
        .filter(|p| {
            p.name.to_lowercase().contains(&needle)
                || p.description.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Filter by category tab. `"All"` passes everything through.
pub fn by_category(products: &[Product], category: &str) -> Vec<Product> {
    if category == "All" {
        return products.to_vec();
    }
    products
        .iter()
        .filter(|p| p.category == category)
        .cloned()
        .collect()
}

/// Category tabs: `"All"` first, then each category in first-seen order.
pub fn categories(products: &[Product]) -> Vec<String> {
    let mut out = vec!["All".to_string()];
    for p in products {
        if !out.iter().any(|c| c == &p.category) {
            out.push(p.category.clone());
        }
    }
    out
}

// ===========================================================================
// Tests
// ===========================================================================
