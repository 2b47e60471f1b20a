//! The in-progress order (the cart).
//!
//! One order exists at a time, persisted in the session store so it
//! survives a restart mid-sale. Totals are recomputed on every change;
//! the stored copy is never trusted to have them right.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::{self, DbState};

/// Sales tax applied on top of the item subtotal.
pub const TAX_RATE: f64 = 0.10;

/// One product line in the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
}

/// The order being rung up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

impl Order {
    fn from_items(items: Vec<OrderItem>) -> Order {
        let subtotal: f64 = items.iter().map(|i| i.price * i.quantity as f64).sum();
        let tax = subtotal * TAX_RATE;
        let total = subtotal + tax;
        Order {
            items,
            subtotal,
            tax,
            total,
        }
    }
}

/// Load the current order, or `None` when nothing is being rung up.
pub fn current_order(db: &DbState) -> Result<Option<Order>, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    load_in_tx(&conn)
}

/// Add one unit of a product. A line already holding the product gets its
/// quantity bumped instead of a second line.
pub fn add_item(db: &DbState, id: i64, name: &str, price: f64) -> Result<Order, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;

    let mut items = load_in_tx(&conn)?.map(|o| o.items).unwrap_or_default();
    match items.iter_mut().find(|i| i.id == id) {
        Some(line) => line.quantity += 1,
        None => items.push(OrderItem {
            id,
            name: name.to_string(),
            price,
            quantity: 1,
        }),
    }

    let order = Order::from_items(items);
    store_in_tx(&conn, &order)?;
    Ok(order)
}

/// Set a line's quantity. Anything below one removes the line.
pub fn set_quantity(db: &DbState, id: i64, quantity: i64) -> Result<Order, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;

    let mut items = load_in_tx(&conn)?.map(|o| o.items).unwrap_or_default();
    if quantity < 1 {
        items.retain(|i| i.id != id);
    } else if let Some(line) = items.iter_mut().find(|i| i.id == id) {
        line.quantity = quantity;
    }

    let order = Order::from_items(items);
    store_in_tx(&conn, &order)?;
    Ok(order)
}

/// Remove a line from the order.
pub fn remove_item(db: &DbState, id: i64) -> Result<Order, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;

    let mut items = load_in_tx(&conn)?.map(|o| o.items).unwrap_or_default();
    items.retain(|i| i.id != id);

    let order = Order::from_items(items);
    store_in_tx(&conn, &order)?;
    Ok(order)
}

/// Discard the current order.
pub fn clear_order(db: &DbState) -> Result<(), String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    clear_in_tx(&conn)?;
    info!("Current order cleared");
    Ok(())
}

// ---------------------------------------------------------------------------
// Connection-level helpers (shared with the payment flow)
// ---------------------------------------------------------------------------

/// Read the stored order off an open connection. A damaged stored value
/// is treated as no order rather than wedging the register.
pub(crate) fn load_in_tx(conn: &Connection) -> Result<Option<Order>, String> {
    let raw = match db::get_setting(conn, db::SESSION_CATEGORY, db::KEY_CURRENT_ORDER) {
        Some(raw) => raw,
        None => return Ok(None),
    };
    match serde_json::from_str::<Order>(&raw) {
        Ok(order) => Ok(Some(order)),
        Err(e) => {
            warn!("Stored order is malformed, discarding: {e}");
            Ok(None)
        }
    }
}

pub(crate) fn clear_in_tx(conn: &Connection) -> Result<(), String> {
    db::delete_setting(conn, db::SESSION_CATEGORY, db::KEY_CURRENT_ORDER)
}

fn store_in_tx(conn: &Connection, order: &Order) -> Result<(), String> {
    let json = serde_json::to_string(order).map_err(|e| format!("serialize order: {e}"))?;
    db::set_setting(conn, db::SESSION_CATEGORY, db::KEY_CURRENT_ORDER, &json)
}

// ===========================================================================
// Tests
// ===========================================================================
