//! Receipts: the record of the last completed sale, plus the plain-text
//! rendering handed to the customer.
//!
//! Only the most recent receipt is kept in the session store. The full
//! sale itself lives in the ledger; losing a receipt loses nothing but
//! the reprint.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::{self, DbState};

const RECEIPT_WIDTH: usize = 32;

/// One line on the receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
}

/// A completed sale as handed to the customer. `payment_method` holds the
/// register key (`cash`, `gcash`, `card`); `cash_amount` and `change` are
/// set for cash sales only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub items: Vec<ReceiptItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub payment_method: String,
    pub cash_amount: Option<f64>,
    pub change: Option<f64>,
    pub timestamp: String,
    pub order_id: String,
}

/// Store identity printed on receipt headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreInfo {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub cashier: String,
}

/// Load the last receipt, or `None` when there is none. A damaged stored
/// value also reads as `None`; the sale is still in the ledger.
pub fn load_receipt(db: &DbState) -> Result<Option<Receipt>, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;

    let raw = match db::get_setting(&conn, db::SESSION_CATEGORY, db::KEY_RECEIPT) {
        Some(raw) => raw,
        None => return Ok(None),
    };
    match serde_json::from_str::<Receipt>(&raw) {
        Ok(receipt) => Ok(Some(receipt)),
        Err(e) => {
            warn!("Stored receipt is malformed: {e}");
            Ok(None)
        }
    }
}

/// Read the store identity, falling back to the shop defaults for any
/// value not configured.
pub fn store_info(db: &DbState) -> Result<StoreInfo, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;

    Ok(StoreInfo {
        name: db::get_setting(&conn, "store", "store_name")
            .unwrap_or_else(|| "Babe Procia System".to_string()),
        address: db::get_setting(&conn, "store", "address")
            .unwrap_or_else(|| "123 Coffee Street, Brewville".to_string()),
        phone: db::get_setting(&conn, "store", "phone")
            .unwrap_or_else(|| "(123) 456-7890".to_string()),
        cashier: db::get_setting(&conn, "store", "cashier_name")
            .unwrap_or_else(|| "Grace Procia".to_string()),
    })
}

/// Render a receipt as plain text.
pub fn render_text(receipt: &Receipt, store: &StoreInfo) -> String {
    let mut out = String::new();

    out.push_str(&center(&store.name));
    out.push_str(&center(&store.address));
    out.push_str(&center(&format!("Tel: {}", store.phone)));
    out.push_str(&rule());

    out.push_str(&format!("Order: {}\n", receipt.order_id));
    out.push_str(&format!("Date: {}\n", receipt.timestamp));
    out.push_str(&format!("Cashier: {}\n", store.cashier));
    out.push_str(&rule());

    for item in &receipt.items {
        out.push_str(&amount_line(
            &format!("{} x{}", item.name, item.quantity),
            item.price * item.quantity as f64,
        ));
    }
    out.push_str(&rule());

    out.push_str(&amount_line("Subtotal", receipt.subtotal));
    out.push_str(&amount_line("Tax (10%)", receipt.tax));
    out.push_str(&amount_line("Total", receipt.total));
    out.push_str(&format!("Payment: {}\n", receipt.payment_method));
    if let Some(cash) = receipt.cash_amount {
        out.push_str(&amount_line("Cash", cash));
    }
    if let Some(change) = receipt.change {
        out.push_str(&amount_line("Change", change));
    }
    out.push_str(&rule());

    out.push_str(&center(&format!("Thank you for visiting {}!", store.name)));
    out
}

/// Persist a receipt inside the caller's transaction. The payment flow
/// commits this together with the ledger rows.
pub(crate) fn store_in_tx(conn: &Connection, receipt: &Receipt) -> Result<(), String> {
    let json = serde_json::to_string(receipt).map_err(|e| format!("serialize receipt: {e}"))?;
    db::set_setting(conn, db::SESSION_CATEGORY, db::KEY_RECEIPT, &json)
}

// ---------------------------------------------------------------------------
// Layout helpers
// ---------------------------------------------------------------------------

fn rule() -> String {
    format!("{}\n", "-".repeat(RECEIPT_WIDTH))
}

fn center(text: &str) -> String {
    let len = text.chars().count();
    if len >= RECEIPT_WIDTH {
        return format!("{text}\n");
    }
    let pad = (RECEIPT_WIDTH - len) / 2;
    format!("{}{}\n", " ".repeat(pad), text)
}

fn amount_line(label: &str, amount: f64) -> String {
    let value = format!("\u{20B1}{amount:.2}");
    let label_width = RECEIPT_WIDTH.saturating_sub(value.chars().count());
    format!("{label:<label_width$}{value}\n")
}

// ===========================================================================
// Tests
// ===========================================================================
