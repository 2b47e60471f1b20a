//! Payment completion: turns the current order into a ledger transaction
//! and a receipt.
//!
//! The whole checkout commits as one database transaction: the sale rows,
//! the order-number counter, the stored receipt, and the order clear all
//! land together or not at all. A failed payment leaves the order intact.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::db::{self, DbState};
use crate::ledger::{self, LineItem, Transaction};
use crate::orders;
use crate::receipts::{self, Receipt, ReceiptItem};

/// Display name stored in the ledger for a register method key.
pub fn method_display_name(key: &str) -> &'static str {
    match key {
        "cash" => "Cash",
        "gcash" => "GCash",
        _ => "Credit Card",
    }
}

/// Complete the current order with the given payment method.
///
/// `method_key` is one of `cash`, `gcash`, `card`. Cash sales require
/// `cash_tendered` to cover the order total; the change is computed here.
/// Returns the receipt for the completed sale.
pub fn complete_payment(
    db: &DbState,
    method_key: &str,
    cash_tendered: Option<f64>,
) -> Result<Receipt, String> {
    if method_key != "cash" && method_key != "gcash" && method_key != "card" {
        return Err(format!(
            "Invalid method: {method_key}. Must be cash, gcash, or card"
        ));
    }

    let conn = db.conn.lock().map_err(|e| e.to_string())?;

    let order = orders::load_in_tx(&conn)?.ok_or_else(|| "No order in progress".to_string())?;
    if order.items.is_empty() {
        return Err("Order has no items".to_string());
    }

    let (cash_amount, change) = if method_key == "cash" {
        let tendered = match cash_tendered {
            Some(t) if t.is_finite() => t,
            _ => return Err("Please enter a valid cash amount".to_string()),
        };
        if tendered < order.total {
            return Err("Insufficient cash amount".to_string());
        }
        (Some(tendered), Some(tendered - order.total))
    } else {
        (None, None)
    };

    let counter: i64 = db::get_setting(&conn, db::SESSION_CATEGORY, db::KEY_ORDER_COUNTER)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
        + 1;
    let order_id = format!("ORD-{counter:04}");

    let now = Utc::now();
    let tx = Transaction {
        id: Uuid::new_v4().to_string(),
        date: now.date_naive().to_string(),
        order_id: order_id.clone(),
        items: order.items.iter().map(|i| i.quantity).sum(),
        total: order.total,
        payment_method: method_display_name(method_key).to_string(),
        products: order
            .items
            .iter()
            .map(|i| LineItem {
                id: i.id,
                name: i.name.clone(),
                quantity: i.quantity,
                price: i.price,
            })
            .collect(),
    };

    let receipt = Receipt {
        items: order
            .items
            .iter()
            .map(|i| ReceiptItem {
                id: i.id,
                name: i.name.clone(),
                price: i.price,
                quantity: i.quantity,
            })
            .collect(),
        subtotal: order.subtotal,
        tax: order.tax,
        total: order.total,
        payment_method: method_key.to_string(),
        cash_amount,
        change,
        timestamp: now.to_rfc3339(),
        order_id,
    };

    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| format!("begin transaction: {e}"))?;

    let result = (|| -> Result<(), String> {
        ledger::record_in_tx(&conn, &tx)?;
        db::set_setting(
            &conn,
            db::SESSION_CATEGORY,
            db::KEY_ORDER_COUNTER,
            &counter.to_string(),
        )?;
        receipts::store_in_tx(&conn, &receipt)?;
        orders::clear_in_tx(&conn)?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT")
                .map_err(|e| format!("commit: {e}"))?;
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    }

    info!(
        order_id = %receipt.order_id,
        method = %method_key,
        total = %receipt.total,
        "Payment completed"
    );

    Ok(receipt)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{DateRange, PaymentFilter};
    use chrono::NaiveDate;
    use rusqlite::Connection;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn test_db() -> DbState {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        db::run_migrations_for_test(&conn);
        DbState {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        }
    }

    /// Latte x2 and one Muffin: subtotal 320, tax 32, total 352.
    fn ring_up_sample_order(db: &DbState) {
        orders::add_item(db, 1, "Latte", 120.0).expect("add");
        orders::add_item(db, 1, "Latte", 120.0).expect("add");
        orders::add_item(db, 2, "Muffin", 80.0).expect("add");
    }

    #[test]
    fn test_cash_payment_happy_path() {
        let db = test_db();
        ring_up_sample_order(&db);

        let receipt = complete_payment(&db, "cash", Some(400.0)).expect("pay");

        assert_eq!(receipt.order_id, "ORD-0001");
        assert_eq!(receipt.payment_method, "cash");
        assert_eq!(receipt.cash_amount, Some(400.0));
        assert!((receipt.change.expect("change") - 48.0).abs() < 1e-9);
        assert!((receipt.total - 352.0).abs() < 1e-9);

        // The sale landed in the ledger under the display name
        let report =
            ledger::query_ledger(&db, &DateRange::Today, &PaymentFilter::All).expect("query");
        assert_eq!(report.transactions.len(), 1);
        assert_eq!(report.transactions[0].payment_method, "Cash");
        assert_eq!(report.transactions[0].items, 3);

        // The order is gone and the receipt is stored
        assert!(orders::current_order(&db).expect("load").is_none());
        let stored = receipts::load_receipt(&db).expect("load").expect("present");
        assert_eq!(stored.order_id, "ORD-0001");

        // Daily counters were bumped
        let stats = ledger::daily_stats(&db).expect("stats");
        assert!((stats.daily_sales - 352.0).abs() < 1e-9);
        assert_eq!(stats.orders_completed, 1);
    }

    #[test]
    fn test_insufficient_cash_leaves_order_intact() {
        let db = test_db();
        ring_up_sample_order(&db);

        let err = complete_payment(&db, "cash", Some(100.0)).expect_err("short cash");
        assert_eq!(err, "Insufficient cash amount");

        // Nothing changed: order still there, ledger empty
        assert!(orders::current_order(&db).expect("load").is_some());
        let report =
            ledger::query_ledger(&db, &DateRange::Today, &PaymentFilter::All).expect("query");
        assert!(report.transactions.is_empty());
    }

    #[test]
    fn test_cash_requires_a_valid_amount() {
        let db = test_db();
        ring_up_sample_order(&db);

        assert_eq!(
            complete_payment(&db, "cash", None).expect_err("missing"),
            "Please enter a valid cash amount"
        );
        assert_eq!(
            complete_payment(&db, "cash", Some(f64::NAN)).expect_err("nan"),
            "Please enter a valid cash amount"
        );
    }

    #[test]
    fn test_exact_cash_gives_zero_change() {
        let db = test_db();
        ring_up_sample_order(&db);

        let receipt = complete_payment(&db, "cash", Some(352.0)).expect("pay");
        assert!((receipt.change.expect("change")).abs() < 1e-9);
    }

    #[test]
    fn test_gcash_payment_has_no_cash_fields() {
        let db = test_db();
        ring_up_sample_order(&db);

        let receipt = complete_payment(&db, "gcash", None).expect("pay");
        assert_eq!(receipt.payment_method, "gcash");
        assert_eq!(receipt.cash_amount, None);
        assert_eq!(receipt.change, None);

        let report =
            ledger::query_ledger(&db, &DateRange::Today, &PaymentFilter::GCash).expect("query");
        assert_eq!(report.transactions.len(), 1);
    }

    #[test]
    fn test_card_maps_to_credit_card_in_the_ledger() {
        let db = test_db();
        ring_up_sample_order(&db);

        complete_payment(&db, "card", None).expect("pay");

        let report =
            ledger::query_ledger(&db, &DateRange::Today, &PaymentFilter::Card).expect("query");
        assert_eq!(report.transactions.len(), 1);
        assert_eq!(report.transactions[0].payment_method, "Credit Card");
    }

    #[test]
    fn test_rejects_unknown_method() {
        let db = test_db();
        ring_up_sample_order(&db);

        let err = complete_payment(&db, "cheque", None).expect_err("bad method");
        assert!(err.starts_with("Invalid method: cheque"));
    }

    #[test]
    fn test_rejects_payment_without_an_order() {
        let db = test_db();
        assert_eq!(
            complete_payment(&db, "cash", Some(100.0)).expect_err("no order"),
            "No order in progress"
        );
    }

    #[test]
    fn test_rejects_order_with_no_items() {
        let db = test_db();
        orders::add_item(&db, 1, "Latte", 120.0).expect("add");
        orders::remove_item(&db, 1).expect("remove");

        assert_eq!(
            complete_payment(&db, "cash", Some(100.0)).expect_err("empty order"),
            "Order has no items"
        );
    }

    #[test]
    fn test_order_numbers_are_sequential_and_reset_daily() {
        let db = test_db();

        ring_up_sample_order(&db);
        let first = complete_payment(&db, "card", None).expect("pay");
        assert_eq!(first.order_id, "ORD-0001");

        ring_up_sample_order(&db);
        let second = complete_payment(&db, "card", None).expect("pay");
        assert_eq!(second.order_id, "ORD-0002");

        // A new day starts the numbering over
        let tomorrow: NaiveDate = "2099-01-01".parse().expect("date");
        ledger::ensure_current_day(&db, tomorrow).expect("rollover");

        ring_up_sample_order(&db);
        let third = complete_payment(&db, "card", None).expect("pay");
        assert_eq!(third.order_id, "ORD-0001");
    }
}
