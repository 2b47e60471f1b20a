//! Sales ledger: the append-only record of completed sales and the
//! aggregates derived from it.
//!
//! All ledger tables (`transactions`, `product_sales`, `payment_stats`)
//! and the daily session counters are owned by this module; other modules
//! go through the functions here instead of touching the rows themselves.
//! Reports are recomputed from the transaction log on every query, so the
//! lifetime aggregate tables never drift into what a report shows.

use chrono::{Duration, Months, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::{self, DbState};

/// Payment methods the register offers. Reports always list these three
/// first, zero-filled when unused; anything else recorded in the ledger
/// is appended after them.
const KNOWN_METHODS: [&str; 3] = ["Cash", "GCash", "Credit Card"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One sold product line inside a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub name: String,
    pub quantity: i64,
    pub price: f64,
}

/// A completed sale. `date` is the UTC calendar day (`YYYY-MM-DD`),
/// `items` the summed quantity across all lines, `total` the amount
/// actually charged (tax included).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub date: String,
    pub order_id: String,
    pub items: i64,
    pub total: f64,
    pub payment_method: String,
    pub products: Vec<LineItem>,
}

/// Per-product sales rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAggregate {
    pub id: i64,
    pub product: String,
    pub quantity: i64,
    pub revenue: f64,
}

/// Per-payment-method rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAggregate {
    pub method: String,
    pub count: i64,
    pub amount: f64,
}

/// Counters for the current business day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub session_date: String,
    pub daily_sales: f64,
    pub orders_completed: i64,
    pub average_order_value: f64,
}

/// A full sales report for one date range and payment filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReport {
    pub transactions: Vec<Transaction>,
    pub product_sales: Vec<ProductAggregate>,
    pub payment_summary: Vec<PaymentAggregate>,
    pub total_sales: f64,
    pub total_orders: i64,
    pub average_order_value: f64,
}

/// Date window for reports. All bounds are inclusive calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    /// The current day only.
    Today,
    /// The last seven days, today included.
    Week,
    /// From one calendar month ago (day clamped) through today.
    Month,
    /// An explicit window. An inverted window yields an empty report.
    Custom { start: NaiveDate, end: NaiveDate },
}

impl DateRange {
    /// Resolve to inclusive `(start, end)` bounds relative to `today`.
    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            DateRange::Today => (today, today),
            DateRange::Week => (today - Duration::days(6), today),
            DateRange::Month => (
                today.checked_sub_months(Months::new(1)).unwrap_or(today),
                today,
            ),
            DateRange::Custom { start, end } => (*start, *end),
        }
    }
}

/// Payment-method filter for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentFilter {
    All,
    Cash,
    GCash,
    Card,
}

impl PaymentFilter {
    /// The stored method name this filter matches, or `None` for all.
    pub fn method_name(&self) -> Option<&'static str> {
        match self {
            PaymentFilter::All => None,
            PaymentFilter::Cash => Some("Cash"),
            PaymentFilter::GCash => Some("GCash"),
            PaymentFilter::Card => Some("Credit Card"),
        }
    }
}

// ---------------------------------------------------------------------------
// Recording
// ---------------------------------------------------------------------------

/// Record a completed sale.
///
/// Inserts the transaction, bumps the lifetime product and payment-method
/// aggregates, and bumps the daily counters, all in one database
/// transaction. On any failure nothing is recorded.
pub fn record_transaction(db: &DbState, tx: &Transaction) -> Result<(), String> {
    if tx.id.trim().is_empty() {
        return Err("Missing transaction id".to_string());
    }
    if tx.total < 0.0 {
        return Err(format!("Invalid total: {}", tx.total));
    }

    let conn = db.conn.lock().map_err(|e| e.to_string())?;

    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| format!("begin transaction: {e}"))?;

    let result = (|| -> Result<(), String> { record_in_tx(&conn, tx) })();

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
        tx_id = %tx.id,
        order_id = %tx.order_id,
        total = %tx.total,
        method = %tx.payment_method,
        "Transaction recorded"
    );

    Ok(())
}

/// Write one sale's rows inside an already-open transaction.
///
/// Callers own BEGIN/COMMIT. Used by `record_transaction` and by the
/// payment flow, which commits the sale together with its receipt.
pub(crate) fn record_in_tx(conn: &Connection, tx: &Transaction) -> Result<(), String> {
    let products_json =
        serde_json::to_string(&tx.products).map_err(|e| format!("serialize products: {e}"))?;

    conn.execute(
        "INSERT INTO transactions (id, date, order_id, items, total, payment_method, products)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            tx.id,
            tx.date,
            tx.order_id,
            tx.items,
            tx.total,
            tx.payment_method,
            products_json
        ],
    )
    .map_err(|e| format!("insert transaction: {e}"))?;

    // Lifetime per-product rollup. The stored name stays as first seen.
    for line in &tx.products {
        conn.execute(
            "INSERT INTO product_sales (product_id, product, quantity, revenue, updated_at)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))
             ON CONFLICT(product_id) DO UPDATE SET
                quantity = quantity + excluded.quantity,
                revenue = revenue + excluded.revenue,
                updated_at = excluded.updated_at",
            params![
                line.id,
                line.name,
                line.quantity,
                line.quantity as f64 * line.price
            ],
        )
        .map_err(|e| format!("update product_sales: {e}"))?;
    }

    // Lifetime per-method rollup. Methods outside the seeded three get
    // their own row rather than being dropped.
    conn.execute(
        "INSERT INTO payment_stats (method, count, amount, updated_at)
         VALUES (?1, 1, ?2, datetime('now'))
         ON CONFLICT(method) DO UPDATE SET
            count = count + 1,
            amount = amount + excluded.amount,
            updated_at = excluded.updated_at",
        params![tx.payment_method, tx.total],
    )
    .map_err(|e| format!("update payment_stats: {e}"))?;

    // Daily counters, parse-or-default so a damaged value never blocks a sale
    let daily_sales: f64 = db::get_setting(conn, db::SESSION_CATEGORY, db::KEY_DAILY_SALES)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0);
    let orders_completed: i64 =
        db::get_setting(conn, db::SESSION_CATEGORY, db::KEY_ORDERS_COMPLETED)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

    db::set_setting(
        conn,
        db::SESSION_CATEGORY,
        db::KEY_DAILY_SALES,
        &(daily_sales + tx.total).to_string(),
    )?;
    db::set_setting(
        conn,
        db::SESSION_CATEGORY,
        db::KEY_ORDERS_COMPLETED,
        &(orders_completed + 1).to_string(),
    )?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Query the ledger for a date range and payment filter.
///
/// Transactions are returned oldest first. Product and payment rollups
/// are recomputed from the matching transactions, not read from the
/// lifetime tables, so they always agree with the list.
pub fn query_ledger(
    db: &DbState,
    range: &DateRange,
    filter: &PaymentFilter,
) -> Result<LedgerReport, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;

    let today = Utc::now().date_naive();
    let (start, end) = range.bounds(today);
    if start > end {
        return Ok(empty_report());
    }

    let start_s = start.to_string();
    let end_s = end.to_string();
    let method = filter.method_name();

    let mut sql = String::from(
        "SELECT id, date, order_id, items, total, payment_method, products
         FROM transactions
         WHERE date >= ?1 AND date <= ?2",
    );
    let mut sql_params: Vec<&dyn rusqlite::ToSql> = vec![&start_s, &end_s];
    if let Some(ref m) = method {
        sql.push_str(" AND payment_method = ?3");
        sql_params.push(m);
    }
    sql.push_str(" ORDER BY created_at ASC, rowid ASC");

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| format!("prepare ledger query: {e}"))?;
    let rows = stmt
        .query_map(sql_params.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })
        .map_err(|e| format!("ledger query: {e}"))?;

    let mut transactions = Vec::new();
    for row in rows {
        let (id, date, order_id, items, total, payment_method, products_json) =
            row.map_err(|e| format!("read ledger row: {e}"))?;
        if date.parse::<NaiveDate>().is_err() {
            warn!(tx_id = %id, date = %date, "Skipping ledger row with malformed date");
            continue;
        }
        let products: Vec<LineItem> = match serde_json::from_str(&products_json) {
            Ok(p) => p,
            Err(e) => {
                warn!(tx_id = %id, "Skipping ledger row with malformed products: {e}");
                continue;
            }
        };
        transactions.push(Transaction {
            id,
            date,
            order_id,
            items,
            total,
            payment_method,
            products,
        });
    }

    Ok(build_report(transactions))
}

/// Fold a transaction list into a full report.
fn build_report(transactions: Vec<Transaction>) -> LedgerReport {
    let mut product_sales: Vec<ProductAggregate> = Vec::new();
    for tx in &transactions {
        for line in &tx.products {
            let revenue = line.quantity as f64 * line.price;
            match product_sales.iter_mut().find(|p| p.id == line.id) {
                Some(agg) => {
                    agg.quantity += line.quantity;
                    agg.revenue += revenue;
                }
                None => product_sales.push(ProductAggregate {
                    id: line.id,
                    product: line.name.clone(),
                    quantity: line.quantity,
                    revenue,
                }),
            }
        }
    }

    let mut payment_summary = seeded_payment_summary();
    for tx in &transactions {
        match payment_summary
            .iter_mut()
            .find(|p| p.method == tx.payment_method)
        {
            Some(agg) => {
                agg.count += 1;
                agg.amount += tx.total;
            }
            None => payment_summary.push(PaymentAggregate {
                method: tx.payment_method.clone(),
                count: 1,
                amount: tx.total,
            }),
        }
    }
    // Seeded rows keep their fixed order; extras are sorted by name
    if payment_summary.len() > KNOWN_METHODS.len() {
        payment_summary[KNOWN_METHODS.len()..].sort_by(|a, b| a.method.cmp(&b.method));
    }

    let total_sales: f64 = transactions.iter().map(|t| t.total).sum();
    let total_orders = transactions.len() as i64;
    let average_order_value = if total_orders > 0 {
        total_sales / total_orders as f64
    } else {
        0.0
    };

    LedgerReport {
        transactions,
        product_sales,
        payment_summary,
        total_sales,
        total_orders,
        average_order_value,
    }
}

fn seeded_payment_summary() -> Vec<PaymentAggregate> {
    KNOWN_METHODS
        .iter()
        .map(|m| PaymentAggregate {
            method: (*m).to_string(),
            count: 0,
            amount: 0.0,
        })
        .collect()
}

fn empty_report() -> LedgerReport {
    LedgerReport {
        transactions: Vec::new(),
        product_sales: Vec::new(),
        payment_summary: seeded_payment_summary(),
        total_sales: 0.0,
        total_orders: 0,
        average_order_value: 0.0,
    }
}

// ---------------------------------------------------------------------------
// Day rollover and daily counters
// ---------------------------------------------------------------------------

/// Make sure the session counters belong to `today`.
///
/// When the stored session date differs, the daily counters and the order
/// number counter reset to zero and the marker moves to `today`. The
/// transaction history and lifetime aggregates are kept; yesterday stays
/// queryable through `query_ledger`.
pub fn ensure_current_day(db: &DbState, today: NaiveDate) -> Result<(), String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;

    let today_s = today.to_string();
    let stored = db::get_setting(&conn, db::SESSION_CATEGORY, db::KEY_SESSION_DATE);
    if stored.as_deref() == Some(today_s.as_str()) {
        return Ok(());
    }

    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| format!("begin transaction: {e}"))?;

    let result = (|| -> Result<(), String> {
        db::set_setting(&conn, db::SESSION_CATEGORY, db::KEY_DAILY_SALES, "0")?;
        db::set_setting(&conn, db::SESSION_CATEGORY, db::KEY_ORDERS_COMPLETED, "0")?;
        db::set_setting(&conn, db::SESSION_CATEGORY, db::KEY_ORDER_COUNTER, "0")?;
        db::set_setting(&conn, db::SESSION_CATEGORY, db::KEY_SESSION_DATE, &today_s)?;
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
        previous = %stored.as_deref().unwrap_or("none"),
        current = %today_s,
        "Session rolled over to a new day"
    );

    Ok(())
}

/// Read the current day's counters.
pub fn daily_stats(db: &DbState) -> Result<DailyStats, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;

    let session_date =
        db::get_setting(&conn, db::SESSION_CATEGORY, db::KEY_SESSION_DATE).unwrap_or_default();
    let daily_sales: f64 = db::get_setting(&conn, db::SESSION_CATEGORY, db::KEY_DAILY_SALES)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0);
    let orders_completed: i64 =
        db::get_setting(&conn, db::SESSION_CATEGORY, db::KEY_ORDERS_COMPLETED)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

    let average_order_value = if orders_completed > 0 {
        daily_sales / orders_completed as f64
    } else {
        0.0
    };

    Ok(DailyStats {
        session_date,
        daily_sales,
        orders_completed,
        average_order_value,
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
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

    /// Build a transaction from (id, name, quantity, price) lines. The
    /// total is the plain line sum; tests that need tax pass their own.
    fn tx(id: &str, date: &str, order_id: &str, method: &str, lines: &[(i64, &str, i64, f64)]) -> Transaction {
        let products: Vec<LineItem> = lines
            .iter()
            .map(|(id, name, quantity, price)| LineItem {
                id: *id,
                name: (*name).to_string(),
                quantity: *quantity,
                price: *price,
            })
            .collect();
        let items = products.iter().map(|p| p.quantity).sum();
        let total = products
            .iter()
            .map(|p| p.quantity as f64 * p.price)
            .sum();
        Transaction {
            id: id.to_string(),
            date: date.to_string(),
            order_id: order_id.to_string(),
            items,
            total,
            payment_method: method.to_string(),
            products,
        }
    }

    fn custom(start: &str, end: &str) -> DateRange {
        DateRange::Custom {
            start: start.parse().expect("start date"),
            end: end.parse().expect("end date"),
        }
    }

    #[test]
    fn test_range_bounds() {
        let today: NaiveDate = "2026-08-22".parse().expect("date");

        assert_eq!(
            DateRange::Today.bounds(today),
            (today, today)
        );
        assert_eq!(
            DateRange::Week.bounds(today),
            ("2026-08-16".parse().expect("date"), today)
        );
        assert_eq!(
            DateRange::Month.bounds(today),
            ("2026-07-22".parse().expect("date"), today)
        );

        // Month clamps the day when the previous month is shorter
        let end_of_march: NaiveDate = "2026-03-31".parse().expect("date");
        assert_eq!(
            DateRange::Month.bounds(end_of_march),
            ("2026-02-28".parse().expect("date"), end_of_march)
        );
    }

    #[test]
    fn test_record_and_query_today() {
        let db = test_db();
        let today = Utc::now().date_naive().to_string();

        let t = tx("tx-1", &today, "ORD-0001", "Cash", &[(1, "Latte", 2, 120.0)]);
        record_transaction(&db, &t).expect("record");

        let report =
            query_ledger(&db, &DateRange::Today, &PaymentFilter::All).expect("query");
        assert_eq!(report.transactions.len(), 1);
        assert_eq!(report.transactions[0].id, "tx-1");
        assert_eq!(report.transactions[0].items, 2);
        assert_eq!(report.total_sales, 240.0);
        assert_eq!(report.total_orders, 1);
        assert_eq!(report.average_order_value, 240.0);
    }

    #[test]
    fn test_report_aggregates() {
        let db = test_db();

        let txs = [
            tx(
                "tx-1",
                "2026-08-20",
                "ORD-0001",
                "Cash",
                &[(1, "Latte", 2, 120.0), (2, "Muffin", 1, 80.0)],
            ),
            tx("tx-2", "2026-08-20", "ORD-0002", "GCash", &[(1, "Latte", 1, 120.0)]),
            tx("tx-3", "2026-08-21", "ORD-0003", "Cash", &[(3, "Americano", 1, 100.0)]),
        ];
        for t in &txs {
            record_transaction(&db, t).expect("record");
        }

        let report = query_ledger(
            &db,
            &custom("2026-08-20", "2026-08-21"),
            &PaymentFilter::All,
        )
        .expect("query");

        // Products aggregate in first-seen order
        assert_eq!(
            report.product_sales,
            vec![
                ProductAggregate { id: 1, product: "Latte".to_string(), quantity: 3, revenue: 360.0 },
                ProductAggregate { id: 2, product: "Muffin".to_string(), quantity: 1, revenue: 80.0 },
                ProductAggregate { id: 3, product: "Americano".to_string(), quantity: 1, revenue: 100.0 },
            ]
        );

        // The three register methods are always present, in fixed order
        assert_eq!(
            report.payment_summary,
            vec![
                PaymentAggregate { method: "Cash".to_string(), count: 2, amount: 420.0 },
                PaymentAggregate { method: "GCash".to_string(), count: 1, amount: 120.0 },
                PaymentAggregate { method: "Credit Card".to_string(), count: 0, amount: 0.0 },
            ]
        );

        assert_eq!(report.total_sales, 540.0);
        assert_eq!(report.total_orders, 3);
        assert_eq!(report.average_order_value, 180.0);
    }

    #[test]
    fn test_single_sale_report() {
        let db = test_db();

        record_transaction(
            &db,
            &tx("tx-1", "2024-01-01", "ORD-0001", "Cash", &[(1, "Latte", 2, 75.0)]),
        )
        .expect("record");

        let report = query_ledger(
            &db,
            &custom("2024-01-01", "2024-01-01"),
            &PaymentFilter::All,
        )
        .expect("query");

        assert_eq!(report.total_sales, 150.0);
        assert_eq!(report.total_orders, 1);
        assert_eq!(report.average_order_value, 150.0);
        assert_eq!(
            report.product_sales,
            vec![ProductAggregate {
                id: 1,
                product: "Latte".to_string(),
                quantity: 2,
                revenue: 150.0,
            }]
        );
        assert_eq!(
            report.payment_summary,
            vec![
                PaymentAggregate { method: "Cash".to_string(), count: 1, amount: 150.0 },
                PaymentAggregate { method: "GCash".to_string(), count: 0, amount: 0.0 },
                PaymentAggregate { method: "Credit Card".to_string(), count: 0, amount: 0.0 },
            ]
        );
    }

    #[test]
    fn test_payment_filter_narrows_report() {
        let db = test_db();

        record_transaction(
            &db,
            &tx("tx-1", "2026-08-20", "ORD-0001", "Cash", &[(1, "Latte", 1, 120.0)]),
        )
        .expect("record");
        record_transaction(
            &db,
            &tx("tx-2", "2026-08-20", "ORD-0002", "GCash", &[(2, "Muffin", 1, 80.0)]),
        )
        .expect("record");

        let report = query_ledger(
            &db,
            &custom("2026-08-20", "2026-08-20"),
            &PaymentFilter::GCash,
        )
        .expect("query");

        assert_eq!(report.transactions.len(), 1);
        assert_eq!(report.transactions[0].payment_method, "GCash");
        assert_eq!(report.total_sales, 80.0);
        // The rollups reflect only the filtered transactions
        assert_eq!(report.product_sales.len(), 1);
        assert_eq!(report.product_sales[0].product, "Muffin");
        let cash = &report.payment_summary[0];
        assert_eq!((cash.method.as_str(), cash.count, cash.amount), ("Cash", 0, 0.0));
    }

    #[test]
    fn test_week_window_is_seven_days_inclusive() {
        let db = test_db();
        let today = Utc::now().date_naive();
        let inside = (today - Duration::days(6)).to_string();
        let outside = (today - Duration::days(7)).to_string();

        record_transaction(
            &db,
            &tx("tx-in", &inside, "ORD-0001", "Cash", &[(1, "Latte", 1, 120.0)]),
        )
        .expect("record");
        record_transaction(
            &db,
            &tx("tx-out", &outside, "ORD-0002", "Cash", &[(1, "Latte", 1, 120.0)]),
        )
        .expect("record");

        let report = query_ledger(&db, &DateRange::Week, &PaymentFilter::All).expect("query");
        assert_eq!(report.transactions.len(), 1);
        assert_eq!(report.transactions[0].id, "tx-in");
    }

    #[test]
    fn test_inverted_custom_range_is_empty() {
        let db = test_db();
        record_transaction(
            &db,
            &tx("tx-1", "2026-08-20", "ORD-0001", "Cash", &[(1, "Latte", 1, 120.0)]),
        )
        .expect("record");

        let report = query_ledger(
            &db,
            &custom("2026-08-21", "2026-08-19"),
            &PaymentFilter::All,
        )
        .expect("query");

        assert!(report.transactions.is_empty());
        assert_eq!(report.total_sales, 0.0);
        assert_eq!(report.average_order_value, 0.0);
        // Even an empty report lists the register's three methods
        assert_eq!(report.payment_summary.len(), 3);
        assert!(report.payment_summary.iter().all(|p| p.count == 0));
    }

    #[test]
    fn test_unknown_method_gets_own_row_after_seeded_ones() {
        let db = test_db();

        record_transaction(
            &db,
            &tx("tx-1", "2026-08-20", "ORD-0001", "Voucher", &[(1, "Latte", 1, 120.0)]),
        )
        .expect("record");
        record_transaction(
            &db,
            &tx("tx-2", "2026-08-20", "ORD-0002", "Barter", &[(2, "Muffin", 1, 80.0)]),
        )
        .expect("record");

        let report = query_ledger(
            &db,
            &custom("2026-08-20", "2026-08-20"),
            &PaymentFilter::All,
        )
        .expect("query");

        let methods: Vec<&str> = report
            .payment_summary
            .iter()
            .map(|p| p.method.as_str())
            .collect();
        assert_eq!(methods, vec!["Cash", "GCash", "Credit Card", "Barter", "Voucher"]);
        assert_eq!(report.payment_summary[3].count, 1);
        assert_eq!(report.payment_summary[4].amount, 120.0);
    }

    #[test]
    fn test_malformed_products_row_is_skipped() {
        let db = test_db();
        record_transaction(
            &db,
            &tx("tx-good", "2026-08-20", "ORD-0001", "Cash", &[(1, "Latte", 1, 120.0)]),
        )
        .expect("record");
        {
            let conn = db.conn.lock().expect("lock");
            conn.execute(
                "INSERT INTO transactions (id, date, order_id, items, total, payment_method, products)
                 VALUES ('tx-bad', '2026-08-20', 'ORD-0002', 1, 50.0, 'Cash', 'not json')",
                [],
            )
            .expect("insert bad row");
        }

        let report = query_ledger(
            &db,
            &custom("2026-08-20", "2026-08-20"),
            &PaymentFilter::All,
        )
        .expect("query");

        assert_eq!(report.transactions.len(), 1);
        assert_eq!(report.transactions[0].id, "tx-good");
        assert_eq!(report.total_sales, 120.0);
    }

    #[test]
    fn test_malformed_date_row_is_skipped() {
        let db = test_db();
        {
            let conn = db.conn.lock().expect("lock");
            // '2026-08-99' sorts inside [2026-08-01, 2026-09-01] but is not a day
            conn.execute(
                "INSERT INTO transactions (id, date, order_id, items, total, payment_method, products)
                 VALUES ('tx-bad-date', '2026-08-99', 'ORD-0001', 1, 50.0, 'Cash', '[]')",
                [],
            )
            .expect("insert bad row");
        }

        let report = query_ledger(
            &db,
            &custom("2026-08-01", "2026-09-01"),
            &PaymentFilter::All,
        )
        .expect("query");

        assert!(report.transactions.is_empty());
    }

    #[test]
    fn test_rejects_bad_transactions() {
        let db = test_db();

        let mut t = tx("", "2026-08-20", "ORD-0001", "Cash", &[(1, "Latte", 1, 120.0)]);
        assert!(record_transaction(&db, &t).is_err());

        t.id = "tx-1".to_string();
        t.total = -1.0;
        assert!(record_transaction(&db, &t).is_err());

        // Nothing was recorded by the failed attempts
        let report = query_ledger(
            &db,
            &custom("2026-08-20", "2026-08-20"),
            &PaymentFilter::All,
        )
        .expect("query");
        assert!(report.transactions.is_empty());
    }

    #[test]
    fn test_daily_counters_accumulate() {
        let db = test_db();
        let today = Utc::now().date_naive();
        ensure_current_day(&db, today).expect("rollover");

        let date = today.to_string();
        record_transaction(
            &db,
            &tx("tx-1", &date, "ORD-0001", "Cash", &[(1, "Latte", 2, 120.0)]),
        )
        .expect("record");
        record_transaction(
            &db,
            &tx("tx-2", &date, "ORD-0002", "GCash", &[(2, "Muffin", 1, 80.0)]),
        )
        .expect("record");

        let stats = daily_stats(&db).expect("stats");
        assert_eq!(stats.session_date, date);
        assert_eq!(stats.daily_sales, 320.0);
        assert_eq!(stats.orders_completed, 2);
        assert_eq!(stats.average_order_value, 160.0);
    }

    #[test]
    fn test_damaged_counter_value_defaults_to_zero() {
        let db = test_db();
        {
            let conn = db.conn.lock().expect("lock");
            db::set_setting(&conn, db::SESSION_CATEGORY, db::KEY_DAILY_SALES, "garbage")
                .expect("seed damaged value");
        }

        record_transaction(
            &db,
            &tx(
                "tx-1",
                "2026-08-20",
                "ORD-0001",
                "Cash",
                &[(1, "Latte", 1, 50.0)],
            ),
        )
        .expect("record");

        let stats = daily_stats(&db).expect("stats");
        assert_eq!(stats.daily_sales, 50.0);
    }

    #[test]
    fn test_rollover_resets_counters_but_keeps_history() {
        let db = test_db();
        let day_one: NaiveDate = "2026-08-20".parse().expect("date");
        let day_two: NaiveDate = "2026-08-21".parse().expect("date");

        ensure_current_day(&db, day_one).expect("first day");
        record_transaction(
            &db,
            &tx("tx-1", "2026-08-20", "ORD-0001", "Cash", &[(1, "Latte", 2, 120.0)]),
        )
        .expect("record");

        let stats = daily_stats(&db).expect("stats");
        assert_eq!(stats.daily_sales, 240.0);
        assert_eq!(stats.orders_completed, 1);

        ensure_current_day(&db, day_two).expect("rollover");

        // Counters belong to the new day
        let stats = daily_stats(&db).expect("stats after rollover");
        assert_eq!(stats.session_date, "2026-08-21");
        assert_eq!(stats.daily_sales, 0.0);
        assert_eq!(stats.orders_completed, 0);
        assert_eq!(stats.average_order_value, 0.0);

        // Yesterday's sale is still in the ledger
        let report = query_ledger(
            &db,
            &custom("2026-08-20", "2026-08-20"),
            &PaymentFilter::All,
        )
        .expect("query");
        assert_eq!(report.transactions.len(), 1);

        // Lifetime aggregates survive the rollover
        let conn = db.conn.lock().expect("lock");
        let lifetime_cash: i64 = conn
            .query_row(
                "SELECT count FROM payment_stats WHERE method = 'Cash'",
                [],
                |row| row.get(0),
            )
            .expect("lifetime row");
        assert_eq!(lifetime_cash, 1);
        assert_eq!(
            db::get_setting(&conn, db::SESSION_CATEGORY, db::KEY_ORDER_COUNTER),
            Some("0".to_string())
        );
    }

    #[test]
    fn test_rollover_is_idempotent_within_a_day() {
        let db = test_db();
        let day: NaiveDate = "2026-08-20".parse().expect("date");

        ensure_current_day(&db, day).expect("first call");
        record_transaction(
            &db,
            &tx("tx-1", "2026-08-20", "ORD-0001", "Cash", &[(1, "Latte", 1, 120.0)]),
        )
        .expect("record");

        // A second call on the same day must not reset anything
        ensure_current_day(&db, day).expect("second call");
        let stats = daily_stats(&db).expect("stats");
        assert_eq!(stats.daily_sales, 120.0);
        assert_eq!(stats.orders_completed, 1);
    }
}
