use std::collections::HashSet;
use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::enums::InconsistencyLevel;
use crate::models::{CanonicalInvoice, CanonicalLineItem, LedgerBatch};

/// Append one reconciled chunk to the three output tables atomically.
///
/// A base id already present in `invoice_level_data` fails the whole batch.
pub fn append_ledger_batch(conn: &Connection, batch: &LedgerBatch) -> Result<usize, DatabaseError> {
    if batch.is_empty() {
        return Ok(0);
    }
    let appended_at = Utc::now().to_rfc3339();
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO invoice_level_data
             (invoice_id_base, invoice_id_full, iso_date, origin_address, customer_name,
              parent_company, sold_to_attn, ship_to_resolved, ship_to_attn, customer_segment,
              region, po, salesperson, terms, shipped_via, fob, printed_subtotal,
              calculated_item_total, tax, shipping, cc_fees, intl_fees, discount_line,
              discount_invoice, grand_total, currency, inconsistency_level, math_check,
              appended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29)",
        )?;
        for inv in &batch.invoices {
            stmt.execute(params![
                inv.invoice_id_base,
                inv.invoice_id_full,
                inv.iso_date,
                inv.origin_address,
                inv.customer_name,
                inv.parent_company,
                inv.sold_to_attn,
                inv.ship_to_resolved,
                inv.ship_to_attn,
                inv.customer_segment,
                inv.region,
                inv.po,
                inv.salesperson,
                inv.terms,
                inv.shipped_via,
                inv.fob,
                inv.printed_subtotal,
                inv.calculated_item_total,
                inv.tax,
                inv.shipping,
                inv.cc_fees,
                inv.intl_fees,
                inv.discount_line,
                inv.discount_invoice,
                inv.total,
                inv.currency,
                inv.inconsistency_level.as_str(),
                inv.math_check,
                appended_at,
            ])
            .map_err(|err| match err {
                rusqlite::Error::SqliteFailure(code, _)
                    if code.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    DatabaseError::ConstraintViolation(format!(
                        "invoice {} already reconciled",
                        inv.invoice_id_base
                    ))
                }
                other => DatabaseError::Sqlite(other),
            })?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO line_item_level_data
             (invoice_id_base, prod_id, qty, item_no, description, unit_cost, extended_total,
              category, product_class, product_line, parent_description, sub_details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )?;
        for line in &batch.line_items {
            stmt.execute(params![
                line.invoice_id_base,
                line.prod_id,
                line.qty,
                line.item_no,
                line.description,
                line.unit_cost,
                line.extended_total,
                line.category,
                line.product_class,
                line.product_line,
                line.parent_description,
                line.sub_details,
            ])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO all_invoice_data_flat
             (invoice_id_base, invoice_id_full, iso_date, customer_name, parent_company,
              customer_segment, region, qty, item_no, description, unit_cost, extended_total,
              category, product_class, product_line, parent_description, sub_details,
              grand_total, inconsistency_level)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19)",
        )?;
        for flat in &batch.flat_rows {
            stmt.execute(params![
                flat.invoice_id_base,
                flat.invoice_id_full,
                flat.iso_date,
                flat.customer_name,
                flat.parent_company,
                flat.customer_segment,
                flat.region,
                flat.qty,
                flat.item_no,
                flat.description,
                flat.unit_cost,
                flat.extended_total,
                flat.category,
                flat.product_class,
                flat.product_line,
                flat.parent_description,
                flat.sub_details,
                flat.grand_total,
                flat.inconsistency_level.as_str(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(batch.invoices.len())
}

/// Base ids already present in the canonical ledger.
pub fn processed_base_ids(conn: &Connection) -> Result<HashSet<String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT invoice_id_base FROM invoice_level_data")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}

pub fn load_invoices(conn: &Connection) -> Result<Vec<CanonicalInvoice>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT invoice_id_base, invoice_id_full, iso_date, origin_address, customer_name,
                parent_company, sold_to_attn, ship_to_resolved, ship_to_attn, customer_segment,
                region, po, salesperson, terms, shipped_via, fob, printed_subtotal,
                calculated_item_total, tax, shipping, cc_fees, intl_fees, discount_line,
                discount_invoice, grand_total, currency, inconsistency_level, math_check
         FROM invoice_level_data ORDER BY rowid",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            CanonicalInvoice {
                invoice_id_base: row.get(0)?,
                invoice_id_full: row.get(1)?,
                iso_date: row.get(2)?,
                origin_address: row.get(3)?,
                customer_name: row.get(4)?,
                parent_company: row.get(5)?,
                sold_to_attn: row.get(6)?,
                ship_to_resolved: row.get(7)?,
                ship_to_attn: row.get(8)?,
                customer_segment: row.get(9)?,
                region: row.get(10)?,
                po: row.get(11)?,
                salesperson: row.get(12)?,
                terms: row.get(13)?,
                shipped_via: row.get(14)?,
                fob: row.get(15)?,
                printed_subtotal: row.get(16)?,
                calculated_item_total: row.get(17)?,
                tax: row.get(18)?,
                shipping: row.get(19)?,
                cc_fees: row.get(20)?,
                intl_fees: row.get(21)?,
                discount_line: row.get(22)?,
                discount_invoice: row.get(23)?,
                total: row.get(24)?,
                currency: row.get(25)?,
                inconsistency_level: InconsistencyLevel::None,
                math_check: row.get(27)?,
            },
            row.get::<_, String>(26)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (mut invoice, level) = row?;
        invoice.inconsistency_level = InconsistencyLevel::from_str(&level)?;
        out.push(invoice);
    }
    Ok(out)
}

pub fn load_line_items(
    conn: &Connection,
    invoice_id_base: &str,
) -> Result<Vec<CanonicalLineItem>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT invoice_id_base, prod_id, qty, item_no, description, unit_cost, extended_total,
                category, product_class, product_line, parent_description, sub_details
         FROM line_item_level_data WHERE invoice_id_base = ?1 ORDER BY line_id",
    )?;
    let rows = stmt.query_map(params![invoice_id_base], |row| {
        Ok(CanonicalLineItem {
            invoice_id_base: row.get(0)?,
            prod_id: row.get(1)?,
            qty: row.get(2)?,
            item_no: row.get(3)?,
            description: row.get(4)?,
            unit_cost: row.get(5)?,
            extended_total: row.get(6)?,
            category: row.get(7)?,
            product_class: row.get(8)?,
            product_line: row.get(9)?,
            parent_description: row.get(10)?,
            sub_details: row.get(11)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn count_flat_rows(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM all_invoice_data_flat", [], |row| row.get(0))?)
}

/// Empty the three output tables. Children first for the foreign keys.
pub fn clear_output_tables(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "DELETE FROM all_invoice_data_flat;
         DELETE FROM line_item_level_data;
         DELETE FROM invoice_level_data;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlatLedgerRow;
    use crate::db::sqlite::open_memory_database;

    fn invoice(base: &str) -> CanonicalInvoice {
        CanonicalInvoice {
            invoice_id_base: base.into(),
            invoice_id_full: base.into(),
            iso_date: "2022-03-14".into(),
            origin_address: "1 Main St".into(),
            customer_name: "Acme Drilling".into(),
            parent_company: "Acme Holdings".into(),
            sold_to_attn: String::new(),
            ship_to_resolved: "Yard 4".into(),
            ship_to_attn: String::new(),
            customer_segment: "End User".into(),
            region: "Gulf".into(),
            po: "PO-77".into(),
            salesperson: "JR".into(),
            terms: "Net 30".into(),
            shipped_via: "UPS".into(),
            fob: "Origin".into(),
            printed_subtotal: 100.0,
            calculated_item_total: 100.0,
            tax: 8.25,
            shipping: 0.0,
            cc_fees: 0.0,
            intl_fees: 0.0,
            discount_line: 0.0,
            discount_invoice: 0.0,
            total: 108.25,
            currency: "USD".into(),
            inconsistency_level: InconsistencyLevel::Minor,
            math_check: "ok".into(),
        }
    }

    fn batch(base: &str) -> LedgerBatch {
        let inv = invoice(base);
        let line = CanonicalLineItem {
            invoice_id_base: base.into(),
            prod_id: "P7".into(),
            qty: 4.0,
            item_no: "GH100".into(),
            description: "Gear housing".into(),
            unit_cost: 25.0,
            extended_total: 100.0,
            category: "Part".into(),
            product_class: "Gearbox".into(),
            product_line: "GX".into(),
            parent_description: String::new(),
            sub_details: String::new(),
        };
        let flat = FlatLedgerRow {
            invoice_id_base: base.into(),
            invoice_id_full: base.into(),
            iso_date: inv.iso_date.clone(),
            customer_name: inv.customer_name.clone(),
            parent_company: inv.parent_company.clone(),
            customer_segment: inv.customer_segment.clone(),
            region: inv.region.clone(),
            qty: line.qty,
            item_no: line.item_no.clone(),
            description: line.description.clone(),
            unit_cost: line.unit_cost,
            extended_total: line.extended_total,
            category: line.category.clone(),
            product_class: line.product_class.clone(),
            product_line: line.product_line.clone(),
            parent_description: String::new(),
            sub_details: String::new(),
            grand_total: inv.total,
            inconsistency_level: inv.inconsistency_level,
        };
        LedgerBatch {
            invoices: vec![inv],
            line_items: vec![line],
            flat_rows: vec![flat],
        }
    }

    #[test]
    fn append_writes_all_three_tables() {
        let conn = open_memory_database().unwrap();
        assert_eq!(append_ledger_batch(&conn, &batch("5001")).unwrap(), 1);

        let invoices = load_invoices(&conn).unwrap();
        assert_eq!(invoices, vec![invoice("5001")]);
        let lines = load_line_items(&conn, "5001").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].prod_id, "P7");
        assert_eq!(count_flat_rows(&conn).unwrap(), 1);
        assert!(processed_base_ids(&conn).unwrap().contains("5001"));
    }

    #[test]
    fn second_append_of_same_base_fails_and_rolls_back() {
        let conn = open_memory_database().unwrap();
        append_ledger_batch(&conn, &batch("5001")).unwrap();

        let mut combined = batch("5002");
        let dup = batch("5001");
        combined.invoices.extend(dup.invoices);
        combined.line_items.extend(dup.line_items);

        let err = append_ledger_batch(&conn, &combined).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
        assert!(!processed_base_ids(&conn).unwrap().contains("5002"));
        assert_eq!(count_flat_rows(&conn).unwrap(), 1);
    }

    #[test]
    fn clear_output_tables_empties_ledger() {
        let conn = open_memory_database().unwrap();
        append_ledger_batch(&conn, &batch("1")).unwrap();
        clear_output_tables(&conn).unwrap();
        assert!(processed_base_ids(&conn).unwrap().is_empty());
        assert_eq!(count_flat_rows(&conn).unwrap(), 0);
    }
}
