use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::{CustomerEntry, Glossaries, OriginEntry, ProductEntry};

/// Replace the origin glossary in one transaction.
pub fn replace_origins(conn: &Connection, entries: &[OriginEntry]) -> Result<usize, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM master_origins", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO master_origins
             (origin_id, raw_address, standardized_address, city, state, zip)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for e in entries {
            stmt.execute(params![
                e.origin_id,
                e.raw_address,
                e.standardized_address,
                e.city,
                e.state,
                e.zip,
            ])
            .map_err(|err| duplicate_id("master_origins", &e.origin_id, err))?;
        }
    }
    tx.commit()?;
    Ok(entries.len())
}

pub fn replace_customers(
    conn: &Connection,
    entries: &[CustomerEntry],
) -> Result<usize, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM master_customers", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO master_customers
             (cust_id, canonical_name, parent_company, ultimate_end_user, country, state,
              region, industry, entity_type, address_aliases)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for e in entries {
            stmt.execute(params![
                e.cust_id,
                e.canonical_name,
                e.parent_company,
                e.ultimate_end_user,
                e.country,
                e.state,
                e.region,
                e.industry,
                e.entity_type,
                e.address_aliases,
            ])
            .map_err(|err| duplicate_id("master_customers", &e.cust_id, err))?;
        }
    }
    tx.commit()?;
    Ok(entries.len())
}

pub fn replace_products(
    conn: &Connection,
    entries: &[ProductEntry],
) -> Result<usize, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM master_products", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO master_products
             (prod_id, raw_item_no, raw_description, canonical_item_no, category,
              product_class, model_line, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for e in entries {
            stmt.execute(params![
                e.prod_id,
                e.raw_item_no,
                e.raw_description,
                e.canonical_item_no,
                e.category,
                e.product_class,
                e.model_line,
                e.notes,
            ])
            .map_err(|err| duplicate_id("master_products", &e.prod_id, err))?;
        }
    }
    tx.commit()?;
    Ok(entries.len())
}

/// Load all three glossaries keyed by their short identifiers.
pub fn load_glossaries(conn: &Connection) -> Result<Glossaries, DatabaseError> {
    let mut glossaries = Glossaries::default();

    let mut stmt = conn.prepare(
        "SELECT origin_id, raw_address, standardized_address, city, state, zip
         FROM master_origins",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(OriginEntry {
            origin_id: row.get(0)?,
            raw_address: row.get(1)?,
            standardized_address: row.get(2)?,
            city: row.get(3)?,
            state: row.get(4)?,
            zip: row.get(5)?,
        })
    })?;
    for row in rows {
        let entry = row?;
        glossaries.origins.insert(entry.origin_id.clone(), entry);
    }

    let mut stmt = conn.prepare(
        "SELECT cust_id, canonical_name, parent_company, ultimate_end_user, country, state,
                region, industry, entity_type, address_aliases
         FROM master_customers",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(CustomerEntry {
            cust_id: row.get(0)?,
            canonical_name: row.get(1)?,
            parent_company: row.get(2)?,
            ultimate_end_user: row.get(3)?,
            country: row.get(4)?,
            state: row.get(5)?,
            region: row.get(6)?,
            industry: row.get(7)?,
            entity_type: row.get(8)?,
            address_aliases: row.get(9)?,
        })
    })?;
    for row in rows {
        let entry = row?;
        glossaries.customers.insert(entry.cust_id.clone(), entry);
    }

    let mut stmt = conn.prepare(
        "SELECT prod_id, raw_item_no, raw_description, canonical_item_no, category,
                product_class, model_line, notes
         FROM master_products",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ProductEntry {
            prod_id: row.get(0)?,
            raw_item_no: row.get(1)?,
            raw_description: row.get(2)?,
            canonical_item_no: row.get(3)?,
            category: row.get(4)?,
            product_class: row.get(5)?,
            model_line: row.get(6)?,
            notes: row.get(7)?,
        })
    })?;
    for row in rows {
        let entry = row?;
        glossaries.products.insert(entry.prod_id.clone(), entry);
    }

    Ok(glossaries)
}

pub fn clear_glossaries(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "DELETE FROM master_origins;
         DELETE FROM master_customers;
         DELETE FROM master_products;",
    )?;
    Ok(())
}

fn duplicate_id(table: &str, id: &str, err: rusqlite::Error) -> DatabaseError {
    match err {
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation(format!("{table}: duplicate id '{id}'"))
        }
        other => DatabaseError::Sqlite(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn origin(id: &str, addr: &str) -> OriginEntry {
        OriginEntry {
            origin_id: id.into(),
            raw_address: addr.into(),
            standardized_address: addr.to_uppercase(),
            city: "Houston".into(),
            state: "TX".into(),
            zip: "77001".into(),
        }
    }

    fn product(id: &str) -> ProductEntry {
        ProductEntry {
            prod_id: id.into(),
            raw_item_no: "GH-100".into(),
            raw_description: "Gear housing".into(),
            canonical_item_no: "GH100".into(),
            category: "Part".into(),
            product_class: "Gearbox".into(),
            model_line: "GX".into(),
            notes: String::new(),
        }
    }

    #[test]
    fn replace_overwrites_previous_glossary() {
        let conn = open_memory_database().unwrap();
        replace_origins(&conn, &[origin("O1", "1 Main St"), origin("O2", "2 Oak Ave")]).unwrap();
        replace_origins(&conn, &[origin("O1", "9 Elm Rd")]).unwrap();

        let glossaries = load_glossaries(&conn).unwrap();
        assert_eq!(glossaries.origins.len(), 1);
        assert_eq!(glossaries.origins["O1"].raw_address, "9 Elm Rd");
    }

    #[test]
    fn duplicate_ids_roll_back_whole_replace() {
        let conn = open_memory_database().unwrap();
        replace_products(&conn, &[product("P1")]).unwrap();

        let err = replace_products(&conn, &[product("P7"), product("P7")]).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));

        let glossaries = load_glossaries(&conn).unwrap();
        assert!(glossaries.products.contains_key("P1"));
        assert!(!glossaries.products.contains_key("P7"));
    }

    #[test]
    fn customers_round_trip_entity_type() {
        let conn = open_memory_database().unwrap();
        let customer = CustomerEntry {
            cust_id: "C1".into(),
            canonical_name: "Acme Drilling".into(),
            parent_company: "Acme Holdings".into(),
            ultimate_end_user: String::new(),
            country: "US".into(),
            state: "TX".into(),
            region: "Gulf".into(),
            industry: "Oil & Gas".into(),
            entity_type: "End User".into(),
            address_aliases: "Acme Drlg; ACME".into(),
        };
        replace_customers(&conn, std::slice::from_ref(&customer)).unwrap();
        assert_eq!(load_glossaries(&conn).unwrap().customers["C1"], customer);
    }

    #[test]
    fn clear_empties_all_three() {
        let conn = open_memory_database().unwrap();
        replace_origins(&conn, &[origin("O1", "x")]).unwrap();
        replace_products(&conn, &[product("P1")]).unwrap();
        clear_glossaries(&conn).unwrap();
        assert!(load_glossaries(&conn).unwrap().is_empty());
    }
}
