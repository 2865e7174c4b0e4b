/// # Integration Tests Module
///
/// End-to-end tests exercising the public surface as a whole: named
/// handles, statement construction, comment stripping, schema-aware key
/// defaults and the fetch helpers, chained the way calling code uses them.

#[cfg(test)]
mod tests {
    use crate::sql::conditions::Conditions;
    use crate::sql::{FieldList, Limit, Order};
    use crate::{config, Db, LitequeryError, ParamMap};
    use rusqlite::types::Value;
    use std::sync::Arc;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn seed_inventory(db: &mut Db) {
        db.raw(
            "CREATE TABLE inventory (
                sku INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT NOT NULL,
                stock INTEGER NOT NULL DEFAULT 0,
                price REAL
            )",
        )
        .unwrap();
        for (label, stock, price) in [
            ("bolt", 120i64, 0.15f64),
            ("nut", 80, 0.10),
            ("washer", 0, 0.05),
        ] {
            let mut data = ParamMap::new();
            data.insert("label".to_string(), text(label));
            data.insert("stock".to_string(), Value::Integer(stock));
            data.insert("price".to_string(), Value::Real(price));
            db.insert("inventory", &data).unwrap();
        }
    }

    #[test]
    fn test_full_crud_lifecycle() {
        let mut db = Db::open_in_memory().unwrap();
        seed_inventory(&mut db);

        // create
        let mut data = ParamMap::new();
        data.insert("label".to_string(), text("screw"));
        data.insert("stock".to_string(), Value::Integer(42));
        db.insert("inventory", &data).unwrap();
        let sku = db.last_insert_id();
        assert_eq!(sku, 4);

        // read falls back to the introspected primary key
        let row = db.read("inventory", sku, None).unwrap().fetch().unwrap().unwrap();
        assert_eq!(row.get::<String>("label").unwrap(), "screw");
        assert_eq!(row.get::<i64>("stock").unwrap(), 42);

        // update by explicit id
        let mut changes = ParamMap::new();
        changes.insert("stock".to_string(), Value::Integer(40));
        db.update("inventory", &changes, Some(Value::Integer(sku)), None)
            .unwrap();
        assert_eq!(db.count(), 1);

        // delete
        db.delete("inventory", sku, None).unwrap();
        let rows = db
            .select("inventory", FieldList::All, None, None, None)
            .unwrap()
            .all()
            .unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_select_with_mixed_conditions_and_paging() {
        let mut db = Db::open_in_memory().unwrap();
        seed_inventory(&mut db);

        let filter = Conditions::new()
            .raw("price IS NOT NULL")
            .bind("stock >= ?", [1i64]);
        let rows = db
            .select(
                "inventory",
                FieldList::Columns(&["sku", "label"]),
                Some(&filter),
                Some(Order::Raw("stock DESC")),
                Some(Limit::Count(1)),
            )
            .unwrap()
            .all()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String>("label").unwrap(), "bolt");

        let statement = db.last_sql().unwrap();
        assert!(statement.starts_with("SELECT `sku`, `label` FROM `inventory`"));
        assert!(statement.contains("WHERE ( price IS NOT NULL ) AND ( stock >= :_1 )"));
        assert!(statement.ends_with("ORDER BY stock DESC LIMIT 1"));
    }

    #[test]
    fn test_indexed_column_lookup() {
        let mut db = Db::open_in_memory().unwrap();
        seed_inventory(&mut db);

        db.select("inventory", FieldList::All, None, None, None)
            .unwrap();
        let stock_by_label = db.column_indexed("stock", "label").unwrap();
        assert_eq!(stock_by_label.get("bolt"), Some(&Value::Integer(120)));
        assert_eq!(stock_by_label.get("washer"), Some(&Value::Integer(0)));
        assert_eq!(stock_by_label.len(), 3);
    }

    #[test]
    fn test_commented_statement_round_trip() {
        let mut db = Db::open_in_memory().unwrap();
        seed_inventory(&mut db);

        let mut params = ParamMap::new();
        params.insert("min".to_string(), Value::Integer(50));
        let labels = db
            .query(
                "SELECT label FROM inventory /* projection is intentional */
                 WHERE stock > :min -- well stocked only
                 ORDER BY label",
                &params,
            )
            .unwrap()
            .column("label")
            .unwrap();
        assert_eq!(labels, vec![text("bolt"), text("nut")]);
        assert!(!db.last_sql().unwrap().contains("projection"));
    }

    #[test]
    fn test_named_handles_share_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        config::set("itest_shared:path", path.to_string_lossy().into_owned());

        let first = Db::instance("itest_shared").unwrap();
        {
            let mut db = first.lock().unwrap();
            db.raw("CREATE TABLE IF NOT EXISTS kv (k TEXT PRIMARY KEY, v TEXT)")
                .unwrap();
            let mut data = ParamMap::new();
            data.insert("k".to_string(), text("greeting"));
            data.insert("v".to_string(), text("hello"));
            db.insert("kv", &data).unwrap();
        }

        let second = Db::instance("itest_shared").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        {
            let mut db = second.lock().unwrap();
            let row = db
                .read("kv", text("greeting"), None)
                .unwrap()
                .fetch()
                .unwrap()
                .unwrap();
            assert_eq!(row.get::<String>("v").unwrap(), "hello");
        }
    }

    #[test]
    fn test_key_default_error_surfaces() {
        let mut db = Db::open_in_memory().unwrap();
        db.raw("CREATE TABLE loose (a TEXT, b TEXT)").unwrap();

        let result = db.read("loose", 1i64, None);
        assert!(matches!(result, Err(LitequeryError::Schema(_))));

        // an explicit key works without a primary key
        let mut data = ParamMap::new();
        data.insert("a".to_string(), text("x"));
        data.insert("b".to_string(), text("y"));
        db.insert("loose", &data).unwrap();
        let row = db
            .read("loose", text("x"), Some("a"))
            .unwrap()
            .fetch()
            .unwrap()
            .unwrap();
        assert_eq!(row.get::<String>("b").unwrap(), "y");
    }
}
