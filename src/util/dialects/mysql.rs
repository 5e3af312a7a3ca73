use crate::engine::batch::{self, BatchRequest, PlaceholderStyle};
use crate::engine::column::ColumnInfo;
use crate::engine::dialect::{check_columns, UpsertDialect};
use crate::engine::error::Result;

/// Duplicate-key dialect: `INSERT ... ON DUPLICATE KEY UPDATE`.
///
/// MySQL picks the colliding row from whichever unique or primary index
/// matches, so no conflict-target list is rendered and key columns only
/// appear in the column list.
#[derive(Debug)]
pub struct MysqlDialect;

pub static MYSQL_DIALECT: MysqlDialect = MysqlDialect;

impl UpsertDialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "MySQL"
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Positional
    }

    fn generate_upsert_sql(
        &self,
        table: &str,
        key_columns: &[String],
        value_columns: &[String],
    ) -> Result<String> {
        check_columns(table, key_columns, value_columns)?;

        let all = key_columns.iter().chain(value_columns);
        let placeholders = vec!["?"; key_columns.len() + value_columns.len()];

        let mut sql = String::new();
        sql.push_str("INSERT INTO ");
        sql.push_str(table);
        sql.push_str(" (");
        sql.push_str(&batch::column_list(all.map(String::as_str)));
        sql.push_str(") VALUES (");
        sql.push_str(&placeholders.join(", "));
        sql.push(')');
        push_update_clause(&mut sql, value_columns.iter().map(String::as_str));
        Ok(sql)
    }

    fn generate_batch_upsert_sql(&self, request: &BatchRequest) -> Result<String> {
        request.validate()?;

        let mut sql = String::new();
        sql.push_str("INSERT INTO ");
        sql.push_str(request.table_name());
        sql.push_str(" (");
        sql.push_str(&batch::column_list(
            request.all_columns().iter().map(ColumnInfo::name),
        ));
        sql.push_str(") VALUES ");
        sql.push_str(&batch::values_clause(
            request.all_columns(),
            request.row_count(),
            PlaceholderStyle::Positional,
            &batch::bare,
        ));
        push_update_clause(&mut sql, request.value_columns().iter().map(ColumnInfo::name));
        Ok(sql)
    }
}

fn push_update_clause<'a>(sql: &mut String, values: impl Iterator<Item = &'a str>) {
    sql.push_str(" ON DUPLICATE KEY UPDATE ");
    for (idx, col) in values.enumerate() {
        if idx > 0 {
            sql.push_str(", ");
        }
        sql.push_str(col);
        sql.push_str(" = VALUES(");
        sql.push_str(col);
        sql.push(')');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::column::ValueKind;
    use crate::engine::error::UpsertError;
    use proptest::prelude::*;

    fn cols(names: &[&str]) -> Vec<ColumnInfo> {
        names
            .iter()
            .map(|n| ColumnInfo::new(*n, ValueKind::Text))
            .collect()
    }

    fn request(keys: &[&str], values: &[&str], rows: usize) -> BatchRequest {
        BatchRequest::new("test_table", cols(keys), cols(values), rows)
    }

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn composite_key_single_row() {
        let sql = MYSQL_DIALECT
            .generate_upsert_sql(
                "test_table",
                &strings(&["id", "code"]),
                &strings(&["name", "description", "active"]),
            )
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO test_table (id, code, name, description, active) \
             VALUES (?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE name = VALUES(name), \
             description = VALUES(description), active = VALUES(active)"
        );
    }

    #[test]
    fn batch_repeats_positional_tuples() {
        let sql = MYSQL_DIALECT
            .generate_batch_upsert_sql(&request(&["id", "code"], &["name"], 3))
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO test_table (id, code, name) \
             VALUES (?, ?, ?), (?, ?, ?), (?, ?, ?) \
             ON DUPLICATE KEY UPDATE name = VALUES(name)"
        );
    }

    #[test]
    fn no_conflict_target_is_rendered() {
        let sql = MYSQL_DIALECT
            .generate_batch_upsert_sql(&request(&["id"], &["name"], 1))
            .unwrap();
        assert!(!sql.contains("ON CONFLICT"));
        assert!(!sql.contains("id = VALUES(id)"));
    }

    #[test]
    fn rejects_zero_rows() {
        let err = MYSQL_DIALECT
            .generate_batch_upsert_sql(&request(&["id"], &["name"], 0))
            .unwrap_err();
        assert!(matches!(err, UpsertError::InvalidRowCount { row_count: 0, .. }));
    }

    #[test]
    fn rejects_duplicate_value_columns() {
        let err = MYSQL_DIALECT
            .generate_upsert_sql("t", &strings(&["id"]), &strings(&["name", "name"]))
            .unwrap_err();
        assert!(matches!(err, UpsertError::DuplicateColumn { .. }));
    }

    proptest! {
        #[test]
        fn update_clause_lists_exactly_value_columns(
            names in proptest::collection::hash_set("[a-z][a-z0-9]{0,5}", 2..7),
            key_count in 1usize..3,
            rows in 1usize..8,
        ) {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            let key_count = key_count.min(names.len() - 1);
            let (keys, values) = names.split_at(key_count);

            let sql = MYSQL_DIALECT.generate_batch_upsert_sql(&request(keys, values, rows)).unwrap();
            let column_list = format!("INSERT INTO test_table ({}) VALUES ", names.join(", "));
            prop_assert!(sql.starts_with(&column_list));
            prop_assert_eq!(sql.matches('?').count(), names.len() * rows);

            let (_, update) = sql.split_once(" ON DUPLICATE KEY UPDATE ").unwrap();
            let assigned: Vec<&str> = update
                .split(", ")
                .map(|a| a.split(" = ").next().unwrap())
                .collect();
            prop_assert_eq!(assigned, values.to_vec());
        }
    }
}
