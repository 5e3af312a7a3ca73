use crate::engine::batch::{self, BatchRequest, PlaceholderStyle};
use crate::engine::column::{ColumnInfo, ValueKind};
use crate::engine::dialect::{check_columns, UpsertDialect};
use crate::engine::error::Result;

/// Conflict-clause dialect: `INSERT ... ON CONFLICT (keys) DO UPDATE SET`.
#[derive(Debug)]
pub struct PostgresDialect;

pub static POSTGRES_DIALECT: PostgresDialect = PostgresDialect;

impl UpsertDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Named
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
        push_conflict_clause(&mut sql, key_columns.iter(), value_columns.iter());
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
            PlaceholderStyle::Named,
            &cast_text_bound,
        ));
        push_conflict_clause(
            &mut sql,
            request.key_columns().iter().map(ColumnInfo::name),
            request.value_columns().iter().map(ColumnInfo::name),
        );
        Ok(sql)
    }
}

/// Values without a native driver type are bound as text and cast in SQL.
fn cast_text_bound(column: &ColumnInfo, placeholder: String) -> String {
    match column.kind() {
        ValueKind::Json => format!("CAST({} AS jsonb)", placeholder),
        ValueKind::Uuid => format!("CAST({} AS uuid)", placeholder),
        ValueKind::Other(type_name) => format!("CAST({} AS {})", placeholder, type_name),
        _ => placeholder,
    }
}

fn push_conflict_clause<K, V>(sql: &mut String, keys: K, values: V)
where
    K: IntoIterator,
    K::Item: AsRef<str>,
    V: IntoIterator,
    V::Item: AsRef<str>,
{
    let keys: Vec<K::Item> = keys.into_iter().collect();
    let keys: Vec<&str> = keys.iter().map(|k| k.as_ref()).collect();
    sql.push_str(" ON CONFLICT (");
    sql.push_str(&keys.join(", "));
    sql.push_str(") DO UPDATE SET ");
    for (idx, col) in values.into_iter().enumerate() {
        if idx > 0 {
            sql.push_str(", ");
        }
        let col = col.as_ref();
        sql.push_str(col);
        sql.push_str(" = EXCLUDED.");
        sql.push_str(col);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::UpsertError;
    use proptest::prelude::*;
    use std::collections::HashSet;

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
    fn single_key_batch_of_one() {
        let sql = POSTGRES_DIALECT
            .generate_batch_upsert_sql(&request(&["id"], &["name", "description", "active"], 1))
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO test_table (id, name, description, active) \
             VALUES (:id_1, :name_1, :description_1, :active_1) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
             description = EXCLUDED.description, active = EXCLUDED.active"
        );
    }

    #[test]
    fn composite_key_batch() {
        let sql = POSTGRES_DIALECT
            .generate_batch_upsert_sql(&request(&["id", "code"], &["name"], 2))
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO test_table (id, code, name) \
             VALUES (:id_1, :code_1, :name_1), (:id_2, :code_2, :name_2) \
             ON CONFLICT (id, code) DO UPDATE SET name = EXCLUDED.name"
        );
    }

    #[test]
    fn single_row_uses_positional_placeholders() {
        let sql = POSTGRES_DIALECT
            .generate_upsert_sql("users", &strings(&["id"]), &strings(&["email", "name"]))
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO users (id, email, name) VALUES (?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email, name = EXCLUDED.name"
        );
    }

    #[test]
    fn text_bound_columns_are_cast() {
        let keys = vec![ColumnInfo::new("id", ValueKind::Uuid)];
        let values = vec![ColumnInfo::new("payload", ValueKind::Json)];
        let sql = POSTGRES_DIALECT
            .generate_batch_upsert_sql(&BatchRequest::new("events", keys, values, 1))
            .unwrap();
        assert!(sql.contains("VALUES (CAST(:id_1 AS uuid), CAST(:payload_1 AS jsonb))"));
        assert!(sql.contains("ON CONFLICT (id)"));
        assert!(sql.ends_with("payload = EXCLUDED.payload"));
    }

    #[test]
    fn rejects_empty_columns() {
        let err = POSTGRES_DIALECT
            .generate_upsert_sql("users", &[], &strings(&["name"]))
            .unwrap_err();
        assert_eq!(err, UpsertError::MissingKeyColumns { entity: "users".into() });

        let err = POSTGRES_DIALECT
            .generate_batch_upsert_sql(&request(&["id"], &[], 1))
            .unwrap_err();
        assert_eq!(err, UpsertError::MissingValueColumns { entity: "test_table".into() });
    }

    #[test]
    fn rejects_key_listed_as_value() {
        let err = POSTGRES_DIALECT
            .generate_batch_upsert_sql(&request(&["id"], &["id", "v"], 1))
            .unwrap_err();
        assert_eq!(
            err,
            UpsertError::KeyValueOverlap {
                table: "test_table".into(),
                column: "id".into()
            }
        );
    }

    proptest! {
        #[test]
        fn batch_shape_holds(
            names in proptest::collection::hash_set("[a-z][a-z0-9]{0,5}", 2..7),
            key_count in 1usize..3,
            rows in 1usize..12,
        ) {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            let key_count = key_count.min(names.len() - 1);
            let (keys, values) = names.split_at(key_count);
            let req = request(keys, values, rows);

            let sql = POSTGRES_DIALECT.generate_batch_upsert_sql(&req).unwrap();
            prop_assert_eq!(&sql, &POSTGRES_DIALECT.generate_batch_upsert_sql(&req).unwrap());

            let column_list = format!("INSERT INTO test_table ({}) VALUES ", names.join(", "));
            prop_assert!(sql.starts_with(&column_list));

            let (head, update) = sql.split_once(" DO UPDATE SET ").unwrap();
            let values_part = &head[column_list.len()..head.find(" ON CONFLICT").unwrap()];
            let tuples: Vec<&str> = values_part.split("), (").collect();
            prop_assert_eq!(tuples.len(), rows);
            for tuple in &tuples {
                prop_assert_eq!(tuple.matches(':').count(), names.len());
            }

            let placeholders: Vec<&str> = values_part
                .split(|c: char| c == '(' || c == ')' || c == ',' || c == ' ')
                .filter(|p| p.starts_with(':'))
                .collect();
            let unique: HashSet<_> = placeholders.iter().collect();
            prop_assert_eq!(unique.len(), placeholders.len());

            let assigned: Vec<&str> = update
                .split(", ")
                .map(|a| a.split(" = ").next().unwrap())
                .collect();
            prop_assert_eq!(assigned, values.to_vec());
        }
    }
}
