//! Postgres-backed store gateway
//!
//! Rows are read with `to_jsonb` and written with `jsonb_populate_record`, so a
//! single code path serves every collection while the table definitions in
//! `migrations/` remain the source of truth for column types.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    validate_identifier, Collection, FieldValue, Filter, FilterOp, Ordering, RemoteStore,
    StoreError,
};

const UNIQUE_VIOLATION: &str = "23505";
const UNDEFINED_FUNCTION: &str = "42883";

/// Store gateway over a Postgres connection pool
#[derive(Clone)]
pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: &FieldValue) {
    match value {
        FieldValue::Text(v) => builder.push_bind(v.clone()),
        FieldValue::Bool(v) => builder.push_bind(*v),
        FieldValue::Int(v) => builder.push_bind(*v),
        FieldValue::Timestamp(v) => builder.push_bind(*v),
        FieldValue::TextList(v) => builder.push_bind(v.clone()),
    };
}

fn push_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    filters: &[Filter],
) -> Result<(), StoreError> {
    for filter in filters {
        let column = validate_identifier(filter.column)?;
        builder.push(" AND ");

        match (&filter.op, &filter.value) {
            (_, FieldValue::TextList(values)) => {
                // Cast to text so uuid and enum columns compare against plain strings
                builder.push(format!("t.{}::text = ANY(", column));
                builder.push_bind(values.clone());
                builder.push(")");
            }
            (op, FieldValue::Text(_)) => {
                let operator = if *op == FilterOp::Gte { ">=" } else { "=" };
                builder.push(format!("t.{}::text {} ", column, operator));
                push_value(builder, &filter.value);
            }
            (op, value) => {
                let operator = if *op == FilterOp::Gte { ">=" } else { "=" };
                builder.push(format!("t.{} {} ", column, operator));
                push_value(builder, value);
            }
        }
    }
    Ok(())
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return StoreError::Conflict(db_err.message().to_string()),
            Some(UNDEFINED_FUNCTION) => {
                return StoreError::UnknownFunction(db_err.message().to_string())
            }
            _ => {}
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl RemoteStore for PgStore {
    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
        ordering: Option<Ordering>,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, StoreError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT to_jsonb(t) AS row FROM {} AS t WHERE TRUE",
            collection.table()
        ));
        push_filters(&mut builder, filters)?;

        if let Some(ordering) = ordering {
            let column = validate_identifier(ordering.column)?;
            let direction = if ordering.descending { "DESC" } else { "ASC" };
            builder.push(format!(" ORDER BY t.{} {}", column, direction));
        }
        if let Some(limit) = limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }

        let rows = builder
            .build_query_scalar::<Value>()
            .fetch_all(&self.db_pool)
            .await
            .map_err(map_sqlx_error)?;

        tracing::debug!(collection = %collection, rows = rows.len(), "Store query completed");
        Ok(rows)
    }

    async fn insert(&self, collection: Collection, mut row: Value) -> Result<Value, StoreError> {
        let object = row
            .as_object_mut()
            .ok_or_else(|| StoreError::InvalidIdentifier("row must be an object".to_string()))?;
        // jsonb_populate_record yields NULL for absent keys, bypassing column defaults
        if object.get("id").map(Value::is_null).unwrap_or(true) {
            object.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }

        let table = collection.table();
        let sql = format!(
            "INSERT INTO {table} AS t SELECT * FROM jsonb_populate_record(NULL::{table}, $1) \
             RETURNING to_jsonb(t)"
        );

        sqlx::query_scalar::<_, Value>(&sql)
            .bind(row)
            .fetch_one(&self.db_pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn update(
        &self,
        collection: Collection,
        filters: &[Filter],
        patch: Value,
    ) -> Result<u64, StoreError> {
        let columns: Vec<String> = match patch.as_object() {
            Some(object) if !object.is_empty() => object
                .keys()
                .map(|key| validate_identifier(key).map(str::to_string))
                .collect::<Result<_, _>>()?,
            _ => return Err(StoreError::InvalidIdentifier("<empty patch>".to_string())),
        };

        let table = collection.table();
        let assignments = columns
            .iter()
            .map(|c| format!("{c} = p.{c}"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "UPDATE {table} AS t SET {assignments} FROM jsonb_populate_record(NULL::{table}, "
        ));
        builder.push_bind(patch);
        builder.push(") AS p WHERE TRUE");
        push_filters(&mut builder, filters)?;

        let result = builder
            .build()
            .execute(&self.db_pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn call_function(
        &self,
        name: &str,
        args: &[FieldValue],
    ) -> Result<Vec<Value>, StoreError> {
        let name = validate_identifier(name)?;
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT to_jsonb(r) AS row FROM {}(", name));
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            push_value(&mut builder, arg);
        }
        builder.push(") AS r");

        builder
            .build_query_scalar::<Value>()
            .fetch_all(&self.db_pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.db_pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Filter;

    #[test]
    fn test_filters_render_with_casts() {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT to_jsonb(t) FROM loans AS t WHERE TRUE");
        push_filters(
            &mut builder,
            &[
                Filter::eq("owner_id", "member-1"),
                Filter::one_of("status", vec!["active".to_string(), "approved".to_string()]),
            ],
        )
        .unwrap();

        let sql = builder.sql();
        assert!(sql.contains("t.owner_id::text = $1"));
        assert!(sql.contains("t.status::text = ANY($2)"));
    }

    #[test]
    fn test_filters_reject_bad_columns() {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1 WHERE TRUE");
        let result = push_filters(&mut builder, &[Filter::eq("id OR 1=1", "x")]);
        assert!(matches!(result, Err(StoreError::InvalidIdentifier(_))));
    }
}
