//! `database` sources: one document per row of a read query.
//!
//! Connects through sqlx's `Any` driver so MySQL, Postgres, and SQLite
//! sources share one code path. The connection lives only for the duration
//! of [`RelationalQueryReader::load`] and is closed whether or not the
//! query succeeds.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Column, Connection, Executor, Row};

use crate::error::ReadError;
use crate::models::Document;
use crate::reader::{ColumnMapping, DocumentReader};
use crate::sources::{ConnectionParams, SourceKind};

pub struct RelationalQueryReader {
    params: ConnectionParams,
    query: String,
    columns: ColumnMapping,
}

impl RelationalQueryReader {
    pub fn new(params: ConnectionParams, query: String, columns: ColumnMapping) -> Self {
        Self {
            params,
            query,
            columns,
        }
    }

    async fn fetch(&self, conn: &mut AnyConnection) -> Result<Vec<Document>, ReadError> {
        let rows: Vec<AnyRow> = sqlx::query(&self.query).fetch_all(&mut *conn).await?;

        // No rows: column names come from the statement description.
        let headers: Vec<String> = match rows.first() {
            Some(first) => first.columns().iter().map(|c| c.name().to_string()).collect(),
            None => (&mut *conn)
                .describe(&self.query)
                .await?
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
        };
        let resolved = self.columns.resolve(&headers, &self.origin())?;

        Ok(rows
            .iter()
            .map(|row| {
                let values: Vec<Value> = (0..headers.len()).map(|i| decode_cell(row, i)).collect();
                resolved
                    .document_from_values(&values)
                    .with_meta("source", SourceKind::RelationalQuery.as_str())
            })
            .collect())
    }
}

/// Decodes one cell into a JSON scalar, trying the common SQL types in turn.
fn decode_cell(row: &AnyRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(Some(bytes)) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Value::String(String::from_utf8_lossy(&bytes).into_owned());
    }
    Value::Null
}

#[async_trait]
impl DocumentReader for RelationalQueryReader {
    fn kind(&self) -> SourceKind {
        SourceKind::RelationalQuery
    }

    fn origin(&self) -> String {
        self.params.redacted()
    }

    async fn load(&self) -> Result<Vec<Document>, ReadError> {
        sqlx::any::install_default_drivers();
        let url = self.params.connection_url()?;
        let mut conn = AnyConnection::connect(&url).await?;

        let result = self.fetch(&mut conn).await;

        if let Err(e) = conn.close().await {
            tracing::warn!(origin = %self.origin(), error = %e, "closing source connection failed");
        }
        result
    }
}
