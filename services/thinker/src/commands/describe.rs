use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::debug;

use svckit::config::ThinkerConfig;
use svckit::database::DatabaseConnection;
use svckit::errors::ThinkerError;
use svckit::types::{SchemaDescription, TableTarget};

use super::Command;
use crate::output;

pub struct DescribeCommand {
    pub db: Option<String>,
}

#[async_trait]
impl Command for DescribeCommand {
    fn name(&self) -> &'static str {
        "describe"
    }

    fn flags(&self) -> Vec<(&'static str, String)> {
        self.db.iter().map(|db| ("db", db.clone())).collect()
    }

    async fn execute(
        &self,
        _config: &ThinkerConfig,
        connection: &dyn DatabaseConnection,
        out: &mut (dyn Write + Send),
    ) -> Result<(), ThinkerError> {
        let description = describe(connection, self.db.as_deref()).await?;
        writeln!(out, "{}", output::pretty(&description)?)?;
        out.flush()?;
        Ok(())
    }
}

/// Collects `{database -> {table -> [index names]}}` for one database, or
/// for every database when none is named
pub async fn describe(
    connection: &dyn DatabaseConnection,
    db: Option<&str>,
) -> Result<SchemaDescription, ThinkerError> {
    let databases = match db {
        Some(db) => vec![db.to_string()],
        None => connection.list_databases().await?,
    };

    let mut description = SchemaDescription::new();
    for db in databases {
        let mut tables = BTreeMap::new();
        for table in connection.list_tables(&db).await? {
            let target = TableTarget::new(db.as_str(), table.as_str());
            let indexes = connection.list_indexes(&target).await?;
            debug!(db = %db, table = %table, indexes = indexes.len(), "Described table");
            tables.insert(table, indexes);
        }
        description.insert(db, tables);
    }

    Ok(description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::MemoryConnection;
    use serde_json::{json, Value};

    async fn run(conn: &MemoryConnection, db: Option<&str>) -> Result<Value, ThinkerError> {
        let command = DescribeCommand {
            db: db.map(str::to_string),
        };
        let mut out = Vec::new();
        command
            .execute(&ThinkerConfig::default(), conn, &mut out)
            .await?;
        Ok(serde_json::from_slice(&out).unwrap())
    }

    #[tokio::test]
    async fn test_single_database() {
        let conn = MemoryConnection::new()
            .with_table("db", "T1", &["A", "B"])
            .with_table("db", "T2", &[])
            .with_table("other", "T3", &["C"]);

        let described = run(&conn, Some("db")).await.unwrap();
        assert_eq!(described, json!({"db": {"T1": ["A", "B"], "T2": []}}));
    }

    #[tokio::test]
    async fn test_all_databases() {
        let conn = MemoryConnection::new()
            .with_table("db", "T1", &["A"])
            .with_database("empty");

        let described = run(&conn, None).await.unwrap();
        assert_eq!(described, json!({"db": {"T1": ["A"]}, "empty": {}}));
    }

    #[tokio::test]
    async fn test_output_is_indented() {
        let conn = MemoryConnection::new().with_table("db", "T1", &[]);
        let command = DescribeCommand { db: None };
        let mut out = Vec::new();
        command
            .execute(&ThinkerConfig::default(), &conn, &mut out)
            .await
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\n  \"db\": {\n    \"T1\": []\n  }\n}\n"
        );
    }

    #[tokio::test]
    async fn test_unknown_database() {
        let conn = MemoryConnection::new();
        assert!(matches!(
            run(&conn, Some("nope")).await,
            Err(ThinkerError::QueryError(_))
        ));
    }
}
