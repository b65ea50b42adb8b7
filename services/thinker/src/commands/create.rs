use async_trait::async_trait;
use std::io::Write;
use tracing::{debug, info};

use svckit::config::ThinkerConfig;
use svckit::database::DatabaseConnection;
use svckit::errors::ThinkerError;

use super::Command;

/// Creates the target database, table and indexes. Anything that already
/// exists is left alone.
pub struct CreateCommand {
    pub indexes: Vec<String>,
}

#[async_trait]
impl Command for CreateCommand {
    fn name(&self) -> &'static str {
        "create"
    }

    fn flags(&self) -> Vec<(&'static str, String)> {
        if self.indexes.is_empty() {
            return Vec::new();
        }
        vec![("index", self.indexes.join(","))]
    }

    async fn execute(
        &self,
        config: &ThinkerConfig,
        connection: &dyn DatabaseConnection,
        _out: &mut (dyn Write + Send),
    ) -> Result<(), ThinkerError> {
        let target = config.target()?;

        let databases = connection.list_databases().await?;
        if databases.iter().any(|db| *db == target.db) {
            debug!(db = %target.db, "Database already exists");
        } else {
            connection.create_database(&target.db).await?;
            info!(db = %target.db, "Created database");
        }

        let tables = connection.list_tables(&target.db).await?;
        if tables.iter().any(|t| *t == target.table) {
            debug!(db = %target.db, table = %target.table, "Table already exists");
        } else {
            connection.create_table(&target.db, &target.table).await?;
            info!(db = %target.db, table = %target.table, "Created table");
        }

        let mut existing = connection.list_indexes(target).await?;
        for index in &self.indexes {
            if existing.contains(index) {
                debug!(table = %target.table, index = %index, "Index already exists");
                continue;
            }
            connection.create_index(target, index).await?;
            info!(table = %target.table, index = %index, "Created index");
            existing.push(index.clone());
        }

        Ok(())
    }
}
