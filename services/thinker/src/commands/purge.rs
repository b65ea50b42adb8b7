use async_trait::async_trait;
use std::io::Write;
use tracing::info;

use svckit::config::ThinkerConfig;
use svckit::database::DatabaseConnection;
use svckit::errors::ThinkerError;
use svckit::types::IndexFilter;

use super::{filter_flags, Command};
use crate::output;

/// Deletes every row of the target table, or only the rows whose secondary
/// index matches the filter
pub struct PurgeCommand {
    pub filter: Option<IndexFilter>,
}

#[async_trait]
impl Command for PurgeCommand {
    fn name(&self) -> &'static str {
        "purge"
    }

    fn flags(&self) -> Vec<(&'static str, String)> {
        filter_flags(self.filter.as_ref())
    }

    async fn execute(
        &self,
        config: &ThinkerConfig,
        connection: &dyn DatabaseConnection,
        out: &mut (dyn Write + Send),
    ) -> Result<(), ThinkerError> {
        let target = config.target()?;
        let summary = connection.delete(target, self.filter.as_ref()).await?;

        info!(
            db = %target.db,
            table = %target.table,
            deleted = summary.deleted,
            "Purged rows"
        );

        if !config.silent {
            output::print_deletions(out, &summary)?;
        }
        Ok(())
    }
}
