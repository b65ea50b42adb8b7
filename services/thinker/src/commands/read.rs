use async_trait::async_trait;
use std::io::Write;
use tracing::{debug, warn};

use svckit::config::ThinkerConfig;
use svckit::database::{DatabaseConnection, DocumentCursor};
use svckit::errors::ThinkerError;
use svckit::types::IndexFilter;

use super::{filter_flags, Command};
use crate::output;

/// Prints every row of the target table, or only the rows matching the
/// filter. With `follow` set the change feed is printed instead, starting
/// with the current rows, until the feed ends.
pub struct ReadCommand {
    pub filter: Option<IndexFilter>,
}

#[async_trait]
impl Command for ReadCommand {
    fn name(&self) -> &'static str {
        "read"
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
        let filter = self.filter.as_ref();

        let mut cursor = if config.follow {
            debug!(db = %target.db, table = %target.table, "Following changes");
            connection.follow(target, filter).await?
        } else {
            connection.fetch(target, filter).await?
        };

        let result = drain(cursor.as_mut(), out).await;

        if let Err(e) = cursor.close().await {
            warn!("Failed to close cursor: {}", e);
        }
        result
    }
}

async fn drain(
    cursor: &mut dyn DocumentCursor,
    out: &mut (dyn Write + Send),
) -> Result<(), ThinkerError> {
    let mut count = 0u64;
    while let Some(document) = cursor.next().await {
        output::print_document(out, &document?)?;
        count += 1;
    }
    debug!("Read {} documents", count);
    Ok(())
}
