mod create;
mod describe;
mod purge;
mod read;
mod write;

#[cfg(test)]
pub(crate) mod testing;

pub use create::CreateCommand;
pub use describe::DescribeCommand;
pub use purge::PurgeCommand;
pub use read::ReadCommand;
pub use write::WriteCommand;

use async_trait::async_trait;
use std::io::Write;

use svckit::config::ThinkerConfig;
use svckit::database::DatabaseConnection;
use svckit::errors::ThinkerError;
use svckit::types::IndexFilter;

/// One subcommand. Handlers get the resolved configuration, an open
/// connection and the stream their output goes to.
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;

    /// Command-specific arguments as `(flag, value)` pairs, for logging
    fn flags(&self) -> Vec<(&'static str, String)>;

    async fn execute(
        &self,
        config: &ThinkerConfig,
        connection: &dyn DatabaseConnection,
        out: &mut (dyn Write + Send),
    ) -> Result<(), ThinkerError>;
}

fn filter_flags(filter: Option<&IndexFilter>) -> Vec<(&'static str, String)> {
    match filter {
        Some(filter) => vec![("index", filter.index.clone()), ("id", filter.id.clone())],
        None => Vec::new(),
    }
}
