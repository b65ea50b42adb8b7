use async_trait::async_trait;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use svckit::config::ThinkerConfig;
use svckit::database::DatabaseConnection;
use svckit::errors::ThinkerError;
use svckit::types::Document;

use super::Command;

/// Inserts the JSON object stored in `file`, `times` times
pub struct WriteCommand {
    pub file: PathBuf,
}

#[async_trait]
impl Command for WriteCommand {
    fn name(&self) -> &'static str {
        "write"
    }

    fn flags(&self) -> Vec<(&'static str, String)> {
        vec![("file", self.file.display().to_string())]
    }

    async fn execute(
        &self,
        config: &ThinkerConfig,
        connection: &dyn DatabaseConnection,
        _out: &mut (dyn Write + Send),
    ) -> Result<(), ThinkerError> {
        let target = config.target()?;
        let document = load_document(&self.file).await?;
        let delay = Duration::from_secs(config.delay);

        for attempt in 0..config.times {
            if attempt > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let summary = connection.insert(target, &document).await?;
            debug!(
                attempt = attempt + 1,
                inserted = summary.inserted,
                keys = ?summary.generated_keys,
                "Inserted document"
            );
        }

        info!(
            db = %target.db,
            table = %target.table,
            times = config.times,
            "Finished writing {}",
            self.file.display()
        );
        Ok(())
    }
}

async fn load_document(path: &Path) -> Result<Document, ThinkerError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ThinkerError::FileError(format!("{}: {}", path.display(), e)))?;

    match serde_json::from_str::<Value>(&contents) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(_) => Err(ThinkerError::FileError(format!(
            "{}: expected a JSON object",
            path.display()
        ))),
        Err(e) => Err(ThinkerError::FileError(format!("{}: {}", path.display(), e))),
    }
}
