use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};

use svckit::errors::ThinkerError;
use svckit::types::WriteSummary;

/// Printed after every document in read mode
pub const SEPARATOR: &str = "-----------";

/// Two-space indented JSON
pub fn pretty<T: Serialize + ?Sized>(value: &T) -> Result<String, ThinkerError> {
    serde_json::to_string_pretty(value).map_err(|e| ThinkerError::Io(io::Error::from(e)))
}

pub fn print_document<W: Write + ?Sized>(out: &mut W, document: &Value) -> Result<(), ThinkerError> {
    writeln!(out, "{}", pretty(document)?)?;
    writeln!(out, "{}", SEPARATOR)?;
    out.flush()?;
    Ok(())
}

pub fn print_deletions<W: Write + ?Sized>(out: &mut W, summary: &WriteSummary) -> Result<(), ThinkerError> {
    writeln!(out, "Deleted {} rows", summary.deleted)?;
    for (i, change) in summary.changes.iter().enumerate() {
        let old_value = change.old_val.as_ref().unwrap_or(&Value::Null);
        writeln!(out, "Deleted: {}: {}", i, old_value)?;
    }
    out.flush()?;
    Ok(())
}
