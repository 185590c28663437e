use std::io::Write;

use super::{ReportError, Tables};

/// Write every table as one pretty-printed JSON document.
pub fn write_json(tables: &Tables, writer: &mut impl Write) -> Result<(), ReportError> {
    serde_json::to_writer_pretty(&mut *writer, tables)?;
    writeln!(writer)?;
    Ok(())
}
