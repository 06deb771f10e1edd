use std::fs::OpenOptions;
use std::path::Path;

use behex_core::{Cursor, Error, Result, Table, TriggerLog};
use csv::WriterBuilder;
use tracing::debug;

fn persist(err: csv::Error) -> Error {
    Error::Persist(err.to_string())
}

/// Append behavioral rows not yet flushed - positions `last_beh_save`
/// through the cursor's current row - to a CSV file, writing the header
/// exactly once on the first write. Rows start with the table's row key,
/// mirroring the index column of the in-memory table. Calling this again
/// with no new rows writes nothing.
pub fn save_beh_data(beh: &Table, cursor: &mut Cursor, path: &Path) -> Result<()> {
    if cursor.current_idx < 0 {
        return Ok(());
    }
    let upto = cursor.current_idx as usize + 1;
    if cursor.last_beh_save >= upto {
        return Ok(());
    }

    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    if cursor.last_beh_save == 0 {
        let mut header = vec![String::new()];
        header.extend(beh.columns().iter().cloned());
        writer.write_record(&header).map_err(persist)?;
    }

    for position in cursor.last_beh_save..upto {
        let key = beh.key_at(position).ok_or_else(|| {
            Error::Persist(format!("behavioral row {position} out of range"))
        })?;
        let mut record = vec![key.to_string()];
        let cells = beh.row_cells(position).expect("key_at checked the row");
        record.extend(cells.iter().map(|cell| cell.csv_field()));
        writer.write_record(&record).map_err(persist)?;
    }
    writer.flush()?;

    debug!(
        from = cursor.last_beh_save,
        upto, "behavioral data flushed"
    );
    cursor.last_beh_save = upto;
    Ok(())
}

/// Append trigger-log entries not yet flushed to a CSV file with columns
/// `time, trial, trigger`, header once on first write. Idempotent when
/// nothing new arrived since the last call.
pub fn save_trigger_log(
    log: &TriggerLog,
    cursor: &mut Cursor,
    path: &Path,
) -> Result<()> {
    if cursor.last_log_save >= log.len() {
        return Ok(());
    }

    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    if cursor.last_log_save == 0 {
        writer
            .write_record(["time", "trial", "trigger"])
            .map_err(persist)?;
    }
    for (time, code, trial) in log.entries_from(cursor.last_log_save) {
        writer
            .write_record([
                time.to_string(),
                trial.to_string(),
                code.to_string(),
            ])
            .map_err(persist)?;
    }
    writer.flush()?;

    cursor.last_log_save = log.len();
    Ok(())
}
