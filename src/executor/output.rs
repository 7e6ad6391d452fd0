//! Result output for FlatDB

use std::io::Write;

use crate::error::Result;
use crate::storage::table::csv_writer;
use crate::storage::Record;

/// Write a header row followed by every record, in the table file format.
///
/// Records are expected to carry their fields in header order. Returns the
/// number of records written; stops at the first error.
pub fn write_csv<W, I>(writer: W, header: &[String], records: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = Result<Record>>,
{
    let mut writer = csv_writer(writer);
    writer.write_record(header)?;

    let mut count = 0;
    for record in records {
        writer.write_record(record?.values())?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}
