//! Connection list files
//!
//! One file per adjacent population pair. The layout matches what pyNN's
//! `Projection.save("connections", ...)` writes and `FromFileConnector`
//! reads: a commented column header followed by one `i j weight delay` row
//! per synapse.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Result, StorageError};
use crate::Connection;

/// Column names written into the file header
pub const CONNECTION_COLUMNS: [&str; 4] = ["i", "j", "weight", "delay"];

/// Write `connections` to `path`, replacing any existing file
pub fn write_connection_file(path: &Path, connections: &[Connection]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut out = BufWriter::new(File::create(path)?);

    let columns: Vec<String> = CONNECTION_COLUMNS.iter().map(|c| format!("\"{}\"", c)).collect();
    writeln!(out, "# columns = [{}]", columns.join(", "))?;
    for conn in connections {
        writeln!(out, "{} {} {} {}", conn.source, conn.target, conn.weight, conn.delay)?;
    }
    out.flush()?;

    log::debug!("Wrote {} connections to {}", connections.len(), path.display());
    Ok(())
}

/// Read a connection list written by [`write_connection_file`] (or pyNN)
pub fn read_connection_file(path: &Path) -> Result<Vec<Connection>> {
    if !path.is_file() {
        return Err(StorageError::not_found(path));
    }
    let reader = BufReader::new(File::open(path)?);

    let mut connections = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        connections.push(parse_row(trimmed, line_no + 1)?);
    }
    Ok(connections)
}

fn parse_row(row: &str, line_no: usize) -> Result<Connection> {
    let fields: Vec<&str> = row.split_whitespace().collect();
    if fields.len() != CONNECTION_COLUMNS.len() {
        return Err(StorageError::invalid_format(format!(
            "line {}: expected {} columns, found {}",
            line_no,
            CONNECTION_COLUMNS.len(),
            fields.len()
        )));
    }

    let number = |idx: usize| -> Result<f64> {
        fields[idx].parse::<f64>().map_err(|_| {
            StorageError::invalid_format(format!(
                "line {}: column '{}' is not a number: {}",
                line_no, CONNECTION_COLUMNS[idx], fields[idx]
            ))
        })
    };
    // pyNN writes indices as floats ("3.0"), so accept any integral value
    let index = |idx: usize| -> Result<usize> {
        let value = number(idx)?;
        if value < 0.0 || value.fract() != 0.0 {
            return Err(StorageError::invalid_format(format!(
                "line {}: column '{}' is not a neuron index: {}",
                line_no, CONNECTION_COLUMNS[idx], fields[idx]
            )));
        }
        Ok(value as usize)
    };

    Ok(Connection::new(index(0)?, index(1)?, number(2)?, number(3)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dense_1");
        let conns = vec![
            Connection::new(0, 0, 0.5, 1.0),
            Connection::new(0, 1, -0.2, 1.0),
            Connection::new(1, 2, 0.123456789, 2.5),
        ];
        write_connection_file(&path, &conns).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# columns = [\"i\", \"j\", \"weight\", \"delay\"]"));

        assert_eq!(read_connection_file(&path).unwrap(), conns);
    }

    #[test]
    fn test_empty_list_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        write_connection_file(&path, &[]).unwrap();
        assert!(read_connection_file(&path).unwrap().is_empty());
    }

    #[test]
    fn test_reads_float_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pynn");
        std::fs::write(&path, "# columns = [\"i\", \"j\", \"weight\", \"delay\"]\n3.0 1.0 0.25 1.0\n\n").unwrap();
        let conns = read_connection_file(&path).unwrap();
        assert_eq!(conns, vec![Connection::new(3, 1, 0.25, 1.0)]);
    }

    #[test]
    fn test_rejects_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad");

        std::fs::write(&path, "0 1 0.5\n").unwrap();
        assert!(matches!(read_connection_file(&path), Err(StorageError::InvalidFormat { .. })));

        std::fs::write(&path, "0.5 1 0.5 1\n").unwrap();
        assert!(matches!(read_connection_file(&path), Err(StorageError::InvalidFormat { .. })));

        std::fs::write(&path, "0 1 abc 1\n").unwrap();
        assert!(matches!(read_connection_file(&path), Err(StorageError::InvalidFormat { .. })));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_connection_file(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }
}
