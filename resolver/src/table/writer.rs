//! CSV writer for result tables

use chrono::NaiveDate;
use csv::Writer;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::types::TableError;
use crate::resolve::ResultTable;

/// Output file name carrying the run date, e.g. `ccf_subdivisions_20240617.csv`
pub fn dated_file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{}_{}.csv", prefix, date.format("%Y%m%d"))
}

/// Write `table` as CSV: `index`, the optional id column, then an id and an
/// acronym column per atlas. Missing regions are written as empty cells.
pub fn write_table<W: Write>(
    writer: W,
    table: &ResultTable,
    id_column: Option<&str>,
) -> Result<(), TableError> {
    let mut writer = Writer::from_writer(writer);

    let mut header = vec!["index".to_string()];
    header.extend(id_column.map(str::to_string));
    header.extend(table.region_columns());
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![row.index.to_string()];
        if id_column.is_some() {
            record.push(row.label.clone().unwrap_or_default());
        }
        for region in &row.regions {
            record.push(region.id.map(|id| id.to_string()).unwrap_or_default());
            record.push(region.acronym.clone().unwrap_or_default());
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write `table` to `path` through a temporary sibling file that is renamed
/// into place, so a failed write never leaves a partial table behind.
pub fn write_table_file(
    path: &Path,
    table: &ResultTable,
    id_column: Option<&str>,
) -> Result<(), TableError> {
    let partial = partial_path(path);

    let result = std::fs::File::create(&partial)
        .map_err(TableError::from)
        .and_then(|file| write_table(std::io::BufWriter::new(file), table, id_column))
        .and_then(|()| std::fs::rename(&partial, path).map_err(TableError::from));

    if let Err(ref e) = result {
        warn!("Failed to write {}: {}", path.display(), e);
        let _ = std::fs::remove_file(&partial);
    } else {
        info!("Wrote {} rows to {}", table.len(), path.display());
    }

    result
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{AtlasResolution, RegionResult};
    use crate::resolve::ResultRow;

    fn table() -> ResultTable {
        ResultTable {
            atlases: vec![
                AtlasResolution::new("allen_mouse", 10),
                AtlasResolution::new("kim_mouse", 25),
            ],
            rows: vec![
                ResultRow {
                    index: 0,
                    label: Some("c1".into()),
                    regions: vec![
                        RegionResult {
                            id: Some(795),
                            acronym: Some("PAG".into()),
                        },
                        RegionResult {
                            id: Some(2001),
                            acronym: Some("PAGdl".into()),
                        },
                    ],
                },
                ResultRow {
                    index: 2,
                    label: None,
                    regions: vec![RegionResult::empty(), RegionResult::empty()],
                },
            ],
        }
    }

    #[test]
    fn test_dated_file_name() {
        let date = NaiveDate::from_ymd_opt(2020, 6, 17).unwrap();
        assert_eq!(
            dated_file_name("ccf_subdivisions", date),
            "ccf_subdivisions_20200617.csv"
        );
    }

    #[test]
    fn test_write_with_id_column() {
        let mut out = Vec::new();
        write_table(&mut out, &table(), Some("cell.id")).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "index,cell.id,allen_mouse_10_id,allen_mouse_10_acronym,kim_mouse_25_id,kim_mouse_25_acronym",
                "0,c1,795,PAG,2001,PAGdl",
                "2,,,,,",
            ]
        );
    }

    #[test]
    fn test_write_without_id_column() {
        let mut out = Vec::new();
        write_table(&mut out, &table(), None).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("index,allen_mouse_10_id,"));
        assert!(text.contains("\n0,795,PAG,2001,PAGdl\n"));
    }

    #[test]
    fn test_write_file_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_table_file(&path, &table(), None).unwrap();

        assert!(path.is_file());
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_write_into_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");
        assert!(write_table_file(&path, &table(), None).is_err());
        assert!(!path.exists());
    }
}
