//! CSV reader for cell coordinate tables

use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use super::types::{CoordinateColumns, PointTable, SkippedRow, TableError};
use crate::resolve::{InputRow, Point3D};

/// Read coordinate rows from CSV data with a header row.
///
/// Rows whose coordinates are missing or not finite numbers are skipped with a
/// warning; every other row keeps its 0-based data row index.
pub fn read_points<R: Read>(reader: R, columns: &CoordinateColumns) -> Result<PointTable, TableError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = reader.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    };
    let axes = [
        position(&columns.ap)?,
        position(&columns.dv)?,
        position(&columns.ml)?,
    ];
    let id_column = columns.id.as_deref().map(position).transpose()?;

    let mut table = PointTable::default();

    for (index, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                skip(&mut table, index, format!("unreadable record: {}", e));
                continue;
            }
        };

        match parse_point(&record, &headers, axes) {
            Ok(point) => table.rows.push(InputRow {
                index,
                label: id_column
                    .and_then(|c| record.get(c))
                    .map(|v| v.trim().to_string()),
                point,
            }),
            Err(reason) => skip(&mut table, index, reason),
        }
    }

    info!(
        "Read {} rows ({} skipped)",
        table.rows.len(),
        table.skipped.len()
    );
    Ok(table)
}

/// Read coordinate rows from a CSV file
pub fn read_points_file(path: &Path, columns: &CoordinateColumns) -> Result<PointTable, TableError> {
    info!("Reading points from {}", path.display());
    read_points(File::open(path)?, columns)
}

fn skip(table: &mut PointTable, index: usize, reason: String) {
    warn!("Skipping malformed input row {}: {}", index, reason);
    table.skipped.push(SkippedRow { index, reason });
}

fn parse_point(
    record: &StringRecord,
    headers: &StringRecord,
    axes: [usize; 3],
) -> Result<Point3D, String> {
    let mut coords = [0.0; 3];
    for (coord, column) in coords.iter_mut().zip(axes) {
        let name = headers.get(column).unwrap_or_default();
        let raw = record
            .get(column)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| format!("missing value for '{}'", name))?;
        let value: f64 = raw
            .parse()
            .map_err(|_| format!("'{}' is not a number in '{}'", raw, name))?;
        if !value.is_finite() {
            return Err(format!("'{}' is not finite in '{}'", raw, name));
        }
        *coord = value;
    }
    Ok(Point3D::new(coords[0], coords[1], coords[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
,cell.id,cell.type,CCF.AllenAP,CCF.AllenDV,CCF.AllenML
0,c1,VGAT,500,300,400
1,c2,VGLUT2,,300,400
2,c3,VGAT,512.5,310,401
3,c4,VGAT,abc,1,2
4,c5,VGAT,10,20
5,c6,VGLUT2,nan,1,2
";

    #[test]
    fn test_reads_valid_rows_and_skips_malformed() {
        let columns = CoordinateColumns {
            id: Some("cell.id".to_string()),
            ..Default::default()
        };
        let table = read_points(CSV.as_bytes(), &columns).unwrap();

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].index, 0);
        assert_eq!(table.rows[0].label.as_deref(), Some("c1"));
        assert_eq!(table.rows[0].point, Point3D::new(500.0, 300.0, 400.0));
        assert_eq!(table.rows[1].index, 2);
        assert_eq!(table.rows[1].point.ap, 512.5);

        let skipped: Vec<usize> = table.skipped.iter().map(|s| s.index).collect();
        assert_eq!(skipped, vec![1, 3, 4, 5]);
        assert!(table.skipped[0].reason.contains("CCF.AllenAP"));
    }

    #[test]
    fn test_missing_coordinate_column() {
        let columns = CoordinateColumns {
            ml: "CCF.AllenLR".to_string(),
            ..Default::default()
        };
        let result = read_points(CSV.as_bytes(), &columns);
        assert!(matches!(result, Err(TableError::MissingColumn(c)) if c == "CCF.AllenLR"));
    }

    #[test]
    fn test_missing_id_column() {
        let columns = CoordinateColumns {
            id: Some("barcode".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            read_points(CSV.as_bytes(), &columns),
            Err(TableError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_custom_column_names() {
        let csv = "x,y,z\n1,2,3\n";
        let columns = CoordinateColumns {
            ap: "x".into(),
            dv: "y".into(),
            ml: "z".into(),
            id: None,
        };
        let table = read_points(csv.as_bytes(), &columns).unwrap();
        assert_eq!(table.rows[0].point, Point3D::new(1.0, 2.0, 3.0));
        assert!(table.rows[0].label.is_none());
    }
}
