//! End-to-end batch run: read the cell table, resolve, write the dated output

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use crate::atlas::{AtlasResolution, AtlasService};
use crate::config::OutputConfig;
use crate::resolve::{ResolveError, Resolver, ResolverConfig};
use crate::table::{
    CoordinateColumns, TableError, dated_file_name, read_points_file, write_table_file,
};

/// Errors that abort a batch run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Input table {0:?} has no rows with usable coordinates")]
    NoUsableRows(PathBuf),
}

/// Everything a batch run needs, fixed before it starts
#[derive(Debug, Clone)]
pub struct ResolveJob {
    pub input: PathBuf,
    pub atlases: Vec<AtlasResolution>,
    pub columns: CoordinateColumns,
    pub output: OutputConfig,
    pub resolver: ResolverConfig,
    /// Date stamped into the output file name
    pub date: NaiveDate,
}

impl ResolveJob {
    pub fn output_path(&self) -> PathBuf {
        self.output
            .output_dir
            .join(dated_file_name(&self.output.prefix, self.date))
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub output: PathBuf,
    pub rows_written: usize,
    pub rows_skipped: usize,
    /// Cells (row x atlas) without a region
    pub empty_cells: usize,
}

/// Run a batch job. Atlases are all loaded before anything is written, and the
/// output appears only once complete.
pub async fn run(job: &ResolveJob, service: &dyn AtlasService) -> Result<JobReport, PipelineError> {
    let points = read_points_file(&job.input, &job.columns)?;
    if points.rows.is_empty() {
        return Err(PipelineError::NoUsableRows(job.input.clone()));
    }

    let table = Resolver::new(job.resolver.clone())
        .resolve_rows(service, &points.rows, &job.atlases)
        .await?;

    std::fs::create_dir_all(&job.output.output_dir).map_err(TableError::from)?;
    let output = job.output_path();
    write_table_file(&output, &table, job.columns.id.as_deref())?;

    let report = JobReport {
        output,
        rows_written: table.len(),
        rows_skipped: points.skipped.len(),
        empty_cells: table.empty_cells(),
    };

    info!(
        "Wrote {} rows to {:?} ({} skipped, {} cells without a region)",
        report.rows_written, report.output, report.rows_skipped, report.empty_cells
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticAtlasService;

    fn job(dir: &std::path::Path, atlases: &[&str]) -> ResolveJob {
        ResolveJob {
            input: dir.join("cells.csv"),
            atlases: atlases.iter().map(|a| a.parse().unwrap()).collect(),
            columns: CoordinateColumns {
                id: Some("cell.id".into()),
                ..Default::default()
            },
            output: OutputConfig {
                output_dir: dir.join("out"),
                prefix: "PAG_subdivisions".into(),
            },
            resolver: ResolverConfig::default(),
            date: NaiveDate::from_ymd_opt(2020, 6, 17).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_run_writes_dated_table() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("cells.csv"),
            "cell.id,CCF.AllenAP,CCF.AllenDV,CCF.AllenML\nc1,20,30,20\nc2,,,\nc3,40,30,40\n",
        )
        .unwrap();

        let job = job(dir.path(), &["allen_mouse_10um", "kim_mouse_25um"]);
        let report = run(&job, &StaticAtlasService::standard()).await.unwrap();

        assert_eq!(report.rows_written, 2);
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(report.empty_cells, 0);
        assert!(report.output.ends_with("out/PAG_subdivisions_20200617.csv"));

        let text = std::fs::read_to_string(&report.output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "index,cell.id,allen_mouse_10_id,allen_mouse_10_acronym,kim_mouse_25_id,kim_mouse_25_acronym"
        );
        assert_eq!(lines[1], "0,c1,795,PAG,2001,PAGdl");
        assert_eq!(lines[2], "2,c3,128,MRN,128,MRN");
    }

    #[tokio::test]
    async fn test_unknown_atlas_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("cells.csv"),
            "cell.id,CCF.AllenAP,CCF.AllenDV,CCF.AllenML\nc1,20,30,20\n",
        )
        .unwrap();

        let job = job(dir.path(), &["allen_mouse_10um", "kim_mouse_50um"]);
        let err = run(&job, &StaticAtlasService::standard()).await.unwrap_err();

        assert!(err.to_string().contains("kim_mouse_50um"));
        assert!(!job.output_path().exists());
        assert!(!dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_no_usable_rows() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("cells.csv"),
            "cell.id,CCF.AllenAP,CCF.AllenDV,CCF.AllenML\nc1,x,y,z\n",
        )
        .unwrap();

        let job = job(dir.path(), &["allen_mouse_10um"]);
        assert!(matches!(
            run(&job, &StaticAtlasService::standard()).await,
            Err(PipelineError::NoUsableRows(_))
        ));
    }
}
