//! Durable export of a finished run
//!
//! Two files per run, both named after the scenario and the export time:
//!
//! - `load_test_results_<scenario>_<stamp>.json`: metadata, totals, status
//!   distribution and every sample
//! - `load_test_summary_<scenario>_<stamp>.csv`: one row per sample
//!
//! Both files are staged next to their final paths and renamed into place
//! only once both writes succeed.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::recorder::Run;
use crate::sample::{Sample, Status, StatusBucket};
use crate::scheduler::Scenario;
use crate::stats::RunStatistics;

const CSV_HEADER: &str = "timestamp,status_code,response_time_ms,blocked";

/// Paths of the files produced by one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub json: PathBuf,
    pub csv: PathBuf,
}

#[derive(Serialize)]
struct RunDocument<'a> {
    scenario: Scenario,
    target: &'a str,
    duration: u64,
    started_at: DateTime<Utc>,
    elapsed_secs: f64,
    total_requests: u64,
    success_count: u64,
    blocked_count: u64,
    status_counts: &'a BTreeMap<StatusBucket, u64>,
    results: Vec<SampleRecord<'a>>,
}

#[derive(Serialize)]
struct SampleRecord<'a> {
    timestamp: DateTime<Utc>,
    offset_ms: f64,
    status_code: &'a Status,
    response_time_ms: f64,
    blocked: bool,
}

impl<'a> From<&'a Sample> for SampleRecord<'a> {
    fn from(sample: &'a Sample) -> Self {
        Self {
            timestamp: sample.issued_at,
            offset_ms: sample.offset.as_secs_f64() * 1000.0,
            status_code: &sample.status,
            response_time_ms: sample.latency.as_secs_f64() * 1000.0,
            blocked: sample.blocked,
        }
    }
}

/// Writes run exports into one directory
#[derive(Debug, Clone)]
pub struct Exporter {
    output_dir: PathBuf,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn export(&self, run: &Run, stats: &RunStatistics) -> Result<ExportPaths> {
        fs::create_dir_all(&self.output_dir)?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let paths = self.unique_paths(run.metadata.scenario, &stamp);

        write_pair(&paths, &render_json(run, stats)?, render_csv(run).as_bytes())?;
        info!("Detailed results exported to: {}", paths.json.display());
        info!("Summary exported to: {}", paths.csv.display());

        Ok(paths)
    }

    /// Never reuse a name another run already wrote
    fn unique_paths(&self, scenario: Scenario, stamp: &str) -> ExportPaths {
        let mut attempt = 0u32;
        loop {
            let suffix = if attempt == 0 {
                stamp.to_string()
            } else {
                format!("{}_{}", stamp, attempt)
            };
            let paths = ExportPaths {
                json: self
                    .output_dir
                    .join(format!("load_test_results_{}_{}.json", scenario, suffix)),
                csv: self
                    .output_dir
                    .join(format!("load_test_summary_{}_{}.csv", scenario, suffix)),
            };
            if !paths.json.exists() && !paths.csv.exists() {
                return paths;
            }
            attempt += 1;
        }
    }
}

/// Structured document for the whole run
pub fn render_json(run: &Run, stats: &RunStatistics) -> Result<Vec<u8>> {
    let document = RunDocument {
        scenario: run.metadata.scenario,
        target: &run.metadata.target,
        duration: run.metadata.requested_duration.as_secs(),
        started_at: run.metadata.started_at,
        elapsed_secs: run.metadata.elapsed.as_secs_f64(),
        total_requests: stats.counters.total,
        success_count: stats.counters.success,
        blocked_count: stats.counters.blocked,
        status_counts: &stats.status_counts,
        results: run.samples.iter().map(SampleRecord::from).collect(),
    };
    Ok(serde_json::to_vec_pretty(&document)?)
}

/// Header plus one row per sample
pub fn render_csv(run: &Run) -> String {
    let mut out = String::with_capacity(64 * (run.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');

    for sample in &run.samples {
        let _ = writeln!(
            out,
            "{},{},{:.2},{}",
            sample.issued_at.format("%Y-%m-%d %H:%M:%S%.6f"),
            csv_field(&sample.status.to_string()),
            sample.latency.as_secs_f64() * 1000.0,
            if sample.blocked { "Yes" } else { "No" }
        );
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Stage both files before either becomes visible
fn write_pair(paths: &ExportPaths, json: &[u8], csv: &[u8]) -> Result<()> {
    let json_tmp = tmp_path(&paths.json);
    let csv_tmp = tmp_path(&paths.csv);

    let staged = fs::write(&json_tmp, json).and_then(|_| fs::write(&csv_tmp, csv));
    if let Err(err) = staged {
        let _ = fs::remove_file(&json_tmp);
        let _ = fs::remove_file(&csv_tmp);
        return Err(err.into());
    }

    fs::rename(&json_tmp, &paths.json)?;
    fs::rename(&csv_tmp, &paths.csv)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::recorder::RunMetadata;
    use std::time::Duration;

    fn run() -> Run {
        let statuses = [
            Status::Code(200),
            Status::Code(429),
            Status::Error("connect: tcp connect error, refused \"x\"".into()),
        ];
        Run {
            metadata: RunMetadata {
                target: "http://target.test".to_string(),
                scenario: Scenario::Burst,
                requested_duration: Duration::from_secs(10),
                started_at: Utc::now(),
                elapsed: Duration::from_secs(10),
            },
            samples: statuses
                .into_iter()
                .enumerate()
                .map(|(i, status)| {
                    Sample::new(
                        Utc::now(),
                        Duration::from_millis(i as u64 * 100),
                        status,
                        Duration::from_micros(12_346),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_csv_rows() {
        let csv = render_csv(&run());
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].ends_with(",200,12.35,No"));
        assert!(lines[2].ends_with(",429,12.35,Yes"));
        assert!(lines[3].contains("\"ERROR: connect: tcp connect error, refused \"\"x\"\"\""));
        assert!(lines[3].ends_with(",0.00,No"));
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("429"), "429");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_json_document() {
        let run = run();
        let stats = RunStatistics::from_run(&run);
        let value: serde_json::Value = serde_json::from_slice(&render_json(&run, &stats).unwrap()).unwrap();

        assert_eq!(value["scenario"], "burst");
        assert_eq!(value["target"], "http://target.test");
        assert_eq!(value["duration"], 10);
        assert_eq!(value["total_requests"], 3);
        assert_eq!(value["blocked_count"], 1);
        assert_eq!(value["status_counts"]["429"], 1);
        assert_eq!(value["status_counts"]["ERROR"], 1);
        assert_eq!(value["results"].as_array().unwrap().len(), 3);
        assert_eq!(value["results"][1]["status_code"], 429);
        assert_eq!(value["results"][1]["blocked"], true);
    }

    #[test]
    fn test_export_writes_unique_files() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path());
        let run = run();
        let stats = RunStatistics::from_run(&run);

        let first = exporter.export(&run, &stats).unwrap();
        let second = exporter.export(&run, &stats).unwrap();

        assert_ne!(first, second);
        for path in [&first.json, &first.csv, &second.json, &second.csv] {
            assert!(path.exists());
        }
        let name = first.json.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("load_test_results_burst_"));

        // No temp files left behind
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().map_or(false, |x| x == "tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_failed_csv_write_leaves_no_json() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ExportPaths {
            json: dir.path().join("results.json"),
            csv: dir.path().join("summary.csv"),
        };
        // A directory in place of the staged CSV makes the second write fail
        fs::create_dir(tmp_path(&paths.csv)).unwrap();

        let result = write_pair(&paths, b"{}", b"timestamp\n");

        assert!(matches!(result, Err(ProbeError::Io(_))));
        assert!(!paths.json.exists());
        assert!(!paths.csv.exists());
        assert!(!tmp_path(&paths.json).exists());
    }
}
