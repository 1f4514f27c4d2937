//! JSON output formatting
//!
//! One document per run. A completed run carries the aggregate, the
//! contention statistics and per-process summaries; a cancelled run carries
//! only the teardown record.

use crate::channel::ChannelName;
use crate::config::Config;
use crate::coordinator::registry::{ProcessOutcome, ProcessRole, TerminationNotice};
use crate::coordinator::{RunReport, TeardownReport};
use crate::stats::aggregator::AggregateResult;
use crate::stats::histogram::LatencyHistogram;
use crate::util::time::format_duration;
use crate::Result;
use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            micros: d.as_micros() as u64,
            human: format_duration(d),
        }
    }
}

/// Latency summary of one histogram
#[derive(Debug, Clone, Serialize)]
pub struct JsonLatency {
    pub samples: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p50: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p99: Option<JsonDuration>,
}

impl JsonLatency {
    pub fn from_histogram(hist: &LatencyHistogram) -> Self {
        Self {
            samples: hist.len(),
            min: hist.min().map(JsonDuration::from_duration),
            mean: hist.mean().map(JsonDuration::from_duration),
            max: hist.max().map(JsonDuration::from_duration),
            p50: hist.percentile(50.0).map(JsonDuration::from_duration),
            p99: hist.percentile(99.0).map(JsonDuration::from_duration),
        }
    }
}

/// Mutex token contention across all workers
#[derive(Debug, Clone, Serialize)]
pub struct JsonContention {
    pub acquisitions: u64,
    pub wait: JsonLatency,
    pub held: JsonLatency,
}

/// Run configuration as recorded in the report
#[derive(Debug, Clone, Serialize)]
pub struct JsonRunConfig {
    pub pattern: String,
    pub source: String,
    pub split: &'static str,
    pub workers: usize,
    pub counting_services: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub think_time: Option<JsonDuration>,
}

/// One process as recorded at teardown
#[derive(Debug, Clone, Serialize)]
pub struct JsonProcess {
    pub role: ProcessRole,
    pub label: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words_matched: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digits: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<u64>,
}

impl JsonProcess {
    pub fn from_notice(notice: &TerminationNotice) -> Self {
        let mut process = Self {
            role: notice.role,
            label: notice.label.clone(),
            outcome: notice.outcome.to_string(),
            tasks: None,
            words_matched: None,
            digits: None,
            requests: None,
        };
        match &notice.outcome {
            ProcessOutcome::Worker(stats) => {
                process.tasks = Some(stats.tasks);
                process.words_matched = Some(stats.words_matched);
                process.digits = Some(stats.digits_counted);
            }
            ProcessOutcome::CountingService(stats) => {
                process.requests = Some(stats.requests);
                process.digits = Some(stats.digits);
            }
            ProcessOutcome::Failed(_) | ProcessOutcome::Panicked => {}
        }
        process
    }
}

/// Complete JSON report
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    pub tool: &'static str,
    pub version: &'static str,
    /// RFC 3339 UTC timestamp
    pub generated_at: String,
    /// "completed" or "cancelled"
    pub outcome: &'static str,
    pub config: JsonRunConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<AggregateResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks_dispatched: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_read: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contention: Option<JsonContention>,
    pub processes: Vec<JsonProcess>,
    pub channels_released: Vec<ChannelName>,
}

/// Build JsonRunConfig
pub fn build_run_config(config: &Config) -> JsonRunConfig {
    JsonRunConfig {
        pattern: config.scan.pattern().to_string(),
        source: config.scan.source.display().to_string(),
        split: config.scan.split.as_str(),
        workers: config.workers.count,
        counting_services: config.counting.pool_size,
        think_time: config.workers.think_time().map(JsonDuration::from_duration),
    }
}

fn base_report(outcome: &'static str, config: &Config, teardown: &TeardownReport) -> JsonReport {
    JsonReport {
        tool: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        generated_at: chrono::Utc::now().to_rfc3339(),
        outcome,
        config: build_run_config(config),
        aggregate: None,
        tasks_dispatched: None,
        lines_read: None,
        elapsed: None,
        contention: None,
        processes: teardown.notices.iter().map(JsonProcess::from_notice).collect(),
        channels_released: teardown.channels_released.clone(),
    }
}

/// Report for a completed run
pub fn build_completed_report(report: &RunReport, config: &Config) -> JsonReport {
    let stats = report.teardown.worker_stats();
    let mut json = base_report("completed", config, &report.teardown);

    json.aggregate = Some(report.aggregate);
    json.tasks_dispatched = Some(report.tasks_dispatched);
    json.lines_read = Some(report.lines_read);
    json.elapsed = Some(JsonDuration::from_duration(report.elapsed));
    json.contention = Some(JsonContention {
        acquisitions: stats.acquisitions(),
        wait: JsonLatency::from_histogram(stats.lock_wait()),
        held: JsonLatency::from_histogram(stats.lock_held()),
    });
    json
}

/// Report for a run ended by an interrupt
pub fn build_cancelled_report(teardown: &TeardownReport, config: &Config) -> JsonReport {
    base_report("cancelled", config, teardown)
}

/// Write JSON output to file
pub fn write_json_output(output_path: &Path, report: &JsonReport, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(writer, report)?;
    } else {
        serde_json::to_writer(writer, report)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PartialResult;
    use crate::stats::{ServiceStats, WorkerStats};
    use std::path::PathBuf;

    fn teardown() -> TeardownReport {
        let mut worker = WorkerStats::new();
        worker.record_task(&PartialResult { word_count: 1, digit_count: 1 });
        worker.record_critical_section(Duration::from_micros(3), Duration::from_micros(9));

        TeardownReport {
            notices: vec![
                TerminationNotice {
                    role: ProcessRole::CountingService,
                    label: "counter-0".to_string(),
                    outcome: ProcessOutcome::CountingService(ServiceStats { requests: 1, digits: 1 }),
                },
                TerminationNotice {
                    role: ProcessRole::Worker,
                    label: "worker-0".to_string(),
                    outcome: ProcessOutcome::Worker(worker),
                },
            ],
            channels_released: ChannelName::ALL.to_vec(),
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.scan.pattern = Some("cat".to_string());
        config.scan.source = PathBuf::from("input.txt");
        config
    }

    #[test]
    fn test_completed_report() {
        let report = RunReport {
            aggregate: AggregateResult { results: 1, word_count: 1, digit_count: 1 },
            tasks_dispatched: 1,
            lines_read: 1,
            workers: 1,
            counting_services: 1,
            elapsed: Duration::from_millis(2),
            teardown: teardown(),
        };

        let value = serde_json::to_value(build_completed_report(&report, &config())).unwrap();
        assert_eq!(value["outcome"], "completed");
        assert_eq!(value["aggregate"]["word_count"], 1);
        assert_eq!(value["contention"]["acquisitions"], 1);
        assert_eq!(value["config"]["split"], "space");
        assert_eq!(value["processes"][0]["role"], "counting-service");
        assert_eq!(value["processes"][1]["tasks"], 1);
        assert_eq!(value["channels_released"][0], "line-task");
        assert_eq!(value["elapsed"]["micros"], 2000);
    }

    #[test]
    fn test_cancelled_report_has_no_aggregate() {
        let value = serde_json::to_value(build_cancelled_report(&teardown(), &config())).unwrap();
        assert_eq!(value["outcome"], "cancelled");
        assert!(value.get("aggregate").is_none());
        assert!(value.get("contention").is_none());
        assert_eq!(value["processes"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_write_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        write_json_output(&path, &build_cancelled_report(&teardown(), &config()), true).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["tool"], "wordscan");
        assert!(chrono::DateTime::parse_from_rfc3339(value["generated_at"].as_str().unwrap()).is_ok());
    }
}
