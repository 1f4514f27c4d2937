//! Human-readable text output

use crate::config::Config;
use crate::coordinator::registry::ProcessOutcome;
use crate::coordinator::{RunReport, TeardownEvent};
use crate::stats::histogram::LatencyHistogram;
use crate::util::time::{calculate_rate, format_duration, format_number, format_rate};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════";

/// Print the results of a completed run to stdout
pub fn print_results(report: &RunReport, config: &Config) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = write_results(&mut out, report, config) {
        tracing::warn!(error = %e, "failed to write results");
    }
}

/// Print one termination or release notice to stdout
///
/// Meant to be registered with
/// [`Coordinator::on_teardown`](crate::Coordinator::on_teardown) so each
/// line appears as the step happens.
pub fn print_teardown_event(event: TeardownEvent<'_>) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = write_teardown_event(&mut out, event) {
        tracing::warn!(error = %e, "failed to write teardown notice");
    }
}

/// Print the notice for a run ended by an interrupt
pub fn print_cancelled() {
    println!();
    println!("Run cancelled; no aggregate reported.");
}

/// Write the results banner, contention block and per-process summaries
///
/// Displays:
/// - Aggregate word and digit counts
/// - Tasks dispatched and elapsed time
/// - Mutex token contention (wait and hold times)
/// - One summary line per process
pub fn write_results<W: Write>(out: &mut W, report: &RunReport, config: &Config) -> io::Result<()> {
    writeln!(out, "{}", RULE)?;
    writeln!(out, "                    SCAN RESULTS")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;

    writeln!(out, "Pattern:  {:?}", config.scan.pattern())?;
    writeln!(out, "Source:   {}", config.scan.source.display())?;
    writeln!(
        out,
        "Tasks:    {} ({} lines)",
        format_number(report.tasks_dispatched),
        format_number(report.lines_read)
    )?;
    writeln!(
        out,
        "Elapsed:  {} ({} tasks/s)",
        format_duration(report.elapsed),
        format_rate(calculate_rate(report.tasks_dispatched, report.elapsed))
    )?;
    writeln!(out)?;

    writeln!(out, "Matches:")?;
    writeln!(out, "  Words:  {}", format_number(report.aggregate.word_count))?;
    writeln!(out, "  Digits: {}", format_number(report.aggregate.digit_count))?;
    writeln!(out)?;

    let contention = report.teardown.worker_stats();
    writeln!(out, "Mutex Contention:")?;
    if contention.acquisitions() > 0 {
        writeln!(out, "  Acquisitions: {}", format_number(contention.acquisitions()))?;
        write_latency(out, "Wait", contention.lock_wait())?;
        write_latency(out, "Held", contention.lock_held())?;
    } else {
        writeln!(out, "  No critical sections entered")?;
    }
    writeln!(out)?;

    writeln!(
        out,
        "Processes ({} workers, {} counting services):",
        report.workers, report.counting_services
    )?;
    for notice in &report.teardown.notices {
        match &notice.outcome {
            ProcessOutcome::Worker(stats) => writeln!(
                out,
                "  {:<12} tasks={} words={} digits={} acquisitions={}",
                notice.label,
                stats.tasks,
                stats.words_matched,
                stats.digits_counted,
                stats.acquisitions()
            )?,
            ProcessOutcome::CountingService(stats) => writeln!(
                out,
                "  {:<12} requests={} digits={}",
                notice.label, stats.requests, stats.digits
            )?,
            other => writeln!(out, "  {:<12} {}", notice.label, other)?,
        }
    }
    writeln!(out)?;

    writeln!(out, "{}", RULE)?;
    Ok(())
}

fn write_latency<W: Write>(out: &mut W, name: &str, hist: &LatencyHistogram) -> io::Result<()> {
    let show = |d: Option<std::time::Duration>| d.map(format_duration).unwrap_or_else(|| "-".to_string());
    writeln!(
        out,
        "  {}: min {} / mean {} / max {} (p50 {}, p99 {})",
        name,
        show(hist.min()),
        show(hist.mean()),
        show(hist.max()),
        show(hist.percentile(50.0)),
        show(hist.percentile(99.0))
    )
}

/// Write the line for one teardown step
///
/// # Arguments
///
/// * `out` - Destination writer
/// * `event` - A joined process or the channel release
///
/// # Example
///
/// ```
/// use wordscan::coordinator::registry::{ProcessOutcome, ProcessRole, TerminationNotice};
/// use wordscan::coordinator::TeardownEvent;
/// use wordscan::output::text::write_teardown_event;
///
/// let notice = TerminationNotice {
///     role: ProcessRole::Worker,
///     label: "worker-0".to_string(),
///     outcome: ProcessOutcome::Panicked,
/// };
/// let mut out = Vec::new();
/// write_teardown_event(&mut out, TeardownEvent::Terminated(&notice)).unwrap();
/// assert_eq!(out, b"Terminating worker process [worker-0]... panicked\n");
/// ```
pub fn write_teardown_event<W: Write>(out: &mut W, event: TeardownEvent<'_>) -> io::Result<()> {
    match event {
        TeardownEvent::Terminated(notice) => writeln!(
            out,
            "Terminating {} process [{}]... {}",
            notice.role, notice.label, notice.outcome
        ),
        TeardownEvent::Released(channels) => {
            writeln!(out, "Freeing resources ({} channels released)", channels.len())
        }
    }
}
