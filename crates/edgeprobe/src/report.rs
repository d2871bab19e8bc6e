//! Console rendering of run headers and results

use std::fmt::Write;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::recorder::RunMetadata;
use crate::scheduler::Scenario;
use crate::stats::RunStatistics;

const RULE_WIDTH: usize = 70;

fn rule() -> String {
    "═".repeat(RULE_WIDTH)
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Header printed before traffic starts
pub fn render_banner(target: &str, scenario: Scenario, duration: Duration, started_at: DateTime<Local>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", rule());
    let _ = writeln!(out, "EDGE RATE-LIMIT PROBE");
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "Target:     {}", target);
    let _ = writeln!(out, "Scenario:   {} - {}", scenario, scenario.description());
    let _ = writeln!(out, "Expect:     {}", scenario.expectation());
    let _ = writeln!(out, "Duration:   {}s", duration.as_secs());
    let _ = writeln!(out, "Start Time: {}", started_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "{}", rule());
    out
}

/// Full results summary
pub fn render(metadata: &RunMetadata, stats: &RunStatistics) -> String {
    let mut out = String::new();
    let counters = &stats.counters;

    let _ = writeln!(out, "\n{}", rule());
    let _ = writeln!(out, "TEST RESULTS ({} against {})", metadata.scenario, metadata.target);
    let _ = writeln!(out, "{}\n", rule());

    let _ = writeln!(out, "Duration:       {:.2}s", stats.elapsed.as_secs_f64());
    let _ = writeln!(out, "Total Requests: {}", counters.total);
    let _ = writeln!(out, "Requests/sec:   {:.2}\n", stats.requests_per_sec);

    let _ = writeln!(out, "Status Code Distribution:");
    for (bucket, count) in &stats.status_counts {
        let _ = writeln!(out, "  {}: {} ({:.1}%)", bucket, count, stats.share_of(*count));
    }
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "Successful: {} ({:.1}%)",
        counters.success,
        stats.share_of(counters.success)
    );
    let _ = writeln!(
        out,
        "Blocked:    {} ({:.1}%)",
        counters.blocked,
        stats.share_of(counters.blocked)
    );
    if counters.other > 0 {
        let _ = writeln!(out, "Other HTTP: {}", counters.other);
    }
    if counters.timeouts > 0 || counters.errors > 0 {
        let _ = writeln!(out, "Timeouts:   {}", counters.timeouts);
        let _ = writeln!(out, "Errors:     {}", counters.errors);
    }
    let _ = writeln!(out);

    let latency = &stats.latency;
    if latency.has_data() {
        let _ = writeln!(out, "Response Time Statistics:");
        let _ = writeln!(out, "  Average:      {:.2}ms", millis(latency.mean));
        let _ = writeln!(out, "  P50 (Median): {:.2}ms", millis(latency.p50));
        let _ = writeln!(out, "  P95:          {:.2}ms", millis(latency.p95));
        let _ = writeln!(out, "  P99:          {:.2}ms", millis(latency.p99));
        let _ = writeln!(out, "  Min:          {:.2}ms", millis(latency.min));
        let _ = writeln!(out, "  Max:          {:.2}ms", millis(latency.max));
        let _ = writeln!(out);
    }

    match &stats.block_onset {
        Some(onset) => {
            let _ = writeln!(out, "Rate-Limit Analysis:");
            let _ = writeln!(
                out,
                "  First block occurred at: {:.1}s",
                onset.offset.as_secs_f64()
            );
            let _ = writeln!(out, "  Block rate: {:.1}%", stats.block_rate);
            let _ = writeln!(out, "  Requests before first block: {}", onset.requests_before);
            let _ = writeln!(out, "  The edge policy is actively rejecting traffic");
        }
        None => {
            let _ = writeln!(out, "No blocking detected - traffic stayed below the rate-limit threshold");
        }
    }

    let _ = writeln!(out, "\n{}", rule());
    out
}
