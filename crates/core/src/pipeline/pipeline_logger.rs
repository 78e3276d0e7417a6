use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for loop events.
///
/// Keeps the orchestrator free of output concerns: the CLI reports through
/// `log`, tests discard everything.
pub trait PipelineLogger {
    /// Called once per completed cycle with the number of cycles so far.
    fn cycle(&mut self, completed: usize);

    /// Record how long a named stage took in one cycle.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces per frame).
    fn metric(&mut self, name: &str, value: f64);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn cycle(&mut self, _completed: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

/// Running total of one stage or metric.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aggregate {
    pub sum: f64,
    pub count: usize,
}

impl Aggregate {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Logger that aggregates per-stage timings and metrics and reports a
/// summary when the loop stops.
///
/// Only running totals are kept, so memory stays flat however long the
/// session runs. Cycle progress is logged every `throttle_cycles` cycles.
pub struct StdoutPipelineLogger {
    throttle_cycles: usize,
    timings: HashMap<String, Aggregate>,
    metrics: HashMap<String, Aggregate>,
    start_time: Instant,
    cycles: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_cycles: usize) -> Self {
        Self {
            throttle_cycles: throttle_cycles.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            cycles: 0,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let cycles = self.cycles;
        let mut lines = vec![format!(
            "Loop summary ({cycles} cycles, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, agg) in stages {
            let pct = if elapsed_ms > 0.0 {
                agg.sum / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:10}: avg {:6.1}ms  total {:7.0}ms  ({pct:4.1}%)",
                agg.mean(),
                agg.sum
            ));
        }

        let mut names: Vec<_> = self.metrics.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, agg) in names {
            lines.push(format!("  {name}: avg {:.1}", agg.mean()));
        }

        if cycles > 0 && elapsed_ms > 0.0 {
            let fps = cycles as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timing_for(&self, stage: &str) -> Option<Aggregate> {
        self.timings.get(stage).copied()
    }

    pub fn metric_for(&self, name: &str) -> Option<Aggregate> {
        self.metrics.get(name).copied()
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn cycle(&mut self, completed: usize) {
        self.cycles = completed;
        if completed % self.throttle_cycles == 0 {
            log::info!("Processed {completed} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        match self.timings.get_mut(stage) {
            Some(agg) => agg.add(duration_ms),
            None => {
                let mut agg = Aggregate::default();
                agg.add(duration_ms);
                self.timings.insert(stage.to_string(), agg);
            }
        }
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().add(value);
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.cycle(1);
        logger.timing("detect", 5.0);
        logger.metric("faces", 3.0);
        logger.summary();
    }

    #[test]
    fn test_timing_aggregates_per_stage() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("predict", 5.0);

        let detect = logger.timing_for("detect").unwrap();
        assert_eq!(detect.count, 2);
        assert_relative_eq!(detect.sum, 50.0);
        assert_relative_eq!(detect.mean(), 25.0);
        assert_eq!(logger.timing_for("predict").unwrap().count, 1);
        assert!(logger.timing_for("render").is_none());
    }

    #[test]
    fn test_long_session_keeps_one_aggregate_per_stage() {
        let mut logger = StdoutPipelineLogger::new(1_000);
        for i in 1..=200_000 {
            logger.cycle(i);
            logger.timing("capture", 1.0);
            logger.metric("faces", 2.0);
        }
        assert_eq!(logger.timings.len(), 1);
        assert_eq!(logger.metrics.len(), 1);
        let capture = logger.timing_for("capture").unwrap();
        assert_eq!(capture.count, 200_000);
        assert_relative_eq!(capture.mean(), 1.0);
        assert_relative_eq!(logger.metric_for("faces").unwrap().mean(), 2.0);
    }

    #[test]
    fn test_metric_average_in_summary() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.cycle(2);
        logger.metric("faces", 3.0);
        logger.metric("faces", 4.0);

        assert_relative_eq!(logger.metric_for("faces").unwrap().mean(), 3.5);
        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("faces: avg 3.5"));
    }

    #[test]
    fn test_summary_lists_stages_and_throughput() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.cycle(10);
        logger.timing("detect", 20.0);
        logger.timing("smooth", 1.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Loop summary (10 cycles"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("smooth"));
        assert!(summary.contains("fps"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        let logger = StdoutPipelineLogger::new(10);
        assert!(logger.summary_string().is_none());
    }

    #[test]
    fn test_empty_aggregate_mean_is_zero() {
        assert_eq!(Aggregate::default().mean(), 0.0);
    }

    #[test]
    fn test_cycle_tracks_count() {
        let mut logger = StdoutPipelineLogger::new(10);
        for i in 1..=25 {
            logger.cycle(i);
        }
        assert_eq!(logger.cycles, 25);
    }

    #[test]
    fn test_zero_throttle_is_clamped() {
        let logger = StdoutPipelineLogger::new(0);
        assert_eq!(logger.throttle_cycles, 1);
    }
}
