//! Prometheus counters for runs, agent turns and tool calls.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    runs: IntCounterVec,
    turns: IntCounterVec,
    tool_calls: IntCounterVec,
    iterations: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let runs = IntCounterVec::new(
            Opts::new("fragments_runs_total", "Completed runs by tier and outcome"),
            &["tier", "outcome"],
        )?;
        let turns = IntCounterVec::new(
            Opts::new("fragments_agent_turns_total", "Agent turns executed"),
            &["tier"],
        )?;
        let tool_calls = IntCounterVec::new(
            Opts::new("fragments_tool_calls_total", "Tool invocations by tool and result"),
            &["tool", "success"],
        )?;
        let iterations = HistogramVec::new(
            HistogramOpts::new("fragments_run_iterations", "Agent turns per run")
                .buckets(vec![1.0, 2.0, 4.0, 6.0, 8.0, 10.0, 15.0, 20.0]),
            &["tier"],
        )?;

        registry.register(Box::new(runs.clone()))?;
        registry.register(Box::new(turns.clone()))?;
        registry.register(Box::new(tool_calls.clone()))?;
        registry.register(Box::new(iterations.clone()))?;

        Ok(Self {
            registry,
            runs,
            turns,
            tool_calls,
            iterations,
        })
    }

    pub fn record_run(&self, tier: &str, outcome: &str) {
        self.runs.with_label_values(&[tier, outcome]).inc();
    }

    pub fn record_turn(&self, tier: &str) {
        self.turns.with_label_values(&[tier]).inc();
    }

    pub fn record_tool_call(&self, tool: &str, success: bool) {
        let success = if success { "true" } else { "false" };
        self.tool_calls.with_label_values(&[tool, success]).inc();
    }

    pub fn record_iterations(&self, tier: &str, iterations: usize) {
        self.iterations
            .with_label_values(&[tier])
            .observe(iterations as f64);
    }

    pub fn run_count(&self, tier: &str, outcome: &str) -> u64 {
        self.runs.with_label_values(&[tier, outcome]).get()
    }

    /// Text exposition format for `GET /metrics`.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            tracing::warn!("Failed to encode metrics: {e}");
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
