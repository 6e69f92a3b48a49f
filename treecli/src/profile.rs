//! Span-based profiling for `--profile`.
//!
//! While a [`Profiler`] scope is active every closed `tracing` span is
//! accounted under its label: the span name, suffixed with its `name` field
//! when it has one (`command:build`). Self time is the span's busy time minus
//! the busy time of the spans entered inside it.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::config::OutputFormat;
use crate::logging;

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    calls: u64,
    cumulative: Duration,
    own: Duration,
}

type Table = Arc<Mutex<HashMap<String, Totals>>>;

struct SpanTiming {
    label: String,
    entered_at: Option<Instant>,
    busy: Duration,
    children: Duration,
}

#[derive(Default)]
struct NameField(Option<String>);

impl Visit for NameField {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "name" {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "name" {
            self.0 = Some(format!("{:?}", value));
        }
    }
}

/// Layer feeding span timings into a shared table.
pub struct ProfileLayer {
    table: Table,
}

impl<S> Layer<S> for ProfileLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut name = NameField::default();
        attrs.record(&mut name);
        let label = match name.0 {
            Some(n) => format!("{}:{}", attrs.metadata().name(), n),
            None => attrs.metadata().name().to_string(),
        };
        span.extensions_mut().insert(SpanTiming {
            label,
            entered_at: None,
            busy: Duration::ZERO,
            children: Duration::ZERO,
        });
    }

    fn on_enter(&self, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut ext = span.extensions_mut();
        if let Some(timing) = ext.get_mut::<SpanTiming>() {
            timing.entered_at = Some(Instant::now());
        }
    }

    fn on_exit(&self, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let elapsed = {
            let mut ext = span.extensions_mut();
            let Some(timing) = ext.get_mut::<SpanTiming>() else { return };
            let Some(start) = timing.entered_at.take() else { return };
            let elapsed = start.elapsed();
            timing.busy += elapsed;
            elapsed
        };
        let Some(parent) = span.parent() else { return };
        let mut ext = parent.extensions_mut();
        if let Some(timing) = ext.get_mut::<SpanTiming>() {
            timing.children += elapsed;
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else { return };
        let Some(timing) = span.extensions_mut().remove::<SpanTiming>() else { return };
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let totals = table.entry(timing.label).or_default();
        totals.calls += 1;
        totals.cumulative += timing.busy;
        totals.own += timing.busy.saturating_sub(timing.children);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileEntry {
    pub name: String,
    pub calls: u64,
    pub self_secs: f64,
    pub cumulative_secs: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileReport {
    pub started_at: DateTime<Local>,
    pub total_secs: f64,
    pub entries: Vec<ProfileEntry>,
}

impl ProfileReport {
    pub fn total_calls(&self) -> u64 {
        self.entries.iter().map(|e| e.calls).sum()
    }

    /// Render the report, ordered by self time then cumulative time.
    ///
    /// # Errors
    ///
    /// Fails only if JSON serialization fails.
    pub fn render(&self, format: OutputFormat) -> anyhow::Result<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            OutputFormat::Human => Ok(self.render_table()),
        }
    }

    fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "         {} span calls in {:.3} seconds",
            self.total_calls(),
            self.total_secs
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "   Ordered by: self time, cumulative time");
        let _ = writeln!(out);
        let _ = writeln!(out, "{:>9} {:>10} {:>10}  span", "ncalls", "tottime", "cumtime");
        for entry in &self.entries {
            let _ = writeln!(
                out,
                "{:>9} {:>10.6} {:>10.6}  {}",
                entry.calls, entry.self_secs, entry.cumulative_secs, entry.name
            );
        }
        out
    }
}

/// Collects span timings for the duration of one scope.
pub struct Profiler {
    table: Table,
    started_at: DateTime<Local>,
    total: Duration,
}

impl Profiler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Arc::default(),
            started_at: Local::now(),
            total: Duration::ZERO,
        }
    }

    /// A layer writing into this profiler's table.
    #[must_use]
    pub fn layer(&self) -> ProfileLayer {
        ProfileLayer {
            table: Arc::clone(&self.table),
        }
    }

    /// Run `f` with a scoped subscriber that profiles spans and keeps logging
    /// to stderr at `verbosity`.
    pub fn scope<T>(&mut self, verbosity: u8, f: impl FnOnce() -> T) -> T {
        let subscriber = tracing_subscriber::registry()
            .with(logging::fmt_layer(verbosity))
            .with(self.layer());
        self.started_at = Local::now();
        let start = Instant::now();
        let result = tracing::subscriber::with_default(subscriber, || {
            let _root = tracing::info_span!("dispatch").entered();
            f()
        });
        self.total += start.elapsed();
        result
    }

    pub fn report(&self) -> ProfileReport {
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<ProfileEntry> = table
            .iter()
            .map(|(name, totals)| ProfileEntry {
                name: name.clone(),
                calls: totals.calls,
                self_secs: totals.own.as_secs_f64(),
                cumulative_secs: totals.cumulative.as_secs_f64(),
            })
            .collect();
        entries.sort_by(|a, b| {
            b.self_secs
                .total_cmp(&a.self_secs)
                .then_with(|| b.cumulative_secs.total_cmp(&a.cumulative_secs))
                .then_with(|| a.name.cmp(&b.name))
        });
        ProfileReport {
            started_at: self.started_at,
            total_secs: self.total.as_secs_f64(),
            entries,
        }
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn entry<'a>(report: &'a ProfileReport, name: &str) -> &'a ProfileEntry {
        report
            .entries
            .iter()
            .find(|e| e.name == name)
            .unwrap_or_else(|| panic!("no entry for {}", name))
    }

    #[test]
    fn test_scope_records_named_spans() {
        let mut profiler = Profiler::new();
        let value = profiler.scope(0, || {
            let _span = tracing::info_span!("command", name = "build").entered();
            42
        });
        assert_eq!(value, 42);
        let report = profiler.report();
        assert_eq!(entry(&report, "command:build").calls, 1);
        assert_eq!(entry(&report, "dispatch").calls, 1);
    }

    #[test]
    fn test_self_time_excludes_children() {
        let mut profiler = Profiler::new();
        profiler.scope(0, || {
            let _outer = tracing::info_span!("outer").entered();
            let _inner = tracing::info_span!("inner").entered();
            sleep(Duration::from_millis(20));
        });
        let report = profiler.report();
        let outer = entry(&report, "outer");
        let inner = entry(&report, "inner");
        assert!(inner.self_secs >= 0.015);
        assert!(outer.cumulative_secs >= inner.cumulative_secs);
        assert!(outer.self_secs < inner.self_secs);
    }

    #[test]
    fn test_report_sorted_by_self_time_descending() {
        let mut profiler = Profiler::new();
        profiler.scope(0, || {
            {
                let _fast = tracing::info_span!("fast").entered();
            }
            let _slow = tracing::info_span!("slow").entered();
            sleep(Duration::from_millis(10));
        });
        let report = profiler.report();
        assert_eq!(report.entries[0].name, "slow");
        let selfs: Vec<f64> = report.entries.iter().map(|e| e.self_secs).collect();
        assert!(selfs.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_repeated_span_counts_calls() {
        let mut profiler = Profiler::new();
        profiler.scope(0, || {
            for _ in 0..3 {
                let _span = tracing::info_span!("step").entered();
            }
        });
        assert_eq!(entry(&profiler.report(), "step").calls, 3);
    }

    #[test]
    fn test_render_human_table() {
        let mut profiler = Profiler::new();
        profiler.scope(0, || {
            let _span = tracing::info_span!("command", name = "build").entered();
        });
        let text = profiler.report().render(OutputFormat::Human).unwrap();
        assert!(text.contains("Ordered by: self time"));
        assert!(text.contains("ncalls"));
        assert!(text.contains("command:build"));
    }

    #[test]
    fn test_render_json() {
        let mut profiler = Profiler::new();
        profiler.scope(0, || {
            let _span = tracing::info_span!("command", name = "build").entered();
        });
        let text = profiler.report().render(OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(value["total_secs"].is_number());
        let names: Vec<&str> = value["entries"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| e["name"].as_str())
            .collect();
        assert!(names.contains(&"command:build"));
    }

    #[test]
    fn test_empty_report_without_scope() {
        let report = Profiler::new().report();
        assert!(report.entries.is_empty());
        assert_eq!(report.total_calls(), 0);
    }
}
