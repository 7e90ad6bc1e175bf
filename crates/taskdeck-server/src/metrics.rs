//! Request metrics.
//!
//! `Metrics` is built once in `main` and handed to both the middleware and
//! the `/metrics` handlers, so tests can stand up a fresh registry per router.
//! Each metric family sits behind its own short-lived lock; a scrape can see
//! the request counter and the in-flight gauge out of step by a request or two.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use serde::Serialize;

/// Upper bounds, in seconds, of the latency histogram buckets.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

const REQUESTS_TOTAL: &str = "http_requests_total";
const REQUEST_DURATION: &str = "http_request_duration_seconds";
const ERRORS_TOTAL: &str = "http_errors_total";
const ACTIVE_REQUESTS: &str = "http_active_requests";
const UPTIME: &str = "process_uptime_seconds";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestLabels {
    pub method: String,
    pub path: String,
    pub status: u16,
}

impl RequestLabels {
    pub fn new(method: impl Into<String>, path: impl Into<String>, status: u16) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            status,
        }
    }

    fn as_map(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("method", self.method.clone()),
            ("path", self.path.clone()),
            ("status", self.status.to_string()),
        ])
    }

    fn render(&self) -> String {
        format!(
            "method=\"{}\",path=\"{}\",status=\"{}\"",
            escape_label(&self.method),
            escape_label(&self.path),
            self.status
        )
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[derive(Debug, Clone, Default)]
struct HistogramValue {
    /// Per-bucket (non-cumulative) counts, parallel to `LATENCY_BUCKETS`.
    buckets: Vec<u64>,
    sum: f64,
    count: u64,
}

impl HistogramValue {
    fn observe(&mut self, seconds: f64) {
        if self.buckets.is_empty() {
            self.buckets = vec![0; LATENCY_BUCKETS.len()];
        }
        if let Some(i) = LATENCY_BUCKETS.iter().position(|b| seconds <= *b) {
            self.buckets[i] += 1;
        }
        self.sum += seconds;
        self.count += 1;
    }

    /// `(upper bound, cumulative count)` pairs, ending before `+Inf`.
    fn cumulative(&self) -> impl Iterator<Item = (f64, u64)> + '_ {
        LATENCY_BUCKETS
            .iter()
            .zip(self.buckets.iter().chain(std::iter::repeat(&0)))
            .scan(0u64, |acc, (bound, n)| {
                *acc += n;
                Some((*bound, *acc))
            })
    }
}

struct Family<V> {
    name: &'static str,
    help: &'static str,
    values: Mutex<BTreeMap<RequestLabels, V>>,
}

impl<V: Default> Family<V> {
    fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            values: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<RequestLabels, V>> {
        // A panic mid-increment leaves a usable map behind.
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with<R>(&self, labels: &RequestLabels, f: impl FnOnce(&mut V) -> R) -> R {
        let mut values = self.lock();
        f(values.entry(labels.clone()).or_default())
    }
}

/// Process-wide request metrics.
pub struct Metrics {
    started: Instant,
    requests: Family<u64>,
    latency: Family<HistogramValue>,
    errors: Family<u64>,
    in_flight: AtomicI64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            requests: Family::new(REQUESTS_TOTAL, "Total number of HTTP requests"),
            latency: Family::new(REQUEST_DURATION, "HTTP request latency in seconds"),
            errors: Family::new(ERRORS_TOTAL, "Total number of HTTP errors"),
            in_flight: AtomicI64::new(0),
        }
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Mark a request as in flight until the returned guard is dropped.
    pub fn track_in_flight(&self) -> InFlightGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard { metrics: self }
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Record one completed request.
    pub fn observe(&self, labels: &RequestLabels, elapsed: Duration) {
        self.requests.with(labels, |n| *n += 1);
        self.latency
            .with(labels, |h| h.observe(elapsed.as_secs_f64()));
        if labels.status >= 400 {
            self.errors.with(labels, |n| *n += 1);
        }
    }

    pub fn request_count(&self, labels: &RequestLabels) -> u64 {
        self.requests.lock().get(labels).copied().unwrap_or(0)
    }

    pub fn error_count(&self, labels: &RequestLabels) -> u64 {
        self.errors.lock().get(labels).copied().unwrap_or(0)
    }

    /// Requests for `method path` summed over every status code.
    pub fn requests_for(&self, method: &str, path: &str) -> u64 {
        self.requests
            .lock()
            .iter()
            .filter(|(l, _)| l.method == method && l.path == path)
            .map(|(_, n)| *n)
            .sum()
    }

    /// Prometheus text exposition format, version 0.0.4.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();

        render_counter(&mut out, &self.requests);

        let _ = writeln!(out, "# HELP {} {}", self.latency.name, self.latency.help);
        let _ = writeln!(out, "# TYPE {} histogram", self.latency.name);
        for (labels, h) in self.latency.lock().iter() {
            let rendered = labels.render();
            for (bound, n) in h.cumulative() {
                let _ = writeln!(
                    out,
                    "{}_bucket{{{rendered},le=\"{bound}\"}} {n}",
                    self.latency.name
                );
            }
            let _ = writeln!(
                out,
                "{}_bucket{{{rendered},le=\"+Inf\"}} {}",
                self.latency.name, h.count
            );
            let _ = writeln!(out, "{}_sum{{{rendered}}} {}", self.latency.name, h.sum);
            let _ = writeln!(out, "{}_count{{{rendered}}} {}", self.latency.name, h.count);
        }

        render_counter(&mut out, &self.errors);

        let _ = writeln!(out, "# HELP {ACTIVE_REQUESTS} Number of active HTTP requests");
        let _ = writeln!(out, "# TYPE {ACTIVE_REQUESTS} gauge");
        let _ = writeln!(out, "{ACTIVE_REQUESTS} {}", self.in_flight());

        let _ = writeln!(out, "# HELP {UPTIME} Seconds since the server started");
        let _ = writeln!(out, "# TYPE {UPTIME} gauge");
        let _ = writeln!(out, "{UPTIME} {}", self.uptime_seconds());

        out
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut metrics = BTreeMap::new();

        for family in [&self.requests, &self.errors] {
            let values = family
                .lock()
                .iter()
                .map(|(labels, n)| Sample::Value {
                    labels: labels.as_map(),
                    value: *n as f64,
                })
                .collect();
            metrics.insert(
                family.name,
                FamilySnapshot {
                    name: family.name,
                    description: family.help,
                    kind: "counter",
                    values,
                },
            );
        }

        let values = self
            .latency
            .lock()
            .iter()
            .map(|(labels, h)| Sample::Histogram {
                labels: labels.as_map(),
                count: h.count,
                sum: h.sum,
                buckets: h
                    .cumulative()
                    .map(|(bound, n)| (bound.to_string(), n))
                    .collect(),
            })
            .collect();
        metrics.insert(
            REQUEST_DURATION,
            FamilySnapshot {
                name: REQUEST_DURATION,
                description: self.latency.help,
                kind: "histogram",
                values,
            },
        );

        metrics.insert(
            ACTIVE_REQUESTS,
            FamilySnapshot {
                name: ACTIVE_REQUESTS,
                description: "Number of active HTTP requests",
                kind: "gauge",
                values: vec![Sample::Value {
                    labels: BTreeMap::new(),
                    value: self.in_flight() as f64,
                }],
            },
        );

        MetricsSnapshot {
            uptime_seconds: self.uptime_seconds(),
            metrics,
        }
    }
}

fn render_counter(out: &mut String, family: &Family<u64>) {
    let _ = writeln!(out, "# HELP {} {}", family.name, family.help);
    let _ = writeln!(out, "# TYPE {} counter", family.name);
    for (labels, n) in family.lock().iter() {
        let _ = writeln!(out, "{}{{{}}} {n}", family.name, labels.render());
    }
}

/// Decrements the in-flight gauge on drop, whether the request finished,
/// failed or was cancelled.
pub struct InFlightGuard<'a> {
    metrics: &'a Metrics,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.metrics.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: f64,
    pub metrics: BTreeMap<&'static str, FamilySnapshot>,
}

#[derive(Debug, Serialize)]
pub struct FamilySnapshot {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub values: Vec<Sample>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Sample {
    Value {
        labels: BTreeMap<&'static str, String>,
        value: f64,
    },
    Histogram {
        labels: BTreeMap<&'static str, String>,
        count: u64,
        sum: f64,
        buckets: BTreeMap<String, u64>,
    },
}

/// `path` label for requests no route matched.
pub const UNMATCHED_PATH: &str = "unmatched";

/// `method` label for anything outside the standard verbs.
const OTHER_METHOD: &str = "OTHER";

fn method_label(method: &Method) -> &'static str {
    const KNOWN: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];
    KNOWN
        .iter()
        .copied()
        .find(|m| *m == method.as_str())
        .unwrap_or(OTHER_METHOD)
}

/// Axum middleware recording every request in `metrics`.
///
/// The `path` label is the matched route template (`/api/tasks/{id}`), or
/// `UNMATCHED_PATH`. Client-chosen text never becomes a label value.
pub async fn track_requests(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = method_label(request.method());
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED_PATH, |p| p.as_str())
        .to_owned();

    let _in_flight = metrics.track_in_flight();
    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    let labels = RequestLabels::new(method, path, response.status().as_u16());
    tracing::debug!(
        method = %labels.method,
        path = %labels.path,
        status = labels.status,
        elapsed_ms = elapsed.as_millis() as u64,
        "request finished"
    );
    metrics.observe(&labels, elapsed);
    response
}
