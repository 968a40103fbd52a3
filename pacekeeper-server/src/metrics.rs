//! Simple metrics collection for observability
//!
//! This module provides lightweight metrics collection using atomic counters
//! and exports them in Prometheus text format at `/metrics`.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::actor::ActorError;

/// Core metrics collected by the server
pub struct Metrics {
    /// Server start time
    start_time: Instant,

    /// HTTP requests handled, and those answered with a 5xx
    pub http_requests: AtomicU64,
    pub http_errors: AtomicU64,

    /// Request latency buckets
    pub latency_under_1ms: AtomicU64,
    pub latency_under_10ms: AtomicU64,
    pub latency_under_100ms: AtomicU64,
    pub latency_under_1s: AtomicU64,
    pub latency_over_1s: AtomicU64,
    pub latency_sum_micros: AtomicU64,

    /// Limiter decisions
    pub admissions_consuming: AtomicU64,
    pub admissions_peek: AtomicU64,
    pub admissions_delayed: AtomicU64,
    pub admission_wait_ms_total: AtomicU64,

    /// Session traffic
    pub session_messages: AtomicU64,
    pub session_messages_limited: AtomicU64,
    pub websocket_connections: AtomicUsize,

    /// Failures
    pub actor_init_failures: AtomicU64,
    pub limiter_client_failures: AtomicU64,

    /// Live actors, refreshed on export
    pub active_limiters: AtomicUsize,
    pub active_counters: AtomicUsize,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            http_requests: AtomicU64::new(0),
            http_errors: AtomicU64::new(0),
            latency_under_1ms: AtomicU64::new(0),
            latency_under_10ms: AtomicU64::new(0),
            latency_under_100ms: AtomicU64::new(0),
            latency_under_1s: AtomicU64::new(0),
            latency_over_1s: AtomicU64::new(0),
            latency_sum_micros: AtomicU64::new(0),
            admissions_consuming: AtomicU64::new(0),
            admissions_peek: AtomicU64::new(0),
            admissions_delayed: AtomicU64::new(0),
            admission_wait_ms_total: AtomicU64::new(0),
            session_messages: AtomicU64::new(0),
            session_messages_limited: AtomicU64::new(0),
            websocket_connections: AtomicUsize::new(0),
            actor_init_failures: AtomicU64::new(0),
            limiter_client_failures: AtomicU64::new(0),
            active_limiters: AtomicUsize::new(0),
            active_counters: AtomicUsize::new(0),
        }
    }

    /// Record an HTTP request and its latency
    pub fn record_http(&self, latency: Duration, server_error: bool) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
        if server_error {
            self.http_errors.fetch_add(1, Ordering::Relaxed);
        }

        let latency_us = latency.as_micros() as u64;
        match latency_us {
            0..=999 => self.latency_under_1ms.fetch_add(1, Ordering::Relaxed),
            1000..=9999 => self.latency_under_10ms.fetch_add(1, Ordering::Relaxed),
            10000..=99999 => self.latency_under_100ms.fetch_add(1, Ordering::Relaxed),
            100000..=999999 => self.latency_under_1s.fetch_add(1, Ordering::Relaxed),
            _ => self.latency_over_1s.fetch_add(1, Ordering::Relaxed),
        };
        self.latency_sum_micros
            .fetch_add(latency_us, Ordering::Relaxed);
    }

    /// Record a limiter decision
    pub fn record_admission(&self, mutating: bool, wait: Duration) {
        if mutating {
            self.admissions_consuming.fetch_add(1, Ordering::Relaxed);
        } else {
            self.admissions_peek.fetch_add(1, Ordering::Relaxed);
        }
        if !wait.is_zero() {
            self.admissions_delayed.fetch_add(1, Ordering::Relaxed);
            self.admission_wait_ms_total
                .fetch_add(wait.as_millis() as u64, Ordering::Relaxed);
        }
    }

    /// Record a session message and whether the local limiter turned it away
    pub fn record_session_message(&self, limited: bool) {
        self.session_messages.fetch_add(1, Ordering::Relaxed);
        if limited {
            self.session_messages_limited
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an actor failure surfaced to a caller
    pub fn record_actor_error(&self, error: &ActorError) {
        if matches!(error, ActorError::Initialization(_)) {
            self.actor_init_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a wait cycle that failed even after refreshing its stub
    pub fn record_limiter_client_failure(&self) {
        self.limiter_client_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_opened(&self) {
        self.websocket_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.websocket_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Update live actor gauges
    pub fn update_active_actors(&self, limiters: usize, counters: usize) {
        self.active_limiters.store(limiters, Ordering::Relaxed);
        self.active_counters.store(counters, Ordering::Relaxed);
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        write_metric(
            &mut output,
            "pacekeeper_uptime_seconds",
            "gauge",
            "Time since server start in seconds",
            self.uptime_seconds(),
        );
        write_metric(
            &mut output,
            "pacekeeper_http_requests_total",
            "counter",
            "Total number of HTTP requests processed",
            load(&self.http_requests),
        );
        write_metric(
            &mut output,
            "pacekeeper_http_errors_total",
            "counter",
            "HTTP requests answered with a server error",
            load(&self.http_errors),
        );

        // Latency distribution
        let under_1ms = load(&self.latency_under_1ms);
        let under_10ms = under_1ms + load(&self.latency_under_10ms);
        let under_100ms = under_10ms + load(&self.latency_under_100ms);
        let under_1s = under_100ms + load(&self.latency_under_1s);
        let total = under_1s + load(&self.latency_over_1s);
        output.push_str("# HELP pacekeeper_request_duration_seconds Request latency distribution\n");
        output.push_str("# TYPE pacekeeper_request_duration_seconds histogram\n");
        for (le, count) in [
            ("0.001", under_1ms),
            ("0.01", under_10ms),
            ("0.1", under_100ms),
            ("1", under_1s),
            ("+Inf", total),
        ] {
            let _ = writeln!(
                output,
                "pacekeeper_request_duration_seconds_bucket{{le=\"{le}\"}} {count}"
            );
        }
        let latency_sum_seconds = load(&self.latency_sum_micros) as f64 / 1_000_000.0;
        let _ = writeln!(
            output,
            "pacekeeper_request_duration_seconds_sum {latency_sum_seconds:.6}"
        );
        let _ = writeln!(output, "pacekeeper_request_duration_seconds_count {total}\n");

        // Limiter decisions
        output.push_str("# HELP pacekeeper_admissions_total Limiter admission checks by kind\n");
        output.push_str("# TYPE pacekeeper_admissions_total counter\n");
        let _ = writeln!(
            output,
            "pacekeeper_admissions_total{{kind=\"consuming\"}} {}",
            load(&self.admissions_consuming)
        );
        let _ = writeln!(
            output,
            "pacekeeper_admissions_total{{kind=\"peek\"}} {}\n",
            load(&self.admissions_peek)
        );
        write_metric(
            &mut output,
            "pacekeeper_admissions_delayed_total",
            "counter",
            "Admission checks answered with a non-zero wait",
            load(&self.admissions_delayed),
        );
        write_metric(
            &mut output,
            "pacekeeper_admission_wait_milliseconds_total",
            "counter",
            "Sum of waits handed out by limiters",
            load(&self.admission_wait_ms_total),
        );

        // Sessions
        write_metric(
            &mut output,
            "pacekeeper_session_messages_total",
            "counter",
            "WebSocket session messages received",
            load(&self.session_messages),
        );
        write_metric(
            &mut output,
            "pacekeeper_session_messages_limited_total",
            "counter",
            "WebSocket session messages turned away by the local limiter",
            load(&self.session_messages_limited),
        );
        write_metric(
            &mut output,
            "pacekeeper_websocket_connections_active",
            "gauge",
            "Open WebSocket sessions",
            self.websocket_connections.load(Ordering::Relaxed) as u64,
        );

        // Failures
        write_metric(
            &mut output,
            "pacekeeper_actor_init_failures_total",
            "counter",
            "Requests answered with an actor initialization failure",
            load(&self.actor_init_failures),
        );
        write_metric(
            &mut output,
            "pacekeeper_limiter_client_failures_total",
            "counter",
            "Wait cycles that failed after refreshing their limiter handle",
            load(&self.limiter_client_failures),
        );

        // Actors
        output.push_str("# HELP pacekeeper_actors_active Live actors by kind\n");
        output.push_str("# TYPE pacekeeper_actors_active gauge\n");
        let _ = writeln!(
            output,
            "pacekeeper_actors_active{{kind=\"limiter\"}} {}",
            self.active_limiters.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            output,
            "pacekeeper_actors_active{{kind=\"counter\"}} {}",
            self.active_counters.load(Ordering::Relaxed)
        );

        output
    }
}

fn write_metric(output: &mut String, name: &str, kind: &str, help: &str, value: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {kind}");
    let _ = writeln!(output, "{name} {value}\n");
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
