//! Metrics definitions for the gateway.

use shared::metrics_defs::{MetricDef, MetricType};

pub const UPSTREAM_REQUESTS: MetricDef = MetricDef {
    name: "upstream.requests",
    metric_type: MetricType::Counter,
    description: "Number of requests sent to the upstream API",
};

pub const UPSTREAM_FAILURES: MetricDef = MetricDef {
    name: "upstream.failures",
    metric_type: MetricType::Counter,
    description: "Number of upstream requests that failed or were rejected",
};

pub const ACCUMULATION_UPSTREAM_CALLS: MetricDef = MetricDef {
    name: "accumulation.upstream_calls",
    metric_type: MetricType::Histogram,
    description: "Number of upstream calls needed to accumulate one request",
};

pub const ACCUMULATION_RECORDS: MetricDef = MetricDef {
    name: "accumulation.records",
    metric_type: MetricType::Histogram,
    description: "Number of distinct repositories accumulated for one request",
};

pub const LOGIN_FAILURES: MetricDef = MetricDef {
    name: "login.failures",
    metric_type: MetricType::Counter,
    description: "Number of rejected login attempts",
};

pub const ALL_METRICS: &[MetricDef] = &[
    UPSTREAM_REQUESTS,
    UPSTREAM_FAILURES,
    ACCUMULATION_UPSTREAM_CALLS,
    ACCUMULATION_RECORDS,
    LOGIN_FAILURES,
];
