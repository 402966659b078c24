//! Key — pure conversion of an `HttpLog` into named metric emissions.

use crate::parser::{Elapsed, HttpLog};

/// Endpoint token used when the request path has no first segment.
pub const ROOT_ENDPOINT: &str = "_root_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    /// Milliseconds, or a sampled gauge-like value to be averaged
    Timer,
}

/// One observation for the metrics backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub name: String,
    pub value: i64,
    pub kind: MetricKind,
}

impl Emission {
    fn counter(name: String, value: i64) -> Self {
        Self { name, value, kind: MetricKind::Counter }
    }

    fn timer(name: String, value: i64) -> Self {
        Self { name, value, kind: MetricKind::Timer }
    }
}

/// Make an identifier safe to use as one segment of a dotted metric name.
///
/// `.` becomes `_`, `~` is dropped (HAProxy appends it to SSL frontends),
/// `<` and `>` become `-` (`<NOSRV>`, `<BADREQ>`).
pub fn sanitize(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        match c {
            '.' => out.push('_'),
            '~' => {}
            '<' | '>' => out.push('-'),
            _ => out.push(c),
        }
    }
    out
}

/// [`sanitize`], then lower-case. Used for server names and endpoints.
pub fn sanitize_lower(token: &str) -> String {
    sanitize(token).to_lowercase()
}

/// First path segment as a metric token, or [`ROOT_ENDPOINT`].
///
/// Only the leading run of word characters (`[A-Za-z0-9_]`) after the
/// first `/` counts, so `/api-v2/x` maps to `api`.
pub fn endpoint_key(path: &str) -> String {
    let segment = path
        .strip_prefix('/')
        .map(|rest| {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            &rest[..end]
        })
        .unwrap_or("");

    if segment.is_empty() {
        ROOT_ENDPOINT.to_string()
    } else {
        sanitize_lower(segment)
    }
}

/// `<frontend>.<backend>.<server>` prefix for per-request metrics.
pub fn request_prefix(log: &HttpLog) -> String {
    format!(
        "{}.{}.{}",
        sanitize(&log.frontend_name),
        sanitize(&log.backend_name),
        sanitize_lower(&log.server_name)
    )
}

/// The full catalogue of emissions for one record.
///
/// Timers whose source duration is the `-1` sentinel are left out.
pub fn emissions(log: &HttpLog) -> Vec<Emission> {
    let prefix = request_prefix(log);
    let backend = format!("backend.{}", sanitize(&log.backend_name));
    let mut out = Vec::with_capacity(24);

    // Traffic
    out.push(Emission::counter(format!("{}.bytes_read", prefix), log.bytes_read));
    out.push(Emission::counter(format!("{}.hits", prefix), 1));
    out.push(Emission::counter(format!("{}.http_status.{}", prefix, log.status_code), 1));

    // Request phase timers
    let timers: [(&str, Elapsed); 5] = [
        ("total", log.total_time),
        ("queue", log.queue_time),
        ("connect", log.connect_time),
        ("response", log.response_time),
        ("request", log.request_time),
    ];
    for (phase, elapsed) in timers {
        push_elapsed(&mut out, format!("{}.time.{}", prefix, phase), elapsed);
    }

    // Connection and queue samples, averaged by the backend
    let samples: [(&str, i64); 7] = [
        ("retries", log.retries),
        ("conn.active", log.actconn),
        ("conn.frontend", log.feconn),
        ("conn.backend", log.beconn),
        ("conn.server", log.srv_conn),
        ("queue.server", log.srv_queue),
        ("queue.backend", log.backend_queue),
    ];
    for (name, value) in samples {
        out.push(Emission::timer(format!("{}.{}", prefix, name), value));
    }

    // Backend-wide timers
    push_elapsed(&mut out, format!("{}.time.connect", backend), log.connect_time);
    push_elapsed(&mut out, format!("{}.time.response", backend), log.response_time);
    push_elapsed(&mut out, format!("{}.time.queue", backend), log.queue_time);

    // Endpoint
    push_elapsed(
        &mut out,
        format!(
            "{}.endpoint.{}.{}",
            prefix,
            endpoint_key(log.request.path()),
            sanitize(&log.request.method)
        ),
        log.total_time,
    );

    // SSL usage
    if let Some(ssl) = &log.ssl {
        out.push(Emission::counter(
            format!(
                "{}.ssl.{}.{}",
                sanitize(&log.frontend_name),
                sanitize(&ssl.version),
                sanitize(&ssl.cipher)
            ),
            1,
        ));
    }

    out
}

fn push_elapsed(out: &mut Vec<Emission>, name: String, elapsed: Elapsed) {
    if let Some(millis) = elapsed.measured() {
        out.push(Emission::timer(name, millis as i64));
    }
}
