//! Decode — explicit field-by-field construction of an [`HttpLog`].

use chrono::NaiveDateTime;

use super::grammar::{self, FieldMap};
use super::model::{DecodeError, Elapsed, HttpLog, HttpRequest, SslInfo};

/// HAProxy accept date, e.g. `29/May/2015:10:36:47.766`.
pub const ACCEPT_DATE_FORMAT: &str = "%d/%b/%Y:%H:%M:%S%.3f";

/// Separator HAProxy places between captured headers.
pub const HEADER_SEPARATOR: char = '|';

/// Parse one raw line into an [`HttpLog`].
///
/// * `Ok(None)`: the line is not an HTTP log line (routine skip).
/// * `Err(_)`: the line matched but a required segment was malformed.
pub fn parse_http(line: &str) -> Result<Option<HttpLog>, DecodeError> {
    match grammar::match_line(line) {
        Some(fields) => decode(&fields).map(Some),
        None => Ok(None),
    }
}

/// Build an [`HttpLog`] from a matched capture map.
pub fn decode(fields: &FieldMap<'_>) -> Result<HttpLog, DecodeError> {
    let request = decode_request(required(fields, "http_request")?)?;
    let (total_time, total_time_partial) = decode_total_time(required(fields, "tt")?);

    Ok(HttpLog {
        client_ip: required(fields, "client_ip")?.to_string(),
        client_port: parse_int(fields, "client_port")?,
        accept_date: fields.get("accept_date").and_then(decode_accept_date),
        frontend_name: required(fields, "frontend_name")?.to_string(),
        backend_name: required(fields, "backend_name")?.to_string(),
        server_name: required(fields, "server_name")?.to_string(),

        request_time: decode_elapsed(fields, "tq")?,
        queue_time: decode_elapsed(fields, "tw")?,
        connect_time: decode_elapsed(fields, "tc")?,
        response_time: decode_elapsed(fields, "tr")?,
        total_time,
        total_time_partial,

        status_code: parse_int(fields, "status_code")?,
        bytes_read: parse_int(fields, "bytes_read")?,
        captured_request_cookie: required(fields, "captured_request_cookie")?.to_string(),
        captured_response_cookie: required(fields, "captured_response_cookie")?.to_string(),
        termination_state: required(fields, "termination_state")?.to_string(),

        actconn: parse_int(fields, "actconn")?,
        feconn: parse_int(fields, "feconn")?,
        beconn: parse_int(fields, "beconn")?,
        srv_conn: parse_int(fields, "srv_conn")?,
        // A leading '+' marks a redispatch; the count is the same.
        retries: saturating_int(required(fields, "retries")?.trim_start_matches('+')),
        srv_queue: parse_int(fields, "srv_queue")?,
        backend_queue: parse_int(fields, "backend_queue")?,

        captured_request_headers: fields.get("captured_request_headers").map(split_headers),
        captured_response_headers: fields.get("captured_response_headers").map(split_headers),

        request,
        ssl: decode_ssl(fields),
    })
}

fn required<'t>(fields: &FieldMap<'t>, name: &'static str) -> Result<&'t str, DecodeError> {
    fields.get(name).ok_or(DecodeError::MissingField(name))
}

fn parse_int(fields: &FieldMap<'_>, name: &'static str) -> Result<i64, DecodeError> {
    required(fields, name).map(saturating_int)
}

/// The grammar only captures ASCII digits or `-1`, so the only failure
/// left is overflow, which clamps to the nearest bound.
fn saturating_int(value: &str) -> i64 {
    value.parse().unwrap_or(if value.starts_with('-') { i64::MIN } else { i64::MAX })
}

fn decode_elapsed(fields: &FieldMap<'_>, name: &'static str) -> Result<Elapsed, DecodeError> {
    parse_int(fields, name).map(Elapsed::new)
}

/// Tt may carry a '+' when HAProxy logged before the session ended.
fn decode_total_time(raw: &str) -> (Elapsed, bool) {
    match raw.strip_prefix('+') {
        Some(digits) => (Elapsed::new(saturating_int(digits)), true),
        None => (Elapsed::new(saturating_int(raw)), false),
    }
}

/// Soft field: an unparseable date leaves the record without one.
fn decode_accept_date(raw: &str) -> Option<NaiveDateTime> {
    match NaiveDateTime::parse_from_str(raw, ACCEPT_DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            tracing::debug!(accept_date = raw, error = %e, "Unparseable accept date");
            None
        }
    }
}

/// Split `METHOD TARGET VERSION`; anything else rejects the record.
fn decode_request(raw: &str) -> Result<HttpRequest, DecodeError> {
    let mut parts = raw.split_ascii_whitespace();
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(version), None) => Ok(HttpRequest {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_string(),
        }),
        _ => Err(DecodeError::MalformedRequest(raw.to_string())),
    }
}

fn split_headers(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(HEADER_SEPARATOR).map(str::to_string).collect()
}

fn decode_ssl(fields: &FieldMap<'_>) -> Option<SslInfo> {
    match (fields.get("ssl_cipher"), fields.get("ssl_version")) {
        (Some(cipher), Some(version)) => Some(SslInfo {
            cipher: cipher.to_string(),
            version: version.to_string(),
        }),
        _ => None,
    }
}
