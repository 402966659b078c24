use chrono::NaiveDateTime;
use thiserror::Error;

/// A duration field as HAProxy logs it, in milliseconds.
///
/// HAProxy writes `-1` when a phase was never reached (for example the
/// connect time of a request aborted while queued). That value is kept as
/// is so the record mirrors the log line, but it can only be read as a real
/// duration through [`Elapsed::measured`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed(i64);

impl Elapsed {
    pub const UNAVAILABLE: Elapsed = Elapsed(-1);

    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    /// The duration in milliseconds, or `None` for the sentinel.
    pub fn measured(&self) -> Option<u64> {
        u64::try_from(self.0).ok()
    }
}

/// The quoted request line of an HTTP log, e.g. `POST /path?q=1 HTTP/1.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    /// Request target as logged (path, query and fragment).
    pub target: String,
    pub version: String,
}

impl HttpRequest {
    /// Path component of the target, without query string or fragment.
    ///
    /// Absolute-form targets (`http://host/path`) have their scheme and
    /// authority skipped; an absolute target with no path yields `/`.
    pub fn path(&self) -> &str {
        let target = match self.target.find("://") {
            Some(idx) => {
                let after_scheme = &self.target[idx + 3..];
                match after_scheme.find('/') {
                    Some(slash) => &after_scheme[slash..],
                    None => return "/",
                }
            }
            None => self.target.as_str(),
        };

        let end = target.find(|c: char| c == '?' || c == '#').unwrap_or(target.len());
        &target[..end]
    }
}

/// Negotiated TLS parameters from the trailing `%sslc/%sslv` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SslInfo {
    pub cipher: String,
    pub version: String,
}

/// One decoded HAProxy HTTP log line.
///
/// Built once by the decoder and handed to every consumer by reference; it
/// is never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpLog {
    pub client_ip: String,
    pub client_port: i64,
    /// `None` when the accept date could not be parsed.
    pub accept_date: Option<NaiveDateTime>,
    pub frontend_name: String,
    pub backend_name: String,
    pub server_name: String,

    /// Tq: time to receive the full request.
    pub request_time: Elapsed,
    /// Tw: time spent in queues.
    pub queue_time: Elapsed,
    /// Tc: time to connect to the server.
    pub connect_time: Elapsed,
    /// Tr: server response time.
    pub response_time: Elapsed,
    /// Tt: total session time.
    pub total_time: Elapsed,
    /// Tt carried the `+` prefix (logged before the session ended).
    pub total_time_partial: bool,

    pub status_code: i64,
    pub bytes_read: i64,
    pub captured_request_cookie: String,
    pub captured_response_cookie: String,
    pub termination_state: String,

    pub actconn: i64,
    pub feconn: i64,
    pub beconn: i64,
    pub srv_conn: i64,
    pub retries: i64,
    pub srv_queue: i64,
    pub backend_queue: i64,

    /// `None` when the header block was absent from the line.
    pub captured_request_headers: Option<Vec<String>>,
    pub captured_response_headers: Option<Vec<String>>,

    pub request: HttpRequest,
    pub ssl: Option<SslInfo>,
}

/// Reasons a line that matched the grammar could not become an [`HttpLog`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed request line: {0:?}")]
    MalformedRequest(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),
}
