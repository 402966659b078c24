//! Grammar — the HAProxy HTTP log line pattern and its capture map.
//!
//! Matches the default `option httplog` format extended with an optional
//! `%sslc/%sslv` suffix:
//!
//! ```text
//! %ci:%cp [%tr] %ft %b/%s %TR/%Tw/%Tc/%Tr/%Ta %ST %B %CC %CS %tsc %ac/%fc/%bc/%sc/%rc %sq/%bq %hr %hs %{+Q}r %sslc/%sslv
//! ```

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::MAX_LINE_SIZE;

static HTTP_LOG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<client_ip>[0-9A-Fa-f:.]+):(?P<client_port>[0-9]{1,5}) ",
        r"\[(?P<accept_date>[0-9]{2}/\w{3}/[0-9]{4}(?::[0-9]{2}){3}\.[0-9]{3})\] ",
        r"(?P<frontend_name>\S+) (?P<backend_name>[\w.-]+)/(?P<server_name>\S+) ",
        r"(?P<tq>-1|[0-9]+)/(?P<tw>-1|[0-9]+)/(?P<tc>-1|[0-9]+)/(?P<tr>-1|[0-9]+)/(?P<tt>\+?[0-9]+) ",
        r"(?P<status_code>[0-9]{3}) (?P<bytes_read>[0-9]+) ",
        r"(?P<captured_request_cookie>\S+) (?P<captured_response_cookie>\S+) ",
        r"(?P<termination_state>[\w-]{4}) ",
        r"(?P<actconn>[0-9]+)/(?P<feconn>[0-9]+)/(?P<beconn>[0-9]+)/(?P<srv_conn>[0-9]+)/(?P<retries>\+?[0-9]+) ",
        r"(?P<srv_queue>[0-9]+)/(?P<backend_queue>[0-9]+) ",
        r"(?:\{(?P<captured_request_headers>.*?)\} )?",
        r"(?:\{(?P<captured_response_headers>.*?)\} )?",
        r#""(?P<http_request>.+)""#,
        r"(?: (?P<ssl_cipher>[\w-]+)/(?P<ssl_version>[\w.]+))?$",
    ))
    .expect("HTTP log grammar is a valid regex")
});

/// Named captures of one matched line.
///
/// Keeps the distinction between a group that did not take part in the
/// match (`None`) and one that matched the empty string (`Some("")`).
pub struct FieldMap<'t> {
    captures: Captures<'t>,
}

impl<'t> FieldMap<'t> {
    pub fn get(&self, name: &str) -> Option<&'t str> {
        self.captures.name(name).map(|m| m.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.captures.name(name).is_some()
    }
}

/// Apply the grammar to one line.
///
/// Returns `None` for anything that is not an HAProxy HTTP log line:
/// TCP-mode logs, startup notices, health-check chatter, truncated frames.
pub fn match_line(line: &str) -> Option<FieldMap<'_>> {
    let line = line.trim();
    if line.is_empty() || line.len() > MAX_LINE_SIZE {
        return None;
    }
    HTTP_LOG_PATTERN
        .captures(line)
        .map(|captures| FieldMap { captures })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"192.168.9.185:56276 [29/May/2015:10:36:47.766] Service1~ Service1/host-1 2/0/0/10/12 200 423 - - ---- 282/36/0/0/0 0/0 {d7d9b784-4276-42bc-ae79-71e9e84d2b85} {d7d9b784-4276-42bc-ae79-71e9e84d2b85} "POST /path/to/app HTTP/1.1" ECDHE-RSA-AES128-GCM-SHA256/TLSv1.2"#;

    #[test]
    fn test_match_full_line() {
        let fields = match_line(FULL).unwrap();
        assert_eq!(fields.get("client_ip"), Some("192.168.9.185"));
        assert_eq!(fields.get("client_port"), Some("56276"));
        assert_eq!(fields.get("accept_date"), Some("29/May/2015:10:36:47.766"));
        assert_eq!(fields.get("frontend_name"), Some("Service1~"));
        assert_eq!(fields.get("backend_name"), Some("Service1"));
        assert_eq!(fields.get("server_name"), Some("host-1"));
        assert_eq!(fields.get("tt"), Some("12"));
        assert_eq!(fields.get("termination_state"), Some("----"));
        assert_eq!(fields.get("http_request"), Some("POST /path/to/app HTTP/1.1"));
        assert_eq!(fields.get("ssl_cipher"), Some("ECDHE-RSA-AES128-GCM-SHA256"));
        assert_eq!(fields.get("ssl_version"), Some("TLSv1.2"));
    }

    #[test]
    fn test_no_match_on_noise() {
        assert!(match_line("Not a haproxy syslog message").is_none());
        assert!(match_line("").is_none());
        assert!(match_line("Proxy http-in started.").is_none());
    }

    #[test]
    fn test_no_match_on_truncated_line() {
        let truncated = &FULL[..FULL.find('"').unwrap() + 10];
        assert!(match_line(truncated).is_none());
    }

    #[test]
    fn test_no_match_on_oversized_line() {
        let huge = format!("{}{}", FULL, " ".repeat(MAX_LINE_SIZE));
        // Trailing whitespace is trimmed before the size check.
        assert!(match_line(&huge).is_some());
        let huge = FULL.replace("/path/to/app", &"a".repeat(MAX_LINE_SIZE));
        assert!(match_line(&huge).is_none());
    }

    #[test]
    fn test_absent_optional_groups() {
        let line = r#"10.0.0.1:1000 [29/May/2015:10:36:47.766] fe be/srv 2/0/0/10/12 200 423 - - ---- 1/1/0/0/0 0/0 "GET / HTTP/1.1""#;
        let fields = match_line(line).unwrap();
        assert!(!fields.contains("captured_request_headers"));
        assert!(!fields.contains("captured_response_headers"));
        assert!(!fields.contains("ssl_cipher"));
        assert!(!fields.contains("ssl_version"));
        assert_eq!(fields.get("http_request"), Some("GET / HTTP/1.1"));
    }

    #[test]
    fn test_empty_header_block_is_present() {
        let line = r#"10.0.0.1:1000 [29/May/2015:10:36:47.766] fe be/srv 2/0/0/10/12 200 423 - - ---- 1/1/0/0/0 0/0 {} "GET / HTTP/1.1""#;
        let fields = match_line(line).unwrap();
        assert_eq!(fields.get("captured_request_headers"), Some(""));
        assert!(!fields.contains("captured_response_headers"));
    }

    #[test]
    fn test_sentinel_and_overflow_durations() {
        let line = r#"10.0.0.1:1000 [29/May/2015:10:36:47.766] fe be/<NOSRV> -1/-1/-1/-1/+503 503 212 - - SC-- 1/1/0/0/0 0/0 "GET /x HTTP/1.1""#;
        let fields = match_line(line).unwrap();
        assert_eq!(fields.get("tq"), Some("-1"));
        assert_eq!(fields.get("tc"), Some("-1"));
        assert_eq!(fields.get("tt"), Some("+503"));
        assert_eq!(fields.get("server_name"), Some("<NOSRV>"));
    }

    #[test]
    fn test_termination_state_must_be_four_chars() {
        let line = r#"10.0.0.1:1000 [29/May/2015:10:36:47.766] fe be/srv 2/0/0/10/12 200 423 - - --- 1/1/0/0/0 0/0 "GET / HTTP/1.1""#;
        assert!(match_line(line).is_none());
    }

    #[test]
    fn test_ipv6_client() {
        let line = r#"2001:db8::1:443 [29/May/2015:10:36:47.766] fe be/srv 2/0/0/10/12 200 423 - - ---- 1/1/0/0/0 0/0 "GET / HTTP/1.1""#;
        let fields = match_line(line).unwrap();
        assert_eq!(fields.get("client_ip"), Some("2001:db8::1"));
        assert_eq!(fields.get("client_port"), Some("443"));
    }

    #[test]
    fn test_trailing_newline_is_tolerated() {
        let line = format!("{}\r\n", FULL);
        assert!(match_line(&line).is_some());
    }

    #[test]
    fn test_only_ascii_digits_match_numeric_fields() {
        assert!(match_line(&FULL.replace(" 200 ", " \u{662}\u{660}\u{660} ")).is_none());
        assert!(match_line(&FULL.replace(":56276", ":\u{665}6276")).is_none());
        assert!(match_line(&FULL.replace("282/36", "\u{ff12}82/36")).is_none());
    }
}
