//! Syslog — strip RFC 3164 / RFC 5424 headers down to the message content.

/// Largest valid PRI value (facility 23, severity 7).
const MAX_PRIORITY: u8 = 191;

/// One syslog frame split into header parts and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyslogMessage<'a> {
    pub priority: Option<u8>,
    pub hostname: Option<&'a str>,
    pub app_name: Option<&'a str>,
    pub content: &'a str,
}

/// Split a syslog frame. Frames without a `<PRI>` header are passed
/// through untouched as content.
pub fn parse(frame: &str) -> SyslogMessage<'_> {
    let frame = frame.trim_end_matches(['\r', '\n']);

    let Some((priority, remainder)) = split_priority(frame) else {
        return SyslogMessage {
            priority: None,
            hostname: None,
            app_name: None,
            content: frame,
        };
    };

    if let Some(rest) = remainder.strip_prefix("1 ") {
        parse_rfc5424(priority, rest)
    } else {
        parse_rfc3164(priority, remainder)
    }
}

fn split_priority(frame: &str) -> Option<(u8, &str)> {
    let rest = frame.strip_prefix('<')?;
    // PRI is at most three digits
    let end = rest.bytes().take(4).position(|b| b == b'>')?;
    let digits = &rest[..end];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let priority: u8 = digits.parse().ok()?;
    if priority > MAX_PRIORITY {
        return None;
    }
    Some((priority, &rest[end + 1..]))
}

/// RFC 5424 remainder after "<PRI>1 ":
/// `TIMESTAMP HOSTNAME APP-NAME PROCID MSGID STRUCTURED-DATA [MSG]`
fn parse_rfc5424(priority: u8, text: &str) -> SyslogMessage<'_> {
    let parts: Vec<&str> = text.splitn(6, ' ').collect();

    let nil_filtered = |idx: usize| parts.get(idx).copied().filter(|s| *s != "-");
    let hostname = nil_filtered(1);
    let app_name = nil_filtered(2);

    let content = parts
        .get(5)
        .map(|sd_and_msg| skip_structured_data(sd_and_msg))
        .unwrap_or("");

    SyslogMessage {
        priority: Some(priority),
        hostname,
        app_name,
        content: content.trim_start_matches('\u{feff}'),
    }
}

/// Skip the STRUCTURED-DATA field (`-` or one or more `[...]` elements).
fn skip_structured_data(text: &str) -> &str {
    if let Some(rest) = text.strip_prefix('-') {
        return rest.strip_prefix(' ').unwrap_or(rest);
    }

    let bytes = text.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() && bytes[idx] == b'[' {
        let mut escaped = false;
        idx += 1;
        while idx < bytes.len() {
            match bytes[idx] {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b']' => break,
                _ => {}
            }
            idx += 1;
        }
        // step past ']'
        idx += 1;
    }

    let rest = text.get(idx.min(text.len())..).unwrap_or("");
    rest.strip_prefix(' ').unwrap_or(rest)
}

/// RFC 3164 remainder after "<PRI>":
/// `Mmm dd hh:mm:ss [HOSTNAME] TAG[PID]: MSG`
///
/// HAProxy omits the hostname when it logs straight to a socket, so the
/// first token after the timestamp may already be the tag.
fn parse_rfc3164(priority: u8, text: &str) -> SyslogMessage<'_> {
    let after_ts = if has_bsd_timestamp(text) {
        text.get(16..).unwrap_or(text)
    } else {
        text
    };

    let (first, rest) = split_token(after_ts);
    if is_tag(first) {
        return SyslogMessage {
            priority: Some(priority),
            hostname: None,
            app_name: Some(tag_name(first)),
            content: rest,
        };
    }

    let (second, rest_after_second) = split_token(rest);
    if is_tag(second) {
        return SyslogMessage {
            priority: Some(priority),
            hostname: Some(first),
            app_name: Some(tag_name(second)),
            content: rest_after_second,
        };
    }

    SyslogMessage {
        priority: Some(priority),
        hostname: None,
        app_name: None,
        content: after_ts,
    }
}

/// "Mmm dd hh:mm:ss ": the day is space padded ("May  9").
fn has_bsd_timestamp(text: &str) -> bool {
    let b = text.as_bytes();
    b.len() > 16
        && b[..3].iter().all(|c| c.is_ascii_alphabetic())
        && b[3] == b' '
        && (b[4] == b' ' || b[4].is_ascii_digit())
        && b[5].is_ascii_digit()
        && b[6] == b' '
        && b[9] == b':'
        && b[12] == b':'
        && b[15] == b' '
}

fn split_token(text: &str) -> (&str, &str) {
    match text.split_once(' ') {
        Some((token, rest)) => (token, rest),
        None => (text, ""),
    }
}

fn is_tag(token: &str) -> bool {
    token.len() > 1 && token.ends_with(':')
}

fn tag_name(tag: &str) -> &str {
    let tag = tag.trim_end_matches(':');
    tag.split('[').next().unwrap_or(tag)
}
