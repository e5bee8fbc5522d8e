use crate::http::response::HttpError;

/// A Http Status Line representation with http version, status code and reason phrase
#[derive(Debug, PartialEq, Eq)]
pub struct StatusLine {
    /// The HTTP version the server answered with, without the `HTTP/` prefix
    pub http_version: String,
    /// The three digit status code
    pub status_code: u16,
    /// The reason phrase (can be empty)
    pub reason_phrase: String,
}

impl StatusLine {
    /// Whether a response with this status never carries a body, no matter the headers.
    ///
    /// This holds for every informational (1xx) status as well as 204 and 304.
    #[must_use]
    pub const fn has_no_body(&self) -> bool {
        matches!(self.status_code, 100..=199 | 204 | 304)
    }
}

/// Parses a status line that has already been stripped of its line terminator.
///
/// Parsing is lax on purpose: fields may be separated by any amount of whitespace
/// and the reason phrase is optional.
///
/// # Errors
///
/// Throws `HttpError::MalformedStatusLine` if the line does not start with an `HTTP/` version
/// followed by a three digit status code.
pub fn parse_status_line(line: &str) -> Result<StatusLine, HttpError> {
    let malformed = || HttpError::MalformedStatusLine(line.to_string());

    let mut parts = line.split_whitespace();
    let version = parts.next().ok_or_else(malformed)?;
    let code = parts.next().ok_or_else(malformed)?;

    let http_version = version.strip_prefix("HTTP/").ok_or_else(malformed)?.to_string();

    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let status_code: u16 = code.parse().map_err(|_| malformed())?;
    if status_code < 100 {
        return Err(malformed());
    }

    let reason_phrase = parts.collect::<Vec<_>>().join(" ");

    Ok(StatusLine { http_version, status_code, reason_phrase })
}

#[cfg(test)]
mod tests {
    use crate::http::{response::HttpError, status_line::parse_status_line};

    #[test]
    fn status_line_valid() {
        let status_line = parse_status_line("HTTP/1.1 404 Not Found").unwrap();

        assert_eq!(status_line.http_version, "1.1");
        assert_eq!(status_line.status_code, 404);
        assert_eq!(status_line.reason_phrase, "Not Found");
        assert!(!status_line.has_no_body());
    }

    #[test]
    fn status_line_without_reason_valid() {
        let status_line = parse_status_line("HTTP/1.0 200").unwrap();

        assert_eq!(status_line.http_version, "1.0");
        assert_eq!(status_line.status_code, 200);
        assert!(status_line.reason_phrase.is_empty());
    }

    #[test]
    fn no_body_status_codes() {
        for (line, expected) in [
            ("HTTP/1.1 100 Continue", true),
            ("HTTP/1.1 101 Switching Protocols", true),
            ("HTTP/1.1 199 Whatever", true),
            ("HTTP/1.1 200 OK", false),
            ("HTTP/1.1 204 No Content", true),
            ("HTTP/1.1 205 Reset Content", false),
            ("HTTP/1.1 304 Not Modified", true),
            ("HTTP/1.1 500 Internal Server Error", false),
        ] {
            let status_line = parse_status_line(line).unwrap();
            assert_eq!(status_line.has_no_body(), expected, "{line}");
        }
    }

    #[test]
    fn status_line_wrong_protocol_should_throw_malformedstatusline() {
        let result = parse_status_line("HTTX/1.1 200 OK");
        assert!(
            matches!(result, Err(HttpError::MalformedStatusLine(_))),
            "Expected Err(HttpError::MalformedStatusLine), got {result:?}"
        );
    }

    #[test]
    fn status_line_bad_code_should_throw_malformedstatusline() {
        for line in ["HTTP/1.1 20 OK", "HTTP/1.1 2000 OK", "HTTP/1.1 OK 200", "HTTP/1.1 099 Low", "", "HTTP/1.1"] {
            let result = parse_status_line(line);
            assert!(
                matches!(result, Err(HttpError::MalformedStatusLine(_))),
                "Expected Err(HttpError::MalformedStatusLine) for {line:?}, got {result:?}"
            );
        }
    }
}
