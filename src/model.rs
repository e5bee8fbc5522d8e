use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::runtime::errno::Errno;

/// A request ready to be sent, with its TLS flag and port already resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// The host to connect to, a DNS name or an IP literal.
    pub host: String,
    /// The port to connect to.
    pub port: u16,
    /// Whether the request is sent over TLS.
    pub tls: bool,
    /// The raw request, sent as-is.
    pub request: Bytes,
}

impl RequestDescriptor {
    /// Creates a descriptor, filling in the defaults for missing values.
    ///
    /// TLS is used unless disabled explicitly. A missing port (or port 0) becomes 443 with TLS and
    /// 80 without.
    ///
    /// # Examples
    /// ```
    /// let request = preq::model::RequestDescriptor::new("example.com", None, Some(false), "GET / HTTP/1.1\r\n\r\n");
    /// assert_eq!(request.port, 80);
    /// assert!(!request.tls);
    /// ```
    pub fn new(host: impl Into<String>, port: Option<u16>, tls: Option<bool>, request: impl Into<Bytes>) -> Self {
        let tls = tls.unwrap_or(true);
        let port = match port {
            Some(port) if port != 0 => port,
            _ if tls => 443,
            _ => 80,
        };
        Self { host: host.into(), port, tls, request: request.into() }
    }

    /// Whether the request's method token is HEAD, ignoring case.
    #[must_use]
    pub fn is_head(&self) -> bool {
        self.request
            .split(|b| b.is_ascii_whitespace())
            .next()
            .is_some_and(|method| method.eq_ignore_ascii_case(b"HEAD"))
    }
}

/// Why a request did not produce a complete response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    /// The classified cause.
    pub errno: Errno,
    /// A human readable description of the underlying error.
    pub message: String,
}

/// The outcome of executing one `RequestDescriptor`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultRecord {
    /// The request this record answers.
    pub request: RequestDescriptor,
    /// The response bytes exactly as received. Partial if `failure` is set.
    pub response: Bytes,
    /// When the request was written to the connection.
    pub sent_at: Option<DateTime<Utc>>,
    /// Milliseconds between sending the request and receiving the first response byte.
    pub ping_millis: Option<u64>,
    /// Set iff the request failed.
    pub failure: Option<Failure>,
}

impl ResultRecord {
    /// Creates an empty record for a request that has not been executed yet.
    #[must_use]
    pub const fn new(request: RequestDescriptor) -> Self {
        Self { request, response: Bytes::new(), sent_at: None, ping_millis: None, failure: None }
    }

    /// The numeric error code, 0 on success.
    #[must_use]
    pub fn errno(&self) -> u8 {
        self.failure.as_ref().map_or(0, |failure| failure.errno.code())
    }

    /// Whether the request produced a complete response.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{Failure, RequestDescriptor, ResultRecord},
        runtime::errno::Errno,
    };

    #[test]
    fn defaults_are_resolved_once() {
        let cases = [
            (None, None, 443, true),
            (None, Some(true), 443, true),
            (None, Some(false), 80, false),
            (Some(0), Some(false), 80, false),
            (Some(8443), None, 8443, true),
            (Some(8080), Some(false), 8080, false),
        ];

        for (port, tls, expected_port, expected_tls) in cases {
            let request = RequestDescriptor::new("example.com", port, tls, "GET / HTTP/1.1\r\n\r\n");
            assert_eq!(request.port, expected_port, "{port:?} {tls:?}");
            assert_eq!(request.tls, expected_tls, "{port:?} {tls:?}");
        }
    }

    #[test]
    fn head_is_detected_from_method_token() {
        for (raw, expected) in [
            ("HEAD / HTTP/1.1\r\n\r\n", true),
            ("head / HTTP/1.1\r\n\r\n", true),
            ("HeAd\r\n", true),
            ("GET / HTTP/1.1\r\n\r\n", false),
            ("HEADER / HTTP/1.1\r\n\r\n", false),
            ("", false),
        ] {
            let request = RequestDescriptor::new("example.com", None, None, raw);
            assert_eq!(request.is_head(), expected, "{raw:?}");
        }
    }

    #[test]
    fn errno_is_zero_on_success() {
        let mut record = ResultRecord::new(RequestDescriptor::new("example.com", None, None, "GET /"));
        assert_eq!(record.errno(), 0);
        assert!(record.is_success());

        record.failure = Some(Failure { errno: Errno::ConnectionRefused, message: "refused".to_string() });
        assert_eq!(record.errno(), 30);
        assert!(!record.is_success());
    }
}
