use crate::http::response::HttpError;

/// The subset of response headers that decides how a body is framed.
///
/// Every other header is copied verbatim by the extractor and never looked at.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FramingHeaders {
    content_length: Option<u64>,
    chunked: bool,
}

impl FramingHeaders {
    /// Returns an empty set of framing headers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The value of the `Content-Length` header, if one was seen.
    #[must_use]
    pub const fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Whether the last `Transfer-Encoding` header ended with `chunked`.
    #[must_use]
    pub const fn is_chunked(&self) -> bool {
        self.chunked
    }

    /// Inspects one header line, stripped of its line terminator.
    ///
    /// Names are matched case-insensitively. Lines without a colon are ignored since
    /// the extractor only needs to reproduce them.
    ///
    /// # Examples
    /// ```
    /// let mut headers = preq::http::headers::FramingHeaders::new();
    /// headers.observe_line("Transfer-Encoding: gzip, Chunked").unwrap();
    /// headers.observe_line("Content-Length: 12").unwrap();
    /// assert!(headers.is_chunked());
    /// assert_eq!(headers.content_length(), Some(12));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `HttpError::DuplicateContentLength` on a second `Content-Length` header and
    /// `HttpError::InvalidContentLength` if its value is not a non-negative integer.
    pub fn observe_line(&mut self, line: &str) -> Result<(), HttpError> {
        let Some((name, value)) = line.split_once(':') else {
            return Ok(());
        };

        if name.eq_ignore_ascii_case("content-length") {
            if self.content_length.is_some() {
                return Err(HttpError::DuplicateContentLength);
            }
            let value = value.trim();
            // u64 parsing would also accept a leading '+'
            if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                return Err(HttpError::InvalidContentLength(value.to_string()));
            }
            let length = value
                .parse()
                .map_err(|_| HttpError::InvalidContentLength(value.to_string()))?;
            self.content_length = Some(length);
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            self.chunked = value
                .rsplit(',')
                .next()
                .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::http::{headers::FramingHeaders, response::HttpError};

    #[test]
    fn content_length_valid() {
        let mut headers = FramingHeaders::new();
        headers.observe_line("CONTENT-length:   42  ").unwrap();

        assert_eq!(headers.content_length(), Some(42));
        assert!(!headers.is_chunked());
    }

    #[test]
    fn duplicate_content_length_should_throw_duplicatecontentlength() {
        let mut headers = FramingHeaders::new();
        headers.observe_line("Content-Length: 1").unwrap();
        let result = headers.observe_line("content-length: 1");

        assert!(matches!(result, Err(HttpError::DuplicateContentLength)));
    }

    #[test]
    fn invalid_content_length_should_throw_invalidcontentlength() {
        for value in ["-1", "+5", "abc", "", "1 2", "99999999999999999999999"] {
            let mut headers = FramingHeaders::new();
            let result = headers.observe_line(&format!("Content-Length: {value}"));
            assert!(
                matches!(result, Err(HttpError::InvalidContentLength(_))),
                "Expected Err(HttpError::InvalidContentLength) for {value:?}, got {result:?}"
            );
        }
    }

    #[test]
    fn chunked_only_when_last_coding() {
        for (value, expected) in [
            ("chunked", true),
            ("CHUNKED", true),
            ("gzip, chunked", true),
            ("gzip,chunked  ", true),
            ("chunked, gzip", false),
            ("gzip", false),
            ("", false),
        ] {
            let mut headers = FramingHeaders::new();
            headers.observe_line(&format!("Transfer-Encoding: {value}")).unwrap();
            assert_eq!(headers.is_chunked(), expected, "{value:?}");
        }
    }

    #[test]
    fn later_transfer_encoding_overrides_earlier() {
        let mut headers = FramingHeaders::new();
        headers.observe_line("Transfer-Encoding: chunked").unwrap();
        headers.observe_line("Transfer-Encoding: gzip").unwrap();

        assert!(!headers.is_chunked());
    }

    #[test]
    fn unrelated_and_malformed_lines_are_ignored() {
        let mut headers = FramingHeaders::new();
        headers.observe_line("Content-Type: text/plain").unwrap();
        headers.observe_line("no colon at all").unwrap();
        headers.observe_line("Content-Length : 5").unwrap();

        assert_eq!(headers, FramingHeaders::new());
    }
}
