use bytes::BytesMut;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::http::{headers::FramingHeaders, response::HttpError};

/// How the end of a response body is found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyFraming {
    /// The response ends right after the header block.
    None,
    /// The body is a sequence of hex-size-prefixed chunks ending in a zero-size chunk and trailers.
    Chunked,
    /// The body is exactly this many bytes long.
    ContentLength(u64),
    /// The body runs until the server closes the connection.
    UntilClose,
}

impl BodyFraming {
    /// Chooses the framing rule for a response.
    ///
    /// `no_body` is set for responses to HEAD requests and for no-body status codes. Otherwise
    /// chunked encoding takes priority over `Content-Length`; the two are not cross-checked.
    #[must_use]
    pub const fn select(no_body: bool, headers: &FramingHeaders) -> Self {
        if no_body {
            Self::None
        } else if headers.is_chunked() {
            Self::Chunked
        } else if let Some(length) = headers.content_length() {
            Self::ContentLength(length)
        } else {
            Self::UntilClose
        }
    }
}

/// Reads one line including its `\n` terminator and appends it verbatim to `out`.
///
/// Returns the line without any trailing `\r` or `\n` characters. A line is only copied once it
/// is complete.
///
/// # Errors
///
/// Returns `HttpError::UnexpectedEOF` if the stream ends before the terminator and
/// `HttpError::Io` if reading fails.
pub async fn read_and_copy_line<R>(reader: &mut R, out: &mut BytesMut) -> Result<String, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::new();
    reader.read_until(b'\n', &mut raw).await?;
    if raw.last() != Some(&b'\n') {
        return Err(HttpError::UnexpectedEOF);
    }
    out.extend_from_slice(&raw);

    Ok(String::from_utf8_lossy(&raw).trim_end_matches(['\r', '\n']).to_string())
}

/// Copies exactly `length` bytes from the reader to `out` without reading past them.
///
/// Bytes are appended as they arrive, so `out` holds everything received when an error occurs.
///
/// # Errors
///
/// Returns `HttpError::UnexpectedEOF` if the stream ends early and `HttpError::Io` if reading fails.
pub async fn copy_exact<R>(reader: &mut R, out: &mut BytesMut, length: u64) -> Result<(), HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut remaining = length;
    while remaining > 0 {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Err(HttpError::UnexpectedEOF);
        }
        let take = usize::try_from(remaining).map_or(available.len(), |r| r.min(available.len()));
        out.extend_from_slice(&available[..take]);
        reader.consume(take);
        remaining -= take as u64;
    }
    Ok(())
}

/// Copies everything up to the end of the stream.
///
/// A TLS peer that closes without `close_notify` surfaces as `UnexpectedEof`; that still marks
/// the end of a connection-close framed body.
///
/// # Errors
///
/// Returns `HttpError::Io` for any other read failure.
pub async fn copy_to_end<R>(reader: &mut R, out: &mut BytesMut) -> Result<(), HttpError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = match reader.fill_buf().await {
            Ok(available) => available,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if available.is_empty() {
            return Ok(());
        }
        let read = available.len();
        out.extend_from_slice(available);
        reader.consume(read);
    }
}

/// Parses the size of a chunk from its size line, ignoring any chunk extension.
///
/// # Errors
///
/// Returns `HttpError::MalformedChunkSize` if the size is not a hexadecimal number that fits
/// into 64 bits.
pub fn parse_chunk_size(line: &str) -> Result<u64, HttpError> {
    let token = line.split_once(';').map_or(line, |(size, _extension)| size).trim();
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(HttpError::MalformedChunkSize(line.to_string()));
    }
    u64::from_str_radix(token, 16).map_err(|_| HttpError::MalformedChunkSize(line.to_string()))
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use tokio::io::{AsyncReadExt, BufReader};

    use crate::http::{
        body::{BodyFraming, copy_exact, copy_to_end, parse_chunk_size, read_and_copy_line},
        headers::FramingHeaders,
        response::HttpError,
    };

    #[test]
    fn chunk_size_valid() {
        assert_eq!(parse_chunk_size("a").unwrap(), 10);
        assert_eq!(parse_chunk_size("1F").unwrap(), 31);
        assert_eq!(parse_chunk_size("0").unwrap(), 0);
        assert_eq!(parse_chunk_size("10;name=value").unwrap(), 16);
        assert_eq!(parse_chunk_size("4 ; ext").unwrap(), 4);
    }

    #[test]
    fn chunk_size_invalid_should_throw_malformedchunksize() {
        for line in ["", ";ext", " good.", "-1", "+1", "0x10", "g", "11111111111111111"] {
            let result = parse_chunk_size(line);
            assert!(
                matches!(result, Err(HttpError::MalformedChunkSize(_))),
                "Expected Err(HttpError::MalformedChunkSize) for {line:?}, got {result:?}"
            );
        }
    }

    #[test]
    fn framing_precedence() {
        let mut both = FramingHeaders::new();
        both.observe_line("Content-Length: 3").unwrap();
        both.observe_line("Transfer-Encoding: chunked").unwrap();
        let mut length_only = FramingHeaders::new();
        length_only.observe_line("Content-Length: 3").unwrap();

        assert_eq!(BodyFraming::select(false, &both), BodyFraming::Chunked);
        assert_eq!(BodyFraming::select(false, &length_only), BodyFraming::ContentLength(3));
        assert_eq!(BodyFraming::select(false, &FramingHeaders::new()), BodyFraming::UntilClose);
        assert_eq!(BodyFraming::select(true, &both), BodyFraming::None);
    }

    #[tokio::test]
    async fn line_is_copied_with_its_terminator() {
        let mut reader = BufReader::new("first\r\nsecond\nthird".as_bytes());
        let mut out = BytesMut::new();

        assert_eq!(read_and_copy_line(&mut reader, &mut out).await.unwrap(), "first");
        assert_eq!(read_and_copy_line(&mut reader, &mut out).await.unwrap(), "second");
        let result = read_and_copy_line(&mut reader, &mut out).await;

        assert!(matches!(result, Err(HttpError::UnexpectedEOF)));
        assert_eq!(&out[..], b"first\r\nsecond\n");
    }

    #[tokio::test]
    async fn copy_exact_leaves_the_rest_unread() {
        let mut reader = BufReader::new("hello world".as_bytes());
        let mut out = BytesMut::new();

        copy_exact(&mut reader, &mut out, 5).await.unwrap();
        let mut rest = String::new();
        reader.read_to_string(&mut rest).await.unwrap();

        assert_eq!(&out[..], b"hello");
        assert_eq!(rest, " world");
    }

    #[tokio::test]
    async fn copy_exact_short_stream_keeps_partial_output() {
        let mut reader = BufReader::new("abc".as_bytes());
        let mut out = BytesMut::new();

        let result = copy_exact(&mut reader, &mut out, 10).await;

        assert!(matches!(result, Err(HttpError::UnexpectedEOF)));
        assert_eq!(&out[..], b"abc");
    }

    #[tokio::test]
    async fn copy_to_end_treats_unexpected_eof_as_close() {
        let mock = tokio_test::io::Builder::new()
            .read(b"partial body")
            .read_error(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "no close_notify"))
            .build();
        let mut reader = BufReader::new(mock);
        let mut out = BytesMut::new();

        copy_to_end(&mut reader, &mut out).await.unwrap();

        assert_eq!(&out[..], b"partial body");
    }

    #[tokio::test]
    async fn copy_to_end_reports_other_errors() {
        let mock = tokio_test::io::Builder::new()
            .read(b"partial")
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut reader = BufReader::new(mock);
        let mut out = BytesMut::new();

        let result = copy_to_end(&mut reader, &mut out).await;

        assert!(matches!(result, Err(HttpError::Io(_))));
        assert_eq!(&out[..], b"partial");
    }
}
