use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncRead, BufReader};

use crate::http::{
    body::{BodyFraming, copy_exact, copy_to_end, parse_chunk_size, read_and_copy_line},
    headers::FramingHeaders,
    status_line::parse_status_line,
};

/// Represents the kind of error that can occur while extracting a response
#[derive(Error, Debug)]
pub enum HttpError {
    /// The status line does not start with an HTTP version and a status code.
    #[error("status line is malformed: {0:?}")]
    MalformedStatusLine(String),

    /// The response contains more than one `Content-Length` header.
    #[error("multiple Content-Length headers found")]
    DuplicateContentLength,

    /// The `Content-Length` header is not a non-negative integer.
    #[error("invalid Content-Length {0:?}")]
    InvalidContentLength(String),

    /// A chunk size line does not start with a hexadecimal size.
    #[error("invalid chunk size line {0:?}")]
    MalformedChunkSize(String),

    /// The stream ended before the response was complete.
    #[error("unexpected end of stream")]
    UnexpectedEOF,

    /// There was a generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Represents the different stages of the extractor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParseState {
    /// Nothing was read yet.
    StatusLine,
    /// The extractor is copying header lines.
    Headers,
    /// The header block is complete and the framing is known.
    Body(BodyFraming),
    /// The extractor expects a chunk size line.
    ChunkSize,
    /// The extractor copies a chunk payload plus its line terminator.
    ChunkData(u64),
    /// The extractor is copying trailer lines after the last chunk.
    Trailers,
    /// The response is complete.
    Done,
}

/// Copies exactly one HTTP response off a stream.
///
/// The extractor never reads past the end of the response, so a keep-alive connection is left
/// positioned at the start of whatever follows.
#[derive(Debug)]
pub struct ResponseExtractor {
    /// The state of the extractor.
    state: ParseState,
    /// Whether the response answers a HEAD request.
    head_request: bool,
    /// Whether the status code rules out a body.
    no_body_status: bool,
    /// The headers relevant to body framing.
    headers: FramingHeaders,
}

/// The outcome of `read_response`: the bytes read so far and the error that stopped reading, if any.
#[derive(Debug)]
pub struct Extraction {
    /// The response bytes, exactly as received. Partial if `error` is set.
    pub response: Bytes,
    /// The reason extraction stopped early.
    pub error: Option<HttpError>,
}

impl ResponseExtractor {
    /// Creates an extractor for the response to a request, HEAD or otherwise.
    #[must_use]
    pub fn new(head_request: bool) -> Self {
        Self {
            state: ParseState::StatusLine,
            head_request,
            no_body_status: false,
            headers: FramingHeaders::new(),
        }
    }

    /// Copies the response from the reader to `out`, verbatim.
    ///
    /// # Errors
    ///
    /// Throws an `HttpError` if reading fails or the response is malformed. Everything copied up to
    /// that point stays in `out`.
    pub async fn extract<R>(&mut self, reader: &mut R, out: &mut BytesMut) -> Result<(), HttpError>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            self.state = match self.state {
                ParseState::Done => return Ok(()),
                ParseState::StatusLine => {
                    let line = read_and_copy_line(reader, out).await?;
                    let status_line = parse_status_line(&line)?;
                    self.no_body_status = status_line.has_no_body();
                    ParseState::Headers
                }
                ParseState::Headers => {
                    let line = read_and_copy_line(reader, out).await?;
                    if line.is_empty() {
                        ParseState::Body(BodyFraming::select(
                            self.head_request || self.no_body_status,
                            &self.headers,
                        ))
                    } else {
                        self.headers.observe_line(&line)?;
                        ParseState::Headers
                    }
                }
                ParseState::Body(framing) => match framing {
                    BodyFraming::None => ParseState::Done,
                    BodyFraming::Chunked => ParseState::ChunkSize,
                    BodyFraming::ContentLength(length) => {
                        copy_exact(reader, out, length).await?;
                        ParseState::Done
                    }
                    BodyFraming::UntilClose => {
                        copy_to_end(reader, out).await?;
                        ParseState::Done
                    }
                },
                ParseState::ChunkSize => {
                    let line = read_and_copy_line(reader, out).await?;
                    match parse_chunk_size(&line)? {
                        0 => ParseState::Trailers,
                        size => ParseState::ChunkData(size),
                    }
                }
                ParseState::ChunkData(size) => {
                    // payload plus the line terminator that follows it
                    let length = size
                        .checked_add(2)
                        .ok_or_else(|| HttpError::MalformedChunkSize(format!("{size:x}")))?;
                    copy_exact(reader, out, length).await?;
                    ParseState::ChunkSize
                }
                ParseState::Trailers => {
                    let line = read_and_copy_line(reader, out).await?;
                    if line.is_empty() {
                        ParseState::Done
                    } else {
                        ParseState::Trailers
                    }
                }
            };
        }
    }
}

/// Copies one response from a buffered reader to `out`.
///
/// Bytes following the response are left in the reader.
///
/// # Errors
///
/// Throws an `HttpError` if reading fails or the response is malformed. The bytes read up to
/// that point stay in `out`.
pub async fn extract_response<R>(reader: &mut R, head_request: bool, out: &mut BytesMut) -> Result<(), HttpError>
where
    R: AsyncBufRead + Unpin,
{
    ResponseExtractor::new(head_request).extract(reader, out).await
}

/// Reads one response from any reader.
///
/// The reader is buffered internally, so bytes beyond the response may have been read from it but
/// are never part of the result.
pub async fn read_response<R>(reader: R, head_request: bool) -> Extraction
where
    R: AsyncRead + Unpin,
{
    let mut buffered = BufReader::new(reader);
    let mut out = BytesMut::new();
    let result = extract_response(&mut buffered, head_request, &mut out).await;
    Extraction { response: out.freeze(), error: result.err() }
}
