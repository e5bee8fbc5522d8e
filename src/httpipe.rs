//! The JSON-lines record format on standard input and output.
//!
//! Every input line names a host and a raw request. Every output line repeats the request's fields
//! with the defaults filled in and adds the response or the error.

use std::{borrow::Cow, io};

use async_stream::try_stream;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    model::{RequestDescriptor, ResultRecord},
    runtime::handler::ResultSink,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Represents the kind of error that can occur at the input or output of the program
#[derive(Error, Debug)]
pub enum BoundaryError {
    /// An input line is not a valid request record.
    #[error("could not parse line {line:?}: {source}")]
    Decode {
        /// The offending line.
        line: String,
        /// Why it was rejected.
        source: serde_json::Error,
    },

    /// A result record could not be serialized.
    #[error("could not encode result: {0}")]
    Encode(#[source] serde_json::Error),

    /// Reading the input or writing the output failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Deserialize)]
struct RequestLine {
    host: String,
    req: String,
    port: Option<u16>,
    tls: Option<bool>,
}

#[derive(Serialize)]
struct ResultLine<'a> {
    host: &'a str,
    port: u16,
    tls: bool,
    req: Cow<'a, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reqat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ping: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resp: Option<Cow<'a, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    err: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errno: Option<u8>,
}

/// Parses one input line.
///
/// `host` and `req` are required. A missing `tls` means TLS, a missing or zero `port` means the
/// default port for the scheme. Unknown fields are ignored.
///
/// # Errors
///
/// Throws `BoundaryError::Decode` if the line is not a valid request record.
///
/// # Examples
/// ```
/// let request = preq::httpipe::decode_request(r#"{"host":"example.com","req":"GET / HTTP/1.1\r\n\r\n"}"#).unwrap();
/// assert_eq!(request.port, 443);
/// assert!(request.tls);
/// ```
pub fn decode_request(line: &str) -> Result<RequestDescriptor, BoundaryError> {
    let parsed: RequestLine =
        serde_json::from_str(line).map_err(|source| BoundaryError::Decode { line: line.to_string(), source })?;
    Ok(RequestDescriptor::new(parsed.host, parsed.port, parsed.tls, parsed.req))
}

/// Serializes a result record to one output line, without the line terminator.
///
/// # Errors
///
/// Throws `BoundaryError::Encode` if serialization fails.
pub fn encode_result(record: &ResultRecord) -> Result<String, BoundaryError> {
    let line = ResultLine {
        host: &record.request.host,
        port: record.request.port,
        tls: record.request.tls,
        req: String::from_utf8_lossy(&record.request.request),
        reqat: record.sent_at.map(|sent_at| sent_at.format(TIMESTAMP_FORMAT).to_string()),
        ping: record.ping_millis,
        resp: (!record.response.is_empty()).then(|| String::from_utf8_lossy(&record.response)),
        err: record.failure.as_ref().map(|failure| failure.message.as_str()),
        errno: record.failure.as_ref().map(|failure| failure.errno.code()),
    };
    serde_json::to_string(&line).map_err(BoundaryError::Encode)
}

/// Turns a line-oriented reader into a stream of requests.
///
/// Blank lines are skipped. The stream ends after the first error.
pub fn read_requests<R>(reader: R) -> impl Stream<Item = Result<RequestDescriptor, BoundaryError>> + Send
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    try_stream! {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            yield decode_request(&line)?;
        }
    }
}

/// Writes result records as JSON lines, flushing after each one.
#[derive(Debug)]
pub struct JsonLinesWriter<W> {
    writer: W,
}

impl<W> JsonLinesWriter<W> {
    /// Wraps `writer`.
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Unwraps the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin + Send> ResultSink for JsonLinesWriter<W> {
    async fn accept(&mut self, record: ResultRecord) -> Result<(), BoundaryError> {
        let mut line = encode_result(&record)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
