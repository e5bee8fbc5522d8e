use std::{fmt, io, time::Duration};

use bytes::BytesMut;
use chrono::Utc;
use hickory_resolver::error::ResolveError;
use thiserror::Error;
use tokio::{
    io::{AsyncWriteExt, BufReader},
    time::Instant,
};
use tracing::{debug, trace};

use crate::{
    http::response::{HttpError, extract_response},
    model::{Failure, RequestDescriptor, ResultRecord},
    runtime::{
        connection::{Connection, Connector},
        deadline::Deadline,
        errno::classify,
        handler::Execute,
        timed_reader::TimedReader,
    },
};

/// The step of connection setup that was running when the deadline passed.
///
/// Once connected, the deadline surfaces as a `TimedOut` I/O error instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Looking up the host.
    Resolve,
    /// Opening the TCP connection.
    Connect,
    /// The TLS handshake.
    Handshake,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolve => "resolve",
            Self::Connect => "connect",
            Self::Handshake => "TLS handshake",
        };
        write!(f, "{name}")
    }
}

/// Represents the kind of error that can end a single request
#[derive(Error, Debug)]
pub enum RequestError {
    /// The per-request deadline passed.
    #[error("{0} timed out")]
    DeadlineExceeded(Phase),

    /// The host could not be resolved.
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        /// The host that was looked up.
        host: String,
        /// The resolver's error.
        source: ResolveError,
    },

    /// The lookup succeeded but returned no address.
    #[error("no addresses found for {0}")]
    NoAddress(String),

    /// No resolved address accepted the connection.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// The host and port that were tried.
        address: String,
        /// The error of the last attempt.
        source: io::Error,
    },

    /// The host cannot be used as a TLS server name.
    #[error("{0:?} is not a valid TLS server name")]
    InvalidServerName(String),

    /// The TLS handshake failed.
    #[error("TLS handshake with {host} failed: {source}")]
    Handshake {
        /// The server's host name.
        host: String,
        /// The handshake error.
        source: io::Error,
    },

    /// The request could not be written.
    #[error("failed to write request: {0}")]
    Write(#[source] io::Error),

    /// The response could not be read or was malformed.
    #[error("failed to read response: {0}")]
    Extract(#[from] HttpError),
}

/// Runs single requests: connect, send, extract one response, close.
#[derive(Clone, Debug)]
pub struct RequestExecutor {
    connector: Connector,
    timeout: Duration,
}

impl RequestExecutor {
    /// Creates an executor giving every request `timeout` from start to finish.
    #[must_use]
    pub const fn new(connector: Connector, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    /// Executes one request.
    ///
    /// Never fails: errors are classified and stored in the returned record next to whatever part
    /// of the response arrived.
    pub async fn execute(&self, request: RequestDescriptor) -> ResultRecord {
        let deadline = Instant::now() + self.timeout;
        let mut record = ResultRecord::new(request);
        let mut response = BytesMut::new();

        let outcome = self.exchange(&mut record, deadline, &mut response).await;
        record.response = response.freeze();

        match outcome {
            Ok(()) => {
                trace!(
                    host = %record.request.host,
                    port = record.request.port,
                    bytes = record.response.len(),
                    "request completed"
                );
            }
            Err(error) => {
                let errno = classify(&error);
                debug!(
                    host = %record.request.host,
                    port = record.request.port,
                    %error,
                    class = %errno,
                    errno = errno.code(),
                    "request failed"
                );
                record.failure = Some(Failure { errno, message: error.to_string() });
            }
        }
        record
    }

    async fn exchange(
        &self,
        record: &mut ResultRecord,
        deadline: Instant,
        out: &mut BytesMut,
    ) -> Result<(), RequestError> {
        let connection = self.connector.connect(&record.request, deadline).await?;
        let mut stream = Deadline::new(connection, deadline);

        if let Err(error) = send(&mut stream, &record.request.request).await {
            close(stream).await;
            return Err(RequestError::Write(error));
        }
        let sent = std::time::Instant::now();
        record.sent_at = Some(Utc::now());

        let mut reader = BufReader::new(TimedReader::new(&mut stream));
        let result = extract_response(&mut reader, record.request.is_head(), out).await;
        if let Some(first_read_at) = reader.get_ref().first_read_at() {
            let elapsed = first_read_at.saturating_duration_since(sent).as_millis();
            record.ping_millis = Some(u64::try_from(elapsed).unwrap_or(u64::MAX));
        }
        drop(reader);

        close(stream).await;
        result.map_err(RequestError::from)
    }
}

impl Execute for RequestExecutor {
    fn execute(&self, request: RequestDescriptor) -> impl Future<Output = ResultRecord> + Send {
        RequestExecutor::execute(self, request)
    }
}

async fn send(stream: &mut Deadline<Connection>, request: &[u8]) -> io::Result<()> {
    stream.write_all(request).await?;
    stream.flush().await
}

/// Shuts the connection down and drops it. A TLS connection sends `close_notify` first.
///
/// The shutdown shares the request's deadline.
async fn close(mut stream: Deadline<Connection>) {
    if let Err(error) = stream.shutdown().await {
        trace!(%error, "connection shutdown failed");
    }
}
