use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};

use tokio::io::{AsyncRead, ReadBuf};

/// A reader that remembers when it first returned data.
///
/// The bytes read through it are never altered.
#[derive(Debug)]
pub struct TimedReader<R> {
    inner: R,
    first_read_at: Option<Instant>,
}

impl<R> TimedReader<R> {
    /// Wraps `inner`.
    pub const fn new(inner: R) -> Self {
        Self { inner, first_read_at: None }
    }

    /// When the first read that returned at least one byte completed, if any did.
    ///
    /// This is the completion of the read, not the arrival of the byte on the wire.
    pub const fn first_read_at(&self) -> Option<Instant> {
        self.first_read_at
    }

    /// Unwraps the reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for TimedReader<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let filled_before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if this.first_read_at.is_none() && matches!(poll, Poll::Ready(Ok(()))) && buf.filled().len() > filled_before {
            this.first_read_at = Some(Instant::now());
        }
        poll
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    use crate::{http::response::tests::ChunkReader, runtime::timed_reader::TimedReader};

    #[tokio::test]
    async fn bytes_pass_through_unchanged() {
        let input = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";
        let mut reader = TimedReader::new(ChunkReader::new(input, 3));

        let mut output = String::new();
        reader.read_to_string(&mut output).await.unwrap();

        assert_eq!(output, input);
        assert!(reader.first_read_at().is_some());
    }

    #[tokio::test]
    async fn empty_stream_records_nothing() {
        let mut reader = TimedReader::new(&b""[..]);

        let mut output = Vec::new();
        reader.read_to_end(&mut output).await.unwrap();

        assert!(output.is_empty());
        assert!(reader.first_read_at().is_none());
    }

    #[tokio::test]
    async fn only_the_first_read_is_recorded() {
        let (client, mut server) = duplex(64);
        let mut reader = TimedReader::new(client);

        server.write_all(b"first").await.unwrap();
        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).await.unwrap();
        let first = reader.first_read_at().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        server.write_all(b"second").await.unwrap();
        let mut buf = [0u8; 6];
        reader.read_exact(&mut buf).await.unwrap();

        assert_eq!(reader.first_read_at(), Some(first));
    }

    #[tokio::test]
    async fn read_errors_record_nothing() {
        let mock = tokio_test::io::Builder::new()
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut reader = TimedReader::new(mock);

        let mut buf = [0u8; 8];
        assert!(reader.read(&mut buf).await.is_err());
        assert!(reader.first_read_at().is_none());
    }
}
