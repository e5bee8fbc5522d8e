use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    time::{Instant, Sleep, sleep_until},
};

/// A stream whose reads and writes fail with `TimedOut` once an absolute deadline has passed.
///
/// The deadline covers the whole exchange rather than single operations, the same way a socket
/// deadline would.
#[derive(Debug)]
pub struct Deadline<S> {
    inner: S,
    sleep: Pin<Box<Sleep>>,
}

impl<S> Deadline<S> {
    /// Wraps `inner` so that any I/O after `deadline` fails.
    pub fn new(inner: S, deadline: Instant) -> Self {
        Self { inner, sleep: Box::pin(sleep_until(deadline)) }
    }

    /// Returns a reference to the wrapped stream.
    pub const fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Unwraps the stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn poll_elapsed(&mut self, cx: &mut Context<'_>) -> io::Result<()> {
        if self.sleep.as_mut().poll(cx).is_ready() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "i/o timeout"));
        }
        Ok(())
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for Deadline<S> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Err(e) = this.poll_elapsed(cx) {
            return Poll::Ready(Err(e));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Deadline<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if let Err(e) = this.poll_elapsed(cx) {
            return Poll::Ready(Err(e));
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Err(e) = this.poll_elapsed(cx) {
            return Poll::Ready(Err(e));
        }
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Err(e) = this.poll_elapsed(cx) {
            return Poll::Ready(Err(e));
        }
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt, duplex},
        time::Instant,
    };

    use crate::runtime::deadline::Deadline;

    #[tokio::test]
    async fn io_before_deadline_passes_through() {
        let (client, mut server) = duplex(64);
        let mut stream = Deadline::new(client, Instant::now() + Duration::from_secs(5));

        stream.write_all(b"ping").await.unwrap();
        let mut received = [0u8; 4];
        server.read_exact(&mut received).await.unwrap();
        server.write_all(b"pong").await.unwrap();
        let mut answer = [0u8; 4];
        stream.read_exact(&mut answer).await.unwrap();

        assert_eq!(&received, b"ping");
        assert_eq!(&answer, b"pong");
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let (client, _server) = duplex(64);
        let mut stream = Deadline::new(client, Instant::now() + Duration::from_millis(50));

        let mut buf = [0u8; 8];
        let error = stream.read(&mut buf).await.unwrap_err();

        assert_eq!(error.kind(), std::io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn expired_deadline_fails_even_with_data_available() {
        let (client, mut server) = duplex(64);
        server.write_all(b"late").await.unwrap();
        let mut stream = Deadline::new(client, Instant::now() + Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(30)).await;

        let mut buf = [0u8; 8];
        let read_error = stream.read(&mut buf).await.unwrap_err();
        let write_error = stream.write_all(b"x").await.unwrap_err();

        assert_eq!(read_error.kind(), std::io::ErrorKind::TimedOut);
        assert_eq!(write_error.kind(), std::io::ErrorKind::TimedOut);
    }
}
