use std::{
    io,
    net::{IpAddr, SocketAddr},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use hickory_resolver::{
    TokioAsyncResolver,
    config::{ResolverConfig, ResolverOpts},
};
use rustls::{ClientConfig, pki_types::ServerName};
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    net::TcpStream,
    time::{Instant, timeout_at},
};
use tokio_rustls::{TlsConnector, client::TlsStream};
use tracing::{debug, warn};

use crate::{
    model::RequestDescriptor,
    runtime::executor::{Phase, RequestError},
};

/// An open connection to a server, plain or TLS.
#[derive(Debug)]
pub enum Connection {
    /// A plain TCP connection.
    Plain(TcpStream),
    /// A TCP connection after a successful TLS handshake.
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Connection {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Opens connections for requests: resolves the host, connects and performs the TLS handshake.
///
/// The resolver and the TLS configuration are shared read-only between all requests.
#[derive(Clone)]
pub struct Connector {
    resolver: TokioAsyncResolver,
    tls: TlsConnector,
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector").finish_non_exhaustive()
    }
}

impl Connector {
    /// Creates a connector from a resolver and a TLS client configuration.
    #[must_use]
    pub fn new(resolver: TokioAsyncResolver, tls_config: Arc<ClientConfig>) -> Self {
        Self { resolver, tls: TlsConnector::from(tls_config) }
    }

    /// Creates a connector that resolves hosts with the system's DNS configuration.
    #[must_use]
    pub fn with_system_resolver(tls_config: Arc<ClientConfig>) -> Self {
        Self::new(system_resolver(), tls_config)
    }

    /// Connects to the request's host and port, finishing before `deadline`.
    ///
    /// Every resolved address is tried in order until one accepts the connection.
    ///
    /// # Errors
    ///
    /// Returns a `RequestError` naming the phase that failed: resolving, connecting or the TLS
    /// handshake.
    pub async fn connect(&self, request: &RequestDescriptor, deadline: Instant) -> Result<Connection, RequestError> {
        let addresses = timeout_at(deadline, self.resolve(&request.host))
            .await
            .map_err(|_| RequestError::DeadlineExceeded(Phase::Resolve))??;

        let stream = timeout_at(deadline, connect_any(&request.host, &addresses, request.port))
            .await
            .map_err(|_| RequestError::DeadlineExceeded(Phase::Connect))??;

        if !request.tls {
            return Ok(Connection::Plain(stream));
        }

        let server_name = ServerName::try_from(request.host.clone())
            .map_err(|_| RequestError::InvalidServerName(request.host.clone()))?;
        let stream = timeout_at(deadline, self.tls.connect(server_name, stream))
            .await
            .map_err(|_| RequestError::DeadlineExceeded(Phase::Handshake))?
            .map_err(|source| RequestError::Handshake { host: request.host.clone(), source })?;

        Ok(Connection::Tls(Box::new(stream)))
    }

    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, RequestError> {
        let lookup = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|source| RequestError::Resolve { host: host.to_string(), source })?;
        Ok(lookup.iter().collect())
    }
}

async fn connect_any(host: &str, addresses: &[IpAddr], port: u16) -> Result<TcpStream, RequestError> {
    let mut last_error = None;
    for ip in addresses {
        let address = SocketAddr::new(*ip, port);
        match TcpStream::connect(address).await {
            Ok(stream) => return Ok(stream),
            Err(error) => {
                debug!(%address, %error, "connection attempt failed");
                last_error = Some(error);
            }
        }
    }

    match last_error {
        Some(source) => Err(RequestError::Connect { address: format!("{host}:{port}"), source }),
        None => Err(RequestError::NoAddress(host.to_string())),
    }
}

/// Builds a resolver from the system configuration, or from the resolver's defaults if that
/// configuration cannot be read.
#[must_use]
pub fn system_resolver() -> TokioAsyncResolver {
    match TokioAsyncResolver::tokio_from_system_conf() {
        Ok(resolver) => resolver,
        Err(error) => {
            warn!(%error, "could not read the system DNS configuration, falling back to default name servers");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        }
    }
}
