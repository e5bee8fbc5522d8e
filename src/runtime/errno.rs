use std::{error::Error, fmt, io};

use hickory_resolver::{
    error::{ResolveError, ResolveErrorKind},
    proto::error::ProtoErrorKind,
};

use crate::{http::response::HttpError, runtime::executor::RequestError};

/// The class of a failed request.
///
/// Every class has a numeric code for the line-record output. Some classes share a code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Errno {
    /// The host name does not exist or has no address records.
    DnsNotFound,
    /// The DNS lookup itself timed out.
    DnsTimeout,
    /// The server's certificate could not be verified.
    TlsVerificationFailed,
    /// Nothing listens on the target port.
    ConnectionRefused,
    /// The request could not be written.
    WriteFailed,
    /// The per-request deadline passed.
    Timeout,
    /// The response could not be read or was malformed.
    ReadFailed,
    /// Anything else.
    Unclassified,
}

impl Errno {
    /// The numeric code written to the `errno` field.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::DnsNotFound => 10,
            Self::DnsTimeout => 11,
            Self::TlsVerificationFailed => 20,
            Self::ConnectionRefused | Self::WriteFailed => 30,
            Self::Timeout => 31,
            Self::ReadFailed | Self::Unclassified => 99,
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DnsNotFound => "dns-not-found",
            Self::DnsTimeout => "dns-resolution-timeout",
            Self::TlsVerificationFailed => "tls-verification-failed",
            Self::ConnectionRefused => "connection-refused",
            Self::WriteFailed => "write-failed",
            Self::Timeout => "timeout-exceeded",
            Self::ReadFailed => "read-failed",
            Self::Unclassified => "unclassified",
        };
        write!(f, "{name}")
    }
}

/// Classifies a request error.
///
/// Deadline errors win over everything else, then DNS, refused connections and certificate
/// failures. Write and read failures come last.
#[must_use]
pub fn classify(error: &RequestError) -> Errno {
    if is_timeout(error) {
        return Errno::Timeout;
    }

    match error {
        RequestError::NoAddress(_) => Errno::DnsNotFound,
        RequestError::Resolve { source, .. } => classify_resolve(source),
        RequestError::Connect { source, .. } if source.kind() == io::ErrorKind::ConnectionRefused => {
            Errno::ConnectionRefused
        }
        RequestError::Handshake { source, .. } if is_certificate_error(source) => Errno::TlsVerificationFailed,
        RequestError::Write(_) => Errno::WriteFailed,
        RequestError::Extract(_) => Errno::ReadFailed,
        _ => Errno::Unclassified,
    }
}

fn is_timeout(error: &RequestError) -> bool {
    match error {
        RequestError::DeadlineExceeded(_) => true,
        RequestError::Connect { source, .. } | RequestError::Handshake { source, .. } | RequestError::Write(source) => {
            source.kind() == io::ErrorKind::TimedOut
        }
        RequestError::Extract(HttpError::Io(source)) => source.kind() == io::ErrorKind::TimedOut,
        _ => false,
    }
}

fn classify_resolve(error: &ResolveError) -> Errno {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => Errno::DnsNotFound,
        ResolveErrorKind::Timeout => Errno::DnsTimeout,
        ResolveErrorKind::Proto(proto) if matches!(proto.kind(), ProtoErrorKind::Timeout) => Errno::DnsTimeout,
        ResolveErrorKind::Io(source) if source.kind() == io::ErrorKind::TimedOut => Errno::DnsTimeout,
        _ => Errno::Unclassified,
    }
}

fn is_certificate_error(error: &io::Error) -> bool {
    let mut cause = error.get_ref().map(|inner| -> &(dyn Error + 'static) { inner });
    while let Some(current) = cause {
        if matches!(current.downcast_ref::<rustls::Error>(), Some(rustls::Error::InvalidCertificate(_))) {
            return true;
        }
        cause = current.source();
    }
    false
}
