/// Module containing the connection setup: resolving, connecting and the TLS handshake
pub mod connection;
/// Module containing the deadline decorator for connections
pub mod deadline;
/// Module containing the error classification
pub mod errno;
/// Module containing the single request executor
pub mod executor;
/// Module containing the traits the pipeline is built on
pub mod handler;
/// Module containing the worker pool
pub mod pipeline;
/// Module containing the first-byte timing reader
pub mod timed_reader;
/// Module containing the TLS client configuration
pub mod tls;
