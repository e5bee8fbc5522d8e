//! # preq
//!
//! Sends raw HTTP/1.1 requests and copies exactly one response per request off the connection,
//! byte for byte.
//!
//! The crate is split into the response framer in [`http`], the connection handling and worker
//! pool in [`runtime`], and the JSON-lines record format in [`httpipe`].
/// Module containing the configuration layering
pub mod config;
/// Module containing the HTTP response framer
pub mod http;
/// Module containing the JSON-lines record format
pub mod httpipe;
/// Module containing the logging setup
pub mod logging;
/// Module containing the request and result records
pub mod model;
/// Module containing the request execution and the worker pool
pub mod runtime;
