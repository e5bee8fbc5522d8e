/// Module containing logic to decide and copy response bodies
pub mod body;
/// Module containing logic to track the headers that frame a body
pub mod headers;
/// Module containing the response extractor
pub mod response;
/// Module containing logic to parse HTTP status lines
pub mod status_line;
