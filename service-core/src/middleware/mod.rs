pub mod redaction;
pub mod tracing;
