//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber, with rolling
//! file output and redaction of credentials.

pub mod logger;
pub mod secret_scrubbing;

pub use logger::LoggerImpl;
pub use secret_scrubbing::SecretScrubber;
