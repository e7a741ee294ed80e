//! Unified error types for divak.
//!
//! Defines [`DivakError`] using `thiserror` for `Display` and `Error`
//! derives. Every variant is a configuration-time failure: the request
//! path never produces a `DivakError` — per-request anomalies degrade
//! to placeholder values instead of failing the request.

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DivakError {
    #[error("Invalid header name '{name}': {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: http::header::InvalidHeaderName,
    },

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}
