use thiserror::Error;

/// Rejected by [`CorsMiddlewareBuilder::build`](super::CorsMiddlewareBuilder::build).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorsConfigError {
    #[error("wildcard origin (*) cannot be combined with credentials")]
    WildcardWithCredentials,
    #[error("origin {origin:?} is not of the form scheme://host[:port]")]
    InvalidOriginFormat { origin: String },
    #[error("credentials require at least one allowed origin")]
    EmptyOriginsWithCredentials,
}
