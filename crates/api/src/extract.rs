//! Custom extractors.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

/// Network origin of the request, recorded as job provenance.
///
/// Falls back to `unknown` when the server was not started with connect
/// info (e.g. when the router is driven directly in tests).
#[derive(Debug, Clone)]
pub struct Submitter(pub String);

impl<S> FromRequestParts<S> for Submitter
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let origin = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(Self(origin))
    }
}
