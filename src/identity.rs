//! Caller identity resolution from request metadata.

use http::header::{HeaderMap, USER_AGENT};
use std::net::SocketAddr;

use crate::error::{CallgateError, Result};
use crate::ratelimit::CallerIdentity;

/// Header a client or upstream may set with the original client address.
pub const CLIENT_IP_HEADER: &str = "client-ip";
/// De-facto proxy chain header.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

impl CallerIdentity {
    /// Resolve the caller from request headers and the transport address.
    ///
    /// The IP is taken from `Client-IP`, then the first entry of
    /// `X-Forwarded-For`, then `remote`. Blank or non-UTF-8 header values
    /// are skipped. Fails with `InvalidIdentity` when none of them yields
    /// an address.
    pub fn from_headers(headers: &HeaderMap, remote: Option<SocketAddr>) -> Result<Self> {
        let ip = header_value(headers, CLIENT_IP_HEADER)
            .or_else(|| {
                header_value(headers, FORWARDED_FOR_HEADER)
                    .and_then(|chain| chain.split(',').next().map(str::trim))
                    .filter(|first| !first.is_empty())
            })
            .map(str::to_string)
            .or_else(|| remote.map(|addr| addr.ip().to_string()))
            .ok_or_else(|| {
                CallgateError::InvalidIdentity("no client address in request".to_string())
            })?;

        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(Self { ip, user_agent })
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
