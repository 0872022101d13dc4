/// Request header helpers shared by handlers and extractors
use crate::audit::ClientInfo;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use axum_extra::{headers::UserAgent, TypedHeader};
use std::{convert::Infallible, net::SocketAddr};

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Client address as reported by a fronting proxy
///
/// First entry of `X-Forwarded-For`, then `X-Real-IP`.
pub fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .map(str::to_string)
}

/// Build audit client info from request parts
pub fn client_info(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    user_agent: Option<&UserAgent>,
) -> ClientInfo {
    ClientInfo {
        ip_address: forwarded_ip(headers).or_else(|| peer.map(|addr| addr.ip().to_string())),
        user_agent: user_agent.map(|ua| ua.as_str().to_string()),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = TypedHeader::<UserAgent>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|TypedHeader(ua)| ua);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(client_info(&parts.headers, peer, user_agent.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc.def"));

        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_client_info_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));

        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let info = client_info(&headers, Some(peer), None);
        assert_eq!(info.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(info.user_agent, None);
    }

    #[test]
    fn test_client_info_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(
            client_info(&headers, None, None).ip_address.as_deref(),
            Some("10.0.0.2")
        );

        let peer: SocketAddr = "192.0.2.4:443".parse().unwrap();
        let ua = UserAgent::from_static("curl/8.0");
        let info = client_info(&HeaderMap::new(), Some(peer), Some(&ua));
        assert_eq!(info.ip_address.as_deref(), Some("192.0.2.4"));
        assert_eq!(info.user_agent.as_deref(), Some("curl/8.0"));
    }
}
