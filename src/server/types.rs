use crate::engine::RequestContext;
use axum::http::HeaderMap;
use std::net::IpAddr;

/// Request context backed by an HTTP access-check subrequest.
pub struct HttpRequestContext<'a> {
    pub peer: Option<IpAddr>,
    pub headers: &'a HeaderMap,
}

impl RequestContext for HttpRequestContext<'_> {
    fn peer_addr(&self) -> Option<IpAddr> {
        self.peer
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
