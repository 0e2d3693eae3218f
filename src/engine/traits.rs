use std::net::IpAddr;

/// What the engine needs to know about an inbound request.
///
/// Implemented by the request-interception layer; the engine never sees the
/// underlying connection or request types.
pub trait RequestContext: Send + Sync {
    /// Address of the directly connected peer, if the transport has one.
    fn peer_addr(&self) -> Option<IpAddr>;

    /// First value of the named header. `None` when absent or not valid text.
    fn header(&self, name: &str) -> Option<&str>;
}
