use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::CodecError;

/// The network context of a node in the service graph.
///
/// Immutable once built; spans and V1 annotations hold their own copies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Endpoint {
    service_name: Option<String>,
    ipv4: Option<Ipv4Addr>,
    ipv6: Option<Ipv6Addr>,
    port: Option<u16>,
}

impl Endpoint {
    pub fn builder() -> EndpointBuilder {
        EndpointBuilder::default()
    }

    pub fn to_builder(&self) -> EndpointBuilder {
        EndpointBuilder {
            service_name: self.service_name.clone(),
            ipv4: self.ipv4,
            ipv6: self.ipv6,
            port: self.port.map(i32::from),
        }
    }

    /// Lower-case label of this node in the service graph.
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Dotted-quad form of the IPv4 address.
    pub fn ipv4(&self) -> Option<String> {
        self.ipv4.map(|ip| ip.to_string())
    }

    pub fn ipv4_addr(&self) -> Option<Ipv4Addr> {
        self.ipv4
    }

    pub fn ipv4_bytes(&self) -> Option<[u8; 4]> {
        self.ipv4.map(|ip| ip.octets())
    }

    /// Lower-case, compressed form of the IPv6 address.
    pub fn ipv6(&self) -> Option<String> {
        self.ipv6.map(|ip| ip.to_string())
    }

    pub fn ipv6_addr(&self) -> Option<Ipv6Addr> {
        self.ipv6
    }

    pub fn ipv6_bytes(&self) -> Option<[u8; 16]> {
        self.ipv6.map(|ip| ip.octets())
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// True when there is nothing to identify the node by.
    pub fn is_empty(&self) -> bool {
        self.service_name.is_none()
            && self.ipv4.is_none()
            && self.ipv6.is_none()
            && self.port.is_none()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = crate::json::endpoint_to_json(self);
        f.write_str(&json)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EndpointBuilder {
    service_name: Option<String>,
    ipv4: Option<Ipv4Addr>,
    ipv6: Option<Ipv6Addr>,
    port: Option<i32>,
}

impl EndpointBuilder {
    /// Sets the service name, lower-cased. An empty name clears it.
    pub fn service_name(mut self, service_name: impl AsRef<str>) -> Self {
        self.set_service_name(service_name.as_ref());
        self
    }

    pub(crate) fn set_service_name(&mut self, service_name: &str) {
        self.service_name = if service_name.is_empty() {
            None
        } else {
            Some(service_name.to_lowercase())
        };
    }

    /// Sets the address from a textual form, ignoring anything unparseable.
    pub fn ip(mut self, ip: &str) -> Self {
        self.parse_ip(ip);
        self
    }

    pub fn ip_addr(mut self, ip: IpAddr) -> Self {
        self.parse_ip_addr(ip);
        self
    }

    /// Returns false and leaves the builder unchanged when `ip` isn't an address.
    ///
    /// An IPv6 literal with an embedded dotted quad is only accepted when it is
    /// IPv4-mapped or IPv4-compatible, and is then stored as IPv4.
    pub fn parse_ip(&mut self, ip: &str) -> bool {
        if ip.is_empty() {
            return false;
        }
        if let Ok(v4) = ip.parse::<Ipv4Addr>() {
            return self.parse_ip_addr(IpAddr::V4(v4));
        }
        let Ok(v6) = ip.parse::<Ipv6Addr>() else {
            return false;
        };
        if ip.contains('.') {
            let segments = v6.segments();
            let compat_or_mapped =
                segments[..5].iter().all(|s| *s == 0) && (segments[5] == 0 || segments[5] == 0xffff);
            if !compat_or_mapped {
                return false;
            }
            let [.., a, b, c, d] = v6.octets();
            return self.parse_ip_addr(IpAddr::V4(Ipv4Addr::new(a, b, c, d)));
        }
        self.parse_ip_addr(IpAddr::V6(v6))
    }

    /// Accepts a 4 or 16 byte address.
    pub fn parse_ip_bytes(&mut self, ip: &[u8]) -> bool {
        if let Ok(v4) = <[u8; 4]>::try_from(ip) {
            return self.parse_ip_addr(IpAddr::V4(Ipv4Addr::from(v4)));
        }
        if let Ok(v6) = <[u8; 16]>::try_from(ip) {
            return self.parse_ip_addr(IpAddr::V6(Ipv6Addr::from(v6)));
        }
        false
    }

    pub fn parse_ip_addr(&mut self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => self.ipv4 = Some(v4),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => self.ipv4 = Some(v4),
                None => self.ipv6 = Some(v6),
            },
        }
        true
    }

    /// Zero or negative ports mean no port. Ports above 65535 fail [`build`](Self::build).
    pub fn port(mut self, port: i32) -> Self {
        self.port = (port > 0).then_some(port);
        self
    }

    pub(crate) fn set_port(&mut self, port: i64) {
        let port = i32::try_from(port).unwrap_or(if port < 0 { 0 } else { i32::MAX });
        self.port = (port > 0).then_some(port);
    }

    pub fn build(self) -> Result<Endpoint, CodecError> {
        let port = match self.port {
            None => None,
            Some(port) => Some(
                u16::try_from(port)
                    .map_err(|_| CodecError::invalid_argument(format!("invalid port {port}")))?,
            ),
        };
        Ok(Endpoint {
            service_name: self.service_name,
            ipv4: self.ipv4,
            ipv6: self.ipv6,
            port,
        })
    }

    /// Builds, collapsing an endpoint with nothing set to `None`.
    pub(crate) fn build_non_empty(self) -> Result<Option<Endpoint>, CodecError> {
        let endpoint = self.build()?;
        Ok((!endpoint.is_empty()).then_some(endpoint))
    }
}
