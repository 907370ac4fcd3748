use std::{fmt, num::NonZeroU16, str::FromStr};

/// A port restriction attached to an ACL.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AclPort {
    pub protocol: Protocol,

    /// When unset, all ports of the protocol are matched.
    pub port: Option<PortRef>,

    /// The last port of an inclusive range starting at `port`.
    pub end_port: Option<NonZeroU16>,
}

/// References a workload port by number or by container port name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PortRef {
    Number(NonZeroU16),
    Name(String),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidPort {
    #[error("unsupported protocol: {0}")]
    Protocol(String),

    #[error("port out of range: {0}")]
    OutOfRange(i32),

    #[error("end port {end} requires a numeric port")]
    EndPortWithoutPort { end: i32 },
}

// === impl AclPort ===

impl AclPort {
    pub fn all(protocol: Protocol) -> Self {
        Self {
            protocol,
            port: None,
            end_port: None,
        }
    }

    pub fn number(protocol: Protocol, port: i32) -> Result<Self, InvalidPort> {
        Ok(Self {
            protocol,
            port: Some(PortRef::Number(port_number(port)?)),
            end_port: None,
        })
    }

    pub fn with_end_port(mut self, end: i32) -> Result<Self, InvalidPort> {
        match self.port {
            Some(PortRef::Number(_)) => {
                self.end_port = Some(port_number(end)?);
                Ok(self)
            }
            _ => Err(InvalidPort::EndPortWithoutPort { end }),
        }
    }
}

fn port_number(port: i32) -> Result<NonZeroU16, InvalidPort> {
    u16::try_from(port)
        .ok()
        .and_then(NonZeroU16::new)
        .ok_or(InvalidPort::OutOfRange(port))
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => fmt::Display::fmt(n, f),
            Self::Name(n) => fmt::Display::fmt(n, f),
        }
    }
}

// === impl Protocol ===

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Sctp => "sctp",
        }
    }
}

impl FromStr for Protocol {
    type Err = InvalidPort;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("tcp") {
            Ok(Self::Tcp)
        } else if s.eq_ignore_ascii_case("udp") {
            Ok(Self::Udp)
        } else if s.eq_ignore_ascii_case("sctp") {
            Ok(Self::Sctp)
        } else {
            Err(InvalidPort::Protocol(s.to_string()))
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
