//! ZeroMQ socket types and which pairs may talk to each other.

use std::fmt;

/// Socket type advertised in the READY command's `Socket-Type` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketType {
    Req,
    Rep,
    Dealer,
    Router,
    Pub,
    Sub,
    XPub,
    XSub,
}

impl SocketType {
    /// Wire name of the socket type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Req => "REQ",
            Self::Rep => "REP",
            Self::Dealer => "DEALER",
            Self::Router => "ROUTER",
            Self::Pub => "PUB",
            Self::Sub => "SUB",
            Self::XPub => "XPUB",
            Self::XSub => "XSUB",
        }
    }

    /// Parse a wire name. Unknown names return `None`.
    pub fn from_wire(name: &[u8]) -> Option<Self> {
        match name {
            b"REQ" => Some(Self::Req),
            b"REP" => Some(Self::Rep),
            b"DEALER" => Some(Self::Dealer),
            b"ROUTER" => Some(Self::Router),
            b"PUB" => Some(Self::Pub),
            b"SUB" => Some(Self::Sub),
            b"XPUB" => Some(Self::XPub),
            b"XSUB" => Some(Self::XSub),
            _ => None,
        }
    }

    /// Returns true if a socket of this type may connect to `peer`.
    pub fn is_compatible_with(self, peer: SocketType) -> bool {
        use SocketType::*;
        matches!(
            (self, peer),
            (Req, Rep | Router)
                | (Rep, Req | Dealer)
                | (Dealer, Rep | Dealer | Router)
                | (Router, Req | Dealer | Router)
                | (Pub | XPub, Sub | XSub)
                | (Sub | XSub, Pub | XPub)
        )
    }

    /// Returns true if this socket type sends an `Identity` property in READY.
    pub fn sends_identity(self) -> bool {
        matches!(self, Self::Req | Self::Dealer | Self::Router)
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_socket_pairs_are_compatible() {
        assert!(SocketType::Req.is_compatible_with(SocketType::Router));
        assert!(SocketType::Req.is_compatible_with(SocketType::Rep));
        assert!(SocketType::Sub.is_compatible_with(SocketType::Pub));
        assert!(SocketType::Pub.is_compatible_with(SocketType::Sub));
    }

    #[test]
    fn mismatched_pairs_are_rejected() {
        assert!(!SocketType::Req.is_compatible_with(SocketType::Pub));
        assert!(!SocketType::Sub.is_compatible_with(SocketType::Router));
        assert!(!SocketType::Req.is_compatible_with(SocketType::Req));
    }

    #[test]
    fn wire_names_roundtrip() {
        for ty in [
            SocketType::Req,
            SocketType::Rep,
            SocketType::Dealer,
            SocketType::Router,
            SocketType::Pub,
            SocketType::Sub,
            SocketType::XPub,
            SocketType::XSub,
        ] {
            assert_eq!(SocketType::from_wire(ty.as_str().as_bytes()), Some(ty));
        }
        assert_eq!(SocketType::from_wire(b"PAIR"), None);
    }
}
