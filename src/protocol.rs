//! Protocol types for the region probe
//!
//! Keys and values are opaque byte strings on the wire. These newtypes give
//! them a printable form for the report without assuming an encoding.

use bytes::Bytes;
use std::fmt;

/// Locator endpoint the probe connects to
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// URI for the gRPC channel. Bare IPv6 literals get bracketed.
    pub fn uri(&self) -> String {
        format!("http://{}", self)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Writes UTF-8 payloads as text and anything else in escaped byte form
fn fmt_payload(data: &Bytes, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match std::str::from_utf8(data) {
        Ok(s) => f.write_str(s),
        Err(_) => write!(f, "{:?}", data),
    }
}

/// Key of a region entry
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionKey(pub Bytes);

impl RegionKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_payload(&self.0, f)
    }
}

impl From<Vec<u8>> for RegionKey {
    fn from(v: Vec<u8>) -> Self {
        Self(Bytes::from(v))
    }
}

impl From<&str> for RegionKey {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for RegionKey {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

/// Value of a region entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionValue(pub Bytes);

impl fmt::Display for RegionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_payload(&self.0, f)
    }
}

impl From<Vec<u8>> for RegionValue {
    fn from(v: Vec<u8>) -> Self {
        Self(Bytes::from(v))
    }
}

impl From<&str> for RegionValue {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for RegionValue {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_display() {
        assert_eq!(Target::new("localhost", 10334).to_string(), "localhost:10334");
        assert_eq!(Target::new("::1", 10334).to_string(), "[::1]:10334");
        assert_eq!(Target::new("[::1]", 10334).uri(), "http://[::1]:10334");
    }

    #[test]
    fn test_payload_display() {
        assert_eq!(RegionKey::from("k1").to_string(), "k1");
        let binary = RegionValue::from(vec![0xff, 0x00]);
        assert_eq!(binary.to_string(), "b\"\\xff\\0\"");
    }
}
