//! Address utilities (C2): IPv4 textual/integer conversions, peer-list parsing
//! with `self`/`unavailable` markers, and broadcast/multicast classification.
//!
//! Ported from the reference implementation's `Utils.hpp`: there is no Rust-side
//! teacher counterpart for ordered self/unavailable peer lists (the teacher's
//! own config parser works from CIDR-based `AllowedIPs`, not index-assigned
//! virtual IPs), so this module is translated directly from the original
//! semantics rather than adapted from existing Rust code.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::error::AddressError;

/// Convert a dotted-quad IPv4 address into its big-endian `u32` representation.
pub fn ipv4_to_u32(addr: Ipv4Addr) -> u32 {
    u32::from_be_bytes(addr.octets())
}

/// Convert a big-endian `u32` back into a dotted-quad IPv4 address.
pub fn u32_to_ipv4(value: u32) -> Ipv4Addr {
    Ipv4Addr::from(value.to_be_bytes())
}

/// Split `host:port` on the rightmost `:`. Returns `None` if either half is
/// empty or the port does not parse, signalling malformed input.
pub fn split_host_port(s: &str) -> Option<(Ipv4Addr, u16)> {
    let colon = s.rfind(':')?;
    let (host, port) = (&s[..colon], &s[colon + 1..]);
    if host.is_empty() || port.is_empty() {
        return None;
    }
    let host: Ipv4Addr = host.parse().ok()?;
    let port: u16 = port.parse().ok()?;
    Some((host, port))
}

/// One parsed peer-list entry: the reference implementation's `self`/`unavailable`
/// sentinel tokens, or a concrete `(endpoint, public_key)` entry.
#[derive(Debug, Clone)]
pub enum PeerEntry {
    SelfMarker,
    Unavailable,
    Peer { endpoint: (Ipv4Addr, u16), public_key: [u8; 32] },
}

/// One resolved peer, keyed by assigned virtual IP.
#[derive(Debug, Clone)]
pub struct ResolvedPeer {
    pub public_ip: Ipv4Addr,
    pub public_port: u16,
    pub public_key: [u8; 32],
}

/// Parse an ordered peer list into a `virtual_ip -> resolved peer` map.
///
/// `entries[i]` is either the literal string `"self"`, the literal string
/// `"unavailable"`, or `"<ip>:<port>"` paired with a 32-byte public key supplied
/// out of band by the caller (the control channel delivers endpoint text and key
/// bytes separately; callers zip them before calling this function — see
/// `PeerEntry`).
///
/// Each entry except `unavailable` consumes a virtual-IP octet starting at `1`
/// within `base`. `self` must land exactly on `self_index`; any mismatch, or any
/// malformed `host:port`, fails closed and returns an empty map (spec §4.2,
/// §9 open question (a)).
pub fn parse_peer_list(
    entries: &[PeerEntry],
    base: Ipv4Addr,
    self_index: usize,
) -> HashMap<Ipv4Addr, ResolvedPeer> {
    let base_octets = base.octets();
    let mut result = HashMap::new();
    let mut next_octet: u16 = 1;
    let mut self_seen_at: Option<usize> = None;

    for (i, entry) in entries.iter().enumerate() {
        match entry {
            PeerEntry::Unavailable => {
                // Does not consume a virtual-IP slot.
                continue;
            }
            PeerEntry::SelfMarker => {
                if i != self_index {
                    return HashMap::new();
                }
                self_seen_at = Some(i);
                next_octet += 1;
            }
            PeerEntry::Peer { endpoint, public_key } => {
                if next_octet > 254 {
                    return HashMap::new();
                }
                let vip = Ipv4Addr::new(
                    base_octets[0],
                    base_octets[1],
                    base_octets[2],
                    next_octet as u8,
                );
                result.insert(
                    vip,
                    ResolvedPeer {
                        public_ip: endpoint.0,
                        public_port: endpoint.1,
                        public_key: *public_key,
                    },
                );
                next_octet += 1;
            }
        }
    }

    if self_seen_at != Some(self_index) {
        return HashMap::new();
    }

    result
}

/// Parse the textual form of a peer list (as delivered by the RPC surface) where
/// each entry is `"self"`, `"unavailable"`, or `"ip:port"`, zipped with a
/// parallel list of public keys (one key per non-marker entry, in order).
///
/// Returns `AddressError::MalformedHostPort`/`SelfIndexMismatch` via an empty
/// map, matching `parse_peer_list`'s fail-closed contract; this wrapper exists
/// purely to translate the RPC's flat string+key-list shape into `PeerEntry`s.
pub fn parse_peer_list_text(
    entries: &[String],
    keys: &[[u8; 32]],
    base: Ipv4Addr,
    self_index: usize,
) -> Result<HashMap<Ipv4Addr, ResolvedPeer>, AddressError> {
    let mut parsed = Vec::with_capacity(entries.len());
    let mut key_iter = keys.iter();

    for entry in entries {
        match entry.as_str() {
            "self" => parsed.push(PeerEntry::SelfMarker),
            "unavailable" => parsed.push(PeerEntry::Unavailable),
            text => {
                let endpoint = split_host_port(text).ok_or_else(|| AddressError::MalformedHostPort {
                    value: text.to_string(),
                })?;
                let public_key = *key_iter
                    .next()
                    .ok_or_else(|| AddressError::MalformedHostPort { value: text.to_string() })?;
                parsed.push(PeerEntry::Peer { endpoint, public_key });
            }
        }
    }

    let map = parse_peer_list(&parsed, base, self_index);
    if map.is_empty() && !entries.is_empty() {
        return Err(AddressError::SelfIndexMismatch { expected: self_index });
    }
    Ok(map)
}

/// Classify a destination IPv4 address as broadcast/multicast fan-out, given the
/// overlay's `/24` base.
pub fn is_fanout_destination(dst: Ipv4Addr, base: Ipv4Addr) -> bool {
    let base_octets = base.octets();
    let dst_octets = dst.octets();

    let subnet_broadcast = dst_octets[0] == base_octets[0]
        && dst_octets[1] == base_octets[1]
        && dst_octets[2] == base_octets[2]
        && dst_octets[3] == 255;
    let limited_broadcast = dst == Ipv4Addr::new(255, 255, 255, 255);
    let multicast = (ipv4_to_u32(dst) >> 28) == 14;

    subnet_broadcast || limited_broadcast || multicast
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_round_trip() {
        let addr: Ipv4Addr = "203.0.113.42".parse().unwrap();
        assert_eq!(u32_to_ipv4(ipv4_to_u32(addr)), addr);
    }

    #[test]
    fn split_host_port_basic() {
        assert_eq!(
            split_host_port("1.2.3.4:5000"),
            Some((Ipv4Addr::new(1, 2, 3, 4), 5000))
        );
    }

    #[test]
    fn split_host_port_rejects_malformed() {
        assert!(split_host_port("no-colon-here").is_none());
        assert!(split_host_port(":5000").is_none());
        assert!(split_host_port("1.2.3.4:").is_none());
    }

    #[test]
    fn peer_list_self_and_unavailable_semantics() {
        // Seed scenario 2: self consumes a vIP slot, unavailable does not.
        let entries = vec![
            "1.2.3.4:5000".to_string(),
            "self".to_string(),
            "unavailable".to_string(),
            "6.7.8.9:6000".to_string(),
        ];
        let keys = vec![[1u8; 32], [3u8; 32]];
        let base: Ipv4Addr = "10.0.0.0".parse().unwrap();

        let map = parse_peer_list_text(&entries, &keys, base, 1).unwrap();

        assert_eq!(map.len(), 2);
        let p1 = &map[&Ipv4Addr::new(10, 0, 0, 1)];
        assert_eq!(p1.public_ip, Ipv4Addr::new(1, 2, 3, 4));
        assert_eq!(p1.public_port, 5000);
        let p3 = &map[&Ipv4Addr::new(10, 0, 0, 3)];
        assert_eq!(p3.public_ip, Ipv4Addr::new(6, 7, 8, 9));
        assert_eq!(p3.public_port, 6000);
    }

    #[test]
    fn peer_list_self_index_mismatch_fails_closed() {
        // Seed scenario 3: same input, self_index=0 instead of 1 -> empty map.
        let entries = vec![
            "1.2.3.4:5000".to_string(),
            "self".to_string(),
            "unavailable".to_string(),
            "6.7.8.9:6000".to_string(),
        ];
        let keys = vec![[1u8; 32], [3u8; 32]];
        let base: Ipv4Addr = "10.0.0.0".parse().unwrap();

        assert!(parse_peer_list_text(&entries, &keys, base, 0).is_err());
    }

    #[test]
    fn peer_list_parse_is_idempotent() {
        let entries = vec!["self".to_string(), "1.2.3.4:5000".to_string()];
        let keys = vec![[1u8; 32]];
        let base: Ipv4Addr = "10.0.0.0".parse().unwrap();

        let first = parse_peer_list_text(&entries, &keys, base, 0).unwrap();
        let second = parse_peer_list_text(&entries, &keys, base, 0).unwrap();
        assert_eq!(first.len(), second.len());
        for (vip, peer) in &first {
            let other = &second[vip];
            assert_eq!(peer.public_ip, other.public_ip);
            assert_eq!(peer.public_port, other.public_port);
        }
    }

    #[test]
    fn fanout_classification() {
        let base: Ipv4Addr = "10.0.0.0".parse().unwrap();
        assert!(is_fanout_destination(Ipv4Addr::new(10, 0, 0, 255), base));
        assert!(is_fanout_destination(Ipv4Addr::new(255, 255, 255, 255), base));
        assert!(is_fanout_destination(Ipv4Addr::new(224, 0, 0, 1), base));
        assert!(is_fanout_destination(Ipv4Addr::new(239, 1, 2, 3), base));
        assert!(!is_fanout_destination(Ipv4Addr::new(10, 0, 0, 5), base));
    }
}
