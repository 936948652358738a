//! Peer table & connection records (C6).
//!
//! Two maps maintained together by the datapath executor, the sole writer
//! (spec §4.6): `virtual_to_public` and `public_to_record`. Ported from the
//! reference implementation's `virtualIpToPublicIp`/`publicIpToConnection` map
//! pair in `NetworkingModule.cpp`.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Instant;

use crate::crypto::SharedSecret;

/// A peer's public endpoint: `(public_ipv4, udp_port)`.
pub type PublicEndpoint = (Ipv4Addr, u16);

/// Per-peer datapath state. Exclusively owned by C7.
pub struct PeerRecord {
    pub public_endpoint: PublicEndpoint,
    pub shared_secret: SharedSecret,
    pub last_activity: Instant,
    pub connected: bool,
}

/// The paired peer table. `self_virtual_ip` is never present as a key in
/// `virtual_to_public` (spec invariant).
pub struct PeerTable {
    virtual_to_public: HashMap<Ipv4Addr, PublicEndpoint>,
    public_to_record: HashMap<Ipv4Addr, PeerRecord>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self {
            virtual_to_public: HashMap::new(),
            public_to_record: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.virtual_to_public.is_empty() && self.public_to_record.is_empty()
    }

    pub fn len(&self) -> usize {
        self.virtual_to_public.len()
    }

    /// Insert a peer into both maps atomically. Fails (no-op, returns `false`)
    /// if `virtual_ip == self_virtual_ip`, preserving "self is never a peer".
    pub fn insert(
        &mut self,
        self_virtual_ip: Ipv4Addr,
        virtual_ip: Ipv4Addr,
        public_endpoint: PublicEndpoint,
        shared_secret: SharedSecret,
    ) -> bool {
        if virtual_ip == self_virtual_ip {
            return false;
        }
        self.virtual_to_public.insert(virtual_ip, public_endpoint);
        self.public_to_record.insert(
            public_endpoint.0,
            PeerRecord {
                public_endpoint,
                shared_secret,
                last_activity: Instant::now(),
                connected: false,
            },
        );
        true
    }

    pub fn lookup_by_virtual(&self, virtual_ip: Ipv4Addr) -> Option<&PublicEndpoint> {
        self.virtual_to_public.get(&virtual_ip)
    }

    pub fn record_for_public(&self, public_ip: Ipv4Addr) -> Option<&PeerRecord> {
        self.public_to_record.get(&public_ip)
    }

    pub fn record_for_public_mut(&mut self, public_ip: Ipv4Addr) -> Option<&mut PeerRecord> {
        self.public_to_record.get_mut(&public_ip)
    }

    pub fn all_public_ips(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.public_to_record.keys().copied()
    }

    pub fn virtual_ips(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.virtual_to_public.keys().copied()
    }

    pub fn iter_records(&self) -> impl Iterator<Item = (&Ipv4Addr, &PeerRecord)> {
        self.public_to_record.iter()
    }

    /// Reverse-lookup the virtual IP bound to a given public endpoint. Used
    /// everywhere a removal needs to touch `virtual_to_public` correctly keyed
    /// (see DESIGN.md for why this reverse-lookup-then-erase pattern replaces
    /// the reference implementation's direct-by-public-ip erase, which keyed
    /// the virtual-IP map by the wrong IP family in one call site).
    pub fn virtual_ip_for_public(&self, public_ip: Ipv4Addr) -> Option<Ipv4Addr> {
        self.virtual_to_public
            .iter()
            .find(|(_, endpoint)| endpoint.0 == public_ip)
            .map(|(vip, _)| *vip)
    }

    /// Remove a peer from both maps, keyed correctly: `public_ip` for
    /// `public_to_record`, the reverse-looked-up virtual IP for
    /// `virtual_to_public`. Paired removal preserves the table invariant.
    pub fn remove_by_public(&mut self, public_ip: Ipv4Addr) -> Option<PeerRecord> {
        if let Some(vip) = self.virtual_ip_for_public(public_ip) {
            self.virtual_to_public.remove(&vip);
        }
        self.public_to_record.remove(&public_ip)
    }

    pub fn clear(&mut self) {
        self.virtual_to_public.clear();
        self.public_to_record.clear();
    }
}

impl Default for PeerTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn endpoint(a: u8, b: u8, c: u8, d: u8, port: u16) -> PublicEndpoint {
        (Ipv4Addr::new(a, b, c, d), port)
    }

    #[test]
    fn insert_refuses_self_virtual_ip() {
        let mut table = PeerTable::new();
        let self_vip = Ipv4Addr::new(10, 0, 0, 1);
        let inserted = table.insert(self_vip, self_vip, endpoint(1, 2, 3, 4, 5000), [0u8; 32]);
        assert!(!inserted);
        assert!(table.is_empty());
    }

    #[test]
    fn paired_insert_and_remove() {
        let mut table = PeerTable::new();
        let self_vip = Ipv4Addr::new(10, 0, 0, 1);
        let peer_vip = Ipv4Addr::new(10, 0, 0, 2);
        let ep = endpoint(1, 2, 3, 4, 5000);

        assert!(table.insert(self_vip, peer_vip, ep, [1u8; 32]));
        assert_eq!(table.lookup_by_virtual(peer_vip), Some(&ep));
        assert!(table.record_for_public(ep.0).is_some());

        let removed = table.remove_by_public(ep.0);
        assert!(removed.is_some());
        assert!(table.lookup_by_virtual(peer_vip).is_none());
        assert!(table.record_for_public(ep.0).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn reverse_lookup_finds_correct_virtual_ip() {
        let mut table = PeerTable::new();
        let self_vip = Ipv4Addr::new(10, 0, 0, 1);
        let peer_vip = Ipv4Addr::new(10, 0, 0, 3);
        let ep = endpoint(9, 9, 9, 9, 4242);

        table.insert(self_vip, peer_vip, ep, [2u8; 32]);
        assert_eq!(table.virtual_ip_for_public(ep.0), Some(peer_vip));
    }
}
