//! UDP datapath (C7): the connection core. A single executor task owns the
//! socket and the peer table; every other component posts work to it over an
//! `mpsc` command channel rather than touching its state directly, following
//! `examples/yaimbo-secure-guard/src/server.rs::event_loop`'s
//! `Option<mpsc::Receiver<_>>`-driven `tokio::select!` pattern.

mod header;

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::interval;

use crate::addr::{self, ResolvedPeer};
use crate::crypto::{self, Identity, SharedSecret};
use crate::error::{MinnowVpnError, NetworkError};
use crate::peers::PeerTable;
use crate::state::{NetworkEvent, StateManager};

use header::{attach_header, parse_header, PacketType, HEADER_LEN, MAX_DATAGRAM_LEN};

const HOLE_PUNCH_ROUNDS: usize = 5;
const HOLE_PUNCH_SPACING: Duration = Duration::from_millis(20);
const KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(4);
const EVICTION_POLL_PERIOD: Duration = Duration::from_millis(500);
const PEER_TIMEOUT: Duration = Duration::from_secs(20);
const EVICTION_GRACE: Duration = Duration::from_secs(2);
const DISCONNECT_BURST_ROUNDS: usize = 3;
const DISCONNECT_BURST_SPACING: Duration = Duration::from_millis(50);

/// Work posted into the datapath executor from outside (C3 ingress, C8 lifecycle
/// calls, C9 RPC handlers).
pub enum Command {
    /// A raw IP frame read off the virtual interface, to be routed and sent.
    Outbound(Vec<u8>),
    StartConnection {
        self_index: usize,
        peer_entries: Vec<String>,
        peer_keys: Vec<[u8; 32]>,
    },
    StopConnection,
    Shutdown,
    /// Snapshot the currently assigned peer virtual IPs, for route setup
    /// (spec §4.8 "add routes to each peer vIP").
    ListPeerVirtualIps(tokio::sync::oneshot::Sender<Vec<Ipv4Addr>>),
}

/// Sink the executor delivers decrypted inbound IP frames to (the virtual
/// interface's outbound queue, see `tunnel::TunDevice::send`).
pub type TunnelSink = mpsc::Sender<Vec<u8>>;

pub fn channel() -> (mpsc::Sender<Command>, mpsc::Receiver<Command>) {
    mpsc::channel(256)
}

/// The datapath executor. Owns `PeerTable` directly (not `Arc<Mutex<_>>`):
/// only this task ever touches it, so no internal locking is needed (spec §5).
pub struct Datapath {
    socket: UdpSocket,
    identity: Identity,
    overlay_base: Ipv4Addr,
    self_virtual_ip: Option<Ipv4Addr>,
    peers: PeerTable,
    state: std::sync::Arc<StateManager>,
    tunnel_sink: TunnelSink,
    next_seq: u32,
    pending_acks: HashMap<u32, Instant>,
    pending_evictions: Vec<(Ipv4Addr, Instant)>,
    running: bool,
    /// Guards `ALL_PEERS_DISCONNECTED` so emptying the table re-queues the
    /// event at most once per connection cycle, rather than on every
    /// eviction-poll tick while the table stays empty (spec §4.7.7).
    all_peers_disconnected_notified: bool,
}

impl Datapath {
    pub fn new(
        socket: UdpSocket,
        identity: Identity,
        overlay_base: Ipv4Addr,
        state: std::sync::Arc<StateManager>,
        tunnel_sink: TunnelSink,
    ) -> Self {
        Self {
            socket,
            identity,
            overlay_base,
            self_virtual_ip: None,
            peers: PeerTable::new(),
            state,
            tunnel_sink,
            next_seq: 0,
            pending_acks: HashMap::new(),
            pending_evictions: Vec::new(),
            running: false,
            all_peers_disconnected_notified: false,
        }
    }

    /// Spawn the executor as its own task and return the command sender other
    /// components use to reach it.
    pub fn spawn(self) -> mpsc::Sender<Command> {
        let (tx, rx) = channel();
        tokio::spawn(self.run(rx));
        tx
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut keepalive = interval(KEEP_ALIVE_PERIOD);
        let mut eviction_poll = interval(EVICTION_POLL_PERIOD);
        let mut recv_buf = vec![0u8; 65535];

        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(Command::Outbound(packet)) => self.handle_outbound(&packet).await,
                        Some(Command::StartConnection { self_index, peer_entries, peer_keys }) => {
                            if let Err(e) = self.start_connection(self_index, &peer_entries, &peer_keys).await {
                                tracing::warn!(error = %e, "start_connection failed");
                            }
                        }
                        Some(Command::StopConnection) => self.stop_connection().await,
                        Some(Command::ListPeerVirtualIps(reply)) => {
                            let _ = reply.send(self.peers.virtual_ips().collect());
                        }
                        Some(Command::Shutdown) | None => {
                            self.shutdown().await;
                            break;
                        }
                    }
                }
                received = self.socket.recv_from(&mut recv_buf), if self.running => {
                    match received {
                        Ok((len, from)) => self.handle_inbound(&recv_buf[..len], from).await,
                        Err(e) => tracing::warn!(error = %e, "datapath socket receive error"),
                    }
                }
                _ = keepalive.tick(), if self.running => {
                    self.send_keep_alive_round().await;
                    self.check_all_connections();
                }
                _ = eviction_poll.tick(), if self.running => {
                    self.run_due_evictions().await;
                }
            }
        }
    }

    /// Connection bring-up (spec §4.7.3): parse the peer list, populate the
    /// table, emit the hole-punch burst, and arm the keep-alive timer (the
    /// timer is driven unconditionally by the executor loop, gated by
    /// `running`).
    async fn start_connection(
        &mut self,
        self_index: usize,
        peer_entries: &[String],
        peer_keys: &[[u8; 32]],
    ) -> Result<(), MinnowVpnError> {
        // Per-record, not executor-wide: the executor can be `running` with
        // every peer still unconnected (no reply has arrived yet), and spec
        // §4.7.3 step 1 only rejects a *connected* peer, not a pending one.
        if self.peers.iter_records().any(|(_, record)| record.connected) {
            return Err(NetworkError::AlreadyConnected.into());
        }

        let self_virtual_ip = Ipv4Addr::new(
            self.overlay_base.octets()[0],
            self.overlay_base.octets()[1],
            self.overlay_base.octets()[2],
            (self_index as u8) + 1,
        );

        let resolved = addr::parse_peer_list_text(peer_entries, peer_keys, self.overlay_base, self_index)
            .map_err(MinnowVpnError::Address)?;
        if resolved.is_empty() && !peer_entries.is_empty() {
            return Err(NetworkError::InvalidPeerList.into());
        }

        self.self_virtual_ip = Some(self_virtual_ip);
        self.peers.clear();
        self.all_peers_disconnected_notified = false;

        for (vip, peer) in resolved {
            self.insert_peer(self_virtual_ip, vip, peer);
        }

        self.running = true;
        self.emit_hole_punch_burst().await;

        Ok(())
    }

    fn insert_peer(&mut self, self_virtual_ip: Ipv4Addr, virtual_ip: Ipv4Addr, peer: ResolvedPeer) {
        match crypto::derive_shared(&peer.public_key, &self.identity.secret_key) {
            Ok(secret) => {
                self.peers.insert(
                    self_virtual_ip,
                    virtual_ip,
                    (peer.public_ip, peer.public_port),
                    secret,
                );
            }
            Err(e) => {
                tracing::warn!(peer = %peer.public_ip, error = %e, "dropping peer: shared secret derivation failed");
            }
        }
    }

    async fn emit_hole_punch_burst(&mut self) {
        for _ in 0..HOLE_PUNCH_ROUNDS {
            for public_ip in self.peers.all_public_ips().collect::<Vec<_>>() {
                if let Some(record) = self.peers.record_for_public(public_ip) {
                    let endpoint = record.public_endpoint;
                    self.send_bare(endpoint, PacketType::HolePunch).await;
                }
            }
            tokio::time::sleep(HOLE_PUNCH_SPACING).await;
        }
    }

    /// Outbound path (spec §4.7.4): classify the destination, then unicast or
    /// fan out.
    async fn handle_outbound(&mut self, ip_packet: &[u8]) {
        if !self.running {
            return;
        }
        let Some(dest) = parse_ipv4_dest(ip_packet) else {
            return;
        };

        if let Some(&(public_ip, public_port)) = self.peers.lookup_by_virtual(dest) {
            if let Some(record) = self.peers.record_for_public(public_ip) {
                let secret = record.shared_secret;
                if let Err(e) = self.send_message((public_ip, public_port), &secret, ip_packet).await {
                    tracing::warn!(peer = %public_ip, error = %e, "failed to send MESSAGE");
                    if is_disconnect_worthy(&e) {
                        self.handle_disconnect(public_ip, true).await;
                    }
                }
            }
            return;
        }

        if addr::is_fanout_destination(dest, self.overlay_base) {
            for public_ip in self.peers.all_public_ips().collect::<Vec<_>>() {
                if let Some(record) = self.peers.record_for_public(public_ip) {
                    let endpoint = record.public_endpoint;
                    let secret = record.shared_secret;
                    if let Err(e) = self.send_message(endpoint, &secret, ip_packet).await {
                        tracing::warn!(peer = %public_ip, error = %e, "failed to send fan-out MESSAGE");
                        if is_disconnect_worthy(&e) {
                            self.handle_disconnect(public_ip, true).await;
                        }
                    }
                }
            }
        }
        // Otherwise: destination matches no peer and is not a fan-out target; drop silently.
    }

    /// Frame, encrypt, and send one `MESSAGE` (spec §4.7.5).
    async fn send_message(
        &mut self,
        endpoint: (Ipv4Addr, u16),
        secret: &SharedSecret,
        inner: &[u8],
    ) -> Result<(), NetworkError> {
        let sealed = crypto::seal(secret, inner).map_err(|_| NetworkError::FatalSend {
            reason: "seal failed".to_string(),
        })?;

        let total_len = HEADER_LEN + sealed.len();
        if total_len > MAX_DATAGRAM_LEN {
            return Err(NetworkError::MessageTooLarge { len: total_len });
        }

        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        let mut datagram = vec![0u8; total_len];
        attach_header(&mut datagram, PacketType::Message, seq, inner.len() as u32);
        datagram[HEADER_LEN..].copy_from_slice(&sealed);

        self.pending_acks.insert(seq, Instant::now());
        self.send_datagram(endpoint, &datagram).await
    }

    async fn send_bare(&mut self, endpoint: (Ipv4Addr, u16), packet_type: PacketType) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        let mut datagram = [0u8; HEADER_LEN];
        attach_header(&mut datagram, packet_type, seq, 0);
        if let Err(e) = self.send_datagram(endpoint, &datagram).await {
            tracing::trace!(?packet_type, error = %e, "bare packet send failed");
        }
    }

    async fn send_datagram(&self, endpoint: (Ipv4Addr, u16), datagram: &[u8]) -> Result<(), NetworkError> {
        let addr: SocketAddr = SocketAddrV4::new(endpoint.0, endpoint.1).into();
        match self.socket.send_to(datagram, addr).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(NetworkError::TransientSend),
            Err(e) => Err(NetworkError::FatalSend { reason: e.to_string() }),
        }
    }

    /// Inbound receive loop body (spec §4.7.6).
    async fn handle_inbound(&mut self, data: &[u8], from: SocketAddr) {
        let Some(header) = parse_header(data) else {
            return;
        };
        let SocketAddr::V4(from_v4) = from else {
            return;
        };
        let sender_ip = *from_v4.ip();

        if self.peers.record_for_public_mut(sender_ip).is_none() {
            // Datagram from an endpoint outside the current peer table: ignore.
            return;
        }
        if let Some(record) = self.peers.record_for_public_mut(sender_ip) {
            record.last_activity = Instant::now();
        }

        if header.packet_type == PacketType::Disconnect {
            self.handle_disconnect(sender_ip, false).await;
            return;
        }

        if let Some(record) = self.peers.record_for_public_mut(sender_ip) {
            if !record.connected {
                record.connected = true;
                self.state.queue_event(NetworkEvent::PeerConnected { endpoint: sender_ip });
            }
        }

        match header.packet_type {
            PacketType::HolePunch | PacketType::Heartbeat => {
                // Activity already refreshed above; nothing further to do.
            }
            PacketType::Message => {
                self.handle_message(&header, data, sender_ip, from_v4.port()).await;
            }
            PacketType::Ack => {
                self.pending_acks.remove(&header.seq);
            }
            PacketType::Disconnect => unreachable!("handled above"),
        }
    }

    async fn handle_message(
        &mut self,
        header: &header::Header,
        data: &[u8],
        sender_ip: Ipv4Addr,
        sender_port: u16,
    ) {
        const MIN_MESSAGE_LEN: usize = HEADER_LEN + 24 + 16;
        if data.len() < MIN_MESSAGE_LEN {
            return;
        }
        // inner_len must not exceed received - 56 (16 header + 24 nonce + 16 mac).
        if header.type_field as usize > data.len() - MIN_MESSAGE_LEN {
            return;
        }

        self.send_bare((sender_ip, sender_port), PacketType::Ack).await;

        let secret = match self.peers.record_for_public(sender_ip) {
            Some(record) => record.shared_secret,
            None => return,
        };

        let sealed_body = &data[HEADER_LEN..];
        let plaintext = match crypto::open(&secret, sealed_body) {
            Ok(pt) => pt,
            Err(_) => {
                tracing::warn!(peer = %sender_ip, "MESSAGE authentication failed, dropping");
                return;
            }
        };

        let deliver = match self.self_virtual_ip {
            Some(self_vip) => match parse_ipv4_dest(&plaintext) {
                Some(dest) => dest == self_vip || addr::is_fanout_destination(dest, self.overlay_base),
                None => false,
            },
            None => false,
        };

        if deliver {
            let _ = self.tunnel_sink.send(plaintext).await;
        }
    }

    /// Keep-alive round: one `HOLE_PUNCH` per peer (spec §4.7.7).
    async fn send_keep_alive_round(&mut self) {
        for public_ip in self.peers.all_public_ips().collect::<Vec<_>>() {
            if let Some(record) = self.peers.record_for_public(public_ip) {
                let endpoint = record.public_endpoint;
                self.send_bare(endpoint, PacketType::HolePunch).await;
            }
        }
    }

    /// Mark stale peers disconnected and arm their eviction grace period.
    fn check_all_connections(&mut self) {
        let now = Instant::now();
        let stale: Vec<Ipv4Addr> = self
            .peers
            .iter_records()
            .filter(|(_, record)| record.connected && now.duration_since(record.last_activity) > PEER_TIMEOUT)
            .map(|(public_ip, _)| *public_ip)
            .collect();

        for public_ip in stale {
            if let Some(record) = self.peers.record_for_public_mut(public_ip) {
                record.connected = false;
            }
            tracing::info!(peer = %public_ip, "peer timed out, scheduling eviction");
            self.pending_evictions.push((public_ip, now + EVICTION_GRACE));
        }
    }

    /// Fire due evictions: remove peers that are still disconnected once
    /// their grace period has elapsed (spec §4.7.7).
    async fn run_due_evictions(&mut self) {
        let now = Instant::now();
        let (due, pending): (Vec<_>, Vec<_>) =
            self.pending_evictions.drain(..).partition(|(_, at)| *at <= now);
        self.pending_evictions = pending;

        for (public_ip, _) in due {
            let still_disconnected = self
                .peers
                .record_for_public(public_ip)
                .map(|r| !r.connected)
                .unwrap_or(false);
            if still_disconnected {
                if let Some(self_vip) = self.self_virtual_ip {
                    if let Some(vip) = self.peers.virtual_ip_for_public(public_ip) {
                        if vip != self_vip {
                            self.peers.remove_by_public(public_ip);
                            self.state
                                .queue_event(NetworkEvent::PeerDisconnected { endpoint: public_ip });
                        }
                    }
                }
            }
        }

        if self.running {
            self.notify_all_peers_disconnected_once();
        }
    }

    /// Explicit per-peer disconnect (spec §4.7.8). Guarded against removing
    /// self (never reachable through `public_to_record`, which never holds an
    /// entry for `self_virtual_ip`, but checked explicitly for clarity).
    async fn handle_disconnect(&mut self, public_ip: Ipv4Addr, caused_by_error: bool) {
        let Some(vip) = self.peers.virtual_ip_for_public(public_ip) else {
            return;
        };
        if Some(vip) == self.self_virtual_ip {
            return;
        }

        if caused_by_error {
            let endpoint = self.peers.record_for_public(public_ip).map(|r| r.public_endpoint);
            if let Some(endpoint) = endpoint {
                for i in 0..DISCONNECT_BURST_ROUNDS {
                    self.send_bare(endpoint, PacketType::Disconnect).await;
                    if i + 1 < DISCONNECT_BURST_ROUNDS {
                        tokio::time::sleep(DISCONNECT_BURST_SPACING).await;
                    }
                }
            }
        }

        self.peers.remove_by_public(public_ip);
        self.state.queue_event(NetworkEvent::PeerDisconnected { endpoint: public_ip });

        self.notify_all_peers_disconnected_once();
    }

    /// Queue `ALL_PEERS_DISCONNECTED` the first time the table goes empty,
    /// and not again until a new `start_connection` resets the flag. Without
    /// this, the 500ms eviction-poll tick re-queues the event for as long as
    /// the connection stays idle-but-running (spec §4.7.7: "enqueued exactly
    /// once").
    fn notify_all_peers_disconnected_once(&mut self) {
        if self.peers.is_empty() && !self.all_peers_disconnected_notified {
            self.state.queue_event(NetworkEvent::AllPeersDisconnected);
            self.all_peers_disconnected_notified = true;
        }
    }

    /// Stop the connection (spec §4.7.9): notify every still-connected peer,
    /// clear the table, and fall back to idle. Idempotent — a no-op if not
    /// currently running.
    async fn stop_connection(&mut self) {
        if !self.running {
            return;
        }
        for public_ip in self.peers.all_public_ips().collect::<Vec<_>>() {
            if let Some(record) = self.peers.record_for_public(public_ip) {
                let endpoint = record.public_endpoint;
                self.send_bare(endpoint, PacketType::Disconnect).await;
            }
        }
        self.peers.clear();
        self.pending_acks.clear();
        self.pending_evictions.clear();
        self.running = false;
        self.self_virtual_ip = None;
    }

    /// Shutdown: same teardown as `stop_connection`, plus dropping the socket
    /// on task exit. Idempotent.
    async fn shutdown(&mut self) {
        self.stop_connection().await;
        tracing::info!("datapath executor shutting down");
    }
}

/// Extract the destination address from the first 20 bytes of a raw IPv4
/// packet. Ported from the teacher's `server.rs::parse_ipv4_dest`.
fn parse_ipv4_dest(packet: &[u8]) -> Option<Ipv4Addr> {
    if packet.len() < 20 {
        return None;
    }
    let version = packet[0] >> 4;
    if version != 4 {
        return None;
    }
    Some(Ipv4Addr::new(packet[16], packet[17], packet[18], packet[19]))
}

/// Spec §4.7.5: "Other error: schedule `handle_disconnect(peer_endpoint,
/// caused_by_error=true)`" — i.e. any send failure other than the transient
/// `WouldBlock`/`TryAgain` case (already a distinct `Err` variant, handled by
/// just dropping the packet) or `MessageTooLarge` (a framing rejection, not a
/// socket fault) warrants evicting the peer.
fn is_disconnect_worthy(err: &NetworkError) -> bool {
    matches!(err, NetworkError::FatalSend { .. })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ipv4_dest_extracts_destination() {
        let mut packet = vec![0u8; 20];
        packet[0] = 0x45; // version 4, IHL 5
        packet[16..20].copy_from_slice(&[10, 0, 0, 7]);
        assert_eq!(parse_ipv4_dest(&packet), Some(Ipv4Addr::new(10, 0, 0, 7)));
    }

    #[test]
    fn parse_ipv4_dest_rejects_short_packet() {
        assert_eq!(parse_ipv4_dest(&[0u8; 10]), None);
    }

    #[test]
    fn parse_ipv4_dest_rejects_non_ipv4() {
        let mut packet = vec![0u8; 20];
        packet[0] = 0x60; // version 6
        assert_eq!(parse_ipv4_dest(&packet), None);
    }

    #[test]
    fn fatal_send_is_disconnect_worthy_but_transient_is_not() {
        assert!(is_disconnect_worthy(&NetworkError::FatalSend {
            reason: "broken pipe".to_string()
        }));
        assert!(!is_disconnect_worthy(&NetworkError::TransientSend));
        assert!(!is_disconnect_worthy(&NetworkError::MessageTooLarge { len: 70000 }));
    }

    async fn test_datapath() -> (Datapath, std::sync::Arc<StateManager>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let identity = crypto::generate_identity();
        let state = std::sync::Arc::new(StateManager::new());
        let (tunnel_sink, _tunnel_source) = mpsc::channel(8);
        let dp = Datapath::new(socket, identity, Ipv4Addr::new(10, 0, 0, 0), state.clone(), tunnel_sink);
        (dp, state)
    }

    #[tokio::test]
    async fn start_connection_retry_allowed_when_no_peer_connected() {
        // Seed scenario: `start_connection` twice with zero peers ever
        // reaching `connected = true`. The executor-wide `running` flag is
        // true after the first call, but spec §4.7.3 step 1 guards on a
        // *connected* peer, not on `running` — this must succeed both times.
        let (mut dp, _state) = test_datapath().await;

        dp.start_connection(0, &[], &[]).await.unwrap();
        assert!(dp.running);
        assert!(dp.start_connection(0, &[], &[]).await.is_ok());
    }

    #[tokio::test]
    async fn start_connection_rejects_when_a_peer_is_connected() {
        let (mut dp, _state) = test_datapath().await;
        dp.start_connection(0, &[], &[]).await.unwrap();

        let peer_vip = Ipv4Addr::new(10, 0, 0, 2);
        let peer_ip = Ipv4Addr::new(9, 9, 9, 9);
        dp.peers.insert(Ipv4Addr::new(10, 0, 0, 1), peer_vip, (peer_ip, 4242), [1u8; 32]);
        dp.peers.record_for_public_mut(peer_ip).unwrap().connected = true;

        assert!(matches!(
            dp.start_connection(0, &[], &[]).await,
            Err(MinnowVpnError::Network(NetworkError::AlreadyConnected))
        ));
    }

    #[tokio::test]
    async fn handle_disconnect_sends_burst_clears_table_and_notifies_once() {
        // Exercises what the `FatalSend` branch in `handle_outbound` now
        // triggers: `handle_disconnect(peer, caused_by_error = true)`.
        let (mut dp, state) = test_datapath().await;
        dp.start_connection(0, &[], &[]).await.unwrap();

        let self_vip = Ipv4Addr::new(10, 0, 0, 1);
        let peer_vip = Ipv4Addr::new(10, 0, 0, 2);
        let peer_ip = Ipv4Addr::new(127, 0, 0, 1);
        dp.peers.insert(self_vip, peer_vip, (peer_ip, 1), [2u8; 32]);

        dp.handle_disconnect(peer_ip, true).await;

        assert!(dp.peers.is_empty());
        assert!(matches!(state.next_event(), Some(NetworkEvent::PeerDisconnected { .. })));
        assert!(matches!(state.next_event(), Some(NetworkEvent::AllPeersDisconnected)));
        assert!(state.next_event().is_none());
    }

    #[tokio::test]
    async fn run_due_evictions_does_not_requeue_all_peers_disconnected() {
        // Spec §4.7.7: "enqueued exactly once" — repeated ticks over an
        // already-empty table must not re-queue the event every 500ms.
        let (mut dp, state) = test_datapath().await;
        dp.start_connection(0, &[], &[]).await.unwrap();

        dp.run_due_evictions().await;
        dp.run_due_evictions().await;
        dp.run_due_evictions().await;

        let mut count = 0;
        while let Some(event) = state.next_event() {
            if matches!(event, NetworkEvent::AllPeersDisconnected) {
                count += 1;
            }
        }
        assert_eq!(count, 1);
    }
}
