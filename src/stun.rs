//! STUN client (C4): a one-shot RFC 5389 binding-request exchange used to
//! discover this host's reflexive (public) address. Hand-rolled: no STUN crate
//! exists anywhere in the retrieved example corpus (see DESIGN.md), so this
//! follows the teacher's own UDP/tokio idioms and error style rather than an
//! existing dependency.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use rand::RngCore;
use socket2::{Domain, Socket, Type};
use tokio::net::UdpSocket;

use crate::error::StunError;

const STUN_MAGIC_COOKIE: u32 = 0x2112A442;
const BINDING_REQUEST: u16 = 0x0001;
const BINDING_RESPONSE: u16 = 0x0101;
const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;
const ATTR_MAPPED_ADDRESS: u16 = 0x0001;
const RECV_BUFFER_BYTES: i32 = 4 * 1024 * 1024;

/// A one-shot STUN client bound to a local UDP port (0 = OS-chosen).
pub struct StunClient {
    server: String,
    socket: UdpSocket,
}

impl StunClient {
    /// Bind a UDP socket (applying the same 4 MiB send/receive buffer tuning
    /// the datapath uses, since this socket is handed off to it after
    /// discovery) and prepare to query `server` (e.g. `stun.l.google.com:19302`).
    pub async fn bind(local_port: u16, server: impl Into<String>) -> std::io::Result<Self> {
        let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
        socket2.set_recv_buffer_size(RECV_BUFFER_BYTES as usize)?;
        socket2.set_send_buffer_size(RECV_BUFFER_BYTES as usize)?;
        socket2.set_nonblocking(true)?;
        let bind_addr: SocketAddr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, local_port).into();
        socket2.bind(&bind_addr.into())?;

        let socket = UdpSocket::from_std(socket2.into())?;
        Ok(Self {
            server: server.into(),
            socket,
        })
    }

    /// Perform the binding-request/response exchange. Returns the reflexive
    /// `(ip, port)` on success.
    pub async fn discover_public_address(&self) -> Result<(Ipv4Addr, u16), StunError> {
        let mut transaction_id = [0u8; 12];
        rand::rngs::OsRng.fill_bytes(&mut transaction_id);

        let request = build_binding_request(&transaction_id);

        self.socket
            .send_to(&request, self.server.as_str())
            .await
            .map_err(|e| StunError::SendFailed { reason: e.to_string() })?;

        let mut buf = [0u8; 512];
        let len = tokio::time::timeout(Duration::from_secs(5), self.socket.recv(&mut buf))
            .await
            .map_err(|_| StunError::Timeout)?
            .map_err(|e| StunError::SendFailed { reason: e.to_string() })?;

        parse_binding_response(&buf[..len], &transaction_id)
    }

    /// Hand the underlying socket off to the datapath so the NAT binding
    /// established during discovery survives into the connected session.
    pub fn into_socket(self) -> UdpSocket {
        self.socket
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

fn build_binding_request(transaction_id: &[u8; 12]) -> [u8; 20] {
    let mut buf = [0u8; 20];
    buf[0..2].copy_from_slice(&BINDING_REQUEST.to_be_bytes());
    buf[2..4].copy_from_slice(&0u16.to_be_bytes()); // message length: no attributes
    buf[4..8].copy_from_slice(&STUN_MAGIC_COOKIE.to_be_bytes());
    buf[8..20].copy_from_slice(transaction_id);
    buf
}

fn parse_binding_response(
    data: &[u8],
    expected_transaction_id: &[u8; 12],
) -> Result<(Ipv4Addr, u16), StunError> {
    if data.len() < 20 {
        return Err(StunError::MalformedResponse);
    }

    let msg_type = u16::from_be_bytes([data[0], data[1]]);
    if msg_type != BINDING_RESPONSE {
        return Err(StunError::MalformedResponse);
    }
    let msg_len = u16::from_be_bytes([data[2], data[3]]) as usize;
    let magic_cookie = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    if magic_cookie != STUN_MAGIC_COOKIE {
        return Err(StunError::MalformedResponse);
    }
    if &data[8..20] != expected_transaction_id {
        return Err(StunError::TransactionMismatch);
    }

    let attrs_end = (20 + msg_len).min(data.len());
    let mut offset = 20;
    let mut fallback: Option<(Ipv4Addr, u16)> = None;

    while offset + 4 <= attrs_end {
        let attr_type = u16::from_be_bytes([data[offset], data[offset + 1]]);
        let attr_len = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
        let value_start = offset + 4;
        let value_end = value_start + attr_len;
        if value_end > data.len() {
            break;
        }
        let value = &data[value_start..value_end];

        if attr_type == ATTR_XOR_MAPPED_ADDRESS && value.len() >= 8 && value[1] == 0x01 {
            let xport = u16::from_be_bytes([value[2], value[3]]) ^ ((STUN_MAGIC_COOKIE >> 16) as u16);
            let xaddr_bits = u32::from_be_bytes([value[4], value[5], value[6], value[7]]) ^ STUN_MAGIC_COOKIE;
            return Ok((Ipv4Addr::from(xaddr_bits.to_be_bytes()), xport));
        }

        if attr_type == ATTR_MAPPED_ADDRESS && value.len() >= 8 && value[1] == 0x01 {
            let port = u16::from_be_bytes([value[2], value[3]]);
            let addr = Ipv4Addr::new(value[4], value[5], value[6], value[7]);
            fallback = Some((addr, port));
        }

        // Attributes are padded to a 4-byte boundary.
        offset = value_end + ((4 - (attr_len % 4)) % 4);
    }

    fallback.ok_or(StunError::NoMappedAddress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_request_has_correct_header() {
        let txn = [0xAAu8; 12];
        let req = build_binding_request(&txn);
        assert_eq!(u16::from_be_bytes([req[0], req[1]]), BINDING_REQUEST);
        assert_eq!(u32::from_be_bytes([req[4], req[5], req[6], req[7]]), STUN_MAGIC_COOKIE);
        assert_eq!(&req[8..20], &txn);
    }

    #[test]
    fn parse_xor_mapped_address() {
        let txn = [0x11u8; 12];
        let mut msg = Vec::new();
        msg.extend_from_slice(&BINDING_RESPONSE.to_be_bytes());
        msg.extend_from_slice(&12u16.to_be_bytes()); // one attribute, 8 bytes + 4 header
        msg.extend_from_slice(&STUN_MAGIC_COOKIE.to_be_bytes());
        msg.extend_from_slice(&txn);

        // XOR-MAPPED-ADDRESS attribute
        let real_ip = Ipv4Addr::new(203, 0, 113, 7);
        let real_port: u16 = 54321;
        let xport = real_port ^ ((STUN_MAGIC_COOKIE >> 16) as u16);
        let xip = u32::from_be_bytes(real_ip.octets()) ^ STUN_MAGIC_COOKIE;

        msg.extend_from_slice(&ATTR_XOR_MAPPED_ADDRESS.to_be_bytes());
        msg.extend_from_slice(&8u16.to_be_bytes());
        msg.push(0x00);
        msg.push(0x01); // family IPv4
        msg.extend_from_slice(&xport.to_be_bytes());
        msg.extend_from_slice(&xip.to_be_bytes());

        let (ip, port) = parse_binding_response(&msg, &txn).unwrap();
        assert_eq!(ip, real_ip);
        assert_eq!(port, real_port);
    }

    #[test]
    fn parse_rejects_transaction_mismatch() {
        let txn = [0x11u8; 12];
        let other = [0x22u8; 12];
        let mut msg = Vec::new();
        msg.extend_from_slice(&BINDING_RESPONSE.to_be_bytes());
        msg.extend_from_slice(&0u16.to_be_bytes());
        msg.extend_from_slice(&STUN_MAGIC_COOKIE.to_be_bytes());
        msg.extend_from_slice(&other);

        assert!(matches!(
            parse_binding_response(&msg, &txn),
            Err(StunError::TransactionMismatch)
        ));
    }

    #[test]
    fn parse_rejects_too_short() {
        assert!(matches!(
            parse_binding_response(&[0u8; 4], &[0u8; 12]),
            Err(StunError::MalformedResponse)
        ));
    }
}
