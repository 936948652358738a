//! minnowvpn - a peer-to-peer VPN daemon.
//!
//! Connects two or more end hosts into a shared Layer-3 overlay without any
//! central relay on the data path. Each node discovers its reflexive public
//! address via STUN, exchanges that address and a long-term public key with
//! peers through an external control channel, performs UDP hole punching
//! against symmetric and port-restricted NATs, and thereafter tunnels IP
//! packets between peers over an authenticated, encrypted UDP channel.
//!
//! # Module map
//!
//! - [`crypto`] — identity keypairs, per-peer shared-secret derivation, and
//!   the authenticated sealed-box construction (C1).
//! - [`addr`] — address utilities: textual/integer IPv4 conversions,
//!   self/unavailable peer-list parsing, broadcast/multicast classification
//!   (C2).
//! - [`tunnel`] — the virtual-interface adapter and platform route manager
//!   (C3).
//! - [`stun`] — the one-shot STUN binding-request client (C4).
//! - [`state`] — the global system state machine and event queue (C5).
//! - [`peers`] — the peer table and per-peer connection records (C6).
//! - [`datapath`] — the UDP datapath executor: wire framing, hole punching,
//!   keep-alive, timeout/eviction (C7).
//! - [`supervisor`] — the system orchestrator driving bring-up and the
//!   monitor loop (C8).
//! - [`rpc`] — the external control-plane HTTP surface (C9).
//! - [`config`] — daemon configuration loading.
//! - [`error`] — layered `thiserror` error types.

pub mod addr;
pub mod config;
pub mod crypto;
pub mod datapath;
pub mod error;
pub mod peers;
pub mod rpc;
pub mod state;
pub mod stun;
pub mod supervisor;
pub mod tunnel;

pub use error::{MinnowVpnError, Result};
