//! Error types for minnowvpn

use thiserror::Error;

/// Top-level error type
#[derive(Error, Debug)]
pub enum MinnowVpnError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    #[error("STUN error: {0}")]
    Stun(#[from] StunError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Tunnel error: {0}")]
    Tunnel(#[from] TunnelError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("System error: {0}")]
    System(#[from] std::io::Error),
}

/// Configuration parsing errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid config format at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Invalid address: {value}")]
    InvalidAddress { value: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cryptographic operation errors (C1)
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Per-peer shared-secret derivation failed; caller drops the peer and continues.
    #[error("key derivation failed")]
    KeyDerivationFailed,

    #[error("encryption failed")]
    Encryption,

    /// MAC verification failed on open(); the packet is dropped, never surfaced as a panic.
    #[error("authentication failed")]
    AuthFailure,
}

/// Address-utility errors (C2)
#[derive(Error, Debug)]
pub enum AddressError {
    #[error("malformed host:port: {value}")]
    MalformedHostPort { value: String },

    /// self marker did not appear at the expected index; parse_peer_list fails closed.
    #[error("peer list self-index mismatch: expected {expected}, peer list malformed")]
    SelfIndexMismatch { expected: usize },
}

/// STUN discovery errors (C4)
#[derive(Error, Debug)]
pub enum StunError {
    #[error("STUN request timed out")]
    Timeout,

    #[error("STUN server send failed: {reason}")]
    SendFailed { reason: String },

    #[error("malformed STUN response")]
    MalformedResponse,

    #[error("STUN response missing mapped address attribute")]
    NoMappedAddress,

    #[error("STUN transaction ID mismatch")]
    TransactionMismatch,
}

/// UDP datapath / network errors (C7)
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("socket bind failed on {addr}: {reason}")]
    BindFailed { addr: String, reason: String },

    #[error("already connected")]
    AlreadyConnected,

    #[error("message too large: {len} bytes after framing")]
    MessageTooLarge { len: usize },

    #[error("datagram from unknown peer {endpoint}")]
    UnknownPeer { endpoint: String },

    #[error("invalid peer list")]
    InvalidPeerList,

    #[error("send would block, dropping packet")]
    TransientSend,

    #[error("fatal send error: {reason}")]
    FatalSend { reason: String },

    #[error("fatal receive error: {reason}")]
    FatalReceive { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tunnel device errors (C3)
#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("failed to create virtual interface: {reason}")]
    CreateFailed { reason: String },

    #[error("virtual interface read failed: {reason}")]
    ReadFailed { reason: String },

    #[error("virtual interface write failed: {reason}")]
    WriteFailed { reason: String },

    #[error("route setup failed for {network}: {reason}")]
    RouteSetupFailed { network: String, reason: String },

    #[error("route cleanup failed for {network}: {reason}")]
    RouteCleanupFailed { network: String, reason: String },

    #[error("insufficient privileges: {message}")]
    InsufficientPrivileges { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// State manager errors (C5) — these never surface to the user; see DESIGN.md.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("invalid transition from {from:?} on event {event}")]
    InvalidTransition { from: String, event: String },
}

impl MinnowVpnError {
    /// User-friendly message with suggested action, in the style of the daemon's
    /// own top-level error reporting.
    pub fn user_message(&self) -> String {
        match self {
            Self::Tunnel(TunnelError::InsufficientPrivileges { .. }) => {
                #[cfg(target_os = "linux")]
                return "Insufficient privileges. Run with sudo or grant CAP_NET_ADMIN:\n  \
                        sudo setcap cap_net_admin=eip ./minnowvpn"
                    .to_string();
                #[cfg(target_os = "macos")]
                return "Insufficient privileges. Run with sudo.".to_string();
                #[cfg(target_os = "windows")]
                return "Insufficient privileges. Run as Administrator.".to_string();
                #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
                return format!("{}", self);
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Config file not found: {}\n  Check the path and try again.", path)
            }
            Self::Stun(StunError::Timeout) => {
                "STUN discovery timed out. Check network connectivity and the configured \
                 STUN server."
                    .to_string()
            }
            _ => format!("{}", self),
        }
    }

    /// Process exit code, mirroring the per-subsystem scheme the daemon used.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::Tunnel(TunnelError::InsufficientPrivileges { .. }) => 2,
            Self::Stun(_) => 3,
            Self::Network(_) => 4,
            Self::Crypto(_) => 5,
            Self::Address(_) => 5,
            Self::Tunnel(_) => 6,
            Self::State(_) => 7,
            Self::System(_) => 8,
        }
    }
}

/// Result type alias for minnowvpn operations
pub type Result<T> = std::result::Result<T, MinnowVpnError>;
