//! Configuration & bootstrap (C10, ambient stack).
//!
//! An INI-style `[minnowvpn]`-section config file loader, narrowed to this
//! system's field set, in the same "section + key=value, line-numbered
//! errors" shape as the pre-existing WireGuard `.conf` parser.

use std::net::Ipv4Addr;
use std::path::Path;

use crate::error::ConfigError;

/// Default STUN reflector used when the config omits one.
pub const DEFAULT_STUN_SERVER: &str = "stun.l.google.com";
pub const DEFAULT_STUN_PORT: u16 = 19302;
pub const DEFAULT_RPC_LISTEN: &str = "0.0.0.0:50051";
pub const DEFAULT_BASE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 0);
pub const DEFAULT_ALIAS: &str = "PeerBridge";
#[cfg(target_os = "windows")]
pub const DEFAULT_TUNNEL_TYPE: &str = "WINTUN";
#[cfg(not(target_os = "windows"))]
pub const DEFAULT_TUNNEL_TYPE: &str = "utun";
pub const DEFAULT_MTU: u16 = 1420;

/// Resolved configuration for one daemon process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base address of the overlay `/24`, e.g. `10.0.0.0`.
    pub overlay_base: Ipv4Addr,
    /// Alias the virtual interface is created under.
    pub adapter_alias: String,
    /// Platform tunnel driver identifier (informational; `tun-rs` picks the
    /// concrete backend).
    pub tunnel_type: String,
    pub stun_server: String,
    pub stun_port: u16,
    /// Listen address for the RPC surface (C9).
    pub rpc_listen: String,
    /// `0` means OS-chosen.
    pub local_port: u16,
    pub mtu: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            overlay_base: DEFAULT_BASE,
            adapter_alias: DEFAULT_ALIAS.to_string(),
            tunnel_type: DEFAULT_TUNNEL_TYPE.to_string(),
            stun_server: DEFAULT_STUN_SERVER.to_string(),
            stun_port: DEFAULT_STUN_PORT,
            rpc_listen: DEFAULT_RPC_LISTEN.to_string(),
            local_port: 0,
            mtu: DEFAULT_MTU,
        }
    }
}

impl Config {
    /// Load from an INI-style file, falling back to defaults for any field
    /// the file omits.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ConfigError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        for (line_num, raw_line) in content.lines().enumerate() {
            let line_num = line_num + 1;
            let line = raw_line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') {
                // Single-section file; the header itself carries no fields.
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::ParseError {
                    line: line_num,
                    message: format!("expected 'key = value', got: {}", raw_line),
                });
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "base" | "overlay_base" => {
                    config.overlay_base = value.parse().map_err(|_| ConfigError::InvalidAddress {
                        value: value.to_string(),
                    })?;
                }
                "alias" | "adapter_alias" => config.adapter_alias = value.to_string(),
                "tunnel_type" => config.tunnel_type = value.to_string(),
                "stun_server" => config.stun_server = value.to_string(),
                "stun_port" => {
                    config.stun_port = value.parse().map_err(|_| ConfigError::ParseError {
                        line: line_num,
                        message: format!("invalid stun_port: {}", value),
                    })?;
                }
                "rpc_listen" => config.rpc_listen = value.to_string(),
                "local_port" => {
                    config.local_port = value.parse().map_err(|_| ConfigError::ParseError {
                        line: line_num,
                        message: format!("invalid local_port: {}", value),
                    })?;
                }
                "mtu" => {
                    config.mtu = value.parse().map_err(|_| ConfigError::ParseError {
                        line: line_num,
                        message: format!("invalid mtu: {}", value),
                    })?;
                }
                other => {
                    return Err(ConfigError::ParseError {
                        line: line_num,
                        message: format!("unknown key: {}", other),
                    });
                }
            }
        }

        Ok(config)
    }

    pub fn stun_server_addr(&self) -> String {
        format!("{}:{}", self.stun_server, self.stun_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.overlay_base, Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(config.rpc_listen, "0.0.0.0:50051");
        assert_eq!(config.local_port, 0);
    }

    #[test]
    fn parses_overridden_fields() {
        let text = "[minnowvpn]\nbase = 192.168.77.0\nalias = TestBridge\nstun_port = 3478\nlocal_port = 51820\n";
        let config = Config::parse(text).unwrap();
        assert_eq!(config.overlay_base, Ipv4Addr::new(192, 168, 77, 0));
        assert_eq!(config.adapter_alias, "TestBridge");
        assert_eq!(config.stun_port, 3478);
        assert_eq!(config.local_port, 51820);
    }

    #[test]
    fn rejects_malformed_line() {
        let text = "not-a-key-value-line\n";
        assert!(matches!(Config::parse(text), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn rejects_unknown_key() {
        let text = "bogus_field = 1\n";
        assert!(Config::parse(text).is_err());
    }

    #[test]
    fn stun_server_addr_formats_host_and_port() {
        let config = Config::default();
        assert_eq!(config.stun_server_addr(), "stun.l.google.com:19302");
    }

    #[test]
    fn from_file_loads_and_parses() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[minnowvpn]\nbase = 172.16.0.0\nmtu = 1380").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.overlay_base, Ipv4Addr::new(172, 16, 0, 0));
        assert_eq!(config.mtu, 1380);
    }

    #[test]
    fn from_file_reports_missing_file() {
        let err = Config::from_file("/nonexistent/path/minnowvpn.conf").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }
}
