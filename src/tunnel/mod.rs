//! Virtual-interface adapter (C3).
//!
//! Opens the OS tunnel device, surfaces outbound IP packets to the core via an
//! ingress callback, and injects inbound IP packets handed to it by the core.
//! Adapted from the teacher's `TunDevice`/`RouteManager` (itself built on
//! `tun-rs`), generalised from WireGuard's CIDR-based `AllowedIPs` routing to
//! this system's per-peer host routes within a configured `/24` overlay.

use std::net::Ipv4Addr;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::mpsc;
use tun_rs::{AsyncDevice, DeviceBuilder};

use crate::error::{MinnowVpnError, TunnelError};

/// Bounded outbound queue depth (spec §4.3: "a bounded outbound queue").
const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// Async TUN device wrapper, exposing the C3 capability set: `initialize`,
/// `start_processing`/`stop_processing`, `send`, `set_ingress_callback`,
/// `is_running`, `close`, `narrow_alias`.
pub struct TunDevice {
    device: Arc<AsyncDevice>,
    name: String,
    alias: String,
    running: Arc<AtomicBool>,
    outbound_tx: mpsc::Sender<Vec<u8>>,
    outbound_rx: Option<mpsc::Receiver<Vec<u8>>>,
}

impl TunDevice {
    /// Open the virtual interface under the configured narrow alias, with no
    /// address assigned yet. The overlay address is assigned later, once the
    /// supervisor knows this node's vIP (spec §4.8: address assignment is a
    /// `PEER_CONNECTED`-triggered step, not part of bring-up).
    pub async fn create(mtu: u16, alias: &str) -> Result<Self, MinnowVpnError> {
        check_privileges()?;

        let builder = DeviceBuilder::new();

        #[cfg(target_os = "windows")]
        let builder = builder.name(alias);

        let device = builder
            .mtu(mtu)
            .build_async()
            .map_err(|e| TunnelError::CreateFailed { reason: e.to_string() })?;

        let name = device
            .deref()
            .name()
            .map_err(|e| TunnelError::CreateFailed {
                reason: format!("failed to get device name: {}", e),
            })?;

        tracing::info!(device = %name, "virtual interface opened");

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);

        Ok(Self {
            device: Arc::new(device),
            name,
            alias: alias.to_string(),
            running: Arc::new(AtomicBool::new(false)),
            outbound_tx,
            outbound_rx: Some(outbound_rx),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The narrow alias exposed to the RPC/config surface (spec §4.3).
    pub fn narrow_alias(&self) -> &str {
        &self.alias
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// A lightweight handle sharing this device and its outbound queue, for a
    /// task that only ever calls `send` (e.g. the supervisor's tunnel-writer
    /// task draining decrypted frames from the datapath). The handle has no
    /// outbound receiver of its own: `start_processing` may only ever be
    /// called on the original instance.
    pub fn clone_handle(&self) -> Self {
        Self {
            device: Arc::clone(&self.device),
            name: self.name.clone(),
            alias: self.alias.clone(),
            running: Arc::clone(&self.running),
            outbound_tx: self.outbound_tx.clone(),
            outbound_rx: None,
        }
    }

    /// Assign the overlay `/24` address to the already-open device (spec
    /// §4.8 "assign self vIP"). Shelled out per platform since `tun-rs`
    /// assigns addresses at build time only and this address is not known
    /// until after the device is opened.
    pub async fn set_address(&self, address: Ipv4Addr, prefix_len: u8) -> Result<(), MinnowVpnError> {
        assign_address_platform(&self.name, address, prefix_len).await?;
        tracing::info!(device = %self.name, %address, prefix_len, "virtual interface address assigned");
        Ok(())
    }

    /// Enqueue an inbound-to-the-host frame for the writer task; wakes it.
    /// Drops silently (with a trace log) if the queue is full, matching the
    /// "best-effort datagram conduit" non-goal — no backpressure into the
    /// datapath executor.
    pub async fn send(&self, packet: Vec<u8>) {
        if self.outbound_tx.try_send(packet).is_err() {
            tracing::trace!("tunnel outbound queue full, dropping frame");
        }
    }

    /// Spawn the reader and writer worker tasks. The reader blocks on the OS
    /// device for outbound IP frames and calls `ingress` for each one; the
    /// writer drains the bounded queue and writes inbound frames to the
    /// device. Returns once both tasks are spawned (not once they exit).
    pub fn start_processing<F, Fut>(&mut self, ingress: F)
    where
        F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        self.running.store(true, Ordering::SeqCst);

        let reader_device = Arc::clone(&self.device);
        let reader_running = Arc::clone(&self.running);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 65535];
            while reader_running.load(Ordering::SeqCst) {
                match reader_device.recv(&mut buf).await {
                    Ok(len) => {
                        ingress(buf[..len].to_vec()).await;
                    }
                    Err(e) => {
                        tracing::warn!("virtual interface read error: {}", e);
                        break;
                    }
                }
            }
        });

        let writer_device = Arc::clone(&self.device);
        let writer_running = Arc::clone(&self.running);
        let mut outbound_rx = self
            .outbound_rx
            .take()
            .expect("start_processing called more than once");
        tokio::spawn(async move {
            while writer_running.load(Ordering::SeqCst) {
                match outbound_rx.recv().await {
                    Some(packet) => {
                        if let Err(e) = writer_device.send(&packet).await {
                            tracing::warn!("virtual interface write error: {}", e);
                        }
                    }
                    None => break,
                }
            }
        });
    }

    /// Signal both worker tasks to stop. Deterministic in the sense that
    /// `is_running()` flips immediately; the tasks themselves wind down on
    /// their next poll of the flag or the next device read/queue recv.
    pub fn stop_processing(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn close(&self) {
        self.stop_processing();
    }
}

/// Check for required privileges to create virtual interfaces.
fn check_privileges() -> Result<(), MinnowVpnError> {
    #[cfg(unix)]
    {
        if unsafe { libc::geteuid() } != 0 {
            #[cfg(target_os = "linux")]
            {
                tracing::warn!("running without root; virtual interface creation may fail");
                tracing::warn!("either run with sudo or grant CAP_NET_ADMIN:");
                tracing::warn!("  sudo setcap cap_net_admin=eip ./minnowvpn");
            }

            #[cfg(target_os = "macos")]
            {
                return Err(TunnelError::InsufficientPrivileges {
                    message: "root privileges required on macOS; run with sudo".to_string(),
                }
                .into());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        if !is_elevated_windows() {
            return Err(TunnelError::InsufficientPrivileges {
                message: "administrator privileges required on Windows".to_string(),
            }
            .into());
        }
    }

    Ok(())
}

#[cfg(target_os = "windows")]
fn is_elevated_windows() -> bool {
    use std::mem::MaybeUninit;
    use std::ptr::null_mut;

    use winapi::um::handleapi::CloseHandle;
    use winapi::um::processthreadsapi::{GetCurrentProcess, OpenProcessToken};
    use winapi::um::securitybaseapi::GetTokenInformation;
    use winapi::um::winnt::{TokenElevation, HANDLE, TOKEN_ELEVATION, TOKEN_QUERY};

    unsafe {
        let mut token: HANDLE = null_mut();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) == 0 {
            return false;
        }

        let mut elevation: MaybeUninit<TOKEN_ELEVATION> = MaybeUninit::uninit();
        let mut size: u32 = std::mem::size_of::<TOKEN_ELEVATION>() as u32;

        let result = GetTokenInformation(
            token,
            TokenElevation,
            elevation.as_mut_ptr() as *mut _,
            size,
            &mut size,
        );

        CloseHandle(token);

        if result == 0 {
            return false;
        }

        elevation.assume_init().TokenIsElevated != 0
    }
}

/// Route and firewall management: per-peer host routes within the overlay
/// `/24`, plus the single firewall allow rule for the overlay range (spec
/// §6 "Virtual interface").
pub struct RouteManager {
    device_name: String,
    added_host_routes: Vec<Ipv4Addr>,
    firewall_installed: bool,
}

impl RouteManager {
    pub fn new(device_name: String) -> Self {
        Self {
            device_name,
            added_host_routes: Vec::new(),
            firewall_installed: false,
        }
    }

    /// Add a host route to one peer's virtual IP (spec §4.8 monitor action
    /// "add routes to each peer vIP").
    pub async fn add_peer_route(&mut self, peer_vip: Ipv4Addr) -> Result<(), MinnowVpnError> {
        add_host_route_platform(&self.device_name, peer_vip).await?;
        self.added_host_routes.push(peer_vip);
        tracing::info!(peer_vip = %peer_vip, device = %self.device_name, "added peer route");
        Ok(())
    }

    /// Install the firewall rule allowing the overlay range (spec §6).
    pub async fn install_firewall(&mut self, overlay_base: Ipv4Addr) -> Result<(), MinnowVpnError> {
        install_firewall_platform(&self.device_name, overlay_base).await?;
        self.firewall_installed = true;
        Ok(())
    }

    /// Remove all routes and the firewall rule added so far. Best-effort: logs
    /// failures but does not fail the overall reset.
    pub async fn cleanup(&mut self) {
        for vip in self.added_host_routes.drain(..) {
            if let Err(e) = remove_host_route_platform(&self.device_name, vip).await {
                tracing::warn!(peer_vip = %vip, error = %e, "failed to remove peer route");
            }
        }
        if self.firewall_installed {
            remove_firewall_platform(&self.device_name).await;
            self.firewall_installed = false;
        }
    }

    pub fn routes(&self) -> &[Ipv4Addr] {
        &self.added_host_routes
    }
}

async fn assign_address_platform(device: &str, address: Ipv4Addr, prefix_len: u8) -> Result<(), MinnowVpnError> {
    #[cfg(target_os = "linux")]
    {
        let status = Command::new("ip")
            .args(["addr", "add", &format!("{}/{}", address, prefix_len), "dev", device])
            .status()
            .await
            .map_err(|e| TunnelError::RouteSetupFailed {
                network: address.to_string(),
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(TunnelError::RouteSetupFailed {
                network: address.to_string(),
                reason: format!("ip addr add exited with {}", status),
            }
            .into());
        }
        let _ = Command::new("ip").args(["link", "set", device, "up"]).status().await;
    }

    #[cfg(target_os = "macos")]
    {
        let status = Command::new("ifconfig")
            .args([device, &address.to_string(), &address.to_string(), "netmask", &prefix_to_netmask(prefix_len), "up"])
            .status()
            .await
            .map_err(|e| TunnelError::RouteSetupFailed {
                network: address.to_string(),
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(TunnelError::RouteSetupFailed {
                network: address.to_string(),
                reason: format!("ifconfig exited with {}", status),
            }
            .into());
        }
    }

    #[cfg(target_os = "windows")]
    {
        let status = Command::new("netsh")
            .args([
                "interface", "ip", "set", "address", device, "static",
                &address.to_string(), &prefix_to_netmask(prefix_len),
            ])
            .status()
            .await
            .map_err(|e| TunnelError::RouteSetupFailed {
                network: address.to_string(),
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(TunnelError::RouteSetupFailed {
                network: address.to_string(),
                reason: format!("netsh exited with {}", status),
            }
            .into());
        }
    }

    Ok(())
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
fn prefix_to_netmask(prefix_len: u8) -> String {
    let mask: u32 = if prefix_len == 0 { 0 } else { !0u32 << (32 - prefix_len) };
    Ipv4Addr::from(mask.to_be_bytes()).to_string()
}

async fn add_host_route_platform(device: &str, peer_vip: Ipv4Addr) -> Result<(), MinnowVpnError> {
    #[cfg(target_os = "macos")]
    {
        let status = Command::new("route")
            .args(["-n", "add", "-host", &peer_vip.to_string(), "-interface", device])
            .status()
            .await
            .map_err(|e| TunnelError::RouteSetupFailed {
                network: peer_vip.to_string(),
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(TunnelError::RouteSetupFailed {
                network: peer_vip.to_string(),
                reason: format!("route command exited with {}", status),
            }
            .into());
        }
    }

    #[cfg(target_os = "linux")]
    {
        let status = Command::new("ip")
            .args(["route", "add", &peer_vip.to_string(), "dev", device])
            .status()
            .await
            .map_err(|e| TunnelError::RouteSetupFailed {
                network: peer_vip.to_string(),
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(TunnelError::RouteSetupFailed {
                network: peer_vip.to_string(),
                reason: format!("ip route command exited with {}", status),
            }
            .into());
        }
    }

    #[cfg(target_os = "windows")]
    {
        let output = Command::new("powershell")
            .args(["-Command", &format!("(Get-NetAdapter -Name '{}').ifIndex", device)])
            .output()
            .await
            .map_err(|e| TunnelError::RouteSetupFailed {
                network: peer_vip.to_string(),
                reason: e.to_string(),
            })?;
        let if_index = String::from_utf8_lossy(&output.stdout).trim().to_string();

        let status = Command::new("netsh")
            .args(["interface", "ip", "add", "route", &format!("{}/32", peer_vip), &if_index])
            .status()
            .await
            .map_err(|e| TunnelError::RouteSetupFailed {
                network: peer_vip.to_string(),
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(TunnelError::RouteSetupFailed {
                network: peer_vip.to_string(),
                reason: format!("netsh command exited with {}", status),
            }
            .into());
        }
    }

    Ok(())
}

async fn remove_host_route_platform(device: &str, peer_vip: Ipv4Addr) -> Result<(), MinnowVpnError> {
    #[cfg(target_os = "macos")]
    {
        let _ = Command::new("route")
            .args(["-n", "delete", "-host", &peer_vip.to_string()])
            .status()
            .await;
    }

    #[cfg(target_os = "linux")]
    {
        let _ = Command::new("ip")
            .args(["route", "del", &peer_vip.to_string(), "dev", device])
            .status()
            .await;
    }

    #[cfg(target_os = "windows")]
    {
        let _ = device; // ifIndex lookup omitted for best-effort cleanup
        let _ = Command::new("netsh")
            .args(["interface", "ip", "delete", "route", &format!("{}/32", peer_vip)])
            .status()
            .await;
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        let _ = (device, peer_vip);
    }

    Ok(())
}

async fn install_firewall_platform(device: &str, overlay_base: Ipv4Addr) -> Result<(), MinnowVpnError> {
    #[cfg(target_os = "linux")]
    {
        let rule = format!("{}/24", overlay_base);
        let status = Command::new("iptables")
            .args(["-A", "INPUT", "-i", device, "-s", &rule, "-j", "ACCEPT"])
            .status()
            .await
            .map_err(|e| TunnelError::RouteSetupFailed {
                network: rule.clone(),
                reason: e.to_string(),
            })?;
        if !status.success() {
            tracing::warn!("iptables allow rule for {} exited with {}", rule, status);
        }
    }

    #[cfg(target_os = "macos")]
    {
        // pf rule installation requires an anchor file; best-effort no-op here,
        // matching the narrow scope of this adapter (spec §1: OS-specific
        // driver specified only by the operations the core invokes).
        let _ = (device, overlay_base);
    }

    #[cfg(target_os = "windows")]
    {
        let rule = format!("{}/24", overlay_base);
        let _ = Command::new("netsh")
            .args([
                "advfirewall", "firewall", "add", "rule",
                "name=minnowvpn-overlay", "dir=in", "action=allow",
                &format!("remoteip={}", rule),
            ])
            .status()
            .await;
    }

    Ok(())
}

async fn remove_firewall_platform(device: &str) {
    #[cfg(target_os = "linux")]
    {
        let _ = Command::new("iptables")
            .args(["-D", "INPUT", "-i", device, "-j", "ACCEPT"])
            .status()
            .await;
    }
    #[cfg(target_os = "windows")]
    {
        let _ = Command::new("netsh")
            .args(["advfirewall", "firewall", "delete", "rule", "name=minnowvpn-overlay"])
            .status()
            .await;
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        let _ = device;
    }
}
