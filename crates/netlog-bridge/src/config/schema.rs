use std::net::{IpAddr, SocketAddr};

use serde::Deserialize;
use netlog_core::error::{NetlogError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetlogConfig {
    pub version: u32,

    #[serde(default)]
    pub bridge: BridgeSection,
}

impl Default for NetlogConfig {
    fn default() -> Self {
        Self {
            version: 1,
            bridge: BridgeSection::default(),
        }
    }
}

impl NetlogConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(NetlogError::UnsupportedVersion);
        }
        self.bridge.validate()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeSection {
    #[serde(default = "default_tcp_bind_address")]
    pub tcp_bind_address: String,
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,

    #[serde(default = "default_any_address")]
    pub ws_bind_address: String,
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,

    #[serde(default = "default_any_address")]
    pub http_bind_address: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    #[serde(default = "default_index_page")]
    pub index_page: String,

    /// Outbound queue depth per viewer.
    #[serde(default = "default_viewer_queue")]
    pub viewer_queue: usize,
    /// How long a full viewer queue may hold up a fan-out before that viewer
    /// is evicted.
    #[serde(default = "default_viewer_send_timeout_ms")]
    pub viewer_send_timeout_ms: u64,
    #[serde(default = "default_read_buffer_bytes")]
    pub read_buffer_bytes: usize,
    /// 0 disables keepalive pings.
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            tcp_bind_address: default_tcp_bind_address(),
            tcp_port: default_tcp_port(),
            ws_bind_address: default_any_address(),
            ws_port: default_ws_port(),
            http_bind_address: default_any_address(),
            http_port: default_http_port(),
            static_dir: default_static_dir(),
            index_page: default_index_page(),
            viewer_queue: default_viewer_queue(),
            viewer_send_timeout_ms: default_viewer_send_timeout_ms(),
            read_buffer_bytes: default_read_buffer_bytes(),
            ping_interval_ms: default_ping_interval_ms(),
        }
    }
}

impl BridgeSection {
    pub fn validate(&self) -> Result<()> {
        let tcp = self.tcp_addr()?;
        let ws = self.ws_addr()?;
        let http = self.http_addr()?;

        for (name, addr) in [("tcp_port", tcp), ("ws_port", ws), ("http_port", http)] {
            if addr.port() == 0 {
                return Err(NetlogError::BadConfig(format!("bridge.{name} must not be 0")));
            }
        }
        let pairs = [("tcp", tcp, "ws", ws), ("tcp", tcp, "http", http), ("ws", ws, "http", http)];
        for (a_name, a, b_name, b) in pairs {
            if a.port() == b.port() && overlaps(a.ip(), b.ip()) {
                return Err(NetlogError::BadConfig(format!(
                    "bridge.{a_name}_port and bridge.{b_name}_port collide on {}",
                    a.port()
                )));
            }
        }

        if !(1..=65_536).contains(&self.viewer_queue) {
            return Err(NetlogError::BadConfig(
                "bridge.viewer_queue must be between 1 and 65536".into(),
            ));
        }
        if !(1..=60_000).contains(&self.viewer_send_timeout_ms) {
            return Err(NetlogError::BadConfig(
                "bridge.viewer_send_timeout_ms must be between 1 and 60000".into(),
            ));
        }
        if !(512..=1_048_576).contains(&self.read_buffer_bytes) {
            return Err(NetlogError::BadConfig(
                "bridge.read_buffer_bytes must be between 512 and 1048576".into(),
            ));
        }
        if self.ping_interval_ms != 0 && !(1000..=600_000).contains(&self.ping_interval_ms) {
            return Err(NetlogError::BadConfig(
                "bridge.ping_interval_ms must be 0 or between 1000 and 600000".into(),
            ));
        }

        let page = self.index_page.trim();
        if page.is_empty() || page.starts_with('/') || page.contains("..") || page.contains("://") {
            return Err(NetlogError::BadConfig(
                "bridge.index_page must be a non-empty relative path".into(),
            ));
        }
        if self.static_dir.trim().is_empty() {
            return Err(NetlogError::BadConfig("bridge.static_dir must not be empty".into()));
        }
        Ok(())
    }

    pub fn tcp_addr(&self) -> Result<SocketAddr> {
        socket_addr("tcp_bind_address", &self.tcp_bind_address, self.tcp_port)
    }

    pub fn ws_addr(&self) -> Result<SocketAddr> {
        socket_addr("ws_bind_address", &self.ws_bind_address, self.ws_port)
    }

    pub fn http_addr(&self) -> Result<SocketAddr> {
        socket_addr("http_bind_address", &self.http_bind_address, self.http_port)
    }
}

fn socket_addr(field: &str, ip: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = ip
        .trim()
        .parse()
        .map_err(|_| NetlogError::BadConfig(format!("bridge.{field} is not an IP address: {ip:?}")))?;
    Ok(SocketAddr::new(ip, port))
}

/// Two listeners on the same port conflict when either is a wildcard or both
/// name the same address.
fn overlaps(a: IpAddr, b: IpAddr) -> bool {
    a == b || a.is_unspecified() || b.is_unspecified()
}

fn default_tcp_bind_address() -> String {
    "127.0.0.1".into()
}
fn default_any_address() -> String {
    "0.0.0.0".into()
}
fn default_tcp_port() -> u16 {
    31337
}
fn default_ws_port() -> u16 {
    8337
}
fn default_http_port() -> u16 {
    8095
}
fn default_static_dir() -> String {
    "html".into()
}
fn default_index_page() -> String {
    "log.html".into()
}
fn default_viewer_queue() -> usize {
    1024
}
fn default_viewer_send_timeout_ms() -> u64 {
    1000
}
fn default_read_buffer_bytes() -> usize {
    8192
}
fn default_ping_interval_ms() -> u64 {
    20000
}
