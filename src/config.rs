//! FTP session configuration

use std::net::IpAddr;
use std::time::Duration;

/// Transport security for an FTP session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SecureMode {
    /// Plaintext control and data channels
    #[default]
    Plain,
    /// Explicit TLS (AUTH TLS, PBSZ 0, PROT P); data channels are wrapped
    Explicit,
    /// Explicit TLS on the control channel only; data stays plaintext
    ControlOnly,
    /// TLS from the first byte (FTPS port 990); no AUTH exchange
    Implicit,
}

impl SecureMode {
    /// True when the control channel must be upgraded after the greeting
    pub(crate) fn upgrades_control(self) -> bool {
        matches!(self, SecureMode::Explicit | SecureMode::ControlOnly)
    }

    /// True when data sockets are TLS-wrapped
    pub(crate) fn secures_data(self) -> bool {
        matches!(self, SecureMode::Explicit | SecureMode::Implicit)
    }
}

/// Override applied to one FEAT token after feature discovery
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeatOverride {
    /// Treat the feature as advertised even if the server omitted it
    Enable,
    /// Ignore the feature even if the server advertised it
    Disable,
    /// Force the feature's parameter string (e.g. the MLST fact list)
    Param(String),
}

/// Inclusive local port range used for active-mode listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortRange {
    /// First port tried
    pub start: u16,
    /// Last port tried
    pub end: u16,
}

impl PortRange {
    /// Parse a `"5000-8000"` style range string
    ///
    /// Returns None for malformed input or an inverted range.
    pub fn parse(s: &str) -> Option<Self> {
        let (start, end) = s.split_once('-')?;
        let start: u16 = start.trim().parse().ok()?;
        let end: u16 = end.trim().parse().ok()?;
        if start == 0 || end < start {
            return None;
        }
        Some(Self { start, end })
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: 5000,
            end: 8000,
        }
    }
}

/// FTP session configuration
///
/// Immutable once a session is connected.
///
/// # Example
///
/// ```
/// use ftp_rs::{SecureMode, SessionConfig};
///
/// // Recommended: use the constructor methods
/// let config = SessionConfig::with_credentials("ftp.example.com", "user", "pass");
///
/// // Or adjust fields directly
/// let mut config = SessionConfig::new("ftp.example.com");
/// config.secure = SecureMode::Explicit;
/// ```
#[must_use]
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Server hostname (e.g., "ftp.example.com")
    pub host: String,

    /// Server port (typically 21, or 990 for implicit TLS)
    pub port: u16,

    /// Login name
    pub user: String,

    /// Login password; sent only when the server asks for one
    pub password: String,

    /// Transport security mode
    #[cfg_attr(feature = "serde", serde(default))]
    pub secure: SecureMode,

    /// Allow insecure TLS connections (self-signed certificates, expired certificates)
    ///
    /// **Security Warning:** Setting this to `true` disables certificate validation,
    /// making your connection vulnerable to man-in-the-middle attacks. Only use this
    /// for testing or with servers you trust on a secure network.
    #[cfg_attr(feature = "serde", serde(default))]
    pub allow_insecure_tls: bool,

    /// Budget for the whole connect sequence, greeting through TYPE I
    pub conn_timeout: Duration,

    /// Budget for establishing each data connection
    pub data_timeout: Duration,

    /// Idle interval after which a NOOP is injected; zero disables keepalive
    pub keepalive: Duration,

    /// External address advertised in PORT/EPRT; enables active mode
    pub port_address: Option<IpAddr>,

    /// Local port range for active-mode listeners
    #[cfg_attr(feature = "serde", serde(default))]
    pub port_range: PortRange,

    /// Local address the active-mode listener binds to
    ///
    /// Defaults to the unspecified address matching `port_address`'s family.
    pub bind_address: Option<IpAddr>,

    /// FEAT adjustments applied after feature discovery
    #[cfg_attr(feature = "serde", serde(default))]
    pub feat_overrides: Vec<(String, FeatOverride)>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 21,
            user: "anonymous".to_string(),
            password: "anonymous@".to_string(),
            secure: SecureMode::Plain,
            allow_insecure_tls: false,
            conn_timeout: Duration::from_millis(10_000),
            data_timeout: Duration::from_millis(10_000),
            keepalive: Duration::from_millis(10_000),
            port_address: None,
            port_range: PortRange::default(),
            bind_address: None,
            feat_overrides: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Anonymous session on the standard port
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Plaintext session with credentials
    pub fn with_credentials(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Explicit-TLS session (AUTH TLS on port 21)
    pub fn explicit_tls(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let mut config = Self::with_credentials(host, user, password);
        config.secure = SecureMode::Explicit;
        config
    }

    /// Implicit-TLS session on the standard FTPS port (990)
    pub fn implicit_tls(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let mut config = Self::with_credentials(host, user, password);
        config.secure = SecureMode::Implicit;
        config.port = 990;
        config
    }

    /// Set the data-connection timeout via its deprecated historical name
    #[deprecated(note = "pasv_timeout is an alias; set data_timeout instead")]
    pub fn set_pasv_timeout(&mut self, timeout: Duration) {
        self.data_timeout = timeout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 21);
        assert_eq!(config.user, "anonymous");
        assert_eq!(config.password, "anonymous@");
        assert_eq!(config.secure, SecureMode::Plain);
        assert!(!config.allow_insecure_tls);
        assert_eq!(config.conn_timeout, Duration::from_millis(10_000));
        assert_eq!(config.data_timeout, Duration::from_millis(10_000));
        assert_eq!(config.keepalive, Duration::from_millis(10_000));
        assert!(config.port_address.is_none());
        assert_eq!(config.port_range, PortRange { start: 5000, end: 8000 });
    }

    #[test]
    fn test_with_credentials() {
        let config = SessionConfig::with_credentials("ftp.example.com", "user", "pass");
        assert_eq!(config.host, "ftp.example.com");
        assert_eq!(config.user, "user");
        assert_eq!(config.password, "pass");
        assert_eq!(config.secure, SecureMode::Plain);
    }

    #[test]
    fn test_explicit_tls_helper() {
        let config = SessionConfig::explicit_tls("ftp.example.com", "user", "pass");
        assert_eq!(config.port, 21);
        assert_eq!(config.secure, SecureMode::Explicit);
        assert!(config.secure.upgrades_control());
        assert!(config.secure.secures_data());
    }

    #[test]
    fn test_implicit_tls_helper() {
        let config = SessionConfig::implicit_tls("ftp.example.com", "user", "pass");
        assert_eq!(config.port, 990);
        assert_eq!(config.secure, SecureMode::Implicit);
        assert!(!config.secure.upgrades_control());
        assert!(config.secure.secures_data());
    }

    #[test]
    fn test_control_only_mode() {
        let mode = SecureMode::ControlOnly;
        assert!(mode.upgrades_control());
        assert!(!mode.secures_data());
    }

    #[test]
    fn test_port_range_parse() {
        assert_eq!(
            PortRange::parse("5000-8000"),
            Some(PortRange { start: 5000, end: 8000 })
        );
        assert_eq!(
            PortRange::parse("6000-6000"),
            Some(PortRange { start: 6000, end: 6000 })
        );
        assert_eq!(PortRange::parse("8000-5000"), None);
        assert_eq!(PortRange::parse("0-100"), None);
        assert_eq!(PortRange::parse("nonsense"), None);
        assert_eq!(PortRange::parse("5000"), None);
    }

    #[test]
    #[allow(deprecated)]
    fn test_pasv_timeout_alias() {
        let mut config = SessionConfig::default();
        config.set_pasv_timeout(Duration::from_secs(3));
        assert_eq!(config.data_timeout, Duration::from_secs(3));
    }
}
