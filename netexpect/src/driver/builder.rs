//! Connection construction: builder and deserializable parameters.

use std::path::PathBuf;
use std::time::Duration;

use log::info;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use super::connection::{Connection, Credentials};
use super::timing::{TimingPolicy, valid_factor};
use crate::channel::{Channel, SessionLog};
use crate::error::{DriverError, Result};
use crate::platform::{Dialect, DialectRegistry};
use crate::transport::{
    AuthMethod, HostKeyVerification, Protocol, SshConfig, SshTransport, TelnetConfig, TelnetTransport,
    Transport,
};

/// Builder for [`Connection`].
///
/// # Example
///
/// ```rust,no_run
/// use netexpect::ConnectionBuilder;
///
/// # async fn example() -> Result<(), netexpect::Error> {
/// let mut conn = ConnectionBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .device_type("cisco_ios")
///     .connect()
///     .await?;
///
/// let version = conn.send_command("show version").await?;
/// println!("{}", version.result);
/// conn.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct ConnectionBuilder {
    host: String,
    port: Option<u16>,
    username: String,
    password: Option<SecretString>,
    secret: Option<SecretString>,
    key_path: Option<PathBuf>,
    key_passphrase: Option<SecretString>,
    device_type: Option<String>,
    dialect: Option<Dialect>,
    protocol: Option<Protocol>,
    timeout: Duration,
    timing: TimingPolicy,
    ansi_escape_codes: Option<bool>,
    terminal_width: u32,
    terminal_height: u32,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    keepalive_interval: Option<Duration>,
    session_log: Option<SessionLog>,
    login_dialog: bool,
}

impl ConnectionBuilder {
    /// Start a builder for `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: String::new(),
            password: None,
            secret: None,
            key_path: None,
            key_passphrase: None,
            device_type: None,
            dialect: None,
            protocol: None,
            timeout: Duration::from_secs(10),
            timing: TimingPolicy::default(),
            ansi_escape_codes: None,
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            keepalive_interval: None,
            session_log: None,
            login_dialog: false,
        }
    }

    /// Port; the protocol's well-known port by default.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Login user.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Login password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Enable secret; the password is used when unset.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Authenticate with a private key instead of the password.
    pub fn private_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Passphrase of an encrypted private key.
    pub fn key_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.key_passphrase = Some(SecretString::from(passphrase.into()));
        self
    }

    /// Registry key such as `cisco_ios`.
    ///
    /// A `_telnet` or `_ssh` suffix selects the protocol.
    pub fn device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    /// Use a dialect that is not in the registry.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Wire protocol.
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// Connect and authentication timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Timing policy of the connection.
    pub fn timing(mut self, timing: TimingPolicy) -> Self {
        self.timing = timing;
        self
    }

    /// Default read timeout of pattern reads.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.timing.read_timeout = timeout;
        self
    }

    /// Connection-wide delay factor. Non-finite or negative values fail at connect.
    pub fn global_delay_factor(mut self, factor: f64) -> Self {
        self.timing.global_delay_factor = factor;
        self
    }

    /// Let the global delay factor cap per-call factors.
    pub fn fast_cli(mut self, fast_cli: bool) -> Self {
        self.timing.fast_cli = fast_cli;
        self
    }

    /// Override the dialect's ANSI stripping flag.
    pub fn ansi_escape_codes(mut self, enabled: bool) -> Self {
        self.ansi_escape_codes = Some(enabled);
        self
    }

    /// PTY size requested over SSH.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Host key policy.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// known_hosts file; `~/.ssh/known_hosts` by default.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// SSH keepalive interval.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    /// Record the session transcript; credentials are redacted.
    pub fn session_log(mut self, log: SessionLog) -> Self {
        self.session_log = Some(log);
        self
    }

    /// Run the username/password dialog on a caller-supplied transport.
    pub fn login_dialog(mut self, enabled: bool) -> Self {
        self.login_dialog = enabled;
        self
    }

    /// Resolve the dialect and the protocol implied by the device type.
    fn resolve(&mut self) -> Result<(Dialect, Protocol)> {
        if !valid_factor(self.timing.global_delay_factor) {
            return Err(DriverError::InvalidConfig {
                message: format!(
                    "global delay factor must be finite and non-negative, got {}",
                    self.timing.global_delay_factor
                ),
            }
            .into());
        }

        if let Some(dialect) = self.dialect.take() {
            return Ok((dialect, self.protocol.unwrap_or_default()));
        }

        let Some(device_type) = self.device_type.as_deref() else {
            return Err(DriverError::InvalidConfig {
                message: "device type must be specified".to_string(),
            }
            .into());
        };

        let (name, implied) = if let Some(name) = device_type.strip_suffix("_telnet") {
            (name, Some(Protocol::Telnet))
        } else if let Some(name) = device_type.strip_suffix("_ssh") {
            (name, Some(Protocol::Ssh))
        } else {
            (device_type, None)
        };

        let dialect = DialectRegistry::lookup(name)?;
        Ok((dialect, self.protocol.or(implied).unwrap_or_default()))
    }

    fn auth_method(&self) -> AuthMethod {
        match (&self.key_path, &self.password) {
            (Some(path), _) => AuthMethod::PrivateKey {
                path: path.clone(),
                passphrase: self.key_passphrase.clone(),
            },
            (None, Some(password)) => AuthMethod::Password(password.clone()),
            (None, None) => AuthMethod::None,
        }
    }

    /// Connect, authenticate, and prepare the session.
    pub async fn connect(mut self) -> Result<Connection> {
        let (dialect, protocol) = self.resolve()?;
        let port = self.port.unwrap_or(protocol.default_port());

        let transport: Box<dyn Transport> = match protocol {
            Protocol::Ssh => {
                let config = SshConfig {
                    host: self.host.clone(),
                    port,
                    username: self.username.clone(),
                    auth: self.auth_method(),
                    timeout: self.timeout,
                    terminal_width: self.terminal_width,
                    terminal_height: self.terminal_height,
                    host_key_verification: self.host_key_verification.clone(),
                    known_hosts_path: self.known_hosts_path.clone(),
                    keepalive_interval: self.keepalive_interval,
                };
                let session = SshTransport::connect(config).await?;
                Box::new(session.open_shell().await?)
            }
            Protocol::Telnet => {
                let config = TelnetConfig {
                    host: self.host.clone(),
                    port,
                    timeout: self.timeout,
                };
                self.login_dialog = true;
                Box::new(TelnetTransport::connect(&config).await?)
            }
        };

        info!("connected to {}:{} as {} ({})", self.host, port, self.username, dialect.name);
        self.establish(transport, dialect).await
    }

    /// Prepare a session over an already-open transport such as a serial
    /// console or an in-memory stream.
    pub async fn connect_with_transport(mut self, transport: Box<dyn Transport>) -> Result<Connection> {
        let (dialect, _) = self.resolve()?;
        self.establish(transport, dialect).await
    }

    async fn establish(self, transport: Box<dyn Transport>, dialect: Dialect) -> Result<Connection> {
        let ansi = self
            .ansi_escape_codes
            .unwrap_or(dialect.capabilities.ansi_escape_codes);
        let mut channel = Channel::new(transport, self.timing.read_config(), ansi);

        if let Some(mut log) = self.session_log {
            for secret in [&self.password, &self.secret, &self.key_passphrase].into_iter().flatten() {
                log.add_secret(secret.expose_secret());
            }
            channel.set_session_log(log);
        }

        let credentials = Credentials {
            username: self.username,
            password: self.password,
            secret: self.secret,
        };
        let mut conn = Connection::new(channel, dialect, self.timing, credentials)?;

        if self.login_dialog {
            conn.telnet_login().await?;
        }
        conn.session_preparation().await?;
        Ok(conn)
    }
}

/// Connection settings loadable from an inventory file.
///
/// ```
/// use netexpect::driver::ConnectionParams;
///
/// let params: ConnectionParams = serde_json::from_str(
///     r#"{"host": "10.0.0.1", "username": "admin", "password": "pw", "device_type": "cisco_ios"}"#,
/// )?;
/// let builder = params.into_builder();
/// # let _ = builder;
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionParams {
    pub host: String,

    #[serde(default)]
    pub port: Option<u16>,

    pub username: String,

    #[serde(default, deserialize_with = "secret")]
    pub password: Option<SecretString>,

    #[serde(default, deserialize_with = "secret")]
    pub secret: Option<SecretString>,

    #[serde(default)]
    pub key_file: Option<PathBuf>,

    #[serde(default, deserialize_with = "secret")]
    pub passphrase: Option<SecretString>,

    pub device_type: String,

    #[serde(default)]
    pub protocol: Option<Protocol>,

    /// Connect timeout in seconds.
    #[serde(default)]
    pub conn_timeout: Option<f64>,

    #[serde(default)]
    pub timing: TimingPolicy,

    #[serde(default)]
    pub host_key_verification: HostKeyVerification,

    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,

    #[serde(default)]
    pub session_log: Option<PathBuf>,
}

impl ConnectionParams {
    /// Turn the parameters into a builder.
    ///
    /// Opening the session log file is deferred to [`try_into_builder`](Self::try_into_builder);
    /// this variant ignores `session_log`.
    pub fn into_builder(self) -> ConnectionBuilder {
        let mut builder = ConnectionBuilder::new(self.host)
            .username(self.username)
            .device_type(self.device_type)
            .timing(self.timing)
            .host_key_verification(self.host_key_verification);
        builder.password = self.password;
        builder.secret = self.secret;
        builder.key_path = self.key_file;
        builder.key_passphrase = self.passphrase;
        builder.protocol = self.protocol;
        builder.port = self.port;
        builder.known_hosts_path = self.known_hosts_path;
        if let Some(timeout) = self.conn_timeout.and_then(|secs| Duration::try_from_secs_f64(secs).ok()) {
            builder.timeout = timeout;
        }
        builder
    }

    /// Turn the parameters into a builder, opening the session log file.
    pub fn try_into_builder(mut self) -> Result<ConnectionBuilder> {
        let log_path = self.session_log.take();
        let mut builder = self.into_builder();
        if let Some(path) = log_path {
            let log = SessionLog::create(&path).map_err(|e| DriverError::InvalidConfig {
                message: format!("cannot open session log {}: {}", path.display(), e),
            })?;
            builder = builder.session_log(log);
        }
        Ok(builder)
    }
}

fn secret<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<SecretString>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}
