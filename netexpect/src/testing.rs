//! In-memory transport and a scripted Cisco-like device for unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::channel::Channel;
use crate::driver::{Connection, Credentials, TimingPolicy};
use crate::error::{ChannelError, Result, TransferError};
use crate::platform::DialectRegistry;
use crate::transfer::md5_hex;
use crate::transport::{FileChannel, Transport};

/// Transport whose output is scripted by the test.
///
/// Clones share state, so a test keeps one handle while the channel owns
/// another.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
    device: Option<FakeDevice>,
}

#[derive(Default)]
struct MockState {
    pending: VecDeque<(Instant, Vec<u8>)>,
    partial_line: Vec<u8>,
    remote_closed_at: Option<Instant>,
    local_closed: bool,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Make `text` readable right away.
    pub(crate) fn push_output(&self, text: &str) {
        self.push_output_after(Duration::ZERO, text);
    }

    /// Make `text` readable `delay` from now.
    pub(crate) fn push_output_after(&self, delay: Duration, text: &str) {
        let due = Instant::now() + delay;
        let mut state = self.lock();
        // keep the queue ordered by due time
        let idx = state.pending.iter().position(|(at, _)| *at > due).unwrap_or(state.pending.len());
        state.pending.insert(idx, (due, text.as_bytes().to_vec()));
    }

    /// The remote side hangs up once the queued output is read.
    pub(crate) fn close_remote(&self) {
        let mut state = self.lock();
        let last = state.pending.back().map(|(at, _)| *at).unwrap_or_else(Instant::now);
        state.remote_closed_at = Some(last);
    }

    fn usable(&self) -> bool {
        let state = self.lock();
        !state.local_closed && !state.remote_closed_at.is_some_and(|at| Instant::now() >= at)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn read_available(&mut self) -> Result<Vec<u8>> {
        let now = Instant::now();
        let mut state = self.lock();
        let mut out = Vec::new();
        while state.pending.front().is_some_and(|(at, _)| *at <= now) {
            if let Some((_, chunk)) = state.pending.pop_front() {
                out.extend_from_slice(&chunk);
            }
        }
        let closed = state.remote_closed_at.is_some_and(|at| now >= at) && state.pending.is_empty();
        if out.is_empty() && (closed || state.local_closed) {
            return Err(ChannelError::Closed.into());
        }
        Ok(out)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.usable() {
            return Err(ChannelError::Closed.into());
        }

        let lines = {
            let mut state = self.lock();
            state.partial_line.extend_from_slice(data);
            let mut lines = Vec::new();
            while let Some(pos) = state.partial_line.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.partial_line.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line[..pos]).trim_end_matches('\r').to_string();
                lines.push(text);
            }
            lines
        };

        if let Some(device) = &self.device {
            for line in lines {
                let reply = device.handle_line(&line);
                for (delay, text) in reply.output {
                    self.push_output_after(delay, &text);
                }
                if reply.hang_up {
                    self.close_remote();
                }
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.lock().local_closed = true;
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.usable()
    }

    async fn open_file_channel(&mut self) -> Result<Box<dyn FileChannel>> {
        match &self.device {
            Some(device) => Ok(Box::new(MockFileChannel { device: device.clone() })),
            None => Err(TransferError::Unsupported.into()),
        }
    }
}

/// Secondary channel writing straight into the fake device's files.
struct MockFileChannel {
    device: FakeDevice,
}

#[async_trait]
impl FileChannel for MockFileChannel {
    async fn put(&mut self, data: &[u8], remote_path: &str, _mode: u32) -> Result<()> {
        let mut state = self.device.lock();
        let mut stored = data.to_vec();
        if state.corrupt_uploads {
            stored.push(b'!');
        }
        state.files.insert(remote_path.to_string(), stored);
        state.uploads += 1;
        Ok(())
    }

    async fn get(&mut self, remote_path: &str) -> Result<Vec<u8>> {
        self.device
            .file(remote_path)
            .ok_or_else(|| {
                TransferError::Protocol {
                    message: format!("scp: {remote_path}: No such file or directory"),
                }
                .into()
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DeviceMode {
    User,
    Enable,
    Config(String),
    Tcl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Awaiting {
    Nothing,
    Username,
    Password(String),
    EnableSecret,
    ExitConfirm,
    ReloadConfirm,
}

struct DeviceState {
    hostname: String,
    /// Linux shell prompts and `sudo -s` instead of IOS modes.
    shell: bool,
    mode: DeviceMode,
    awaiting: Awaiting,
    login: Option<(String, String)>,
    enable_secret: String,
    prompt_override: Option<String>,
    prompt_suffix: Option<String>,
    exit_confirm: Option<String>,
    uncommitted: bool,
    tcl_write: Option<String>,
    received: Vec<String>,
    files: BTreeMap<String, Vec<u8>>,
    free_space: u64,
    corrupt_uploads: bool,
    uploads: usize,
}

/// Reaction of the device to one input line.
#[derive(Default)]
struct Reply {
    output: Vec<(Duration, String)>,
    hang_up: bool,
}

impl Reply {
    fn now(text: impl Into<String>) -> Self {
        Self {
            output: vec![(Duration::ZERO, text.into())],
            hang_up: false,
        }
    }
}

/// Scripted Cisco IOS-like CLI.
#[derive(Clone)]
pub(crate) struct FakeDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl FakeDevice {
    /// `router>` in user mode, enable secret `cisco`, no login dialog.
    pub(crate) fn cisco() -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                hostname: "router".to_string(),
                shell: false,
                mode: DeviceMode::User,
                awaiting: Awaiting::Nothing,
                login: None,
                enable_secret: "cisco".to_string(),
                prompt_override: None,
                prompt_suffix: None,
                exit_confirm: None,
                uncommitted: false,
                tcl_write: None,
                received: Vec::new(),
                files: BTreeMap::new(),
                free_space: 1_000_000,
                corrupt_uploads: false,
                uploads: 0,
            })),
        }
    }

    /// `user@host:~$` shell; `sudo -s` with password `cisco` gives a root shell.
    pub(crate) fn linux() -> Self {
        let device = Self::cisco();
        {
            let mut state = device.lock();
            state.hostname = "host".to_string();
            state.shell = true;
        }
        device
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap()
    }

    /// A transport connected to this device, greeting already queued.
    pub(crate) fn transport(&self) -> MockTransport {
        let transport = MockTransport {
            device: Some(self.clone()),
            ..MockTransport::default()
        };
        let mut state = self.lock();
        if state.login.is_some() {
            state.awaiting = Awaiting::Username;
            transport.push_output("\r\nUser Access Verification\r\n\r\nUsername: ");
        } else {
            transport.push_output(&format!("\r\n{}", state.prompt()));
        }
        transport
    }

    pub(crate) fn require_login(&self, username: &str, password: &str) {
        self.lock().login = Some((username.to_string(), password.to_string()));
    }

    pub(crate) fn set_mode_enable(&self) {
        self.lock().mode = DeviceMode::Enable;
    }

    pub(crate) fn set_prompt_suffix(&self, suffix: &str) {
        self.lock().prompt_suffix = Some(suffix.to_string());
    }

    pub(crate) fn set_prompt_override(&self, prompt: &str) {
        self.lock().prompt_override = Some(prompt.to_string());
    }

    pub(crate) fn set_exit_confirm(&self, text: &str) {
        self.lock().exit_confirm = Some(text.to_string());
    }

    pub(crate) fn stage_uncommitted(&self) {
        self.lock().uncommitted = true;
    }

    pub(crate) fn set_free_space(&self, bytes: u64) {
        self.lock().free_space = bytes;
    }

    pub(crate) fn corrupt_uploads(&self) {
        self.lock().corrupt_uploads = true;
    }

    pub(crate) fn add_file(&self, path: &str, data: &[u8]) {
        self.lock().files.insert(path.to_string(), data.to_vec());
    }

    pub(crate) fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    pub(crate) fn uploads(&self) -> usize {
        self.lock().uploads
    }

    /// Whether the exact line was typed at the device.
    pub(crate) fn received(&self, line: &str) -> bool {
        self.lock().received.iter().any(|l| l == line)
    }

    fn handle_line(&self, line: &str) -> Reply {
        let mut state = self.lock();
        state.received.push(line.to_string());
        state.respond(line)
    }
}

impl DeviceState {
    fn prompt(&self) -> String {
        if let Some(prompt) = &self.prompt_override {
            return prompt.clone();
        }
        if self.shell {
            return match self.mode {
                DeviceMode::User => format!("user@{}:~$ ", self.hostname),
                _ => format!("root@{}:/home/user# ", self.hostname),
            };
        }
        let suffix = match (&self.prompt_suffix, &self.mode) {
            (Some(suffix), _) => suffix.clone(),
            (None, DeviceMode::Config(sub)) => format!("({sub})"),
            (None, DeviceMode::Tcl) => "(tcl)".to_string(),
            (None, _) => String::new(),
        };
        let terminator = if self.mode == DeviceMode::User { ">" } else { "#" };
        format!("{}{}{}", self.hostname, suffix, terminator)
    }

    fn respond(&mut self, line: &str) -> Reply {
        match std::mem::replace(&mut self.awaiting, Awaiting::Nothing) {
            Awaiting::Username => {
                self.awaiting = Awaiting::Password(line.to_string());
                return Reply::now(format!("{line}\r\nPassword: "));
            }
            Awaiting::Password(user) => {
                if self.login.as_ref().is_some_and(|(u, p)| *u == user && p == line) {
                    return Reply::now(format!("\r\n{}", self.prompt()));
                }
                self.awaiting = Awaiting::Username;
                return Reply::now("\r\n% Login invalid\r\n\r\nUsername: ");
            }
            Awaiting::EnableSecret => {
                if line == self.enable_secret {
                    self.mode = DeviceMode::Enable;
                    return Reply::now(format!("\r\n{}", self.prompt()));
                }
                return Reply::now(format!("\r\n% Access denied\r\n\r\n{}", self.prompt()));
            }
            Awaiting::ExitConfirm => {
                if matches!(line, "yes" | "no") {
                    self.uncommitted = false;
                    self.mode = DeviceMode::Enable;
                }
                return Reply::now(format!("{line}\r\n{}", self.prompt()));
            }
            Awaiting::ReloadConfirm => {
                return Reply::now(format!("{line}\r\n{}", self.prompt()));
            }
            Awaiting::Nothing => {}
        }

        if let Some(mut pending) = self.tcl_write.take() {
            pending.push('\n');
            pending.push_str(line);
            return self.tcl_puts(pending, line);
        }

        let echo = format!("{line}\r\n");
        let command = line.trim();
        if self.shell {
            return self.respond_shell(&echo, command);
        }

        let body = match (&self.mode, command) {
            (_, "") => String::new(),
            (DeviceMode::User, "enable") => {
                self.awaiting = Awaiting::EnableSecret;
                return Reply::now(format!("{echo}Password: "));
            }
            (DeviceMode::User | DeviceMode::Enable, "exit") => {
                return Reply {
                    output: vec![(Duration::ZERO, echo)],
                    hang_up: true,
                };
            }
            (DeviceMode::Enable, "disable") => {
                self.mode = DeviceMode::User;
                String::new()
            }
            (DeviceMode::Enable, "configure terminal") => {
                self.mode = DeviceMode::Config("config".to_string());
                "Enter configuration commands, one per line.  End with CNTL/Z.\r\n".to_string()
            }
            (DeviceMode::Enable, "reload") => {
                self.awaiting = Awaiting::ReloadConfirm;
                return Reply::now(format!("{echo}Proceed with reload? [confirm]"));
            }
            (DeviceMode::Enable, "tclsh") => {
                self.mode = DeviceMode::Tcl;
                String::new()
            }
            (DeviceMode::Enable, "write mem") => "Building configuration...\r\n[OK]\r\n".to_string(),
            (DeviceMode::Config(_), "end") => {
                if let Some(confirm) = self.exit_confirm.clone()
                    && self.uncommitted
                {
                    self.awaiting = Awaiting::ExitConfirm;
                    return Reply::now(format!("{echo}{confirm}"));
                }
                self.mode = DeviceMode::Enable;
                String::new()
            }
            (DeviceMode::Config(sub), "exit") => {
                self.mode = if sub == "config" {
                    DeviceMode::Enable
                } else {
                    DeviceMode::Config("config".to_string())
                };
                String::new()
            }
            (DeviceMode::Config(_), cmd) if cmd.starts_with("interface ") => {
                self.mode = DeviceMode::Config("config-if".to_string());
                String::new()
            }
            (DeviceMode::Tcl, "tclquit") => {
                self.mode = DeviceMode::Enable;
                String::new()
            }
            (DeviceMode::Tcl, cmd) if cmd.starts_with("puts [open") => {
                return self.tcl_puts(line.to_string(), line);
            }
            (_, cmd) if cmd.contains("bogus") => "% Invalid input detected at '^' marker.\r\n".to_string(),
            (_, "show version") => "Cisco IOS Software, Version 15.2(4)M7\r\n".to_string(),
            (_, "show hang") => return Reply::now(format!("{echo}Building configuration...\r\n")),
            (_, "show slow") => {
                let prompt = self.prompt();
                return Reply {
                    output: vec![
                        (Duration::ZERO, format!("{echo}chunk 1\r\n")),
                        (Duration::from_millis(600), "chunk 2\r\n".to_string()),
                        (Duration::from_millis(1200), format!("chunk 3\r\n{prompt}")),
                    ],
                    hang_up: false,
                };
            }
            (DeviceMode::User | DeviceMode::Enable, cmd) if cmd.starts_with("dir ") => self.dir(&cmd[4..]),
            (DeviceMode::User | DeviceMode::Enable, cmd) if cmd.starts_with("verify /md5 ") => {
                self.verify_md5(&cmd[12..])
            }
            _ => String::new(),
        };
        Reply::now(format!("{echo}{body}{}", self.prompt()))
    }

    fn respond_shell(&mut self, echo: &str, command: &str) -> Reply {
        let body = match (&self.mode, command) {
            (_, "") => "",
            (DeviceMode::User, "sudo -s") => {
                self.awaiting = Awaiting::EnableSecret;
                return Reply::now(format!("{echo}[sudo] password for user: "));
            }
            (DeviceMode::User, "exit") => {
                return Reply {
                    output: vec![(Duration::ZERO, format!("{echo}logout\r\n"))],
                    hang_up: true,
                };
            }
            (_, "exit") => {
                self.mode = DeviceMode::User;
                "exit\r\n"
            }
            (DeviceMode::User, "whoami") => "user\r\n",
            (_, "whoami") => "root\r\n",
            _ => "bash: command not found\r\n",
        };
        Reply::now(format!("{echo}{body}{}", self.prompt()))
    }

    /// Collect a `puts [open "path" w+] {...}` until its braces close.
    fn tcl_puts(&mut self, pending: String, line: &str) -> Reply {
        let opens = pending.matches('{').count();
        let closes = pending.matches('}').count();
        if opens > closes || opens == 0 {
            self.tcl_write = Some(pending);
            return Reply::now(format!("{line}\r\n+>"));
        }

        let path = pending.split('"').nth(1).unwrap_or_default().to_string();
        let start = pending.find('{').map_or(0, |i| i + 1);
        let end = pending.rfind('}').unwrap_or(pending.len());
        let content = pending[start..end].as_bytes().to_vec();
        self.files.insert(path, content);
        Reply::now(format!("{line}\r\n{}", self.prompt()))
    }

    fn dir(&self, target: &str) -> String {
        let target = target.trim();
        let footer = format!("\r\n16777216 bytes total ({} bytes free)\r\n", self.free_space);
        if target.ends_with(':') {
            let mut listing = format!("Directory of {target}/\r\n\r\n");
            for (i, (path, data)) in self.files.iter().enumerate() {
                listing.push_str(&file_line(i + 1, path, data.len()));
            }
            return listing + &footer;
        }
        match self.files.get(target) {
            Some(data) => format!("Directory of {target}\r\n\r\n{}{footer}", file_line(1, target, data.len())),
            None => format!("%Error opening {target} (No such file or directory)\r\n"),
        }
    }

    fn verify_md5(&self, target: &str) -> String {
        let target = target.trim();
        match self.files.get(target) {
            Some(data) => format!(".....Done!\r\nverify /md5 ({target}) = {}\r\n", md5_hex(data)),
            None => format!("%Error opening {target} (No such file or directory)\r\n"),
        }
    }
}

fn file_line(index: usize, path: &str, size: usize) -> String {
    let name = path.rsplit([':', '/']).next().unwrap_or(path);
    format!("    {index}  -rw-        {size}  Jan 1 2024 00:00:00 +00:00  {name}\r\n")
}

/// Prepared connection to `device` with user `admin` and secret `cisco`.
pub(crate) async fn connection_with(device: &FakeDevice, device_type: &str) -> Connection {
    let dialect = DialectRegistry::lookup(device_type).unwrap();
    let timing = TimingPolicy::default();
    let channel = Channel::new(
        Box::new(device.transport()),
        timing.read_config(),
        dialect.capabilities.ansi_escape_codes,
    );
    let credentials = Credentials {
        username: "admin".to_string(),
        password: Some("cisco".to_string().into()),
        secret: Some("cisco".to_string().into()),
    };
    let mut conn = Connection::new(channel, dialect, timing, credentials).unwrap();
    conn.session_preparation().await.unwrap();
    conn
}
