// SPDX-FileCopyrightText: 2026 the Aviron contributors
// SPDX-License-Identifier: Apache-2.0

//! Connection-per-command client for the clamd daemon.
//!
//! Every command opens a fresh TCP connection, writes the framed request,
//! reads the full reply and closes. There is no pooling and no multiplexing;
//! this mirrors clamd's own per-connection command model, so throughput is a
//! function of caller-level parallelism.
//!
//! At first use the client probes the daemon with `VERSIONCOMMANDS` and
//! memoizes the advertised command set; commands outside that set are
//! rejected before a socket is ever opened.

use std::io::Read;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use log::{debug, warn};

use crate::command::{
    ClamCommand, ContScan, InStream, MultiScan, Ping, Reload, Scan, Shutdown, Stats, Version,
    VersionCommands, DEFAULT_CHUNK_SIZE,
};
use crate::error::ClamError;
use crate::path::FileSeparator;
use crate::quarantine::{Quarantine, QuarantineAction, QuarantineListener};
use crate::response::ScanResult;

pub use crate::command::DaemonCapabilities;

/// Default daemon hostname.
pub const DEFAULT_HOSTNAME: &str = "localhost";
/// Default clamd TCP port.
pub const DEFAULT_PORT: u16 = 3310;
/// Default connect timeout in milliseconds (0 means indefinite).
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 3_000;
/// Default read timeout in milliseconds (0 means indefinite).
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 20_000;

/// Where and how to reach the daemon. Immutable after build.
#[derive(Debug, Clone)]
struct Endpoint {
    hostname: String,
    port: u16,
    separator: FileSeparator,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
}

/// Last request/reply pair, kept per client for debugging.
#[derive(Debug, Clone, Default)]
pub struct CommandRunDetails {
    /// The command text of the last request, e.g. `SCAN /tmp/a.pdf`.
    pub request: String,
    /// The raw reply bytes, including NUL terminators.
    pub reply: Vec<u8>,
}

/// Builder for [`ClamClient`]. Invalid parameters fail eagerly in
/// [`build`](ClamClientBuilder::build).
pub struct ClamClientBuilder {
    hostname: String,
    port: u16,
    separator: FileSeparator,
    connection_timeout_ms: u64,
    read_timeout_ms: u64,
    quarantine_action: QuarantineAction,
    quarantine_dir: Option<std::path::PathBuf>,
    quarantine_listener: Option<Arc<QuarantineListener>>,
}

impl Default for ClamClientBuilder {
    fn default() -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            port: DEFAULT_PORT,
            separator: FileSeparator::default(),
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            quarantine_action: QuarantineAction::default(),
            quarantine_dir: None,
            quarantine_listener: None,
        }
    }
}

impl ClamClientBuilder {
    #[must_use]
    pub fn hostname(mut self, hostname: &str) -> Self {
        self.hostname = hostname.to_string();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Separator flavor the remote daemon expects in paths.
    #[must_use]
    pub fn file_separator(mut self, separator: FileSeparator) -> Self {
        self.separator = separator;
        self
    }

    /// Connect timeout in milliseconds; 0 blocks indefinitely.
    #[must_use]
    pub fn connection_timeout_ms(mut self, millis: u64) -> Self {
        self.connection_timeout_ms = millis;
        self
    }

    /// Read timeout in milliseconds; 0 blocks indefinitely.
    #[must_use]
    pub fn read_timeout_ms(mut self, millis: u64) -> Self {
        self.read_timeout_ms = millis;
        self
    }

    /// Action applied to infected files after SCAN-family commands.
    #[must_use]
    pub fn quarantine_action(mut self, action: QuarantineAction) -> Self {
        self.quarantine_action = action;
        self
    }

    /// Quarantine directory, required for any action other than `None`.
    #[must_use]
    pub fn quarantine_dir(mut self, dir: &Path) -> Self {
        self.quarantine_dir = Some(dir.to_path_buf());
        self
    }

    /// Callback invoked for every quarantine action taken.
    #[must_use]
    pub fn quarantine_listener(
        mut self,
        listener: impl Fn(&crate::quarantine::QuarantineFile) + Send + Sync + 'static,
    ) -> Self {
        self.quarantine_listener = Some(Arc::new(listener));
        self
    }

    pub fn build(self) -> Result<ClamClient, ClamError> {
        if self.hostname.is_empty() {
            return Err(ClamError::Config("hostname must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ClamError::Config("port must not be 0".to_string()));
        }

        let quarantine = match self.quarantine_action {
            QuarantineAction::None => None,
            action => {
                let dir = self.quarantine_dir.as_deref().ok_or_else(|| {
                    ClamError::Config(format!(
                        "quarantine dir is required for action '{action}'"
                    ))
                })?;
                let store = Quarantine::new(action, dir, self.quarantine_listener)
                    .map_err(|e| ClamError::Config(e.to_string()))?;
                Some(store)
            }
        };

        Ok(ClamClient {
            endpoint: Endpoint {
                hostname: self.hostname,
                port: self.port,
                separator: self.separator,
                connect_timeout: duration_or_indefinite(self.connection_timeout_ms),
                read_timeout: duration_or_indefinite(self.read_timeout_ms),
            },
            quarantine,
            capabilities: OnceLock::new(),
            last_run: Mutex::new(None),
        })
    }
}

const fn duration_or_indefinite(millis: u64) -> Option<Duration> {
    if millis == 0 {
        None
    } else {
        Some(Duration::from_millis(millis))
    }
}

/// Client for a single clamd endpoint.
#[derive(Debug)]
pub struct ClamClient {
    endpoint: Endpoint,
    quarantine: Option<Quarantine>,
    capabilities: OnceLock<Vec<String>>,
    last_run: Mutex<Option<CommandRunDetails>>,
}

impl ClamClient {
    /// Builder with the defaults from the module constants.
    #[must_use]
    pub fn builder() -> ClamClientBuilder {
        ClamClientBuilder::default()
    }

    /// PING the daemon. `Ok(true)` exactly when it answers `PONG`.
    pub fn ping(&self) -> Result<bool, ClamError> {
        self.run(Ping)
    }

    /// Daemon version string.
    pub fn version(&self) -> Result<String, ClamError> {
        self.run(Version)
    }

    /// Daemon statistics, verbatim multi-line text.
    pub fn stats(&self) -> Result<String, ClamError> {
        self.run(Stats)
    }

    /// Reload the daemon's signature databases.
    pub fn reload(&self) -> Result<(), ClamError> {
        self.run(Reload)
    }

    /// Ask the daemon to shut down.
    pub fn shutdown(&self) -> Result<(), ClamError> {
        self.run(Shutdown)
    }

    /// Daemon version plus the advertised command set. Also primes the
    /// capability gate.
    pub fn version_commands(&self) -> Result<DaemonCapabilities, ClamError> {
        let caps = self.run_unchecked(VersionCommands)?;
        let _ = self.capabilities.get_or_init(|| caps.commands.clone());
        Ok(caps)
    }

    /// The memoized advertised command set, probing the daemon on first use.
    pub fn daemon_commands(&self) -> Result<&[String], ClamError> {
        self.advertised().map(Vec::as_slice)
    }

    /// SCAN a single path on the daemon's host.
    pub fn scan(&self, path: &Path) -> Result<ScanResult, ClamError> {
        let result = self.run(Scan {
            server_path: self.server_path(path),
        })?;
        self.apply_quarantine(&result)?;
        Ok(result)
    }

    /// CONTSCAN: recursive scan that does not stop at the first hit.
    pub fn cont_scan(&self, path: &Path) -> Result<ScanResult, ClamError> {
        let result = self.run(ContScan {
            server_path: self.server_path(path),
        })?;
        self.apply_quarantine(&result)?;
        Ok(result)
    }

    /// MULTISCAN: daemon-parallelized scan; entry order across files is not
    /// guaranteed.
    pub fn multi_scan(&self, path: &Path) -> Result<ScanResult, ClamError> {
        let result = self.run(MultiScan {
            server_path: self.server_path(path),
        })?;
        self.apply_quarantine(&result)?;
        Ok(result)
    }

    /// INSTREAM scan of in-memory data with the default chunk size.
    pub fn scan_stream<R: Read>(&self, source: R) -> Result<ScanResult, ClamError> {
        self.scan_stream_with_chunk_size(source, DEFAULT_CHUNK_SIZE)
    }

    /// INSTREAM scan with a caller-chosen chunk size. The last chunk may be
    /// short; a chunk larger than the daemon's `StreamMaxLength` makes the
    /// daemon answer with an ERROR entry.
    pub fn scan_stream_with_chunk_size<R: Read>(
        &self,
        source: R,
        chunk_size: usize,
    ) -> Result<ScanResult, ClamError> {
        self.run(InStream { source, chunk_size })
    }

    /// Whether a TCP connection to the endpoint can be opened within the
    /// configured connect timeout. Never fails.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.is_reachable_within(
            self.endpoint
                .connect_timeout
                .unwrap_or(Duration::from_millis(DEFAULT_CONNECTION_TIMEOUT_MS)),
        )
    }

    /// Reachability probe with an explicit timeout. Never fails.
    #[must_use]
    pub fn is_reachable_within(&self, timeout: Duration) -> bool {
        match self.resolve() {
            Ok(addrs) => addrs
                .iter()
                .any(|addr| TcpStream::connect_timeout(addr, timeout).is_ok()),
            Err(_) => false,
        }
    }

    /// Request/reply pair of the most recent command, for debugging.
    #[must_use]
    pub fn last_command_details(&self) -> Option<CommandRunDetails> {
        self.last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.endpoint.hostname
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.endpoint.port
    }

    #[must_use]
    pub fn file_separator(&self) -> FileSeparator {
        self.endpoint.separator
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn server_path(&self, path: &Path) -> String {
        self.endpoint
            .separator
            .to_server(&path.to_string_lossy())
    }

    fn run<C: ClamCommand>(&self, cmd: C) -> Result<C::Output, ClamError> {
        self.ensure_advertised(cmd.name())?;
        self.run_unchecked(cmd)
    }

    fn run_unchecked<C: ClamCommand>(&self, mut cmd: C) -> Result<C::Output, ClamError> {
        debug!(
            "sending {} to {}:{}",
            cmd.name(),
            self.endpoint.hostname,
            self.endpoint.port
        );

        let mut stream = self.connect()?;
        cmd.write_request(&mut stream).map_err(ClamError::Network)?;
        let raw = read_reply(&mut stream)?;
        drop(stream);

        *self
            .last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(CommandRunDetails {
            request: cmd.command_string(),
            reply: raw.clone(),
        });

        let text = String::from_utf8_lossy(&raw);
        cmd.parse_reply(text.trim_end_matches('\0'))
    }

    fn ensure_advertised(&self, name: &str) -> Result<(), ClamError> {
        let advertised = self.advertised()?;
        if advertised.iter().any(|c| c == name) {
            Ok(())
        } else {
            Err(ClamError::UnknownCommand(name.to_string()))
        }
    }

    fn advertised(&self) -> Result<&Vec<String>, ClamError> {
        if let Some(commands) = self.capabilities.get() {
            return Ok(commands);
        }
        let caps = self.run_unchecked(VersionCommands)?;
        Ok(self.capabilities.get_or_init(|| caps.commands))
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>, ClamError> {
        let addrs = (self.endpoint.hostname.as_str(), self.endpoint.port)
            .to_socket_addrs()
            .map_err(ClamError::Network)?
            .collect::<Vec<_>>();
        if addrs.is_empty() {
            return Err(ClamError::Config(format!(
                "hostname '{}' resolves to no address",
                self.endpoint.hostname
            )));
        }
        Ok(addrs)
    }

    fn connect(&self) -> Result<TcpStream, ClamError> {
        let addrs = self.resolve()?;
        let mut last_err: Option<std::io::Error> = None;

        for addr in &addrs {
            let attempt = match self.endpoint.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    stream
                        .set_read_timeout(self.endpoint.read_timeout)
                        .map_err(ClamError::Network)?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(ClamError::Network(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotConnected, "no address to connect")
        })))
    }

    fn apply_quarantine(&self, result: &ScanResult) -> Result<(), ClamError> {
        let Some(quarantine) = &self.quarantine else {
            return Ok(());
        };
        if !result.has_virus() {
            return Ok(());
        }

        let infections: Vec<(std::path::PathBuf, Vec<String>)> = result
            .infections()
            .map(|(server_path, viruses)| {
                let local = self.endpoint.separator.to_local(server_path);
                (std::path::PathBuf::from(local), viruses.to_vec())
            })
            .collect();

        let handled = quarantine.handle(&infections)?;
        for file in &handled {
            warn!(
                "quarantined '{}' ({:?}) via {}",
                file.original.display(),
                file.viruses,
                file.action
            );
        }
        Ok(())
    }
}

/// Read the full reply: until the daemon closes the write side, or until the
/// read timeout fires after at least some data arrived.
fn read_reply(stream: &mut TcpStream) -> Result<Vec<u8>, ClamError> {
    let mut reply = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => reply.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e)
                if !reply.is_empty()
                    && matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
            {
                break
            }
            Err(e) => return Err(ClamError::Network(e)),
        }
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::FileStatus;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ADVERTISED: &str =
        "ClamAV 1.3.1/27291/Tue Jul 28| COMMANDS: SCAN CONTSCAN MULTISCAN INSTREAM PING \
         VERSION STATS RELOAD SHUTDOWN VERSIONCOMMANDS";

    /// In-process mock clamd: answers one framed command per connection.
    fn mock_daemon(
        respond: impl Fn(&str) -> Vec<u8> + Send + 'static,
    ) -> (SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connections);

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                counter.fetch_add(1, Ordering::SeqCst);

                let command = read_framed_command(&mut stream);
                if command == "INSTREAM" {
                    drain_instream_chunks(&mut stream);
                }
                let reply = respond(&command);
                let _ = stream.write_all(&reply);
            }
        });

        (addr, connections)
    }

    fn read_framed_command(stream: &mut TcpStream) -> String {
        let mut bytes = Vec::new();
        let mut one = [0u8; 1];
        while let Ok(1) = stream.read(&mut one) {
            if one[0] == 0 {
                break;
            }
            bytes.push(one[0]);
        }
        let text = String::from_utf8_lossy(&bytes);
        text.strip_prefix('z').unwrap_or(&text).to_string()
    }

    fn drain_instream_chunks(stream: &mut TcpStream) -> usize {
        let mut total = 0;
        loop {
            let mut len_be = [0u8; 4];
            if stream.read_exact(&mut len_be).is_err() {
                return total;
            }
            let len = u32::from_be_bytes(len_be) as usize;
            if len == 0 {
                return total;
            }
            let mut payload = vec![0u8; len];
            if stream.read_exact(&mut payload).is_err() {
                return total;
            }
            total += len;
        }
    }

    fn client_for(addr: SocketAddr) -> ClamClient {
        ClamClient::builder()
            .hostname(&addr.ip().to_string())
            .port(addr.port())
            .connection_timeout_ms(2_000)
            .read_timeout_ms(2_000)
            .build()
            .unwrap()
    }

    fn standard_responder(command: &str) -> Vec<u8> {
        match command {
            "VERSIONCOMMANDS" => format!("{ADVERTISED}\0").into_bytes(),
            "PING" => b"PONG\0".to_vec(),
            "VERSION" => b"ClamAV 1.3.1/27291/Tue Jul 28\0".to_vec(),
            cmd if cmd.starts_with("SCAN ") => {
                let path = &cmd["SCAN ".len()..];
                format!("{path}: OK\0").into_bytes()
            }
            "INSTREAM" => b"stream: OK\0".to_vec(),
            other => format!("{other}: unsupported ERROR\0").into_bytes(),
        }
    }

    #[test]
    fn ping_returns_true_on_pong() {
        let (addr, _) = mock_daemon(standard_responder);
        let client = client_for(addr);
        assert!(client.ping().unwrap());
    }

    #[test]
    fn ping_returns_false_on_anything_else() {
        let (addr, _) = mock_daemon(|cmd| match cmd {
            "VERSIONCOMMANDS" => format!("{ADVERTISED}\0").into_bytes(),
            _ => b"PANG\0".to_vec(),
        });
        let client = client_for(addr);
        assert!(!client.ping().unwrap());
    }

    #[test]
    fn scan_clean_file() {
        let (addr, _) = mock_daemon(standard_responder);
        let client = client_for(addr);

        let result = client.scan(Path::new("/tmp/a.pdf")).unwrap();
        assert_eq!(result.entries().len(), 1);
        assert_eq!(result.status("/tmp/a.pdf"), Some(&FileStatus::Clean));
        assert!(!result.has_virus());

        let details = client.last_command_details().unwrap();
        assert_eq!(details.request, "SCAN /tmp/a.pdf");
        assert_eq!(details.reply, b"/tmp/a.pdf: OK\0");
    }

    #[test]
    fn scan_infected_file() {
        let (addr, _) = mock_daemon(|cmd| match cmd {
            "VERSIONCOMMANDS" => format!("{ADVERTISED}\0").into_bytes(),
            _ => b"/tmp/eicar.txt: Eicar-Test-Signature FOUND\0".to_vec(),
        });
        let client = client_for(addr);

        let result = client.scan(Path::new("/tmp/eicar.txt")).unwrap();
        assert!(result.has_virus());
        assert_eq!(
            result.virus_map().get("/tmp/eicar.txt").map(Vec::as_slice),
            Some(&["Eicar-Test-Signature".to_string()][..])
        );
    }

    #[test]
    fn instream_upload_is_acknowledged() {
        let (addr, _) = mock_daemon(standard_responder);
        let client = client_for(addr);

        let payload = vec![0x5A_u8; 5000];
        let result = client.scan_stream(payload.as_slice()).unwrap();
        assert_eq!(result.status("stream"), Some(&FileStatus::Clean));
        assert_eq!(client.last_command_details().unwrap().request, "INSTREAM");
    }

    #[test]
    fn unadvertised_command_never_reaches_the_socket() {
        let (addr, connections) = mock_daemon(|cmd| match cmd {
            "VERSIONCOMMANDS" => b"ClamAV 1.3.1| COMMANDS: PING VERSION\0".to_vec(),
            _ => b"PONG\0".to_vec(),
        });
        let client = client_for(addr);

        assert_matches!(
            client.scan(Path::new("/tmp/a.pdf")),
            Err(ClamError::UnknownCommand(name)) if name == "SCAN"
        );
        // Only the capability probe connected.
        assert_eq!(connections.load(Ordering::SeqCst), 1);

        // The probe is memoized: further rejections add no connections.
        assert_matches!(client.stats(), Err(ClamError::UnknownCommand(_)));
        assert_eq!(connections.load(Ordering::SeqCst), 1);

        assert!(client.ping().unwrap());
        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn version_commands_without_marker_is_protocol_error() {
        let (addr, _) = mock_daemon(|_| b"ClamAV 1.3.1 nothing else\0".to_vec());
        let client = client_for(addr);
        assert_matches!(client.version_commands(), Err(ClamError::Protocol(_)));
    }

    #[test]
    fn daemon_commands_are_memoized() {
        let (addr, connections) = mock_daemon(standard_responder);
        let client = client_for(addr);

        let first = client.daemon_commands().unwrap().to_vec();
        let second = client.daemon_commands().unwrap().to_vec();
        assert_eq!(first, second);
        assert!(first.iter().any(|c| c == "INSTREAM"));
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reachability_probe_never_errors() {
        let (addr, _) = mock_daemon(standard_responder);
        let client = client_for(addr);
        assert!(client.is_reachable());

        // A port nothing listens on refuses promptly.
        let unused = TcpListener::bind("127.0.0.1:0").unwrap();
        let dead_addr = unused.local_addr().unwrap();
        drop(unused);
        let dead = client_for(dead_addr);
        assert!(!dead.is_reachable_within(Duration::from_millis(300)));
    }

    #[test]
    fn builder_rejects_bad_parameters() {
        assert_matches!(
            ClamClient::builder().hostname("").build(),
            Err(ClamError::Config(_))
        );
        assert_matches!(
            ClamClient::builder().port(0).build(),
            Err(ClamError::Config(_))
        );
        assert_matches!(
            ClamClient::builder()
                .quarantine_action(QuarantineAction::Copy)
                .build(),
            Err(ClamError::Config(_))
        );
    }

    #[test]
    fn infected_scan_triggers_the_configured_quarantine() {
        let files_dir = tempfile::TempDir::new().unwrap();
        let quarantine_dir = tempfile::TempDir::new().unwrap();
        let infected = files_dir.path().join("eicar.txt");
        std::fs::write(&infected, b"X5O!P%@AP[4\\PZX54(P^)7CC)7}").unwrap();

        let (addr, _) = mock_daemon(|cmd| match cmd {
            "VERSIONCOMMANDS" => format!("{ADVERTISED}\0").into_bytes(),
            cmd if cmd.starts_with("SCAN ") => {
                let path = &cmd["SCAN ".len()..];
                format!("{path}: Eicar-Test-Signature FOUND\0").into_bytes()
            }
            _ => b"PONG\0".to_vec(),
        });

        let events = Arc::new(Mutex::new(Vec::new()));
        let events_in_listener = Arc::clone(&events);
        let client = ClamClient::builder()
            .hostname(&addr.ip().to_string())
            .port(addr.port())
            .file_separator(FileSeparator::Unchanged)
            .quarantine_action(QuarantineAction::Move)
            .quarantine_dir(quarantine_dir.path())
            .quarantine_listener(move |file: &crate::quarantine::QuarantineFile| {
                events_in_listener.lock().unwrap().push(file.clone());
            })
            .build()
            .unwrap();

        let result = client.scan(&infected).unwrap();
        assert!(result.has_virus());
        assert!(!infected.exists());

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, QuarantineAction::Move);
        assert!(events[0].quarantined_as.as_ref().unwrap().exists());
    }

    #[test]
    fn windows_separator_is_applied_to_outgoing_paths() {
        let (addr, _) = mock_daemon(|cmd| match cmd {
            "VERSIONCOMMANDS" => format!("{ADVERTISED}\0").into_bytes(),
            cmd => {
                assert_eq!(cmd, "SCAN \\tmp\\a.pdf");
                b"\\tmp\\a.pdf: OK\0".to_vec()
            }
        });
        let client = ClamClient::builder()
            .hostname(&addr.ip().to_string())
            .port(addr.port())
            .file_separator(FileSeparator::Windows)
            .build()
            .unwrap();

        let result = client.scan(Path::new("/tmp/a.pdf")).unwrap();
        assert_eq!(result.status("\\tmp\\a.pdf"), Some(&FileStatus::Clean));
    }
}
