// SPDX-FileCopyrightText: 2026 the Aviron contributors
// SPDX-License-Identifier: Apache-2.0

//! Typed clamd commands and their wire framing.
//!
//! Every command goes on the wire as `z<COMMAND>[ <ARG>]\0` and is answered
//! by NUL-terminated ASCII. `INSTREAM` additionally uploads the payload as
//! big-endian length-prefixed chunks terminated by a zero-length chunk.

use std::io::{self, Read, Write};

use crate::error::ClamError;
use crate::response::ScanResult;

/// Default INSTREAM chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Frame a command string for the wire: `z` prefix, NUL terminator.
pub(crate) fn frame(command: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(command.len() + 2);
    bytes.push(b'z');
    bytes.extend_from_slice(command.as_bytes());
    bytes.push(0);
    bytes
}

/// One clamd command: how to encode the request and decode the reply.
///
/// The client drives this generically: capability gate on [`name`], fresh
/// connection, [`write_request`], full reply read, [`parse_reply`].
///
/// [`name`]: ClamCommand::name
/// [`write_request`]: ClamCommand::write_request
/// [`parse_reply`]: ClamCommand::parse_reply
pub(crate) trait ClamCommand {
    type Output;

    /// Bare command name as advertised by `VERSIONCOMMANDS`.
    fn name(&self) -> &'static str;

    /// Full command text without framing, e.g. `SCAN /tmp/a.pdf`.
    fn command_string(&self) -> String;

    /// Write the framed request, including any payload.
    fn write_request<W: Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&frame(&self.command_string()))
    }

    /// Decode the reply text (trailing NULs already stripped).
    fn parse_reply(&self, reply: &str) -> Result<Self::Output, ClamError>;
}

pub(crate) struct Ping;

impl ClamCommand for Ping {
    type Output = bool;

    fn name(&self) -> &'static str {
        "PING"
    }

    fn command_string(&self) -> String {
        "PING".to_string()
    }

    fn parse_reply(&self, reply: &str) -> Result<bool, ClamError> {
        Ok(reply.trim() == "PONG")
    }
}

pub(crate) struct Version;

impl ClamCommand for Version {
    type Output = String;

    fn name(&self) -> &'static str {
        "VERSION"
    }

    fn command_string(&self) -> String {
        "VERSION".to_string()
    }

    fn parse_reply(&self, reply: &str) -> Result<String, ClamError> {
        Ok(reply.trim().to_string())
    }
}

pub(crate) struct Stats;

impl ClamCommand for Stats {
    type Output = String;

    fn name(&self) -> &'static str {
        "STATS"
    }

    fn command_string(&self) -> String {
        "STATS".to_string()
    }

    fn parse_reply(&self, reply: &str) -> Result<String, ClamError> {
        Ok(reply.to_string())
    }
}

pub(crate) struct Reload;

impl ClamCommand for Reload {
    type Output = ();

    fn name(&self) -> &'static str {
        "RELOAD"
    }

    fn command_string(&self) -> String {
        "RELOAD".to_string()
    }

    fn parse_reply(&self, _reply: &str) -> Result<(), ClamError> {
        Ok(())
    }
}

pub(crate) struct Shutdown;

impl ClamCommand for Shutdown {
    type Output = ();

    fn name(&self) -> &'static str {
        "SHUTDOWN"
    }

    fn command_string(&self) -> String {
        "SHUTDOWN".to_string()
    }

    fn parse_reply(&self, _reply: &str) -> Result<(), ClamError> {
        Ok(())
    }
}

/// Daemon identity and advertised command set from `VERSIONCOMMANDS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonCapabilities {
    pub version: String,
    pub commands: Vec<String>,
}

pub(crate) struct VersionCommands;

impl ClamCommand for VersionCommands {
    type Output = DaemonCapabilities;

    fn name(&self) -> &'static str {
        "VERSIONCOMMANDS"
    }

    fn command_string(&self) -> String {
        "VERSIONCOMMANDS".to_string()
    }

    fn parse_reply(&self, reply: &str) -> Result<DaemonCapabilities, ClamError> {
        let (version, rest) = reply.split_once('|').ok_or_else(|| {
            ClamError::Protocol(format!("VERSIONCOMMANDS reply without '|': {reply:?}"))
        })?;

        let commands = rest
            .trim_start()
            .strip_prefix("COMMANDS:")
            .ok_or_else(|| {
                ClamError::Protocol(format!(
                    "VERSIONCOMMANDS reply without COMMANDS: marker: {reply:?}"
                ))
            })?
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Ok(DaemonCapabilities {
            version: version.trim().to_string(),
            commands,
        })
    }
}

pub(crate) struct Scan {
    pub server_path: String,
}

impl ClamCommand for Scan {
    type Output = ScanResult;

    fn name(&self) -> &'static str {
        "SCAN"
    }

    fn command_string(&self) -> String {
        format!("SCAN {}", self.server_path)
    }

    fn parse_reply(&self, reply: &str) -> Result<ScanResult, ClamError> {
        ScanResult::parse(reply)
    }
}

pub(crate) struct ContScan {
    pub server_path: String,
}

impl ClamCommand for ContScan {
    type Output = ScanResult;

    fn name(&self) -> &'static str {
        "CONTSCAN"
    }

    fn command_string(&self) -> String {
        format!("CONTSCAN {}", self.server_path)
    }

    fn parse_reply(&self, reply: &str) -> Result<ScanResult, ClamError> {
        ScanResult::parse(reply)
    }
}

pub(crate) struct MultiScan {
    pub server_path: String,
}

impl ClamCommand for MultiScan {
    type Output = ScanResult;

    fn name(&self) -> &'static str {
        "MULTISCAN"
    }

    fn command_string(&self) -> String {
        format!("MULTISCAN {}", self.server_path)
    }

    fn parse_reply(&self, reply: &str) -> Result<ScanResult, ClamError> {
        ScanResult::parse(reply)
    }
}

pub(crate) struct InStream<R> {
    pub source: R,
    pub chunk_size: usize,
}

impl<R: Read> ClamCommand for InStream<R> {
    type Output = ScanResult;

    fn name(&self) -> &'static str {
        "INSTREAM"
    }

    fn command_string(&self) -> String {
        "INSTREAM".to_string()
    }

    fn write_request<W: Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&frame("INSTREAM"))?;

        let chunk_size = self.chunk_size.clamp(1, u32::MAX as usize);
        let mut buffer = vec![0u8; chunk_size];
        loop {
            let len = read_full(&mut self.source, &mut buffer)?;
            if len == 0 {
                break;
            }
            let len_be = u32::try_from(len).unwrap_or(u32::MAX).to_be_bytes();
            writer.write_all(&len_be)?;
            writer.write_all(&buffer[..len])?;
            if len < chunk_size {
                break;
            }
        }

        // Zero-length terminator chunk.
        writer.write_all(&0u32.to_be_bytes())?;
        Ok(())
    }

    fn parse_reply(&self, reply: &str) -> Result<ScanResult, ClamError> {
        ScanResult::parse(reply)
    }
}

/// Fill `buf` from the reader, short only at end of input.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
