//! Radio bridge over a helper process
//!
//! Spawns a radio helper (e.g. a small rfcat script) and talks to it over a
//! line protocol on stdin/stdout:
//!
//! ```text
//! -> FREQ 315000000 | DRATE 4800 | MOD MOD_ASK_OOK | CHANBW 60000 | CHANSPC 24000
//! -> DEV 47607 | MAXPOWER | TX | RX | IDLE | RECV [ms] | XMIT <hex> | RSSI
//! <- OK | ERR <message> | TIMEOUT | RSSI <byte> | *<hex>;<status>
//! ```
//!
//! The helper's stderr is forwarded to the log.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{Frame, Modulation, Radio, RadioError};

/// Radio driven through a helper process
pub struct ProcessRadio {
    label: String,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ProcessRadio {
    /// Spawn `command --index <device_index>` and wait for its banner line
    pub fn spawn(command: &str, device_index: u32, label: &str) -> Result<Self, RadioError> {
        info!("Starting radio helper for {}: {} --index {}", label, command, device_index);

        let mut child = Command::new(command)
            .arg("--index")
            .arg(device_index.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RadioError::Device(format!("failed to spawn {}: {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RadioError::Protocol("helper stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RadioError::Protocol("helper stdout unavailable".to_string()))?;

        // Forward helper diagnostics
        if let Some(stderr) = child.stderr.take() {
            let tag = label.to_string();
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                for line in reader.lines().map_while(Result::ok) {
                    if !line.trim().is_empty() {
                        info!("[{}] {}", tag, line.trim());
                    }
                }
            });
        }

        let mut radio = Self {
            label: label.to_string(),
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };

        let banner = radio.read_reply()?;
        if banner != "OK" {
            return Err(RadioError::Protocol(format!("unexpected banner: {}", banner)));
        }
        info!("Radio helper for {} ready", radio.label);
        Ok(radio)
    }

    fn read_reply(&mut self) -> Result<String, RadioError> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(RadioError::Protocol(format!(
                "radio helper for {} closed its output",
                self.label
            )));
        }

        let reply = line.trim().to_string();
        if let Some(message) = reply.strip_prefix("ERR") {
            return Err(RadioError::Device(message.trim().to_string()));
        }
        Ok(reply)
    }

    fn request(&mut self, command: &str) -> Result<String, RadioError> {
        debug!("[{}] -> {}", self.label, command);
        writeln!(self.stdin, "{}", command)?;
        self.stdin.flush()?;
        self.read_reply()
    }

    fn command(&mut self, command: &str) -> Result<(), RadioError> {
        let reply = self.request(command)?;
        if reply == "OK" {
            Ok(())
        } else {
            Err(RadioError::Protocol(format!("'{}' answered with '{}'", command, reply)))
        }
    }
}

impl Radio for ProcessRadio {
    fn set_frequency(&mut self, hz: u64) -> Result<(), RadioError> {
        self.command(&format!("FREQ {}", hz))
    }

    fn set_data_rate(&mut self, baud: u32) -> Result<(), RadioError> {
        self.command(&format!("DRATE {}", baud))
    }

    fn set_modulation(&mut self, modulation: Modulation) -> Result<(), RadioError> {
        self.command(&format!("MOD {}", modulation))
    }

    fn set_channel_bandwidth(&mut self, hz: u32) -> Result<(), RadioError> {
        self.command(&format!("CHANBW {}", hz))
    }

    fn set_channel_spacing(&mut self, hz: u32) -> Result<(), RadioError> {
        self.command(&format!("CHANSPC {}", hz))
    }

    fn set_deviation(&mut self, hz: u32) -> Result<(), RadioError> {
        self.command(&format!("DEV {}", hz))
    }

    fn set_max_power(&mut self) -> Result<(), RadioError> {
        self.command("MAXPOWER")
    }

    fn set_transmit_mode(&mut self) -> Result<(), RadioError> {
        self.command("TX")
    }

    fn set_receive_mode(&mut self) -> Result<(), RadioError> {
        self.command("RX")
    }

    fn set_idle_mode(&mut self) -> Result<(), RadioError> {
        self.command("IDLE")
    }

    fn receive_frame(&mut self, timeout: Option<Duration>) -> Result<Frame, RadioError> {
        let request = match timeout {
            Some(t) => format!("RECV {}", t.as_millis()),
            None => "RECV".to_string(),
        };
        let reply = self.request(&request)?;
        if reply == "TIMEOUT" {
            return Err(RadioError::Timeout);
        }
        parse_frame_line(&reply)
            .ok_or_else(|| RadioError::Protocol(format!("malformed frame line: {}", reply)))
    }

    fn transmit_frame(&mut self, data: &[u8]) -> Result<(), RadioError> {
        self.command(&format!("XMIT {}", hex::encode(data)))
    }

    fn read_rssi_register(&mut self) -> Result<u8, RadioError> {
        let reply = self.request("RSSI")?;
        parse_rssi_line(&reply)
            .ok_or_else(|| RadioError::Protocol(format!("malformed RSSI reply: {}", reply)))
    }
}

impl Drop for ProcessRadio {
    fn drop(&mut self) {
        // Never leave a transmitter keyed behind us
        if let Err(e) = writeln!(self.stdin, "IDLE").and_then(|_| self.stdin.flush()) {
            warn!("[{}] Failed to idle radio on shutdown: {}", self.label, e);
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Parse a frame line of the form `*<hex>;<status>`
fn parse_frame_line(line: &str) -> Option<Frame> {
    let line = line.trim();
    let body = line.strip_prefix('*')?;
    let (hex_str, status) = body.split_once(';')?;

    let data = hex::decode(hex_str).ok()?;
    if data.is_empty() {
        return None;
    }
    let status = match status.trim() {
        "" => 0,
        s => s.parse().ok()?,
    };
    Some(Frame { data, status })
}

/// Parse an RSSI reply of the form `RSSI <byte>`
fn parse_rssi_line(line: &str) -> Option<u8> {
    line.trim().strip_prefix("RSSI")?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_line() {
        let frame = parse_frame_line("*a1b2c3;64\r\n").unwrap();
        assert_eq!(frame.data, vec![0xA1, 0xB2, 0xC3]);
        assert_eq!(frame.status, 64);
    }

    #[test]
    fn test_parse_frame_line_without_status() {
        let frame = parse_frame_line("*ffee;").unwrap();
        assert_eq!(frame.data, vec![0xFF, 0xEE]);
        assert_eq!(frame.status, 0);
    }

    #[test]
    fn test_parse_frame_line_invalid() {
        assert!(parse_frame_line("OK").is_none());
        assert!(parse_frame_line("*;12").is_none());
        assert!(parse_frame_line("*abc;1").is_none()); // odd length
        assert!(parse_frame_line("*abcd").is_none()); // no terminator
        assert!(parse_frame_line("*abcd;999").is_none()); // status out of range
    }

    #[test]
    fn test_parse_rssi_line() {
        assert_eq!(parse_rssi_line("RSSI 72"), Some(72));
        assert_eq!(parse_rssi_line("RSSI"), None);
        assert_eq!(parse_rssi_line("OK"), None);
    }
}
