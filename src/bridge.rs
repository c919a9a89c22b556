//! Host bridge
//!
//! The controller's way back into the client: joining or declining a call
//! and raising the main window. The stdout implementation shares a single
//! line writer with the headless popup so commands never interleave.

use log::debug;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

use crate::error::CallRingResult;
use crate::protocol::HostCommand;

/// Signals sent from the popup side back to the client
pub trait HostBridge {
    /// Join the call ringing on `channel_id`
    fn join_call(&self, channel_id: &str) -> CallRingResult<()>;

    /// Stop ringing on `channel_id` without joining
    fn stop_ringing(&self, channel_id: &str) -> CallRingResult<()>;

    /// Show and focus the main client window
    fn focus_main(&self) -> CallRingResult<()>;
}

/// Shared, line-buffered JSON writer
#[derive(Clone)]
pub struct LineWriter {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LineWriter {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(out))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    /// Write one command as a single JSON line and flush
    pub fn send(&self, command: &HostCommand) -> CallRingResult<()> {
        let line = serde_json::to_string(command)?;
        let mut out = self.out.lock();
        writeln!(out, "{}", line)?;
        out.flush()?;
        debug!("-> {}", line);
        Ok(())
    }
}

/// Bridge that writes host commands through a [`LineWriter`]
#[derive(Clone)]
pub struct LineBridge {
    writer: LineWriter,
}

impl LineBridge {
    pub fn new(writer: LineWriter) -> Self {
        Self { writer }
    }
}

impl HostBridge for LineBridge {
    fn join_call(&self, channel_id: &str) -> CallRingResult<()> {
        self.writer.send(&HostCommand::Call {
            channel_id: channel_id.to_string(),
        })
    }

    fn stop_ringing(&self, channel_id: &str) -> CallRingResult<()> {
        self.writer.send(&HostCommand::StopRinging {
            channel_id: channel_id.to_string(),
        })
    }

    fn focus_main(&self) -> CallRingResult<()> {
        self.writer.send(&HostCommand::FocusMain)
    }
}

/// In-memory sink for tests: a writer plus the buffer it appends to
#[cfg(test)]
pub(crate) fn memory_writer() -> (LineWriter, Arc<Mutex<Vec<u8>>>) {
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let buf = Arc::new(Mutex::new(Vec::new()));
    (LineWriter::new(Shared(buf.clone())), buf)
}

/// Decode everything written to a [`memory_writer`] buffer
#[cfg(test)]
pub(crate) fn written_commands(buf: &Mutex<Vec<u8>>) -> Vec<HostCommand> {
    let bytes = buf.lock();
    String::from_utf8_lossy(&bytes)
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid command line"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_writes_one_line_per_command() {
        let (writer, buf) = memory_writer();
        let bridge = LineBridge::new(writer);

        bridge.join_call("c1").unwrap();
        bridge.focus_main().unwrap();
        bridge.stop_ringing("c2").unwrap();

        assert_eq!(
            written_commands(&buf),
            vec![
                HostCommand::Call { channel_id: "c1".into() },
                HostCommand::FocusMain,
                HostCommand::StopRinging { channel_id: "c2".into() },
            ]
        );
    }

    #[test]
    fn write_failure_is_reported() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "host gone"))
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let bridge = LineBridge::new(LineWriter::new(Broken));
        assert!(bridge.focus_main().is_err());
    }
}
