//! The capture task: one continuous reader feeding the hand-off queue

use super::device::{detect_reader, InputEvent, EVENT_SIZE};
use super::{ScanCapture, ScanEvent};
use crate::config::{ScanConfig, ScanSource};
use crate::handoff::HandoffQueue;
use std::io::{self, Read};
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tracing::{info, warn};

/// How raw bytes turn into characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Each byte is one character
    Text,
    /// Fixed-size `input_event` records
    InputEvents,
}

/// An opened scan input
pub struct ScanInput {
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
    pub framing: Framing,
    pub description: String,
}

impl ScanInput {
    pub fn stdin() -> io::Result<Self> {
        Ok(Self {
            reader: Box::pin(spawn_reader_thread(std::io::stdin(), "scan-stdin")?),
            framing: Framing::Text,
            description: "standard input".to_string(),
        })
    }

    pub fn device(path: PathBuf) -> io::Result<Self> {
        let file = std::fs::File::open(&path)?;
        Ok(Self {
            reader: Box::pin(spawn_reader_thread(file, "scan-device")?),
            framing: Framing::InputEvents,
            description: path.display().to_string(),
        })
    }

    /// Open the input selected by `config.source`
    ///
    /// `auto` prefers a configured or detected reader device and falls back
    /// to standard input; `device` fails if no device can be opened.
    pub fn open(config: &ScanConfig) -> io::Result<Self> {
        if config.source == ScanSource::Stdin {
            return Self::stdin();
        }

        let path = config
            .device
            .clone()
            .or_else(|| detect_reader(&config.device_patterns));

        match (config.source, path) {
            (ScanSource::Device, None) => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "no card reader device configured or detected",
            )),
            (ScanSource::Device, Some(path)) => Self::device(path),
            (_, Some(path)) => match Self::device(path.clone()) {
                Ok(input) => Ok(input),
                Err(e) => {
                    warn!(
                        "Cannot open {} ({}), reading scans from standard input",
                        path.display(),
                        e
                    );
                    if e.kind() == io::ErrorKind::PermissionDenied {
                        warn!("Add the service user to the 'input' group to read the reader directly");
                    }
                    Self::stdin()
                }
            },
            (_, None) => {
                info!("No card reader device detected, reading scans from standard input");
                Self::stdin()
            }
        }
    }
}

/// Move a blocking reader onto its own thread, exposed as an async stream
///
/// The thread is detached: a read blocked on a terminal or input device
/// never holds up runtime shutdown. Must be called within a Tokio runtime.
fn spawn_reader_thread<R>(mut source: R, name: &str) -> io::Result<DuplexStream>
where
    R: Read + Send + 'static,
{
    let (mut writer, reader) = tokio::io::duplex(1024);
    let handle = tokio::runtime::Handle::current();

    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let mut buf = [0u8; 256];
            loop {
                let n = match source.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("Scan input read failed: {}", e);
                        break;
                    }
                };
                if handle.block_on(writer.write_all(&buf[..n])).is_err() {
                    // Capture task is gone
                    break;
                }
            }
        })?;

    Ok(reader)
}

/// Converts raw bytes into characters according to the framing
struct Decoder {
    framing: Framing,
    partial: Vec<u8>,
}

impl Decoder {
    fn new(framing: Framing) -> Self {
        Self {
            framing,
            partial: Vec::with_capacity(EVENT_SIZE),
        }
    }

    fn decode(&mut self, bytes: &[u8], out: &mut Vec<char>) {
        match self.framing {
            Framing::Text => out.extend(bytes.iter().map(|&b| b as char)),
            Framing::InputEvents => {
                self.partial.extend_from_slice(bytes);
                let complete = self.partial.len() - self.partial.len() % EVENT_SIZE;
                out.extend(
                    self.partial[..complete]
                        .chunks_exact(EVENT_SIZE)
                        .filter_map(InputEvent::decode)
                        .filter_map(|event| event.key_char()),
                );
                self.partial.drain(..complete);
            }
        }
    }
}

/// Read `input` until end of stream, pushing accepted scans onto `queue`
///
/// Never waits on the consumer: a full queue drops its oldest scan. Returns
/// when the input ends or the queue is closed.
pub async fn run_capture(
    input: ScanInput,
    mut capture: ScanCapture,
    queue: HandoffQueue<ScanEvent>,
) -> io::Result<()> {
    let ScanInput {
        mut reader,
        framing,
        description,
    } = input;
    info!("Capturing scans from {}", description);

    let mut decoder = Decoder::new(framing);
    let mut buf = [0u8; 512];
    let mut chars = Vec::new();

    loop {
        let read = match capture.deadline() {
            Some(deadline) => {
                let deadline = tokio::time::Instant::from_std(deadline);
                match tokio::time::timeout_at(deadline, reader.read(&mut buf)).await {
                    Ok(read) => read,
                    Err(_) => {
                        capture.expire(Instant::now());
                        continue;
                    }
                }
            }
            None => reader.read(&mut buf).await,
        };

        let n = read?;
        if n == 0 {
            info!("Scan input {} closed", description);
            return Ok(());
        }

        let now = Instant::now();
        chars.clear();
        decoder.decode(&buf[..n], &mut chars);

        for &ch in &chars {
            let Some(event) = capture.feed(ch, now) else {
                continue;
            };
            match queue.push(event) {
                Ok(None) => {}
                Ok(Some(dropped)) => warn!(
                    card_id = %dropped.card_id,
                    "Hand-off queue full ({}), dropped oldest pending scan",
                    queue.capacity()
                ),
                Err(_) => {
                    info!("Hand-off queue closed, capture stopping");
                    return Ok(());
                }
            }
        }
    }
}
