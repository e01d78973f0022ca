use std::fs;
use std::io;
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use forge_core::pipeline::ConnectionId;
use forge_core::pipeline::GenerationRequest;
use thiserror::Error;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::Message;
use tungstenite::WebSocket;

/// What the reader forwards to the host loop, tagged with its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message {
        connection: ConnectionId,
        text: String,
    },
    Closed {
        connection: ConnectionId,
    },
    Failed {
        connection: ConnectionId,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("failed to encode generation request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Handle to an open pipeline connection. Closing only asks the reader to stop.
#[derive(Debug)]
pub struct PipelineHandle {
    pub connection: ConnectionId,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl PipelineHandle {
    fn finished(connection: ConnectionId) -> Self {
        Self {
            connection,
            stop: Arc::new(AtomicBool::new(true)),
            reader: None,
        }
    }

    pub fn close(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Waits for the reader thread to exit.
    pub fn join(mut self) {
        self.close();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

pub trait PipelineTransport {
    fn open(
        &self,
        connection: ConnectionId,
        request: &GenerationRequest,
        events: Sender<TransportEvent>,
    ) -> Result<PipelineHandle, TransportError>;
}

pub struct WebSocketTransport {
    url: String,
    poll_interval: Duration,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            poll_interval: Duration::from_millis(200),
        }
    }
}

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

fn set_read_timeout(socket: &mut Socket, timeout: Duration) -> io::Result<()> {
    match socket.get_mut() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(Some(timeout)),
        _ => Ok(()),
    }
}

fn is_timeout(err: &tungstenite::Error) -> bool {
    matches!(
        err,
        tungstenite::Error::Io(io_err)
            if matches!(io_err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
    )
}

fn read_frames(
    mut socket: Socket,
    connection: ConnectionId,
    stop: &AtomicBool,
    events: &Sender<TransportEvent>,
) {
    loop {
        if stop.load(Ordering::Relaxed) {
            let _ = socket.close(None);
            let _ = socket.flush();
            tracing::debug!(%connection, "pipeline reader stopped");
            return;
        }

        let event = match socket.read() {
            Ok(Message::Text(text)) => TransportEvent::Message { connection, text },
            Ok(Message::Close(_))
            | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                let _ = events.send(TransportEvent::Closed { connection });
                return;
            }
            Ok(_) => continue,
            Err(err) if is_timeout(&err) => continue,
            Err(err) => {
                let _ = events.send(TransportEvent::Failed {
                    connection,
                    message: err.to_string(),
                });
                return;
            }
        };
        if events.send(event).is_err() {
            return;
        }
    }
}

impl PipelineTransport for WebSocketTransport {
    fn open(
        &self,
        connection: ConnectionId,
        request: &GenerationRequest,
        events: Sender<TransportEvent>,
    ) -> Result<PipelineHandle, TransportError> {
        let (mut socket, _response) = tungstenite::connect(self.url.as_str())?;
        socket.send(Message::Text(serde_json::to_string(request)?))?;
        set_read_timeout(&mut socket, self.poll_interval)?;
        tracing::info!(%connection, url = %self.url, "pipeline connected");

        let stop = Arc::new(AtomicBool::new(false));
        let reader_stop = Arc::clone(&stop);
        let reader = thread::spawn(move || {
            read_frames(socket, connection, &reader_stop, &events);
        });

        Ok(PipelineHandle {
            connection,
            stop,
            reader: Some(reader),
        })
    }
}

/// Plays back recorded frames, one JSON document per line.
pub struct ReplayTransport {
    path: PathBuf,
}

impl ReplayTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PipelineTransport for ReplayTransport {
    fn open(
        &self,
        connection: ConnectionId,
        _request: &GenerationRequest,
        events: Sender<TransportEvent>,
    ) -> Result<PipelineHandle, TransportError> {
        let recorded = fs::read_to_string(&self.path)?;
        for line in recorded.lines().map(str::trim).filter(|line| !line.is_empty()) {
            if events
                .send(TransportEvent::Message {
                    connection,
                    text: line.to_string(),
                })
                .is_err()
            {
                break;
            }
        }
        let _ = events.send(TransportEvent::Closed { connection });
        Ok(PipelineHandle::finished(connection))
    }
}
