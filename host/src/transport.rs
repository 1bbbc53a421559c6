use peerlink_core::{BridgeError, BridgeResult};
use peerlink_ipc::{codec, HostFrame, ModuleFrame};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::{self, JoinHandle};
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

// Constants for buffer sizes
const STDIO_BUFFER_SIZE: usize = 8192;
const CHANNEL_BUFFER_SIZE: usize = 32;
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
const SUMMARY_LEN: usize = 48;

type Responder = oneshot::Sender<BridgeResult<String>>;

// Simple structure to track pending requests
#[derive(Debug)]
struct PendingRequest {
    responder: Responder,
    summary: String, // For debugging/logging
}

type PendingTable = Arc<Mutex<HashMap<u64, PendingRequest>>>;

#[derive(Debug)]
struct Link {
    outbound: mpsc::Sender<HostFrame>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    process: Option<Child>,
}

#[derive(Debug)]
enum Lifecycle {
    Unopened,
    Open(Link),
    Closed,
}

/// The host's handle on the module's message endpoint.
///
/// Opened exactly once with [`Transport::open`] or [`Transport::open_process`]
/// and closed with [`Transport::close`]. Sends outside that window fail with
/// `TransportUnavailable`.
#[derive(Debug, Clone)]
pub struct Transport {
    state: Arc<Mutex<Lifecycle>>,
    pending: PendingTable,
    next_request_id: Arc<AtomicU64>,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(Lifecycle::Unopened)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_request_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Binds the module's byte streams and starts the reader and writer tasks.
    ///
    /// Returns the stream of payloads the module pushes, in arrival order.
    pub async fn open<R, W>(&self, reader: R, writer: W) -> BridgeResult<mpsc::Receiver<String>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut state = self.state.lock().await;
        Self::ensure_unopened(&state)?;
        let (link, inbound) = self.bind(reader, writer, None);
        *state = Lifecycle::Open(link);
        info!("Module channel opened");
        Ok(inbound)
    }

    /// Launches the module as a child process and binds its stdio.
    pub async fn open_process(&self, command: &[String]) -> BridgeResult<mpsc::Receiver<String>> {
        let mut state = self.state.lock().await;
        Self::ensure_unopened(&state)?;

        let (executable, args) = command.split_first().ok_or_else(|| {
            BridgeError::ConfigError("Empty module command".to_string())
        })?;
        info!("Launching module process: {}", command.join(" "));

        let mut cmd = Command::new(executable);
        cmd.args(args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut process = cmd.spawn()?;
        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| BridgeError::ChannelClosed("module stdin unavailable".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| BridgeError::ChannelClosed("module stdout unavailable".to_string()))?;
        if let Some(stderr) = process.stderr.take() {
            task::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line).await {
                        Ok(0) => {
                            info!("Module stderr closed");
                            break;
                        }
                        Ok(_) => warn!("[module stderr]: {}", line.trim_end()),
                        Err(e) => {
                            error!("Error reading module stderr: {}", e);
                            break;
                        }
                    }
                }
            });
        }

        let (link, inbound) = self.bind(stdout, stdin, Some(process));
        *state = Lifecycle::Open(link);
        info!("Module channel opened on process stdio");
        Ok(inbound)
    }

    fn ensure_unopened(state: &Lifecycle) -> BridgeResult<()> {
        match state {
            Lifecycle::Unopened => Ok(()),
            Lifecycle::Open(_) | Lifecycle::Closed => Err(BridgeError::AlreadyOpened),
        }
    }

    fn bind<R, W>(
        &self,
        reader: R,
        writer: W,
        process: Option<Child>,
    ) -> (Link, mpsc::Receiver<String>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::channel::<HostFrame>(CHANNEL_BUFFER_SIZE);
        let (inbound_tx, inbound_rx) = mpsc::channel::<String>(CHANNEL_BUFFER_SIZE);

        let writer = task::spawn(write_loop(writer, outbound_rx));
        let reader = task::spawn(read_loop(reader, inbound_tx, self.pending.clone()));

        let link = Link {
            outbound: outbound_tx,
            reader,
            writer,
            process,
        };
        (link, inbound_rx)
    }

    pub async fn is_open(&self) -> bool {
        matches!(&*self.state.lock().await, Lifecycle::Open(_))
    }

    /// OS process id of the module, when the transport launched it.
    pub async fn process_id(&self) -> Option<u32> {
        match &*self.state.lock().await {
            Lifecycle::Open(link) => link.process.as_ref().and_then(Child::id),
            Lifecycle::Unopened | Lifecycle::Closed => None,
        }
    }

    async fn outbound(&self) -> BridgeResult<mpsc::Sender<HostFrame>> {
        match &*self.state.lock().await {
            Lifecycle::Open(link) => Ok(link.outbound.clone()),
            Lifecycle::Unopened | Lifecycle::Closed => Err(BridgeError::TransportUnavailable),
        }
    }

    /// Sends one message to the module without waiting for anything back.
    pub async fn post(&self, payload: String) -> BridgeResult<()> {
        let outbound = self.outbound().await?;
        debug!("Posting message ({} bytes)", payload.len());
        outbound
            .send(HostFrame::eval(payload))
            .await
            .map_err(|_| BridgeError::ChannelClosed("writer task exited".to_string()))
    }

    /// Registers a correlated request and sends it.
    pub async fn begin_request(&self, payload: String) -> BridgeResult<PendingReply> {
        let outbound = self.outbound().await?;
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let (responder, receiver) = oneshot::channel();

        self.pending.lock().await.insert(
            id,
            PendingRequest {
                responder,
                summary: summarize(&payload),
            },
        );

        debug!("Sending request ID {} ({} bytes)", id, payload.len());
        if outbound.send(HostFrame::request(id, payload)).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(BridgeError::ChannelClosed(format!(
                "failed to send request {}: writer task exited",
                id
            )));
        }

        Ok(PendingReply { id, receiver })
    }

    /// Sends a correlated request and waits up to `timeout` for its reply.
    pub async fn request(&self, payload: String, timeout: Duration) -> BridgeResult<String> {
        let reply = self.begin_request(payload).await?;
        let id = reply.id();
        match tokio::time::timeout(timeout, reply.wait()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Request ID {} timed out after {:?}", id, timeout);
                self.abandon(id).await;
                Err(BridgeError::Timeout { id, after: timeout })
            }
        }
    }

    /// Cancels a pending request. Its waiter receives `Cancelled`.
    ///
    /// Returns false if the request already completed or never existed.
    pub async fn cancel(&self, id: u64) -> bool {
        let Some(pending) = self.pending.lock().await.remove(&id) else {
            return false;
        };
        info!("Cancelling request ID {} ('{}')", id, pending.summary);
        let _ = pending.responder.send(Err(BridgeError::Cancelled(id)));
        self.send_cancel(id).await;
        true
    }

    async fn abandon(&self, id: u64) {
        if self.pending.lock().await.remove(&id).is_some() {
            self.send_cancel(id).await;
        }
    }

    async fn send_cancel(&self, id: u64) {
        if let Ok(outbound) = self.outbound().await {
            if outbound.send(HostFrame::Cancel { id }).await.is_err() {
                debug!("Could not notify module of cancelled request ID {}", id);
            }
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Closes the channel for good. Pending requests fail with `ChannelClosed`.
    pub async fn close(&self) {
        let previous = {
            let mut state = self.state.lock().await;
            std::mem::replace(&mut *state, Lifecycle::Closed)
        };

        if let Lifecycle::Open(link) = previous {
            let Link {
                outbound,
                reader,
                writer,
                process,
            } = link;

            // Dropping the sender lets the writer drain and shut the stream down.
            drop(outbound);
            if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
                warn!("Writer task did not finish within {:?}", WRITER_DRAIN_TIMEOUT);
            }
            reader.abort();

            if let Some(mut process) = process {
                if let Err(e) = process.kill().await {
                    error!("Failed to kill module process: {}", e);
                } else {
                    info!("Killed module process");
                }
            }
            info!("Module channel closed");
        }

        fail_pending(&self.pending, "module channel closed").await;
    }
}

/// A correlated request awaiting its reply.
#[derive(Debug)]
pub struct PendingReply {
    id: u64,
    receiver: oneshot::Receiver<BridgeResult<String>>,
}

impl PendingReply {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the reply without a deadline.
    pub async fn wait(self) -> BridgeResult<String> {
        self.receiver.await.map_err(|_| {
            BridgeError::ChannelClosed(format!("request {} was dropped", self.id))
        })?
    }
}

fn summarize(payload: &str) -> String {
    payload.chars().take(SUMMARY_LEN).collect()
}

async fn fail_pending(pending: &PendingTable, reason: &str) {
    let mut requests = pending.lock().await;
    if requests.is_empty() {
        return;
    }
    warn!("Failing {} pending requests: {}", requests.len(), reason);
    for (_, request) in requests.drain() {
        let _ = request
            .responder
            .send(Err(BridgeError::ChannelClosed(reason.to_string())));
    }
}

async fn resolve(pending: &PendingTable, id: u64, result: BridgeResult<String>) {
    match pending.lock().await.remove(&id) {
        Some(request) => {
            debug!("Matched reply ID {} to pending request '{}'", id, request.summary);
            if request.responder.send(result).is_err() {
                warn!("Requester for ID {} went away before the reply arrived", id);
            }
        }
        None => warn!("Received reply for unknown or timed-out request ID: {}", id),
    }
}

async fn write_loop<W>(writer: W, mut outbound: mpsc::Receiver<HostFrame>)
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::with_capacity(STDIO_BUFFER_SIZE, writer);
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = codec::write_frame(&mut writer, &frame).await {
            error!("Error writing to module: {}", e);
            outbound.close();
            break;
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!("Error shutting down module writer: {}", e);
    }
    info!("Writer task finished");
}

async fn read_loop<R>(reader: R, inbound: mpsc::Sender<String>, pending: PendingTable)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::with_capacity(STDIO_BUFFER_SIZE, reader);
    loop {
        let body = match codec::read_frame(&mut reader).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                info!("Module closed its channel");
                break;
            }
            Err(e) => {
                error!("Error reading from module: {}", e);
                break;
            }
        };

        let frame: ModuleFrame = match codec::decode(&body) {
            Ok(frame) => frame,
            Err(_) => {
                error!("Skipping undecodable module frame: {}", body);
                continue;
            }
        };

        match frame {
            ModuleFrame::Reply { id, payload } => resolve(&pending, id, Ok(payload)).await,
            ModuleFrame::Error { id, message } => {
                resolve(&pending, id, Err(BridgeError::Peer(message))).await
            }
            ModuleFrame::Push { payload } => {
                if inbound.send(payload).await.is_err() {
                    info!("Dispatcher stopped, dropping inbound stream");
                    break;
                }
            }
        }
    }

    fail_pending(&pending, "module reader exited").await;
    info!("Reader task exiting");
}
