use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use kernelwire_message::{
    new_id, CompleteReply, CompleteRequest, ExecuteReply, ExecuteRequest, Header, HistoryReply,
    HistoryRequest, InspectReply, InspectRequest, Message, RawMessage, Request, SigningKey,
};
use kernelwire_zmtp::{ReqSocket, SubSocket};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::connection::ConnectionInfo;
use crate::demux::{Demux, Disposition};
use crate::error::{ClientError, DrainError, Result};
use crate::routing::{OutputStream, Router};
use crate::transport::{BroadcastTransport, CommandTransport};

const JOIN_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Default)]
struct State {
    closed: AtomicBool,
    shutdown: AtomicBool,
    terminated: Mutex<Option<DrainError>>,
}

impl State {
    fn termination(&self) -> Option<DrainError> {
        self.terminated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// A connection to one kernel.
///
/// Requests are serialized over the shell channel. A background thread
/// drains the iopub channel and routes each message to the output stream
/// of the request that caused it.
///
/// `Client` is `Sync`; share it behind an `Arc` to issue requests from
/// several threads.
pub struct Client {
    shell: Mutex<Box<dyn CommandTransport>>,
    router: Arc<Router>,
    key: SigningKey,
    session: String,
    username: String,
    output_buffer: usize,
    shutdown_timeout: Duration,
    state: Arc<State>,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    pub fn connect(info: &ConnectionInfo) -> Result<Self> {
        Self::connect_with_config(info, ClientConfig::default())
    }

    /// Connect the iopub and shell channels described by `info`.
    ///
    /// iopub is subscribed first so output of the first request is not missed.
    pub fn connect_with_config(info: &ConnectionInfo, config: ClientConfig) -> Result<Self> {
        let key = info.signing_key()?;
        let zmtp = config.zmtp();

        let iopub_endpoint = info.iopub_endpoint()?;
        let iopub = SubSocket::connect(&iopub_endpoint, &zmtp)?;
        let shell_endpoint = info.shell_endpoint()?;
        let shell = ReqSocket::connect(&shell_endpoint, &zmtp)?;
        info!(shell = %shell_endpoint, iopub = %iopub_endpoint, "connected to kernel");

        Self::from_transports(shell, iopub, key, config)
    }

    /// Build a client over already connected channels and start draining `broadcast`.
    pub fn from_transports(
        command: impl CommandTransport + 'static,
        broadcast: impl BroadcastTransport + 'static,
        key: SigningKey,
        config: ClientConfig,
    ) -> Result<Self> {
        let session = new_id();
        let router = Arc::new(Router::new(config.orphan_grace));
        let state = Arc::new(State::default());

        let drain = Drain {
            broadcast: Box::new(broadcast),
            demux: Demux::new(
                Arc::clone(&router),
                key.clone(),
                session.clone(),
                config.orphan_policy,
            ),
            router: Arc::clone(&router),
            state: Arc::clone(&state),
            poll_interval: config.poll_interval,
            error_sink: config.error_sink.clone(),
        };
        let handle = thread::Builder::new()
            .name("kernelwire-iopub".to_string())
            .spawn(move || drain.run())
            .map_err(ClientError::Spawn)?;

        debug!(session = %session, "client started");
        Ok(Self {
            shell: Mutex::new(Box::new(command)),
            router,
            key,
            session,
            username: config.username,
            output_buffer: config.output_buffer,
            shutdown_timeout: config.shutdown_timeout,
            state,
            drain: Mutex::new(Some(handle)),
        })
    }

    /// Session id sent in every request header.
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Run code. Returns the reply and the output the execution broadcasts.
    ///
    /// The reply usually arrives before the output is complete; the stream
    /// ends when the kernel goes idle for this request.
    pub fn execute(&self, request: ExecuteRequest) -> Result<(ExecuteReply, OutputStream)> {
        let (reply, output) = self.issue(request, true)?;
        match output {
            Some(output) => Ok((reply, output)),
            None => Err(ClientError::Closed),
        }
    }

    pub fn inspect(&self, request: InspectRequest) -> Result<InspectReply> {
        self.request(request)
    }

    pub fn complete(&self, request: CompleteRequest) -> Result<CompleteReply> {
        self.request(request)
    }

    pub fn history(&self, request: HistoryRequest) -> Result<HistoryReply> {
        self.request(request)
    }

    /// Send any request and wait for its reply, ignoring broadcast output.
    ///
    /// Output of requests with [`Request::WANTS_OUTPUT`] is still routed and
    /// then discarded until the kernel goes idle for them.
    pub fn request<R: Request>(&self, request: R) -> Result<R::Reply> {
        self.issue(request, false).map(|(reply, _)| reply)
    }

    /// Number of output streams still open.
    pub fn open_streams(&self) -> usize {
        self.router.len()
    }

    /// The error that stopped the drain thread, if any.
    pub fn termination(&self) -> Option<DrainError> {
        self.state.termination()
    }

    /// Stop draining, end every open output stream and close both channels.
    ///
    /// Idempotent. Also runs on drop.
    pub fn close(&self) -> Result<()> {
        if self.state.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.state.shutdown.store(true, Ordering::Release);
        let open = self.router.close_all();

        let handle = self
            .drain
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            self.join_drain(handle);
        }

        let closed = match self.shell.try_lock() {
            Ok(mut shell) => shell.close(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().close(),
            Err(TryLockError::WouldBlock) => {
                warn!("shell channel busy with a request; leaving it open");
                Ok(())
            }
        };
        info!(session = %self.session, open_streams = open, "client closed");
        closed.map_err(ClientError::from)
    }

    fn issue<R: Request>(&self, content: R, with_output: bool) -> Result<(R::Reply, Option<OutputStream>)> {
        self.ensure_running()?;

        let header = Header::new(R::MSG_TYPE, &self.session, &self.username);
        let msg_id = header.msg_id.clone();
        let frames = Message::new(header, content).to_frames(&self.key)?;

        // Register before sending so no output can beat the route. Requests
        // that broadcast output always get a route, even when the caller
        // discards the stream, so their output is never mistaken for an orphan.
        let routed = with_output || R::WANTS_OUTPUT;
        let output = if routed {
            let stream = self.router.register(&msg_id, self.output_buffer)?;
            if let Err(err) = self.ensure_running() {
                self.router.close_and_remove(&msg_id);
                return Err(err);
            }
            with_output.then_some(stream)
        } else {
            None
        };

        debug!(msg_id = %msg_id, msg_type = R::MSG_TYPE, "sending request");
        match self.roundtrip::<R>(frames, &msg_id) {
            Ok(reply) => Ok((reply, output)),
            Err(err) => {
                if routed {
                    self.router.close_and_remove(&msg_id);
                }
                Err(err)
            }
        }
    }

    fn roundtrip<R: Request>(&self, frames: Vec<Bytes>, msg_id: &str) -> Result<R::Reply> {
        let frames = {
            let mut shell = self.shell.lock().unwrap_or_else(PoisonError::into_inner);
            shell.send(frames)?;
            shell.recv()?
        };

        let raw = RawMessage::decode(&frames, &self.key)?;
        if raw.parent_id() != Some(msg_id) {
            return Err(ClientError::UnexpectedReply {
                expected: msg_id.to_string(),
                found: raw.parent_id().map(str::to_string),
            });
        }
        if raw.msg_type() != R::REPLY_TYPE {
            warn!(msg_id, expected = R::REPLY_TYPE, got = raw.msg_type(), "unexpected reply type");
        }
        debug!(msg_id, msg_type = raw.msg_type(), "reply received");
        Ok(raw.into_typed::<R::Reply>()?.content)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.state.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed);
        }
        match self.state.termination() {
            Some(err) => Err(ClientError::Terminated(err)),
            None => Ok(()),
        }
    }

    fn join_drain(&self, handle: JoinHandle<()>) {
        let deadline = Instant::now() + self.shutdown_timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    "broadcast thread did not stop; detaching"
                );
                return;
            }
            thread::sleep(JOIN_POLL);
        }
        if handle.join().is_err() {
            warn!("broadcast thread panicked");
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            debug!(error = %err, "close on drop failed");
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("open_streams", &self.router.len())
            .field("closed", &self.state.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// The iopub drain loop, owned by its thread.
struct Drain {
    broadcast: Box<dyn BroadcastTransport>,
    demux: Demux,
    router: Arc<Router>,
    state: Arc<State>,
    poll_interval: Duration,
    error_sink: Option<Sender<DrainError>>,
}

impl Drain {
    fn run(mut self) {
        debug!("broadcast drain started");
        while !self.state.shutdown.load(Ordering::Acquire) {
            let frames = match self.broadcast.recv_timeout(self.poll_interval) {
                Ok(Some(frames)) => frames,
                Ok(None) => continue,
                Err(err) => {
                    self.terminate(DrainError::Transport(err.to_string()));
                    break;
                }
            };

            match self.demux.dispatch(&frames, &self.state.shutdown) {
                Disposition::Routed | Disposition::Closed | Disposition::Dropped => {}
                Disposition::Report(err) => {
                    warn!(error = %err, "broadcast message skipped");
                    self.report(err);
                }
                Disposition::Fatal(err) => {
                    self.terminate(err);
                    break;
                }
            }
        }

        if let Err(err) = self.broadcast.close() {
            debug!(error = %err, "broadcast close failed");
        }
        debug!("broadcast drain stopped");
    }

    fn terminate(&self, err: DrainError) {
        // Errors caused by our own shutdown are expected.
        if self.state.shutdown.load(Ordering::Acquire) {
            debug!(error = %err, "drain error during shutdown ignored");
            return;
        }
        error!(error = %err, "broadcast drain failed; client terminated");
        *self
            .state
            .terminated
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(err.clone());
        let open = self.router.close_all();
        if open > 0 {
            debug!(open_streams = open, "output streams ended");
        }
        self.report(err);
    }

    fn report(&self, err: DrainError) {
        if let Some(sink) = &self.error_sink {
            // The receiver may be gone; that only means nobody is listening.
            let _ = sink.send(err);
        }
    }
}
