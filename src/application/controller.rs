//! Capture session controller use case
//!
//! Runs the session state machine on a single task. Caller requests, the
//! in-flight device acquisition and encoder events are all funnelled into
//! that task, so transitions never run concurrently. Acquisition is the
//! only suspension point; everything else reacts to a delivered event.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::domain::capture::{Artifact, AudioFormat, ChunkBuffer, SessionConfig};
use crate::domain::error::CaptureError;
use crate::domain::session::{Effect, SessionEvent, SessionMachine, SessionState};

use super::capability::negotiate;
use super::guard::{stop_tracks, ResourceGuard};
use super::ports::{
    AudioEncoder, CaptureBackend, DeviceError, EncoderEvent, EncoderState,
};

/// Completion callback, receives ownership of the artifact
pub type CompleteCallback = Box<dyn FnMut(Artifact) + Send>;

/// Error callback
pub type ErrorCallback = Box<dyn FnMut(CaptureError) + Send>;

/// Terminal outcome callbacks. At most one fires per session.
#[derive(Default)]
pub struct CaptureCallbacks {
    pub on_complete: Option<CompleteCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl CaptureCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_complete(mut self, callback: impl FnMut(Artifact) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl FnMut(CaptureError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }
}

/// Requests sent from the handle to the controller task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Stop,
}

type Acquisition<S> = JoinHandle<Result<S, DeviceError>>;

/// Owns the live session: state machine, fragment buffer and device handles.
pub struct SessionController<B: CaptureBackend> {
    backend: Arc<B>,
    config: SessionConfig,
    callbacks: CaptureCallbacks,
    machine: SessionMachine,
    buffer: ChunkBuffer,
    guard: ResourceGuard<B::Stream, B::Encoder>,
    format: AudioFormat,
    session_id: u64,
    acquisition: Option<Acquisition<B::Stream>>,
    granted: Option<B::Stream>,
    events: Option<mpsc::UnboundedReceiver<EncoderEvent>>,
    state_tx: watch::Sender<SessionState>,
}

impl<B: CaptureBackend> SessionController<B> {
    /// Create a controller in idle state
    pub fn new(backend: B, config: SessionConfig, callbacks: CaptureCallbacks) -> Self {
        Self::with_shared_backend(Arc::new(backend), config, callbacks)
    }

    pub fn with_shared_backend(
        backend: Arc<B>,
        config: SessionConfig,
        callbacks: CaptureCallbacks,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            backend,
            config,
            callbacks,
            machine: SessionMachine::new(),
            buffer: ChunkBuffer::new(),
            guard: ResourceGuard::new(),
            format: AudioFormat::Unspecified,
            session_id: 0,
            acquisition: None,
            granted: None,
            events: None,
            state_tx,
        }
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    /// Format negotiated for the current (or last) session
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Move the controller onto its own task and return the caller's handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> SessionHandle {
        let (commands, rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = oneshot::channel();
        let state = self.state_tx.subscribe();
        let task = tokio::spawn(self.run(rx, shutdown_rx));
        SessionHandle {
            commands,
            shutdown: Some(shutdown),
            state,
            desired: false,
            task: Some(task),
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        loop {
            // Teardown (or a dropped handle) wins over everything, even an
            // encoder flooding its channel. Encoder events then drain before
            // caller commands so a stop never overtakes delivered fragments.
            let input = tokio::select! {
                biased;
                _ = &mut shutdown => Input::Shutdown,
                event = next_encoder_event(&mut self.events) => Input::Encoder(event),
                command = commands.recv() => Input::Command(command),
                result = next_acquisition(&mut self.acquisition) => Input::Acquired(result),
            };

            match input {
                Input::Encoder(Some(event)) => self.on_encoder_event(event),
                Input::Encoder(None) => self.on_encoder_gone(),
                Input::Acquired(result) => self.on_acquired(result),
                Input::Command(Some(Command::Start)) => self.dispatch(SessionEvent::StartRequested),
                Input::Command(Some(Command::Stop)) => self.dispatch(SessionEvent::StopRequested),
                Input::Shutdown | Input::Command(None) => {
                    self.dispatch(SessionEvent::Teardown);
                    break;
                }
            }
        }
        debug!("Session controller stopped");
    }

    fn on_encoder_event(&mut self, event: EncoderEvent) {
        let event = match event {
            EncoderEvent::DataAvailable(fragment) => SessionEvent::DataAvailable(fragment),
            EncoderEvent::Stopped => SessionEvent::EncoderStopped,
            EncoderEvent::Error(e) => {
                SessionEvent::DeviceError(CaptureError::device_failure(&e.message))
            }
        };
        self.dispatch(event);
    }

    /// The encoder dropped its event channel without confirming a stop
    fn on_encoder_gone(&mut self) {
        self.events = None;
        if matches!(
            self.machine.state(),
            SessionState::Recording | SessionState::Finalizing
        ) {
            self.dispatch(SessionEvent::DeviceError(CaptureError::device_failure(
                "encoder closed unexpectedly",
            )));
        }
    }

    fn on_acquired(&mut self, result: Result<Result<B::Stream, DeviceError>, JoinError>) {
        match result {
            Ok(Ok(stream)) => {
                info!(session = self.session_id, "Microphone access granted");
                self.granted = Some(stream);
                self.dispatch(SessionEvent::DeviceGranted);
                // Never leave a granted stream orphaned
                if let Some(mut stream) = self.granted.take() {
                    stop_tracks(&mut stream);
                }
            }
            Ok(Err(e)) => {
                self.dispatch(SessionEvent::AcquisitionFailed(e.into()));
            }
            Err(e) => {
                self.dispatch(SessionEvent::AcquisitionFailed(CaptureError::unknown(
                    &e.to_string(),
                )));
            }
        }
    }

    /// Feed an event, and every follow-up event its effects produce, to the
    /// state machine.
    pub fn dispatch(&mut self, event: SessionEvent) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let from = self.machine.state();
            let name = event.name();
            let transition = self.machine.handle(event);

            if transition.ignored {
                debug!(session = self.session_id, state = %from, event = name, "Ignoring event");
                continue;
            }

            self.machine = transition.next;
            if from != self.machine.state() {
                debug!(
                    session = self.session_id,
                    from = %from,
                    to = %self.machine.state(),
                    event = name,
                    "Session transition"
                );
            }

            for effect in transition.effects {
                self.apply(effect, &mut queue);
            }
            self.state_tx.send_replace(self.machine.state());
        }
    }

    fn apply(&mut self, effect: Effect, queue: &mut VecDeque<SessionEvent>) {
        match effect {
            Effect::AcquireDevice => self.acquire(queue),
            Effect::AbandonAcquisition => self.abandon_acquisition(),
            Effect::StartEncoder => self.start_encoder(queue),
            Effect::DiscardStream => {
                if let Some(mut stream) = self.granted.take() {
                    let tracks = stop_tracks(&mut stream);
                    info!(session = self.session_id, tracks, "Stop requested during acquisition, released device");
                }
            }
            Effect::AppendFragment(fragment) => {
                let size = fragment.len();
                if self.buffer.append(fragment) {
                    trace!(session = self.session_id, bytes = size, "Buffered fragment");
                } else {
                    trace!(session = self.session_id, "Dropped empty fragment");
                }
            }
            Effect::StopEncoder => self.stop_encoder(queue),
            Effect::Release => {
                self.guard.release();
                self.events = None;
            }
            Effect::Complete => {
                let artifact = self.buffer.assemble(self.format);
                info!(
                    session = self.session_id,
                    bytes = artifact.size_bytes(),
                    fragments = self.buffer.len(),
                    format = %self.format,
                    "Recording complete"
                );
                if let Some(callback) = self.callbacks.on_complete.as_mut() {
                    callback(artifact);
                }
            }
            Effect::Report(err) => {
                warn!(session = self.session_id, kind = %err.kind, error = %err, "Recording failed");
                if let Some(callback) = self.callbacks.on_error.as_mut() {
                    callback(err);
                }
                queue.push_back(SessionEvent::ErrorReported);
            }
            Effect::ClearBuffer => self.buffer.clear(),
        }
    }

    fn acquire(&mut self, queue: &mut VecDeque<SessionEvent>) {
        self.session_id += 1;

        let format = match negotiate(self.backend.as_ref()) {
            Ok(format) => format,
            Err(e) => {
                queue.push_back(SessionEvent::AcquisitionFailed(e));
                return;
            }
        };
        self.format = format;

        info!(session = self.session_id, %format, "Requesting microphone");
        let backend = Arc::clone(&self.backend);
        let options = self.config.capture;
        self.acquisition = Some(tokio::spawn(async move {
            backend.request_stream(options).await
        }));
    }

    /// Let an in-flight acquisition finish on its own and release whatever
    /// stream it eventually yields.
    fn abandon_acquisition(&mut self) {
        let Some(acquisition) = self.acquisition.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            acquisition.abort();
            return;
        };
        let session = self.session_id;
        runtime.spawn(async move {
            if let Ok(Ok(mut stream)) = acquisition.await {
                let tracks = stop_tracks(&mut stream);
                debug!(session, tracks, "Released device granted after teardown");
            }
        });
    }

    fn start_encoder(&mut self, queue: &mut VecDeque<SessionEvent>) {
        let Some(stream) = self.granted.take() else {
            queue.push_back(SessionEvent::EncoderFailed(CaptureError::unknown(
                "no stream to record from",
            )));
            return;
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let encoder = self.backend.create_encoder(&stream, self.format, tx);
        self.guard.hold_stream(stream);

        let mut encoder = match encoder {
            Ok(encoder) => encoder,
            Err(e) => {
                queue.push_back(SessionEvent::EncoderFailed(e.into()));
                return;
            }
        };

        if let Err(e) = encoder.start(self.config.timeslice) {
            self.guard.hold_encoder(encoder);
            queue.push_back(SessionEvent::EncoderFailed(e.into()));
            return;
        }

        self.guard.hold_encoder(encoder);
        self.events = Some(rx);
        info!(
            session = self.session_id,
            timeslice_ms = self.config.timeslice.as_millis(),
            "Recording started"
        );
    }

    fn stop_encoder(&mut self, queue: &mut VecDeque<SessionEvent>) {
        let Some(encoder) = self.guard.encoder_mut() else {
            queue.push_back(SessionEvent::EncoderStopped);
            return;
        };

        let result = match encoder.state() {
            EncoderState::Recording => encoder.stop(),
            EncoderState::Paused => encoder.resume().and_then(|_| encoder.stop()),
            // Nothing will confirm a stop that never happens
            EncoderState::Inactive => {
                queue.push_back(SessionEvent::EncoderStopped);
                Ok(())
            }
        };

        if let Err(e) = result {
            queue.push_back(SessionEvent::DeviceError(CaptureError::device_failure(
                &e.message,
            )));
        }
    }
}

impl<B: CaptureBackend> Drop for SessionController<B> {
    fn drop(&mut self) {
        self.abandon_acquisition();
        if let Some(mut stream) = self.granted.take() {
            stop_tracks(&mut stream);
        }
    }
}

enum Input<S> {
    Shutdown,
    Encoder(Option<EncoderEvent>),
    Command(Option<Command>),
    Acquired(Result<Result<S, DeviceError>, JoinError>),
}

async fn next_encoder_event(
    events: &mut Option<mpsc::UnboundedReceiver<EncoderEvent>>,
) -> Option<EncoderEvent> {
    match events.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_acquisition<S>(
    slot: &mut Option<Acquisition<S>>,
) -> Result<Result<S, DeviceError>, JoinError> {
    match slot.as_mut() {
        Some(handle) => {
            let result = handle.await;
            *slot = None;
            result
        }
        None => std::future::pending().await,
    }
}

/// Caller side of a spawned [`SessionController`].
///
/// Dropping the handle tears the session down.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    shutdown: Option<oneshot::Sender<()>>,
    state: watch::Receiver<SessionState>,
    desired: bool,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Apply the caller's "recording desired" signal. Only a change of the
    /// signal issues a start or stop request.
    ///
    /// A session that ended on its own (completion after a device-side stop,
    /// or an error) leaves the controller Idle; the signal then counts as
    /// false again, so `set_desired(true)` starts a fresh session.
    pub fn set_desired(&mut self, desired: bool) {
        let current = if desired {
            self.desired && self.state() != SessionState::Idle
        } else {
            self.desired
        };
        self.desired = desired;
        if desired == current {
            return;
        }
        if desired {
            self.start();
        } else {
            self.stop();
        }
    }

    /// Last value passed to [`set_desired`](Self::set_desired)
    pub fn desired(&self) -> bool {
        self.desired
    }

    /// Request a new session. Ignored while a session is live.
    pub fn start(&self) {
        self.send(Command::Start);
    }

    /// Request the live session to stop and deliver its artifact
    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver for state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until the controller reports `target`.
    ///
    /// Error is transient and may be skipped over; wait on Idle instead.
    /// Returns the state reached, or None if the controller has exited.
    pub async fn wait_for_state(&mut self, target: SessionState) -> Option<SessionState> {
        self.state
            .wait_for(|state| *state == target)
            .await
            .map(|state| *state)
            .ok()
    }

    /// Release everything and stop the controller. No callback fires for a
    /// session cut short this way.
    pub async fn teardown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Session controller task failed");
            }
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!(?command, "Session controller already stopped");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
