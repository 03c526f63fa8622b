//! Scripted capture backend
//!
//! A deterministic device used by the test suite and by `--simulate`. Every
//! behaviour (grant or refuse, when to grant, what the encoder emits) is
//! configured up front, and a [`ScriptedDevice`] handle observes and drives
//! the device from the outside.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::application::ports::{
    AudioEncoder, CaptureBackend, DeviceError, DeviceErrorKind, EncoderEvent, EncoderEventSender,
    EncoderState, MediaStream, MediaTrack, check_timeslice,
};
use crate::domain::capture::{AudioFormat, CaptureOptions, CANDIDATE_FORMATS};
use crate::domain::recording::Duration;

/// Byte pattern of synthetic fragments
const SYNTHETIC_FILL: u8 = 0xA5;

#[derive(Debug, Default)]
struct Stats {
    streams_granted: usize,
    tracks_stopped: usize,
    encoders_created: usize,
    encoder_stops: usize,
    encoder_resumes: usize,
    last_options: Option<CaptureOptions>,
    last_format: Option<AudioFormat>,
    last_timeslice: Option<Duration>,
}

#[derive(Debug, Default)]
struct Shared {
    stats: Mutex<Stats>,
    encoder_events: Mutex<Option<EncoderEventSender>>,
    gate: Notify,
}

/// Deterministic [`CaptureBackend`]
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    capture: bool,
    encoding: bool,
    supported: Vec<AudioFormat>,
    tracks: usize,
    grant_failure: Option<DeviceErrorKind>,
    gated: bool,
    encoder_failure: Option<DeviceErrorKind>,
    start_failure: Option<DeviceErrorKind>,
    fragment_len: Option<usize>,
    shared: Arc<Shared>,
}

impl ScriptedBackend {
    /// A device that supports every candidate format and grants immediately
    pub fn new() -> Self {
        Self {
            capture: true,
            encoding: true,
            supported: CANDIDATE_FORMATS.to_vec(),
            tracks: 1,
            grant_failure: None,
            gated: false,
            encoder_failure: None,
            start_failure: None,
            fragment_len: None,
            shared: Arc::new(Shared::default()),
        }
    }

    /// A device whose encoder emits a fragment of `fragment_len` bytes every
    /// timeslice, the way a real microphone would
    pub fn synthetic(fragment_len: usize) -> Self {
        Self {
            fragment_len: Some(fragment_len),
            ..Self::new()
        }
    }

    pub fn with_supported_formats(mut self, formats: &[AudioFormat]) -> Self {
        self.supported = formats.to_vec();
        self
    }

    pub fn with_tracks(mut self, tracks: usize) -> Self {
        self.tracks = tracks;
        self
    }

    /// The platform has no microphone acquisition at all
    pub fn without_capture(mut self) -> Self {
        self.capture = false;
        self
    }

    /// The platform has no encoding primitive at all
    pub fn without_encoder(mut self) -> Self {
        self.encoding = false;
        self
    }

    /// Refuse every stream request with `kind`
    pub fn failing_with(mut self, kind: DeviceErrorKind) -> Self {
        self.grant_failure = Some(kind);
        self
    }

    /// Hold every stream request until [`ScriptedDevice::grant`] is called
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    /// Fail encoder construction with `kind`
    pub fn with_encoder_failure(mut self, kind: DeviceErrorKind) -> Self {
        self.encoder_failure = Some(kind);
        self
    }

    /// Fail the encoder's start with `kind`
    pub fn with_start_failure(mut self, kind: DeviceErrorKind) -> Self {
        self.start_failure = Some(kind);
        self
    }

    /// Handle for observing and driving the device
    pub fn device(&self) -> ScriptedDevice {
        ScriptedDevice {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Build a granted stream without going through the request path
    pub fn grant_stream(&self) -> ScriptedStream {
        self.shared.stats.lock().streams_granted += 1;
        ScriptedStream {
            tracks: (0..self.tracks)
                .map(|_| ScriptedTrack {
                    live: true,
                    shared: Arc::clone(&self.shared),
                })
                .collect(),
        }
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureBackend for ScriptedBackend {
    type Stream = ScriptedStream;
    type Encoder = ScriptedEncoder;

    fn supports_capture(&self) -> bool {
        self.capture
    }

    fn supports_encoding(&self) -> bool {
        self.encoding
    }

    fn is_format_supported(&self, format: AudioFormat) -> bool {
        self.supported.contains(&format)
    }

    async fn request_stream(&self, options: CaptureOptions) -> Result<ScriptedStream, DeviceError> {
        self.shared.stats.lock().last_options = Some(options);

        if self.gated {
            self.shared.gate.notified().await;
        }

        if let Some(kind) = self.grant_failure {
            return Err(DeviceError::new(kind, "scripted refusal"));
        }

        debug!(tracks = self.tracks, "Scripted device granted");
        Ok(self.grant_stream())
    }

    fn create_encoder(
        &self,
        _stream: &ScriptedStream,
        format: AudioFormat,
        events: EncoderEventSender,
    ) -> Result<ScriptedEncoder, DeviceError> {
        if let Some(kind) = self.encoder_failure {
            return Err(DeviceError::new(kind, "scripted encoder refused"));
        }

        {
            let mut stats = self.shared.stats.lock();
            stats.encoders_created += 1;
            stats.last_format = Some(format);
        }
        *self.shared.encoder_events.lock() = Some(events.clone());

        Ok(ScriptedEncoder {
            state: EncoderState::Inactive,
            events,
            start_failure: self.start_failure,
            fragment_len: self.fragment_len,
            ticker: None,
            shared: Arc::clone(&self.shared),
        })
    }
}

/// Observer and remote control for a [`ScriptedBackend`]
#[derive(Debug, Clone)]
pub struct ScriptedDevice {
    shared: Arc<Shared>,
}

impl ScriptedDevice {
    /// Let one gated stream request through
    pub fn grant(&self) {
        self.shared.gate.notify_one();
    }

    /// Deliver a fragment as if the current encoder emitted it
    pub fn emit(&self, fragment: impl Into<Vec<u8>>) -> bool {
        self.send(EncoderEvent::DataAvailable(fragment.into()))
    }

    /// Raise a runtime device error on the current encoder
    pub fn fail(&self, message: &str) -> bool {
        self.send(EncoderEvent::Error(DeviceError::new(
            DeviceErrorKind::NotReadable,
            message,
        )))
    }

    fn send(&self, event: EncoderEvent) -> bool {
        self.shared
            .encoder_events
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    pub fn streams_granted(&self) -> usize {
        self.shared.stats.lock().streams_granted
    }

    pub fn tracks_stopped(&self) -> usize {
        self.shared.stats.lock().tracks_stopped
    }

    pub fn encoders_created(&self) -> usize {
        self.shared.stats.lock().encoders_created
    }

    pub fn encoder_stops(&self) -> usize {
        self.shared.stats.lock().encoder_stops
    }

    pub fn encoder_resumes(&self) -> usize {
        self.shared.stats.lock().encoder_resumes
    }

    pub fn last_options(&self) -> Option<CaptureOptions> {
        self.shared.stats.lock().last_options
    }

    pub fn last_format(&self) -> Option<AudioFormat> {
        self.shared.stats.lock().last_format
    }

    pub fn last_timeslice(&self) -> Option<Duration> {
        self.shared.stats.lock().last_timeslice
    }
}

/// One scripted track; stopping it is counted on the device
#[derive(Debug)]
pub struct ScriptedTrack {
    live: bool,
    shared: Arc<Shared>,
}

impl MediaTrack for ScriptedTrack {
    fn kind(&self) -> &str {
        "audio"
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.shared.stats.lock().tracks_stopped += 1;
        }
    }
}

#[derive(Debug)]
pub struct ScriptedStream {
    tracks: Vec<ScriptedTrack>,
}

impl MediaStream for ScriptedStream {
    type Track = ScriptedTrack;

    fn tracks_mut(&mut self) -> &mut [ScriptedTrack] {
        &mut self.tracks
    }
}

#[derive(Debug)]
pub struct ScriptedEncoder {
    state: EncoderState,
    events: EncoderEventSender,
    start_failure: Option<DeviceErrorKind>,
    fragment_len: Option<usize>,
    ticker: Option<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl ScriptedEncoder {
    /// Pause a recording encoder
    pub fn pause(&mut self) {
        if self.state == EncoderState::Recording {
            self.state = EncoderState::Paused;
        }
    }

    fn spawn_ticker(&mut self, fragment_len: usize, timeslice: Duration) -> Result<(), DeviceError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DeviceError::new(DeviceErrorKind::Other, e.to_string()))?;
        let events = self.events.clone();
        let period = timeslice.as_std();

        self.ticker = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if events
                    .send(EncoderEvent::DataAvailable(vec![SYNTHETIC_FILL; fragment_len]))
                    .is_err()
                {
                    break;
                }
            }
        }));
        Ok(())
    }
}

impl AudioEncoder for ScriptedEncoder {
    fn state(&self) -> EncoderState {
        self.state
    }

    fn start(&mut self, timeslice: Duration) -> Result<(), DeviceError> {
        if let Some(kind) = self.start_failure {
            return Err(DeviceError::new(kind, "scripted start failure"));
        }
        if self.state != EncoderState::Inactive {
            return Err(DeviceError::new(
                DeviceErrorKind::Other,
                "encoder already started",
            ));
        }
        check_timeslice(timeslice)?;

        self.shared.stats.lock().last_timeslice = Some(timeslice);
        if let Some(fragment_len) = self.fragment_len {
            self.spawn_ticker(fragment_len, timeslice)?;
        }
        self.state = EncoderState::Recording;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), DeviceError> {
        if self.state == EncoderState::Paused {
            self.state = EncoderState::Recording;
            self.shared.stats.lock().encoder_resumes += 1;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        if self.state == EncoderState::Inactive {
            return Ok(());
        }

        self.state = EncoderState::Inactive;
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.shared.stats.lock().encoder_stops += 1;
        // The controller may already be gone
        let _ = self.events.send(EncoderEvent::Stopped);
        Ok(())
    }
}

impl Drop for ScriptedEncoder {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn refusal_grants_nothing() {
        let backend = ScriptedBackend::new().failing_with(DeviceErrorKind::NotAllowed);
        let device = backend.device();

        let err = backend
            .request_stream(CaptureOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, DeviceErrorKind::NotAllowed);
        assert_eq!(device.streams_granted(), 0);
        assert_eq!(device.last_options(), Some(CaptureOptions::default()));
    }

    #[tokio::test]
    async fn gate_holds_request_until_granted() {
        let backend = ScriptedBackend::new().gated();
        let device = backend.device();

        let pending = tokio::spawn({
            let backend = backend.clone();
            async move { backend.request_stream(CaptureOptions::default()).await }
        });
        tokio::task::yield_now().await;
        assert_eq!(device.streams_granted(), 0);

        device.grant();
        let stream = pending.await.unwrap().unwrap();
        assert_eq!(stream.tracks.len(), 1);
        assert_eq!(device.streams_granted(), 1);
    }

    #[tokio::test]
    async fn synthetic_encoder_emits_every_timeslice() {
        let backend = ScriptedBackend::synthetic(8);
        let stream = backend.grant_stream();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut encoder = backend
            .create_encoder(&stream, AudioFormat::Webm, tx)
            .unwrap();

        encoder.start(Duration::from_millis(50)).unwrap();
        assert_eq!(
            rx.recv().await,
            Some(EncoderEvent::DataAvailable(vec![SYNTHETIC_FILL; 8]))
        );

        encoder.stop().unwrap();
        // Drain anything queued before the stop
        while let Some(event) = rx.recv().await {
            if event == EncoderEvent::Stopped {
                break;
            }
        }
        assert_eq!(encoder.state(), EncoderState::Inactive);
    }

    #[tokio::test]
    async fn start_failure_leaves_encoder_inactive() {
        let backend = ScriptedBackend::new().with_start_failure(DeviceErrorKind::NotReadable);
        let stream = backend.grant_stream();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut encoder = backend.create_encoder(&stream, AudioFormat::Wav, tx).unwrap();

        assert!(encoder.start(Duration::from_millis(100)).is_err());
        assert_eq!(encoder.state(), EncoderState::Inactive);
    }

    #[tokio::test]
    async fn zero_timeslice_fails_to_start() {
        let backend = ScriptedBackend::synthetic(4);
        let device = backend.device();
        let stream = backend.grant_stream();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut encoder = backend.create_encoder(&stream, AudioFormat::Wav, tx).unwrap();

        let err = encoder.start(Duration::from_millis(0)).unwrap_err();
        assert_eq!(err.kind, DeviceErrorKind::Other);
        assert_eq!(encoder.state(), EncoderState::Inactive);
        assert_eq!(device.last_timeslice(), None);
        assert!(encoder.ticker.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stop_on_inactive_encoder_sends_nothing() {
        let backend = ScriptedBackend::new();
        let device = backend.device();
        let stream = backend.grant_stream();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut encoder = backend.create_encoder(&stream, AudioFormat::Wav, tx).unwrap();

        encoder.stop().unwrap();
        assert_eq!(device.encoder_stops(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn emit_reaches_current_encoder_channel() {
        let backend = ScriptedBackend::new();
        let device = backend.device();
        assert!(!device.emit(vec![1]));

        let stream = backend.grant_stream();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _encoder = backend.create_encoder(&stream, AudioFormat::Wav, tx).unwrap();

        assert!(device.emit(vec![1, 2]));
        assert_eq!(rx.recv().await, Some(EncoderEvent::DataAvailable(vec![1, 2])));
    }
}
