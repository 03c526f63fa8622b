//! Microphone capture using cpal
//!
//! The cpal stream is not `Send`, so it lives on a dedicated thread for as
//! long as its track is live. Samples are mixed down to mono i16 and only
//! collected while an encoder is recording. The encoder emits streaming WAV:
//! the first fragment carries a header with open-ended sizes, every later
//! fragment is raw little-endian PCM.

use std::io::Cursor;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, SampleFormat, StreamConfig};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::ports::{
    AudioEncoder, CaptureBackend, DeviceError, DeviceErrorKind, EncoderEvent, EncoderEventSender,
    EncoderState, MediaStream, MediaTrack, check_timeslice,
};
use crate::domain::capture::{AudioFormat, CaptureOptions};
use crate::domain::recording::Duration;

/// Bits per sample of the emitted PCM
const BITS_PER_SAMPLE: u16 = 16;

/// Samples shared between the capture thread and the encoder
#[derive(Debug, Default)]
struct Tap {
    samples: Vec<i16>,
    /// Collect incoming samples
    recording: bool,
    /// Whether the encoder still emits fragments
    encoding: bool,
    header_sent: bool,
    events: Option<EncoderEventSender>,
}

/// Audio capture backend over the platform's default input device
#[derive(Debug, Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }

    fn input_device() -> Result<cpal::Device, DeviceError> {
        cpal::default_host()
            .default_input_device()
            .ok_or_else(|| DeviceError::new(DeviceErrorKind::NotFound, "no default input device"))
    }

    fn input_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), DeviceError> {
        let supported = device
            .default_input_config()
            .map_err(|e| DeviceError::new(DeviceErrorKind::Overconstrained, e.to_string()))?;
        let sample_format = supported.sample_format();
        Ok((supported.config(), sample_format))
    }

    /// Mix interleaved frames down to mono
    fn mix_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
        if channels <= 1 {
            return samples.to_vec();
        }

        samples
            .chunks(channels as usize)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / frame.len() as i32) as i16
            })
            .collect()
    }

    fn f32_to_i16(sample: f32) -> i16 {
        (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
    }

    fn build_error(err: BuildStreamError) -> DeviceError {
        let kind = match err {
            BuildStreamError::DeviceNotAvailable => DeviceErrorKind::NotFound,
            BuildStreamError::StreamConfigNotSupported | BuildStreamError::InvalidArgument => {
                DeviceErrorKind::Overconstrained
            }
            BuildStreamError::BackendSpecific { .. } => DeviceErrorKind::NotReadable,
            _ => DeviceErrorKind::Other,
        };
        DeviceError::new(kind, err.to_string())
    }

    /// Open the device and keep its stream playing until `stop` fires.
    ///
    /// Runs on the capture thread; `ready` receives the sample rate once the
    /// stream plays.
    fn capture(
        tap: Arc<Mutex<Tap>>,
        ready: oneshot::Sender<Result<u32, DeviceError>>,
        stop: std_mpsc::Receiver<()>,
    ) {
        let opened = Self::input_device().and_then(|device| {
            let (config, sample_format) = Self::input_config(&device)?;
            let stream = Self::build_stream(&device, &config, sample_format, Arc::clone(&tap))?;
            stream
                .play()
                .map_err(|e| DeviceError::new(DeviceErrorKind::NotReadable, e.to_string()))?;
            Ok((stream, config.sample_rate.0))
        });

        let (stream, sample_rate) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        if ready.send(Ok(sample_rate)).is_err() {
            debug!("Stream request abandoned, closing device");
            return;
        }

        // Either an explicit stop or the track being dropped ends capture
        let _ = stop.recv();
        drop(stream);
        debug!("Capture thread finished");
    }

    fn build_stream(
        device: &cpal::Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        tap: Arc<Mutex<Tap>>,
    ) -> Result<cpal::Stream, DeviceError> {
        let channels = config.channels;
        let error_tap = Arc::clone(&tap);
        let on_error = move |err: cpal::StreamError| {
            warn!(error = %err, "Audio stream error");
            if let Some(events) = error_tap.lock().events.as_ref() {
                let _ = events.send(EncoderEvent::Error(DeviceError::new(
                    DeviceErrorKind::NotReadable,
                    err.to_string(),
                )));
            }
        };

        match sample_format {
            SampleFormat::I16 => device
                .build_input_stream(
                    config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let mut tap = tap.lock();
                        if tap.recording {
                            let mono = Self::mix_to_mono(data, channels);
                            tap.samples.extend_from_slice(&mono);
                        }
                    },
                    on_error,
                    None,
                )
                .map_err(Self::build_error),

            SampleFormat::F32 => device
                .build_input_stream(
                    config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let mut tap = tap.lock();
                        if tap.recording {
                            let pcm: Vec<i16> = data.iter().map(|&s| Self::f32_to_i16(s)).collect();
                            let mono = Self::mix_to_mono(&pcm, channels);
                            tap.samples.extend_from_slice(&mono);
                        }
                    },
                    on_error,
                    None,
                )
                .map_err(Self::build_error),

            other => Err(DeviceError::new(
                DeviceErrorKind::NotSupported,
                format!("unsupported sample format {other}"),
            )),
        }
    }
}

#[async_trait]
impl CaptureBackend for CpalBackend {
    type Stream = CpalStream;
    type Encoder = WavEncoder;

    fn supports_capture(&self) -> bool {
        cpal::default_host().input_devices().is_ok()
    }

    fn supports_encoding(&self) -> bool {
        true
    }

    fn is_format_supported(&self, format: AudioFormat) -> bool {
        format == AudioFormat::Wav
    }

    async fn request_stream(&self, options: CaptureOptions) -> Result<CpalStream, DeviceError> {
        // cpal exposes no input processing controls
        debug!(?options, "Capture processing options are advisory");

        let tap = Arc::new(Mutex::new(Tap::default()));
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();

        let thread_tap = Arc::clone(&tap);
        thread::Builder::new()
            .name("voicecap-capture".into())
            .spawn(move || Self::capture(thread_tap, ready_tx, stop_rx))
            .map_err(|e| DeviceError::new(DeviceErrorKind::Other, e.to_string()))?;

        let sample_rate = ready_rx.await.map_err(|_| {
            DeviceError::new(DeviceErrorKind::Aborted, "capture thread exited")
        })??;

        info!(sample_rate, "Opened default input device");
        Ok(CpalStream {
            tracks: vec![CpalTrack {
                stop: Some(stop_tx),
            }],
            tap,
            sample_rate,
        })
    }

    fn create_encoder(
        &self,
        stream: &CpalStream,
        format: AudioFormat,
        events: EncoderEventSender,
    ) -> Result<WavEncoder, DeviceError> {
        if !matches!(format, AudioFormat::Wav | AudioFormat::Unspecified) {
            return Err(DeviceError::new(
                DeviceErrorKind::UnsupportedFormat,
                format!("cannot encode {format}"),
            ));
        }

        stream.tap.lock().events = Some(events.clone());
        Ok(WavEncoder {
            tap: Arc::clone(&stream.tap),
            sample_rate: stream.sample_rate,
            state: EncoderState::Inactive,
            events,
            ticker: None,
        })
    }
}

/// The single audio track of a cpal stream
#[derive(Debug)]
pub struct CpalTrack {
    stop: Option<std_mpsc::Sender<()>>,
}

impl MediaTrack for CpalTrack {
    fn kind(&self) -> &str {
        "audio"
    }

    fn is_live(&self) -> bool {
        self.stop.is_some()
    }

    fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

#[derive(Debug)]
pub struct CpalStream {
    tracks: Vec<CpalTrack>,
    tap: Arc<Mutex<Tap>>,
    sample_rate: u32,
}

impl CpalStream {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl MediaStream for CpalStream {
    type Track = CpalTrack;

    fn tracks_mut(&mut self) -> &mut [CpalTrack] {
        &mut self.tracks
    }
}

/// Streaming WAV header for mono 16-bit PCM with unknown length
fn streaming_wav_header(sample_rate: u32) -> Result<Vec<u8>, DeviceError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    hound::WavWriter::new(&mut cursor, spec)
        .and_then(|writer| writer.finalize())
        .map_err(|e| DeviceError::new(DeviceErrorKind::Other, e.to_string()))?;

    let mut header = cursor.into_inner();
    let len = header.len();
    if len < 8 {
        return Err(DeviceError::new(DeviceErrorKind::Other, "truncated WAV header"));
    }
    // RIFF and data chunk sizes are unknown while streaming
    header[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
    header[len - 4..].copy_from_slice(&u32::MAX.to_le_bytes());
    Ok(header)
}

/// Drain collected samples into one fragment, prefixed by the header on the
/// first call. Must be called with the tap locked.
fn take_fragment(tap: &mut Tap, sample_rate: u32) -> Result<Vec<u8>, DeviceError> {
    let mut fragment = if tap.header_sent {
        Vec::with_capacity(tap.samples.len() * 2)
    } else {
        tap.header_sent = true;
        streaming_wav_header(sample_rate)?
    };
    for sample in tap.samples.drain(..) {
        fragment.extend_from_slice(&sample.to_le_bytes());
    }
    Ok(fragment)
}

/// Encoder producing streaming WAV fragments every timeslice
#[derive(Debug)]
pub struct WavEncoder {
    tap: Arc<Mutex<Tap>>,
    sample_rate: u32,
    state: EncoderState,
    events: EncoderEventSender,
    ticker: Option<JoinHandle<()>>,
}

impl WavEncoder {
    /// Stop collecting samples without ending the session
    pub fn pause(&mut self) {
        if self.state == EncoderState::Recording {
            self.tap.lock().recording = false;
            self.state = EncoderState::Paused;
        }
    }

    fn emit(tap: &mut Tap, sample_rate: u32, events: &EncoderEventSender) -> bool {
        let event = match take_fragment(tap, sample_rate) {
            Ok(fragment) => EncoderEvent::DataAvailable(fragment),
            Err(e) => EncoderEvent::Error(e),
        };
        events.send(event).is_ok()
    }
}

impl AudioEncoder for WavEncoder {
    fn state(&self) -> EncoderState {
        self.state
    }

    fn start(&mut self, timeslice: Duration) -> Result<(), DeviceError> {
        if self.state != EncoderState::Inactive {
            return Err(DeviceError::new(DeviceErrorKind::Other, "encoder already started"));
        }
        check_timeslice(timeslice)?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DeviceError::new(DeviceErrorKind::Other, e.to_string()))?;

        {
            let mut tap = self.tap.lock();
            tap.samples.clear();
            tap.header_sent = false;
            tap.recording = true;
            tap.encoding = true;
        }

        let tap = Arc::clone(&self.tap);
        let events = self.events.clone();
        let sample_rate = self.sample_rate;
        let period = timeslice.as_std();
        self.ticker = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let mut guard = tap.lock();
                if !guard.encoding || !Self::emit(&mut guard, sample_rate, &events) {
                    break;
                }
            }
        }));

        self.state = EncoderState::Recording;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), DeviceError> {
        if self.state == EncoderState::Paused {
            self.tap.lock().recording = true;
            self.state = EncoderState::Recording;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        if self.state == EncoderState::Inactive {
            return Ok(());
        }
        self.state = EncoderState::Inactive;

        {
            let mut tap = self.tap.lock();
            tap.recording = false;
            tap.encoding = false;
            // Flush the tail, then confirm
            Self::emit(&mut tap, self.sample_rate, &self.events);
            let _ = self.events.send(EncoderEvent::Stopped);
            tap.events = None;
        }

        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        Ok(())
    }
}

impl Drop for WavEncoder {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        let mut tap = self.tap.lock();
        tap.recording = false;
        tap.encoding = false;
        tap.events = None;
    }
}
