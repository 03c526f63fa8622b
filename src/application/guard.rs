//! Ownership of the live session's device and encoder handles

use tracing::{debug, trace};

use super::ports::{AudioEncoder, EncoderState, MediaStream, MediaTrack};

/// Stop every live track of `stream`, returning how many were stopped.
/// Tracks that already ended are skipped.
pub fn stop_tracks<S: MediaStream>(stream: &mut S) -> usize {
    let mut stopped = 0;
    for track in stream.tracks_mut() {
        if track.is_live() {
            track.stop();
            stopped += 1;
        } else {
            trace!(kind = track.kind(), "Track already stopped");
        }
    }
    stopped
}

/// Holds the device stream and encoder of the live session.
///
/// [`release`](Self::release) tears the encoder down before the stream it
/// depends on and is idempotent. Dropping the guard releases as well.
pub struct ResourceGuard<S: MediaStream, E: AudioEncoder> {
    stream: Option<S>,
    encoder: Option<E>,
    releases: usize,
}

impl<S: MediaStream, E: AudioEncoder> ResourceGuard<S, E> {
    /// Create an empty guard
    pub fn new() -> Self {
        Self {
            stream: None,
            encoder: None,
            releases: 0,
        }
    }

    /// Take ownership of a stream, releasing anything held before
    pub fn hold_stream(&mut self, stream: S) {
        self.release();
        self.stream = Some(stream);
    }

    /// Take ownership of the encoder bound to the held stream
    pub fn hold_encoder(&mut self, encoder: E) {
        self.encoder = Some(encoder);
    }

    pub fn stream(&self) -> Option<&S> {
        self.stream.as_ref()
    }

    pub fn encoder_mut(&mut self) -> Option<&mut E> {
        self.encoder.as_mut()
    }

    pub fn is_holding(&self) -> bool {
        self.stream.is_some() || self.encoder.is_some()
    }

    /// Number of releases that actually freed something
    pub fn release_count(&self) -> usize {
        self.releases
    }

    /// Release the encoder, then every track of the stream.
    ///
    /// Returns whether anything was held.
    pub fn release(&mut self) -> bool {
        if !self.is_holding() {
            return false;
        }

        if let Some(mut encoder) = self.encoder.take() {
            if encoder.state() != EncoderState::Inactive {
                if let Err(e) = encoder.stop() {
                    debug!(error = %e, "Encoder stop failed during release");
                }
            }
        }

        let mut tracks = 0;
        if let Some(mut stream) = self.stream.take() {
            tracks = stop_tracks(&mut stream);
        }

        self.releases += 1;
        debug!(tracks, "Released capture device");
        true
    }
}

impl<S: MediaStream, E: AudioEncoder> Default for ResourceGuard<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MediaStream, E: AudioEncoder> Drop for ResourceGuard<S, E> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{CaptureBackend, EncoderEvent};
    use crate::domain::capture::{AudioFormat, CaptureOptions};
    use crate::domain::recording::Duration;
    use crate::infrastructure::device::{ScriptedBackend, ScriptedEncoder, ScriptedStream};
    use tokio::sync::mpsc;

    type Guard = ResourceGuard<ScriptedStream, ScriptedEncoder>;

    #[tokio::test]
    async fn release_stops_every_track() {
        let backend = ScriptedBackend::new().with_tracks(3);
        let device = backend.device();
        let stream = backend.request_stream(CaptureOptions::default()).await.unwrap();

        let mut guard = Guard::new();
        guard.hold_stream(stream);
        assert!(guard.release());

        assert_eq!(device.tracks_stopped(), 3);
        assert!(!guard.is_holding());
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let backend = ScriptedBackend::new().with_tracks(2);
        let device = backend.device();
        let stream = backend.request_stream(CaptureOptions::default()).await.unwrap();

        let mut guard = Guard::new();
        guard.hold_stream(stream);
        assert!(guard.release());
        for _ in 0..5 {
            assert!(!guard.release());
        }

        assert_eq!(device.tracks_stopped(), 2);
        assert_eq!(guard.release_count(), 1);
    }

    #[test]
    fn release_with_nothing_held_is_noop() {
        let mut guard = Guard::new();
        assert!(!guard.release());
        assert_eq!(guard.release_count(), 0);
    }

    #[tokio::test]
    async fn release_tolerates_stopped_tracks() {
        let backend = ScriptedBackend::new().with_tracks(2);
        let device = backend.device();
        let mut stream = backend.request_stream(CaptureOptions::default()).await.unwrap();
        stream.tracks_mut()[0].stop();

        let mut guard = Guard::new();
        guard.hold_stream(stream);
        guard.release();

        assert_eq!(device.tracks_stopped(), 2);
    }

    #[tokio::test]
    async fn release_stops_running_encoder_first() {
        let backend = ScriptedBackend::new();
        let device = backend.device();
        let stream = backend.request_stream(CaptureOptions::default()).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut encoder = backend
            .create_encoder(&stream, AudioFormat::Webm, tx)
            .unwrap();
        encoder.start(Duration::from_millis(100)).unwrap();

        let mut guard = Guard::new();
        guard.hold_stream(stream);
        guard.hold_encoder(encoder);
        guard.release();

        assert_eq!(device.encoder_stops(), 1);
        assert_eq!(device.tracks_stopped(), 1);
        assert_eq!(rx.recv().await, Some(EncoderEvent::Stopped));
    }

    #[tokio::test]
    async fn drop_releases() {
        let backend = ScriptedBackend::new();
        let device = backend.device();
        let stream = backend.request_stream(CaptureOptions::default()).await.unwrap();
        {
            let mut guard = Guard::new();
            guard.hold_stream(stream);
        }
        assert_eq!(device.tracks_stopped(), 1);
    }

    #[tokio::test]
    async fn stop_tracks_counts_only_live_tracks() {
        let backend = ScriptedBackend::new().with_tracks(2);
        let mut stream = backend.request_stream(CaptureOptions::default()).await.unwrap();
        assert_eq!(stop_tracks(&mut stream), 2);
        assert_eq!(stop_tracks(&mut stream), 0);
    }
}
