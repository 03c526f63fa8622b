//! Capture session state machine.
//!
//! A pure transition function: given the current machine and an event it
//! returns the next machine and the side effects the controller must run,
//! in order. No device is touched here, so every transition is testable on
//! its own.
//!
//! State machine:
//!   IDLE -> ACQUIRING (start requested)
//!   ACQUIRING -> RECORDING (device granted)
//!   ACQUIRING -> IDLE (device granted after a stop was requested)
//!   ACQUIRING -> ERROR (acquisition failed)
//!   RECORDING -> FINALIZING (stop requested)
//!   RECORDING | FINALIZING -> IDLE (encoder stopped)
//!   RECORDING | FINALIZING -> ERROR (device or encoder error)
//!   ERROR -> IDLE (error reported)
//!   any -> IDLE (teardown)

use crate::domain::error::CaptureError;

use super::SessionState;

/// Inputs to the state machine, from the caller or the device subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StartRequested,
    StopRequested,
    DeviceGranted,
    AcquisitionFailed(CaptureError),
    /// The encoder could not be constructed or started
    EncoderFailed(CaptureError),
    DataAvailable(Vec<u8>),
    DeviceError(CaptureError),
    EncoderStopped,
    ErrorReported,
    Teardown,
}

impl SessionEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StartRequested => "start-requested",
            Self::StopRequested => "stop-requested",
            Self::DeviceGranted => "device-granted",
            Self::AcquisitionFailed(_) => "acquisition-failed",
            Self::EncoderFailed(_) => "encoder-failed",
            Self::DataAvailable(_) => "data-available",
            Self::DeviceError(_) => "device-error",
            Self::EncoderStopped => "encoder-stopped",
            Self::ErrorReported => "error-reported",
            Self::Teardown => "teardown",
        }
    }
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Negotiate the format and request the device stream
    AcquireDevice,
    /// Hand an in-flight acquisition off so a late stream is still released
    AbandonAcquisition,
    /// Take ownership of the granted stream, build the encoder and start it
    StartEncoder,
    /// Release a granted stream without ever recording from it
    DiscardStream,
    AppendFragment(Vec<u8>),
    StopEncoder,
    /// Tear down the encoder, then stop every track of the stream
    Release,
    /// Assemble the artifact and hand it to the completion callback
    Complete,
    Report(CaptureError),
    ClearBuffer,
}

/// Current position in the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionMachine {
    state: SessionState,
    stop_pending: bool,
}

/// Result of feeding one event to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: SessionMachine,
    pub effects: Vec<Effect>,
    /// The event had no meaning in the current state
    pub ignored: bool,
}

impl Transition {
    fn to(state: SessionState, effects: Vec<Effect>) -> Self {
        Self {
            next: SessionMachine {
                state,
                stop_pending: false,
            },
            effects,
            ignored: false,
        }
    }

    fn ignore(current: SessionMachine) -> Self {
        Self {
            next: current,
            effects: Vec::new(),
            ignored: true,
        }
    }
}

impl SessionMachine {
    /// Create a machine in idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a stop arrived while the device was still being acquired
    pub fn stop_pending(&self) -> bool {
        self.stop_pending
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    /// Feed one event to the machine
    pub fn handle(self, event: SessionEvent) -> Transition {
        transition(self, event)
    }
}

/// The single transition function of the capture session
pub fn transition(current: SessionMachine, event: SessionEvent) -> Transition {
    use Effect::*;
    use SessionState as S;

    match (current.state, event) {
        (_, SessionEvent::Teardown) => match current.state {
            S::Acquiring => Transition::to(S::Idle, vec![AbandonAcquisition, Release, ClearBuffer]),
            _ => Transition::to(S::Idle, vec![Release, ClearBuffer]),
        },

        (S::Idle, SessionEvent::StartRequested) => {
            Transition::to(S::Acquiring, vec![ClearBuffer, AcquireDevice])
        }

        // The desired signal went back to true before acquisition resolved
        (S::Acquiring, SessionEvent::StartRequested) if current.stop_pending => {
            Transition::to(S::Acquiring, Vec::new())
        }
        (S::Acquiring, SessionEvent::StopRequested) => Transition {
            next: SessionMachine {
                state: S::Acquiring,
                stop_pending: true,
            },
            effects: Vec::new(),
            ignored: false,
        },
        (S::Acquiring, SessionEvent::DeviceGranted) if current.stop_pending => {
            Transition::to(S::Idle, vec![DiscardStream, ClearBuffer])
        }
        (S::Acquiring, SessionEvent::DeviceGranted) => {
            Transition::to(S::Recording, vec![StartEncoder])
        }
        (S::Acquiring, SessionEvent::AcquisitionFailed(err)) => {
            Transition::to(S::Error, vec![ClearBuffer, Report(err)])
        }

        (S::Recording | S::Finalizing, SessionEvent::DataAvailable(fragment)) => Transition {
            next: current,
            effects: vec![AppendFragment(fragment)],
            ignored: false,
        },
        (S::Recording, SessionEvent::StopRequested) => {
            Transition::to(S::Finalizing, vec![StopEncoder])
        }
        (S::Recording | S::Finalizing, SessionEvent::EncoderStopped) => {
            Transition::to(S::Idle, vec![Release, Complete, ClearBuffer])
        }
        (
            S::Recording | S::Finalizing,
            SessionEvent::DeviceError(err) | SessionEvent::EncoderFailed(err),
        ) => Transition::to(S::Error, vec![Release, ClearBuffer, Report(err)]),

        (S::Error, SessionEvent::ErrorReported) => Transition::to(S::Idle, Vec::new()),

        _ => Transition::ignore(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::CaptureErrorKind;

    fn run(events: Vec<SessionEvent>) -> (SessionMachine, Vec<Effect>) {
        let mut machine = SessionMachine::new();
        let mut effects = Vec::new();
        for event in events {
            let t = machine.handle(event);
            machine = t.next;
            effects = t.effects;
        }
        (machine, effects)
    }

    #[test]
    fn new_machine_is_idle() {
        let machine = SessionMachine::new();
        assert!(machine.is_idle());
        assert!(!machine.stop_pending());
    }

    #[test]
    fn start_from_idle_acquires_device() {
        let t = SessionMachine::new().handle(SessionEvent::StartRequested);
        assert_eq!(t.next.state(), SessionState::Acquiring);
        assert_eq!(t.effects, vec![Effect::ClearBuffer, Effect::AcquireDevice]);
    }

    #[test]
    fn grant_starts_encoder() {
        let (machine, effects) = run(vec![SessionEvent::StartRequested, SessionEvent::DeviceGranted]);
        assert_eq!(machine.state(), SessionState::Recording);
        assert_eq!(effects, vec![Effect::StartEncoder]);
    }

    #[test]
    fn start_while_recording_is_ignored() {
        let (machine, _) = run(vec![SessionEvent::StartRequested, SessionEvent::DeviceGranted]);
        let t = machine.handle(SessionEvent::StartRequested);
        assert!(t.ignored);
        assert!(t.effects.is_empty());
        assert_eq!(t.next.state(), SessionState::Recording);
    }

    #[test]
    fn stop_during_acquiring_is_remembered() {
        let (machine, effects) = run(vec![SessionEvent::StartRequested, SessionEvent::StopRequested]);
        assert_eq!(machine.state(), SessionState::Acquiring);
        assert!(machine.stop_pending());
        assert!(effects.is_empty());

        let t = machine.handle(SessionEvent::DeviceGranted);
        assert_eq!(t.next.state(), SessionState::Idle);
        assert_eq!(t.effects, vec![Effect::DiscardStream, Effect::ClearBuffer]);
    }

    #[test]
    fn start_after_pending_stop_rearms_session() {
        let (machine, _) = run(vec![
            SessionEvent::StartRequested,
            SessionEvent::StopRequested,
            SessionEvent::StartRequested,
        ]);
        assert!(!machine.stop_pending());

        let t = machine.handle(SessionEvent::DeviceGranted);
        assert_eq!(t.next.state(), SessionState::Recording);
    }

    #[test]
    fn start_while_acquiring_without_pending_stop_is_ignored() {
        let (machine, _) = run(vec![SessionEvent::StartRequested]);
        let t = machine.handle(SessionEvent::StartRequested);
        assert!(t.ignored);
    }

    #[test]
    fn acquisition_failure_reports_without_release() {
        let err = CaptureError::permission_denied();
        let (machine, effects) = run(vec![
            SessionEvent::StartRequested,
            SessionEvent::AcquisitionFailed(err.clone()),
        ]);
        assert_eq!(machine.state(), SessionState::Error);
        assert!(!effects.contains(&Effect::Release));
        assert_eq!(effects.last(), Some(&Effect::Report(err)));

        let t = machine.handle(SessionEvent::ErrorReported);
        assert_eq!(t.next.state(), SessionState::Idle);
    }

    #[test]
    fn fragments_append_while_recording_and_finalizing() {
        let (machine, effects) = run(vec![
            SessionEvent::StartRequested,
            SessionEvent::DeviceGranted,
            SessionEvent::DataAvailable(vec![1, 2]),
        ]);
        assert_eq!(effects, vec![Effect::AppendFragment(vec![1, 2])]);

        let machine = machine.handle(SessionEvent::StopRequested).next;
        assert_eq!(machine.state(), SessionState::Finalizing);
        let t = machine.handle(SessionEvent::DataAvailable(vec![3]));
        assert_eq!(t.effects, vec![Effect::AppendFragment(vec![3])]);
    }

    #[test]
    fn fragment_while_idle_is_ignored() {
        let t = SessionMachine::new().handle(SessionEvent::DataAvailable(vec![1]));
        assert!(t.ignored);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn stop_then_encoder_stopped_completes_after_release() {
        let (machine, effects) = run(vec![
            SessionEvent::StartRequested,
            SessionEvent::DeviceGranted,
            SessionEvent::StopRequested,
        ]);
        assert_eq!(machine.state(), SessionState::Finalizing);
        assert_eq!(effects, vec![Effect::StopEncoder]);

        let t = machine.handle(SessionEvent::EncoderStopped);
        assert_eq!(t.next.state(), SessionState::Idle);
        assert_eq!(t.effects, vec![Effect::Release, Effect::Complete, Effect::ClearBuffer]);
    }

    #[test]
    fn device_side_stop_while_recording_completes() {
        let (machine, effects) = run(vec![
            SessionEvent::StartRequested,
            SessionEvent::DeviceGranted,
            SessionEvent::EncoderStopped,
        ]);
        assert!(machine.is_idle());
        assert!(effects.contains(&Effect::Complete));
    }

    #[test]
    fn device_error_releases_before_report() {
        let err = CaptureError::device_failure("unplugged");
        let (machine, effects) = run(vec![
            SessionEvent::StartRequested,
            SessionEvent::DeviceGranted,
            SessionEvent::DeviceError(err.clone()),
        ]);
        assert_eq!(machine.state(), SessionState::Error);
        assert_eq!(
            effects,
            vec![Effect::Release, Effect::ClearBuffer, Effect::Report(err)]
        );
    }

    #[test]
    fn device_error_during_finalizing_still_releases() {
        let err = CaptureError::device_failure("");
        let (machine, effects) = run(vec![
            SessionEvent::StartRequested,
            SessionEvent::DeviceGranted,
            SessionEvent::StopRequested,
            SessionEvent::DeviceError(err),
        ]);
        assert_eq!(machine.state(), SessionState::Error);
        assert_eq!(effects.first(), Some(&Effect::Release));
    }

    #[test]
    fn encoder_failure_reports_format_error() {
        let err = CaptureError::of_kind(CaptureErrorKind::FormatUnsupported);
        let (machine, effects) = run(vec![
            SessionEvent::StartRequested,
            SessionEvent::DeviceGranted,
            SessionEvent::EncoderFailed(err.clone()),
        ]);
        assert_eq!(machine.state(), SessionState::Error);
        assert_eq!(effects.last(), Some(&Effect::Report(err)));
    }

    #[test]
    fn teardown_from_every_state_returns_to_idle() {
        let prefixes = vec![
            vec![],
            vec![SessionEvent::StartRequested],
            vec![SessionEvent::StartRequested, SessionEvent::DeviceGranted],
            vec![
                SessionEvent::StartRequested,
                SessionEvent::DeviceGranted,
                SessionEvent::StopRequested,
            ],
        ];
        for prefix in prefixes {
            let (machine, _) = run(prefix);
            let t = machine.handle(SessionEvent::Teardown);
            assert!(t.next.is_idle());
            assert!(t.effects.contains(&Effect::Release));
            assert!(!t.effects.contains(&Effect::Complete));
            assert!(!t.effects.iter().any(|e| matches!(e, Effect::Report(_))));
        }
    }

    #[test]
    fn teardown_while_acquiring_abandons_acquisition() {
        let (machine, _) = run(vec![SessionEvent::StartRequested]);
        let t = machine.handle(SessionEvent::Teardown);
        assert_eq!(t.effects.first(), Some(&Effect::AbandonAcquisition));
    }

    #[test]
    fn full_cycle_can_repeat() {
        let (machine, _) = run(vec![
            SessionEvent::StartRequested,
            SessionEvent::DeviceGranted,
            SessionEvent::StopRequested,
            SessionEvent::EncoderStopped,
        ]);
        assert!(machine.is_idle());

        let t = machine.handle(SessionEvent::StartRequested);
        assert_eq!(t.next.state(), SessionState::Acquiring);
    }

    #[test]
    fn event_names() {
        assert_eq!(SessionEvent::DataAvailable(vec![]).name(), "data-available");
        assert_eq!(SessionEvent::Teardown.name(), "teardown");
    }
}
