use crate::error::DeviceErrorKind;
use std::fmt;

/// Lifecycle of the capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    AcquiringDevice,
    Streaming,
    CountingDown(u8),
    Error(DeviceErrorKind),
}

/// Inputs to the capture state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    /// User asked to enable the camera (also used to retry after an error)
    Start,
    DeviceGranted,
    DeviceFailed(DeviceErrorKind),
    CaptureNow,
    /// Timed capture, counting down from the given value
    StartCountdown(u8),
    Tick,
    /// Explicit stop, cancellation or teardown
    Stop,
    /// Clear a device error and return to idle
    Retry,
}

/// Side effect the controller must carry out for a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    AcquireDevice,
    ArmTimer,
    CaptureAndRelease,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: CaptureState,
    pub effect: Effect,
}

impl Transition {
    fn to(next: CaptureState, effect: Effect) -> Option<Self> {
        Some(Self { next, effect })
    }
}

impl CaptureState {
    /// Whether the device is (or is about to be) held
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            CaptureState::AcquiringDevice | CaptureState::Streaming | CaptureState::CountingDown(_)
        )
    }

    /// Compute the transition for `event`, or `None` if it is not allowed here
    pub fn apply(self, event: CaptureEvent) -> Option<Transition> {
        use CaptureEvent as E;
        use CaptureState as S;

        match (self, event) {
            (S::Idle | S::Error(_), E::Start) => {
                Transition::to(S::AcquiringDevice, Effect::AcquireDevice)
            }
            (S::Error(_), E::Retry) => Transition::to(S::Idle, Effect::None),

            (S::AcquiringDevice, E::DeviceGranted) => Transition::to(S::Streaming, Effect::None),
            (S::AcquiringDevice, E::DeviceFailed(kind)) => {
                Transition::to(S::Error(kind), Effect::Release)
            }

            (S::Streaming, E::CaptureNow) => Transition::to(S::Idle, Effect::CaptureAndRelease),
            (S::Streaming, E::StartCountdown(0 | 1)) => {
                Transition::to(S::Idle, Effect::CaptureAndRelease)
            }
            (S::Streaming, E::StartCountdown(n)) => {
                Transition::to(S::CountingDown(n), Effect::ArmTimer)
            }

            (S::CountingDown(n), E::Tick) if n > 1 => {
                Transition::to(S::CountingDown(n - 1), Effect::None)
            }
            (S::CountingDown(_), E::Tick) => Transition::to(S::Idle, Effect::CaptureAndRelease),
            // Capturing manually during a countdown cuts it short
            (S::CountingDown(_), E::CaptureNow) => {
                Transition::to(S::Idle, Effect::CaptureAndRelease)
            }

            (S::AcquiringDevice | S::Streaming | S::CountingDown(_), E::Stop) => {
                Transition::to(S::Idle, Effect::Release)
            }
            (S::Idle | S::Error(_), E::Stop) => Transition::to(S::Idle, Effect::None),

            _ => None,
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "idle"),
            CaptureState::AcquiringDevice => write!(f, "acquiring-device"),
            CaptureState::Streaming => write!(f, "streaming"),
            CaptureState::CountingDown(n) => write!(f, "counting-down({})", n),
            CaptureState::Error(kind) => write!(f, "error({})", kind),
        }
    }
}
