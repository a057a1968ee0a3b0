//! Audio capture module
//!
//! Provides an explicit state machine over the capture session:
//! - Idle: no session, ready to start
//! - Requesting: waiting for the device grant
//! - Recording: device held, fragments accumulating
//! - Finalizing: device released, artifact being assembled

mod device;
mod machine;

pub use device::{AudioDevice, CaptureError, DeviceHandle, FileSource, FragmentSender};
pub use machine::{CaptureMachine, CaptureState, Recording};
