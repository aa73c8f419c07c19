//! Simulator and camera-sensor abstractions.
//!
//! The core depends on the external simulator only through the traits in
//! [`traits`]:
//! - [`Simulator`] -- resets to a task and yields one [`SimObservation`] per
//!   demonstration step.
//! - [`CameraSensor`] -- a custom virtual camera queried once per step.
//! - [`CameraFactory`] -- creates custom camera sensors from view specs.
//!
//! [`mock`] provides deterministic implementations used by the tests and the
//! CLI's offline mode.

pub mod mock;
pub mod traits;

pub use mock::{MockCamera, MockCameraFactory, MockSimulator};
pub use traits::{
    CameraFactory, CameraSensor, SimObservation, Simulator, ViewFields, LOW_DIM_ATTRIBUTES,
};
