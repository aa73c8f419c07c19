//! Viewpoint configuration.
//!
//! - [`ViewSpec`] -- name, pose, resolution and clipping range of one view.
//! - [`ViewRegistry`] -- the ordered set of built-in and custom views for a run.
//! - [`ViewPreset`] -- named sets of extra views.
//!
//! Nothing in this module touches a simulator resource.

pub mod presets;
pub mod registry;
pub mod spec;

pub use presets::ViewPreset;
pub use registry::ViewRegistry;
pub use spec::{Resolution, ViewSpec};
