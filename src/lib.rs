//! Panoptic: multi-view episode capture and serialization for robot
//! demonstrations.
//!
//! A run registers a set of viewpoints (built-in cameras plus any number of
//! custom ones), replays demonstrations in a simulator, captures every view at
//! every step, aggregates the steps into per-view time series and writes each
//! episode to a predictable directory tree of JSON, PNG, `.npy`, a binary
//! snapshot and optional videos.

pub mod capture;
pub mod config;
pub mod episode;
pub mod error;
pub mod persist;
pub mod pipeline;
pub mod sim;
pub mod view;
