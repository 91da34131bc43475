//! Audiosphere library - audio-reactive sphere deformation
//!
//! Drives an icosphere so its surface breathes with sound: per frame, a
//! loudness scalar derived from the active audio source (microphone or
//! decoded file) is blended with seeded gradient noise to displace every
//! vertex along its rest-pose radial direction, and the exact rest pose is
//! restored on stop. Rendering is left to the consumer of the vertex
//! buffer.

pub mod audio;
pub mod deform;
pub mod error;
pub mod mesh;
pub mod noise;
pub mod params;
pub mod visualizer;

pub use audio::{AudioAnalyzer, AudioSourceKind, AudioSourceManager};
pub use deform::DeformationEngine;
pub use error::{AudioError, Result};
pub use mesh::SphereMesh;
pub use noise::NoiseField;
pub use visualizer::{VisualizerLoop, VisualizerState};
