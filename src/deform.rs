//! Radial vertex displacement driven by loudness and noise.

use glam::Vec3;

use crate::mesh::SphereMesh;
use crate::noise::{NoiseField, NoiseSource};
use crate::params::NoiseWeights;

/// Computes live vertex positions from the rest pose, a loudness scalar and
/// elapsed time, and restores the rest pose exactly on reset.
pub struct DeformationEngine<N = NoiseField>
where
    N: NoiseSource,
{
    noise: N,
}

impl DeformationEngine<NoiseField> {
    /// Engine with the default gradient-noise field.
    pub fn new(noise_seed: u32) -> Self {
        Self {
            noise: NoiseField::new(noise_seed),
        }
    }
}

impl<N: NoiseSource> DeformationEngine<N> {
    /// Engine with a caller-supplied noise source.
    pub fn with_noise(noise: N) -> Self {
        Self { noise }
    }

    /// Snapshot the mesh's current vertex positions as the rest pose.
    ///
    /// Must be called exactly once, after the geometry is fully constructed
    /// and before any deformation. A repeated call is a caller bug; the
    /// first snapshot is preserved.
    pub fn capture_rest_pose(&self, mesh: &mut SphereMesh) {
        debug_assert!(!mesh.rest_captured(), "rest pose captured twice");
        if !mesh.rest_captured() {
            mesh.rest = mesh.live.clone();
        }
    }

    /// Displace every vertex along its rest-pose radial direction.
    ///
    /// Per vertex: sample the noise field at the rest position (with elapsed
    /// time as the third axis), fold it into
    /// `scale = 1 + loudness * amplitude_weight
    ///            + normalized_noise * loudness * noise_weight`
    /// and move the vertex to `scale` times its rest distance from origin.
    /// Both audio terms are proportional to loudness, so a silent signal
    /// collapses the scale to exactly 1 and the mesh holds its rest pose.
    pub fn deform(
        &self,
        mesh: &mut SphereMesh,
        loudness: f32,
        elapsed_seconds: f32,
        weights: NoiseWeights,
    ) {
        debug_assert!(mesh.rest_captured(), "deform before rest pose capture");
        debug_assert!((0.0..=1.0).contains(&loudness));

        for i in 0..mesh.rest.len() {
            let rest = mesh.rest[i];

            let ns = self.noise.sample(rest.x, rest.y, elapsed_seconds);
            let normalized_noise = ns * 2.0 - 1.0;

            let scale = 1.0
                + loudness * weights.amplitude_weight
                + normalized_noise * loudness * weights.noise_weight;

            // rest / radius is the unit direction and scale * radius the new
            // distance; their product is rest * scale. Scaling the rest
            // vector directly keeps scale == 1 bit-exact at the rest pose.
            mesh.live[i] = rest * scale;
        }
    }

    /// Restore the rest pose, element for element.
    pub fn reset(&self, mesh: &mut SphereMesh) {
        debug_assert!(mesh.rest_captured(), "reset before rest pose capture");
        mesh.live.clear();
        mesh.live.extend_from_slice(&mesh.rest);
    }
}

/// Position of the companion marker for vertex `index`, given the uniform
/// scale the renderer currently applies to the mesh. Stateless; recomputed
/// from the live buffer every frame.
pub fn marker_position(mesh: &SphereMesh, index: usize, uniform_scale: f32) -> Vec3 {
    mesh.live_positions()[index] * uniform_scale
}
