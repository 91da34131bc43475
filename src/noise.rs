//! Seeded 3D gradient noise for organic surface motion.
//!
//! Classic improved Perlin noise: a shuffled permutation table drives hashed
//! gradient selection at the eight lattice corners around the sample point,
//! blended with a quintic fade curve. Deterministic for a given seed, smooth
//! everywhere, output roughly in [-1, 1].

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Anything that can be sampled as a continuous 3D scalar field.
///
/// The deformation engine only needs this one method, which keeps the noise
/// implementation swappable (tests pin it to a constant).
pub trait NoiseSource {
    /// Sample the field at `(x, y, z)`. Output is roughly in [-1, 1].
    fn sample(&self, x: f32, y: f32, z: f32) -> f32;
}

/// Gradient noise generator with a fixed, seed-derived permutation table.
///
/// The table is built once at construction and never reseeded; the instance
/// holds no other state, so it can be shared read-only across callers.
pub struct NoiseField {
    /// 0..=255 shuffled by the seed, duplicated to 512 entries so lattice
    /// hashing never needs a wrap-around branch.
    perm: [u8; 512],
}

impl NoiseField {
    /// Build the permutation table from `seed`.
    pub fn new(seed: u32) -> Self {
        let mut table: Vec<u8> = (0..=255u8).collect();
        let mut rng = StdRng::seed_from_u64(seed as u64);
        table.shuffle(&mut rng);

        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = table[i & 255];
        }
        Self { perm }
    }

    /// Quintic fade curve 6t^5 - 15t^4 + 10t^3 (zero first and second
    /// derivative at the cell boundaries).
    fn fade(t: f32) -> f32 {
        t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
    }

    fn lerp(t: f32, a: f32, b: f32) -> f32 {
        a + t * (b - a)
    }

    /// Dot product of the hashed corner gradient with the offset vector,
    /// using Perlin's bit-trick gradient set.
    fn grad(hash: u8, x: f32, y: f32, z: f32) -> f32 {
        let h = hash & 15;
        let u = if h < 8 { x } else { y };
        let v = if h < 4 {
            y
        } else if h == 12 || h == 14 {
            x
        } else {
            z
        };
        (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
    }
}

impl NoiseSource for NoiseField {
    fn sample(&self, x: f32, y: f32, z: f32) -> f32 {
        let p = &self.perm;

        // Lattice cell containing the point, wrapped to the table size.
        let xi = (x.floor() as i32 & 255) as usize;
        let yi = (y.floor() as i32 & 255) as usize;
        let zi = (z.floor() as i32 & 255) as usize;

        // Offsets within the cell.
        let xf = x - x.floor();
        let yf = y - y.floor();
        let zf = z - z.floor();

        let u = Self::fade(xf);
        let v = Self::fade(yf);
        let w = Self::fade(zf);

        // Hash the eight cube corners.
        let a = p[xi] as usize + yi;
        let aa = p[a] as usize + zi;
        let ab = p[a + 1] as usize + zi;
        let b = p[xi + 1] as usize + yi;
        let ba = p[b] as usize + zi;
        let bb = p[b + 1] as usize + zi;

        Self::lerp(
            w,
            Self::lerp(
                v,
                Self::lerp(
                    u,
                    Self::grad(p[aa], xf, yf, zf),
                    Self::grad(p[ba], xf - 1.0, yf, zf),
                ),
                Self::lerp(
                    u,
                    Self::grad(p[ab], xf, yf - 1.0, zf),
                    Self::grad(p[bb], xf - 1.0, yf - 1.0, zf),
                ),
            ),
            Self::lerp(
                v,
                Self::lerp(
                    u,
                    Self::grad(p[aa + 1], xf, yf, zf - 1.0),
                    Self::grad(p[ba + 1], xf - 1.0, yf, zf - 1.0),
                ),
                Self::lerp(
                    u,
                    Self::grad(p[ab + 1], xf, yf - 1.0, zf - 1.0),
                    Self::grad(p[bb + 1], xf - 1.0, yf - 1.0, zf - 1.0),
                ),
            ),
        )
    }
}
