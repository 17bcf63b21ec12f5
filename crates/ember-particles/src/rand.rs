//! Lightweight xorshift32 PRNG, seeded per emitter for reproducible runs

use ember_core::Vec3;

pub struct ParticleRng {
    state: u32,
}

impl ParticleRng {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Returns a float in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        // top 24 bits fit the f32 mantissa exactly
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Returns a float in [min, max)
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Returns a float in [-half_width, half_width)
    pub fn jitter(&mut self, half_width: f32) -> f32 {
        if half_width <= 0.0 {
            return 0.0;
        }
        self.range(-half_width, half_width)
    }

    /// Per-axis jitter
    pub fn jitter_vec3(&mut self, half_width: Vec3) -> Vec3 {
        Vec3::new(
            self.jitter(half_width.x),
            self.jitter(half_width.y),
            self.jitter(half_width.z),
        )
    }
}
