//! Per-particle motion and appearance over its lifetime

use crate::config::EmitterConfig;
use crate::curves::{lerp_color, lerp_f32};
use crate::pool::{ParticleRecord, ParticleSpawn};
use crate::rand::ParticleRng;
use ember_core::{Color, SpawnTransform, Vec3};

/// Outcome of stepping one live particle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Survived,
    Expired,
}

/// The constant parts of an emitter's motion model
#[derive(Debug, Clone)]
pub struct Kinematics {
    pub acceleration: Vec3,
    pub size_start: f32,
    pub size_end: f32,
    pub color_start: Color,
    pub color_end: Color,
    /// When false, positions are measured from the current emitter origin
    /// and particles follow the emitter around.
    pub world_space: bool,
}

impl Kinematics {
    pub fn from_config(config: &EmitterConfig) -> Self {
        Self {
            acceleration: config.acceleration,
            size_start: config.size_start,
            size_end: config.size_end,
            color_start: config.color_start,
            color_end: config.color_end,
            world_space: config.world_space,
        }
    }

    /// Advance one live particle by `dt`.
    ///
    /// Position is evaluated in closed form from the spawn point, so the
    /// result depends only on total age and not on how the time was split
    /// into ticks. An expired particle is left untouched for the caller to
    /// retire.
    pub fn step(&self, record: &mut ParticleRecord, dt: f32, transform: &SpawnTransform) -> Step {
        record.age += dt;
        if record.age >= record.lifetime {
            return Step::Expired;
        }

        let t = record.age;
        let progress = record.age_ratio();
        record.size = lerp_f32(self.size_start, self.size_end, progress);
        record.color = lerp_color(self.color_start, self.color_end, progress);

        let origin = if self.world_space {
            record.spawn_position
        } else {
            transform.position + record.spawn_position
        };
        record.position = origin + record.velocity * t + self.acceleration * (0.5 * t * t);
        Step::Survived
    }
}

/// Roll the initial state for one particle.
///
/// In world space the spawn point is absolute; otherwise it is stored
/// relative to the emitter.
pub fn roll_spawn(
    config: &EmitterConfig,
    transform: &SpawnTransform,
    rng: &mut ParticleRng,
) -> ParticleSpawn {
    let offset = transform.rotate(config.offset);
    let position = if config.world_space {
        transform.position + offset
    } else {
        offset
    };
    let velocity = transform.rotate(config.velocity) + rng.jitter_vec3(config.velocity_jitter);
    let lifetime = config.lifetime + rng.jitter(config.lifetime_jitter);

    ParticleSpawn {
        position,
        velocity,
        lifetime,
        size: config.size_start,
        color: config.color_start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::SlotPool;

    fn still_config() -> EmitterConfig {
        EmitterConfig {
            velocity: Vec3::new(1.0, 2.0, 0.0),
            velocity_jitter: Vec3::ZERO,
            acceleration: Vec3::new(0.0, -10.0, 0.0),
            lifetime: 10.0,
            ..Default::default()
        }
    }

    fn spawned(config: &EmitterConfig) -> SlotPool {
        let mut pool = SlotPool::new(1);
        let mut rng = ParticleRng::new(1);
        pool.spawn(0, roll_spawn(config, &SpawnTransform::IDENTITY, &mut rng));
        pool
    }

    #[test]
    fn position_follows_closed_form() {
        let config = still_config();
        let k = Kinematics::from_config(&config);
        let mut pool = spawned(&config);

        assert_eq!(k.step(pool.get_mut(0), 2.0, &SpawnTransform::IDENTITY), Step::Survived);
        let p = pool.get(0).position;
        assert!((p.x - 2.0).abs() < 1e-5);
        assert!((p.y - (4.0 - 20.0)).abs() < 1e-4);
    }

    #[test]
    fn result_is_independent_of_tick_split() {
        let config = still_config();
        let k = Kinematics::from_config(&config);
        let mut whole = spawned(&config);
        let mut split = spawned(&config);

        k.step(whole.get_mut(0), 1.5, &SpawnTransform::IDENTITY);
        k.step(split.get_mut(0), 0.5, &SpawnTransform::IDENTITY);
        k.step(split.get_mut(0), 1.0, &SpawnTransform::IDENTITY);

        let (a, b) = (whole.get(0), split.get(0));
        assert!((a.position - b.position).length() < 1e-4);
        assert!((a.size - b.size).abs() < 1e-6);
        assert!((a.color.a - b.color.a).abs() < 1e-6);
    }

    #[test]
    fn expires_at_lifetime() {
        let config = EmitterConfig {
            lifetime: 1.0,
            ..still_config()
        };
        let k = Kinematics::from_config(&config);
        let mut pool = spawned(&config);
        assert_eq!(k.step(pool.get_mut(0), 0.5, &SpawnTransform::IDENTITY), Step::Survived);
        assert_eq!(k.step(pool.get_mut(0), 0.5, &SpawnTransform::IDENTITY), Step::Expired);
    }

    #[test]
    fn appearance_interpolates_over_life() {
        let config = EmitterConfig {
            size_start: 1.0,
            size_end: 0.0,
            ..still_config()
        };
        let k = Kinematics::from_config(&config);
        let mut pool = spawned(&config);
        k.step(pool.get_mut(0), 5.0, &SpawnTransform::IDENTITY);
        assert!((pool.get(0).size - 0.5).abs() < 1e-6);
        assert!((pool.get(0).color.a - 0.5).abs() < 1e-6);
    }

    #[test]
    fn local_space_particles_follow_the_emitter() {
        let config = EmitterConfig {
            world_space: false,
            acceleration: Vec3::ZERO,
            velocity: Vec3::ZERO,
            ..still_config()
        };
        let k = Kinematics::from_config(&config);
        let mut pool = spawned(&config);
        let moved = SpawnTransform::from_position(Vec3::new(3.0, 0.0, 0.0));
        k.step(pool.get_mut(0), 0.1, &moved);
        assert_eq!(pool.get(0).position, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn world_space_spawn_uses_transform() {
        let config = EmitterConfig {
            offset: Vec3::new(0.0, 1.0, 0.0),
            ..still_config()
        };
        let mut rng = ParticleRng::new(9);
        let transform = SpawnTransform::from_position(Vec3::new(5.0, 0.0, 0.0));
        let spawn = roll_spawn(&config, &transform, &mut rng);
        assert_eq!(spawn.position, Vec3::new(5.0, 1.0, 0.0));
        assert_eq!(spawn.velocity, config.velocity);
        assert_eq!(spawn.lifetime, config.lifetime);
    }

    #[test]
    fn lifetime_jitter_stays_positive() {
        let config = EmitterConfig {
            lifetime: 1.0,
            lifetime_jitter: 0.9,
            ..still_config()
        };
        let mut rng = ParticleRng::new(4);
        for _ in 0..500 {
            let spawn = roll_spawn(&config, &SpawnTransform::IDENTITY, &mut rng);
            assert!(spawn.lifetime > 0.0 && spawn.lifetime < 1.9);
        }
    }
}
