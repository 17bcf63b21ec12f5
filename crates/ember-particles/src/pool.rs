//! Fixed-capacity particle storage addressed by slot id

use ember_core::{Color, Vec3};

/// Index of a slot in a pool. Stable for the whole life of the particle.
pub type SlotId = u32;

/// Simulation state of one slot
#[derive(Clone, Debug)]
pub struct ParticleRecord {
    pub age: f32,
    pub lifetime: f32,
    pub spawn_position: Vec3,
    pub position: Vec3,
    pub velocity: Vec3,
    pub size: f32,
    pub color: Color,
    alive: bool,
}

impl ParticleRecord {
    pub fn dead() -> Self {
        Self {
            age: 0.0,
            lifetime: 0.0,
            spawn_position: Vec3::ZERO,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            size: 0.0,
            color: Color::TRANSPARENT,
            alive: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Normalized age in [0, 1]
    pub fn age_ratio(&self) -> f32 {
        if self.lifetime <= 0.0 {
            1.0
        } else {
            (self.age / self.lifetime).min(1.0)
        }
    }
}

/// Initial values for a freshly claimed slot
#[derive(Clone, Copy, Debug)]
pub struct ParticleSpawn {
    pub position: Vec3,
    pub velocity: Vec3,
    pub lifetime: f32,
    pub size: f32,
    pub color: Color,
}

/// Fixed array of particle records. Never grows; which slots are in use is
/// decided by an allocator, the pool only checks that the allocator and the
/// records agree.
pub struct SlotPool {
    records: Vec<ParticleRecord>,
}

impl SlotPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: vec![ParticleRecord::dead(); capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    pub fn get(&self, id: SlotId) -> &ParticleRecord {
        &self.records[id as usize]
    }

    pub fn get_mut(&mut self, id: SlotId) -> &mut ParticleRecord {
        &mut self.records[id as usize]
    }

    /// Bring a dead slot to life with age 0.
    ///
    /// Panics if the slot is already alive: the allocator handed out an id
    /// twice.
    pub fn spawn(&mut self, id: SlotId, spawn: ParticleSpawn) {
        let record = &mut self.records[id as usize];
        assert!(!record.alive, "slot {id} claimed while still alive");
        *record = ParticleRecord {
            age: 0.0,
            lifetime: spawn.lifetime,
            spawn_position: spawn.position,
            position: spawn.position,
            velocity: spawn.velocity,
            size: spawn.size,
            color: spawn.color,
            alive: true,
        };
    }

    /// Mark a live slot dead. Panics on a slot that is not alive.
    pub fn retire(&mut self, id: SlotId) {
        let record = &mut self.records[id as usize];
        assert!(record.alive, "slot {id} retired while not alive");
        record.alive = false;
    }

    /// Count live records by scanning the whole pool
    pub fn alive_count(&self) -> usize {
        self.records.iter().filter(|r| r.alive).count()
    }
}
