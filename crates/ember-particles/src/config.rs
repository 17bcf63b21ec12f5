//! Emitter and pipeline configuration (parsed from TOML) with validation

use ember_core::{Color, EmberError, Result, Vec3};
use std::path::Path;
use std::time::Duration;

/// Largest pool accepted for a single emitter
pub const MAX_CAPACITY: usize = 1 << 20;

/// Most frame resource sets a pipeline may allocate
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// Slot allocation strategy for an emitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorKind {
    /// Explicit stack of free ids; release order is unconstrained.
    FreeList,
    /// Cyclic alive range; particles may only die oldest-first, so every
    /// particle must share one lifetime.
    RingBuffer,
}

impl AllocatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocatorKind::FreeList => "free_list",
            AllocatorKind::RingBuffer => "ring_buffer",
        }
    }
}

/// Steady-state emission behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionMode {
    /// Rate-driven trickle
    Continuous,
    /// Fill every slot on the first tick, never trickle
    OneShot,
}

/// Configuration parsed from an `[[emitter]]` TOML table
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    pub name: String,
    pub allocator: AllocatorKind,
    pub emission: EmissionMode,
    pub max_particles: usize,
    pub emission_rate: f32,
    pub max_emit_per_tick: u32,
    pub burst_count: u32,
    pub lifetime: f32,
    pub lifetime_jitter: f32,
    pub size_start: f32,
    pub size_end: f32,
    pub color_start: Color,
    pub color_end: Color,
    pub velocity: Vec3,
    /// Per-axis half-width of the random band added to `velocity`
    pub velocity_jitter: Vec3,
    pub acceleration: Vec3,
    pub world_space: bool,
    /// Spawn offset from the emitter transform
    pub offset: Vec3,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            name: String::from("emitter"),
            allocator: AllocatorKind::FreeList,
            emission: EmissionMode::Continuous,
            max_particles: 256,
            emission_rate: 10.0,
            max_emit_per_tick: 65535,
            burst_count: 0,
            lifetime: 1.0,
            lifetime_jitter: 0.0,
            size_start: 0.1,
            size_end: 0.0,
            color_start: Color::WHITE,
            color_end: Color::TRANSPARENT,
            velocity: Vec3::new(0.0, 1.0, 0.0),
            velocity_jitter: Vec3::new(0.2, 0.2, 0.2),
            acceleration: Vec3::new(0.0, -9.81, 0.0),
            world_space: true,
            offset: Vec3::ZERO,
        }
    }
}

impl EmitterConfig {
    /// Parse an EmitterConfig from a TOML table, then validate it
    pub fn from_toml(table: &toml::value::Table) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = table.get("name") {
            config.name = v
                .as_str()
                .ok_or_else(|| EmberError::InvalidConfig("name must be a string".into()))?
                .to_string();
        }
        if let Some(v) = table.get("allocator") {
            config.allocator = match toml_str(v, "allocator")? {
                "free_list" => AllocatorKind::FreeList,
                "ring_buffer" => AllocatorKind::RingBuffer,
                other => return Err(invalid_enum(other, &["free_list", "ring_buffer"])),
            };
        }
        if let Some(v) = table.get("emission") {
            config.emission = match toml_str(v, "emission")? {
                "continuous" => EmissionMode::Continuous,
                "one_shot" => EmissionMode::OneShot,
                other => return Err(invalid_enum(other, &["continuous", "one_shot"])),
            };
        }
        if let Some(v) = table.get("max_particles") {
            config.max_particles = toml_count(v, "max_particles")? as usize;
        }
        if let Some(v) = table.get("emission_rate") {
            config.emission_rate = toml_f32(v, "emission_rate")?;
        }
        if let Some(v) = table.get("max_emit_per_tick") {
            config.max_emit_per_tick = toml_count(v, "max_emit_per_tick")?.min(u32::MAX as u64) as u32;
        }
        if let Some(v) = table.get("burst_count") {
            config.burst_count = toml_count(v, "burst_count")?.min(u32::MAX as u64) as u32;
        }
        if let Some(v) = table.get("lifetime") {
            config.lifetime = toml_f32(v, "lifetime")?;
        }
        if let Some(v) = table.get("lifetime_jitter") {
            config.lifetime_jitter = toml_f32(v, "lifetime_jitter")?;
        }
        if let Some(v) = table.get("size_start") {
            config.size_start = toml_f32(v, "size_start")?;
        }
        if let Some(v) = table.get("size_end") {
            config.size_end = toml_f32(v, "size_end")?;
        }
        if let Some(v) = table.get("color_start") {
            config.color_start = Color::from_array(toml_vec4(v, "color_start")?);
        }
        if let Some(v) = table.get("color_end") {
            config.color_end = Color::from_array(toml_vec4(v, "color_end")?);
        }
        if let Some(v) = table.get("velocity") {
            config.velocity = Vec3::from_array(toml_vec3(v, "velocity")?);
        }
        if let Some(v) = table.get("velocity_jitter") {
            config.velocity_jitter = Vec3::from_array(toml_vec3(v, "velocity_jitter")?);
        }
        if let Some(v) = table.get("acceleration") {
            config.acceleration = Vec3::from_array(toml_vec3(v, "acceleration")?);
        }
        if let Some(v) = table.get("world_space") {
            config.world_space = v.as_bool().ok_or_else(|| {
                EmberError::InvalidConfig(format!("world_space must be a boolean, got {v}"))
            })?;
        }
        if let Some(v) = table.get("position") {
            config.offset = Vec3::from_array(toml_vec3(v, "position")?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run without dividing by zero
    /// or breaking an allocator invariant.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(EmberError::InvalidConfig(format!("emitter '{}': {msg}", self.name)));

        if self.max_particles == 0 {
            return fail("max_particles must be at least 1".into());
        }
        if self.max_particles > MAX_CAPACITY {
            return fail(format!(
                "max_particles {} exceeds the limit of {MAX_CAPACITY}",
                self.max_particles
            ));
        }
        if !(self.emission_rate > 0.0) || !self.emission_rate.is_finite() {
            return fail(format!(
                "emission_rate must be positive, got {}",
                self.emission_rate
            ));
        }
        if self.max_emit_per_tick == 0 {
            return fail("max_emit_per_tick must be at least 1".into());
        }
        if !(self.lifetime > 0.0) || !self.lifetime.is_finite() {
            return fail(format!("lifetime must be positive, got {}", self.lifetime));
        }
        if !(self.lifetime_jitter >= 0.0) || self.lifetime_jitter >= self.lifetime {
            return fail(format!(
                "lifetime_jitter must be in [0, lifetime), got {}",
                self.lifetime_jitter
            ));
        }
        if self.allocator == AllocatorKind::RingBuffer && self.lifetime_jitter > 0.0 {
            return fail(
                "ring_buffer allocator releases oldest-first and needs a uniform lifetime; \
                 set lifetime_jitter = 0 or use allocator = \"free_list\""
                    .into(),
            );
        }
        let j = self.velocity_jitter;
        if !(j.x >= 0.0 && j.y >= 0.0 && j.z >= 0.0) {
            return fail(format!("velocity_jitter must be non-negative, got {j:?}"));
        }
        Ok(())
    }
}

/// Frame pipelining settings (`[pipeline]` table)
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub frames_in_flight: usize,
    /// `None` waits forever
    pub wait_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 3,
            wait_timeout: Some(Duration::from_millis(2000)),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(table: &toml::value::Table) -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = table.get("frames_in_flight") {
            config.frames_in_flight = toml_count(v, "frames_in_flight")? as usize;
        }
        if let Some(v) = table.get("wait_timeout_ms") {
            let ms = toml_count(v, "wait_timeout_ms")?;
            config.wait_timeout = if ms == 0 {
                None
            } else {
                Some(Duration::from_millis(ms))
            };
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(EmberError::InvalidConfig(
                "frames_in_flight must be at least 1".into(),
            ));
        }
        if self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(EmberError::InvalidConfig(format!(
                "frames_in_flight {} exceeds the limit of {MAX_FRAMES_IN_FLIGHT}",
                self.frames_in_flight
            )));
        }
        Ok(())
    }
}

/// A whole particle scene: pipeline settings plus every emitter
#[derive(Debug, Clone, Default)]
pub struct SceneConfig {
    pub pipeline: PipelineConfig,
    pub emitters: Vec<EmitterConfig>,
}

impl SceneConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let root: toml::value::Table = toml::from_str(source)?;

        let pipeline = match root.get("pipeline") {
            Some(v) => PipelineConfig::from_toml(v.as_table().ok_or_else(|| {
                EmberError::InvalidConfig("[pipeline] must be a table".into())
            })?)?,
            None => PipelineConfig::default(),
        };

        let mut emitters = Vec::new();
        if let Some(v) = root.get("emitter") {
            let arr = v.as_array().ok_or_else(|| {
                EmberError::InvalidConfig("emitters must be declared as [[emitter]]".into())
            })?;
            for (i, entry) in arr.iter().enumerate() {
                let table = entry.as_table().ok_or_else(|| {
                    EmberError::InvalidConfig(format!("emitter #{i} is not a table"))
                })?;
                emitters.push(EmitterConfig::from_toml(table)?);
            }
        }
        if emitters.is_empty() {
            return Err(EmberError::MissingRequiredField("[[emitter]]".into()));
        }

        Ok(Self { pipeline, emitters })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

fn invalid_enum(value: &str, allowed: &[&str]) -> EmberError {
    EmberError::InvalidEnumValue {
        value: value.to_string(),
        allowed: allowed.iter().map(|s| s.to_string()).collect(),
    }
}

// ── TOML helpers (handle integer/float coercion) ──

fn toml_str<'a>(v: &'a toml::Value, field: &str) -> Result<&'a str> {
    v.as_str()
        .ok_or_else(|| EmberError::InvalidConfig(format!("{field} must be a string")))
}

fn toml_count(v: &toml::Value, field: &str) -> Result<u64> {
    match v.as_integer() {
        Some(n) if n >= 0 => Ok(n as u64),
        _ => Err(EmberError::InvalidConfig(format!(
            "{field} must be a non-negative integer, got {v}"
        ))),
    }
}

fn toml_f32(v: &toml::Value, field: &str) -> Result<f32> {
    v.as_float()
        .map(|f| f as f32)
        .or_else(|| v.as_integer().map(|i| i as f32))
        .ok_or_else(|| EmberError::InvalidConfig(format!("{field} must be a number, got {v}")))
}

fn toml_floats<const N: usize>(v: &toml::Value, field: &str) -> Result<[f32; N]> {
    let arr = match v.as_array() {
        Some(arr) if arr.len() == N => arr,
        _ => {
            return Err(EmberError::InvalidConfig(format!(
                "{field} must be an array of {N} numbers, got {v}"
            )))
        }
    };
    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(arr) {
        *slot = toml_f32(item, field)?;
    }
    Ok(out)
}

fn toml_vec3(v: &toml::Value, field: &str) -> Result<[f32; 3]> {
    toml_floats(v, field)
}

fn toml_vec4(v: &toml::Value, field: &str) -> Result<[f32; 4]> {
    toml_floats(v, field)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(src: &str) -> toml::value::Table {
        toml::from_str(src).unwrap()
    }

    #[test]
    fn default_config_is_valid() {
        let config = EmitterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.allocator, AllocatorKind::FreeList);
        assert_eq!(config.emission, EmissionMode::Continuous);
    }

    #[test]
    fn parse_from_toml() {
        let config = EmitterConfig::from_toml(&table(
            r#"
name = "exhaust"
allocator = "ring_buffer"
emission = "one_shot"
max_particles = 500
emission_rate = 50.0
acceleration = [0, 0, 0]
color_start = [1.0, 0.5, 0.0, 1.0]
velocity_jitter = [0.1, 0, 0.1]
world_space = false
position = [0, 2, 0]
"#,
        ))
        .unwrap();
        assert_eq!(config.name, "exhaust");
        assert_eq!(config.allocator, AllocatorKind::RingBuffer);
        assert_eq!(config.emission, EmissionMode::OneShot);
        assert_eq!(config.max_particles, 500);
        assert!((config.emission_rate - 50.0).abs() < 0.01);
        assert_eq!(config.acceleration, Vec3::ZERO);
        assert!((config.color_start.g - 0.5).abs() < 0.01);
        assert!(config.velocity_jitter.y.abs() < 0.01);
        assert!(!config.world_space);
        assert_eq!(config.offset, Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn toml_integer_float_coercion() {
        let config = EmitterConfig::from_toml(&table("acceleration = [0, -10, 0]\nlifetime = 2")).unwrap();
        assert!((config.acceleration.y + 10.0).abs() < 0.01);
        assert!((config.lifetime - 2.0).abs() < 0.01);
    }

    #[test]
    fn rejects_zero_and_negative_rate() {
        for rate in ["0", "-5.0", "0.0"] {
            let err = EmitterConfig::from_toml(&table(&format!("emission_rate = {rate}"))).unwrap_err();
            assert!(matches!(err, EmberError::InvalidConfig(_)), "rate {rate}");
        }
    }

    #[test]
    fn rejects_zero_lifetime_and_capacity() {
        assert!(EmitterConfig::from_toml(&table("lifetime = 0")).is_err());
        assert!(EmitterConfig::from_toml(&table("max_particles = 0")).is_err());
        assert!(EmitterConfig::from_toml(&table("max_particles = -3")).is_err());
    }

    #[test]
    fn rejects_unknown_allocator() {
        let err = EmitterConfig::from_toml(&table("allocator = \"slab\"")).unwrap_err();
        assert!(matches!(err, EmberError::InvalidEnumValue { .. }));
    }

    #[test]
    fn ring_buffer_requires_uniform_lifetime() {
        let err = EmitterConfig::from_toml(&table(
            "allocator = \"ring_buffer\"\nlifetime = 2.0\nlifetime_jitter = 0.5",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("uniform lifetime"));

        let ok = EmitterConfig::from_toml(&table("lifetime = 2.0\nlifetime_jitter = 0.5"));
        assert!(ok.is_ok());
    }

    #[test]
    fn scene_parses_pipeline_and_emitters() {
        let scene = SceneConfig::from_toml_str(
            r#"
[pipeline]
frames_in_flight = 2
wait_timeout_ms = 0

[[emitter]]
name = "a"

[[emitter]]
name = "b"
allocator = "ring_buffer"
"#,
        )
        .unwrap();
        assert_eq!(scene.pipeline.frames_in_flight, 2);
        assert!(scene.pipeline.wait_timeout.is_none());
        assert_eq!(scene.emitters.len(), 2);
        assert_eq!(scene.emitters[1].allocator, AllocatorKind::RingBuffer);
    }

    #[test]
    fn wrong_value_types_are_rejected() {
        for src in [
            "lifetime = \"0\"",
            "emission_rate = true",
            "world_space = \"yes\"",
            "velocity = [0, 1]",
            "acceleration = [0, \"down\", 0]",
            "color_start = 1.0",
        ] {
            let err = EmitterConfig::from_toml(&table(src)).unwrap_err();
            assert!(matches!(err, EmberError::InvalidConfig(_)), "{src}");
        }
    }

    #[test]
    fn frames_in_flight_is_bounded() {
        let err = PipelineConfig::from_toml(&table("frames_in_flight = 3000000")).unwrap_err();
        assert!(err.to_string().contains("exceeds the limit"));
        assert!(PipelineConfig::from_toml(&table("frames_in_flight = 8")).is_ok());
    }

    #[test]
    fn scene_without_emitters_is_rejected() {
        let err = SceneConfig::from_toml_str("[pipeline]\nframes_in_flight = 3").unwrap_err();
        assert!(matches!(err, EmberError::MissingRequiredField(_)));
        assert!(SceneConfig::from_toml_str("[pipeline]\nframes_in_flight = 0\n[[emitter]]").is_err());
    }
}
