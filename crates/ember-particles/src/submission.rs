//! Per-frame resources: what one frame in flight records and hands to the
//! consumer

use crate::config::AllocatorKind;
use crate::view::{DrawIndirectArgs, DrawListEntry, ParticleInstance, QuadVertex};
use bytemuck::{Pod, Zeroable};
use ember_core::{ContentHash, ContentHasher};

/// Constants shared by every draw of a frame. 32 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    pub emitter_position: [f32; 3],
    pub time: f32,
    pub delta_time: f32,
    pub frame_index: u32,
    pub _pad: [u32; 2],
}

/// A recorded draw
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Indexed quad draw over a compact vertex buffer
    Indexed { emitter: usize, index_count: u32 },
    /// Instanced draw driven by device-written arguments
    Indirect {
        emitter: usize,
        args: DrawIndirectArgs,
    },
}

/// Command recording context owned by one frame resource set
#[derive(Debug, Default)]
pub struct CommandList {
    commands: Vec<DrawCommand>,
}

impl CommandList {
    /// Only valid once the consumer is done with the previous recording
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    pub fn record(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }
}

/// One emitter's renderable snapshot
#[derive(Debug, Clone, Default)]
pub struct EmitterFrame {
    pub vertices: Vec<QuadVertex>,
    pub index_count: u32,
    pub draw_list: Vec<DrawListEntry>,
    pub instances: Vec<ParticleInstance>,
    pub draw_args: DrawIndirectArgs,
}

impl EmitterFrame {
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.index_count = 0;
        self.draw_list.clear();
        self.instances.clear();
        self.draw_args = DrawIndirectArgs::default();
    }

    /// Particles this snapshot would draw
    pub fn rendered(&self) -> u32 {
        self.index_count / 6 + self.draw_args.instance_count
    }

    fn hash_into(&self, hasher: &mut ContentHasher) {
        hasher.update(bytemuck::cast_slice(&self.vertices));
        hasher.update(&self.index_count.to_le_bytes());
        hasher.update(bytemuck::cast_slice(&self.draw_list));
        hasher.update(bytemuck::cast_slice(&self.instances));
        hasher.update(bytemuck::bytes_of(&self.draw_args));
    }
}

/// Everything one frame in flight owns. Recycled only after the consumer
/// has signalled completion for the frame that last used it.
#[derive(Debug, Default)]
pub struct ParticleFrame {
    pub constants: PassConstants,
    pub commands: CommandList,
    pub emitters: Vec<EmitterFrame>,
}

impl ParticleFrame {
    pub fn new(emitters: &[(AllocatorKind, usize)]) -> Self {
        let emitters = emitters
            .iter()
            .map(|&(kind, capacity)| match kind {
                AllocatorKind::RingBuffer => EmitterFrame {
                    vertices: Vec::with_capacity(capacity * 4),
                    ..Default::default()
                },
                AllocatorKind::FreeList => EmitterFrame {
                    draw_list: Vec::with_capacity(capacity),
                    instances: Vec::with_capacity(capacity),
                    ..Default::default()
                },
            })
            .collect();
        Self {
            constants: PassConstants::default(),
            commands: CommandList::default(),
            emitters,
        }
    }

    pub fn reset(&mut self) {
        self.commands.reset();
        for emitter in &mut self.emitters {
            emitter.clear();
        }
    }

    pub fn rendered(&self) -> u32 {
        self.emitters.iter().map(EmitterFrame::rendered).sum()
    }

    /// Hash of the constants and every emitter snapshot
    pub fn digest(&self) -> ContentHash {
        let mut hasher = ContentHasher::new();
        hasher.update(bytemuck::bytes_of(&self.constants));
        for emitter in &self.emitters {
            hasher.update(&(emitter.vertices.len() as u64).to_le_bytes());
            emitter.hash_into(&mut hasher);
        }
        hasher.finish()
    }
}

/// What the consumer receives for one submitted frame
#[derive(Debug, Clone)]
pub struct FrameSubmission {
    /// Resource set the frame was recorded into
    pub frame_index: usize,
    /// Value the consumer must signal once it has finished reading the frame
    pub fence_value: u64,
    pub constants: PassConstants,
    pub commands: Vec<DrawCommand>,
    pub rendered: u32,
    /// `ParticleFrame::digest` of the set at submit time. The set must
    /// still hash to this until `fence_value` is signalled.
    pub digest: ContentHash,
}
