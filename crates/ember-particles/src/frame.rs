//! Frames in flight: round-robin resource sets gated by a completion counter
//!
//! The producer records into one set while the consumer may still be
//! reading up to `frame_count - 1` earlier ones. Each submitted set is
//! stamped with a fence value; the set is reused only after the consumer
//! has signalled that value.

use ember_core::{EmberError, Result};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Waits longer than this are logged as stalls
const SLOW_WAIT: Duration = Duration::from_millis(100);

/// A monotonically increasing counter the consumer advances as it finishes
/// work.
pub trait CompletionCounter: Send + Sync {
    fn completed_value(&self) -> u64;

    /// Advance the counter. Values at or below the current one are ignored.
    fn signal(&self, value: u64);

    /// Block until the counter reaches `value`. Returns `false` if the
    /// timeout elapsed first; `None` waits forever.
    fn wait_for(&self, value: u64, timeout: Option<Duration>) -> bool;
}

/// Host-side fence backed by a mutex and condition variable
#[derive(Debug, Default)]
pub struct Fence {
    completed: Mutex<u64>,
    reached: Condvar,
}

impl Fence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CompletionCounter for Fence {
    fn completed_value(&self) -> u64 {
        *self.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signal(&self, value: u64) {
        let mut completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        if value > *completed {
            *completed = value;
            self.reached.notify_all();
        }
    }

    fn wait_for(&self, value: u64, timeout: Option<Duration>) -> bool {
        let completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        match timeout {
            None => {
                let _done = self
                    .reached
                    .wait_while(completed, |c| *c < value)
                    .unwrap_or_else(PoisonError::into_inner);
                true
            }
            Some(timeout) => {
                let (_done, result) = self
                    .reached
                    .wait_timeout_while(completed, timeout, |c| *c < value)
                    .unwrap_or_else(PoisonError::into_inner);
                !result.timed_out()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Free for recording
    Idle,
    /// Handed to the consumer; reusable once its fence value completes
    Submitted,
}

/// One stage of the pipeline
pub struct FrameResourceSet<R> {
    index: usize,
    fence_value: u64,
    state: FrameState,
    pub resources: R,
}

impl<R> FrameResourceSet<R> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Fence value stamped at the last submit (0 before the first)
    pub fn fence_value(&self) -> u64 {
        self.fence_value
    }

    pub fn state(&self) -> FrameState {
        self.state
    }
}

pub struct FramePipeline<R> {
    sets: Vec<FrameResourceSet<R>>,
    current: usize,
    last_fence: u64,
    counter: Arc<dyn CompletionCounter>,
    wait_timeout: Option<Duration>,
    stalls: u64,
}

impl<R> FramePipeline<R> {
    /// Allocate `frame_count` resource sets up front with `make(index)`
    pub fn new(
        frame_count: usize,
        counter: Arc<dyn CompletionCounter>,
        wait_timeout: Option<Duration>,
        mut make: impl FnMut(usize) -> R,
    ) -> Result<Self> {
        if frame_count == 0 {
            return Err(EmberError::InvalidConfig(
                "frame pipeline needs at least one frame in flight".into(),
            ));
        }
        let sets = (0..frame_count)
            .map(|index| FrameResourceSet {
                index,
                fence_value: 0,
                state: FrameState::Idle,
                resources: make(index),
            })
            .collect();
        info!(frame_count, "frame pipeline ready");
        Ok(Self {
            sets,
            // the first begin_frame lands on set 0
            current: frame_count - 1,
            last_fence: 0,
            counter,
            wait_timeout,
            stalls: 0,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.sets.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Highest fence value stamped so far
    pub fn last_submitted(&self) -> u64 {
        self.last_fence
    }

    /// Times `begin_frame` had to block on the consumer
    pub fn stalls(&self) -> u64 {
        self.stalls
    }

    pub fn state_of(&self, index: usize) -> FrameState {
        self.sets[index].state
    }

    /// Read any set, including one the consumer is still using
    pub fn set(&self, index: usize) -> &FrameResourceSet<R> {
        &self.sets[index]
    }

    pub fn current(&self) -> &FrameResourceSet<R> {
        &self.sets[self.current]
    }

    pub fn current_mut(&mut self) -> &mut FrameResourceSet<R> {
        &mut self.sets[self.current]
    }

    /// Move to the next set, waiting for the consumer to finish with it if
    /// necessary. This is the only place the producer blocks.
    pub fn begin_frame(&mut self) -> Result<&mut FrameResourceSet<R>> {
        let next = (self.current + 1) % self.sets.len();
        let set = &mut self.sets[next];

        if set.state == FrameState::Submitted {
            let completed = self.counter.completed_value();
            if completed < set.fence_value {
                self.stalls += 1;
                debug!(
                    frame = set.index,
                    fence = set.fence_value,
                    completed,
                    "waiting for frame resources"
                );
                let started = Instant::now();
                if !self.counter.wait_for(set.fence_value, self.wait_timeout) {
                    return Err(EmberError::FrameTimeout {
                        frame_index: set.index,
                        fence_value: set.fence_value,
                        completed_value: self.counter.completed_value(),
                        waited_ms: started.elapsed().as_millis() as u64,
                    });
                }
                let waited = started.elapsed();
                if waited > SLOW_WAIT {
                    warn!(frame = set.index, waited_ms = waited.as_millis() as u64, "slow frame wait");
                }
            }
            set.state = FrameState::Idle;
        }
        self.current = next;
        Ok(set)
    }

    /// Stamp the current set with the next fence value and hand it over.
    ///
    /// Panics if the set was already submitted without a `begin_frame`.
    pub fn submit(&mut self) -> u64 {
        let set = &mut self.sets[self.current];
        assert_eq!(
            set.state,
            FrameState::Idle,
            "frame set {} submitted twice",
            set.index
        );
        self.last_fence += 1;
        set.fence_value = self.last_fence;
        set.state = FrameState::Submitted;
        self.last_fence
    }

    /// Wait until the consumer has finished every submitted frame
    pub fn drain(&mut self) -> Result<()> {
        if self.counter.completed_value() < self.last_fence
            && !self.counter.wait_for(self.last_fence, self.wait_timeout)
        {
            let pending = self
                .sets
                .iter()
                .filter(|s| s.state == FrameState::Submitted)
                .min_by_key(|s| s.fence_value)
                .map(|s| s.index)
                .unwrap_or(self.current);
            return Err(EmberError::FrameTimeout {
                frame_index: pending,
                fence_value: self.last_fence,
                completed_value: self.counter.completed_value(),
                waited_ms: self.wait_timeout.map_or(0, |t| t.as_millis() as u64),
            });
        }
        for set in &mut self.sets {
            set.state = FrameState::Idle;
        }
        debug!(fence = self.last_fence, "frame pipeline drained");
        Ok(())
    }
}
