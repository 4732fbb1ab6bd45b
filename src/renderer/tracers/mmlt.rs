//! Multiplexed Metropolis light transport over primary sample space.
//!
//! The chain state is the vector of uniform numbers a bidirectional sample
//! consumes; the drawn depth and split are part of the state which makes the
//! sampler multiplexed. Mutations are the classic mix of large steps and
//! exponentially distributed small steps.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::SbdptSample;
use crate::color::Color;
use crate::float::*;
use crate::sample::SampleStream;

const LARGE_STEP_PROB: Float = 0.3;
const SMALL_STEP_MIN: Float = 1.0 / 1024.0;
const SMALL_STEP_MAX: Float = 1.0 / 64.0;

#[derive(Clone, Copy, Debug)]
struct PrimarySample {
    value: Float,
    backup: Float,
    last_modified: usize,
    backup_modified: usize,
}

/// One Metropolis chain over the primary sample vector
pub struct MarkovChain {
    rng: SmallRng,
    samples: Vec<PrimarySample>,
    /// Current chain iteration
    time: usize,
    /// Iteration of the latest accepted large step
    last_large: usize,
    large_step: bool,
    /// Next sample index handed to the integrator
    idx: usize,
}

impl MarkovChain {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            samples: Vec::new(),
            time: 0,
            last_large: 0,
            large_step: true,
            idx: 0,
        }
    }

    /// Begin a mutation; the proposal is read back through SampleStream
    pub fn begin(&mut self, large_step: bool) {
        self.time += 1;
        self.large_step = large_step;
        self.idx = 0;
    }

    pub fn accept(&mut self) {
        if self.large_step {
            self.last_large = self.time;
        }
    }

    pub fn reject(&mut self) {
        for s in &mut self.samples {
            if s.last_modified == self.time {
                s.value = s.backup;
                s.last_modified = s.backup_modified;
            }
        }
        self.time -= 1;
    }

    fn small_step(value: Float, rng: &mut SmallRng) -> Float {
        let r: Float = rng.gen();
        let delta =
            SMALL_STEP_MAX * (-(SMALL_STEP_MAX / SMALL_STEP_MIN).ln() * rng.gen::<Float>()).exp();
        let mut value = if r < 0.5 { value + delta } else { value - delta };
        value -= value.floor();
        value
    }

    fn ensure(&mut self, i: usize) {
        while self.samples.len() <= i {
            let value = self.rng.gen();
            self.samples.push(PrimarySample {
                value,
                backup: value,
                last_modified: self.time,
                backup_modified: self.time,
            });
        }
    }
}

impl SampleStream for MarkovChain {
    fn next_1d(&mut self) -> Float {
        let i = self.idx;
        self.idx += 1;
        self.ensure(i);
        let s = &mut self.samples[i];
        if s.last_modified < self.time {
            // Replay the large step this sample missed
            if s.last_modified < self.last_large {
                s.value = self.rng.gen();
                s.last_modified = self.last_large;
            }
            s.backup = s.value;
            s.backup_modified = s.last_modified;
            if self.large_step {
                s.value = self.rng.gen();
            } else {
                for _ in s.last_modified..self.time {
                    s.value = Self::small_step(s.value, &mut self.rng);
                }
            }
            s.last_modified = self.time;
        }
        s.value
    }
}

/// Metropolis sampler owning one chain and its current state
pub struct MmltSampler {
    chain: MarkovChain,
    current: SbdptSample,
    current_lum: Float,
    started: bool,
}

impl MmltSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            chain: MarkovChain::new(seed),
            current: SbdptSample {
                at_pixel: Color::black(),
                splat: None,
            },
            current_lum: 0.0,
            started: false,
        }
    }

    /// Run one mutation. Both the proposal and the current state splat their
    /// Metropolis weighted contributions; the normalization constant is
    /// applied by the driver when the frame is developed.
    pub fn step<F>(&mut self, mut eval: F, splats: &mut Vec<(u32, u32, Color)>)
    where
        F: FnMut(&mut dyn SampleStream) -> SbdptSample,
    {
        if !self.started {
            // The first evaluation defines the chain start state
            self.current = eval(&mut self.chain);
            self.current_lum = self.current.luma();
            self.started = true;
        }
        let large = self.chain.rng.gen::<Float>() < LARGE_STEP_PROB;
        self.chain.begin(large);
        let proposal = eval(&mut self.chain);
        let proposal_lum = proposal.luma();

        let accept_prob = if self.current_lum > 0.0 {
            (proposal_lum / self.current_lum).min(1.0)
        } else {
            1.0
        };

        if proposal_lum > 0.0 && accept_prob > 0.0 {
            push_weighted(splats, &proposal, accept_prob / proposal_lum);
        }
        if self.current_lum > 0.0 && accept_prob < 1.0 {
            push_weighted(splats, &self.current, (1.0 - accept_prob) / self.current_lum);
        }

        if self.chain.rng.gen::<Float>() < accept_prob {
            self.chain.accept();
            self.current = proposal;
            self.current_lum = proposal_lum;
        } else {
            self.chain.reject();
        }
    }
}

fn push_weighted(splats: &mut Vec<(u32, u32, Color)>, sample: &SbdptSample, weight: Float) {
    if let Some((x, y, c)) = sample.splat {
        if !c.is_black() {
            splats.push((x, y, weight * c));
        }
    }
}
