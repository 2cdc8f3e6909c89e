//! Synthetic IPC contention.
//!
//! Produces demo samples with the shape of a small IPC workload: a shared
//! memory lock that is usually busy, a pipe labelled with live PIDs, and a
//! lightly used message queue. Optionally prepends established TCP
//! connections, some of which get a synthetic wait.
//!
//! The generated waits are random. They do not measure anything.

use crate::collectors::{procs, sockets};
use crate::config::Config;
use crate::error::Result;
use crate::log_trace;
use crate::types::{ContentionRecord, Sample, Sampler};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;

const COMPONENT: &str = "sampler";

/// Mixed into the configured seed so the sampler and the fault injector
/// never share a random stream.
const SAMPLER_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Shared-memory lock resource name.
pub const SHM_LOCK: &str = "Lock-A (SHM_Buffer)";

/// Message queue resource name.
pub const MSG_QUEUE: &str = "MsgQueue-System-Log";

/// One randomly present resource.
#[derive(Debug, Clone)]
struct Draw {
    probability: f64,
    wait: RangeInclusive<u32>,
}

impl Draw {
    const SOCKET: Self = Self { probability: 0.2, wait: 40..=90 };
    const SHM: Self = Self { probability: 0.9, wait: 30..=80 };
    const PIPE: Self = Self { probability: 0.7, wait: 10..=50 };
    const QUEUE: Self = Self { probability: 0.5, wait: 5..=20 };

    fn roll(&self, rng: &mut StdRng) -> Option<f64> {
        rng.gen_bool(self.probability)
            .then(|| f64::from(rng.gen_range(self.wait.clone())))
    }
}

/// Randomised sampler for demos.
#[derive(Debug)]
pub struct SyntheticSampler {
    rng: StdRng,
    live_sockets: bool,
    reader_pid: u32,
}

impl SyntheticSampler {
    /// Creates a sampler. With `seed` set, the IPC part of every sample is
    /// reproducible.
    ///
    /// Resolves the pipe reader PID once, by process name.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            live_sockets: false,
            reader_pid: procs::find_pid_by_markers(procs::DEFAULT_MARKERS),
        }
    }

    /// Creates a sampler from the `rng_seed` and `sampler` sections.
    ///
    /// The seed is salted first; the injector draws from the unsalted one.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let seed = config.rng_seed.map(|seed| seed ^ SAMPLER_SEED_SALT);
        Self::new(seed).with_live_sockets(config.sampler.live_sockets)
    }

    /// Includes established TCP connections in each sample.
    #[must_use]
    pub fn with_live_sockets(mut self, enabled: bool) -> Self {
        self.live_sockets = enabled;
        self
    }

    /// Overrides the pipe reader PID; the writer is `reader + 1`.
    #[must_use]
    pub fn with_reader_pid(mut self, pid: u32) -> Self {
        self.reader_pid = pid;
        self
    }

    /// Pipe resource name for the configured PID pair.
    #[must_use]
    pub fn pipe_name(&self) -> String {
        format!(
            "Pipe_Buffer (PID {} -> PID {})",
            self.reader_pid,
            self.reader_pid.saturating_add(1)
        )
    }

    fn add_sockets(&mut self, sample: &mut Sample) -> Result<()> {
        for conn in sockets::established_connections()? {
            if let Some(wait) = Draw::SOCKET.roll(&mut self.rng) {
                sample.insert(conn.resource_name(), ContentionRecord::new(wait));
            }
        }
        Ok(())
    }
}

impl Sampler for SyntheticSampler {
    fn id(&self) -> &'static str {
        "synthetic"
    }

    fn display_name(&self) -> &'static str {
        if self.live_sockets {
            "Synthetic IPC + live sockets"
        } else {
            "Synthetic IPC"
        }
    }

    fn sample(&mut self) -> Result<Sample> {
        let throughput = self.rng.gen_range(5.0..15.0);
        let mut sample = Sample::new(throughput);

        if self.live_sockets {
            self.add_sockets(&mut sample)?;
        }

        if let Some(wait) = Draw::SHM.roll(&mut self.rng) {
            sample.insert(SHM_LOCK, ContentionRecord::new(wait));
        }
        if let Some(wait) = Draw::PIPE.roll(&mut self.rng) {
            let record = ContentionRecord::new(wait).with_owner(self.reader_pid);
            sample.insert(self.pipe_name(), record);
        }
        if let Some(wait) = Draw::QUEUE.roll(&mut self.rng) {
            sample.insert(MSG_QUEUE, ContentionRecord::new(wait));
        }

        log_trace!(COMPONENT, "{} entries, throughput {:.2}", sample.len(), throughput);
        Ok(sample)
    }
}
