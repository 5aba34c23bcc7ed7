/*!
 * Simulation Configuration
 *
 * Runtime configuration for a simulation run. Loaded from JSON, from the
 * environment, or built in code with `with_*` methods.
 *
 * Environment variables:
 * - BAKERY_SIM_CONFIG: JSON file used as the base configuration
 * - BAKERY_SIM_PROCESSES: number of simulated processes
 * - BAKERY_SIM_WORK_MIN_MS / BAKERY_SIM_WORK_MAX_MS: uniform burst range
 * - BAKERY_SIM_QUANTUM_MS: work slice between progress reports
 * - BAKERY_SIM_SEED: seed for the uniform burst range
 * - BAKERY_SIM_DISPATCH: `strict_fifo` or `any_ready`
 * - BAKERY_SIM_DEBUG: per-unit debug logs (`1`/`true`)
 */

use crate::core::errors::{ConfigError, ConfigResult};
use crate::core::limits::{
    DEFAULT_BURSTS_MS, DEFAULT_MAX_PARTICIPANTS, DEFAULT_PROCESS_COUNT, DEFAULT_QUANTUM_MS,
    DEFAULT_WORK_MAX_MS, DEFAULT_WORK_MIN_MS,
};
use crate::core::sync::SpinConfig;
use crate::core::types::Pid;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Which ready record `dispatch` may take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Only the ready-queue head; dispatch order equals admission order
    #[default]
    StrictFifo,
    /// Any record in the ready queue
    AnyReady,
}

impl DispatchPolicy {
    #[inline(always)]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StrictFifo => "strict_fifo",
            Self::AnyReady => "any_ready",
        }
    }
}

impl FromStr for DispatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict_fifo" | "fifo" | "strict" => Ok(Self::StrictFifo),
            "any_ready" | "any" => Ok(Self::AnyReady),
            _ => Err(format!(
                "Invalid dispatch policy '{}'. Valid: strict_fifo, any_ready",
                s
            )),
        }
    }
}

/// How much simulated work each process does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkProfile {
    /// Lower bound of the uniform burst range
    pub min_ms: u64,
    /// Upper bound of the uniform burst range (inclusive)
    pub max_ms: u64,
    /// Work slice between two progress reports
    pub quantum_ms: u64,
    /// Explicit bursts, cycled over the processes; wins over the range
    pub bursts_ms: Vec<u64>,
    /// Seed for the uniform range; unseeded ranges draw from entropy
    pub seed: Option<u64>,
}

impl Default for WorkProfile {
    fn default() -> Self {
        Self {
            min_ms: DEFAULT_WORK_MIN_MS,
            max_ms: DEFAULT_WORK_MAX_MS,
            quantum_ms: DEFAULT_QUANTUM_MS,
            bursts_ms: DEFAULT_BURSTS_MS.to_vec(),
            seed: None,
        }
    }
}

impl WorkProfile {
    /// Explicit per-process bursts
    pub fn fixed(bursts_ms: Vec<u64>) -> Self {
        Self {
            bursts_ms,
            ..Self::default()
        }
    }

    /// Bursts drawn uniformly from `[min_ms, max_ms]`
    pub fn uniform(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms,
            max_ms,
            bursts_ms: Vec::new(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_quantum(mut self, quantum_ms: u64) -> Self {
        self.quantum_ms = quantum_ms;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[inline]
    pub fn quantum(&self) -> Duration {
        Duration::from_millis(self.quantum_ms)
    }

    /// Burst for each of `count` processes, in pid order
    pub fn bursts(&self, count: usize) -> Vec<Duration> {
        if !self.bursts_ms.is_empty() {
            return self
                .bursts_ms
                .iter()
                .cycle()
                .take(count)
                .map(|ms| Duration::from_millis(*ms))
                .collect();
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        (0..count)
            .map(|_| Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms)))
            .collect()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.quantum_ms == 0 {
            return Err(ConfigError::Invalid("quantum_ms must be at least 1".into()));
        }
        if self.bursts_ms.is_empty() && self.min_ms > self.max_ms {
            return Err(ConfigError::Invalid(format!(
                "work range is empty: min_ms {} > max_ms {}",
                self.min_ms, self.max_ms
            )));
        }
        Ok(())
    }
}

/// Simulation run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub process_count: usize,
    pub work: WorkProfile,
    pub dispatch_policy: DispatchPolicy,
    /// Bakery participant slots; snapshot observers use a separate reserve
    pub max_participants: usize,
    pub spin: SpinConfig,
    /// Per-unit debug logs
    pub debug: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            process_count: DEFAULT_PROCESS_COUNT,
            work: WorkProfile::default(),
            dispatch_policy: DispatchPolicy::default(),
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            spin: SpinConfig::default(),
            debug: true,
        }
    }
}

impl SimulationConfig {
    #[must_use]
    pub fn with_process_count(mut self, count: usize) -> Self {
        self.process_count = count;
        self
    }

    #[must_use]
    pub fn with_work(mut self, work: WorkProfile) -> Self {
        self.work = work;
        self
    }

    #[must_use]
    pub fn with_dispatch_policy(mut self, policy: DispatchPolicy) -> Self {
        self.dispatch_policy = policy;
        self
    }

    #[must_use]
    pub fn with_max_participants(mut self, capacity: usize) -> Self {
        self.max_participants = capacity;
        self
    }

    #[must_use]
    pub fn with_spin(mut self, spin: SpinConfig) -> Self {
        self.spin = spin;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        validate_process_count(self.process_count, self.max_participants)?;
        self.work.validate()
    }

    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&json)
    }

    /// Defaults (or `BAKERY_SIM_CONFIG`) overlaid with `BAKERY_SIM_*` variables
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = match std::env::var("BAKERY_SIM_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        if let Some(count) = env_var("BAKERY_SIM_PROCESSES")? {
            config.process_count = count;
        }
        let min = env_var::<u64>("BAKERY_SIM_WORK_MIN_MS")?;
        let max = env_var::<u64>("BAKERY_SIM_WORK_MAX_MS")?;
        if min.is_some() || max.is_some() {
            // A range from the environment replaces explicit bursts
            config.work.bursts_ms.clear();
            config.work.min_ms = min.unwrap_or(config.work.min_ms);
            config.work.max_ms = max.unwrap_or(config.work.max_ms);
        }
        if let Some(quantum) = env_var("BAKERY_SIM_QUANTUM_MS")? {
            config.work.quantum_ms = quantum;
        }
        if let Some(seed) = env_var("BAKERY_SIM_SEED")? {
            config.work.seed = Some(seed);
        }
        if let Some(policy) = env_var("BAKERY_SIM_DISPATCH")? {
            config.dispatch_policy = policy;
        }
        if let Some(debug) = env_flag("BAKERY_SIM_DEBUG") {
            config.debug = debug;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Check a process count against the slot capacity
pub(crate) fn validate_process_count(count: usize, capacity: usize) -> ConfigResult<()> {
    if count == 0 {
        return Err(ConfigError::Invalid("process_count must be at least 1".into()));
    }
    if Pid::try_from(count).is_err() {
        return Err(ConfigError::Invalid(format!(
            "process_count {} exceeds the pid range",
            count
        )));
    }
    if count > capacity {
        return Err(ConfigError::Invalid(format!(
            "process_count {} exceeds {} participant slots",
            count, capacity
        )));
    }
    Ok(())
}

fn env_var<T>(name: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Env {
                var: name.to_string(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}
