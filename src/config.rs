use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use crate::float::*;

/// Integrator selected for a render pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegratorMode {
    PathTracing,
    LightTracing,
    /// Stochastic connection bidirectional path tracing
    Sbdpt,
    /// Multiplexed Metropolis light transport
    Mmlt,
}

#[derive(Debug)]
pub enum ConfigError {
    /// More than one of the integrator switches is enabled
    ConflictingIntegrators,
    /// MMLT was requested but its buffers were not allocated at init
    MltNotPreallocated,
    UnknownState(String),
    UnknownDevice(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::ConflictingIntegrators => {
                write!(f, "path tracing, light tracing and ibpt are mutually exclusive")
            }
            ConfigError::MltNotPreallocated => {
                write!(f, "mmlt must be enabled when the renderer is created (enable_mlt)")
            }
            ConfigError::UnknownState(name) => write!(f, "unknown scene state '{}'", name),
            ConfigError::UnknownDevice(id) => write!(f, "no compute device with id {}", id),
        }
    }
}

impl Error for ConfigError {}

#[derive(Clone, Debug)]
pub struct RenderConfig {
    /// Width of the render target in pixels
    pub width: u32,
    /// Height of the render target in pixels
    pub height: u32,
    /// Maximum number of threads to use for rendering
    pub max_threads: usize,
    /// Render with plain path tracing
    pub path_tracing_enabled: bool,
    /// Render with light tracing
    pub light_tracing_enabled: bool,
    /// Render with stochastic connection bidirectional path tracing
    pub ibpt_enabled: bool,
    /// Pre-allocate the MMLT chains so the mode can be selected later
    pub enable_mlt: bool,
    /// Maximum number of path vertices on either sub-path side
    pub max_depth: usize,
    /// Number of bounces before russian roulette starts
    pub pre_rr_depth: usize,
    /// Survival probability of russian roulette. None disables it.
    pub russian_roulette: Option<Float>,
    /// Allow caustic paths to contribute through specular chains
    pub caustics: bool,
    /// Total sample budget per pixel. None renders until stopped.
    pub max_samples: Option<usize>,
    /// Samples that actually contributed, for budgeting against discards
    pub max_samples_contrib: Option<usize>,
    /// Seconds between periodic saves. Zero disables them.
    pub save_interval: Float,
    /// Seed for all sample streams
    pub seed: u64,
    /// Mirror the frame buffer on host memory
    pub cpu_fb: bool,
    /// Allocate the secondary frame buffer
    pub alloc_image_b: bool,
    /// Compute the G-buffer once before starting the path integrator
    pub eval_gbuffer: bool,
    /// Headless, ignore interactive commands
    pub box_mode: bool,
    pub no_window: bool,
    pub device_id: usize,
    pub out: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    /// Name of the shared memory buffer for external compositing.
    /// Binding it is the shell's concern; set here it forces cpu_fb.
    pub shared_image: Option<String>,
    pub input_lib: Option<PathBuf>,
    pub state_file: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        // Desired expectation value of russian roulette bounces
        let eb = 2.0;
        // The matching survival probability from negative binomial distribution
        let surv_prob = eb / (eb + 1.0);

        RenderConfig {
            width: 1000,
            height: 800,
            max_threads: num_cpus::get_physical(),
            path_tracing_enabled: true,
            light_tracing_enabled: false,
            ibpt_enabled: false,
            enable_mlt: false,
            max_depth: 6,
            pre_rr_depth: 3,
            russian_roulette: Some(surv_prob),
            caustics: true,
            max_samples: None,
            max_samples_contrib: None,
            save_interval: 0.0,
            seed: 0,
            cpu_fb: false,
            alloc_image_b: false,
            eval_gbuffer: false,
            box_mode: false,
            no_window: false,
            device_id: 0,
            out: None,
            log_dir: None,
            shared_image: None,
            input_lib: None,
            state_file: None,
        }
    }
}

impl RenderConfig {
    /// Validate the configuration and resolve the implied switches
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let modes = [
            self.path_tracing_enabled,
            self.light_tracing_enabled,
            self.ibpt_enabled,
        ];
        if modes.iter().filter(|&&on| on).count() > 1 {
            return Err(ConfigError::ConflictingIntegrators);
        }
        // The host needs its own copy of the frame for periodic saves
        // and for an external compositor
        if self.save_interval > 0.0 || self.shared_image.is_some() {
            self.cpu_fb = true;
        }
        if self.device_id != 0 {
            return Err(ConfigError::UnknownDevice(self.device_id));
        }
        Ok(())
    }

    /// Integrator selected by the mode switches
    pub fn mode(&self) -> IntegratorMode {
        if self.light_tracing_enabled {
            IntegratorMode::LightTracing
        } else if self.ibpt_enabled {
            IntegratorMode::Sbdpt
        } else {
            IntegratorMode::PathTracing
        }
    }

    pub fn benchmark() -> Self {
        RenderConfig {
            width: 600,
            height: 400,
            max_samples: Some(4),
            ..Default::default()
        }
    }
}
