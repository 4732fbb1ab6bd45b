//! Global registry of render pass statistics.
//!
//! Every `offline_render` records one pass: which state it rendered, with
//! which integrator, how long it ran, how many rays it cast and how many
//! samples and splats actually reached the frame. The table prints one
//! column per pass so consecutive renders of the same session line up.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use prettytable::{cell, Row, Table};

use crate::config::IntegratorMode;
use crate::scene::Ray;

lazy_static::lazy_static! {
    static ref REGISTRY: Mutex<Registry> = Mutex::new(Registry::new());
}

fn float_name() -> &'static str {
    if cfg!(feature = "single_precision") {
        "f32"
    } else {
        "f64"
    }
}

fn mode_name(mode: IntegratorMode) -> &'static str {
    match mode {
        IntegratorMode::PathTracing => "pt",
        IntegratorMode::LightTracing => "lt",
        IntegratorMode::Sbdpt => "sbdpt",
        IntegratorMode::Mmlt => "mmlt",
    }
}

/// Bookkeeping for one render pass
struct PassStats {
    state: String,
    integrator: &'static str,
    start: Instant,
    duration: Option<Duration>,
    /// G-buffer evaluation time when the pass was preceded by one
    gbuffer: Option<Duration>,
    rays: usize,
    /// Pixel samples (or Metropolis mutations) committed to the frame
    samples: usize,
    /// Light tracing contributions splatted outside their own pixel
    splats: usize,
}

impl PassStats {
    fn render_time(&self) -> Duration {
        self.duration.unwrap_or_else(|| self.start.elapsed())
    }

    fn mrays_per_sec(&self) -> f64 {
        let secs = self.render_time().as_secs_f64();
        if secs > 0.0 {
            self.rays as f64 / secs / 1_000_000.0
        } else {
            0.0
        }
    }
}

struct Registry {
    state: String,
    /// G-buffer time waiting to be attached to the next pass
    pending_gbuffer: Option<Duration>,
    passes: Vec<PassStats>,
}

impl Registry {
    fn new() -> Registry {
        Registry {
            state: "default".to_string(),
            pending_gbuffer: None,
            passes: Vec::new(),
        }
    }

    fn table(&self) -> Table {
        let mut table = Table::new();
        if self.passes.is_empty() {
            table.add_row(Row::new(vec![cell!(format!(
                "no render passes ({})",
                float_name()
            ))]));
            return table;
        }
        let mut states = vec![cell!(format!("state ({})", float_name()))];
        let mut integrators = vec![cell!("integrator")];
        let mut render_times = vec![cell!("render")];
        let mut gbuffer_times = vec![cell!("gbuffer")];
        let mut mrps = vec![cell!("Mrays/s")];
        let mut rays = vec![cell!("rays")];
        let mut samples = vec![cell!("samples")];
        let mut splats = vec![cell!("splats")];
        for pass in &self.passes {
            states.push(cell!(pass.state));
            integrators.push(cell!(pass.integrator));
            render_times.push(cell!(format!("{:#.2?}", pass.render_time())));
            gbuffer_times.push(match pass.gbuffer {
                Some(duration) => cell!(format!("{:#.2?}", duration)),
                None => cell!("-"),
            });
            mrps.push(cell!(format!("{:.2}", pass.mrays_per_sec())));
            rays.push(cell!(pass.rays));
            samples.push(cell!(pass.samples));
            splats.push(cell!(pass.splats));
        }
        let rows = [
            states,
            integrators,
            render_times,
            gbuffer_times,
            mrps,
            rays,
            samples,
            splats,
        ];
        for row in rows {
            table.add_row(Row::new(row));
        }
        table
    }
}

/// Record the scene state the next passes render
pub fn new_scene(name: &str) {
    REGISTRY.lock().unwrap().state = name.to_string();
}

/// Attach a G-buffer evaluation time to the upcoming render pass
pub fn record_gbuffer(duration: Duration) {
    REGISTRY.lock().unwrap().pending_gbuffer = Some(duration);
}

/// Open a render pass for the given integrator
pub fn start_render(mode: IntegratorMode) {
    let mut registry = REGISTRY.lock().unwrap();
    let pass = PassStats {
        state: registry.state.clone(),
        integrator: mode_name(mode),
        start: Instant::now(),
        duration: None,
        gbuffer: registry.pending_gbuffer.take(),
        rays: 0,
        samples: 0,
        splats: 0,
    };
    registry.passes.push(pass);
    Ray::reset_count();
}

/// Close the latest pass with the totals the driver accumulated
pub fn stop_render(samples: usize, splats: usize) {
    let mut registry = REGISTRY.lock().unwrap();
    if let Some(pass) = registry.passes.last_mut() {
        pass.duration = Some(pass.start.elapsed());
        pass.rays = Ray::count();
        pass.samples = samples;
        pass.splats = splats;
    }
}

pub fn print() {
    REGISTRY.lock().unwrap().table().printstd();
}

pub fn print_and_save(path: &Path) {
    let table = REGISTRY.lock().unwrap().table();
    table.printstd();
    let mut stats_file = File::create(path).unwrap();
    table.print(&mut stats_file).unwrap();
}
