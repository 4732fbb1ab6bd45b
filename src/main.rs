use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use clap::{Parser, ValueEnum};
use log::{error, info, LevelFilter};
use prettytable::{cell, row, Table};

use lumen::camera::Camera;
use lumen::config::{IntegratorMode, RenderConfig};
use lumen::denoise;
use lumen::gbuffer;
use lumen::renderer::Renderer;
use lumen::scene::{self, Scene};
use lumen::stats;
use lumen::Float;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Integrator {
    Pt,
    Lt,
    Ibpt,
    Mmlt,
}

#[derive(Parser)]
#[command(name = "lumen", about = "Unbiased physically based renderer")]
struct Cli {
    /// Run headless without the interactive shell
    #[clap(long)]
    nowindow: bool,

    /// Mirror the frame buffer on host memory
    #[clap(long = "cpu_fb")]
    cpu_fb: bool,

    /// Pre-allocate the Metropolis buffers at startup
    #[clap(long = "enable_mlt")]
    enable_mlt: bool,

    /// List the compute devices and exit
    #[clap(long = "list_devices")]
    list_devices: bool,

    /// Allocate the secondary frame buffer
    #[clap(long = "alloc_image_b")]
    alloc_image_b: bool,

    /// Evaluate the G-buffer before rendering starts
    #[clap(long)]
    evalgbuffer: bool,

    /// Headless render that ignores interactive commands
    #[clap(long)]
    boxmode: bool,

    /// Integrator to render with
    #[clap(long, value_enum, default_value = "pt")]
    integrator: Integrator,

    #[clap(long, default_value_t = 0)]
    seed: u64,

    #[clap(long = "cl_device_id", default_value_t = 0)]
    cl_device_id: usize,

    /// Seconds between periodic saves, zero disables them
    #[clap(long, default_value_t = 0.0)]
    saveinterval: f64,

    #[clap(long, default_value_t = 1000)]
    width: u32,

    #[clap(long, default_value_t = 800)]
    height: u32,

    #[clap(long)]
    maxsamples: Option<usize>,

    #[clap(long)]
    contribsamples: Option<usize>,

    /// Scene library path
    #[clap(long)]
    inputlib: Option<PathBuf>,

    /// Named state snapshot under the library
    #[clap(long)]
    statefile: Option<String>,

    /// Output image path
    #[clap(long)]
    out: Option<PathBuf>,

    #[clap(long)]
    logdir: Option<PathBuf>,

    /// Shared memory buffer name for external compositing
    #[clap(long)]
    sharedimage: Option<String>,
}

fn list_devices(config: &RenderConfig) {
    let mut table = Table::new();
    table.add_row(row!["id", "type", "name", "units"]);
    table.add_row(row![
        0,
        "cpu",
        format!("host cpu ({} cores)", num_cpus::get_physical()),
        config.max_threads
    ]);
    table.printstd();
}

fn state_name(cli: &Cli) -> String {
    if let Some(state) = &cli.statefile {
        return state.clone();
    }
    if let Some(lib) = &cli.inputlib {
        if let Some(name) = lib.file_name().and_then(|n| n.to_str()) {
            return name.to_string();
        }
    }
    "test_42".to_string()
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = RenderConfig {
        width: cli.width,
        height: cli.height,
        path_tracing_enabled: cli.integrator == Integrator::Pt,
        light_tracing_enabled: cli.integrator == Integrator::Lt,
        ibpt_enabled: cli.integrator == Integrator::Ibpt,
        enable_mlt: cli.enable_mlt,
        max_samples: cli.maxsamples,
        max_samples_contrib: cli.contribsamples,
        save_interval: cli.saveinterval as Float,
        seed: cli.seed,
        cpu_fb: cli.cpu_fb,
        alloc_image_b: cli.alloc_image_b,
        eval_gbuffer: cli.evalgbuffer,
        box_mode: cli.boxmode,
        no_window: cli.nowindow || cli.list_devices || cli.boxmode,
        device_id: cli.cl_device_id,
        out: cli.out.clone(),
        log_dir: cli.logdir.clone(),
        shared_image: cli.sharedimage.clone(),
        input_lib: cli.inputlib.clone(),
        state_file: cli.statefile.clone(),
        ..Default::default()
    };
    config.validate()?;

    if cli.list_devices {
        list_devices(&config);
        return Ok(());
    }
    if let Some(name) = &config.shared_image {
        info!("shared image '{}' requested, binding is left to the host shell", name);
    }

    let name = state_name(&cli);
    let scene: Arc<Scene> = Arc::new(scene::from_state(&name)?);
    let camera: Camera = scene::camera_for_state(&name, config.width, config.height)?;
    stats::new_scene(&name);
    info!("rendering state '{}' at {}x{}", name, config.width, config.height);

    // G-buffer pass before the path integrator starts
    let gbuff = if config.eval_gbuffer {
        let gbuffer_start = Instant::now();
        let gbuff = gbuffer::calc_gbuffer(&scene, &camera, config.max_threads);
        stats::record_gbuffer(gbuffer_start.elapsed());
        if let Some(dir) = &config.log_dir {
            gbuffer::save_debug_layers(&gbuff, config.width, config.height, &dir.join("gbuffer"))?;
        }
        Some(gbuff)
    } else {
        None
    };

    let eval_gbuffer = config.eval_gbuffer;
    let mut renderer = Renderer::new(config.clone())?;
    if cli.integrator == Integrator::Mmlt {
        renderer.set_mode(IntegratorMode::Mmlt)?;
    }
    renderer.offline_render(&scene, &camera)?;
    renderer.save_image()?;

    // Denoiser hint channel from the finished frame and the G-buffer
    if let (Some(gbuff), true) = (&gbuff, eval_gbuffer) {
        let data = renderer.result_frame().develop();
        let noise = denoise::denoise_hints(
            &data,
            gbuff,
            config.width,
            config.height,
            camera.fov().0,
        );
        let hint_path = config
            .out
            .clone()
            .unwrap_or_else(|| PathBuf::from("out.png"))
            .with_extension("noise.hdr");
        denoise::save_noise_hdr(&noise, config.width, config.height, &hint_path)?;
        info!("noise hints saved to {}", hint_path.display());
    }

    match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let stats_path = dir.join(Local::now().format("render_%F_%H%M%S.txt").to_string());
            stats::print_and_save(&stats_path);
        }
        None => stats::print(),
    }
    Ok(())
}

fn main() {
    env_logger::Builder::new()
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        error!("{}", err);
        eprintln!("run 'lumen --help' for the recognized options");
        process::exit(1);
    }
}
