//! Render driver: owns the frame buffers, schedules image blocks over
//! worker threads and accumulates their results.

mod coordinator;
mod frame;
mod tracers;

pub use self::coordinator::{Rect, RenderCoordinator};
pub use self::frame::Frame;
pub use self::tracers::{light_trace, path_trace, sample_sbdpt, MmltSampler, SbdptSample};

use std::collections::hash_map::DefaultHasher;
use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::camera::Camera;
use crate::color::Color;
use crate::config::{ConfigError, IntegratorMode, RenderConfig};
use crate::float::*;
use crate::path::VertexCache;
use crate::sample::{RandomStream, SampleStream};
use crate::scene::Scene;
use crate::stats;

/// Bootstrap evaluations per Metropolis worker
const MMLT_BOOTSTRAP: usize = 4096;
/// Default mutations per pixel when no sample budget is configured
const MMLT_DEFAULT_MUTATIONS: usize = 16;

#[derive(Debug)]
pub enum RenderError {
    Io(std::io::Error),
    Image(image::ImageError),
    Config(ConfigError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RenderError::Io(err) => write!(f, "io error: {}", err),
            RenderError::Image(err) => write!(f, "image error: {}", err),
            RenderError::Config(err) => write!(f, "configuration error: {}", err),
        }
    }
}

impl Error for RenderError {}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::Io(err)
    }
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        RenderError::Image(err)
    }
}

impl From<ConfigError> for RenderError {
    fn from(err: ConfigError) -> Self {
        RenderError::Config(err)
    }
}

/// Per-block result sent from a worker to the driver
struct BlockResult {
    rect: Rect,
    /// One sample per pixel for the sample accumulating integrators
    samples: Option<Vec<Float>>,
    splats: Vec<(u32, u32, Color)>,
    /// Sub-paths traced for this block, for splat normalization
    paths: usize,
}

fn pixel_seed(seed: u64, x: u32, y: u32, iteration: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    x.hash(&mut hasher);
    y.hash(&mut hasher);
    iteration.hash(&mut hasher);
    hasher.finish()
}

pub struct Renderer {
    config: RenderConfig,
    mode: IntegratorMode,
    frame: Frame,
    frame_b: Option<Frame>,
    /// Per-worker vertex storage, allocated up front when mlt is enabled
    mlt_caches: Option<Vec<VertexCache>>,
    cancel: Arc<AtomicBool>,
}

impl Renderer {
    pub fn new(mut config: RenderConfig) -> Result<Renderer, ConfigError> {
        config.validate()?;
        let frame = Frame::empty(config.width, config.height);
        let frame_b = if config.alloc_image_b {
            Some(Frame::empty(config.width, config.height))
        } else {
            None
        };
        let mlt_caches = if config.enable_mlt {
            Some(
                (0..config.max_threads)
                    .map(|_| VertexCache::new(1, config.max_depth.max(1)))
                    .collect(),
            )
        } else {
            None
        };
        let mode = config.mode();
        Ok(Renderer {
            config,
            mode,
            frame,
            frame_b,
            mlt_caches,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Switch the integrator between renders.
    /// Metropolis needs its chain storage allocated at creation time.
    pub fn set_mode(&mut self, mode: IntegratorMode) -> Result<(), ConfigError> {
        if mode == IntegratorMode::Mmlt && self.mlt_caches.is_none() {
            return Err(ConfigError::MltNotPreallocated);
        }
        self.mode = mode;
        Ok(())
    }

    pub fn mode(&self) -> IntegratorMode {
        self.mode
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// The frame holding the finished image
    pub fn result_frame(&self) -> &Frame {
        if self.mode == IntegratorMode::Mmlt {
            self.frame_b.as_ref().unwrap_or(&self.frame)
        } else {
            &self.frame
        }
    }

    /// Render the scene to completion or cancellation
    pub fn offline_render(
        &mut self,
        scene: &Arc<Scene>,
        camera: &Camera,
    ) -> Result<(), RenderError> {
        stats::start_render(self.mode);
        let res = match self.mode {
            IntegratorMode::Mmlt => self.render_mmlt(scene, camera),
            _ => self.render_blocks(scene, camera),
        };
        let (samples, splats) = *res.as_ref().unwrap_or(&(0, 0));
        stats::stop_render(samples, splats);
        res.map(|_| ())
    }

    /// Block scheduled rendering for the per-pixel integrators.
    /// Returns the committed sample and splat totals.
    fn render_blocks(
        &mut self,
        scene: &Arc<Scene>,
        camera: &Camera,
    ) -> Result<(usize, usize), RenderError> {
        let coordinator = Arc::new(RenderCoordinator::new(&self.config));
        let (result_tx, result_rx) = mpsc::channel();
        let mut message_txs = Vec::new();
        let mut handles = Vec::new();

        for _ in 0..self.config.max_threads {
            let result_tx = result_tx.clone();
            let (message_tx, message_rx) = mpsc::channel();
            message_txs.push(message_tx);
            let coordinator = coordinator.clone();
            let scene = scene.clone();
            let camera = camera.clone();
            let config = self.config.clone();
            let mode = self.mode;
            let handle = thread::spawn(move || {
                render_worker(&scene, &camera, &config, mode, &coordinator, &message_rx, &result_tx);
            });
            handles.push(handle);
        }
        drop(result_tx);

        let sub_path_count = (self.config.width * self.config.height) as usize;
        let mut total_paths = 0usize;
        let mut total_splats = 0usize;
        let mut last_save = Instant::now();
        loop {
            match result_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(result) => {
                    if let Some(samples) = &result.samples {
                        self.frame.add_block(result.rect, samples);
                    }
                    for (x, y, color) in &result.splats {
                        self.frame.add_splat(*x, *y, *color);
                    }
                    total_splats += result.splats.len();
                    total_paths += result.paths;
                    self.frame
                        .set_splat_norm(total_paths.to_float() / sub_path_count.to_float());
                    // Budget on samples that actually reached the frame
                    if let Some(contrib) = self.config.max_samples_contrib {
                        if total_paths >= contrib * sub_path_count {
                            for tx in &message_txs {
                                let _ = tx.send(());
                            }
                            break;
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if self.cancel.load(Ordering::Relaxed) {
                debug!("render cancelled, discarding in-flight samples");
                for tx in &message_txs {
                    let _ = tx.send(());
                }
                break;
            }
            self.maybe_save(&mut last_save)?;
        }
        for handle in handles {
            handle.join().expect("Render worker panicked");
        }
        Ok((total_paths, total_splats))
    }

    /// Metropolis rendering with one chain per worker.
    /// Returns the committed mutation and splat totals.
    fn render_mmlt(
        &mut self,
        scene: &Arc<Scene>,
        camera: &Camera,
    ) -> Result<(usize, usize), RenderError> {
        let caches = match self.mlt_caches.take() {
            Some(caches) => caches,
            None => return Err(ConfigError::MltNotPreallocated.into()),
        };
        let width = self.config.width;
        let height = self.config.height;
        let pixel_count = (width * height) as usize;
        let mutations_total =
            pixel_count * self.config.max_samples.unwrap_or(MMLT_DEFAULT_MUTATIONS);
        let per_worker = mutations_total / self.config.max_threads.max(1);

        let (result_tx, result_rx) = mpsc::channel::<(Vec<(u32, u32, Color)>, usize)>();
        let (b_tx, b_rx) = mpsc::channel::<(Float, usize)>();
        let mut handles: Vec<JoinHandle<VertexCache>> = Vec::new();
        let cancel = self.cancel.clone();

        for (worker_i, mut cache) in caches.into_iter().enumerate() {
            let result_tx = result_tx.clone();
            let b_tx = b_tx.clone();
            let scene = scene.clone();
            let camera = camera.clone();
            let config = self.config.clone();
            let cancel = cancel.clone();
            let handle = thread::spawn(move || {
                mmlt_worker(
                    &scene, &camera, &config, worker_i, per_worker, &mut cache, &cancel,
                    &result_tx, &b_tx,
                );
                cache
            });
            handles.push(handle);
        }
        drop(result_tx);
        drop(b_tx);

        let mut total_mutations = 0usize;
        let mut total_splats = 0usize;
        let mut last_save = Instant::now();
        loop {
            match result_rx.recv_timeout(Duration::from_millis(100)) {
                Ok((splats, mutations)) => {
                    let frame = self.frame_b.as_mut().unwrap_or(&mut self.frame);
                    total_splats += splats.len();
                    for (x, y, color) in splats {
                        frame.add_splat(x, y, color);
                    }
                    total_mutations += mutations;
                    frame.set_splat_norm(total_mutations.to_float() / pixel_count.to_float());
                }
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.maybe_save(&mut last_save)?;
        }

        // Normalization constant from the bootstrap luminances
        let mut b_sum = 0.0;
        let mut b_count = 0usize;
        for (sum, count) in b_rx.try_iter() {
            b_sum += sum;
            b_count += count;
        }
        let b = if b_count > 0 {
            b_sum / b_count.to_float()
        } else {
            0.0
        };
        info!("mmlt normalization constant b = {:.6}", b);
        let frame = self.frame_b.as_mut().unwrap_or(&mut self.frame);
        frame.set_splat_scale(b);

        let mut caches = Vec::new();
        for handle in handles {
            caches.push(handle.join().expect("Metropolis worker panicked"));
        }
        self.mlt_caches = Some(caches);
        Ok((total_mutations, total_splats))
    }

    fn maybe_save(&mut self, last_save: &mut Instant) -> Result<(), RenderError> {
        if self.config.save_interval > 0.0
            && last_save.elapsed().as_secs_f64().to_float() >= self.config.save_interval
        {
            let path = self.out_path();
            self.result_frame().save_png(&path)?;
            debug!("periodic save to {}", path.display());
            *last_save = Instant::now();
        }
        Ok(())
    }

    fn out_path(&self) -> PathBuf {
        self.config
            .out
            .clone()
            .unwrap_or_else(|| PathBuf::from("out.png"))
    }

    pub fn save_image(&self) -> Result<(), RenderError> {
        let path = self.out_path();
        self.result_frame().save_png(&path)?;
        info!("image saved to {}", path.display());
        Ok(())
    }
}

/// Worker loop for the block scheduled integrators
fn render_worker(
    scene: &Arc<Scene>,
    camera: &Camera,
    config: &RenderConfig,
    mode: IntegratorMode,
    coordinator: &RenderCoordinator,
    message_rx: &Receiver<()>,
    result_tx: &Sender<BlockResult>,
) {
    let sub_path_count = (config.width * config.height).to_float();
    loop {
        match message_rx.try_recv() {
            Err(mpsc::TryRecvError::Empty) => (),
            Ok(_) => return,
            Err(mpsc::TryRecvError::Disconnected) => {
                warn!("workers were not stopped before disconnecting the channel");
                return;
            }
        }
        let (rect, iteration) = match coordinator.next_block() {
            Some(block) => block,
            None => return,
        };
        let mut samples = vec![0.0; 3 * rect.area()];
        let mut splats = Vec::new();
        for h in 0..rect.height {
            for w in 0..rect.width {
                let x = rect.left + w;
                let y = rect.bottom + h;
                let mut stream = RandomStream::new(pixel_seed(config.seed, x, y, iteration));
                let color = match mode {
                    IntegratorMode::PathTracing => {
                        let ray = camera.pixel_ray(x, y, stream.next_2d());
                        path_trace(ray, scene, config, &mut stream)
                    }
                    IntegratorMode::LightTracing => {
                        light_trace(scene, camera, config, sub_path_count, &mut stream, &mut splats);
                        Color::black()
                    }
                    IntegratorMode::Sbdpt => {
                        let sample = sample_sbdpt(
                            x,
                            y,
                            scene,
                            camera,
                            config,
                            sub_path_count,
                            &mut stream,
                            None,
                        );
                        if let Some(splat) = sample.splat {
                            splats.push(splat);
                        }
                        sample.at_pixel
                    }
                    IntegratorMode::Mmlt => unreachable!("mmlt runs on its own scheduler"),
                };
                let i = 3 * (h * rect.width + w) as usize;
                samples[i] = color.r();
                samples[i + 1] = color.g();
                samples[i + 2] = color.b();
            }
        }
        let samples = match mode {
            IntegratorMode::LightTracing => None,
            _ => Some(samples),
        };
        if result_tx
            .send(BlockResult {
                rect,
                samples,
                splats,
                paths: rect.area(),
            })
            .is_err()
        {
            return;
        }
    }
}

/// Bootstrap and run one Metropolis chain
#[allow(clippy::too_many_arguments)]
fn mmlt_worker(
    scene: &Arc<Scene>,
    camera: &Camera,
    config: &RenderConfig,
    worker_i: usize,
    mutations: usize,
    cache: &mut VertexCache,
    cancel: &AtomicBool,
    result_tx: &Sender<(Vec<(u32, u32, Color)>, usize)>,
    b_tx: &Sender<(Float, usize)>,
) {
    let width = config.width;
    let height = config.height;
    let sub_path_count = (width * height).to_float();

    let eval = |stream: &mut dyn SampleStream, cache: &mut VertexCache| -> SbdptSample {
        let (u, v) = stream.next_2d();
        let x = ((u * width.to_float()) as u32).min(width - 1);
        let y = ((v * height.to_float()) as u32).min(height - 1);
        let mut sample = sample_sbdpt(
            x,
            y,
            scene,
            camera,
            config,
            sub_path_count,
            stream,
            Some((cache, 0)),
        );
        // In Metropolis sampling the pixel is part of the state,
        // so pixel contributions become splats as well
        if !sample.at_pixel.is_black() {
            sample.splat = Some((x, y, sample.at_pixel));
            sample.at_pixel = Color::black();
        }
        sample
    };

    // Bootstrap: estimate the luminance mean and pick a start state
    // proportional to luminance
    let mut lums = Vec::with_capacity(MMLT_BOOTSTRAP);
    let mut lum_sum = 0.0;
    for k in 0..MMLT_BOOTSTRAP {
        let seed = pixel_seed(config.seed, worker_i as u32, k as u32, usize::MAX);
        let mut stream = RandomStream::new(seed);
        let lum = eval(&mut stream, cache).luma();
        lums.push((seed, lum));
        lum_sum += lum;
    }
    if b_tx.send((lum_sum, MMLT_BOOTSTRAP)).is_err() {
        return;
    }
    if lum_sum <= 0.0 {
        return;
    }
    let mut pick = RandomStream::new(pixel_seed(config.seed, worker_i as u32, 0, 0)).next_1d()
        * lum_sum;
    let mut start_seed = lums[0].0;
    for (seed, lum) in &lums {
        pick -= lum;
        if pick <= 0.0 {
            start_seed = *seed;
            break;
        }
    }

    // The chain replays the chosen bootstrap sample as its first state
    let mut sampler = MmltSampler::new(start_seed);
    let mut splats = Vec::new();
    let mut since_last = 0usize;
    for m in 0..mutations {
        sampler.step(|stream| eval(stream, cache), &mut splats);
        since_last += 1;
        if splats.len() >= 4096 || m + 1 == mutations {
            let batch = std::mem::take(&mut splats);
            if result_tx.send((batch, since_last)).is_err() {
                return;
            }
            since_last = 0;
        }
        if m % 1024 == 0 && cancel.load(Ordering::Relaxed) {
            return;
        }
    }
}
