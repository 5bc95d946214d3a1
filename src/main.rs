//! Interactive viewer: renders the demo box progressively on a worker
//! thread and shows the running estimate in a window.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};
use winit::dpi::LogicalSize;
use winit::event::{Event, MouseScrollDelta, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::WindowBuilder;

use radiance::camera::Camera;
use radiance::config::{Estimator, RenderConfig, TraceSettings};
use radiance::progressive::ProgressiveRenderer;
use radiance::scene::Scene;

use crate::gpu::{Frame, Gpu, Presenter};

mod gpu;

const LOOK_SENSITIVITY: f32 = 0.005;
const LINE_SENSITIVITY: f32 = 0.05;

#[derive(Parser, Debug)]
#[command(version, about = "Progressive ray and path tracer")]
struct Args {
    /// Light transport estimator
    #[arg(short, long, value_enum, default_value_t = Estimator::RayTrace)]
    estimator: Estimator,

    /// Initial window width
    #[arg(short = 'W', long, default_value_t = 800)]
    width: u32,

    /// Initial window height
    #[arg(short = 'H', long, default_value_t = 600)]
    height: u32,

    /// Pixel samples per progressive pass
    #[arg(long, default_value_t = 50_000)]
    patch_size: usize,

    /// Seed of the sample streams, random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Russian-roulette survival probability of the path tracer
    #[arg(long, default_value_t = 0.9)]
    survival: f32,

    /// Gain applied to light intensity when a path reaches an emitter
    #[arg(long, default_value_t = 8.0)]
    emitter_gain: f32,

    /// Bounces followed by the ray tracer
    #[arg(long, default_value_t = 10)]
    max_depth: u32,
}

impl Args {
    fn into_config(self) -> RenderConfig {
        RenderConfig {
            width: self.width,
            height: self.height,
            patch_size: self.patch_size,
            seed: self.seed.unwrap_or_else(|| fastrand::u64(..)),
            estimator: self.estimator,
            trace: TraceSettings {
                max_depth: self.max_depth,
                survival_probability: self.survival,
                emitter_gain: self.emitter_gain,
                ..TraceSettings::default()
            },
        }
    }
}

/// Every worker spawned so far. A resize starts a new worker while the old
/// one may still be finishing its patch, so shutdown has to wait for all of them.
#[derive(Default)]
struct Workers(Vec<JoinHandle<()>>);

impl Workers {
    fn push(&mut self, worker: JoinHandle<()>) {
        self.0.push(worker);
    }

    /// Joins every worker and returns how many of them panicked.
    fn join_all(&mut self) -> usize {
        self.0.drain(..)
            .map(JoinHandle::join)
            .filter(Result::is_err)
            .count()
    }
}

fn spawn_worker(frame: &Arc<Mutex<Frame>>, camera: Arc<Mutex<Camera>>, scene: Arc<Scene>, config: RenderConfig, shutdown: Arc<AtomicBool>) -> JoinHandle<()> {
    let frame = Arc::downgrade(frame);

    info!(target: "app", "Spawning worker thread");
    spawn(move || {
        let mut last_camera: Option<Camera> = None;
        let mut session: Option<ProgressiveRenderer> = None;
        let mut sweep = 1;
        let mut start = Instant::now();

        while let Some(frame) = frame.upgrade() {
            if shutdown.load(Ordering::Acquire) {
                break;
            }

            let camera = camera.lock().expect("camera lock").clone();
            if last_camera.as_ref() != Some(&camera) {
                let (width, height) = {
                    let frame = frame.lock().expect("frame lock");
                    (frame.width(), frame.height())
                };
                let viewport = camera.viewport(width, height);
                let renderer = ProgressiveRenderer::new(&scene, viewport, config.estimator, config.trace.clone(), config.patch_size, config.seed);
                sweep = (renderer.width() * renderer.height()).div_ceil(renderer.patch_size()) as u64;
                info!(target: "app", "Starting accumulation at {}x{}, {} passes per sample", width, height, sweep);

                session = Some(renderer);
                last_camera = Some(camera);
                start = Instant::now();
            }
            let Some(renderer) = session.as_mut() else {
                break;
            };

            renderer.render_patch();
            {
                let mut frame = frame.lock().expect("frame submission lock");
                let mut picture = frame.picture_mut();
                renderer.resolve(picture.buffer_mut());
            }

            if renderer.passes() % sweep == 0 {
                info!(target: "app", "{} samples per pixel after {:?}", renderer.passes() / sweep, start.elapsed());
            }
        }
        info!(target: "app", "Worker lost frame, stopping");
    })
}

fn main() -> Result<()> {
    env_logger::builder().target(env_logger::Target::Stdout).init();

    let config = Args::parse().into_config();
    config.validate().context("invalid render configuration")?;
    let scene = Arc::new(Scene::cornell_box().context("building the demo scene")?);
    info!(target: "app", "Rendering with {:?}, seed {}", config.estimator, config.seed);
    debug!(target: "app", "{:?}", config);

    let event_loop = EventLoop::new();

    let window = WindowBuilder::new()
        .with_title("radiance")
        .with_inner_size(LogicalSize::new(config.width, config.height))
        .build(&event_loop)
        .context("creating the window")?;

    let mut presenter = smol::block_on(async {
        let gpu = Gpu::new().await;
        let surface = gpu.surface(&window);
        let size = window.inner_size();
        Presenter::new(gpu, surface, (size.width, size.height))
    });

    let camera = Arc::new(Mutex::new(Camera::cornell_box()));
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut workers = Workers::default();
    workers.push(spawn_worker(&presenter.frame(), camera.clone(), scene.clone(), config.clone(), shutdown.clone()));

    event_loop.run(move |event, _, control_flow| {
        control_flow.set_poll();

        match event {
            Event::RedrawRequested(window_id) if window.id() == window_id => {
                presenter.present();
            }
            Event::RedrawEventsCleared => {
                window.request_redraw();
            }
            Event::WindowEvent { event, window_id } if window.id() == window_id => match event {
                WindowEvent::Resized(size) => {
                    // the previous worker stops once its frame is dropped
                    if presenter.resize((size.width, size.height)) {
                        workers.push(spawn_worker(&presenter.frame(), camera.clone(), scene.clone(), config.clone(), shutdown.clone()));
                    }
                }
                WindowEvent::CloseRequested => control_flow.set_exit(),
                WindowEvent::MouseWheel { delta, .. } => {
                    let (dx, dy) = match delta {
                        MouseScrollDelta::PixelDelta(position) => (position.x as f32 * LOOK_SENSITIVITY, position.y as f32 * LOOK_SENSITIVITY),
                        MouseScrollDelta::LineDelta(x, y) => (x * LINE_SENSITIVITY, y * LINE_SENSITIVITY),
                    };
                    let mut camera = camera.lock().expect("camera write lock");
                    camera.yaw += dx;
                    camera.pitch += dy;
                }
                _ => {}
            }
            Event::LoopDestroyed => {
                shutdown.store(true, Ordering::Release);
                let panicked = workers.join_all();
                if panicked > 0 {
                    error!(target: "app", "{} worker(s) panicked", panicked);
                }
                info!(target: "app", "Shut down");
            }
            _ => {}
        }
    })
}
