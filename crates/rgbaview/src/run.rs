use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use rgbaconfig::RendererSettings;
use texture_rgba::gpu::GpuOptions;
use texture_rgba::{FrameStatus, RendererError, SurfaceHandle, TracingObserver};
use tracing_subscriber::EnvFilter;
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{WindowBuilder, WindowId};

use crate::cli::RunArgs;
use crate::host::WindowSurfaces;
use crate::patterns::FrameProducer;

pub fn initialise_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Settings from `--config` (or defaults) with command-line overrides applied.
pub fn load_settings(args: &RunArgs) -> Result<RendererSettings> {
    let mut settings = match &args.config {
        Some(path) => RendererSettings::from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => RendererSettings::default(),
    };
    if let Some(normalization) = args.normalization {
        settings.pipeline.normalization = normalization;
    }
    if let Some(truncation) = args.truncation {
        settings.pipeline.truncation = truncation;
    }
    if let Some(present_mode) = args.present_mode {
        settings.gpu.present_mode = present_mode;
    }
    Ok(settings)
}

pub fn check_config(path: &Path) -> Result<()> {
    let settings = RendererSettings::from_path(path)
        .with_context(|| format!("invalid settings file {}", path.display()))?;
    print!("{}", settings.to_toml_string());
    Ok(())
}

pub fn platform_version() -> String {
    format!(
        "{} {} ({})",
        std::env::consts::OS,
        std::env::consts::ARCH,
        std::env::consts::FAMILY
    )
}

pub fn info(settings: &RendererSettings) -> Result<()> {
    println!("Platform: {}", platform_version());
    match texture_rgba::gpu::probe_adapter(&GpuOptions::from_settings(settings)) {
        Ok(profile) => println!(
            "Adapter:  {} ({:?}, {:?}, max texture {})",
            profile.name, profile.backend, profile.device_type, profile.max_texture_dimension
        ),
        Err(err) => {
            tracing::warn!(error = %err, "no GPU adapter available");
            println!("Adapter:  unavailable");
        }
    }
    Ok(())
}

struct Stream {
    key: i64,
    surface: SurfaceHandle,
    producer: FrameProducer,
    base: (u32, u32),
    frames: u64,
}

impl Stream {
    /// Full size, or half size on odd resize periods.
    fn target_size(&self, resize_every: Option<u64>) -> (u32, u32) {
        match resize_every {
            Some(every) if every > 0 && (self.frames / every) % 2 == 1 => {
                ((self.base.0 / 2).max(1), (self.base.1 / 2).max(1))
            }
            _ => self.base,
        }
    }
}

pub fn run(args: RunArgs, settings: RendererSettings) -> Result<()> {
    if args.windows == 0 {
        bail!("--windows must be at least 1");
    }

    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let (width, height) = args.size;
    let mut windows = Vec::with_capacity(args.windows as usize);
    for index in 0..args.windows {
        let window = WindowBuilder::new()
            .with_title(format!("rgbaview #{index}"))
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(false)
            .with_visible(false)
            .build(&event_loop)
            .map_err(|err| anyhow!("failed to create window {index}: {err}"))?;
        windows.push(window);
    }

    let host = Arc::new(WindowSurfaces::new(windows));
    let registry =
        texture_rgba::wgpu_registry(Arc::clone(&host), &settings, Arc::new(TracingObserver));

    let mut streams: HashMap<WindowId, Stream> = HashMap::new();
    for index in 0..args.windows {
        let key = i64::from(index);
        let surface = registry
            .create_texture(key)
            .with_context(|| format!("failed to create texture {key}"))?;
        let window_id = host
            .window_id(surface)
            .ok_or_else(|| anyhow!("surface {surface} has no window"))?;
        tracing::info!(key, %surface, width, height, "streaming into window");
        streams.insert(
            window_id,
            Stream {
                key,
                surface,
                producer: FrameProducer::new(args.pattern, width, height, args.stride_padding),
                base: (width, height),
                frames: 0,
            },
        );
    }

    let interval = settings.stream.interval;
    let started = Instant::now();
    let mut next_frame = started;
    let mut failure: Option<anyhow::Error> = None;

    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } => {
            let Some(stream) = streams.get_mut(&window_id) else {
                return;
            };
            match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                WindowEvent::Resized(_) | WindowEvent::Occluded(true) => {
                    registry.notify_surface_lost(stream.key);
                }
                WindowEvent::RedrawRequested => {
                    let (frame_width, frame_height) = stream.target_size(args.resize_every);
                    if (frame_width, frame_height)
                        != (stream.producer.width(), stream.producer.height())
                    {
                        stream.producer.resize(frame_width, frame_height);
                    }
                    let stride = stream.producer.stride();
                    let key = stream.key;
                    let pixels = stream.producer.render(stream.frames);
                    match registry.submit_frame(
                        key,
                        pixels,
                        i64::from(frame_width),
                        i64::from(frame_height),
                        Some(i64::from(stride)),
                    ) {
                        Ok(FrameStatus::Presented) => stream.frames += 1,
                        Ok(FrameStatus::Degraded { truncated_rows }) => {
                            tracing::warn!(key, truncated_rows, "frame degraded");
                            stream.frames += 1;
                        }
                        Err(RendererError::SurfaceUnavailable(reason)) => {
                            tracing::warn!(key, %reason, "surface unavailable; retrying next frame");
                        }
                        Err(err) => {
                            failure = Some(anyhow!(err).context(format!("frame for texture {key} failed")));
                            elwt.exit();
                        }
                    }

                    if let Some(limit) = args.frames {
                        if streams.values().all(|stream| stream.frames >= limit) {
                            elwt.exit();
                        }
                    }
                }
                _ => {}
            }
        }
        Event::AboutToWait => {
            let now = Instant::now();
            if now >= next_frame {
                for stream in streams.values() {
                    host.request_redraw(stream.surface);
                }
                next_frame = now + interval;
            }
            elwt.set_control_flow(ControlFlow::WaitUntil(next_frame));
        }
        Event::LoopExiting => {
            let elapsed = started.elapsed();
            for stream in streams.values() {
                tracing::info!(key = stream.key, frames = stream.frames, ?elapsed, "stream finished");
            }
            registry.shutdown();
        }
        _ => {}
    });

    if let Err(err) = run_result {
        return Err(anyhow!("window event loop error: {err}"));
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::Pattern;

    fn stream(frames: u64) -> Stream {
        Stream {
            key: 0,
            surface: SurfaceHandle::from_raw(1),
            producer: FrameProducer::new(Pattern::Solid, 64, 32, 0),
            base: (64, 32),
            frames,
        }
    }

    #[test]
    fn resize_period_alternates_sizes() {
        assert_eq!(stream(0).target_size(Some(10)), (64, 32));
        assert_eq!(stream(10).target_size(Some(10)), (32, 16));
        assert_eq!(stream(20).target_size(Some(10)), (64, 32));
        assert_eq!(stream(15).target_size(None), (64, 32));
    }

    #[test]
    fn platform_version_names_the_os() {
        assert!(platform_version().starts_with(std::env::consts::OS));
    }
}
