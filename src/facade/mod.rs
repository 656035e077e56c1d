mod mesh;
mod scene;
mod state;
mod vertex;

use anyhow::{bail, Context as _};
use winit::{
    dpi::PhysicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder
};

use crate::config::{Backend, Config};
use crate::gfx::{DummyContext, GraphicsError, ShaderSources, Viewport};

use self::mesh::Mesh;
use self::scene::Scene;

pub(crate) async fn run(config: Config) -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.log_filter)
    ).init();

    log::info!("drawing the {} demo with the {} backend", config.demo, config.backend);

    let sources = ShaderSources::load(&config.shaders.vertex, &config.shaders.fragment)?;

    let mesh = Mesh::for_demo(config.demo, &config.boxes);
    let viewport = Viewport::new(config.window.width, config.window.height);
    let scene = Scene::new(mesh, config.clear_color(), viewport);

    match config.backend {
        Backend::Dummy => run_headless(scene, &sources, config.max_frames.unwrap_or(1)),
        Backend::Wgpu => run_windowed(scene, &sources, &config).await,
    }
}

/// Runs the whole lifecycle against the dummy context and checks that
/// nothing was leaked.
fn run_headless(mut scene: Scene, sources: &ShaderSources, frames: u64) -> anyhow::Result<()> {
    let mut ctx = DummyContext::new();

    scene.load(&mut ctx, sources)?;

    let Viewport { width, height } = scene.viewport();
    scene.resize(&mut ctx, width, height);

    let rendered = (0..frames).try_for_each(|_| scene.render(&mut ctx).map(drop));
    scene.unload(&mut ctx);
    rendered?;

    if ctx.live_resources() != 0 {
        bail!("{} resources were not released", ctx.live_resources());
    }

    log::info!(
        "headless run finished in stage {:?}: {} frames, {} resources created and released",
        scene.stage(),
        ctx.frames(),
        ctx.created_resources()
    );

    Ok(())
}

async fn run_windowed(mut scene: Scene, sources: &ShaderSources, config: &Config) -> anyhow::Result<()> {
    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title(format!("{} - {}", config.window.title, config.demo))
        .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
        .with_resizable(config.window.resizable)
        .with_visible(false)
        .build(&event_loop)
        .context("failed to create window")?;

    let mut state = state::State::new(&window).await?;

    // Window stays hidden until there is something to draw
    scene.load(&mut state, sources)?;
    window.set_visible(true);

    let max_frames = config.max_frames;
    let mut frames = 0u64;

    event_loop.run(move |event, _, control_flow| {
        match event {
            Event::RedrawRequested(window_id) if window_id == window.id() => {
                match scene.render(&mut state) {
                    Ok(true) => frames += 1,
                    Ok(false) => log::trace!("window is minimized, frame not presented"),
                    Err(GraphicsError::SurfaceLost) => state.reconfigure(),
                    Err(GraphicsError::Timeout) => log::warn!("frame timed out, skipping"),
                    Err(e) => {
                        log::error!("render failed: {}", e);
                        *control_flow = ControlFlow::Exit;
                    }
                }

                if max_frames.map_or(false, |max| frames >= max) {
                    *control_flow = ControlFlow::Exit;
                }
            },
            Event::MainEventsCleared => {
                window.request_redraw();
            },
            Event::WindowEvent {
                ref event,
                window_id,
            } if window_id == window.id() => match event {
                WindowEvent::CloseRequested | WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(VirtualKeyCode::Escape),
                            ..
                        },
                    ..
                } => *control_flow = ControlFlow::Exit,

                WindowEvent::Resized(physical_size) => {
                    scene.resize(&mut state, physical_size.width, physical_size.height)
                },

                WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                    scene.resize(&mut state, new_inner_size.width, new_inner_size.height)
                },
                _ => {}
            },
            Event::LoopDestroyed => {
                scene.unload(&mut state);
                log::info!("exiting after {} frames", frames);
            },
            _ => {}
        }
    });
}
