//! Skinned Viewer - Main Entry Point
//!
//! Opens a window, animates the demo arm and drives the frame loop.
//! An optional first argument names the TOML configuration file.

mod demo;

use std::sync::Arc;

use anyhow::Result;
use glam::Vec3;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use engine_animation::SkinnedModel;
use engine_core::{EngineConfig, PerformanceCounter, Timer};
use engine_platform::{InputState, KeyCode, Window};
use engine_renderer::{
    FrameUniforms, GlobalUbo, JointUbo, PointLightSystem, Renderer, SkinnedMesh, SkinnedMeshSystem,
};
use engine_rhi::device::{Device, DeviceSettings};
use engine_scene::{ObjectRegistry, PlayerController};

const DEFAULT_CONFIG_PATH: &str = "skinned-viewer.toml";

/// Seconds between frame-rate log lines.
const STATS_INTERVAL: f32 = 2.0;

/// Everything that exists once the window is up.
///
/// Fields drop in declaration order: GPU objects first, then the device,
/// and the window last because the surface refers to it.
struct Viewer {
    mesh_system: SkinnedMeshSystem,
    light_system: Option<PointLightSystem>,
    uniforms: FrameUniforms,
    renderer: Renderer,
    device: Arc<Device>,
    model: SkinnedModel,
    registry: ObjectRegistry,
    controller: PlayerController,
    window: Window,
}

impl Viewer {
    fn new(event_loop: &ActiveEventLoop, config: &EngineConfig) -> Result<Self> {
        let mut window = Window::new(event_loop, &config.window)?;

        let settings = DeviceSettings {
            application_name: config.graphics.application_name.clone(),
            enable_validation: config.graphics.enable_validation,
        };
        let device = Device::new(&settings, &window)?;
        let renderer = Renderer::new(Arc::clone(&device), &mut window, config.graphics.clear_color)?;
        let uniforms = FrameUniforms::new(Arc::clone(&device))?;

        let shader_dir = &config.graphics.shader_dir;
        let mesh_system = SkinnedMeshSystem::new(
            Arc::clone(&device),
            renderer.render_pass(),
            uniforms.layout(),
            shader_dir,
        )?;
        let light_system = if config.graphics.draw_point_lights {
            Some(PointLightSystem::new(
                Arc::clone(&device),
                renderer.render_pass(),
                uniforms.layout(),
                shader_dir,
            )?)
        } else {
            None
        };

        let model = demo::build_arm()?;
        let mesh = SkinnedMesh::upload(Arc::clone(&device), model.name(), &demo::arm_vertices())?;
        let registry = demo::build_scene(Arc::new(mesh));

        let mut controller = PlayerController::new();
        controller.transform.translation = Vec3::new(0.0, -1.0, -2.5);

        info!(
            "Scene ready: {} objects, {} lights, {} vertices",
            registry.game_objects().count(),
            registry.point_lights().count(),
            registry.vertex_count()
        );

        Ok(Self {
            mesh_system,
            light_system,
            uniforms,
            renderer,
            device,
            model,
            registry,
            controller,
            window,
        })
    }

    fn draw(&mut self, dt: f32, input: &InputState, config: &EngineConfig) -> Result<()> {
        self.model.advance(dt)?;

        let [x, y, z] = input.movement_axes();
        self.controller
            .move_player(Vec3::new(x, y, z), dt, &config.controller);
        let (dx, dy) = input.mouse_delta();
        self.controller.rotate_camera(dx, dy, &config.controller);

        let aspect = self.renderer.aspect_ratio();
        self.controller
            .camera_mut()
            .set_perspective_projection(aspect, 50f32.to_radians(), 0.1, 100.0);

        let Some(cmd) = self.renderer.begin_frame(&mut self.window)? else {
            return Ok(());
        };

        let mut global = GlobalUbo::default();
        global.set_camera(self.controller.camera());
        global.update_lights(self.registry.point_lights().map(|(_, light)| light));
        let joints = JointUbo::from_skeleton(self.model.skeleton());
        let frame_index = self.renderer.frame_index();
        self.uniforms.write(frame_index, &global, &joints)?;
        let descriptor_set = self.uniforms.descriptor_set(frame_index);

        self.renderer.begin_swap_chain_render_pass(cmd);
        self.mesh_system.render(cmd, descriptor_set, &self.registry);
        if let Some(light_system) = &self.light_system {
            light_system.render(cmd, descriptor_set, &self.registry);
        }
        self.renderer.end_swap_chain_render_pass(cmd);
        self.renderer.end_frame(&mut self.window)?;

        Ok(())
    }
}

struct App {
    config: EngineConfig,
    viewer: Option<Viewer>,
    input: InputState,
    timer: Timer,
    performance: PerformanceCounter,
    since_stats: f32,
}

impl App {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            viewer: None,
            input: InputState::new(),
            timer: Timer::new(),
            performance: PerformanceCounter::new(),
            since_stats: 0.0,
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let dt = self.timer.tick().seconds();
        self.performance.run(dt);

        self.since_stats += dt;
        if self.since_stats >= STATS_INTERVAL {
            info!("{:.1} fps", self.performance.fps());
            self.since_stats = 0.0;
        }

        let result = match self.viewer.as_mut() {
            Some(viewer) if !viewer.window.is_minimized() => {
                viewer.draw(dt, &self.input, &self.config)
            }
            _ => Ok(()),
        };
        self.input.end_frame();

        if let Err(e) = result {
            error!("Frame failed: {:?}", e);
            self.shutdown(event_loop);
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(viewer) = self.viewer.as_ref()
            && let Err(e) = viewer.device.wait_idle()
        {
            error!("Failed to wait for device idle: {:?}", e);
        }
        self.performance.stop();
        self.viewer = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }

        match Viewer::new(event_loop, &self.config) {
            Ok(viewer) => {
                info!("Initialization complete, entering main loop");
                self.viewer = Some(viewer);
                self.timer.reset();
                self.performance.start();
            }
            Err(e) => {
                error!("Failed to initialize viewer: {:?}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.shutdown(event_loop);
            }
            WindowEvent::Resized(size) => {
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.window.on_resized(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::KeyboardInput { event, .. } => {
                self.input.on_key_event(&event);
                if self.input.is_key_just_pressed(KeyCode::Escape) {
                    self.shutdown(event_loop);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.input.on_mouse_button(button, state);
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.input.on_mouse_motion(dx, dy);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(viewer) = self.viewer.as_ref() {
            viewer.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = EngineConfig::load_or_default(&config_path)?;

    engine_core::init_logging(&config.logging.filter);
    info!("Starting Skinned Viewer with config '{}'", config_path);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
