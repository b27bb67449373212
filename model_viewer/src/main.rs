//! Textured model viewer
//!
//! Loads an OBJ model and its texture per the configuration, spins the model
//! in front of a free-look camera, and drives the renderer's frame loop
//! until the window closes. Any fatal error is logged and the process exits
//! with status 1.

use nalgebra::{Matrix4, Vector3};
use thiserror::Error;

use vk_renderer::assets::{load_obj, load_spirv, load_texture, ModelError, ShaderError, TextureError};
use vk_renderer::{
    Camera, ConfigError, Renderer, RendererConfig, RendererError, SceneGraph, UniformBufferObject,
    Window, WindowError,
};

#[derive(Error, Debug)]
enum AppError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("window: {0}")]
    Window(#[from] WindowError),

    #[error("model: {0}")]
    Model(#[from] ModelError),

    #[error("texture: {0}")]
    Texture(#[from] TextureError),

    #[error("shader: {0}")]
    Shader(#[from] ShaderError),

    #[error("renderer: {0}")]
    Renderer(#[from] RendererError),
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        log::error!("fatal: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading configuration from {path}");
            RendererConfig::load(path)?
        }
        None => RendererConfig::default(),
    };

    let mesh = load_obj(&config.model_path)?;
    log::info!(
        "Loaded model '{}': {} vertices, {} indices",
        config.model_path,
        mesh.vertices.len(),
        mesh.indices.len()
    );
    let texture = load_texture(&config.texture_path)?;
    let vert_code = load_spirv(&config.shaders.vertex_shader_path)?;
    let frag_code = load_spirv(&config.shaders.fragment_shader_path)?;

    let mut window = Window::new(
        &config.window.title,
        config.window.width,
        config.window.height,
    )?;
    window.set_cursor_mode(glfw::CursorMode::Disabled);

    let mut renderer = Renderer::new(
        &mut window,
        &config,
        &mesh,
        &texture.pixels,
        texture.width,
        texture.height,
        vert_code,
        frag_code,
    )?;

    let mut scene = SceneGraph::new();
    let model_node = scene.add_node("model", Matrix4::identity(), Some(0), None);

    let mut camera = Camera::default();
    camera.position.z = 2.0;

    let mut last_time = window.time();
    let mut last_cursor = window.get_cursor_pos();

    while !window.should_close() {
        window.poll_events();

        let now = window.time();
        let dt = (now - last_time) as f32;
        last_time = now;

        if window.key_pressed(glfw::Key::Escape) {
            window.set_should_close(true);
        }
        if window.key_pressed(glfw::Key::W) {
            camera.move_forward(dt);
        }
        if window.key_pressed(glfw::Key::S) {
            camera.move_backward(dt);
        }
        if window.key_pressed(glfw::Key::A) {
            camera.move_left(dt);
        }
        if window.key_pressed(glfw::Key::D) {
            camera.move_right(dt);
        }

        let cursor = window.get_cursor_pos();
        camera.apply_mouse(
            (cursor.0 - last_cursor.0) as f32,
            (cursor.1 - last_cursor.1) as f32,
        );
        last_cursor = cursor;

        // Spin the model a quarter turn per second
        if let Some(node) = scene.get_mut(model_node) {
            node.transform =
                Matrix4::from_axis_angle(&Vector3::y_axis(), (now as f32 * 90.0).to_radians());
        }
        let model = scene
            .world_transform(model_node)
            .unwrap_or_else(Matrix4::identity);

        let ubo = UniformBufferObject {
            model,
            view: camera.view_matrix(),
            proj: camera.projection(renderer.aspect_ratio()),
        };

        renderer.draw_frame(&mut window, &ubo)?;
    }

    renderer.wait_idle()?;
    log::info!("Shutting down");

    Ok(())
}
