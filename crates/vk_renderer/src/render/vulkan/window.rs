//! GLFW window management for Vulkan rendering
//!
//! Creates a window without an OpenGL context, exposes the Vulkan instance
//! extensions GLFW requires, and creates the presentation surface. Resize
//! notifications arrive both through framebuffer-size events (latched in
//! [`Window::take_resized_flag`]) and through polling the current size.

use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    #[error("GLFW initialization failed")]
    InitializationFailed,

    #[error("window creation failed")]
    CreationFailed,

    #[error("GLFW error: {0}")]
    GlfwError(String),
}

pub type WindowResult<T> = Result<T, WindowError>;

/// A framebuffer can back a swapchain only when both dimensions are nonzero.
/// Minimized windows report (0, 0) and must not trigger swapchain creation.
pub fn framebuffer_renderable(size: (u32, u32)) -> bool {
    size.0 > 0 && size.1 > 0
}

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    framebuffer_resized: bool,
}

impl Window {
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw =
            glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        // Configure for Vulkan (no OpenGL context)
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_cursor_pos_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
            framebuffer_resized: false,
        })
    }

    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Pump the GLFW event queue and latch any framebuffer resize
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
        for (_, event) in glfw::flush_messages(&self.events) {
            if let glfw::WindowEvent::FramebufferSize(_, _) = event {
                self.framebuffer_resized = true;
            }
        }
    }

    /// Consume the latched resize flag, returning whether a resize occurred
    /// since the last call
    pub fn take_resized_flag(&mut self) -> bool {
        std::mem::take(&mut self.framebuffer_resized)
    }

    pub fn get_framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width as u32, height as u32)
    }

    /// Block until the framebuffer has a non-zero extent. Minimized windows
    /// report a zero-sized framebuffer, which cannot back a swapchain.
    pub fn wait_for_nonzero_framebuffer(&mut self) -> (u32, u32) {
        loop {
            let size = self.get_framebuffer_size();
            if framebuffer_renderable(size) {
                return size;
            }
            self.glfw.wait_events();
        }
    }

    pub fn key_pressed(&self, key: glfw::Key) -> bool {
        self.window.get_key(key) == glfw::Action::Press
    }

    pub fn get_cursor_pos(&self) -> (f64, f64) {
        self.window.get_cursor_pos()
    }

    pub fn set_cursor_mode(&mut self, mode: glfw::CursorMode) {
        self.window.set_cursor_mode(mode);
    }

    /// Seconds since GLFW initialization
    pub fn time(&self) -> f64 {
        self.glfw.get_time()
    }

    /// Get required Vulkan instance extensions from GLFW
    pub fn get_required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("failed to get required extensions".to_string()))
    }

    /// Create a Vulkan surface using GLFW's built-in functionality
    pub fn create_vulkan_surface(
        &mut self,
        instance: ash::vk::Instance,
    ) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!(
                "failed to create Vulkan surface: {result:?}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimized_framebuffer_is_not_renderable() {
        assert!(!framebuffer_renderable((0, 0)));
    }

    #[test]
    fn degenerate_framebuffer_is_not_renderable() {
        assert!(!framebuffer_renderable((0, 600)));
        assert!(!framebuffer_renderable((800, 0)));
    }

    #[test]
    fn restored_framebuffer_is_renderable() {
        assert!(framebuffer_renderable((800, 600)));
        assert!(framebuffer_renderable((1, 1)));
    }
}
