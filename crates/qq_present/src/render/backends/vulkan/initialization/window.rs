//! GLFW window for the Vulkan backend
//!
//! Created without a client API so the swapchain owns presentation.
//! Framebuffer-size events raise the resize flag the frame driver polls
//! through [`WindowSurface::take_resized`].

use thiserror::Error;

use crate::config::WindowConfig;
use crate::render::frame::{SurfaceExtent, WindowSurface};

/// Window errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW failed to initialize
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// Any other GLFW failure
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// A GLFW window plus its event queue and resize flag
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    resized: bool,
}

impl Window {
    /// Create a window
    pub fn new(title: &str, width: u32, height: u32, resizable: bool) -> WindowResult<Self> {
        let mut glfw =
            glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(resizable));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        log::info!("Created {width}x{height} window \"{title}\"");
        Ok(Self {
            glfw,
            window,
            events,
            resized: false,
        })
    }

    /// Create a window from configuration
    pub fn from_config(config: &WindowConfig) -> WindowResult<Self> {
        Self::new(&config.title, config.width, config.height, config.resizable)
    }

    /// Process pending events without blocking
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
        self.drain_events();
    }

    /// Instance extensions GLFW needs for surface creation
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Vulkan is not available to GLFW".to_string()))
    }

    /// Create a presentation surface for this window
    pub fn create_vulkan_surface(
        &mut self,
        instance: ash::vk::Instance,
    ) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);
        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!("Failed to create Vulkan surface: {result:?}")))
        }
    }

    fn drain_events(&mut self) {
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    log::debug!("Framebuffer resized to {width}x{height}");
                    self.resized = true;
                }
                glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                    self.window.set_should_close(true);
                }
                _ => {}
            }
        }
    }
}

impl WindowSurface for Window {
    fn framebuffer_extent(&mut self) -> SurfaceExtent {
        let (width, height) = self.window.get_framebuffer_size();
        SurfaceExtent::new(
            u32::try_from(width).unwrap_or(0),
            u32::try_from(height).unwrap_or(0),
        )
    }

    fn wait_events(&mut self) {
        self.glfw.wait_events();
        self.drain_events();
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    fn should_close(&self) -> bool {
        self.window.should_close()
    }
}
