//! Spinning triangle driven by the qq frame controller
//!
//! Loads `qq.toml` from the working directory when present. Close the
//! window or press Escape to exit.

mod spin;

use qq_present::config::{Config, PresentConfig};
use qq_present::foundation::logging;
use qq_present::render::backends::vulkan::{VulkanBackend, Window};
use qq_present::render::frame::{FrameDriver, WindowSurface};
use qq_present::PresentError;

use spin::SpinningTriangle;

const CONFIG_PATH: &str = "qq.toml";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    log::info!("Starting qq");

    let config = PresentConfig::load_or_default(CONFIG_PATH)?;
    config.validate()?;

    let mut window = Window::from_config(&config.window)?;
    let backend = VulkanBackend::new(&mut window, &config)?;
    let mut driver = FrameDriver::new(backend, window, SpinningTriangle::default(), &config)?;

    let result = run(&mut driver);
    let shutdown = driver.shutdown();

    let stats = driver.stats();
    log::info!(
        "Presented {} frames, {} swapchain rebuilds",
        stats.frames_presented,
        stats.recreations
    );

    result?;
    shutdown?;
    Ok(())
}

type SpinDriver = FrameDriver<VulkanBackend, Window, SpinningTriangle>;

fn run(driver: &mut SpinDriver) -> Result<(), PresentError> {
    while !driver.window().should_close() {
        driver.window_mut().poll_events();
        match driver.run_frame() {
            Ok(()) => {}
            Err(PresentError::WindowClosed) => break,
            Err(err) => {
                log::error!("Stopping after fatal frame error: {err}");
                return Err(err);
            }
        }
    }
    Ok(())
}
