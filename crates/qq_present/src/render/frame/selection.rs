//! Swapchain configuration policies
//!
//! Pure functions over what the surface reports, so the choices can be
//! tested without a device. The resource set builder calls them in order:
//! format, present mode, extent, image count.

use ash::vk;

use super::error::{PresentError, PresentResult};
use super::types::SurfaceExtent;
use crate::config::PresentModePreference;

/// Format the builder looks for first
pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Pick the preferred sRGB format, otherwise the first one reported
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> PresentResult<vk::SurfaceFormatKHR> {
    let first = formats.first().copied().ok_or_else(|| {
        PresentError::NoCompatibleConfiguration("surface reports no formats".to_string())
    })?;

    Ok(formats
        .iter()
        .copied()
        .find(|sf| {
            sf.format == PREFERRED_FORMAT.format && sf.color_space == PREFERRED_FORMAT.color_space
        })
        .unwrap_or(first))
}

/// Pick mailbox when low latency is preferred and available, FIFO otherwise
///
/// FIFO support is mandatory, so it is the answer whenever the surface
/// reports any mode at all.
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preference: PresentModePreference,
) -> PresentResult<vk::PresentModeKHR> {
    if modes.is_empty() {
        return Err(PresentError::NoCompatibleConfiguration(
            "surface reports no present modes".to_string(),
        ));
    }

    let wanted = match preference {
        PresentModePreference::LowLatency => vk::PresentModeKHR::MAILBOX,
        PresentModePreference::Vsync => vk::PresentModeKHR::FIFO,
    };

    Ok(modes
        .iter()
        .copied()
        .find(|&mode| mode == wanted)
        .unwrap_or(vk::PresentModeKHR::FIFO))
}

/// Use the surface's current extent, or clamp the window size when the
/// surface leaves it to us (`u32::MAX` sentinel)
pub fn choose_swap_extent(
    caps: &vk::SurfaceCapabilitiesKHR,
    window_extent: SurfaceExtent,
) -> PresentResult<vk::Extent2D> {
    let extent = if caps.current_extent.width == u32::MAX {
        vk::Extent2D {
            width: window_extent
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: window_extent
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    } else {
        caps.current_extent
    };

    if SurfaceExtent::from(extent).is_degenerate() {
        return Err(PresentError::NoCompatibleConfiguration(format!(
            "surface extent {} is empty",
            SurfaceExtent::from(extent)
        )));
    }

    Ok(extent)
}

/// One more than the minimum, capped by the maximum when there is one
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        wanted.min(caps.max_image_count)
    } else {
        wanted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn caps(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_format_falls_back_to_first() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[0]);
    }

    #[test]
    fn test_format_finds_preferred_anywhere() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
            PREFERRED_FORMAT,
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[2]);
    }

    #[test]
    fn test_format_empty_list() {
        assert!(matches!(
            choose_surface_format(&[]),
            Err(PresentError::NoCompatibleConfiguration(_))
        ));
    }

    #[test]
    fn test_present_mode_preference() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&modes, PresentModePreference::LowLatency).unwrap(),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&modes, PresentModePreference::Vsync).unwrap(),
            vk::PresentModeKHR::FIFO
        );
        let no_mailbox = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&no_mailbox, PresentModePreference::LowLatency).unwrap(),
            vk::PresentModeKHR::FIFO
        );
        assert!(choose_present_mode(&[], PresentModePreference::Vsync).is_err());
    }

    #[test]
    fn test_extent_uses_current_when_defined() {
        let caps = caps((1024, 768), (1, 1), (4096, 4096));
        let extent = choose_swap_extent(&caps, SurfaceExtent::new(800, 600)).unwrap();
        assert_eq!((extent.width, extent.height), (1024, 768));
    }

    #[test]
    fn test_extent_clamps_window_size() {
        let caps = caps((u32::MAX, u32::MAX), (100, 100), (2000, 1000));
        let extent = choose_swap_extent(&caps, SurfaceExtent::new(4000, 50)).unwrap();
        assert_eq!((extent.width, extent.height), (2000, 100));

        let extent = choose_swap_extent(&caps, SurfaceExtent::new(800, 600)).unwrap();
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_extent_zero_is_incompatible() {
        let caps = caps((0, 0), (0, 0), (4096, 4096));
        assert!(matches!(
            choose_swap_extent(&caps, SurfaceExtent::new(800, 600)),
            Err(PresentError::NoCompatibleConfiguration(_))
        ));
    }

    #[test]
    fn test_image_count() {
        let mut caps = caps((1, 1), (1, 1), (1, 1));
        caps.min_image_count = 2;
        caps.max_image_count = 0;
        assert_eq!(choose_image_count(&caps), 3);

        caps.max_image_count = 2;
        assert_eq!(choose_image_count(&caps), 2);

        caps.max_image_count = 8;
        assert_eq!(choose_image_count(&caps), 3);
    }
}
