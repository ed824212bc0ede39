//! Value types shared by the frame controller and its backends

use std::fmt;

use super::error::{PresentError, PresentResult};

/// Drawable size of the presentation surface in pixels
///
/// The windowing system is the source of truth; the driver re-reads it on
/// every recreation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SurfaceExtent {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl SurfaceExtent {
    /// Create an extent
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero dimension; nothing can be built for it
    pub const fn is_degenerate(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height, or 1.0 for a degenerate extent
    pub fn aspect_ratio(self) -> f32 {
        if self.is_degenerate() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

impl From<ash::vk::Extent2D> for SurfaceExtent {
    fn from(extent: ash::vk::Extent2D) -> Self {
        Self::new(extent.width, extent.height)
    }
}

impl From<SurfaceExtent> for ash::vk::Extent2D {
    fn from(extent: SurfaceExtent) -> Self {
        Self {
            width: extent.width,
            height: extent.height,
        }
    }
}

impl fmt::Display for SurfaceExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Version number of one swapchain-dependent resource set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwapchainGeneration(u64);

impl SwapchainGeneration {
    /// Generation of the resource set built at startup
    pub const fn initial() -> Self {
        Self(0)
    }

    /// Generation of the next rebuild
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw counter value
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SwapchainGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

/// A swapchain image index that has been checked against one resource set
///
/// Only [`ImageIndex::validate`] creates these, so holding one means the
/// index was in range for the generation it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageIndex {
    index: u32,
    generation: SwapchainGeneration,
}

impl ImageIndex {
    /// Check a raw index from the presentation engine against an image count
    pub fn validate(
        raw: u32,
        image_count: u32,
        generation: SwapchainGeneration,
    ) -> PresentResult<Self> {
        if raw >= image_count {
            return Err(PresentError::InvalidImageIndex {
                index: raw,
                image_count,
            });
        }
        Ok(Self { index: raw, generation })
    }

    /// Raw index, for handing back to the presentation engine
    pub const fn raw(self) -> u32 {
        self.index
    }

    /// Index as a `usize` for slice access
    pub const fn as_usize(self) -> usize {
        self.index as usize
    }

    /// Generation this index belongs to
    pub const fn generation(self) -> SwapchainGeneration {
        self.generation
    }
}

/// One entry per swapchain image of a single generation
///
/// Lookups with an [`ImageIndex`] from another generation fail instead of
/// silently aliasing a different image's data.
#[derive(Debug, Clone)]
pub struct PerImage<T> {
    generation: SwapchainGeneration,
    items: Vec<T>,
}

impl<T> PerImage<T> {
    /// Wrap per-image data built for `generation`
    pub fn new(generation: SwapchainGeneration, items: Vec<T>) -> Self {
        Self { generation, items }
    }

    /// Build one entry per image with `f(raw_index)`
    pub fn from_fn(generation: SwapchainGeneration, count: u32, f: impl FnMut(u32) -> T) -> Self {
        Self::new(generation, (0..count).map(f).collect())
    }

    /// Generation the entries belong to
    pub const fn generation(&self) -> SwapchainGeneration {
        self.generation
    }

    /// Number of images
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no images
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entry for `image`, or `StaleImageIndex` when the generations differ
    pub fn get(&self, image: ImageIndex) -> PresentResult<&T> {
        self.check(image)?;
        self.items.get(image.as_usize()).ok_or(PresentError::InvalidImageIndex {
            index: image.raw(),
            image_count: self.count(),
        })
    }

    /// Mutable entry for `image`, or `StaleImageIndex` when the generations differ
    pub fn get_mut(&mut self, image: ImageIndex) -> PresentResult<&mut T> {
        self.check(image)?;
        let image_count = self.count();
        self.items.get_mut(image.as_usize()).ok_or(PresentError::InvalidImageIndex {
            index: image.raw(),
            image_count,
        })
    }

    /// Iterate over every entry
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Iterate mutably over every entry
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    /// Borrow the entries as a slice, e.g. to hand them to a bulk free call
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Give the entries back
    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    fn count(&self) -> u32 {
        u32::try_from(self.items.len()).unwrap_or(u32::MAX)
    }

    fn check(&self, image: ImageIndex) -> PresentResult<()> {
        if image.generation() == self.generation {
            Ok(())
        } else {
            Err(PresentError::StaleImageIndex {
                index: image.raw(),
                index_generation: image.generation().value(),
                current_generation: self.generation.value(),
            })
        }
    }
}

impl<T: Clone> PerImage<T> {
    /// Same value for every image
    pub fn filled(generation: SwapchainGeneration, count: u32, value: T) -> Self {
        Self::new(generation, vec![value; count as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_extent() {
        assert!(SurfaceExtent::new(0, 0).is_degenerate());
        assert!(SurfaceExtent::new(800, 0).is_degenerate());
        assert!(SurfaceExtent::new(0, 600).is_degenerate());
        assert!(!SurfaceExtent::new(800, 600).is_degenerate());
        assert_eq!(SurfaceExtent::new(0, 600).aspect_ratio(), 1.0);
    }

    #[test]
    fn test_generation_ordering() {
        let first = SwapchainGeneration::initial();
        let second = first.next();
        assert!(second > first);
        assert_eq!(second.value(), 1);
        assert_eq!(second.to_string(), "gen1");
    }

    #[test]
    fn test_image_index_bounds() {
        let generation = SwapchainGeneration::initial();
        assert!(ImageIndex::validate(2, 3, generation).is_ok());
        assert!(matches!(
            ImageIndex::validate(3, 3, generation),
            Err(PresentError::InvalidImageIndex { index: 3, image_count: 3 })
        ));
    }

    #[test]
    fn test_per_image_rejects_stale_index() {
        let old = SwapchainGeneration::initial();
        let new = old.next();
        let stale = ImageIndex::validate(1, 3, old).unwrap();

        let mut views = PerImage::from_fn(new, 3, |i| i * 10);
        assert!(matches!(views.get(stale), Err(PresentError::StaleImageIndex { .. })));
        assert!(views.get_mut(stale).is_err());

        let fresh = ImageIndex::validate(1, 3, new).unwrap();
        assert_eq!(*views.get(fresh).unwrap(), 10);
        *views.get_mut(fresh).unwrap() = 99;
        assert_eq!(views.as_slice(), &[0, 99, 20]);
    }

    #[test]
    fn test_per_image_index_from_larger_set() {
        let generation = SwapchainGeneration::initial();
        let index = ImageIndex::validate(3, 4, generation).unwrap();
        let items = PerImage::filled(generation, 2, 0u8);
        assert!(matches!(items.get(index), Err(PresentError::InvalidImageIndex { .. })));
    }
}
