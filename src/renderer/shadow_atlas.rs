use glam::UVec2;
use log::{debug, warn};

use crate::renderer::device::{GraphicsDevice, TextureId};
use crate::renderer::shadow_split::ShadowMapRegion;

#[derive(Clone, Copy, Debug)]
struct Shelf {
    y: u32,
    height: u32,
    next_x: u32,
}

#[derive(Clone, Debug)]
struct AtlasPage {
    texture: TextureId,
    shelves: Vec<Shelf>,
    next_shelf_y: u32,
}

impl AtlasPage {
    fn new(texture: TextureId) -> Self {
        Self {
            texture,
            shelves: Vec::new(),
            next_shelf_y: 0,
        }
    }

    fn allocate(&mut self, size: UVec2, page_size: u32) -> Option<UVec2> {
        // Tightest existing shelf first
        let shelf = self
            .shelves
            .iter_mut()
            .filter(|shelf| shelf.height >= size.y && shelf.next_x + size.x <= page_size)
            .min_by_key(|shelf| shelf.height);
        if let Some(shelf) = shelf {
            let min = UVec2::new(shelf.next_x, shelf.y);
            shelf.next_x += size.x;
            return Some(min);
        }

        if self.next_shelf_y + size.y > page_size {
            return None;
        }
        let min = UVec2::new(0, self.next_shelf_y);
        self.shelves.push(Shelf {
            y: self.next_shelf_y,
            height: size.y,
            next_x: size.x,
        });
        self.next_shelf_y += size.y;
        Some(min)
    }

    fn clear(&mut self) {
        self.shelves.clear();
        self.next_shelf_y = 0;
    }
}

/// Shelf allocator handing out shadow map rectangles from square atlas pages.
///
/// Pages are created through the device on demand and reused across frames.
/// Allocation happens on the main thread only.
#[derive(Clone, Debug)]
pub struct ShadowAtlas {
    page_size: u32,
    max_pages: usize,
    pages: Vec<AtlasPage>,
}

impl ShadowAtlas {
    pub fn new(page_size: u32, max_pages: usize) -> Self {
        Self {
            page_size,
            max_pages,
            pages: Vec::new(),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Changing the page size drops all pages.
    pub fn set_page_size(&mut self, page_size: u32) {
        if page_size != self.page_size {
            self.page_size = page_size;
            self.pages.clear();
        }
    }

    pub fn set_max_pages(&mut self, max_pages: usize) {
        self.max_pages = max_pages;
        self.pages.truncate(max_pages);
    }

    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// Frees every region; page textures are kept.
    pub fn reset(&mut self) {
        for page in &mut self.pages {
            page.clear();
        }
    }

    /// Returns an invalid region when `size` does not fit anywhere.
    pub fn allocate(&mut self, size: UVec2, device: &mut dyn GraphicsDevice) -> ShadowMapRegion {
        let page_size = self.page_size;
        if size.x == 0 || size.y == 0 || size.x > page_size || size.y > page_size {
            warn!("Shadow map {}x{} does not fit atlas page of {}", size.x, size.y, page_size);
            return ShadowMapRegion::default();
        }

        for page in &mut self.pages {
            if let Some(min) = page.allocate(size, page_size) {
                return region(page.texture, page_size, min, size);
            }
        }

        if self.pages.len() >= self.max_pages {
            debug!("Shadow atlas is full ({} pages)", self.pages.len());
            return ShadowMapRegion::default();
        }

        let texture = device.create_shadow_atlas_page(UVec2::splat(page_size));
        if !texture.is_valid() {
            return ShadowMapRegion::default();
        }
        let mut page = AtlasPage::new(texture);
        let Some(min) = page.allocate(size, page_size) else {
            return ShadowMapRegion::default();
        };
        self.pages.push(page);
        region(texture, page_size, min, size)
    }
}

fn region(texture: TextureId, page_size: u32, min: UVec2, size: UVec2) -> ShadowMapRegion {
    ShadowMapRegion {
        texture,
        texture_size: UVec2::splat(page_size),
        min,
        max: min + size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::device::HeadlessDevice;

    fn overlaps(a: &ShadowMapRegion, b: &ShadowMapRegion) -> bool {
        a.texture == b.texture && a.min.x < b.max.x && b.min.x < a.max.x && a.min.y < b.max.y && b.min.y < a.max.y
    }

    #[test]
    fn regions_do_not_overlap() {
        let mut device = HeadlessDevice::new();
        let mut atlas = ShadowAtlas::new(1024, 2);
        let sizes = [
            UVec2::new(768, 512),
            UVec2::splat(512),
            UVec2::splat(256),
            UVec2::splat(256),
            UVec2::new(512, 256),
        ];
        let regions: Vec<_> = sizes.iter().map(|&size| atlas.allocate(size, &mut device)).collect();

        for (i, a) in regions.iter().enumerate() {
            assert!(a.is_valid());
            assert!(a.max.x <= 1024 && a.max.y <= 1024);
            for b in &regions[i + 1..] {
                assert!(!overlaps(a, b));
            }
        }
    }

    #[test]
    fn full_atlas_returns_invalid_region() {
        let mut device = HeadlessDevice::new();
        let mut atlas = ShadowAtlas::new(512, 1);
        assert!(atlas.allocate(UVec2::splat(512), &mut device).is_valid());
        assert!(!atlas.allocate(UVec2::splat(64), &mut device).is_valid());
        assert!(!atlas.allocate(UVec2::splat(1024), &mut device).is_valid());
    }

    #[test]
    fn reset_reuses_pages() {
        let mut device = HeadlessDevice::new();
        let mut atlas = ShadowAtlas::new(512, 4);
        atlas.allocate(UVec2::splat(512), &mut device);
        atlas.allocate(UVec2::splat(512), &mut device);
        assert_eq!(atlas.num_pages(), 2);

        atlas.reset();
        let region = atlas.allocate(UVec2::splat(512), &mut device);
        assert_eq!(region.min, UVec2::ZERO);
        assert_eq!(atlas.num_pages(), 2);
        assert_eq!(device.atlas_pages().len(), 2);
    }
}
