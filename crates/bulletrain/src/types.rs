//! # Bullet Type Registry
//!
//! Scripts register bullet templates by index once per stage and then fire
//! bullets by type index. A registered type owns its sprite: a region cut
//! out of an image resource.

use std::sync::Arc;

use bulletrain_assets::Resource;
use parking_lot::RwLock;

use crate::bullet::BulletType;
use crate::error::{ScriptError, ScriptResult};

/// Source rectangle inside a sprite sheet, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpriteRegion {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl SpriteRegion {
    /// Creates a region.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True if the region lies inside a `width` x `height` image.
    #[must_use]
    pub fn fits(&self, width: u32, height: u32) -> bool {
        let right = u64::from(self.x) + u64::from(self.width);
        let bottom = u64::from(self.y) + u64::from(self.height);
        right <= u64::from(width) && bottom <= u64::from(height)
    }
}

/// A region of an image resource.
///
/// Holds the resource handle, so the image outlives an archive free for as
/// long as any type or bullet uses it.
#[derive(Clone, Debug)]
pub struct Sprite {
    image: Arc<Resource>,
    region: SpriteRegion,
}

impl Sprite {
    /// Cuts `region` out of `image`.
    ///
    /// Returns `None` if the resource did not decode as an image or the
    /// region falls outside it.
    #[must_use]
    pub fn cut(image: Arc<Resource>, region: SpriteRegion) -> Option<Self> {
        let data = image.as_image()?;
        if !region.fits(data.width, data.height) {
            return None;
        }
        Some(Self { image, region })
    }

    /// The sheet this sprite is cut from.
    #[inline]
    #[must_use]
    pub fn image(&self) -> &Arc<Resource> {
        &self.image
    }

    /// The source rectangle.
    #[inline]
    #[must_use]
    pub fn region(&self) -> SpriteRegion {
        self.region
    }
}

/// Fixed-size table of bullet templates.
#[derive(Debug)]
pub struct TypeRegistry {
    slots: RwLock<Box<[Option<Arc<BulletType>>]>>,
}

impl TypeRegistry {
    /// Creates a registry with `max` empty slots.
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self {
            slots: RwLock::new((0..max).map(|_| None).collect()),
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.read().len()
    }

    /// Validates a script-supplied index.
    ///
    /// # Errors
    ///
    /// [`ScriptError::TypeOutOfRange`] unless `0 <= index < capacity`.
    pub fn check_index(&self, index: i64) -> ScriptResult<usize> {
        let max = self.capacity();
        usize::try_from(index)
            .ok()
            .filter(|&i| i < max)
            .ok_or(ScriptError::TypeOutOfRange { index, max })
    }

    /// Stores a template, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// [`ScriptError::TypeOutOfRange`] for a bad index.
    pub fn register(&self, index: i64, ty: BulletType) -> ScriptResult<()> {
        let slot = self.check_index(index)?;
        self.slots.write()[slot] = Some(Arc::new(ty));
        tracing::trace!(index = slot, "Bullet type registered");
        Ok(())
    }

    /// Empties a slot. Returns `true` if it held a type.
    ///
    /// # Errors
    ///
    /// [`ScriptError::TypeOutOfRange`] for a bad index.
    pub fn unregister(&self, index: i64) -> ScriptResult<bool> {
        let slot = self.check_index(index)?;
        Ok(self.slots.write()[slot].take().is_some())
    }

    /// Empties every slot.
    pub fn clear(&self) {
        for slot in self.slots.write().iter_mut() {
            *slot = None;
        }
    }

    /// Fetches a registered template.
    ///
    /// # Errors
    ///
    /// [`ScriptError::TypeOutOfRange`] for a bad index,
    /// [`ScriptError::TypeNotRegistered`] for an empty slot.
    pub fn get(&self, index: i64) -> ScriptResult<Arc<BulletType>> {
        let slot = self.check_index(index)?;
        self.slots.read()[slot]
            .clone()
            .ok_or(ScriptError::TypeNotRegistered(slot))
    }

    /// Number of registered types.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.slots.read().iter().filter(|slot| slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_fits() {
        assert!(SpriteRegion::new(0, 0, 16, 16).fits(16, 16));
        assert!(SpriteRegion::new(16, 0, 16, 16).fits(32, 16));
        assert!(!SpriteRegion::new(17, 0, 16, 16).fits(32, 16));
        assert!(!SpriteRegion::new(u32::MAX, 0, 2, 1).fits(u32::MAX, 1));
    }

    #[test]
    fn test_register_get_unregister() {
        let registry = TypeRegistry::new(4);
        let ty = BulletType {
            radius: 3.0,
            ..BulletType::default()
        };
        registry.register(2, ty).unwrap();
        assert_eq!(registry.registered(), 1);
        assert!((registry.get(2).unwrap().radius - 3.0).abs() < f32::EPSILON);

        assert!(registry.unregister(2).unwrap());
        assert!(!registry.unregister(2).unwrap());
        assert!(matches!(
            registry.get(2),
            Err(ScriptError::TypeNotRegistered(2))
        ));
    }

    #[test]
    fn test_index_bounds() {
        let registry = TypeRegistry::new(4);
        for bad in [-1, 4, i64::MAX] {
            assert!(matches!(
                registry.register(bad, BulletType::default()),
                Err(ScriptError::TypeOutOfRange { max: 4, .. })
            ));
        }
    }

    #[test]
    fn test_clear() {
        let registry = TypeRegistry::new(4);
        registry.register(0, BulletType::default()).unwrap();
        registry.register(3, BulletType::default()).unwrap();
        registry.clear();
        assert_eq!(registry.registered(), 0);
    }
}
