#![forbid(unsafe_code)]

//! Per-plane glyph interning.
//!
//! A cell stores a single scalar value inline. Grapheme clusters made of
//! several scalars (emoji ZWJ sequences, combining marks, flags) live in the
//! owning plane's [`GlyphPool`] and the cell holds a [`GlyphId`] into it.
//!
//! A `GlyphId` is meaningful only against the pool that issued it. Moving a
//! cell into another plane (or into the last-frame store) must go through
//! [`Cell::duplicate_into`](crate::cell::Cell::duplicate_into), which interns
//! the text in the destination pool.
//!
//! ```
//! use strata_render::glyph_pool::GlyphPool;
//!
//! let mut pool = GlyphPool::new();
//! let id = pool.intern("e\u{301}", 1).unwrap();
//! assert_eq!(pool.get(id), Some("e\u{301}"));
//! pool.retain(id);
//! pool.release(id);
//! pool.release(id);
//! assert_eq!(pool.get(id), None);
//! ```

use std::collections::HashMap;

use crate::cell::GlyphId;
use crate::error::RenderError;

#[derive(Debug, Clone)]
struct GlyphSlot {
    text: Box<str>,
    refcount: u32,
}

/// Reference-counted, deduplicating store for multi-scalar glyphs.
#[derive(Debug, Clone, Default)]
pub struct GlyphPool {
    /// `None` marks a free slot.
    slots: Vec<Option<GlyphSlot>>,
    lookup: HashMap<Box<str>, GlyphId>,
    free_list: Vec<u32>,
}

impl GlyphPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live glyphs.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Intern `text` with display `width`, or take another reference to the
    /// existing entry.
    pub fn intern(&mut self, text: &str, width: u8) -> Result<GlyphId, RenderError> {
        if width > GlyphId::MAX_WIDTH {
            return Err(RenderError::InvalidGlyph(text.to_string()));
        }
        if let Some(&id) = self.lookup.get(text) {
            self.retain(id);
            return Ok(id);
        }

        let slot_idx = self.alloc_slot()?;
        let id = GlyphId::new(slot_idx, width);
        let slot = GlyphSlot {
            text: text.into(),
            refcount: 1,
        };
        if (slot_idx as usize) < self.slots.len() {
            self.slots[slot_idx as usize] = Some(slot);
        } else {
            self.slots.push(Some(slot));
        }
        self.lookup.insert(text.into(), id);
        Ok(id)
    }

    /// Text for `id`, or `None` if the slot was freed.
    pub fn get(&self, id: GlyphId) -> Option<&str> {
        self.slots
            .get(id.slot())
            .and_then(|slot| slot.as_ref())
            .map(|slot| &*slot.text)
    }

    pub fn retain(&mut self, id: GlyphId) {
        if let Some(Some(slot)) = self.slots.get_mut(id.slot()) {
            slot.refcount = slot.refcount.saturating_add(1);
        }
    }

    /// Drop one reference; the slot is recycled when none remain.
    pub fn release(&mut self, id: GlyphId) {
        let slot_idx = id.slot();
        if let Some(Some(slot)) = self.slots.get_mut(slot_idx) {
            slot.refcount = slot.refcount.saturating_sub(1);
            if slot.refcount == 0 {
                self.lookup.remove(&slot.text);
                self.slots[slot_idx] = None;
                self.free_list.push(slot_idx as u32);
            }
        }
    }

    pub fn refcount(&self, id: GlyphId) -> u32 {
        self.slots
            .get(id.slot())
            .and_then(|slot| slot.as_ref())
            .map_or(0, |slot| slot.refcount)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.lookup.clear();
        self.free_list.clear();
    }

    fn alloc_slot(&mut self) -> Result<u32, RenderError> {
        if let Some(idx) = self.free_list.pop() {
            return Ok(idx);
        }
        let idx = self.slots.len();
        if idx > GlyphId::MAX_SLOT as usize {
            return Err(RenderError::PoolExhausted);
        }
        Ok(idx as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAMILY: &str = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}";

    #[test]
    fn intern_and_get() {
        let mut pool = GlyphPool::new();
        let id = pool.intern(FAMILY, 2).unwrap();
        assert_eq!(pool.get(id), Some(FAMILY));
        assert_eq!(id.width(), 2);
    }

    #[test]
    fn deduplication() {
        let mut pool = GlyphPool::new();
        let id1 = pool.intern("e\u{301}", 1).unwrap();
        let id2 = pool.intern("e\u{301}", 1).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(pool.refcount(id1), 2);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn release_frees_and_slot_is_reused() {
        let mut pool = GlyphPool::new();
        let id1 = pool.intern("a\u{308}", 1).unwrap();
        pool.release(id1);
        assert!(pool.is_empty());
        assert_eq!(pool.get(id1), None);

        let id2 = pool.intern("o\u{308}", 1).unwrap();
        assert_eq!(id1.slot(), id2.slot());
        assert_eq!(pool.get(id2), Some("o\u{308}"));
    }

    #[test]
    fn width_overflow_is_an_error() {
        let mut pool = GlyphPool::new();
        assert!(matches!(
            pool.intern("x", 128),
            Err(RenderError::InvalidGlyph(_))
        ));
    }

    #[test]
    fn unknown_ids_are_harmless() {
        let mut pool = GlyphPool::new();
        let fake = GlyphId::new(999, 1);
        assert_eq!(pool.get(fake), None);
        pool.retain(fake);
        pool.release(fake);
        assert_eq!(pool.refcount(fake), 0);
    }
}
