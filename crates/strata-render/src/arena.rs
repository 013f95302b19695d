#![forbid(unsafe_code)]

//! The plane arena: every plane and pile, addressed by stable ids.
//!
//! Planes form bound trees (a root plus everything bound to it, directly or
//! transitively); the roots of a pile are siblings. Every structural change
//! (create, resize, move, reparent, destroy, z-order) goes through
//! [`PlaneArena`] so that the binding, pile and z-order invariants are
//! maintained in one place:
//!
//! - every plane belongs to exactly one pile and appears once in its
//!   z-order;
//! - a plane without a parent is listed in its pile's roots;
//! - a pile with no planes does not exist.
//!
//! Preconditions are checked before anything is mutated, so a failed call
//! leaves the arena as it was.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use strata_core::capabilities::PixelProtocol;
use strata_core::geometry::CellPixels;

use crate::error::{RenderError, geometry};
use crate::pile::Pile;
use crate::plane::{Plane, PlaneOptions, ResizePolicy};
use crate::sprixel::{Sprixel, SprixelId};

/// Stable plane handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaneId(u32);

impl PlaneId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PlaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plane#{}", self.0)
    }
}

impl fmt::Display for PlaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plane#{}", self.0)
    }
}

/// Stable pile handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PileId(u32);

impl PileId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pile#{}", self.0)
    }
}

impl fmt::Display for PileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pile#{}", self.0)
    }
}

/// A resize request: keep the `keep_rows` x `keep_cols` rectangle at
/// `(keep_y, keep_x)`, shift the plane's origin by `keep + off`, and make it
/// `rows` x `cols`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeSpec {
    pub keep_y: u32,
    pub keep_x: u32,
    pub keep_rows: u32,
    pub keep_cols: u32,
    pub y_off: i32,
    pub x_off: i32,
    pub rows: u32,
    pub cols: u32,
}

impl ResizeSpec {
    /// Keep the top-left overlap and leave the origin alone.
    pub fn simple(old_rows: u32, old_cols: u32, rows: u32, cols: u32) -> Self {
        Self {
            keep_y: 0,
            keep_x: 0,
            keep_rows: old_rows.min(rows),
            keep_cols: old_cols.min(cols),
            y_off: 0,
            x_off: 0,
            rows,
            cols,
        }
    }

    fn check(&self, old_rows: u32, old_cols: u32) -> Result<(), RenderError> {
        if (self.keep_rows == 0) != (self.keep_cols == 0) {
            return Err(geometry(format!(
                "kept area {}x{} must be empty in both dimensions or neither",
                self.keep_rows, self.keep_cols
            )));
        }
        if self.rows == 0 || self.cols == 0 {
            return Err(geometry(format!("can't resize to {}x{}", self.rows, self.cols)));
        }
        if self.rows < self.keep_rows || self.cols < self.keep_cols {
            return Err(geometry(format!(
                "kept area {}x{} exceeds new size {}x{}",
                self.keep_rows, self.keep_cols, self.rows, self.cols
            )));
        }
        if u64::from(self.keep_y) + u64::from(self.keep_rows) > u64::from(old_rows)
            || u64::from(self.keep_x) + u64::from(self.keep_cols) > u64::from(old_cols)
        {
            return Err(geometry(format!(
                "kept area {}x{} at {}/{} exceeds {}x{}",
                self.keep_rows, self.keep_cols, self.keep_y, self.keep_x, old_rows, old_cols
            )));
        }
        Ok(())
    }
}

/// Owner of every plane and pile.
#[derive(Debug)]
pub struct PlaneArena {
    planes: HashMap<PlaneId, Plane>,
    piles: BTreeMap<PileId, Pile>,
    next_plane: u32,
    next_pile: u32,
    next_sprixel: SprixelId,
    std_plane: PlaneId,
    std_pile: PileId,
    rows: u32,
    cols: u32,
    cellpx: CellPixels,
}

impl PlaneArena {
    /// An arena holding the standard pile and its standard plane, sized
    /// `rows` x `cols`.
    pub fn new(rows: u32, cols: u32, cellpx: CellPixels) -> Result<Self, RenderError> {
        let std_plane = PlaneId(1);
        let std_pile = PileId(1);
        let opts = PlaneOptions::new(rows, cols)
            .named("std")
            .resize_policy(ResizePolicy::Maximize);
        let plane = Plane::new(std_plane, std_pile, None, 0, 0, &opts)?;
        let mut pile = Pile::new(std_pile, rows, cols, cellpx);
        pile.zorder.push(std_plane);
        pile.roots.push(std_plane);
        let mut planes = HashMap::new();
        planes.insert(std_plane, plane);
        let mut piles = BTreeMap::new();
        piles.insert(std_pile, pile);
        Ok(Self {
            planes,
            piles,
            next_plane: 2,
            next_pile: 2,
            next_sprixel: SprixelId::from_raw(0),
            std_plane,
            std_pile,
            rows,
            cols,
            cellpx,
        })
    }

    #[inline]
    pub fn std_plane(&self) -> PlaneId {
        self.std_plane
    }

    #[inline]
    pub fn std_pile(&self) -> PileId {
        self.std_pile
    }

    /// Terminal size every pile renders to.
    pub fn dims(&self) -> (u32, u32) {
        (self.rows, self.cols)
    }

    pub fn cell_pixels(&self) -> CellPixels {
        self.cellpx
    }

    pub fn plane(&self, id: PlaneId) -> Result<&Plane, RenderError> {
        self.planes.get(&id).ok_or(RenderError::NoSuchPlane(id))
    }

    pub fn plane_mut(&mut self, id: PlaneId) -> Result<&mut Plane, RenderError> {
        self.planes.get_mut(&id).ok_or(RenderError::NoSuchPlane(id))
    }

    pub fn contains(&self, id: PlaneId) -> bool {
        self.planes.contains_key(&id)
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    pub fn pile(&self, id: PileId) -> Result<&Pile, RenderError> {
        self.piles.get(&id).ok_or(RenderError::NoSuchPile(id))
    }

    pub(crate) fn pile_mut(&mut self, id: PileId) -> Result<&mut Pile, RenderError> {
        self.piles.get_mut(&id).ok_or(RenderError::NoSuchPile(id))
    }

    pub fn pile_of(&self, id: PlaneId) -> Result<PileId, RenderError> {
        Ok(self.plane(id)?.pile)
    }

    pub fn pile_ids(&self) -> Vec<PileId> {
        self.piles.keys().copied().collect()
    }

    /// Look up a plane by name, searching every pile.
    pub fn find(&self, name: &str) -> Option<PlaneId> {
        let mut hits: Vec<_> = self.planes.values().filter(|p| p.name() == Some(name)).map(Plane::id).collect();
        hits.sort();
        hits.first().copied()
    }

    /// Split borrow used by the compositor.
    pub(crate) fn split_pile(&mut self, id: PileId) -> Result<(&mut HashMap<PlaneId, Plane>, &mut Pile), RenderError> {
        let pile = self.piles.get_mut(&id).ok_or(RenderError::NoSuchPile(id))?;
        Ok((&mut self.planes, pile))
    }

    fn alloc_pile(&mut self) -> PileId {
        let id = PileId(self.next_pile);
        self.next_pile += 1;
        self.piles.insert(id, Pile::new(id, self.rows, self.cols, self.cellpx));
        id
    }

    // ------------------------------------------------------------ creation

    /// Size for a new plane, honoring its resize policy.
    fn initial_dims(&self, parent: Option<&Plane>, opts: &PlaneOptions) -> (u32, u32) {
        match opts.resize_policy {
            ResizePolicy::Fixed => (opts.rows, opts.cols),
            ResizePolicy::Maximize => (self.rows, self.cols),
            ResizePolicy::Marginalize { bottom, right } => {
                let (prows, pcols) = parent.map_or((self.rows, self.cols), |p| (p.rows(), p.cols()));
                (
                    margin_fit(prows, bottom, opts.y),
                    margin_fit(pcols, right, opts.x),
                )
            }
        }
    }

    /// Create a plane bound to `parent`, on top of the parent's pile.
    pub fn create_child(&mut self, parent: PlaneId, opts: &PlaneOptions) -> Result<PlaneId, RenderError> {
        let parent_plane = self.plane(parent)?;
        let (rows, cols) = self.initial_dims(Some(parent_plane), opts);
        let abs_y = parent_plane.abs_y.saturating_add(opts.y);
        let abs_x = parent_plane.abs_x.saturating_add(opts.x);
        let pile = parent_plane.pile;
        let id = PlaneId(self.next_plane);
        let plane = Plane::new(id, pile, Some(parent), abs_y, abs_x, &PlaneOptions { rows, cols, ..opts.clone() })?;
        self.next_plane += 1;
        self.planes.insert(id, plane);
        if let Some(p) = self.planes.get_mut(&parent) {
            p.children.push(id);
        }
        self.pile_mut(pile)?.zorder.insert(0, id);
        strata_core::debug!(plane = id.0, parent = parent.0, rows, cols, "plane created");
        Ok(id)
    }

    /// Create a root plane in a fresh pile.
    pub fn create_pile(&mut self, opts: &PlaneOptions) -> Result<PlaneId, RenderError> {
        let (rows, cols) = self.initial_dims(None, opts);
        let id = PlaneId(self.next_plane);
        let pile_id = PileId(self.next_pile);
        let plane = Plane::new(id, pile_id, None, opts.y, opts.x, &PlaneOptions { rows, cols, ..opts.clone() })?;
        self.next_plane += 1;
        self.alloc_pile();
        self.planes.insert(id, plane);
        let pile = self.pile_mut(pile_id)?;
        pile.zorder.push(id);
        pile.roots.push(id);
        strata_core::debug!(plane = id.0, pile = pile_id.0, "pile created");
        Ok(id)
    }

    // ------------------------------------------------------------- family

    /// Is `node` strictly below `ancestor` in a bound tree?
    pub fn is_descendant(&self, node: PlaneId, ancestor: PlaneId) -> bool {
        let mut cur = self.planes.get(&node).and_then(|p| p.parent);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.planes.get(&p).and_then(|pl| pl.parent);
        }
        false
    }

    /// `n` and its bound descendants, top first, children above parents and
    /// newer children above older ones.
    fn family_stack(&self, n: PlaneId) -> Vec<PlaneId> {
        let mut out = Vec::new();
        self.family_stack_into(n, &mut out);
        out
    }

    fn family_stack_into(&self, n: PlaneId, out: &mut Vec<PlaneId>) {
        if let Some(plane) = self.planes.get(&n) {
            for &child in plane.children.iter().rev() {
                self.family_stack_into(child, out);
            }
        }
        out.push(n);
    }

    fn unbind(&mut self, n: PlaneId) -> Result<(), RenderError> {
        let plane = self.plane(n)?;
        let (parent, pile) = (plane.parent, plane.pile);
        match parent {
            Some(p) => {
                if let Some(pp) = self.planes.get_mut(&p) {
                    pp.children.retain(|c| *c != n);
                }
            }
            None => self.pile_mut(pile)?.roots.retain(|r| *r != n),
        }
        Ok(())
    }

    fn destroy_pile_if_empty(&mut self, id: PileId) {
        let empty = self.piles.get(&id).is_some_and(|p| p.zorder.is_empty());
        if !empty || id == self.std_pile {
            return;
        }
        if let Some(mut pile) = self.piles.remove(&id) {
            // Hidden sprixels still need their footprint scrubbed and a
            // protocol delete; the standard pile takes them over.
            let orphans: Vec<_> = pile.sprixels.drain().collect();
            if let Some(std) = self.piles.get_mut(&self.std_pile) {
                for s in orphans {
                    std.sprixels.insert(s);
                }
            }
            strata_core::debug!(pile = id.0, "pile destroyed");
        }
    }

    /// Move the family rooted at `n` out of `from` and into `to`, block
    /// inserted above `anchor` (or as the whole z-order when `anchor` is
    /// `None`).
    fn transplant_family(&mut self, n: PlaneId, from: PileId, to: PileId, anchor: Option<PlaneId>) -> Result<(), RenderError> {
        let family = self.family_stack(n);
        let mut sprites = Vec::new();
        for id in &family {
            if let Some(p) = self.planes.get_mut(id) {
                p.pile = to;
                if let Some(s) = p.sprite {
                    sprites.push(s);
                }
            }
        }
        let moved: Vec<Sprixel> = {
            let src = self.pile_mut(from)?;
            src.zorder.retain(|p| !family.contains(p));
            sprites.iter().filter_map(|s| src.sprixels.remove(*s)).collect()
        };
        let dst = self.pile_mut(to)?;
        let at = anchor.and_then(|a| dst.position(a)).unwrap_or(0);
        dst.zorder.splice(at..at, family.iter().copied());
        for s in moved {
            dst.sprixels.insert(s);
        }
        Ok(())
    }

    /// Rebind `n` and everything bound to it. `newparent == n` detaches the
    /// family into a new pile.
    pub fn reparent_family(&mut self, n: PlaneId, newparent: PlaneId) -> Result<(), RenderError> {
        if n == self.std_plane {
            return Err(RenderError::StandardPlane);
        }
        let parent = self.plane(n)?.parent;
        self.plane(newparent)?;
        if parent == Some(newparent) || (newparent == n && parent.is_none()) {
            return Ok(());
        }
        if newparent != n && self.is_descendant(newparent, n) {
            return Err(geometry(format!("{newparent} is bound beneath {n}")));
        }
        let old_pile = self.plane(n)?.pile;
        self.unbind(n)?;
        if newparent == n {
            let pile = self.alloc_pile();
            if let Some(p) = self.planes.get_mut(&n) {
                p.parent = None;
            }
            self.transplant_family(n, old_pile, pile, None)?;
            self.pile_mut(pile)?.roots.push(n);
        } else {
            let new_pile = self.plane(newparent)?.pile;
            if let Some(p) = self.planes.get_mut(&n) {
                p.parent = Some(newparent);
            }
            if let Some(p) = self.planes.get_mut(&newparent) {
                p.children.push(n);
            }
            if new_pile != old_pile {
                self.transplant_family(n, old_pile, new_pile, Some(newparent))?;
            }
        }
        self.destroy_pile_if_empty(old_pile);
        Ok(())
    }

    /// Rebind `n` alone: its children are first handed to its parent (or
    /// become roots when `n` is a root).
    pub fn reparent(&mut self, n: PlaneId, newparent: PlaneId) -> Result<(), RenderError> {
        if n == self.std_plane {
            return Err(RenderError::StandardPlane);
        }
        let plane = self.plane(n)?;
        let (parent, pile) = (plane.parent, plane.pile);
        self.plane(newparent)?;
        if parent == Some(newparent) || (newparent == n && parent.is_none()) {
            return Ok(());
        }
        let children: Vec<PlaneId> = plane.children.iter().copied().collect();
        for child in &children {
            if let Some(c) = self.planes.get_mut(child) {
                c.parent = parent;
            }
        }
        match parent {
            Some(p) => {
                if let Some(pp) = self.planes.get_mut(&p) {
                    pp.children.extend(children.iter().copied());
                }
            }
            None => self.pile_mut(pile)?.roots.extend(children.iter().copied()),
        }
        if let Some(p) = self.planes.get_mut(&n) {
            p.children.clear();
        }
        self.reparent_family(n, newparent)
    }

    // ----------------------------------------------------------- destroy

    /// Destroy one plane. Its children are rebound to its parent. A root with
    /// bound children must go through [`destroy_family`](Self::destroy_family).
    pub fn destroy(&mut self, n: PlaneId) -> Result<(), RenderError> {
        if n == self.std_plane {
            return Err(RenderError::StandardPlane);
        }
        let plane = self.plane(n)?;
        if plane.parent.is_none() && !plane.children.is_empty() {
            return Err(RenderError::RootHasChildren(n));
        }
        let (parent, pile) = (plane.parent, plane.pile);
        let children: Vec<PlaneId> = plane.children.iter().copied().collect();
        if let Some(w) = self.planes.get_mut(&n).and_then(|p| p.widget.as_mut()) {
            w.fire();
        }
        if let Some(parent) = parent {
            for child in children {
                self.reparent_family(child, parent)?;
            }
        }
        self.hide_sprite(n)?;
        self.unbind(n)?;
        self.pile_mut(pile)?.zorder.retain(|p| *p != n);
        self.planes.remove(&n);
        strata_core::debug!(plane = n.0, "plane destroyed");
        self.destroy_pile_if_empty(pile);
        Ok(())
    }

    /// Destroy `n` and everything bound beneath it.
    pub fn destroy_family(&mut self, n: PlaneId) -> Result<(), RenderError> {
        if n == self.std_plane {
            return Err(RenderError::StandardPlane);
        }
        let children: Vec<PlaneId> = self.plane(n)?.children.iter().copied().collect();
        for child in children {
            self.destroy_family(child)?;
        }
        self.destroy(n)
    }

    // -------------------------------------------------------------- move

    fn shift_family(&mut self, n: PlaneId, dy: i64, dx: i64) -> Result<(), RenderError> {
        let (from, children, sprite, pile) = {
            let p = self.plane_mut(n)?;
            let from = (p.abs_y, p.abs_x);
            p.abs_y = clamp_i32(i64::from(p.abs_y) + dy);
            p.abs_x = clamp_i32(i64::from(p.abs_x) + dx);
            (from, p.children.clone(), p.sprite, p.pile)
        };
        if let Some(s) = sprite
            && let Some(sprixel) = self.pile_mut(pile)?.sprixels.get_mut(s)
        {
            let to = (clamp_i32(i64::from(from.0) + dy), clamp_i32(i64::from(from.1) + dx));
            sprixel.move_from(from, to);
        }
        for child in children {
            self.shift_family(child, dy, dx)?;
        }
        Ok(())
    }

    /// Place `n` at `(y, x)` relative to its parent (absolute for roots).
    /// Bound descendants move along.
    pub fn move_yx(&mut self, n: PlaneId, y: i32, x: i32) -> Result<(), RenderError> {
        if n == self.std_plane {
            return Err(RenderError::StandardPlane);
        }
        let plane = self.plane(n)?;
        let (base_y, base_x) = match plane.parent {
            Some(p) => self.plane(p)?.abs_yx(),
            None => (0, 0),
        };
        let (Some(dy), Some(dx)) = (
            offset_to(base_y, y, plane.abs_y),
            offset_to(base_x, x, plane.abs_x),
        ) else {
            return Err(geometry(format!("position ({y}, {x}) lies beyond the coordinate space")));
        };
        if dy != 0 || dx != 0 {
            self.shift_family(n, dy, dx)?;
        }
        Ok(())
    }

    pub fn move_rel(&mut self, n: PlaneId, dy: i32, dx: i32) -> Result<(), RenderError> {
        let (y, x) = self.rel_yx(n)?;
        match (y.checked_add(dy), x.checked_add(dx)) {
            (Some(y), Some(x)) => self.move_yx(n, y, x),
            _ => Err(geometry(format!("moving by ({dy}, {dx}) leaves the coordinate space"))),
        }
    }

    /// Position relative to the parent (absolute for roots).
    pub fn rel_yx(&self, n: PlaneId) -> Result<(i32, i32), RenderError> {
        let plane = self.plane(n)?;
        match plane.parent {
            Some(p) => {
                let (py, px) = self.plane(p)?.abs_yx();
                Ok((plane.abs_y.saturating_sub(py), plane.abs_x.saturating_sub(px)))
            }
            None => Ok(plane.abs_yx()),
        }
    }

    // ------------------------------------------------------------ resize

    /// Resize `n` per `spec`. The standard plane follows the terminal and
    /// can't be resized directly.
    pub fn resize(&mut self, n: PlaneId, spec: &ResizeSpec) -> Result<(), RenderError> {
        if n == self.std_plane {
            return Err(RenderError::StandardPlane);
        }
        self.resize_internal(n, spec)
    }

    pub fn resize_simple(&mut self, n: PlaneId, rows: u32, cols: u32) -> Result<(), RenderError> {
        let plane = self.plane(n)?;
        let spec = ResizeSpec::simple(plane.rows(), plane.cols(), rows, cols);
        self.resize(n, &spec)
    }

    pub(crate) fn resize_internal(&mut self, n: PlaneId, spec: &ResizeSpec) -> Result<(), RenderError> {
        let plane = self.plane(n)?;
        spec.check(plane.rows(), plane.cols())?;
        let dy = i64::from(spec.keep_y) + i64::from(spec.y_off);
        let dx = i64::from(spec.keep_x) + i64::from(spec.x_off);
        if dy == 0 && dx == 0 && plane.rows() == spec.rows && plane.cols() == spec.cols {
            return Ok(());
        }
        let span = strata_core::debug_span!("resize", plane = n.0, rows = spec.rows, cols = spec.cols);
        let _guard = span.enter();
        self.hide_sprite(n)?;
        let plane = self.plane_mut(n)?;
        plane.reshape(spec.keep_y, spec.keep_x, spec.keep_rows, spec.keep_cols, dy, dx, spec.rows, spec.cols);
        plane.abs_y = clamp_i32(i64::from(plane.abs_y) + dy);
        plane.abs_x = clamp_i32(i64::from(plane.abs_x) + dx);
        let children: Vec<PlaneId> = plane.children.iter().copied().collect();
        for child in children {
            self.apply_policy(child)?;
        }
        Ok(())
    }

    /// Re-fit `n` according to its resize policy.
    fn apply_policy(&mut self, n: PlaneId) -> Result<(), RenderError> {
        let plane = self.plane(n)?;
        let (rows, cols) = match plane.resize_policy {
            ResizePolicy::Fixed => return Ok(()),
            ResizePolicy::Maximize => (self.rows, self.cols),
            ResizePolicy::Marginalize { bottom, right } => {
                let (rel_y, rel_x) = self.rel_yx(n)?;
                let (prows, pcols) = match plane.parent {
                    Some(p) => {
                        let pp = self.plane(p)?;
                        (pp.rows(), pp.cols())
                    }
                    None => (self.rows, self.cols),
                };
                (margin_fit(prows, bottom, rel_y), margin_fit(pcols, right, rel_x))
            }
        };
        let spec = ResizeSpec::simple(plane.rows(), plane.cols(), rows, cols);
        self.resize_internal(n, &spec)
    }

    /// The terminal changed size: resize every pile and re-fit their roots.
    pub fn resize_terminal(&mut self, rows: u32, cols: u32, cellpx: CellPixels) -> Result<(), RenderError> {
        if rows == 0 || cols == 0 {
            return Err(geometry(format!("terminal can't be {rows}x{cols}")));
        }
        self.rows = rows;
        self.cols = cols;
        self.cellpx = cellpx;
        let mut roots = Vec::new();
        for pile in self.piles.values_mut() {
            pile.rows = rows;
            pile.cols = cols;
            pile.cellpx = cellpx;
            roots.extend(pile.roots.iter().copied());
        }
        for root in roots {
            self.apply_policy(root)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------- scrolling

    /// Scroll a scrolling plane up `n` rows. Bound children overlapping it
    /// ride along.
    pub fn scroll_up(&mut self, id: PlaneId, n: u32) -> Result<(), RenderError> {
        let plane = self.plane_mut(id)?;
        plane.scroll_up(n)?;
        let (top, bottom) = (plane.abs_y, plane.abs_y.saturating_add_unsigned(plane.rows()));
        let children: Vec<PlaneId> = plane.children.iter().copied().collect();
        for child in children {
            let c = self.plane(child)?;
            let cy = c.abs_y;
            if cy < bottom && cy.saturating_add_unsigned(c.rows()) > top {
                self.shift_family(child, -i64::from(n), 0)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------ z-order

    fn zpeek(&self, n: PlaneId, delta: isize) -> Option<PlaneId> {
        let pile = self.piles.get(&self.planes.get(&n)?.pile)?;
        let pos = pile.position(n)? as isize + delta;
        (pos >= 0).then(|| pile.zorder.get(pos as usize).copied()).flatten()
    }

    /// The plane immediately above `n`.
    pub fn above(&self, n: PlaneId) -> Option<PlaneId> {
        self.zpeek(n, -1)
    }

    /// The plane immediately below `n`.
    pub fn below(&self, n: PlaneId) -> Option<PlaneId> {
        self.zpeek(n, 1)
    }

    fn same_pile(&self, a: PlaneId, b: PlaneId) -> Result<PileId, RenderError> {
        let pa = self.plane(a)?.pile;
        if self.plane(b)?.pile != pa {
            return Err(geometry(format!("{a} and {b} are in different piles")));
        }
        if a == b {
            return Err(geometry(format!("{a} can't be placed relative to itself")));
        }
        Ok(pa)
    }

    fn restack(&mut self, block: &[PlaneId], pile: PileId, at: impl FnOnce(&Pile) -> usize) -> Result<(), RenderError> {
        let pile = self.pile_mut(pile)?;
        pile.zorder.retain(|p| !block.contains(p));
        let idx = at(pile).min(pile.zorder.len());
        pile.zorder.splice(idx..idx, block.iter().copied());
        Ok(())
    }

    pub fn move_top(&mut self, n: PlaneId) -> Result<(), RenderError> {
        let pile = self.plane(n)?.pile;
        self.restack(&[n], pile, |_| 0)
    }

    pub fn move_bottom(&mut self, n: PlaneId) -> Result<(), RenderError> {
        let pile = self.plane(n)?.pile;
        self.restack(&[n], pile, |p| p.zorder.len())
    }

    /// Place `n` directly above `target`.
    pub fn move_above(&mut self, n: PlaneId, target: PlaneId) -> Result<(), RenderError> {
        let pile = self.same_pile(n, target)?;
        self.restack(&[n], pile, |p| p.position(target).unwrap_or(0))
    }

    /// Place `n` directly below `target`.
    pub fn move_below(&mut self, n: PlaneId, target: PlaneId) -> Result<(), RenderError> {
        let pile = self.same_pile(n, target)?;
        self.restack(&[n], pile, |p| p.position(target).map_or(p.zorder.len(), |i| i + 1))
    }

    /// Raise `n` and its bound descendants to the top, keeping their relative
    /// order.
    pub fn move_family_top(&mut self, n: PlaneId) -> Result<(), RenderError> {
        let pile = self.plane(n)?.pile;
        let block = self.family_in_zorder(n, pile)?;
        self.restack(&block, pile, |_| 0)
    }

    pub fn move_family_bottom(&mut self, n: PlaneId) -> Result<(), RenderError> {
        let pile = self.plane(n)?.pile;
        let block = self.family_in_zorder(n, pile)?;
        self.restack(&block, pile, |p| p.zorder.len())
    }

    fn family_in_zorder(&self, n: PlaneId, pile: PileId) -> Result<Vec<PlaneId>, RenderError> {
        let family = self.family_stack(n);
        Ok(self.pile(pile)?.zorder.iter().copied().filter(|p| family.contains(p)).collect())
    }

    // ----------------------------------------------------------- sprixels

    /// Attach a bitmap to `n`, replacing any bitmap already there. The plane
    /// must be large enough for the bitmap's cell footprint, which includes
    /// any cells `px_offset` pushes the image into. The offset must fall
    /// inside one cell.
    #[allow(clippy::too_many_arguments)]
    pub fn attach_sprixel(
        &mut self,
        n: PlaneId,
        protocol: PixelProtocol,
        pixels: Vec<u8>,
        pixy: u32,
        pixx: u32,
        transcolor: Option<u32>,
        px_offset: (u32, u32),
    ) -> Result<SprixelId, RenderError> {
        let cellpx = self.cellpx;
        let plane = self.plane(n)?;
        let (origin, pile_id, old) = (plane.abs_yx(), plane.pile, plane.sprite);
        let id = self.next_sprixel.next();
        let mut sprixel = Sprixel::new(id, n, origin, protocol, cellpx, pixels, pixy, pixx, px_offset, transcolor)?;
        let (rows, cols) = sprixel.cell_dims();
        if rows > plane.rows() || cols > plane.cols() {
            return Err(geometry(format!(
                "{rows}x{cols} bitmap doesn't fit {}x{} plane",
                plane.rows(),
                plane.cols()
            )));
        }
        self.next_sprixel = id;
        let pile = self.pile_mut(pile_id)?;
        if let Some(previous) = old.and_then(|o| pile.sprixels.get_mut(o)) {
            sprixel.inherit_annihilation(previous.tam());
            previous.hide();
        }
        pile.sprixels.insert(sprixel);
        self.plane_mut(n)?.sprite = Some(id);
        strata_core::debug!(sprixel = id.raw(), plane = n.0, rows, cols, "sprixel attached");
        Ok(id)
    }

    /// Schedule removal of `n`'s bitmap, if any.
    pub fn hide_sprite(&mut self, n: PlaneId) -> Result<(), RenderError> {
        let plane = self.plane_mut(n)?;
        let (sprite, pile) = (plane.sprite.take(), plane.pile);
        if let Some(s) = sprite
            && let Some(sprixel) = self.pile_mut(pile)?.sprixels.get_mut(s)
        {
            sprixel.hide();
        }
        Ok(())
    }

    pub fn sprixel(&self, n: PlaneId) -> Result<Option<&Sprixel>, RenderError> {
        let plane = self.plane(n)?;
        let pile = self.pile(plane.pile)?;
        Ok(plane.sprite.and_then(|s| pile.sprixels.get(s)))
    }
}

/// Shift taking `abs` to `base + rel`, if the target fits an `i32`.
fn offset_to(base: i32, rel: i32, abs: i32) -> Option<i64> {
    Some(i64::from(base.checked_add(rel)?) - i64::from(abs))
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Rows (or columns) left for a marginalized plane: the parent's extent less
/// the far margin and the plane's offset, never below one.
fn margin_fit(parent: u32, margin: u32, offset: i32) -> u32 {
    let avail = i64::from(parent) - i64::from(margin) - i64::from(offset.max(0));
    avail.max(1) as u32
}
