// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The z-order directory and its editor.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use understory_dirty::{CycleHandling, DirtyTracker};

use super::dirty;
use super::list::{OrderedEntry, OrderedList, compute_visibility};
use super::position::ZPosition;
use crate::damage::DamageTracker;
use crate::geometry::{PixelPoint, PixelRect};
use crate::region::Region;
use crate::surface::{Surface, SurfaceId};
use crate::wake::WakeSignal;
use crate::{Error, Result};

#[derive(Debug)]
struct Member {
    surface: Arc<Surface>,
    alpha: f32,
    bypass: bool,
    hidden: bool,
}

impl Member {
    fn id(&self) -> SurfaceId {
        self.surface.id()
    }

    fn key(&self) -> u32 {
        self.surface.id().0
    }
}

#[derive(Debug)]
struct DirectoryState {
    screen: PixelRect,
    /// Bottom to top.
    members: Vec<Member>,
    dirty: DirtyTracker<u32>,
    /// Screen areas vacated by removed members since the last recompute.
    vacated: Region,
    screen_changed: bool,
    structure_changed: bool,
    snapshot: Arc<OrderedList>,
    generation: u64,
    #[cfg(test)]
    skip_occlusion_once: bool,
}

impl DirectoryState {
    fn position_of(&self, id: SurfaceId) -> Result<usize> {
        self.members
            .iter()
            .position(|m| m.id() == id)
            .ok_or(Error::UnknownSurface(id))
    }

    fn member_mut(&mut self, id: SurfaceId) -> Result<&mut Member> {
        let idx = self.position_of(id)?;
        Ok(&mut self.members[idx])
    }

    fn resolve(&self, position: ZPosition) -> Result<usize> {
        match position {
            ZPosition::Top => Ok(self.members.len()),
            ZPosition::Bottom => Ok(0),
            ZPosition::Above(id) => Ok(self.position_of(id)? + 1),
            ZPosition::Below(id) => self.position_of(id),
        }
    }

    fn mark(&mut self, id: SurfaceId, channel: understory_dirty::Channel) {
        self.dirty.mark(id.0, channel);
        self.structure_changed = true;
    }

    fn drain_changed(&mut self) -> Vec<u32> {
        let mut changed = Vec::new();
        for channel in [dirty::ORDER, dirty::GEOMETRY, dirty::APPEARANCE] {
            changed.extend(self.dirty.drain(channel).deterministic().run());
        }
        changed.sort_unstable();
        changed.dedup();
        changed
    }

    fn build_list(&self) -> OrderedList {
        let mut entries: Vec<OrderedEntry> = self
            .members
            .iter()
            .map(|m| OrderedEntry {
                surface: Arc::clone(&m.surface),
                bounds: m.surface.bounds(),
                full_region: Region::new(),
                visible_region: Region::new(),
                opaque: m.surface.is_opaque(),
                alpha: m.alpha,
                bypass: m.bypass,
                hidden: m.hidden,
            })
            .collect();
        compute_visibility(&mut entries, self.screen);
        #[cfg(test)]
        if self.skip_occlusion_once {
            for entry in &mut entries {
                entry.visible_region = entry.full_region.clone();
            }
        }
        OrderedList {
            entries,
            screen: self.screen,
            generation: self.generation + 1,
        }
    }

    /// Recomputes visibility, publishes a new snapshot, and returns the
    /// exposed screen region.
    fn recompute(&mut self) -> Result<Region> {
        let changed = self.drain_changed();
        let list = self.build_list();
        #[cfg(test)]
        {
            self.skip_occlusion_once = false;
        }

        let old = Arc::clone(&self.snapshot);
        let mut exposed = core::mem::take(&mut self.vacated);
        if self.screen_changed {
            exposed = Region::from_rect(self.screen);
        } else {
            for key in changed {
                let id = SurfaceId(key);
                for entry in [old.get(id), list.get(id)].into_iter().flatten() {
                    exposed.union(&entry.full_region);
                }
            }
        }
        self.screen_changed = false;
        self.structure_changed = false;

        let verdict = list.verify_partition();
        self.generation = list.generation;
        self.snapshot = Arc::new(list);
        match verdict {
            Ok(()) => Ok(exposed),
            Err(err) => {
                tracing::error!(%err, generation = self.generation, "z-order partition violated, rebuilding");
                self.rebuild();
                Err(err)
            }
        }
    }

    /// Discards all incremental state and recomputes from the member list.
    fn rebuild(&mut self) {
        self.dirty = DirtyTracker::with_cycle_handling(CycleHandling::Error);
        self.vacated.clear();
        let list = self.build_list();
        if let Err(err) = list.verify_partition() {
            tracing::error!(%err, "z-order rebuild still inconsistent");
        }
        self.generation = list.generation;
        self.snapshot = Arc::new(list);
    }
}

/// Ordered set of surfaces with computed visibility.
///
/// Owned by the window-management layer. Mutations go through
/// [`edit`](Self::edit) (or the single-operation shorthands), which recompute
/// visibility once at the end of the batch and publish a new
/// [`OrderedList`]. The compositor only ever calls
/// [`snapshot`](Self::snapshot), which clones an `Arc` under a brief read
/// lock.
///
/// Areas whose owner may have changed (a member moved, was restacked,
/// changed opacity, or was removed) are accumulated as screen-space
/// *exposure* damage, consumed by the compositor through
/// [`begin_exposure`](Self::begin_exposure) / [`end_exposure`](Self::end_exposure).
#[derive(Debug)]
pub struct ZOrderDirectory {
    state: RwLock<DirectoryState>,
    exposure: Mutex<DamageTracker>,
    retired: Mutex<Vec<Arc<Surface>>>,
    waker: Option<Arc<WakeSignal>>,
}

impl ZOrderDirectory {
    /// Creates an empty directory for a screen.
    #[must_use]
    pub fn new(screen: PixelRect) -> Self {
        Self::build(screen, None)
    }

    /// Creates an empty directory that raises `waker` on every change and
    /// attaches it to every inserted surface.
    #[must_use]
    pub fn with_waker(screen: PixelRect, waker: Arc<WakeSignal>) -> Self {
        Self::build(screen, Some(waker))
    }

    fn build(screen: PixelRect, waker: Option<Arc<WakeSignal>>) -> Self {
        Self {
            state: RwLock::new(DirectoryState {
                screen,
                members: Vec::new(),
                dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
                vacated: Region::new(),
                screen_changed: false,
                structure_changed: false,
                snapshot: Arc::new(OrderedList::empty(screen)),
                generation: 0,
                #[cfg(test)]
                skip_occlusion_once: false,
            }),
            exposure: Mutex::new(DamageTracker::new()),
            retired: Mutex::new(Vec::new()),
            waker,
        }
    }

    /// The signal raised on changes, if any.
    #[must_use]
    pub fn waker(&self) -> Option<&Arc<WakeSignal>> {
        self.waker.as_ref()
    }

    /// Current screen rectangle.
    #[must_use]
    pub fn screen(&self) -> PixelRect {
        self.state.read().screen
    }

    /// Returns the most recently published ordered list.
    #[must_use]
    pub fn snapshot(&self) -> Arc<OrderedList> {
        Arc::clone(&self.state.read().snapshot)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().members.len()
    }

    /// Returns `true` if there are no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().members.is_empty()
    }

    /// Looks up a member's surface.
    #[must_use]
    pub fn surface(&self, id: SurfaceId) -> Option<Arc<Surface>> {
        let state = self.state.read();
        state
            .members
            .iter()
            .find(|m| m.id() == id)
            .map(|m| Arc::clone(&m.surface))
    }

    /// Member ids from bottom to top.
    #[must_use]
    pub fn order(&self) -> Vec<SurfaceId> {
        self.state.read().members.iter().map(Member::id).collect()
    }

    /// Applies a batch of changes and recomputes visibility once.
    ///
    /// Visibility is recomputed even if `f` fails part way, so the published
    /// snapshot always reflects the members as they are. The closure's error
    /// takes precedence over a recompute error.
    pub fn edit<R>(&self, f: impl FnOnce(&mut DirectoryEditor<'_>) -> Result<R>) -> Result<R> {
        let mut state = self.state.write();
        let result = {
            let mut editor = DirectoryEditor {
                state: &mut state,
                retired: &self.retired,
                waker: self.waker.as_ref(),
            };
            f(&mut editor)
        };
        let recomputed = if state.structure_changed || state.screen_changed {
            Some(self.recompute_locked(&mut state))
        } else {
            None
        };
        drop(state);
        let value = result?;
        if let Some(recomputed) = recomputed {
            recomputed?;
        }
        Ok(value)
    }

    /// Recomputes visibility for every member and publishes a new snapshot.
    ///
    /// Called automatically by [`edit`](Self::edit). On a partition violation
    /// the directory is rebuilt from scratch, the whole screen is exposed,
    /// and [`Error::DirectoryInconsistent`] is returned.
    pub fn recompute(&self) -> Result<()> {
        let mut state = self.state.write();
        self.recompute_locked(&mut state)
    }

    fn recompute_locked(&self, state: &mut DirectoryState) -> Result<()> {
        let outcome = state.recompute();
        let exposed = match &outcome {
            Ok(exposed) => exposed.clone(),
            Err(_) => Region::from_rect(state.screen),
        };
        tracing::debug!(
            generation = state.generation,
            members = state.members.len(),
            exposed_area = exposed.area(),
            "z-order recomputed"
        );
        if !exposed.is_empty() {
            self.exposure.lock().invalidate(&exposed);
            if let Some(waker) = &self.waker {
                waker.wake();
            }
        }
        outcome.map(drop)
    }

    /// Starts an exposure session and returns the screen-space region whose
    /// owner may have changed since the last session.
    pub fn begin_exposure(&self) -> Region {
        self.exposure.lock().begin_session()
    }

    /// Ends the exposure session. Returns `true` if more exposure arrived.
    pub fn end_exposure(&self) -> bool {
        self.exposure.lock().end_session()
    }

    /// Takes the surfaces removed since the last call.
    ///
    /// The caller must keep them alive until no snapshot it holds references
    /// them any more.
    pub fn drain_retired(&self) -> Vec<Arc<Surface>> {
        core::mem::take(&mut *self.retired.lock())
    }

    /// Topmost non-hidden surface at a screen position.
    #[must_use]
    pub fn surface_at(&self, point: kurbo::Point) -> Option<SurfaceId> {
        self.snapshot()
            .surface_at(PixelPoint::from_kurbo(point))
            .map(OrderedEntry::id)
    }

    /// Registers `surface` at `position`.
    pub fn insert(&self, surface: Arc<Surface>, position: ZPosition) -> Result<()> {
        self.edit(|e| e.insert(surface, position))
    }

    /// Removes and retires a surface.
    pub fn remove(&self, id: SurfaceId) -> Result<Arc<Surface>> {
        self.edit(|e| e.remove(id))
    }

    /// Moves a member to a new stacking position.
    pub fn restack(&self, id: SurfaceId, position: ZPosition) -> Result<()> {
        self.edit(|e| e.restack(id, position))
    }

    /// Moves a member to the top.
    pub fn raise(&self, id: SurfaceId) -> Result<()> {
        self.restack(id, ZPosition::Top)
    }

    /// Moves a member to the bottom.
    pub fn lower(&self, id: SurfaceId) -> Result<()> {
        self.restack(id, ZPosition::Bottom)
    }

    /// Moves a member's top-left corner to `origin`.
    pub fn move_to(&self, id: SurfaceId, origin: PixelPoint) -> Result<()> {
        self.edit(|e| e.move_to(id, origin))
    }

    /// Changes a member's opacity flag.
    pub fn set_opaque(&self, id: SurfaceId, opaque: bool) -> Result<()> {
        self.edit(|e| e.set_opaque(id, opaque))
    }

    /// Changes a member's whole-surface alpha.
    pub fn set_alpha(&self, id: SurfaceId, alpha: f32) -> Result<()> {
        self.edit(|e| e.set_alpha(id, alpha))
    }

    /// Shows or hides a member.
    pub fn set_hidden(&self, id: SurfaceId, hidden: bool) -> Result<()> {
        self.edit(|e| e.set_hidden(id, hidden))
    }

    /// Flags a member as bypassing the compositor.
    pub fn set_bypass(&self, id: SurfaceId, bypass: bool) -> Result<()> {
        self.edit(|e| e.set_bypass(id, bypass))
    }

    /// Tells the directory a member was resized.
    pub fn notify_geometry_changed(&self, id: SurfaceId) -> Result<()> {
        self.edit(|e| e.notify_geometry_changed(id))
    }

    /// Changes the screen rectangle.
    pub fn set_screen(&self, screen: PixelRect) -> Result<()> {
        self.edit(|e| {
            e.set_screen(screen);
            Ok(())
        })
    }

    #[cfg(test)]
    fn corrupt_next_recompute(&self) {
        self.state.write().skip_occlusion_once = true;
    }
}

/// Mutable access to a [`ZOrderDirectory`] within [`edit`](ZOrderDirectory::edit).
pub struct DirectoryEditor<'a> {
    state: &'a mut DirectoryState,
    retired: &'a Mutex<Vec<Arc<Surface>>>,
    waker: Option<&'a Arc<WakeSignal>>,
}

impl core::fmt::Debug for DirectoryEditor<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DirectoryEditor")
            .field("members", &self.state.members.len())
            .finish_non_exhaustive()
    }
}

impl DirectoryEditor<'_> {
    /// Registers `surface` at `position`.
    ///
    /// Fails with [`Error::Retired`] for a retired surface and with
    /// [`Error::DirectoryInconsistent`] if the id is already registered.
    pub fn insert(&mut self, surface: Arc<Surface>, position: ZPosition) -> Result<()> {
        let id = surface.id();
        if surface.is_retiring() {
            return Err(Error::Retired);
        }
        if self.state.position_of(id).is_ok() {
            return Err(Error::DirectoryInconsistent(format!(
                "{id:?} is already registered"
            )));
        }
        let idx = self.state.resolve(position)?;
        if let Some(waker) = self.waker {
            surface.attach_waker(Arc::clone(waker));
        }
        self.state.members.insert(
            idx,
            Member {
                surface,
                alpha: 1.0,
                bypass: false,
                hidden: false,
            },
        );
        self.state.mark(id, dirty::ORDER);
        Ok(())
    }

    /// Removes a member, retires it, and queues it for deferred reclamation.
    pub fn remove(&mut self, id: SurfaceId) -> Result<Arc<Surface>> {
        let idx = self.state.position_of(id)?;
        let member = self.state.members.remove(idx);
        if let Some(entry) = self.state.snapshot.get(id) {
            self.state.vacated.union(&entry.full_region);
        }
        self.state.dirty.remove_key(member.key());
        self.state.structure_changed = true;
        member.surface.retire();
        self.retired.lock().push(Arc::clone(&member.surface));
        Ok(member.surface)
    }

    /// Moves a member to a new stacking position.
    ///
    /// The position is resolved after the member is taken out of the list,
    /// so positions relative to the member itself are rejected with
    /// [`Error::UnknownSurface`].
    pub fn restack(&mut self, id: SurfaceId, position: ZPosition) -> Result<()> {
        let from = self.state.position_of(id)?;
        let member = self.state.members.remove(from);
        match self.state.resolve(position) {
            Ok(to) => {
                let unchanged = to == from;
                self.state.members.insert(to, member);
                if !unchanged {
                    self.state.mark(id, dirty::ORDER);
                }
                Ok(())
            }
            Err(err) => {
                self.state.members.insert(from, member);
                Err(err)
            }
        }
    }

    /// Moves a member's top-left corner to `origin`.
    ///
    /// Fails with [`Error::InvalidGeometry`] if the surface's far edge would
    /// leave the coordinate range.
    pub fn move_to(&mut self, id: SurfaceId, origin: PixelPoint) -> Result<()> {
        let member = self.state.member_mut(id)?;
        if member.surface.origin() == origin {
            return Ok(());
        }
        member.surface.set_origin(origin)?;
        self.state.mark(id, dirty::GEOMETRY);
        Ok(())
    }

    /// Changes a member's opacity flag.
    pub fn set_opaque(&mut self, id: SurfaceId, opaque: bool) -> Result<()> {
        let member = self.state.member_mut(id)?;
        if member.surface.is_opaque() == opaque {
            return Ok(());
        }
        member.surface.set_opaque(opaque);
        self.state.mark(id, dirty::APPEARANCE);
        Ok(())
    }

    /// Changes a member's whole-surface alpha, clamped to `0.0..=1.0`.
    pub fn set_alpha(&mut self, id: SurfaceId, alpha: f32) -> Result<()> {
        let alpha = alpha.clamp(0.0, 1.0);
        let member = self.state.member_mut(id)?;
        if member.alpha == alpha {
            return Ok(());
        }
        member.alpha = alpha;
        self.state.mark(id, dirty::APPEARANCE);
        Ok(())
    }

    /// Shows or hides a member.
    pub fn set_hidden(&mut self, id: SurfaceId, hidden: bool) -> Result<()> {
        let member = self.state.member_mut(id)?;
        if member.hidden == hidden {
            return Ok(());
        }
        member.hidden = hidden;
        self.state.mark(id, dirty::APPEARANCE);
        Ok(())
    }

    /// Flags a member as bypassing the compositor.
    pub fn set_bypass(&mut self, id: SurfaceId, bypass: bool) -> Result<()> {
        let member = self.state.member_mut(id)?;
        if member.bypass == bypass {
            return Ok(());
        }
        member.bypass = bypass;
        self.state.mark(id, dirty::APPEARANCE);
        Ok(())
    }

    /// Tells the directory a member was resized.
    pub fn notify_geometry_changed(&mut self, id: SurfaceId) -> Result<()> {
        self.state.position_of(id)?;
        self.state.mark(id, dirty::GEOMETRY);
        Ok(())
    }

    /// Changes the screen rectangle. The whole new screen is exposed.
    pub fn set_screen(&mut self, screen: PixelRect) {
        if self.state.screen != screen {
            self.state.screen = screen;
            self.state.screen_changed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PixelSize;
    use crate::surface::SurfaceDesc;

    fn screen() -> PixelRect {
        PixelRect::new(0, 0, 640, 480)
    }

    fn surface(id: u32, x: i32, y: i32, w: u32, h: u32, opaque: bool) -> Arc<Surface> {
        let desc = SurfaceDesc {
            id: SurfaceId(id),
            origin: PixelPoint::new(x, y),
            size: PixelSize::new(w, h),
            opaque,
        };
        Arc::new(Surface::new(desc).unwrap())
    }

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Region {
        Region::from_rect(PixelRect::new(x0, y0, x1, y1))
    }

    /// A (bottom, opaque, 100x100 at origin), B (opaque, 50x50 at 25,25),
    /// C (top, 50% alpha, 50x50 at 50,50).
    fn three_surfaces() -> ZOrderDirectory {
        let dir = ZOrderDirectory::new(screen());
        dir.edit(|e| {
            e.insert(surface(1, 0, 0, 100, 100, true), ZPosition::Top)?;
            e.insert(surface(2, 25, 25, 50, 50, true), ZPosition::Top)?;
            e.insert(surface(3, 50, 50, 50, 50, true), ZPosition::Top)?;
            e.set_alpha(SurfaceId(3), 0.5)
        })
        .unwrap();
        dir
    }

    #[test]
    fn bottom_visible_region_excludes_opaque_middle() {
        let dir = three_surfaces();
        let list = dir.snapshot();
        let a = list.get(SurfaceId(1)).unwrap();
        let mut expected = rect(0, 0, 100, 100);
        expected.subtract_rect(PixelRect::new(25, 25, 75, 75));
        assert_eq!(a.visible_region, expected);

        let b = list.get(SurfaceId(2)).unwrap();
        assert_eq!(b.visible_region, rect(25, 25, 75, 75), "C is translucent");
        let c = list.get(SurfaceId(3)).unwrap();
        assert_eq!(c.visible_region, rect(50, 50, 100, 100));
        assert!(list.verify_partition().is_ok(), "partition holds");
    }

    #[test]
    fn positions_are_explicit() {
        let dir = ZOrderDirectory::new(screen());
        dir.insert(surface(1, 0, 0, 10, 10, true), ZPosition::Top).unwrap();
        dir.insert(surface(2, 0, 0, 10, 10, true), ZPosition::Bottom).unwrap();
        dir.insert(surface(3, 0, 0, 10, 10, true), ZPosition::Above(SurfaceId(2)))
            .unwrap();
        dir.insert(surface(4, 0, 0, 10, 10, true), ZPosition::Below(SurfaceId(1)))
            .unwrap();
        assert_eq!(
            dir.order(),
            vec![SurfaceId(2), SurfaceId(3), SurfaceId(4), SurfaceId(1)]
        );

        dir.raise(SurfaceId(2)).unwrap();
        dir.lower(SurfaceId(1)).unwrap();
        assert_eq!(
            dir.order(),
            vec![SurfaceId(1), SurfaceId(3), SurfaceId(4), SurfaceId(2)]
        );
    }

    #[test]
    fn unknown_and_duplicate_ids_are_rejected() {
        let dir = ZOrderDirectory::new(screen());
        dir.insert(surface(1, 0, 0, 10, 10, true), ZPosition::Top).unwrap();
        assert_eq!(
            dir.insert(surface(2, 0, 0, 1, 1, true), ZPosition::Above(SurfaceId(9))),
            Err(Error::UnknownSurface(SurfaceId(9)))
        );
        assert!(matches!(
            dir.insert(surface(1, 0, 0, 1, 1, true), ZPosition::Top),
            Err(Error::DirectoryInconsistent(_))
        ), "duplicate id");
        assert_eq!(
            dir.restack(SurfaceId(1), ZPosition::Above(SurfaceId(1))),
            Err(Error::UnknownSurface(SurfaceId(1)))
        );
        assert_eq!(dir.order(), vec![SurfaceId(1)], "failed restack is undone");
    }

    #[test]
    fn move_exposes_old_and_new_area() {
        let dir = ZOrderDirectory::new(screen());
        dir.insert(surface(1, 0, 0, 10, 10, true), ZPosition::Top).unwrap();
        assert_eq!(dir.begin_exposure(), rect(0, 0, 10, 10));
        assert!(!dir.end_exposure(), "nothing else exposed");

        dir.move_to(SurfaceId(1), PixelPoint::new(100, 100)).unwrap();
        let exposed = dir.begin_exposure();
        let mut expected = rect(0, 0, 10, 10);
        expected.union_rect(PixelRect::new(100, 100, 110, 110));
        assert_eq!(exposed, expected);
        dir.end_exposure();
    }

    #[test]
    fn remove_retires_and_exposes() {
        let dir = ZOrderDirectory::new(screen());
        let s = surface(1, 5, 5, 10, 10, true);
        dir.insert(Arc::clone(&s), ZPosition::Top).unwrap();
        dir.begin_exposure();
        dir.end_exposure();

        let removed = dir.remove(SurfaceId(1)).unwrap();
        assert!(removed.is_retiring(), "removed surface retires");
        assert!(dir.snapshot().get(SurfaceId(1)).is_none(), "excluded immediately");
        assert_eq!(dir.begin_exposure(), rect(5, 5, 15, 15));
        let retired = dir.drain_retired();
        assert_eq!(retired.len(), 1);
        assert!(dir.drain_retired().is_empty(), "drained once");
        assert_eq!(s.acquire_write().unwrap_err(), Error::Retired);
    }

    #[test]
    fn batch_publishes_once() {
        let dir = ZOrderDirectory::new(screen());
        let before = dir.snapshot().generation();
        dir.edit(|e| {
            e.insert(surface(1, 0, 0, 10, 10, true), ZPosition::Top)?;
            e.insert(surface(2, 0, 0, 10, 10, true), ZPosition::Top)?;
            e.move_to(SurfaceId(1), PixelPoint::new(20, 20))
        })
        .unwrap();
        assert_eq!(dir.snapshot().generation(), before + 1);

        // A no-op edit publishes nothing.
        dir.set_hidden(SurfaceId(1), false).unwrap();
        assert_eq!(dir.snapshot().generation(), before + 1);
    }

    #[test]
    fn snapshot_is_copy_on_write() {
        let dir = three_surfaces();
        let held = dir.snapshot();
        dir.remove(SurfaceId(2)).unwrap();
        assert_eq!(held.len(), 3, "held snapshot is unaffected");
        assert_eq!(dir.snapshot().len(), 2);
    }

    #[test]
    fn hidden_member_does_not_occlude() {
        let dir = three_surfaces();
        dir.set_hidden(SurfaceId(2), true).unwrap();
        let list = dir.snapshot();
        assert!(list.get(SurfaceId(2)).unwrap().visible_region.is_empty(), "hidden");
        assert_eq!(
            list.get(SurfaceId(1)).unwrap().visible_region,
            rect(0, 0, 100, 100)
        );
    }

    #[test]
    fn surface_at_returns_topmost() {
        let dir = three_surfaces();
        assert_eq!(dir.surface_at(kurbo::Point::new(60.5, 60.5)), Some(SurfaceId(3)));
        assert_eq!(dir.surface_at(kurbo::Point::new(30.0, 30.0)), Some(SurfaceId(2)));
        assert_eq!(dir.surface_at(kurbo::Point::new(5.0, 5.0)), Some(SurfaceId(1)));
        assert_eq!(dir.surface_at(kurbo::Point::new(500.0, 5.0)), None);
    }

    #[test]
    fn inconsistency_rebuilds_and_exposes_screen() {
        let dir = three_surfaces();
        dir.begin_exposure();
        dir.end_exposure();

        dir.corrupt_next_recompute();
        let err = dir.set_alpha(SurfaceId(3), 1.0).unwrap_err();
        assert!(matches!(err, Error::DirectoryInconsistent(_)), "got {err:?}");

        let list = dir.snapshot();
        assert!(list.verify_partition().is_ok(), "rebuilt list is consistent");
        assert_eq!(dir.begin_exposure(), Region::from_rect(screen()));
    }

    #[test]
    fn screen_change_exposes_everything() {
        let dir = three_surfaces();
        dir.begin_exposure();
        dir.end_exposure();
        dir.set_screen(PixelRect::new(0, 0, 60, 60)).unwrap();
        assert_eq!(dir.begin_exposure(), rect(0, 0, 60, 60));
        let c = dir.snapshot();
        assert_eq!(
            c.get(SurfaceId(3)).unwrap().full_region,
            rect(50, 50, 60, 60),
            "members are clipped to the new screen"
        );
    }

    #[test]
    fn changes_wake_compositor() {
        let waker = Arc::new(WakeSignal::new());
        let dir = ZOrderDirectory::with_waker(screen(), Arc::clone(&waker));
        let s = surface(1, 0, 0, 10, 10, true);
        dir.insert(Arc::clone(&s), ZPosition::Top).unwrap();
        assert!(waker.take(), "insert exposes area");

        s.acquire_write().unwrap().commit_all();
        assert!(waker.take(), "inserted surfaces get the waker");
    }

    #[test]
    fn partition_holds_for_random_layouts() {
        let mut seed = 0x9e37_79b9_u32;
        let mut next = move |m: u32| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed % m
        };
        let dir = ZOrderDirectory::new(screen());
        for id in 0..24 {
            let s = surface(
                id,
                i32::try_from(next(600)).unwrap() - 20,
                i32::try_from(next(440)).unwrap() - 20,
                10 + next(200),
                10 + next(200),
                next(4) != 0,
            );
            dir.insert(s, ZPosition::Top).unwrap();
            if next(3) == 0 {
                dir.set_alpha(SurfaceId(id), 0.5).unwrap();
            }
        }
        let list = dir.snapshot();
        assert!(list.verify_partition().is_ok(), "directory output is a partition");
        // Cross-check a grid of pixels: at most one occluding owner each.
        for y in (0..480).step_by(7) {
            for x in (0..640).step_by(7) {
                let p = PixelPoint::new(x, y);
                let owners = list
                    .entries()
                    .iter()
                    .filter(|e| e.occludes() && e.visible_region.contains_point(p))
                    .count();
                assert!(owners <= 1, "pixel {p:?} has {owners} opaque owners");
            }
        }
    }
}
