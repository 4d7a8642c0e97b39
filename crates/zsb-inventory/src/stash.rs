use super::*;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use zsb_core::ID;

/// One item's position in the stash grid. Rotation 1 swaps the footprint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub iid: ID<ItemInstance>,
    pub x: u32,
    pub y: u32,
    pub rotation: u8,
}

/// Axis-aligned cell rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn overlaps(&self, other: &Rect) -> bool {
        !(self.x + self.w <= other.x
            || other.x + other.w <= self.x
            || self.y + self.h <= other.y
            || other.y + other.h <= self.y)
    }
}

/// The character's item grid. Placements are sparse: an item in escrow,
/// or minted into a full stash, owns no placement and stays invisible in
/// the grid until moved.
#[derive(Debug, Clone)]
pub struct Stash {
    pub width: u32,
    pub height: u32,
    placements: HashMap<ID<ItemInstance>, Placement>,
}

impl Stash {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            placements: HashMap::new(),
        }
    }
    pub fn placement(&self, iid: ID<ItemInstance>) -> Option<Placement> {
        self.placements.get(&iid).copied()
    }
    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.placements.values()
    }
    /// Whether a footprint at (x, y) stays inside the grid.
    pub fn in_bounds(&self, x: u32, y: u32, w: u32, h: u32) -> bool {
        x + w <= self.width && y + h <= self.height
    }
    /// Whether a rectangle collides with any placement other than `exclude`.
    /// Footprints of existing placements come from the definition lookup so
    /// rotation is honored on both sides of the comparison.
    pub fn collides<F>(&self, rect: Rect, exclude: Option<ID<ItemInstance>>, footprint: F) -> bool
    where
        F: Fn(ID<ItemInstance>, u8) -> Option<(u32, u32)>,
    {
        self.placements
            .values()
            .filter(|p| Some(p.iid) != exclude)
            .any(|p| match footprint(p.iid, p.rotation) {
                Some((w, h)) => rect.overlaps(&Rect {
                    x: p.x,
                    y: p.y,
                    w,
                    h,
                }),
                None => false,
            })
    }
    /// Inserts or replaces a placement.
    pub fn place(&mut self, placement: Placement) {
        self.placements.insert(placement.iid, placement);
    }
    /// Removes a placement. Silent when absent.
    pub fn remove(&mut self, iid: ID<ItemInstance>) -> Option<Placement> {
        self.placements.remove(&iid)
    }
    /// First-fit scan: y top-down, then x left-to-right, rotation 0 only.
    /// Returns None when no free slot holds the footprint.
    pub fn first_fit<F>(&self, w: u32, h: u32, footprint: F) -> Option<(u32, u32)>
    where
        F: Fn(ID<ItemInstance>, u8) -> Option<(u32, u32)>,
    {
        for y in 0..=self.height.saturating_sub(h) {
            for x in 0..=self.width.saturating_sub(w) {
                let rect = Rect { x, y, w, h };
                if self.in_bounds(x, y, w, h) && !self.collides(rect, None, &footprint) {
                    return Some((x, y));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(w: u32, h: u32) -> impl Fn(ID<ItemInstance>, u8) -> Option<(u32, u32)> {
        move |_, rotation| match rotation {
            0 => Some((w, h)),
            _ => Some((h, w)),
        }
    }

    #[test]
    fn overlap_is_rejected() {
        let a = Rect { x: 0, y: 0, w: 2, h: 2 };
        let b = Rect { x: 1, y: 1, w: 2, h: 2 };
        let c = Rect { x: 2, y: 0, w: 2, h: 2 };
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }
    #[test]
    fn edge_adjacency_is_not_overlap() {
        let a = Rect { x: 0, y: 0, w: 3, h: 1 };
        let b = Rect { x: 0, y: 1, w: 3, h: 1 };
        assert!(!a.overlaps(&b));
    }
    #[test]
    fn collision_respects_rotation_of_existing_placements() {
        let mut stash = Stash::new(10, 10);
        let iid = ID::default();
        // 3x1 item rotated to occupy (0,0)..(1,3)
        stash.place(Placement {
            iid,
            x: 0,
            y: 0,
            rotation: 1,
        });
        let probe = Rect { x: 0, y: 2, w: 1, h: 1 };
        assert!(stash.collides(probe, None, fixed(3, 1)));
        let clear = Rect { x: 1, y: 2, w: 1, h: 1 };
        assert!(!stash.collides(clear, None, fixed(3, 1)));
    }
    #[test]
    fn excluded_item_does_not_collide_with_itself() {
        let mut stash = Stash::new(4, 4);
        let iid = ID::default();
        stash.place(Placement {
            iid,
            x: 0,
            y: 0,
            rotation: 0,
        });
        let rect = Rect { x: 1, y: 0, w: 2, h: 2 };
        assert!(!stash.collides(rect, Some(iid), fixed(2, 2)));
    }
    #[test]
    fn first_fit_scans_rows_before_columns() {
        let mut stash = Stash::new(4, 4);
        stash.place(Placement {
            iid: ID::default(),
            x: 0,
            y: 0,
            rotation: 0,
        });
        // 2x2 blocker at origin: next 2x2 slot on the top row is (2,0)
        assert_eq!(stash.first_fit(2, 2, fixed(2, 2)), Some((2, 0)));
    }
    #[test]
    fn first_fit_fails_when_grid_is_packed() {
        let mut stash = Stash::new(2, 2);
        stash.place(Placement {
            iid: ID::default(),
            x: 0,
            y: 0,
            rotation: 0,
        });
        assert_eq!(stash.first_fit(2, 2, fixed(2, 2)), None);
        assert_eq!(stash.first_fit(1, 1, fixed(2, 2)), None);
    }
}
