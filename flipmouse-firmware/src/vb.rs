use flipmouse_common::globals::{VB_RELEASE_FLAG, VB_SINGLESHOT};

use crate::VB_MAX;

/// Identifier of a virtual button; valid ids are below [`VB_MAX`].
pub type VbId = u8;

/// Marks an action that is not bound to any virtual button.
pub const SINGLESHOT: VbId = VB_SINGLESHOT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Press,
    Release,
}
impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Press => Self::Release,
            Self::Release => Self::Press,
        }
    }

    pub fn is_press(self) -> bool {
        matches!(self, Self::Press)
    }
}

/// A set of directions a binding reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Directions(u8);
impl Directions {
    pub const NONE: Self = Self(0);
    pub const PRESS: Self = Self(1);
    pub const RELEASE: Self = Self(2);
    pub const BOTH: Self = Self(3);

    pub fn contains(self, dir: Direction) -> bool {
        self.0 & Self::from(dir).0 != 0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Direction> {
        [Direction::Press, Direction::Release]
            .into_iter()
            .filter(move |d| self.contains(*d))
    }
}
impl From<Direction> for Directions {
    fn from(dir: Direction) -> Self {
        match dir {
            Direction::Press => Self::PRESS,
            Direction::Release => Self::RELEASE,
        }
    }
}

/// One debounced or raw transition of a virtual button. The release direction is held in bit 7.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VbEdge(u8);
impl VbEdge {
    pub fn new(vb: VbId, dir: Direction) -> Self {
        Self(
            (vb & !VB_RELEASE_FLAG)
                | match dir {
                    Direction::Press => 0,
                    Direction::Release => VB_RELEASE_FLAG,
                },
        )
    }

    pub fn press(vb: VbId) -> Self {
        Self::new(vb, Direction::Press)
    }

    pub fn release(vb: VbId) -> Self {
        Self::new(vb, Direction::Release)
    }

    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    pub fn as_byte(&self) -> u8 {
        self.0
    }

    pub fn vb(&self) -> VbId {
        self.0 & !VB_RELEASE_FLAG
    }

    pub fn direction(&self) -> Direction {
        if self.0 & VB_RELEASE_FLAG == 0 {
            Direction::Press
        } else {
            Direction::Release
        }
    }

    pub fn is_press(&self) -> bool {
        self.direction().is_press()
    }

    pub fn same_vb(&self, other: VbEdge) -> bool {
        self.vb() == other.vb()
    }
}
impl core::fmt::Debug for VbEdge {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("VbEdge")
            .field(&self.vb())
            .field(&self.direction())
            .finish()
    }
}

pub fn is_valid(vb: VbId) -> bool {
    (vb as usize) < VB_MAX
}

#[inline]
pub(crate) fn vb_bit(vb: VbId) -> u32 {
    1 << (vb as u32 & 31)
}

#[cfg(test)]
#[path = "vb_test.rs"]
mod test;
