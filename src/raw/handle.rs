use core::fmt;
use core::num::NonZero;

// Narrow handles under test so capacity limits are reachable.
#[cfg(test)]
type Repr = u16;
#[cfg(not(test))]
type Repr = u32;

/// Position of a node in its tree's [`Arena`](super::arena::Arena).
///
/// The slot number is stored plus one, so `Option<Handle>` (a missing child, the end of the leaf
/// chain) is the same size as `Handle`.
#[derive(Clone, Copy, Eq, PartialEq)]
#[repr(transparent)]
pub(crate) struct Handle(NonZero<Repr>);

impl Handle {
    /// Largest slot a handle can address.
    pub(crate) const MAX: usize = (Repr::MAX - 1) as usize;

    #[inline]
    pub(crate) const fn at(slot: usize) -> Self {
        assert!(slot <= Self::MAX, "`Handle::at()` - tree holds more nodes than `Handle::MAX`!");
        #[allow(clippy::cast_possible_truncation)]
        let Some(raw) = NonZero::new(slot as Repr + 1) else {
            unreachable!()
        };
        Self(raw)
    }

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self.0.get() as usize - 1
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.slot())
    }
}
