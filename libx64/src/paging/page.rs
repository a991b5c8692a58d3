use core::iter::Step;

use crate::address::VirtualAddr;
use crate::paging::{PageCheck, PageSize};

/// A virtual page of size `N` bytes, identified by its base address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Page<const N: u64>(VirtualAddr)
where
    PageCheck<N>: PageSize;

impl<const N: u64> Page<N>
where
    PageCheck<N>: PageSize,
{
    #[must_use]
    pub const fn containing(addr: VirtualAddr) -> Self {
        Self(addr.align_down(N))
    }

    #[must_use]
    pub const fn ptr(&self) -> VirtualAddr {
        self.0
    }
}

impl<const N: u64> core::fmt::Debug for Page<N>
where
    PageCheck<N>: PageSize,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Page").field(&self.0).finish()
    }
}

impl<const N: u64> Step for Page<N>
where
    PageCheck<N>: PageSize,
{
    fn steps_between(start: &Self, end: &Self) -> Option<usize> {
        if end.0.as_u64() < start.0.as_u64() {
            return None;
        }
        Some(((end.0.as_u64() - start.0.as_u64()) / N) as usize)
    }

    fn forward_checked(start: Self, count: usize) -> Option<Self> {
        Some(Self::containing(VirtualAddr::new(
            start.0.as_u64().checked_add((count as u64).checked_mul(N)?)?,
        )))
    }

    fn backward_checked(start: Self, count: usize) -> Option<Self> {
        Some(Self::containing(VirtualAddr::new(
            start.0.as_u64().checked_sub((count as u64).checked_mul(N)?)?,
        )))
    }
}

/// An exclusive range of contiguous virtual pages.
#[derive(Clone, Copy)]
pub struct PageRange<const N: u64>
where
    PageCheck<N>: PageSize,
{
    start: Page<N>,
    end: Page<N>,
}

impl<const N: u64> PageRange<N>
where
    PageCheck<N>: PageSize,
{
    #[must_use]
    pub const fn new(start: Page<N>, end: Page<N>) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn new_addr(start: VirtualAddr, end: VirtualAddr) -> Self {
        Self::new(Page::containing(start), Page::containing(end))
    }

    #[must_use]
    pub fn with_size(start: VirtualAddr, size: usize) -> Self {
        Self::new_addr(start, start + size as u64)
    }

    #[must_use]
    pub const fn start(&self) -> Page<N> {
        self.start
    }

    #[must_use]
    pub fn len(&self) -> usize {
        Step::steps_between(&self.start, &self.end).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Page<N>> {
        self.start..self.end
    }
}
