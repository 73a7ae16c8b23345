use crate::error::{CaptureError, CaptureResult};

/// Fixed-depth ring of render slots.
///
/// The driver renders into [`RenderRing::write_index`] while the slot at
/// [`RenderRing::read_index`] holds the oldest completed frame, so reads lag
/// writes by `N - 1` iterations.
#[derive(Debug)]
pub struct RenderRing<T> {
    slots: Vec<T>,
    idx: usize,
}

impl<T> RenderRing<T> {
    pub const MIN_DEPTH: usize = 2;

    /// Builds `depth` slots with `make(slot_index)`.
    pub fn new(depth: usize, mut make: impl FnMut(usize) -> CaptureResult<T>) -> CaptureResult<Self> {
        if depth < Self::MIN_DEPTH {
            return Err(CaptureError::InvalidConfig(format!(
                "ring depth {depth} is below {}",
                Self::MIN_DEPTH
            )));
        }
        let slots = (0..depth).map(&mut make).collect::<CaptureResult<Vec<_>>>()?;
        Ok(Self { slots, idx: 0 })
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn write_index(&self) -> usize {
        self.idx
    }

    /// `(idx + 1) mod N`; never equal to the write index.
    #[inline]
    pub fn read_index(&self) -> usize {
        (self.idx + 1) % self.slots.len()
    }

    /// Moves the write index onto the slot just read.
    pub fn advance(&mut self) {
        self.idx = self.read_index();
    }

    pub fn write_slot(&self) -> &T {
        &self.slots[self.idx]
    }

    pub fn read_slot(&self) -> &T {
        &self.slots[self.read_index()]
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(depth: usize) -> RenderRing<usize> {
        RenderRing::new(depth, Ok).unwrap()
    }

    #[test]
    fn depth_below_two_is_rejected() {
        assert!(RenderRing::new(1, Ok::<usize, _>).is_err());
        assert!(RenderRing::new(0, Ok::<usize, _>).is_err());
    }

    #[test]
    fn two_deep_ring_alternates() {
        let mut r = ring(2);
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push((r.write_index(), r.read_index()));
            r.advance();
        }
        assert_eq!(seen, vec![(0, 1), (1, 0), (0, 1), (1, 0)]);
    }

    #[test]
    fn write_and_read_never_alias() {
        for depth in 2..6 {
            let mut r = ring(depth);
            for _ in 0..(3 * depth) {
                assert_ne!(r.write_index(), r.read_index());
                assert_ne!(r.write_slot(), r.read_slot());
                r.advance();
            }
        }
    }

    #[test]
    fn deeper_ring_visits_every_slot() {
        let mut r = ring(3);
        let order: Vec<usize> = (0..3)
            .map(|_| {
                let i = r.write_index();
                r.advance();
                i
            })
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn construction_errors_propagate() {
        let res = RenderRing::<u8>::new(3, |i| {
            if i == 2 {
                Err(CaptureError::AlreadyInitialized)
            } else {
                Ok(i as u8)
            }
        });
        assert!(matches!(res, Err(CaptureError::AlreadyInitialized)));
    }
}
