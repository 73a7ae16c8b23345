use crate::error::{CaptureError, CaptureResult};
use crate::render::Plane;

/// Byte sizes of one planar 4:2:0 frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlaneLayout {
    pub width: u32,
    pub height: u32,
}

impl PlaneLayout {
    /// Both dimensions must be even so chroma is exactly a quarter of luma.
    pub fn new(width: u32, height: u32) -> CaptureResult<Self> {
        if width == 0 || height == 0 {
            return Err(CaptureError::InvalidConfig(format!(
                "frame size {width}x{height} must be non-zero"
            )));
        }
        if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
            return Err(CaptureError::InvalidConfig(format!(
                "frame size {width}x{height} must be even for 4:2:0"
            )));
        }
        Ok(Self { width, height })
    }

    #[inline]
    pub fn y_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Length of U or V.
    #[inline]
    pub fn chroma_len(&self) -> usize {
        self.y_len() / 4
    }

    /// `(width, height)` of `plane` at its stream resolution.
    pub fn plane_size(&self, plane: Plane) -> (u32, u32) {
        match plane {
            Plane::Y => (self.width, self.height),
            Plane::U | Plane::V => (self.width / 2, self.height / 2),
        }
    }

    pub fn plane_len(&self, plane: Plane) -> usize {
        match plane {
            Plane::Y => self.y_len(),
            Plane::U | Plane::V => self.chroma_len(),
        }
    }

    /// `W*H + W*H/2`.
    #[inline]
    pub fn frame_bytes(&self) -> usize {
        self.y_len() + 2 * self.chroma_len()
    }
}

/// Host-side buffers for one converted frame, reused across iterations.
#[derive(Debug, Clone)]
pub struct PlaneSet {
    layout: PlaneLayout,
    pub y: Vec<u8>,
    pub u: Vec<u8>,
    pub v: Vec<u8>,
}

impl PlaneSet {
    pub fn new(layout: PlaneLayout) -> Self {
        Self {
            layout,
            y: vec![0; layout.y_len()],
            u: vec![0; layout.chroma_len()],
            v: vec![0; layout.chroma_len()],
        }
    }

    pub fn layout(&self) -> PlaneLayout {
        self.layout
    }

    pub fn plane(&self, plane: Plane) -> &[u8] {
        match plane {
            Plane::Y => &self.y,
            Plane::U => &self.u,
            Plane::V => &self.v,
        }
    }

    pub fn plane_mut(&mut self, plane: Plane) -> &mut [u8] {
        match plane {
            Plane::Y => &mut self.y,
            Plane::U => &mut self.u,
            Plane::V => &mut self.v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_for_800x600() {
        let l = PlaneLayout::new(800, 600).unwrap();
        assert_eq!(l.y_len(), 480_000);
        assert_eq!(l.chroma_len(), 120_000);
        assert_eq!(l.frame_bytes(), 720_000);
        assert_eq!(l.plane_size(Plane::U), (400, 300));
    }

    #[test]
    fn odd_or_empty_sizes_are_rejected() {
        assert!(PlaneLayout::new(0, 600).is_err());
        assert!(PlaneLayout::new(801, 600).is_err());
        assert!(PlaneLayout::new(800, 599).is_err());
    }

    #[test]
    fn plane_set_buffers_match_layout() {
        let set = PlaneSet::new(PlaneLayout::new(64, 32).unwrap());
        for plane in Plane::ALL {
            assert_eq!(set.plane(plane).len(), set.layout().plane_len(plane));
        }
        assert_eq!(set.y.len(), 4 * set.u.len());
        assert_eq!(set.u.len(), set.v.len());
    }
}
