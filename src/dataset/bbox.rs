//! Axis-aligned bounding boxes in pixel space.

/// An axis-aligned bounding box stored as (xmin, ymin, xmax, ymax).
///
/// Coordinates are continuous pixel-edge coordinates with a top-left
/// origin, so a box covering pixel columns `10..=19` has `xmin = 10.0`
/// and `xmax = 20.0`. COCO's `[x, y, width, height]` form is produced and
/// consumed at the IO boundary with [`BBox::from_xywh`] and
/// [`BBox::to_xywh`].
///
/// The constructor does not enforce `min <= max`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BBox {
    #[inline]
    pub fn from_xyxy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Converts from COCO `[x, y, width, height]`.
    #[inline]
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::from_xyxy(x, y, x + width, y + height)
    }

    /// Converts to COCO `[x, y, width, height]`.
    #[inline]
    pub fn to_xywh(&self) -> [f64; 4] {
        [self.xmin, self.ymin, self.width(), self.height()]
    }

    /// Smallest box containing every point, or `None` for an empty slice.
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let mut bbox = Self::from_xyxy(x0, y0, x0, y0);
        for &(x, y) in rest {
            bbox.xmin = bbox.xmin.min(x);
            bbox.ymin = bbox.ymin.min(y);
            bbox.xmax = bbox.xmax.max(x);
            bbox.ymax = bbox.ymax.max(y);
        }
        Some(bbox)
    }

    /// The four corners, clockwise from the top-left.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.xmin, self.ymin),
            (self.xmax, self.ymin),
            (self.xmax, self.ymax),
            (self.xmin, self.ymax),
        ]
    }

    /// Clamps the box to `[0, width] x [0, height]`.
    pub fn clip(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        Self::from_xyxy(
            self.xmin.clamp(0.0, w),
            self.ymin.clamp(0.0, h),
            self.xmax.clamp(0.0, w),
            self.ymax.clamp(0.0, h),
        )
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Returns true if all coordinates are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite()
            && self.ymin.is_finite()
            && self.xmax.is_finite()
            && self.ymax.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_from_xywh() {
        let bbox = BBox::from_xywh(10.0, 20.0, 90.0, 60.0);
        assert_eq!(bbox, BBox::from_xyxy(10.0, 20.0, 100.0, 80.0));
        assert_eq!(bbox.to_xywh(), [10.0, 20.0, 90.0, 60.0]);
        assert_eq!(bbox.area(), 5400.0);
    }

    #[test]
    fn test_bbox_from_points() {
        let bbox = BBox::from_points(&[(5.0, 9.0), (1.0, 3.0), (4.0, 12.0)]).unwrap();
        assert_eq!(bbox, BBox::from_xyxy(1.0, 3.0, 5.0, 12.0));
        assert!(BBox::from_points(&[]).is_none());
    }

    #[test]
    fn test_bbox_clip() {
        let bbox = BBox::from_xyxy(-4.0, 10.0, 130.0, 140.0).clip(128, 128);
        assert_eq!(bbox, BBox::from_xyxy(0.0, 10.0, 128.0, 128.0));
    }

    #[test]
    fn test_bbox_corners_roundtrip() {
        let bbox = BBox::from_xywh(3.0, 4.0, 5.0, 6.0);
        assert_eq!(BBox::from_points(&bbox.corners()), Some(bbox));
    }

    #[test]
    fn test_bbox_is_finite() {
        assert!(BBox::from_xyxy(0.0, 0.0, 1.0, 1.0).is_finite());
        assert!(!BBox::from_xyxy(0.0, f64::NAN, 1.0, 1.0).is_finite());
        assert!(!BBox::from_xyxy(0.0, 0.0, f64::INFINITY, 1.0).is_finite());
    }
}
