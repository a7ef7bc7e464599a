//! Annotation model for boxslice.
//!
//! The slicing core works on plain pixel-space bounding boxes grouped per
//! source image. This module defines those types; [`cvat`] parses them out
//! of a CVAT "for images" XML export.

pub mod cvat;

/// An axis-aligned bounding box in source-image pixel coordinates.
///
/// Coordinates are floating point because CVAT exports sub-pixel box edges.
/// A box is only admitted into an [`AnnotationSet`] if
/// [`BoundingBox::is_valid`] holds; malformed boxes are dropped at parse
/// time and counted on the set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from edge coordinates.
    #[inline]
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Returns the width of the box.
    #[inline]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    /// Returns the height of the box.
    #[inline]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Returns the center point of the box.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }

    /// Returns true if the box satisfies the admission invariant:
    /// finite coordinates, non-negative origin, positive extent.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.xmin.is_finite()
            && self.ymin.is_finite()
            && self.xmax.is_finite()
            && self.ymax.is_finite()
            && self.xmin >= 0.0
            && self.ymin >= 0.0
            && self.xmax > self.xmin
            && self.ymax > self.ymin
    }
}

/// One source image's identifier and its ordered list of boxes.
///
/// The name is the lower-cased, trimmed filename from the export; pixel
/// dimensions are not stored here because the decoded raster is
/// authoritative for them.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedImage {
    pub name: String,
    pub boxes: Vec<BoundingBox>,
}

/// All annotated images of one export, ordered by image name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnnotationSet {
    /// Images sorted by name so runs are deterministic.
    pub images: Vec<AnnotatedImage>,

    /// Boxes dropped during parsing for violating the admission invariant.
    pub dropped_boxes: usize,
}

impl AnnotationSet {
    /// Returns the number of annotated images.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Returns true if the set holds no images.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Returns the total number of admitted boxes across all images.
    pub fn box_count(&self) -> usize {
        self.images.iter().map(|image| image.boxes.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_dimensions() {
        let bbox = BoundingBox::new(10.0, 20.0, 100.0, 80.0);
        assert_eq!(bbox.width(), 90.0);
        assert_eq!(bbox.height(), 60.0);
        assert_eq!(bbox.center(), (55.0, 50.0));
    }

    #[test]
    fn bbox_validity() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(BoundingBox::new(3.5, 7.25, 4.0, 8.0).is_valid());

        // negative origin
        assert!(!BoundingBox::new(-1.0, 0.0, 10.0, 10.0).is_valid());
        // inverted and degenerate extents
        assert!(!BoundingBox::new(10.0, 10.0, 5.0, 20.0).is_valid());
        assert!(!BoundingBox::new(10.0, 10.0, 10.0, 20.0).is_valid());
        // non-finite coordinates
        assert!(!BoundingBox::new(f64::NAN, 0.0, 10.0, 10.0).is_valid());
        assert!(!BoundingBox::new(0.0, 0.0, f64::INFINITY, 10.0).is_valid());
    }

    #[test]
    fn set_counts() {
        let set = AnnotationSet {
            images: vec![
                AnnotatedImage {
                    name: "1.jpg".into(),
                    boxes: vec![BoundingBox::new(0.0, 0.0, 5.0, 5.0)],
                },
                AnnotatedImage {
                    name: "2.jpg".into(),
                    boxes: vec![
                        BoundingBox::new(0.0, 0.0, 5.0, 5.0),
                        BoundingBox::new(10.0, 10.0, 20.0, 20.0),
                    ],
                },
            ],
            dropped_boxes: 0,
        };

        assert_eq!(set.len(), 2);
        assert!(!set.is_empty());
        assert_eq!(set.box_count(), 3);
    }
}
