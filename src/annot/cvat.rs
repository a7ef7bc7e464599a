//! CVAT XML reader.
//!
//! This adapter supports CVAT "for images" task-export XML:
//! - root `<annotations>` containing `<image>` entries
//! - `<box>` elements only (object-detection bboxes); other annotation
//!   shapes inside an image are ignored
//!
//! Image names are trimmed and lower-cased so they can be matched against
//! an image source regardless of how the export was produced. Boxes that
//! violate the admission invariant are dropped and counted, not errors.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use roxmltree::{Document, Node};

use super::{AnnotatedImage, AnnotationSet, BoundingBox};
use crate::error::BoxsliceError;

/// Read a CVAT XML file into an [`AnnotationSet`].
pub fn read_cvat_xml(path: &Path) -> Result<AnnotationSet, BoxsliceError> {
    let xml = fs::read_to_string(path).map_err(BoxsliceError::Io)?;
    parse_cvat_xml_str(&xml, path)
}

/// Parse CVAT XML from a string.
pub fn from_cvat_xml_str(xml: &str) -> Result<AnnotationSet, BoxsliceError> {
    parse_cvat_xml_str(xml, Path::new("<string>"))
}

fn parse_cvat_xml_str(xml: &str, path: &Path) -> Result<AnnotationSet, BoxsliceError> {
    let document = Document::parse(xml).map_err(|source| BoxsliceError::CvatXmlParse {
        path: path.to_path_buf(),
        message: source.to_string(),
    })?;

    let root = document.root_element();
    if root.tag_name().name() != "annotations" {
        return Err(BoxsliceError::CvatXmlParse {
            path: path.to_path_buf(),
            message: "missing <annotations> root element".to_string(),
        });
    }

    let mut seen_image_names = BTreeSet::new();
    let mut images = Vec::new();
    let mut dropped_boxes = 0;

    for image_node in root
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "image")
    {
        let parsed = parse_image_element(image_node, path, &mut dropped_boxes)?;
        if !seen_image_names.insert(parsed.name.clone()) {
            return Err(BoxsliceError::CvatXmlParse {
                path: path.to_path_buf(),
                message: format!(
                    "duplicate image name: '{}' appears in multiple <image> elements",
                    parsed.name
                ),
            });
        }
        images.push(parsed);
    }

    images.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(AnnotationSet {
        images,
        dropped_boxes,
    })
}

fn parse_image_element(
    node: Node<'_, '_>,
    path: &Path,
    dropped_boxes: &mut usize,
) -> Result<AnnotatedImage, BoxsliceError> {
    let raw_name = required_attr(node, "name", path, "<image>")?;
    let name = raw_name.trim().to_lowercase();
    if name.is_empty() {
        return Err(BoxsliceError::CvatXmlParse {
            path: path.to_path_buf(),
            message: "<image> has an empty name attribute".to_string(),
        });
    }

    // Dimensions must be present and well-formed, but the decoded raster is
    // authoritative for the actual slicing geometry.
    parse_required_u32_attr(node, "width", path, &name)?;
    parse_required_u32_attr(node, "height", path, &name)?;

    let mut boxes = Vec::new();
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() != "box" {
            continue;
        }

        let bbox = parse_box_element(child, path, &name)?;
        if bbox.is_valid() {
            boxes.push(bbox);
        } else {
            *dropped_boxes += 1;
        }
    }

    Ok(AnnotatedImage { name, boxes })
}

fn parse_box_element(
    node: Node<'_, '_>,
    path: &Path,
    image_name: &str,
) -> Result<BoundingBox, BoxsliceError> {
    let xmin = parse_required_f64_attr(node, "xtl", path, image_name)?;
    let ymin = parse_required_f64_attr(node, "ytl", path, image_name)?;
    let xmax = parse_required_f64_attr(node, "xbr", path, image_name)?;
    let ymax = parse_required_f64_attr(node, "ybr", path, image_name)?;
    Ok(BoundingBox::new(xmin, ymin, xmax, ymax))
}

fn required_attr<'a>(
    node: Node<'a, '_>,
    attr: &str,
    path: &Path,
    context: &str,
) -> Result<&'a str, BoxsliceError> {
    node.attribute(attr)
        .ok_or_else(|| BoxsliceError::CvatXmlParse {
            path: path.to_path_buf(),
            message: format!("{context} is missing required attribute '{attr}'"),
        })
}

fn parse_required_u32_attr(
    node: Node<'_, '_>,
    attr: &str,
    path: &Path,
    context: &str,
) -> Result<u32, BoxsliceError> {
    let raw = required_attr(node, attr, path, context)?;
    raw.trim()
        .parse::<u32>()
        .map_err(|_| BoxsliceError::CvatXmlParse {
            path: path.to_path_buf(),
            message: format!("invalid '{attr}' value '{raw}' on image '{context}'; expected u32"),
        })
}

fn parse_required_f64_attr(
    node: Node<'_, '_>,
    attr: &str,
    path: &Path,
    image_name: &str,
) -> Result<f64, BoxsliceError> {
    let raw = required_attr(node, attr, path, image_name)?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| BoxsliceError::CvatXmlParse {
            path: path.to_path_buf(),
            message: format!(
                "invalid '{attr}' value '{raw}' on a box of image '{image_name}'; expected float"
            ),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<annotations>
  <image id="0" name=" 12.JPG " width="100" height="100">
    <box label="object" xtl="40" ytl="40" xbr="46" ybr="46"/>
    <box label="object" xtl="50.5" ytl="50.5" xbr="60.5" ybr="60.5"/>
  </image>
  <image id="1" name="7.jpg" width="640" height="480">
    <box label="object" xtl="-3" ytl="0" xbr="10" ybr="10"/>
    <box label="object" xtl="20" ytl="20" xbr="20" ybr="30"/>
  </image>
</annotations>
"#;

    #[test]
    fn parses_images_sorted_with_normalized_names() {
        let set = from_cvat_xml_str(SAMPLE).expect("parse sample");
        assert_eq!(set.len(), 2);
        assert_eq!(set.images[0].name, "12.jpg");
        assert_eq!(set.images[1].name, "7.jpg");
    }

    #[test]
    fn admits_valid_boxes_and_drops_malformed_ones() {
        let set = from_cvat_xml_str(SAMPLE).expect("parse sample");

        assert_eq!(set.images[0].boxes.len(), 2);
        assert_eq!(
            set.images[0].boxes[0],
            BoundingBox::new(40.0, 40.0, 46.0, 46.0)
        );
        assert_eq!(
            set.images[0].boxes[1],
            BoundingBox::new(50.5, 50.5, 60.5, 60.5)
        );

        // "7.jpg" carried one box with a negative origin and one with zero
        // width; both are dropped.
        assert!(set.images[1].boxes.is_empty());
        assert_eq!(set.dropped_boxes, 2);
    }

    #[test]
    fn ignores_non_box_annotation_shapes() {
        let xml = r#"<annotations>
  <image name="1.jpg" width="10" height="10">
    <polyline label="edge" points="0,0;5,5"/>
    <box label="object" xtl="1" ytl="1" xbr="4" ybr="4"/>
  </image>
</annotations>"#;

        let set = from_cvat_xml_str(xml).expect("parse");
        assert_eq!(set.images[0].boxes.len(), 1);
    }

    #[test]
    fn rejects_wrong_root_element() {
        let err = from_cvat_xml_str("<dataset></dataset>").unwrap_err();
        assert!(matches!(err, BoxsliceError::CvatXmlParse { .. }));
    }

    #[test]
    fn rejects_duplicate_image_names() {
        let xml = r#"<annotations>
  <image name="a.jpg" width="10" height="10"/>
  <image name=" A.JPG " width="10" height="10"/>
</annotations>"#;

        let err = from_cvat_xml_str(xml).unwrap_err();
        assert!(matches!(err, BoxsliceError::CvatXmlParse { .. }));
    }

    #[test]
    fn rejects_missing_box_coordinates() {
        let xml = r#"<annotations>
  <image name="a.jpg" width="10" height="10">
    <box label="object" xtl="1" ytl="1" xbr="4"/>
  </image>
</annotations>"#;

        let err = from_cvat_xml_str(xml).unwrap_err();
        assert!(matches!(err, BoxsliceError::CvatXmlParse { .. }));
    }

    #[test]
    fn rejects_malformed_dimensions() {
        let xml = r#"<annotations>
  <image name="a.jpg" width="wide" height="10"/>
</annotations>"#;

        let err = from_cvat_xml_str(xml).unwrap_err();
        assert!(matches!(err, BoxsliceError::CvatXmlParse { .. }));
    }
}
