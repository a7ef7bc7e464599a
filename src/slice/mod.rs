//! The windowing/resampling core.
//!
//! Given one decoded image and its bounding boxes, each box seeds a
//! `window_size × window_size` crop placed around it with jitter. Boxes
//! that land fully inside a crop are rewritten in window-local normalized
//! coordinates; crops that retain no box are discarded. The result is a
//! pair of name-keyed mappings (encoded window rasters and label text)
//! whose stems line up one-to-one.
//!
//! Window geometry near the image border is realized by clipping the crop
//! and padding the raster back to size with zeros on the top and left
//! edges only. The asymmetry is part of the output contract: projected
//! label coordinates account for exactly this padding.

mod jitter;
mod report;

pub use jitter::{Jitter, NoJitter, RandomJitter};
pub use report::{SliceIssue, SliceIssueCode, SliceReport, SliceSeverity};

use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;

use image::{imageops, DynamicImage, GenericImageView, ImageFormat, RgbImage};

use crate::annot::{AnnotationSet, BoundingBox};
use crate::error::BoxsliceError;
use crate::source::ImageSource;

/// Default edge length of a training window, in pixels.
pub const DEFAULT_WINDOW_SIZE: u32 = 256;

/// Options for slicing a dataset.
#[derive(Clone, Debug)]
pub struct SliceOptions {
    /// Edge length of the square windows.
    pub window_size: u32,

    /// Inclusive numeric range of image stems to slice; images outside it
    /// are not submitted to the core.
    pub training_range: Option<(u64, u64)>,
}

impl Default for SliceOptions {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            training_range: None,
        }
    }
}

/// A realized crop region in source-image coordinates.
///
/// `x_start..x_end` and `y_start..y_end` cover at most `window_size` pixels
/// per axis; the paddings record how far the raster must be extended (top
/// and left only) to reach exactly `window_size × window_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowPlan {
    pub x_start: u32,
    pub y_start: u32,
    pub x_end: u32,
    pub y_end: u32,
    pub top_padding: u32,
    pub left_padding: u32,
}

impl WindowPlan {
    /// Width of the clipped crop region.
    #[inline]
    pub fn crop_width(&self) -> u32 {
        self.x_end - self.x_start
    }

    /// Height of the clipped crop region.
    #[inline]
    pub fn crop_height(&self) -> u32 {
        self.y_end - self.y_start
    }
}

/// A bounding box re-expressed in window-local normalized coordinates.
///
/// All geometry fields are fractions of the window size in `[0, 1]`. The
/// class id is always 0: the output format assumes a single-class dataset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectedLabel {
    pub class_id: u32,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl ProjectedLabel {
    /// Map the label back to source-image pixel coordinates given the
    /// window geometry it was projected through.
    pub fn to_source(&self, plan: &WindowPlan, window_size: u32) -> BoundingBox {
        let ws = f64::from(window_size);
        let cx = self.x_center * ws - f64::from(plan.left_padding) + f64::from(plan.x_start);
        let cy = self.y_center * ws - f64::from(plan.top_padding) + f64::from(plan.y_start);
        let w = self.width * ws;
        let h = self.height * ws;
        BoundingBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }
}

impl fmt::Display for ProjectedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.class_id, self.x_center, self.y_center, self.width, self.height
        )
    }
}

/// The in-memory output of slicing: encoded window rasters and label text
/// blocks, keyed by generated name. Stems pair the two maps one-to-one.
#[derive(Clone, Debug, Default)]
pub struct SliceOutput {
    pub images: BTreeMap<String, Vec<u8>>,
    pub labels: BTreeMap<String, String>,
}

impl SliceOutput {
    /// Returns true if no window was emitted.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Merge another output into this one.
    pub fn extend(&mut self, other: SliceOutput) {
        self.images.extend(other.images);
        self.labels.extend(other.labels);
    }
}

/// Compute a window placement for one seed box, or `None` if the box is
/// larger than the window on either axis.
///
/// The candidate top-left corner is the box origin shifted by a jitter
/// offset of at most half the free space per axis, clamped to the image;
/// the window is then clipped to the image bounds and the shortfall is
/// recorded as top/left padding.
pub fn plan_window(
    seed: &BoundingBox,
    image_width: u32,
    image_height: u32,
    window_size: u32,
    jitter: &mut dyn Jitter,
) -> Option<WindowPlan> {
    let ws = f64::from(window_size);
    if seed.width() > ws || seed.height() > ws {
        return None;
    }

    let slack_x = ((ws - seed.width()) / 2.0).floor() as i64;
    let slack_y = ((ws - seed.height()) / 2.0).floor() as i64;

    let x_start =
        (seed.xmin.floor() as i64 - jitter.draw(slack_x)).clamp(0, i64::from(image_width)) as u32;
    let y_start =
        (seed.ymin.floor() as i64 - jitter.draw(slack_y)).clamp(0, i64::from(image_height)) as u32;

    let x_end = image_width.min(x_start.saturating_add(window_size));
    let y_end = image_height.min(y_start.saturating_add(window_size));

    Some(WindowPlan {
        x_start,
        y_start,
        x_end,
        y_end,
        top_padding: window_size - (y_end - y_start),
        left_padding: window_size - (x_end - x_start),
    })
}

/// Extract the planned crop and pad it to an exact
/// `window_size × window_size` raster with zeros on the top/left edges.
pub fn realize_window(image: &DynamicImage, plan: &WindowPlan, window_size: u32) -> RgbImage {
    let crop = image
        .crop_imm(plan.x_start, plan.y_start, plan.crop_width(), plan.crop_height())
        .to_rgb8();

    let mut canvas = RgbImage::new(window_size, window_size);
    imageops::replace(
        &mut canvas,
        &crop,
        i64::from(plan.left_padding),
        i64::from(plan.top_padding),
    );
    canvas
}

/// Project every box fully contained in the plan's pre-padding crop bounds
/// into window-local normalized coordinates, in source-list order.
///
/// The candidate set is the image's whole box list, not just the seed box;
/// a window picks up neighboring boxes for free when they fit.
pub fn project_labels(
    boxes: &[BoundingBox],
    plan: &WindowPlan,
    window_size: u32,
) -> Vec<ProjectedLabel> {
    let ws = f64::from(window_size);
    let x_start = f64::from(plan.x_start);
    let y_start = f64::from(plan.y_start);
    let x_end = f64::from(plan.x_end);
    let y_end = f64::from(plan.y_end);
    let left = f64::from(plan.left_padding);
    let top = f64::from(plan.top_padding);

    boxes
        .iter()
        .filter(|b| b.xmin >= x_start && b.ymin >= y_start && b.xmax <= x_end && b.ymax <= y_end)
        .map(|b| ProjectedLabel {
            class_id: 0,
            x_center: ((b.xmin + b.xmax) / 2.0 - x_start + left) / ws,
            y_center: ((b.ymin + b.ymax) / 2.0 - y_start + top) / ws,
            width: b.width() / ws,
            height: b.height() / ws,
        })
        .collect()
}

/// Slice one image into windows.
///
/// Every box seeds one candidate window; oversized boxes and windows that
/// retain no label contribute nothing and are recorded on the report. The
/// per-image window counter only advances for emitted windows, so output
/// names are contiguous: `<stem>-1`, `<stem>-2`, ...
pub fn slice_image(
    name: &str,
    image: &DynamicImage,
    boxes: &[BoundingBox],
    window_size: u32,
    jitter: &mut dyn Jitter,
    report: &mut SliceReport,
) -> Result<SliceOutput, BoxsliceError> {
    let (stem, ext) = split_name(name);
    let format = ImageFormat::from_extension(ext).unwrap_or(ImageFormat::Jpeg);

    let mut output = SliceOutput::default();
    let mut counter: usize = 1;

    for seed in boxes {
        let Some(plan) = plan_window(seed, image.width(), image.height(), window_size, jitter)
        else {
            report.boxes_rejected += 1;
            report.add(SliceIssue::warning(
                SliceIssueCode::OversizedBox,
                format!(
                    "box {:.0}x{:.0} in '{}' exceeds window size {}",
                    seed.width(),
                    seed.height(),
                    name,
                    window_size
                ),
            ));
            continue;
        };

        let labels = project_labels(boxes, &plan, window_size);
        if labels.is_empty() {
            report.windows_discarded += 1;
            continue;
        }

        let raster = realize_window(image, &plan, window_size);
        let mut encoded = Cursor::new(Vec::new());
        raster
            .write_to(&mut encoded, format)
            .map_err(|source| BoxsliceError::ImageEncode {
                name: name.to_string(),
                source,
            })?;

        output
            .images
            .insert(format!("{stem}-{counter}.{ext}"), encoded.into_inner());
        output
            .labels
            .insert(format!("{stem}-{counter}.txt"), render_labels(&labels));

        report.windows_emitted += 1;
        report.labels_emitted += labels.len();
        counter += 1;
    }

    Ok(output)
}

/// Slice every image of an annotation set, loading rasters from `source`.
///
/// Images outside the configured training range are not submitted; images
/// that fail to load or decode are skipped with a warning. Nothing an
/// individual image does stops the run.
pub fn slice_dataset(
    annotations: &AnnotationSet,
    source: &ImageSource,
    options: &SliceOptions,
    jitter: &mut dyn Jitter,
) -> Result<(SliceOutput, SliceReport), BoxsliceError> {
    if options.window_size == 0 {
        return Err(BoxsliceError::InvalidWindowSize);
    }

    let mut output = SliceOutput::default();
    let mut report = SliceReport::new();

    for entry in &annotations.images {
        if let Some((lo, hi)) = options.training_range {
            match numeric_stem(&entry.name) {
                Some(index) if (lo..=hi).contains(&index) => {}
                Some(_) => continue,
                None => {
                    report.add(SliceIssue::warning(
                        SliceIssueCode::NonNumericStem,
                        format!(
                            "'{}' has no numeric stem; excluded from training range {}..{}",
                            entry.name, lo, hi
                        ),
                    ));
                    continue;
                }
            }
        }

        report.images_in += 1;

        let image = match source.load(&entry.name) {
            Ok(image) => image,
            Err(err) => {
                report.images_skipped += 1;
                report.add(SliceIssue::warning(
                    SliceIssueCode::ImageLoadFailed,
                    err.to_string(),
                ));
                continue;
            }
        };

        let sliced = slice_image(
            &entry.name,
            &image,
            &entry.boxes,
            options.window_size,
            jitter,
            &mut report,
        )?;

        if !sliced.is_empty() {
            report.images_sliced += 1;
        }
        output.extend(sliced);
    }

    Ok((output, report))
}

fn render_labels(labels: &[ProjectedLabel]) -> String {
    labels
        .iter()
        .map(ProjectedLabel::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_name(name: &str) -> (&str, &str) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, ext),
        _ => (name, "jpg"),
    }
}

fn numeric_stem(name: &str) -> Option<u64> {
    split_name(name).0.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    /// Offsets pinned to a constant, ignoring slack. Lets tests force
    /// placements (e.g. a window that cuts its own seed box).
    struct Fixed(i64);

    impl Jitter for Fixed {
        fn draw(&mut self, _slack: i64) -> i64 {
            self.0
        }
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([x as u8, y as u8, 0])
        }))
    }

    fn bbox(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> BoundingBox {
        BoundingBox::new(xmin, ymin, xmax, ymax)
    }

    #[test]
    fn centered_window_with_zero_jitter() {
        let seed = bbox(40.0, 40.0, 46.0, 46.0);
        let plan = plan_window(&seed, 100, 100, 50, &mut NoJitter).expect("box fits window");

        assert_eq!(
            plan,
            WindowPlan {
                x_start: 40,
                y_start: 40,
                x_end: 90,
                y_end: 90,
                top_padding: 0,
                left_padding: 0,
            }
        );
    }

    #[test]
    fn window_clipped_at_border_is_padded_top_left() {
        let seed = bbox(10.0, 10.0, 20.0, 20.0);
        let plan = plan_window(&seed, 40, 40, 50, &mut NoJitter).expect("box fits window");

        assert_eq!(plan.x_start, 10);
        assert_eq!(plan.x_end, 40);
        assert_eq!(plan.left_padding, 20);
        assert_eq!(plan.top_padding, 20);
        assert_eq!(plan.crop_width(), 30);
    }

    #[test]
    fn oversized_box_yields_no_plan() {
        let wide = bbox(0.0, 0.0, 60.0, 20.0);
        let tall = bbox(0.0, 0.0, 20.0, 50.5);
        assert!(plan_window(&wide, 100, 100, 50, &mut NoJitter).is_none());
        assert!(plan_window(&tall, 100, 100, 50, &mut NoJitter).is_none());

        // exactly window-sized is allowed and leaves zero slack
        let exact = bbox(10.0, 10.0, 60.0, 60.0);
        let plan = plan_window(&exact, 100, 100, 50, &mut RandomJitter::seeded(1)).unwrap();
        assert_eq!(plan.x_start, 10);
        assert_eq!(plan.y_start, 10);
    }

    #[test]
    fn jitter_offsets_shift_the_window() {
        let seed = bbox(40.0, 40.0, 46.0, 46.0);
        let plan = plan_window(&seed, 100, 100, 50, &mut Fixed(5)).unwrap();
        assert_eq!(plan.x_start, 35);
        assert_eq!(plan.y_start, 35);

        // a shift past the image origin clamps to zero
        let plan = plan_window(&seed, 100, 100, 50, &mut Fixed(60)).unwrap();
        assert_eq!(plan.x_start, 0);
        assert_eq!(plan.y_start, 0);
    }

    #[test]
    fn projection_matches_hand_computed_fixture() {
        let boxes = vec![bbox(40.0, 40.0, 46.0, 46.0)];
        let plan = plan_window(&boxes[0], 100, 100, 50, &mut NoJitter).unwrap();
        let labels = project_labels(&boxes, &plan, 50);

        assert_eq!(labels.len(), 1);
        let label = labels[0];
        assert_eq!(label.class_id, 0);
        assert!((label.x_center - 0.06).abs() < 1e-12);
        assert!((label.y_center - 0.06).abs() < 1e-12);
        assert!((label.width - 0.12).abs() < 1e-12);
        assert!((label.height - 0.12).abs() < 1e-12);
    }

    #[test]
    fn projection_accounts_for_padding() {
        let boxes = vec![bbox(10.0, 10.0, 20.0, 20.0)];
        let plan = plan_window(&boxes[0], 40, 40, 50, &mut NoJitter).unwrap();
        let labels = project_labels(&boxes, &plan, 50);

        assert_eq!(labels.len(), 1);
        assert!((labels[0].x_center - 0.5).abs() < 1e-12);
        assert!((labels[0].y_center - 0.5).abs() < 1e-12);
        assert!((labels[0].width - 0.2).abs() < 1e-12);
    }

    #[test]
    fn window_captures_contained_neighbors_only() {
        let boxes = vec![
            bbox(40.0, 40.0, 46.0, 46.0),
            bbox(50.0, 50.0, 60.0, 60.0),
            bbox(2.0, 2.0, 8.0, 8.0),
        ];
        let plan = plan_window(&boxes[0], 100, 100, 50, &mut NoJitter).unwrap();
        let labels = project_labels(&boxes, &plan, 50);

        // the seed and its in-window neighbor, not the far-away box
        assert_eq!(labels.len(), 2);
        assert!((labels[1].x_center - 0.3).abs() < 1e-12);
    }

    #[test]
    fn shifted_window_can_lose_its_seed() {
        let boxes = vec![bbox(10.0, 10.0, 20.0, 20.0)];
        let plan = plan_window(&boxes[0], 100, 100, 30, &mut Fixed(-10)).unwrap();

        assert_eq!(plan.x_start, 20);
        assert!(project_labels(&boxes, &plan, 30).is_empty());
    }

    #[test]
    fn labels_round_trip_to_source_coordinates() {
        let boxes = vec![bbox(12.25, 33.5, 47.75, 61.0)];
        let plan = plan_window(&boxes[0], 80, 80, 64, &mut Fixed(3)).unwrap();
        let labels = project_labels(&boxes, &plan, 64);
        assert_eq!(labels.len(), 1);

        let restored = labels[0].to_source(&plan, 64);
        assert!((restored.xmin - 12.25).abs() < 1e-9);
        assert!((restored.ymin - 33.5).abs() < 1e-9);
        assert!((restored.xmax - 47.75).abs() < 1e-9);
        assert!((restored.ymax - 61.0).abs() < 1e-9);
    }

    #[test]
    fn realized_raster_is_exact_window_size_with_zero_padding() {
        let image = gradient(40, 40);
        let plan = plan_window(&bbox(10.0, 10.0, 20.0, 20.0), 40, 40, 50, &mut NoJitter).unwrap();
        let raster = realize_window(&image, &plan, 50);

        assert_eq!(raster.dimensions(), (50, 50));
        // padding region is zeroed, content starts at (left, top)
        assert_eq!(raster.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(raster.get_pixel(19, 19), &Rgb([0, 0, 0]));
        assert_eq!(raster.get_pixel(20, 20), &Rgb([10, 10, 0]));
        assert_eq!(raster.get_pixel(49, 49), &Rgb([39, 39, 0]));
    }

    #[test]
    fn interior_window_copies_source_pixels() {
        let image = gradient(100, 100);
        let plan = plan_window(&bbox(40.0, 40.0, 46.0, 46.0), 100, 100, 50, &mut NoJitter).unwrap();
        let raster = realize_window(&image, &plan, 50);

        assert_eq!(raster.dimensions(), (50, 50));
        assert_eq!(raster.get_pixel(0, 0), &Rgb([40, 40, 0]));
        assert_eq!(raster.get_pixel(49, 49), &Rgb([89, 89, 0]));
    }

    #[test]
    fn slice_image_names_windows_sequentially() {
        let image = gradient(100, 100);
        let boxes = vec![bbox(40.0, 40.0, 46.0, 46.0), bbox(50.0, 50.0, 60.0, 60.0)];
        let mut report = SliceReport::new();

        let output =
            slice_image("12.jpg", &image, &boxes, 50, &mut NoJitter, &mut report).unwrap();

        let image_names: Vec<&String> = output.images.keys().collect();
        let label_names: Vec<&String> = output.labels.keys().collect();
        assert_eq!(image_names, ["12-1.jpg", "12-2.jpg"]);
        assert_eq!(label_names, ["12-1.txt", "12-2.txt"]);
        assert_eq!(report.windows_emitted, 2);
        assert_eq!(report.labels_emitted, 3);
    }

    #[test]
    fn slice_image_skips_oversized_without_consuming_a_name() {
        let image = gradient(100, 100);
        let boxes = vec![
            bbox(0.0, 0.0, 80.0, 20.0),
            bbox(40.0, 40.0, 46.0, 46.0),
        ];
        let mut report = SliceReport::new();

        let output =
            slice_image("12.jpg", &image, &boxes, 50, &mut NoJitter, &mut report).unwrap();

        assert_eq!(output.images.len(), 1);
        assert!(output.images.contains_key("12-1.jpg"));
        assert_eq!(report.boxes_rejected, 1);
    }

    #[test]
    fn discarded_window_emits_nothing() {
        let image = gradient(100, 100);
        let boxes = vec![bbox(10.0, 10.0, 20.0, 20.0)];
        let mut report = SliceReport::new();

        let output =
            slice_image("12.jpg", &image, &boxes, 30, &mut Fixed(-10), &mut report).unwrap();

        assert!(output.is_empty());
        assert!(output.labels.is_empty());
        assert_eq!(report.windows_discarded, 1);
        assert_eq!(report.windows_emitted, 0);
    }

    #[test]
    fn label_text_is_newline_joined_natural_decimals() {
        let image = gradient(100, 100);
        let boxes = vec![bbox(40.0, 40.0, 46.0, 46.0), bbox(50.0, 50.0, 60.0, 60.0)];
        let mut report = SliceReport::new();

        let output =
            slice_image("12.jpg", &image, &boxes, 50, &mut NoJitter, &mut report).unwrap();

        assert_eq!(
            output.labels["12-1.txt"],
            "0 0.06 0.06 0.12 0.12\n0 0.3 0.3 0.2 0.2"
        );
        assert_eq!(output.labels["12-2.txt"], "0 0.1 0.1 0.2 0.2");
    }

    #[test]
    fn emitted_bytes_decode_to_window_sized_rasters() {
        let image = gradient(100, 100);
        let boxes = vec![bbox(40.0, 40.0, 46.0, 46.0)];
        let mut report = SliceReport::new();

        let output =
            slice_image("12.png", &image, &boxes, 50, &mut NoJitter, &mut report).unwrap();

        let decoded = image::load_from_memory(&output.images["12-1.png"]).expect("decode window");
        assert_eq!(decoded.dimensions(), (50, 50));
        // png is lossless, so the content survives the encode exactly
        assert_eq!(decoded.to_rgb8().get_pixel(0, 0), &Rgb([40, 40, 0]));
    }

    #[test]
    fn extensionless_names_fall_back_to_jpg() {
        assert_eq!(split_name("12.jpg"), ("12", "jpg"));
        assert_eq!(split_name("photo.PNG"), ("photo", "PNG"));
        assert_eq!(split_name("12"), ("12", "jpg"));
        assert_eq!(split_name(".hidden"), (".hidden", "jpg"));
    }

    #[test]
    fn numeric_stem_parses_only_whole_integers() {
        assert_eq!(numeric_stem("12.jpg"), Some(12));
        assert_eq!(numeric_stem("0.png"), Some(0));
        assert_eq!(numeric_stem("img12.jpg"), None);
        assert_eq!(numeric_stem("12a.jpg"), None);
    }
}
