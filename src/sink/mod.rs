//! Persistence of slice outputs as an Ultralytics-style dataset directory.
//!
//! Creates `images/` + `labels/` under the output root and writes
//! `data.yaml` describing the single class. Window and label files keep
//! the generated names, so consumers pair them by stem.

use std::fs;
use std::path::Path;

use crate::error::BoxsliceError;
use crate::slice::SliceOutput;

/// Write an in-memory slice output to `root`.
pub fn write_slice_output(
    root: &Path,
    output: &SliceOutput,
    class_name: &str,
) -> Result<(), BoxsliceError> {
    let images_dir = root.join("images");
    let labels_dir = root.join("labels");
    fs::create_dir_all(&images_dir).map_err(BoxsliceError::Io)?;
    fs::create_dir_all(&labels_dir).map_err(BoxsliceError::Io)?;

    for (name, bytes) in &output.images {
        fs::write(images_dir.join(name), bytes).map_err(BoxsliceError::Io)?;
    }

    for (name, text) in &output.labels {
        let mut content = String::with_capacity(text.len() + 1);
        content.push_str(text);
        content.push('\n');
        fs::write(labels_dir.join(name), content).map_err(BoxsliceError::Io)?;
    }

    write_data_yaml(root, class_name)
}

fn write_data_yaml(output_root: &Path, class_name: &str) -> Result<(), BoxsliceError> {
    let yaml = format!("names:\n  0: {}\n", yaml_single_quoted(class_name));
    fs::write(output_root.join("data.yaml"), yaml).map_err(BoxsliceError::Io)
}

fn yaml_single_quoted(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}
