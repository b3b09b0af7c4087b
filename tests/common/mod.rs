#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use serde_json::{json, Value};
use tempfile::TempDir;

/// A scratch directory holding an annotation file and its images.
pub struct Fixture {
    pub dir: TempDir,
    pub annotations: PathBuf,
    pub images_dir: PathBuf,
}

impl Fixture {
    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }
}

pub fn write_jpg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    image.save(path).expect("write jpg file");
}

/// Closed rectangle polygon `[x, y, x + w, y, x + w, y + h, x, y + h]`.
pub fn rect_polygon(x: f64, y: f64, w: f64, h: f64) -> Vec<f64> {
    vec![x, y, x + w, y, x + w, y + h, x, y + h]
}

/// Writes `doc` as the annotation file and a `.jpg` for every image entry.
pub fn fixture(doc: &Value) -> Fixture {
    let dir = tempfile::tempdir().expect("create temp dir");
    let images_dir = dir.path().join("images");
    fs::create_dir_all(&images_dir).expect("create images dir");

    for image in doc["images"].as_array().into_iter().flatten() {
        let (Some(name), Some(width), Some(height)) = (
            image["file_name"].as_str(),
            image["width"].as_u64(),
            image["height"].as_u64(),
        ) else {
            continue;
        };
        let path = images_dir.join(Path::new(name).with_extension("jpg"));
        write_jpg(&path, width as u32, height as u32);
    }

    let annotations = dir.path().join("annotations.json");
    fs::write(&annotations, serde_json::to_vec_pretty(doc).expect("serialize doc"))
        .expect("write annotations");

    Fixture {
        dir,
        annotations,
        images_dir,
    }
}

/// `count` images of `width x height`, ids `0..count`, each with one
/// rectangle polygon annotation of category 1.
pub fn single_object_doc(count: u64, width: u32, height: u32) -> Value {
    let images: Vec<Value> = (0..count)
        .map(|id| json!({"id": id, "file_name": format!("img_{id}.jpg"), "width": width, "height": height}))
        .collect();
    let annotations: Vec<Value> = (0..count)
        .map(|id| {
            let (x, y, w, h) = (4.0 + id as f64, 6.0, 20.0, 12.0);
            json!({
                "id": id + 1,
                "image_id": id,
                "category_id": 1,
                "bbox": [x, y, w, h],
                "iscrowd": 0,
                "segmentation": [rect_polygon(x, y, w, h)],
            })
        })
        .collect();
    json!({
        "categories": [{"id": 1, "name": "cig_butt", "supercategory": "litter"}],
        "images": images,
        "annotations": annotations,
    })
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).expect("read json")).expect("parse json")
}
