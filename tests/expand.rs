use std::collections::BTreeSet;
use std::fs;

use cocoaug::augment::{
    self, AugmentConfig, AugmentError, ExpandOptions, Schedule, TransformKind,
};
use cocoaug::dataset::{Dataset, ImageId};
use cocoaug::mask::{self, rle};
use cocoaug::CocoaugError;
use serde_json::{json, Value};

mod common;

fn seeded(ratio: usize, seed: u64) -> ExpandOptions {
    ExpandOptions {
        ratio,
        seed: Some(seed),
        ..ExpandOptions::default()
    }
}

fn ids(list: &Value) -> Vec<u64> {
    list.as_array()
        .expect("array")
        .iter()
        .map(|v| v["id"].as_u64().expect("id"))
        .collect()
}

#[test]
fn five_images_with_ratio_ten_give_fifty_five_entries() {
    let fx = common::fixture(&common::single_object_doc(5, 64, 48));
    let out = fx.output_dir();
    let mut dataset = Dataset::load(&fx.annotations, &fx.images_dir).expect("load");

    let report = augment::expand(&mut dataset, &out, &seeded(10, 1), &AugmentConfig::default())
        .expect("expand");
    assert_eq!(report.originals, 5);
    assert_eq!(report.variants, 50);
    assert_eq!(report.per_kind.len(), 10);
    assert!(report.per_kind.values().all(|&n| n == 5));

    let doc = common::read_json(&out.join("coco_annotations_augmented.json"));
    assert_eq!(ids(&doc["images"]), (0..55).collect::<Vec<u64>>());
    assert_eq!(
        doc["categories"],
        json!([{"id": 1, "name": "cig_butt", "supercategory": "litter"}])
    );

    let annotation_ids = ids(&doc["annotations"]);
    assert_eq!(annotation_ids.len(), 55);
    assert_eq!(annotation_ids.iter().collect::<BTreeSet<_>>().len(), 55);
    assert!(annotation_ids.windows(2).all(|w| w[0] < w[1]));

    for image in doc["images"].as_array().expect("images") {
        let id = image["id"].as_u64().expect("id");
        let name = image["file_name"].as_str().expect("file_name");
        if id < 5 {
            assert_eq!(name, format!("{id:08}.jpg"));
        } else {
            assert_eq!(name, format!("{id}.jpg"));
        }
        assert!(out.join("augmented").join(name).is_file(), "{name}");
    }

    for ann in doc["annotations"].as_array().expect("annotations") {
        let synthetic = ann["image_id"].as_u64().expect("image_id") >= 5;
        assert_eq!(ann["iscrowd"].as_u64(), Some(u64::from(synthetic)));
    }

    // Synthetic records were appended, originals untouched
    assert_eq!(dataset.len(), 55);
    assert_eq!(
        dataset.image(ImageId::new(0)).expect("original").file_name,
        "img_0.jpg"
    );
    assert_eq!(dataset.image(ImageId::new(54)).expect("synthetic").annotations.len(), 1);
}

#[test]
fn flip_mirrors_bbox_consistently_with_mask() {
    let doc = json!({
        "categories": [{"id": 1, "name": "cig_butt"}],
        "images": [{"id": 0, "file_name": "wide.jpg", "width": 512, "height": 200}],
        "annotations": [{
            "id": 1, "image_id": 0, "category_id": 1, "bbox": [100, 50, 40, 60], "iscrowd": 0,
            "segmentation": [common::rect_polygon(100.0, 50.0, 40.0, 60.0)],
        }],
    });
    let fx = common::fixture(&doc);
    let out = fx.output_dir();
    let mut dataset = Dataset::load(&fx.annotations, &fx.images_dir).expect("load");
    let options = ExpandOptions {
        ratio: 1,
        seed: Some(0),
        schedule: Schedule::Cycle(vec![TransformKind::FlipLr]),
        ..ExpandOptions::default()
    };
    augment::expand(&mut dataset, &out, &options, &AugmentConfig::default()).expect("expand");

    let doc = common::read_json(&out.join("coco_annotations_augmented.json"));
    let flipped = doc["annotations"]
        .as_array()
        .expect("annotations")
        .iter()
        .find(|ann| ann["image_id"] == json!(1))
        .expect("variant annotation");
    assert_eq!(flipped["bbox"], json!([372.0, 50.0, 40.0, 60.0]));
    assert_eq!(flipped["area"], json!(2400.0));

    let code = flipped["segmentation"][0].as_str().expect("rle string");
    let mask = rle::decode(code, Some((200, 512))).expect("decode");
    let extent = mask::bbox(&mask).expect("foreground");
    assert_eq!(extent.to_xywh(), [372.0, 50.0, 40.0, 60.0]);
}

#[test]
fn unknown_mode_index_fails_before_writing() {
    let fx = common::fixture(&common::single_object_doc(2, 32, 32));
    let out = fx.output_dir();
    let mut dataset = Dataset::load(&fx.annotations, &fx.images_dir).expect("load");

    let err = augment::expand(&mut dataset, &out, &seeded(11, 1), &AugmentConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        CocoaugError::Augment(AugmentError::UnknownTransform(11))
    ));
    assert!(!out.join("augmented").exists());
    assert!(!out.join("coco_annotations_augmented.json").exists());
    assert_eq!(dataset.len(), 2);
}

#[test]
fn cyclic_schedule_allows_large_ratios() {
    let fx = common::fixture(&common::single_object_doc(1, 32, 32));
    let out = fx.output_dir();
    let mut dataset = Dataset::load(&fx.annotations, &fx.images_dir).expect("load");
    let options = ExpandOptions {
        ratio: 12,
        seed: Some(5),
        schedule: Schedule::Cycle(vec![TransformKind::Rot90, TransformKind::Sharpen]),
        ..ExpandOptions::default()
    };

    let report =
        augment::expand(&mut dataset, &out, &options, &AugmentConfig::default()).expect("expand");
    assert_eq!(report.variants, 12);
    assert_eq!(report.per_kind[&TransformKind::Rot90], 6);
    assert_eq!(report.per_kind[&TransformKind::Sharpen], 6);
    assert_eq!(dataset.len(), 13);
}

#[test]
fn seeded_runs_are_reproducible() {
    let fx = common::fixture(&common::single_object_doc(2, 40, 30));
    let first = fx.dir.path().join("first");
    let second = fx.dir.path().join("second");

    for out in [&first, &second] {
        let mut dataset = Dataset::load(&fx.annotations, &fx.images_dir).expect("load");
        augment::expand(&mut dataset, out, &seeded(10, 42), &AugmentConfig::default())
            .expect("expand");
    }

    let name = "coco_annotations_augmented.json";
    assert_eq!(
        fs::read(first.join(name)).expect("first json"),
        fs::read(second.join(name)).expect("second json")
    );
    for id in 2..22 {
        let file = format!("augmented/{id}.jpg");
        assert_eq!(
            fs::read(first.join(&file)).expect("first image"),
            fs::read(second.join(&file)).expect("second image"),
            "{file}"
        );
    }
}

#[test]
fn images_without_annotations_are_copied_without_variants() {
    let mut doc = common::single_object_doc(2, 32, 32);
    doc["images"]
        .as_array_mut()
        .expect("images")
        .push(json!({"id": 2, "file_name": "empty.jpg", "width": 32, "height": 32}));
    let fx = common::fixture(&doc);
    let out = fx.output_dir();
    let mut dataset = Dataset::load(&fx.annotations, &fx.images_dir).expect("load");

    let report =
        augment::expand(&mut dataset, &out, &seeded(3, 9), &AugmentConfig::default()).expect("expand");
    assert_eq!(report.originals, 3);
    assert_eq!(report.variants, 6);
    assert_eq!(report.skipped, vec![ImageId::new(2)]);
    assert!(out.join("augmented/00000002.jpg").is_file());

    let written = common::read_json(&out.join("coco_annotations_augmented.json"));
    // Originals 0..=2, variants from 3
    assert_eq!(ids(&written["images"]), (0..9).collect::<Vec<u64>>());
}

#[test]
fn synthetic_ids_skip_past_sparse_original_ids() {
    let doc = json!({
        "categories": [{"id": 1, "name": "cig_butt"}],
        "images": [
            {"id": 3, "file_name": "a.jpg", "width": 24, "height": 24},
            {"id": 40, "file_name": "b.jpg", "width": 24, "height": 24},
        ],
        "annotations": [
            {"id": 100, "image_id": 3, "category_id": 1, "bbox": [2, 2, 8, 8], "iscrowd": 0,
             "segmentation": [common::rect_polygon(2.0, 2.0, 8.0, 8.0)]},
            {"id": 7, "image_id": 40, "category_id": 1, "bbox": [2, 2, 8, 8], "iscrowd": 0,
             "segmentation": [common::rect_polygon(2.0, 2.0, 8.0, 8.0)]},
        ],
    });
    let fx = common::fixture(&doc);
    let out = fx.output_dir();
    let mut dataset = Dataset::load(&fx.annotations, &fx.images_dir).expect("load");
    augment::expand(&mut dataset, &out, &seeded(2, 0), &AugmentConfig::default()).expect("expand");

    let written = common::read_json(&out.join("coco_annotations_augmented.json"));
    assert_eq!(ids(&written["images"]), vec![3, 40, 41, 42, 43, 44]);
    assert_eq!(ids(&written["annotations"]), vec![7, 100, 101, 102, 103, 104]);
}

#[test]
fn variants_reload_as_crowd_annotations() {
    let fx = common::fixture(&common::single_object_doc(1, 48, 36));
    let out = fx.output_dir();
    let mut dataset = Dataset::load(&fx.annotations, &fx.images_dir).expect("load");
    augment::expand(&mut dataset, &out, &seeded(10, 3), &AugmentConfig::default()).expect("expand");

    let reloaded = Dataset::load(
        &out.join("coco_annotations_augmented.json"),
        &out.join("augmented"),
    )
    .expect("reload");
    assert_eq!(reloaded.len(), 11);
    for record in reloaded.images().filter(|r| r.id.as_u64() > 0) {
        let volume = reloaded.load_mask(record.id).expect("variant mask");
        assert_eq!(volume.depth(), 1);
        assert_eq!(record.annotations[0].iscrowd(), 1);
        let pixels = reloaded.load_image(record.id).expect("variant image");
        assert_eq!(pixels.dimensions(), (record.width, record.height));
    }
}

#[test]
fn preview_writes_one_overlay_per_variant() {
    let fx = common::fixture(&common::single_object_doc(2, 40, 30));
    let out = fx.output_dir();
    let mut dataset = Dataset::load(&fx.annotations, &fx.images_dir).expect("load");
    let options = ExpandOptions {
        preview: true,
        ..seeded(3, 4)
    };
    augment::expand(&mut dataset, &out, &options, &AugmentConfig::default()).expect("expand");

    let mut previews: Vec<String> = fs::read_dir(out.join("augmented/preview"))
        .expect("preview dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    previews.sort();
    assert_eq!(previews, vec!["2.jpg", "3.jpg", "4.jpg", "5.jpg", "6.jpg", "7.jpg"]);

    let doc = common::read_json(&out.join("coco_annotations_augmented.json"));
    assert_eq!(ids(&doc["images"]), (0..8).collect::<Vec<u64>>());
}

#[test]
fn preview_is_off_by_default() {
    let fx = common::fixture(&common::single_object_doc(1, 32, 32));
    let out = fx.output_dir();
    let mut dataset = Dataset::load(&fx.annotations, &fx.images_dir).expect("load");
    augment::expand(&mut dataset, &out, &seeded(2, 1), &AugmentConfig::default()).expect("expand");
    assert!(!out.join("augmented/preview").exists());
}
