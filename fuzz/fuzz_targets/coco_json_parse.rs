//! Fuzz target for COCO annotation parsing.
//!
//! Run with:
//!   cargo +nightly fuzz run coco_json_parse

#![no_main]

use std::path::Path;

use cocoaug::dataset::Dataset;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // 10MB is generous for an annotation file
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = Dataset::from_coco_slice(data, Path::new("images"));
});
