#![allow(dead_code)]

use image::{GrayImage, Luma};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Binary masks of 1..=max_side pixels per side with arbitrary density.
pub fn arb_mask(max_side: u32) -> impl Strategy<Value = GrayImage> {
    (1..=max_side, 1..=max_side).prop_flat_map(|(width, height)| {
        prop::collection::vec(0u8..=1, (width * height) as usize).prop_map(move |data| {
            GrayImage::from_raw(width, height, data).expect("buffer matches shape")
        })
    })
}

/// Masks made of a few long runs, which exercise large counts and deltas.
pub fn arb_blocky_mask(max_side: u32) -> impl Strategy<Value = GrayImage> {
    (1..=max_side, 1..=max_side, prop::collection::vec(any::<u16>(), 0..8)).prop_map(
        |(width, height, cuts)| {
            let len = (width * height) as usize;
            let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c as usize % len).collect();
            cuts.sort_unstable();
            GrayImage::from_fn(width, height, |x, y| {
                let i = (y * width + x) as usize;
                Luma([(cuts.iter().filter(|&&c| c <= i).count() % 2) as u8])
            })
        },
    )
}
