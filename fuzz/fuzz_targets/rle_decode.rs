//! Fuzz target for the mask RLE string decoder.

#![no_main]

use cocoaug::mask::rle;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = rle::decode(text, None);
    let _ = rle::decode(text, Some((16, 16)));
});
