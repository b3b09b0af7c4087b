use cocoaug::mask::{self, rle};
use proptest::prelude::*;

mod proptest_helpers;

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn rle_roundtrip_restores_mask(m in proptest_helpers::arb_mask(24)) {
        let code = rle::encode(&m).expect("encode binary mask");
        let decoded = rle::decode(&code, Some((m.height(), m.width()))).expect("decode");
        prop_assert_eq!(decoded, m);
    }

    #[test]
    fn rle_roundtrip_long_runs(m in proptest_helpers::arb_blocky_mask(300)) {
        let code = rle::encode(&m).expect("encode binary mask");
        prop_assert_eq!(rle::decode(&code, None).expect("decode"), m);
    }

    #[test]
    fn rle_preserves_area(m in proptest_helpers::arb_mask(24)) {
        let code = rle::encode(&m).expect("encode");
        let decoded = rle::decode(&code, None).expect("decode");
        prop_assert_eq!(mask::area(&decoded), mask::area(&m));
    }

    #[test]
    fn rle_decode_never_panics(input in ".{0,64}", h in 0u32..8, w in 0u32..8) {
        let _ = rle::decode(&input, Some((h, w)));
        let _ = rle::decode(&input, None);
    }

    #[test]
    fn rle_decode_rejects_wrong_shape(m in proptest_helpers::arb_mask(12)) {
        let code = rle::encode(&m).expect("encode");
        let wrong = (m.height() + 1, m.width());
        let is_shape_mismatch = matches!(
            rle::decode(&code, Some(wrong)),
            Err(rle::RleError::ShapeMismatch { .. })
        );
        prop_assert!(is_shape_mismatch);
    }
}

#[test]
fn rle_handles_uniform_masks() {
    for value in [0u8, 1] {
        let m = image::GrayImage::from_pixel(640, 480, image::Luma([value]));
        let code = rle::encode(&m).expect("encode");
        assert!(code.len() < 16, "{code}");
        assert_eq!(rle::decode(&code, None).expect("decode"), m);
    }
}
