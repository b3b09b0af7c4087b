//! Run-length encoding of binary masks.
//!
//! A mask is flattened in row-major order and described by alternating
//! run lengths of background and foreground pixels, starting with
//! background (so a mask whose first pixel is foreground starts with a
//! zero-length run). The runs are written with the compressed count
//! alphabet COCO uses for crowd annotations: each count is split into
//! 5-bit groups with a continuation bit, offset by 48 into printable
//! ASCII, and every count after the third is stored as the difference to
//! the count two positions earlier.
//!
//! Encoded strings carry their shape as a `"{height}x{width}:"` prefix,
//! e.g. `"2x2:121"` for the mask `[[0, 1], [1, 0]]`.
//!
//! Decoders refuse shapes above [`MAX_PIXELS`] before allocating.

use image::{GrayImage, Luma};
use thiserror::Error;

use crate::dataset::CocoRleCounts;

/// Largest mask, in pixels, the decoders will allocate (about 12k x 11k).
pub const MAX_PIXELS: u64 = 1 << 27;

/// Errors from encoding or decoding run-length masks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RleError {
    #[error("cannot encode an empty {width}x{height} mask")]
    Empty { width: u32, height: u32 },

    #[error("mask is not binary: pixel ({x}, {y}) has value {value}")]
    NotBinary { x: u32, y: u32, value: u8 },

    #[error("RLE describes a {found_height}x{found_width} mask, expected {height}x{width}")]
    ShapeMismatch {
        height: u32,
        width: u32,
        found_height: u32,
        found_width: u32,
    },

    #[error("malformed RLE: {0}")]
    Decoding(String),

    #[error("RLE shape {height}x{width} exceeds the limit of {max} pixels", max = MAX_PIXELS)]
    TooLarge { height: u32, width: u32 },
}

/// Encodes a mask whose pixels are all 0 or 1.
///
/// # Errors
/// [`RleError::Empty`] for a zero-sized mask, [`RleError::NotBinary`] for
/// any pixel outside `{0, 1}`.
pub fn encode(mask: &GrayImage) -> Result<String, RleError> {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return Err(RleError::Empty { width, height });
    }

    let counts = runs(mask)?;
    Ok(format!("{height}x{width}:{}", compress_counts(&counts)))
}

/// Decodes an RLE string into a mask of 0/1 pixels.
///
/// `shape` is `(height, width)`. It is required when the string has no
/// shape prefix and is checked against the prefix when both are present.
pub fn decode(rle: &str, shape: Option<(u32, u32)>) -> Result<GrayImage, RleError> {
    let (embedded, body) = split_header(rle)?;
    let (height, width) = match (embedded, shape) {
        (Some((found_height, found_width)), Some((height, width)))
            if (found_height, found_width) != (height, width) =>
        {
            return Err(RleError::ShapeMismatch {
                height,
                width,
                found_height,
                found_width,
            });
        }
        (Some(found), _) => found,
        (None, Some(expected)) => expected,
        (None, None) => {
            return Err(RleError::Decoding(
                "string carries no shape and none was given".to_string(),
            ))
        }
    };

    let pixels = checked_pixels(height, width)?;
    let counts = decompress_counts(body)?;
    let data = expand_runs(&counts, pixels)?;
    GrayImage::from_raw(width, height, data)
        .ok_or_else(|| RleError::Decoding("buffer does not match shape".to_string()))
}

/// Decodes a standard COCO RLE object (`size = [height, width]`, column-major).
pub fn decode_coco(size: [u32; 2], counts: &CocoRleCounts) -> Result<GrayImage, RleError> {
    let [height, width] = size;
    let pixels = checked_pixels(height, width)?;
    let counts = match counts {
        CocoRleCounts::Compressed(s) => decompress_counts(s)?,
        CocoRleCounts::Uncompressed(v) => v.clone(),
    };
    let column_major = expand_runs(&counts, pixels)?;
    Ok(GrayImage::from_fn(width, height, |x, y| {
        Luma([column_major[y as usize + height as usize * x as usize]])
    }))
}

fn checked_pixels(height: u32, width: u32) -> Result<usize, RleError> {
    let pixels = u64::from(height) * u64::from(width);
    if pixels > MAX_PIXELS {
        return Err(RleError::TooLarge { height, width });
    }
    Ok(pixels as usize)
}

/// Row-major run lengths of a binary mask.
fn runs(mask: &GrayImage) -> Result<Vec<u32>, RleError> {
    let width = mask.width();
    let mut counts = Vec::new();
    let mut current = 0u8;
    let mut run = 0u32;
    for (i, &value) in mask.as_raw().iter().enumerate() {
        if value > 1 {
            let i = i as u32;
            return Err(RleError::NotBinary {
                x: i % width,
                y: i / width,
                value,
            });
        }
        if value != current {
            counts.push(run);
            run = 0;
            current = value;
        }
        run += 1;
    }
    counts.push(run);
    Ok(counts)
}

fn expand_runs(counts: &[u32], pixels: usize) -> Result<Vec<u8>, RleError> {
    let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
    if total != pixels as u64 {
        return Err(RleError::Decoding(format!(
            "runs cover {total} pixels but the mask has {pixels}"
        )));
    }

    let mut data = Vec::with_capacity(pixels);
    let mut value = 0u8;
    for &count in counts {
        data.resize(data.len() + count as usize, value);
        value ^= 1;
    }
    Ok(data)
}

/// Splits an optional `"{h}x{w}:"` prefix off the counts.
///
/// The count alphabet never contains `x`, so a colon preceded by an `x`
/// can only belong to the prefix.
fn split_header(rle: &str) -> Result<(Option<(u32, u32)>, &str), RleError> {
    let Some((dims, body)) = rle.split_once(':').filter(|(dims, _)| dims.contains('x')) else {
        return Ok((None, rle));
    };

    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|_| RleError::Decoding(format!("invalid shape prefix '{dims}'")))
    };
    let (height, width) = dims
        .split_once('x')
        .ok_or_else(|| RleError::Decoding(format!("invalid shape prefix '{dims}'")))?;
    Ok((Some((parse(height)?, parse(width)?)), body))
}

fn compress_counts(counts: &[u32]) -> String {
    let mut s = String::with_capacity(counts.len() * 2);
    for (i, &count) in counts.iter().enumerate() {
        let mut x = i64::from(count);
        if i > 2 {
            x -= i64::from(counts[i - 2]);
        }
        loop {
            let mut c = (x & 0x1f) as u8;
            x >>= 5;
            let more = if c & 0x10 != 0 { x != -1 } else { x != 0 };
            if more {
                c |= 0x20;
            }
            s.push(char::from(c + 48));
            if !more {
                break;
            }
        }
    }
    s
}

fn decompress_counts(s: &str) -> Result<Vec<u32>, RleError> {
    let bytes = s.as_bytes();
    let mut counts: Vec<u32> = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let mut x: i64 = 0;
        let mut shift = 0u32;
        loop {
            let Some(&byte) = bytes.get(pos) else {
                return Err(RleError::Decoding("truncated run length".to_string()));
            };
            if !(48..112).contains(&byte) {
                return Err(RleError::Decoding(format!(
                    "invalid character '{}' at offset {pos}",
                    char::from(byte)
                )));
            }
            let c = i64::from(byte - 48);
            x |= (c & 0x1f) << shift;
            pos += 1;
            shift += 5;
            if c & 0x20 == 0 {
                if c & 0x10 != 0 {
                    x |= -1i64 << shift;
                }
                break;
            }
            if shift >= 60 {
                return Err(RleError::Decoding("run length overflows".to_string()));
            }
        }

        if counts.len() > 2 {
            x += i64::from(counts[counts.len() - 2]);
        }
        let count = u32::try_from(x)
            .map_err(|_| RleError::Decoding(format!("run length {x} out of range")))?;
        counts.push(count);
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from_rows(rows: &[&[u8]]) -> GrayImage {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        GrayImage::from_fn(width, height, |x, y| Luma([rows[y as usize][x as usize]]))
    }

    #[test]
    fn test_encode_known_mask() {
        let mask = mask_from_rows(&[&[0, 1], &[1, 0]]);
        assert_eq!(encode(&mask).unwrap(), "2x2:121");
    }

    #[test]
    fn test_all_foreground_starts_with_empty_run() {
        let mask = mask_from_rows(&[&[1, 1], &[1, 1]]);
        assert_eq!(encode(&mask).unwrap(), "2x2:04");
        assert_eq!(decode("2x2:04", None).unwrap(), mask);
    }

    #[test]
    fn test_roundtrip_degenerate_masks() {
        for value in [0u8, 1] {
            let mask = GrayImage::from_pixel(7, 3, Luma([value]));
            let rle = encode(&mask).unwrap();
            assert_eq!(decode(&rle, Some((3, 7))).unwrap(), mask);
        }
    }

    #[test]
    fn test_roundtrip_checkerboard() {
        let mask = GrayImage::from_fn(9, 5, |x, y| Luma([((x + y) % 2) as u8]));
        let rle = encode(&mask).unwrap();
        assert_eq!(decode(&rle, None).unwrap(), mask);
    }

    #[test]
    fn test_large_and_negative_deltas() {
        let counts = vec![1, 500, 1, 2, 40_000, 3];
        let compressed = compress_counts(&counts);
        assert_eq!(decompress_counts(&compressed).unwrap(), counts);
        assert_eq!(compress_counts(&[16]), "`0");
        assert_eq!(compress_counts(&[1, 5, 1, 2]), "151M");
    }

    #[test]
    fn test_encode_rejects_empty_mask() {
        let err = encode(&GrayImage::new(0, 4)).unwrap_err();
        assert_eq!(err, RleError::Empty { width: 0, height: 4 });
    }

    #[test]
    fn test_encode_rejects_non_binary() {
        let mask = mask_from_rows(&[&[0, 1, 255]]);
        let err = encode(&mask).unwrap_err();
        assert_eq!(err, RleError::NotBinary { x: 2, y: 0, value: 255 });
    }

    #[test]
    fn test_decode_shape_mismatch() {
        let err = decode("2x2:04", Some((4, 1))).unwrap_err();
        assert_eq!(
            err,
            RleError::ShapeMismatch {
                height: 4,
                width: 1,
                found_height: 2,
                found_width: 2,
            }
        );
    }

    #[test]
    fn test_decode_headerless_needs_shape() {
        assert_eq!(decode("121", Some((2, 2))).unwrap().as_raw(), &vec![0, 1, 1, 0]);
        assert!(matches!(decode("121", None), Err(RleError::Decoding(_))));
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(decode("2x2:12", None), Err(RleError::Decoding(_))));
        assert!(matches!(decode("2x2:1~1", None), Err(RleError::Decoding(_))));
        assert!(matches!(decode("2xz:04", None), Err(RleError::Decoding(_))));
        assert!(matches!(decode("2x2:`", None), Err(RleError::Decoding(_))));
    }

    #[test]
    fn test_decode_refuses_oversized_shape() {
        // Three counts are enough to cover 60000 x 60000 pixels
        let counts = [1_800_000_000u32, 1_800_000_000, 0];
        let code = format!("60000x60000:{}", compress_counts(&counts));
        assert_eq!(
            decode(&code, None).unwrap_err(),
            RleError::TooLarge {
                height: 60000,
                width: 60000,
            }
        );
        let coco = CocoRleCounts::Uncompressed(counts.to_vec());
        assert!(matches!(
            decode_coco([60000, 60000], &coco),
            Err(RleError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_decode_coco_is_column_major() {
        // Column-major [0, 1, 1, 1] for a 2x2 mask: only (0, 0) is background
        let mask = decode_coco([2, 2], &CocoRleCounts::Uncompressed(vec![1, 3])).unwrap();
        assert_eq!(mask.as_raw(), &vec![0, 1, 1, 1]);

        // Column-major [0, 0, 1, 1]: the right column is foreground
        let mask = decode_coco([2, 2], &CocoRleCounts::Compressed("22".to_string())).unwrap();
        assert_eq!(mask.as_raw(), &vec![0, 1, 0, 1]);
    }
}
