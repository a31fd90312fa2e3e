//! Banded multi-threaded row copy for full-frame transfers.
//!
//! Capture sources hand back frames tens of megabytes large at high
//! refresh rates; a single memcpy leaves most of the memory bandwidth
//! unused. Splitting the copy into horizontal bands and fanning them
//! out over scoped threads keeps the copy inside the frame budget.
//! Small frames skip the fan-out since thread startup would dominate.

use std::thread;

use backend::BackendError;

/// Below this many payload bytes the copy runs inline on the caller's
/// thread.
const PARALLEL_THRESHOLD: usize = 1 << 20;

/// Worker cap; copies are bandwidth-bound well before this.
const MAX_COPY_THREADS: usize = 4;

/// Copies `rows` rows of `row_bytes` pixel bytes between buffers with
/// differing row pitches. Destination padding bytes are left untouched.
pub fn copy_rows(
    dst: &mut [u8],
    dst_pitch: usize,
    src: &[u8],
    src_pitch: usize,
    row_bytes: usize,
    rows: usize,
) -> Result<(), BackendError> {
    if rows == 0 || row_bytes == 0 {
        return Ok(());
    }
    if row_bytes > src_pitch || row_bytes > dst_pitch {
        return Err(BackendError::frame(format!(
            "row of {row_bytes} bytes exceeds a pitch (src {src_pitch}, dst {dst_pitch})"
        )));
    }
    let src_needed = (rows - 1) * src_pitch + row_bytes;
    let dst_needed = (rows - 1) * dst_pitch + row_bytes;
    if src.len() < src_needed || dst.len() < dst_needed {
        return Err(BackendError::frame(format!(
            "copy of {rows} rows needs {src_needed}/{dst_needed} bytes, have {}/{}",
            src.len(),
            dst.len()
        )));
    }

    let workers = if rows * row_bytes < PARALLEL_THRESHOLD {
        1
    } else {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(MAX_COPY_THREADS)
            .min(rows)
    };
    if workers <= 1 {
        copy_band(dst, dst_pitch, src, src_pitch, row_bytes, rows);
        return Ok(());
    }

    let band_rows = rows.div_ceil(workers);
    thread::scope(|scope| {
        let mut remaining = &mut dst[..dst_needed];
        let mut row = 0usize;
        while row < rows {
            let band = band_rows.min(rows - row);
            let split = remaining.len().min(band * dst_pitch);
            let (chunk, rest) = std::mem::take(&mut remaining).split_at_mut(split);
            remaining = rest;
            let band_src = &src[row * src_pitch..];
            scope.spawn(move || {
                copy_band(chunk, dst_pitch, band_src, src_pitch, row_bytes, band);
            });
            row += band;
        }
    });
    Ok(())
}

fn copy_band(
    dst: &mut [u8],
    dst_pitch: usize,
    src: &[u8],
    src_pitch: usize,
    row_bytes: usize,
    rows: usize,
) {
    for y in 0..rows {
        let from = y * src_pitch;
        let to = y * dst_pitch;
        dst[to..to + row_bytes].copy_from_slice(&src[from..from + row_bytes]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_copy(
        dst: &mut [u8],
        dst_pitch: usize,
        src: &[u8],
        src_pitch: usize,
        row_bytes: usize,
        rows: usize,
    ) {
        for y in 0..rows {
            dst[y * dst_pitch..y * dst_pitch + row_bytes]
                .copy_from_slice(&src[y * src_pitch..y * src_pitch + row_bytes]);
        }
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn small_copy_matches_the_reference() {
        let src = patterned(16 * 40);
        let mut banded = vec![0u8; 16 * 48];
        let mut straight = vec![0u8; 16 * 48];
        copy_rows(&mut banded, 48, &src, 40, 36, 16).unwrap();
        reference_copy(&mut straight, 48, &src, 40, 36, 16);
        assert_eq!(banded, straight);
    }

    #[test]
    fn large_copy_matches_the_reference() {
        // Above the parallel threshold so the banded path runs.
        let rows = 1200;
        let src_pitch = 2048;
        let dst_pitch = 1920;
        let row_bytes = 1920;
        let src = patterned(rows * src_pitch);
        let mut banded = vec![0u8; rows * dst_pitch];
        let mut straight = vec![0u8; rows * dst_pitch];
        copy_rows(&mut banded, dst_pitch, &src, src_pitch, row_bytes, rows).unwrap();
        reference_copy(&mut straight, dst_pitch, &src, src_pitch, row_bytes, rows);
        assert_eq!(banded, straight);
    }

    #[test]
    fn fewer_rows_than_workers_still_matches_the_reference() {
        // Payload above the threshold with only three rows, so the band
        // count is capped by the row count.
        let rows = 3;
        let pitch = 600_000;
        let src = patterned(rows * pitch);
        let mut banded = vec![0u8; rows * pitch];
        let mut straight = vec![0u8; rows * pitch];
        copy_rows(&mut banded, pitch, &src, pitch, pitch, rows).unwrap();
        reference_copy(&mut straight, pitch, &src, pitch, pitch, rows);
        assert_eq!(banded, straight);
    }

    #[test]
    fn destination_padding_is_untouched() {
        let src = patterned(4 * 8);
        let mut dst = vec![0xEEu8; 4 * 12];
        copy_rows(&mut dst, 12, &src, 8, 8, 4).unwrap();
        for y in 0..4 {
            assert_eq!(&dst[y * 12 + 8..y * 12 + 12], &[0xEE; 4]);
        }
    }

    #[test]
    fn impossible_geometry_is_rejected() {
        let src = vec![0u8; 64];
        let mut dst = vec![0u8; 64];
        assert!(copy_rows(&mut dst, 8, &src, 8, 16, 4).is_err());
        assert!(copy_rows(&mut dst, 8, &src, 8, 8, 9).is_err());
        assert!(copy_rows(&mut dst, 8, &src, 8, 8, 0).is_ok());
    }
}
