//! Frame checksum
//!
//! The checksum is computed in place: the frame is summed with its checksum
//! slot (bytes 2..4) held at zero, and the result is written back into that
//! slot.
//!
//! 1. Read the buffer as little-endian `u16` words
//! 2. A trailing odd byte is added as-is
//! 3. Accumulate modulo 65536
//! 4. Return `65536 - sum - 1` (modulo 65536)

use tracing::trace;

/// Offset of the checksum slot inside a bare frame
pub const CHECKSUM_OFFSET: usize = 2;

/// Calculate the checksum of `buf`
///
/// The caller is responsible for zeroing the checksum slot first; see
/// [`verify`] for the recompute-and-compare form.
///
/// # Examples
///
/// ```
/// use zkwire_core::checksum;
///
/// // CMD_CONNECT, checksum 0, session 0, reply 0
/// let frame = [0xE8, 0x03, 0, 0, 0, 0, 0, 0];
/// assert_eq!(checksum::calculate(&frame), 0xFFFF - 0x03E8);
/// ```
pub fn calculate(buf: &[u8]) -> u16 {
    let mut sum: u16 = 0;

    for chunk in buf.chunks(2) {
        let word = if chunk.len() == 2 {
            u16::from_le_bytes([chunk[0], chunk[1]])
        } else {
            // Odd trailing byte
            chunk[0] as u16
        };

        sum = sum.wrapping_add(word);
    }

    let checksum = u16::MAX.wrapping_sub(sum);

    trace!(
        len = buf.len(),
        checksum = format!("0x{:04X}", checksum),
        "Calculated checksum"
    );

    checksum
}

/// Recompute the checksum of a bare frame and compare it with the stored one
///
/// Returns `false` for buffers too short to hold a checksum slot.
pub fn verify(frame: &[u8]) -> bool {
    if frame.len() < CHECKSUM_OFFSET + 2 {
        return false;
    }

    let stored = u16::from_le_bytes([frame[CHECKSUM_OFFSET], frame[CHECKSUM_OFFSET + 1]]);
    stored == calculate_zeroed(frame)
}

/// Checksum of `frame` as if its checksum slot were zero
pub fn calculate_zeroed(frame: &[u8]) -> u16 {
    let mut scratch = frame.to_vec();
    if scratch.len() >= CHECKSUM_OFFSET + 2 {
        scratch[CHECKSUM_OFFSET] = 0;
        scratch[CHECKSUM_OFFSET + 1] = 0;
    }
    calculate(&scratch)
}

/// Zero the checksum slot, compute, and write the result back
///
/// Returns the written checksum.
pub fn write_in_place(frame: &mut [u8]) -> u16 {
    frame[CHECKSUM_OFFSET] = 0;
    frame[CHECKSUM_OFFSET + 1] = 0;

    let checksum = calculate(frame);
    frame[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&checksum.to_le_bytes());

    checksum
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_checksum_empty() {
        assert_eq!(calculate(&[]), 0xFFFF);
    }

    #[test]
    fn test_checksum_connect_header() {
        // CMD_CONNECT (1000) = 0x03E8
        let frame = [0xE8, 0x03, 0, 0, 0, 0, 0, 0];
        assert_eq!(calculate(&frame), 0xFC17);
    }

    #[test]
    fn test_checksum_odd_length_adds_last_byte() {
        // 0x0201 + 0x03 = 0x0204
        assert_eq!(calculate(&[0x01, 0x02, 0x03]), 0xFFFF - 0x0204);
    }

    #[test]
    fn test_checksum_wraps() {
        // 0xFFFF + 0x0002 wraps to 0x0001
        assert_eq!(calculate(&[0xFF, 0xFF, 0x02, 0x00]), 0xFFFE);
    }

    #[test]
    fn test_checksum_different_commands() {
        let cs1 = calculate(&1000u16.to_le_bytes());
        let cs2 = calculate(&1001u16.to_le_bytes());

        assert_ne!(cs1, cs2);
    }

    #[test]
    fn test_verify_detects_corruption() {
        let mut frame = vec![0xE8, 0x03, 0, 0, 0x34, 0x12, 0x01, 0x00, 0xAB, 0xCD, 0xEF];
        write_in_place(&mut frame);
        assert!(verify(&frame));

        frame[9] ^= 0x01;
        assert!(!verify(&frame));
    }

    #[test]
    fn test_verify_short_buffer() {
        assert!(!verify(&[0x01, 0x02, 0x03]));
    }

    proptest! {
        #[test]
        fn prop_write_then_verify(mut frame in proptest::collection::vec(any::<u8>(), 4..512)) {
            let written = write_in_place(&mut frame);
            prop_assert!(verify(&frame));
            prop_assert_eq!(written, calculate_zeroed(&frame));
        }
    }
}
