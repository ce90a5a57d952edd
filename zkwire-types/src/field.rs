//! Fixed-width field helpers shared by the record codecs

/// Clamp to the `u16` range
pub fn clamp_u16(value: i64) -> u16 {
    value.clamp(0, u16::MAX as i64) as u16
}

/// Clamp to the `u32` range
pub fn clamp_u32(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

/// Drop every non-ASCII character
pub fn sanitize_ascii(value: &str) -> String {
    value.chars().filter(char::is_ascii).collect()
}

/// Write `value` into `buf[offset..offset + width]`
///
/// Non-ASCII characters are stripped first, then the result is truncated to
/// `width` and NUL-padded.
pub fn write_ascii(buf: &mut [u8], offset: usize, width: usize, value: &str) {
    let clean = sanitize_ascii(value);
    let field = &mut buf[offset..offset + width];
    field.fill(0);

    let len = clean.len().min(width);
    field[..len].copy_from_slice(&clean.as_bytes()[..len]);
}

/// Read an ASCII field up to its first NUL
///
/// `width` is capped at the end of the buffer.
pub fn read_ascii(buf: &[u8], offset: usize, width: usize) -> String {
    let end = (offset + width).min(buf.len());
    if offset >= end {
        return String::new();
    }

    let field = &buf[offset..end];
    let field = match field.iter().position(|&b| b == 0) {
        Some(nul) => &field[..nul],
        None => field,
    };

    field.iter().map(|&b| b as char).collect()
}
