//! Framebuffer capture as a 16-bit BMP stream.
//!
//! The image is a top-down RGB565 bitmap with a `BITMAPV4HEADER`, so the
//! header is always 122 bytes and the body follows row by row without ever
//! holding the whole frame in memory.

use crate::device::Device;
use crate::server::Transport;
use std::io;
use tracing::debug;

pub const BMP_HEADER_LEN: usize = 122;
const DIB_HEADER_LEN: u32 = 108;
const BI_BITFIELDS: u32 = 3;
const PIXELS_PER_METRE: i32 = 2835;
const LCS_SRGB: u32 = 0x7352_4742;

/// Total byte length of a capture of `width` x `height` pixels.
#[must_use]
pub fn bmp_len(width: u16, height: u16) -> usize {
    BMP_HEADER_LEN + usize::from(width) * usize::from(height) * 2
}

/// Build the 122-byte header.
#[must_use]
pub fn bmp_header(width: u16, height: u16) -> [u8; BMP_HEADER_LEN] {
    let image_len = (usize::from(width) * usize::from(height) * 2) as u32;
    let mut h = [0u8; BMP_HEADER_LEN];
    let mut at = 0;
    let mut put = |bytes: &[u8]| {
        h[at..at + bytes.len()].copy_from_slice(bytes);
        at += bytes.len();
    };
    put(b"BM");
    put(&(BMP_HEADER_LEN as u32 + image_len).to_le_bytes());
    put(&0u32.to_le_bytes());
    put(&(BMP_HEADER_LEN as u32).to_le_bytes());

    put(&DIB_HEADER_LEN.to_le_bytes());
    put(&i32::from(width).to_le_bytes());
    // Negative height: rows are stored top to bottom.
    put(&(-i32::from(height)).to_le_bytes());
    put(&1u16.to_le_bytes());
    put(&16u16.to_le_bytes());
    put(&BI_BITFIELDS.to_le_bytes());
    put(&image_len.to_le_bytes());
    put(&PIXELS_PER_METRE.to_le_bytes());
    put(&PIXELS_PER_METRE.to_le_bytes());
    put(&0u32.to_le_bytes());
    put(&0u32.to_le_bytes());
    put(&0xF800u32.to_le_bytes());
    put(&0x07E0u32.to_le_bytes());
    put(&0x001Fu32.to_le_bytes());
    put(&0u32.to_le_bytes());
    put(&LCS_SRGB.to_le_bytes());
    // Endpoints and gamma stay zero.
    h
}

/// Stream the current frame as `image/bmp`.
///
/// # Errors
///
/// Propagates transport failures.
pub fn send_screenshot<T: Transport + ?Sized>(
    device: &dyn Device,
    transport: &mut T,
) -> io::Result<usize> {
    let (width, height) = device.screen_size();
    let total = bmp_len(width, height);
    transport.set_content_length(total);
    transport.begin(200, "image/bmp")?;
    transport.write_content(&bmp_header(width, height))?;

    let mut row = vec![0u16; usize::from(width)];
    let mut bytes = Vec::with_capacity(row.len() * 2);
    for y in 0..height {
        device.read_row(y, &mut row);
        bytes.clear();
        for px in &row {
            bytes.extend_from_slice(&px.to_le_bytes());
        }
        transport.write_content(&bytes)?;
    }
    debug!(width, height, bytes = total, "screenshot sent");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{HostDevice, RestartSignal};
    use crate::server::BufferedTransport;

    #[test]
    fn test_header_fields() {
        let h = bmp_header(480, 320);
        assert_eq!(&h[0..2], b"BM");
        let file_len = u32::from_le_bytes([h[2], h[3], h[4], h[5]]);
        assert_eq!(file_len as usize, bmp_len(480, 320));
        let offset = u32::from_le_bytes([h[10], h[11], h[12], h[13]]);
        assert_eq!(offset as usize, BMP_HEADER_LEN);
        assert_eq!(u16::from_le_bytes([h[28], h[29]]), 16);
    }

    #[test]
    fn test_stream_length_matches_declaration() {
        let device = HostDevice::new("plate01", 20, 10, RestartSignal::new());
        let mut t = BufferedTransport::new();
        let sent = send_screenshot(&device, &mut t).unwrap();
        assert_eq!(sent, 122 + 20 * 10 * 2);
        assert!(t.length_matches());
        assert_eq!(t.content_type, Some("image/bmp"));
    }
}
