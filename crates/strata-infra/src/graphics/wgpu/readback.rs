// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Blocking GPU-to-CPU copies.

use std::sync::mpsc;
use strata_core::renderer::ResourceError;

/// Row pitch of a texture-to-buffer copy whose rows hold `unpadded` bytes.
///
/// wgpu requires rows to be aligned to `COPY_BYTES_PER_ROW_ALIGNMENT` (256 bytes).
pub(crate) fn padded_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Drops the per-row padding of a read-back image.
pub(crate) fn strip_row_padding(data: &[u8], row_len: usize, padded_len: usize) -> Vec<u8> {
    if padded_len == 0 {
        return Vec::new();
    }
    data.chunks(padded_len)
        .flat_map(|row| &row[..row_len.min(row.len())])
        .copied()
        .collect()
}

/// Maps the first `size` bytes of `buffer` and copies them out.
///
/// Blocks until every submitted command has completed.
pub(crate) fn map_read_blocking(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
    size: u64,
) -> Result<Vec<u8>, ResourceError> {
    let slice = buffer.slice(0..size);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });

    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| ResourceError::ReadbackFailed(format!("device poll failed: {e}")))?;

    rx.recv()
        .map_err(|e| ResourceError::ReadbackFailed(format!("map callback dropped: {e}")))?
        .map_err(|e| ResourceError::ReadbackFailed(format!("buffer mapping failed: {e}")))?;

    let bytes = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_pitch_alignment() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(257), 512);
    }

    #[test]
    fn test_strip_row_padding() {
        let mut data = vec![0u8; 2 * 256];
        data[..3].copy_from_slice(&[1, 2, 3]);
        data[256..259].copy_from_slice(&[4, 5, 6]);
        assert_eq!(strip_row_padding(&data, 3, 256), vec![1, 2, 3, 4, 5, 6]);
    }
}
