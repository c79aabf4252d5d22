/// Resource limits for decode operations.
///
/// All fields default to `None` (no limit). These bound work done on behalf
/// of untrusted streams; the format's own hard caps on dimensions apply
/// regardless.
#[derive(Clone, Debug, Default)]
pub struct Limits {
    pub max_width: Option<u64>,
    pub max_height: Option<u64>,
    /// Maximum pixel count (width * height).
    pub max_pixels: Option<u64>,
    /// Maximum memory bytes for raster allocation.
    pub max_memory_bytes: Option<u64>,
}

impl Limits {
    /// Check header dimensions against limits before any allocation.
    pub(crate) fn check(&self, width: usize, height: usize) -> Result<(), crate::LercError> {
        if let Some(max_w) = self.max_width {
            if width as u64 > max_w {
                return Err(crate::LercError::LimitExceeded(alloc::format!(
                    "width {width} exceeds limit {max_w}"
                )));
            }
        }
        if let Some(max_h) = self.max_height {
            if height as u64 > max_h {
                return Err(crate::LercError::LimitExceeded(alloc::format!(
                    "height {height} exceeds limit {max_h}"
                )));
            }
        }
        if let Some(max_px) = self.max_pixels {
            let pixels = width as u64 * height as u64;
            if pixels > max_px {
                return Err(crate::LercError::LimitExceeded(alloc::format!(
                    "pixel count {pixels} exceeds limit {max_px}"
                )));
            }
        }
        Ok(())
    }

    /// Check that an allocation size is within memory limits.
    pub(crate) fn check_memory(&self, bytes: usize) -> Result<(), crate::LercError> {
        if let Some(max_mem) = self.max_memory_bytes {
            if bytes as u64 > max_mem {
                return Err(crate::LercError::LimitExceeded(alloc::format!(
                    "allocation {bytes} bytes exceeds memory limit {max_mem}"
                )));
            }
        }
        Ok(())
    }
}
