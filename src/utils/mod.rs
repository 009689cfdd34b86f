use smithay::utils::{Buffer, Physical, Size};

pub mod region;

pub use region::Region;

pub(crate) use region::rect;

/// Size of the downsample texture at `level` for a background of `size`.
pub fn texture_size(size: Size<i32, Physical>, level: usize) -> Size<i32, Buffer> {
    let shift = u32::try_from(level).unwrap_or(u32::MAX);
    let w = size.w.checked_shr(shift).unwrap_or(0).max(1);
    let h = size.h.checked_shr(shift).unwrap_or(0).max(1);
    Size::from((w, h))
}
