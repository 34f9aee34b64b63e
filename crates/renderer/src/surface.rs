use crate::error::Result;

/// Something the final pass can be presented on.
///
/// `presented_size` is what the user currently sees (window inner size,
/// canvas client size); `backing_size` is what the drawable was last
/// allocated at. The driver polls both every iteration and resizes the
/// backing store when they disagree.
pub trait Surface {
    fn presented_size(&self) -> (u32, u32);
    fn backing_size(&self) -> (u32, u32);
    fn resize_backing(&mut self, width: u32, height: u32);
    fn present(&mut self) -> Result<()>;
}
