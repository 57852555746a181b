use crate::geometry::ImagePoint;

/// Pointer input already mapped into image space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(ImagePoint),
    Move(ImagePoint),
    Up(ImagePoint),
    Cancel,
}
