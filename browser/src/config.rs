use serde::Deserialize;
use serde::Serialize;

/// Content viewport size in CSS pixels.
///
/// Zero in either dimension means no fixed size was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether the caller left the viewport unconstrained.
    pub const fn is_unset(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Outer window size in device pixels, chrome included.
///
/// Also used as the additive correction term when translating a content
/// viewport into an outer-bounds command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OuterBounds {
    pub width: i64,
    pub height: i64,
}
