//! Colors for chart segments and graph nodes.

use std::fmt;

/// An opaque sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    pub const fn from_hex(hex: u32) -> Self {
        Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Colors for the performance ring, one per tool in the order tools usually
/// appear: solver, pin, il_tool.
pub const PERFORMANCE_COLORS: [Rgb; 3] = [
    Rgb::from_hex(0x88a3f6),
    Rgb::from_hex(0x1c4fee),
    Rgb::from_hex(0x051547),
];

// ---------------------------------------------------------------------------
// PaletteAllocator
// ---------------------------------------------------------------------------

/// Hands out colors from a fixed palette in order, then a fallback forever.
///
/// Each call to [`next`](Self::next) consumes one slot, so callers must only
/// ask when they are creating something new.
#[derive(Debug, Clone)]
pub struct PaletteAllocator {
    colors: Vec<Rgb>,
    fallback: Rgb,
    cursor: usize,
}

impl PaletteAllocator {
    pub fn new(colors: impl Into<Vec<Rgb>>, fallback: Rgb) -> Self {
        Self {
            colors: colors.into(),
            fallback,
            cursor: 0,
        }
    }

    /// Next color, or the fallback once the palette is used up.
    pub fn next(&mut self) -> Rgb {
        match self.colors.get(self.cursor) {
            Some(&color) => {
                self.cursor += 1;
                color
            }
            None => self.fallback,
        }
    }

    /// Palette slots still available before the fallback kicks in.
    pub fn remaining(&self) -> usize {
        self.colors.len() - self.cursor
    }
}

impl Default for PaletteAllocator {
    fn default() -> Self {
        Self::new(PERFORMANCE_COLORS, Rgb::BLACK)
    }
}

// ---------------------------------------------------------------------------
// Scales
// ---------------------------------------------------------------------------

/// Color of crash-histogram segment `index` out of `count` segments.
///
/// Green rises and blue falls with the segment's position; the last segment
/// wraps to position zero, which is drawn like a full position.
pub fn signal_color(index: usize, count: usize) -> Rgb {
    if count == 0 {
        return Rgb(128, 255, 255);
    }
    let mut f = ((index + 1) % count) as f64 / count as f64;
    if f == 0.0 {
        f = 1.0;
    }
    Rgb(128, channel(255.0 * f), channel(255.0 / f))
}

/// Lower and upper bound of the node-group scale.
pub const GROUP_DOMAIN: (f64, f64) = (0.0, 150.0);

/// Linear blue→green scale over [`GROUP_DOMAIN`]; values outside the domain
/// are extrapolated and clamped per channel.
pub fn group_color(group: i64) -> Rgb {
    let (lo, hi) = GROUP_DOMAIN;
    let t = (group as f64 - lo) / (hi - lo);
    Rgb(0, channel(255.0 * t), channel(255.0 * (1.0 - t)))
}

fn channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_hands_out_palette_then_fallback() {
        let mut alloc = PaletteAllocator::default();
        assert_eq!(alloc.remaining(), 3);
        assert_eq!(alloc.next(), Rgb::from_hex(0x88a3f6));
        assert_eq!(alloc.next(), Rgb::from_hex(0x1c4fee));
        assert_eq!(alloc.next(), Rgb::from_hex(0x051547));
        assert_eq!(alloc.remaining(), 0);
        assert_eq!(alloc.next(), Rgb::BLACK);
        assert_eq!(alloc.next(), Rgb::BLACK);
    }

    #[test]
    fn empty_palette_is_all_fallback() {
        let mut alloc = PaletteAllocator::new(Vec::new(), Rgb(1, 2, 3));
        assert_eq!(alloc.next(), Rgb(1, 2, 3));
    }

    #[test]
    fn rgb_displays_as_hex() {
        assert_eq!(Rgb::from_hex(0x1c4fee).to_string(), "#1c4fee");
    }

    #[test]
    fn signal_colors_follow_position() {
        // Last of 11 wraps to f = 0 -> treated as 1.
        assert_eq!(signal_color(10, 11), Rgb(128, 255, 255));
        // First segment: f = 1/11, blue saturates.
        let first = signal_color(0, 11);
        assert_eq!(first.1, 23);
        assert_eq!(first.2, 255);
        // Segment 9: f = 10/11.
        let late = signal_color(9, 11);
        assert_eq!(late.1, 232);
        assert_eq!(late.2, 255);
    }

    #[test]
    fn group_scale_endpoints() {
        assert_eq!(group_color(0), Rgb(0, 0, 255));
        assert_eq!(group_color(150), Rgb(0, 255, 0));
        assert_eq!(group_color(75), Rgb(0, 128, 128));
        assert_eq!(group_color(400), Rgb(0, 255, 0));
        assert_eq!(group_color(-10), Rgb(0, 0, 255));
    }
}
