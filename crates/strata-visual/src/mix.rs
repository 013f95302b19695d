#![forbid(unsafe_code)]

//! Integer color averaging shared by the blitters.
//!
//! Colors are `0xRRGGBB`. Averages round half up. With `nointerpolate`
//! set, every average returns its first sample instead.

#[inline]
const fn split(rgb: u32) -> (u32, u32, u32) {
    ((rgb >> 16) & 0xff, (rgb >> 8) & 0xff, rgb & 0xff)
}

/// `sum / n` rounded half up.
#[inline]
const fn round_div(sum: u32, n: u32) -> u32 {
    (2 * sum + n) / (2 * n)
}

#[inline]
const fn join(r: u32, g: u32, b: u32) -> u32 {
    (r & 0xff) << 16 | (g & 0xff) << 8 | (b & 0xff)
}

/// Average of two colors.
pub fn lerp(c0: u32, c1: u32, nointerpolate: bool) -> u32 {
    if nointerpolate {
        return c0 & 0x00ff_ffff;
    }
    let (r0, g0, b0) = split(c0);
    let (r1, g1, b1) = split(c1);
    join((r0 + r1 + 1) / 2, (g0 + g1 + 1) / 2, (b0 + b1 + 1) / 2)
}

/// Average of three colors.
pub fn trilerp(c0: u32, c1: u32, c2: u32, nointerpolate: bool) -> u32 {
    if nointerpolate {
        return c0 & 0x00ff_ffff;
    }
    let (r0, g0, b0) = split(c0);
    let (r1, g1, b1) = split(c1);
    let (r2, g2, b2) = split(c2);
    join(round_div(r0 + r1 + r2, 3), round_div(g0 + g1 + g2, 3), round_div(b0 + b1 + b2, 3))
}

/// Running sums for an average over any number of samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fold {
    r: u32,
    g: u32,
    b: u32,
    count: u32,
}

impl Fold {
    /// Add a sample. Under `nointerpolate` only the first sample is kept.
    pub fn add(&mut self, rgb: u32, nointerpolate: bool) {
        if nointerpolate && self.count > 0 {
            return;
        }
        let (r, g, b) = split(rgb);
        self.r += r;
        self.g += g;
        self.b += b;
        self.count += 1;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// The mean, rounded half up; black when empty.
    pub fn mean(&self) -> u32 {
        let n = self.count;
        if n == 0 {
            return 0;
        }
        join(round_div(self.r, n), round_div(self.g, n), round_div(self.b, n))
    }
}

/// Manhattan distance between two colors.
#[inline]
pub fn distance(c0: u32, c1: u32) -> u32 {
    let (r0, g0, b0) = split(c0);
    let (r1, g1, b1) = split(c1);
    r0.abs_diff(r1) + g0.abs_diff(g1) + b0.abs_diff(b1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn lerp_rounds_half_up() {
        assert_eq!(lerp(0x000000, 0x010101, false), 0x010101);
        assert_eq!(lerp(0xff0000, 0x0000ff, false), 0x800080);
        assert_eq!(lerp(0x123456, 0xffffff, true), 0x123456);
    }

    #[test]
    fn trilerp_rounds_half_up() {
        assert_eq!(trilerp(0x000000, 0x000000, 0x000002, false), 0x000001);
        assert_eq!(trilerp(0x000000, 0x000001, 0x000001, false), 0x000001);
        assert_eq!(trilerp(0x000000, 0x000000, 0x000001, false), 0x000000);
        assert_eq!(trilerp(0x030000, 0x000000, 0x000000, false), 0x010000);
    }

    #[test]
    fn fold_means_round_half_up() {
        let mut f = Fold::default();
        assert_eq!(f.mean(), 0);
        for c in [0x0a0000, 0x0b0000, 0x0b0000] {
            f.add(c, false);
        }
        assert_eq!(f.count(), 3);
        assert_eq!(f.mean(), 0x0b0000);

        let mut quarter = Fold::default();
        for c in [0x000001, 0, 0, 0] {
            quarter.add(c, false);
        }
        assert_eq!(quarter.mean(), 0);

        let mut half = Fold::default();
        half.add(0x000001, false);
        half.add(0x000002, false);
        assert_eq!(half.mean(), 0x000002);

        let mut first = Fold::default();
        first.add(0x112233, true);
        first.add(0xffffff, true);
        assert_eq!((first.count(), first.mean()), (1, 0x112233));
    }

    #[test]
    fn distance_is_manhattan() {
        assert_eq!(distance(0xff0000, 0x00ff00), 510);
        assert_eq!(distance(0x102030, 0x102030), 0);
    }

    proptest! {
        #[test]
        fn averages_stay_within_component_bounds(a in 0u32..0x100_0000, b in 0u32..0x100_0000, c in 0u32..0x100_0000) {
            for mixed in [lerp(a, b, false), trilerp(a, b, c, false)] {
                for shift in [0, 8, 16] {
                    let comp = (mixed >> shift) & 0xff;
                    let lo = [a, b, c].iter().map(|v| (v >> shift) & 0xff).min().unwrap();
                    let hi = [a, b, c].iter().map(|v| (v >> shift) & 0xff).max().unwrap();
                    prop_assert!(comp >= lo && comp <= hi);
                }
            }
        }

        #[test]
        fn lerp_is_symmetric(a in 0u32..0x100_0000, b in 0u32..0x100_0000) {
            prop_assert_eq!(lerp(a, b, false), lerp(b, a, false));
            prop_assert_eq!(distance(a, b), distance(b, a));
        }
    }
}
