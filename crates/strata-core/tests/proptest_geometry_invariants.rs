//! Property-based invariant tests for the geometry primitives.
//!
//! 1. Intersection is commutative.
//! 2. Intersection fits within both inputs.
//! 3. Contains agrees with intersection.
//! 4. Right/bottom never overflow, even at the `i32`/`u32` extremes.
//! 5. Pixel-to-cell conversion always covers the pixels.

use proptest::prelude::*;
use strata_core::geometry::{CellPixels, Rect};

fn rect_strategy() -> impl Strategy<Value = Rect> {
    (any::<i32>(), any::<i32>(), any::<u32>(), any::<u32>())
        .prop_map(|(x, y, w, h)| Rect::new(x, y, w, h))
}

fn small_rect_strategy() -> impl Strategy<Value = Rect> {
    (-200i32..=200, -200i32..=200, 0u32..=300, 0u32..=300)
        .prop_map(|(x, y, w, h)| Rect::new(x, y, w, h))
}

proptest! {
    #[test]
    fn intersection_commutative(a in small_rect_strategy(), b in small_rect_strategy()) {
        prop_assert_eq!(a.intersection_opt(&b), b.intersection_opt(&a));
    }

    #[test]
    fn intersection_fits_within_both(a in small_rect_strategy(), b in small_rect_strategy()) {
        if let Some(i) = a.intersection_opt(&b) {
            prop_assert!(!i.is_empty());
            prop_assert!(i.x >= a.x && i.x >= b.x);
            prop_assert!(i.y >= a.y && i.y >= b.y);
            prop_assert!(i.right() <= a.right() && i.right() <= b.right());
            prop_assert!(i.bottom() <= a.bottom() && i.bottom() <= b.bottom());
        }
    }

    #[test]
    fn contains_agrees_with_intersection(
        a in small_rect_strategy(),
        b in small_rect_strategy(),
        px in -250i32..=550,
        py in -250i32..=550,
    ) {
        let both = a.contains(px, py) && b.contains(px, py);
        let inter = a.intersection_opt(&b).is_some_and(|i| i.contains(px, py));
        prop_assert_eq!(both, inter);
    }

    #[test]
    fn edges_never_overflow(r in rect_strategy()) {
        prop_assert_eq!(r.right(), r.x as i64 + r.width as i64);
        prop_assert_eq!(r.bottom(), r.y as i64 + r.height as i64);
        let _ = r.intersection(&Rect::from_size(u32::MAX, u32::MAX));
    }

    #[test]
    fn cells_cover_pixels(cy in 1u32..64, cx in 1u32..64, py in 0u32..5000, px in 0u32..5000) {
        let geom = CellPixels::new(cy, cx);
        let cells = geom.cells_for(py, px).unwrap();
        prop_assert!(cells.rows * cy >= py);
        prop_assert!(cells.cols * cx >= px);
        prop_assert!(cells.rows == 0 || (cells.rows - 1) * cy < py);
        prop_assert!(cells.cols == 0 || (cells.cols - 1) * cx < px);
    }
}
