#![forbid(unsafe_code)]

//! Histogram-style plots over a sliding window of samples.
//!
//! A [`Plot`] owns a circular buffer of slots, one per independent value `x`
//! in the window, and draws each slot as a vertical bar built from its
//! blitter's fill glyphs. The newest `x` is drawn in the rightmost column
//! in use. Width-two blitters put two slots in each column.
//!
//! With `miny == maxy == 0` the domain grows to fit the samples seen;
//! otherwise samples outside `[miny, maxy]` are refused.

use std::fmt;

use strata_core::capabilities::TerminalCapabilities;
use strata_render::widget::WidgetBinding;
use strata_render::{Channel, Channels, PlaneArena, PlaneId, StyleMask, WidgetKind};

use crate::blitter::{BlitSet, Blitter, default_plot_blitter, lookup};
use crate::error::BlitError;
use crate::glyphs;

/// A value that can be plotted.
pub trait PlotSample: Copy + PartialOrd + fmt::Debug {
    const ZERO: Self;
    const MIN: Self;
    const MAX: Self;

    /// `self + other`, saturating where the type can overflow.
    fn accumulate(self, other: Self) -> Self;

    fn to_f64(self) -> f64;
}

macro_rules! int_sample {
    ($($t:ty),*) => {$(
        impl PlotSample for $t {
            const ZERO: Self = 0;
            const MIN: Self = <$t>::MIN;
            const MAX: Self = <$t>::MAX;

            #[inline]
            fn accumulate(self, other: Self) -> Self {
                self.saturating_add(other)
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    )*};
}

macro_rules! float_sample {
    ($($t:ty),*) => {$(
        impl PlotSample for $t {
            const ZERO: Self = 0.0;
            const MIN: Self = <$t>::MIN;
            const MAX: Self = <$t>::MAX;

            #[inline]
            fn accumulate(self, other: Self) -> Self {
                self + other
            }

            #[inline]
            fn to_f64(self) -> f64 {
                f64::from(self)
            }
        }
    )*};
}

int_sample!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);
float_sample!(f32, f64);

/// Plot construction options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotOptions<T> {
    /// `Default` resolves to eighth blocks.
    pub blitter: Blitter,
    pub degrade: bool,
    /// Slots in the window; zero spans the plane's width.
    pub rangex: u32,
    pub miny: T,
    pub maxy: T,
    /// Grow only the maximum while detecting the domain.
    pub detect_max_only: bool,
    /// Colors of the bottom row.
    pub low: Channels,
    /// Colors of the top row.
    pub high: Channels,
}

impl<T: PlotSample> Default for PlotOptions<T> {
    fn default() -> Self {
        Self {
            blitter: Blitter::Default,
            degrade: true,
            rangex: 0,
            miny: T::ZERO,
            maxy: T::ZERO,
            detect_max_only: false,
            low: Channels::DEFAULT,
            high: Channels::DEFAULT,
        }
    }
}

impl<T: PlotSample> PlotOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn blitter(mut self, blitter: Blitter) -> Self {
        self.blitter = blitter;
        self
    }

    #[must_use]
    pub fn no_degrade(mut self) -> Self {
        self.degrade = false;
        self
    }

    #[must_use]
    pub fn rangex(mut self, slots: u32) -> Self {
        self.rangex = slots;
        self
    }

    /// A fixed domain.
    #[must_use]
    pub fn domain(mut self, miny: T, maxy: T) -> Self {
        self.miny = miny;
        self.maxy = maxy;
        self
    }

    #[must_use]
    pub fn detect_max_only(mut self) -> Self {
        self.detect_max_only = true;
        self
    }

    /// Shade rows from `low` at the bottom to `high` at the top.
    #[must_use]
    pub fn gradient(mut self, low: Channels, high: Channels) -> Self {
        self.low = low;
        self.high = high;
        self
    }
}

// Fill masks per column, indexed by how many sub-rows are lit.
const QUAD_LEFT: [u8; 3] = [0, 0b0100, 0b0101];
const QUAD_RIGHT: [u8; 3] = [0, 0b1000, 0b1010];
const SEX_LEFT: [u8; 4] = [0, 0b01_0000, 0b01_0100, 0b01_0101];
const SEX_RIGHT: [u8; 4] = [0, 0b10_0000, 0b10_1000, 0b10_1010];
const BRAILLE_LEFT: [u8; 5] = [0, 0x40, 0x44, 0x46, 0x47];
const BRAILLE_RIGHT: [u8; 5] = [0, 0x80, 0xa0, 0xb0, 0xb8];
const HALVES: [char; 3] = [' ', '▄', '█'];
const QUARTERS: [char; 5] = [' ', '▂', '▄', '▆', '█'];

/// The glyph for one cell of a bar: `lit[i]` sub-rows filled in column `i`.
fn plot_glyph(blitter: Blitter, lit: [usize; 2]) -> char {
    let [l, r] = lit;
    match blitter {
        Blitter::Ascii => if l > 0 { '█' } else { ' ' },
        Blitter::Half => HALVES[l.min(2)],
        Blitter::FourStep => QUARTERS[l.min(4)],
        Blitter::EightStep => glyphs::EIGHTHS[l.min(8)],
        Blitter::Quadrant => glyphs::quadrant(QUAD_LEFT[l.min(2)] | QUAD_RIGHT[r.min(2)]),
        Blitter::Sextant => glyphs::sextant(SEX_LEFT[l.min(3)] | SEX_RIGHT[r.min(3)]),
        Blitter::Braille => glyphs::braille(BRAILLE_LEFT[l.min(4)] | BRAILLE_RIGHT[r.min(4)]),
        Blitter::Default | Blitter::Pixel => ' ',
    }
}

/// Row `y` of an `n`-row gradient running from `low` (row 0) to `high`.
/// Default channels stay default.
fn gradient_channel(low: Channel, high: Channel, y: u32, n: u32) -> Channel {
    if low.is_default() {
        return Channel::DEFAULT;
    }
    if n < 2 {
        return low;
    }
    let mix = |shift: u32| {
        let (lo, hi) = ((low.rgb() >> shift) & 0xff, (high.rgb() >> shift) & 0xff);
        ((lo * (n - 1 - y) + hi * y) / (n - 1)).min(0xff) << shift
    };
    Channel::from_rgb(mix(16) | mix(8) | mix(0)).with_alpha(low.alpha())
}

fn gradient_channels(low: Channels, high: Channels, y: u32, n: u32) -> Channels {
    Channels::new(
        gradient_channel(low.fg(), high.fg(), y, n),
        gradient_channel(low.bg(), high.bg(), y, n),
    )
}

/// A plot bound to one plane.
#[derive(Debug, Clone)]
pub struct Plot<T: PlotSample> {
    plane: PlaneId,
    set: &'static BlitSet,
    slots: Vec<T>,
    /// Index of the newest slot.
    slotstart: usize,
    /// The `x` stored at `slotstart`.
    slotx: u64,
    miny: T,
    maxy: T,
    detect_domain: bool,
    detect_max_only: bool,
    low: Channels,
    high: Channels,
}

impl<T: PlotSample> Plot<T> {
    /// Create a plot drawing onto `plane` and draw it once.
    pub fn new(
        arena: &mut PlaneArena,
        caps: &TerminalCapabilities,
        plane: PlaneId,
        opts: &PlotOptions<T>,
    ) -> Result<Self, BlitError> {
        let (miny, maxy) = (opts.miny, opts.maxy);
        if maxy < miny {
            return Err(BlitError::Domain(format!("maxy {maxy:?} is below miny {miny:?}")));
        }
        let detect_domain = miny == maxy;
        if detect_domain && miny != T::ZERO {
            return Err(BlitError::Domain("domain detection needs miny = maxy = 0".into()));
        }
        if opts.detect_max_only && !detect_domain {
            return Err(BlitError::Domain("detect_max_only needs domain detection".into()));
        }
        let requested = match opts.blitter {
            Blitter::Default => default_plot_blitter(caps),
            b => b,
        };
        let set = lookup(caps, requested, opts.degrade)?;
        if set.blitter == Blitter::Pixel {
            return Err(BlitError::Unsupported(Blitter::Pixel));
        }

        let p = arena.plane_mut(plane)?;
        let dimx = p.cols();
        let scaled = dimx * set.width;
        let slotcount = if opts.rangex == 0 || dimx < opts.rangex { scaled } else { opts.rangex };
        p.set_widget(WidgetBinding::new(WidgetKind::Plot));

        let plot = Self {
            plane,
            set,
            slots: vec![T::ZERO; slotcount as usize],
            slotstart: 0,
            slotx: 0,
            // Inverted while detecting, so the first sample sets both ends.
            miny: if detect_domain && !opts.detect_max_only { T::MAX } else { miny },
            maxy: if detect_domain { T::MIN } else { maxy },
            detect_domain,
            detect_max_only: opts.detect_max_only,
            low: opts.low,
            high: opts.high,
        };
        strata_core::debug!(
            blitter = set.blitter.as_str(),
            slots = slotcount,
            detect = detect_domain,
            "plot created"
        );
        plot.redraw(arena)?;
        Ok(plot)
    }

    pub fn plane(&self) -> PlaneId {
        self.plane
    }

    pub fn blitter(&self) -> Blitter {
        self.set.blitter
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The current `[miny, maxy]`.
    pub fn domain(&self) -> (T, T) {
        (self.miny, self.maxy)
    }

    /// Add `y` to the slot for `x`, sliding the window forward if `x` is
    /// newer than anything seen, then redraw.
    pub fn add_sample(&mut self, arena: &mut PlaneArena, x: u64, y: T) -> Result<(), BlitError> {
        self.update(arena, x, y, false)
    }

    /// Replace the slot for `x` with `y`, then redraw.
    pub fn set_sample(&mut self, arena: &mut PlaneArena, x: u64, y: T) -> Result<(), BlitError> {
        self.update(arena, x, y, true)
    }

    /// The accumulated value for `x`.
    pub fn sample(&self, x: u64) -> Result<T, BlitError> {
        if x > self.slotx {
            return Err(BlitError::Domain(format!("x {x} is ahead of the window ending at {}", self.slotx)));
        }
        self.check_window(x)?;
        Ok(self.slots[self.index(x)])
    }

    fn window_start(&self) -> u64 {
        self.slotx.saturating_sub(self.slots.len() as u64 - 1)
    }

    fn check_window(&self, x: u64) -> Result<(), BlitError> {
        if x < self.window_start() {
            return Err(BlitError::Domain(format!(
                "x {x} is behind the window starting at {}",
                self.window_start()
            )));
        }
        Ok(())
    }

    /// Slot index of an `x` inside the window.
    fn index(&self, x: u64) -> usize {
        let n = self.slots.len();
        let behind = (self.slotx - x) as usize;
        (self.slotstart + n - behind) % n
    }

    fn update(&mut self, arena: &mut PlaneArena, x: u64, y: T, reset: bool) -> Result<(), BlitError> {
        self.check_window(x)?;
        if !reset && y == T::ZERO && x <= self.slotx {
            return Ok(());
        }
        let value = if reset || x > self.slotx { y } else { self.slots[self.index(x)].accumulate(y) };
        if !self.detect_domain && (value < self.miny || value > self.maxy) {
            return Err(BlitError::Domain(format!(
                "{value:?} lies outside [{:?}, {:?}]",
                self.miny, self.maxy
            )));
        }
        self.slide(x);
        let idx = self.index(x);
        self.slots[idx] = value;
        if self.detect_domain {
            if value > self.maxy {
                self.maxy = value;
            }
            if !self.detect_max_only && value < self.miny {
                self.miny = value;
            }
        }
        self.redraw(arena)
    }

    /// Advance the window so that `x` is the newest slot.
    fn slide(&mut self, x: u64) {
        if x <= self.slotx {
            return;
        }
        let n = self.slots.len();
        let advance = x - self.slotx;
        self.slotx = x;
        if advance >= n as u64 {
            self.slots.fill(T::ZERO);
            self.slotstart = 0;
            return;
        }
        for _ in 0..advance {
            self.slotstart = (self.slotstart + 1) % n;
            self.slots[self.slotstart] = T::ZERO;
        }
    }

    /// Redraw the whole plot onto its plane.
    pub fn redraw(&self, arena: &mut PlaneArena) -> Result<(), BlitError> {
        let plane = arena.plane_mut(self.plane)?;
        plane.erase();
        let (dimy, dimx) = (plane.rows(), plane.cols());
        let scale = self.set.width as usize;
        let states = self.set.height as usize + 1;
        let slotcount = self.slots.len();
        let (miny, maxy) = (self.miny.to_f64(), self.maxy.to_f64());

        let mut interval = if maxy < miny { 0.0 } else { (maxy - miny) / (f64::from(dimy) * states as f64) };
        if interval == 0.0 {
            interval = 1.0;
        }
        let scaled = dimx as usize * scale;
        // Fewer slots than sub-columns leaves the right side empty.
        let finalx = if slotcount + 1 < scaled { (slotcount / scale) as i64 - 1 } else { i64::from(dimx) - 1 };
        if finalx < 0 {
            return Ok(());
        }
        let rows: Vec<Channels> = (0..dimy).map(|y| gradient_channels(self.low, self.high, y, dimy)).collect();

        let mut idx = self.slotstart;
        for x in (0..=finalx as u32).rev() {
            let mut gvals = [miny; 2];
            for g in gvals[..scale].iter_mut().rev() {
                let v = self.slots[idx];
                *g = if v < self.miny {
                    miny
                } else if v > self.maxy {
                    maxy
                } else {
                    v.to_f64()
                };
                idx = if idx == 0 { slotcount - 1 } else { idx - 1 };
            }
            let mut base = miny;
            let mut done = !self.set.fill;
            for y in 0..dimy {
                let mut lit = [0usize; 2];
                for (i, g) in gvals[..scale].iter().enumerate() {
                    if base < *g {
                        let mut steps = ((g - base) / interval) as usize;
                        if steps >= states {
                            steps = states - 1;
                            done = false;
                        }
                        lit[i] = steps;
                    }
                }
                if lit.iter().any(|&l| l > 0) {
                    let row = dimy - y - 1;
                    let ch = rows[y as usize];
                    if self.set.blitter == Blitter::Ascii {
                        // No block glyphs: a space in the inverted colors.
                        plane.put_glyph_yx(row, x, " ", StyleMask::empty(), Channels::new(ch.bg(), ch.fg()))?;
                    } else {
                        let mut buf = [0u8; 4];
                        let glyph = plot_glyph(self.set.blitter, lit);
                        plane.put_glyph_yx(row, x, glyph.encode_utf8(&mut buf), StyleMask::empty(), ch)?;
                    }
                }
                if done {
                    break;
                }
                base += states as f64 * interval;
            }
        }
        plane.home();
        Ok(())
    }
}
