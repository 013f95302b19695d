#![forbid(unsafe_code)]

//! The 256-entry terminal palette.
//!
//! Palette-indexed channels are resolved through this table whenever they
//! have to be blended. Entries start at the conventional xterm values; an
//! application may redefine them, which marks them damaged so the rasterizer
//! can push the new definition (OSC 4) on terminals that allow it.

const ANSI16: [u32; 16] = [
    0x000000, 0xcd0000, 0x00cd00, 0xcdcd00, 0x0000ee, 0xcd00cd, 0x00cdcd, 0xe5e5e5, 0x7f7f7f,
    0xff0000, 0x00ff00, 0xffff00, 0x5c5cff, 0xff00ff, 0x00ffff, 0xffffff,
];

const fn cube_level(v: usize) -> u32 {
    if v == 0 { 0 } else { (55 + v * 40) as u32 }
}

const fn xterm_entry(idx: usize) -> u32 {
    if idx < 16 {
        return ANSI16[idx];
    }
    if idx < 232 {
        let i = idx - 16;
        return (cube_level(i / 36) << 16) | (cube_level((i / 6) % 6) << 8) | cube_level(i % 6);
    }
    let grey = (8 + (idx - 232) * 10) as u32;
    (grey << 16) | (grey << 8) | grey
}

const fn xterm_table() -> [u32; 256] {
    let mut out = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        out[i] = xterm_entry(i);
        i += 1;
    }
    out
}

/// Palette plus the RGB values assumed for the terminal's default colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: [u32; 256],
    damaged: [bool; 256],
    /// Assumed RGB of the default foreground.
    pub default_fg: u32,
    /// Assumed RGB of the default background.
    pub default_bg: u32,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            entries: xterm_table(),
            damaged: [false; 256],
            default_fg: 0xffffff,
            default_bg: 0x000000,
        }
    }
}

impl Palette {
    #[inline]
    pub fn get(&self, idx: u8) -> u32 {
        self.entries[idx as usize]
    }

    /// Redefine an entry. Marks it damaged only when the value changes.
    pub fn set(&mut self, idx: u8, rgb: u32) {
        let rgb = rgb & 0xff_ffff;
        let slot = &mut self.entries[idx as usize];
        if *slot != rgb {
            *slot = rgb;
            self.damaged[idx as usize] = true;
        }
    }

    pub fn is_damaged(&self) -> bool {
        self.damaged.iter().any(|d| *d)
    }

    /// Take the damaged entries, clearing their flags.
    pub fn take_damage(&mut self) -> Vec<(u8, u32)> {
        let mut out = Vec::new();
        for (idx, flag) in self.damaged.iter_mut().enumerate() {
            if std::mem::take(flag) {
                out.push((idx as u8, self.entries[idx]));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::Palette;

    #[test]
    fn xterm_defaults() {
        let pal = Palette::default();
        assert_eq!(pal.get(0), 0x000000);
        assert_eq!(pal.get(15), 0xffffff);
        assert_eq!(pal.get(16), 0x000000);
        assert_eq!(pal.get(196), 0xff0000);
        assert_eq!(pal.get(231), 0xffffff);
        assert_eq!(pal.get(232), 0x080808);
        assert_eq!(pal.get(255), 0xeeeeee);
    }

    #[test]
    fn damage_tracks_real_changes() {
        let mut pal = Palette::default();
        pal.set(196, 0xff0000);
        assert!(!pal.is_damaged());
        pal.set(3, 0x010203);
        assert!(pal.is_damaged());
        assert_eq!(pal.take_damage(), vec![(3, 0x010203)]);
        assert!(!pal.is_damaged());
    }
}
