#![forbid(unsafe_code)]

//! Kitty graphics protocol.
//!
//! Images are sent as raw 32-bit RGBA (`f=32`), base64 encoded and split
//! into chunks of at most 4096 encoded bytes. Every image gets a single
//! placement (`p=1`), so placing it again moves it.
//!
//! Cells erased by text, or restored afterwards, are sent as edits of the
//! image's root frame (`a=f,r=1`, replacing pixels with `X=1`). The
//! terminal updates every placement of the image, so nothing is uploaded
//! or placed again.

use std::io::{self, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use strata_core::capabilities::PixelProtocol;

use super::PixelEncoder;
use crate::sprixel::{Sprixel, SprixelId};

/// Encoded bytes per chunk.
pub const CHUNK_ENCODED: usize = 4096;
/// Raw bytes per chunk.
pub const CHUNK_RAW: usize = CHUNK_ENCODED / 4 * 3;

/// Delete every image.
pub const CLEAR_ALL: &[u8] = b"\x1b_Ga=d,q=2\x1b\\";

#[derive(Debug, Clone, Copy, Default)]
pub struct Kitty;

/// Write `raw` as base64 chunks, the first one carrying `keys`.
fn write_chunked<W: Write + ?Sized>(w: &mut W, keys: &str, raw: &[u8]) -> io::Result<()> {
    let mut chunks = raw.chunks(CHUNK_RAW).peekable();
    let mut first = true;
    let mut encoded = String::with_capacity(CHUNK_ENCODED);
    while let Some(chunk) = chunks.next() {
        let more = u8::from(chunks.peek().is_some());
        if first {
            write!(w, "\x1b_G{keys},m={more};")?;
            first = false;
        } else {
            write!(w, "\x1b_Gm={more};")?;
        }
        encoded.clear();
        STANDARD.encode_string(chunk, &mut encoded);
        w.write_all(encoded.as_bytes())?;
        w.write_all(b"\x1b\\")?;
    }
    Ok(())
}

/// Transmit `rgba` (`rows` x `cols`) as image `id` without displaying it.
pub fn transmit<W: Write + ?Sized>(w: &mut W, id: u32, rgba: &[u8], rows: u32, cols: u32) -> io::Result<()> {
    write_chunked(w, &format!("f=32,s={cols},v={rows},i={id},p=1,a=t,q=2"), rgba)
}

/// Replace the `rows` x `cols` pixels at `(y, x)` of image `id`'s root frame
/// with `rgba`.
pub fn edit_frame<W: Write + ?Sized>(
    w: &mut W,
    id: u32,
    (y, x): (u32, u32),
    (rows, cols): (u32, u32),
    rgba: &[u8],
) -> io::Result<()> {
    write_chunked(w, &format!("a=f,r=1,i={id},x={x},y={y},s={cols},v={rows},X=1,q=2"), rgba)
}

/// Display image `id` at the cursor, offset by `px_offset` (y, x) pixels.
/// The cursor does not move.
pub fn place<W: Write + ?Sized>(w: &mut W, id: u32, px_offset: (u32, u32)) -> io::Result<()> {
    let (oy, ox) = px_offset;
    if oy != 0 || ox != 0 {
        write!(w, "\x1b_Ga=p,i={id},p=1,X={ox},Y={oy},C=1,q=2\x1b\\")
    } else {
        write!(w, "\x1b_Ga=p,i={id},p=1,C=1,q=2\x1b\\")
    }
}

/// Delete image `id` and its placements.
pub fn delete<W: Write + ?Sized>(w: &mut W, id: u32) -> io::Result<()> {
    write!(w, "\x1b_Ga=d,d=I,i={id},q=2\x1b\\")
}

impl PixelEncoder for Kitty {
    fn protocol(&self) -> PixelProtocol {
        PixelProtocol::Kitty
    }

    fn draw(&self, w: &mut dyn Write, sprixel: &Sprixel) -> io::Result<()> {
        let (rows, cols) = sprixel.pixel_dims();
        transmit(w, sprixel.id().raw(), sprixel.pixels(), rows, cols)
    }

    fn draw_is_visible(&self) -> bool {
        false
    }

    fn commit(&self, w: &mut dyn Write, sprixel: &Sprixel) -> io::Result<()> {
        place(w, sprixel.id().raw(), sprixel.px_offset())
    }

    fn relocate(&self, w: &mut dyn Write, sprixel: &Sprixel) -> io::Result<bool> {
        place(w, sprixel.id().raw(), sprixel.px_offset())?;
        Ok(true)
    }

    fn patch(&self, w: &mut dyn Write, sprixel: &Sprixel) -> io::Result<bool> {
        for &(cy, cx) in sprixel.patches() {
            let ((y, x, rows, cols), rgba) = sprixel.cell_rgba(cy, cx);
            if rows == 0 || cols == 0 {
                continue;
            }
            edit_frame(w, sprixel.id().raw(), (y, x), (rows, cols), &rgba)?;
        }
        Ok(true)
    }

    fn remove(&self, w: &mut dyn Write, id: SprixelId) -> io::Result<()> {
        delete(w, id.raw())
    }

    fn clear_all(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(CLEAR_ALL)
    }

    fn scrub_frees(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_bytes<F: FnOnce(&mut Vec<u8>) -> io::Result<()>>(f: F) -> Vec<u8> {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        buf
    }

    #[test]
    fn small_image_is_one_chunk() {
        let out = to_bytes(|w| transmit(w, 5, &[255, 0, 0, 255], 1, 1));
        assert_eq!(out, b"\x1b_Gf=32,s=1,v=1,i=5,p=1,a=t,q=2,m=0;/wAA/w==\x1b\\".to_vec());
    }

    #[test]
    fn large_image_is_chunked() {
        let rgba = vec![7u8; CHUNK_RAW * 2 + 4];
        let out = String::from_utf8(to_bytes(|w| transmit(w, 9, &rgba, 1, rgba.len() as u32 / 4))).unwrap();
        assert_eq!(out.matches("\x1b_G").count(), 3);
        assert_eq!(out.matches("m=1;").count(), 2);
        assert_eq!(out.matches("\x1b_Gm=0;").count(), 1);
        for payload in out.split("\x1b\\").filter(|s| !s.is_empty()) {
            let data = payload.split(';').nth(1).unwrap();
            assert!(data.len() <= CHUNK_ENCODED);
        }
    }

    #[test]
    fn placement_with_pixel_offset() {
        assert_eq!(to_bytes(|w| place(w, 3, (0, 0))), b"\x1b_Ga=p,i=3,p=1,C=1,q=2\x1b\\".to_vec());
        assert_eq!(
            to_bytes(|w| place(w, 3, (2, 5))),
            b"\x1b_Ga=p,i=3,p=1,X=5,Y=2,C=1,q=2\x1b\\".to_vec()
        );
    }

    #[test]
    fn frame_edit_replaces_a_rectangle() {
        let out = to_bytes(|w| edit_frame(w, 4, (2, 6), (1, 1), &[0, 0, 0, 0]));
        assert_eq!(out, b"\x1b_Ga=f,r=1,i=4,x=6,y=2,s=1,v=1,X=1,q=2,m=0;AAAAAA==\x1b\\".to_vec());
    }

    #[test]
    fn deletion() {
        assert_eq!(to_bytes(|w| delete(w, 12)), b"\x1b_Ga=d,d=I,i=12,q=2\x1b\\".to_vec());
        assert_eq!(to_bytes(|w| Kitty.clear_all(w)), CLEAR_ALL.to_vec());
    }
}
