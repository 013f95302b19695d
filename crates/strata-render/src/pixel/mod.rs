#![forbid(unsafe_code)]

//! Bitmap graphics protocol encoders.
//!
//! The rasterizer drives sprixels through their states and asks the
//! encoder for the bytes each step needs. Encoders hold no state; every
//! call renders from the sprixel's current pixels.

use std::io::{self, Write};

use strata_core::capabilities::PixelProtocol;

use crate::sprixel::{Sprixel, SprixelId};

pub mod kitty;
pub mod sixel;

pub use kitty::Kitty;
pub use sixel::Sixel;

/// One terminal bitmap protocol.
pub trait PixelEncoder: Send + Sync {
    fn protocol(&self) -> PixelProtocol;

    /// Emit the bitmap. The cursor is already at the sprixel's origin.
    fn draw(&self, w: &mut dyn Write, sprixel: &Sprixel) -> io::Result<()>;

    /// Whether [`draw`](Self::draw) leaves the bitmap visible. Protocols
    /// that only upload need a later [`commit`](Self::commit).
    fn draw_is_visible(&self) -> bool;

    /// Make a loaded bitmap visible at the cursor.
    fn commit(&self, _w: &mut dyn Write, _sprixel: &Sprixel) -> io::Result<()> {
        Ok(())
    }

    /// Move an already visible bitmap to the cursor without sending pixels
    /// again. Returns `false` when the protocol cannot, in which case the
    /// caller redraws.
    fn relocate(&self, _w: &mut dyn Write, _sprixel: &Sprixel) -> io::Result<bool> {
        Ok(false)
    }

    /// Send the sprixel's queued cell patches to the bitmap already on the
    /// terminal. Returns `false` when the protocol cannot edit a shown
    /// bitmap; such protocols never queue patches.
    fn patch(&self, _w: &mut dyn Write, _sprixel: &Sprixel) -> io::Result<bool> {
        Ok(false)
    }

    /// Delete a bitmap by id. Protocols without ids erase by repainting
    /// the text beneath, and write nothing here.
    fn remove(&self, _w: &mut dyn Write, _id: SprixelId) -> io::Result<()> {
        Ok(())
    }

    /// Delete every bitmap this process placed.
    fn clear_all(&self, _w: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }

    /// Whether a removed bitmap's cells must be repainted as text before
    /// it can be freed.
    fn scrub_frees(&self) -> bool;
}

/// The encoder for `protocol`.
pub fn encoder(protocol: PixelProtocol) -> &'static dyn PixelEncoder {
    match protocol {
        PixelProtocol::Kitty => &Kitty,
        PixelProtocol::Sixel => &Sixel,
    }
}
