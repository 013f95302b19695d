//! Sprixel lifecycle across frames: upload, placement, movement, text
//! annihilation and removal, for both bitmap protocols.

use strata_core::capabilities::{PixelProtocol, TerminalCapabilities};
use strata_core::config::RenderOptions;
use strata_core::geometry::CellPixels;
use strata_render::{PlaneId, PlaneOptions, Screen, SprixelState, Tam, TamState};

const CELL: CellPixels = CellPixels::new(2, 2);

fn screen(caps: TerminalCapabilities, rows: u32, cols: u32) -> Screen {
    Screen::new(rows, cols, CELL, caps, RenderOptions::default()).expect("screen")
}

fn frame(s: &Screen) -> String {
    let mut out = Vec::new();
    s.render_to(s.std_pile(), &mut out).expect("render");
    String::from_utf8_lossy(&out).into_owned()
}

/// An opaque `cell_rows` x `cell_cols` bitmap on a fresh child of the
/// standard plane at `(y, x)`.
fn bitmap(s: &Screen, proto: PixelProtocol, y: i32, x: i32, cell_rows: u32, cell_cols: u32) -> PlaneId {
    let std = s.std_plane();
    s.with_arena(|a| {
        let n = a.create_child(std, &PlaneOptions::new(cell_rows, cell_cols).at(y, x))?;
        let (py, px) = (cell_rows * 2, cell_cols * 2);
        let rgba = [200u8, 40, 90, 255].repeat((py * px) as usize);
        a.attach_sprixel(n, proto, rgba, py, px, None, (0, 0))?;
        Ok::<_, strata_render::RenderError>(n)
    })
    .expect("bitmap")
}

fn state(s: &Screen, n: PlaneId) -> SprixelState {
    s.arena().sprixel(n).unwrap().expect("sprixel").state()
}

#[test]
fn kitty_upload_place_and_elide() {
    let s = screen(TerminalCapabilities::kitty(), 4, 6);
    let n = bitmap(&s, PixelProtocol::Kitty, 1, 2, 2, 2);
    assert_eq!(state(&s, n), SprixelState::Invalidated);

    let out = frame(&s);
    let upload = out.find("a=t").expect("upload");
    let place = out.find("a=p").expect("placement");
    assert!(upload < place);
    assert!(out.contains("s=4,v=4"));
    assert_eq!(state(&s, n), SprixelState::Quiescent);

    assert_eq!(frame(&s), "");
    let stats = s.stats();
    assert_eq!(stats.sprixel_emissions, 1);
    assert!(stats.sprixel_elisions >= 1);
}

#[test]
fn kitty_move_replaces_placement_without_upload() {
    let s = screen(TerminalCapabilities::kitty(), 4, 6);
    let n = bitmap(&s, PixelProtocol::Kitty, 0, 0, 1, 1);
    frame(&s);
    s.with_arena(|a| a.move_yx(n, 2, 3)).unwrap();
    assert_eq!(state(&s, n), SprixelState::Moved);

    let out = frame(&s);
    assert!(out.contains("\x1b[3;4H\x1b_Ga=p"));
    assert!(!out.contains("a=t"));
    assert_eq!(state(&s, n), SprixelState::Quiescent);
}

#[test]
fn kitty_hide_deletes_by_id() {
    let s = screen(TerminalCapabilities::kitty(), 2, 2);
    let n = bitmap(&s, PixelProtocol::Kitty, 0, 0, 1, 1);
    frame(&s);
    let id = s.arena().sprixel(n).unwrap().unwrap().id();
    s.with_arena(|a| a.hide_sprite(n)).unwrap();
    let out = frame(&s);
    assert!(out.contains(&format!("\x1b_Ga=d,d=I,i={},q=2", id.raw())));
    assert!(s.arena().pile(s.std_pile()).unwrap().sprixels().is_empty());
}

#[test]
fn sixel_draws_once_and_hides_text_below() {
    let s = screen(TerminalCapabilities::foot(), 2, 4);
    let std = s.std_plane();
    s.with_arena(|a| a.plane_mut(std).unwrap().putstr("unde").map(|_| ())).unwrap();
    let n = bitmap(&s, PixelProtocol::Sixel, 0, 0, 1, 2);

    let out = frame(&s);
    assert!(out.contains("\x1bP0;1;0q"));
    // The two covered cells stay under the bitmap.
    assert!(out.contains("de"));
    assert!(!out.contains("un"));
    assert_eq!(state(&s, n), SprixelState::Quiescent);
    assert_eq!(frame(&s), "");
}

#[test]
fn text_over_sixel_annihilates_then_rebuilds() {
    let s = screen(TerminalCapabilities::foot(), 2, 4);
    let std = s.std_plane();
    let n = bitmap(&s, PixelProtocol::Sixel, 0, 0, 1, 2);
    let label = s
        .with_arena(|a| {
            let label = a.create_child(std, &PlaneOptions::new(1, 1).at(0, 1))?;
            a.plane_mut(label)?.putc('T')?;
            Ok::<_, strata_render::RenderError>(label)
        })
        .unwrap();

    let out = frame(&s);
    let dcs = out.find("\x1bP").expect("sixel");
    let text = out.rfind('T').expect("text");
    assert!(dcs < text);
    {
        let arena = s.arena();
        let sprixel = arena.sprixel(n).unwrap().unwrap();
        assert_eq!(sprixel.tam().state(0, 0), Some(TamState::Opaque));
        assert_eq!(sprixel.tam().state(0, 1), Some(TamState::Annihilated));
    }
    assert_eq!(frame(&s), "");

    s.with_arena(|a| a.destroy(label)).unwrap();
    let out = frame(&s);
    assert!(out.contains("\x1bP"));
    assert!(!out.contains('T'));
    let arena = s.arena();
    let sprixel = arena.sprixel(n).unwrap().unwrap();
    assert_eq!(sprixel.tam().state(0, 1), Some(TamState::Opaque));
    assert_eq!(sprixel.state(), SprixelState::Quiescent);
}

/// A one-cell plane showing `ch` at `(y, x)`, above everything drawn so far.
fn label(s: &Screen, y: i32, x: i32, ch: char) -> PlaneId {
    let std = s.std_plane();
    s.with_arena(|a| {
        let label = a.create_child(std, &PlaneOptions::new(1, 1).at(y, x))?;
        a.plane_mut(label)?.putc(ch)?;
        Ok::<_, strata_render::RenderError>(label)
    })
    .expect("label")
}

#[test]
fn text_over_kitty_edits_the_frame_in_place() {
    let s = screen(TerminalCapabilities::kitty(), 2, 4);
    let n = bitmap(&s, PixelProtocol::Kitty, 0, 0, 1, 2);
    frame(&s);
    let id = s.arena().sprixel(n).unwrap().unwrap().id().raw();
    let t = label(&s, 0, 1, 'T');

    let out = frame(&s);
    assert!(out.contains(&format!("\x1b_Ga=f,r=1,i={id},x=2,y=0,s=2,v=2,X=1,q=2")));
    assert!(!out.contains("a=t"));
    assert!(out.contains('T'));
    {
        let arena = s.arena();
        let sprixel = arena.sprixel(n).unwrap().unwrap();
        assert_eq!(sprixel.tam().state(0, 1), Some(TamState::Annihilated));
        assert_eq!(sprixel.state(), SprixelState::Quiescent);
        assert!(sprixel.patches().is_empty());
    }
    assert_eq!(frame(&s), "");

    s.with_arena(|a| a.destroy(t)).unwrap();
    let out = frame(&s);
    assert!(out.contains("a=f,r=1"));
    assert!(!out.contains("a=t"));
    let arena = s.arena();
    assert_eq!(arena.sprixel(n).unwrap().unwrap().tam().state(0, 1), Some(TamState::Opaque));
}

#[test]
fn offset_bitmap_spills_and_keeps_boundary_cells_mixed() {
    let s = screen(TerminalCapabilities::kitty(), 4, 4);
    let std = s.std_plane();
    let n = s
        .with_arena(|a| {
            let n = a.create_child(std, &PlaneOptions::new(3, 3))?;
            let rgba = [10u8, 200, 30, 255].repeat(16);
            a.attach_sprixel(n, PixelProtocol::Kitty, rgba, 4, 4, None, (1, 1))?;
            Ok::<_, strata_render::RenderError>(n)
        })
        .unwrap();
    {
        let arena = s.arena();
        let tam = arena.sprixel(n).unwrap().unwrap().tam();
        assert_eq!((tam.rows(), tam.cols()), (3, 3));
        for (y, x) in [(0, 0), (0, 1), (0, 2), (1, 0), (1, 2), (2, 0), (2, 1), (2, 2)] {
            assert_eq!(tam.state(y, x), Some(TamState::Mixed), "cell {y},{x}");
        }
        assert_eq!(tam.state(1, 1), Some(TamState::Opaque));
    }

    let out = frame(&s);
    assert!(out.contains("s=4,v=4"));
    assert!(out.contains("a=p,i=") && out.contains("X=1,Y=1"));

    label(&s, 1, 1, 'o');
    let out = frame(&s);
    assert!(out.contains("a=f,r=1") && out.contains("x=1,y=1,s=2,v=2"));
    assert!(out.contains('o'));

    let err = s
        .with_arena(|a| {
            let m = a.create_child(std, &PlaneOptions::new(3, 3))?;
            a.attach_sprixel(m, PixelProtocol::Kitty, vec![0; 16 * 4], 4, 4, None, (2, 0))
        })
        .unwrap_err();
    assert!(matches!(err, strata_render::RenderError::Sprixel(_)));
}

#[test]
fn offset_sixel_pads_the_bitmap() {
    let s = screen(TerminalCapabilities::foot(), 3, 3);
    let std = s.std_plane();
    s.with_arena(|a| {
        let n = a.create_child(std, &PlaneOptions::new(3, 3))?;
        a.attach_sprixel(n, PixelProtocol::Sixel, [1u8, 2, 3, 255].repeat(16), 4, 4, None, (1, 1))
    })
    .unwrap();
    let out = frame(&s);
    assert!(out.contains("\"1;1;5;5"));
}

#[test]
fn hiding_an_annihilated_sixel_repaints_text_and_redraws_later() {
    let s = screen(TerminalCapabilities::foot(), 2, 4);
    let n = bitmap(&s, PixelProtocol::Sixel, 0, 0, 1, 2);
    label(&s, 0, 1, 'T');
    frame(&s);
    assert_eq!(
        s.arena().sprixel(n).unwrap().unwrap().tam().state(0, 1),
        Some(TamState::Annihilated)
    );

    s.with_arena(|a| a.hide_sprite(n)).unwrap();
    let out = frame(&s);
    assert!(!out.contains("\x1bP"));
    assert!(out.contains('T'));
    assert!(s.arena().pile(s.std_pile()).unwrap().sprixels().is_empty());
    assert_eq!(frame(&s), "");

    s.with_arena(|a| {
        a.attach_sprixel(n, PixelProtocol::Sixel, [200u8, 40, 90, 255].repeat(8), 2, 4, None, (0, 0))
    })
    .unwrap();
    let out = frame(&s);
    assert!(out.contains("\x1bP"));
    let arena = s.arena();
    let sprixel = arena.sprixel(n).unwrap().unwrap();
    assert_eq!(sprixel.tam().state(0, 1), Some(TamState::Annihilated));
    assert_eq!(sprixel.state(), SprixelState::Quiescent);
}

#[test]
fn hidden_sixel_is_scrubbed_with_text() {
    let s = screen(TerminalCapabilities::foot(), 1, 4);
    let std = s.std_plane();
    s.with_arena(|a| a.plane_mut(std).unwrap().putstr("abcd").map(|_| ())).unwrap();
    let n = bitmap(&s, PixelProtocol::Sixel, 0, 0, 1, 2);
    frame(&s);
    s.with_arena(|a| a.destroy(n)).unwrap();
    let out = frame(&s);
    assert!(out.contains("ab"));
    assert!(!out.contains("\x1bP"));
    assert!(s.arena().pile(s.std_pile()).unwrap().sprixels().is_empty());
}

#[test]
fn bitmap_larger_than_plane_is_rejected() {
    let s = screen(TerminalCapabilities::kitty(), 4, 4);
    let std = s.std_plane();
    let err = s
        .with_arena(|a| {
            let n = a.create_child(std, &PlaneOptions::new(1, 1))?;
            a.attach_sprixel(n, PixelProtocol::Kitty, vec![0; 4 * 4 * 4], 4, 4, None, (0, 0))
        })
        .unwrap_err();
    assert!(matches!(err, strata_render::RenderError::InvalidGeometry(_)));
}

#[test]
fn classification_by_cell() {
    // 2x4 pixels, cells of 2x2: left cell opaque, right cell half clear.
    let mut rgba = Vec::new();
    for _row in 0..2 {
        rgba.extend_from_slice(&[9, 9, 9, 255, 9, 9, 9, 255, 9, 9, 9, 255, 0, 0, 0, 0]);
    }
    let tam = Tam::classify(&rgba, 2, 4, CELL, (0, 0), None);
    assert_eq!((tam.rows(), tam.cols()), (1, 2));
    assert_eq!(tam.state(0, 0), Some(TamState::Opaque));
    assert_eq!(tam.state(0, 1), Some(TamState::Mixed));

    let keyed = Tam::classify(&rgba, 2, 4, CELL, (0, 0), Some(0x090909));
    assert_eq!(keyed.state(0, 0), Some(TamState::Transparent));
    assert_eq!(keyed.count(TamState::Transparent), 2);
}

#[test]
fn terminals_without_bitmaps_skip_sprixels() {
    let s = screen(TerminalCapabilities::modern(), 2, 2);
    bitmap(&s, PixelProtocol::Kitty, 0, 0, 1, 1);
    let out = frame(&s);
    assert!(!out.contains("\x1b_G"));
    assert!(!out.contains("\x1bP"));
}
