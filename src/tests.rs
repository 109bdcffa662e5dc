use std::path::PathBuf;

use fontdue::{Font, FontSettings};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tiny_skia::Pixmap;

use super::raster::Surface;
use super::word::parse_hex_color;
use super::*;

/// Loads a font for rasterization tests from `WORDCLOUD_TEST_FONT` or a
/// handful of well-known system locations. Tests that need one skip with a
/// note when none is available.
fn test_font() -> Option<Font> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(path) = std::env::var("WORDCLOUD_TEST_FONT") {
        candidates.push(path.into());
    }
    for path in [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation-fonts/LiberationSans-Regular.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ] {
        candidates.push(path.into());
    }
    for path in candidates {
        if let Ok(data) = std::fs::read(&path) {
            if let Ok(font) = Font::from_bytes(data, FontSettings::default()) {
                return Some(font);
            }
        }
    }
    eprintln!("skipping: no usable font found, set WORDCLOUD_TEST_FONT to enable this test");
    None
}

fn out_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("wordcloud-tests");
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

fn is_ink_pixel(pixmap: &Pixmap, x: usize, y: usize) -> bool {
    let px = pixmap.pixels()[y * pixmap.width() as usize + x];
    !(px.red() == 255 && px.green() == 255 && px.blue() == 255 && px.alpha() == 255)
}

#[test]
fn bit_runs_straddle_word_boundaries() {
    let mut words = vec![0u64; 3];
    set_run(&mut words, 60, 0xFF);
    assert_eq!(words[0], 0xF << 60);
    assert_eq!(words[1], 0xF);
    assert!(test_run(&words, 60, 0xFF));
    assert!(test_run(&words, 63, 1));
    assert!(test_run(&words, 64, 0xF));
    assert!(!test_run(&words, 68, 1));

    // A run whose high bits are clear must not spill into the next word.
    let mut low = vec![0u64; 2];
    set_run(&mut low, 4, 0xF);
    assert_eq!(low[0], 0xF << 4);
    assert_eq!(low[1], 0);
}

#[test]
fn aligned_runs_never_touch_the_next_word() {
    // offset % 64 == 0 is the path where a careless 64-bit shift would
    // either panic or corrupt the neighboring word.
    let mut words = vec![0u64; 2];
    set_run(&mut words, 64, 1 << 63);
    assert_eq!(words[0], 0);
    assert_eq!(words[1], 1 << 63);
    assert!(test_run(&words, 64, 1 << 63));
    assert!(!test_run(&words, 0, !0));
}

#[test]
fn collision_is_boundary_exact() {
    let mask = GlyphMask {
        width: 8,
        height: 8,
        measured_h: 8,
        ink_top: 0,
        ink_bottom: 0,
        ink_left: 0,
        ink_right: 7,
        rotate: 0,
        padding: 0,
        bits: vec![0xFF],
    };
    let mut board = Board::new(40, 40);
    board.commit(&mask, 8, 8);
    for (x, y, expected) in [
        (8, 8, true),
        (9, 8, true),
        (15, 8, true),
        (16, 8, false),
        (18, 8, false),
    ] {
        assert_eq!(board.is_collide(&mask, x, y), expected, "at ({x}, {y})");
    }
}

#[test]
fn board_bits_follow_linear_pixel_indices() {
    let mask = GlyphMask {
        width: 1,
        height: 1,
        measured_h: 1,
        ink_top: 0,
        ink_bottom: 0,
        ink_left: 0,
        ink_right: 0,
        rotate: 0,
        padding: 0,
        bits: vec![1],
    };
    let mut board = Board::new(40, 40);
    board.commit(&mask, 13, 7);
    assert!(board.bit(7 * 40 + 13));
    let ones: u32 = board.bits().iter().map(|w| w.count_ones()).sum();
    assert_eq!(ones, 1);
}

#[test]
fn commit_makes_the_spot_collide() {
    // Two fully inked 70-pixel rows: every row spans two packed words with
    // a 6-bit tail.
    let mask = GlyphMask {
        width: 70,
        height: 2,
        measured_h: 2,
        ink_top: 0,
        ink_bottom: 1,
        ink_left: 0,
        ink_right: 69,
        rotate: 0,
        padding: 0,
        bits: vec![!0, 0x3F, !0, 0x3F],
    };
    for (x, y) in [(0, 0), (61, 40), (64, 10), (127, 77)] {
        let mut board = Board::new(200, 100);
        assert!(!board.is_collide(&mask, x, y), "fresh board at ({x}, {y})");
        board.commit(&mask, x, y);
        assert!(board.is_collide(&mask, x, y), "after commit at ({x}, {y})");
    }
}

#[test]
fn blank_masks_trim_empty_and_never_collide() {
    let mask = GlyphMask::from_rows(32, 4, 4, 0, 0, vec![0u64; 4]);
    assert!(mask.bits.is_empty());
    assert_eq!(mask.ink_bottom, -1);
    assert_eq!(mask.ink_top, 4);
    let mut board = Board::new(64, 64);
    assert!(!board.is_collide(&mask, 10, 10));
    board.commit(&mask, 10, 10);
    assert!(board.bits().iter().all(|&w| w == 0));
}

#[test]
fn masks_trim_to_the_ink_band() {
    let row_words = 2;
    let mut rows = vec![0u64; row_words * 6];
    rows[2 * row_words + 1] = 0b110; // columns 65 and 66 on row 2
    rows[3 * row_words + 1] = 0b010; // column 65 on row 3
    let mask = GlyphMask::from_rows(70, 6, 6, 0, 0, rows);
    assert_eq!((mask.ink_top, mask.ink_bottom), (2, 3));
    assert_eq!((mask.ink_left, mask.ink_right), (65, 66));
    assert_eq!(mask.bits.len(), 2 * row_words);
    assert_eq!(mask.bits[1], 0b110);
    assert_eq!(mask.bits[3], 0b010);
}

#[test]
fn dilation_grows_a_square_neighborhood() {
    let row_words = 2;
    let mut rows = vec![0u64; row_words * 5];
    rows[2 * row_words] = 1u64 << 63; // column 63 of row 2
    dilate_rows(&mut rows, row_words, 70, 1);
    for y in 1..=3 {
        assert_eq!(rows[y * row_words], 1 << 63 | 1 << 62, "row {y}, low word");
        assert_eq!(rows[y * row_words + 1], 1, "row {y}, high word");
    }
    assert_eq!(rows[0], 0);
    assert_eq!(rows[4 * row_words], 0);
    assert_eq!(rows[1], 0);
}

#[test]
fn dilation_is_monotonic_in_the_radius() {
    let mut base = vec![0u64; 7];
    base[3] = 0b11 << 20;
    let mut one = base.clone();
    dilate_rows(&mut one, 1, 60, 1);
    let mut two = base.clone();
    dilate_rows(&mut two, 1, 60, 2);
    for ((b, o), t) in base.iter().zip(&one).zip(&two) {
        assert_eq!(o & b, *b, "radius 1 keeps the original ink");
        assert_eq!(t & o, *o, "radius 2 keeps the radius-1 ink");
    }
}

#[test]
fn dilation_clips_at_the_mask_width() {
    let mut rows = vec![0u64; 3];
    rows[1] = 1 << 59;
    dilate_rows(&mut rows, 1, 60, 1);
    let beyond = !((1u64 << 60) - 1);
    assert!(rows.iter().all(|w| w & beyond == 0));
}

#[test]
fn spiral_terminates_and_starts_near_the_center() {
    let points: Vec<_> = Spiral::new(80, 40, 1).collect();
    assert!(!points.is_empty());
    assert!(points.len() < 100_000);
    let (dx, dy) = points[0];
    assert!(dx.abs() <= 2 && dy.abs() <= 2);

    let reversed: Vec<_> = Spiral::new(80, 40, -1).collect();
    assert_eq!(points.len(), reversed.len());
}

#[test]
fn placement_rejects_out_of_canvas_anchors() {
    let cloud = WordCloud::new(40, 40);
    let mask = GlyphMask {
        width: 8,
        height: 8,
        measured_h: 8,
        ink_top: 1,
        ink_bottom: 6,
        ink_left: 1,
        ink_right: 6,
        rotate: 0,
        padding: 2,
        bits: vec![0; 6],
    };
    assert!(cloud.fits(4, 4, &mask));
    assert!(cloud.fits(30, 4, &mask));
    assert!(!cloud.fits(-1, 4, &mask), "negative anchors alias packed rows");
    assert!(!cloud.fits(0, 4, &mask), "padding left of the canvas");
    assert!(!cloud.fits(4, 0, &mask));
    assert!(!cloud.fits(32, 4, &mask));
    assert!(!cloud.fits(4, 31, &mask));
}

#[test]
fn too_small_a_canvas_reports_exhaustion() {
    let mut cloud = WordCloud::new(4, 4);
    cloud.set_seed(1);
    let mask = GlyphMask {
        width: 8,
        height: 8,
        measured_h: 8,
        ink_top: 0,
        ink_bottom: 7,
        ink_left: 0,
        ink_right: 7,
        rotate: 0,
        padding: 0,
        bits: vec![0xFF; 8],
    };
    let board = Board::new(4, 4);
    assert!(matches!(
        cloud.place(&board, &mask),
        Err(Error::CanvasExhausted)
    ));
}

#[test]
fn rendering_without_a_font_fails_fast() {
    let mut cloud = WordCloud::new(100, 100);
    let words = [Word::new("hi", 12)];
    assert!(matches!(
        cloud.render(&words, out_path("no_font.png")),
        Err(Error::FontUnavailable)
    ));
}

#[test]
fn rotation_configuration_is_clamped() {
    let mut cloud = WordCloud::new(10, 10);
    cloud.set_rotate(10, 1);
    assert_eq!((cloud.angle_range, cloud.orientations), (30, 2));
    cloud.set_rotate(500, 9);
    assert_eq!((cloud.angle_range, cloud.orientations), (120, 9));
}

#[test]
fn auto_rotation_picks_evenly_spaced_angles() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let mut seen = std::collections::HashSet::new();
    for _ in 0..200 {
        let angle = rand_rotate(&mut rng, 120, 5);
        assert!([-60, -30, 0, 30, 60].contains(&angle), "angle {angle}");
        seen.insert(angle);
    }
    assert!(seen.len() > 1);
}

#[test]
fn random_words_sort_by_descending_size() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let words = random_words(&["a", "bb", "ccc", "dddd", "e"], &mut rng);
    assert_eq!(words.len(), 5);
    assert!(words.windows(2).all(|w| w[0].size() >= w[1].size()));
    assert!(words.iter().all(|w| (10..=55).contains(&w.size())));
    assert!(words.iter().all(|w| w.color.is_some()));
}

#[test]
fn hex_colors_parse_in_three_widths() {
    let c = parse_hex_color("#393b79").unwrap();
    assert_eq!(
        (c.red(), c.green(), c.blue(), c.alpha()),
        (0x39, 0x3b, 0x79, 255)
    );
    let c = parse_hex_color("#fff").unwrap();
    assert_eq!((c.red(), c.green(), c.blue()), (255, 255, 255));
    let c = parse_hex_color("80808040").unwrap();
    assert_eq!(c.alpha(), 0x40);
    assert!(parse_hex_color("#12345").is_none());
    assert!(parse_hex_color("#gggggg").is_none());
}

#[test]
fn masks_cover_every_word_in_order() {
    let Some(font) = test_font() else { return };
    let mut cloud = WordCloud::new(100, 100);
    cloud.set_font(font);
    cloud.set_seed(5);
    let words: Vec<Word> = [
        ("aaa", 13),
        ("bb", 13),
        ("ccc", 14),
        ("dddd", 14),
        ("e", 14),
        ("a", 12),
        ("bb", 13),
    ]
    .iter()
    .map(|(text, size)| Word::new(*text, *size))
    .collect();
    let mut scratch = Surface::new(SCRATCH_EDGE, SCRATCH_EDGE).unwrap();
    let masks = cloud.build_masks(&mut scratch, &words).unwrap();
    assert_eq!(masks.len(), words.len());
    for mask in &masks {
        assert!(mask.ink_bottom >= mask.ink_top, "glyphs left ink somewhere");
        assert_eq!(
            mask.bits.len(),
            (mask.ink_bottom - mask.ink_top + 1) as usize * mask.row_words()
        );
        assert!(mask.ink_left <= mask.ink_right);
        assert!(mask.ink_right < mask.width);
        assert!(mask.ink_bottom < mask.height);
    }
}

#[test]
fn renders_a_small_cjk_cloud() {
    let Some(font) = test_font() else { return };
    let mut cloud = WordCloud::new(400, 400);
    cloud.set_font(font);
    cloud.set_seed(2024);
    let texts = [
        "love", "movie", "animation", "music", "分子", "电子", "松子", "离子", "绝绝子", "孙子",
        "孟子", "孔子", "老子",
    ];
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let words = random_words(&texts, &mut rng);
    let out = out_path("cjk.png");
    let board = cloud.render_all(&words, &out, true).unwrap();
    assert!(board.bits().iter().any(|&w| w != 0));
    assert!(out.exists());
    assert!(out.with_file_name("board.png").exists());
    assert!(out.with_file_name("cal_board.png").exists());
}

#[test]
fn occupancy_covers_rendered_ink() {
    let Some(font) = test_font() else { return };
    let (width, height) = (400, 400);
    let mut cloud = WordCloud::new(width, height);
    cloud.set_font(font);
    cloud.set_rotate(120, 5);
    cloud.set_seed(9);
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let texts = ["love", "movie", "animation", "music", "atom", "proton", "neutron"];
    let words = random_words(&texts, &mut rng);
    let out = out_path("soundness.png");
    let board = cloud.render_all(&words, &out, false).unwrap();

    let pixmap = Pixmap::load_png(&out).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut sampled = 0;
    let mut mismatches = 0;
    let mut attempts = 0;
    while sampled < 1000 && attempts < 2_000_000 {
        attempts += 1;
        let x = rng.random_range(0..width) as usize;
        let y = rng.random_range(0..height) as usize;
        if !is_ink_pixel(&pixmap, x, y) {
            continue;
        }
        sampled += 1;
        if !board.bit(y * width as usize + x) {
            mismatches += 1;
        }
    }
    assert_eq!(sampled, 1000, "expected enough ink on the canvas to sample");
    assert!(
        mismatches <= 100,
        "{mismatches} of 1000 ink pixels missing from the board"
    );
}

#[test]
fn identical_seeds_reproduce_the_board() {
    let Some(font) = test_font() else { return };
    let mut cloud = WordCloud::new(300, 300);
    cloud.set_font(font);
    cloud.set_rotate(90, 3);
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let words = random_words(&["alpha", "beta", "gamma", "delta", "epsilon"], &mut rng);
    cloud.set_seed(31);
    let first = cloud
        .render_all(&words, out_path("seed_a.png"), false)
        .unwrap();
    cloud.set_seed(31);
    let second = cloud
        .render_all(&words, out_path("seed_b.png"), false)
        .unwrap();
    assert_eq!(first.bits(), second.bits());
}

#[test]
fn words_larger_than_the_scratch_surface_are_fatal() {
    let Some(font) = test_font() else { return };
    let mut cloud = WordCloud::new(200, 200);
    cloud.set_font(font);
    let words = [Word::new("colossal", 4000)];
    match cloud.render(&words, out_path("oversized.png")) {
        Err(Error::OversizedWord(text)) => assert_eq!(text, "colossal"),
        other => panic!("expected an oversized-word error, got {other:?}"),
    }
}
