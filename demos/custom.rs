//! Per-word styling with auto rotation and diagnostic output.
//!
//! Usage: cargo run --example custom -- <font.ttf> [out.png]
//! Writes the cloud plus board.png / cal_board.png next to it.

use wordcloud::{Word, WordCloud};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let font_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("WORDCLOUD_FONT").ok())
        .ok_or("usage: custom <font.ttf> [out.png]")?;
    let out = std::env::args().nth(2).unwrap_or_else(|| "out.png".into());

    let mut cloud = WordCloud::new(800, 450);
    cloud.set_font_file(&font_path)?;
    cloud.set_rotate(120, 5);
    cloud.set_seed(7);

    let texts = [
        "love", "movie", "animation", "music", "rust", "layout", "spiral", "glyph", "canvas",
        "pixel", "mask", "board",
    ];
    let mut words: Vec<Word> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            Word::new(*text, (texts.len() - i) as i32 * 2 + 12)
                .padding(1)
                .hex_color("#d6616b")
        })
        .collect();
    // A couple of fixed-angle accents among the auto-rotated words.
    words[0] = words[0].clone().rotate(0).hex_color("#393b79");
    words[1] = words[1].clone().rotate(-60).hex_color("#637939");

    let board = cloud.render_all(&words, &out, true)?;
    let claimed: u32 = board.bits().iter().map(|w| w.count_ones()).sum();
    println!("wrote {out}; {claimed} canvas pixels claimed");
    Ok(())
}
