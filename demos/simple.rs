//! Random-size cloud from a short CJK word list.
//!
//! Usage: cargo run --example simple -- <font.ttf> [out.png]
//! The font path can also come from the WORDCLOUD_FONT env var.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use wordcloud::{random_words, WordCloud};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let font_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("WORDCLOUD_FONT").ok())
        .ok_or("usage: simple <font.ttf> [out.png]")?;
    let out = std::env::args().nth(2).unwrap_or_else(|| "out.png".into());

    let mut cloud = WordCloud::new(400, 400);
    cloud.set_font_file(&font_path)?;

    let texts = [
        "分子", "电子", "松子", "离子", "绝绝子", "孙子", "孟子", "孔子", "老子", "原子", "质子",
        "中子", "上帝粒子",
    ];
    let mut rng = ChaCha8Rng::from_os_rng();
    let words = random_words(&texts, &mut rng);

    cloud.render(&words, &out)?;
    println!("wrote {out}");
    Ok(())
}
