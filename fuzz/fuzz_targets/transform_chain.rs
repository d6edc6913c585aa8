#![no_main]

use arbitrary::Arbitrary;
use imagoid::{
    AlphaTransformation, Anchor, Color, ImageResource, PasteTransformation, ResizeMode,
    ResizeTransformation, Transformation,
};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Step {
    Resize { width: u16, height: u16, mode: u8 },
    Alpha { amount: u8, fast: bool },
    Paste { size: u8, x: i16, y: i16, anchor: u8 },
    Palette { colors: u8 },
}

#[derive(Arbitrary, Debug)]
struct ChainInput {
    width: u8,
    height: u8,
    steps: Vec<Step>,
}

fn mode(n: u8) -> ResizeMode {
    match n % 5 {
        0 => ResizeMode::Fit,
        1 => ResizeMode::Fill,
        2 => ResizeMode::Crop,
        3 => ResizeMode::Stretch,
        _ => ResizeMode::Exact,
    }
}

fn anchor(n: u8) -> Anchor {
    match n % 3 {
        0 => Anchor::Start,
        1 => Anchor::Center,
        _ => Anchor::End,
    }
}

fuzz_target!(|input: ChainInput| {
    let width = i64::from(input.width) + 1;
    let height = i64::from(input.height) + 1;
    let Ok(mut image) = ImageResource::create(width, height, Some(&Color::CYAN)) else {
        return;
    };

    for step in input.steps.into_iter().take(8) {
        let result = match step {
            Step::Resize { width, height, mode: m } => {
                let mut resize = ResizeTransformation::new(
                    u32::from(width % 512),
                    u32::from(height % 512),
                    mode(m),
                );
                resize.apply(&mut image).map(|_| ())
            }
            Step::Alpha { amount, fast } => {
                let mut alpha = AlphaTransformation::default();
                let spec = format!("{}%", amount % 101);
                match alpha.setup(&spec, fast, true) {
                    Ok(alpha) => alpha.apply(&mut image).map(|_| ()),
                    Err(_) => Ok(()),
                }
            }
            Step::Paste { size, x, y, anchor: a } => {
                let side = i64::from(size % 64) + 1;
                let Ok(mark) = ImageResource::create(side, side, Some(&Color::RED)) else {
                    continue;
                };
                let mut paste = PasteTransformation::new(mark);
                paste.set_position(i64::from(x), i64::from(y), anchor(a), anchor(a / 3));
                paste.apply(&mut image).map(|_| ())
            }
            Step::Palette { colors } => image.to_palette(usize::from(colors), false).map(|_| ()),
        };
        if result.is_err() {
            return;
        }
    }

    let _ = image.signature();
    let _ = image.raster();
});
