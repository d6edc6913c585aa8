#![no_main]

use arbitrary::Arbitrary;
use imagoid::{parse_image_query, parse_position, parse_size, AlphaTransformation, Color};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct SpecInput<'a> {
    text: &'a str,
    reference: u16,
}

fuzz_target!(|input: SpecInput<'_>| {
    let reference = i64::from(input.reference);
    let _ = parse_size(input.text, reference);
    let _ = parse_position(input.text, reference);
    let _ = parse_image_query(input.text);
    let _ = AlphaTransformation::new(input.text);
    if let Ok(color) = Color::parse(input.text) {
        // Whatever parses must re-parse from its own hex form
        let hex = color.get_hex();
        assert!(Color::parse(&hex).is_ok(), "{hex}");
    }
});
