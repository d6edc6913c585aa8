#![no_main]

use imagoid::{ImageFormat, ImageResource, Limits};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let mut image = ImageResource::open_bytes(data.to_vec()).with_limits(Limits::strict());
    if image.dimensions().is_ok() {
        let _ = image.get_bytes(Some(ImageFormat::Png), Some(1));
    }
});
