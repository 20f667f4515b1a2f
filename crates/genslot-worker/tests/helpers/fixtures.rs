use genslot_core::models::EncodedImage;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Encoded PNG of the given size, as an upload would produce it.
pub fn png_image(width: u32, height: u32, file_name: &str) -> EncodedImage {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 96]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode fixture png");
    genslot_codec::encode(&bytes, Some(file_name))
        .expect("fixture should be readable")
        .transport
}

pub fn small_png(file_name: &str) -> EncodedImage {
    png_image(8, 8, file_name)
}
