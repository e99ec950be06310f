pub fn decode_png_to_slint_image(image_data: &[u8]) -> Result<slint::Image, Box<dyn std::error::Error>> {
    // Auto-detect the image format and decode
    let img = image::load_from_memory(image_data)?;

    let rgba_img = img.to_rgba8();
    let width = rgba_img.width();
    let height = rgba_img.height();

    let pixel_buffer = slint::SharedPixelBuffer::<slint::Rgba8Pixel>::clone_from_slice(rgba_img.as_raw(), width, height);
    Ok(slint::Image::from_rgba8(pixel_buffer))
}
