//! Pixel-level blanking of partially covered image XObjects.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Document, Object, Stream};

use super::fonts::{number, resolve};
use super::interpreter::{Matrix, UserBox};
use crate::error::{Error, Result};

/// Pixel layout of a decoded image.
struct Raster {
    data: Vec<u8>,
    width: usize,
    height: usize,
    components: usize,
    /// Component value that renders as white
    white: u8,
}

fn filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// Number of components of a device or ICC color space.
fn components(doc: &Document, stream: &Stream) -> Option<(usize, u8)> {
    let space = resolve(doc, stream.dict.get(b"ColorSpace").ok()?);
    let name = match space {
        Object::Name(name) => name.as_slice(),
        Object::Array(items) => {
            let family = items.first()?.as_name().ok()?;
            if family != b"ICCBased" {
                return None;
            }
            let profile = resolve(doc, items.get(1)?).as_stream().ok()?;
            let n = profile.dict.get(b"N").ok().and_then(number)? as usize;
            return match n {
                1 | 3 => Some((n, 255)),
                4 => Some((4, 0)),
                _ => None,
            };
        }
        _ => return None,
    };
    match name {
        b"DeviceGray" | b"G" => Some((1, 255)),
        b"DeviceRGB" | b"RGB" => Some((3, 255)),
        b"DeviceCMYK" | b"CMYK" => Some((4, 0)),
        _ => None,
    }
}

fn decode(doc: &Document, stream: &Stream) -> Result<Option<(Raster, bool)>> {
    let dim = |key: &[u8]| stream.dict.get(key).ok().and_then(number).map(|v| v as usize);
    let (Some(width), Some(height)) = (dim(b"Width"), dim(b"Height")) else {
        return Ok(None);
    };

    let filters = filters(stream);
    match filters.as_slice() {
        [dct] if dct == b"DCTDecode" || dct == b"DCT" => {
            let decoded = image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)?;
            let rgb = decoded.to_rgb8();
            Ok(Some((
                Raster {
                    width: rgb.width() as usize,
                    height: rgb.height() as usize,
                    data: rgb.into_raw(),
                    components: 3,
                    white: 255,
                },
                true,
            )))
        }
        [] | [_] => {
            let flate = filters.first().map(|f| f == b"FlateDecode" || f == b"Fl");
            if flate == Some(false) {
                return Ok(None);
            }
            let predictor = stream
                .dict
                .get(b"DecodeParms")
                .ok()
                .and_then(|o| o.as_dict().ok())
                .and_then(|p| p.get(b"Predictor").ok())
                .and_then(number)
                .unwrap_or(1.0);
            let bits = stream.dict.get(b"BitsPerComponent").ok().and_then(number);
            if predictor > 1.0 || bits != Some(8.0) {
                return Ok(None);
            }
            let Some((components, white)) = components(doc, stream) else {
                return Ok(None);
            };
            let data = if flate == Some(true) {
                stream
                    .decompressed_content()
                    .map_err(|e| Error::Image(e.to_string()))?
            } else {
                stream.content.clone()
            };
            if data.len() < width * height * components {
                return Ok(None);
            }
            Ok(Some((
                Raster {
                    data,
                    width,
                    height,
                    components,
                    white,
                },
                false,
            )))
        }
        _ => Ok(None),
    }
}

/// White out the pixels of an image whose centers fall inside `boxes`.
///
/// `placement` maps the image's unit square to user space. Returns the
/// replacement stream (raw samples, Flate-compressed), or `None` when the
/// image encoding is not supported.
pub fn blank_image(
    doc: &Document,
    stream: &Stream,
    placement: &Matrix,
    boxes: &[UserBox],
) -> Result<Option<Stream>> {
    let Some((mut raster, from_jpeg)) = decode(doc, stream)? else {
        return Ok(None);
    };

    let (w, h, n) = (raster.width, raster.height, raster.components);
    let mut blanked = 0usize;
    for py in 0..h {
        // Row 0 is the top of the unit square
        let v = 1.0 - (py as f32 + 0.5) / h as f32;
        for px in 0..w {
            let u = (px as f32 + 0.5) / w as f32;
            let (x, y) = placement.apply(u, v);
            if boxes.iter().any(|b| b.contains_point(x, y)) {
                let start = (py * w + px) * n;
                raster.data[start..start + n].fill(raster.white);
                blanked += 1;
            }
        }
    }
    log::debug!("blanked {} of {} image pixels", blanked, w * h);

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raster.data)?;
    let compressed = encoder.finish()?;

    let mut dict = stream.dict.clone();
    dict.remove(b"DecodeParms");
    dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    if from_jpeg {
        dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        dict.set("BitsPerComponent", Object::Integer(8));
        dict.set("Width", Object::Integer(w as i64));
        dict.set("Height", Object::Integer(h as i64));
        dict.remove(b"Decode");
    }
    Ok(Some(Stream::new(dict, compressed).with_compression(false)))
}
