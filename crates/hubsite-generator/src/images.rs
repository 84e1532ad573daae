//! Image optimization.
//!
//! | format | transform |
//! |---|---|
//! | PNG | lossless re-encode, best compression, adaptive filtering |
//! | JPEG | progressive re-encode at the configured quality |
//! | SVG | comment and insignificant whitespace removal |
//!
//! The caller keeps whichever of the original and optimized bytes is smaller.
//! PNG output is not interlaced: the `image` encoder only writes
//! non-interlaced files.

use std::{io::Cursor, path::Path};

use image::{
    DynamicImage, ImageFormat,
    codecs::png::{CompressionType, FilterType, PngEncoder},
};
use jpeg_encoder::{ColorType, Encoder};
use quick_xml::{Reader, Writer, events::Event};

/// Image formats with an optimizing transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Png,
    Jpeg,
    Svg,
}

impl ImageType {
    /// Detect from a file extension. Formats without a transform yield `None`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }
}

/// Optimize image bytes. Returns the smaller of the input and the re-encoded
/// output.
pub fn optimize_image(kind: ImageType, bytes: &[u8], jpeg_quality: u8) -> Result<Vec<u8>, String> {
    let optimized = match kind {
        ImageType::Png => encode_png(&decode(bytes, ImageFormat::Png)?)?,
        ImageType::Jpeg => encode_jpeg(&decode(bytes, ImageFormat::Jpeg)?, jpeg_quality)?,
        ImageType::Svg => {
            let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
            minify_svg(text)?.into_bytes()
        }
    };

    if optimized.len() < bytes.len() {
        Ok(optimized)
    } else {
        Ok(bytes.to_vec())
    }
}

/// Strip comments and whitespace-only text between tags.
///
/// Whitespace inside text-bearing elements (`text`, `tspan`, `style`, ...)
/// and under `xml:space="preserve"` is kept, as is CDATA.
pub fn minify_svg(source: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(source);
    let mut writer = Writer::new(Vec::with_capacity(source.len()));
    // One entry per open element: whether whitespace is significant there.
    let mut preserve: Vec<bool> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("{e} at byte {}", reader.error_position()))?;
        let inside_preserved = preserve.last().copied().unwrap_or(false);

        match event {
            Event::Eof => break,
            Event::Comment(_) => continue,
            Event::Text(ref text)
                if !inside_preserved && text.iter().all(u8::is_ascii_whitespace) =>
            {
                continue;
            }
            Event::Start(ref start) => {
                let keeps_space = is_text_element(start.local_name().as_ref())
                    || start.attributes().flatten().any(|a| {
                        a.key.as_ref() == b"xml:space" && a.value.as_ref() == b"preserve"
                    });
                preserve.push(inside_preserved || keeps_space);
            }
            Event::End(_) => {
                preserve.pop();
            }
            _ => {}
        }

        writer.write_event(event).map_err(|e| e.to_string())?;
    }

    String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())
}

fn is_text_element(name: &[u8]) -> bool {
    matches!(
        name,
        b"text" | b"tspan" | b"textPath" | b"style" | b"script" | b"title" | b"desc"
    )
}

fn decode(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, String> {
    image::load_from_memory_with_format(bytes, format).map_err(|e| e.to_string())
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, String> {
    let mut out = Cursor::new(Vec::new());
    let encoder =
        PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive);
    img.write_with_encoder(encoder).map_err(|e| e.to_string())?;
    Ok(out.into_inner())
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, String> {
    // JPEG carries no alpha channel.
    let rgb = img.to_rgb8();
    let width = u16::try_from(rgb.width()).map_err(|_| "image too wide for JPEG".to_string())?;
    let height = u16::try_from(rgb.height()).map_err(|_| "image too tall for JPEG".to_string())?;

    let mut out = Vec::new();
    let mut encoder = Encoder::new(&mut out, quality);
    encoder.set_progressive(true);
    encoder
        .encode(rgb.as_raw(), width, height, ColorType::Rgb)
        .map_err(|e| e.to_string())?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage, codecs::jpeg::JpegEncoder};

    use super::*;

    const SOF0_BASELINE: [u8; 2] = [0xFF, 0xC0];
    const SOF2_PROGRESSIVE: [u8; 2] = [0xFF, 0xC2];

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 4) as u8, (y * 4) as u8, 128])
        }))
    }

    fn fast_png(img: &DynamicImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        let encoder =
            PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter);
        img.write_with_encoder(encoder).unwrap();
        out.into_inner()
    }

    fn baseline_jpeg(img: &DynamicImage, quality: u8) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
            .unwrap();
        out.into_inner()
    }

    fn has_marker(bytes: &[u8], marker: [u8; 2]) -> bool {
        bytes.windows(2).any(|w| w == marker)
    }

    #[test]
    fn test_image_type_from_path() {
        assert_eq!(ImageType::from_path(Path::new("a/logo.PNG")), Some(ImageType::Png));
        assert_eq!(ImageType::from_path(Path::new("hero.jpeg")), Some(ImageType::Jpeg));
        assert_eq!(ImageType::from_path(Path::new("icon.svg")), Some(ImageType::Svg));
        assert_eq!(ImageType::from_path(Path::new("anim.gif")), None);
    }

    #[test]
    fn test_png_is_lossless_and_not_larger() {
        let img = gradient(64, 64);
        let original = fast_png(&img);

        let optimized = optimize_image(ImageType::Png, &original, 85).unwrap();
        assert!(optimized.len() <= original.len());

        let decoded = image::load_from_memory_with_format(&optimized, ImageFormat::Png).unwrap();
        assert_eq!(decoded.to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn test_jpeg_reencode_not_larger() {
        let img = gradient(64, 64);
        let original = encode_jpeg(&img, 100).unwrap();

        let optimized = optimize_image(ImageType::Jpeg, &original, 60).unwrap();
        assert!(optimized.len() <= original.len());
        assert!(image::load_from_memory_with_format(&optimized, ImageFormat::Jpeg).is_ok());
    }

    #[test]
    fn test_jpeg_output_is_progressive() {
        let img = gradient(64, 64);
        let original = baseline_jpeg(&img, 100);
        assert!(has_marker(&original, SOF0_BASELINE));

        let optimized = optimize_image(ImageType::Jpeg, &original, 60).unwrap();
        assert!(optimized.len() < original.len());
        assert!(has_marker(&optimized, SOF2_PROGRESSIVE));
        assert!(!has_marker(&optimized, SOF0_BASELINE));

        let decoded = image::load_from_memory_with_format(&optimized, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[test]
    fn test_corrupt_png_fails() {
        assert!(optimize_image(ImageType::Png, b"not a png", 85).is_err());
    }

    #[test]
    fn test_minify_svg() {
        let svg = "<svg xmlns=\"http://www.w3.org/2000/svg\">\n  <!-- logo -->\n  <path d=\"M0 0h1\"/>\n</svg>\n";
        assert_eq!(
            minify_svg(svg).unwrap(),
            "<svg xmlns=\"http://www.w3.org/2000/svg\"><path d=\"M0 0h1\"/></svg>"
        );
    }

    #[test]
    fn test_minify_svg_keeps_space_between_text_runs() {
        let svg = "<svg>\n  <text x=\"0\">\n    <tspan>Hello</tspan> <tspan>World</tspan>\n  </text>\n</svg>";
        let out = minify_svg(svg).unwrap();

        assert!(out.starts_with("<svg><text x=\"0\">"), "{out}");
        assert!(out.contains("<tspan>Hello</tspan> <tspan>World</tspan>"), "{out}");
    }

    #[test]
    fn test_minify_svg_honors_xml_space_preserve() {
        let svg = "<svg>\n  <g xml:space=\"preserve\">\n    <a>x</a> <a>y</a>\n  </g>\n  <style>\n    .a { fill: red }\n  </style>\n</svg>";
        let out = minify_svg(svg).unwrap();

        assert!(out.contains("<a>x</a> <a>y</a>"), "{out}");
        assert!(out.contains("<style>\n    .a { fill: red }\n  </style>"), "{out}");
        assert!(out.starts_with("<svg><g"), "{out}");
    }

    #[test]
    fn test_minify_svg_keeps_cdata() {
        let svg = "<svg>\n  <style><![CDATA[ a > b {} ]]></style>\n</svg>";
        assert_eq!(
            minify_svg(svg).unwrap(),
            "<svg><style><![CDATA[ a > b {} ]]></style></svg>"
        );
    }

    #[test]
    fn test_malformed_svg_fails() {
        assert!(optimize_image(ImageType::Svg, b"<svg><g></svg>", 85).is_err());
    }

    #[test]
    fn test_svg_keeps_original_when_already_minimal() {
        let svg = b"<svg/>";
        assert_eq!(optimize_image(ImageType::Svg, svg, 85).unwrap(), svg.to_vec());
    }
}
