use std::path::Path;

use mime::Mime;

/// The content type announced for a file, picked from its extension.
///
/// Unknown or missing extensions are served as `application/octet-stream`.
pub fn mime_for_path(path: &Path) -> Mime {
    let Some(extension) = path.extension().and_then(|extension| extension.to_str()) else {
        return mime::APPLICATION_OCTET_STREAM;
    };

    match extension.to_ascii_lowercase().as_str() {
        "html" | "htm" => mime::TEXT_HTML_UTF_8,
        "css" => mime::TEXT_CSS_UTF_8,
        "js" | "mjs" => mime::TEXT_JAVASCRIPT,
        "json" => mime::APPLICATION_JSON,
        "txt" | "text" => mime::TEXT_PLAIN_UTF_8,
        "csv" => mime::TEXT_CSV_UTF_8,
        "xml" => mime::TEXT_XML,
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "bmp" => mime::IMAGE_BMP,
        "svg" => mime::IMAGE_SVG,
        "woff" => mime::FONT_WOFF,
        "woff2" => mime::FONT_WOFF2,
        "pdf" => mime::APPLICATION_PDF,
        other => parse_extra(other),
    }
}

/// Types the `mime` crate has no constant for.
fn parse_extra(extension: &str) -> Mime {
    let essence = match extension {
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "wasm" => "application/wasm",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "md" => "text/markdown",
        _ => return mime::APPLICATION_OCTET_STREAM,
    };

    essence.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)
}
