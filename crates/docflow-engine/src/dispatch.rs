//! Pure routing from `(file extension, backend)` to an engine name.

/// Canonical engine names.
pub mod names {
    /// Default document pipeline for PDFs and images.
    pub const PIPELINE: &str = "pipeline";
    /// High-accuracy OCR backend for PDFs and images.
    pub const DEEPSEEK_OCR: &str = "deepseek-ocr";
    /// Vision-language OCR backend for PDFs and images.
    pub const PADDLEOCR_VL: &str = "paddleocr-vl";
    /// Speech recognition for audio files.
    pub const SENSEVOICE: &str = "sensevoice";
    /// Video demux + transcription.
    pub const VIDEO: &str = "video";
    /// Generic document-to-markdown converter for everything else.
    pub const MARKDOWN: &str = "markdown";
}

const PDF_IMAGE_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "flac", "ogg", "aac", "wma", "opus"];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mkv", "mov", "flv", "webm", "m4v", "wmv", "mpeg", "mpg",
];

/// Map a submission onto an engine name.
///
/// Rules, evaluated in order:
/// 1. Explicit audio/video backends override the file type.
/// 2. PDF/image extensions go to the named OCR backend, or the default
///    pipeline when none was requested.
/// 3. Audio extensions go to the audio engine.
/// 4. Video extensions go to the video engine.
/// 5. Everything else goes to the generic markdown converter.
pub fn choose_engine(file_extension: &str, backend: &str) -> &'static str {
    let ext = file_extension.trim_start_matches('.').to_ascii_lowercase();

    match backend {
        names::SENSEVOICE => return names::SENSEVOICE,
        names::VIDEO => return names::VIDEO,
        _ => {}
    }

    if PDF_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return match backend {
            names::DEEPSEEK_OCR => names::DEEPSEEK_OCR,
            names::PADDLEOCR_VL => names::PADDLEOCR_VL,
            _ => names::PIPELINE,
        };
    }

    if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        return names::SENSEVOICE;
    }

    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        return names::VIDEO;
    }

    names::MARKDOWN
}

/// Extension (lowercase, without dot) of a submitted filename.
pub fn file_extension(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_audio_video_backends_override_file_type() {
        assert_eq!(choose_engine("pdf", names::SENSEVOICE), names::SENSEVOICE);
        assert_eq!(choose_engine("docx", names::VIDEO), names::VIDEO);
    }

    #[test]
    fn test_pdf_image_routing() {
        assert_eq!(choose_engine("pdf", "auto"), names::PIPELINE);
        assert_eq!(choose_engine("png", "pipeline"), names::PIPELINE);
        assert_eq!(choose_engine("jpg", names::DEEPSEEK_OCR), names::DEEPSEEK_OCR);
        assert_eq!(choose_engine("tiff", names::PADDLEOCR_VL), names::PADDLEOCR_VL);
        // Unknown backend names fall back to the pipeline for documents.
        assert_eq!(choose_engine("pdf", "vlm-transformers"), names::PIPELINE);
    }

    #[test]
    fn test_audio_video_by_extension() {
        for ext in ["mp3", "wav", "m4a", "flac", "ogg", "aac", "wma", "opus"] {
            assert_eq!(choose_engine(ext, "auto"), names::SENSEVOICE);
        }
        for ext in ["mp4", "avi", "mkv", "mov", "flv", "webm", "m4v", "wmv", "mpeg", "mpg"] {
            assert_eq!(choose_engine(ext, "auto"), names::VIDEO);
        }
    }

    #[test]
    fn test_everything_else_goes_to_markdown() {
        assert_eq!(choose_engine("docx", "auto"), names::MARKDOWN);
        assert_eq!(choose_engine("html", "auto"), names::MARKDOWN);
        assert_eq!(choose_engine("csv", "pipeline"), names::MARKDOWN);
        assert_eq!(choose_engine("", "auto"), names::MARKDOWN);
    }

    #[test]
    fn test_extension_normalization() {
        assert_eq!(choose_engine("PDF", "auto"), names::PIPELINE);
        assert_eq!(choose_engine(".pdf", "auto"), names::PIPELINE);
        assert_eq!(file_extension("Scan.PDF"), "pdf");
        assert_eq!(file_extension("noext"), "");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
    }
}
