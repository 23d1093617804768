use chrono::Utc;
use rand::Rng;
use std::path::Path;

/// Maximum upload size: 5 MiB
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

/// Image types accepted by the image endpoints (thumbnails can be derived from these).
pub const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Everything the document endpoint accepts.
pub const DOCUMENT_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "application/rtf",
    "text/rtf",
    "text/csv",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub const FILE_TOO_LARGE: &str = "FILE_TOO_LARGE";
pub const UNSUPPORTED_TYPE: &str = "UNSUPPORTED_TYPE";
pub const CONTENT_MISMATCH: &str = "CONTENT_MISMATCH";
pub const EXECUTABLE_CONTENT: &str = "EXECUTABLE_CONTENT";
pub const EMPTY_FILE: &str = "EMPTY_FILE";

/// Parses a path or form id. Anything but a positive integer is `None`.
pub fn parse_id(raw: &str) -> Option<i32> {
    raw.trim().parse::<i32>().ok().filter(|id| *id > 0)
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError {
            code: EMPTY_FILE,
            message: "File is empty".to_string(),
        });
    }
    if size > max_size {
        return Err(ValidationError {
            code: FILE_TOO_LARGE,
            message: format!(
                "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
                size,
                max_size,
                max_size / 1024 / 1024
            ),
        });
    }
    Ok(())
}

/// Lowercases and strips parameters (`text/plain; charset=utf-8` -> `text/plain`).
pub fn normalize_mime(content_type: &str) -> String {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    // Browsers disagree on a few spellings
    match normalized.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "application/csv" => "text/csv".to_string(),
        _ => normalized,
    }
}

/// Validates MIME type against an allowlist and returns its normalized form
pub fn validate_mime_type(content_type: &str, allowed: &[&str]) -> Result<String, ValidationError> {
    let normalized = normalize_mime(content_type);
    if allowed.iter().any(|a| *a == normalized) {
        return Ok(normalized);
    }

    Err(ValidationError {
        code: UNSUPPORTED_TYPE,
        message: format!("File type '{}' is not supported", content_type),
    })
}

/// Strips any path component and unsafe characters from a user-supplied filename.
/// Never fails: an unusable name collapses to `file`.
pub fn sanitize_filename(filename: &str) -> String {
    // Treat both separators as path boundaries regardless of platform
    let last = filename.rsplit(['/', '\\']).next().unwrap_or("");
    let name = Path::new(last)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // No hidden files
    let sanitized = sanitized.trim().trim_start_matches('.').to_string();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "application/pdf" => ".pdf",
        "application/msword" => ".doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => ".docx",
        "text/plain" => ".txt",
        "application/rtf" | "text/rtf" => ".rtf",
        "text/csv" => ".csv",
        "application/vnd.ms-excel" => ".xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => ".xlsx",
        _ => "",
    }
}

/// Builds the on-disk name `{base}-{timestamp}-{random}{ext}` for an upload.
///
/// The base keeps only filesystem-neutral characters of the sanitized original;
/// the extension comes from the original when it is alphanumeric, else from the MIME type.
pub fn unique_file_name(original: &str, mime: &str) -> String {
    let sanitized = sanitize_filename(original);
    let path = Path::new(&sanitized);

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_else(|| extension_for_mime(mime).to_string());

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let mut base: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    if base.trim_matches('_').is_empty() {
        base = "file".to_string();
    }

    let timestamp = Utc::now().timestamp_millis();
    let random: u32 = rand::thread_rng().gen_range(0..1_000_000_000);

    format!("{}-{}-{}{}", base, timestamp, random, ext)
}

/// Checks if file content appears to be executable
pub fn is_executable_content(header: &[u8]) -> bool {
    if header.len() < 4 {
        return false;
    }

    // ELF binary (Linux)
    if header.starts_with(&[0x7F, 0x45, 0x4C, 0x46]) {
        return true;
    }

    // PE/COFF (Windows .exe, .dll)
    if header.starts_with(&[0x4D, 0x5A]) {
        return true;
    }

    // Mach-O (macOS)
    if header.starts_with(&[0xFE, 0xED, 0xFA, 0xCE])
        || header.starts_with(&[0xFE, 0xED, 0xFA, 0xCF])
        || header.starts_with(&[0xCE, 0xFA, 0xED, 0xFE])
        || header.starts_with(&[0xCF, 0xFA, 0xED, 0xFE])
    {
        return true;
    }

    // Shebang (shell scripts)
    if header.starts_with(b"#!") {
        return true;
    }

    false
}

/// Sniffs the first bytes of an upload against its declared type
///
/// Text is only checked for NUL bytes: `MZ` or `#!` are ordinary ways for a line to begin.
pub fn verify_content(data: &[u8], mime: &str) -> Result<(), ValidationError> {
    let is_text = mime.starts_with("text/");
    if !is_text && is_executable_content(data) {
        return Err(ValidationError {
            code: EXECUTABLE_CONTENT,
            message: "File contains executable content which is not allowed".to_string(),
        });
    }

    if mime.starts_with("image/") && !infer::is_image(data) {
        return Err(ValidationError {
            code: CONTENT_MISMATCH,
            message: format!("File content does not match declared type '{}'", mime),
        });
    }

    if mime == "application/pdf" && !data.starts_with(b"%PDF") {
        return Err(ValidationError {
            code: CONTENT_MISMATCH,
            message: "File content does not match declared type 'application/pdf'".to_string(),
        });
    }

    if is_text && data.iter().take(512).any(|&b| b == 0) {
        return Err(ValidationError {
            code: CONTENT_MISMATCH,
            message: "File claimed as text but contains binary content".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42"), Some(42));
        assert_eq!(parse_id(" 7 "), Some(7));
        assert_eq!(parse_id("0"), None);
        assert_eq!(parse_id("-1"), None);
        assert_eq!(parse_id("1.5"), None);
        assert_eq!(parse_id("abc"), None);
        assert_eq!(parse_id("99999999999"), None);
    }

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(1024, MAX_FILE_SIZE).is_ok());
        assert!(validate_file_size(MAX_FILE_SIZE, MAX_FILE_SIZE).is_ok());
        let err = validate_file_size(MAX_FILE_SIZE + 1, MAX_FILE_SIZE).unwrap_err();
        assert_eq!(err.code, FILE_TOO_LARGE);
        assert_eq!(validate_file_size(0, MAX_FILE_SIZE).unwrap_err().code, EMPTY_FILE);
    }

    #[test]
    fn test_validate_mime_type() {
        assert_eq!(
            validate_mime_type("image/JPG", IMAGE_MIME_TYPES).unwrap(),
            "image/jpeg"
        );
        assert_eq!(
            validate_mime_type("text/plain; charset=utf-8", DOCUMENT_MIME_TYPES).unwrap(),
            "text/plain"
        );
        assert!(validate_mime_type("application/pdf", DOCUMENT_MIME_TYPES).is_ok());

        // Documents are not images
        let err = validate_mime_type("application/pdf", IMAGE_MIME_TYPES).unwrap_err();
        assert_eq!(err.code, UNSUPPORTED_TYPE);

        // Should reject code and archives
        assert!(validate_mime_type("application/javascript", DOCUMENT_MIME_TYPES).is_err());
        assert!(validate_mime_type("text/html", DOCUMENT_MIME_TYPES).is_err());
        assert!(validate_mime_type("application/zip", DOCUMENT_MIME_TYPES).is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("test.pdf"), "test.pdf");
        assert_eq!(sanitize_filename("my file.doc"), "my file.doc");
        assert_eq!(sanitize_filename("test<script>.pdf"), "test_script_.pdf");
        assert_eq!(sanitize_filename("测试.txt"), "测试.txt");

        // Path traversal
        assert_eq!(sanitize_filename("../../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..\\..\\windows\\system32"), "system32");

        // Hidden and empty names
        assert_eq!(sanitize_filename(".htaccess"), "htaccess");
        assert_eq!(sanitize_filename("../"), "file");
        assert_eq!(sanitize_filename(""), "file");
    }

    #[test]
    fn test_unique_file_name() {
        let name = unique_file_name("../../Surveillance Photo.JPG", "image/jpeg");
        assert!(name.starts_with("Surveillance_Photo-"), "{}", name);
        assert!(name.ends_with(".jpg"), "{}", name);
        assert!(!name.contains('/'));
        // base, timestamp, random
        let stem = name.trim_end_matches(".jpg");
        assert_eq!(stem.rsplitn(3, '-').count(), 3);

        let other = unique_file_name("../../Surveillance Photo.JPG", "image/jpeg");
        assert_ne!(name, other);
    }

    #[test]
    fn test_unique_file_name_falls_back_to_mime_extension() {
        let name = unique_file_name("scan", "application/pdf");
        assert!(name.starts_with("scan-"));
        assert!(name.ends_with(".pdf"));

        let name = unique_file_name("データ", "text/csv");
        assert!(name.starts_with("file-"), "{}", name);
        assert!(name.ends_with(".csv"));
    }

    #[test]
    fn test_is_executable_content() {
        // ELF header
        assert!(is_executable_content(&[0x7F, 0x45, 0x4C, 0x46, 0x00]));
        // PE header
        assert!(is_executable_content(&[0x4D, 0x5A, 0x00, 0x00]));
        // Shebang
        assert!(is_executable_content(b"#!/bin/bash"));
        // Regular content
        assert!(!is_executable_content(b"Hello World"));
        assert!(!is_executable_content(&[0x89, 0x50, 0x4E, 0x47])); // PNG
    }

    #[test]
    fn test_verify_content() {
        let png_header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert!(verify_content(&png_header, "image/png").is_ok());
        assert!(verify_content(b"%PDF-1.7\n", "application/pdf").is_ok());
        assert!(verify_content(b"name,alias\n", "text/csv").is_ok());

        // Executable disguised as image
        let err = verify_content(&[0x4D, 0x5A, 0x90, 0x00], "image/jpeg").unwrap_err();
        assert_eq!(err.code, EXECUTABLE_CONTENT);

        assert_eq!(
            verify_content(b"plain words", "image/png").unwrap_err().code,
            CONTENT_MISMATCH
        );
        assert_eq!(
            verify_content(b"hello\0world", "text/plain").unwrap_err().code,
            CONTENT_MISMATCH
        );
    }

    #[test]
    fn test_text_may_start_like_an_executable() {
        assert!(verify_content(b"MZ,Mozambique\nUS,United States\n", "text/csv").is_ok());
        assert!(verify_content(b"#!important: suspect moved\n", "text/plain").is_ok());

        // Still rejected when declared as binary formats
        assert!(verify_content(b"MZ,Mozambique\n", "application/msword").is_err());
        assert!(verify_content(b"#!/bin/sh\n", "application/rtf").is_err());

        // Binaries declared as text carry NULs
        let elf = [0x7F, 0x45, 0x4C, 0x46, 0x02, 0x01, 0x01, 0x00];
        assert_eq!(
            verify_content(&elf, "text/plain").unwrap_err().code,
            CONTENT_MISMATCH
        );
    }
}
