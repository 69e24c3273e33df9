//! Filename-based MIME type policy.
//!
//! Types are inferred from the file name suffix only; content is never
//! sniffed. Type inference is case-sensitive, so `NOTES.TXT` falls through to
//! `application/octet-stream`. The acceptance and archive checks ignore case.

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_PYTHON: &str = "text/x-python";
pub const TEXT_MARKDOWN: &str = "text/markdown";
pub const IMAGE_JPEG: &str = "image/jpeg";
pub const IMAGE_PNG: &str = "image/png";
pub const APPLICATION_ZIP: &str = "application/zip";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extensions accepted by the upload surface.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["txt", "py", "md", "jpg", "png", "zip"];

/// MIME type for a file extracted from an archive.
pub fn infer_from_extension(file_name: &str) -> &'static str {
    if file_name.ends_with(".txt") {
        TEXT_PLAIN
    } else if file_name.ends_with(".py") {
        TEXT_PYTHON
    } else if file_name.ends_with(".jpg") {
        IMAGE_JPEG
    } else if file_name.ends_with(".png") {
        IMAGE_PNG
    } else {
        OCTET_STREAM
    }
}

/// MIME type for a direct upload whose client sent no usable type.
///
/// Same table as [`infer_from_extension`], plus markdown and zip, which the
/// upload control accepts.
pub fn infer_upload_type(file_name: &str) -> &'static str {
    if file_name.ends_with(".md") {
        TEXT_MARKDOWN
    } else if file_name.ends_with(".zip") {
        APPLICATION_ZIP
    } else {
        infer_from_extension(file_name)
    }
}

/// Whether an upload with this name and declared type is a zip archive.
///
/// The `.zip` suffix is matched ignoring case, like [`is_accepted_upload`].
pub fn is_archive(file_name: &str, declared_type: Option<&str>) -> bool {
    matches!(
        declared_type,
        Some("application/zip") | Some("application/x-zip-compressed")
    ) || file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("zip"))
}

/// Whether the upload control accepts a file with this name.
pub fn is_accepted_upload(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ACCEPTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_member_table() {
        assert_eq!(infer_from_extension("a.txt"), "text/plain");
        assert_eq!(infer_from_extension("pkg/b.py"), "text/x-python");
        assert_eq!(infer_from_extension("c.jpg"), "image/jpeg");
        assert_eq!(infer_from_extension("c.png"), "image/png");
        assert_eq!(infer_from_extension("README.md"), "application/octet-stream");
        assert_eq!(infer_from_extension("photo.jpeg"), "application/octet-stream");
        assert_eq!(infer_from_extension("Makefile"), "application/octet-stream");
    }

    #[test]
    fn suffix_match_is_case_sensitive() {
        assert_eq!(infer_from_extension("NOTES.TXT"), "application/octet-stream");
    }

    #[test]
    fn upload_inference_adds_markdown_and_zip() {
        assert_eq!(infer_upload_type("notes.md"), "text/markdown");
        assert_eq!(infer_upload_type("bundle.zip"), "application/zip");
        assert_eq!(infer_upload_type("a.txt"), "text/plain");
    }

    #[test]
    fn archive_detection() {
        assert!(is_archive("x.bin", Some("application/zip")));
        assert!(is_archive("x.bin", Some("application/x-zip-compressed")));
        assert!(is_archive("project.zip", None));
        assert!(is_archive("PROJECT.ZIP", None));
        assert!(is_archive("Bundle.Zip", Some("")));
        assert!(!is_archive("a.txt", Some("text/plain")));
    }

    #[test]
    fn accepted_extensions() {
        for name in ["a.txt", "b.py", "c.md", "d.jpg", "e.png", "f.zip", "G.PNG"] {
            assert!(is_accepted_upload(name), "{name} should be accepted");
        }
        for name in ["a.exe", "noext", "photo.jpeg", "archive.tar.gz"] {
            assert!(!is_accepted_upload(name), "{name} should be rejected");
        }
    }
}
