use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

use crate::error::{RescueError, Result};

pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// Reads an image into a `data:` URL for embedding in a report.
pub fn embed_photo(path: &Path, max_bytes: u64) -> Result<String> {
    let meta = std::fs::metadata(path).map_err(|e| {
        RescueError::validation(format!("cannot read photo {}: {e}", path.display()))
    })?;
    if meta.len() > max_bytes {
        return Err(RescueError::validation(format!(
            "photo {} is {} bytes, larger than the {} byte limit",
            path.display(),
            meta.len(),
            max_bytes
        )));
    }
    let bytes = std::fs::read(path).map_err(|e| {
        RescueError::validation(format!("cannot read photo {}: {e}", path.display()))
    })?;
    Ok(data_url(mime_for_path(path), &bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn temp_file(name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("rescuehub-photo-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for_path(Path::new("a/b.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("x.jpeg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("x.heic")), "application/octet-stream");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn embeds_as_base64_data_url() {
        let path = temp_file("tiny.gif", b"GIF89a");
        assert_eq!(
            embed_photo(&path, 1024).unwrap(),
            "data:image/gif;base64,R0lGODlh"
        );
    }

    #[test]
    fn oversized_or_missing_photo_is_rejected() {
        let path = temp_file("big.png", &[0u8; 64]);
        assert_eq!(
            embed_photo(&path, 10).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            embed_photo(Path::new("/definitely/not/here.png"), 10)
                .unwrap_err()
                .kind(),
            ErrorKind::Validation
        );
    }
}
