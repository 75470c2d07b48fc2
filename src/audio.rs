//! Upload validation utilities.
//!
//! The gateway never decodes audio; bytes are forwarded to the provider
//! opaquely. Validation is limited to the filename extension whitelist, and
//! the extension also selects the MIME type declared on the upstream upload.

use crate::error::AppError;

/// File extensions accepted by upload validation.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "flac", "m4a", "mp3", "mp4", "mpeg", "mpga", "oga", "ogg", "wav", "webm",
];

/// Validates and normalizes the file extension from an uploaded filename.
///
/// Returns the lowercased extension without the leading dot.
pub fn validate_extension(filename: &str) -> Result<String, AppError> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_ascii_lowercase())
        .ok_or_else(|| {
            AppError::unsupported_media_type(format!(
                "file must include an extension; accepted extensions: {}",
                accepted_list()
            ))
        })?;

    if !SUPPORTED_EXTENSIONS.iter().any(|ext| *ext == extension) {
        return Err(AppError::unsupported_media_type(format!(
            "unsupported file extension .{extension}; accepted extensions: {}",
            accepted_list()
        )));
    }

    Ok(extension)
}

/// Returns the MIME type declared on the upstream media upload.
///
/// Only called with extensions that passed [`validate_extension`].
pub fn mime_type_for(extension: &str) -> &'static str {
    match extension {
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "mp3" | "mpga" => "audio/mpeg",
        "mp4" => "video/mp4",
        "mpeg" => "video/mpeg",
        "oga" | "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}

fn accepted_list() -> String {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",")
}
