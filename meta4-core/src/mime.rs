/// Maps a file path or URI path to a content type.
///
/// `None` means the type could not be determined.
pub trait ContentTypeResolver {
    fn content_type(&self, path: &str) -> Option<String>;
}

/// Extension-based lookup via `mime_guess`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MimeGuessResolver;

impl ContentTypeResolver for MimeGuessResolver {
    fn content_type(&self, path: &str) -> Option<String> {
        mime_guess::from_path(path).first().map(|m| m.essence_str().to_string())
    }
}

impl<F> ContentTypeResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn content_type(&self, path: &str) -> Option<String> {
        self(path)
    }
}
