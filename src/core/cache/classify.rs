use url::Url;

/// Traffic class of a GET request. Exactly one class applies; matching is
/// checked in declaration order and the first hit wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficClass {
    Shell,
    Api,
    Media,
    Default,
}

/// What the requester intends to do with the response, when known.
/// Mirrors the destination hint a fetching host environment attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    #[default]
    Unknown,
    Document,
    Script,
    Style,
    Image,
    Audio,
    Video,
}

const SHELL_EXTENSIONS: &[&str] = &["css", "js", "html"];

pub fn classify(url: &Url, destination: Destination, api_prefix: &str) -> TrafficClass {
    let path = url.path();

    if matches!(
        destination,
        Destination::Document | Destination::Script | Destination::Style
    ) || path == "/"
        || has_extension(path, SHELL_EXTENSIONS)
    {
        return TrafficClass::Shell;
    }

    if path.starts_with(api_prefix) || path == api_prefix.trim_end_matches('/') {
        return TrafficClass::Api;
    }

    if matches!(
        destination,
        Destination::Image | Destination::Audio | Destination::Video
    ) || is_media_path(path)
    {
        return TrafficClass::Media;
    }

    TrafficClass::Default
}

/// Whether a media-class miss should be answered with an image placeholder
/// (images get a transparent pixel, audio/video a plain 404).
pub fn wants_image_placeholder(url: &Url, destination: Destination) -> bool {
    if destination == Destination::Image {
        return true;
    }
    if matches!(destination, Destination::Audio | Destination::Video) {
        return false;
    }
    mime_guess::from_path(url.path())
        .first()
        .map(|m| m.type_() == mime_guess::mime::IMAGE)
        .unwrap_or(false)
}

fn has_extension(path: &str, extensions: &[&str]) -> bool {
    match path.rsplit_once('.') {
        Some((_, ext)) => extensions.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

fn is_media_path(path: &str) -> bool {
    mime_guess::from_path(path)
        .first()
        .map(|m| {
            let t = m.type_();
            t == mime_guess::mime::IMAGE || t == mime_guess::mime::AUDIO || t == mime_guess::mime::VIDEO
        })
        .unwrap_or(false)
}
