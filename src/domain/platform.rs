use std::fmt;

/// Source site of a media URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Platform {
    YouTube,
    Instagram,
    TikTok,
    Facebook,
    X,
    Vimeo,
    Dailymotion,
    Reddit,
    Twitch,
    #[default]
    Unknown,
}

impl Platform {
    /// Detection order; the first platform with a matching host wins.
    pub const SUPPORTED: [Platform; 9] = [
        Platform::YouTube,
        Platform::Instagram,
        Platform::TikTok,
        Platform::Facebook,
        Platform::X,
        Platform::Vimeo,
        Platform::Dailymotion,
        Platform::Reddit,
        Platform::Twitch,
    ];

    pub fn hosts(self) -> &'static [&'static str] {
        match self {
            Platform::YouTube => &["youtube.com", "youtu.be"],
            Platform::Instagram => &["instagram.com"],
            Platform::TikTok => &["tiktok.com"],
            Platform::Facebook => &["facebook.com"],
            Platform::X => &["twitter.com", "x.com"],
            Platform::Vimeo => &["vimeo.com"],
            Platform::Dailymotion => &["dailymotion.com"],
            Platform::Reddit => &["reddit.com"],
            Platform::Twitch => &["twitch.tv"],
            Platform::Unknown => &[],
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Instagram => "Instagram",
            Platform::TikTok => "TikTok",
            Platform::Facebook => "Facebook",
            Platform::X => "X (Twitter)",
            Platform::Vimeo => "Vimeo",
            Platform::Dailymotion => "Dailymotion",
            Platform::Reddit => "Reddit",
            Platform::Twitch => "Twitch",
            Platform::Unknown => "Unknown Platform",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Case-insensitive substring match against the supported hosts.
/// Never fails: anything unrecognised is `Platform::Unknown`.
pub fn detect_platform(url: &str) -> Platform {
    let url = url.to_lowercase();
    Platform::SUPPORTED
        .into_iter()
        .find(|platform| platform.hosts().iter().any(|host| url.contains(host)))
        .unwrap_or(Platform::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_every_supported_host() {
        for platform in Platform::SUPPORTED {
            for host in platform.hosts() {
                let url = format!("https://www.{}/some/path", host);
                assert_eq!(detect_platform(&url), platform, "{}", url);
            }
        }
    }

    #[test]
    fn test_short_links_and_case() {
        assert_eq!(detect_platform("https://youtu.be/abc123"), Platform::YouTube);
        assert_eq!(
            detect_platform("HTTPS://WWW.TIKTOK.COM/@user/video/1"),
            Platform::TikTok
        );
    }

    #[test]
    fn test_unknown_is_a_result() {
        assert_eq!(detect_platform("https://example.com/x"), Platform::Unknown);
        assert_eq!(detect_platform(""), Platform::Unknown);
        assert_eq!(detect_platform("not a url at all"), Platform::Unknown);
    }

    #[test]
    fn test_first_match_wins() {
        // A YouTube link that mentions another site in its query string
        assert_eq!(
            detect_platform("https://www.youtube.com/watch?v=1&ref=facebook.com"),
            Platform::YouTube
        );
    }
}
