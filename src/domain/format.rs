use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::utils::format_file_size;

/// Format id asking the backend for its best combined stream
pub const BEST_FORMAT: &str = "best";

const MUXED_CONTAINERS: [&str; 3] = ["mp4", "webm", "mkv"];

/// A stream variant reported by the backend
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub format_id: String,
    #[serde(default)]
    pub ext: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default, deserialize_with = "truthy")]
    pub has_audio: bool,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default, rename = "filesize")]
    pub file_size_bytes: Option<u64>,
    #[serde(default)]
    pub format_note: Option<String>,
}

// The backend derives `has_audio` from the codec string, so besides booleans
// it may send null or an empty string.
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}

fn usable_codec(codec: &Option<String>) -> bool {
    codec
        .as_deref()
        .is_some_and(|c| !c.is_empty() && c != "none")
}

/// Presentation bucket of a format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    VideoWithAudio,
    AudioOnly,
    VideoOnly,
}

impl FormatDescriptor {
    pub fn is_video_with_audio(&self) -> bool {
        self.has_audio && MUXED_CONTAINERS.contains(&self.ext.to_lowercase().as_str())
    }

    pub fn is_audio_only(&self) -> bool {
        usable_codec(&self.acodec) && !usable_codec(&self.vcodec)
    }

    pub fn is_video_only(&self) -> bool {
        usable_codec(&self.vcodec) && !usable_codec(&self.acodec)
    }

    fn resolution(&self) -> String {
        match (self.height, self.format_note.as_deref()) {
            (Some(h), _) if h > 0 => format!("{}p", h),
            (_, Some(note)) if !note.is_empty() => note.to_string(),
            _ => "Unknown".to_string(),
        }
    }

    /// Text shown in the quality pickers
    pub fn label(&self, kind: FormatKind) -> String {
        let ext = self.ext.to_uppercase();
        let size = format_file_size(self.file_size_bytes);
        match kind {
            FormatKind::VideoWithAudio => format!("{} {} ({})", self.resolution(), ext, size),
            FormatKind::AudioOnly => format!("{} Audio ({})", ext, size),
            FormatKind::VideoOnly => {
                format!("{} {} Video Only ({})", self.resolution(), ext, size)
            }
        }
    }
}

/// One selectable entry of a quality picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOption {
    pub format_id: String,
    pub label: String,
}

impl fmt::Display for FormatOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Formats split into the three pickers of the download page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatBuckets {
    pub video_with_audio: Vec<FormatDescriptor>,
    pub audio_only: Vec<FormatDescriptor>,
    pub video_only: Vec<FormatDescriptor>,
}

impl FormatBuckets {
    pub fn classify(formats: &[FormatDescriptor]) -> Self {
        let pick = |keep: fn(&FormatDescriptor) -> bool| {
            formats.iter().filter(|f| keep(f)).cloned().collect::<Vec<_>>()
        };

        Self {
            video_with_audio: pick(FormatDescriptor::is_video_with_audio),
            audio_only: pick(FormatDescriptor::is_audio_only),
            video_only: pick(FormatDescriptor::is_video_only),
        }
    }

    pub fn get(&self, kind: FormatKind) -> &[FormatDescriptor] {
        match kind {
            FormatKind::VideoWithAudio => &self.video_with_audio,
            FormatKind::AudioOnly => &self.audio_only,
            FormatKind::VideoOnly => &self.video_only,
        }
    }

    pub fn options(&self, kind: FormatKind) -> Vec<FormatOption> {
        self.get(kind)
            .iter()
            .map(|f| FormatOption {
                format_id: f.format_id.clone(),
                label: f.label(kind),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.video_with_audio.is_empty() && self.audio_only.is_empty() && self.video_only.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats() -> Vec<FormatDescriptor> {
        serde_json::from_str(
            r#"[
                {"format_id": "18", "ext": "mp4", "height": 360, "width": 640,
                 "has_audio": true, "acodec": "mp4a.40.2", "vcodec": "avc1",
                 "filesize": 1048576, "format_note": "360p"},
                {"format_id": "140", "ext": "m4a", "acodec": "mp4a.40.2",
                 "vcodec": "none", "has_audio": true, "filesize": 3145728},
                {"format_id": "251", "ext": "webm", "acodec": "opus", "has_audio": true},
                {"format_id": "137", "ext": "mp4", "height": 1080, "acodec": "none",
                 "vcodec": "avc1.640028", "has_audio": "", "filesize": null},
                {"format_id": "399", "ext": "mp4", "height": 0, "acodec": "",
                 "vcodec": "av01", "has_audio": null, "format_note": "1080p60"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_lenient_has_audio() {
        let formats = formats();
        assert!(formats[0].has_audio);
        assert!(!formats[3].has_audio);
        assert!(!formats[4].has_audio);
    }

    #[test]
    fn test_classify() {
        let buckets = FormatBuckets::classify(&formats());
        fn ids(v: &[FormatDescriptor]) -> Vec<&str> {
            v.iter().map(|f| f.format_id.as_str()).collect::<Vec<_>>()
        }

        // 251 is webm with audio, so it lands in the muxed bucket as well
        assert_eq!(ids(&buckets.video_with_audio), vec!["18", "251"]);
        assert_eq!(ids(&buckets.audio_only), vec!["140", "251"]);
        assert_eq!(ids(&buckets.video_only), vec!["137", "399"]);
    }

    #[test]
    fn test_labels() {
        let formats = formats();
        assert_eq!(formats[0].label(FormatKind::VideoWithAudio), "360p MP4 (1 MB)");
        assert_eq!(formats[1].label(FormatKind::AudioOnly), "M4A Audio (3 MB)");
        assert_eq!(
            formats[3].label(FormatKind::VideoOnly),
            "1080p MP4 Video Only (Unknown size)"
        );
        assert_eq!(
            formats[4].label(FormatKind::VideoOnly),
            "1080p60 MP4 Video Only (Unknown size)"
        );
    }

    #[test]
    fn test_options_carry_format_ids() {
        let buckets = FormatBuckets::classify(&formats());
        let options = buckets.options(FormatKind::AudioOnly);
        assert_eq!(options[0].format_id, "140");
        assert_eq!(options[0].to_string(), "M4A Audio (3 MB)");
        assert!(!buckets.is_empty());
        assert!(FormatBuckets::default().is_empty());
    }
}
