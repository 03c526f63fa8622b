//! Audio format value object

use std::fmt;
use std::str::FromStr;

/// A container/codec pair the encoder can be asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioFormat {
    /// Opus audio in a WebM container
    WebmOpus,
    /// WebM with the platform's default codec
    Webm,
    Mp4,
    Mpeg,
    /// Uncompressed 16-bit PCM in a streaming WAV container
    Wav,
    /// No candidate was supported; the encoder picks its own default
    #[default]
    Unspecified,
}

/// Formats tried in order of preference during negotiation
pub const CANDIDATE_FORMATS: [AudioFormat; 5] = [
    AudioFormat::WebmOpus,
    AudioFormat::Webm,
    AudioFormat::Mp4,
    AudioFormat::Mpeg,
    AudioFormat::Wav,
];

/// MIME tag used for an artifact whose format was left to the encoder
const FALLBACK_MIME: &str = "audio/webm";

impl AudioFormat {
    /// Get the MIME type string (empty for the unspecified sentinel)
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WebmOpus => "audio/webm;codecs=opus",
            Self::Webm => "audio/webm",
            Self::Mp4 => "audio/mp4",
            Self::Mpeg => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Unspecified => "",
        }
    }

    /// MIME type to tag a finished artifact with
    pub const fn artifact_mime(&self) -> &'static str {
        match self {
            Self::Unspecified => FALLBACK_MIME,
            _ => self.as_str(),
        }
    }

    pub const fn container(&self) -> Option<&'static str> {
        match self {
            Self::WebmOpus | Self::Webm => Some("webm"),
            Self::Mp4 => Some("mp4"),
            Self::Mpeg => Some("mpeg"),
            Self::Wav => Some("wav"),
            Self::Unspecified => None,
        }
    }

    pub const fn codec(&self) -> Option<&'static str> {
        match self {
            Self::WebmOpus => Some("opus"),
            Self::Wav => Some("pcm_s16le"),
            _ => None,
        }
    }

    /// Get the file extension
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::WebmOpus | Self::Webm | Self::Unspecified => "webm",
            Self::Mp4 => "m4a",
            Self::Mpeg => "mp3",
            Self::Wav => "wav",
        }
    }

    pub const fn is_specified(&self) -> bool {
        !matches!(self, Self::Unspecified)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => write!(f, "(encoder default)"),
            _ => write!(f, "{}", self.as_str()),
        }
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        match normalized.as_str() {
            "audio/webm;codecs=opus" | "webm-opus" => Ok(Self::WebmOpus),
            "audio/webm" | "webm" => Ok(Self::Webm),
            "audio/mp4" | "mp4" => Ok(Self::Mp4),
            "audio/mpeg" | "mpeg" | "mp3" => Ok(Self::Mpeg),
            "audio/wav" | "wav" => Ok(Self::Wav),
            "" | "default" => Ok(Self::Unspecified),
            _ => Err(format!("Unknown audio format: \"{}\"", s)),
        }
    }
}
