use std::sync::Arc;

/// Sample rate the TTS backend uses when the mime type does not say.
pub const DEFAULT_NARRATION_RATE: u32 = 24_000;

/// Encoded scene image as returned by the image model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneImage {
    pub bytes: Arc<[u8]>,
    pub mime_type: String,
}

impl SceneImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Raw 16-bit little-endian mono PCM narration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub pcm: Arc<[u8]>,
    pub mime_type: String,
}

impl AudioClip {
    pub fn new(pcm: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            pcm: pcm.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Reads `rate=N` out of a mime type such as `audio/L16;codec=pcm;rate=24000`.
    pub fn sample_rate(&self) -> u32 {
        self.mime_type
            .split(';')
            .filter_map(|param| param.trim().strip_prefix("rate="))
            .find_map(|rate| rate.parse().ok())
            .unwrap_or(DEFAULT_NARRATION_RATE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoClip {
    pub bytes: Arc<[u8]>,
    pub mime_type: String,
}

impl VideoClip {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rate_comes_from_mime_parameters() {
        let clip = AudioClip::new(vec![0, 0], "audio/L16;codec=pcm;rate=16000");
        assert_eq!(clip.sample_rate(), 16_000);

        let bare = AudioClip::new(vec![0, 0], "audio/L16");
        assert_eq!(bare.sample_rate(), DEFAULT_NARRATION_RATE);

        let garbled = AudioClip::new(vec![0, 0], "audio/L16; rate=fast");
        assert_eq!(garbled.sample_rate(), DEFAULT_NARRATION_RATE);
    }
}
