use crate::core::config::AudioConfig;
use crate::core::error::{JobError, RemoteError};
use crate::core::state::{CharacterMap, NARRATOR_KEY};
use crate::core::voices::DEFAULT_NEUTRAL_VOICE;
use async_trait::async_trait;
use std::fmt::Debug;

pub mod gemini;

/// Read at the start of every voice preview.
pub const PREVIEW_SAMPLE_TEXT: &str = "Hello, this is a sample of my voice.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerVoice {
    pub speaker: String,
    pub voice: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceSelection {
    Single(String),
    /// Exactly two named speakers, each bound to a voice.
    Dialogue([SpeakerVoice; 2]),
}

impl VoiceSelection {
    /// No named speaker reads with the narrator's voice, one named speaker with
    /// theirs, two make a dialogue. More than two is rejected.
    pub fn from_map(map: &CharacterMap) -> Result<Self, JobError> {
        let speakers = map.speakers();
        match speakers.as_slice() {
            [] => Ok(VoiceSelection::Single(
                map.voice_of(NARRATOR_KEY)
                    .unwrap_or(DEFAULT_NEUTRAL_VOICE)
                    .to_string(),
            )),
            [(_, voice)] => Ok(VoiceSelection::Single(voice.to_string())),
            [(a, va), (b, vb)] => Ok(VoiceSelection::Dialogue([
                SpeakerVoice {
                    speaker: a.to_string(),
                    voice: va.to_string(),
                },
                SpeakerVoice {
                    speaker: b.to_string(),
                    voice: vb.to_string(),
                },
            ])),
            more => Err(JobError::TooManySpeakers(more.len())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub voices: VoiceSelection,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, voices: VoiceSelection) -> Self {
        Self {
            text: text.into(),
            voices,
        }
    }

    /// Instruction sent to the speech model, with the segment text appended.
    pub fn prompt(&self) -> String {
        match &self.voices {
            VoiceSelection::Single(_) => format!("TTS the following text:\n\n{}", self.text),
            VoiceSelection::Dialogue([a, b]) => format!(
                "TTS the following conversation between {} and {}:\n\n{}",
                a.speaker, b.speaker, self.text
            ),
        }
    }
}

#[async_trait]
pub trait TtsClient: Send + Sync + Debug {
    /// Base64-encoded raw PCM for one request. A response without an audio
    /// payload is [`RemoteError::NoAudio`].
    async fn synthesize(&self, api_key: &str, request: &SpeechRequest) -> Result<String, RemoteError>;
}

pub fn create_tts_client(config: &AudioConfig) -> Box<dyn TtsClient> {
    Box::new(gemini::GeminiTtsClient::new(&config.base_url, &config.model))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> CharacterMap {
        let mut map = CharacterMap::default();
        for (name, voice) in entries {
            map.insert(name, voice, None);
        }
        map
    }

    #[test]
    fn test_narrator_only_uses_narrator_voice() {
        let selection = VoiceSelection::from_map(&map(&[(NARRATOR_KEY, "Zephyr")])).unwrap();
        assert_eq!(selection, VoiceSelection::Single("Zephyr".to_string()));

        let selection = VoiceSelection::from_map(&CharacterMap::default()).unwrap();
        assert_eq!(selection, VoiceSelection::Single(DEFAULT_NEUTRAL_VOICE.to_string()));
    }

    #[test]
    fn test_single_speaker_overrides_narrator() {
        let selection =
            VoiceSelection::from_map(&map(&[(NARRATOR_KEY, "Kore"), ("Alice", "Leda")])).unwrap();
        assert_eq!(selection, VoiceSelection::Single("Leda".to_string()));
    }

    #[test]
    fn test_two_speakers_make_a_dialogue() {
        let selection = VoiceSelection::from_map(&map(&[
            (NARRATOR_KEY, "Kore"),
            ("Bob", "Puck"),
            ("Alice", "Leda"),
        ]))
        .unwrap();
        let request = SpeechRequest::new("Alice: Hi.\nBob: Hey.", selection);

        match &request.voices {
            VoiceSelection::Dialogue([a, b]) => {
                assert_eq!((a.speaker.as_str(), a.voice.as_str()), ("Alice", "Leda"));
                assert_eq!((b.speaker.as_str(), b.voice.as_str()), ("Bob", "Puck"));
            }
            other => panic!("expected dialogue, got {:?}", other),
        }
        assert_eq!(
            request.prompt(),
            "TTS the following conversation between Alice and Bob:\n\nAlice: Hi.\nBob: Hey."
        );
    }

    #[test]
    fn test_three_speakers_rejected() {
        let result = VoiceSelection::from_map(&map(&[
            (NARRATOR_KEY, "Kore"),
            ("A", "Puck"),
            ("B", "Puck"),
            ("C", "Kore"),
        ]));
        assert!(matches!(result, Err(JobError::TooManySpeakers(3))));
    }

    #[test]
    fn test_single_prompt() {
        let request = SpeechRequest::new("Once upon a time.", VoiceSelection::Single("Kore".to_string()));
        assert_eq!(request.prompt(), "TTS the following text:\n\nOnce upon a time.");
    }
}
