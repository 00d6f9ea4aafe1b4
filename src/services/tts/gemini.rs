use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};

use super::{SpeechRequest, TtsClient, VoiceSelection};
use crate::core::error::RemoteError;
use crate::services::llm::{generate_content, GeminiRequest, GeminiResponse};

#[derive(Debug)]
pub struct GeminiTtsClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiTtsClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

fn prebuilt(voice: &str) -> Value {
    json!({ "prebuiltVoiceConfig": { "voiceName": voice } })
}

fn speech_config(voices: &VoiceSelection) -> Value {
    match voices {
        VoiceSelection::Single(voice) => json!({ "voiceConfig": prebuilt(voice) }),
        VoiceSelection::Dialogue(pair) => {
            let configs: Vec<Value> = pair
                .iter()
                .map(|s| json!({ "speaker": s.speaker, "voiceConfig": prebuilt(&s.voice) }))
                .collect();
            json!({ "multiSpeakerVoiceConfig": { "speakerVoiceConfigs": configs } })
        }
    }
}

pub(crate) fn build_request(request: &SpeechRequest) -> GeminiRequest {
    GeminiRequest::new(
        request.prompt(),
        json!({
            "responseModalities": ["AUDIO"],
            "speechConfig": speech_config(&request.voices),
        }),
    )
}

pub(crate) fn extract_audio(response: &GeminiResponse) -> Result<String, RemoteError> {
    response
        .first_part()
        .and_then(|p| p.inline_data.as_ref())
        .and_then(|d| d.data.clone())
        .ok_or(RemoteError::NoAudio)
}

#[async_trait]
impl TtsClient for GeminiTtsClient {
    async fn synthesize(&self, api_key: &str, request: &SpeechRequest) -> Result<String, RemoteError> {
        let body = build_request(request);
        let response = generate_content(&self.client, &self.base_url, &self.model, api_key, &body).await?;
        let audio = extract_audio(&response);
        match response.first_part().and_then(|p| p.inline_data.as_ref()) {
            Some(inline) => debug!(
                "Audio payload {}",
                inline.mime_type.as_deref().unwrap_or("of unknown type")
            ),
            None => debug!("No audio in response. Finish reason: {}", response.finish_reason()),
        }
        audio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tts::SpeakerVoice;

    #[test]
    fn test_single_voice_request() {
        let request = SpeechRequest::new("Hello.", VoiceSelection::Single("Kore".to_string()));
        let value = serde_json::to_value(build_request(&request)).unwrap();

        assert_eq!(value["contents"][0]["parts"][0]["text"], "TTS the following text:\n\nHello.");
        assert_eq!(value["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            value["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Kore"
        );
        assert!(value["generationConfig"]["speechConfig"]["multiSpeakerVoiceConfig"].is_null());
    }

    #[test]
    fn test_dialogue_request_binds_both_speakers() {
        let request = SpeechRequest::new(
            "A: hi. B: hey.",
            VoiceSelection::Dialogue([
                SpeakerVoice { speaker: "A".to_string(), voice: "Puck".to_string() },
                SpeakerVoice { speaker: "B".to_string(), voice: "Leda".to_string() },
            ]),
        );
        let value = serde_json::to_value(build_request(&request)).unwrap();
        let configs = &value["generationConfig"]["speechConfig"]["multiSpeakerVoiceConfig"]["speakerVoiceConfigs"];

        assert_eq!(configs.as_array().unwrap().len(), 2);
        assert_eq!(configs[0]["speaker"], "A");
        assert_eq!(configs[0]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"], "Puck");
        assert_eq!(configs[1]["speaker"], "B");
        assert_eq!(configs[1]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"], "Leda");
    }

    #[test]
    fn test_extract_audio() {
        let ok: GeminiResponse = serde_json::from_str(
            r#"{ "candidates": [ { "content": { "parts": [ { "inlineData": { "data": "UklGRg==" } } ] } } ] }"#,
        )
        .unwrap();
        assert_eq!(extract_audio(&ok).unwrap(), "UklGRg==");

        let text_only: GeminiResponse = serde_json::from_str(
            r#"{ "candidates": [ { "content": { "parts": [ { "text": "sorry" } ] } } ] }"#,
        )
        .unwrap();
        assert!(matches!(extract_audio(&text_only), Err(RemoteError::NoAudio)));

        let empty: GeminiResponse = serde_json::from_str(r#"{ "candidates": [] }"#).unwrap();
        assert!(matches!(extract_audio(&empty), Err(RemoteError::NoAudio)));
    }
}
