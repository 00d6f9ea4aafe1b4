use log::{debug, info};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::config::AudioConfig;
use crate::core::error::{RemoteError, RotationError};
use crate::core::state::{CharacterMap, Gender, NARRATOR_KEY};
use crate::services::llm::LlmClient;
use crate::services::rotator::CredentialRotator;
use crate::services::script::strip_code_blocks;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DetectedCharacter {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_gender")]
    pub gender: Gender,
}

fn lenient_gender<'de, D>(deserializer: D) -> Result<Gender, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map(Gender::parse).unwrap_or_default())
}

pub fn detection_prompt(text: &str) -> String {
    format!(
        "Please read the following script, identify all unique character names (excluding \"{narrator}\"), \
and determine their likely gender (must be \"Male\", \"Female\", or \"Neutral\"). \
Return the result as a single JSON array of objects, where each object has a \"name\" and \"gender\" property. \
If no characters are found, return an empty array.\n\nScript: \"\"\"{text}\"\"\"",
        narrator = NARRATOR_KEY,
        text = text
    )
}

pub fn detection_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "name": { "type": "STRING" },
                "gender": { "type": "STRING", "enum": ["Male", "Female", "Neutral"] }
            },
            "required": ["name", "gender"]
        }
    })
}

pub fn parse_detection(raw: &str) -> Result<Vec<DetectedCharacter>, RemoteError> {
    let cleaned = strip_code_blocks(raw);
    serde_json::from_str(&cleaned)
        .map_err(|e| RemoteError::MalformedResponse(format!("character list: {}", e)))
}

/// One language-model call (through the rotator) listing the characters of `text`.
pub async fn detect_characters(
    rotator: &CredentialRotator,
    llm: &dyn LlmClient,
    text: &str,
) -> Result<Vec<DetectedCharacter>, RotationError> {
    let prompt = detection_prompt(text);
    let schema = detection_schema();

    let characters = rotator
        .call(|key| {
            let prompt = &prompt;
            let schema = &schema;
            async move {
                let raw = llm.generate_json(&key, prompt, schema).await?;
                parse_detection(&raw)
            }
        })
        .await?;

    debug!("Detected characters: {:?}", characters);
    Ok(characters)
}

/// Narrator plus every detected character, each bound to the default voice for its gender.
pub fn build_character_map(detected: &[DetectedCharacter], config: &AudioConfig) -> CharacterMap {
    let mut map = CharacterMap::narrator_only(&config.narrator_voice);
    for character in detected {
        let name = character.name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case(NARRATOR_KEY) {
            continue;
        }
        map.insert(name, config.voice_for(character.gender), Some(character.gender));
    }
    info!(
        "Character map: {}",
        map.characters
            .iter()
            .map(|(name, info)| format!("{} -> {}", name, info.voice))
            .collect::<Vec<_>>()
            .join(", ")
    );
    map
}
