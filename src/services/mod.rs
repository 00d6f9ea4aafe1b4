pub mod detection;
pub mod llm;
pub mod rotator;
pub mod script;
pub mod setup;
pub mod tts;
pub mod workflow;
