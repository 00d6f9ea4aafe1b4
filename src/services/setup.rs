use crate::core::config::Config;
use crate::core::io::Storage;
use crate::core::state::{CharacterMap, JobId, JobStatus, NARRATOR_KEY};
use crate::core::voices::{all_categories, unique_voice_names, Voice, VoiceCategory};
use crate::services::workflow::WorkflowManager;
use anyhow::{anyhow, Result};
use inquire::{Select, Text};
use log::warn;
use std::path::Path;

const ACTION_DONE: &str = "Done";
const ACTION_CHANGE: &str = "Change a voice";
const ACTION_ADD: &str = "Add a character";
const ACTION_REMOVE: &str = "Remove a character";
const ACTION_PREVIEW: &str = "Preview a voice";

/// Lets the user review the voice assignments of every editable job before a run.
pub async fn run_setup(workflow: &mut WorkflowManager, config: &Config, storage: &dyn Storage) -> Result<()> {
    let ids: Vec<JobId> = workflow
        .jobs()
        .filter(|j| matches!(j.status, JobStatus::Queued | JobStatus::Failed))
        .map(|j| j.id)
        .collect();

    for id in ids {
        loop {
            let job = workflow.job(id).ok_or_else(|| anyhow!("Job {} disappeared", id))?;
            println!("\n{} [{}]", job.file_name, job.status);
            if let Some(error) = &job.error {
                println!("  ! {}", error);
            }
            print!("{}", describe_map(&job.character_map));
            let characters: Vec<String> = job.character_map.characters.keys().cloned().collect();

            let actions = vec![ACTION_DONE, ACTION_CHANGE, ACTION_ADD, ACTION_REMOVE, ACTION_PREVIEW];
            let action = Select::new("What next?", actions).prompt()?;

            let result = match action {
                ACTION_CHANGE => {
                    let character = Select::new("Character:", characters).prompt()?;
                    let voice = select_voice(&format!("Voice for {}:", character))?;
                    workflow.set_voice(id, &character, &voice)
                }
                ACTION_ADD => {
                    let name = Text::new("Character name:").prompt()?;
                    workflow.add_character(id, &name)
                }
                ACTION_REMOVE => {
                    let removable: Vec<String> = characters.into_iter().filter(|c| c != NARRATOR_KEY).collect();
                    if removable.is_empty() {
                        println!("Only the narrator is left.");
                        continue;
                    }
                    let character = Select::new("Remove:", removable).prompt()?;
                    workflow.remove_character(id, &character)
                }
                ACTION_PREVIEW => {
                    let voice = Select::new("Voice to preview:", unique_voice_names()).prompt()?.to_string();
                    match workflow.preview_voice(&voice).await {
                        Ok(wav) => {
                            let path = Path::new(&config.output_folder).join(format!("preview_{}.wav", voice));
                            let path_str = path.to_string_lossy().to_string();
                            storage.write(&path_str, &wav).await?;
                            println!("Preview written to {}", path_str);
                        }
                        Err(e) => println!("Preview failed: {}", e.diagnostic()),
                    }
                    continue;
                }
                _ => break,
            };

            if let Err(e) = result {
                warn!("Edit rejected: {}", e);
                println!("{}", e);
            }
        }
    }
    Ok(())
}

pub fn describe_map(map: &CharacterMap) -> String {
    map.characters
        .iter()
        .map(|(name, info)| format!("  {:<20} {}\n", name, info.voice))
        .collect()
}

fn voice_label(v: &Voice) -> String {
    format!("{} ({:?}) - {}", v.name, v.gender, v.display_name)
}

fn voice_name_from_label(label: &str) -> Result<String> {
    label
        .split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Empty voice selection"))
}

fn select_voice(prompt: &str) -> Result<String> {
    let categories: Vec<&'static VoiceCategory> = all_categories().collect();
    let names: Vec<&str> = categories.iter().map(|c| c.name).collect();
    let category_name = Select::new("Category:", names).prompt()?;

    let category = categories
        .iter()
        .find(|c| c.name == category_name)
        .ok_or_else(|| anyhow!("Unknown category {}", category_name))?;
    let options: Vec<String> = category.voices.iter().map(voice_label).collect();

    let selection = Select::new(prompt, options).prompt()?;
    voice_name_from_label(&selection)
}
