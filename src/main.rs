use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use log::{debug, info, warn};
use script2audio::core::config::Config;
use script2audio::core::credentials::{resolve_keys, API_KEYS_ENV};
use script2audio::core::io::{NativeStorage, Storage};
use script2audio::core::state::JobStatus;
use script2audio::services::llm::create_llm;
use script2audio::services::rotator::CredentialRotator;
use script2audio::services::setup;
use script2audio::services::tts::create_tts_client;
use script2audio::services::workflow::{RunOutcome, WorkflowManager};
use script2audio::utils::audio::parse_wav;
use std::path::Path;
use std::sync::Arc;

fn output_path(config: &Config, file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    Path::new(&config.output_folder)
        .join(format!("{}.wav", stem))
        .to_string_lossy()
        .to_string()
}

fn is_script(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 1. Config
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists.");
            return Err(e);
        }
    };
    config.ensure_directories()?;

    // 2. Credentials
    let keys = resolve_keys(config.credentials.keys.as_deref(), Path::new(&config.credentials.file))?;
    if keys.is_empty() {
        eprintln!(
            "No API keys configured. Add them to {} (one per line) or set {}.",
            config.credentials.file, API_KEYS_ENV
        );
        return Ok(());
    }
    info!("Loaded {} API key(s)", keys.len());
    let rotator = Arc::new(CredentialRotator::new(keys));

    // 3. Clients and controller
    let llm = create_llm(&config.llm);
    let tts = create_tts_client(&config.audio);
    let storage = NativeStorage::new();
    let mut workflow = WorkflowManager::new(config.audio.clone(), rotator, llm, tts);

    // 4. Input scripts
    for entry in storage.list(&config.input_folder).await? {
        let file_name = Path::new(&entry)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| entry.clone());
        if !is_script(&file_name) {
            debug!("Ignoring {}: not a .txt file", entry);
            continue;
        }
        if storage.exists(&output_path(&config, &file_name)).await? {
            info!("Skipping {}: output already exists", file_name);
            continue;
        }
        let bytes = match storage.read(&entry).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping {}: {}", entry, e);
                continue;
            }
        };
        if let Err(e) = workflow.add_script(&file_name, bytes) {
            warn!("Skipping {}: {}", entry, e);
        }
    }
    if workflow.jobs().next().is_none() {
        println!("No new .txt scripts in {}", config.input_folder);
        return Ok(());
    }

    println!("Detecting characters...");
    workflow.detect_pending().await?;

    // 5. Voice review
    if !config.unattended {
        setup::run_setup(&mut workflow, &config, &storage).await?;
    }

    // 6. Batch run
    let total = workflow.queued_count();
    println!("{} job(s) queued. Press Ctrl+C to pause after the current job.", total);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut events = workflow.subscribe();
    let bar = pb.clone();
    let reporter = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event.status {
                JobStatus::Processing => {
                    bar.set_message(format!("job {}: {}", event.id, event.progress.unwrap_or_default()));
                }
                JobStatus::Completed | JobStatus::Failed => bar.inc(1),
                _ => {}
            }
        }
    });

    let pause = workflow.pause_handle();
    let pause_bar = pb.clone();
    let signals = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            pause.pause();
            pause_bar.println("Pause requested; finishing the current job...");
        }
    });

    loop {
        match workflow.run_all().await? {
            RunOutcome::Finished => break,
            RunOutcome::Paused => {
                let queued = workflow.queued_count();
                let resume = !config.unattended
                    && pb.suspend(|| {
                        Confirm::new(&format!("Paused with {} job(s) queued. Resume?", queued))
                            .with_default(true)
                            .prompt()
                    })?;
                if !resume {
                    workflow.abandon_batch();
                    break;
                }
            }
        }
    }
    pb.finish_with_message("Batch complete");
    signals.abort();
    reporter.abort();

    // 7. Export
    for job in workflow.jobs() {
        match job.status {
            JobStatus::Completed => {
                let Some(wav) = workflow.audio(job.id) else {
                    continue;
                };
                let path = output_path(&config, &job.file_name);
                storage.write(&path, &wav).await?;
                match parse_wav(&wav) {
                    Ok(info) => println!("{} -> {} ({:.1}s)", job.file_name, path, info.duration_secs()),
                    Err(e) => warn!("{} written but unreadable: {}", path, e),
                }
            }
            JobStatus::Failed => {
                println!("{} failed: {}", job.file_name, job.error.as_deref().unwrap_or("unknown error"));
            }
            status => println!("{} left {}", job.file_name, status),
        }
    }

    Ok(())
}
