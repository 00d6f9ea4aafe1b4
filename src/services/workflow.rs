use crate::core::config::AudioConfig;
use crate::core::error::{detection_diagnostic, JobError, WorkflowError};
use crate::core::state::{AudioStore, CharacterMap, Job, JobId, JobStatus, JobStore, NARRATOR_KEY};
use crate::core::voices::{find_voice, DEFAULT_ADDED_VOICE};
use crate::services::detection::{build_character_map, detect_characters};
use crate::services::llm::LlmClient;
use crate::services::rotator::CredentialRotator;
use crate::services::script::chunk_by_sentences;
use crate::services::tts::{SpeechRequest, TtsClient, VoiceSelection, PREVIEW_SAMPLE_TEXT};
use crate::utils::audio::{assemble_wav, PcmFormat};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use log::{debug, error, info, warn};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Snapshot of a job after a status change or progress update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: Option<String>,
}

/// Shared pause request, honoured between jobs of a batch run.
#[derive(Debug, Clone, Default)]
pub struct PauseHandle(Arc<AtomicBool>);

impl PauseHandle {
    pub fn pause(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No queued job is left.
    Finished,
    /// Stopped between jobs; queued jobs remain for the next `run_all`.
    Paused,
}

pub struct WorkflowManager {
    config: AudioConfig,
    jobs: JobStore,
    audio: AudioStore,
    rotator: Arc<CredentialRotator>,
    llm: Box<dyn LlmClient>,
    tts: Box<dyn TtsClient>,
    pause: PauseHandle,
    batch: BatchState,
    events: Option<mpsc::UnboundedSender<JobEvent>>,
}

impl WorkflowManager {
    pub fn new(
        config: AudioConfig,
        rotator: Arc<CredentialRotator>,
        llm: Box<dyn LlmClient>,
        tts: Box<dyn TtsClient>,
    ) -> Self {
        Self {
            config,
            jobs: JobStore::new(),
            audio: AudioStore::default(),
            rotator,
            llm,
            tts,
            pause: PauseHandle::default(),
            batch: BatchState::Idle,
            events: None,
        }
    }

    /// Replaces any previous subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<JobEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    fn emit(&self, id: JobId) {
        if let (Some(tx), Some(job)) = (&self.events, self.jobs.get(id)) {
            let _ = tx.send(JobEvent {
                id,
                status: job.status,
                progress: job.progress.clone(),
            });
        }
    }

    /// Progress is informational; a job that vanished mid-run only costs the update.
    fn report_progress(&mut self, id: JobId, progress: String) {
        match self.jobs.set_progress(id, Some(progress)) {
            Ok(()) => self.emit(id),
            Err(e) => warn!("Job {}: progress not recorded: {}", id, e),
        }
    }

    fn require_credentials(&self) -> Result<(), WorkflowError> {
        if self.rotator.is_empty() {
            return Err(WorkflowError::NoCredentials);
        }
        Ok(())
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn queued_count(&self) -> usize {
        self.jobs.queued_count()
    }

    pub fn batch_state(&self) -> BatchState {
        self.batch
    }

    pub fn pause_handle(&self) -> PauseHandle {
        self.pause.clone()
    }

    /// Requests a pause at the next job boundary. A request made while no batch is
    /// running is kept and honoured before the first job of the next `run_all`.
    pub fn pause(&self) {
        self.pause.pause();
    }

    /// Leaves a paused batch so single runs are allowed again. Drops any pending pause.
    pub fn abandon_batch(&mut self) {
        if self.batch == BatchState::Paused {
            info!("Paused batch abandoned with {} job(s) queued", self.jobs.queued_count());
            self.batch = BatchState::Idle;
        }
        self.pause.resume();
    }

    /// Accepts a `.txt` file with UTF-8 content as a new job in `detecting`.
    pub fn add_script(&mut self, file_name: &str, bytes: Vec<u8>) -> Result<JobId, WorkflowError> {
        let is_txt = Path::new(file_name)
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("txt"))
            .unwrap_or(false);
        if !is_txt {
            return Err(WorkflowError::NotText(file_name.to_string()));
        }
        let text = String::from_utf8(bytes).map_err(|_| WorkflowError::NotText(file_name.to_string()))?;
        let text = match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        };

        let id = self.jobs.create(file_name, text);
        info!("Job {} created for {}", id, file_name);
        self.emit(id);
        Ok(id)
    }

    /// Runs character detection for one job. Failures still leave a narrator-only map.
    pub async fn detect(&mut self, id: JobId) -> Result<(), WorkflowError> {
        self.require_credentials()?;
        let job = self.jobs.get(id).ok_or(WorkflowError::UnknownJob(id))?;
        if job.status != JobStatus::Detecting {
            return Err(WorkflowError::InvalidTransition {
                id,
                from: job.status,
                to: JobStatus::Queued,
            });
        }
        let text = job.shared_text();

        match detect_characters(&self.rotator, self.llm.as_ref(), &text).await {
            Ok(detected) => {
                let map = build_character_map(&detected, &self.config);
                info!("Job {}: {} character(s) detected", id, map.speakers().len());
                self.jobs.mark_detected(id, map)?;
            }
            Err(e) => {
                error!("Job {}: character detection failed: {}", id, e);
                let map = CharacterMap::narrator_only(&self.config.narrator_voice);
                self.jobs.mark_detection_failed(id, map, detection_diagnostic(&e))?;
            }
        }
        self.emit(id);
        Ok(())
    }

    pub async fn detect_pending(&mut self) -> Result<(), WorkflowError> {
        for id in self.jobs.ids_with_status(JobStatus::Detecting) {
            self.detect(id).await?;
        }
        Ok(())
    }

    /// Processes one queued job outside of a batch.
    pub async fn run_job(&mut self, id: JobId) -> Result<JobStatus, WorkflowError> {
        if self.batch != BatchState::Idle {
            return Err(WorkflowError::BatchActive);
        }
        self.require_credentials()?;
        self.process_job(id).await?;
        self.jobs
            .get(id)
            .map(|j| j.status)
            .ok_or(WorkflowError::UnknownJob(id))
    }

    /// Processes queued jobs in queue order until none is left or a pause is requested.
    /// Calling it again after a pause resumes with the jobs still queued.
    pub async fn run_all(&mut self) -> Result<RunOutcome, WorkflowError> {
        if self.batch == BatchState::Running {
            return Err(WorkflowError::BatchActive);
        }
        self.require_credentials()?;

        if self.batch == BatchState::Paused {
            info!("Resuming batch with {} job(s) queued", self.jobs.queued_count());
            self.pause.resume();
        } else {
            info!("Starting batch with {} job(s) queued", self.jobs.queued_count());
        }
        self.batch = BatchState::Running;

        let outcome = self.drain_queue().await;
        self.batch = match outcome {
            Ok(RunOutcome::Paused) => BatchState::Paused,
            _ => BatchState::Idle,
        };
        outcome
    }

    async fn drain_queue(&mut self) -> Result<RunOutcome, WorkflowError> {
        loop {
            if self.pause.is_paused() {
                info!("Batch paused, {} job(s) still queued", self.jobs.queued_count());
                return Ok(RunOutcome::Paused);
            }
            match self.jobs.next_queued() {
                Some(id) => self.process_job(id).await?,
                None => {
                    info!("Batch finished");
                    return Ok(RunOutcome::Finished);
                }
            }
        }
    }

    async fn process_job(&mut self, id: JobId) -> Result<(), WorkflowError> {
        let job = self.jobs.start(id)?;
        let text = job.shared_text();
        let map = job.character_map.clone();
        info!("Job {} ({}) processing", id, job.file_name);
        self.emit(id);

        match self.synthesize(id, &text, &map).await {
            Ok(wav) => {
                let handle = self.audio.insert(wav);
                self.jobs.complete(id, handle)?;
                info!("Job {} completed", id);
            }
            Err(e) => {
                error!("Job {} failed: {}", id, e);
                self.jobs.fail(id, e.diagnostic())?;
            }
        }
        self.emit(id);
        Ok(())
    }

    async fn synthesize(&mut self, id: JobId, text: &str, map: &CharacterMap) -> Result<Vec<u8>, JobError> {
        let voices = VoiceSelection::from_map(map)?;
        let segments = chunk_by_sentences(text, self.config.max_segment_chars);
        let total = segments.len();
        debug!("Job {}: {} segment(s), voices {:?}", id, total, voices);

        let mut fragments = Vec::with_capacity(total);
        for (i, segment) in segments.into_iter().enumerate() {
            let request = SpeechRequest::new(segment, voices.clone());
            let data = self.request_audio(&request).await?;
            let pcm = BASE64
                .decode(data.as_bytes())
                .map_err(|source| JobError::Decode { segment: i + 1, source })?;

            if pcm.is_empty() {
                warn!("Job {}: segment {}/{} returned an empty payload", id, i + 1, total);
            } else {
                debug!("Job {}: segment {}/{} -> {} bytes", id, i + 1, total, pcm.len());
                fragments.push(pcm);
            }
            self.report_progress(id, format!("segment {}/{}", i + 1, total));
        }

        self.report_progress(id, "Assembling audio...".to_string());
        Ok(assemble_wav(fragments.as_slice(), PcmFormat::PROVIDER)?)
    }

    async fn request_audio(&self, request: &SpeechRequest) -> Result<String, JobError> {
        let tts = self.tts.as_ref();
        let data = self
            .rotator
            .call(|key| async move { tts.synthesize(&key, request).await })
            .await?;
        Ok(data)
    }

    /// Renders the sample sentence with `voice` as a complete WAV buffer.
    pub async fn preview_voice(&self, voice: &str) -> Result<Vec<u8>, JobError> {
        let request = SpeechRequest::new(PREVIEW_SAMPLE_TEXT, VoiceSelection::Single(voice.to_string()));
        let data = self.request_audio(&request).await?;
        let pcm = BASE64
            .decode(data.as_bytes())
            .map_err(|source| JobError::Decode { segment: 1, source })?;
        Ok(assemble_wav(&[pcm], PcmFormat::PROVIDER)?)
    }

    fn edit<F>(&mut self, id: JobId, edit: F) -> Result<(), WorkflowError>
    where
        F: FnOnce(&mut CharacterMap) -> Result<(), WorkflowError>,
    {
        self.jobs.edit_characters(id, edit)?;
        self.emit(id);
        Ok(())
    }

    pub fn update_character_map(&mut self, id: JobId, map: CharacterMap) -> Result<(), WorkflowError> {
        self.edit(id, |current| {
            *current = map;
            Ok(())
        })
    }

    pub fn set_voice(&mut self, id: JobId, character: &str, voice: &str) -> Result<(), WorkflowError> {
        if find_voice(voice).is_none() {
            warn!("Voice {} is not in the catalog", voice);
        }
        self.edit(id, |map| {
            let info = map
                .characters
                .get_mut(character)
                .ok_or_else(|| WorkflowError::UnknownCharacter(character.to_string()))?;
            info.voice = voice.to_string();
            Ok(())
        })
    }

    pub fn add_character(&mut self, id: JobId, name: &str) -> Result<(), WorkflowError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkflowError::EmptyCharacterName);
        }
        self.edit(id, |map| {
            if map.characters.contains_key(name) {
                return Err(WorkflowError::DuplicateCharacter(name.to_string()));
            }
            map.insert(name, DEFAULT_ADDED_VOICE, None);
            Ok(())
        })
    }

    pub fn remove_character(&mut self, id: JobId, name: &str) -> Result<(), WorkflowError> {
        if name == NARRATOR_KEY {
            return Err(WorkflowError::ProtectedCharacter(name.to_string()));
        }
        self.edit(id, |map| {
            map.characters
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| WorkflowError::UnknownCharacter(name.to_string()))
        })
    }

    /// Removes a job and releases its audio. Refused while the job is processing.
    pub fn delete_job(&mut self, id: JobId) -> Result<(), WorkflowError> {
        let job = self.jobs.remove(id)?;
        if let Some(handle) = job.audio {
            self.audio.release(handle);
        }
        info!("Job {} ({}) deleted", id, job.file_name);
        Ok(())
    }

    pub fn audio(&self, id: JobId) -> Option<Arc<[u8]>> {
        self.jobs.get(id)?.audio.and_then(|h| self.audio.get(h))
    }

    pub fn stored_audio_count(&self) -> usize {
        self.audio.len()
    }
}
