use crate::core::error::WorkflowError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Reserved character for text not attributed to a named speaker.
pub const NARRATOR_KEY: &str = "Narrator";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Neutral,
}

impl Gender {
    /// Lenient parse of model output; anything unrecognised is neutral.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "male" => Gender::Male,
            "female" => Gender::Female,
            _ => Gender::Neutral,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CharacterInfo {
    pub voice: String,
    #[serde(default)]
    pub gender: Option<Gender>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CharacterMap {
    pub characters: BTreeMap<String, CharacterInfo>,
}

impl CharacterMap {
    pub fn narrator_only(voice: &str) -> Self {
        let mut map = Self::default();
        map.insert(NARRATOR_KEY, voice, None);
        map
    }

    pub fn insert(&mut self, name: &str, voice: &str, gender: Option<Gender>) {
        self.characters.insert(
            name.to_string(),
            CharacterInfo {
                voice: voice.to_string(),
                gender,
            },
        );
    }

    pub fn has_narrator(&self) -> bool {
        self.characters.contains_key(NARRATOR_KEY)
    }

    pub fn voice_of(&self, name: &str) -> Option<&str> {
        self.characters.get(name).map(|c| c.voice.as_str())
    }

    /// Named characters other than the narrator, as `(name, voice)`.
    pub fn speakers(&self) -> Vec<(&str, &str)> {
        self.characters
            .iter()
            .filter(|(name, _)| name.as_str() != NARRATOR_KEY)
            .map(|(name, info)| (name.as_str(), info.voice.as_str()))
            .collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Detecting,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Detecting, Queued)
                | (Detecting, Failed)
                | (Queued, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Queued, Queued)
                | (Failed, Queued)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Detecting => "detecting",
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AudioHandle(u64);

#[derive(Clone, Debug)]
pub struct Job {
    pub id: JobId,
    pub file_name: String,
    text: Arc<str>,
    pub status: JobStatus,
    pub character_map: CharacterMap,
    pub audio: Option<AudioHandle>,
    pub error: Option<String>,
    pub progress: Option<String>,
    queued_seq: Option<u64>,
}

impl Job {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }
}

/// Owned job collection. Every mutation goes through a checked status transition.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: BTreeMap<JobId, Job>,
    next_id: u64,
    next_seq: u64,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, file_name: &str, text: String) -> JobId {
        self.next_id += 1;
        let id = JobId(self.next_id);
        self.jobs.insert(
            id,
            Job {
                id,
                file_name: file_name.to_string(),
                text: Arc::from(text),
                status: JobStatus::Detecting,
                character_map: CharacterMap::default(),
                audio: None,
                error: None,
                progress: None,
                queued_seq: None,
            },
        );
        id
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn queued_count(&self) -> usize {
        self.jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued)
            .count()
    }

    /// Queued job that entered the queue first.
    pub fn next_queued(&self) -> Option<JobId> {
        self.jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued)
            .min_by_key(|j| j.queued_seq)
            .map(|j| j.id)
    }

    pub fn ids_with_status(&self, status: JobStatus) -> Vec<JobId> {
        self.jobs
            .values()
            .filter(|j| j.status == status)
            .map(|j| j.id)
            .collect()
    }

    fn transition(&mut self, id: JobId, to: JobStatus) -> Result<&mut Job, WorkflowError> {
        let job = self.jobs.get_mut(&id).ok_or(WorkflowError::UnknownJob(id))?;
        let from = job.status;
        if !from.can_transition_to(to) {
            return Err(WorkflowError::InvalidTransition { id, from, to });
        }

        if to == JobStatus::Queued && from != JobStatus::Queued {
            self.next_seq += 1;
            job.queued_seq = Some(self.next_seq);
        }
        if to != JobStatus::Queued {
            job.queued_seq = None;
        }
        if matches!(to, JobStatus::Queued | JobStatus::Processing) {
            job.error = None;
        }
        job.status = to;
        Ok(job)
    }

    pub fn mark_detected(&mut self, id: JobId, map: CharacterMap) -> Result<(), WorkflowError> {
        let job = self.transition(id, JobStatus::Queued)?;
        job.character_map = map;
        Ok(())
    }

    pub fn mark_detection_failed(
        &mut self,
        id: JobId,
        map: CharacterMap,
        diagnostic: String,
    ) -> Result<(), WorkflowError> {
        let job = self.transition(id, JobStatus::Failed)?;
        job.character_map = map;
        job.error = Some(diagnostic);
        Ok(())
    }

    pub fn start(&mut self, id: JobId) -> Result<&Job, WorkflowError> {
        let job = self.transition(id, JobStatus::Processing)?;
        job.progress = Some("Preparing...".to_string());
        Ok(job)
    }

    pub fn complete(&mut self, id: JobId, audio: AudioHandle) -> Result<(), WorkflowError> {
        let job = self.transition(id, JobStatus::Completed)?;
        job.audio = Some(audio);
        job.progress = None;
        Ok(())
    }

    pub fn fail(&mut self, id: JobId, diagnostic: String) -> Result<(), WorkflowError> {
        let job = self.transition(id, JobStatus::Failed)?;
        job.error = Some(diagnostic);
        job.progress = None;
        Ok(())
    }

    pub fn set_progress(&mut self, id: JobId, progress: Option<String>) -> Result<(), WorkflowError> {
        let job = self.jobs.get_mut(&id).ok_or(WorkflowError::UnknownJob(id))?;
        job.progress = progress;
        Ok(())
    }

    /// Applies a voice-assignment edit to a copy of the map and commits it only if
    /// the edit succeeds and the narrator entry survives. Re-queues the job.
    pub fn edit_characters<F>(&mut self, id: JobId, edit: F) -> Result<(), WorkflowError>
    where
        F: FnOnce(&mut CharacterMap) -> Result<(), WorkflowError>,
    {
        let job = self.jobs.get(&id).ok_or(WorkflowError::UnknownJob(id))?;
        if !job.status.can_transition_to(JobStatus::Queued) || job.status == JobStatus::Detecting {
            return Err(WorkflowError::InvalidTransition {
                id,
                from: job.status,
                to: JobStatus::Queued,
            });
        }

        let mut draft = job.character_map.clone();
        edit(&mut draft)?;
        if !draft.has_narrator() {
            return Err(WorkflowError::MissingNarrator);
        }

        let job = self.transition(id, JobStatus::Queued)?;
        job.character_map = draft;
        Ok(())
    }

    pub fn remove(&mut self, id: JobId) -> Result<Job, WorkflowError> {
        let status = self
            .jobs
            .get(&id)
            .map(|j| j.status)
            .ok_or(WorkflowError::UnknownJob(id))?;
        if status == JobStatus::Processing {
            return Err(WorkflowError::JobProcessing(id));
        }
        self.jobs.remove(&id).ok_or(WorkflowError::UnknownJob(id))
    }
}

/// Playable outputs of completed jobs, addressed by handle.
#[derive(Debug, Default)]
pub struct AudioStore {
    next: u64,
    entries: HashMap<AudioHandle, Arc<[u8]>>,
}

impl AudioStore {
    pub fn insert(&mut self, bytes: Vec<u8>) -> AudioHandle {
        self.next += 1;
        let handle = AudioHandle(self.next);
        self.entries.insert(handle, Arc::from(bytes));
        handle
    }

    pub fn get(&self, handle: AudioHandle) -> Option<Arc<[u8]>> {
        self.entries.get(&handle).cloned()
    }

    pub fn release(&mut self, handle: AudioHandle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued_job(store: &mut JobStore, name: &str) -> JobId {
        let id = store.create(name, "Text.".to_string());
        store.mark_detected(id, CharacterMap::narrator_only("Kore")).unwrap();
        id
    }

    #[test]
    fn test_gender_parse_is_lenient() {
        assert_eq!(Gender::parse("Male"), Gender::Male);
        assert_eq!(Gender::parse(" female "), Gender::Female);
        assert_eq!(Gender::parse("Neutral"), Gender::Neutral);
        assert_eq!(Gender::parse("robot"), Gender::Neutral);
    }

    #[test]
    fn test_speakers_exclude_narrator() {
        let mut map = CharacterMap::narrator_only("Kore");
        map.insert("Alice", "Zephyr", Some(Gender::Female));
        map.insert("Bob", "Puck", Some(Gender::Male));

        assert_eq!(map.speakers(), vec![("Alice", "Zephyr"), ("Bob", "Puck")]);
        assert_eq!(map.voice_of(NARRATOR_KEY), Some("Kore"));
    }

    #[test]
    fn test_transition_table() {
        use JobStatus::*;
        assert!(Detecting.can_transition_to(Queued));
        assert!(Detecting.can_transition_to(Failed));
        assert!(Queued.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Queued));

        assert!(!Completed.can_transition_to(Queued));
        assert!(!Processing.can_transition_to(Queued));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Detecting.can_transition_to(Processing));
    }

    #[test]
    fn test_queue_order_follows_entry_order() {
        let mut store = JobStore::new();
        let a = store.create("a.txt", "A.".to_string());
        let b = queued_job(&mut store, "b.txt");
        store.mark_detected(a, CharacterMap::narrator_only("Kore")).unwrap();

        // b entered the queue before a
        assert_eq!(store.next_queued(), Some(b));
        store.start(b).unwrap();
        assert_eq!(store.next_queued(), Some(a));
        assert_eq!(store.queued_count(), 1);
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let mut store = JobStore::new();
        let id = store.create("a.txt", "A.".to_string());
        let err = store.start(id).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidTransition { from: JobStatus::Detecting, to: JobStatus::Processing, .. }
        ));
        assert_eq!(store.get(id).unwrap().status, JobStatus::Detecting);
    }

    #[test]
    fn test_edit_requeues_failed_job_and_keeps_narrator() {
        let mut store = JobStore::new();
        let id = store.create("a.txt", "A.".to_string());
        store
            .mark_detection_failed(id, CharacterMap::narrator_only("Kore"), "x".to_string())
            .unwrap();

        let err = store
            .edit_characters(id, |map| {
                map.characters.remove(NARRATOR_KEY);
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, WorkflowError::MissingNarrator));
        assert_eq!(store.get(id).unwrap().status, JobStatus::Failed);

        store
            .edit_characters(id, |map| {
                map.insert("Alice", "Zephyr", None);
                Ok(())
            })
            .unwrap();
        let job = store.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.error.is_none());
        assert_eq!(job.character_map.voice_of("Alice"), Some("Zephyr"));
    }

    #[test]
    fn test_edit_rejected_while_processing_or_completed() {
        let mut store = JobStore::new();
        let id = queued_job(&mut store, "a.txt");
        store.start(id).unwrap();
        assert!(store.edit_characters(id, |_| Ok(())).is_err());

        let mut audio = AudioStore::default();
        store.complete(id, audio.insert(vec![1, 2])).unwrap();
        assert!(store.edit_characters(id, |_| Ok(())).is_err());
    }

    #[test]
    fn test_remove_refuses_processing_job() {
        let mut store = JobStore::new();
        let id = queued_job(&mut store, "a.txt");
        store.start(id).unwrap();
        assert!(matches!(store.remove(id), Err(WorkflowError::JobProcessing(_))));

        store.fail(id, "boom".to_string()).unwrap();
        let removed = store.remove(id).unwrap();
        assert_eq!(removed.error.as_deref(), Some("boom"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_audio_store_release() {
        let mut audio = AudioStore::default();
        let h = audio.insert(vec![1, 2, 3]);
        assert_eq!(audio.get(h).as_deref(), Some(&[1u8, 2, 3][..]));
        assert!(audio.release(h));
        assert!(!audio.release(h));
        assert!(audio.get(h).is_none());
    }
}
