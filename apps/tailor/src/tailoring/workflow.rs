//! Tailoring workflow state machine.
//!
//! ```text
//! Drafting ─► Analyzing ─► AwaitingAnswers ─► Generating ─► Previewing
//!                 │   ▲                           │   ▲         (edit mode)
//!                 ▼   │ retry                     ▼   │ retry
//!             AnalyzeFailed                   GenerateFailed
//! ```
//!
//! The machine is synchronous and owns no I/O. A transition that needs the
//! backend is split in two: `begin_*` checks the gate, moves to the in-flight
//! stage and hands out a ticket; `complete_*` applies the backend's answer.
//! Tickets carry the epoch they were issued for. `reset` bumps the epoch, so a
//! response that arrives after the user started over is reported as `Stale`
//! and never applied.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::answers::AnswerAggregator;
use crate::drafts::DraftState;
use crate::models::answer::AnswerMap;
use crate::models::question::GapQuestion;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Stage {
    Drafting,
    Analyzing,
    AnalyzeFailed { message: String },
    AwaitingAnswers,
    Generating,
    GenerateFailed { message: String },
    Previewing,
}

impl Stage {
    fn label(&self) -> &'static str {
        match self {
            Stage::Drafting => "drafting",
            Stage::Analyzing => "analyzing",
            Stage::AnalyzeFailed { .. } => "analyze_failed",
            Stage::AwaitingAnswers => "awaiting_answers",
            Stage::Generating => "generating",
            Stage::GenerateFailed { .. } => "generate_failed",
            Stage::Previewing => "previewing",
        }
    }

    fn in_flight(&self) -> bool {
        matches!(self, Stage::Analyzing | Stage::Generating)
    }
}

/// Soft refusals. A gate blocks a transition; it is not a failure state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Gate {
    #[error("Job post needs at least {required} characters (has {actual})")]
    JobPostTooShort { actual: usize, required: usize },

    #[error("{0} is already in progress")]
    InFlight(&'static str),

    #[error("Questions still need an answer: {0:?}")]
    Unanswered(Vec<usize>),

    #[error("Cannot {action} while {stage}")]
    WrongStage {
        action: &'static str,
        stage: &'static str,
    },

    #[error("There is no preview to edit")]
    NoPreview,

    #[error("The preview is not being edited")]
    NotEditing,

    #[error("The preview has unsaved edits; save or cancel them first")]
    UnsavedEdit,
}

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error(transparent)]
    Gate(#[from] Gate),

    #[error("Invalid JSON: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Stale,
}

/// What a job post edit did to the derived state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPostChange {
    Unchanged,
    Edited,
    /// Questions, answers and preview were discarded.
    Cleared,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkflowLimits {
    pub min_job_post_chars: usize,
    pub min_answer_chars: usize,
}

impl Default for WorkflowLimits {
    fn default() -> Self {
        Self {
            min_job_post_chars: 240,
            min_answer_chars: 8,
        }
    }
}

#[derive(Debug)]
pub struct AnalyzeTicket {
    epoch: u64,
    pub request_id: Uuid,
    pub job_description: String,
}

#[derive(Debug)]
pub struct GenerateTicket {
    epoch: u64,
    pub request_id: Uuid,
    pub job_description: String,
    pub answers: AnswerMap,
    pub questions: Vec<GapQuestion>,
}

/// Raw-text edit of the preview. `error` holds the last rejected save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewEdit {
    pub buffer: String,
    pub error: Option<String>,
}

/// Read-only view of the session for the editor.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSnapshot {
    pub stage: Stage,
    pub job_post: String,
    pub job_post_chars: usize,
    pub job_post_words: usize,
    pub min_job_post_chars: usize,
    pub can_analyze: bool,
    pub questions: Vec<GapQuestion>,
    pub answers: AnswerMap,
    pub unanswered: Vec<usize>,
    pub can_generate: bool,
    pub options: Vec<String>,
    pub preview: Option<Value>,
    pub editing: Option<PreviewEdit>,
}

#[derive(Debug)]
pub struct Workflow {
    stage: Stage,
    job_post: String,
    questions: Vec<GapQuestion>,
    answers: AnswerAggregator,
    preview: Option<Value>,
    edit: Option<PreviewEdit>,
    epoch: u64,
    limits: WorkflowLimits,
}

impl Workflow {
    pub fn new(options: Vec<String>, limits: WorkflowLimits) -> Self {
        Self {
            stage: Stage::Drafting,
            job_post: String::new(),
            questions: Vec::new(),
            answers: AnswerAggregator::new(options, limits.min_answer_chars),
            preview: None,
            edit: None,
            epoch: 0,
            limits,
        }
    }

    /// Resumes from persisted draft records.
    pub fn restore(draft: DraftState, options: Vec<String>, limits: WorkflowLimits) -> Self {
        let mut wf = Self::new(options, limits);
        wf.job_post = draft.job_post;
        wf.answers.restore(draft.answers, &draft.questions);
        wf.questions = draft.questions;
        wf.preview = draft.preview;
        wf.stage = if wf.preview.is_some() {
            Stage::Previewing
        } else if !wf.questions.is_empty() {
            Stage::AwaitingAnswers
        } else {
            Stage::Drafting
        };
        wf
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn job_post(&self) -> &str {
        &self.job_post
    }

    pub fn questions(&self) -> &[GapQuestion] {
        &self.questions
    }

    pub fn answers(&self) -> &AnswerAggregator {
        &self.answers
    }

    pub fn answers_mut(&mut self) -> &mut AnswerAggregator {
        &mut self.answers
    }

    pub fn preview(&self) -> Option<&Value> {
        self.preview.as_ref()
    }

    pub fn draft_state(&self) -> DraftState {
        DraftState {
            job_post: self.job_post.clone(),
            questions: self.questions.clone(),
            answers: self.answers.rows().clone(),
            preview: self.preview.clone(),
        }
    }

    /// The job post may be edited in any stage. Clearing it discards everything
    /// derived from it. Changing it while a request is in flight makes that
    /// request stale: an analysis falls back to Drafting, a generation to
    /// AwaitingAnswers with the answers intact.
    pub fn set_job_post(&mut self, text: String) -> JobPostChange {
        if text == self.job_post {
            return JobPostChange::Unchanged;
        }
        self.job_post = text;

        if self.job_post.trim().is_empty() {
            self.epoch += 1;
            self.questions.clear();
            self.answers.clear();
            self.preview = None;
            self.edit = None;
            self.stage = Stage::Drafting;
            info!("Job post cleared, derived state discarded");
            return JobPostChange::Cleared;
        }

        match self.stage {
            Stage::Analyzing => {
                self.epoch += 1;
                self.stage = Stage::Drafting;
                info!("Job post changed during analysis, response will be ignored");
            }
            Stage::Generating => {
                self.epoch += 1;
                self.stage = Stage::AwaitingAnswers;
                info!("Job post changed during generation, response will be ignored");
            }
            _ => {}
        }
        JobPostChange::Edited
    }

    fn job_post_chars(&self) -> usize {
        self.job_post.chars().count()
    }

    pub fn check_analysis(&self) -> Result<(), Gate> {
        if self.stage.in_flight() {
            return Err(Gate::InFlight(self.stage.label()));
        }
        if self.edit.is_some() {
            return Err(Gate::UnsavedEdit);
        }
        let actual = self.job_post_chars();
        if actual < self.limits.min_job_post_chars {
            return Err(Gate::JobPostTooShort {
                actual,
                required: self.limits.min_job_post_chars,
            });
        }
        Ok(())
    }

    /// Drafting/AnalyzeFailed/... → Analyzing. Questions and answers tied to
    /// the previous analysis are discarded.
    pub fn begin_analysis(&mut self) -> Result<AnalyzeTicket, Gate> {
        self.check_analysis()?;

        self.epoch += 1;
        self.questions.clear();
        self.answers.clear();
        self.stage = Stage::Analyzing;

        let ticket = AnalyzeTicket {
            epoch: self.epoch,
            request_id: Uuid::new_v4(),
            job_description: self.job_post.clone(),
        };
        info!(request_id = %ticket.request_id, "Gap analysis started");
        Ok(ticket)
    }

    pub fn complete_analysis(
        &mut self,
        ticket: AnalyzeTicket,
        result: Result<Vec<GapQuestion>, String>,
    ) -> Completion {
        if ticket.epoch != self.epoch || self.stage != Stage::Analyzing {
            warn!(request_id = %ticket.request_id, "Discarding stale gap analysis response");
            return Completion::Stale;
        }

        match result {
            Ok(questions) => {
                info!(
                    request_id = %ticket.request_id,
                    "Gap analysis returned {} questions",
                    questions.len()
                );
                self.answers.rebuild(&questions);
                self.questions = questions;
                self.stage = Stage::AwaitingAnswers;
            }
            Err(message) => {
                warn!(request_id = %ticket.request_id, "Gap analysis failed: {message}");
                self.stage = Stage::AnalyzeFailed { message };
            }
        }
        Completion::Applied
    }

    pub fn check_generation(&self) -> Result<(), Gate> {
        match &self.stage {
            Stage::AwaitingAnswers | Stage::GenerateFailed { .. } | Stage::Previewing => {}
            stage if stage.in_flight() => return Err(Gate::InFlight(stage.label())),
            stage => {
                return Err(Gate::WrongStage {
                    action: "generate",
                    stage: stage.label(),
                })
            }
        }
        if self.edit.is_some() {
            return Err(Gate::UnsavedEdit);
        }
        let unanswered = self.answers.unanswered(self.questions.len());
        if !unanswered.is_empty() {
            return Err(Gate::Unanswered(unanswered));
        }
        Ok(())
    }

    /// AwaitingAnswers/GenerateFailed/Previewing → Generating.
    pub fn begin_generation(&mut self) -> Result<GenerateTicket, Gate> {
        self.check_generation()?;

        self.stage = Stage::Generating;

        let ticket = GenerateTicket {
            epoch: self.epoch,
            request_id: Uuid::new_v4(),
            job_description: self.job_post.clone(),
            answers: self.answers.rows().clone(),
            questions: self.questions.clone(),
        };
        info!(request_id = %ticket.request_id, "Resume generation started");
        Ok(ticket)
    }

    pub fn complete_generation(
        &mut self,
        ticket: GenerateTicket,
        result: Result<Value, String>,
    ) -> Completion {
        if ticket.epoch != self.epoch || self.stage != Stage::Generating {
            warn!(request_id = %ticket.request_id, "Discarding stale generation response");
            return Completion::Stale;
        }

        match result {
            Ok(document) => {
                info!(request_id = %ticket.request_id, "Tailored resume generated");
                self.preview = Some(document);
                self.stage = Stage::Previewing;
            }
            Err(message) => {
                warn!(request_id = %ticket.request_id, "Generation failed: {message}");
                self.stage = Stage::GenerateFailed { message };
            }
        }
        Completion::Applied
    }

    /// Enters edit mode with the preview as pretty JSON, or cancels the edit.
    /// Returns whether edit mode is now active.
    pub fn toggle_edit(&mut self) -> Result<bool, Gate> {
        if self.stage != Stage::Previewing {
            return Err(Gate::WrongStage {
                action: "edit the preview",
                stage: self.stage.label(),
            });
        }
        let preview = self.preview.as_ref().ok_or(Gate::NoPreview)?;

        if self.edit.take().is_some() {
            return Ok(false);
        }
        let buffer = serde_json::to_string_pretty(preview).unwrap_or_else(|_| preview.to_string());
        self.edit = Some(PreviewEdit {
            buffer,
            error: None,
        });
        Ok(true)
    }

    pub fn update_edit(&mut self, text: String) -> Result<(), Gate> {
        let edit = self.edit.as_mut().ok_or(Gate::NotEditing)?;
        edit.buffer = text;
        Ok(())
    }

    /// Parses the edit buffer into the preview. On a parse failure the preview
    /// is untouched and edit mode stays active with the error recorded.
    pub fn save_edit(&mut self) -> Result<(), EditError> {
        let edit = self.edit.as_mut().ok_or(Gate::NotEditing)?;
        match serde_json::from_str::<Value>(&edit.buffer) {
            Ok(document) => {
                self.preview = Some(document);
                self.edit = None;
                info!("Preview replaced from edited JSON");
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                edit.error = Some(message.clone());
                Err(EditError::Parse(message))
            }
        }
    }

    /// Starts over. Any in-flight response becomes stale.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.job_post.clear();
        self.questions.clear();
        self.answers.clear();
        self.preview = None;
        self.edit = None;
        self.stage = Stage::Drafting;
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            stage: self.stage.clone(),
            job_post: self.job_post.clone(),
            job_post_chars: self.job_post_chars(),
            job_post_words: self.job_post.split_whitespace().count(),
            min_job_post_chars: self.limits.min_job_post_chars,
            can_analyze: self.check_analysis().is_ok(),
            questions: self.questions.clone(),
            answers: self.answers.rows().clone(),
            unanswered: self.answers.unanswered(self.questions.len()),
            can_generate: self.check_generation().is_ok(),
            options: self.answers.options().to_vec(),
            preview: self.preview.clone(),
            editing: self.edit.clone(),
        }
    }
}
