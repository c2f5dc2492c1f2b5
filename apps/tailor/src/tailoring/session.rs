//! The editor session: sole owner of the workflow, and the only place where
//! backend calls and draft persistence happen.
//!
//! The workflow lock is never held across a backend call. A transition locks,
//! takes a ticket, unlocks, awaits the backend, then locks again to apply the
//! result. The backend call and its completion run on a spawned task, so a
//! caller that goes away cannot leave the workflow in flight. Questions and
//! preview are persisted at those transitions; job post and answer edits go
//! through the draft store's debounced writes.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::answers::AnswerField;
use super::workflow::{Completion, JobPostChange, Workflow, WorkflowLimits, WorkflowSnapshot};
use crate::backend_client::{
    options_or_default, AnalyzeGapsRequest, GenerateRequest, ResumeApi,
};
use crate::drafts::DraftStore;
use crate::errors::AppError;

pub struct TailorSession {
    workflow: Arc<Mutex<Workflow>>,
    drafts: DraftStore,
    api: Arc<dyn ResumeApi>,
    user_id: String,
}

impl TailorSession {
    /// Loads the persisted draft and the link options. Neither failure is
    /// fatal: a broken draft starts cold, missing options use the defaults.
    pub async fn start(
        drafts: DraftStore,
        api: Arc<dyn ResumeApi>,
        user_id: String,
        limits: WorkflowLimits,
    ) -> Self {
        let draft = drafts.load().await.unwrap_or_else(|e| {
            warn!("Could not load draft, starting empty: {e}");
            Default::default()
        });

        let options = match api.fetch_options(&user_id).await {
            Ok(options) => options_or_default(options),
            Err(e) => {
                warn!("Could not fetch experience options, using defaults: {e}");
                options_or_default(Vec::new())
            }
        };

        let workflow = Workflow::restore(draft, options, limits);
        info!(
            "Session for '{user_id}' resumed at stage {:?}",
            workflow.stage()
        );

        Self {
            workflow: Arc::new(Mutex::new(workflow)),
            drafts,
            api,
            user_id,
        }
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot {
        self.workflow.lock().await.snapshot()
    }

    pub async fn set_job_post(&self, text: String) -> WorkflowSnapshot {
        let mut wf = self.workflow.lock().await;
        match wf.set_job_post(text) {
            JobPostChange::Unchanged => {}
            JobPostChange::Edited => self.drafts.save_job_post(wf.job_post()),
            // Nothing derived survives a cleared job post, on disk either.
            JobPostChange::Cleared => {
                if let Err(e) = self.drafts.save(&wf.draft_state()).await {
                    warn!("Could not persist cleared draft: {e}");
                }
            }
        }
        wf.snapshot()
    }

    /// Re-reads the link options, e.g. after a saved résumé renamed an
    /// experience. Rows without a link pick up the first option.
    pub async fn refresh_options(&self) -> WorkflowSnapshot {
        let options = match self.api.fetch_options(&self.user_id).await {
            Ok(options) => options_or_default(options),
            Err(e) => {
                warn!("Could not refresh experience options: {e}");
                return self.snapshot().await;
            }
        };

        let mut wf = self.workflow.lock().await;
        wf.answers_mut().set_options(options);
        if let Err(e) = self.drafts.save_answers(wf.answers().rows()) {
            warn!("Could not persist answers: {e}");
        }
        wf.snapshot()
    }

    pub async fn analyze(&self) -> Result<WorkflowSnapshot, AppError> {
        let ticket = {
            let mut wf = self.workflow.lock().await;
            let ticket = wf.begin_analysis()?;
            persist_analysis(&self.drafts, &wf).await;
            ticket
        };

        let request = AnalyzeGapsRequest {
            user_id: self.user_id.clone(),
            job_description: ticket.job_description.clone(),
        };
        let api = Arc::clone(&self.api);
        let workflow = Arc::clone(&self.workflow);
        let drafts = self.drafts.clone();

        let task = tokio::spawn(async move {
            let result = api
                .analyze_gaps(&request)
                .await
                .map_err(|e| e.to_string());

            let mut wf = workflow.lock().await;
            if wf.complete_analysis(ticket, result) == Completion::Applied {
                persist_analysis(&drafts, &wf).await;
            }
            wf.snapshot()
        });
        task.await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Gap analysis task failed: {e}")))
    }

    pub async fn generate(&self) -> Result<WorkflowSnapshot, AppError> {
        let ticket = {
            let mut wf = self.workflow.lock().await;
            wf.begin_generation()?
        };

        let request = GenerateRequest {
            user_id: self.user_id.clone(),
            job_description: ticket.job_description.clone(),
            answers: ticket.answers.clone(),
            questions: ticket.questions.clone(),
        };
        let api = Arc::clone(&self.api);
        let workflow = Arc::clone(&self.workflow);
        let drafts = self.drafts.clone();

        let task = tokio::spawn(async move {
            let result = api
                .generate_resume(&request)
                .await
                .map_err(|e| e.to_string());

            let mut wf = workflow.lock().await;
            if wf.complete_generation(ticket, result) == Completion::Applied {
                persist_preview(&drafts, &wf).await;
            }
            wf.snapshot()
        });
        task.await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Generation task failed: {e}")))
    }

    pub async fn add_answer_row(&self, question: usize) -> Result<WorkflowSnapshot, AppError> {
        self.edit_answers(|wf| wf.answers_mut().add_row(question))
            .await
    }

    pub async fn remove_answer_row(&self, question: usize) -> Result<WorkflowSnapshot, AppError> {
        self.edit_answers(|wf| wf.answers_mut().remove_row(question))
            .await
    }

    pub async fn set_answer_field(
        &self,
        question: usize,
        row: usize,
        field: AnswerField,
    ) -> Result<WorkflowSnapshot, AppError> {
        self.edit_answers(|wf| wf.answers_mut().set_field(question, row, field))
            .await
    }

    async fn edit_answers<F>(&self, edit: F) -> Result<WorkflowSnapshot, AppError>
    where
        F: FnOnce(&mut Workflow) -> Result<(), super::answers::AnswerError>,
    {
        let mut wf = self.workflow.lock().await;
        edit(&mut *wf).map_err(|e| AppError::NotFound(e.to_string()))?;
        self.drafts.save_answers(wf.answers().rows())?;
        Ok(wf.snapshot())
    }

    pub async fn toggle_preview_edit(&self) -> Result<WorkflowSnapshot, AppError> {
        let mut wf = self.workflow.lock().await;
        wf.toggle_edit()?;
        Ok(wf.snapshot())
    }

    pub async fn update_preview_edit(&self, text: String) -> Result<WorkflowSnapshot, AppError> {
        let mut wf = self.workflow.lock().await;
        wf.update_edit(text)?;
        Ok(wf.snapshot())
    }

    pub async fn save_preview_edit(&self) -> Result<WorkflowSnapshot, AppError> {
        let mut wf = self.workflow.lock().await;
        wf.save_edit()?;
        persist_preview(&self.drafts, &wf).await;
        Ok(wf.snapshot())
    }

    /// Clears the job post and everything derived from it, in memory and on
    /// disk. In-flight responses are dropped when they arrive.
    pub async fn reset(&self) -> Result<WorkflowSnapshot, AppError> {
        let mut wf = self.workflow.lock().await;
        wf.reset();
        self.drafts.clear().await?;
        info!("Session reset");
        Ok(wf.snapshot())
    }

    /// Session teardown: pending debounced writes are cancelled, not flushed.
    pub fn shutdown(&self) {
        self.drafts.shutdown();
    }
}

/// Transition-time persistence. A failed write is logged, never allowed to
/// strand the workflow in an in-flight stage.
async fn persist_analysis(drafts: &DraftStore, wf: &Workflow) {
    if let Err(e) = drafts.save_questions(wf.questions()).await {
        warn!("Could not persist questions: {e}");
    }
    let answers = match drafts.save_answers(wf.answers().rows()) {
        Ok(()) => drafts.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = answers {
        warn!("Could not persist answers: {e}");
    }
}

async fn persist_preview(drafts: &DraftStore, wf: &Workflow) {
    if let Err(e) = drafts.save_preview(wf.preview()).await {
        warn!("Could not persist preview: {e}");
    }
}
