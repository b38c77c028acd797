use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::catalog::ServiceType;
use crate::error::AppError;
use crate::models::SetlistFields;

use super::{SelectionError, SetlistComposer};

pub const SETLISTS_PATH: &str = "/dashboard/setlists";

const REQUIRED_FIELDS_MESSAGE: &str = "Por favor completa todos los campos requeridos";
const NO_SONGS_MESSAGE: &str = "Debes seleccionar al menos una canción";
const SAVE_FAILED_MESSAGE: &str = "Ocurrió un error al guardar la lista";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    Validating,
    Persisting,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Side effects a submission needs from whoever drives it: a transient notice
/// and a navigation request.
pub trait Feedback {
    fn notify(&mut self, message: &str, kind: NoticeKind);

    fn navigate(&mut self, path: &str, delay: Duration);
}

/// Persistence seam for setlists. Each call must apply all of its writes or none.
#[rocket::async_trait]
pub trait SetlistStore: Send + Sync {
    /// Inserts the setlist and its serialized songs, returning the new id.
    async fn create_setlist(
        &self,
        leader_id: i64,
        fields: &SetlistFields,
        composer: &SetlistComposer,
    ) -> Result<i64, AppError>;

    /// Updates the setlist row and replaces every song row with the composer's order.
    async fn update_setlist(
        &self,
        setlist_id: i64,
        fields: &SetlistFields,
        composer: &SetlistComposer,
    ) -> Result<(), AppError>;
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("{message}")]
    Invalid {
        field: &'static str,
        message: String,
    },

    #[error(transparent)]
    Store(#[from] AppError),

    #[error("Submission already completed")]
    AlreadySubmitted,
}

impl From<SelectionError> for SubmissionError {
    fn from(err: SelectionError) -> Self {
        SubmissionError::Invalid {
            field: err.field(),
            message: err.to_string(),
        }
    }
}

/// Raw form input, as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct SetlistForm {
    pub name: String,
    pub date: String,
    pub service_type: String,
    pub notes: Option<String>,
}

impl SetlistForm {
    pub fn validate(&self, composer: &SetlistComposer) -> Result<SetlistFields, SubmissionError> {
        let name = self.name.trim();
        let date = self.date.trim();
        let service_type = self.service_type.trim();

        let missing = [
            ("name", name),
            ("date", date),
            ("service_type", service_type),
        ]
        .into_iter()
        .find(|(_, value)| value.is_empty());

        if let Some((field, _)) = missing {
            return Err(SubmissionError::Invalid {
                field,
                message: REQUIRED_FIELDS_MESSAGE.to_string(),
            });
        }

        if composer.is_empty() {
            return Err(SubmissionError::Invalid {
                field: "song_ids",
                message: NO_SONGS_MESSAGE.to_string(),
            });
        }

        let date =
            NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| SubmissionError::Invalid {
                field: "date",
                message: "La fecha no es válida".to_string(),
            })?;

        let service_type =
            ServiceType::from_str(service_type).map_err(|_| SubmissionError::Invalid {
                field: "service_type",
                message: "La reunión seleccionada no es válida".to_string(),
            })?;

        let notes = self
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
            .map(String::from);

        Ok(SetlistFields {
            name: name.to_string(),
            date,
            service_type,
            notes,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionTarget {
    Create { leader_id: i64 },
    Update { setlist_id: i64 },
}

/// Drives one setlist form submission through
/// `Idle -> Validating -> Persisting -> Done | Failed`.
#[derive(Debug)]
pub struct SetlistSubmission {
    target: SubmissionTarget,
    state: SubmissionState,
    redirect_delay: Duration,
}

impl SetlistSubmission {
    pub fn new(target: SubmissionTarget, redirect_delay: Duration) -> Self {
        Self {
            target,
            state: SubmissionState::Idle,
            redirect_delay,
        }
    }

    pub fn create(leader_id: i64, redirect_delay: Duration) -> Self {
        Self::new(SubmissionTarget::Create { leader_id }, redirect_delay)
    }

    pub fn update(setlist_id: i64, redirect_delay: Duration) -> Self {
        Self::new(SubmissionTarget::Update { setlist_id }, redirect_delay)
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Failures notify, then leave the submission back in `Idle` so the user
    /// can correct the form and resubmit.
    #[instrument(skip_all, fields(target = ?self.target))]
    pub async fn submit<S, F>(
        &mut self,
        form: &SetlistForm,
        composer: &SetlistComposer,
        store: &S,
        feedback: &mut F,
    ) -> Result<i64, SubmissionError>
    where
        S: SetlistStore + ?Sized,
        F: Feedback + Send,
    {
        if self.state == SubmissionState::Done {
            return Err(SubmissionError::AlreadySubmitted);
        }

        self.state = SubmissionState::Validating;
        let fields = match form.validate(composer) {
            Ok(fields) => fields,
            Err(err) => {
                warn!(error = %err, "Setlist form rejected");
                return Err(self.fail(err, feedback));
            }
        };

        self.state = SubmissionState::Persisting;
        let persisted = match self.target {
            SubmissionTarget::Create { leader_id } => {
                store.create_setlist(leader_id, &fields, composer).await
            }
            SubmissionTarget::Update { setlist_id } => store
                .update_setlist(setlist_id, &fields, composer)
                .await
                .map(|_| setlist_id),
        };

        match persisted {
            Ok(setlist_id) => {
                self.state = SubmissionState::Done;
                info!(setlist_id, songs = composer.len(), "Setlist saved");

                let message = match self.target {
                    SubmissionTarget::Create { .. } => "Lista creada correctamente",
                    SubmissionTarget::Update { .. } => "Lista actualizada correctamente",
                };
                feedback.notify(message, NoticeKind::Success);
                feedback.navigate(SETLISTS_PATH, self.redirect_delay);

                Ok(setlist_id)
            }
            Err(err) => {
                error!(error = %err, "Error saving setlist");
                Err(self.fail(SubmissionError::Store(err), feedback))
            }
        }
    }

    fn fail<F: Feedback>(&mut self, err: SubmissionError, feedback: &mut F) -> SubmissionError {
        self.state = SubmissionState::Failed;

        let message = match &err {
            SubmissionError::Invalid { message, .. } => message.clone(),
            SubmissionError::Store(AppError::NotFound(msg)) => msg.clone(),
            SubmissionError::Store(_) | SubmissionError::AlreadySubmitted => {
                SAVE_FAILED_MESSAGE.to_string()
            }
        };
        feedback.notify(&message, NoticeKind::Error);

        self.state = SubmissionState::Idle;
        err
    }
}
