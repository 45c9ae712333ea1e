//! Application session: the single owner of a visa application's state
//!
//! All reads and writes go through [`ApplicationSession`]. Calls to the
//! resolver and extractor suspend without holding the state lock; the wizard
//! rejects overlapping stage changes, and a reset (or abandoned selection)
//! cancels the outstanding call so its result is never applied.

use crate::catalog::FormCatalog;
use crate::error::{ExtractionError, SessionError};
use crate::extractor::{CandidateFields, FieldExtractor};
use crate::merge::merge;
use crate::state::{
    DocumentId, FormField, FormFieldValues, FormSummary, JurisdictionVisaType, NewDocument,
    RequiredForm, Selection, StepProgress, Transition, UploadedDocument, Wizard, WizardOperation,
    WizardStage,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Behaviour switches for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Refuse to finalize while any declared field is empty
    pub require_complete_forms: bool,
}

/// Finalization output, handed to an external renderer or exporter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalizedApplication {
    pub jurisdiction: String,
    pub visa_type: String,
    pub completed_at: DateTime<Utc>,
    pub summary: Vec<FormSummary>,
    pub forms: FormFieldValues,
}

/// Observable session state, comparable across sessions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub stage: WizardStage,
    pub in_flight: Option<WizardOperation>,
    pub selection: Selection,
    pub application: Option<JurisdictionVisaType>,
    pub documents: Vec<UploadedDocument>,
    pub required_forms: Vec<RequiredForm>,
    pub field_values: Option<FormFieldValues>,
}

/// Identifies the session epoch an outstanding call was started in
struct Ticket {
    generation: u64,
    token: CancellationToken,
}

#[derive(Debug)]
struct SessionState {
    selection: Selection,
    /// Fixed at the Select -> Upload transition
    application: Option<JurisdictionVisaType>,
    wizard: Wizard,
    documents: Vec<UploadedDocument>,
    forms: Vec<RequiredForm>,
    values: Option<FormFieldValues>,
    generation: u64,
    cancel: CancellationToken,
}

impl SessionState {
    fn new(generation: u64) -> Self {
        Self {
            selection: Selection::default(),
            application: None,
            wizard: Wizard::default(),
            documents: Vec::new(),
            forms: Vec::new(),
            values: None,
            generation,
            cancel: CancellationToken::new(),
        }
    }

    fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
            token: self.cancel.clone(),
        }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.generation == ticket.generation
    }

    /// Cancel any outstanding call and start a new epoch
    fn invalidate(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.generation += 1;
    }

    /// Release the wizard claim and take the transition
    fn finish(&mut self, transition: Transition) -> Result<WizardStage, SessionError> {
        self.wizard.end();
        self.wizard.advance(transition)
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            stage: self.wizard.stage(),
            in_flight: self.wizard.in_flight(),
            selection: self.selection.clone(),
            application: self.application.clone(),
            documents: self.documents.clone(),
            required_forms: self.forms.clone(),
            field_values: self.values.clone(),
        }
    }
}

/// Wizard claim held across a resolver or extractor call.
///
/// Dropped while armed (the caller abandoned the call), it releases the claim
/// and returns Processing to Upload, unless the session has since moved to a
/// new generation.
struct InFlightGuard<'a> {
    session: &'a ApplicationSession,
    operation: WizardOperation,
    generation: u64,
    armed: bool,
}

impl InFlightGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.session.state();
        if state.generation != self.generation {
            return;
        }
        tracing::warn!(operation = %self.operation, "call dropped before completion, releasing session");
        state.wizard.end();
        if state.wizard.stage() == WizardStage::Processing {
            state.values = None;
            if let Err(err) = state.wizard.advance(Transition::ProcessingFailed) {
                tracing::error!(error = %err, "cannot leave processing");
            }
        }
    }
}

async fn until_cancelled<T>(token: &CancellationToken, work: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        _ = token.cancelled() => None,
        out = work => Some(out),
    }
}

/// One user's visa application workflow
pub struct ApplicationSession {
    catalog: Arc<dyn FormCatalog>,
    extractor: Arc<dyn FieldExtractor>,
    options: SessionOptions,
    inner: Mutex<SessionState>,
}

impl ApplicationSession {
    pub fn new(catalog: Arc<dyn FormCatalog>, extractor: Arc<dyn FieldExtractor>) -> Self {
        Self {
            catalog,
            extractor,
            options: SessionOptions::default(),
            inner: Mutex::new(SessionState::new(0)),
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn guard(&self, operation: WizardOperation, ticket: &Ticket) -> InFlightGuard<'_> {
        InFlightGuard {
            session: self,
            operation,
            generation: ticket.generation,
            armed: true,
        }
    }

    // ----- selection -----

    /// Choose the destination. A different jurisdiction clears the visa type.
    pub fn select_jurisdiction(&self, code: &str) -> Result<(), SessionError> {
        let mut state = self.state();
        Self::ensure_selecting(&state, "select jurisdiction")?;
        let before = state.selection.clone();
        if state.selection.select_jurisdiction(code) {
            tracing::debug!(jurisdiction = code, "jurisdiction changed, visa type cleared");
        }
        if state.selection != before {
            Self::abandon_resolution(&mut state);
        }
        Ok(())
    }

    pub fn select_visa_type(&self, label: &str) -> Result<(), SessionError> {
        let mut state = self.state();
        Self::ensure_selecting(&state, "select visa type")?;
        let before = state.selection.clone();
        state.selection.select_visa_type(label)?;
        if state.selection != before {
            Self::abandon_resolution(&mut state);
        }
        Ok(())
    }

    fn ensure_selecting(state: &SessionState, operation: &'static str) -> Result<(), SessionError> {
        let stage = state.wizard.stage();
        if stage != WizardStage::Select {
            return Err(SessionError::InvalidStage { operation, stage });
        }
        Ok(())
    }

    fn abandon_resolution(state: &mut SessionState) {
        if state.wizard.in_flight() == Some(WizardOperation::BeginUpload) {
            tracing::info!("selection changed, abandoning form resolution");
            state.invalidate();
            state.wizard.end();
        }
    }

    // ----- stage changes -----

    /// Resolve the required forms for the current selection and move to Upload
    pub async fn begin_upload(&self) -> Result<Vec<RequiredForm>, SessionError> {
        let (pair, ticket) = {
            let mut state = self.state();
            state.wizard.begin(WizardOperation::BeginUpload)?;
            let Some(pair) = state.selection.complete() else {
                state.wizard.end();
                return Err(SessionError::IncompleteSelection);
            };
            (pair, state.ticket())
        };

        tracing::info!(
            jurisdiction = %pair.jurisdiction,
            visa_type = %pair.visa_type,
            "fetching required forms"
        );
        let mut guard = self.guard(WizardOperation::BeginUpload, &ticket);
        let resolved = until_cancelled(
            &ticket.token,
            self.catalog.resolve(&pair.jurisdiction, &pair.visa_type),
        )
        .await;
        guard.disarm();

        let mut state = self.state();
        let Some(resolved) = resolved.filter(|_| state.is_current(&ticket)) else {
            tracing::warn!("discarding form resolution from an abandoned selection");
            return Err(SessionError::Cancelled);
        };

        match resolved {
            Ok(forms) => {
                state.forms = forms.clone();
                state.application = Some(pair);
                state.finish(Transition::FormsResolved)?;
                Ok(forms)
            }
            Err(err) => {
                state.wizard.end();
                tracing::warn!(error = %err, "form resolution failed");
                Err(err.into())
            }
        }
    }

    /// Extract candidates from the uploaded documents and merge them into every form.
    ///
    /// On `ExtractionUnavailable` the session returns to Upload with no field values.
    pub async fn begin_processing(&self) -> Result<FormFieldValues, SessionError> {
        let (documents, forms, ticket) = {
            let mut state = self.state();
            state.wizard.begin(WizardOperation::BeginProcessing)?;
            if state.documents.is_empty() {
                state.wizard.end();
                return Err(SessionError::NoDocumentsUploaded);
            }
            state.wizard.advance(Transition::ProcessingStarted)?;
            tracing::info!(
                documents = state.documents.len(),
                forms = state.forms.len(),
                "processing documents"
            );
            (state.documents.clone(), state.forms.clone(), state.ticket())
        };

        let mut guard = self.guard(WizardOperation::BeginProcessing, &ticket);
        let extracted = until_cancelled(&ticket.token, self.extractor.extract(&documents)).await;
        guard.disarm();

        let mut state = self.state();
        let Some(extracted) = extracted.filter(|_| state.is_current(&ticket)) else {
            tracing::warn!("discarding extraction result from a reset session");
            return Err(SessionError::Cancelled);
        };

        let candidates = match extracted {
            Ok(candidates) => candidates,
            Err(ExtractionError::NoExtractableContent) => {
                tracing::warn!("no extractable content, continuing with empty forms");
                CandidateFields::new()
            }
            Err(err) => {
                tracing::warn!(error = %err, "extraction failed, returning to upload");
                state.values = None;
                state.finish(Transition::ProcessingFailed)?;
                return Err(err.into());
            }
        };

        match merge(&forms, &candidates) {
            Ok(values) => {
                state.values = Some(values.clone());
                state.finish(Transition::ProcessingSucceeded)?;
                Ok(values)
            }
            Err(err) => {
                tracing::error!(error = %err, "resolved form list cannot be merged");
                state.values = None;
                state.finish(Transition::ProcessingFailed)?;
                Err(err.into())
            }
        }
    }

    /// Commit the current field values and move to Complete
    pub fn finalize(&self) -> Result<FinalizedApplication, SessionError> {
        let mut state = self.state();
        state.wizard.begin(WizardOperation::Finalize)?;

        let (Some(values), Some(application)) = (state.values.clone(), state.application.clone())
        else {
            state.wizard.end();
            tracing::error!("session in review without field values");
            return Err(SessionError::InvalidStage {
                operation: WizardOperation::Finalize.name(),
                stage: state.wizard.stage(),
            });
        };

        if self.options.require_complete_forms {
            let missing = values.missing_fields();
            if !missing.is_empty() {
                state.wizard.end();
                tracing::warn!(missing = missing.len(), "refusing to finalize incomplete forms");
                return Err(SessionError::IncompleteForms(missing));
            }
        }

        state.finish(Transition::Finalized)?;
        let summary = values.summary();
        tracing::info!(
            forms = summary.len(),
            complete = summary.iter().filter(|form| form.is_complete()).count(),
            "application finalized"
        );
        Ok(FinalizedApplication {
            jurisdiction: application.jurisdiction,
            visa_type: application.visa_type,
            completed_at: Utc::now(),
            summary,
            forms: values,
        })
    }

    /// Return to a freshly created state from any stage, discarding outstanding results
    pub fn reset(&self) {
        let mut state = self.state();
        state.cancel.cancel();
        let generation = state.generation + 1;
        *state = SessionState::new(generation);
        tracing::info!("session reset");
    }

    // ----- documents -----

    pub fn add_documents(&self, files: Vec<NewDocument>) -> Result<Vec<DocumentId>, SessionError> {
        let mut state = self.state();
        state
            .wizard
            .ensure_idle_in(WizardStage::Upload, "add documents")?;

        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let document = UploadedDocument::upload(file);
            if !document.kind.is_allowed() {
                tracing::warn!(
                    document = %document.display_name,
                    "unrecognized file type, accepting anyway"
                );
            }
            tracing::debug!(
                id = %document.id,
                document = %document.display_name,
                bytes = document.content().len(),
                "document uploaded"
            );
            ids.push(document.id);
            state.documents.push(document);
        }
        Ok(ids)
    }

    /// Remove a document. Unknown ids are a no-op and return `None`.
    pub fn remove_document(&self, id: DocumentId) -> Result<Option<UploadedDocument>, SessionError> {
        let mut state = self.state();
        state
            .wizard
            .ensure_idle_in(WizardStage::Upload, "remove document")?;

        let Some(position) = state.documents.iter().position(|d| d.id == id) else {
            tracing::debug!(%id, "remove of unknown document ignored");
            return Ok(None);
        };
        Ok(Some(state.documents.remove(position).mark_removed()))
    }

    // ----- review -----

    /// Overwrite one field with a user edit
    pub fn edit_field(
        &self,
        form_name: &str,
        field_id: &str,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        let mut state = self.state();
        state.wizard.ensure_idle_in(WizardStage::Review, "edit field")?;
        let stage = state.wizard.stage();
        let values = state.values.as_mut().ok_or(SessionError::InvalidStage {
            operation: "edit field",
            stage,
        })?;

        if let Err(err) = values.set(form_name, field_id, value.into()) {
            tracing::error!(error = %err, "edit outside the resolved schema");
            return Err(err);
        }
        Ok(())
    }

    /// Read one field during Review or after completion
    pub fn field(&self, form_name: &str, field_id: &str) -> Result<FormField, SessionError> {
        let state = self.state();
        let values = state.values.as_ref().ok_or(SessionError::InvalidStage {
            operation: "read field",
            stage: state.wizard.stage(),
        })?;
        values.get(form_name, field_id).cloned()
    }

    // ----- accessors -----

    pub fn stage(&self) -> WizardStage {
        self.state().wizard.stage()
    }

    pub fn in_flight(&self) -> Option<WizardOperation> {
        self.state().wizard.in_flight()
    }

    pub fn selection(&self) -> Selection {
        self.state().selection.clone()
    }

    pub fn documents(&self) -> Vec<UploadedDocument> {
        self.state().documents.clone()
    }

    pub fn required_forms(&self) -> Vec<RequiredForm> {
        self.state().forms.clone()
    }

    pub fn field_values(&self) -> Option<FormFieldValues> {
        self.state().values.clone()
    }

    pub fn summary(&self) -> Option<Vec<FormSummary>> {
        self.state().values.as_ref().map(FormFieldValues::summary)
    }

    pub fn progress(&self) -> Vec<StepProgress> {
        self.state().wizard.progress()
    }

    /// Human-readable description of the outstanding work, if any
    pub fn status_message(&self) -> Option<String> {
        let state = self.state();
        match (state.wizard.stage(), state.wizard.in_flight()) {
            (WizardStage::Select, Some(WizardOperation::BeginUpload)) => {
                Some("Fetching required forms...".to_string())
            }
            (WizardStage::Processing, _) => Some(format!(
                "Processing {} document(s) and filling {} form(s)",
                state.documents.len(),
                state.forms.len()
            )),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MockFormCatalog, StaticCatalog};
    use crate::error::{CatalogError, ErrorCategory, MergeError};
    use crate::extractor::{candidates, MockFieldExtractor};
    use crate::state::DocumentStatus;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    const CANADA: &str = "Canada";
    const VISITOR: &str = "Visitor Visa (TRV)";

    /// Lets a test observe that a call has started and decide when it returns
    #[derive(Default)]
    struct Gate {
        entered: Notify,
        release: Notify,
    }

    impl Gate {
        async fn pass(&self) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }

    struct GatedExtractor {
        gate: Arc<Gate>,
        result: Result<CandidateFields, ExtractionError>,
    }

    #[async_trait]
    impl FieldExtractor for GatedExtractor {
        async fn extract(
            &self,
            _documents: &[UploadedDocument],
        ) -> Result<CandidateFields, ExtractionError> {
            self.gate.pass().await;
            self.result.clone()
        }
    }

    struct GatedCatalog {
        gate: Arc<Gate>,
        inner: StaticCatalog,
    }

    #[async_trait]
    impl FormCatalog for GatedCatalog {
        async fn jurisdictions(&self) -> Result<Vec<crate::catalog::Jurisdiction>, CatalogError> {
            self.inner.jurisdictions().await
        }

        async fn resolve(
            &self,
            jurisdiction: &str,
            visa_type: &str,
        ) -> Result<Vec<RequiredForm>, CatalogError> {
            self.gate.pass().await;
            self.inner.resolve(jurisdiction, visa_type).await
        }
    }

    /// Collaborator whose calls never complete
    struct Stalled;

    #[async_trait]
    impl FieldExtractor for Stalled {
        async fn extract(
            &self,
            _documents: &[UploadedDocument],
        ) -> Result<CandidateFields, ExtractionError> {
            std::future::pending().await
        }
    }

    #[async_trait]
    impl FormCatalog for Stalled {
        async fn jurisdictions(&self) -> Result<Vec<crate::catalog::Jurisdiction>, CatalogError> {
            std::future::pending().await
        }

        async fn resolve(
            &self,
            _jurisdiction: &str,
            _visa_type: &str,
        ) -> Result<Vec<RequiredForm>, CatalogError> {
            std::future::pending().await
        }
    }

    const GIVE_UP: Duration = Duration::from_millis(50);

    fn extractor_returning(
        result: Result<CandidateFields, ExtractionError>,
    ) -> Arc<dyn FieldExtractor> {
        let mut extractor = MockFieldExtractor::new();
        extractor
            .expect_extract()
            .times(1)
            .returning(move |_| result.clone());
        Arc::new(extractor)
    }

    fn unused_extractor() -> Arc<dyn FieldExtractor> {
        let mut extractor = MockFieldExtractor::new();
        extractor.expect_extract().never();
        Arc::new(extractor)
    }

    fn session_with(extractor: Arc<dyn FieldExtractor>) -> ApplicationSession {
        ApplicationSession::new(Arc::new(StaticCatalog::builtin()), extractor)
    }

    fn passport() -> Vec<NewDocument> {
        vec![NewDocument::new("passport.pdf", "passport scan")]
    }

    async fn session_in_upload(extractor: Arc<dyn FieldExtractor>) -> ApplicationSession {
        let session = session_with(extractor);
        session.select_jurisdiction(CANADA).unwrap();
        session.select_visa_type(VISITOR).unwrap();
        session.begin_upload().await.unwrap();
        session
    }

    async fn session_in_review() -> ApplicationSession {
        let session = session_in_upload(extractor_returning(Ok(candidates([
            ("fullName", "John Smith"),
            ("passportNumber", "US123456789"),
        ]))))
        .await;
        session.add_documents(passport()).unwrap();
        session.begin_processing().await.unwrap();
        session
    }

    fn fresh_snapshot() -> SessionSnapshot {
        session_with(unused_extractor()).snapshot()
    }

    mod selection {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_visa_type_needs_jurisdiction() {
            let session = session_with(unused_extractor());
            assert_eq!(
                session.select_visa_type(VISITOR),
                Err(SessionError::JurisdictionNotSelected)
            );
        }

        #[test]
        fn test_new_jurisdiction_clears_visa_type() {
            let session = session_with(unused_extractor());
            session.select_jurisdiction("CA").unwrap();
            session.select_visa_type("Work Permit").unwrap();
            session.select_jurisdiction("UK").unwrap();

            let selection = session.selection();
            assert_eq!(selection.jurisdiction(), Some("UK"));
            assert_eq!(selection.visa_type(), None);
        }

        #[tokio::test]
        async fn test_begin_upload_needs_both() {
            let session = session_with(unused_extractor());
            session.select_jurisdiction(CANADA).unwrap();
            assert_eq!(
                session.begin_upload().await,
                Err(SessionError::IncompleteSelection)
            );
            assert_eq!(session.stage(), WizardStage::Select);
            assert_eq!(session.in_flight(), None);
        }

        #[tokio::test]
        async fn test_selection_frozen_after_upload() {
            let session = session_in_upload(unused_extractor()).await;
            assert_eq!(
                session.select_jurisdiction("UK"),
                Err(SessionError::InvalidStage {
                    operation: "select jurisdiction",
                    stage: WizardStage::Upload,
                })
            );
        }
    }

    mod begin_upload {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_resolves_forms_and_moves_to_upload() {
            let session = session_with(unused_extractor());
            session.select_jurisdiction(CANADA).unwrap();
            session.select_visa_type(VISITOR).unwrap();

            let forms = assert_ok!(session.begin_upload().await);
            assert_eq!(forms.len(), 3);
            assert_eq!(session.required_forms(), forms);
            assert_eq!(session.stage(), WizardStage::Upload);

            let fields: Vec<String> = forms.iter().flat_map(|f| f.fields.clone()).collect();
            for id in ["fullName", "passportNumber", "purposeOfVisit"] {
                assert!(fields.iter().any(|f| f == id));
            }
        }

        #[tokio::test]
        async fn test_unsupported_visa_type_stays_in_select() {
            let session = session_with(unused_extractor());
            session.select_jurisdiction("UK").unwrap();
            session.select_visa_type("Work Permit").unwrap();

            let err = assert_err!(session.begin_upload().await);
            assert_eq!(err.category(), ErrorCategory::Setup);
            assert_eq!(session.stage(), WizardStage::Select);
            assert!(session.required_forms().is_empty());
        }

        #[tokio::test]
        async fn test_uses_injected_catalog() {
            let mut catalog = MockFormCatalog::new();
            catalog.expect_resolve().times(1).returning(|_, _| {
                Ok(vec![RequiredForm::new("Only Form", "", &["fullName"])])
            });
            let session = ApplicationSession::new(Arc::new(catalog), unused_extractor());
            session.select_jurisdiction("XX").unwrap();
            session.select_visa_type("Anything").unwrap();

            let forms = session.begin_upload().await.unwrap();
            assert_eq!(forms[0].form_name, "Only Form");
        }

        #[tokio::test]
        async fn test_abandoned_resolution_releases_session() {
            let session = ApplicationSession::new(Arc::new(Stalled), unused_extractor());
            session.select_jurisdiction(CANADA).unwrap();
            session.select_visa_type(VISITOR).unwrap();

            assert_err!(tokio::time::timeout(GIVE_UP, session.begin_upload()).await);
            assert_eq!(session.stage(), WizardStage::Select);
            assert_eq!(session.in_flight(), None);
            assert_eq!(session.selection().visa_type(), Some(VISITOR));

            assert_ok!(session.select_jurisdiction("UK"));
            assert_ok!(session.select_visa_type("Business Visitor"));
            assert_err!(tokio::time::timeout(GIVE_UP, session.begin_upload()).await);
            assert_eq!(session.in_flight(), None);
        }

        #[tokio::test]
        async fn test_second_call_while_resolving_is_rejected() {
            let gate = Arc::new(Gate::default());
            let catalog = GatedCatalog {
                gate: gate.clone(),
                inner: StaticCatalog::builtin(),
            };
            let session = Arc::new(ApplicationSession::new(
                Arc::new(catalog),
                unused_extractor(),
            ));
            session.select_jurisdiction(CANADA).unwrap();
            session.select_visa_type(VISITOR).unwrap();

            let task = tokio::spawn({
                let session = session.clone();
                async move { session.begin_upload().await }
            });
            gate.entered.notified().await;

            assert_eq!(
                session.begin_upload().await,
                Err(SessionError::OperationInProgress(
                    WizardOperation::BeginUpload
                ))
            );
            assert_eq!(
                session.status_message().as_deref(),
                Some("Fetching required forms...")
            );

            gate.release.notify_one();
            assert_ok!(task.await.unwrap());
            assert_eq!(session.stage(), WizardStage::Upload);
        }

        #[tokio::test]
        async fn test_changing_selection_abandons_resolution() {
            let gate = Arc::new(Gate::default());
            let catalog = GatedCatalog {
                gate: gate.clone(),
                inner: StaticCatalog::builtin(),
            };
            let session = Arc::new(ApplicationSession::new(
                Arc::new(catalog),
                unused_extractor(),
            ));
            session.select_jurisdiction(CANADA).unwrap();
            session.select_visa_type(VISITOR).unwrap();

            let task = tokio::spawn({
                let session = session.clone();
                async move { session.begin_upload().await }
            });
            gate.entered.notified().await;

            session.select_visa_type("Work Permit").unwrap();
            assert_eq!(task.await.unwrap(), Err(SessionError::Cancelled));
            assert_eq!(session.stage(), WizardStage::Select);
            assert!(session.required_forms().is_empty());
            assert_eq!(session.in_flight(), None);
        }
    }

    mod documents {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_add_and_remove() {
            let session = session_in_upload(unused_extractor()).await;
            let ids = session
                .add_documents(vec![
                    NewDocument::new("passport.pdf", "a"),
                    NewDocument::new("bank.png", "b"),
                ])
                .unwrap();
            assert_eq!(ids.len(), 2);

            let removed = session.remove_document(ids[0]).unwrap().unwrap();
            assert_eq!(removed.status, DocumentStatus::Removed);
            assert_eq!(removed.display_name, "passport.pdf");

            let remaining = session.documents();
            assert_eq!(remaining.len(), 1);
            assert_eq!(remaining[0].id, ids[1]);
        }

        #[tokio::test]
        async fn test_remove_unknown_is_noop() {
            let session = session_in_upload(unused_extractor()).await;
            session.add_documents(passport()).unwrap();
            assert_eq!(session.remove_document(DocumentId::new()), Ok(None));
            assert_eq!(session.documents().len(), 1);
        }

        #[test]
        fn test_upload_only_during_upload_stage() {
            let session = session_with(unused_extractor());
            assert_eq!(
                session.add_documents(passport()),
                Err(SessionError::InvalidStage {
                    operation: "add documents",
                    stage: WizardStage::Select,
                })
            );
        }

        #[tokio::test]
        async fn test_unrecognized_type_is_accepted() {
            let session = session_in_upload(unused_extractor()).await;
            session
                .add_documents(vec![NewDocument::new("bundle.zip", "zip")])
                .unwrap();
            assert_eq!(session.documents().len(), 1);
        }
    }

    mod processing {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_visitor_visa_scenario() {
            let session = session_in_review().await;
            assert_eq!(session.stage(), WizardStage::Review);

            let values = session.field_values().unwrap();
            for form in values.forms() {
                if let Some(field) = form.field("fullName") {
                    assert_eq!(field.as_text(), "John Smith");
                }
                if let Some(field) = form.field("passportNumber") {
                    assert_eq!(field.as_text(), "US123456789");
                }
                if let Some(field) = form.field("purposeOfVisit") {
                    assert_eq!(field.as_text(), "");
                    assert!(field.is_empty());
                }
            }
            assert_eq!(
                session
                    .field("Travel Information Form", "purposeOfVisit")
                    .unwrap()
                    .value(),
                None
            );
        }

        #[tokio::test]
        async fn test_no_documents() {
            let session = session_in_upload(unused_extractor()).await;
            assert_eq!(
                session.begin_processing().await,
                Err(SessionError::NoDocumentsUploaded)
            );
            assert_eq!(session.stage(), WizardStage::Upload);
            assert_eq!(session.in_flight(), None);
        }

        #[tokio::test]
        async fn test_extraction_unavailable_returns_to_upload() {
            let session = session_in_upload(extractor_returning(Err(
                ExtractionError::Unavailable("service down".to_string()),
            )))
            .await;
            session.add_documents(passport()).unwrap();

            let err = session.begin_processing().await.unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Capability);
            assert_eq!(session.stage(), WizardStage::Upload);
            assert_eq!(session.field_values(), None);
            assert_eq!(session.in_flight(), None);
            assert_eq!(session.documents().len(), 1);
        }

        #[tokio::test]
        async fn test_retry_after_failure() {
            let mut extractor = MockFieldExtractor::new();
            let mut seq = mockall::Sequence::new();
            extractor
                .expect_extract()
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Err(ExtractionError::Unavailable("timeout".to_string())));
            extractor
                .expect_extract()
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(candidates([("fullName", "John Smith")])));

            let session = session_in_upload(Arc::new(extractor)).await;
            session.add_documents(passport()).unwrap();
            assert_err!(session.begin_processing().await);
            assert_ok!(session.begin_processing().await);
            assert_eq!(session.stage(), WizardStage::Review);
        }

        #[tokio::test]
        async fn test_no_extractable_content_yields_empty_forms() {
            let session =
                session_in_upload(extractor_returning(Err(ExtractionError::NoExtractableContent)))
                    .await;
            session.add_documents(passport()).unwrap();

            let values = session.begin_processing().await.unwrap();
            assert_eq!(session.stage(), WizardStage::Review);
            assert_eq!(values.len(), 3);
            assert!(values.forms().iter().all(|f| f.filled_count() == 0));
        }

        #[tokio::test]
        async fn test_empty_form_list_is_reported() {
            let mut catalog = MockFormCatalog::new();
            catalog.expect_resolve().returning(|_, _| Ok(Vec::new()));
            let session = ApplicationSession::new(
                Arc::new(catalog),
                extractor_returning(Ok(CandidateFields::new())),
            );
            session.select_jurisdiction("CA").unwrap();
            session.select_visa_type("Work Permit").unwrap();
            session.begin_upload().await.unwrap();
            session.add_documents(passport()).unwrap();

            assert_eq!(
                session.begin_processing().await,
                Err(SessionError::Merge(MergeError::EmptyRequiredFormList))
            );
            assert_eq!(session.stage(), WizardStage::Upload);
        }

        #[tokio::test]
        async fn test_overlapping_calls_are_rejected() {
            let gate = Arc::new(Gate::default());
            let extractor = GatedExtractor {
                gate: gate.clone(),
                result: Ok(candidates([("fullName", "John Smith")])),
            };
            let session = Arc::new(session_in_upload(Arc::new(extractor)).await);
            session.add_documents(passport()).unwrap();

            let task = tokio::spawn({
                let session = session.clone();
                async move { session.begin_processing().await }
            });
            gate.entered.notified().await;

            assert_eq!(session.stage(), WizardStage::Processing);
            assert_eq!(
                session.begin_processing().await,
                Err(SessionError::OperationInProgress(
                    WizardOperation::BeginProcessing
                ))
            );
            assert_eq!(
                session.add_documents(passport()),
                Err(SessionError::OperationInProgress(
                    WizardOperation::BeginProcessing
                ))
            );
            assert_eq!(
                session.status_message().as_deref(),
                Some("Processing 1 document(s) and filling 3 form(s)")
            );

            gate.release.notify_one();
            assert_ok!(task.await.unwrap());
            assert_eq!(session.stage(), WizardStage::Review);
        }

        #[tokio::test]
        async fn test_abandoned_processing_returns_to_upload() {
            let session = session_in_upload(Arc::new(Stalled)).await;
            session.add_documents(passport()).unwrap();

            assert_err!(tokio::time::timeout(GIVE_UP, session.begin_processing()).await);
            assert_eq!(session.stage(), WizardStage::Upload);
            assert_eq!(session.in_flight(), None);
            assert_eq!(session.field_values(), None);
            assert_eq!(session.status_message(), None);

            assert_ok!(session.add_documents(passport()));
            assert_eq!(session.documents().len(), 2);
            assert_eq!(session.selection().jurisdiction(), Some(CANADA));
            assert_err!(tokio::time::timeout(GIVE_UP, session.begin_processing()).await);
            assert_eq!(session.stage(), WizardStage::Upload);
        }

        #[tokio::test]
        async fn test_reset_then_dropped_call_leaves_fresh_session() {
            let session = session_in_upload(Arc::new(Stalled)).await;
            session.add_documents(passport()).unwrap();

            {
                let call = session.begin_processing();
                tokio::pin!(call);
                assert_err!(tokio::time::timeout(GIVE_UP, call.as_mut()).await);
                session.reset();
            }
            assert_eq!(session.snapshot(), fresh_snapshot());
        }

        #[tokio::test]
        async fn test_reset_discards_in_flight_extraction() {
            let gate = Arc::new(Gate::default());
            let extractor = GatedExtractor {
                gate: gate.clone(),
                result: Ok(candidates([("fullName", "John Smith")])),
            };
            let session = Arc::new(session_in_upload(Arc::new(extractor)).await);
            session.add_documents(passport()).unwrap();

            let task = tokio::spawn({
                let session = session.clone();
                async move { session.begin_processing().await }
            });
            gate.entered.notified().await;

            session.reset();
            assert_eq!(task.await.unwrap(), Err(SessionError::Cancelled));
            assert_eq!(session.snapshot(), fresh_snapshot());
        }
    }

    mod review {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_edit_then_read_back() {
            let session = session_in_review().await;
            let before = session.field_values().unwrap();

            session
                .edit_field("Travel Information Form", "purposeOfVisit", "Tourism")
                .unwrap();

            let field = session
                .field("Travel Information Form", "purposeOfVisit")
                .unwrap();
            assert_eq!(field.as_text(), "Tourism");
            assert!(field.is_edited());

            let after = session.field_values().unwrap();
            for (old, new) in before.forms().iter().zip(after.forms()) {
                for (a, b) in old.fields.iter().zip(&new.fields) {
                    if !(new.form_name == "Travel Information Form" && b.name == "purposeOfVisit")
                    {
                        assert_eq!(a, b);
                    }
                }
            }
        }

        #[tokio::test]
        async fn test_edit_only_touches_one_form() {
            let session = session_in_review().await;
            session
                .edit_field("Visa Application Form", "fullName", "Jane Smith")
                .unwrap();
            assert_eq!(
                session
                    .field("Visa Application Form", "fullName")
                    .unwrap()
                    .as_text(),
                "Jane Smith"
            );
        }

        #[tokio::test]
        async fn test_edit_unknown_identifiers() {
            let session = session_in_review().await;
            let err = session.edit_field("Nope", "fullName", "x").unwrap_err();
            assert_eq!(err, SessionError::UnknownForm("Nope".to_string()));
            assert_eq!(err.category(), ErrorCategory::SchemaViolation);

            assert_eq!(
                session.edit_field("Visa Application Form", "shoeSize", "42"),
                Err(SessionError::UnknownField {
                    form_name: "Visa Application Form".to_string(),
                    field_id: "shoeSize".to_string(),
                })
            );
        }

        #[tokio::test]
        async fn test_edit_outside_review() {
            let session = session_in_upload(unused_extractor()).await;
            assert_eq!(
                session.edit_field("Visa Application Form", "fullName", "x"),
                Err(SessionError::InvalidStage {
                    operation: "edit field",
                    stage: WizardStage::Upload,
                })
            );
        }

        #[tokio::test]
        async fn test_summary_counts() {
            let session = session_in_review().await;
            let summary = session.summary().unwrap();
            assert_eq!(summary[0].filled, 2);
            assert_eq!(summary[0].total, 7);
            assert_eq!(summary[1].filled, 0);
        }
    }

    mod finalize {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_finalize_with_empty_fields() {
            let session = session_in_review().await;
            let finalized = session.finalize().unwrap();

            assert_eq!(session.stage(), WizardStage::Complete);
            assert_eq!(finalized.jurisdiction, CANADA);
            assert_eq!(finalized.visa_type, VISITOR);
            assert_eq!(finalized.forms.len(), 3);

            let json = serde_json::to_value(&finalized).unwrap();
            assert_eq!(
                json["forms"]["Visa Application Form"]["fullName"],
                "John Smith"
            );
            assert!(json["forms"]["Travel Information Form"]["purposeOfVisit"].is_null());
        }

        #[tokio::test]
        async fn test_finalize_only_in_review() {
            let session = session_in_upload(unused_extractor()).await;
            assert!(matches!(
                session.finalize(),
                Err(SessionError::InvalidStage { .. })
            ));

            let session = session_in_review().await;
            session.finalize().unwrap();
            assert!(session.finalize().is_err());
            assert!(session.edit_field("Visa Application Form", "fullName", "x").is_err());
        }

        #[tokio::test]
        async fn test_require_complete_forms() {
            let session = session_in_upload(extractor_returning(Ok(candidates([(
                "fullName",
                "John Smith",
            )]))))
            .await
            .with_options(SessionOptions {
                require_complete_forms: true,
            });
            session.add_documents(passport()).unwrap();
            session.begin_processing().await.unwrap();

            let Err(SessionError::IncompleteForms(missing)) = session.finalize() else {
                panic!("expected IncompleteForms");
            };
            assert_eq!(missing.len(), 14);
            assert_eq!(session.stage(), WizardStage::Review);
            assert_eq!(session.in_flight(), None);

            for m in missing {
                session.edit_field(&m.form_name, &m.field_id, "filled").unwrap();
            }
            assert_ok!(session.finalize());
        }
    }

    mod reset {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_reset_from_every_stage() {
            let session = session_with(unused_extractor());
            session.select_jurisdiction(CANADA).unwrap();
            session.reset();
            assert_eq!(session.snapshot(), fresh_snapshot());

            let session = session_in_upload(unused_extractor()).await;
            session.add_documents(passport()).unwrap();
            session.reset();
            assert_eq!(session.snapshot(), fresh_snapshot());

            let session = session_in_review().await;
            session.reset();
            assert_eq!(session.snapshot(), fresh_snapshot());

            let session = session_in_review().await;
            session.finalize().unwrap();
            session.reset();
            session.reset();
            assert_eq!(session.snapshot(), fresh_snapshot());
            assert!(session.progress()[0].current);
        }

        #[tokio::test]
        async fn test_session_usable_after_reset() {
            let session = session_in_review().await;
            session.reset();
            session.select_jurisdiction("UK").unwrap();
            session.select_visa_type("Business Visitor").unwrap();
            assert_ok!(session.begin_upload().await);
            assert_eq!(session.stage(), WizardStage::Upload);
        }
    }
}
