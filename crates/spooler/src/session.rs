use std::io::Write;
use std::time::Duration;

use printspool_pages::PageRange;

use crate::config::SpoolerConfig;
use crate::controller::{CallerView, Command, NegotiationController, NegotiationError};
use crate::dispatch::{DispatchError, ProviderResponse, ResponseQueue};
use crate::document::DocumentState;
use crate::export::ExportError;
use crate::job::{ControllerPhase, PrintAttributes, PrintJobId, PrintJobState};
use crate::provider::{ArtifactIo, CallerHooks, DocumentProvider, JobStore, PageSelectionSource};

/// Where the user stands in the print dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    Editing,
    Confirmed,
    Cancelled,
}

/// Drives one print job negotiation: owns the controller and its response
/// queue and carries out every command against the collaborators.
/// 驅動單一列印作業協商：持有控制器與回應佇列，並對協作者執行所有指令。
///
/// All methods must be called from the thread that owns the session.
pub struct PrintSession<P, S, C, A> {
    job_id: PrintJobId,
    controller: NegotiationController,
    queue: ResponseQueue,
    provider: P,
    store: S,
    caller: C,
    artifact: A,
    config: SpoolerConfig,
    editor: EditorState,
    attributes: PrintAttributes,
    failure: Option<NegotiationError>,
    settled: bool,
    awaiting_export: bool,
    closed: Option<PrintJobState>,
}

struct SessionView<'a, C, A> {
    editor: EditorState,
    caller: &'a C,
    artifact: &'a A,
}

impl<C, A> CallerView for SessionView<'_, C, A>
where
    C: PageSelectionSource,
    A: ArtifactIo,
{
    fn is_print_confirmed(&self) -> bool {
        self.editor == EditorState::Confirmed
    }

    fn is_done(&self) -> bool {
        self.editor != EditorState::Editing
    }

    fn requested_pages(&self) -> Option<Vec<PageRange>> {
        self.caller.requested_pages()
    }

    fn artifact_len(&self) -> u64 {
        self.artifact.byte_len().unwrap_or_else(|err| {
            log::warn!("could not read rendered artifact size: {err}");
            0
        })
    }
}

impl<P, S, C, A> PrintSession<P, S, C, A>
where
    P: DocumentProvider,
    S: JobStore,
    C: PageSelectionSource + CallerHooks,
    A: ArtifactIo,
{
    pub fn new(
        job_id: PrintJobId,
        provider: P,
        store: S,
        caller: C,
        artifact: A,
        config: SpoolerConfig,
    ) -> Self {
        Self {
            job_id,
            controller: NegotiationController::new(config.negotiation_options()),
            queue: ResponseQueue::new(),
            provider,
            store,
            caller,
            artifact,
            config,
            editor: EditorState::Editing,
            attributes: PrintAttributes::default(),
            failure: None,
            settled: false,
            awaiting_export: false,
            closed: None,
        }
    }

    /// Seeds the attributes the job was created with, without negotiating.
    pub fn with_attributes(mut self, attributes: PrintAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn job_id(&self) -> PrintJobId {
        self.job_id
    }

    pub fn phase(&self) -> ControllerPhase {
        self.controller.phase()
    }

    pub fn editor_state(&self) -> EditorState {
        self.editor
    }

    pub fn is_working(&self) -> bool {
        self.controller.is_working()
    }

    pub fn has_performed_layout(&self) -> bool {
        self.controller.has_performed_layout()
    }

    pub fn has_started(&self) -> bool {
        self.controller.has_started()
    }

    pub fn document(&self) -> &DocumentState {
        self.controller.document()
    }

    pub fn failure(&self) -> Option<&NegotiationError> {
        self.failure.as_ref()
    }

    pub fn is_awaiting_export(&self) -> bool {
        self.awaiting_export
    }

    /// Final job state once the session closed.
    pub fn closed_state(&self) -> Option<&PrintJobState> {
        self.closed.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn caller(&self) -> &C {
        &self.caller
    }

    pub fn caller_mut(&mut self) -> &mut C {
        &mut self.caller
    }

    pub fn start(&mut self) {
        if self.is_closed() {
            return;
        }
        let commands = self.controller.start();
        self.execute(commands);
    }

    /// Negotiates `attributes`, or re-checks the page selection when they are
    /// unchanged.
    pub fn update(&mut self, attributes: PrintAttributes) {
        if self.is_closed() {
            return;
        }
        self.attributes = attributes;
        let view = SessionView {
            editor: self.editor,
            caller: &self.caller,
            artifact: &self.artifact,
        };
        let commands = self.controller.update(&self.attributes, &view);
        self.execute(commands);
    }

    /// Re-checks the page selection with the current attributes.
    pub fn refresh_selection(&mut self) {
        let attributes = self.attributes.clone();
        self.update(attributes);
    }

    /// The user pressed print: negotiate the full selection for real.
    pub fn confirm_print(&mut self) {
        if self.is_closed() || self.editor != EditorState::Editing {
            return;
        }
        self.editor = EditorState::Confirmed;
        self.settled = false;
        self.refresh_selection();
    }

    /// The user backed out. Closes right away unless a round trip is still
    /// outstanding, in which case its answer closes the session.
    pub fn cancel(&mut self) {
        if self.is_closed() {
            return;
        }
        let working = self.controller.is_working();
        self.editor = EditorState::Cancelled;
        self.controller.cancel();
        self.caller.refresh();
        if !working {
            self.close();
        }
    }

    /// Applies every response already queued; returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while !self.is_closed() {
            let Some(response) = self.queue.try_next() else {
                break;
            };
            self.deliver(response);
            handled += 1;
        }
        handled
    }

    /// Blocks up to `timeout` for one response. Returns whether one was handled.
    pub fn wait_for_response(&mut self, timeout: Duration) -> Result<bool, DispatchError> {
        match self.queue.recv_timeout(timeout)? {
            Some(response) => {
                self.deliver(response);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Copies the negotiated artifact to the export target the caller picked,
    /// then closes the session. The job itself is not queued for printing.
    pub fn export_to(&mut self, target: &mut dyn Write) -> Result<u64, ExportError> {
        if !self.awaiting_export {
            return Err(ExportError::NotRequested);
        }
        self.awaiting_export = false;
        let result = self
            .artifact
            .export_to(target, self.config.export_buffer_size);
        if let Err(err) = &result {
            log::error!("error writing print job data for {}: {err}", self.job_id);
        }
        self.editor = EditorState::Cancelled;
        self.close();
        Ok(result?)
    }

    /// The caller dismissed the export destination prompt: back to editing.
    pub fn export_declined(&mut self) {
        if !self.awaiting_export {
            return;
        }
        self.awaiting_export = false;
        self.settled = false;
        self.editor = EditorState::Editing;
        self.caller.refresh();
    }

    /// The remote provider went away; nothing else can be negotiated.
    pub fn provider_died(&mut self) {
        log::warn!("document provider for {} died", self.job_id);
        self.close();
    }

    /// Tears the session down. Idempotent; returns the recorded job state.
    pub fn close(&mut self) -> PrintJobState {
        if let Some(state) = &self.closed {
            return state.clone();
        }
        if self.controller.has_started() {
            let commands = self.controller.finish();
            self.execute(commands);
        }

        let state = match (&self.failure, self.editor) {
            (Some(error), _) => PrintJobState::Failed(error.to_string()),
            (None, EditorState::Confirmed) if self.settled => PrintJobState::Queued,
            _ => PrintJobState::Cancelled,
        };
        self.store.set_state(self.job_id, state.clone());
        self.queue.close();
        self.awaiting_export = false;
        self.closed = Some(state.clone());
        log::info!("{} closed as {:?}", self.job_id, state);
        self.caller.on_closed(&state);
        state
    }

    fn deliver(&mut self, response: ProviderResponse) {
        if self.is_closed() {
            return;
        }
        let view = SessionView {
            editor: self.editor,
            caller: &self.caller,
            artifact: &self.artifact,
        };
        let commands = self.controller.handle(response, &view);
        self.execute(commands);
    }

    fn execute(&mut self, commands: Vec<Command>) {
        for command in commands {
            if self.is_closed() {
                log::debug!("session closed, skipping {command:?}");
                continue;
            }
            match command {
                Command::StartProvider => self.provider.start(),
                Command::Layout(request) => {
                    log::debug!(
                        "{}: layout {} (preview: {})",
                        self.job_id,
                        request.sequence,
                        request.metadata.preview
                    );
                    let responder = self.queue.sender();
                    self.provider.layout(request, responder);
                }
                Command::Write(request) => {
                    log::debug!(
                        "{}: write {:?} as {}",
                        self.job_id,
                        request.pages,
                        request.sequence
                    );
                    let responder = self.queue.sender();
                    self.provider.write(request, responder);
                }
                Command::FinishProvider => self.provider.finish(),
                Command::StoreAttributes(attributes) => {
                    self.store.set_attributes(self.job_id, &attributes)
                }
                Command::StoreDocumentInfo(info) => self.store.set_document_info(self.job_id, &info),
                Command::StorePages(pages) => self.store.set_pages(self.job_id, pages.as_deref()),
                Command::Refresh => self.caller.refresh(),
                Command::Finalize => self.finalize(),
                Command::Fail(error) => {
                    self.caller.on_failure(&error);
                    self.failure = Some(error);
                }
                Command::Close => {
                    self.close();
                }
            }
        }
    }

    fn finalize(&mut self) {
        self.settled = true;
        if self.editor == EditorState::Confirmed && self.caller.wants_export() {
            self.awaiting_export = true;
            self.caller.request_export_target();
        } else {
            self.close();
        }
    }
}
