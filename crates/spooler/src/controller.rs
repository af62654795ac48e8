//! Layout/write negotiation with a remote document provider.
//!
//! [`NegotiationController`] is a plain state machine: every entry point takes
//! the current input, mutates the controller and returns the [`Command`]s the
//! owner must carry out. It never talks to collaborators directly, which keeps
//! it testable without threads or a real provider.

use printspool_pages::{contains, normalize, offset, PageRange};
use thiserror::Error;

use crate::dispatch::{ProviderResponse, Sequence};
use crate::document::DocumentState;
use crate::job::{ControllerPhase, DocumentInfo, PrintAttributes};

/// Fatal negotiation outcomes.
/// 協商過程中無法復原的錯誤。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("layout failed: {0}")]
    LayoutFailed(String),
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("provider delivered pages {written:?} for requested pages {requested:?}")]
    InvalidPages {
        requested: Vec<PageRange>,
        written: Vec<PageRange>,
    },
}

/// Flags forwarded with a layout request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutMetadata {
    /// `true` while the user is still previewing, `false` once print was confirmed.
    pub preview: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRequest {
    pub old_attributes: PrintAttributes,
    pub new_attributes: PrintAttributes,
    pub metadata: LayoutMetadata,
    pub sequence: Sequence,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub pages: Vec<PageRange>,
    pub sequence: Sequence,
}

/// Side effect requested by the controller.
/// 控制器要求外部執行的動作。
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Tell the provider a negotiation begins.
    StartProvider,
    Layout(LayoutRequest),
    Write(WriteRequest),
    /// Tell the provider processing is over.
    FinishProvider,
    StoreAttributes(PrintAttributes),
    StoreDocumentInfo(DocumentInfo),
    /// Printable pages for the job; `None` drops previously stored pages.
    StorePages(Option<Vec<PageRange>>),
    /// Caller should re-render its view of the job.
    Refresh,
    /// Negotiation settled and the caller is done: export or close.
    Finalize,
    Fail(NegotiationError),
    /// The session should terminate.
    Close,
}

/// Read-only view of caller-owned state consulted while negotiating.
/// 協商時查詢的呼叫端狀態（唯讀）。
pub trait CallerView {
    fn is_print_confirmed(&self) -> bool;

    /// Confirmed to print, or cancelled.
    fn is_done(&self) -> bool;

    /// Currently selected pages; `None` or empty when the selection is invalid.
    fn requested_pages(&self) -> Option<Vec<PageRange>>;

    /// Byte length of the rendered artifact after a write.
    fn artifact_len(&self) -> u64;
}

/// Tuning knobs for the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationOptions {
    /// Ask for a single page per round trip while previewing.
    pub preview_single_page: bool,
}

impl Default for NegotiationOptions {
    fn default() -> Self {
        Self {
            preview_single_page: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Layout,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRequest {
    kind: RequestKind,
    sequence: Sequence,
}

/// Negotiation state machine for one print job configuration.
/// 單一列印作業設定的協商狀態機。
#[derive(Debug)]
pub struct NegotiationController {
    options: NegotiationOptions,
    phase: ControllerPhase,
    has_started: bool,
    sequence: Sequence,
    pending: Option<PendingRequest>,
    old_attributes: PrintAttributes,
    current_attributes: PrintAttributes,
    requested_pages: Vec<PageRange>,
    document: DocumentState,
}

impl Default for NegotiationController {
    fn default() -> Self {
        Self::new(NegotiationOptions::default())
    }
}

impl NegotiationController {
    pub fn new(options: NegotiationOptions) -> Self {
        Self {
            options,
            phase: ControllerPhase::Initialized,
            has_started: false,
            sequence: Sequence::default(),
            pending: None,
            old_attributes: PrintAttributes::default(),
            current_attributes: PrintAttributes::default(),
            requested_pages: Vec::new(),
            document: DocumentState::new(),
        }
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    /// A layout or write round trip is outstanding.
    pub fn is_working(&self) -> bool {
        matches!(
            self.phase,
            ControllerPhase::LayoutStarted | ControllerPhase::WriteStarted
        )
    }

    pub fn has_performed_layout(&self) -> bool {
        matches!(
            self.phase,
            ControllerPhase::LayoutCompleted
                | ControllerPhase::WriteStarted
                | ControllerPhase::WriteCompleted
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.phase == ControllerPhase::Cancelled
    }

    pub fn is_finished(&self) -> bool {
        self.phase == ControllerPhase::Finished
    }

    pub fn is_failed(&self) -> bool {
        self.phase == ControllerPhase::Failed
    }

    /// Sequence of the most recently issued request.
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn document(&self) -> &DocumentState {
        &self.document
    }

    /// Pages asked for in the latest write (or skipped write).
    pub fn requested_pages(&self) -> &[PageRange] {
        &self.requested_pages
    }

    pub fn current_attributes(&self) -> &PrintAttributes {
        &self.current_attributes
    }

    pub fn start(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        self.start_into(&mut commands);
        commands
    }

    /// Decides whether the new configuration needs a layout, a write, or
    /// nothing at all.
    pub fn update(&mut self, attributes: &PrintAttributes, caller: &dyn CallerView) -> Vec<Command> {
        let mut commands = Vec::new();
        if self.phase.is_terminal() {
            log::debug!("ignoring update in terminal phase {:?}", self.phase);
            return commands;
        }
        self.start_into(&mut commands);
        self.current_attributes = attributes.clone();

        // A confirmed print always lays out again: earlier passes were previews.
        let confirmed = caller.is_print_confirmed();
        if confirmed || self.current_attributes != self.old_attributes {
            self.request_layout(confirmed, &mut commands);
        } else if self.is_awaiting(RequestKind::Layout) {
            log::debug!("layout {} outstanding, waiting", self.sequence);
        } else if let Some(info) = self.document.info().cloned() {
            // Same layout as before; the selection may still need new pages.
            self.complete_layout(&info, false, caller, &mut commands);
        } else {
            self.request_layout(false, &mut commands);
        }
        commands
    }

    /// Applies a provider completion. Stale and duplicate answers are dropped.
    pub fn handle(&mut self, response: ProviderResponse, caller: &dyn CallerView) -> Vec<Command> {
        let mut commands = Vec::new();
        let kind = if response.is_layout() {
            RequestKind::Layout
        } else {
            RequestKind::Write
        };
        if !self.accept(kind, response.sequence()) {
            log::debug!(
                "dropping stale {:?} response {} (current {})",
                kind,
                response.sequence(),
                self.sequence
            );
            return commands;
        }

        match response {
            ProviderResponse::LayoutFinished { info, changed, .. } => {
                self.on_layout_finished(&info, changed, caller, &mut commands)
            }
            ProviderResponse::WriteFinished { pages, .. } => {
                self.on_write_finished(&pages, caller, &mut commands)
            }
            ProviderResponse::LayoutFailed { error, .. } => {
                self.on_failure(NegotiationError::LayoutFailed(error), caller, &mut commands)
            }
            ProviderResponse::WriteFailed { error, .. } => {
                self.on_failure(NegotiationError::WriteFailed(error), caller, &mut commands)
            }
        }
        commands
    }

    /// Marks the negotiation cancelled. Outstanding requests are not aborted;
    /// their answers take the cleanup path.
    pub fn cancel(&mut self) {
        if matches!(
            self.phase,
            ControllerPhase::Failed | ControllerPhase::Finished
        ) {
            return;
        }
        self.phase = ControllerPhase::Cancelled;
    }

    /// Notifies the provider that processing is over. `Failed` and
    /// `Cancelled` are kept; any other phase becomes `Finished`.
    pub fn finish(&mut self) -> Vec<Command> {
        if !matches!(
            self.phase,
            ControllerPhase::Failed | ControllerPhase::Cancelled
        ) {
            self.phase = ControllerPhase::Finished;
        }
        self.pending = None;
        vec![Command::FinishProvider]
    }

    fn start_into(&mut self, commands: &mut Vec<Command>) {
        if self.has_started || self.phase.is_terminal() {
            return;
        }
        self.has_started = true;
        self.phase = ControllerPhase::Started;
        commands.push(Command::StartProvider);
    }

    fn next_sequence(&mut self, kind: RequestKind) -> Sequence {
        self.sequence = self.sequence.next();
        self.pending = Some(PendingRequest {
            kind,
            sequence: self.sequence,
        });
        self.sequence
    }

    fn is_awaiting(&self, kind: RequestKind) -> bool {
        self.pending.is_some_and(|pending| pending.kind == kind)
    }

    fn accept(&mut self, kind: RequestKind, sequence: Sequence) -> bool {
        match self.pending {
            Some(pending)
                if pending.kind == kind
                    && pending.sequence == sequence
                    && sequence == self.sequence =>
            {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    fn request_layout(&mut self, confirmed: bool, commands: &mut Vec<Command>) {
        commands.push(Command::StoreAttributes(self.current_attributes.clone()));
        self.phase = ControllerPhase::LayoutStarted;
        let sequence = self.next_sequence(RequestKind::Layout);
        commands.push(Command::Layout(LayoutRequest {
            old_attributes: self.old_attributes.clone(),
            new_attributes: self.current_attributes.clone(),
            metadata: LayoutMetadata {
                preview: !confirmed,
            },
            sequence,
        }));
        self.old_attributes = self.current_attributes.clone();
    }

    fn on_layout_finished(
        &mut self,
        info: &DocumentInfo,
        changed: bool,
        caller: &dyn CallerView,
        commands: &mut Vec<Command>,
    ) {
        if self.is_cancelled() {
            commands.push(Command::Refresh);
            if caller.is_done() {
                commands.push(Command::Close);
            }
            return;
        }
        self.complete_layout(info, changed, caller, commands);
    }

    fn complete_layout(
        &mut self,
        info: &DocumentInfo,
        layout_changed: bool,
        caller: &dyn CallerView,
        commands: &mut Vec<Command>,
    ) {
        self.phase = ControllerPhase::LayoutCompleted;

        // Only content type and page count matter here; the size is unknown
        // until a write completes.
        let info_changed = self.document.update_info(info);
        if info_changed {
            commands.push(Command::StoreDocumentInfo(info.clone()));
        }
        if info_changed || layout_changed {
            self.document.clear_pages();
            commands.push(Command::StorePages(None));
        }

        let requested = match caller.requested_pages() {
            Some(pages) if !pages.is_empty() => normalize(&pages),
            _ => {
                // Invalid selection: wait for the user to fix it.
                self.requested_pages.clear();
                commands.push(Command::Refresh);
                if caller.is_done() {
                    commands.push(Command::Close);
                }
                return;
            }
        };
        let requested = if !caller.is_print_confirmed() && self.options.preview_single_page {
            first_page_of(&requested)
        } else {
            requested
        };
        self.requested_pages = requested.clone();

        if !info_changed && !layout_changed && self.document.has_pages(&requested) {
            let written = self.document.pages().unwrap_or_default().to_vec();
            if self.reconcile(&written, &requested, commands) && caller.is_done() {
                commands.push(Command::Finalize);
            }
            return;
        }

        commands.push(Command::Refresh);
        self.phase = ControllerPhase::WriteStarted;
        let sequence = self.next_sequence(RequestKind::Write);
        commands.push(Command::Write(WriteRequest {
            pages: requested,
            sequence,
        }));
    }

    fn on_write_finished(
        &mut self,
        pages: &[PageRange],
        caller: &dyn CallerView,
        commands: &mut Vec<Command>,
    ) {
        if self.is_cancelled() {
            if caller.is_done() {
                commands.push(Command::Close);
            }
            return;
        }
        self.phase = ControllerPhase::WriteCompleted;

        if let Some(info) = self.document.set_data_size(caller.artifact_len()) {
            commands.push(Command::StoreDocumentInfo(info.clone()));
        }
        self.document.set_pages(pages);
        if self.requested_pages.is_empty() {
            // The selection became invalid while the write was outstanding.
            commands.push(Command::Refresh);
            if caller.is_done() {
                commands.push(Command::Close);
            }
            return;
        }
        let written = self.document.pages().unwrap_or_default().to_vec();
        let requested = self.requested_pages.clone();
        log::debug!("requested {requested:?}, provider wrote {written:?}");

        if self.reconcile(&written, &requested, commands) && caller.is_done() {
            commands.push(Command::Finalize);
        }
    }

    fn on_failure(
        &mut self,
        error: NegotiationError,
        caller: &dyn CallerView,
        commands: &mut Vec<Command>,
    ) {
        if self.is_cancelled() {
            log::debug!("ignoring provider failure after cancel: {error}");
            if caller.is_done() {
                commands.push(Command::Close);
            }
            return;
        }
        self.fail(error, commands);
    }

    fn reconcile(
        &mut self,
        written: &[PageRange],
        requested: &[PageRange],
        commands: &mut Vec<Command>,
    ) -> bool {
        let page_count = self.document.info().and_then(|info| info.page_count);
        match printable_pages(written, requested, page_count) {
            Ok(pages) => {
                commands.push(Command::StorePages(Some(pages)));
                true
            }
            Err(error) => {
                self.fail(error, commands);
                false
            }
        }
    }

    fn fail(&mut self, error: NegotiationError, commands: &mut Vec<Command>) {
        log::error!("print negotiation failed: {error}");
        self.phase = ControllerPhase::Failed;
        self.pending = None;
        commands.push(Command::Fail(error));
        commands.push(Command::Close);
    }
}

/// Previews fetch one page per round trip: the first selected page.
fn first_page_of(requested: &[PageRange]) -> Vec<PageRange> {
    match requested.first() {
        Some(PageRange::All) | None => vec![PageRange::single(0)],
        Some(first) => vec![PageRange::single(first.start())],
    }
}

/// Maps what the provider wrote onto the pages a printer should emit.
///
/// Page indices in the result are relative to the written artifact. Cases are
/// tried from the most to the least expected; anything left over means the
/// provider ignored the request.
pub fn printable_pages(
    written: &[PageRange],
    requested: &[PageRange],
    page_count: Option<u32>,
) -> Result<Vec<PageRange>, NegotiationError> {
    const ALL_PAGES: [PageRange; 1] = [PageRange::All];

    let written = normalize(written);
    let requested = normalize(requested);
    let invalid = || NegotiationError::InvalidPages {
        requested: requested.clone(),
        written: written.clone(),
    };

    if requested.is_empty() {
        return Err(invalid());
    }
    // Exactly what was asked for: print the whole artifact.
    if written == requested {
        return Ok(ALL_PAGES.to_vec());
    }
    // Everything was written: print only the requested pages.
    if written == ALL_PAGES {
        return Ok(requested.clone());
    }
    // A superset starting somewhere: rebase onto the first written page.
    if !written.is_empty() && contains(&written, &requested) {
        let delta = -i64::from(written[0].start());
        return offset(&requested, delta).map_err(|_| invalid());
    }
    // All pages requested and all of them enumerated explicitly.
    if requested == ALL_PAGES {
        let last_page = page_count.and_then(|count| count.checked_sub(1));
        if let [PageRange::Range { start: 0, end }] = written.as_slice() {
            if Some(*end) == last_page {
                return Ok(written.clone());
            }
        }
    }
    Err(invalid())
}
