use std::io::{self, Write};

use printspool_pages::PageRange;

use crate::controller::{LayoutRequest, NegotiationError, WriteRequest};
use crate::dispatch::ResponseSender;
use crate::job::{DocumentInfo, PrintAttributes, PrintJobId, PrintJobState};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// Remote application that lays out and renders the document.
/// 負責排版與繪製文件的遠端應用程式。
///
/// Calls must not block: answers are posted later through the supplied
/// [`ResponseSender`], from any thread, possibly more than once or never.
pub trait DocumentProvider {
    fn start(&mut self);
    fn layout(&mut self, request: LayoutRequest, responder: ResponseSender);
    fn write(&mut self, request: WriteRequest, responder: ResponseSender);
    fn finish(&mut self);
}

/// Print job bookkeeping updated as the negotiation progresses.
/// 協商過程中同步更新的列印作業紀錄。
pub trait JobStore {
    fn set_attributes(&mut self, job: PrintJobId, attributes: &PrintAttributes);
    fn set_document_info(&mut self, job: PrintJobId, info: &DocumentInfo);
    /// `None` clears the printable pages.
    fn set_pages(&mut self, job: PrintJobId, pages: Option<&[PageRange]>);
    fn set_state(&mut self, job: PrintJobId, state: PrintJobState);
}

/// Source of the pages the user currently wants printed.
pub trait PageSelectionSource {
    /// `None` (or an empty list) while the selection is invalid.
    fn requested_pages(&self) -> Option<Vec<PageRange>>;
}

/// Access to the rendered artifact produced by the provider.
pub trait ArtifactIo {
    fn byte_len(&self) -> io::Result<u64>;
    /// Copies the artifact into `target`, returning the number of bytes copied.
    fn export_to(&self, target: &mut dyn Write, buffer_size: usize) -> io::Result<u64>;
}

/// Notifications delivered to the caller that owns the session.
/// 傳送給擁有工作階段之呼叫端的通知。
pub trait CallerHooks {
    /// The caller should re-render its view of the job.
    fn refresh(&mut self) {}

    /// Whether a finished negotiation should be exported instead of printed.
    fn wants_export(&self) -> bool {
        false
    }

    /// Ask the user for an export destination; answer through
    /// `PrintSession::export_to` or `PrintSession::export_declined`.
    fn request_export_target(&mut self) {}

    fn on_failure(&mut self, error: &NegotiationError) {
        let _ = error;
    }

    fn on_closed(&mut self, state: &PrintJobState) {
        let _ = state;
    }
}

/// Recorded provider call produced by the mock provider.
/// 模擬提供者所記錄的呼叫。
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    Start,
    Layout(LayoutRequest),
    Write(WriteRequest),
    Finish,
}

/// In-memory implementation of [`DocumentProvider`] used for tests.
/// 測試使用的記憶體內部提供者實作。
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockProvider {
    calls: Arc<Mutex<Vec<ProviderCall>>>,
    responder: Arc<Mutex<Option<ResponseSender>>>,
}

#[cfg(test)]
impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    pub fn responder(&self) -> ResponseSender {
        self.responder
            .lock()
            .expect("lock poisoned")
            .clone()
            .expect("no request issued yet")
    }

    pub fn last_layout(&self) -> Option<LayoutRequest> {
        self.calls().into_iter().rev().find_map(|call| match call {
            ProviderCall::Layout(request) => Some(request),
            _ => None,
        })
    }

    pub fn last_write(&self) -> Option<WriteRequest> {
        self.calls().into_iter().rev().find_map(|call| match call {
            ProviderCall::Write(request) => Some(request),
            _ => None,
        })
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().expect("lock poisoned").push(call);
    }
}

#[cfg(test)]
impl DocumentProvider for MockProvider {
    fn start(&mut self) {
        self.record(ProviderCall::Start);
    }

    fn layout(&mut self, request: LayoutRequest, responder: ResponseSender) {
        *self.responder.lock().expect("lock poisoned") = Some(responder);
        self.record(ProviderCall::Layout(request));
    }

    fn write(&mut self, request: WriteRequest, responder: ResponseSender) {
        *self.responder.lock().expect("lock poisoned") = Some(responder);
        self.record(ProviderCall::Write(request));
    }

    fn finish(&mut self) {
        self.record(ProviderCall::Finish);
    }
}

/// In-memory implementation of [`JobStore`] used for tests.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MockJobStore {
    pub attributes: Option<PrintAttributes>,
    pub info: Option<DocumentInfo>,
    pub pages: Option<Vec<PageRange>>,
    pub states: Vec<PrintJobState>,
}

#[cfg(test)]
impl JobStore for MockJobStore {
    fn set_attributes(&mut self, _job: PrintJobId, attributes: &PrintAttributes) {
        self.attributes = Some(attributes.clone());
    }

    fn set_document_info(&mut self, _job: PrintJobId, info: &DocumentInfo) {
        self.info = Some(info.clone());
    }

    fn set_pages(&mut self, _job: PrintJobId, pages: Option<&[PageRange]>) {
        self.pages = pages.map(<[PageRange]>::to_vec);
    }

    fn set_state(&mut self, _job: PrintJobId, state: PrintJobState) {
        self.states.push(state);
    }
}
