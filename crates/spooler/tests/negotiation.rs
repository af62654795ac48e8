use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use printspool_pages::parse_page_selection;
use printspool_spooler::{
    CallerHooks, ContentType, ControllerPhase, DocumentInfo, DocumentProvider, EditorState,
    FileArtifact, JobStore, LayoutRequest, NegotiationError, Orientation, PageRange,
    PageSelectionSource, PaperSize, PrintAttributes, PrintJobId, PrintJobState, PrintSession,
    ResponseSender, Sequence, SpoolerConfig, WriteRequest,
};
use tempfile::{tempdir, TempDir};

const WAIT: Duration = Duration::from_secs(5);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Provider that answers from worker threads and renders one line per page.
struct ThreadedProvider {
    artifact: PathBuf,
    page_count: u32,
    delays: Arc<Mutex<Vec<Duration>>>,
    layouts: Vec<LayoutRequest>,
    writes: Vec<WriteRequest>,
    workers: Vec<JoinHandle<()>>,
    started: bool,
    finished: bool,
}

impl ThreadedProvider {
    fn new(artifact: &Path, page_count: u32) -> Self {
        Self {
            artifact: artifact.to_path_buf(),
            page_count,
            delays: Arc::default(),
            layouts: Vec::new(),
            writes: Vec::new(),
            workers: Vec::new(),
            started: false,
            finished: false,
        }
    }

    /// Delays applied to upcoming layout answers, in request order.
    fn delay_layouts(&self, delays: &[Duration]) {
        self.delays.lock().unwrap().extend_from_slice(delays);
    }

    fn join(&mut self) {
        for worker in self.workers.drain(..) {
            worker.join().expect("provider worker panicked");
        }
    }
}

impl DocumentProvider for ThreadedProvider {
    fn start(&mut self) {
        self.started = true;
    }

    fn layout(&mut self, request: LayoutRequest, responder: ResponseSender) {
        let delay = {
            let mut delays = self.delays.lock().unwrap();
            if delays.is_empty() {
                Duration::ZERO
            } else {
                delays.remove(0)
            }
        };
        let info = DocumentInfo::new("report.txt", ContentType::Document, Some(self.page_count));
        let sequence = request.sequence;
        self.layouts.push(request);
        self.workers.push(thread::spawn(move || {
            thread::sleep(delay);
            responder.layout_finished(info, false, sequence);
        }));
    }

    fn write(&mut self, request: WriteRequest, responder: ResponseSender) {
        let path = self.artifact.clone();
        let page_count = self.page_count;
        let pages = request.pages.clone();
        let sequence = request.sequence;
        self.writes.push(request);
        self.workers.push(thread::spawn(move || {
            let body = render(&pages, page_count);
            match fs::write(&path, body) {
                Ok(()) => responder.write_finished(pages, sequence),
                Err(err) => responder.write_failed(err.to_string(), sequence),
            };
        }));
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

fn render(pages: &[PageRange], page_count: u32) -> String {
    let mut body = String::new();
    for range in pages {
        let (start, end) = match range {
            PageRange::All => (0, page_count.saturating_sub(1)),
            PageRange::Range { start, end } => (*start, *end),
        };
        for page in start..=end {
            body.push_str(&format!("page {page}\n"));
        }
    }
    body
}

#[derive(Default)]
struct RecordingStore {
    attributes: Vec<PrintAttributes>,
    info: Option<DocumentInfo>,
    pages: Option<Vec<PageRange>>,
    states: Vec<PrintJobState>,
}

impl JobStore for RecordingStore {
    fn set_attributes(&mut self, _job: PrintJobId, attributes: &PrintAttributes) {
        self.attributes.push(attributes.clone());
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

/// Print dialog whose page field holds user text like `"2-3"`.
struct Dialog {
    selection: String,
    page_count: u32,
    export: bool,
    export_prompts: usize,
    failures: Vec<NegotiationError>,
    closed: Option<PrintJobState>,
}

impl Dialog {
    fn new(selection: &str, page_count: u32) -> Self {
        Self {
            selection: selection.to_string(),
            page_count,
            export: false,
            export_prompts: 0,
            failures: Vec::new(),
            closed: None,
        }
    }
}

impl PageSelectionSource for Dialog {
    fn requested_pages(&self) -> Option<Vec<PageRange>> {
        if self.selection.trim().is_empty() {
            return Some(vec![PageRange::All]);
        }
        parse_page_selection(&self.selection, Some(self.page_count)).ok()
    }
}

impl CallerHooks for Dialog {
    fn wants_export(&self) -> bool {
        self.export
    }

    fn request_export_target(&mut self) {
        self.export_prompts += 1;
    }

    fn on_failure(&mut self, error: &NegotiationError) {
        self.failures.push(error.clone());
    }

    fn on_closed(&mut self, state: &PrintJobState) {
        self.closed = Some(state.clone());
    }
}

type Session = PrintSession<ThreadedProvider, RecordingStore, Dialog, FileArtifact>;

fn session(dir: &TempDir, selection: &str, page_count: u32) -> Session {
    let artifact = dir.path().join("job.out");
    PrintSession::new(
        PrintJobId::new(42),
        ThreadedProvider::new(&artifact, page_count),
        RecordingStore::default(),
        Dialog::new(selection, page_count),
        FileArtifact::new(artifact),
        SpoolerConfig::default(),
    )
}

fn a4() -> PrintAttributes {
    PrintAttributes {
        paper: Some(PaperSize::a4()),
        orientation: Some(Orientation::Portrait),
        copies: Some(1),
        ..Default::default()
    }
}

/// Handles responses until the session is idle or closed.
fn settle(session: &mut Session) {
    while session.is_working() && !session.is_closed() {
        let handled = session.wait_for_response(WAIT).expect("queue closed early");
        assert!(handled, "provider did not answer in time");
    }
}

#[test]
fn preview_then_print_queues_the_job() {
    init_logging();
    let dir = tempdir().unwrap();
    let mut session = session(&dir, "2-3", 5);

    session.update(a4());
    settle(&mut session);
    assert_eq!(session.phase(), ControllerPhase::WriteCompleted);
    // Previews only render the first selected page.
    assert_eq!(
        session.provider().writes.last().map(|w| w.pages.clone()),
        Some(vec![PageRange::single(1)])
    );
    assert_eq!(session.store().pages, Some(vec![PageRange::All]));

    session.confirm_print();
    settle(&mut session);

    assert_eq!(session.closed_state(), Some(&PrintJobState::Queued));
    assert_eq!(session.caller().closed, Some(PrintJobState::Queued));
    assert!(session.caller().failures.is_empty());
    let provider = session.provider();
    assert!(provider.started && provider.finished);
    assert!(!provider.layouts.last().unwrap().metadata.preview);
    assert_eq!(
        provider.writes.last().map(|w| w.pages.clone()),
        Some(vec![PageRange::Range { start: 1, end: 2 }])
    );

    let store = session.store();
    assert_eq!(store.pages, Some(vec![PageRange::All]));
    assert_eq!(store.states, vec![PrintJobState::Queued]);
    let written = fs::read_to_string(dir.path().join("job.out")).unwrap();
    assert_eq!(written, "page 1\npage 2\n");
    assert_eq!(
        store.info.as_ref().map(|info| info.data_size),
        Some(written.len() as u64)
    );
    shutdown(&mut session);
}

#[test]
fn superseded_layout_answer_is_ignored() {
    init_logging();
    let dir = tempdir().unwrap();
    let mut session = session(&dir, "", 3);
    // The first answer arrives after the second one.
    session
        .provider()
        .delay_layouts(&[Duration::from_millis(100), Duration::ZERO]);

    session.update(a4());
    let mut landscape = a4();
    landscape.orientation = Some(Orientation::Landscape);
    session.update(landscape.clone());

    settle(&mut session);
    assert_eq!(session.phase(), ControllerPhase::WriteCompleted);
    assert_eq!(session.provider().layouts.len(), 2);
    assert_eq!(session.provider().writes.len(), 1);
    assert_eq!(session.provider().writes[0].sequence, Sequence::new(3));

    // The late answer for the first layout is drained and dropped.
    thread::sleep(Duration::from_millis(200));
    session.pump();
    assert_eq!(session.phase(), ControllerPhase::WriteCompleted);
    assert_eq!(session.provider().writes.len(), 1);
    assert_eq!(session.store().attributes.last(), Some(&landscape));
    shutdown(&mut session);
}

#[test]
fn invalid_selection_blocks_until_fixed() {
    init_logging();
    let dir = tempdir().unwrap();
    let mut session = session(&dir, "9", 3);

    session.update(a4());
    settle(&mut session);
    assert_eq!(session.phase(), ControllerPhase::LayoutCompleted);
    assert!(session.provider().writes.is_empty());

    session.caller_mut().selection = "3".into();
    session.refresh_selection();
    settle(&mut session);
    assert_eq!(
        session.provider().writes.last().map(|w| w.pages.clone()),
        Some(vec![PageRange::single(2)])
    );
    shutdown(&mut session);
}

#[test]
fn cancel_mid_layout_closes_on_answer() {
    init_logging();
    let dir = tempdir().unwrap();
    let mut session = session(&dir, "", 2);
    session.provider().delay_layouts(&[Duration::from_millis(50)]);

    session.update(a4());
    session.cancel();
    assert_eq!(session.editor_state(), EditorState::Cancelled);
    assert!(!session.is_closed());

    assert!(session.wait_for_response(WAIT).unwrap());
    assert_eq!(session.closed_state(), Some(&PrintJobState::Cancelled));
    assert!(session.provider().writes.is_empty());
    assert!(session.provider().finished);
    shutdown(&mut session);
}

#[test]
fn export_copies_rendered_artifact() {
    init_logging();
    let dir = tempdir().unwrap();
    let mut session = session(&dir, "1-2", 4);
    session.caller_mut().export = true;

    session.confirm_print();
    settle(&mut session);
    assert!(session.is_awaiting_export());
    assert_eq!(session.caller().export_prompts, 1);

    let target = dir.path().join("exported.out");
    let mut file = fs::File::create(&target).unwrap();
    let copied = session.export_to(&mut file).unwrap();
    drop(file);

    assert_eq!(fs::read_to_string(&target).unwrap(), "page 0\npage 1\n");
    assert_eq!(copied, 14);
    assert_eq!(session.closed_state(), Some(&PrintJobState::Cancelled));
    shutdown(&mut session);
}

/// Closes the session and waits for stray provider threads so the tempdir
/// outlives their writers.
fn shutdown(session: &mut Session) {
    session.close();
    session.provider_mut().join();
}
