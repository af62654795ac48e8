//! Print job negotiation between a print dialog and a remote document provider.

pub mod config;
pub mod controller;
pub mod dispatch;
pub mod document;
pub mod export;
pub mod job;
pub mod provider;
pub mod session;

pub use config::{ConfigError, SpoolerConfig};
pub use controller::{
    printable_pages, CallerView, Command, LayoutMetadata, LayoutRequest, NegotiationController,
    NegotiationError, NegotiationOptions, WriteRequest,
};
pub use dispatch::{DispatchError, ProviderResponse, ResponseQueue, ResponseSender, Sequence};
pub use document::DocumentState;
pub use export::{ExportError, FileArtifact};
pub use job::{
    ContentType, ControllerPhase, DocumentInfo, DuplexMode, Margin, Orientation, PaperId,
    PaperSize, PrintAttributes, PrintColorMode, PrintJobId, PrintJobState, Resolution,
};
pub use printspool_pages::{PageRange, PageRangeError};
pub use provider::{ArtifactIo, CallerHooks, DocumentProvider, JobStore, PageSelectionSource};
pub use session::{EditorState, PrintSession};
