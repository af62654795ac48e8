use std::fmt;

/// Opaque identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrintJobId(u64);

impl PrintJobId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PrintJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "print-job-{}", self.0)
    }
}

/// Orientation of a print page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Duplex (two-sided) printing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplexMode {
    Off,
    LongEdge,
    ShortEdge,
}

/// Colour mode for the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintColorMode {
    Color,
    Grayscale,
}

/// Margin values expressed in points (1/72").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margin {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Margin {
    pub const fn zero() -> Self {
        Self {
            top: 0.0,
            bottom: 0.0,
            left: 0.0,
            right: 0.0,
        }
    }
}

/// Supported paper identifiers for quick selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaperId {
    A4,
    Letter,
    Legal,
    A3,
    Custom,
}

/// Represents a paper size in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperSize {
    pub id: PaperId,
    pub width_mm: f32,
    pub height_mm: f32,
}

impl PaperSize {
    pub const fn new(id: PaperId, width_mm: f32, height_mm: f32) -> Self {
        Self {
            id,
            width_mm,
            height_mm,
        }
    }

    pub const fn a4() -> Self {
        Self::new(PaperId::A4, 210.0, 297.0)
    }

    pub const fn letter() -> Self {
        Self::new(PaperId::Letter, 215.9, 279.4)
    }
}

/// Printer resolution in dots per inch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub horizontal_dpi: u32,
    pub vertical_dpi: u32,
}

/// Print settings negotiated with the document provider.
///
/// Unset fields mean the printer has not reported a value yet. Snapshots are
/// plain values: the controller copies them, it never shares them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PrintAttributes {
    pub paper: Option<PaperSize>,
    pub orientation: Option<Orientation>,
    pub resolution: Option<Resolution>,
    pub margins: Option<Margin>,
    pub color_mode: Option<PrintColorMode>,
    pub duplex: Option<DuplexMode>,
    pub copies: Option<u32>,
}

/// Kind of content the provider reported for the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    #[default]
    Unknown,
    Document,
    Photo,
}

/// Document metadata produced by a layout pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub name: String,
    pub content_type: ContentType,
    /// `None` when the provider cannot tell how many pages it will render.
    pub page_count: Option<u32>,
    /// Size of the rendered artifact in bytes, known only after a write.
    pub data_size: u64,
}

impl DocumentInfo {
    pub fn new(name: impl Into<String>, content_type: ContentType, page_count: Option<u32>) -> Self {
        Self {
            name: name.into(),
            content_type,
            page_count,
            data_size: 0,
        }
    }

    /// Compares the fields that matter for layout, ignoring the byte size.
    pub fn equals_ignoring_size(&self, other: &DocumentInfo) -> bool {
        self.content_type == other.content_type && self.page_count == other.page_count
    }
}

/// Lifecycle state recorded in the job store when a session closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintJobState {
    Queued,
    Cancelled,
    Failed(String),
}

/// Controller phase for the layout/write negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Initialized,
    Started,
    LayoutStarted,
    LayoutCompleted,
    WriteStarted,
    WriteCompleted,
    Finished,
    Failed,
    Cancelled,
}

impl ControllerPhase {
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            ControllerPhase::Finished | ControllerPhase::Failed | ControllerPhase::Cancelled
        )
    }
}
