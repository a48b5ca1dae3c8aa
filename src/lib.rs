// flagframe - Frame still or animated images with a rotating flag
// Decodes the source, tracks what changed and repaints once per refresh when needed

pub mod app;
pub mod config;
pub mod decoder;
pub mod export;
pub mod flags;
pub mod image_loader;
pub mod quality;
pub mod renderer;
pub mod scheduler;
pub mod storage;

pub use app::{Action, AppState, LoadTicket, RenderParams, Source};
pub use config::Config;
pub use decoder::{decode, DecodeError, DecodedSource, Frame, Sequence, StillImage};
pub use export::{export, Export, ExportFormat};
pub use flags::Palette;
pub use image_loader::{finish_load, load_file, load_image, LoadError, LoadOutcome};
pub use quality::resolution_for;
pub use renderer::FlagPainter;
pub use scheduler::{Paint, PaintContext, PaintError, RenderScheduler, SkipReason, Surface, TickOutcome};
pub use storage::{FileNoticeStore, MemoryNoticeStore, NoticeStore};
