//! Live replacement engine: extracts text from a focused surface, streams a
//! translation into it, and rolls back when anything goes wrong.

pub mod apply;
pub mod classify;
pub mod config;
pub mod interrupt;
pub mod logging;
pub mod range;
pub mod session;
pub mod surface;

pub use apply::{FallbackSelection, MutationError, Snapshot, VerifyFailure};
pub use classify::{MutationVerdict, Strategy, SurfaceShape, classify};
pub use config::Config;
pub use range::{RangeKind, TextRange, extract};
pub use session::{Controller, SessionOutcome, SessionState, Trigger, run_session};
pub use surface::dom::{InsertMode, MemoryDocument};
pub use surface::{Anchor, ControlKind, DomRange, InputEvent, NodeId, Surface, Target};
