//! Driver layer for synthetic browser interaction.
//!
//! This crate exposes the rendering abstraction, its WebDriver and in-memory
//! backends, and the interaction helpers that run on top of either.
//!
//! - [`trace_browser::renderer::Renderer`]: point queries, tree walks and event dispatch
//! - [`trace_browser::driver::TraceDriver`]: WebDriver client wrapper
//! - [`trace_browser::page::WebDriverPage`]: `Renderer` over a live browser tab
//! - [`trace_browser::memory::MemoryPage`]: deterministic `Renderer` for tests
//! - [`trace_browser::behavioral::BehavioralEngine`]: click timing and cancellation
//! - [`trace_browser::helpers::InteractionHelpers`]: clicks, combo boxes, clickables, controls
pub mod trace_browser;

pub use trace_browser::behavioral::{
    sleep, BehavioralEngine, ClickHandle, ClickOutcome, InteractionTiming,
};
pub use trace_browser::combo::{DropdownItem, DropdownOutcome};
pub use trace_browser::controls::{Control, ControlKind};
pub use trace_browser::geometry::{Point, Rect};
pub use trace_browser::helpers::InteractionHelpers;
pub use trace_browser::renderer::Renderer;
