//! InkRoom Render Library
//!
//! Paints scenes onto a [`Surface`]. The recording surface works anywhere;
//! the Vello surface is behind the `vello-renderer` feature.

mod renderer;
mod surface;

#[cfg(feature = "vello-renderer")]
mod vello_impl;

pub use renderer::{GridStyle, RenderContext, RenderResult, Renderer, RendererError, arrowhead, stroke_for};
pub use surface::{DrawCommand, RecordingSurface, Surface};

#[cfg(feature = "vello-renderer")]
pub use vello_impl::VelloSurface;
