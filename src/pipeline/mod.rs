//! Pipeline stages shared by every provider.
//!
//! ```text
//! input ──▶ render ──▶ (providers) ──▶ normalize
//!             │
//!             └──▶ encode (HTTP payloads)
//! ```
//!
//! 1. [`input`]     validate the PDF path before anything else runs
//! 2. [`render`]    rasterise all pages; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`encode`]    base64 payloads for the engine HTTP protocol
//! 4. [`normalize`] native provider result → JSON value

pub mod encode;
pub mod input;
pub mod normalize;
pub mod render;
