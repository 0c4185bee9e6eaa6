//! HTML pages with an exact, pre-declared content length.

pub mod composer;
pub mod fragments;
pub mod html;

pub use composer::{PageEnvelope, PageWriter};
pub use fragments::PAGE_BUFFER_SIZE;
