//! The KEW.PS-8 indent form.
//!
//! [`FormBuilder`] lays out one source group as a single A4 landscape page
//! carrying two identical copies side by side; [`IndentForm::to_pdf`]
//! serialises the result.

mod builder;
mod layout;
mod metrics;
mod pdf;

use std::path::PathBuf;

use thiserror::Error;

pub use builder::{FormBuilder, Signatories, Signatory, SignatureImage};
pub use layout::{DrawOp, FormRow, IndentForm, COPY_LABELS, PAGE_HEIGHT, PAGE_WIDTH};
pub use metrics::Font;

/// Form building errors.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("Invalid signature image: {0}")]
    InvalidImage(String),

    #[error("Cannot read signature file {path}: {source}")]
    SignatureFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FormResult<T> = Result<T, FormError>;

/// Smallest JPEG header the frame parser accepts.
#[cfg(test)]
pub(crate) fn tiny_jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00];
    data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 0x08]);
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&[0x01, 0x01, 0x11, 0x00]);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}
