//! markcrop-export: document composition for extracted crops (sans-IO)
//!
//! Embeds the ordered crop artifacts of a batch into generated
//! documents. Currently supports LaTeX.

pub mod latex;

pub use latex::{FigureOptions, LatexError, extract_document, figures, insert_figures};
