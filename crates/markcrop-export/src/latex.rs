//! LaTeX figure placeholders for extracted crops.
//!
//! A generated document gets one centered `figure` environment per crop,
//! in crop order, just before `\end{document}`:
//!
//! ```text
//! \begin{figure}[h!]
//!     \centering
//!     \includegraphics[width=0.9\linewidth]{cropped_0.jpg}
//! \end{figure}
//! ```
//!
//! These are pure functions with no I/O -- they return strings.

use std::fmt::Write;

const DOCUMENT_CLASS: &str = r"\documentclass";
const END_DOCUMENT: &str = r"\end{document}";

/// Layout options for inserted figures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigureOptions {
    /// Value of the `width` key passed to `\includegraphics`.
    pub width: String,
    /// Float placement specifier.
    pub placement: String,
}

impl FigureOptions {
    /// Default image width.
    pub const DEFAULT_WIDTH: &'static str = r"0.9\linewidth";
    /// Default float placement.
    pub const DEFAULT_PLACEMENT: &'static str = "h!";
}

impl Default for FigureOptions {
    fn default() -> Self {
        Self {
            width: Self::DEFAULT_WIDTH.to_owned(),
            placement: Self::DEFAULT_PLACEMENT.to_owned(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LatexError {
    #[error("LaTeX source does not contain \\end{{document}}")]
    MissingEndDocument,
}

/// Render the figure environments for `image_names`, in order.
#[must_use]
pub fn figures<S: AsRef<str>>(image_names: &[S], options: &FigureOptions) -> String {
    let mut out = String::new();
    for name in image_names {
        // Writing to a String never fails.
        let _ = write!(
            out,
            "\n\\begin{{figure}}[{placement}]\n    \\centering\n    \\includegraphics[width={width}]{{{name}}}\n\\end{{figure}}\n",
            placement = options.placement,
            width = options.width,
            name = name.as_ref(),
        );
    }
    out
}

/// Insert one figure per image name immediately before the final
/// `\end{document}` of `document`.
///
/// The rest of the document is left untouched. An empty name list
/// returns the document unchanged.
///
/// # Errors
///
/// Returns [`LatexError::MissingEndDocument`] if `document` has no
/// `\end{document}`.
pub fn insert_figures<S: AsRef<str>>(
    document: &str,
    image_names: &[S],
    options: &FigureOptions,
) -> Result<String, LatexError> {
    let at = document
        .rfind(END_DOCUMENT)
        .ok_or(LatexError::MissingEndDocument)?;
    if image_names.is_empty() {
        return Ok(document.to_owned());
    }

    let (body, tail) = document.split_at(at);
    let mut out = String::with_capacity(document.len() + image_names.len() * 96);
    out.push_str(body);
    out.push_str(&figures(image_names, options));
    out.push('\n');
    out.push_str(tail);
    Ok(out)
}

/// Extract the complete LaTeX document embedded in `text`.
///
/// Returns the slice from the first `\documentclass` through the first
/// `\end{document}` after it, inclusive, or `None` if either marker is
/// missing. Useful for stripping commentary around a generated document.
#[must_use]
pub fn extract_document(text: &str) -> Option<&str> {
    let start = text.find(DOCUMENT_CLASS)?;
    let end = text[start..].find(END_DOCUMENT)? + start + END_DOCUMENT.len();
    Some(&text[start..end])
}
