//! HTML report generation
//!
//! The report is a single paragraph of extracted text followed by one
//! `<img>` per visual element. Text and attribute values are escaped.

use base64::{engine::general_purpose, Engine as _};
use std::path::Path;

/// Suggested file name for the downloadable report
pub const REPORT_FILENAME: &str = "output.html";

/// MIME type of the report
pub const REPORT_MIME: &str = "text/html";

/// Escape the characters HTML reserves in text and attribute values
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn document(text: &str, sources: impl IntoIterator<Item = String>) -> String {
    let mut html = String::from("<html><body>");
    html.push_str("<p>");
    html.push_str(&escape_html(text));
    html.push_str("</p>");
    for src in sources {
        html.push_str("<img src=\"");
        html.push_str(&escape_html(&src));
        html.push_str("\" />");
    }
    html.push_str("</body></html>");
    html
}

/// Render the report with `<img>` tags referencing each element path
///
/// Pure: the same arguments always produce the same string.
pub fn render<P: AsRef<Path>>(text: &str, element_paths: &[P]) -> String {
    document(
        text,
        element_paths
            .iter()
            .map(|p| p.as_ref().to_string_lossy().into_owned()),
    )
}

/// Render the report with every element inlined as a PNG data URI
///
/// The result stays viewable after the element files are deleted.
pub fn render_embedded<B: AsRef<[u8]>>(text: &str, element_pngs: &[B]) -> String {
    document(text, element_pngs.iter().map(|png| png_data_url(png.as_ref())))
}

/// `data:` URI for PNG bytes
pub fn png_data_url(png: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(png)
    )
}
