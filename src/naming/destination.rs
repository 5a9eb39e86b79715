use crate::GroupedBook;

/// Longest folder or file-base name we will emit. Calibre titles can run far
/// past what some filesystems accept once author and series are prepended.
const MAX_NAME_LEN: usize = 100;

/// Computes destination folder and file-base names from a classified book.
pub struct DestinationNamer;

impl DestinationNamer {
    pub fn new() -> Self {
        Self
    }

    /// Returns `(dest_folder, dest_file_name_base)`. The base carries no
    /// extension; the planner appends one per accepted format.
    pub fn name(&self, book: &GroupedBook) -> (String, String) {
        let folder = sanitize(&book.group_key);
        let base = match (book.is_series, book.display_index) {
            (true, Some(index)) => format!(
                "Volume {} - {}",
                format_volume(index, book.index_pad),
                book.clean_title
            ),
            _ => book.clean_title.clone(),
        };
        (folder, sanitize(&base))
    }
}

impl Default for DestinationNamer {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace characters illegal on common filesystems with `-`, trim edge
/// whitespace and trailing dots, and clamp length.
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            other => other,
        })
        .collect();
    let trimmed = replaced.trim().trim_end_matches('.').trim_end();
    let clamped: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    // The clamp can cut right after a space or dot; those are just as
    // illegal at the end of a truncated name.
    clamped
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Zero-pad the integer part to `pad` digits; a fractional part is kept
/// verbatim after the dot, so with pad 2: 1 -> "01", 2.5 -> "02.5".
fn format_volume(index: f64, pad: usize) -> String {
    let int_part = index.trunc() as i64;
    if index.fract() == 0.0 {
        format!("{:0pad$}", int_part, pad = pad)
    } else {
        let rendered = index.to_string();
        let frac = rendered.split('.').nth(1).unwrap_or("0");
        format!("{:0pad$}.{}", int_part, frac, pad = pad)
    }
}
