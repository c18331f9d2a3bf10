/// Below this many characters the document is treated as unreadable (scanned or image-only).
pub const MIN_TEXT_CHARS: usize = 50;

/// Normalizes line endings and collapses runs of blank lines.
pub fn normalize(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    let mut newlines = 0usize;
    for c in unified.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out.trim().to_string()
}

pub fn is_sufficient(text: &str) -> bool {
    text.chars().count() >= MIN_TEXT_CHARS
}
