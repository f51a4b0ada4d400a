//! Placeholder tiles.
//!
//! A placeholder is an inline SVG carrying the product's own label, shown
//! when an image has no usable URL or its bytes did not decode.

use std::fmt::Write;

const WIDTH: u32 = 480;
const HEIGHT: u32 = 480;
const MAX_LABEL_CHARS: usize = 48;

/// Placeholder graphic for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    label: String,
}

impl Placeholder {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The SVG document.
    pub fn to_svg(&self) -> String {
        let label = truncate(self.label.trim(), MAX_LABEL_CHARS);
        format!(
            "<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 {w} {h}'>\
             <rect width='{w}' height='{h}' fill='#f2f0eb'/>\
             <circle cx='{cx}' cy='190' r='56' fill='none' stroke='#c9c3b6' stroke-width='6'/>\
             <text x='{cx}' y='330' text-anchor='middle' font-size='22' \
             font-family='ui-sans-serif,system-ui,sans-serif' fill='#5b5648'>{label}</text>\
             </svg>",
            w = WIDTH,
            h = HEIGHT,
            cx = WIDTH / 2,
            label = escape_xml(&label),
        )
    }

    /// The SVG as a `data:` URI usable directly as an image source.
    pub fn to_data_uri(&self) -> String {
        let svg = self.to_svg();
        let mut uri = String::with_capacity(svg.len() + 64);
        uri.push_str("data:image/svg+xml,");
        for c in svg.chars() {
            match c {
                '<' | '>' | '#' | '%' | '"' | '{' | '}' | '|' | '\\' | '^' | '`' => {
                    let _ = write!(uri, "%{:02X}", c as u32);
                }
                c if c.is_ascii_control() || !c.is_ascii() => {
                    let mut buf = [0u8; 4];
                    for byte in c.encode_utf8(&mut buf).bytes() {
                        let _ = write!(uri, "%{:02X}", byte);
                    }
                }
                c => uri.push(c),
            }
        }
        uri
    }
}

fn truncate(label: &str, max_chars: usize) -> String {
    match label.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &label[..cut]),
        None => label.to_string(),
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}
