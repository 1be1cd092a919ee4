//! ANSI escape → HTML markup conversion.
//!
//! Producers color their messages with SGR sequences (mostly 24-bit
//! `ESC[1;38;2;r;g;bm` and `ESC[0m`). `AnsiHtml` maps them to inline-styled
//! `<span>`s, escapes the text, and turns newlines into `<br>` so a rendered
//! body never spans several lines. Byte-level parsing is done by `vte`; any
//! sequence other than SGR is dropped.

use std::fmt::Write;

use vte::{Params, Parser, Perform};

use super::channels::Rgb;

/// Converts a raw message body into markup.
pub trait MarkupConverter: Send {
    fn to_markup(&self, raw: &[u8]) -> String;
}

/// Default SGR → `<span style=…>` converter.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnsiHtml;

impl AnsiHtml {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Style {
    fg: Option<Rgb>,
    bg: Option<Rgb>,
    bold: bool,
    italic: bool,
    underline: bool,
}

impl Style {
    fn is_plain(&self) -> bool {
        *self == Style::default()
    }

    fn css(&self) -> String {
        let mut css = String::new();
        if let Some(c) = self.fg {
            let _ = write!(css, "color:{c};");
        }
        if let Some(c) = self.bg {
            let _ = write!(css, "background-color:{c};");
        }
        if self.bold {
            css.push_str("font-weight:bold;");
        }
        if self.italic {
            css.push_str("font-style:italic;");
        }
        if self.underline {
            css.push_str("text-decoration:underline;");
        }
        css
    }

    /// Apply one SGR sequence. Each group is a parameter with its
    /// colon-separated subparameters (`38:2:r:g:b` arrives as one group).
    fn apply_sgr(&mut self, params: &[&[u16]]) {
        if params.is_empty() {
            *self = Style::default();
            return;
        }

        let mut it = params.iter();
        while let Some(group) = it.next() {
            let Some((&p, sub)) = group.split_first() else {
                continue;
            };
            match p {
                0 => *self = Style::default(),
                1 => self.bold = true,
                3 => self.italic = true,
                4 => self.underline = true,
                22 => self.bold = false,
                23 => self.italic = false,
                24 => self.underline = false,
                30..=37 => self.fg = Some(ansi16(p - 30)),
                90..=97 => self.fg = Some(ansi16(p - 90 + 8)),
                40..=47 => self.bg = Some(ansi16(p - 40)),
                100..=107 => self.bg = Some(ansi16(p - 100 + 8)),
                39 => self.fg = None,
                49 => self.bg = None,
                38 | 48 => {
                    let color = if sub.is_empty() {
                        extended_color(|| it.next().and_then(|g| g.first().copied()))
                    } else {
                        subparam_color(sub)
                    };
                    if p == 38 {
                        self.fg = color.or(self.fg);
                    } else {
                        self.bg = color.or(self.bg);
                    }
                }
                _ => {}
            }
        }
    }
}

/// `38;2;r;g;b` / `38;5;n`: the color spec spans the following parameters.
fn extended_color(mut next: impl FnMut() -> Option<u16>) -> Option<Rgb> {
    match next()? {
        2 => {
            let (r, g, b) = (next()?, next()?, next()?);
            Some(Rgb(clamp8(r), clamp8(g), clamp8(b)))
        }
        5 => next().map(ansi256),
        _ => None,
    }
}

/// `38:2:r:g:b`, `38:2:<colorspace>:r:g:b` or `38:5:n`.
fn subparam_color(sub: &[u16]) -> Option<Rgb> {
    match *sub {
        [2, r, g, b] | [2, _, r, g, b, ..] => Some(Rgb(clamp8(r), clamp8(g), clamp8(b))),
        [5, i, ..] => Some(ansi256(i)),
        _ => None,
    }
}

fn clamp8(v: u16) -> u8 {
    v.min(255) as u8
}

const ANSI16: [Rgb; 16] = [
    Rgb(0, 0, 0),
    Rgb(205, 49, 49),
    Rgb(13, 188, 121),
    Rgb(229, 229, 16),
    Rgb(36, 114, 200),
    Rgb(188, 63, 188),
    Rgb(17, 168, 205),
    Rgb(229, 229, 229),
    Rgb(102, 102, 102),
    Rgb(241, 76, 76),
    Rgb(35, 209, 139),
    Rgb(245, 245, 67),
    Rgb(59, 142, 234),
    Rgb(214, 112, 214),
    Rgb(41, 184, 219),
    Rgb(255, 255, 255),
];

fn ansi16(i: u16) -> Rgb {
    ANSI16.get(usize::from(i)).copied().unwrap_or(Rgb(255, 255, 255))
}

fn ansi256(i: u16) -> Rgb {
    match i {
        0..=15 => ansi16(i),
        16..=231 => {
            let i = i - 16;
            let level = |v: u16| if v == 0 { 0 } else { (55 + v * 40) as u8 };
            Rgb(level(i / 36), level((i / 6) % 6), level(i % 6))
        }
        232..=255 => {
            let v = (8 + (i - 232) * 10) as u8;
            Rgb(v, v, v)
        }
        _ => Rgb(255, 255, 255),
    }
}

impl MarkupConverter for AnsiHtml {
    fn to_markup(&self, raw: &[u8]) -> String {
        let mut writer = HtmlWriter::with_capacity(raw.len() + 16);
        Parser::new().advance(&mut writer, raw);
        writer.finish()
    }
}

/// `vte` callbacks: printable text is collected into runs, SGR switches the
/// open span, `\n` becomes `<br>`.
struct HtmlWriter {
    out: String,
    run: String,
    style: Style,
    span_open: bool,
}

impl HtmlWriter {
    fn with_capacity(cap: usize) -> Self {
        Self {
            out: String::with_capacity(cap),
            run: String::new(),
            style: Style::default(),
            span_open: false,
        }
    }

    fn flush_run(&mut self) {
        if !self.run.is_empty() {
            self.out.push_str(&html_escape::encode_text(self.run.as_str()));
            self.run.clear();
        }
    }

    fn switch_style(&mut self, next: Style) {
        if next == self.style {
            return;
        }
        self.flush_run();
        if self.span_open {
            self.out.push_str("</span>");
            self.span_open = false;
        }
        if !next.is_plain() {
            let _ = write!(self.out, "<span style=\"{}\">", next.css());
            self.span_open = true;
        }
        self.style = next;
    }

    fn finish(mut self) -> String {
        self.flush_run();
        if self.span_open {
            self.out.push_str("</span>");
        }
        self.out
    }
}

impl Perform for HtmlWriter {
    fn print(&mut self, c: char) {
        self.run.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => {
                self.flush_run();
                self.out.push_str("<br>");
            }
            b'\t' => self.run.push('\t'),
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, action: char) {
        if action != 'm' || ignore || !intermediates.is_empty() {
            return;
        }
        let groups: Vec<&[u16]> = params.iter().collect();
        let mut next = self.style;
        next.apply_sgr(&groups);
        self.switch_style(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(s: &str) -> String {
        AnsiHtml::new().to_markup(s.as_bytes())
    }

    #[test]
    fn plain_text_is_escaped() {
        assert_eq!(html("a < b & c"), "a &lt; b &amp; c");
    }

    #[test]
    fn truecolor_span_and_reset() {
        assert_eq!(
            html("\x1b[1;38;2;255;0;0mbad\x1b[0m ok"),
            "<span style=\"color:#ff0000;font-weight:bold;\">bad</span> ok"
        );
    }

    #[test]
    fn trailing_reset_closes_span() {
        let out = html("\x1b[1;38;2;0;255;0mgood\x1b[0m");
        assert_eq!(out, "<span style=\"color:#00ff00;font-weight:bold;\">good</span>");
    }

    #[test]
    fn unterminated_style_is_closed() {
        let out = html("\x1b[31mred");
        assert!(out.ends_with("red</span>"));
    }

    #[test]
    fn newlines_become_breaks() {
        assert_eq!(html("one\r\ntwo\n"), "one<br>two<br>");
    }

    #[test]
    fn non_sgr_sequences_are_dropped() {
        assert_eq!(html("\x1b[2Kclean\x1b[1A"), "clean");
    }

    #[test]
    fn colon_subparameters_are_honored() {
        assert_eq!(
            html("\x1b[38:2:255:0:0mred\x1b[0m"),
            "<span style=\"color:#ff0000;\">red</span>"
        );
        assert_eq!(
            html("\x1b[48:2::0:0:255;4mx"),
            "<span style=\"background-color:#0000ff;text-decoration:underline;\">x</span>"
        );
        assert_eq!(
            html("\x1b[38:5:196mhot"),
            "<span style=\"color:#ff0000;\">hot</span>"
        );
    }

    #[test]
    fn osc_and_charset_escapes_do_not_leak() {
        assert_eq!(html("\x1b]0;title\x07ab\x1b(Bc\tz"), "abc\tz");
    }

    #[test]
    fn palette_colors() {
        assert_eq!(ansi256(196), Rgb(255, 0, 0));
        assert_eq!(ansi256(232), Rgb(8, 8, 8));
        assert_eq!(ansi256(1), Rgb(205, 49, 49));
    }
}
