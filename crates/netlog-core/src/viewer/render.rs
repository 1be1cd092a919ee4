//! Render sink: the display surface fed by the packet interpreter.
//!
//! Entries are appended, never rewritten. Filtering toggles per-entry
//! visibility flags (rendered as `hidden-channel` / `hidden-verbosity`
//! classes) instead of removing entries. `HtmlSurface` keeps per-channel and
//! per-severity index lists so a toggle only touches the entries it affects.
//!
//! Export format, one element per line:
//! ```text
//! <input type="hidden" id="channel-subscriptions" value="core,net" data-hidden="gfx" data-verbosity="3">
//! <div class="message normal" data-channel="core" data-severity="0">…</div>
//! <div class="error" data-severity="3">…</div>
//! ```
//!
//! Channel lists are comma separated; `,` and `\` inside a name are
//! backslash-escaped. A header without `data-hidden` hides every entry whose
//! channel is missing from `value`.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::OnceLock;

use html_escape::{decode_html_entities, encode_double_quoted_attribute, encode_text};
use regex::Regex;

use crate::error::{ErrorCode, NetlogError, Result};
use crate::protocol::packet::{MsgType, MAX_SEVERITY};

use super::channels::{ChannelEntry, Rgb};
use super::filter::{severity_visible, FilterState};

pub const SUBSCRIPTIONS_ID: &str = "channel-subscriptions";

/// One rendered log statement, as produced by the interpreter.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderEntry {
    pub channel: String,
    pub severity: u8,
    pub style: MsgType,
    pub timestamp: String,
    pub color: Rgb,
    /// Message body, already converted to markup.
    pub body: String,
    /// `file:line`, only for severe enough statements.
    pub caption: Option<String>,
}

/// Initial visibility of an appended entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub channel: bool,
    pub verbosity: bool,
}

/// Metadata embedded in an exported session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMeta {
    /// Known channels that are selected.
    pub subscriptions: Vec<String>,
    /// Channels the user deselected.
    pub hidden: Vec<String>,
    pub verbosity: u8,
}

pub trait RenderSink {
    fn append(&mut self, entry: RenderEntry, vis: Visibility);
    /// Visible inline error entry; never filtered.
    fn append_error(&mut self, code: ErrorCode, text: &str);
    fn clear(&mut self);
    /// Channel set replaced; rebuild the channel filter controls.
    fn channels_changed(&mut self, channels: &[ChannelEntry]);
    fn set_channel_visible(&mut self, channel: &str, visible: bool);
    /// Recompute channel visibility of every entry.
    fn apply_channel_filter(&mut self, filter: &FilterState);
    fn set_verbosity(&mut self, threshold: u8);
    fn export(&self, meta: &SessionMeta) -> String;
    /// Replace the surface with an exported session and return its metadata.
    fn import(&mut self, fragment: &str) -> Result<SessionMeta>;
}

#[derive(Debug, Clone)]
struct Item {
    class: String,
    channel: Option<String>,
    severity: u8,
    inner: String,
    hidden_channel: bool,
    hidden_verbosity: bool,
}

impl Item {
    fn visible(&self) -> bool {
        !self.hidden_channel && !self.hidden_verbosity
    }

    fn to_line(&self) -> String {
        let mut line = String::with_capacity(self.inner.len() + 96);
        let _ = write!(line, "<div class=\"{}", self.class);
        if self.hidden_channel {
            line.push_str(" hidden-channel");
        }
        if self.hidden_verbosity {
            line.push_str(" hidden-verbosity");
        }
        line.push('"');
        if let Some(ch) = &self.channel {
            let _ = write!(line, " data-channel=\"{}\"", encode_double_quoted_attribute(ch));
        }
        let _ = write!(line, " data-severity=\"{}\">{}</div>", self.severity, self.inner);
        line
    }
}

/// In-memory HTML display surface.
#[derive(Debug)]
pub struct HtmlSurface {
    items: Vec<Item>,
    by_channel: HashMap<String, Vec<usize>>,
    by_severity: [Vec<usize>; 4],
    verbosity: u8,
    channels: Vec<ChannelEntry>,
}

impl Default for HtmlSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlSurface {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            by_channel: HashMap::new(),
            by_severity: Default::default(),
            verbosity: MAX_SEVERITY,
            channels: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Channel options currently offered by the filter controls.
    pub fn channel_options(&self) -> &[ChannelEntry] {
        &self.channels
    }

    /// Inner markup of every visible entry, in order.
    pub fn visible(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter(|i| i.visible())
            .map(|i| i.inner.as_str())
            .collect()
    }

    /// Full element lines (with visibility classes), in order.
    pub fn lines(&self) -> Vec<String> {
        self.items.iter().map(Item::to_line).collect()
    }

    fn push_item(&mut self, item: Item) {
        let idx = self.items.len();
        if let Some(ch) = &item.channel {
            self.by_channel.entry(ch.clone()).or_default().push(idx);
        }
        if let Some(list) = self.by_severity.get_mut(usize::from(item.severity)) {
            list.push(idx);
        }
        self.items.push(item);
    }
}

/// Escaped text with line breaks flattened; exported entries are one per line.
fn one_line(text: &str) -> String {
    encode_text(text).replace(['\n', '\r'], " ")
}

fn entry_inner(entry: &RenderEntry) -> String {
    let mut inner = String::with_capacity(entry.body.len() + 128);
    let _ = write!(
        inner,
        "<span class=\"timestamp\">[{}]</span><span class=\"channel\" style=\"color:{}\">[{}]</span> ",
        one_line(&entry.timestamp),
        entry.color,
        one_line(&entry.channel),
    );
    if let Some(caption) = &entry.caption {
        let _ = write!(inner, "<span class=\"caption\">@ {}</span> ", one_line(caption));
    }
    inner.push_str(&entry.body);
    inner
}

impl RenderSink for HtmlSurface {
    fn append(&mut self, entry: RenderEntry, vis: Visibility) {
        let item = Item {
            class: format!("message {}", entry.style.class_name()),
            channel: Some(entry.channel.clone()),
            severity: entry.severity.min(MAX_SEVERITY),
            inner: entry_inner(&entry),
            hidden_channel: !vis.channel,
            hidden_verbosity: !vis.verbosity,
        };
        self.push_item(item);
    }

    fn append_error(&mut self, code: ErrorCode, text: &str) {
        let item = Item {
            class: "error".into(),
            channel: None,
            severity: MAX_SEVERITY,
            inner: format!("[{}] {}", code.as_str(), one_line(text)),
            hidden_channel: false,
            hidden_verbosity: false,
        };
        self.push_item(item);
    }

    fn clear(&mut self) {
        self.items.clear();
        self.by_channel.clear();
        for list in &mut self.by_severity {
            list.clear();
        }
    }

    fn channels_changed(&mut self, channels: &[ChannelEntry]) {
        self.channels = channels.to_vec();
    }

    fn set_channel_visible(&mut self, channel: &str, visible: bool) {
        if let Some(indices) = self.by_channel.get(channel) {
            for &i in indices {
                if let Some(item) = self.items.get_mut(i) {
                    item.hidden_channel = !visible;
                }
            }
        }
        for opt in &mut self.channels {
            if opt.name == channel {
                opt.enabled = visible;
            }
        }
    }

    fn apply_channel_filter(&mut self, filter: &FilterState) {
        for (channel, indices) in &self.by_channel {
            let hidden = !filter.is_selected(channel);
            for &i in indices {
                if let Some(item) = self.items.get_mut(i) {
                    item.hidden_channel = hidden;
                }
            }
        }
    }

    fn set_verbosity(&mut self, threshold: u8) {
        let old = self.verbosity;
        let new = threshold.min(MAX_SEVERITY);
        for severity in 0..=MAX_SEVERITY {
            let shown = severity_visible(new, severity);
            if severity_visible(old, severity) == shown {
                continue;
            }
            if let Some(indices) = self.by_severity.get(usize::from(severity)) {
                for &i in indices {
                    if let Some(item) = self.items.get_mut(i) {
                        if item.channel.is_some() {
                            item.hidden_verbosity = !shown;
                        }
                    }
                }
            }
        }
        self.verbosity = new;
    }

    fn export(&self, meta: &SessionMeta) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "<input type=\"hidden\" id=\"{SUBSCRIPTIONS_ID}\" value=\"{}\" data-hidden=\"{}\" data-verbosity=\"{}\">",
            encode_double_quoted_attribute(&join_names(&meta.subscriptions)),
            encode_double_quoted_attribute(&join_names(&meta.hidden)),
            meta.verbosity.min(MAX_SEVERITY),
        );
        for item in &self.items {
            out.push_str(&item.to_line());
            out.push('\n');
        }
        out
    }

    fn import(&mut self, fragment: &str) -> Result<SessionMeta> {
        let mut lines = fragment.lines().map(str::trim).filter(|l| !l.is_empty());

        let header = lines
            .next()
            .ok_or_else(|| NetlogError::BadSession("empty session file".into()))?;
        let caps = header_re()
            .captures(header)
            .ok_or_else(|| NetlogError::BadSession("missing channel subscription field".into()))?;

        let subscriptions = split_names(&decode_html_entities(caps.get(1).map_or("", |m| m.as_str())));
        let explicit_hidden = caps
            .get(2)
            .map(|m| split_names(&decode_html_entities(m.as_str())));
        let verbosity = caps
            .get(3)
            .and_then(|m| m.as_str().parse::<u8>().ok())
            .unwrap_or(MAX_SEVERITY)
            .min(MAX_SEVERITY);

        let mut items = Vec::new();
        for (n, line) in lines.enumerate() {
            let caps = entry_re().captures(line).ok_or_else(|| {
                NetlogError::BadSession(format!("unrecognized entry on line {}", n + 2))
            })?;
            let class = caps
                .get(1)
                .map_or("", |m| m.as_str())
                .split_whitespace()
                .filter(|c| !c.starts_with("hidden-"))
                .collect::<Vec<_>>()
                .join(" ");
            let channel = caps
                .get(2)
                .map(|m| decode_html_entities(m.as_str()).into_owned());
            let severity = caps
                .get(3)
                .and_then(|m| m.as_str().parse::<u8>().ok())
                .unwrap_or(MAX_SEVERITY);
            let inner = caps.get(4).map_or("", |m| m.as_str()).to_owned();

            let hidden_channel = channel.as_deref().is_some_and(|ch| match &explicit_hidden {
                Some(hidden) => hidden.iter().any(|h| h == ch),
                None => !subscriptions.iter().any(|s| s == ch),
            });
            let hidden_verbosity = channel.is_some() && !severity_visible(verbosity, severity);

            items.push(Item {
                class,
                channel,
                severity,
                inner,
                hidden_channel,
                hidden_verbosity,
            });
        }

        let hidden = match explicit_hidden {
            Some(hidden) => hidden,
            None => {
                let mut hidden: Vec<String> = items
                    .iter()
                    .filter(|i| i.hidden_channel)
                    .filter_map(|i| i.channel.clone())
                    .collect();
                hidden.sort();
                hidden.dedup();
                hidden
            }
        };

        self.clear();
        self.verbosity = verbosity;
        for item in items {
            self.push_item(item);
        }
        tracing::debug!(entries = self.items.len(), channels = subscriptions.len(), "session imported");

        Ok(SessionMeta { subscriptions, hidden, verbosity })
    }
}

fn join_names(names: &[String]) -> String {
    let mut out = String::new();
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        for c in name.chars() {
            if c == ',' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
    }
    out
}

fn split_names(list: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cur = String::new();
    let mut chars = list.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => cur.extend(chars.next()),
            ',' => names.push(std::mem::take(&mut cur)),
            c => cur.push(c),
        }
    }
    names.push(cur);
    names.retain(|n| !n.is_empty());
    names
}

#[allow(clippy::expect_used)]
fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^<input type="hidden" id="channel-subscriptions" value="([^"]*)"(?: data-hidden="([^"]*)")?(?: data-verbosity="([0-9])")?>$"#,
        )
        .expect("static regex")
    })
}

#[allow(clippy::expect_used)]
fn entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^<div class="([^"]*)"(?: data-channel="([^"]*)")? data-severity="([0-3])">(.*)</div>$"#)
            .expect("static regex")
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn entry(channel: &str, severity: u8, body: &str) -> RenderEntry {
        RenderEntry {
            channel: channel.into(),
            severity,
            style: MsgType::Normal,
            timestamp: "1.5".into(),
            color: Rgb(1, 2, 3),
            body: body.into(),
            caption: None,
        }
    }

    const SHOWN: Visibility = Visibility { channel: true, verbosity: true };

    #[test]
    fn entry_markup_carries_timestamp_channel_and_caption() {
        let mut s = HtmlSurface::new();
        let mut e = entry("core", 2, "boot");
        e.caption = Some("main.cpp:10".into());
        s.append(e, SHOWN);

        let line = &s.lines()[0];
        assert!(line.starts_with("<div class=\"message normal\" data-channel=\"core\" data-severity=\"2\">"));
        assert!(line.contains("[1.5]"));
        assert!(line.contains("color:#010203"));
        assert!(line.contains("@ main.cpp:10"));
        assert!(line.ends_with("boot</div>"));
    }

    #[test]
    fn channel_toggle_only_touches_that_channel() {
        let mut s = HtmlSurface::new();
        s.append(entry("a", 3, "a1"), SHOWN);
        s.append(entry("b", 3, "b1"), SHOWN);
        s.append(entry("a", 3, "a2"), SHOWN);

        s.set_channel_visible("a", false);
        assert_eq!(s.visible().len(), 1);
        assert!(s.visible()[0].ends_with("b1"));
        assert!(s.lines()[0].contains("hidden-channel"));

        s.set_channel_visible("a", true);
        assert_eq!(s.visible().len(), 3);
    }

    #[test]
    fn verbosity_changes_follow_threshold() {
        let mut s = HtmlSurface::new();
        for sev in 0..=3 {
            s.append(entry("c", sev, &format!("s{sev}")), SHOWN);
        }
        s.append_error(ErrorCode::BadPacket, "oops");

        s.set_verbosity(0);
        // severity 3 and the error entry remain
        assert_eq!(s.visible().len(), 2);

        s.set_verbosity(2);
        assert_eq!(s.visible().len(), 4);

        s.set_verbosity(3);
        assert_eq!(s.visible().len(), 5);
    }

    #[test]
    fn error_entries_are_escaped() {
        let mut s = HtmlSurface::new();
        s.append_error(ErrorCode::BadPacket, "<script>");
        assert_eq!(s.visible(), vec!["[BAD_PACKET] &lt;script&gt;"]);
    }

    #[test]
    fn export_then_import_restores_entries_and_meta() {
        let mut s = HtmlSurface::new();
        s.append(entry("core", 3, "kept"), SHOWN);
        s.append(entry("gfx", 3, "filtered"), SHOWN);
        s.append(entry("core", 0, "quiet"), SHOWN);
        s.set_channel_visible("gfx", false);
        s.set_verbosity(2);
        let before = s.visible().into_iter().map(str::to_owned).collect::<Vec<_>>();

        let meta = SessionMeta {
            subscriptions: vec!["core".into()],
            hidden: vec!["gfx".into()],
            verbosity: 2,
        };
        let exported = s.export(&meta);

        let mut t = HtmlSurface::new();
        let back = t.import(&exported).unwrap();
        assert_eq!(back, meta);
        assert_eq!(t.len(), 3);
        assert_eq!(t.visible(), before);
    }

    #[test]
    fn channel_names_with_separators_survive_export() {
        let mut s = HtmlSurface::new();
        s.append(entry("a,b", 3, "x"), SHOWN);
        s.append(entry("c\\d", 3, "y"), SHOWN);
        s.set_channel_visible("c\\d", false);

        let meta = SessionMeta {
            subscriptions: vec!["a,b".into(), "plain".into()],
            hidden: vec!["c\\d".into()],
            verbosity: 3,
        };
        let exported = s.export(&meta);
        assert!(exported.starts_with(r#"<input type="hidden" id="channel-subscriptions" value="a\,b,plain" data-hidden="c\\d""#));

        let mut t = HtmlSurface::new();
        assert_eq!(t.import(&exported).unwrap(), meta);
        assert_eq!(t.visible().len(), 1);
        assert!(t.visible()[0].ends_with('x'));
    }

    #[test]
    fn header_without_hidden_list_hides_unsubscribed_entries() {
        let fragment = concat!(
            r#"<input type="hidden" id="channel-subscriptions" value="core" data-verbosity="3">"#,
            "\n",
            r#"<div class="message normal" data-channel="core" data-severity="3">c</div>"#,
            "\n",
            r#"<div class="message normal" data-channel="gfx" data-severity="3">g</div>"#,
        );
        let mut s = HtmlSurface::new();
        let meta = s.import(fragment).unwrap();
        assert_eq!(meta.hidden, ["gfx"]);
        assert_eq!(s.visible(), vec!["c"]);
    }

    #[test]
    fn import_rejects_foreign_html() {
        let mut s = HtmlSurface::new();
        let err = s.import("<p>hello</p>").unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadSession);

        let err = s.import("").unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadSession);
    }

    #[test]
    fn clear_empties_the_surface() {
        let mut s = HtmlSurface::new();
        s.append(entry("a", 0, "x"), SHOWN);
        s.clear();
        assert!(s.is_empty());
        s.set_channel_visible("a", false);
        assert!(s.visible().is_empty());
    }
}
