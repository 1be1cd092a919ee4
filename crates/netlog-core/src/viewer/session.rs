//! Packet interpreter bound to one viewer connection.
//!
//! `ViewerSession` re-buffers transport messages through a `FrameDecoder`
//! and applies each completed packet to its `SessionState` and render sink.
//! A bad frame or packet becomes an inline error entry; the stream goes on.

use crate::error::{ErrorCode, NetlogError, Result};
use crate::protocol::frame::{FrameDecoder, DEFAULT_MAX_FRAME_BYTES};
use crate::protocol::packet::{LogRecord, Packet, MAX_SEVERITY};

use super::channels::{ChannelRegistry, NEUTRAL_COLOR};
use super::filter::FilterState;
use super::markup::{AnsiHtml, MarkupConverter};
use super::render::{RenderEntry, RenderSink, SessionMeta, Visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerOptions {
    pub max_frame_bytes: usize,
    pub default_verbosity: u8,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            default_verbosity: MAX_SEVERITY,
        }
    }
}

/// Channel registry plus filter selection for one viewer.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub registry: ChannelRegistry,
    pub filter: FilterState,
}

/// What a single packet did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Rendered,
    Error(ErrorCode),
    ChannelsReplaced(usize),
    Cleared,
    Ignored,
}

pub struct ViewerSession<S: RenderSink> {
    state: SessionState,
    decoder: FrameDecoder,
    converter: Box<dyn MarkupConverter>,
    sink: S,
    opts: ViewerOptions,
}

impl<S: RenderSink> ViewerSession<S> {
    pub fn new(sink: S) -> Self {
        Self::with_options(sink, ViewerOptions::default(), Box::new(AnsiHtml::new()))
    }

    pub fn with_options(mut sink: S, opts: ViewerOptions, converter: Box<dyn MarkupConverter>) -> Self {
        let filter = FilterState::new(opts.default_verbosity);
        sink.set_verbosity(filter.verbosity());
        Self {
            state: SessionState {
                registry: ChannelRegistry::new(),
                filter,
            },
            decoder: FrameDecoder::with_limit(opts.max_frame_bytes),
            converter,
            sink,
            opts,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn pending_len(&self) -> usize {
        self.decoder.pending_len()
    }

    /// Feed one transport message and apply every frame it completes, in order.
    pub fn on_transport_message(&mut self, text: &str) -> Vec<Applied> {
        self.decoder.push(text);
        let mut applied = Vec::new();
        while let Some(frame) = self.decoder.next_frame() {
            let outcome = match frame {
                Ok(frame) => self.interpret(&frame),
                Err(e) => self.report(&e),
            };
            applied.push(outcome);
        }
        applied
    }

    /// Apply a single decoded packet text.
    pub fn interpret(&mut self, text: &str) -> Applied {
        let packet = match Packet::parse(text) {
            Ok(p) => p,
            Err(e) => return self.report(&e),
        };

        match packet {
            Packet::Msg(record) => self.render(record),
            Packet::SetChannels { channels } => {
                self.state.registry.replace(channels);
                self.state.filter.select_all();
                self.sink.channels_changed(self.state.registry.entries());
                self.sink.apply_channel_filter(&self.state.filter);
                tracing::debug!(channels = self.state.registry.len(), "channel set replaced");
                Applied::ChannelsReplaced(self.state.registry.len())
            }
            Packet::NewConnection => {
                self.reset();
                tracing::info!("producer reconnected, session cleared");
                Applied::Cleared
            }
            Packet::Connect { peer_ip, peer_port } => {
                tracing::info!(%peer_ip, peer_port, "producer connected");
                Applied::Ignored
            }
            Packet::Disconnect => {
                tracing::info!("producer disconnecting");
                Applied::Ignored
            }
            Packet::Unknown { action } => {
                tracing::debug!(%action, "ignoring unknown action");
                Applied::Ignored
            }
        }
    }

    fn render(&mut self, record: LogRecord) -> Applied {
        let color = match self.state.registry.get(&record.channel) {
            Some(entry) => entry.color,
            None => {
                tracing::debug!(channel = %record.channel, "message for unannounced channel");
                NEUTRAL_COLOR
            }
        };

        let caption = (record.severity >= 1 && !record.file.is_empty())
            .then(|| format!("{}:{}", record.file, record.line));

        let vis = Visibility {
            channel: self.state.filter.is_selected(&record.channel),
            verbosity: self.state.filter.shows_severity(record.severity),
        };

        let entry = RenderEntry {
            body: self.converter.to_markup(&record.message),
            channel: record.channel,
            severity: record.severity,
            style: record.msg_type,
            timestamp: record.timestamp,
            color,
            caption,
        };
        self.sink.append(entry, vis);
        Applied::Rendered
    }

    fn report(&mut self, err: &NetlogError) -> Applied {
        let code = err.code();
        tracing::warn!(code = code.as_str(), error = %err, "dropping packet");
        self.sink.append_error(code, &err.to_string());
        Applied::Error(code)
    }

    /// Clear entries and forget the channel set; filters return to defaults.
    fn reset(&mut self) {
        self.sink.clear();
        self.state.registry.clear();
        self.state.filter = FilterState::new(self.opts.default_verbosity);
        self.sink.channels_changed(&[]);
        self.sink.set_verbosity(self.state.filter.verbosity());
    }

    /// Returns false when the channel is already selected.
    pub fn select_channel(&mut self, channel: &str) -> bool {
        let changed = self.state.filter.select(channel);
        self.state.registry.set_enabled(channel, true);
        if changed {
            self.sink.set_channel_visible(channel, true);
        }
        changed
    }

    /// Returns false when the channel was not selected.
    pub fn deselect_channel(&mut self, channel: &str) -> bool {
        let changed = self.state.filter.deselect(channel);
        self.state.registry.set_enabled(channel, false);
        if changed {
            self.sink.set_channel_visible(channel, false);
        }
        changed
    }

    /// Clamps to 0..=3 and returns the applied threshold.
    pub fn set_verbosity(&mut self, threshold: u8) -> u8 {
        let applied = self.state.filter.set_verbosity(threshold);
        self.sink.set_verbosity(applied);
        applied
    }

    /// Manual clear: drops entries, keeps channels and filters.
    pub fn clear(&mut self) {
        self.sink.clear();
    }

    pub fn export(&self) -> String {
        let filter = &self.state.filter;
        let meta = SessionMeta {
            subscriptions: self
                .state
                .registry
                .names()
                .filter(|ch| filter.is_selected(ch))
                .map(str::to_owned)
                .collect(),
            hidden: filter.deselected().map(str::to_owned).collect(),
            verbosity: filter.verbosity(),
        };
        self.sink.export(&meta)
    }

    /// Replace the surface with an exported session and reseed channels from it.
    pub fn import(&mut self, fragment: &str) -> Result<SessionMeta> {
        let meta = self.sink.import(fragment)?;

        self.state
            .registry
            .replace(meta.subscriptions.iter().chain(&meta.hidden).cloned());
        for ch in &meta.hidden {
            self.state.registry.set_enabled(ch, false);
        }
        self.state.filter.deselect_only(meta.hidden.iter().cloned());
        self.state.filter.set_verbosity(meta.verbosity);
        self.sink.channels_changed(self.state.registry.entries());
        self.decoder.reset();

        tracing::info!(channels = meta.subscriptions.len(), verbosity = meta.verbosity, "session restored");
        Ok(meta)
    }
}
