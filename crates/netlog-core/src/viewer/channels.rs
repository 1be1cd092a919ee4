//! Channel registry with deterministic color assignment.
//!
//! Colors are spread evenly around the hue wheel in registry order
//! (`hue = (i + 0.5) / (n + 1)`) at fixed saturation and lightness, so a
//! stable channel set always gets the same colors.

use std::fmt;

pub const CHANNEL_SATURATION: f64 = 0.90;
pub const CHANNEL_LIGHTNESS: f64 = 0.50;

/// Color used for channels that were never announced.
pub const NEUTRAL_COLOR: Rgb = Rgb(0xc0, 0xc0, 0xc0);

/// 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Convert HSL (all components 0.0-1.0) to RGB.
    pub fn from_hsl(h: f64, s: f64, l: f64) -> Self {
        if s == 0.0 {
            let v = channel_byte(l);
            return Rgb(v, v, v);
        }

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;

        let hue_to_rgb = |t: f64| {
            let t = if t < 0.0 {
                t + 1.0
            } else if t > 1.0 {
                t - 1.0
            } else {
                t
            };

            if t < 1.0 / 6.0 {
                p + (q - p) * 6.0 * t
            } else if t < 0.5 {
                q
            } else if t < 2.0 / 3.0 {
                p + (q - p) * (2.0 / 3.0 - t) * 6.0
            } else {
                p
            }
        };

        Rgb(
            channel_byte(hue_to_rgb(h + 1.0 / 3.0)),
            channel_byte(hue_to_rgb(h)),
            channel_byte(hue_to_rgb(h - 1.0 / 3.0)),
        )
    }

    /// `#rrggbb`
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

fn channel_byte(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEntry {
    pub name: String,
    pub hue: f64,
    pub color: Rgb,
    pub enabled: bool,
}

/// Ordered channel set. Replaced wholesale, never merged.
#[derive(Debug, Default, Clone)]
pub struct ChannelRegistry {
    entries: Vec<ChannelEntry>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registry: dedup, sort ascending, reassign every color.
    /// All channels start enabled.
    pub fn replace<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();

        let hue_increment = 1.0 / (names.len() as f64 + 1.0);
        self.entries = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let hue = hue_increment * (i as f64 + 0.5);
                ChannelEntry {
                    name,
                    hue,
                    color: Rgb::from_hsl(hue, CHANNEL_SATURATION, CHANNEL_LIGHTNESS),
                    enabled: true,
                }
            })
            .collect();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[ChannelEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ChannelEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .and_then(|i| self.entries.get(i))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns false when the channel is not registered.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.entries.binary_search_by(|e| e.name.as_str().cmp(name)) {
            Ok(i) => {
                if let Some(e) = self.entries.get_mut(i) {
                    e.enabled = enabled;
                }
                true
            }
            Err(_) => false,
        }
    }
}
