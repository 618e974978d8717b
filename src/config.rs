//! Configuration options.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use configory::EventHandler;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer};
use skia_safe::Color4f;
use tracing::{error, info};

/// Engine configuration.
///
/// Loaded from the TOML file at
/// `${XDG_CONFIG_HOME:-$HOME/.config}/sldstyle/sldstyle.toml`.
#[derive(Deserialize, Clone, Default, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub font: Font,
    pub styling: Styling,
    pub tiles: Tiles,
}

/// Default font for text symbolizers.
#[derive(Deserialize, Clone, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Font {
    /// Font family used when a symbolizer does not specify one.
    pub family: Arc<String>,
    /// Font size in pixels.
    ///
    /// This is also the reference size for `em` and `%` font sizes.
    pub size: f32,
}

impl Default for Font {
    fn default() -> Self {
        Self { family: Arc::new(String::from("sans")), size: 16. }
    }
}

/// Style set construction options.
#[derive(Deserialize, Copy, Clone, PartialEq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Styling {
    /// Draw priority added to every style's document-relative priority.
    pub base_priority: i32,
    /// Only apply named layers whose name matches the feature's layer.
    ///
    /// When disabled, every named layer is evaluated for every feature.
    pub use_layer_names: bool,
    /// Pixel size of well-known markers without an explicit size.
    pub marker_size: f32,
    /// Color used for fills and strokes without an explicit color.
    pub default_color: Color,
}

impl Default for Styling {
    fn default() -> Self {
        Self {
            default_color: Color::new(255, 0, 0, 0),
            use_layer_names: true,
            marker_size: 16.,
            base_priority: 0,
        }
    }
}

/// Map tile configuration.
#[derive(Deserialize, Copy, Clone, PartialEq, Eq, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Tiles {
    /// Width and height of a single tile in pixels.
    ///
    /// This is used to convert tile zoom levels to scale denominators.
    pub tile_size: u32,
}

impl Default for Tiles {
    fn default() -> Self {
        Self { tile_size: 256 }
    }
}

/// ARGB color.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(255, r, g, b)
    }

    /// Scale the alpha channel by an opacity in the range `0..=1`.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.a = (self.a as f32 * opacity.clamp(0., 1.)).round() as u8;
        self
    }

    /// Packed `0xAARRGGBB` representation.
    pub fn argb(&self) -> u32 {
        u32::from_be_bytes([self.a, self.r, self.g, self.b])
    }
}

impl FromStr for Color {
    type Err = ColorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();

        let channels = match value.strip_prefix('#') {
            Some(channels) => channels,
            None => return named_color(value).ok_or(ColorError::UnknownName),
        };

        if !channels.bytes().all(|digit| digit.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidDigits);
        }

        let color = u32::from_str_radix(channels, 16).map_err(|_| ColorError::InvalidDigits)?;
        let [a, r, g, b] = color.to_be_bytes();
        match channels.len() {
            8 => Ok(Color::new(a, r, g, b)),
            6 => Ok(Color::opaque(r, g, b)),
            // Expand shorthand `#rgb` by repeating every digit.
            3 => {
                let expand = |digit: u32| (digit as u8 & 0xF) * 0x11;
                Ok(Color::opaque(expand(color >> 8), expand(color >> 4), expand(color)))
            },
            digits => Err(ColorError::DigitCount(digits)),
        }
    }
}

/// Look up a named color.
fn named_color(name: &str) -> Option<Color> {
    let color = match name.to_ascii_lowercase().as_str() {
        "black" => Color::opaque(0, 0, 0),
        "darkgray" | "darkgrey" => Color::opaque(0x44, 0x44, 0x44),
        "gray" | "grey" => Color::opaque(0x88, 0x88, 0x88),
        "lightgray" | "lightgrey" => Color::opaque(0xCC, 0xCC, 0xCC),
        "white" => Color::opaque(0xFF, 0xFF, 0xFF),
        "red" => Color::opaque(0xFF, 0, 0),
        "green" => Color::opaque(0, 0xFF, 0),
        "blue" => Color::opaque(0, 0, 0xFF),
        "yellow" => Color::opaque(0xFF, 0xFF, 0),
        "cyan" | "aqua" => Color::opaque(0, 0xFF, 0xFF),
        "magenta" | "fuchsia" => Color::opaque(0xFF, 0, 0xFF),
        "lime" => Color::opaque(0, 0xFF, 0),
        "maroon" => Color::opaque(0x80, 0, 0),
        "navy" => Color::opaque(0, 0, 0x80),
        "olive" => Color::opaque(0x80, 0x80, 0),
        "purple" => Color::opaque(0x80, 0, 0x80),
        "silver" => Color::opaque(0xC0, 0xC0, 0xC0),
        "teal" => Color::opaque(0, 0x80, 0x80),
        _ => return None,
    };
    Some(color)
}

impl From<Color> for Color4f {
    fn from(color: Color) -> Self {
        Color4f {
            r: color.r as f32 / 255.,
            g: color.g as f32 / 255.,
            b: color.b as f32 / 255.,
            a: color.a as f32 / 255.,
        }
    }
}

/// Deserialize argb color from a hex string or color name.
impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ColorVisitor;

        impl Visitor<'_> for ColorVisitor {
            type Value = Color;

            fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str("hex color like #ff00ff or #80ff00ff")
            }

            fn visit_str<E>(self, value: &str) -> Result<Color, E>
            where
                E: serde::de::Error,
            {
                Color::from_str(value).map_err(|err| E::custom(format!("color {value:?} {err}")))
            }
        }

        deserializer.deserialize_str(ColorVisitor)
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "#{:0>2x}{:0>2x}{:0>2x}{:0>2x}", self.a, self.r, self.g, self.b)
    }
}

/// Color parsing failure.
#[derive(thiserror::Error, Copy, Clone, PartialEq, Eq, Debug)]
pub enum ColorError {
    #[error("is not a known color name")]
    UnknownName,
    #[error("contains non-hex digits")]
    InvalidDigits,
    #[error("has {0} digits; expected 3, 6 or 8")]
    DigitCount(usize),
}

/// Configuration file event handler.
///
/// Styles are parsed once at startup, so changes are only reported.
pub struct ConfigEventHandler;

impl EventHandler for ConfigEventHandler {
    type MessageData = ();

    fn file_changed(&self, _config: &configory::Config) {
        info!("Configuration file changed, restart to apply it");
    }

    fn ipc_changed(&self, _config: &configory::Config) {
        info!("Configuration changed over IPC, restart to apply it");
    }

    fn file_error(&self, _config: &configory::Config, err: configory::Error) {
        error!("Configuration file error: {err}");
    }
}
