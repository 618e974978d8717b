//! Paint parameter parsing.
//!
//! Values which cannot be parsed are ignored and leave the parameter at its
//! default, they never abort parsing of the style document.

use std::str::FromStr;

use roxmltree::Node;
use tracing::debug;

use crate::attributes::parse_number;
use crate::config::{Color, Config};
use crate::sld::graphic::Graphic;
use crate::sld::xml;
use crate::style::{FontSlant, FontSpec, LineCap, LineJoin, LineStyle};

/// Font sizes of CSS absolute-size keywords in pixels.
const FONT_SIZE_KEYWORDS: [(&str, f32); 7] = [
    ("xx-small", 8.),
    ("x-small", 10.),
    ("small", 13.),
    ("medium", 16.),
    ("large", 18.),
    ("x-large", 24.),
    ("xx-large", 36.),
];

/// `SvgParameter`/`CssParameter` values of an element.
#[derive(Default, Debug)]
pub struct Parameters {
    values: Vec<(String, String)>,
}

impl Parameters {
    pub fn parse(node: Node<'_, '_>) -> Self {
        let values = xml::elements(node)
            .filter(|child| matches!(xml::name(*child), "SvgParameter" | "CssParameter"))
            .filter_map(|child| {
                let name = xml::attribute(child, "name")?;
                Some((name.to_owned(), xml::text(child)))
            })
            .collect();
        Self { values }
    }

    /// Get a raw parameter value.
    ///
    /// Later definitions of the same parameter take precedence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.iter().rev().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn color(&self, name: &str) -> Option<Color> {
        let value = self.get(name)?;
        Color::from_str(value)
            .inspect_err(|err| debug!("ignoring {name} color {value:?}: {err}"))
            .ok()
    }

    pub fn number(&self, name: &str) -> Option<f32> {
        let value = self.get(name)?;
        let number = parse_number(value).map(|number| number as f32);
        if number.is_none() {
            debug!("ignoring non-numeric {name}: {value:?}");
        }
        number
    }

    /// Get an opacity parameter clamped to `0..=1`.
    pub fn opacity(&self, name: &str) -> Option<f32> {
        self.number(name).filter(|opacity| !opacity.is_nan()).map(|opacity| opacity.clamp(0., 1.))
    }
}

/// Area fill parameters.
#[derive(Default, Debug)]
pub struct Fill {
    pub color: Option<Color>,
    pub opacity: Option<f32>,
    pub graphic: Option<Graphic>,
}

impl Fill {
    pub fn parse(node: Node<'_, '_>) -> Self {
        let params = Parameters::parse(node);
        let graphic = xml::child(node, "GraphicFill")
            .and_then(|fill| xml::child(fill, "Graphic"))
            .map(Graphic::parse);

        Self { graphic, color: params.color("fill"), opacity: params.opacity("fill-opacity") }
    }

    /// Fill color with opacity applied.
    pub fn resolved_color(&self, default: Color) -> Color {
        let color = self.color.unwrap_or(default);
        match self.opacity {
            Some(opacity) => color.with_opacity(opacity),
            None => color,
        }
    }
}

/// Line stroke parameters.
#[derive(Default, Debug)]
pub struct Stroke {
    pub color: Option<Color>,
    pub opacity: Option<f32>,
    pub width: Option<f32>,
    pub dash: Option<Vec<f32>>,
    pub cap: Option<LineCap>,
    pub join: Option<LineJoin>,
    pub graphic: Option<Graphic>,
}

impl Stroke {
    pub fn parse(node: Node<'_, '_>) -> Self {
        let params = Parameters::parse(node);

        let graphic = xml::child(node, "GraphicStroke")
            .or_else(|| xml::child(node, "GraphicFill"))
            .and_then(|graphic| xml::child(graphic, "Graphic"))
            .map(Graphic::parse);

        let width = params.number("stroke-width").filter(|width| *width >= 0.);
        let dash = params.get("stroke-dasharray").and_then(|dash| {
            let parsed = parse_dash(dash);
            if parsed.is_none() {
                debug!("ignoring invalid stroke-dasharray: {dash:?}");
            }
            parsed
        });

        Self {
            graphic,
            width,
            dash,
            cap: params.get("stroke-linecap").and_then(parse_line_cap),
            join: params.get("stroke-linejoin").and_then(parse_line_join),
            opacity: params.opacity("stroke-opacity"),
            color: params.color("stroke"),
        }
    }

    /// Stroke color with opacity applied.
    pub fn resolved_color(&self, default: Color) -> Color {
        let color = self.color.unwrap_or(default);
        match self.opacity {
            Some(opacity) => color.with_opacity(opacity),
            None => color,
        }
    }

    /// Convert to a line style, without any texture.
    pub fn line_style(&self, default_color: Color) -> LineStyle {
        let mut line = LineStyle::new(self.resolved_color(default_color));
        line.dash = self.dash.clone();
        if let Some(width) = self.width {
            line.width = width;
        }
        if let Some(cap) = self.cap {
            line.cap = cap;
        }
        if let Some(join) = self.join {
            line.join = join;
        }
        line
    }
}

/// Parse a `Font` element.
pub fn parse_font(node: Node<'_, '_>, config: &Config) -> FontSpec {
    let params = Parameters::parse(node);
    let mut font = default_font(config);

    if let Some(family) = params.get("font-family").and_then(parse_font_family) {
        font.family = family;
    }

    match params.get("font-style").map(str::to_ascii_lowercase).as_deref() {
        Some("normal") => font.slant = FontSlant::Normal,
        Some("italic") => font.slant = FontSlant::Italic,
        Some("oblique") => font.slant = FontSlant::Oblique,
        Some(style) => debug!("ignoring unknown font-style: {style:?}"),
        None => (),
    }

    if let Some(weight) = params.get("font-weight") {
        match parse_font_weight(weight) {
            Some(weight) => font.weight = weight,
            None => debug!("ignoring unknown font-weight: {weight:?}"),
        }
    }

    if let Some(size) = params.get("font-size") {
        match parse_font_size(size, config.font.size) {
            Some(size) => font.size = size,
            None => debug!("ignoring invalid font-size: {size:?}"),
        }
    }

    font
}

/// Font used by labels without a `Font` element.
pub fn default_font(config: &Config) -> FontSpec {
    FontSpec {
        family: config.font.family.to_string(),
        size: config.font.size,
        slant: FontSlant::Normal,
        weight: 400,
    }
}

/// Get the preferred family from a CSS font family list.
fn parse_font_family(families: &str) -> Option<String> {
    let family = families.split(',').next()?.trim().trim_matches(['"', '\'']).trim();
    (!family.is_empty()).then(|| family.to_owned())
}

/// Parse a CSS font weight.
fn parse_font_weight(weight: &str) -> Option<u16> {
    match weight.trim().to_ascii_lowercase().as_str() {
        "normal" => Some(400),
        "bold" => Some(700),
        "lighter" => Some(300),
        "bolder" => Some(900),
        numeric => {
            let weight = parse_number(numeric)?;
            (1. ..=1000.).contains(&weight).then_some(weight.round() as u16)
        },
    }
}

/// Parse a font size in pixels.
///
/// Supports absolute-size keywords, `px`, `em` and `%` units. Relative
/// sizes use `base` as reference.
pub fn parse_font_size(size: &str, base: f32) -> Option<f32> {
    let size = size.trim().to_ascii_lowercase();

    if let Some((_, pixels)) = FONT_SIZE_KEYWORDS.iter().find(|(keyword, _)| *keyword == size) {
        return Some(*pixels);
    }

    let pixels = if let Some(em) = size.strip_suffix("em") {
        parse_number(em)? as f32 * base
    } else if let Some(percent) = size.strip_suffix('%') {
        parse_number(percent)? as f32 / 100. * base
    } else {
        parse_number(size.strip_suffix("px").unwrap_or(&size))? as f32
    };

    (pixels.is_finite() && pixels > 0.).then_some(pixels)
}

/// Parse a whitespace or comma separated dash array.
pub fn parse_dash(dash: &str) -> Option<Vec<f32>> {
    let mut intervals = Vec::new();
    for interval in dash.split([' ', ',', '\t', '\n']).filter(|part| !part.is_empty()) {
        let interval = parse_number(interval)? as f32;
        if !interval.is_finite() || interval < 0. {
            return None;
        }
        intervals.push(interval);
    }

    // Skia requires an even number of intervals.
    if intervals.len() % 2 == 1 {
        intervals.extend_from_within(..);
    }

    let visible = intervals.iter().any(|interval| *interval > 0.);
    visible.then_some(intervals)
}

fn parse_line_cap(cap: &str) -> Option<LineCap> {
    match cap.trim().to_ascii_lowercase().as_str() {
        "butt" => Some(LineCap::Butt),
        "round" => Some(LineCap::Round),
        "square" => Some(LineCap::Square),
        cap => {
            debug!("ignoring unknown stroke-linecap: {cap:?}");
            None
        },
    }
}

fn parse_line_join(join: &str) -> Option<LineJoin> {
    match join.trim().to_ascii_lowercase().as_str() {
        "miter" | "mitre" => Some(LineJoin::Miter),
        "round" => Some(LineJoin::Round),
        "bevel" => Some(LineJoin::Bevel),
        join => {
            debug!("ignoring unknown stroke-linejoin: {join:?}");
            None
        },
    }
}

/// Parse the numeric content of an element, like `<Size>12</Size>`.
///
/// Nested `Literal` elements are supported.
pub fn number_content(node: Node<'_, '_>) -> Option<f32> {
    let text = xml::text(node);
    let number = parse_number(&text).map(|number| number as f32);
    if number.is_none() {
        debug!("ignoring non-numeric {}: {text:?}", xml::name(node));
    }
    number
}
