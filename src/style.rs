//! Renderer-facing style objects.
//!
//! Styles are produced once while parsing a style document and handed to the
//! renderer through the [`StyleTarget`] capability. The engine never owns any
//! renderer resources itself.

use std::fmt::{self, Display, Formatter};

use skia_safe::font_style::{Slant, Weight, Width};
use skia_safe::paint::{Cap, Join};
use skia_safe::{Color4f, FontStyle, Paint, PathEffect};
use uuid::Uuid;

use crate::attributes::AttrDictionary;
use crate::config::Color;
use crate::geometry::{Point, Size};
use crate::sld::expression::LabelPart;
use crate::tiles::TileIndex;

/// Renderer capability for materializing styled features.
pub trait StyleTarget<F> {
    /// Build render objects for all `features` sharing one style.
    fn build_objects(&mut self, style: &VectorStyle, features: &[&F], tile: TileIndex);
}

/// Paint parameters for one symbolizer output.
#[derive(Clone, Debug)]
pub struct VectorStyle {
    /// Stable identifier used as key in the renderer's style table.
    pub uuid: Uuid,
    /// Absolute draw priority, higher priorities are drawn on top.
    pub draw_priority: i32,
    /// Scale denominator at which this style becomes visible.
    pub min_scale: Option<f64>,
    /// Scale denominator at which this style stops being visible.
    pub max_scale: Option<f64>,
    pub kind: StyleKind,
}

impl VectorStyle {
    pub fn new(kind: StyleKind, draw_priority: i32) -> Self {
        Self { kind, draw_priority, uuid: Uuid::new_v4(), min_scale: None, max_scale: None }
    }
}

impl Display for VectorStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} priority={} ", self.uuid, self.draw_priority)?;
        match &self.kind {
            StyleKind::Point(point) => {
                let size = point.marker.size;
                write!(f, "point marker={}x{} size={}", size.width, size.height, point.size)
            },
            StyleKind::Line(line) => {
                write!(f, "line color={} width={}", line.color, line.width)?;
                if let Some(dash) = &line.dash {
                    write!(f, " dash={dash:?}")?;
                }
                Ok(())
            },
            StyleKind::Polygon(polygon) => {
                write!(f, "polygon color={} textured={}", polygon.color, polygon.texture.is_some())
            },
            StyleKind::Text(text) => write!(
                f,
                "text font={:?} size={} color={} placement={:?}",
                text.font.family, text.font.size, text.color, text.placement
            ),
        }
    }
}

/// Geometry-specific style parameters.
#[derive(Clone, Debug)]
pub enum StyleKind {
    Point(PointStyle),
    Line(LineStyle),
    Polygon(PolygonStyle),
    Text(TextStyle),
}

/// Marker drawn at point features.
#[derive(Clone, Debug)]
pub struct PointStyle {
    pub marker: Bitmap,
    /// Rendered marker height in pixels.
    pub size: f32,
    pub opacity: f32,
    /// Clockwise rotation in degrees.
    pub rotation: f32,
}

/// Stroke used for linestrings and polygon outlines.
#[derive(Clone, PartialEq, Debug)]
pub struct LineStyle {
    pub color: Color,
    pub width: f32,
    pub dash: Option<Vec<f32>>,
    pub cap: LineCap,
    pub join: LineJoin,
    /// Offset perpendicular to the line direction in pixels.
    pub perpendicular_offset: f32,
    /// Repeated graphic along the line.
    pub texture: Option<Bitmap>,
}

impl LineStyle {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            width: 1.,
            perpendicular_offset: Default::default(),
            texture: Default::default(),
            dash: Default::default(),
            join: Default::default(),
            cap: Default::default(),
        }
    }

    /// Skia paint for stroking this line.
    pub fn paint(&self) -> Paint {
        let mut paint = Paint::default();
        paint.set_anti_alias(true);
        paint.set_color4f(Color4f::from(self.color), None);
        paint.set_stroke_width(self.width);
        paint.set_stroke_cap(self.cap.into());
        paint.set_stroke_join(self.join.into());
        paint.set_stroke(true);

        if let Some(dash) = &self.dash {
            paint.set_path_effect(PathEffect::dash(dash, 0.));
        }

        paint
    }
}

/// Polygon area fill.
#[derive(Clone, PartialEq, Debug)]
pub struct PolygonStyle {
    pub color: Color,
    /// Repeated graphic filling the area.
    pub texture: Option<Bitmap>,
}

impl PolygonStyle {
    /// Skia paint for filling this polygon.
    pub fn paint(&self) -> Paint {
        let mut paint = Paint::default();
        paint.set_anti_alias(true);
        paint.set_color4f(Color4f::from(self.color), None);
        paint.set_stroke(false);
        paint
    }
}

/// Feature label.
#[derive(Clone, Debug)]
pub struct TextStyle {
    pub label: Vec<LabelPart>,
    pub font: FontSpec,
    pub color: Color,
    pub halo: Option<Halo>,
    pub placement: Placement,
    /// Label displacement in pixels.
    pub offset: Point<f32>,
    /// Clockwise rotation in degrees.
    pub rotation: f32,
    /// Whether the label is drawn along linestrings.
    pub follows_line: bool,
    /// Icon drawn next to the label.
    pub marker: Option<Bitmap>,
}

impl TextStyle {
    /// Get the label text for a feature.
    ///
    /// Returns `None` if the label would be empty.
    pub fn label_text(&self, attrs: &AttrDictionary) -> Option<String> {
        let mut text = String::new();
        for part in &self.label {
            match part {
                LabelPart::Text(literal) => text.push_str(literal),
                LabelPart::Expression(expression) => {
                    if let Some(value) = expression.evaluate(attrs) {
                        text.push_str(&value.to_string());
                    }
                },
            }
        }

        let text = text.trim();
        (!text.is_empty()).then(|| text.to_owned())
    }
}

/// Outline drawn around label glyphs.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Halo {
    pub radius: f32,
    pub color: Color,
}

/// Position of a label relative to its anchor.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum Placement {
    Left,
    Right,
    Above,
    Below,
    #[default]
    Center,
}

impl Placement {
    /// Get the placement for a label anchor point.
    ///
    /// Anchor coordinates are relative to the label's bounding box, with
    /// `(0, 0)` at its bottom-left corner.
    pub fn from_anchor(x: f32, y: f32) -> Self {
        if x <= 0.33 {
            Self::Right
        } else if x > 0.67 {
            Self::Left
        } else if y <= 0.33 {
            Self::Above
        } else if y > 0.67 {
            Self::Below
        } else {
            Self::Center
        }
    }
}

/// Font selection for labels.
#[derive(Clone, PartialEq, Debug)]
pub struct FontSpec {
    pub family: String,
    pub slant: FontSlant,
    /// CSS weight in the range `1..=1000`.
    pub weight: u16,
    /// Font size in pixels.
    pub size: f32,
}

impl From<&FontSpec> for FontStyle {
    fn from(font: &FontSpec) -> Self {
        let slant = match font.slant {
            FontSlant::Normal => Slant::Upright,
            FontSlant::Italic => Slant::Italic,
            FontSlant::Oblique => Slant::Oblique,
        };
        FontStyle::new(Weight::from(font.weight as i32), Width::NORMAL, slant)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum FontSlant {
    #[default]
    Normal,
    Italic,
    Oblique,
}

#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl From<LineCap> for Cap {
    fn from(cap: LineCap) -> Self {
        match cap {
            LineCap::Butt => Cap::Butt,
            LineCap::Round => Cap::Round,
            LineCap::Square => Cap::Square,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl From<LineJoin> for Join {
    fn from(join: LineJoin) -> Self {
        match join {
            LineJoin::Miter => Join::Miter,
            LineJoin::Round => Join::Round,
            LineJoin::Bevel => Join::Bevel,
        }
    }
}

/// Unpremultiplied RGBA8888 raster image.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub size: Size,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// Get the RGBA value of a single pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }

        let offset = (y as usize * self.size.width as usize + x as usize) * 4;
        let rgba = self.pixels.get(offset..offset + 4)?;
        Some([rgba[0], rgba[1], rgba[2], rgba[3]])
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap").field("size", &self.size).finish_non_exhaustive()
    }
}
