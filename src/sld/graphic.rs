//! Point graphics, marks and external images.

use std::f32::consts::PI;

use base64::Engine as _;
use resvg::tiny_skia::Pixmap as SvgPixmap;
use resvg::usvg::{Options as SvgOptions, Transform as SvgTransform, Tree as SvgTree};
use roxmltree::Node;
use skia_safe::image::CachingHint;
use skia_safe::surface::surfaces;
use skia_safe::{AlphaType, Color4f, ColorType, Data, Image, ImageInfo, Paint, PathBuilder, Rect};
use tracing::{debug, warn};

use crate::config::Color;
use crate::geometry::Size;
use crate::sld::ParseContext;
use crate::sld::params::{Fill, Stroke, number_content};
use crate::sld::xml;
use crate::style::Bitmap;

/// Fill color of marks without any paint parameters.
const DEFAULT_MARK_FILL: Color = Color::opaque(128, 128, 128);

/// Stroke color of marks without any paint parameters.
const DEFAULT_MARK_STROKE: Color = Color::opaque(0, 0, 0);

/// Vertices used to approximate circle marks.
const CIRCLE_SEGMENTS: usize = 48;

/// Half width of cross arms relative to the mark radius.
const CROSS_HALF_WIDTH: f32 = 0.2;

/// Inner radius of star marks relative to the mark radius.
const STAR_INNER_RADIUS: f32 = 0.382;

/// Largest width or height of a rasterized graphic in pixels.
const MAX_GRAPHIC_SIZE: f32 = 4096.;

/// Graphic symbol with fallback sources.
#[derive(Default, Debug)]
pub struct Graphic {
    pub sources: Vec<GraphicSource>,
    pub opacity: Option<f32>,
    /// Rendered height in pixels.
    pub size: Option<f32>,
    /// Clockwise rotation in degrees.
    pub rotation: Option<f32>,
}

impl Graphic {
    pub fn parse(node: Node<'_, '_>) -> Self {
        let mut graphic = Self::default();

        for child in xml::elements(node) {
            match xml::name(child) {
                "Mark" => graphic.sources.push(GraphicSource::Mark(Mark::parse(child))),
                "ExternalGraphic" => match ExternalGraphic::parse(child) {
                    Some(external) => graphic.sources.push(GraphicSource::External(external)),
                    None => debug!("ignoring ExternalGraphic without content"),
                },
                "Opacity" => {
                    graphic.opacity = number_content(child).map(|opacity| opacity.clamp(0., 1.))
                },
                "Size" => graphic.size = number_content(child).filter(|&size| valid_size(size)),
                "Rotation" => graphic.rotation = number_content(child),
                _ => (),
            }
        }

        graphic
    }

    /// Rasterize the first source which can be rendered.
    pub fn render(&self, context: &ParseContext<'_>) -> Option<Bitmap> {
        let bitmap = self.sources.iter().find_map(|source| match source {
            GraphicSource::Mark(mark) => {
                let size = self.size.unwrap_or(context.config.styling.marker_size);
                mark.render(size)
            },
            GraphicSource::External(external) => external.render(context, self.size),
        });

        if bitmap.is_none() && !self.sources.is_empty() {
            warn!("none of the {} graphic sources could be rendered", self.sources.len());
        }

        bitmap
    }
}

#[derive(Debug)]
pub enum GraphicSource {
    Mark(Mark),
    External(ExternalGraphic),
}

/// Well-known shape.
#[derive(Default, Debug)]
pub struct Mark {
    pub shape: MarkShape,
    pub fill: Option<Fill>,
    pub stroke: Option<Stroke>,
}

impl Mark {
    fn parse(node: Node<'_, '_>) -> Self {
        let shape = xml::child(node, "WellKnownName")
            .map(|name| MarkShape::from_name(&xml::text(name)))
            .unwrap_or_default();

        Self {
            shape,
            stroke: xml::child(node, "Stroke").map(Stroke::parse),
            fill: xml::child(node, "Fill").map(Fill::parse),
        }
    }

    /// Rasterize the mark into a square bitmap.
    fn render(&self, size: f32) -> Option<Bitmap> {
        let (fill, stroke) = match (&self.fill, &self.stroke) {
            (None, None) => (Some(DEFAULT_MARK_FILL), Some((DEFAULT_MARK_STROKE, 1.))),
            (fill, stroke) => (
                fill.as_ref().map(|fill| fill.resolved_color(DEFAULT_MARK_FILL)),
                stroke.as_ref().map(|stroke| {
                    (stroke.resolved_color(DEFAULT_MARK_STROKE), stroke.width.unwrap_or(1.))
                }),
            ),
        };

        let (dimension, _) = bitmap_dimensions(size, size)?;
        let dimension = dimension as i32;
        let mut surface = surfaces::raster_n32_premul((dimension, dimension))?;
        let canvas = surface.canvas();
        canvas.clear(Color4f::new(0., 0., 0., 0.));

        // Keep the stroke inside the bitmap.
        let stroke_width = stroke.map_or(0., |(_, width)| width);
        let center = dimension as f32 / 2.;
        let radius = (center - stroke_width / 2.).max(0.5);

        let mut path = PathBuilder::new();
        let mut vertices = self.shape.vertices().into_iter();
        if let Some((x, y)) = vertices.next() {
            path.move_to((center + x * radius, center + y * radius));
        }
        for (x, y) in vertices {
            path.line_to((center + x * radius, center + y * radius));
        }
        path.close();
        let path = path.detach();

        let mut paint = Paint::default();
        paint.set_anti_alias(true);

        if let Some(color) = fill {
            paint.set_color4f(Color4f::from(color), None);
            paint.set_stroke(false);
            canvas.draw_path(&path, &paint);
        }

        if let Some((color, width)) = stroke.filter(|(_, width)| *width > 0.) {
            paint.set_color4f(Color4f::from(color), None);
            paint.set_stroke_width(width);
            paint.set_stroke(true);
            canvas.draw_path(&path, &paint);
        }

        bitmap_from_image(&surface.image_snapshot())
    }
}

/// Shape of a [`Mark`].
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum MarkShape {
    #[default]
    Square,
    Circle,
    Triangle,
    Star,
    Cross,
    X,
}

impl MarkShape {
    fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "square" => Self::Square,
            "circle" => Self::Circle,
            "triangle" => Self::Triangle,
            "star" => Self::Star,
            "cross" => Self::Cross,
            "x" => Self::X,
            name => {
                debug!("unknown mark {name:?}, using square");
                Self::Square
            },
        }
    }

    /// Outline vertices within `-1..=1` on both axes, with y pointing down.
    fn vertices(self) -> Vec<(f32, f32)> {
        match self {
            Self::Square => vec![(-1., -1.), (1., -1.), (1., 1.), (-1., 1.)],
            Self::Circle => (0..CIRCLE_SEGMENTS)
                .map(|i| {
                    let angle = i as f32 / CIRCLE_SEGMENTS as f32 * 2. * PI;
                    (angle.cos(), angle.sin())
                })
                .collect(),
            Self::Triangle => {
                let half_width = (PI / 3.).sin();
                vec![(0., -1.), (half_width, 0.5), (-half_width, 0.5)]
            },
            Self::Star => (0..10)
                .map(|i| {
                    let radius = if i % 2 == 0 { 1. } else { STAR_INNER_RADIUS };
                    let angle = i as f32 * PI / 5. - PI / 2.;
                    (angle.cos() * radius, angle.sin() * radius)
                })
                .collect(),
            Self::Cross => cross_vertices(),
            Self::X => {
                let (sin, cos) = (PI / 4.).sin_cos();
                cross_vertices()
                    .into_iter()
                    .map(|(x, y)| (x * cos - y * sin, x * sin + y * cos))
                    .collect()
            },
        }
    }
}

fn cross_vertices() -> Vec<(f32, f32)> {
    let t = CROSS_HALF_WIDTH;
    vec![
        (-t, -1.),
        (t, -1.),
        (t, -t),
        (1., -t),
        (1., t),
        (t, t),
        (t, 1.),
        (-t, 1.),
        (-t, t),
        (-1., t),
        (-1., -t),
        (-t, -t),
    ]
}

/// Image referenced by URL or embedded in the document.
#[derive(Debug)]
pub struct ExternalGraphic {
    pub content: GraphicContent,
    pub format: Option<String>,
}

impl ExternalGraphic {
    fn parse(node: Node<'_, '_>) -> Option<Self> {
        let format = xml::child(node, "Format").map(xml::text).filter(|format| !format.is_empty());

        let content = if let Some(resource) = xml::child(node, "OnlineResource") {
            GraphicContent::Href(xml::attribute(resource, "href")?.trim().to_owned())
        } else {
            GraphicContent::Inline(parse_inline_content(xml::child(node, "InlineContent")?)?)
        };

        Some(Self { content, format })
    }

    fn render(&self, context: &ParseContext<'_>, size: Option<f32>) -> Option<Bitmap> {
        let data = match &self.content {
            GraphicContent::Href(href) => match context.assets.read(href) {
                Ok(data) => data,
                Err(err) => {
                    warn!("could not load graphic {href:?}: {err}");
                    return None;
                },
            },
            GraphicContent::Inline(data) => data.clone(),
        };

        if self.is_svg() {
            render_svg(&data, size)
        } else {
            render_raster(&data, size)
        }
    }

    fn is_svg(&self) -> bool {
        match (&self.format, &self.content) {
            (Some(format), _) => format.eq_ignore_ascii_case("image/svg+xml"),
            (None, GraphicContent::Href(href)) => href.to_ascii_lowercase().ends_with(".svg"),
            (None, GraphicContent::Inline(data)) => {
                let start = data.iter().position(|byte| !byte.is_ascii_whitespace()).unwrap_or(0);
                data[start..].starts_with(b"<")
            },
        }
    }
}

#[derive(Debug)]
pub enum GraphicContent {
    /// Path or URL relative to the style document.
    Href(String),
    /// Decoded image data.
    Inline(Vec<u8>),
}

/// Decode `InlineContent` according to its `encoding` attribute.
fn parse_inline_content(node: Node<'_, '_>) -> Option<Vec<u8>> {
    match xml::attribute(node, "encoding").map(str::trim) {
        Some(encoding) if encoding.eq_ignore_ascii_case("base64") => {
            let text: String = xml::text(node).split_whitespace().collect();
            base64::engine::general_purpose::STANDARD
                .decode(text)
                .inspect_err(|err| warn!("invalid base64 InlineContent: {err}"))
                .ok()
        },
        // Embedded XML, like an inline SVG document.
        _ => match xml::elements(node).next() {
            Some(element) => {
                let input = node.document().input_text();
                Some(input[element.range()].as_bytes().to_vec())
            },
            None => Some(xml::text(node).into_bytes()),
        },
    }
}

/// Rasterize an SVG document, scaled to `size` pixels height.
fn render_svg(data: &[u8], size: Option<f32>) -> Option<Bitmap> {
    let tree = SvgTree::from_data(data, &SvgOptions::default())
        .inspect_err(|err| warn!("invalid SVG graphic: {err}"))
        .ok()?;

    let tree_size = tree.size();
    let scale = size.map_or(1., |size| size / tree_size.height());
    let (width, height) =
        bitmap_dimensions(tree_size.width() * scale, tree_size.height() * scale)?;

    let mut pixmap = SvgPixmap::new(width, height)?;
    let transform = SvgTransform::from_scale(scale, scale);
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    let pixels = pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| {
            let pixel = pixel.demultiply();
            [pixel.red(), pixel.green(), pixel.blue(), pixel.alpha()]
        })
        .collect();

    Some(Bitmap { size: Size::new(width, height), pixels })
}

/// Decode an encoded raster image, scaled to `size` pixels height.
fn render_raster(data: &[u8], size: Option<f32>) -> Option<Bitmap> {
    let Some(image) = Image::from_encoded(Data::new_copy(data)) else {
        warn!("could not decode raster graphic");
        return None;
    };

    let target_height = match size {
        Some(size) if size.ceil() as i32 != image.height() => size,
        _ => return bitmap_from_image(&image),
    };

    let scale = target_height / image.height() as f32;
    let (width, height) = bitmap_dimensions(image.width() as f32 * scale, target_height)?;

    let mut surface = surfaces::raster_n32_premul((width as i32, height as i32))?;
    let canvas = surface.canvas();
    canvas.clear(Color4f::new(0., 0., 0., 0.));
    let mut paint = Paint::default();
    paint.set_anti_alias(true);
    canvas.draw_image_rect(&image, None, Rect::from_wh(width as f32, height as f32), &paint);

    bitmap_from_image(&surface.image_snapshot())
}

/// Check whether a `Size` value can be rasterized.
fn valid_size(size: f32) -> bool {
    if size > MAX_GRAPHIC_SIZE {
        warn!("ignoring graphic Size {size}, exceeds {MAX_GRAPHIC_SIZE}px");
        return false;
    }
    size > 0.
}

/// Round a graphic's extent up to whole pixels within [`MAX_GRAPHIC_SIZE`].
fn bitmap_dimensions(width: f32, height: f32) -> Option<(u32, u32)> {
    let (width, height) = (width.ceil().max(1.), height.ceil().max(1.));
    if !(width <= MAX_GRAPHIC_SIZE && height <= MAX_GRAPHIC_SIZE) {
        warn!("graphic of {width}x{height}px exceeds {MAX_GRAPHIC_SIZE}px");
        return None;
    }
    Some((width as u32, height as u32))
}

/// Read the pixels of a skia image as unpremultiplied RGBA.
fn bitmap_from_image(image: &Image) -> Option<Bitmap> {
    let (width, height) = (image.width(), image.height());
    let info = ImageInfo::new((width, height), ColorType::RGBA8888, AlphaType::Unpremul, None);

    let row_bytes = width as usize * 4;
    let mut pixels = vec![0; row_bytes * height as usize];
    if !image.read_pixels(&info, pixels.as_mut_slice(), row_bytes, (0, 0), CachingHint::Disallow) {
        warn!("could not read graphic pixels");
        return None;
    }

    Some(Bitmap { size: Size::new(width as u32, height as u32), pixels })
}
