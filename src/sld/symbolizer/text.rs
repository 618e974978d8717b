//! Text symbolizer.

use roxmltree::Node;
use smallvec::smallvec;
use tracing::debug;

use crate::config::Color;
use crate::geometry::Point;
use crate::sld::expression::parse_mixed;
use crate::sld::graphic::Graphic;
use crate::sld::params::{Fill, default_font, number_content, parse_font};
use crate::sld::symbolizer::StyleKinds;
use crate::sld::{ParseContext, xml};
use crate::style::{Halo, Placement, StyleKind, TextStyle};

/// Halo color without explicit fill.
const DEFAULT_HALO_COLOR: Color = Color::opaque(255, 255, 255);

/// Halo radius without explicit `Radius`.
const DEFAULT_HALO_RADIUS: f32 = 1.;

pub fn parse(node: Node<'_, '_>, context: &ParseContext<'_>) -> StyleKinds {
    let config = context.config;

    let label = xml::child(node, "Label").map(parse_mixed).unwrap_or_default();
    if label.is_empty() {
        debug!("ignoring TextSymbolizer without Label");
        return StyleKinds::new();
    }

    let font = match xml::child(node, "Font") {
        Some(font) => parse_font(font, config),
        None => default_font(config),
    };

    let default_color = config.styling.default_color;
    let color = xml::child(node, "Fill")
        .map(Fill::parse)
        .map_or(default_color, |fill| fill.resolved_color(default_color));

    let mut style = TextStyle {
        label,
        font,
        color,
        halo: xml::child(node, "Halo").map(parse_halo),
        marker: xml::child(node, "Graphic").map(Graphic::parse).and_then(|g| g.render(context)),
        placement: Placement::default(),
        offset: Point::default(),
        follows_line: false,
        rotation: 0.,
    };

    if let Some(placement) = xml::child(node, "LabelPlacement") {
        if let Some(point) = xml::child(placement, "PointPlacement") {
            apply_point_placement(&mut style, point);
        } else if let Some(line) = xml::child(placement, "LinePlacement") {
            apply_line_placement(&mut style, line);
        }
    }

    smallvec![StyleKind::Text(style)]
}

fn parse_halo(node: Node<'_, '_>) -> Halo {
    let radius = xml::child(node, "Radius")
        .and_then(number_content)
        .filter(|radius| *radius >= 0.)
        .unwrap_or(DEFAULT_HALO_RADIUS);
    let color = xml::child(node, "Fill")
        .map(Fill::parse)
        .map_or(DEFAULT_HALO_COLOR, |fill| fill.resolved_color(DEFAULT_HALO_COLOR));
    Halo { radius, color }
}

/// Apply anchor, displacement and rotation of a `PointPlacement`.
fn apply_point_placement(style: &mut TextStyle, node: Node<'_, '_>) {
    if let Some(anchor) = xml::child(node, "AnchorPoint") {
        let x = coordinate(anchor, "AnchorPointX").unwrap_or(0.5);
        let y = coordinate(anchor, "AnchorPointY").unwrap_or(0.5);
        style.placement = Placement::from_anchor(x, y);
    }

    if let Some(displacement) = xml::child(node, "Displacement") {
        let x = coordinate(displacement, "DisplacementX").unwrap_or_default();
        let y = coordinate(displacement, "DisplacementY").unwrap_or_default();
        style.offset = style.offset + Point::new(x, y);
    }

    if let Some(rotation) = xml::child(node, "Rotation").and_then(number_content) {
        style.rotation = rotation;
    }
}

/// Apply a `LinePlacement`, which always centers labels on the line.
fn apply_line_placement(style: &mut TextStyle, node: Node<'_, '_>) {
    if let Some(offset) = xml::child(node, "PerpendicularOffset").and_then(number_content) {
        style.offset = style.offset + Point::new(0., offset);
    }
    style.placement = Placement::Center;
    style.follows_line = true;
}

fn coordinate(node: Node<'_, '_>, name: &str) -> Option<f32> {
    xml::child(node, name).and_then(number_content)
}
