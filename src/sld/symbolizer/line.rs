//! Line symbolizer.

use roxmltree::Node;
use smallvec::smallvec;

use crate::sld::params::{Stroke, number_content};
use crate::sld::symbolizer::StyleKinds;
use crate::sld::{ParseContext, xml};
use crate::style::StyleKind;

pub fn parse(node: Node<'_, '_>, context: &ParseContext<'_>) -> StyleKinds {
    let stroke = xml::child(node, "Stroke").map(Stroke::parse).unwrap_or_default();

    let mut line = stroke.line_style(context.config.styling.default_color);
    line.texture = stroke.graphic.as_ref().and_then(|graphic| graphic.render(context));
    if let Some(offset) = xml::child(node, "PerpendicularOffset").and_then(number_content) {
        line.perpendicular_offset = offset;
    }

    smallvec![StyleKind::Line(line)]
}
