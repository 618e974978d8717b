//! Polygon symbolizer.

use roxmltree::Node;
use smallvec::smallvec;

use crate::config::Color;
use crate::sld::params::{Fill, Stroke};
use crate::sld::symbolizer::StyleKinds;
use crate::sld::{ParseContext, xml};
use crate::style::{PolygonStyle, StyleKind};

/// Fill of polygon symbolizers without any paint parameters.
const DEFAULT_FILL: Color = Color::opaque(128, 128, 128);

pub fn parse(node: Node<'_, '_>, context: &ParseContext<'_>) -> StyleKinds {
    let default_color = context.config.styling.default_color;
    let fill = xml::child(node, "Fill").map(Fill::parse);
    let stroke = xml::child(node, "Stroke").map(Stroke::parse);

    let mut styles = StyleKinds::new();

    match &fill {
        Some(fill) => {
            let texture = fill.graphic.as_ref().and_then(|graphic| graphic.render(context));
            let color = fill.resolved_color(default_color);
            styles.push(StyleKind::Polygon(PolygonStyle { color, texture }));
        },
        None if stroke.is_none() => {
            return smallvec![StyleKind::Polygon(PolygonStyle {
                color: DEFAULT_FILL,
                texture: None
            })];
        },
        None => (),
    }

    // Outlines are drawn on top of the area.
    if let Some(stroke) = stroke {
        let mut line = stroke.line_style(default_color);
        line.texture = stroke.graphic.as_ref().and_then(|graphic| graphic.render(context));
        styles.push(StyleKind::Line(line));
    }

    styles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sld::symbolizer::tests::styles;

    #[test]
    fn fill_with_opacity() {
        let xml = r##"<PolygonSymbolizer>
            <Fill>
                <SvgParameter name="fill">#FF0000</SvgParameter>
                <SvgParameter name="fill-opacity">0.5</SvgParameter>
            </Fill>
        </PolygonSymbolizer>"##;

        let styles = styles(xml);
        let [StyleKind::Polygon(polygon)] = styles.as_slice() else { panic!("{styles:?}") };
        assert_eq!(polygon.color.a, 128);
        assert_eq!(polygon.color.argb(), 0x80ff0000);
    }

    #[test]
    fn outline_only() {
        let xml = r##"<PolygonSymbolizer>
            <Stroke><SvgParameter name="stroke-width">2</SvgParameter></Stroke>
        </PolygonSymbolizer>"##;

        let styles = styles(xml);
        let [StyleKind::Line(line)] = styles.as_slice() else { panic!("{styles:?}") };
        assert_eq!(line.width, 2.);
        assert_eq!(line.color, Color::opaque(0, 0, 0));
    }

    #[test]
    fn default_grey_fill() {
        let styles = styles("<PolygonSymbolizer/>");
        let [StyleKind::Polygon(polygon)] = styles.as_slice() else { panic!("{styles:?}") };
        assert_eq!(polygon.color, DEFAULT_FILL);
        assert!(polygon.texture.is_none());
    }

    #[test]
    fn graphic_fill() {
        let xml = r##"<PolygonSymbolizer>
            <Fill>
                <GraphicFill>
                    <Graphic>
                        <Mark>
                            <WellKnownName>cross</WellKnownName>
                            <Stroke><SvgParameter name="stroke">navy</SvgParameter></Stroke>
                        </Mark>
                        <Size>8</Size>
                    </Graphic>
                </GraphicFill>
            </Fill>
            <Stroke/>
        </PolygonSymbolizer>"##;

        let styles = styles(xml);
        let [StyleKind::Polygon(polygon), StyleKind::Line(_)] = styles.as_slice() else {
            panic!("{styles:?}")
        };
        assert_eq!(polygon.texture.as_ref().unwrap().size.width, 8);
    }
}
