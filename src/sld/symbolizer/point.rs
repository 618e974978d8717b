//! Point symbolizer.

use roxmltree::Node;
use smallvec::smallvec;
use tracing::debug;

use crate::sld::graphic::Graphic;
use crate::sld::symbolizer::StyleKinds;
use crate::sld::{ParseContext, xml};
use crate::style::{PointStyle, StyleKind};

pub fn parse(node: Node<'_, '_>, context: &ParseContext<'_>) -> StyleKinds {
    let Some(graphic) = xml::child(node, "Graphic").map(Graphic::parse) else {
        debug!("ignoring PointSymbolizer without Graphic");
        return StyleKinds::new();
    };

    // Points are only drawn as markers.
    let Some(marker) = graphic.render(context) else { return StyleKinds::new() };

    let size = graphic.size.unwrap_or(marker.size.height as f32);
    smallvec![StyleKind::Point(PointStyle {
        marker,
        size,
        opacity: graphic.opacity.unwrap_or(1.),
        rotation: graphic.rotation.unwrap_or_default(),
    })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::sld::symbolizer::tests::styles;

    #[test]
    fn star_marker() {
        let xml = r##"<PointSymbolizer>
            <Graphic>
                <Mark>
                    <WellKnownName>star</WellKnownName>
                    <Fill><SvgParameter name="fill">#ffff00</SvgParameter></Fill>
                </Mark>
                <Opacity>0.5</Opacity>
                <Size>12</Size>
                <Rotation>90</Rotation>
            </Graphic>
        </PointSymbolizer>"##;

        let styles = styles(xml);
        let [StyleKind::Point(point)] = styles.as_slice() else { panic!("{styles:?}") };
        assert_eq!(point.marker.size, Size::new(12, 12));
        assert_eq!(point.size, 12.);
        assert_eq!(point.opacity, 0.5);
        assert_eq!(point.rotation, 90.);
    }

    #[test]
    fn default_marker_size() {
        let xml = "<PointSymbolizer><Graphic><Mark/></Graphic></PointSymbolizer>";

        let styles = styles(xml);
        let [StyleKind::Point(point)] = styles.as_slice() else { panic!("{styles:?}") };
        assert_eq!(point.size, 16.);
        assert_eq!(point.opacity, 1.);
    }

    #[test]
    fn missing_graphic() {
        let xml = r#"<PointSymbolizer xmlns:xlink="http://www.w3.org/1999/xlink">
            <Graphic>
                <ExternalGraphic>
                    <OnlineResource xlink:href="does/not/exist.png"/>
                    <Format>image/png</Format>
                </ExternalGraphic>
            </Graphic>
        </PointSymbolizer>"#;
        assert!(styles(xml).is_empty());
    }
}
