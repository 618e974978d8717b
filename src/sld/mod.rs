//! Styled Layer Descriptor documents.
//!
//! A [`StyleSet`] is parsed once from an SLD document and is immutable
//! afterwards. All per-feature queries only read the style tree, so a single
//! style set can be shared between threads.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use roxmltree::{Document, Node};
use smallvec::SmallVec;
use tracing::{debug, info};
use uuid::Uuid;

use crate::Error;
use crate::assets::{AssetSource, FsAssets};
use crate::attributes::AttrDictionary;
use crate::config::Config;
use crate::sld::rule::{Rule, RuleScope};
use crate::style::{StyleKind, StyleTarget, VectorStyle};
use crate::tiles::TileIndex;

pub mod expression;
pub mod graphic;
pub mod operator;
pub mod params;
pub mod rule;
pub mod symbolizer;
mod xml;

/// Parsing state shared by all symbolizers of a document.
pub struct ParseContext<'a> {
    pub config: &'a Config,
    pub assets: &'a dyn AssetSource,

    relative_priority: i32,
    styles: IndexMap<Uuid, Arc<VectorStyle>>,
}

impl<'a> ParseContext<'a> {
    pub fn new(config: &'a Config, assets: &'a dyn AssetSource) -> Self {
        Self { config, assets, relative_priority: 0, styles: IndexMap::new() }
    }

    /// Get the draw priority for the next symbolizer.
    fn next_priority(&mut self) -> i32 {
        let priority = self.config.styling.base_priority.saturating_add(self.relative_priority);
        self.relative_priority += 1;
        priority
    }

    /// Create a new style and add it to the document's style table.
    fn register(&mut self, kind: StyleKind, priority: i32, scope: RuleScope) -> Arc<VectorStyle> {
        let mut style = VectorStyle::new(kind, priority);
        style.min_scale = scope.min_scale;
        style.max_scale = scope.max_scale;

        let style = Arc::new(style);
        self.styles.insert(style.uuid, style.clone());
        style
    }
}

/// All layers of an SLD document.
#[derive(Debug)]
pub struct StyleSet {
    layers: Vec<NamedLayer>,
    styles: IndexMap<Uuid, Arc<VectorStyle>>,
    use_layer_names: bool,
    tile_size: u32,
}

impl StyleSet {
    /// Parse an SLD document, resolving graphics relative to the working
    /// directory.
    pub fn parse(sld: &str, config: &Config) -> Result<Self, Error> {
        Self::with_assets(sld, config, &FsAssets::new(""))
    }

    /// Parse an SLD document file, resolving graphics relative to it.
    pub fn from_path(path: impl AsRef<Path>, config: &Config) -> Result<Self, Error> {
        let path = path.as_ref();
        let sld = fs::read_to_string(path)?;

        info!("Loading style {path:?}");

        Self::with_assets(&sld, config, &FsAssets::for_document(path))
    }

    /// Parse an SLD document from a stream.
    pub fn from_reader(
        mut reader: impl Read,
        config: &Config,
        assets: &dyn AssetSource,
    ) -> Result<Self, Error> {
        let mut sld = String::new();
        reader.read_to_string(&mut sld)?;
        Self::with_assets(&sld, config, assets)
    }

    /// Parse an SLD document with a custom graphics source.
    pub fn with_assets(
        sld: &str,
        config: &Config,
        assets: &dyn AssetSource,
    ) -> Result<Self, Error> {
        let document = Document::parse(sld)?;
        let root = document.root_element();
        if xml::name(root) != "StyledLayerDescriptor" {
            return Err(Error::UnexpectedRoot(xml::name(root).into()));
        }

        let mut context = ParseContext::new(config, assets);
        let layers: Vec<_> = xml::elements(root)
            .filter(|node| matches!(xml::name(*node), "NamedLayer" | "UserLayer"))
            .map(|node| NamedLayer::parse(node, &mut context))
            .collect();

        info!("Parsed {} layers with {} styles", layers.len(), context.styles.len());

        Ok(Self {
            layers,
            styles: context.styles,
            use_layer_names: config.styling.use_layer_names,
            tile_size: config.tiles.tile_size,
        })
    }

    /// Get all styles applying to a feature in a tile.
    pub fn styles_for_feature(
        &self,
        attrs: &AttrDictionary,
        tile: TileIndex,
        layer_name: &str,
    ) -> Vec<Arc<VectorStyle>> {
        let scale = tile.scale_denominator(self.tile_size);
        self.styles_for_feature_at_scale(attrs, scale, layer_name)
    }

    /// Get all styles applying to a feature at a scale denominator.
    ///
    /// Styles are returned in document order.
    pub fn styles_for_feature_at_scale(
        &self,
        attrs: &AttrDictionary,
        scale: f64,
        layer_name: &str,
    ) -> Vec<Arc<VectorStyle>> {
        let mut styles = Vec::new();
        for feature_style in self.feature_styles(layer_name) {
            feature_style.append_styles(attrs, scale, &mut styles);
        }
        styles
    }

    /// Check if any rule of a layer is active at a tile's zoom level.
    pub fn layer_should_display(&self, layer_name: &str, tile: TileIndex) -> bool {
        let scale = tile.scale_denominator(self.tile_size);
        self.feature_styles(layer_name)
            .flat_map(|feature_style| &feature_style.rules)
            .any(|rule| rule.scope.contains(scale))
    }

    /// Look up a style by its identifier.
    pub fn style_for_uuid(&self, uuid: &Uuid) -> Option<Arc<VectorStyle>> {
        self.styles.get(uuid).cloned()
    }

    /// All styles in document order.
    pub fn styles(&self) -> impl Iterator<Item = &Arc<VectorStyle>> {
        self.styles.values()
    }

    pub fn layers(&self) -> &[NamedLayer] {
        &self.layers
    }

    /// Style all features of a tile layer and hand them to the renderer.
    ///
    /// The target is called once per style, in document order, with every
    /// feature using that style.
    pub fn build_objects<F, T>(
        &self,
        features: &[F],
        tile: TileIndex,
        layer_name: &str,
        target: &mut T,
    ) where
        F: AsRef<AttrDictionary>,
        T: StyleTarget<F>,
    {
        let scale = tile.scale_denominator(self.tile_size);

        let mut groups: Vec<Vec<&F>> = vec![Vec::new(); self.styles.len()];
        for feature in features {
            for style in self.styles_for_feature_at_scale(feature.as_ref(), scale, layer_name) {
                if let Some(index) = self.styles.get_index_of(&style.uuid) {
                    groups[index].push(feature);
                }
            }
        }

        for (style, group) in self.styles.values().zip(groups) {
            if !group.is_empty() {
                target.build_objects(style, &group, tile);
            }
        }
    }

    /// Feature type styles taking part in styling a layer.
    fn feature_styles<'a>(
        &'a self,
        layer_name: &'a str,
    ) -> impl Iterator<Item = &'a FeatureTypeStyle> {
        self.layers
            .iter()
            .filter(move |layer| !self.use_layer_names || layer.name.as_deref() == Some(layer_name))
            .flat_map(|layer| &layer.styles)
            .flat_map(|user_style| &user_style.feature_styles)
    }
}

/// Styles for one map layer.
#[derive(Debug)]
pub struct NamedLayer {
    pub name: Option<String>,
    pub styles: Vec<UserStyle>,
}

impl NamedLayer {
    fn parse(node: Node<'_, '_>, context: &mut ParseContext<'_>) -> Self {
        let mut layer = Self { name: None, styles: Vec::new() };

        for child in xml::elements(node) {
            match xml::name(child) {
                "Name" => layer.name = Some(xml::text(child)),
                "UserStyle" => layer.styles.push(UserStyle::parse(child, context)),
                name => debug!("ignoring unknown layer element: {name:?}"),
            }
        }

        layer
    }
}

#[derive(Debug)]
pub struct UserStyle {
    pub name: Option<String>,
    pub title: Option<String>,
    pub feature_styles: Vec<FeatureTypeStyle>,
}

impl UserStyle {
    fn parse(node: Node<'_, '_>, context: &mut ParseContext<'_>) -> Self {
        let mut style = Self { name: None, title: None, feature_styles: Vec::new() };

        for child in xml::elements(node) {
            match xml::name(child) {
                "Name" => style.name = Some(xml::text(child)),
                "Title" => style.title = Some(xml::text(child)),
                "FeatureTypeStyle" => {
                    style.feature_styles.push(FeatureTypeStyle::parse(child, context))
                },
                _ => (),
            }
        }

        style
    }
}

/// Group of rules sharing else filter evaluation.
#[derive(Debug)]
pub struct FeatureTypeStyle {
    pub name: Option<String>,
    pub feature_type_name: Option<String>,
    pub rules: Vec<Rule>,
}

impl FeatureTypeStyle {
    fn parse(node: Node<'_, '_>, context: &mut ParseContext<'_>) -> Self {
        let mut style = Self { name: None, feature_type_name: None, rules: Vec::new() };

        for child in xml::elements(node) {
            match xml::name(child) {
                "Name" => style.name = Some(xml::text(child)),
                "FeatureTypeName" => style.feature_type_name = Some(xml::text(child)),
                "Rule" => style.rules.push(Rule::parse(child, context)),
                _ => (),
            }
        }

        style
    }

    /// Append the styles of all rules matching a feature.
    ///
    /// Else rules apply only if no regular rule active at `scale` matched.
    fn append_styles(
        &self,
        attrs: &AttrDictionary,
        scale: f64,
        styles: &mut Vec<Arc<VectorStyle>>,
    ) {
        let matched: SmallVec<[bool; 8]> = self
            .rules
            .iter()
            .map(|rule| !rule.is_else() && rule.scope.contains(scale) && rule.matches(attrs))
            .collect();
        let any_matched = matched.contains(&true);

        for (rule, matched) in self.rules.iter().zip(matched) {
            let else_matched = rule.is_else() && !any_matched && rule.scope.contains(scale);
            if matched || else_matched {
                styles.extend(rule.styles().cloned());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::{self, Cursor};
    use std::thread;

    use super::*;
    use crate::config::Color;
    use crate::geometry::Size;

    const ROADS: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<StyledLayerDescriptor version="1.1.0"
    xmlns="http://www.opengis.net/sld"
    xmlns:se="http://www.opengis.net/se"
    xmlns:ogc="http://www.opengis.net/ogc">
  <NamedLayer>
    <se:Name>roads</se:Name>
    <UserStyle>
      <se:Name>roads</se:Name>
      <se:FeatureTypeStyle>
        <se:Rule>
          <se:Name>motorway</se:Name>
          <ogc:Filter>
            <ogc:PropertyIsEqualTo>
              <ogc:PropertyName>class</ogc:PropertyName>
              <ogc:Literal>motorway</ogc:Literal>
            </ogc:PropertyIsEqualTo>
          </ogc:Filter>
          <se:LineSymbolizer>
            <se:Stroke>
              <se:SvgParameter name="stroke">#e892a2</se:SvgParameter>
              <se:SvgParameter name="stroke-width">4</se:SvgParameter>
            </se:Stroke>
          </se:LineSymbolizer>
        </se:Rule>
        <se:Rule>
          <se:Name>detail</se:Name>
          <se:MinScaleDenominator>1000</se:MinScaleDenominator>
          <se:MaxScaleDenominator>5000</se:MaxScaleDenominator>
          <se:LineSymbolizer/>
        </se:Rule>
        <se:Rule>
          <se:Name>other</se:Name>
          <se:ElseFilter/>
          <se:LineSymbolizer>
            <se:Stroke><se:SvgParameter name="stroke">#aaaaaa</se:SvgParameter></se:Stroke>
          </se:LineSymbolizer>
        </se:Rule>
      </se:FeatureTypeStyle>
    </UserStyle>
  </NamedLayer>
  <NamedLayer>
    <se:Name>water</se:Name>
    <UserStyle>
      <se:FeatureTypeStyle>
        <se:Rule>
          <se:MaxScaleDenominator>100000</se:MaxScaleDenominator>
          <se:PolygonSymbolizer>
            <se:Fill>
              <se:SvgParameter name="fill">#FF0000</se:SvgParameter>
              <se:SvgParameter name="fill-opacity">0.5</se:SvgParameter>
            </se:Fill>
          </se:PolygonSymbolizer>
        </se:Rule>
      </se:FeatureTypeStyle>
    </UserStyle>
  </NamedLayer>
</StyledLayerDescriptor>"##;

    fn line_color(style: &VectorStyle) -> Color {
        match &style.kind {
            StyleKind::Line(line) => line.color,
            kind => panic!("expected line style, got {kind:?}"),
        }
    }

    #[derive(Default)]
    struct RecordingTarget {
        calls: Vec<(i32, Vec<String>, TileIndex)>,
    }

    impl StyleTarget<AttrDictionary> for RecordingTarget {
        fn build_objects(
            &mut self,
            style: &VectorStyle,
            features: &[&AttrDictionary],
            tile: TileIndex,
        ) {
            let names = features
                .iter()
                .filter_map(|attrs| attrs.get("name"))
                .map(|name| name.to_string())
                .collect();
            self.calls.push((style.draw_priority, names, tile));
        }
    }

    #[test]
    fn polygon_fill_opacity() {
        let styles = StyleSet::parse(ROADS, &Config::default()).unwrap();
        let found = styles.styles_for_feature_at_scale(&AttrDictionary::new(), 50000., "water");

        assert_eq!(found.len(), 1);
        let StyleKind::Polygon(polygon) = &found[0].kind else { panic!("{:?}", found[0]) };
        assert_eq!(polygon.color.a, 128);
        assert_eq!((polygon.color.r, polygon.color.g, polygon.color.b), (255, 0, 0));
    }

    #[test]
    fn scale_denominator_range() {
        let styles = StyleSet::parse(ROADS, &Config::default()).unwrap();
        let motorway = AttrDictionary::from_iter([("class", "motorway")]);

        let found = styles.styles_for_feature_at_scale(&motorway, 10000., "roads");
        assert_eq!(found.len(), 1);
        assert_eq!(line_color(&found[0]), Color::opaque(0xe8, 0x92, 0xa2));

        let found = styles.styles_for_feature_at_scale(&motorway, 2000., "roads");
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].min_scale, Some(1000.));
        assert_eq!(found[1].max_scale, Some(5000.));
    }

    #[test]
    fn else_filter() {
        let styles = StyleSet::parse(ROADS, &Config::default()).unwrap();
        let residential = AttrDictionary::from_iter([("class", "residential")]);

        let found = styles.styles_for_feature_at_scale(&residential, 10000., "roads");
        assert_eq!(found.len(), 1);
        assert_eq!(line_color(&found[0]), Color::opaque(0xaa, 0xaa, 0xaa));

        // Unfiltered detail rule suppresses the else rule.
        let found = styles.styles_for_feature_at_scale(&residential, 2000., "roads");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].min_scale, Some(1000.));

        let motorway = AttrDictionary::from_iter([("class", "motorway")]);
        let found = styles.styles_for_feature_at_scale(&motorway, 10000., "roads");
        assert_eq!(line_color(&found[0]), Color::opaque(0xe8, 0x92, 0xa2));
    }

    #[test]
    fn shared_between_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StyleSet>();

        let styles = Arc::new(StyleSet::parse(ROADS, &Config::default()).unwrap());
        let motorway = AttrDictionary::from_iter([("class", "motorway")]);
        let expected = styles.styles_for_feature_at_scale(&motorway, 2000., "roads");

        thread::scope(|scope| {
            let workers: Vec<_> = (0..2)
                .map(|_| {
                    scope.spawn(|| styles.styles_for_feature_at_scale(&motorway, 2000., "roads"))
                })
                .collect();

            for worker in workers {
                let found = worker.join().unwrap();
                assert_eq!(found.len(), expected.len());
                for (found, expected) in found.iter().zip(&expected) {
                    assert!(Arc::ptr_eq(found, expected));
                    assert!(Arc::ptr_eq(&styles.style_for_uuid(&found.uuid).unwrap(), found));
                }
            }
        });
    }

    #[test]
    fn document_order_priorities() {
        let mut config = Config::default();
        config.styling.base_priority = 10;
        let styles = StyleSet::parse(ROADS, &config).unwrap();

        let priorities: Vec<_> = styles.styles().map(|style| style.draw_priority).collect();
        assert_eq!(priorities, [10, 11, 12, 13]);

        for style in styles.styles() {
            let found = styles.style_for_uuid(&style.uuid).unwrap();
            assert!(Arc::ptr_eq(style, &found));
        }
        assert!(styles.style_for_uuid(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn layer_names() {
        let attrs = AttrDictionary::from_iter([("class", "motorway")]);

        let styles = StyleSet::parse(ROADS, &Config::default()).unwrap();
        assert!(styles.styles_for_feature_at_scale(&attrs, 10000., "rail").is_empty());
        assert_eq!(styles.layers().len(), 2);
        assert_eq!(styles.layers()[1].name.as_deref(), Some("water"));

        let mut config = Config::default();
        config.styling.use_layer_names = false;
        let styles = StyleSet::parse(ROADS, &config).unwrap();
        assert_eq!(styles.styles_for_feature_at_scale(&attrs, 10000., "rail").len(), 2);
    }

    #[test]
    fn layer_display() {
        let styles = StyleSet::parse(ROADS, &Config::default()).unwrap();

        // Water is only shown below a scale denominator of 100000.
        assert!(!styles.layer_should_display("water", TileIndex::new(0, 0, 10)));
        assert!(styles.layer_should_display("water", TileIndex::new(0, 0, 14)));
        assert!(styles.layer_should_display("roads", TileIndex::new(0, 0, 2)));
        assert!(!styles.layer_should_display("rail", TileIndex::new(0, 0, 14)));
    }

    #[test]
    fn build_objects_per_style() {
        let styles = StyleSet::parse(ROADS, &Config::default()).unwrap();
        let features = [
            AttrDictionary::from_iter([("class", "motorway"), ("name", "A1")]),
            AttrDictionary::from_iter([("class", "path"), ("name", "trail")]),
            AttrDictionary::from_iter([("class", "motorway"), ("name", "A7")]),
        ];
        let tile = TileIndex::new(8529, 5975, 14);

        let mut target = RecordingTarget::default();
        styles.build_objects(&features, tile, "roads", &mut target);

        assert_eq!(target.calls, [
            (0, vec![String::from("A1"), String::from("A7")], tile),
            (2, vec![String::from("trail")], tile),
        ]);
    }

    #[test]
    fn document_errors() {
        let config = Config::default();

        let err = StyleSet::parse("<UserStyle/>", &config).unwrap_err();
        assert!(matches!(err, Error::UnexpectedRoot(root) if root == "UserStyle"));

        let err = StyleSet::parse("<StyledLayerDescriptor>", &config).unwrap_err();
        assert!(matches!(err, Error::Xml(_)));

        // No root element at all.
        let err = StyleSet::parse("<?xml version=\"1.0\"?>", &config).unwrap_err();
        assert!(matches!(err, Error::Xml(_)));

        let err = StyleSet::from_path("/does/not/exist.sld", &config).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn graphics_next_to_document() {
        let sld = r##"<StyledLayerDescriptor xmlns:xlink="http://www.w3.org/1999/xlink">
          <NamedLayer>
            <Name>poi</Name>
            <UserStyle><FeatureTypeStyle><Rule>
              <PointSymbolizer>
                <Graphic>
                  <ExternalGraphic>
                    <OnlineResource xlink:href="icons/pin.svg"/>
                    <Format>image/svg+xml</Format>
                  </ExternalGraphic>
                  <Size>24</Size>
                </Graphic>
              </PointSymbolizer>
            </Rule></FeatureTypeStyle></UserStyle>
          </NamedLayer>
        </StyledLayerDescriptor>"##;
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="12" height="12">
          <circle cx="6" cy="6" r="6" fill="#ff0000"/>
        </svg>"##;

        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("icons")).unwrap();
        fs::write(dir.path().join("icons/pin.svg"), svg).unwrap();
        let path = dir.path().join("poi.sld");
        fs::write(&path, sld).unwrap();

        let styles = StyleSet::from_path(&path, &Config::default()).unwrap();
        let found = styles.styles_for_feature_at_scale(&AttrDictionary::new(), 1000., "poi");

        let StyleKind::Point(point) = &found[0].kind else { panic!("{:?}", found[0]) };
        assert_eq!(point.marker.size, Size::new(24, 24));
        assert_eq!(point.marker.pixel(12, 12), Some([255, 0, 0, 255]));
    }

    #[test]
    fn reader_with_custom_assets() {
        struct NoAssets;

        impl AssetSource for NoAssets {
            fn read(&self, path: &str) -> io::Result<Vec<u8>> {
                Err(io::Error::new(io::ErrorKind::NotFound, path.to_owned()))
            }
        }

        let reader = Cursor::new(ROADS.as_bytes());
        let styles = StyleSet::from_reader(reader, &Config::default(), &NoAssets).unwrap();
        assert_eq!(styles.styles().count(), 4);
    }
}
