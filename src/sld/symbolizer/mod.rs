//! Symbolizers, converting paint parameters into renderer styles.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use roxmltree::Node;
use smallvec::SmallVec;
use tracing::debug;

use crate::sld::rule::RuleScope;
use crate::sld::{ParseContext, xml};
use crate::style::{StyleKind, VectorStyle};

mod line;
mod point;
mod polygon;
mod text;

/// Styles produced by a single symbolizer.
type StyleKinds = SmallVec<[StyleKind; 2]>;

/// Element parser for one symbolizer kind.
type ParseFn = fn(Node<'_, '_>, &ParseContext<'_>) -> StyleKinds;

/// Symbolizer element names and their parsers.
const SYMBOLIZERS: [(&str, SymbolizerKind, ParseFn); 4] = [
    ("PointSymbolizer", SymbolizerKind::Point, point::parse),
    ("LineSymbolizer", SymbolizerKind::Line, line::parse),
    ("PolygonSymbolizer", SymbolizerKind::Polygon, polygon::parse),
    ("TextSymbolizer", SymbolizerKind::Text, text::parse),
];

/// Paint instructions of a rule.
#[derive(Debug)]
pub struct Symbolizer {
    kind: SymbolizerKind,
    styles: SmallVec<[Arc<VectorStyle>; 2]>,
}

impl Symbolizer {
    /// Parse a symbolizer element.
    ///
    /// Every recognized symbolizer consumes one draw priority, even if none
    /// of its styles could be created.
    pub fn parse(
        node: Node<'_, '_>,
        scope: RuleScope,
        context: &mut ParseContext<'_>,
    ) -> Option<Self> {
        let name = xml::name(node);
        let (_, kind, parse) = SYMBOLIZERS.iter().find(|(symbolizer, ..)| *symbolizer == name)?;

        let priority = context.next_priority();
        let styles: SmallVec<_> = parse(node, context)
            .into_iter()
            .map(|style| context.register(style, priority, scope))
            .collect();

        if styles.is_empty() {
            debug!("{name} produced no styles");
        }

        Some(Self { kind: *kind, styles })
    }

    /// Check if an element name is a known symbolizer.
    pub fn is_symbolizer(name: &str) -> bool {
        SYMBOLIZERS.iter().any(|(symbolizer, ..)| *symbolizer == name)
    }

    pub fn kind(&self) -> SymbolizerKind {
        self.kind
    }

    /// Styles in draw order.
    pub fn styles(&self) -> &[Arc<VectorStyle>] {
        &self.styles
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SymbolizerKind {
    Point,
    Line,
    Polygon,
    Text,
}

impl Display for SymbolizerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Point => write!(f, "point"),
            Self::Line => write!(f, "line"),
            Self::Polygon => write!(f, "polygon"),
            Self::Text => write!(f, "text"),
        }
    }
}
