//! Styling rules.

use std::sync::Arc;

use roxmltree::Node;
use tracing::debug;

use crate::attributes::{AttrDictionary, parse_number};
use crate::sld::operator::Filter;
use crate::sld::symbolizer::Symbolizer;
use crate::sld::{ParseContext, xml};
use crate::style::VectorStyle;

/// Scale range shared by all symbolizers of a rule.
#[derive(Copy, Clone, PartialEq, Default, Debug)]
pub struct RuleScope {
    pub min_scale: Option<f64>,
    pub max_scale: Option<f64>,
}

impl RuleScope {
    /// Check if a scale denominator is within `min..max`.
    pub fn contains(&self, scale: f64) -> bool {
        self.min_scale.is_none_or(|min| scale >= min)
            && self.max_scale.is_none_or(|max| scale < max)
    }
}

/// Filtered set of symbolizers.
#[derive(Default, Debug)]
pub struct Rule {
    pub name: Option<String>,
    pub title: Option<String>,
    pub abstract_: Option<String>,
    pub scope: RuleScope,
    filter: Option<Filter>,
    is_else: bool,
    symbolizers: Vec<Symbolizer>,
}

impl Rule {
    pub fn parse(node: Node<'_, '_>, context: &mut ParseContext<'_>) -> Self {
        let mut rule = Self::default();

        // Scale bounds apply to all symbolizers, regardless of element order.
        let scale = |name: &str| {
            let text = xml::text(xml::child(node, name)?);
            parse_number(&text).filter(|scale| *scale >= 0.)
        };
        rule.scope = RuleScope {
            min_scale: scale("MinScaleDenominator"),
            max_scale: scale("MaxScaleDenominator"),
        };

        for child in xml::elements(node) {
            match xml::name(child) {
                "Name" => rule.name = Some(xml::text(child)),
                "Title" => rule.title = Some(xml::text(child)),
                "Abstract" => rule.abstract_ = Some(xml::text(child)),
                "Filter" => rule.filter = Some(Filter::parse(child)),
                "ElseFilter" => rule.is_else = true,
                "MinScaleDenominator" | "MaxScaleDenominator" | "LegendGraphic"
                | "Description" => (),
                name if Symbolizer::is_symbolizer(name) => {
                    if let Some(symbolizer) = Symbolizer::parse(child, rule.scope, context) {
                        rule.symbolizers.push(symbolizer);
                    }
                },
                name => debug!("ignoring unknown Rule element: {name:?}"),
            }
        }

        rule
    }

    /// Check if this rule only applies when no sibling rule matched.
    pub fn is_else(&self) -> bool {
        self.is_else
    }

    /// Check if this rule's filter accepts a feature.
    ///
    /// Rules without filter accept every feature.
    pub fn matches(&self, attrs: &AttrDictionary) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter.evaluate(attrs))
    }

    pub fn symbolizers(&self) -> &[Symbolizer] {
        &self.symbolizers
    }

    /// All styles of this rule in document order.
    pub fn styles(&self) -> impl Iterator<Item = &Arc<VectorStyle>> {
        self.symbolizers.iter().flat_map(Symbolizer::styles)
    }
}
