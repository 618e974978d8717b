//! Filter expressions.
//!
//! Expressions evaluate to a scalar [`Value`] for a feature. Evaluation never
//! fails loudly: missing properties and non-numeric arithmetic operands
//! produce no value.

use std::borrow::Cow;

use roxmltree::Node;
use tracing::debug;

use crate::attributes::{AttrDictionary, Value, parse_number};
use crate::sld::xml;

/// Element parser for one expression kind.
type ParseFn = fn(Node<'_, '_>) -> Option<Expression>;

/// Expression element names and their parsers.
const EXPRESSIONS: [(&str, ParseFn); 6] = [
    ("PropertyName", parse_property_name),
    ("Literal", parse_literal),
    ("Add", parse_add),
    ("Sub", parse_sub),
    ("Mul", parse_mul),
    ("Div", parse_div),
];

/// Expression tree node.
#[derive(Clone, PartialEq, Debug)]
pub enum Expression {
    /// Reference to a feature attribute.
    PropertyName(String),
    /// Constant parsed once from the document.
    Literal(Value),
    /// Numeric operation on two subexpressions.
    Arithmetic { op: ArithmeticOp, left: Box<Expression>, right: Box<Expression> },
}

impl Expression {
    /// Parse an expression element.
    ///
    /// Returns `None` for elements which are not expressions.
    pub fn parse(node: Node<'_, '_>) -> Option<Self> {
        let name = xml::name(node);
        let (_, parse) = EXPRESSIONS.iter().find(|(expression, _)| *expression == name)?;
        parse(node)
    }

    /// Evaluate the expression for a feature.
    pub fn evaluate<'a>(&'a self, attrs: &'a AttrDictionary) -> Option<Cow<'a, Value>> {
        match self {
            Self::PropertyName(name) => attrs.get(name.as_str()).map(Cow::Borrowed),
            Self::Literal(value) => Some(Cow::Borrowed(value)),
            Self::Arithmetic { op, left, right } => {
                let left = left.evaluate(attrs)?.as_number()?;
                let right = right.evaluate(attrs)?.as_number()?;
                op.apply(left, right).map(|result| Cow::Owned(Value::Number(result)))
            },
        }
    }
}

/// Binary arithmetic operators.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    fn apply(self, left: f64, right: f64) -> Option<f64> {
        let result = match self {
            Self::Add => left + right,
            Self::Sub => left - right,
            Self::Mul => left * right,
            Self::Div if right == 0. => return None,
            Self::Div => left / right,
        };
        result.is_finite().then_some(result)
    }
}

/// Segment of mixed text and expression content, like a label.
#[derive(Clone, PartialEq, Debug)]
pub enum LabelPart {
    Text(String),
    Expression(Expression),
}

/// Parse mixed content of text and expression elements.
///
/// Whitespace runs inside text are collapsed to a single space.
pub fn parse_mixed(node: Node<'_, '_>) -> Vec<LabelPart> {
    let mut parts = Vec::new();
    for child in node.children() {
        if child.is_element() {
            match Expression::parse(child) {
                Some(expression) => parts.push(LabelPart::Expression(expression)),
                None => debug!("ignoring unknown label element: {:?}", xml::name(child)),
            }
            continue;
        }

        let Some(text) = child.text().filter(|_| child.is_text()) else { continue };
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            continue;
        }

        // Keep separation from neighboring expressions.
        let mut segment = String::new();
        if text.starts_with(char::is_whitespace) {
            segment.push(' ');
        }
        segment.push_str(&collapsed);
        if text.ends_with(char::is_whitespace) {
            segment.push(' ');
        }
        parts.push(LabelPart::Text(segment));
    }
    parts
}

fn parse_property_name(node: Node<'_, '_>) -> Option<Expression> {
    let name = xml::text(node);
    if name.is_empty() {
        debug!("ignoring empty PropertyName");
        return None;
    }
    Some(Expression::PropertyName(name))
}

fn parse_literal(node: Node<'_, '_>) -> Option<Expression> {
    let text = xml::text(node);
    let value = match parse_number(&text) {
        Some(number) => Value::Number(number),
        None => Value::String(text),
    };
    Some(Expression::Literal(value))
}

fn parse_add(node: Node<'_, '_>) -> Option<Expression> {
    parse_arithmetic(node, ArithmeticOp::Add)
}

fn parse_sub(node: Node<'_, '_>) -> Option<Expression> {
    parse_arithmetic(node, ArithmeticOp::Sub)
}

fn parse_mul(node: Node<'_, '_>) -> Option<Expression> {
    parse_arithmetic(node, ArithmeticOp::Mul)
}

fn parse_div(node: Node<'_, '_>) -> Option<Expression> {
    parse_arithmetic(node, ArithmeticOp::Div)
}

fn parse_arithmetic(node: Node<'_, '_>, op: ArithmeticOp) -> Option<Expression> {
    let mut operands = xml::elements(node).filter_map(Expression::parse);
    match (operands.next(), operands.next()) {
        (Some(left), Some(right)) => {
            Some(Expression::Arithmetic { op, left: Box::new(left), right: Box::new(right) })
        },
        _ => {
            debug!("ignoring {op:?} with less than two operands");
            None
        },
    }
}
