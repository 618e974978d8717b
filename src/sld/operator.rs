//! Filter operators.
//!
//! Operators are boolean predicates over a feature's attributes. Comparisons
//! between incompatible values never fail, they are simply `false`.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use roxmltree::Node;
use tracing::debug;

use crate::attributes::{AttrDictionary, Value};
use crate::sld::expression::Expression;
use crate::sld::xml;

/// Element parser for one operator kind.
type ParseFn = fn(Node<'_, '_>) -> Option<Operator>;

/// Operator element names and their parsers.
const OPERATORS: [(&str, ParseFn); 12] = [
    ("PropertyIsEqualTo", parse_equal),
    ("PropertyIsNotEqualTo", parse_not_equal),
    ("PropertyIsLessThan", parse_less),
    ("PropertyIsGreaterThan", parse_greater),
    ("PropertyIsLessThanOrEqualTo", parse_less_equal),
    ("PropertyIsGreaterThanOrEqualTo", parse_greater_equal),
    ("PropertyIsBetween", parse_between),
    ("PropertyIsLike", parse_like),
    ("PropertyIsNull", parse_null),
    ("Not", parse_not),
    ("And", parse_and),
    ("Or", parse_or),
];

/// Boolean predicate tree node.
#[derive(Debug)]
pub enum Operator {
    Comparison(BinaryComparison),
    Between(IsBetween),
    Like(IsLike),
    /// True if the expression has no value.
    Null(Expression),
    /// Negation, which is `false` without an operand.
    Not(Option<Box<Operator>>),
    Logical(LogicalOp, Vec<Operator>),
}

impl Operator {
    /// Parse an operator element.
    ///
    /// Returns `None` for elements which are not valid operators.
    pub fn parse(node: Node<'_, '_>) -> Option<Self> {
        let name = xml::name(node);
        match OPERATORS.iter().find(|(operator, _)| *operator == name) {
            Some((_, parse)) => parse(node),
            None => {
                debug!("ignoring unknown operator: {name:?}");
                None
            },
        }
    }

    /// Evaluate the predicate for a feature.
    pub fn evaluate(&self, attrs: &AttrDictionary) -> bool {
        match self {
            Self::Comparison(comparison) => comparison.evaluate(attrs),
            Self::Between(between) => between.evaluate(attrs),
            Self::Like(like) => like.evaluate(attrs),
            Self::Null(expression) => expression.evaluate(attrs).is_none(),
            Self::Not(operand) => operand.as_ref().is_some_and(|operand| !operand.evaluate(attrs)),
            // Operands are always evaluated in full, without short-circuiting.
            Self::Logical(LogicalOp::And, operands) => {
                operands.iter().fold(true, |result, operand| operand.evaluate(attrs) && result)
            },
            Self::Logical(LogicalOp::Or, operands) => {
                operands.iter().fold(false, |result, operand| operand.evaluate(attrs) || result)
            },
        }
    }
}

/// Root predicate of a rule's `<Filter>`.
#[derive(Debug)]
pub struct Filter {
    root: Option<Operator>,
}

impl Filter {
    /// Parse a `<Filter>` element.
    ///
    /// The first valid operator becomes the filter's root.
    pub fn parse(node: Node<'_, '_>) -> Self {
        let root = xml::elements(node).find_map(Operator::parse);
        if root.is_none() {
            debug!("filter without valid operator never matches");
        }
        Self { root }
    }

    /// Check if a feature passes the filter.
    pub fn evaluate(&self, attrs: &AttrDictionary) -> bool {
        self.root.as_ref().is_some_and(|root| root.evaluate(attrs))
    }
}

/// Logical connectives.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LogicalOp {
    And,
    Or,
}

/// Comparison operators.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ComparisonKind {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl ComparisonKind {
    fn test(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Gt => ordering == Ordering::Greater,
            Self::Le => ordering != Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// Comparison of two expressions.
#[derive(Debug)]
pub struct BinaryComparison {
    pub kind: ComparisonKind,
    pub left: Expression,
    pub right: Expression,
    pub match_case: bool,
}

impl BinaryComparison {
    pub fn new(kind: ComparisonKind, left: Expression, right: Expression) -> Self {
        Self { kind, left, right, match_case: true }
    }

    pub fn evaluate(&self, attrs: &AttrDictionary) -> bool {
        let (Some(left), Some(right)) = (self.left.evaluate(attrs), self.right.evaluate(attrs))
        else {
            return false;
        };

        compare(&left, &right, self.match_case).is_some_and(|ordering| self.kind.test(ordering))
    }
}

/// Inclusive range test.
#[derive(Debug)]
pub struct IsBetween {
    pub expression: Expression,
    pub lower: Expression,
    pub upper: Expression,
}

impl IsBetween {
    pub fn evaluate(&self, attrs: &AttrDictionary) -> bool {
        let value = self.expression.evaluate(attrs);
        let lower = self.lower.evaluate(attrs);
        let upper = self.upper.evaluate(attrs);
        let (Some(value), Some(lower), Some(upper)) = (value, lower, upper) else {
            return false;
        };

        // All three values must share the same coercion class.
        let all_numeric = value.is_numeric() && lower.is_numeric() && upper.is_numeric();
        let any_numeric = value.is_numeric() || lower.is_numeric() || upper.is_numeric();
        if any_numeric && !all_numeric {
            return false;
        }

        let above_lower = compare(&value, &lower, true).is_some_and(|o| o != Ordering::Less);
        let below_upper = compare(&value, &upper, true).is_some_and(|o| o != Ordering::Greater);
        above_lower && below_upper
    }
}

/// SQL-LIKE pattern match.
#[derive(Debug)]
pub struct IsLike {
    pub expression: Expression,
    /// Compiled pattern, `None` if the pattern definition was invalid.
    regex: Option<Regex>,
}

impl IsLike {
    /// Create a pattern matcher.
    ///
    /// The wildcard, single character and escape strings must each be
    /// exactly one character long, otherwise the operator never matches.
    pub fn new(
        expression: Expression,
        pattern: &str,
        wildcard: &str,
        single_char: &str,
        escape: &str,
        match_case: bool,
    ) -> Self {
        let regex = like_regex(pattern, wildcard, single_char, escape, match_case);
        Self { expression, regex }
    }

    pub fn evaluate(&self, attrs: &AttrDictionary) -> bool {
        let Some(regex) = &self.regex else { return false };
        let Some(value) = self.expression.evaluate(attrs) else { return false };
        value.as_str().is_some_and(|text| regex.is_match(text))
    }
}

/// Compare two values with numeric-or-string coercion.
///
/// Returns `None` if the values are not comparable.
fn compare(left: &Value, right: &Value, match_case: bool) -> Option<Ordering> {
    if let (Some(left), Some(right)) = (left.as_number(), right.as_number()) {
        return left.partial_cmp(&right);
    }

    match (left, right) {
        (Value::String(left), Value::String(right)) if match_case => Some(left.cmp(right)),
        (Value::String(left), Value::String(right)) => {
            Some(left.to_lowercase().cmp(&right.to_lowercase()))
        },
        _ => None,
    }
}

/// Translate a LIKE pattern into an anchored regular expression.
fn like_regex(
    pattern: &str,
    wildcard: &str,
    single_char: &str,
    escape: &str,
    match_case: bool,
) -> Option<Regex> {
    let (Some(wildcard), Some(single_char), Some(escape)) =
        (single(wildcard), single(single_char), single(escape))
    else {
        debug!("inert PropertyIsLike: {wildcard:?}, {single_char:?}, {escape:?} must be one char");
        return None;
    };

    let mut regex = String::from("^(?:");
    let mut escaped = false;
    for c in pattern.chars() {
        if escaped {
            regex.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
            escaped = false;
        } else if c == escape {
            escaped = true;
        } else if c == wildcard {
            regex.push_str(".*");
        } else if c == single_char {
            regex.push_str(".?");
        } else {
            regex.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
        }
    }

    // Dangling escape characters match themselves.
    if escaped {
        regex.push_str(&regex::escape(escape.encode_utf8(&mut [0; 4])));
    }
    regex.push_str(")$");

    RegexBuilder::new(&regex)
        .case_insensitive(!match_case)
        .dot_matches_new_line(true)
        .build()
        .inspect_err(|err| debug!("invalid PropertyIsLike pattern {pattern:?}: {err}"))
        .ok()
}

/// Get the only character of a string.
fn single(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Check the `matchCase` attribute, which defaults to `true`.
fn match_case(node: Node<'_, '_>) -> bool {
    xml::attribute(node, "matchCase").is_none_or(|value| !value.eq_ignore_ascii_case("false"))
}

/// Get the first expressions of an operator element.
fn expressions<const N: usize>(node: Node<'_, '_>) -> Option<[Expression; N]> {
    let expressions: Vec<_> = xml::elements(node).filter_map(Expression::parse).take(N).collect();
    match expressions.try_into() {
        Ok(expressions) => Some(expressions),
        Err(_) => {
            debug!("ignoring {:?} with less than {N} expressions", xml::name(node));
            None
        },
    }
}

fn parse_comparison(node: Node<'_, '_>, kind: ComparisonKind) -> Option<Operator> {
    let [left, right] = expressions(node)?;
    let match_case = match_case(node);
    Some(Operator::Comparison(BinaryComparison { kind, left, right, match_case }))
}

fn parse_equal(node: Node<'_, '_>) -> Option<Operator> {
    parse_comparison(node, ComparisonKind::Eq)
}

fn parse_not_equal(node: Node<'_, '_>) -> Option<Operator> {
    parse_comparison(node, ComparisonKind::Ne)
}

fn parse_less(node: Node<'_, '_>) -> Option<Operator> {
    parse_comparison(node, ComparisonKind::Lt)
}

fn parse_greater(node: Node<'_, '_>) -> Option<Operator> {
    parse_comparison(node, ComparisonKind::Gt)
}

fn parse_less_equal(node: Node<'_, '_>) -> Option<Operator> {
    parse_comparison(node, ComparisonKind::Le)
}

fn parse_greater_equal(node: Node<'_, '_>) -> Option<Operator> {
    parse_comparison(node, ComparisonKind::Ge)
}

fn parse_between(node: Node<'_, '_>) -> Option<Operator> {
    let expression = xml::elements(node).find_map(Expression::parse);
    let boundary = |name: &str| {
        let [boundary] = expressions::<1>(xml::child(node, name)?)?;
        Some(boundary)
    };

    match (expression, boundary("LowerBoundary"), boundary("UpperBoundary")) {
        (Some(expression), Some(lower), Some(upper)) => {
            Some(Operator::Between(IsBetween { expression, lower, upper }))
        },
        _ => {
            debug!("ignoring incomplete PropertyIsBetween");
            None
        },
    }
}

fn parse_like(node: Node<'_, '_>) -> Option<Operator> {
    let wildcard = xml::attribute(node, "wildCard").unwrap_or("*");
    let single_char = xml::attribute(node, "singleChar").unwrap_or(".");
    let escape = xml::attribute(node, "escapeChar")
        .or_else(|| xml::attribute(node, "escape"))
        .unwrap_or("!");

    let mut children = xml::elements(node);
    let expression = children.by_ref().find_map(Expression::parse)?;
    let pattern = children.find(|child| xml::name(*child) == "Literal").map(xml::text)?;

    let like =
        IsLike::new(expression, &pattern, wildcard, single_char, escape, match_case(node));
    Some(Operator::Like(like))
}

fn parse_null(node: Node<'_, '_>) -> Option<Operator> {
    let [expression] = expressions(node)?;
    Some(Operator::Null(expression))
}

fn parse_not(node: Node<'_, '_>) -> Option<Operator> {
    let operand = xml::elements(node).find_map(Operator::parse);
    Some(Operator::Not(operand.map(Box::new)))
}

fn parse_and(node: Node<'_, '_>) -> Option<Operator> {
    let operands = xml::elements(node).filter_map(Operator::parse).collect();
    Some(Operator::Logical(LogicalOp::And, operands))
}

fn parse_or(node: Node<'_, '_>) -> Option<Operator> {
    let operands = xml::elements(node).filter_map(Operator::parse).collect();
    Some(Operator::Logical(LogicalOp::Or, operands))
}

#[cfg(test)]
mod tests {
    use roxmltree::Document;

    use super::*;

    fn literal(value: impl Into<Value>) -> Expression {
        Expression::Literal(value.into())
    }

    fn property(name: &str) -> Expression {
        Expression::PropertyName(name.into())
    }

    fn filter(xml: &str) -> Filter {
        let xml =
            format!(r#"<ogc:Filter xmlns:ogc="http://www.opengis.net/ogc">{xml}</ogc:Filter>"#);
        let document = Document::parse(&xml).unwrap();
        Filter::parse(document.root_element())
    }

    fn like(pattern: &str, match_case: bool) -> IsLike {
        IsLike::new(property("name"), pattern, "%", "_", "\\", match_case)
    }

    fn named(name: &str) -> AttrDictionary {
        AttrDictionary::from_iter([("name", name)])
    }

    #[test]
    fn numeric_comparison() {
        let attrs = AttrDictionary::from_iter([("lanes", Value::from("4")), ("width", 12.into())]);

        let less = BinaryComparison::new(ComparisonKind::Lt, property("lanes"), literal(10.));
        assert!(less.evaluate(&attrs));

        // Numeric strings compare numerically, not lexicographically.
        let greater = BinaryComparison::new(ComparisonKind::Gt, literal("9"), literal("10"));
        assert!(!greater.evaluate(&attrs));

        let equal = BinaryComparison::new(ComparisonKind::Eq, property("width"), literal("12.0"));
        assert!(equal.evaluate(&attrs));

        let ge = BinaryComparison::new(ComparisonKind::Ge, property("width"), literal(12.));
        assert!(ge.evaluate(&attrs));
        let le = BinaryComparison::new(ComparisonKind::Le, property("width"), literal(11.));
        assert!(!le.evaluate(&attrs));
        let ne = BinaryComparison::new(ComparisonKind::Ne, property("lanes"), literal(4.));
        assert!(!ne.evaluate(&attrs));
    }

    #[test]
    fn string_comparison() {
        let attrs = named("Berlin");

        for (other, expected) in [("Bonn", true), ("Aachen", false), ("berlin", true)] {
            let less = BinaryComparison::new(ComparisonKind::Lt, property("name"), literal(other));
            assert_eq!(less.evaluate(&attrs), "Berlin" < other);
            assert_eq!(less.evaluate(&attrs), expected);
        }

        let mut equal =
            BinaryComparison::new(ComparisonKind::Eq, property("name"), literal("BERLIN"));
        assert!(!equal.evaluate(&attrs));
        equal.match_case = false;
        assert!(equal.evaluate(&attrs));

        let mut less = BinaryComparison::new(ComparisonKind::Lt, property("name"), literal("bonn"));
        less.match_case = false;
        assert!(less.evaluate(&attrs));
        let mut less =
            BinaryComparison::new(ComparisonKind::Lt, property("name"), literal("AACHEN"));
        less.match_case = false;
        assert!(!less.evaluate(&attrs));
    }

    #[test]
    fn incomparable_values() {
        let attrs =
            AttrDictionary::from_iter([("name", Value::from("Rhine")), ("nan", f64::NAN.into())]);

        for kind in [
            ComparisonKind::Eq,
            ComparisonKind::Ne,
            ComparisonKind::Lt,
            ComparisonKind::Gt,
            ComparisonKind::Le,
            ComparisonKind::Ge,
        ] {
            let mixed = BinaryComparison::new(kind, property("name"), literal(3.));
            assert!(!mixed.evaluate(&attrs));

            let missing = BinaryComparison::new(kind, property("missing"), literal("Rhine"));
            assert!(!missing.evaluate(&attrs));

            let nan = BinaryComparison::new(kind, property("nan"), literal(1.));
            assert!(!nan.evaluate(&attrs));
        }
    }

    #[test]
    fn between_is_inclusive() {
        let between = |value: Value| {
            let attrs = AttrDictionary::from_iter([("value", value)]);
            let between = IsBetween {
                expression: property("value"),
                lower: literal(10.),
                upper: literal("20"),
            };
            between.evaluate(&attrs)
        };

        assert!(between(10.into()));
        assert!(between(20.into()));
        assert!(between("15".into()));
        assert!(!between(9.99.into()));
        assert!(!between(20.01.into()));
        assert!(!between("fifteen".into()));
    }

    #[test]
    fn string_between() {
        let attrs = named("m");
        let between =
            IsBetween { expression: property("name"), lower: literal("a"), upper: literal("m") };
        assert!(between.evaluate(&attrs));

        let attrs = named("n");
        assert!(!between.evaluate(&attrs));

        // Bounds of mixed classes never match.
        let mixed =
            IsBetween { expression: property("name"), lower: literal(1.), upper: literal("z") };
        assert!(!mixed.evaluate(&attrs));
    }

    #[test]
    fn like_wildcards() {
        let pattern = like("a%b", true);
        assert!(pattern.evaluate(&named("aXYZb")));
        assert!(pattern.evaluate(&named("ab")));
        assert!(!pattern.evaluate(&named("aXYZ")));
        assert!(!pattern.evaluate(&named("xab")));

        let pattern = like("a_c", true);
        assert!(pattern.evaluate(&named("abc")));
        assert!(pattern.evaluate(&named("ac")));
        assert!(!pattern.evaluate(&named("abbc")));
    }

    #[test]
    fn like_escapes() {
        let pattern = like("a\\%b", true);
        assert!(pattern.evaluate(&named("a%b")));
        assert!(!pattern.evaluate(&named("aXb")));
        assert!(!pattern.evaluate(&named("ab")));

        // Regex syntax in the pattern is matched literally.
        let pattern = like("(a.b)+", true);
        assert!(pattern.evaluate(&named("(a.b)+")));
        assert!(!pattern.evaluate(&named("aab")));
    }

    #[test]
    fn like_case_and_types() {
        assert!(!like("main%", true).evaluate(&named("Main Street")));
        assert!(like("main%", false).evaluate(&named("Main Street")));

        let attrs = AttrDictionary::from_iter([("name", 42)]);
        assert!(!like("%", true).evaluate(&attrs));
        assert!(!like("%", true).evaluate(&AttrDictionary::new()));
    }

    #[test]
    fn inert_like() {
        let pattern = IsLike::new(property("name"), "a%", "%%", "_", "\\", true);
        assert!(!pattern.evaluate(&named("abc")));

        let pattern = IsLike::new(property("name"), "a%", "%", "", "\\", true);
        assert!(!pattern.evaluate(&named("abc")));
    }

    #[test]
    fn logical_identities() {
        let attrs = AttrDictionary::new();
        assert!(Operator::Logical(LogicalOp::And, Vec::new()).evaluate(&attrs));
        assert!(!Operator::Logical(LogicalOp::Or, Vec::new()).evaluate(&attrs));
        assert!(!Operator::Not(None).evaluate(&attrs));
    }

    #[test]
    fn parse_filters() {
        let rhine =
            AttrDictionary::from_iter([("name", Value::from("Rhine")), ("width", 400.into())]);
        let elbe =
            AttrDictionary::from_iter([("name", Value::from("Elbe")), ("width", 200.into())]);

        let river = filter(
            r#"<ogc:And>
                <ogc:PropertyIsLike wildCard="*" singleChar="." escape="!" matchCase="false">
                    <ogc:PropertyName>name</ogc:PropertyName>
                    <ogc:Literal>r*</ogc:Literal>
                </ogc:PropertyIsLike>
                <ogc:PropertyIsBetween>
                    <ogc:PropertyName>width</ogc:PropertyName>
                    <ogc:LowerBoundary><ogc:Literal>100</ogc:Literal></ogc:LowerBoundary>
                    <ogc:UpperBoundary><ogc:Literal>500</ogc:Literal></ogc:UpperBoundary>
                </ogc:PropertyIsBetween>
            </ogc:And>"#,
        );
        assert!(river.evaluate(&rhine));
        assert!(!river.evaluate(&elbe));

        let not_wide = filter(
            r#"<ogc:Not>
                <ogc:PropertyIsGreaterThanOrEqualTo>
                    <ogc:PropertyName>width</ogc:PropertyName>
                    <ogc:Add>
                        <ogc:Literal>150</ogc:Literal>
                        <ogc:Literal>150</ogc:Literal>
                    </ogc:Add>
                </ogc:PropertyIsGreaterThanOrEqualTo>
            </ogc:Not>"#,
        );
        assert!(!not_wide.evaluate(&rhine));
        assert!(not_wide.evaluate(&elbe));

        let any = filter(
            r#"<ogc:Or>
                <ogc:PropertyIsEqualTo matchCase="false">
                    <ogc:PropertyName>name</ogc:PropertyName>
                    <ogc:Literal>ELBE</ogc:Literal>
                </ogc:PropertyIsEqualTo>
                <ogc:PropertyIsNull>
                    <ogc:PropertyName>name</ogc:PropertyName>
                </ogc:PropertyIsNull>
            </ogc:Or>"#,
        );
        assert!(!any.evaluate(&rhine));
        assert!(any.evaluate(&elbe));
        assert!(any.evaluate(&AttrDictionary::new()));
    }

    #[test]
    fn invalid_filters() {
        // Comparisons need two expressions.
        let incomplete = filter(concat!(
            "<ogc:PropertyIsEqualTo>",
            "<ogc:PropertyName>name</ogc:PropertyName>",
            "</ogc:PropertyIsEqualTo>",
        ));
        assert!(!incomplete.evaluate(&named("Rhine")));

        let unknown = filter("<ogc:Intersects/>");
        assert!(!unknown.evaluate(&named("Rhine")));

        // Unknown operators are skipped in favor of the next valid one.
        let fallback = filter(
            r#"<ogc:BBOX/>
            <ogc:PropertyIsNotEqualTo>
                <ogc:PropertyName>name</ogc:PropertyName>
                <ogc:Literal>Elbe</ogc:Literal>
            </ogc:PropertyIsNotEqualTo>"#,
        );
        assert!(fallback.evaluate(&named("Rhine")));
    }
}
