//! Namespace-agnostic XML element helpers.
//!
//! SLD documents mix the `sld`, `se` and `ogc` namespaces freely, so all
//! lookups are done by local element name only.

use roxmltree::Node;

/// Local name of an element.
pub fn name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

/// Iterate over all child elements.
pub fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

/// Get the first child element with a local name.
pub fn child<'a, 'input>(node: Node<'a, 'input>, local_name: &str) -> Option<Node<'a, 'input>> {
    elements(node).find(|child| name(*child) == local_name)
}

/// Concatenated and trimmed text of an element and all its descendants.
pub fn text(node: Node<'_, '_>) -> String {
    let text: String = node.descendants().filter(Node::is_text).filter_map(|n| n.text()).collect();
    text.trim().to_owned()
}

/// Get an attribute by its local name, ignoring its namespace.
pub fn attribute<'a>(node: Node<'a, '_>, local_name: &str) -> Option<&'a str> {
    node.attributes().find(|attr| attr.name() == local_name).map(|attr| attr.value())
}
