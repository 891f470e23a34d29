use anyhow::{Context, Result};
use html5ever::interface::{Attribute, QualName};
use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::TendrilSink;
use html5ever::{namespace_url, ns, parse_document, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use regex::Regex;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::LazyLock;
use url::Url;

/// The asset categories the mirror downloads, each with its own subfolder in
/// the output tree and the attribute that carries its URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Stylesheet,
    Script,
    Image,
    Icon,
}

impl AssetKind {
    pub const ALL: [AssetKind; 4] = [
        AssetKind::Stylesheet,
        AssetKind::Script,
        AssetKind::Image,
        AssetKind::Icon,
    ];

    pub fn folder(self) -> &'static str {
        match self {
            AssetKind::Stylesheet => "css",
            AssetKind::Script => "js",
            AssetKind::Image => "images",
            AssetKind::Icon => "assets",
        }
    }

    pub fn attr(self) -> &'static str {
        match self {
            AssetKind::Stylesheet | AssetKind::Icon => "href",
            AssetKind::Script | AssetKind::Image => "src",
        }
    }
}

/// A discovered asset reference: the element that owns it, its category, and
/// the attribute value exactly as found in the tree.
#[derive(Clone)]
pub struct AssetRef {
    pub node: Handle,
    pub kind: AssetKind,
    pub raw: String,
}

pub fn parse_page(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(html)
}

pub fn serialize_page(dom: &RcDom) -> Result<String> {
    let mut buf = Vec::new();
    let handle: SerializableHandle = dom.document.clone().into();
    serialize(&mut buf, &handle, SerializeOpts::default())
        .context("failed to serialize document")?;
    String::from_utf8(buf).context("serialized document was not valid UTF-8")
}

/// Resolve a raw attribute value against the page URL. Handles absolute,
/// protocol-relative, and relative forms.
pub fn resolve_url(base: &Url, raw: &str) -> Result<Url> {
    base.join(raw)
        .with_context(|| format!("cannot resolve {raw} against {base}"))
}

fn walk(node: &Handle, visit: &mut dyn FnMut(&Handle)) {
    visit(node);
    for child in node.children.borrow().iter() {
        walk(child, visit);
    }
}

/// Collect, in document order, every element the predicate accepts.
fn find_elements(dom: &RcDom, mut pred: impl FnMut(&Handle) -> bool) -> Vec<Handle> {
    let mut found = Vec::new();
    walk(&dom.document, &mut |node| {
        if pred(node) {
            found.push(node.clone());
        }
    });
    found
}

fn is_element(node: &Handle, name: &str) -> bool {
    matches!(&node.data, NodeData::Element { name: qual, .. } if qual.local.as_ref() == name)
}

pub fn get_attr(node: &Handle, attr: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| a.name.local.as_ref() == attr)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

pub fn set_attr(node: &Handle, attr: &str, value: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs = attrs.borrow_mut();
        match attrs.iter_mut().find(|a| a.name.local.as_ref() == attr) {
            Some(existing) => existing.value = value.into(),
            None => attrs.push(Attribute {
                name: QualName::new(None, ns!(), LocalName::from(attr)),
                value: value.into(),
            }),
        }
    }
}

fn rel_contains(node: &Handle, needles: &[&str]) -> bool {
    get_attr(node, "rel").is_some_and(|rel| needles.iter().any(|needle| rel.contains(needle)))
}

fn matches_rule(node: &Handle, kind: AssetKind) -> bool {
    match kind {
        AssetKind::Stylesheet => is_element(node, "link") && rel_contains(node, &["stylesheet"]),
        AssetKind::Script => is_element(node, "script"),
        AssetKind::Image => is_element(node, "img"),
        AssetKind::Icon => is_element(node, "link") && rel_contains(node, &["icon", "shortcut"]),
    }
}

/// Apply one discovery rule over the whole tree. Elements without the
/// relevant attribute are not candidates.
pub fn discover_assets(dom: &RcDom, kind: AssetKind) -> Vec<AssetRef> {
    find_elements(dom, |node| matches_rule(node, kind))
        .into_iter()
        .filter_map(|node| {
            let raw = get_attr(&node, kind.attr())?;
            Some(AssetRef { node, kind, raw })
        })
        .collect()
}

pub fn style_elements(dom: &RcDom) -> Vec<Handle> {
    find_elements(dom, |node| is_element(node, "style"))
}

/// Concatenated text of an element's direct text children.
pub fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    for child in node.children.borrow().iter() {
        if let NodeData::Text { contents } = &child.data {
            text.push_str(&contents.borrow());
        }
    }
    text
}

/// Unlink a node from its parent. The handle stays valid but is no longer
/// part of the document.
pub fn detach(node: &Handle) {
    if let Some(parent) = node.parent.take().and_then(|weak| weak.upgrade()) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
}

pub fn find_head(dom: &RcDom) -> Option<Handle> {
    find_elements(dom, |node| is_element(node, "head")).into_iter().next()
}

/// Append a `<link rel="stylesheet">` element to the head and return its
/// handle so callers can exclude it from later discovery passes.
pub fn append_stylesheet_link(head: &Handle, href: &str) -> Handle {
    let link = Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from("link")),
        attrs: RefCell::new(vec![
            Attribute {
                name: QualName::new(None, ns!(), LocalName::from("rel")),
                value: "stylesheet".into(),
            },
            Attribute {
                name: QualName::new(None, ns!(), LocalName::from("href")),
                value: href.into(),
            },
        ]),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    });

    link.parent.set(Some(Rc::downgrade(head)));
    head.children.borrow_mut().push(link.clone());
    link
}

static CSS_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).expect("css url pattern is valid")
});

/// Every `url(...)` argument in a stylesheet, quoted or bare, in order of
/// appearance. Duplicates are kept.
pub fn css_url_references(css: &str) -> Vec<String> {
    CSS_URL_PATTERN
        .captures_iter(css)
        .filter_map(|cap| cap.get(1))
        .map(|group| group.as_str().to_string())
        .collect()
}
