//! Scene descriptors.
//!
//! A [`SceneDescriptor`] is a tree of tagged elements, each carrying string
//! attributes. Elements are stored in an arena and addressed by [`ElementId`];
//! an [`Element`] is a cheap borrowed handle that can walk to its parent and
//! children.
//!
//! Descriptors are built programmatically from [`ElementSpec`] values or
//! decoded from JSON:
//!
//! ```
//! use sonde_physics::sdf::{ElementSpec, SceneDescriptor};
//!
//! let descriptor = SceneDescriptor::from_spec(
//!     &ElementSpec::new("world").attr("name", "default").child(
//!         ElementSpec::new("model").attr("name", "robot").child(
//!             ElementSpec::new("link").attr("name", "base").child(
//!                 ElementSpec::new("sensor").attr("name", "ray1").attr("type", "ray"),
//!             ),
//!         ),
//!     ),
//! );
//!
//! let sensor = descriptor.elements_named("sensor").next().unwrap();
//! let link = sensor.parent().unwrap();
//! assert_eq!(link.name(), "link");
//! assert_eq!(link.value_string("name"), Some("base"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DescriptorError;
use crate::pose::Pose;

/// Index of an element within its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(usize);

impl ElementId {
    /// Returns the raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Serializable, owned form of an element subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSpec {
    /// Tag name
    pub name: String,
    /// Attribute map
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Child elements in document order
    #[serde(default)]
    pub children: Vec<ElementSpec>,
}

impl ElementSpec {
    /// Create an element with no attributes or children.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set an attribute.
    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.insert(key.into(), value.to_string());
        self
    }

    /// Append a child element.
    #[must_use]
    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    attributes: BTreeMap<String, String>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

/// Hierarchical scene document.
#[derive(Debug, Clone)]
pub struct SceneDescriptor {
    nodes: Vec<Node>,
}

impl SceneDescriptor {
    /// Create a descriptor holding a single root element.
    #[must_use]
    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![Node {
                name: root_name.to_string(),
                attributes: BTreeMap::new(),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Build a descriptor whose root is `spec`.
    #[must_use]
    pub fn from_spec(spec: &ElementSpec) -> Self {
        let mut descriptor = Self::new(&spec.name);
        let root = descriptor.root_id();
        descriptor.nodes[0].attributes = spec.attributes.clone();
        for child in &spec.children {
            descriptor.insert_spec(root, child);
        }
        descriptor
    }

    /// Decode a descriptor from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Json`] if the text is not a valid element tree.
    pub fn from_json_str(text: &str) -> Result<Self, DescriptorError> {
        let spec: ElementSpec = serde_json::from_str(text)?;
        Ok(Self::from_spec(&spec))
    }

    /// Convert back into the owned, serializable form.
    #[must_use]
    pub fn to_spec(&self) -> ElementSpec {
        self.root().to_spec()
    }

    /// Id of the root element.
    #[must_use]
    pub const fn root_id(&self) -> ElementId {
        ElementId(0)
    }

    /// Handle to the root element.
    #[must_use]
    pub fn root(&self) -> Element<'_> {
        Element {
            descriptor: self,
            id: self.root_id(),
        }
    }

    /// Handle to an element by id, if it belongs to this descriptor.
    #[must_use]
    pub fn element(&self, id: ElementId) -> Option<Element<'_>> {
        (id.0 < self.nodes.len()).then_some(Element {
            descriptor: self,
            id,
        })
    }

    /// Append a new element under `parent` and return its id.
    ///
    /// # Panics
    ///
    /// Panics if `parent` was not issued by this descriptor.
    pub fn add_child(&mut self, parent: ElementId, name: &str) -> ElementId {
        assert!(parent.0 < self.nodes.len(), "element {parent:?} is not in this descriptor");
        let id = ElementId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            attributes: BTreeMap::new(),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Set an attribute on an element. Unknown ids are ignored.
    pub fn set_attribute(&mut self, id: ElementId, key: &str, value: impl ToString) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.attributes.insert(key.to_string(), value.to_string());
        }
    }

    /// Number of elements, including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A descriptor always holds its root, so this is never true.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All elements with the given tag, in document order (root included).
    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Element<'a>> + 'a {
        std::iter::once(self.root())
            .chain(self.root().descendants())
            .filter(move |element| element.name() == name)
    }

    fn insert_spec(&mut self, parent: ElementId, spec: &ElementSpec) {
        let id = self.add_child(parent, &spec.name);
        self.nodes[id.0].attributes = spec.attributes.clone();
        for child in &spec.children {
            self.insert_spec(id, child);
        }
    }

    fn node(&self, id: ElementId) -> &Node {
        &self.nodes[id.0]
    }
}

/// Borrowed handle to one element of a [`SceneDescriptor`].
#[derive(Clone, Copy)]
pub struct Element<'a> {
    descriptor: &'a SceneDescriptor,
    id: ElementId,
}

impl<'a> Element<'a> {
    /// Id of this element.
    #[must_use]
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// The descriptor this element belongs to.
    #[must_use]
    pub fn descriptor(&self) -> &'a SceneDescriptor {
        self.descriptor
    }

    /// Tag name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.descriptor.node(self.id).name
    }

    /// Enclosing element, `None` at the document root.
    #[must_use]
    pub fn parent(&self) -> Option<Element<'a>> {
        self.descriptor
            .node(self.id)
            .parent
            .map(|id| Element {
                descriptor: self.descriptor,
                id,
            })
    }

    /// Raw attribute text.
    #[must_use]
    pub fn value_string(&self, key: &str) -> Option<&'a str> {
        self.descriptor
            .node(self.id)
            .attributes
            .get(key)
            .map(String::as_str)
    }

    /// Whether the attribute is present.
    #[must_use]
    pub fn has_attribute(&self, key: &str) -> bool {
        self.descriptor.node(self.id).attributes.contains_key(key)
    }

    /// Parse an attribute, `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::InvalidValue`] when the text does not parse.
    pub fn parse_value<T: FromStr>(
        &self,
        key: &str,
        expected: &'static str,
    ) -> Result<Option<T>, DescriptorError> {
        self.value_string(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|_| self.invalid(key, raw, expected))
            })
            .transpose()
    }

    /// Parse a boolean attribute (`true`/`false`/`1`/`0`).
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::InvalidValue`] for any other text.
    pub fn bool_value(&self, key: &str) -> Result<Option<bool>, DescriptorError> {
        self.value_string(key)
            .map(|raw| match raw.trim() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(self.invalid(key, raw, "a boolean")),
            })
            .transpose()
    }

    /// Parse a pose attribute (`"x y z roll pitch yaw"` or `"x y z"`).
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::InvalidValue`] when the text is not a pose.
    pub fn pose_value(&self, key: &str) -> Result<Option<Pose>, DescriptorError> {
        self.value_string(key)
            .map(|raw| Pose::parse(raw).ok_or_else(|| self.invalid(key, raw, "a pose")))
            .transpose()
    }

    /// Child elements in document order.
    pub fn children(&self) -> impl Iterator<Item = Element<'a>> + 'a {
        let descriptor = self.descriptor;
        descriptor
            .node(self.id)
            .children
            .iter()
            .map(move |&id| Element { descriptor, id })
    }

    /// First child with the given tag.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<Element<'a>> {
        self.children().find(|child| child.name() == name)
    }

    /// Enclosing elements from the parent up to the document root.
    pub fn ancestors(&self) -> impl Iterator<Item = Element<'a>> + 'a {
        std::iter::successors(self.parent(), Element::parent)
    }

    /// All elements below this one, depth-first in document order.
    #[must_use]
    pub fn descendants(&self) -> Vec<Element<'a>> {
        let mut out = Vec::new();
        let mut stack: Vec<Element<'a>> = self.children().collect();
        stack.reverse();
        while let Some(element) = stack.pop() {
            out.push(element);
            let mut children: Vec<_> = element.children().collect();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Slash-separated tag path from the root, for diagnostics.
    #[must_use]
    pub fn path(&self) -> String {
        let mut tags: Vec<&str> = self.ancestors().map(|e| e.name()).collect();
        tags.reverse();
        tags.push(self.name());
        tags.join("/")
    }

    /// Copy this subtree into its owned form.
    #[must_use]
    pub fn to_spec(&self) -> ElementSpec {
        ElementSpec {
            name: self.name().to_string(),
            attributes: self.descriptor.node(self.id).attributes.clone(),
            children: self.children().map(|child| child.to_spec()).collect(),
        }
    }

    fn invalid(&self, key: &str, raw: &str, expected: &'static str) -> DescriptorError {
        DescriptorError::InvalidValue {
            element: self.name().to_string(),
            key: key.to_string(),
            value: raw.to_string(),
            expected,
        }
    }
}

impl fmt::Debug for Element<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id)
            .field("path", &self.path())
            .finish()
    }
}
