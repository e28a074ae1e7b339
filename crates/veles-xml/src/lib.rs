//! Arena-backed XML element tree for Veles.
//!
//! The data-binding engine builds and walks documents through this crate
//! rather than through a streaming API, because serialization needs to
//! revisit already-written elements (relative location paths, pruning of
//! empty containers, splicing wrapper children into their parent) and
//! deserialization needs to create and remove scratch nodes while probing.
//!
//! # Example
//!
//! ```
//! use veles_xml::{XName, XmlDocument};
//!
//! let mut doc = XmlDocument::with_root("Config");
//! let root = doc.root().unwrap();
//! let setting = doc.create_location(root, "Settings/Setting").unwrap();
//! doc.set_attribute(setting, "key", "option1");
//!
//! let xml = doc.to_xml_string()?;
//! let parsed = XmlDocument::parse(&xml)?;
//! let parsed_root = parsed.root().unwrap();
//! let found = parsed.find_location(parsed_root, "Settings/Setting").unwrap();
//! assert_eq!(parsed.attribute(found, &XName::new("key")), Some("option1"));
//! # Ok::<(), veles_xml::Error>(())
//! ```

mod document;
mod error;
mod name;
mod reader;
mod writer;

pub use document::{parse_path, ElementData, NodeId, NodeKind, PathStep, XAttribute, XmlDocument};
pub use error::{Error, Result};
pub use name::{encode_xml_name, XName, XMLNS_NAMESPACE, XML_NAMESPACE};
