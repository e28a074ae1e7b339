//! Embedding of text values as character data, CDATA or Base64.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use veles_model::TextEmbedding;
use veles_xml::{NodeId, XmlDocument};

/// Append `text` to `node` using the given embedding.
///
/// Empty text becomes an empty text node, so the element is written as
/// `<a></a>` and stays apart from a null value.
pub(crate) fn write_text(doc: &mut XmlDocument, node: NodeId, text: &str, embedding: TextEmbedding) {
    if text.is_empty() {
        doc.add_text(node, "");
        return;
    }
    match embedding {
        TextEmbedding::None => {
            doc.add_text(node, text);
        }
        TextEmbedding::CData => {
            doc.add_cdata(node, text);
        }
        TextEmbedding::Base64 => {
            doc.add_text(node, STANDARD.encode(text.as_bytes()));
        }
    }
}

/// Encode an attribute value. Attributes cannot hold CDATA, so only Base64 applies.
pub(crate) fn encode_attribute(text: String, embedding: TextEmbedding) -> String {
    match embedding {
        TextEmbedding::Base64 => STANDARD.encode(text.as_bytes()),
        _ => text,
    }
}

/// Undo the embedding of text read from a node.
///
/// Returns `None` if Base64 text does not decode to UTF-8.
pub(crate) fn decode_text(text: String, embedding: TextEmbedding) -> Option<String> {
    match embedding {
        TextEmbedding::Base64 => {
            let bytes = STANDARD.decode(text.trim()).ok()?;
            String::from_utf8(bytes).ok()
        }
        _ => Some(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embeddings() {
        let mut doc = XmlDocument::with_root("Root");
        let root = doc.root().unwrap();

        let plain = doc.add_element(root, "Plain");
        write_text(&mut doc, plain, "a < b", TextEmbedding::None);
        assert_eq!(doc.text(plain), "a < b");
        assert!(!doc.has_cdata(plain));

        let cdata = doc.add_element(root, "CData");
        write_text(&mut doc, cdata, "<raw/>", TextEmbedding::CData);
        assert!(doc.has_cdata(cdata));

        let base64 = doc.add_element(root, "Base64");
        write_text(&mut doc, base64, "hello", TextEmbedding::Base64);
        assert_eq!(doc.text(base64), "aGVsbG8=");
        assert_eq!(decode_text(doc.text(base64), TextEmbedding::Base64).as_deref(), Some("hello"));

        let empty = doc.add_element(root, "Empty");
        write_text(&mut doc, empty, "", TextEmbedding::CData);
        assert!(!doc.is_empty_element(empty));
        assert!(doc.is_blank(empty));
        assert!(!doc.has_cdata(empty));
    }

    #[test]
    fn test_bad_base64() {
        assert_eq!(decode_text("!!!".into(), TextEmbedding::Base64), None);
        assert_eq!(decode_text("!!!".into(), TextEmbedding::None).as_deref(), Some("!!!"));
    }
}
