/// Package parts: named entries in the archive.
///
/// A part is immutable once constructed; its content is an arbitrary byte
/// blob handed in already rendered (slide XML, an image stream, whatever).
/// The builder does not interpret part content except for the relationship
/// reference scan during validation.
use crate::packuri::PackUri;
use memchr::memmem;

#[derive(Debug, Clone)]
pub struct Part {
    /// The partname (URI) of this part
    partname: PackUri,

    /// The content type recorded for this part
    content_type: String,

    /// The binary content of this part
    blob: Vec<u8>,
}

impl Part {
    pub fn new(partname: PackUri, content_type: String, blob: Vec<u8>) -> Self {
        Self {
            partname,
            content_type,
            blob,
        }
    }

    #[inline]
    pub fn partname(&self) -> &PackUri {
        &self.partname
    }

    #[inline]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    #[inline]
    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    /// Whether the recorded content type marks this part as XML.
    #[inline]
    pub fn is_xml(&self) -> bool {
        self.content_type.ends_with("+xml") || self.content_type.ends_with("/xml")
    }

    /// Collect every relationship ID referenced by this part's content via
    /// an `r:id="..."` attribute, using memmem for the scan.
    ///
    /// Non-XML parts reference nothing.
    pub fn content_rel_refs(&self) -> Vec<String> {
        if !self.is_xml() {
            return Vec::new();
        }

        const NEEDLE: &[u8] = br#"r:id=""#;
        let finder = memmem::Finder::new(NEEDLE);
        let mut ids: Vec<String> = Vec::new();

        for pos in finder.find_iter(&self.blob) {
            let rest = &self.blob[pos + NEEDLE.len()..];
            if let Some(end) = memchr::memchr(b'"', rest) {
                if let Ok(id) = std::str::from_utf8(&rest[..end]) {
                    if !ids.iter().any(|existing| existing.as_str() == id) {
                        ids.push(id.to_string());
                    }
                }
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xml_part(blob: &[u8]) -> Part {
        Part::new(
            PackUri::new("/ppt/presentation.xml").unwrap(),
            "application/xml".to_string(),
            blob.to_vec(),
        )
    }

    #[test]
    fn test_content_rel_refs() {
        let part = xml_part(
            br#"<p:sldIdLst><p:sldId id="256" r:id="rId2"/><p:sldId id="257" r:id="rId3"/></p:sldIdLst>"#,
        );
        assert_eq!(part.content_rel_refs(), vec!["rId2", "rId3"]);
    }

    #[test]
    fn test_content_rel_refs_dedupes() {
        let part = xml_part(br#"<a r:id="rId2"/><b r:id="rId2"/>"#);
        assert_eq!(part.content_rel_refs(), vec!["rId2"]);
    }

    #[test]
    fn test_binary_part_references_nothing() {
        let part = Part::new(
            PackUri::new("/ppt/media/image1.png").unwrap(),
            "image/png".to_string(),
            br#"r:id="rId9""#.to_vec(),
        );
        assert!(!part.is_xml());
        assert!(part.content_rel_refs().is_empty());
    }

    #[test]
    fn test_is_xml() {
        let part = xml_part(b"<x/>");
        assert!(part.is_xml());
    }
}
