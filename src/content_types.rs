/// The content-type manifest: extension defaults and per-part overrides.
///
/// Every part written to the archive must be resolvable to a content type,
/// either via its extension default or an explicit override for its exact
/// partname. Resolution that fails silently is how unopenable documents get
/// produced, so the builder treats it as a finalize-time error instead.
use crate::constants::content_type as ct;
use crate::constants::namespace;
use crate::packuri::PackUri;
use crate::xmlgen::{XML_DECL, escape};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ContentTypes {
    /// Default content types by lowercased file extension
    defaults: BTreeMap<String, String>,

    /// Override content types by exact partname
    overrides: BTreeMap<String, String>,
}

impl ContentTypes {
    /// Create a manifest pre-seeded with the two defaults every package
    /// needs: .rels manifests and generic XML.
    pub fn new() -> Self {
        let mut defaults = BTreeMap::new();
        defaults.insert("rels".to_string(), ct::OPC_RELATIONSHIPS.to_string());
        defaults.insert("xml".to_string(), ct::XML.to_string());
        Self {
            defaults,
            overrides: BTreeMap::new(),
        }
    }

    /// Map a file extension (without the period) to a default content type.
    pub fn add_default(&mut self, extension: &str, content_type: &str) {
        self.defaults
            .insert(extension.to_lowercase(), content_type.to_string());
    }

    /// Map an exact partname to a content type, taking precedence over any
    /// extension default.
    pub fn add_override(&mut self, partname: &str, content_type: &str) {
        self.overrides
            .insert(partname.to_string(), content_type.to_string());
    }

    /// Resolve the content type for a partname: override first, then the
    /// extension default. `None` means the manifest cannot describe the part.
    pub fn resolve(&self, partname: &PackUri) -> Option<&str> {
        if let Some(ct) = self.overrides.get(partname.as_str()) {
            return Some(ct);
        }
        let ext = partname.ext().to_lowercase();
        self.defaults.get(&ext).map(String::as_str)
    }

    /// Partnames with declared overrides, in sorted order.
    pub fn override_paths(&self) -> impl Iterator<Item = &str> {
        self.overrides.keys().map(String::as_str)
    }

    /// Serialize to [Content_Types].xml.
    ///
    /// Both maps are ordered, so output is byte-identical across calls.
    pub fn to_xml(&self) -> String {
        let mut xml =
            String::with_capacity(256 + (self.defaults.len() + self.overrides.len()) * 96);

        xml.push_str(XML_DECL);
        xml.push('\n');
        xml.push_str(&format!(r#"<Types xmlns="{}">"#, namespace::OPC_CONTENT_TYPES));
        xml.push('\n');

        for (ext, content_type) in &self.defaults {
            xml.push_str(&format!(
                r#"  <Default Extension="{}" ContentType="{}"/>"#,
                escape(ext),
                escape(content_type)
            ));
            xml.push('\n');
        }

        for (partname, content_type) in &self.overrides {
            xml.push_str(&format!(
                r#"  <Override PartName="{}" ContentType="{}"/>"#,
                escape(partname),
                escape(content_type)
            ));
            xml.push('\n');
        }

        xml.push_str("</Types>");
        xml
    }
}

impl Default for ContentTypes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_defaults() {
        let cts = ContentTypes::new();
        let rels = PackUri::new("/_rels/.rels").unwrap();
        assert_eq!(cts.resolve(&rels), Some(ct::OPC_RELATIONSHIPS));
    }

    #[test]
    fn test_override_beats_default() {
        let mut cts = ContentTypes::new();
        cts.add_override("/ppt/presentation.xml", ct::PML_PRESENTATION_MAIN);
        let pres = PackUri::new("/ppt/presentation.xml").unwrap();
        assert_eq!(cts.resolve(&pres), Some(ct::PML_PRESENTATION_MAIN));

        // Another .xml part still falls back to the extension default
        let other = PackUri::new("/docProps/unknown.xml").unwrap();
        assert_eq!(cts.resolve(&other), Some(ct::XML));
    }

    #[test]
    fn test_extension_case_insensitive() {
        let mut cts = ContentTypes::new();
        cts.add_default("PNG", ct::PNG);
        let img = PackUri::new("/ppt/media/image1.PNG").unwrap();
        assert_eq!(cts.resolve(&img), Some(ct::PNG));
    }

    #[test]
    fn test_unresolvable_without_extension() {
        let cts = ContentTypes::new();
        let raw = PackUri::new("/ppt/media/raw").unwrap();
        assert_eq!(cts.resolve(&raw), None);
    }

    #[test]
    fn test_to_xml_contains_both_kinds() {
        let mut cts = ContentTypes::new();
        cts.add_default("png", ct::PNG);
        cts.add_override("/ppt/slides/slide1.xml", ct::PML_SLIDE);
        let xml = cts.to_xml();
        assert!(xml.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
        assert!(xml.contains(r#"<Override PartName="/ppt/slides/slide1.xml""#));
        // Deterministic output
        assert_eq!(xml, cts.to_xml());
    }
}
