//! Read-back structural verification of serialized packages.
//!
//! `verify_package` re-opens finalized archive bytes and re-asserts the
//! package invariants on the serialized form: every relationship manifest
//! target names an entry actually present in the archive, and every entry is
//! resolvable to a content type through [Content_Types].xml. The builder
//! guarantees these by construction; this module checks them on arbitrary
//! bytes, which is what the tests use to close the loop.

use crate::constants::target_mode;
use crate::error::{IntegrityViolation, PackError, Result};
use crate::packuri::{CONTENT_TYPES_URI, PackUri};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// A relationship as read from a serialized .rels manifest.
#[derive(Debug, Clone)]
struct SerializedRel {
    r_id: String,
    target_ref: String,
    target_mode: String,
}

impl SerializedRel {
    fn is_external(&self) -> bool {
        self.target_mode == target_mode::EXTERNAL
    }
}

/// Content-type lookup parsed from a serialized [Content_Types].xml.
///
/// Unlike the builder-side manifest, nothing is pre-seeded here: the
/// serialized file must carry everything itself.
struct SerializedContentTypes {
    defaults: BTreeMap<String, String>,
    overrides: BTreeMap<String, String>,
}

impl SerializedContentTypes {
    fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut defaults = BTreeMap::new();
        let mut overrides = BTreeMap::new();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => match e.local_name().as_ref()
                {
                    b"Default" => {
                        let mut extension = None;
                        let mut content_type = None;
                        for attr in e.attributes() {
                            let attr = attr?;
                            match attr.key.as_ref() {
                                b"Extension" => {
                                    extension = Some(attr.unescape_value()?.to_string());
                                }
                                b"ContentType" => {
                                    content_type = Some(attr.unescape_value()?.to_string());
                                }
                                _ => {}
                            }
                        }
                        if let (Some(ext), Some(ct)) = (extension, content_type) {
                            defaults.insert(ext.to_lowercase(), ct);
                        }
                    }
                    b"Override" => {
                        let mut partname = None;
                        let mut content_type = None;
                        for attr in e.attributes() {
                            let attr = attr?;
                            match attr.key.as_ref() {
                                b"PartName" => {
                                    partname = Some(attr.unescape_value()?.to_string());
                                }
                                b"ContentType" => {
                                    content_type = Some(attr.unescape_value()?.to_string());
                                }
                                _ => {}
                            }
                        }
                        if let (Some(pn), Some(ct)) = (partname, content_type) {
                            overrides.insert(pn, ct);
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(PackError::XmlError(format!(
                        "content types parse error: {}",
                        e
                    )));
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(Self {
            defaults,
            overrides,
        })
    }

    fn resolve(&self, partname: &PackUri) -> Option<&str> {
        if let Some(ct) = self.overrides.get(partname.as_str()) {
            return Some(ct);
        }
        self.defaults
            .get(&partname.ext().to_lowercase())
            .map(String::as_str)
    }
}

/// Parse a serialized .rels manifest into its relationship entries.
fn parse_rels(xml: &[u8]) -> Result<Vec<SerializedRel>> {
    let mut rels = Vec::new();
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut r_id = String::new();
                    let mut target_ref = String::new();
                    let mut target_mode = target_mode::INTERNAL.to_string();
                    for attr in e.attributes() {
                        let attr = attr?;
                        match attr.key.as_ref() {
                            b"Id" => r_id = attr.unescape_value()?.to_string(),
                            b"Target" => target_ref = attr.unescape_value()?.to_string(),
                            b"TargetMode" => target_mode = attr.unescape_value()?.to_string(),
                            _ => {}
                        }
                    }
                    rels.push(SerializedRel {
                        r_id,
                        target_ref,
                        target_mode,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PackError::XmlError(format!(
                    "relationships parse error: {}",
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// The source partname a .rels manifest belongs to, or None if the entry is
/// not at a conventional _rels location.
fn rels_source(rels_uri: &PackUri) -> Option<PackUri> {
    let base = rels_uri.base_uri();
    let parent = if base == "/_rels" {
        "/"
    } else {
        base.strip_suffix("/_rels")?
    };
    let filename = rels_uri.filename().strip_suffix(".rels")?;
    if filename.is_empty() {
        // "/_rels/.rels" belongs to the package root
        return PackUri::new("/").ok();
    }
    if parent == "/" {
        PackUri::new(format!("/{}", filename)).ok()
    } else {
        PackUri::new(format!("{}/{}", parent, filename)).ok()
    }
}

/// Re-parse finalized archive bytes and check serialized-form invariants.
///
/// Fails with `StructuralIntegrity` naming the first defect found: a manifest
/// target with no matching archive entry, or an entry no content type
/// resolves for.
pub fn verify_package(bytes: &[u8]) -> Result<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let names: BTreeSet<String> = archive.file_names().map(String::from).collect();

    let mut read_entry = |name: &str| -> Result<Vec<u8>> {
        let mut entry = archive.by_name(name)?;
        let mut blob = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut blob)?;
        Ok(blob)
    };

    let content_types_member = &CONTENT_TYPES_URI[1..];
    if !names.contains(content_types_member) {
        return Err(PackError::Configuration(
            "archive has no [Content_Types].xml".to_string(),
        ));
    }
    let content_types = SerializedContentTypes::from_xml(&read_entry(content_types_member)?)?;

    // Every relationship manifest target must name a present entry.
    for name in &names {
        if !name.ends_with(".rels") {
            continue;
        }
        let rels_uri = PackUri::new(format!("/{}", name))?;
        let Some(source) = rels_source(&rels_uri) else {
            continue;
        };
        for rel in parse_rels(&read_entry(name)?)? {
            if rel.is_external() {
                continue;
            }
            let target = PackUri::from_rel_ref(source.base_uri(), &rel.target_ref)?;
            if !names.contains(target.membername()) {
                return Err(PackError::StructuralIntegrity(
                    IntegrityViolation::DanglingTarget {
                        source: source.to_string(),
                        r_id: rel.r_id,
                        target: target.to_string(),
                    },
                ));
            }
        }
    }

    // Every entry except the manifest itself must resolve a content type.
    for name in &names {
        if name == content_types_member {
            continue;
        }
        let partname = PackUri::new(format!("/{}", name))?;
        if content_types.resolve(&partname).is_none() {
            return Err(PackError::StructuralIntegrity(
                IntegrityViolation::UnresolvedContentType {
                    partname: partname.to_string(),
                },
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveWriter;
    use crate::xmlgen::XML_DECL;

    const TYPES_XML: &str = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
</Types>"#;

    fn write_entry(writer: &mut ArchiveWriter, path: &str, content: &str) {
        let uri = PackUri::new(path).unwrap();
        let blob = format!("{}\n{}", XML_DECL, content);
        writer.write(&uri, blob.as_bytes()).unwrap();
    }

    #[test]
    fn test_accepts_consistent_archive() {
        let mut writer = ArchiveWriter::new();
        write_entry(&mut writer, "/[Content_Types].xml", TYPES_XML);
        write_entry(
            &mut writer,
            "/_rels/.rels",
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="doc.xml"/>
</Relationships>"#,
        );
        write_entry(&mut writer, "/doc.xml", "<doc/>");
        verify_package(&writer.finish().unwrap()).unwrap();
    }

    /// An archive advertising a relationship whose target entry was never
    /// written, which is exactly what an unchecked string-concatenation
    /// writer can emit.
    #[test]
    fn test_rejects_dangling_manifest_target() {
        let mut writer = ArchiveWriter::new();
        write_entry(&mut writer, "/[Content_Types].xml", TYPES_XML);
        write_entry(
            &mut writer,
            "/_rels/.rels",
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="t" Target="ppt/presentation.xml"/>
</Relationships>"#,
        );
        let err = verify_package(&writer.finish().unwrap()).unwrap_err();
        assert!(matches!(
            err,
            PackError::StructuralIntegrity(IntegrityViolation::DanglingTarget { target, .. })
                if target == "/ppt/presentation.xml"
        ));
    }

    #[test]
    fn test_rejects_unresolvable_entry() {
        let mut writer = ArchiveWriter::new();
        // No Default for "rels", so /_rels/.rels itself cannot be resolved.
        write_entry(
            &mut writer,
            "/[Content_Types].xml",
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="xml" ContentType="application/xml"/>
</Types>"#,
        );
        write_entry(
            &mut writer,
            "/_rels/.rels",
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"/>"#,
        );
        let err = verify_package(&writer.finish().unwrap()).unwrap_err();
        assert!(matches!(
            err,
            PackError::StructuralIntegrity(IntegrityViolation::UnresolvedContentType { partname })
                if partname == "/_rels/.rels"
        ));
    }

    #[test]
    fn test_rejects_missing_content_types() {
        let mut writer = ArchiveWriter::new();
        write_entry(&mut writer, "/doc.xml", "<doc/>");
        assert!(matches!(
            verify_package(&writer.finish().unwrap()),
            Err(PackError::Configuration(_))
        ));
    }

    #[test]
    fn test_rels_source_mapping() {
        let root = PackUri::new("/_rels/.rels").unwrap();
        assert_eq!(rels_source(&root).unwrap().as_str(), "/");

        let pres = PackUri::new("/ppt/_rels/presentation.xml.rels").unwrap();
        assert_eq!(rels_source(&pres).unwrap().as_str(), "/ppt/presentation.xml");

        let not_rels = PackUri::new("/ppt/presentation.xml").unwrap();
        assert!(rels_source(&not_rels).is_none());
    }
}
