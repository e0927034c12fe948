//! The checked package builder.
//!
//! `PackageBuilder` lets parts, relationships, and the content-type manifest
//! be declared independently and in any order, then guarantees at finalize
//! time that the three agree: every relationship target names a registered
//! part, every part resolves a content type, and every `r:id` reference
//! embedded in part content has a matching relationship entry. Finalize
//! either produces a complete archive or reports the first defect and
//! produces nothing.

use crate::archive::ArchiveWriter;
use crate::content_types::ContentTypes;
use crate::error::{IntegrityViolation, PackError, Result};
use crate::packuri::{CONTENT_TYPES_URI, PACKAGE_URI, PackUri};
use crate::part::Part;
use crate::rel::Relationships;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// In-memory description of a package: parts, relationships, content types.
///
/// The builder is single-owner and single-threaded by contract: construct,
/// populate, and finalize one instance within one logical task. `finalize`
/// borrows immutably, so an unmodified builder finalizes to byte-identical
/// archives any number of times.
pub struct PackageBuilder {
    /// The content-type manifest
    content_types: ContentTypes,

    /// Registered parts by partname
    parts: BTreeMap<String, Part>,

    /// Package-level relationships (source "/")
    pkg_rels: Relationships,

    /// Per-part relationships keyed by source partname
    part_rels: BTreeMap<String, Relationships>,
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self {
            content_types: ContentTypes::new(),
            parts: BTreeMap::new(),
            pkg_rels: Relationships::new(PACKAGE_URI, PACKAGE_URI),
            part_rels: BTreeMap::new(),
        }
    }

    /// Merge extension defaults and partname overrides into the manifest.
    ///
    /// Overrides declared here must name a part that is eventually added;
    /// that is checked at finalize time, not here, since parts may be
    /// registered incrementally in any order.
    pub fn declare_content_types(
        &mut self,
        defaults: &[(&str, &str)],
        overrides: &[(&str, &str)],
    ) {
        for (ext, ct) in defaults {
            self.content_types.add_default(ext, ct);
        }
        for (partname, ct) in overrides {
            self.content_types.add_override(partname, ct);
        }
    }

    /// Register a part with already-rendered content.
    ///
    /// The content type recorded here is what the manifest must resolve to;
    /// it does not by itself put anything in the manifest.
    pub fn add_part(&mut self, path: &str, content: Vec<u8>, content_type: &str) -> Result<()> {
        let partname = PackUri::new(path)?;
        if partname.as_str() == CONTENT_TYPES_URI
            || partname.as_str() == PACKAGE_URI
            || Self::is_rels_path(&partname)
        {
            return Err(PackError::Configuration(format!(
                "partname '{}' is reserved for generated package structure",
                partname
            )));
        }
        if self.parts.contains_key(partname.as_str()) {
            return Err(PackError::DuplicatePath(partname.to_string()));
        }
        let part = Part::new(partname.clone(), content_type.to_string(), content);
        self.parts.insert(partname.to_string(), part);
        Ok(())
    }

    /// Register an internal relationship under an explicit rId.
    ///
    /// `source` is a part path, or "/" for the package root; `target` is
    /// given relative to the source's directory (e.g. "slides/slide1.xml"
    /// from "/ppt/presentation.xml"). Neither source nor target needs to be
    /// registered yet.
    pub fn add_relationship(
        &mut self,
        source: &str,
        r_id: &str,
        reltype: &str,
        target: &str,
    ) -> Result<()> {
        self.rels_for(source)?.add(r_id, reltype, target, false)?;
        Ok(())
    }

    /// Register an external relationship (absolute URL target). External
    /// targets are exempt from target-existence validation.
    pub fn add_external_relationship(
        &mut self,
        source: &str,
        r_id: &str,
        reltype: &str,
        target_url: &str,
    ) -> Result<()> {
        self.rels_for(source)?.add(r_id, reltype, target_url, true)?;
        Ok(())
    }

    /// Add an internal relationship with an auto-assigned rId, reusing an
    /// existing relationship of the same type and target. Returns the rId.
    pub fn relate_to(&mut self, source: &str, reltype: &str, target: &str) -> Result<String> {
        Ok(self.rels_for(source)?.get_or_add(reltype, target))
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn contains_part(&self, path: &str) -> bool {
        self.parts.contains_key(path)
    }

    /// Validate all cross-part invariants, then serialize to archive bytes.
    ///
    /// Checks, in order: relationship sources exist; internal targets name
    /// registered parts; every part resolves a content type consistent with
    /// the one recorded at `add_part`; content-embedded `r:id` references
    /// match the source part's relationships; no part is an orphan; every
    /// declared override names a registered part. The first defect aborts
    /// with no output.
    pub fn finalize(&self) -> Result<Vec<u8>> {
        self.validate()?;

        let mut writer = ArchiveWriter::new();

        let content_types_uri = PackUri::new(CONTENT_TYPES_URI)?;
        writer.write(&content_types_uri, self.content_types.to_xml().as_bytes())?;

        let package_uri = PackUri::new(PACKAGE_URI)?;
        writer.write(&package_uri.rels_uri()?, self.pkg_rels.to_xml().as_bytes())?;

        for part in self.parts.values() {
            writer.write(part.partname(), part.blob())?;
            if let Some(rels) = self.part_rels.get(part.partname().as_str()) {
                if !rels.is_empty() {
                    writer.write(&part.partname().rels_uri()?, rels.to_xml().as_bytes())?;
                }
            }
        }

        writer.finish()
    }

    /// Finalize fully in memory, then write the archive in one call.
    ///
    /// A validation failure produces no file at all, never a partial or
    /// inconsistent one.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.finalize()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn rels_for(&mut self, source: &str) -> Result<&mut Relationships> {
        if source == PACKAGE_URI {
            return Ok(&mut self.pkg_rels);
        }
        let source_uri = PackUri::new(source)?;
        let base = source_uri.base_uri().to_string();
        Ok(self
            .part_rels
            .entry(source_uri.to_string())
            .or_insert_with(|| Relationships::new(source_uri.as_str(), &base)))
    }

    fn is_rels_path(partname: &PackUri) -> bool {
        partname.ext() == "rels" && partname.base_uri().ends_with("/_rels")
    }

    fn validate(&self) -> Result<()> {
        // Relationship sources must be the package root or a registered part.
        for source in self.part_rels.keys() {
            if !self.parts.contains_key(source) {
                return Err(PackError::StructuralIntegrity(
                    IntegrityViolation::UnknownSource {
                        source: source.clone(),
                    },
                ));
            }
        }

        // Every internal relationship target must resolve to a registered part.
        let all_rels = std::iter::once(&self.pkg_rels).chain(self.part_rels.values());
        for rels in all_rels.clone() {
            for rel in rels.iter() {
                if rel.is_external() {
                    continue;
                }
                let target = rel.target_partname()?;
                if !self.parts.contains_key(target.as_str()) {
                    return Err(PackError::StructuralIntegrity(
                        IntegrityViolation::DanglingTarget {
                            source: rels.source_uri().to_string(),
                            r_id: rel.r_id().to_string(),
                            target: target.to_string(),
                        },
                    ));
                }
            }
        }

        // The manifest must resolve a content type for every part, and it
        // must agree with the type recorded at add_part.
        for part in self.parts.values() {
            match self.content_types.resolve(part.partname()) {
                None => {
                    return Err(PackError::StructuralIntegrity(
                        IntegrityViolation::UnresolvedContentType {
                            partname: part.partname().to_string(),
                        },
                    ));
                }
                Some(resolved) if resolved != part.content_type() => {
                    return Err(PackError::Configuration(format!(
                        "manifest resolves '{}' to '{}' but the part was added as '{}'",
                        part.partname(),
                        resolved,
                        part.content_type()
                    )));
                }
                Some(_) => {}
            }
        }

        // Content-embedded r:id references must have relationship entries.
        for part in self.parts.values() {
            let refs = part.content_rel_refs();
            if refs.is_empty() {
                continue;
            }
            let rels = self.part_rels.get(part.partname().as_str());
            for r_id in refs {
                if !rels.is_some_and(|rels| rels.contains(&r_id)) {
                    return Err(PackError::StructuralIntegrity(
                        IntegrityViolation::UnmatchedContentReference {
                            source: part.partname().to_string(),
                            r_id,
                        },
                    ));
                }
            }
        }

        // Every part must be referenced by something.
        let mut targeted: BTreeSet<String> = BTreeSet::new();
        for rels in all_rels {
            for rel in rels.iter() {
                if !rel.is_external() {
                    targeted.insert(rel.target_partname()?.to_string());
                }
            }
        }
        for partname in self.parts.keys() {
            if !targeted.contains(partname) {
                return Err(PackError::StructuralIntegrity(
                    IntegrityViolation::OrphanPart {
                        partname: partname.clone(),
                    },
                ));
            }
        }

        // Manually declared overrides must describe real parts.
        for partname in self.content_types.override_paths() {
            if !self.parts.contains_key(partname) {
                return Err(PackError::Configuration(format!(
                    "content-type override declared for '{}' but no such part was added",
                    partname
                )));
            }
        }

        Ok(())
    }
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{content_type as ct, relationship_type as rt};
    use crate::verify::verify_package;

    /// A structurally complete two-slide package.
    fn minimal_builder() -> PackageBuilder {
        let mut b = PackageBuilder::new();
        b.declare_content_types(
            &[],
            &[
                ("/ppt/presentation.xml", ct::PML_PRESENTATION_MAIN),
                ("/ppt/slides/slide1.xml", ct::PML_SLIDE),
                ("/ppt/slides/slide2.xml", ct::PML_SLIDE),
            ],
        );
        b.add_part(
            "/ppt/presentation.xml",
            br#"<p:presentation><p:sldIdLst><p:sldId id="256" r:id="rId2"/><p:sldId id="257" r:id="rId3"/></p:sldIdLst></p:presentation>"#.to_vec(),
            ct::PML_PRESENTATION_MAIN,
        )
        .unwrap();
        b.add_part("/ppt/slides/slide1.xml", b"<p:sld/>".to_vec(), ct::PML_SLIDE)
            .unwrap();
        b.add_part("/ppt/slides/slide2.xml", b"<p:sld/>".to_vec(), ct::PML_SLIDE)
            .unwrap();
        b.add_relationship("/", "rId1", rt::OFFICE_DOCUMENT, "ppt/presentation.xml")
            .unwrap();
        b.add_relationship("/ppt/presentation.xml", "rId2", rt::SLIDE, "slides/slide1.xml")
            .unwrap();
        b.add_relationship("/ppt/presentation.xml", "rId3", rt::SLIDE, "slides/slide2.xml")
            .unwrap();
        b
    }

    #[test]
    fn test_finalize_valid_package() {
        let bytes = minimal_builder().finalize().unwrap();
        verify_package(&bytes).unwrap();
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let b = minimal_builder();
        assert_eq!(b.finalize().unwrap(), b.finalize().unwrap());
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let mut b = minimal_builder();
        let err = b.add_part("/ppt/slides/slide1.xml", b"<p:sld/>".to_vec(), ct::PML_SLIDE);
        assert!(matches!(err, Err(PackError::DuplicatePath(p)) if p == "/ppt/slides/slide1.xml"));
    }

    #[test]
    fn test_duplicate_relationship_id_rejected() {
        let mut b = minimal_builder();
        let err = b.add_relationship("/ppt/presentation.xml", "rId2", rt::SLIDE, "slides/other.xml");
        assert!(matches!(
            err,
            Err(PackError::DuplicateRelationshipId { r_id, .. }) if r_id == "rId2"
        ));
    }

    #[test]
    fn test_reserved_paths_rejected() {
        let mut b = PackageBuilder::new();
        assert!(matches!(
            b.add_part("/[Content_Types].xml", b"<Types/>".to_vec(), ct::XML),
            Err(PackError::Configuration(_))
        ));
        assert!(matches!(
            b.add_part("/_rels/.rels", b"<Relationships/>".to_vec(), ct::OPC_RELATIONSHIPS),
            Err(PackError::Configuration(_))
        ));
    }

    /// Only `_rels` directories are reserved; a directory whose name merely
    /// ends in `_rels` is an ordinary part location.
    #[test]
    fn test_rels_like_directory_not_reserved() {
        let mut b = PackageBuilder::new();
        b.add_part(
            "/ppt/extra_rels/data.rels",
            b"<data/>".to_vec(),
            ct::OPC_RELATIONSHIPS,
        )
        .unwrap();
        b.relate_to(PACKAGE_URI, rt::OFFICE_DOCUMENT, "ppt/extra_rels/data.rels")
            .unwrap();
        b.finalize().unwrap();

        assert!(matches!(
            b.add_part("/ppt/_rels/slide1.xml.rels", b"<Relationships/>".to_vec(), ct::OPC_RELATIONSHIPS),
            Err(PackError::Configuration(_))
        ));
    }

    /// The reference-script failure mode: four slide relationships declared
    /// from the main document, only three slide parts ever written.
    #[test]
    fn test_dangling_slide_target_names_missing_part() {
        let mut b = PackageBuilder::new();
        b.declare_content_types(
            &[],
            &[
                ("/ppt/presentation.xml", ct::PML_PRESENTATION_MAIN),
                ("/ppt/slides/slide1.xml", ct::PML_SLIDE),
                ("/ppt/slides/slide2.xml", ct::PML_SLIDE),
                ("/ppt/slides/slide3.xml", ct::PML_SLIDE),
            ],
        );
        b.add_part("/ppt/presentation.xml", b"<p:presentation/>".to_vec(), ct::PML_PRESENTATION_MAIN)
            .unwrap();
        for n in 1..=3 {
            b.add_part(
                &format!("/ppt/slides/slide{}.xml", n),
                b"<p:sld/>".to_vec(),
                ct::PML_SLIDE,
            )
            .unwrap();
        }
        b.add_relationship("/", "rId1", rt::OFFICE_DOCUMENT, "ppt/presentation.xml")
            .unwrap();
        for n in 1..=4 {
            b.add_relationship(
                "/ppt/presentation.xml",
                &format!("rId{}", n + 1),
                rt::SLIDE,
                &format!("slides/slide{}.xml", n),
            )
            .unwrap();
        }

        let err = b.finalize().unwrap_err();
        match err {
            PackError::StructuralIntegrity(IntegrityViolation::DanglingTarget {
                source,
                r_id,
                target,
            }) => {
                assert_eq!(source, "/ppt/presentation.xml");
                assert_eq!(r_id, "rId5");
                assert_eq!(target, "/ppt/slides/slide4.xml");
            }
            other => panic!("expected dangling target, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_content_type() {
        let mut b = minimal_builder();
        b.add_part("/ppt/media/thumbnail", b"\x89PNG".to_vec(), ct::PNG)
            .unwrap();
        b.relate_to("/", rt::IMAGE, "ppt/media/thumbnail").unwrap();

        let err = b.finalize().unwrap_err();
        assert!(matches!(
            err,
            PackError::StructuralIntegrity(IntegrityViolation::UnresolvedContentType { partname })
                if partname == "/ppt/media/thumbnail"
        ));
    }

    #[test]
    fn test_extension_default_resolves_binary_part() {
        let mut b = minimal_builder();
        b.declare_content_types(&[("png", ct::PNG)], &[]);
        b.add_part("/ppt/media/image1.png", b"\x89PNG".to_vec(), ct::PNG)
            .unwrap();
        b.relate_to("/ppt/presentation.xml", rt::IMAGE, "media/image1.png")
            .unwrap();
        let bytes = b.finalize().unwrap();
        verify_package(&bytes).unwrap();
    }

    #[test]
    fn test_orphan_part_rejected() {
        let mut b = minimal_builder();
        b.add_part("/ppt/slides/slide9.xml", b"<p:sld/>".to_vec(), ct::PML_SLIDE)
            .unwrap();
        b.declare_content_types(&[], &[("/ppt/slides/slide9.xml", ct::PML_SLIDE)]);

        let err = b.finalize().unwrap_err();
        assert!(matches!(
            err,
            PackError::StructuralIntegrity(IntegrityViolation::OrphanPart { partname })
                if partname == "/ppt/slides/slide9.xml"
        ));
    }

    #[test]
    fn test_unknown_relationship_source_rejected() {
        let mut b = minimal_builder();
        b.add_relationship("/ppt/notes/note1.xml", "rId1", rt::SLIDE, "x.xml")
            .unwrap();

        let err = b.finalize().unwrap_err();
        assert!(matches!(
            err,
            PackError::StructuralIntegrity(IntegrityViolation::UnknownSource { source })
                if source == "/ppt/notes/note1.xml"
        ));
    }

    #[test]
    fn test_unmatched_content_reference_rejected() {
        let mut b = minimal_builder();
        // Content references rId4; only rId2/rId3 are registered.
        b.add_part(
            "/ppt/notesSlides/notesSlide1.xml",
            br#"<p:notes r:id="rId4"/>"#.to_vec(),
            "application/xml",
        )
        .unwrap();
        b.relate_to("/", rt::OFFICE_DOCUMENT, "ppt/notesSlides/notesSlide1.xml")
            .unwrap();

        let err = b.finalize().unwrap_err();
        assert!(matches!(
            err,
            PackError::StructuralIntegrity(IntegrityViolation::UnmatchedContentReference {
                source,
                r_id,
            }) if source == "/ppt/notesSlides/notesSlide1.xml" && r_id == "rId4"
        ));
    }

    #[test]
    fn test_declared_override_without_part_rejected() {
        let mut b = minimal_builder();
        b.declare_content_types(&[], &[("/ppt/slides/slide7.xml", ct::PML_SLIDE)]);
        let err = b.finalize().unwrap_err();
        assert!(matches!(err, PackError::Configuration(msg) if msg.contains("slide7")));
    }

    #[test]
    fn test_manifest_mismatch_rejected() {
        let mut b = minimal_builder();
        // Relies on the generic xml default, which disagrees with the
        // recorded slide content type.
        b.add_part("/ppt/slides/slide3.xml", b"<p:sld/>".to_vec(), ct::PML_SLIDE)
            .unwrap();
        b.relate_to("/ppt/presentation.xml", rt::SLIDE, "slides/slide3.xml")
            .unwrap();
        let err = b.finalize().unwrap_err();
        assert!(matches!(err, PackError::Configuration(msg) if msg.contains("slide3")));
    }

    #[test]
    fn test_declaration_order_is_free() {
        let mut b = PackageBuilder::new();
        // Relationships before parts, manifest last.
        b.add_relationship("/", "rId1", rt::OFFICE_DOCUMENT, "ppt/presentation.xml")
            .unwrap();
        b.add_part("/ppt/presentation.xml", b"<p:presentation/>".to_vec(), ct::PML_PRESENTATION_MAIN)
            .unwrap();
        b.declare_content_types(&[], &[("/ppt/presentation.xml", ct::PML_PRESENTATION_MAIN)]);
        verify_package(&b.finalize().unwrap()).unwrap();
    }

    #[test]
    fn test_external_relationship_skips_target_check() {
        let mut b = minimal_builder();
        b.add_external_relationship(
            "/ppt/slides/slide1.xml",
            "rId1",
            rt::HYPERLINK,
            "https://example.com/",
        )
        .unwrap();
        verify_package(&b.finalize().unwrap()).unwrap();
    }

    #[test]
    fn test_write_produces_file_only_on_success() {
        let dir = tempfile::tempdir().unwrap();

        let good = dir.path().join("good.pptx");
        minimal_builder().write(&good).unwrap();
        assert!(good.exists());

        let bad = dir.path().join("bad.pptx");
        let mut b = minimal_builder();
        b.add_relationship("/ppt/presentation.xml", "rId9", rt::SLIDE, "slides/slide9.xml")
            .unwrap();
        assert!(b.write(&bad).is_err());
        assert!(!bad.exists());
    }
}
