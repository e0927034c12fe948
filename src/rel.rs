/// Relationship objects: typed, identified edges from a source (a part or the
/// package root) to a target part or external URL.
///
/// Each source owns one `Relationships` collection, serialized as the
/// conventional `_rels/<filename>.rels` sibling part. Relationship IDs are
/// unique per source; registering a duplicate is an error rather than a
/// silent overwrite.
use crate::constants::target_mode;
use crate::error::{PackError, Result};
use crate::packuri::PackUri;
use crate::xmlgen::{XML_DECL, escape};
use std::collections::BTreeMap;

/// A single relationship from a source to a target.
#[derive(Debug, Clone)]
pub struct Relationship {
    /// Relationship ID (e.g. "rId1")
    r_id: String,

    /// Relationship type URI
    reltype: String,

    /// Target reference: a part reference relative to the source's base URI,
    /// or an absolute URL for external relationships
    target_ref: String,

    /// Base URI the target reference resolves against
    base_uri: String,

    /// Whether the target lives outside the package
    is_external: bool,
}

impl Relationship {
    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.is_external
    }

    /// Resolve the absolute partname of an internal target.
    pub fn target_partname(&self) -> Result<PackUri> {
        if self.is_external {
            return Err(PackError::Configuration(format!(
                "relationship {} is external, target '{}' is not a partname",
                self.r_id, self.target_ref
            )));
        }
        PackUri::from_rel_ref(&self.base_uri, &self.target_ref)
    }
}

/// Collection of relationships belonging to one source.
#[derive(Debug, Clone)]
pub struct Relationships {
    /// Partname of the source ("/" for the package root)
    source_uri: String,

    /// Base URI target references resolve against
    base_uri: String,

    /// Relationships keyed by rId
    rels: BTreeMap<String, Relationship>,
}

impl Relationships {
    /// Create an empty collection for the given source partname.
    pub fn new(source_uri: &str, base_uri: &str) -> Self {
        Self {
            source_uri: source_uri.to_string(),
            base_uri: base_uri.to_string(),
            rels: BTreeMap::new(),
        }
    }

    /// Partname of the source this collection belongs to.
    #[inline]
    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    /// Register a relationship under an explicit rId.
    ///
    /// Fails if the rId is already used from this source.
    pub fn add(
        &mut self,
        r_id: &str,
        reltype: &str,
        target_ref: &str,
        is_external: bool,
    ) -> Result<&Relationship> {
        if self.rels.contains_key(r_id) {
            return Err(PackError::DuplicateRelationshipId {
                source_uri: self.source_uri.clone(),
                r_id: r_id.to_string(),
            });
        }
        let rel = Relationship {
            r_id: r_id.to_string(),
            reltype: reltype.to_string(),
            target_ref: target_ref.to_string(),
            base_uri: self.base_uri.clone(),
            is_external,
        };
        Ok(self.rels.entry(r_id.to_string()).or_insert(rel))
    }

    /// Add a relationship of the given type to the target, reusing an
    /// existing matching one, and return its rId.
    pub fn get_or_add(&mut self, reltype: &str, target_ref: &str) -> String {
        for rel in self.rels.values() {
            if rel.reltype() == reltype && rel.target_ref() == target_ref && !rel.is_external() {
                return rel.r_id().to_string();
            }
        }
        let r_id = self.next_r_id();
        // Freshly generated id, cannot collide
        self.add(&r_id, reltype, target_ref, false)
            .map(|rel| rel.r_id().to_string())
            .unwrap_or(r_id)
    }

    /// Next free relationship ID in the "rId<N>" sequence, filling gaps.
    pub fn next_r_id(&self) -> String {
        let mut used_numbers: Vec<u32> = self
            .rels
            .keys()
            .filter_map(|r_id| {
                if r_id.len() > 3 && &r_id[..3] == "rId" {
                    atoi_simd::parse::<u32>(&r_id.as_bytes()[3..]).ok()
                } else {
                    None
                }
            })
            .collect();
        used_numbers.sort_unstable();

        let mut next_num = 1u32;
        for &num in &used_numbers {
            match num.cmp(&next_num) {
                std::cmp::Ordering::Equal => next_num += 1,
                std::cmp::Ordering::Greater => break,
                std::cmp::Ordering::Less => {}
            }
        }
        format!("rId{}", next_num)
    }

    #[inline]
    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.get(r_id)
    }

    #[inline]
    pub fn contains(&self, r_id: &str) -> bool {
        self.rels.contains_key(r_id)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// Serialize to .rels manifest XML.
    ///
    /// Relationships are ordered by rId numeral so repeated serialization of
    /// the same collection is byte-identical.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + self.rels.len() * 128);

        xml.push_str(XML_DECL);
        xml.push('\n');
        xml.push_str(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        xml.push('\n');

        let mut rels: Vec<&Relationship> = self.rels.values().collect();
        rels.sort_by_key(|rel| {
            atoi_simd::parse::<u32>(&rel.r_id().as_bytes()[3.min(rel.r_id().len())..])
                .unwrap_or(u32::MAX)
        });

        for rel in rels {
            let mode = if rel.is_external() {
                format!(r#" TargetMode="{}""#, target_mode::EXTERNAL)
            } else {
                String::new()
            };
            xml.push_str(&format!(
                r#"  <Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                escape(rel.r_id()),
                escape(rel.reltype()),
                escape(rel.target_ref()),
                mode
            ));
            xml.push('\n');
        }

        xml.push_str("</Relationships>");
        xml
    }
}
