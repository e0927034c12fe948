//! Minimal presentation package assembly.
//!
//! Wires up the smallest part set a consuming application will open: the
//! content-type manifest, the package relationship manifest pointing at the
//! main document, a presentation part whose slide-id list references its own
//! relationship manifest, and one slide part per entry. Slide content is
//! accepted as already-rendered bytes; nothing here knows about shapes,
//! layouts, or text.

use crate::builder::PackageBuilder;
use crate::constants::namespace;
use crate::constants::{content_type as ct, relationship_type as rt};
use crate::error::Result;
use crate::xmlgen::XML_DECL;
use std::path::Path;

const PRESENTATION_PART: &str = "/ppt/presentation.xml";
const CORE_PROPS_PART: &str = "/docProps/core.xml";
const APP_PROPS_PART: &str = "/docProps/app.xml";

/// First slide id in the `<p:sldIdLst>`; consuming applications expect slide
/// ids to start at 256.
const FIRST_SLIDE_ID: usize = 256;

/// Slide relationship ids start at rId2; rId1 is by convention unused at the
/// presentation level here so the numbering matches common producer output.
const FIRST_SLIDE_RID: usize = 2;

/// Declarative description of a minimal presentation package.
#[derive(Debug, Default)]
pub struct PresentationSkeleton {
    /// Rendered slide XML blobs, in presentation order
    slides: Vec<Vec<u8>>,

    /// Optional docProps/core.xml content
    core_props: Option<Vec<u8>>,

    /// Optional docProps/app.xml content
    app_props: Option<Vec<u8>>,
}

impl PresentationSkeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slide with already-rendered slide XML.
    pub fn add_slide(&mut self, content: Vec<u8>) -> &mut Self {
        self.slides.push(content);
        self
    }

    /// Attach core document properties XML.
    pub fn with_core_properties(mut self, content: Vec<u8>) -> Self {
        self.core_props = Some(content);
        self
    }

    /// Attach extended (application) properties XML.
    pub fn with_app_properties(mut self, content: Vec<u8>) -> Self {
        self.app_props = Some(content);
        self
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Assemble the fully wired builder: every slide referenced by the
    /// slide-id list has a matching relationship and a registered part, so
    /// finalize cannot emit the advertised-but-missing-slide defect an
    /// unchecked writer can.
    pub fn into_builder(self) -> Result<PackageBuilder> {
        let mut builder = PackageBuilder::new();

        builder.declare_content_types(
            &[],
            &[(PRESENTATION_PART, ct::PML_PRESENTATION_MAIN)],
        );
        builder.add_part(
            PRESENTATION_PART,
            self.presentation_xml().into_bytes(),
            ct::PML_PRESENTATION_MAIN,
        )?;
        builder.add_relationship("/", "rId1", rt::OFFICE_DOCUMENT, "ppt/presentation.xml")?;

        for (index, slide) in self.slides.into_iter().enumerate() {
            let path = format!("/ppt/slides/slide{}.xml", index + 1);
            builder.declare_content_types(&[], &[(path.as_str(), ct::PML_SLIDE)]);
            builder.add_part(&path, slide, ct::PML_SLIDE)?;
            builder.add_relationship(
                PRESENTATION_PART,
                &format!("rId{}", index + FIRST_SLIDE_RID),
                rt::SLIDE,
                &format!("slides/slide{}.xml", index + 1),
            )?;
        }

        if let Some(core) = self.core_props {
            builder.declare_content_types(&[], &[(CORE_PROPS_PART, ct::OPC_CORE_PROPERTIES)]);
            builder.add_part(CORE_PROPS_PART, core, ct::OPC_CORE_PROPERTIES)?;
            builder.relate_to("/", rt::CORE_PROPERTIES, "docProps/core.xml")?;
        }
        if let Some(app) = self.app_props {
            builder.declare_content_types(&[], &[(APP_PROPS_PART, ct::OFC_EXTENDED_PROPERTIES)]);
            builder.add_part(APP_PROPS_PART, app, ct::OFC_EXTENDED_PROPERTIES)?;
            builder.relate_to("/", rt::EXTENDED_PROPERTIES, "docProps/app.xml")?;
        }

        Ok(builder)
    }

    /// Assemble and finalize in one step.
    pub fn build(self) -> Result<Vec<u8>> {
        self.into_builder()?.finalize()
    }

    /// Assemble, finalize in memory, and write the package file.
    pub fn write<P: AsRef<Path>>(self, path: P) -> Result<()> {
        self.into_builder()?.write(path)
    }

    /// Generate the presentation part: a slide-id list whose entries pair
    /// ids starting at 256 with rIds starting at rId2, matching the
    /// relationships `into_builder` registers.
    fn presentation_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + self.slides.len() * 48);

        xml.push_str(XML_DECL);
        xml.push_str(&format!(
            r#"<p:presentation xmlns:p="{}" xmlns:r="{}">"#,
            namespace::PML_MAIN,
            namespace::OFC_RELATIONSHIPS
        ));
        xml.push_str("<p:sldIdLst>");
        for index in 0..self.slides.len() {
            xml.push_str(&format!(
                r#"<p:sldId id="{}" r:id="rId{}"/>"#,
                index + FIRST_SLIDE_ID,
                index + FIRST_SLIDE_RID
            ));
        }
        xml.push_str("</p:sldIdLst>");
        xml.push_str("</p:presentation>");
        xml
    }
}
