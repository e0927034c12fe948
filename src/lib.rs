//! Rambutan - a checked writer for OPC (Open Packaging Conventions) packages
//!
//! OPC is the ZIP-based container format beneath .pptx, .docx, and .xlsx: a
//! set of XML and binary parts tied together by a content-type manifest and
//! per-source relationship manifests. The format demands strict bidirectional
//! consistency — part content references relationship ids, relationship
//! manifests reference part paths, and the content-type manifest must cover
//! every part — and a writer that concatenates XML strings can silently emit
//! an archive no consuming application will open.
//!
//! This crate replaces that with a declarative builder: parts, relationships,
//! and content types are registered independently in any order, and
//! `finalize` either produces a complete, internally consistent archive or
//! reports the first structural defect (naming the part path and relationship
//! id involved) and produces nothing.
//!
//! # Example - building a package
//!
//! ```
//! use rambutan::{PackageBuilder, constants::{content_type as ct, relationship_type as rt}};
//!
//! # fn main() -> rambutan::Result<()> {
//! let mut builder = PackageBuilder::new();
//! builder.declare_content_types(&[], &[("/ppt/presentation.xml", ct::PML_PRESENTATION_MAIN)]);
//! builder.add_part(
//!     "/ppt/presentation.xml",
//!     b"<p:presentation/>".to_vec(),
//!     ct::PML_PRESENTATION_MAIN,
//! )?;
//! builder.add_relationship("/", "rId1", rt::OFFICE_DOCUMENT, "ppt/presentation.xml")?;
//! let bytes = builder.finalize()?;
//! assert!(!bytes.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! # Example - minimal presentation from rendered slide XML
//!
//! ```no_run
//! use rambutan::PresentationSkeleton;
//!
//! # fn main() -> rambutan::Result<()> {
//! let mut skeleton = PresentationSkeleton::new();
//! skeleton.add_slide(b"<p:sld/>".to_vec());
//! skeleton.write("deck.pptx")?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod builder;
pub mod constants;
pub mod content_types;
pub mod error;
pub mod packuri;
pub mod part;
pub mod rel;
pub mod skeleton;
pub mod verify;

mod xmlgen;

// Re-export commonly used types for convenience
pub use builder::PackageBuilder;
pub use content_types::ContentTypes;
pub use error::{IntegrityViolation, PackError, Result};
pub use packuri::{CONTENT_TYPES_URI, PACKAGE_URI, PackUri};
pub use part::Part;
pub use rel::{Relationship, Relationships};
pub use skeleton::PresentationSkeleton;
pub use verify::verify_package;
