/// Error types for package building and verification
use thiserror::Error;

/// A structural defect detected at finalize or verification time.
///
/// Each variant names the archive location involved so the caller can see at
/// a glance which declaration is missing or inconsistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// A relationship points at a part that was never registered.
    DanglingTarget {
        /// Source of the relationship ("/" for the package root)
        source: String,
        /// Relationship ID (e.g. "rId5")
        r_id: String,
        /// Absolute partname the target resolved to
        target: String,
    },

    /// A relationship was declared from a part that was never registered.
    UnknownSource { source: String },

    /// No content type resolves for a registered part, neither by extension
    /// default nor by explicit override.
    UnresolvedContentType { partname: String },

    /// A registered part is not the target of any internal relationship.
    OrphanPart { partname: String },

    /// An XML part's content references a relationship ID that has no entry
    /// in that part's relationship manifest.
    UnmatchedContentReference { source: String, r_id: String },
}

impl std::fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DanglingTarget {
                source,
                r_id,
                target,
            } => write!(
                f,
                "relationship {} from '{}' targets '{}', which is not a registered part",
                r_id, source, target
            ),
            Self::UnknownSource { source } => write!(
                f,
                "relationships declared from '{}', which is not a registered part",
                source
            ),
            Self::UnresolvedContentType { partname } => write!(
                f,
                "no content type resolves for part '{}' (no extension default, no override)",
                partname
            ),
            Self::OrphanPart { partname } => write!(
                f,
                "part '{}' is not the target of any relationship",
                partname
            ),
            Self::UnmatchedContentReference { source, r_id } => write!(
                f,
                "content of '{}' references {} but the part has no such relationship",
                source, r_id
            ),
        }
    }
}

#[derive(Error, Debug)]
pub enum PackError {
    #[error("duplicate part path: {0}")]
    DuplicatePath(String),

    // Field is deliberately not named `source`: thiserror would treat that
    // as the error's cause, which a partname string is not.
    #[error("duplicate relationship id {r_id} from '{source_uri}'")]
    DuplicateRelationshipId { source_uri: String, r_id: String },

    #[error("structural integrity violation: {0}")]
    StructuralIntegrity(IntegrityViolation),

    #[error("invalid manifest declaration: {0}")]
    Configuration(String),

    #[error("invalid pack URI: {0}")]
    InvalidPackUri(String),

    #[error("XML parsing error: {0}")]
    XmlError(String),

    #[error("ZIP error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
}

impl From<quick_xml::Error> for PackError {
    fn from(err: quick_xml::Error) -> Self {
        PackError::XmlError(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for PackError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        PackError::XmlError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PackError>;
