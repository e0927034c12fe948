/// The PackUri value type: a partname within an OPC package.
///
/// Partnames always begin with a forward slash and use forward slashes as
/// separators, per the Open Packaging Conventions. The type gives access to
/// the pieces the builder needs: directory, filename, extension, the ZIP
/// membername, and the conventional location of the sibling .rels part.
use crate::error::{PackError, Result};

/// The package pseudo-partname, representing the package root.
pub const PACKAGE_URI: &str = "/";

/// The partname of the content-type manifest.
pub const CONTENT_TYPES_URI: &str = "/[Content_Types].xml";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackUri {
    uri: String,
}

impl PackUri {
    /// Create a PackUri, rejecting anything that does not begin with a slash.
    pub fn new<S: Into<String>>(uri: S) -> Result<Self> {
        let uri = uri.into();
        if !uri.starts_with('/') {
            return Err(PackError::InvalidPackUri(format!(
                "partname must begin with '/', got '{}'",
                uri
            )));
        }
        Ok(PackUri { uri })
    }

    /// Resolve a relative reference against a base URI to an absolute
    /// partname, normalizing "." and ".." components.
    ///
    /// For example, base "/ppt/slides" and reference "../media/image1.png"
    /// yield "/ppt/media/image1.png".
    pub fn from_rel_ref(base_uri: &str, relative_ref: &str) -> Result<Self> {
        let joined = if base_uri.ends_with('/') {
            format!("{}{}", base_uri, relative_ref)
        } else {
            format!("{}/{}", base_uri, relative_ref)
        };
        Self::new(Self::normalize(&joined))
    }

    /// The directory portion, e.g. "/ppt/slides" for "/ppt/slides/slide1.xml".
    pub fn base_uri(&self) -> &str {
        if self.uri == "/" {
            return "/";
        }
        match self.uri.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &self.uri[..pos],
        }
    }

    /// The filename portion, e.g. "slide1.xml". Empty for the package root.
    pub fn filename(&self) -> &str {
        match self.uri.rfind('/') {
            Some(pos) => &self.uri[pos + 1..],
            None => "",
        }
    }

    /// The extension without the leading period, e.g. "xml". Empty when the
    /// filename has no period.
    pub fn ext(&self) -> &str {
        let filename = self.filename();
        match filename.rfind('.') {
            Some(pos) => &filename[pos + 1..],
            None => "",
        }
    }

    /// The ZIP membername for this partname (leading slash stripped).
    /// Empty for the package root.
    pub fn membername(&self) -> &str {
        if self.uri == "/" { "" } else { &self.uri[1..] }
    }

    /// The partname of the .rels part holding this source's relationships,
    /// e.g. "/ppt/_rels/presentation.xml.rels" for "/ppt/presentation.xml"
    /// and "/_rels/.rels" for the package root.
    pub fn rels_uri(&self) -> Result<PackUri> {
        let base_uri = self.base_uri();
        let rels_filename = format!("{}.rels", self.filename());
        if base_uri == "/" {
            Self::new(format!("/_rels/{}", rels_filename))
        } else {
            Self::new(format!("{}/_rels/{}", base_uri, rels_filename))
        }
    }

    /// The relative reference from `base_uri` to this partname, suitable for
    /// use as a Target attribute in a .rels manifest.
    pub fn relative_ref(&self, base_uri: &str) -> String {
        if base_uri == "/" {
            return self.membername().to_string();
        }

        let from_parts: Vec<&str> = base_uri.split('/').filter(|s| !s.is_empty()).collect();
        let to_parts: Vec<&str> = self.uri.split('/').filter(|s| !s.is_empty()).collect();

        let common = from_parts
            .iter()
            .zip(to_parts.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut result = String::new();
        for _ in common..from_parts.len() {
            result.push_str("../");
        }
        for (i, part) in to_parts.iter().enumerate().skip(common) {
            if i > common {
                result.push('/');
            }
            result.push_str(part);
        }
        result
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    fn normalize(path: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for part in path.split('/') {
            match part {
                "" | "." => {
                    if parts.is_empty() {
                        parts.push("");
                    }
                }
                ".." => {
                    if parts.len() > 1 {
                        parts.pop();
                    }
                }
                _ => parts.push(part),
            }
        }
        if parts.len() <= 1 {
            return "/".to_string();
        }
        parts.join("/")
    }
}

impl std::fmt::Display for PackUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri)
    }
}

impl AsRef<str> for PackUri {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}
