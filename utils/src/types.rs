use std::{
    convert::Infallible,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// The ID of a file on esoui.com. Stable across catalog refreshes.
pub type CatalogId = u64;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum AddonIdentifier {
    /// The ID of the catalog entry on esoui.com.
    Id(CatalogId),

    /// The logical path (directory name) of an add-on.
    Path(String),
}

impl PartialEq<CatalogId> for AddonIdentifier {
    fn eq(&self, other_id: &CatalogId) -> bool {
        matches!(self, AddonIdentifier::Id(other) if other_id == other)
    }
}

impl PartialEq<&str> for AddonIdentifier {
    fn eq(&self, other_path: &&str) -> bool {
        matches!(self, AddonIdentifier::Path(other) if other_path == other)
    }
}

impl From<CatalogId> for AddonIdentifier {
    fn from(v: CatalogId) -> Self {
        Self::Id(v)
    }
}

impl FromStr for AddonIdentifier {
    // Impossible for this conversion to fail.
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // If we can parse it as an ID (`u64`), then treat it as an ID. Otherwise
        // assume that we received the add-on path.
        s.parse::<CatalogId>()
            .map(AddonIdentifier::Id)
            .or_else(|_| Ok(AddonIdentifier::Path(s.to_string())))
    }
}

impl Display for AddonIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AddonIdentifier::Id(id) => write!(f, "{}", id),
            AddonIdentifier::Path(path) => write!(f, "{}", path),
        }
    }
}
