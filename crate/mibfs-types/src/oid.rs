use std::fmt;

/// An object identifier, the address of a management value.
///
/// OIDs are nonempty sequences of numeric arcs, written in dotted
/// form, such as "1.3.6.1.2.1.1.5.0". A leading dot is accepted on
/// input and not kept. Ordering is lexicographic over the arcs,
/// which is the order values appear in a MIB walk.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize, serde::Serialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(Vec<u32>);

impl Oid {
    /// Build an OID from dotted numeric text.
    ///
    /// If parsing works, the OID is guaranteed to be acceptable.
    pub fn parse(str: impl AsRef<str>) -> Result<Oid, OidError> {
        let str = str.as_ref();
        let str = str.strip_prefix('.').unwrap_or(str);
        if str.is_empty() {
            return Err(OidError::InvalidOid);
        }
        let mut arcs = Vec::new();
        for part in str.split('.') {
            arcs.push(part.parse::<u32>().map_err(|_| OidError::InvalidOid)?);
        }

        Ok(Oid(arcs))
    }

    /// Build an OID directly from its arcs.
    pub fn from_arcs(arcs: impl Into<Vec<u32>>) -> Result<Oid, OidError> {
        let arcs = arcs.into();
        if arcs.is_empty() {
            return Err(OidError::InvalidOid);
        }

        Ok(Oid(arcs))
    }

    /// The numeric arcs, in order.
    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    /// Number of arcs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return true if this OID is a proper prefix of `other`.
    ///
    /// An OID is not its own ancestor.
    pub fn is_ancestor_of(&self, other: &Oid) -> bool {
        other.0.len() > self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// Return true if this OID extends `other` by at least one arc.
    pub fn is_child_of(&self, other: &Oid) -> bool {
        other.is_ancestor_of(self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{arc}")?;
            first = false;
        }

        Ok(())
    }
}

impl TryFrom<String> for Oid {
    type Error = OidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Oid::parse(value)
    }
}

impl From<Oid> for String {
    fn from(value: Oid) -> Self {
        value.to_string()
    }
}

/// Errors returned by Oid functions
#[derive(Debug, thiserror::Error)]
pub enum OidError {
    #[error("invalid OID; expected dotted numeric form, such as 1.3.6.1.2.1.1.5.0")]
    InvalidOid,
}
