/// A path within the exported tree.
///
/// Paths are simple nonempty relative paths, with directories
/// separated by / and without '.' or '..' or empty parts. Directory
/// and file names must be valid unicode.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize, serde::Serialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Path(String);

impl Path {
    /// Build a path from a string.
    ///
    /// If parsing works, the path is guaranteed to be acceptable.
    pub fn parse(str: impl Into<String>) -> Result<Path, PathError> {
        let str = str.into();
        check_path(&str)?;

        Ok(Path(str))
    }

    /// The name part of the path, without any parent element.
    ///
    /// This is the last and possibly only element of a
    /// slash-separated path.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The parent of the path.
    ///
    /// Return a non-empty parent path or None.
    pub fn parent(&self) -> Option<Path> {
        self.0
            .rfind('/')
            .map(|slash| Path(self.0[0..slash].to_string()))
    }

    /// Split the path into its components, in order.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check_path(str: &str) -> Result<(), PathError> {
    if str.is_empty()
        || str
            .split('/')
            .any(|s| s.is_empty() || s == "." || s == "..")
    {
        return Err(PathError::InvalidPath);
    }
    Ok(())
}

impl AsRef<Path> for Path {
    fn as_ref(&self) -> &Path {
        self
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Path {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Path::parse(value)
    }
}

impl From<Path> for String {
    fn from(value: Path) -> Self {
        value.0
    }
}

/// Errors returned by Path functions
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Invalid path. Paths must be valid unicode, relative, and not contain . or ..")]
    InvalidPath,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_paths() -> anyhow::Result<()> {
        Path::parse("foobar")?;
        Path::parse("foo/bar")?;
        Path::parse(".foo/.bar.txt")?;
        Path::parse("a/b/c/d")?;

        Ok(())
    }

    #[test]
    fn parse_invalid_paths() -> anyhow::Result<()> {
        assert!(matches!(Path::parse(""), Err(PathError::InvalidPath),));
        assert!(matches!(Path::parse("/"), Err(PathError::InvalidPath),));
        assert!(matches!(Path::parse("/foo"), Err(PathError::InvalidPath),));
        assert!(matches!(Path::parse("foo/"), Err(PathError::InvalidPath),));
        assert!(matches!(
            Path::parse("foo//bar"),
            Err(PathError::InvalidPath),
        ));
        assert!(matches!(
            Path::parse("foo/../bar"),
            Err(PathError::InvalidPath),
        ));
        assert!(matches!(
            Path::parse("foo/./bar"),
            Err(PathError::InvalidPath),
        ));

        Ok(())
    }

    #[test]
    fn name() -> anyhow::Result<()> {
        assert_eq!("foobar", Path::parse("foobar")?.name());
        assert_eq!("bar", Path::parse("foo/bar")?.name());

        Ok(())
    }

    #[test]
    fn parent() -> anyhow::Result<()> {
        assert_eq!(
            Some(Path::parse("a/b/c")?),
            Path::parse("a/b/c/d")?.parent()
        );
        assert_eq!(Some(Path::parse("a/b")?), Path::parse("a/b/c")?.parent());
        assert_eq!(Some(Path::parse("a")?), Path::parse("a/b")?.parent());
        assert_eq!(None, Path::parse("a")?.parent());

        Ok(())
    }

    #[test]
    fn components() -> anyhow::Result<()> {
        assert_eq!(
            Path::parse("a/b/c")?.components().collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert_eq!(
            Path::parse("file")?.components().collect::<Vec<_>>(),
            vec!["file"]
        );

        Ok(())
    }
}
