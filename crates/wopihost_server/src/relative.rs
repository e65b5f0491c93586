//! Target name resolution for PutRelativeFile.

use crate::error::{WopiError, WopiResult};
use wopihost_core::{split_filename, validate_name, Document, DocumentStore};

/// Upper bound on ` (n)` suffixes tried before giving up.
const MAX_SUFFIX: u32 = 1000;

/// A requested relative target, split into name and extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TargetName {
    pub name: String,
    pub extension: String,
}

impl TargetName {
    /// Interprets `X-WOPI-SuggestedTarget`.
    ///
    /// A value starting with `.` is an extension that replaces the source's.
    pub fn suggested(source: &Document, value: &str) -> WopiResult<Self> {
        let target = match value.strip_prefix('.') {
            Some(extension) => Self {
                name: source.name.clone(),
                extension: extension.to_string(),
            },
            None => Self::split(value),
        };
        target.validate()?;
        Ok(target)
    }

    /// Interprets `X-WOPI-RelativeTarget`, which must be used verbatim.
    pub fn relative(value: &str) -> WopiResult<Self> {
        let target = Self::split(value);
        target.validate()?;
        Ok(target)
    }

    fn split(value: &str) -> Self {
        let (name, extension) = split_filename(value.trim());
        Self { name, extension }
    }

    fn validate(&self) -> WopiResult<()> {
        validate_name(&self.name)?;
        if self.extension.contains(['/', '\\', ':', '*', '?', '"', '<', '>', '|'])
            || self.extension.chars().any(char::is_control)
        {
            return Err(WopiError::InvalidName(format!(
                "invalid extension {:?}",
                self.extension
            )));
        }
        Ok(())
    }

    /// Returns `name.extension`.
    pub fn filename(&self) -> String {
        with_extension(&self.name, &self.extension)
    }

    /// Returns the first name, starting with this one, no document uses.
    ///
    /// Collisions get a ` (n)` suffix on the name: `report (1).docx`.
    pub fn free(&self, documents: &dyn DocumentStore) -> WopiResult<Self> {
        if documents.find_by_filename(&self.filename())?.is_none() {
            return Ok(self.clone());
        }
        for n in 1..=MAX_SUFFIX {
            let candidate = Self {
                name: format!("{} ({n})", self.name),
                extension: self.extension.clone(),
            };
            if documents.find_by_filename(&candidate.filename())?.is_none() {
                return Ok(candidate);
            }
        }
        Err(WopiError::Conflict {
            reason: format!("no free name for {}", self.filename()),
            valid_target: None,
        })
    }
}

fn with_extension(name: &str, extension: &str) -> String {
    if extension.is_empty() {
        name.to_string()
    } else {
        format!("{name}.{extension}")
    }
}
