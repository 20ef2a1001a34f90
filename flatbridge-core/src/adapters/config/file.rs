//! Delimited file format settings.

use serde::{Deserialize, Serialize};

/// Layout of a delimited text file.
///
/// # Example
/// ```rust
/// use flatbridge_core::adapters::FileFormat;
///
/// let format = FileFormat::default().with_delimiter(b'|');
/// assert!(format.validate().is_ok());
/// assert!(format.has_header);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFormat {
    /// Field separator byte
    pub delimiter: u8,
    /// First record holds column names
    pub has_header: bool,
    /// Quote byte used around fields containing delimiters or newlines
    pub quote: u8,
}

impl Default for FileFormat {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            quote: b'"',
        }
    }
}

impl FileFormat {
    /// Builder method to set the delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Builder method to declare whether the first record is a header.
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Parses a user-supplied delimiter.
    ///
    /// Accepts a single ASCII character or the escapes `\t` and `tab`.
    pub fn parse_delimiter(raw: &str) -> crate::Result<u8> {
        match raw {
            "\\t" | "tab" | "\t" => Ok(b'\t'),
            s if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
            other => Err(crate::error::FlatbridgeError::configuration(format!(
                "delimiter must be a single ASCII character, got '{}'",
                other
            ))),
        }
    }

    /// Validates the format.
    pub fn validate(&self) -> crate::Result<()> {
        if matches!(self.delimiter, b'\n' | b'\r') {
            return Err(crate::error::FlatbridgeError::configuration(
                "delimiter cannot be a line terminator",
            ));
        }
        if self.delimiter == self.quote {
            return Err(crate::error::FlatbridgeError::configuration(
                "delimiter and quote character must differ",
            ));
        }
        Ok(())
    }
}
