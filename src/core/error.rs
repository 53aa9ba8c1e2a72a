// Error kinds and the context-carrying error value shared by every codec path.
use std::error::Error as StdError;
use std::fmt;

use crate::core::meta::GroupVersionKind;

pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    UnsupportedContentType,
    UnknownType,
    AmbiguousType,
    NotInternal,
    NoRegisteredVersion,
    UnrecognizedType,
    StrictDecoding,
    Conversion,
    NoHubFound,
    Malformed,
    FrameTooLarge,
    Io,
    Usage,
}

/// Why a Convertible/Hub conversion failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConversionCause {
    InvalidArgs,
    ConvertTo,
    ConvertFrom,
    SchemeSetup,
}

impl fmt::Display for ConversionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConversionCause::InvalidArgs => "invalid args",
            ConversionCause::ConvertTo => "convert to hub",
            ConversionCause::ConvertFrom => "convert from hub",
            ConversionCause::SchemeSetup => "scheme setup",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    gvk: Option<GroupVersionKind>,
    cause: Option<ConversionCause>,
    index: Option<usize>,
    source: Option<BoxError>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            gvk: None,
            cause: None,
            index: None,
            source: None,
        }
    }

    /// Shorthand for a `Conversion` error tagged with its cause.
    pub fn conversion(cause: ConversionCause) -> Self {
        Self::new(ErrorKind::Conversion).with_cause(cause)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn gvk(&self) -> Option<&GroupVersionKind> {
        self.gvk.as_ref()
    }

    pub fn cause(&self) -> Option<ConversionCause> {
        self.cause
    }

    /// Position of the failing object or document within a multi-item call.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn is_strict_decoding(&self) -> bool {
        self.kind == ErrorKind::StrictDecoding
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_gvk(mut self, gvk: GroupVersionKind) -> Self {
        self.gvk = Some(gvk);
        self
    }

    pub fn with_cause(mut self, cause: ConversionCause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(cause) = self.cause {
            write!(f, " ({cause})")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(gvk) = &self.gvk {
            write!(f, " (gvk: {gvk})")?;
        }
        if let Some(index) = self.index {
            write!(f, " (index: {index})")?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Usage => 2,
        ErrorKind::UnsupportedContentType => 3,
        ErrorKind::Malformed | ErrorKind::FrameTooLarge => 4,
        ErrorKind::StrictDecoding => 5,
        ErrorKind::UnknownType
        | ErrorKind::AmbiguousType
        | ErrorKind::UnrecognizedType
        | ErrorKind::NotInternal
        | ErrorKind::NoRegisteredVersion => 6,
        ErrorKind::Conversion | ErrorKind::NoHubFound => 7,
        ErrorKind::Io => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversionCause, Error, ErrorKind, to_exit_code};
    use crate::core::meta::GroupVersionKind;

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Usage, 2),
            (ErrorKind::UnsupportedContentType, 3),
            (ErrorKind::Malformed, 4),
            (ErrorKind::FrameTooLarge, 4),
            (ErrorKind::StrictDecoding, 5),
            (ErrorKind::AmbiguousType, 6),
            (ErrorKind::NoHubFound, 7),
            (ErrorKind::Io, 8),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn display_includes_cause_and_gvk() {
        let err = Error::conversion(ConversionCause::ConvertTo)
            .with_message("bad field")
            .with_gvk(GroupVersionKind::new("web", "v1", "Guestbook"));
        let rendered = err.to_string();
        assert_eq!(
            rendered,
            "Conversion (convert to hub): bad field (gvk: web/v1, Kind=Guestbook)"
        );
        assert_eq!(err.cause(), Some(ConversionCause::ConvertTo));
    }

    #[test]
    fn strict_decoding_is_kind_checkable() {
        assert!(Error::new(ErrorKind::StrictDecoding).is_strict_decoding());
        assert!(!Error::new(ErrorKind::Malformed).is_strict_decoding());
    }
}
