//! Textual markers and classification of raw stored strings.

use crate::error::{CodecError, CodecResult};
use crate::native::NativeValue;

/// Prefix of every native scalar.
pub const NATIVE_MARKER: &str = "Native?";

/// Prefix of every pointer reference.
pub const POINTER_MARKER: &str = "Pointer?";

/// What a raw stored string turned out to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoredForm<'a> {
    /// A native scalar; decode the whole string with [`NativeValue::decode`].
    Native(&'a str),
    /// A pointer to the given target key.
    Pointer(&'a str),
    /// Anything else: a composite type tag for the registry to resolve.
    Tag(&'a str),
}

/// Classify a raw stored string. Native detection runs first, then the
/// pointer pattern; everything else is a type tag. Never fails.
pub fn classify(raw: &str) -> StoredForm<'_> {
    if NativeValue::is_encoded(raw) {
        return StoredForm::Native(raw);
    }
    match parse_pointer(raw) {
        Ok(target) => StoredForm::Pointer(target),
        Err(_) => StoredForm::Tag(raw),
    }
}

/// Render a pointer to `target`.
pub fn make_pointer(target: &str) -> String {
    format!("{POINTER_MARKER}{target}")
}

/// Extract the target key of a pointer.
pub fn parse_pointer(text: &str) -> CodecResult<&str> {
    text.strip_prefix(POINTER_MARKER)
        .filter(|target| !target.is_empty())
        .ok_or_else(|| CodecError::NotAPointer(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_native() {
        let raw = NativeValue::Integer(5).encode().unwrap();
        assert_eq!(classify(&raw), StoredForm::Native(raw.as_str()));
    }

    #[test]
    fn classify_pointer() {
        assert_eq!(classify("Pointer?inner_from_m"), StoredForm::Pointer("inner_from_m"));
    }

    #[test]
    fn classify_tag() {
        assert_eq!(classify("oWR0eXBlaDxMaXN0IDE+"), StoredForm::Tag("oWR0eXBlaDxMaXN0IDE+"));
    }

    #[test]
    fn empty_pointer_is_a_tag() {
        assert_eq!(classify("Pointer?"), StoredForm::Tag("Pointer?"));
    }

    #[test]
    fn pointer_roundtrip() {
        let p = make_pointer("some key?with marks");
        assert_eq!(parse_pointer(&p).unwrap(), "some key?with marks");
    }

    #[test]
    fn parse_pointer_rejects_other_text() {
        assert_eq!(
            parse_pointer("Native?abc").unwrap_err(),
            CodecError::NotAPointer("Native?abc".into())
        );
    }
}
