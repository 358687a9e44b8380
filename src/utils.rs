use uuid::Uuid;

/// Whether a string is a well-formed dataset internal ID.
pub fn is_internal_uuid(value: &str) -> bool {
    Uuid::parse_str(value).is_ok()
}

/// Validate a dataset internal ID before it is sent anywhere.
pub(crate) fn ensure_internal_uuid(value: &str) -> Result<(), String> {
    if is_internal_uuid(value) {
        Ok(())
    } else {
        Err(format!(
            "'{value}' is not a dataset internal ID (UUID expected)"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_internal_uuid() {
        assert!(is_internal_uuid("5a0ca748-0b3a-4f83-a784-4b32b2f0f123"));
        assert!(!is_internal_uuid("my-dataset"));
        assert!(!is_internal_uuid(""));
    }

    #[test]
    fn test_ensure_internal_uuid_message_names_value() {
        let err = ensure_internal_uuid("my-dataset").unwrap_err();
        assert!(err.contains("my-dataset"));
    }
}
