//! Static registry of which fields are encrypted at rest, per entity kind.
//!
//! The registry is compiled in and immutable. The record transformer and the
//! migration jobs both read it, so a field added here is encrypted on write,
//! decrypted on read, and converted by the migrations without further changes.

pub mod entity;

pub use entity::{EntityKind, PolicyError, SensitiveField};

/// Sensitive fields for `entity`, in registry order.
pub fn field_policy(entity: EntityKind) -> &'static [SensitiveField] {
    entity.sensitive_fields()
}

/// Sensitive fields for an entity or table given by name.
///
/// # Errors
///
/// Returns [`PolicyError::UnknownEntity`] if the name is not registered.
pub fn field_policy_by_name(name: &str) -> Result<&'static [SensitiveField], PolicyError> {
    name.parse::<EntityKind>().map(field_policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_matches_kind() {
        assert_eq!(
            field_policy_by_name("licenses").unwrap(),
            field_policy(EntityKind::License)
        );
        assert!(field_policy_by_name("nope").is_err());
    }
}
