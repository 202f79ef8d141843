//! Entity kinds and the sensitive fields each one carries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from policy lookups by name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The name matches no registered entity kind or table.
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),
}

/// A field that must be protected at rest.
///
/// [`SensitiveField::as_str`] is the key the field is stored under in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensitiveField {
    Email,
    FirstName,
    LastName,
    Department,
    SerialNumber,
    MacAddress,
    ModelNumber,
    LicenseKey,
    LicensedToName,
    LicensedToEmail,
    Phone,
    IpAddress,
    AdminUsername,
    RecoveryKey,
    Notes,
}

impl SensitiveField {
    /// Record key for this field.
    pub const fn as_str(self) -> &'static str {
        match self {
            SensitiveField::Email => "email",
            SensitiveField::FirstName => "firstName",
            SensitiveField::LastName => "lastName",
            SensitiveField::Department => "department",
            SensitiveField::SerialNumber => "serialNumber",
            SensitiveField::MacAddress => "macAddress",
            SensitiveField::ModelNumber => "modelNumber",
            SensitiveField::LicenseKey => "licenseKey",
            SensitiveField::LicensedToName => "licensedToName",
            SensitiveField::LicensedToEmail => "licensedToEmail",
            SensitiveField::Phone => "phone",
            SensitiveField::IpAddress => "ipAddress",
            SensitiveField::AdminUsername => "adminUsername",
            SensitiveField::RecoveryKey => "recoveryKey",
            SensitiveField::Notes => "notes",
        }
    }
}

impl fmt::Display for SensitiveField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A category of stored record with its own sensitive-field list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    User,
    Asset,
    Component,
    Accessory,
    License,
    IamAccount,
    VirtualMachine,
}

use SensitiveField as F;

const USER_FIELDS: &[SensitiveField] = &[F::Email, F::FirstName, F::LastName, F::Department];
const ASSET_FIELDS: &[SensitiveField] = &[F::SerialNumber, F::MacAddress, F::Notes];
const COMPONENT_FIELDS: &[SensitiveField] = &[F::SerialNumber, F::Notes];
const ACCESSORY_FIELDS: &[SensitiveField] = &[F::ModelNumber, F::Notes];
const LICENSE_FIELDS: &[SensitiveField] =
    &[F::LicenseKey, F::LicensedToName, F::LicensedToEmail, F::Notes];
const IAM_ACCOUNT_FIELDS: &[SensitiveField] = &[F::Email, F::Phone, F::Notes];
const VIRTUAL_MACHINE_FIELDS: &[SensitiveField] =
    &[F::IpAddress, F::AdminUsername, F::RecoveryKey, F::Notes];

impl EntityKind {
    /// Every entity kind, in migration order.
    pub const ALL: [EntityKind; 7] = [
        EntityKind::User,
        EntityKind::Asset,
        EntityKind::Component,
        EntityKind::Accessory,
        EntityKind::License,
        EntityKind::IamAccount,
        EntityKind::VirtualMachine,
    ];

    /// Ordered list of fields encrypted at rest for this kind.
    ///
    /// Lookup keys (`id`, `username`, `assetTag`, `hostname`) are never listed:
    /// envelopes use a random IV and cannot be matched exactly.
    pub const fn sensitive_fields(self) -> &'static [SensitiveField] {
        match self {
            EntityKind::User => USER_FIELDS,
            EntityKind::Asset => ASSET_FIELDS,
            EntityKind::Component => COMPONENT_FIELDS,
            EntityKind::Accessory => ACCESSORY_FIELDS,
            EntityKind::License => LICENSE_FIELDS,
            EntityKind::IamAccount => IAM_ACCOUNT_FIELDS,
            EntityKind::VirtualMachine => VIRTUAL_MACHINE_FIELDS,
        }
    }

    /// Entity type name, e.g. `"iamAccount"`.
    pub const fn name(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Asset => "asset",
            EntityKind::Component => "component",
            EntityKind::Accessory => "accessory",
            EntityKind::License => "license",
            EntityKind::IamAccount => "iamAccount",
            EntityKind::VirtualMachine => "virtualMachine",
        }
    }

    /// Backing table name, e.g. `"iam_accounts"`.
    pub const fn table_name(self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Asset => "assets",
            EntityKind::Component => "components",
            EntityKind::Accessory => "accessories",
            EntityKind::License => "licenses",
            EntityKind::IamAccount => "iam_accounts",
            EntityKind::VirtualMachine => "virtual_machines",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = PolicyError;

    /// Accepts either the entity name or the table name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.name() == s || k.table_name() == s)
            .ok_or_else(|| PolicyError::UnknownEntity(s.to_owned()))
    }
}
