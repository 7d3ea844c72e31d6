use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Closed role set. The legacy upper-case spellings are accepted on input.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    #[serde(alias = "EMPLOYEE", alias = "Employee")]
    Employee,
    #[serde(alias = "MANAGER", alias = "Manager")]
    Manager,
    #[serde(alias = "ADMIN", alias = "Admin")]
    Admin,
}

impl Role {
    /// Managers and admins may read and mutate other users' ledger rows.
    pub fn is_privileged(self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_both_casings() {
        assert_eq!(Role::from_str("ADMIN").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("manager").unwrap(), Role::Manager);
        assert!(Role::from_str("hr").is_err());
    }

    #[test]
    fn legacy_json_spelling_maps_to_same_variant() {
        let role: Role = serde_json::from_str("\"EMPLOYEE\"").unwrap();
        assert_eq!(role, Role::Employee);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn only_manager_and_admin_are_privileged() {
        assert!(!Role::Employee.is_privileged());
        assert!(Role::Manager.is_privileged());
        assert!(Role::Admin.is_privileged());
    }
}
