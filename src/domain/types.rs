//! Shared domain enumerations persisted inside document bodies.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Categories,
    Products,
    Users,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Categories => "categories",
            Collection::Products => "products",
            Collection::Users => "users",
        }
    }

    /// Body fields that must be unique within the collection.
    pub fn unique_fields(self) -> &'static [&'static str] {
        match self {
            Collection::Categories => &["name"],
            Collection::Products => &["sku"],
            Collection::Users => &["email"],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    Customer,
    Vendor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
            Role::Vendor => "vendor",
        }
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Role::Admin),
            "customer" => Ok(Role::Customer),
            "vendor" => Ok(Role::Vendor),
            other => Err(DomainError::validation(format!(
                "role must be one of admin, customer, vendor (got `{other}`)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_defaults_to_customer() {
        assert_eq!(Role::default(), Role::Customer);
    }

    #[test]
    fn role_parses_known_values_only() {
        assert_eq!("vendor".parse::<Role>().unwrap(), Role::Vendor);
        assert!("root".parse::<Role>().is_err());
    }
}
