use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetDidError {
    #[error("malformed AssetDID: {0}")]
    Malformed(String),
}

/// `did:erc721:<chainId>:<contractAddress>:<tokenId>`, the decentralized
/// identifier used across the platform to refer to a single vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AssetDid {
    pub chain_id: u64,
    pub contract_address: String,
    pub token_id: u64,
}

impl AssetDid {
    pub fn new(chain_id: u64, contract_address: &str, token_id: u64) -> Self {
        Self {
            chain_id,
            contract_address: contract_address.to_lowercase(),
            token_id,
        }
    }
}

impl fmt::Display for AssetDid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "did:erc721:{}:{}:{}",
            self.chain_id, self.contract_address, self.token_id
        )
    }
}

impl From<AssetDid> for String {
    fn from(value: AssetDid) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for AssetDid {
    type Error = AssetDidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.as_str().parse()
    }
}

impl std::str::FromStr for AssetDid {
    type Err = AssetDidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(5, ':');
        match (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) {
            (
                Some("did"),
                Some("erc721"),
                Some(chain_id),
                Some(contract),
                Some(token_id),
            ) => {
                let chain_id = chain_id
                    .parse()
                    .map_err(|_| AssetDidError::Malformed(s.to_string()))?;
                let token_id = token_id
                    .parse()
                    .map_err(|_| AssetDidError::Malformed(s.to_string()))?;
                Ok(AssetDid::new(chain_id, contract, token_id))
            }
            _ => Err(AssetDidError::Malformed(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum DevLicenseError {
    #[error("malformed developer license address {0}: expected a 0x-prefixed 20-byte hex address")]
    Malformed(String),
}

/// The 20-byte address of the developer license that owns a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DevLicense(String);

impl DevLicense {
    /// Lowercases `address` without checking its shape. Only use this for
    /// values already known to be valid (e.g. round-tripping a `DevLicense`
    /// through its own `Display`); anything coming from outside the
    /// codebase should go through `FromStr`/`TryFrom<String>` instead.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DevLicense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DevLicense {
    type Error = DevLicenseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.as_str().parse()
    }
}

impl std::str::FromStr for DevLicense {
    type Err = DevLicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        let hex_part = lowered
            .strip_prefix("0x")
            .ok_or_else(|| DevLicenseError::Malformed(s.to_string()))?;
        if hex_part.len() != 40 || !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DevLicenseError::Malformed(s.to_string()));
        }
        Ok(Self(lowered))
    }
}

impl From<DevLicense> for String {
    fn from(value: DevLicense) -> Self {
        value.0
    }
}

macro_rules! impl_sea_orm_string_newtype {
    ($name:ident, $to_string:expr) => {
        impl From<$name> for ::sea_orm::Value {
            fn from(id: $name) -> ::sea_orm::Value {
                ::sea_orm::Value::String(Some(Box::new($to_string(&id))))
            }
        }

        impl ::sea_orm::TryGetable for $name {
            fn try_get_by<I: ::sea_orm::ColIdx>(
                res: &::sea_orm::QueryResult,
                index: I,
            ) -> Result<Self, sea_orm::TryGetError> {
                let val = res.try_get_by::<String, _>(index)?;
                val.parse().map_err(|e: <$name as std::str::FromStr>::Err| {
                    sea_orm::TryGetError::DbErr(sea_orm::DbErr::TryIntoErr {
                        from: "String",
                        into: stringify!($name),
                        source: Box::new(std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            e.to_string(),
                        )),
                    })
                })
            }
        }

        impl ::sea_orm::sea_query::ValueType for $name {
            fn try_from(
                v: ::sea_orm::Value,
            ) -> Result<Self, ::sea_orm::sea_query::ValueTypeErr> {
                match v {
                    | ::sea_orm::Value::String(Some(x)) => {
                        x.parse().map_err(|_| ::sea_orm::sea_query::ValueTypeErr)
                    }
                    | _ => Err(::sea_orm::sea_query::ValueTypeErr),
                }
            }

            fn type_name() -> String {
                stringify!($name).to_owned()
            }

            fn array_type() -> ::sea_orm::sea_query::ArrayType {
                ::sea_orm::sea_query::ArrayType::String
            }

            fn column_type() -> ::sea_orm::sea_query::ColumnType {
                ::sea_orm::sea_query::ColumnType::String(None)
            }
        }

        impl ::sea_orm::sea_query::Nullable for $name {
            fn null() -> ::sea_orm::Value {
                ::sea_orm::Value::String(None)
            }
        }

        impl ::sea_orm::TryFromU64 for $name {
            fn try_from_u64(_: u64) -> Result<Self, ::sea_orm::DbErr> {
                Err(::sea_orm::DbErr::ConvertFromU64(stringify!($name)))
            }
        }
    };
}

impl_sea_orm_string_newtype!(AssetDid, |v: &AssetDid| v.to_string());
impl_sea_orm_string_newtype!(DevLicense, |v: &DevLicense| v.to_string());
