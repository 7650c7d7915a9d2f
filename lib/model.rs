//! Opaque, lexicographically-sortable identifiers for system-assigned
//! entities (triggers, trigger log rows). Ids embed a ULID so that two ids
//! minted for the same prefix sort by creation order.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub trait ModelId: Sized + std::fmt::Display + From<String> {
    fn has_valid_prefix(&self) -> bool;
    fn value(&self) -> &str;
}

pub(crate) fn generate_raw_id<T: AsRef<str>>(prefix: T) -> String {
    format!("{}_{}", prefix.as_ref(), Ulid::new())
}

/// Define a newtype wrapper around a prefixed, ULID-suffixed id string.
#[rustfmt::skip]
macro_rules! define_model_id {
    (
        #[prefix = $prefix:literal]
        $(#[$m:meta])*
        $type_vis:vis struct $name:ident;
    ) => {
        $(#[$m])*
        #[derive(
            Debug,
            Hash,
            Clone,
            Default,
            ::serde::Serialize,
            ::serde::Deserialize,
            Eq,
            PartialEq,
            PartialOrd,
            Ord,
            ::derive_more::Display,
            ::derive_more::From,
            ::derive_more::Into,
        )]
        #[serde(transparent)]
        $type_vis struct $name(String);

        impl $crate::model::ModelId for $name {
            fn has_valid_prefix(&self) -> bool {
                self.0.starts_with(concat!($prefix, "_"))
            }
            fn value(&self) -> &str {
                &self.0
            }
        }

        impl $name {
            pub fn generate() -> Self {
                Self($crate::model::generate_raw_id($prefix))
            }
        }

        impl From<$name> for ::sea_orm::Value {
            fn from(id: $name) -> ::sea_orm::Value {
                ::sea_orm::Value::String(Some(Box::new(id.0)))
            }
        }

        impl ::sea_orm::TryGetable for $name {
            fn try_get_by<I: ::sea_orm::ColIdx>(
                res: &::sea_orm::QueryResult,
                index: I,
            ) -> Result<Self, sea_orm::TryGetError> {
                let val = res.try_get_by::<String, _>(index)?;
                Ok(Self(val))
            }
        }

        impl ::sea_orm::sea_query::ValueType for $name {
            fn try_from(
                v: ::sea_orm::Value,
            ) -> Result<Self, ::sea_orm::sea_query::ValueTypeErr> {
                match v {
                    | ::sea_orm::Value::String(Some(x)) => Ok(Self(*x)),
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

pub(crate) use define_model_id;

#[cfg(test)]
mod tests {
    use super::*;

    define_model_id! {
        #[prefix = "trig"]
        pub struct SomeId;
    }

    #[test]
    fn generated_ids_are_prefixed_and_ordered() {
        let a = SomeId::generate();
        assert!(a.value().starts_with("trig_"));
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = SomeId::generate();
        assert!(b > a);
    }
}
