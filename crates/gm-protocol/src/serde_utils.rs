//! Serde helpers for the firmware's loosely typed JSON
//!
//! The firmware is not consistent about booleans: some flags arrive as
//! `true`/`false`, others as `1`/`0`. Optional keys also need to be told apart
//! from explicit `null` in delta frames.

use serde::de::{self, Deserialize, Deserializer, Visitor};
use std::fmt;

/// Deserialize a boolean that may be encoded as `true`/`false` or `0`/`1`
pub mod flex_bool {
    use super::*;

    struct FlexBoolVisitor;

    impl<'de> Visitor<'de> for FlexBoolVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a boolean or the integers 0/1")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<bool, E> {
            Ok(v != 0.0)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(FlexBoolVisitor)
    }
}

/// Like [`flex_bool`], for fields that may be absent
pub mod flex_bool_opt {
    use super::*;

    #[derive(serde::Deserialize)]
    struct Wrapper(#[serde(with = "super::flex_bool")] bool);

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Option<Wrapper> = Option::deserialize(deserializer)?;
        Ok(value.map(|Wrapper(b)| b))
    }
}

/// Distinguish "key absent" (`None`) from "key present but null"
/// (`Some(None)`). Must be paired with `#[serde(default)]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
