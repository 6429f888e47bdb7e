//! Value codec for handler parameters
//!
//! Path captures and query values are decoded as JSON scalars: the raw text is
//! tried as JSON first and, failing that, as a JSON string. So `42` binds an
//! integer, `"42"` or `42` binds a `String`, and `abc` binds a `String` but
//! not an integer. Bodies are decoded as strict JSON.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Codec failures
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("value is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Decode a path capture or query value
pub fn decode_scalar<T: DeserializeOwned>(raw: &str) -> Result<T, CodecError> {
    match serde_json::from_str::<T>(raw) {
        Ok(value) => Ok(value),
        // bare text: retry as a JSON string, but report the original error
        Err(err) => T::deserialize(Value::String(raw.to_owned())).map_err(|_| err.into()),
    }
}

/// Decode a request body
pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, CodecError> {
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
        age: u32,
    }

    #[test]
    fn test_scalar_numbers() {
        assert_eq!(decode_scalar::<i64>("42").unwrap(), 42);
        assert_eq!(decode_scalar::<f64>("2.5").unwrap(), 2.5);
        assert!(decode_scalar::<i64>("abc").is_err());
        assert!(decode_scalar::<u8>("300").is_err());
    }

    #[test]
    fn test_scalar_strings() {
        assert_eq!(decode_scalar::<String>("alice").unwrap(), "alice");
        assert_eq!(decode_scalar::<String>("42").unwrap(), "42");
        assert_eq!(decode_scalar::<String>("\"quoted\"").unwrap(), "quoted");
        // no URL decoding
        assert_eq!(decode_scalar::<String>("a%20b").unwrap(), "a%20b");
    }

    #[test]
    fn test_scalar_bool_and_option() {
        assert!(decode_scalar::<bool>("true").unwrap());
        assert_eq!(decode_scalar::<Option<u32>>("null").unwrap(), None);
    }

    #[test]
    fn test_body() {
        let user: User = decode_body(br#"{"name":"ada","age":36}"#).unwrap();
        assert_eq!(
            user,
            User {
                name: "ada".to_string(),
                age: 36
            }
        );
        assert!(decode_body::<User>(b"{\"name\":").is_err());
        assert!(decode_body::<User>(b"").is_err());
    }
}
