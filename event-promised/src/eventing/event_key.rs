use serde::{Deserialize, Serialize};
use std::fmt;

/// 事件名
///
/// 同时支持字符串名与数字编码，两者互不相等（`"1"` 与 `1` 是不同事件）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventKey {
    Name(String),
    Code(i64),
}

impl EventKey {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            EventKey::Name(name) => Some(name),
            EventKey::Code(_) => None,
        }
    }

    pub fn as_code(&self) -> Option<i64> {
        match self {
            EventKey::Name(_) => None,
            EventKey::Code(code) => Some(*code),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Name(name) => f.write_str(name),
            EventKey::Code(code) => write!(f, "#{code}"),
        }
    }
}

impl From<&str> for EventKey {
    fn from(name: &str) -> Self {
        EventKey::Name(name.to_string())
    }
}

impl From<String> for EventKey {
    fn from(name: String) -> Self {
        EventKey::Name(name)
    }
}

impl From<&String> for EventKey {
    fn from(name: &String) -> Self {
        EventKey::Name(name.clone())
    }
}

impl From<&EventKey> for EventKey {
    fn from(key: &EventKey) -> Self {
        key.clone()
    }
}

impl From<i64> for EventKey {
    fn from(code: i64) -> Self {
        EventKey::Code(code)
    }
}

impl From<i32> for EventKey {
    fn from(code: i32) -> Self {
        EventKey::Code(code.into())
    }
}

impl From<u32> for EventKey {
    fn from(code: u32) -> Self {
        EventKey::Code(code.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_codes_are_distinct() {
        assert_ne!(EventKey::from("1"), EventKey::from(1));
        assert_eq!(EventKey::from(7i64), EventKey::from(7u32));
        assert_eq!(EventKey::from("A").as_name(), Some("A"));
        assert_eq!(EventKey::from(3).as_code(), Some(3));
    }

    #[test]
    fn serializes_untagged() {
        let keys: Vec<EventKey> = serde_json::from_str(r#"["progress", 42]"#).unwrap();
        assert_eq!(keys, vec![EventKey::from("progress"), EventKey::from(42)]);
        assert_eq!(EventKey::from(42).to_string(), "#42");
    }
}
