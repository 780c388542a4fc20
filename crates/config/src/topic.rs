// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

//! Validated MQTT topic names.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Name of an MQTT topic as carried by a published message.
///
/// Topic names are the concrete publish targets, so the wildcard
/// characters reserved for topic filters are rejected here.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
#[schemars(with = "String")]
pub struct TopicName(String);

impl TopicName {
    /// Parses and validates a topic name.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            return Err("topic name must be non-empty".to_owned());
        }
        if raw.contains(['#', '+']) {
            return Err("topic name must not contain wildcard characters".to_owned());
        }
        if raw.contains('\0') {
            return Err("topic name must not contain a null character".to_owned());
        }
        Ok(Self(raw.to_owned()))
    }

    /// Returns the topic name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the owned topic name.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for TopicName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::borrow::Borrow<str> for TopicName {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for TopicName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TopicName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<TopicName> for String {
    fn from(value: TopicName) -> Self {
        value.0
    }
}

impl From<TopicName> for Cow<'static, str> {
    fn from(value: TopicName) -> Self {
        Cow::Owned(value.0)
    }
}

impl From<&'static str> for TopicName {
    fn from(value: &'static str) -> Self {
        Self::parse(value).expect("invalid static topic name literal")
    }
}

#[cfg(test)]
mod tests {
    use super::TopicName;

    #[test]
    fn topic_name_rejects_empty_values() {
        let err = TopicName::parse("").expect_err("empty topic names should fail");
        assert!(err.contains("non-empty"));
    }

    #[test]
    fn topic_name_rejects_wildcard_characters() {
        let err = TopicName::parse("sensors/#").expect_err("wildcards should fail");
        assert!(err.contains("wildcard"));
        let err = TopicName::parse("sensors/+/state").expect_err("wildcards should fail");
        assert!(err.contains("wildcard"));
    }

    #[test]
    fn topic_name_round_trips_through_serde() {
        let topic: TopicName =
            serde_yaml::from_str("sensors/metrics").expect("topic name should parse");
        assert_eq!(topic.as_str(), "sensors/metrics");
        let rendered = serde_yaml::to_string(&topic).expect("topic name should serialize");
        assert!(rendered.contains("sensors/metrics"));
    }

    #[test]
    fn topic_name_supports_borrowed_lookup() {
        use std::collections::HashMap;

        let mut sizes: HashMap<TopicName, usize> = HashMap::new();
        let _ = sizes.insert(TopicName::from("sensors/metrics"), 3);
        assert_eq!(sizes.get("sensors/metrics"), Some(&3));
    }
}
