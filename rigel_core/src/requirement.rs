//! Requirement declarations.
//!
//! A [`Requirement`] is one condition checked against one topic. It is
//! immutable once built and shared read-only (`Arc<Requirement>`) by every
//! status tracking it.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Comparison applied to each received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    Different,
    Equals,
    Greater,
    #[serde(alias = "GREATER_THAN")]
    GreaterOrEqual,
    Lesser,
    #[serde(alias = "LESSER_THAN")]
    LesserOrEqual,
    /// Satisfied when exactly `value` messages have been received.
    #[serde(alias = "RECEIVED")]
    ReceivedCount,
}

impl Condition {
    /// Returns all conditions.
    pub fn all() -> [Condition; 7] {
        [
            Condition::Different,
            Condition::Equals,
            Condition::Greater,
            Condition::GreaterOrEqual,
            Condition::Lesser,
            Condition::LesserOrEqual,
            Condition::ReceivedCount,
        ]
    }

    /// Returns the canonical name used in configuration and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Condition::Different => "DIFFERENT",
            Condition::Equals => "EQUALS",
            Condition::Greater => "GREATER",
            Condition::GreaterOrEqual => "GREATER_OR_EQUAL",
            Condition::Lesser => "LESSER",
            Condition::LesserOrEqual => "LESSER_OR_EQUAL",
            Condition::ReceivedCount => "RECEIVED_COUNT",
        }
    }

    /// True if this condition compares a message field.
    pub fn needs_field(&self) -> bool {
        !matches!(self, Condition::ReceivedCount)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DIFFERENT" => Ok(Condition::Different),
            "EQUALS" => Ok(Condition::Equals),
            "GREATER" => Ok(Condition::Greater),
            "GREATER_OR_EQUAL" | "GREATER_THAN" => Ok(Condition::GreaterOrEqual),
            "LESSER" => Ok(Condition::Lesser),
            "LESSER_OR_EQUAL" | "LESSER_THAN" => Ok(Condition::LesserOrEqual),
            "RECEIVED_COUNT" | "RECEIVED" => Ok(Condition::ReceivedCount),
            _ => Err(format!("Unknown condition: {}", s)),
        }
    }
}

/// One declared condition on one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RequirementDecl")]
pub struct Requirement {
    condition: Condition,
    topic: String,
    message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    value: Value,
    is_breakpoint: bool,
}

/// Unvalidated shape of a requirement as written in configuration.
#[derive(Debug, Deserialize)]
struct RequirementDecl {
    condition: Condition,
    topic: String,
    #[serde(alias = "message")]
    message_type: String,
    #[serde(default)]
    field: Option<String>,
    value: Value,
    #[serde(default, alias = "breakpoint")]
    is_breakpoint: bool,
}

impl TryFrom<RequirementDecl> for Requirement {
    type Error = ConfigurationError;

    fn try_from(decl: RequirementDecl) -> Result<Self, Self::Error> {
        let requirement = Requirement::new(
            decl.condition,
            decl.topic,
            decl.message_type,
            decl.field,
            decl.value,
        )?;
        Ok(requirement.breakpoint(decl.is_breakpoint))
    }
}

impl Requirement {
    /// Builds a validated requirement.
    ///
    /// # Errors
    /// * `MissingField` - any condition but RECEIVED_COUNT without `field`
    /// * `InvalidCallCount` - RECEIVED_COUNT whose value is not a `u64`
    /// * `EmptyTopic` / `EmptyMessageType`
    pub fn new(
        condition: Condition,
        topic: impl Into<String>,
        message_type: impl Into<String>,
        field: Option<String>,
        value: Value,
    ) -> Result<Self, ConfigurationError> {
        let topic = topic.into();
        let message_type = message_type.into();

        if topic.trim().is_empty() {
            return Err(ConfigurationError::EmptyTopic);
        }
        if message_type.trim().is_empty() {
            return Err(ConfigurationError::EmptyMessageType(topic));
        }
        if condition.needs_field() && field.is_none() {
            return Err(ConfigurationError::MissingField { topic, condition });
        }
        if condition == Condition::ReceivedCount && value.as_u64().is_none() {
            return Err(ConfigurationError::InvalidCallCount { topic, value });
        }

        Ok(Self {
            condition,
            topic,
            message_type,
            field,
            value,
            is_breakpoint: false,
        })
    }

    /// Marks (or unmarks) this requirement as a breakpoint.
    pub fn breakpoint(mut self, is_breakpoint: bool) -> Self {
        self.is_breakpoint = is_breakpoint;
        self
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_breakpoint(&self) -> bool {
        self.is_breakpoint
    }

    /// Renders the stable report description.
    ///
    /// `<topic> (<messageType>) - <field> <condition> <value>`, with the field
    /// omitted when absent. Downstream tooling greps this text.
    pub fn describe(&self) -> String {
        let value = render_value(&self.value);
        match &self.field {
            Some(field) => format!(
                "{} ({}) - {} {} {}",
                self.topic, self.message_type, field, self.condition, value
            ),
            None => format!(
                "{} ({}) - {} {}",
                self.topic, self.message_type, self.condition, value
            ),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Strings render bare, everything else as JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_required_unless_received_count() {
        for condition in Condition::all() {
            let without_field =
                Requirement::new(condition, "/state", "std_msgs/String", None, json!(1));
            if condition == Condition::ReceivedCount {
                assert!(without_field.is_ok());
            } else {
                assert!(matches!(
                    without_field,
                    Err(ConfigurationError::MissingField { .. })
                ));
            }

            let with_field = Requirement::new(
                condition,
                "/state",
                "std_msgs/String",
                Some("data".to_string()),
                json!(1),
            );
            assert!(with_field.is_ok(), "{} with field should build", condition);
        }
    }

    #[test]
    fn test_received_count_needs_integer() {
        let result = Requirement::new(
            Condition::ReceivedCount,
            "/scan",
            "sensor_msgs/LaserScan",
            None,
            json!("three"),
        );
        assert!(matches!(result, Err(ConfigurationError::InvalidCallCount { .. })));

        let negative = Requirement::new(
            Condition::ReceivedCount,
            "/scan",
            "sensor_msgs/LaserScan",
            None,
            json!(-1),
        );
        assert!(negative.is_err());
    }

    #[test]
    fn test_empty_topic_rejected() {
        let result = Requirement::new(Condition::Equals, " ", "t", Some("f".into()), json!(1));
        assert!(matches!(result, Err(ConfigurationError::EmptyTopic)));
    }

    #[test]
    fn test_describe_with_and_without_field() {
        let with_field = Requirement::new(
            Condition::Equals,
            "/robot/state",
            "std_msgs/String",
            Some("data".to_string()),
            json!("done"),
        )
        .unwrap();
        assert_eq!(
            with_field.describe(),
            "/robot/state (std_msgs/String) - data EQUALS done"
        );

        let count = Requirement::new(
            Condition::ReceivedCount,
            "/scan",
            "sensor_msgs/LaserScan",
            None,
            json!(3),
        )
        .unwrap();
        assert_eq!(count.describe(), "/scan (sensor_msgs/LaserScan) - RECEIVED_COUNT 3");
    }

    #[test]
    fn test_deserialize_with_legacy_names() {
        let requirement: Requirement = serde_json::from_value(json!({
            "condition": "GREATER_THAN",
            "topic": "/odom",
            "message": "nav_msgs/Odometry",
            "field": "pose.pose.position.x",
            "value": 2.5,
            "breakpoint": true
        }))
        .unwrap();

        assert_eq!(requirement.condition(), Condition::GreaterOrEqual);
        assert_eq!(requirement.message_type(), "nav_msgs/Odometry");
        assert!(requirement.is_breakpoint());
    }

    #[test]
    fn test_deserialize_rejects_missing_field() {
        let result: Result<Requirement, _> = serde_json::from_value(json!({
            "condition": "EQUALS",
            "topic": "/state",
            "message_type": "std_msgs/String",
            "value": "done"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_condition_from_str() {
        assert_eq!("received".parse::<Condition>().unwrap(), Condition::ReceivedCount);
        assert_eq!("LESSER_THAN".parse::<Condition>().unwrap(), Condition::LesserOrEqual);
        assert!("ABOUT".parse::<Condition>().is_err());
    }
}
