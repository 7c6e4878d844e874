//! Shadow document model.
//!
//! ```text
//! { "version": <int>,
//!   "state": { "desired"|"reported": { "robots": { "<16-hex-key>": {
//!         "driveTimeMs": <int>, "angleDeg": <int>, "speedPct": <int>,
//!         "led": [r, g, b, timeMs], "revolutionCount": <int> } } } } }
//! ```
//!
//! Delta notifications from the cloud carry the robots map directly under
//! `state` (`state.robots`); [`ShadowDocument::desired_robots`] accepts both
//! forms.  Numeric fields are kept as `i64` here and range-checked by the
//! reconciler so that an out-of-range value is reported, not truncated.

use indexmap::IndexMap;
use meshfleet_types::ReconcileError;
use serde::{Deserialize, Serialize};

/// Robot entries keyed by shadow key.  `None` is JSON `null` (robot removed).
pub type RobotsMap = IndexMap<String, Option<RobotShadow>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadowDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default)]
    pub state: ShadowState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadowState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<RobotsSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported: Option<RobotsSection>,
    /// Delta form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robots: Option<RobotsMap>,
}

/// `{ "robots": ... }`.  A `None` map serialises as `null` (clear all).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotsSection {
    #[serde(default)]
    pub robots: Option<RobotsMap>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotShadow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_time_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle_deg: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_pct: Option<i64>,
    /// `[r, g, b, timeMs]`; each component may be `null`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led: Option<Vec<Option<i64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revolution_count: Option<i64>,
}

impl ShadowDocument {
    pub fn parse(text: &str) -> Result<Self, ReconcileError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ReconcileError::MalformedDocument(e.to_string()))?;
        if !value.is_object() {
            return Err(ReconcileError::MalformedDocument("root is not an object".into()));
        }
        serde_json::from_value(value).map_err(|e| ReconcileError::MalformedDocument(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ReconcileError> {
        serde_json::to_string(self).map_err(|e| ReconcileError::Encode(e.to_string()))
    }

    /// Desired robots, from `state.desired.robots` or the delta form.
    pub fn desired_robots(&self) -> Option<&RobotsMap> {
        self.state
            .desired
            .as_ref()
            .and_then(|d| d.robots.as_ref())
            .or(self.state.robots.as_ref())
    }

    /// Reported robots (`state.reported.robots`).
    pub fn reported_robots(&self) -> Option<&RobotsMap> {
        self.state.reported.as_ref().and_then(|r| r.robots.as_ref())
    }

    /// A reported-state document wrapping `robots`.
    pub fn reported(robots: Option<RobotsMap>) -> Self {
        Self {
            version: None,
            state: ShadowState {
                reported: Some(RobotsSection { robots }),
                ..ShadowState::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_desired_form() {
        let doc = ShadowDocument::parse(
            r#"{"version":3,"state":{"desired":{"robots":{
                "0000000000000001":{"driveTimeMs":500,"angleDeg":-90,"speedPct":50,"led":[255,null,0,100]}
            }}}}"#,
        )
        .unwrap();
        assert_eq!(doc.version, Some(3));
        let robots = doc.desired_robots().unwrap();
        let entry = robots["0000000000000001"].as_ref().unwrap();
        assert_eq!(entry.drive_time_ms, Some(500));
        assert_eq!(entry.angle_deg, Some(-90));
        assert_eq!(entry.led, Some(vec![Some(255), None, Some(0), Some(100)]));
    }

    #[test]
    fn parses_delta_form_and_ignores_metadata() {
        let doc = ShadowDocument::parse(
            r#"{"version":9,"timestamp":1700000000,"state":{"robots":{"0000000000000002":{"speedPct":10}}},
                "metadata":{"robots":{}}}"#,
        )
        .unwrap();
        let entry = doc.desired_robots().unwrap()["0000000000000002"].clone().unwrap();
        assert_eq!(entry.speed_pct, Some(10));
    }

    #[test]
    fn wrong_types_are_malformed() {
        for text in [
            "[]",
            "42",
            "not json",
            r#"{"state":{"desired":{"robots":{"0000000000000001":{"driveTimeMs":"fast"}}}}}"#,
            r#"{"state":{"desired":{"robots":[]}}}"#,
            r#"{"version":-1,"state":{}}"#,
        ] {
            assert!(
                matches!(ShadowDocument::parse(text), Err(ReconcileError::MalformedDocument(_))),
                "{text} should be malformed"
            );
        }
    }

    #[test]
    fn reported_serialisation_skips_absent_fields() {
        let mut robots = RobotsMap::new();
        robots.insert("0000000000000001".into(), Some(RobotShadow::default()));
        robots.insert("0000000000000002".into(), None);
        let json = ShadowDocument::reported(Some(robots)).to_json().unwrap();
        assert_eq!(
            json,
            r#"{"state":{"reported":{"robots":{"0000000000000001":{},"0000000000000002":null}}}}"#
        );
    }

    #[test]
    fn cleared_report_is_null_robots() {
        let json = ShadowDocument::reported(None).to_json().unwrap();
        assert_eq!(json, r#"{"state":{"reported":{"robots":null}}}"#);
    }
}
