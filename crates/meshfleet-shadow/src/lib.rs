//! `meshfleet-shadow` – cloud shadow documents.
//!
//! - [`document`] – the desired/reported document model and JSON codec.
//! - [`reconciler`] – applies desired-state deltas to a [`FleetRegistry`][meshfleet_registry::FleetRegistry].
//! - [`report`] – renders registry state as reported-state documents.

pub mod document;
pub mod reconciler;
pub mod report;

pub use document::{RobotShadow, RobotsMap, RobotsSection, ShadowDocument, ShadowState};
pub use reconciler::{DeltaOutcome, ShadowReconciler};
pub use report::{
    report_added, report_cleared, report_led_config, report_movement_config, report_removed,
    report_revolution_counts, serialize_report,
};
