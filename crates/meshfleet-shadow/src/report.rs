//! Reported-state document builders.
//!
//! [`serialize_report`] renders the whole registry.  The other builders
//! produce the incremental documents sent while the cloud is connected.

use meshfleet_registry::{FleetRegistry, Robot};
use meshfleet_types::{LedConfig, RobotAddress, RobotConfig};

use crate::document::{RobotShadow, RobotsMap, ShadowDocument};

fn led_array(led: &LedConfig) -> Vec<Option<i64>> {
    vec![
        Some(i64::from(led.r)),
        Some(i64::from(led.g)),
        Some(i64::from(led.b)),
        Some(i64::from(led.time_ms)),
    ]
}

fn movement_fields(config: &RobotConfig) -> RobotShadow {
    RobotShadow {
        drive_time_ms: Some(i64::from(config.drive_time_ms)),
        angle_deg: Some(i64::from(config.rotation_deg)),
        speed_pct: Some(i64::from(config.speed_pct)),
        ..RobotShadow::default()
    }
}

fn full_entry(robot: &Robot) -> RobotShadow {
    RobotShadow {
        led: Some(led_array(&robot.config.led)),
        revolution_count: Some(i64::from(robot.config.revolutions)),
        ..movement_fields(&robot.config)
    }
}

fn single(address: RobotAddress, entry: Option<RobotShadow>) -> ShadowDocument {
    let mut robots = RobotsMap::new();
    robots.insert(address.shadow_key(), entry);
    ShadowDocument::reported(Some(robots))
}

/// One entry per robot, in registry order.
pub fn serialize_report(registry: &FleetRegistry) -> ShadowDocument {
    let robots = registry
        .iter()
        .map(|r| (r.address.shadow_key(), Some(full_entry(r))))
        .collect();
    ShadowDocument::reported(Some(robots))
}

/// `"robots": null` – drop everything previously reported.
pub fn report_cleared() -> ShadowDocument {
    ShadowDocument::reported(None)
}

/// An empty entry announcing a new robot.
pub fn report_added(address: RobotAddress) -> ShadowDocument {
    single(address, Some(RobotShadow::default()))
}

/// The robot's key mapped to `null`.
pub fn report_removed(address: RobotAddress) -> ShadowDocument {
    single(address, None)
}

pub fn report_movement_config(address: RobotAddress, config: &RobotConfig) -> ShadowDocument {
    single(address, Some(movement_fields(config)))
}

pub fn report_led_config(address: RobotAddress, led: &LedConfig) -> ShadowDocument {
    single(
        address,
        Some(RobotShadow {
            led: Some(led_array(led)),
            ..RobotShadow::default()
        }),
    )
}

/// `revolutionCount` of every robot.
pub fn report_revolution_counts(registry: &FleetRegistry) -> ShadowDocument {
    let robots = registry
        .iter()
        .map(|r| {
            let entry = RobotShadow {
                revolution_count: Some(i64::from(r.config.revolutions)),
                ..RobotShadow::default()
            };
            (r.address.shadow_key(), Some(entry))
        })
        .collect();
    ShadowDocument::reported(Some(robots))
}
