//! [`ShadowReconciler`] – applies cloud desired-state deltas to the registry.
//!
//! A delta is validated in full before anything is touched; a single bad key
//! or out-of-range value discards the whole delta.  Documents whose `version`
//! is not newer than the last applied one are dropped as replays.

use std::collections::HashMap;

use meshfleet_registry::FleetRegistry;
use meshfleet_types::{EventPayload, LedConfig, ReconcileError, RegistryError, RobotAddress, RobotConfig};
use tracing::{debug, warn};

use crate::document::{RobotShadow, RobotsMap, ShadowDocument};

/// Result of [`ShadowReconciler::apply_delta`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaOutcome {
    /// The delta was applied; `events` are the commands to publish, in order.
    Applied { events: Vec<EventPayload> },
    /// Replay of an already applied version; nothing happened.
    Stale { version: u64, last_applied: u64 },
}

#[derive(Debug, Default)]
pub struct ShadowReconciler {
    last_version: Option<u64>,
}

/// A validated desired entry.  `None` fields are left unchanged.
#[derive(Debug, Default)]
struct Desired {
    drive_time_ms: Option<u32>,
    rotation_deg: Option<i32>,
    speed_pct: Option<u8>,
    led: Option<[Option<u32>; 4]>,
}

impl ShadowReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest version applied so far.
    pub fn last_version(&self) -> Option<u64> {
        self.last_version
    }

    /// Forget the applied version, e.g. after a fleet reset.
    pub fn reset(&mut self) {
        self.last_version = None;
    }

    /// Map `doc` onto `registry`.
    ///
    /// For every robot known to both: LED components present in the delta are
    /// applied and a `LedConfigure` is emitted; changed movement fields are
    /// merged, the robot enters `Configuring` and a `MovementConfigure` is
    /// emitted.  A `ClearToMoveRequested` always closes the event list.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::MalformedDocument`] when the delta has no robots map,
    /// a key that is not a 16-digit lowercase hex address, or a value out of
    /// range.  Nothing is applied in that case.
    pub fn apply_delta(
        &mut self,
        registry: &mut FleetRegistry,
        doc: &ShadowDocument,
    ) -> Result<DeltaOutcome, ReconcileError> {
        if let (Some(version), Some(last_applied)) = (doc.version, self.last_version)
            && version <= last_applied
        {
            debug!(version, last_applied, "dropping stale shadow delta");
            return Ok(DeltaOutcome::Stale { version, last_applied });
        }

        let robots = doc
            .desired_robots()
            .ok_or_else(|| ReconcileError::MalformedDocument("no desired robots map".into()))?;
        let desired = validate(robots)?;

        let mut events = Vec::new();
        let addresses: Vec<RobotAddress> = registry.iter().map(|r| r.address).collect();
        for address in addresses {
            let Some(want) = desired.get(&address) else {
                continue;
            };
            if let Err(err) = apply_one(registry, address, want, &mut events) {
                warn!(error = %err, "registry rejected validated delta entry");
            }
        }
        for address in desired.keys().filter(|a| !registry.contains(**a)) {
            debug!(address = %address, "desired state for unknown robot ignored");
        }

        if let Some(version) = doc.version {
            self.last_version = Some(version);
        }
        events.push(EventPayload::ClearToMoveRequested);
        Ok(DeltaOutcome::Applied { events })
    }
}

fn apply_one(
    registry: &mut FleetRegistry,
    address: RobotAddress,
    want: &Desired,
    events: &mut Vec<EventPayload>,
) -> Result<(), RegistryError> {
    let current = registry
        .get(address)
        .map(|r| r.config)
        .ok_or(RegistryError::NotFound(address))?;
    let mut merged = current;

    if let Some([r, g, b, time_ms]) = want.led {
        let led = LedConfig {
            r: r.map_or(current.led.r, |v| v as u8),
            g: g.map_or(current.led.g, |v| v as u8),
            b: b.map_or(current.led.b, |v| v as u8),
            time_ms: time_ms.unwrap_or(current.led.time_ms),
        };
        registry.set_led(address, led)?;
        merged.led = led;
        events.push(EventPayload::LedConfigure { address, led });
    }

    merged.drive_time_ms = want.drive_time_ms.unwrap_or(current.drive_time_ms);
    merged.rotation_deg = want.rotation_deg.unwrap_or(current.rotation_deg);
    merged.speed_pct = want.speed_pct.unwrap_or(current.speed_pct);
    if movement_differs(&merged, &current) {
        registry.begin_configuring(address, merged)?;
        events.push(EventPayload::MovementConfigure { address, config: merged });
    }
    Ok(())
}

fn movement_differs(a: &RobotConfig, b: &RobotConfig) -> bool {
    a.drive_time_ms != b.drive_time_ms || a.rotation_deg != b.rotation_deg || a.speed_pct != b.speed_pct
}

fn validate(robots: &RobotsMap) -> Result<HashMap<RobotAddress, Desired>, ReconcileError> {
    let mut out = HashMap::with_capacity(robots.len());
    for (key, entry) in robots {
        let address = RobotAddress::parse_shadow_key(key)
            .ok_or_else(|| ReconcileError::MalformedDocument(format!("invalid robot key {key:?}")))?;
        if let Some(entry) = entry {
            out.insert(address, validate_entry(key, entry)?);
        }
    }
    Ok(out)
}

fn validate_entry(key: &str, entry: &RobotShadow) -> Result<Desired, ReconcileError> {
    let field = |name: &str, value: i64, lo: i64, hi: i64| {
        if (lo..=hi).contains(&value) {
            Ok(value)
        } else {
            Err(ReconcileError::MalformedDocument(format!(
                "{key}.{name} = {value} is outside {lo}..={hi}"
            )))
        }
    };

    let mut desired = Desired::default();
    if let Some(v) = entry.drive_time_ms {
        desired.drive_time_ms = Some(field("driveTimeMs", v, 0, i64::from(u32::MAX))? as u32);
    }
    if let Some(v) = entry.angle_deg {
        desired.rotation_deg = Some(field("angleDeg", v, i64::from(i32::MIN), i64::from(i32::MAX))? as i32);
    }
    if let Some(v) = entry.speed_pct {
        desired.speed_pct = Some(field("speedPct", v, 0, 100)? as u8);
    }
    if let Some(led) = &entry.led {
        if led.len() > 4 {
            return Err(ReconcileError::MalformedDocument(format!(
                "{key}.led has {} components, expected at most 4",
                led.len()
            )));
        }
        let mut components = [None; 4];
        for (i, component) in led.iter().enumerate() {
            if let Some(v) = component {
                let hi = if i == 3 { i64::from(u32::MAX) } else { 255 };
                components[i] = Some(field("led", *v, 0, hi)? as u32);
            }
        }
        desired.led = Some(components);
    }
    Ok(desired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshfleet_types::RobotState;

    const A: RobotAddress = RobotAddress(1);
    const B: RobotAddress = RobotAddress(2);

    fn fleet() -> FleetRegistry {
        let mut registry = FleetRegistry::new();
        registry.add(A).unwrap();
        registry.add(B).unwrap();
        registry
    }

    fn doc(text: &str) -> ShadowDocument {
        ShadowDocument::parse(text).unwrap()
    }

    fn applied(outcome: DeltaOutcome) -> Vec<EventPayload> {
        match outcome {
            DeltaOutcome::Applied { events } => events,
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    const SCENARIO: &str = r#"{"version":1,"state":{"desired":{"robots":{
        "0000000000000001":{"driveTimeMs":500,"angleDeg":90,"speedPct":50}}}}}"#;

    #[test]
    fn configures_changed_robot_and_barrier_fires_once() {
        let mut registry = fleet();
        let mut reconciler = ShadowReconciler::new();

        let events = applied(reconciler.apply_delta(&mut registry, &doc(SCENARIO)).unwrap());
        let expected = RobotConfig {
            drive_time_ms: 500,
            rotation_deg: 90,
            speed_pct: 50,
            ..RobotConfig::default()
        };
        assert_eq!(
            events,
            vec![
                EventPayload::MovementConfigure { address: A, config: expected },
                EventPayload::ClearToMoveRequested,
            ]
        );
        assert_eq!(registry.get(A).unwrap().state, RobotState::Configuring);
        assert_eq!(registry.get(B).unwrap().state, RobotState::Ready);
        assert!(!registry.barrier_satisfied());
        assert!(!registry.poll_barrier());

        let mut fired = 0;
        for address in [A, B] {
            registry.mark_configured(address).unwrap();
            if registry.poll_barrier() {
                fired += 1;
            }
        }
        assert!(registry.barrier_satisfied());
        assert_eq!(fired, 1);
    }

    #[test]
    fn same_version_twice_is_applied_once() {
        let mut registry = fleet();
        let mut reconciler = ShadowReconciler::new();
        let delta = doc(SCENARIO);

        assert!(matches!(reconciler.apply_delta(&mut registry, &delta), Ok(DeltaOutcome::Applied { .. })));
        registry.mark_configured(A).unwrap();

        let again = reconciler.apply_delta(&mut registry, &delta).unwrap();
        assert_eq!(again, DeltaOutcome::Stale { version: 1, last_applied: 1 });
        assert_eq!(registry.get(A).unwrap().state, RobotState::Configured, "no mutation on replay");
    }

    #[test]
    fn older_version_is_a_no_op() {
        let mut registry = fleet();
        let mut reconciler = ShadowReconciler::new();
        reconciler
            .apply_delta(&mut registry, &doc(r#"{"version":5,"state":{"desired":{"robots":{}}}}"#))
            .unwrap();
        let outcome = reconciler.apply_delta(&mut registry, &doc(SCENARIO)).unwrap();
        assert_eq!(outcome, DeltaOutcome::Stale { version: 1, last_applied: 5 });
        assert_eq!(registry.get(A).unwrap().state, RobotState::Ready);
    }

    #[test]
    fn unchanged_movement_emits_nothing_but_release() {
        let mut registry = fleet();
        let mut reconciler = ShadowReconciler::new();
        reconciler.apply_delta(&mut registry, &doc(SCENARIO)).unwrap();
        registry.mark_configured(A).unwrap();

        let same = SCENARIO.replace("\"version\":1", "\"version\":2");
        let events = applied(reconciler.apply_delta(&mut registry, &doc(&same)).unwrap());
        assert_eq!(events, vec![EventPayload::ClearToMoveRequested]);
        assert_eq!(registry.get(A).unwrap().state, RobotState::Configured);
    }

    #[test]
    fn partial_movement_fields_merge() {
        let mut registry = fleet();
        let mut reconciler = ShadowReconciler::new();
        reconciler.apply_delta(&mut registry, &doc(SCENARIO)).unwrap();

        let events = applied(
            reconciler
                .apply_delta(
                    &mut registry,
                    &doc(r#"{"version":2,"state":{"desired":{"robots":{"0000000000000001":{"speedPct":80}}}}}"#),
                )
                .unwrap(),
        );
        let config = registry.get(A).unwrap().config;
        assert_eq!((config.drive_time_ms, config.rotation_deg, config.speed_pct), (500, 90, 80));
        assert!(matches!(events[0], EventPayload::MovementConfigure { address: A, .. }));
    }

    #[test]
    fn led_components_apply_independently() {
        let mut registry = fleet();
        let mut reconciler = ShadowReconciler::new();
        reconciler
            .apply_delta(
                &mut registry,
                &doc(r#"{"state":{"desired":{"robots":{"0000000000000002":{"led":[10,20,30,400]}}}}}"#),
            )
            .unwrap();
        let events = applied(
            reconciler
                .apply_delta(
                    &mut registry,
                    &doc(r#"{"state":{"desired":{"robots":{"0000000000000002":{"led":[null,99]}}}}}"#),
                )
                .unwrap(),
        );
        let led = LedConfig { r: 10, g: 99, b: 30, time_ms: 400 };
        assert_eq!(
            events,
            vec![
                EventPayload::LedConfigure { address: B, led },
                EventPayload::ClearToMoveRequested,
            ]
        );
        let robot = registry.get(B).unwrap();
        assert_eq!(robot.config.led, led);
        assert_eq!(robot.state, RobotState::Ready, "LED alone does not start configuring");
    }

    #[test]
    fn led_is_emitted_before_movement() {
        let mut registry = fleet();
        let mut reconciler = ShadowReconciler::new();
        let events = applied(
            reconciler
                .apply_delta(
                    &mut registry,
                    &doc(r#"{"state":{"desired":{"robots":{"0000000000000001":{"driveTimeMs":1,"led":[1,1,1,1]}}}}}"#),
                )
                .unwrap(),
        );
        assert!(matches!(events[0], EventPayload::LedConfigure { .. }));
        match &events[1] {
            EventPayload::MovementConfigure { config, .. } => {
                assert_eq!(config.led, LedConfig { r: 1, g: 1, b: 1, time_ms: 1 });
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn events_follow_registry_order() {
        let mut registry = fleet();
        let mut reconciler = ShadowReconciler::new();
        let events = applied(
            reconciler
                .apply_delta(
                    &mut registry,
                    &doc(r#"{"state":{"desired":{"robots":{
                        "0000000000000002":{"driveTimeMs":2},
                        "0000000000000001":{"driveTimeMs":1}}}}}"#),
                )
                .unwrap(),
        );
        let order: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                EventPayload::MovementConfigure { address, .. } => Some(*address),
                _ => None,
            })
            .collect();
        assert_eq!(order, vec![A, B]);
    }

    #[test]
    fn malformed_delta_is_discarded_whole() {
        let mut registry = fleet();
        let mut reconciler = ShadowReconciler::new();
        for text in [
            r#"{"version":7,"state":{"desired":{"robots":{"0000000000000001":{"driveTimeMs":5},"XYZ":{}}}}}"#,
            r#"{"version":7,"state":{"desired":{"robots":{"0000000000000001":{"driveTimeMs":5},"0000000000000002":{"speedPct":101}}}}}"#,
            r#"{"version":7,"state":{"desired":{"robots":{"0000000000000001":{"driveTimeMs":-1}}}}}"#,
            r#"{"version":7,"state":{"desired":{"robots":{"0000000000000001":{"led":[256]}}}}}"#,
            r#"{"version":7,"state":{"desired":{"robots":{"0000000000000001":{"led":[1,2,3,4,5]}}}}}"#,
            r#"{"version":7,"state":{"desired":{}}}"#,
        ] {
            let result = reconciler.apply_delta(&mut registry, &doc(text));
            assert!(matches!(result, Err(ReconcileError::MalformedDocument(_))), "{text}");
        }
        assert_eq!(reconciler.last_version(), None, "version only advances on success");
        assert!(registry.iter().all(|r| r.state == RobotState::Ready));
        assert_eq!(registry.get(A).unwrap().config, RobotConfig::default());
    }

    #[test]
    fn unknown_and_null_entries_are_ignored() {
        let mut registry = fleet();
        let mut reconciler = ShadowReconciler::new();
        let events = applied(
            reconciler
                .apply_delta(
                    &mut registry,
                    &doc(r#"{"version":3,"state":{"desired":{"robots":{
                        "00000000000000ff":{"driveTimeMs":9},
                        "0000000000000001":null}}}}"#),
                )
                .unwrap(),
        );
        assert_eq!(events, vec![EventPayload::ClearToMoveRequested]);
        assert_eq!(reconciler.last_version(), Some(3));
    }

    #[test]
    fn unversioned_delta_applies_without_moving_mark() {
        let mut registry = fleet();
        let mut reconciler = ShadowReconciler::new();
        reconciler
            .apply_delta(&mut registry, &doc(r#"{"version":4,"state":{"robots":{}}}"#))
            .unwrap();
        let events = applied(
            reconciler
                .apply_delta(
                    &mut registry,
                    &doc(r#"{"state":{"robots":{"0000000000000001":{"angleDeg":-30}}}}"#),
                )
                .unwrap(),
        );
        assert_eq!(events.len(), 2);
        assert_eq!(reconciler.last_version(), Some(4));
        assert_eq!(registry.get(A).unwrap().config.rotation_deg, -30);
    }
}
