//! [`FleetRegistry`] – the authoritative set of known robots.
//!
//! The registry is a plain owned value.  Exactly one worker (the fleet
//! module) holds it and mutates it; everything else asks for mutations by
//! sending events to that worker.
//!
//! # Barrier
//!
//! The configured barrier holds iff the registry is non-empty and every robot
//! is [`RobotState::Configured`].  [`FleetRegistry::poll_barrier`] reports
//! only the false→true edge, so the owner broadcasts `ClearToMove` once per
//! transition.  Any mutation that makes the predicate false re-arms the edge.
//!
//! # Revolution rounds
//!
//! Revolution counts are reported in batches.  A round completes when every
//! current member has recorded a count since the last completed round.

use std::collections::HashSet;

use meshfleet_types::{LedConfig, RegistryError, RobotAddress, RobotConfig, RobotState};
use tracing::debug;

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Robot {
    pub address: RobotAddress,
    pub state: RobotState,
    pub config: RobotConfig,
}

impl Robot {
    fn new(address: RobotAddress) -> Self {
        Self {
            address,
            state: RobotState::Ready,
            config: RobotConfig::default(),
        }
    }
}

/// Ordered collection of robots, unique by address.
///
/// Order is insertion order and only matters for report serialisation.
#[derive(Debug, Default)]
pub struct FleetRegistry {
    robots: Vec<Robot>,
    round: HashSet<RobotAddress>,
    barrier_fired: bool,
}

impl FleetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Membership
    // ─────────────────────────────────────────────────────────────────────

    /// Insert a new robot in the `Ready` state.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateAddress`] when `address` is already known.
    pub fn add(&mut self, address: RobotAddress) -> Result<(), RegistryError> {
        if self.contains(address) {
            return Err(RegistryError::DuplicateAddress(address));
        }
        self.robots.push(Robot::new(address));
        self.rearm();
        debug!(address = %address, size = self.robots.len(), "robot added");
        Ok(())
    }

    /// Remove a robot and drop it from the current revolution round.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] when `address` is unknown.
    pub fn remove(&mut self, address: RobotAddress) -> Result<Robot, RegistryError> {
        let idx = self.position(address)?;
        let robot = self.robots.remove(idx);
        self.round.remove(&address);
        self.rearm();
        debug!(address = %address, size = self.robots.len(), "robot removed");
        Ok(robot)
    }

    /// Forget every robot (fleet reset).
    pub fn clear(&mut self) {
        self.robots.clear();
        self.round.clear();
        self.barrier_fired = false;
    }

    pub fn contains(&self, address: RobotAddress) -> bool {
        self.robots.iter().any(|r| r.address == address)
    }

    pub fn get(&self, address: RobotAddress) -> Option<&Robot> {
        self.robots.iter().find(|r| r.address == address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Robot> {
        self.robots.iter()
    }

    pub fn len(&self) -> usize {
        self.robots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Configuration state machine
    // ─────────────────────────────────────────────────────────────────────

    /// Store `config` and move the robot to `Configuring`.
    pub fn begin_configuring(&mut self, address: RobotAddress, config: RobotConfig) -> Result<(), RegistryError> {
        let robot = self.robot_mut(address)?;
        robot.config = config;
        robot.state = RobotState::Configuring;
        self.rearm();
        Ok(())
    }

    /// Replace the LED animation without touching the robot's state.
    pub fn set_led(&mut self, address: RobotAddress, led: LedConfig) -> Result<(), RegistryError> {
        self.robot_mut(address)?.config.led = led;
        Ok(())
    }

    /// Move the robot to `Configured`.
    ///
    /// Accepted from `Configuring` and from `Ready` (a robot that needed no
    /// change); already `Configured` is a no-op.  Returns whether the state
    /// changed.
    pub fn mark_configured(&mut self, address: RobotAddress) -> Result<bool, RegistryError> {
        let robot = self.robot_mut(address)?;
        if robot.state == RobotState::Configured {
            return Ok(false);
        }
        robot.state = RobotState::Configured;
        Ok(true)
    }

    /// Mark every `Ready` robot `Configured`.  Returns how many moved.
    pub fn release_idle(&mut self) -> usize {
        let mut released = 0;
        for robot in self.robots.iter_mut().filter(|r| r.state == RobotState::Ready) {
            robot.state = RobotState::Configured;
            released += 1;
        }
        released
    }

    // ─────────────────────────────────────────────────────────────────────
    // Revolution reporting
    // ─────────────────────────────────────────────────────────────────────

    /// Record the robot's observed revolution count and return it to `Ready`.
    ///
    /// Returns `true` exactly when this update completes a round, i.e. every
    /// current member has reported since the last completed round.  The round
    /// then starts over.
    pub fn record_revolution_count(&mut self, address: RobotAddress, count: i32) -> Result<bool, RegistryError> {
        let robot = self.robot_mut(address)?;
        robot.config.revolutions = count;
        robot.state = RobotState::Ready;
        self.round.insert(address);
        self.rearm();

        let complete = self.robots.iter().all(|r| self.round.contains(&r.address));
        if complete {
            self.round.clear();
        }
        Ok(complete)
    }

    /// Robots that have not yet reported in the current round.
    pub fn pending_round(&self) -> Vec<RobotAddress> {
        self.robots
            .iter()
            .map(|r| r.address)
            .filter(|a| !self.round.contains(a))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Barrier
    // ─────────────────────────────────────────────────────────────────────

    /// `true` iff non-empty and every robot is `Configured`.
    pub fn barrier_satisfied(&self) -> bool {
        !self.robots.is_empty() && self.robots.iter().all(|r| r.state == RobotState::Configured)
    }

    /// `true` only on a false→true transition of [`Self::barrier_satisfied`].
    pub fn poll_barrier(&mut self) -> bool {
        let satisfied = self.barrier_satisfied();
        if !satisfied {
            self.barrier_fired = false;
            return false;
        }
        if self.barrier_fired {
            return false;
        }
        self.barrier_fired = true;
        true
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────

    fn rearm(&mut self) {
        if !self.barrier_satisfied() {
            self.barrier_fired = false;
        }
    }

    fn position(&self, address: RobotAddress) -> Result<usize, RegistryError> {
        self.robots
            .iter()
            .position(|r| r.address == address)
            .ok_or(RegistryError::NotFound(address))
    }

    fn robot_mut(&mut self, address: RobotAddress) -> Result<&mut Robot, RegistryError> {
        self.robots
            .iter_mut()
            .find(|r| r.address == address)
            .ok_or(RegistryError::NotFound(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: RobotAddress = RobotAddress(1);
    const B: RobotAddress = RobotAddress(2);
    const C: RobotAddress = RobotAddress(3);

    fn fleet(addrs: &[RobotAddress]) -> FleetRegistry {
        let mut registry = FleetRegistry::new();
        for addr in addrs {
            registry.add(*addr).unwrap();
        }
        registry
    }

    fn movement(drive_time_ms: u32) -> RobotConfig {
        RobotConfig {
            drive_time_ms,
            rotation_deg: 90,
            speed_pct: 50,
            ..RobotConfig::default()
        }
    }

    #[test]
    fn add_starts_ready_and_rejects_duplicates() {
        let mut registry = fleet(&[A]);
        assert_eq!(registry.get(A).map(|r| r.state), Some(RobotState::Ready));
        assert_eq!(registry.add(A), Err(RegistryError::DuplicateAddress(A)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_unknown_is_not_found() {
        let mut registry = fleet(&[A]);
        assert_eq!(registry.remove(B), Err(RegistryError::NotFound(B)));
        assert_eq!(registry.remove(A).map(|r| r.address), Ok(A));
        assert!(registry.is_empty());
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let registry = fleet(&[C, A, B]);
        let order: Vec<_> = registry.iter().map(|r| r.address).collect();
        assert_eq!(order, vec![C, A, B]);
    }

    #[test]
    fn begin_configuring_stores_config() {
        let mut registry = fleet(&[A]);
        registry.begin_configuring(A, movement(500)).unwrap();
        let robot = registry.get(A).unwrap();
        assert_eq!(robot.state, RobotState::Configuring);
        assert_eq!(robot.config.drive_time_ms, 500);
        assert_eq!(registry.begin_configuring(B, movement(1)), Err(RegistryError::NotFound(B)));
    }

    #[test]
    fn mark_configured_is_idempotent() {
        let mut registry = fleet(&[A]);
        registry.begin_configuring(A, movement(500)).unwrap();
        assert_eq!(registry.mark_configured(A), Ok(true));
        assert_eq!(registry.mark_configured(A), Ok(false));
        assert_eq!(registry.get(A).unwrap().state, RobotState::Configured);
        assert_eq!(registry.mark_configured(B), Err(RegistryError::NotFound(B)));
    }

    #[test]
    fn set_led_keeps_state() {
        let mut registry = fleet(&[A]);
        let led = LedConfig { r: 1, g: 2, b: 3, time_ms: 4 };
        registry.set_led(A, led).unwrap();
        let robot = registry.get(A).unwrap();
        assert_eq!(robot.config.led, led);
        assert_eq!(robot.state, RobotState::Ready);
    }

    #[test]
    fn barrier_predicate() {
        let mut registry = FleetRegistry::new();
        assert!(!registry.barrier_satisfied(), "empty registry never satisfies");

        registry.add(A).unwrap();
        registry.add(B).unwrap();
        assert!(!registry.barrier_satisfied());

        registry.begin_configuring(A, movement(1)).unwrap();
        registry.mark_configured(B).unwrap();
        assert!(!registry.barrier_satisfied(), "A still configuring");

        registry.mark_configured(A).unwrap();
        assert!(registry.barrier_satisfied());
    }

    #[test]
    fn barrier_fires_once_per_transition() {
        let mut registry = fleet(&[A]);
        assert!(!registry.poll_barrier());
        registry.mark_configured(A).unwrap();
        assert!(registry.poll_barrier());
        assert!(!registry.poll_barrier(), "level must not re-fire");

        // A new Ready robot falsifies the predicate and re-arms the edge.
        registry.add(B).unwrap();
        assert!(!registry.barrier_satisfied());
        registry.mark_configured(B).unwrap();
        assert!(registry.poll_barrier());
    }

    #[test]
    fn barrier_rearms_even_without_intermediate_poll() {
        let mut registry = fleet(&[A]);
        registry.mark_configured(A).unwrap();
        assert!(registry.poll_barrier());

        registry.begin_configuring(A, movement(2)).unwrap();
        registry.mark_configured(A).unwrap();
        assert!(registry.poll_barrier());
    }

    #[test]
    fn removing_the_blocker_satisfies_barrier() {
        let mut registry = fleet(&[A, B]);
        registry.mark_configured(A).unwrap();
        assert!(!registry.poll_barrier());
        registry.remove(B).unwrap();
        assert!(registry.poll_barrier());
    }

    #[test]
    fn release_idle_only_touches_ready() {
        let mut registry = fleet(&[A, B]);
        registry.begin_configuring(A, movement(1)).unwrap();
        assert_eq!(registry.release_idle(), 1);
        assert_eq!(registry.get(A).unwrap().state, RobotState::Configuring);
        assert_eq!(registry.get(B).unwrap().state, RobotState::Configured);
    }

    #[test]
    fn revolution_round_completes_when_everyone_reported() {
        let mut registry = fleet(&[A, B]);
        assert_eq!(registry.record_revolution_count(A, 3), Ok(false));
        assert_eq!(registry.pending_round(), vec![B]);
        assert_eq!(registry.record_revolution_count(A, 4), Ok(false), "repeat does not complete");
        assert_eq!(registry.record_revolution_count(B, 5), Ok(true));
        assert!(registry.pending_round().len() == 2, "round restarts");

        assert_eq!(registry.get(A).unwrap().config.revolutions, 4);
        assert_eq!(registry.get(B).unwrap().state, RobotState::Ready);
    }

    #[test]
    fn removal_unblocks_revolution_round() {
        let mut registry = fleet(&[A, B]);
        assert_eq!(registry.record_revolution_count(A, 1), Ok(false));
        registry.remove(B).unwrap();
        assert_eq!(registry.record_revolution_count(A, 2), Ok(true));
        assert_eq!(registry.record_revolution_count(B, 1), Err(RegistryError::NotFound(B)));
    }

    #[test]
    fn revolution_count_rearms_barrier() {
        let mut registry = fleet(&[A]);
        registry.mark_configured(A).unwrap();
        assert!(registry.poll_barrier());
        registry.record_revolution_count(A, 9).unwrap();
        assert!(!registry.barrier_satisfied());
        registry.mark_configured(A).unwrap();
        assert!(registry.poll_barrier());
    }

    #[test]
    fn clear_forgets_everything() {
        let mut registry = fleet(&[A, B]);
        registry.record_revolution_count(A, 1).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.pending_round().is_empty());
        assert!(!registry.poll_barrier());
    }
}
