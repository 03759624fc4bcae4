//! Aggregated device state.
//!
//! The snapshot holds the most recently decoded value of every inbound frame
//! family, each stamped with the bus receive time. Updates replace whole
//! records under the session lock, so readers never observe a partially
//! decoded frame.

use std::time::{Duration, Instant};

use crate::protocol::frame::{
    CapacityEnergy, DcData, GridCurrent, GridVoltage, HighResDc, IoAd, LoadCurrent, LoadPower,
    LoadVoltage, PhaseLabel, PhasePower, ProtectionParams1, ProtectionParams2, ProtectionParams3,
    RxFrame, SystemPower, VersionInfo,
};
use crate::protocol::status::StatusData;

/// A decoded value plus the monotonic bus timestamp of its last update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stamped<T> {
    pub value: T,
    pub timestamp: Instant,
}

impl<T> Stamped<T> {
    pub fn new(value: T, timestamp: Instant) -> Self {
        Stamped { value, timestamp }
    }

    /// Age of this entry relative to `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.timestamp)
    }

    /// True iff the entry was updated within `window` of `now`.
    pub fn is_fresh(&self, now: Instant, window: Duration) -> bool {
        self.age(now) <= window
    }
}

/// Most recent decoded value of every RX frame family.
#[derive(Debug, Clone, Default)]
pub struct PcsSnapshot {
    pub dc: Option<Stamped<DcData>>,
    pub dc_hires: Option<Stamped<HighResDc>>,
    pub capacity_energy: Option<Stamped<CapacityEnergy>>,
    pub status: Option<Stamped<StatusData>>,
    pub grid_voltage: Option<Stamped<GridVoltage>>,
    pub grid_current: Option<Stamped<GridCurrent>>,
    pub system_power: Option<Stamped<SystemPower>>,
    pub load_voltage: Option<Stamped<LoadVoltage>>,
    pub load_current: Option<Stamped<LoadCurrent>>,
    pub load_power: Option<Stamped<LoadPower>>,
    pub io_ad: Option<Stamped<IoAd>>,
    pub phase_a_power: Option<Stamped<PhasePower>>,
    pub phase_b_power: Option<Stamped<PhasePower>>,
    pub phase_c_power: Option<Stamped<PhasePower>>,
    pub arm_version: Option<Stamped<VersionInfo>>,
    pub dsp_version: Option<Stamped<VersionInfo>>,
    pub protection_params1: Option<Stamped<ProtectionParams1>>,
    pub protection_params2: Option<Stamped<ProtectionParams2>>,
    pub protection_params3: Option<Stamped<ProtectionParams3>>,
}

impl PcsSnapshot {
    /// Applies one decoded frame, replacing the matching record atomically.
    /// Reply-style frames carry no periodic state and leave the snapshot
    /// untouched.
    pub fn apply(&mut self, frame: &RxFrame, timestamp: Instant) {
        match frame {
            RxFrame::Dc(v) => self.dc = Some(Stamped::new(*v, timestamp)),
            RxFrame::HighResDc(v) => self.dc_hires = Some(Stamped::new(*v, timestamp)),
            RxFrame::CapacityEnergy(v) => {
                self.capacity_energy = Some(Stamped::new(*v, timestamp))
            }
            RxFrame::Status(v) => self.status = Some(Stamped::new(*v, timestamp)),
            RxFrame::GridVoltage(v) => self.grid_voltage = Some(Stamped::new(*v, timestamp)),
            RxFrame::GridCurrent(v) => self.grid_current = Some(Stamped::new(*v, timestamp)),
            RxFrame::SystemPower(v) => self.system_power = Some(Stamped::new(*v, timestamp)),
            RxFrame::LoadVoltage(v) => self.load_voltage = Some(Stamped::new(*v, timestamp)),
            RxFrame::LoadCurrent(v) => self.load_current = Some(Stamped::new(*v, timestamp)),
            RxFrame::LoadPower(v) => self.load_power = Some(Stamped::new(*v, timestamp)),
            RxFrame::IoAd(v) => self.io_ad = Some(Stamped::new(*v, timestamp)),
            RxFrame::PhasePower(v) => {
                let slot = match v.phase {
                    PhaseLabel::A => &mut self.phase_a_power,
                    PhaseLabel::B => &mut self.phase_b_power,
                    PhaseLabel::C => &mut self.phase_c_power,
                };
                *slot = Some(Stamped::new(*v, timestamp));
            }
            RxFrame::ArmVersion(v) => self.arm_version = Some(Stamped::new(*v, timestamp)),
            RxFrame::DspVersion(v) => self.dsp_version = Some(Stamped::new(*v, timestamp)),
            RxFrame::ProtectionParams1(v) => {
                self.protection_params1 = Some(Stamped::new(*v, timestamp))
            }
            RxFrame::ProtectionParams2(v) => {
                self.protection_params2 = Some(Stamped::new(*v, timestamp))
            }
            RxFrame::ProtectionParams3(v) => {
                self.protection_params3 = Some(Stamped::new(*v, timestamp))
            }
            RxFrame::SetReply { .. } | RxFrame::WorkingMode(_) | RxFrame::ModeParams { .. } => {}
        }
    }
}

/// One snapshot field read through the session accessors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldReading<T> {
    pub value: T,
    pub timestamp: Instant,
    pub fresh: bool,
}

impl<T: Copy> FieldReading<T> {
    pub fn from_stamped(stamped: &Stamped<T>, now: Instant, window: Duration) -> Self {
        FieldReading {
            value: stamped.value,
            timestamp: stamped.timestamp,
            fresh: stamped.is_fresh(now, window),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::DcData;

    #[test]
    fn freshness_tracks_the_window() {
        let t0 = Instant::now();
        let stamped = Stamped::new(1.0f64, t0);
        assert!(stamped.is_fresh(t0, Duration::from_secs(1)));
        assert!(stamped.is_fresh(t0 + Duration::from_millis(900), Duration::from_secs(1)));
        assert!(!stamped.is_fresh(t0 + Duration::from_millis(1100), Duration::from_secs(1)));
    }

    #[test]
    fn apply_replaces_whole_records() {
        let mut snapshot = PcsSnapshot::default();
        let t0 = Instant::now();
        let dc = DcData {
            voltage: 400.0,
            current: -20.0,
            power: -8.0,
            inlet_temperature: 30.0,
        };
        snapshot.apply(&RxFrame::Dc(dc), t0);
        assert_eq!(snapshot.dc.unwrap().value, dc);
        assert!(snapshot.status.is_none());
    }
}
