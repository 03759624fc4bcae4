//! Running states and fault codes reported in the periodic status frame
//! (PF=0x13).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// 16-bit running state of the PCS power stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunningState {
    LongPause,
    ShortStop,
    LongIdle,
    ShortIdle,
    Stop,
    Fault,
    AcConstantPower,
    PowerFailure,
    SelfCheck,
    SoftStart,
    ConstantVoltage,
    ConstantCurrent,
    Standby,
    OffGridInverter,
    /// State code outside the documented table.
    Unknown(u16),
}

impl RunningState {
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => RunningState::LongPause,
            2 => RunningState::ShortStop,
            3 => RunningState::LongIdle,
            4 => RunningState::ShortIdle,
            5 => RunningState::Stop,
            6 => RunningState::Fault,
            7 => RunningState::AcConstantPower,
            8 => RunningState::PowerFailure,
            9 => RunningState::SelfCheck,
            10 => RunningState::SoftStart,
            11 => RunningState::ConstantVoltage,
            12 => RunningState::ConstantCurrent,
            13 => RunningState::Standby,
            14 => RunningState::OffGridInverter,
            other => RunningState::Unknown(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            RunningState::LongPause => 1,
            RunningState::ShortStop => 2,
            RunningState::LongIdle => 3,
            RunningState::ShortIdle => 4,
            RunningState::Stop => 5,
            RunningState::Fault => 6,
            RunningState::AcConstantPower => 7,
            RunningState::PowerFailure => 8,
            RunningState::SelfCheck => 9,
            RunningState::SoftStart => 10,
            RunningState::ConstantVoltage => 11,
            RunningState::ConstantCurrent => 12,
            RunningState::Standby => 13,
            RunningState::OffGridInverter => 14,
            RunningState::Unknown(code) => *code,
        }
    }

    /// The power stage is delivering or absorbing energy (or ramping up to).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunningState::SoftStart
                | RunningState::ConstantVoltage
                | RunningState::ConstantCurrent
                | RunningState::AcConstantPower
                | RunningState::OffGridInverter
        )
    }

    /// The power stage is shut down; mode changes are permitted here.
    pub fn is_stopped(&self) -> bool {
        matches!(
            self,
            RunningState::LongPause
                | RunningState::ShortStop
                | RunningState::LongIdle
                | RunningState::ShortIdle
                | RunningState::Stop
                | RunningState::Standby
        )
    }
}

/// Decoded periodic status (PF=0x13).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusData {
    pub running_state: u16,
    pub fault_code: u16,
}

impl StatusData {
    pub fn state(&self) -> RunningState {
        RunningState::from_code(self.running_state)
    }

    pub fn is_fault(&self) -> bool {
        self.state() == RunningState::Fault || self.fault_code != 0
    }

    pub fn fault_description(&self) -> String {
        fault_description(self.fault_code)
    }
}

/// Documented fault codes (protocol appendix 2).
static FAULT_CODES: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (0x800D, "CAN1 communication failure"),
        (0x800E, "CAN2 communication failure"),
        (0x800F, "485-1 communication failure"),
        (0x8010, "485-2 communication failure"),
        (0x8011, "DSP soft start timeout"),
        (0x8012, "Emergency stop button pressed"),
        (0x8013, "Gun head temperature exceeds limit"),
        (0x8014, "Detection point 1 voltage abnormality"),
        (0x8015, "Network disconnection"),
        // Battery / DC side faults
        (1, "Battery voltage too high / over limit"),
        (2, "Battery voltage low / over limit"),
        (3, "Battery reverse connection"),
        (4, "Current over limit"),
        (5, "Overtemperature fault (>90C)"),
        (6, "Soft start timeout (>10s)"),
        (15, "Overcurrent count exceeds limit"),
        (16, "Overvoltage count exceeds limit"),
        (17, "Power limit exceeded"),
        (18, "Emergency stop button pressed"),
        (26, "Slave failure"),
        // AC / grid side faults
        (257, "High grid voltage fault (>264V)"),
        (258, "Low grid voltage fault (<176V)"),
        (265, "Input voltage negative phase sequence"),
        (280, "Radiator temperature high fault (>90C)"),
    ])
});

/// Human-readable description of a fault code.
pub fn fault_description(code: u16) -> String {
    if code == 0 {
        return "No fault".to_string();
    }
    match FAULT_CODES.get(&code) {
        Some(text) => (*text).to_string(),
        None => format!("Internal failure (code 0x{code:04X}) - contact factory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes_round_trip() {
        for code in 0..=20u16 {
            assert_eq!(RunningState::from_code(code).code(), code);
        }
    }

    #[test]
    fn can1_fault_is_documented() {
        assert!(fault_description(0x800D).contains("CAN1"));
        assert_eq!(fault_description(0), "No fault");
        assert!(fault_description(0x7777).contains("contact factory"));
    }

    #[test]
    fn stopped_and_active_are_disjoint() {
        for code in 0..=20u16 {
            let state = RunningState::from_code(code);
            assert!(!(state.is_active() && state.is_stopped()), "code {code}");
        }
    }
}
