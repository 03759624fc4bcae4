//! Working-mode table and typed setpoints.
//!
//! Each mode is a tagged setpoint record carrying engineering values. The
//! per-parameter divisors convert engineering units to the raw 32-bit wire
//! integers (round-to-nearest on encode, exact division on decode).
//!
//! Unknown mode codes are carried through decode as raw parameters but are
//! refused by the encoders.

use serde::{Deserialize, Serialize};

use crate::error::PcsError;

/// Description of one mode parameter: display name, unit, raw divisor, and
/// whether the wire integer is interpreted as signed.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub unit: &'static str,
    pub divisor: f64,
    pub signed: bool,
}

const fn p(name: &'static str, unit: &'static str, divisor: f64, signed: bool) -> ParamSpec {
    ParamSpec { name, unit, divisor, signed }
}

const MILLI: f64 = 1000.0;
const CENTI: f64 = 100.0;
const DECI: f64 = 10.0;

static SPECS_CV: [ParamSpec; 1] = [p("voltage_setpoint", "V", MILLI, false)];
static SPECS_CV_LIMITED: [ParamSpec; 3] = [
    p("voltage_setpoint", "V", MILLI, false),
    p("max_charge_current", "A", MILLI, false),
    p("max_discharge_current", "A", MILLI, false),
];
static SPECS_CC: [ParamSpec; 1] = [p("current_setpoint", "A", MILLI, true)];
static SPECS_CP: [ParamSpec; 1] = [p("power_setpoint", "W", MILLI, true)];
static SPECS_CR: [ParamSpec; 1] = [p("resistance_setpoint", "ohm", MILLI, false)];
static SPECS_RAMP_CURRENT: [ParamSpec; 3] = [
    p("start_current", "A", MILLI, true),
    p("end_current", "A", MILLI, true),
    p("cycle_time", "s", MILLI, false),
];
static SPECS_RAMP_POWER: [ParamSpec; 3] = [
    p("start_power", "W", MILLI, true),
    p("end_power", "W", MILLI, true),
    p("cycle_time", "s", MILLI, false),
];
static SPECS_MAGNIFICATION: [ParamSpec; 1] = [p("magnification", "", MILLI, false)];
static SPECS_RAMP_VOLTAGE: [ParamSpec; 3] = [
    p("start_voltage", "V", MILLI, false),
    p("end_voltage", "V", MILLI, false),
    p("cycle_time", "s", MILLI, false),
];
static SPECS_PULSE_CURRENT: [ParamSpec; 4] = [
    p("current_1", "A", MILLI, true),
    p("current_2", "A", MILLI, true),
    p("cycle_time", "s", CENTI, false),
    p("duty_cycle", "%", CENTI, false),
];
static SPECS_CC_CV: [ParamSpec; 3] = [
    p("voltage_setpoint", "V", MILLI, false),
    p("current_setpoint", "A", MILLI, true),
    p("end_current", "A", MILLI, false),
];
static SPECS_PULSE_RESISTANCE: [ParamSpec; 4] = [
    p("resistance_1", "ohm", MILLI, false),
    p("resistance_2", "ohm", MILLI, false),
    p("cycle_time", "s", CENTI, false),
    p("duty_cycle", "%", CENTI, false),
];
static SPECS_PULSE_POWER: [ParamSpec; 4] = [
    p("power_1", "W", MILLI, true),
    p("power_2", "W", MILLI, true),
    p("cycle_time", "s", CENTI, false),
    p("duty_cycle", "%", CENTI, false),
];
static SPECS_INTERNAL_RESISTANCE: [ParamSpec; 4] = [
    p("current_setpoint", "A", MILLI, true),
    p("time_1", "s", MILLI, false),
    p("time_2", "s", MILLI, false),
    p("time_3", "s", MILLI, false),
];
static SPECS_AC_CP: [ParamSpec; 2] = [
    p("active_power", "W", MILLI, true),
    p("reactive_power", "var", MILLI, true),
];
static SPECS_INVERTER: [ParamSpec; 2] = [
    p("inverter_voltage", "V", DECI, false),
    p("inverter_frequency", "Hz", CENTI, false),
];
static SPECS_PULSE_VOLTAGE: [ParamSpec; 4] = [
    p("voltage_1", "V", MILLI, false),
    p("voltage_2", "V", MILLI, false),
    p("cycle_time", "s", CENTI, false),
    p("duty_cycle", "%", CENTI, false),
];

/// Typed working-mode setpoint. Negative DC current/power means charging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ModeSetpoint {
    /// 0x02: hold the DC output voltage.
    DcConstantVoltage { voltage: f64 },
    /// 0x08: constant voltage with charge/discharge current ceilings.
    DcCvCurrentLimited {
        voltage: f64,
        max_charge_current: f64,
        max_discharge_current: f64,
    },
    /// 0x21: hold the DC current (signed; negative charges the battery).
    DcConstantCurrent { current: f64 },
    /// 0x22: hold the DC power (signed; negative charges the battery).
    DcConstantPower { power: f64 },
    /// 0x23: hold a constant resistance load.
    DcConstantResistance { resistance: f64 },
    /// 0x24: ramp the current between two setpoints over a cycle.
    DcRampCurrent {
        start_current: f64,
        end_current: f64,
        cycle_time: f64,
    },
    /// 0x25: ramp the power between two setpoints over a cycle.
    DcRampPower {
        start_power: f64,
        end_power: f64,
        cycle_time: f64,
    },
    /// 0x26: constant magnification.
    DcConstantMagnification { magnification: f64 },
    /// 0x27: ramp the voltage between two setpoints over a cycle.
    DcRampVoltage {
        start_voltage: f64,
        end_voltage: f64,
        cycle_time: f64,
    },
    /// 0x28: alternate between two currents with a duty cycle.
    DcPulseCurrent {
        current_1: f64,
        current_2: f64,
        cycle_time: f64,
        duty_cycle: f64,
    },
    /// 0x29: constant current, then constant voltage, terminated at the
    /// end-of-charge current.
    DcCcCv {
        voltage: f64,
        current: f64,
        end_current: f64,
    },
    /// 0x2A: alternate between two resistances with a duty cycle.
    DcPulseResistance {
        resistance_1: f64,
        resistance_2: f64,
        cycle_time: f64,
        duty_cycle: f64,
    },
    /// 0x2B: alternate between two powers with a duty cycle.
    DcPulsePower {
        power_1: f64,
        power_2: f64,
        cycle_time: f64,
        duty_cycle: f64,
    },
    /// 0x2C: internal resistance test profile.
    DcInternalResistanceTest {
        current: f64,
        time_1: f64,
        time_2: f64,
        time_3: f64,
    },
    /// 0x40: grid-tied active/reactive power (signed; negative charges).
    AcConstantPower {
        active_power: f64,
        reactive_power: f64,
    },
    /// 0x41: stand-alone inverter output.
    IndependentInverter { voltage: f64, frequency: f64 },
    /// 0x61: alternate between two voltages with a duty cycle.
    DcPulseVoltage {
        voltage_1: f64,
        voltage_2: f64,
        cycle_time: f64,
        duty_cycle: f64,
    },
    /// 0x91: idle.
    Idle,
    /// 0x94: standby.
    Standby,
    /// Unrecognized mode code; raw parameters preserved, refused on encode.
    Unknown { code: u16, raw: [i32; 4] },
}

impl ModeSetpoint {
    /// Wire code of this mode.
    pub fn code(&self) -> u16 {
        match self {
            ModeSetpoint::DcConstantVoltage { .. } => 0x02,
            ModeSetpoint::DcCvCurrentLimited { .. } => 0x08,
            ModeSetpoint::DcConstantCurrent { .. } => 0x21,
            ModeSetpoint::DcConstantPower { .. } => 0x22,
            ModeSetpoint::DcConstantResistance { .. } => 0x23,
            ModeSetpoint::DcRampCurrent { .. } => 0x24,
            ModeSetpoint::DcRampPower { .. } => 0x25,
            ModeSetpoint::DcConstantMagnification { .. } => 0x26,
            ModeSetpoint::DcRampVoltage { .. } => 0x27,
            ModeSetpoint::DcPulseCurrent { .. } => 0x28,
            ModeSetpoint::DcCcCv { .. } => 0x29,
            ModeSetpoint::DcPulseResistance { .. } => 0x2A,
            ModeSetpoint::DcPulsePower { .. } => 0x2B,
            ModeSetpoint::DcInternalResistanceTest { .. } => 0x2C,
            ModeSetpoint::AcConstantPower { .. } => 0x40,
            ModeSetpoint::IndependentInverter { .. } => 0x41,
            ModeSetpoint::DcPulseVoltage { .. } => 0x61,
            ModeSetpoint::Idle => 0x91,
            ModeSetpoint::Standby => 0x94,
            ModeSetpoint::Unknown { code, .. } => *code,
        }
    }

    /// Human-readable mode name.
    pub fn name(&self) -> &'static str {
        match self {
            ModeSetpoint::DcConstantVoltage { .. } => "DC constant voltage",
            ModeSetpoint::DcCvCurrentLimited { .. } => "DC constant voltage, current limited",
            ModeSetpoint::DcConstantCurrent { .. } => "DC constant current",
            ModeSetpoint::DcConstantPower { .. } => "DC constant power",
            ModeSetpoint::DcConstantResistance { .. } => "DC constant resistance",
            ModeSetpoint::DcRampCurrent { .. } => "DC ramp current",
            ModeSetpoint::DcRampPower { .. } => "DC ramp power",
            ModeSetpoint::DcConstantMagnification { .. } => "DC constant magnification",
            ModeSetpoint::DcRampVoltage { .. } => "DC ramp voltage",
            ModeSetpoint::DcPulseCurrent { .. } => "DC pulse current",
            ModeSetpoint::DcCcCv { .. } => "DC CC-CV",
            ModeSetpoint::DcPulseResistance { .. } => "DC pulse resistance",
            ModeSetpoint::DcPulsePower { .. } => "DC pulse power",
            ModeSetpoint::DcInternalResistanceTest { .. } => "DC internal resistance test",
            ModeSetpoint::AcConstantPower { .. } => "AC constant power",
            ModeSetpoint::IndependentInverter { .. } => "independent inverter",
            ModeSetpoint::DcPulseVoltage { .. } => "DC pulse voltage",
            ModeSetpoint::Idle => "idle",
            ModeSetpoint::Standby => "standby",
            ModeSetpoint::Unknown { .. } => "unknown",
        }
    }

    /// Parameter descriptors for a mode code; `None` for unknown codes.
    pub fn param_specs(code: u16) -> Option<&'static [ParamSpec]> {
        let specs: &'static [ParamSpec] = match code {
            0x02 => &SPECS_CV,
            0x08 => &SPECS_CV_LIMITED,
            0x21 => &SPECS_CC,
            0x22 => &SPECS_CP,
            0x23 => &SPECS_CR,
            0x24 => &SPECS_RAMP_CURRENT,
            0x25 => &SPECS_RAMP_POWER,
            0x26 => &SPECS_MAGNIFICATION,
            0x27 => &SPECS_RAMP_VOLTAGE,
            0x28 => &SPECS_PULSE_CURRENT,
            0x29 => &SPECS_CC_CV,
            0x2A => &SPECS_PULSE_RESISTANCE,
            0x2B => &SPECS_PULSE_POWER,
            0x2C => &SPECS_INTERNAL_RESISTANCE,
            0x40 => &SPECS_AC_CP,
            0x41 => &SPECS_INVERTER,
            0x61 => &SPECS_PULSE_VOLTAGE,
            0x91 | 0x94 => &[],
            _ => return None,
        };
        Some(specs)
    }

    /// Engineering parameter values in wire order.
    pub fn params(&self) -> Vec<f64> {
        match *self {
            ModeSetpoint::DcConstantVoltage { voltage } => vec![voltage],
            ModeSetpoint::DcCvCurrentLimited {
                voltage,
                max_charge_current,
                max_discharge_current,
            } => vec![voltage, max_charge_current, max_discharge_current],
            ModeSetpoint::DcConstantCurrent { current } => vec![current],
            ModeSetpoint::DcConstantPower { power } => vec![power],
            ModeSetpoint::DcConstantResistance { resistance } => vec![resistance],
            ModeSetpoint::DcRampCurrent {
                start_current,
                end_current,
                cycle_time,
            } => vec![start_current, end_current, cycle_time],
            ModeSetpoint::DcRampPower {
                start_power,
                end_power,
                cycle_time,
            } => vec![start_power, end_power, cycle_time],
            ModeSetpoint::DcConstantMagnification { magnification } => vec![magnification],
            ModeSetpoint::DcRampVoltage {
                start_voltage,
                end_voltage,
                cycle_time,
            } => vec![start_voltage, end_voltage, cycle_time],
            ModeSetpoint::DcPulseCurrent {
                current_1,
                current_2,
                cycle_time,
                duty_cycle,
            } => vec![current_1, current_2, cycle_time, duty_cycle],
            ModeSetpoint::DcCcCv {
                voltage,
                current,
                end_current,
            } => vec![voltage, current, end_current],
            ModeSetpoint::DcPulseResistance {
                resistance_1,
                resistance_2,
                cycle_time,
                duty_cycle,
            } => vec![resistance_1, resistance_2, cycle_time, duty_cycle],
            ModeSetpoint::DcPulsePower {
                power_1,
                power_2,
                cycle_time,
                duty_cycle,
            } => vec![power_1, power_2, cycle_time, duty_cycle],
            ModeSetpoint::DcInternalResistanceTest {
                current,
                time_1,
                time_2,
                time_3,
            } => vec![current, time_1, time_2, time_3],
            ModeSetpoint::AcConstantPower {
                active_power,
                reactive_power,
            } => vec![active_power, reactive_power],
            ModeSetpoint::IndependentInverter { voltage, frequency } => vec![voltage, frequency],
            ModeSetpoint::DcPulseVoltage {
                voltage_1,
                voltage_2,
                cycle_time,
                duty_cycle,
            } => vec![voltage_1, voltage_2, cycle_time, duty_cycle],
            ModeSetpoint::Idle | ModeSetpoint::Standby => Vec::new(),
            ModeSetpoint::Unknown { .. } => Vec::new(),
        }
    }

    /// Raw wire parameters after scaling, range-checked per parameter.
    /// Unused trailing slots are zero. Unknown modes are refused.
    pub fn raw_params(&self) -> Result<[i32; 4], PcsError> {
        let code = self.code();
        let specs = Self::param_specs(code).ok_or(PcsError::UnknownMode(code))?;
        if matches!(self, ModeSetpoint::Unknown { .. }) {
            return Err(PcsError::UnknownMode(code));
        }
        let values = self.params();
        let mut raw = [0i32; 4];
        for (i, (spec, value)) in specs.iter().zip(values.iter()).enumerate() {
            let scaled = (value * spec.divisor).round();
            let low = if spec.signed { i32::MIN as f64 } else { 0.0 };
            if !scaled.is_finite() || scaled < low || scaled > i32::MAX as f64 {
                return Err(PcsError::OutOfRange {
                    pf: 0x0B,
                    field: spec.name,
                });
            }
            raw[i] = scaled as i32;
        }
        Ok(raw)
    }

    /// Rebuilds a setpoint from a mode code and raw wire parameters.
    /// Unknown codes are preserved verbatim.
    pub fn from_raw(code: u16, raw: [i32; 4]) -> Self {
        let specs = match Self::param_specs(code) {
            Some(specs) => specs,
            None => return ModeSetpoint::Unknown { code, raw },
        };
        let mut v = [0.0f64; 4];
        for (i, spec) in specs.iter().enumerate() {
            v[i] = raw[i] as f64 / spec.divisor;
        }
        match code {
            0x02 => ModeSetpoint::DcConstantVoltage { voltage: v[0] },
            0x08 => ModeSetpoint::DcCvCurrentLimited {
                voltage: v[0],
                max_charge_current: v[1],
                max_discharge_current: v[2],
            },
            0x21 => ModeSetpoint::DcConstantCurrent { current: v[0] },
            0x22 => ModeSetpoint::DcConstantPower { power: v[0] },
            0x23 => ModeSetpoint::DcConstantResistance { resistance: v[0] },
            0x24 => ModeSetpoint::DcRampCurrent {
                start_current: v[0],
                end_current: v[1],
                cycle_time: v[2],
            },
            0x25 => ModeSetpoint::DcRampPower {
                start_power: v[0],
                end_power: v[1],
                cycle_time: v[2],
            },
            0x26 => ModeSetpoint::DcConstantMagnification { magnification: v[0] },
            0x27 => ModeSetpoint::DcRampVoltage {
                start_voltage: v[0],
                end_voltage: v[1],
                cycle_time: v[2],
            },
            0x28 => ModeSetpoint::DcPulseCurrent {
                current_1: v[0],
                current_2: v[1],
                cycle_time: v[2],
                duty_cycle: v[3],
            },
            0x29 => ModeSetpoint::DcCcCv {
                voltage: v[0],
                current: v[1],
                end_current: v[2],
            },
            0x2A => ModeSetpoint::DcPulseResistance {
                resistance_1: v[0],
                resistance_2: v[1],
                cycle_time: v[2],
                duty_cycle: v[3],
            },
            0x2B => ModeSetpoint::DcPulsePower {
                power_1: v[0],
                power_2: v[1],
                cycle_time: v[2],
                duty_cycle: v[3],
            },
            0x2C => ModeSetpoint::DcInternalResistanceTest {
                current: v[0],
                time_1: v[1],
                time_2: v[2],
                time_3: v[3],
            },
            0x40 => ModeSetpoint::AcConstantPower {
                active_power: v[0],
                reactive_power: v[1],
            },
            0x41 => ModeSetpoint::IndependentInverter {
                voltage: v[0],
                frequency: v[1],
            },
            0x61 => ModeSetpoint::DcPulseVoltage {
                voltage_1: v[0],
                voltage_2: v[1],
                cycle_time: v[2],
                duty_cycle: v[3],
            },
            0x91 => ModeSetpoint::Idle,
            0x94 => ModeSetpoint::Standby,
            _ => ModeSetpoint::Unknown { code, raw },
        }
    }

    /// All mode codes with an encoder, in wire order.
    pub const KNOWN_CODES: [u16; 19] = [
        0x02, 0x08, 0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27, 0x28, 0x29, 0x2A, 0x2B, 0x2C, 0x40,
        0x41, 0x61, 0x91, 0x94,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_code_has_param_specs() {
        for code in ModeSetpoint::KNOWN_CODES {
            assert!(ModeSetpoint::param_specs(code).is_some(), "code 0x{code:02X}");
        }
        assert!(ModeSetpoint::param_specs(0x55).is_none());
    }

    #[test]
    fn raw_params_round_to_nearest() {
        let sp = ModeSetpoint::DcConstantVoltage { voltage: 400.0 };
        assert_eq!(sp.raw_params().unwrap(), [400_000, 0, 0, 0]);

        let sp = ModeSetpoint::DcConstantCurrent { current: -50.0 };
        assert_eq!(sp.raw_params().unwrap(), [-50_000, 0, 0, 0]);
    }

    #[test]
    fn unsigned_param_refuses_negative_value() {
        let sp = ModeSetpoint::DcConstantVoltage { voltage: -1.0 };
        assert!(matches!(
            sp.raw_params(),
            Err(PcsError::OutOfRange { pf: 0x0B, .. })
        ));
    }

    #[test]
    fn inverter_mode_uses_coarse_scales() {
        let sp = ModeSetpoint::IndependentInverter {
            voltage: 230.0,
            frequency: 50.0,
        };
        assert_eq!(sp.raw_params().unwrap(), [2300, 5000, 0, 0]);
    }

    #[test]
    fn unknown_code_survives_from_raw_and_refuses_encode() {
        let sp = ModeSetpoint::from_raw(0x55, [1, 2, 3, 4]);
        assert_eq!(
            sp,
            ModeSetpoint::Unknown {
                code: 0x55,
                raw: [1, 2, 3, 4]
            }
        );
        assert!(matches!(sp.raw_params(), Err(PcsError::UnknownMode(0x55))));
    }
}
