//! YSTECH PCS application protocol: identifier layout, working modes,
//! running states, and the frame codec.

pub mod frame;
pub mod id;
pub mod mode;
pub mod status;

pub use frame::{
    decode_rx_frame, pf_name, CapacityEnergy, DcData, DeviceTime, GridCurrent, GridVoltage,
    HeartbeatData, HighResDc, IoAd, LoadCurrent, LoadPower, LoadVoltage, PhaseLabel, PhasePower,
    ProtectionPage, ProtectionParams1, ProtectionParams2, ProtectionParams3, RxFrame, SystemPower,
    VersionInfo,
};
pub use frame::{ControlAction, ControlFlags};
pub use id::CanId;
pub use mode::ModeSetpoint;
pub use status::{fault_description, RunningState, StatusData};
