//! Opcodes and enumerations used on the UART and inside control packets

use crate::codec::CodecError;

/// Outbound UART message opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum UartTxType {
    Hello = 0,
    SessionNonce = 1,
    Heartbeat = 2,
    Status = 3,
    GetMacAddress = 4,
    Control = 10,
    HubDataReply = 11,
}

impl From<UartTxType> for u16 {
    fn from(value: UartTxType) -> Self {
        value as u16
    }
}

/// Inbound UART message opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartRxType {
    Hello,
    SessionNonce,
    Heartbeat,
    Status,
    MacAddress,
    ResultPacket,
    Log,
    LogArray,
    MeshResult,
    MeshAckAllResult,
    Unknown(u16),
}

impl From<u16> for UartRxType {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Hello,
            1 => Self::SessionNonce,
            2 => Self::Heartbeat,
            3 => Self::Status,
            4 => Self::MacAddress,
            10 => Self::ResultPacket,
            10000 => Self::Log,
            10001 => Self::LogArray,
            10102 => Self::MeshResult,
            10103 => Self::MeshAckAllResult,
            other => Self::Unknown(other),
        }
    }
}

impl From<UartRxType> for u16 {
    fn from(value: UartRxType) -> Self {
        match value {
            UartRxType::Hello => 0,
            UartRxType::SessionNonce => 1,
            UartRxType::Heartbeat => 2,
            UartRxType::Status => 3,
            UartRxType::MacAddress => 4,
            UartRxType::ResultPacket => 10,
            UartRxType::Log => 10000,
            UartRxType::LogArray => 10001,
            UartRxType::MeshResult => 10102,
            UartRxType::MeshAckAllResult => 10103,
            UartRxType::Unknown(other) => other,
        }
    }
}

/// Control command types understood by the gateway firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ControlType {
    Setup = 0,
    FactoryReset = 1,
    GetState = 2,
    SetState = 3,
    SetIBeaconConfigId = 6,
    Reset = 10,
    NoOperation = 12,
    Switch = 20,
    MultiSwitch = 21,
    SetTime = 30,
    MeshCommand = 33,
    MicroappGetInfo = 90,
    MicroappUpload = 91,
    MicroappValidate = 92,
    MicroappRemove = 93,
    MicroappEnable = 94,
    MicroappDisable = 95,
}

impl From<ControlType> for u16 {
    fn from(value: ControlType) -> Self {
        value as u16
    }
}

impl TryFrom<u16> for ControlType {
    type Error = CodecError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let control = match value {
            0 => Self::Setup,
            1 => Self::FactoryReset,
            2 => Self::GetState,
            3 => Self::SetState,
            6 => Self::SetIBeaconConfigId,
            10 => Self::Reset,
            12 => Self::NoOperation,
            20 => Self::Switch,
            21 => Self::MultiSwitch,
            30 => Self::SetTime,
            33 => Self::MeshCommand,
            90 => Self::MicroappGetInfo,
            91 => Self::MicroappUpload,
            92 => Self::MicroappValidate,
            93 => Self::MicroappRemove,
            94 => Self::MicroappEnable,
            95 => Self::MicroappDisable,
            other => return Err(CodecError::UnknownValue { kind: "control type", value: other }),
        };
        Ok(control)
    }
}

/// State variables that can be written with a set-state control packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum StateType {
    IBeaconMajor = 4,
    IBeaconMinor = 5,
    IBeaconUuid = 6,
}

impl From<StateType> for u16 {
    fn from(value: StateType) -> Self {
        value as u16
    }
}

/// Result codes reported by the gateway and by mesh nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultValue {
    Success,
    WaitForSuccess,
    SuccessNoChange,
    BufferUnassigned,
    BufferLocked,
    BufferTooSmall,
    NotAligned,
    WrongPayloadLength,
    WrongParameter,
    InvalidMessage,
    UnknownOpCode,
    UnknownType,
    NotFound,
    NoSpace,
    Busy,
    WrongState,
    AlreadyExists,
    Timeout,
    Canceled,
    ProtocolUnsupported,
    Mismatch,
    NoAccess,
    Unspecified,
    Other(u16),
}

impl ResultValue {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl From<u16> for ResultValue {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Success,
            1 => Self::WaitForSuccess,
            2 => Self::SuccessNoChange,
            16 => Self::BufferUnassigned,
            17 => Self::BufferLocked,
            18 => Self::BufferTooSmall,
            19 => Self::NotAligned,
            32 => Self::WrongPayloadLength,
            33 => Self::WrongParameter,
            34 => Self::InvalidMessage,
            35 => Self::UnknownOpCode,
            36 => Self::UnknownType,
            37 => Self::NotFound,
            38 => Self::NoSpace,
            39 => Self::Busy,
            40 => Self::WrongState,
            41 => Self::AlreadyExists,
            42 => Self::Timeout,
            43 => Self::Canceled,
            44 => Self::ProtocolUnsupported,
            45 => Self::Mismatch,
            48 => Self::NoAccess,
            65535 => Self::Unspecified,
            other => Self::Other(other),
        }
    }
}

impl From<ResultValue> for u16 {
    fn from(value: ResultValue) -> Self {
        match value {
            ResultValue::Success => 0,
            ResultValue::WaitForSuccess => 1,
            ResultValue::SuccessNoChange => 2,
            ResultValue::BufferUnassigned => 16,
            ResultValue::BufferLocked => 17,
            ResultValue::BufferTooSmall => 18,
            ResultValue::NotAligned => 19,
            ResultValue::WrongPayloadLength => 32,
            ResultValue::WrongParameter => 33,
            ResultValue::InvalidMessage => 34,
            ResultValue::UnknownOpCode => 35,
            ResultValue::UnknownType => 36,
            ResultValue::NotFound => 37,
            ResultValue::NoSpace => 38,
            ResultValue::Busy => 39,
            ResultValue::WrongState => 40,
            ResultValue::AlreadyExists => 41,
            ResultValue::Timeout => 42,
            ResultValue::Canceled => 43,
            ResultValue::ProtocolUnsupported => 44,
            ResultValue::Mismatch => 45,
            ResultValue::NoAccess => 48,
            ResultValue::Unspecified => 65535,
            ResultValue::Other(other) => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_value_codes() {
        assert_eq!(ResultValue::from(39), ResultValue::Busy);
        assert_eq!(u16::from(ResultValue::Busy), 39);
        assert_eq!(ResultValue::from(1234), ResultValue::Other(1234));
        assert!(ResultValue::Success.is_success());
        assert!(!ResultValue::SuccessNoChange.is_success());
    }

    #[test]
    fn test_rx_types() {
        assert_eq!(UartRxType::from(10102), UartRxType::MeshResult);
        assert_eq!(UartRxType::from(7), UartRxType::Unknown(7));
        assert_eq!(u16::from(UartRxType::MeshAckAllResult), 10103);
    }

    #[test]
    fn test_control_type_lookup() {
        assert_eq!(ControlType::try_from(33).unwrap(), ControlType::MeshCommand);
        assert!(ControlType::try_from(999).is_err());
    }
}
