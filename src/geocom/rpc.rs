//! Remote procedure table.
//!
//! Each supported GeoCom function is described once here: its numeric code, the
//! number of comma separated fields in its reply (return code included) and
//! how long to wait for that reply.
//!
//! | RPC | code | fields | timeout |
//! | --- | ---: | ---: | ---: |
//! | `BAP_SetTargetType` | 17021 | 1 | 1 s |
//! | `BAP_SetPrismType` | 17008 | 1 | 1 s |
//! | `TMC_SetInclineSwitch` | 2006 | 1 | 1 s |
//! | `TMC_SetAtmPpm` | 2148 | 1 | 1 s |
//! | `AUS_SetUserAtrState` | 18005 | 1 | 1 s |
//! | `TMC_SetEdmMode` | 2020 | 1 | 15 s |
//! | `BAP_SetMeasPrg` | 17019 | 1 | 15 s |
//! | `AUT_MakePositioning` | 9027 | 1 | 15 s |
//! | `AUT_FineAdjust` | 9037 | 1 | 15 s |
//! | `TMC_DoMeasure` | 2008 | 1 | 15 s |
//! | `TMC_GetFullMeas` | 2167 | 9 | 15 s |
//! | `TMC_GetAngle1` | 2003 | 10 | 15 s |
//! | `CSV_GetIntTemp` | 5011 | 2 | 4 s |

use std::fmt;
use std::time::Duration;

/// Supported GeoCom functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rpc {
    /// `BAP_SetTargetType`
    SetTargetType,
    /// `BAP_SetPrismType`
    SetPrismType,
    /// `TMC_SetInclineSwitch`
    SetInclineSwitch,
    /// `TMC_SetAtmPpm`
    SetAtmPpm,
    /// `AUS_SetUserAtrState`
    SetUserAtrState,
    /// `TMC_SetEdmMode`
    SetEdmMode,
    /// `BAP_SetMeasPrg`
    SetMeasProgram,
    /// `AUT_MakePositioning`
    MakePositioning,
    /// `AUT_FineAdjust`
    FineAdjust,
    /// `TMC_DoMeasure`
    DoMeasure,
    /// `TMC_GetFullMeas`
    GetFullMeasurement,
    /// `TMC_GetAngle1`
    GetAngle,
    /// `CSV_GetIntTemp`
    GetInternalTemperature,
}

impl Rpc {
    /// Numeric RPC code.
    pub const fn code(self) -> u16 {
        match self {
            Self::SetTargetType => 17021,
            Self::SetPrismType => 17008,
            Self::SetInclineSwitch => 2006,
            Self::SetAtmPpm => 2148,
            Self::SetUserAtrState => 18005,
            Self::SetEdmMode => 2020,
            Self::SetMeasProgram => 17019,
            Self::MakePositioning => 9027,
            Self::FineAdjust => 9037,
            Self::DoMeasure => 2008,
            Self::GetFullMeasurement => 2167,
            Self::GetAngle => 2003,
            Self::GetInternalTemperature => 5011,
        }
    }

    /// Fields in a well-formed reply.
    pub const fn reply_fields(self) -> usize {
        match self {
            Self::GetFullMeasurement => 9,
            Self::GetAngle => 10,
            Self::GetInternalTemperature => 2,
            _ => 1,
        }
    }

    /// How long to wait for the reply.
    pub const fn timeout(self) -> Duration {
        match self {
            Self::SetTargetType
            | Self::SetPrismType
            | Self::SetInclineSwitch
            | Self::SetAtmPpm
            | Self::SetUserAtrState => Duration::from_secs(1),
            Self::GetInternalTemperature => Duration::from_secs(4),
            _ => Duration::from_secs(15),
        }
    }

    /// Request line: `%R1Q,<code>:<args comma joined>\r\n`.
    pub fn request(self, args: &[String]) -> String {
        encode_request(self.code(), args)
    }
}

impl fmt::Display for Rpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

/// Builds a request line for an arbitrary RPC code.
pub fn encode_request(code: u16, args: &[String]) -> String {
    format!("%R1Q,{}:{}\r\n", code, args.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_encoding() {
        assert_eq!(Rpc::GetInternalTemperature.request(&[]), "%R1Q,5011:\r\n");
        assert_eq!(
            Rpc::DoMeasure.request(&["1".to_string(), "1".to_string()]),
            "%R1Q,2008:1,1\r\n"
        );
    }

    #[test]
    fn reply_shapes() {
        assert_eq!(Rpc::GetFullMeasurement.reply_fields(), 9);
        assert_eq!(Rpc::GetAngle.reply_fields(), 10);
        assert_eq!(Rpc::SetPrismType.reply_fields(), 1);
        assert_eq!(Rpc::SetAtmPpm.timeout(), Duration::from_secs(1));
        assert_eq!(Rpc::MakePositioning.timeout(), Duration::from_secs(15));
    }
}
