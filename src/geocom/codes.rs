//! Closed GeoCom enumerations with their wire encodings.
//!
//! Every enumeration converts to its integer code for encoding and from an
//! integer with `TryFrom`, which rejects codes the protocol does not define.

use crate::error::SetupError;

/// Defines a field-less enum with explicit wire codes and generates:
/// - `code()` returning the wire integer
/// - `name()` returning the protocol's constant name
/// - `TryFrom<i64>` rejecting unknown codes with [`SetupError::UnknownCode`]
/// - `Display` writing the wire integer, as used in request arguments
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal => $wire_name:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// All variants, in code order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Integer sent on the wire.
            pub const fn code(self) -> i32 {
                match self {
                    $( $name::$variant => $code, )+
                }
            }

            /// Constant name used in the GeoCom reference.
            pub const fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $wire_name, )+
                }
            }
        }

        impl ::std::convert::TryFrom<i64> for $name {
            type Error = SetupError;

            fn try_from(code: i64) -> Result<Self, SetupError> {
                match code {
                    $( $code => Ok($name::$variant), )+
                    _ => Err(SetupError::UnknownCode { kind: $kind, code }),
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::write!(f, "{}", self.code())
            }
        }
    };
}

wire_enum! {
    /// Whether the EDM expects a reflector.
    TargetType, "target type" {
        /// With reflector.
        WithReflector = 0 => "BAP_REFL_USE",
        /// Without reflector.
        Reflectorless = 1 => "BAP_REFL_LESS",
    }
}

wire_enum! {
    /// Reflector model.
    PrismType, "prism type" {
        Round = 0 => "BAP_PRISM_ROUND",
        Mini = 1 => "BAP_PRISM_MINI",
        Tape = 2 => "BAP_PRISM_TAPE",
        Prism360 = 3 => "BAP_PRISM_360",
        User1 = 4 => "BAP_PRISM_USER1",
        User2 = 5 => "BAP_PRISM_USER2",
        User3 = 6 => "BAP_PRISM_USER3",
        Mini360 = 7 => "BAP_PRISM_360_MINI",
        MiniZero = 8 => "BAP_PRISM_MINI_ZERO",
        User = 9 => "BAP_PRISM_USER",
        NdsTape = 10 => "BAP_PRISM_NDS_TAPE",
        Grz121Round = 11 => "BAP_PRISM_GRZ121_ROUND",
        MaMpr122 = 12 => "BAP_PRISM_MA_MPR122",
    }
}

wire_enum! {
    /// Generic switch.
    OnOff, "on/off" {
        Off = 0 => "OFF",
        On = 1 => "ON",
    }
}

wire_enum! {
    /// Positioning precision.
    PositionMode, "positioning mode" {
        /// Fast positioning.
        Normal = 0 => "AUT_NORMAL",
        /// Exact positioning, can take distinctly longer.
        Precise = 1 => "AUT_PRECISE",
        /// TS30/TM30: last valid inclination and increased tolerance.
        Fast = 2 => "AUT_FAST",
    }
}

wire_enum! {
    /// What positioning aims at.
    AtrMode, "ATR mode" {
        /// Position to the hz/v angle pair.
        Position = 0 => "AUT_POSITION",
        /// Position to a target in the environment of the angle pair.
        Target = 1 => "AUT_TARGET",
    }
}

wire_enum! {
    /// Distance measurement program for the trigger command.
    MeasureProgram, "measure program" {
        Stop = 0 => "TMC_STOP",
        DefaultDistance = 1 => "TMC_DEF_DIST",
        Clear = 3 => "TMC_CLEAR",
        Signal = 4 => "TMC_SIGNAL",
        DoMeasure = 6 => "TMC_DO_MEASURE",
        RapidTracking = 8 => "TMC_RTRK_DIST",
        ReducedTracking = 10 => "TMC_RED_TRK_DIST",
        Frequency = 11 => "TMC_FREQUENCY",
    }
}

wire_enum! {
    /// Source of inclination correction.
    InclineProgram, "incline program" {
        /// Use sensor (a priori sigma).
        Measure = 0 => "TMC_MEA_INC",
        /// Automatic mode (sensor/plane).
        Automatic = 1 => "TMC_AUTO_INC",
        /// Use plane (a priori sigma).
        Plane = 2 => "TMC_PLANE_INC",
    }
}

wire_enum! {
    /// User measurement program.
    UserMeasProgram, "measurement program" {
        SingleRefStandard = 0 => "BAP_SINGLE_REF_STANDARD",
        SingleRefFast = 1 => "BAP_SINGLE_REF_FAST",
        SingleRefVisible = 2 => "BAP_SINGLE_REF_VISIBLE",
        SingleRlessVisible = 3 => "BAP_SINGLE_RLESS_VISIBLE",
        ContRefStandard = 4 => "BAP_CONT_REF_STANDARD",
        ContRefFast = 5 => "BAP_CONT_REF_FAST",
        ContRlessVisible = 6 => "BAP_CONT_RLESS_VISIBLE",
        AvgRefStandard = 7 => "BAP_AVG_REF_STANDARD",
        AvgRefVisible = 8 => "BAP_AVG_REF_VISIBLE",
        AvgRlessVisible = 9 => "BAP_AVG_RLESS_VISIBLE",
        ContRefSynchro = 10 => "BAP_CONT_REF_SYNCHRO",
        SingleRefPrecise = 11 => "BAP_SINGLE_REF_PRECISE",
    }
}

wire_enum! {
    /// EDM measurement mode.
    EdmMode, "EDM mode" {
        NotUsed = 0 => "EDM_MODE_NOT_USED",
        SingleTape = 1 => "EDM_SINGLE_TAPE",
        SingleStandard = 2 => "EDM_SINGLE_STANDARD",
        SingleFast = 3 => "EDM_SINGLE_FAST",
        SingleLongRange = 4 => "EDM_SINGLE_LRANGE",
        SingleShortRange = 5 => "EDM_SINGLE_SRANGE",
        ContStandard = 6 => "EDM_CONT_STANDARD",
        ContDynamic = 7 => "EDM_CONT_DYNAMIC",
        ContReflectorless = 8 => "EDM_CONT_REFLESS",
        ContFast = 9 => "EDM_CONT_FAST",
        AverageIr = 10 => "EDM_AVERAGE_IR",
        AverageShortRange = 11 => "EDM_AVERAGE_SR",
        AverageLongRange = 12 => "EDM_AVERAGE_LR",
        PreciseIr = 13 => "EDM_PRECISE_IR",
        PreciseTape = 14 => "EDM_PRECISE_TAPE",
    }
}
