//! GeoCom command client.
//!
//! [`GeoCom::execute`] is the only place that talks to the transport: it sends a
//! request, waits for a reply of the right shape and retries (resetting the link
//! in between) a bounded number of times. The typed wrappers below only encode
//! arguments and decode fields; the per-RPC reply shape and timeout come from
//! [`Rpc`].
//!
//! Two kinds of failure reach the caller and must be handled differently:
//! an `Err(GeoComError)` means the instrument could not be talked to, while a
//! non-zero [`ReturnCode`] inside an `Ok` reply means the instrument answered
//! and reported an error.

use super::codes::{
    AtrMode, EdmMode, InclineProgram, MeasureProgram, OnOff, PositionMode, PrismType,
    TargetType, UserMeasProgram,
};
use super::rpc::{encode_request, Rpc};
use crate::adapters::{Connector, Transport};
use crate::error::GeoComError;
use crate::journal::Journal;
use crate::units::gon_to_rad;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default number of send/receive attempts per command.
pub const DEFAULT_RETRIES: u32 = 3;

/// Return code reported by the instrument; `0` is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnCode(pub i32);

impl ReturnCode {
    /// Success code.
    pub const OK: Self = Self(0);

    /// Whether the instrument reported success.
    pub fn is_ok(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reply of `TMC_GetFullMeas`. Angles in radians, distance in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FullMeasurement {
    /// Instrument return code; the other fields are only meaningful when it is OK.
    pub return_code: ReturnCode,
    /// Horizontal angle.
    pub hz_angle: f64,
    /// Vertical angle.
    pub v_angle: f64,
    /// Accuracy of the angles.
    pub angle_accuracy: f64,
    /// Cross incline.
    pub cross_incline: f64,
    /// Length incline.
    pub length_incline: f64,
    /// Accuracy of the inclines.
    pub incline_accuracy: f64,
    /// Slope distance.
    pub slope_distance: f64,
    /// Time of the distance measurement [ms].
    pub distance_time: f64,
}

/// Reply of `TMC_GetAngle1`: the uncompensated angle pair, in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleReading {
    /// Instrument return code.
    pub return_code: ReturnCode,
    /// Horizontal angle.
    pub hz_angle_raw: f64,
    /// Vertical angle.
    pub v_angle_raw: f64,
}

/// Reply of `CSV_GetIntTemp`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureReading {
    /// Instrument return code.
    pub return_code: ReturnCode,
    /// Internal temperature [°C].
    pub internal_temperature_celsius: f64,
}

fn number<T: FromStr>(rpc: Rpc, fields: &[String], index: usize) -> Result<T, GeoComError> {
    let raw = fields.get(index).map(String::as_str).unwrap_or_default();
    raw.trim().parse().map_err(|_| GeoComError::InvalidField {
        rpc: rpc.code(),
        index,
        value: raw.to_string(),
    })
}

fn return_code(rpc: Rpc, fields: &[String]) -> Result<ReturnCode, GeoComError> {
    number(rpc, fields, 0).map(ReturnCode)
}

/// Typed GeoCom client over a [`Transport`].
pub struct GeoCom<C: Connector> {
    transport: Transport<C>,
    journal: Arc<dyn Journal>,
    retries: u32,
}

impl<C: Connector> GeoCom<C> {
    /// Wraps a transport.
    pub fn new(transport: Transport<C>, journal: Arc<dyn Journal>) -> Self {
        Self {
            transport,
            journal,
            retries: DEFAULT_RETRIES,
        }
    }

    /// Overrides the number of attempts per command (at least one).
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.max(1);
        self
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Transport<C> {
        &self.transport
    }

    /// The underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut Transport<C> {
        &mut self.transport
    }

    /// Sends `%R1Q,<code>:<args>` and returns the reply fields.
    ///
    /// A failed send resets the link and moves on to the next attempt. A reply
    /// that times out or has the wrong number of fields also resets the link
    /// before retrying. Gives up when a reset fails or the attempts run out.
    pub async fn execute(
        &mut self,
        code: u16,
        args: &[String],
        reply_fields: usize,
        timeout: Duration,
    ) -> Result<Vec<String>, GeoComError> {
        let request = encode_request(code, args);

        for attempt in 1..=self.retries {
            if self.transport.send(&request).await.is_err() {
                if !self.transport.reset().await {
                    return Err(GeoComError::ResetFailed { rpc: code });
                }
                continue;
            }

            match self.transport.receive(reply_fields, timeout).await {
                Ok(fields) => return Ok(fields),
                Err(e) => {
                    debug!(code, attempt, error = %e, "Command failed");
                    if !self.transport.reset().await {
                        return Err(GeoComError::ResetFailed { rpc: code });
                    }
                    if attempt < self.retries {
                        self.journal.error("Retrying command");
                    }
                }
            }
        }

        self.journal.error("GeoCom did not receive response");
        Err(GeoComError::NoResponse {
            rpc: code,
            attempts: self.retries,
        })
    }

    async fn call(&mut self, rpc: Rpc, args: &[String]) -> Result<Vec<String>, GeoComError> {
        self.execute(rpc.code(), args, rpc.reply_fields(), rpc.timeout())
            .await
    }

    async fn call_rc(&mut self, rpc: Rpc, args: &[String]) -> Result<ReturnCode, GeoComError> {
        let fields = self.call(rpc, args).await?;
        return_code(rpc, &fields)
    }

    /// `BAP_SetTargetType`
    pub async fn set_target_type(&mut self, target: TargetType) -> Result<ReturnCode, GeoComError> {
        self.call_rc(Rpc::SetTargetType, &[target.to_string()]).await
    }

    /// `BAP_SetPrismType`
    pub async fn set_prism_type(&mut self, prism: PrismType) -> Result<ReturnCode, GeoComError> {
        self.call_rc(Rpc::SetPrismType, &[prism.to_string()]).await
    }

    /// `TMC_SetInclineSwitch`; without the sensor there are no incline values.
    pub async fn set_incline_switch(&mut self, switch: OnOff) -> Result<ReturnCode, GeoComError> {
        self.call_rc(Rpc::SetInclineSwitch, &[switch.to_string()])
            .await
    }

    /// `TMC_SetAtmPpm`: atmospheric correction in ppm.
    pub async fn set_atm_ppm(&mut self, ppm: f64) -> Result<ReturnCode, GeoComError> {
        self.call_rc(Rpc::SetAtmPpm, &[ppm.to_string()]).await
    }

    /// `AUS_SetUserAtrState`
    pub async fn set_user_atr_state(&mut self, state: OnOff) -> Result<ReturnCode, GeoComError> {
        self.call_rc(Rpc::SetUserAtrState, &[state.to_string()])
            .await
    }

    /// `TMC_SetEdmMode`
    pub async fn set_edm_mode(&mut self, mode: EdmMode) -> Result<ReturnCode, GeoComError> {
        self.call_rc(Rpc::SetEdmMode, &[mode.to_string()]).await
    }

    /// `BAP_SetMeasPrg`
    pub async fn set_measurement_program(
        &mut self,
        program: UserMeasProgram,
    ) -> Result<ReturnCode, GeoComError> {
        self.call_rc(Rpc::SetMeasProgram, &[program.to_string()])
            .await
    }

    /// `AUT_MakePositioning` to an angle pair given in gon.
    pub async fn make_positioning(
        &mut self,
        hz_gon: f64,
        v_gon: f64,
        mode: PositionMode,
        atr: AtrMode,
    ) -> Result<ReturnCode, GeoComError> {
        let args = [
            gon_to_rad(hz_gon).to_string(),
            gon_to_rad(v_gon).to_string(),
            mode.to_string(),
            atr.to_string(),
            "0".to_string(),
        ];
        self.call_rc(Rpc::MakePositioning, &args).await
    }

    /// `AUT_FineAdjust` within a search window given in gon.
    pub async fn fine_adjust(
        &mut self,
        search_hz_gon: f64,
        search_v_gon: f64,
    ) -> Result<ReturnCode, GeoComError> {
        let args = [
            gon_to_rad(search_hz_gon).to_string(),
            gon_to_rad(search_v_gon).to_string(),
            "0".to_string(),
        ];
        self.call_rc(Rpc::FineAdjust, &args).await
    }

    /// `TMC_DoMeasure`: triggers a distance measurement.
    pub async fn do_measure(
        &mut self,
        program: MeasureProgram,
        incline: InclineProgram,
    ) -> Result<ReturnCode, GeoComError> {
        self.call_rc(Rpc::DoMeasure, &[program.to_string(), incline.to_string()])
            .await
    }

    /// `TMC_GetFullMeas`, waiting up to `wait_ms` on the instrument side.
    pub async fn get_full_measurement(
        &mut self,
        wait_ms: u32,
        incline: InclineProgram,
    ) -> Result<FullMeasurement, GeoComError> {
        let rpc = Rpc::GetFullMeasurement;
        let f = self
            .call(rpc, &[wait_ms.to_string(), incline.to_string()])
            .await?;
        Ok(FullMeasurement {
            return_code: return_code(rpc, &f)?,
            hz_angle: number(rpc, &f, 1)?,
            v_angle: number(rpc, &f, 2)?,
            angle_accuracy: number(rpc, &f, 3)?,
            cross_incline: number(rpc, &f, 4)?,
            length_incline: number(rpc, &f, 5)?,
            incline_accuracy: number(rpc, &f, 6)?,
            slope_distance: number(rpc, &f, 7)?,
            distance_time: number(rpc, &f, 8)?,
        })
    }

    /// `TMC_GetAngle1`
    pub async fn get_angle(&mut self, incline: InclineProgram) -> Result<AngleReading, GeoComError> {
        let rpc = Rpc::GetAngle;
        let f = self.call(rpc, &[incline.to_string()]).await?;
        Ok(AngleReading {
            return_code: return_code(rpc, &f)?,
            hz_angle_raw: number(rpc, &f, 1)?,
            v_angle_raw: number(rpc, &f, 2)?,
        })
    }

    /// `CSV_GetIntTemp`
    pub async fn get_internal_temperature(&mut self) -> Result<TemperatureReading, GeoComError> {
        let rpc = Rpc::GetInternalTemperature;
        let f = self.call(rpc, &[]).await?;
        Ok(TemperatureReading {
            return_code: return_code(rpc, &f)?,
            internal_temperature_celsius: number(rpc, &f, 1)?,
        })
    }
}
