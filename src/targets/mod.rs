//! Targets ("aims") and the two-face observation set.
//!
//! An [`Aim`] is an angle pair in gon plus the reflector configuration the
//! instrument needs to measure it. The orchestrator measures an [`AimList`] in
//! insertion order. Observing every target in both telescope faces cancels
//! systematic instrument errors, so the list is normally extended once with the
//! mirrored Face II set:
//!
//! ```text
//! [a0, a1, a2]  ->  [a0, a1, a2, a2', a1', a0']
//! a' = { hz: a.hz + 200, v: 400 - a.v, same name and reflector }
//! ```

pub mod prompt;
pub mod setup_file;

use crate::error::{SetupError, SurveyError};
use crate::geocom::{PrismType, TargetType};

/// Reflector configuration; the prism type exists only for reflector targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Measured onto a reflector of the given type, with ATR.
    Reflector(PrismType),
    /// Measured reflectorless onto the raw angle pair.
    Reflectorless,
}

impl Target {
    /// Builds a target from wire codes. The prism code is ignored for reflectorless targets.
    pub fn from_codes(target_code: i64, prism_code: i64) -> Result<Self, SetupError> {
        match TargetType::try_from(target_code)? {
            TargetType::WithReflector => Ok(Self::Reflector(PrismType::try_from(prism_code)?)),
            TargetType::Reflectorless => Ok(Self::Reflectorless),
        }
    }

    /// Target type sent to the instrument.
    pub fn target_type(self) -> TargetType {
        match self {
            Self::Reflector(_) => TargetType::WithReflector,
            Self::Reflectorless => TargetType::Reflectorless,
        }
    }

    /// Prism type, for reflector targets.
    pub fn prism(self) -> Option<PrismType> {
        match self {
            Self::Reflector(prism) => Some(prism),
            Self::Reflectorless => None,
        }
    }

    /// Whether a reflector is expected.
    pub fn uses_reflector(self) -> bool {
        matches!(self, Self::Reflector(_))
    }

    /// Prism code as written to setup files; `-1` when undefined.
    pub fn prism_code(self) -> i64 {
        self.prism().map_or(-1, |p| i64::from(p.code()))
    }
}

/// One target to measure. Angles in gon.
#[derive(Debug, Clone, PartialEq)]
pub struct Aim {
    /// Name written to the measurement file.
    pub name: String,
    /// Horizontal angle.
    pub hz: f64,
    /// Vertical angle.
    pub v: f64,
    /// Reflector configuration.
    pub target: Target,
}

impl Aim {
    /// Creates an aim.
    pub fn new(name: impl Into<String>, hz: f64, v: f64, target: Target) -> Self {
        Self {
            name: name.into(),
            hz,
            v,
            target,
        }
    }

    /// The same target observed in the opposite telescope face.
    pub fn second_face(&self) -> Self {
        Self {
            name: self.name.clone(),
            hz: self.hz + 200.0,
            v: 400.0 - self.v,
            target: self.target,
        }
    }
}

/// Face II counterparts of `base`, in reverse order.
pub fn second_circle(base: &[Aim]) -> Vec<Aim> {
    base.iter().rev().map(Aim::second_face).collect()
}

/// Ordered working set of aims.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AimList {
    aims: Vec<Aim>,
    expanded: bool,
}

impl AimList {
    /// Wraps base aims (Face I only).
    pub fn new(aims: Vec<Aim>) -> Self {
        Self {
            aims,
            expanded: false,
        }
    }

    /// Appends a base aim. Not allowed once the second circle was added.
    pub fn push(&mut self, aim: Aim) -> Result<(), SurveyError> {
        if self.expanded {
            return Err(SurveyError::AlreadyExpanded);
        }
        self.aims.push(aim);
        Ok(())
    }

    /// Appends the Face II set. A list can be expanded only once.
    pub fn add_second_circle(&mut self) -> Result<(), SurveyError> {
        if self.expanded {
            return Err(SurveyError::AlreadyExpanded);
        }
        let mirrored = second_circle(&self.aims);
        self.aims.extend(mirrored);
        self.expanded = true;
        Ok(())
    }

    /// Whether the Face II set has been appended.
    pub fn has_second_circle(&self) -> bool {
        self.expanded
    }

    /// Aims in measurement order.
    pub fn iter(&self) -> std::slice::Iter<'_, Aim> {
        self.aims.iter()
    }

    /// Aims in measurement order.
    pub fn as_slice(&self) -> &[Aim] {
        &self.aims
    }

    /// Number of aims.
    pub fn len(&self) -> usize {
        self.aims.len()
    }

    /// Whether there is nothing to measure.
    pub fn is_empty(&self) -> bool {
        self.aims.is_empty()
    }
}

impl<'a> IntoIterator for &'a AimList {
    type Item = &'a Aim;
    type IntoIter = std::slice::Iter<'a, Aim>;

    fn into_iter(self) -> Self::IntoIter {
        self.aims.iter()
    }
}
