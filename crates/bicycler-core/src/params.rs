//! Physical parameter definitions for the benchmark bicycle.
//!
//! Defaults are the published Whipple benchmark bicycle (Meijaard et al.
//! 2007). Names follow the benchmark's symbols so overrides read like the
//! paper: `w=1.1`, `mB=72`, `lambda=0.35`.

use crate::error::{SimError, SimResult};

/// Parameter specification with name, description and default value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Benchmark symbol used for overrides.
    pub name: &'static str,
    /// Human-readable label.
    pub label: &'static str,
    /// Default value.
    pub default: f64,
}

impl ParamSpec {
    /// Create a new parameter specification.
    pub const fn new(name: &'static str, label: &'static str, default: f64) -> Self {
        Self {
            name,
            label,
            default,
        }
    }
}

// Rear frame and rider
pub const IBXX: ParamSpec = ParamSpec::new("IBxx", "Rear frame x inertia (kg·m²)", 9.2);
pub const IBXZ: ParamSpec = ParamSpec::new("IBxz", "Rear frame xz product of inertia (kg·m²)", 2.4);
pub const IBYY: ParamSpec = ParamSpec::new("IByy", "Rear frame y inertia (kg·m²)", 11.0);
pub const IBZZ: ParamSpec = ParamSpec::new("IBzz", "Rear frame z inertia (kg·m²)", 2.8);
// Front wheel
pub const IFXX: ParamSpec = ParamSpec::new("IFxx", "Front wheel radial inertia (kg·m²)", 0.1405);
pub const IFYY: ParamSpec = ParamSpec::new("IFyy", "Front wheel spin inertia (kg·m²)", 0.28);
// Handlebar and fork
pub const IHXX: ParamSpec = ParamSpec::new("IHxx", "Fork x inertia (kg·m²)", 0.05892);
pub const IHXZ: ParamSpec = ParamSpec::new("IHxz", "Fork xz product of inertia (kg·m²)", -0.00756);
pub const IHYY: ParamSpec = ParamSpec::new("IHyy", "Fork y inertia (kg·m²)", 0.06);
pub const IHZZ: ParamSpec = ParamSpec::new("IHzz", "Fork z inertia (kg·m²)", 0.00708);
// Rear wheel
pub const IRXX: ParamSpec = ParamSpec::new("IRxx", "Rear wheel radial inertia (kg·m²)", 0.0603);
pub const IRYY: ParamSpec = ParamSpec::new("IRyy", "Rear wheel spin inertia (kg·m²)", 0.12);
// Geometry and environment
pub const TRAIL: ParamSpec = ParamSpec::new("c", "Trail (m)", 0.08);
pub const GRAVITY: ParamSpec = ParamSpec::new("g", "Gravity (m/s²)", 9.81);
pub const STEER_AXIS_TILT: ParamSpec =
    ParamSpec::new("lambda", "Steer axis tilt (rad)", std::f64::consts::PI / 10.0);
pub const MASS_B: ParamSpec = ParamSpec::new("mB", "Rear frame mass (kg)", 85.0);
pub const MASS_F: ParamSpec = ParamSpec::new("mF", "Front wheel mass (kg)", 3.0);
pub const MASS_H: ParamSpec = ParamSpec::new("mH", "Fork mass (kg)", 4.0);
pub const MASS_R: ParamSpec = ParamSpec::new("mR", "Rear wheel mass (kg)", 2.0);
pub const RADIUS_F: ParamSpec = ParamSpec::new("rF", "Front wheel radius (m)", 0.35);
pub const RADIUS_R: ParamSpec = ParamSpec::new("rR", "Rear wheel radius (m)", 0.3);
pub const WHEELBASE: ParamSpec = ParamSpec::new("w", "Wheelbase (m)", 1.02);
pub const X_B: ParamSpec = ParamSpec::new("xB", "Rear frame CoM x (m)", 0.3);
pub const X_H: ParamSpec = ParamSpec::new("xH", "Fork CoM x (m)", 0.9);
pub const Z_B: ParamSpec = ParamSpec::new("zB", "Rear frame CoM z (m)", -0.9);
pub const Z_H: ParamSpec = ParamSpec::new("zH", "Fork CoM z (m)", -0.7);

/// Number of physical parameters.
pub const NUM_PARAMETERS: usize = 26;

/// All parameters in canonical order.
pub const PARAMETERS: [ParamSpec; NUM_PARAMETERS] = [
    IBXX,
    IBXZ,
    IBYY,
    IBZZ,
    IFXX,
    IFYY,
    IHXX,
    IHXZ,
    IHYY,
    IHZZ,
    IRXX,
    IRYY,
    TRAIL,
    GRAVITY,
    STEER_AXIS_TILT,
    MASS_B,
    MASS_F,
    MASS_H,
    MASS_R,
    RADIUS_F,
    RADIUS_R,
    WHEELBASE,
    X_B,
    X_H,
    Z_B,
    Z_H,
];

/// Look up a parameter specification by its benchmark symbol.
pub fn param_spec(name: &str) -> Option<&'static ParamSpec> {
    PARAMETERS.iter().find(|spec| spec.name == name)
}

// ---------------------------------------------------------------------------
// Parameter set
// ---------------------------------------------------------------------------

/// A complete set of physical parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BicycleParams {
    pub i_bxx: f64,
    pub i_bxz: f64,
    pub i_byy: f64,
    pub i_bzz: f64,
    pub i_fxx: f64,
    pub i_fyy: f64,
    pub i_hxx: f64,
    pub i_hxz: f64,
    pub i_hyy: f64,
    pub i_hzz: f64,
    pub i_rxx: f64,
    pub i_ryy: f64,
    pub c: f64,
    pub g: f64,
    pub lambda: f64,
    pub m_b: f64,
    pub m_f: f64,
    pub m_h: f64,
    pub m_r: f64,
    pub r_f: f64,
    pub r_r: f64,
    pub w: f64,
    pub x_b: f64,
    pub x_h: f64,
    pub z_b: f64,
    pub z_h: f64,
}

impl Default for BicycleParams {
    fn default() -> Self {
        Self {
            i_bxx: IBXX.default,
            i_bxz: IBXZ.default,
            i_byy: IBYY.default,
            i_bzz: IBZZ.default,
            i_fxx: IFXX.default,
            i_fyy: IFYY.default,
            i_hxx: IHXX.default,
            i_hxz: IHXZ.default,
            i_hyy: IHYY.default,
            i_hzz: IHZZ.default,
            i_rxx: IRXX.default,
            i_ryy: IRYY.default,
            c: TRAIL.default,
            g: GRAVITY.default,
            lambda: STEER_AXIS_TILT.default,
            m_b: MASS_B.default,
            m_f: MASS_F.default,
            m_h: MASS_H.default,
            m_r: MASS_R.default,
            r_f: RADIUS_F.default,
            r_r: RADIUS_R.default,
            w: WHEELBASE.default,
            x_b: X_B.default,
            x_h: X_H.default,
            z_b: Z_B.default,
            z_h: Z_H.default,
        }
    }
}

impl BicycleParams {
    /// Values in the same order as [`PARAMETERS`].
    pub fn values(&self) -> [f64; NUM_PARAMETERS] {
        [
            self.i_bxx, self.i_bxz, self.i_byy, self.i_bzz, self.i_fxx, self.i_fyy, self.i_hxx,
            self.i_hxz, self.i_hyy, self.i_hzz, self.i_rxx, self.i_ryy, self.c, self.g,
            self.lambda, self.m_b, self.m_f, self.m_h, self.m_r, self.r_f, self.r_r, self.w,
            self.x_b, self.x_h, self.z_b, self.z_h,
        ]
    }

    /// Get a parameter by benchmark symbol.
    pub fn get(&self, name: &str) -> Option<f64> {
        let idx = PARAMETERS.iter().position(|spec| spec.name == name)?;
        Some(self.values()[idx])
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut f64> {
        let slot = match name {
            "IBxx" => &mut self.i_bxx,
            "IBxz" => &mut self.i_bxz,
            "IByy" => &mut self.i_byy,
            "IBzz" => &mut self.i_bzz,
            "IFxx" => &mut self.i_fxx,
            "IFyy" => &mut self.i_fyy,
            "IHxx" => &mut self.i_hxx,
            "IHxz" => &mut self.i_hxz,
            "IHyy" => &mut self.i_hyy,
            "IHzz" => &mut self.i_hzz,
            "IRxx" => &mut self.i_rxx,
            "IRyy" => &mut self.i_ryy,
            "c" => &mut self.c,
            "g" => &mut self.g,
            "lambda" => &mut self.lambda,
            "mB" => &mut self.m_b,
            "mF" => &mut self.m_f,
            "mH" => &mut self.m_h,
            "mR" => &mut self.m_r,
            "rF" => &mut self.r_f,
            "rR" => &mut self.r_r,
            "w" => &mut self.w,
            "xB" => &mut self.x_b,
            "xH" => &mut self.x_h,
            "zB" => &mut self.z_b,
            "zH" => &mut self.z_h,
            _ => return None,
        };
        Some(slot)
    }

    /// Set a parameter by benchmark symbol.
    ///
    /// Unknown names leave the set untouched and return `Ok(false)`; a
    /// non-finite value is a configuration error.
    pub fn set(&mut self, name: &str, value: f64) -> SimResult<bool> {
        if !value.is_finite() {
            return Err(SimError::config(format!(
                "parameter \"{name}\" must be finite, got {value}"
            )));
        }
        match self.slot_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Merge `overrides` onto the defaults.
    ///
    /// Unknown names are reported with a warning and ignored.
    pub fn with_overrides<I, S>(overrides: I) -> SimResult<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut params = Self::default();
        params.apply_overrides(overrides)?;
        Ok(params)
    }

    /// Merge `overrides` onto this parameter set.
    pub fn apply_overrides<I, S>(&mut self, overrides: I) -> SimResult<()>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        for (name, value) in overrides {
            let name = name.as_ref();
            if !self.set(name, value)? {
                tracing::warn!(
                    parameter = name,
                    value,
                    "unknown bicycle parameter, ignoring it"
                );
            }
        }
        Ok(())
    }

    /// Parameters that differ from their default, in canonical order.
    pub fn non_default_values(&self) -> Vec<(&'static str, f64)> {
        PARAMETERS
            .iter()
            .zip(self.values())
            .filter(|(spec, value)| *value != spec.default)
            .map(|(spec, value)| (spec.name, value))
            .collect()
    }

    pub fn is_default(&self) -> bool {
        self.non_default_values().is_empty()
    }

    /// Parse a JSON object of `name: number` pairs onto the defaults.
    pub fn from_json_str(json: &str) -> SimResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| SimError::config(format!("invalid parameter file: {e}")))?;
        let object = value
            .as_object()
            .ok_or_else(|| SimError::config("parameter file must contain a JSON object"))?;

        let mut overrides = Vec::with_capacity(object.len());
        for (name, raw) in object {
            let number = raw.as_f64().ok_or_else(|| {
                SimError::config(format!("parameter \"{name}\" is not a number: {raw}"))
            })?;
            overrides.push((name.as_str(), number));
        }
        Self::with_overrides(overrides)
    }
}

/// Parse one `NAME=VALUE` override.
pub fn parse_override(spec: &str) -> SimResult<(String, f64)> {
    let mut parts = spec.split('=');
    let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(SimError::config(format!(
            "invalid parameter specification \"{spec}\", use NAME=VALUE"
        )));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(SimError::config(format!(
            "missing parameter name in \"{spec}\""
        )));
    }
    let value: f64 = value.trim().parse().map_err(|_| {
        SimError::config(format!("value of parameter \"{name}\" is not a number: \"{value}\""))
    })?;
    Ok((name.to_string(), value))
}

/// Parse a list of `NAME=VALUE` overrides onto the defaults.
pub fn parse_overrides<S: AsRef<str>>(specs: &[S]) -> SimResult<BicycleParams> {
    let parsed = specs
        .iter()
        .map(|s| parse_override(s.as_ref()))
        .collect::<SimResult<Vec<_>>>()?;
    BicycleParams::with_overrides(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_defaults() {
        let params = BicycleParams::default();
        for (spec, value) in PARAMETERS.iter().zip(params.values()) {
            assert_eq!(spec.default, value, "{}", spec.name);
            assert_eq!(params.get(spec.name), Some(spec.default));
        }
        assert!(params.is_default());
        assert_eq!(param_spec("w").map(|s| s.default), Some(1.02));
        assert!(param_spec("IRzz").is_none());
    }

    #[test]
    fn test_every_name_is_settable() {
        for spec in PARAMETERS.iter() {
            let mut params = BicycleParams::default();
            assert!(params.set(spec.name, 123.0).unwrap(), "{}", spec.name);
            assert_eq!(params.get(spec.name), Some(123.0));
            assert_eq!(params.non_default_values(), vec![(spec.name, 123.0)]);
        }
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(parse_override("w=1.1").unwrap(), ("w".to_string(), 1.1));
        assert_eq!(parse_override(" mB = 70 ").unwrap(), ("mB".to_string(), 70.0));
        assert!(matches!(parse_override("w1.1"), Err(SimError::Config { .. })));
        assert!(matches!(parse_override("w=1=2"), Err(SimError::Config { .. })));
        assert!(matches!(parse_override("=2"), Err(SimError::Config { .. })));
        assert!(matches!(parse_override("w=abc"), Err(SimError::Config { .. })));
    }

    #[test]
    fn test_unknown_names_are_ignored() {
        let params = parse_overrides(&["w=1.1", "frame_color=3"]).unwrap();
        assert_eq!(params.w, 1.1);
        assert_eq!(params.non_default_values(), vec![("w", 1.1)]);
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        assert!(parse_overrides(&["g=inf"]).is_err());
        assert!(parse_overrides(&["c=NaN"]).is_err());
    }

    #[test]
    fn test_non_default_values_keep_canonical_order() {
        let params = parse_overrides(&["zH=-0.6", "c=0.1", "IBxx=9.0"]).unwrap();
        let names: Vec<_> = params.non_default_values().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["IBxx", "c", "zH"]);
        assert!(!params.is_default());
    }

    #[test]
    fn test_from_json() {
        let params = BicycleParams::from_json_str(r#"{"w": 1.2, "mB": 70, "spokes": 32}"#).unwrap();
        assert_eq!(params.w, 1.2);
        assert_eq!(params.m_b, 70.0);
        assert_eq!(params.non_default_values().len(), 2);

        assert!(BicycleParams::from_json_str(r#"{"w": "long"}"#).is_err());
        assert!(BicycleParams::from_json_str("[1, 2]").is_err());
        assert!(BicycleParams::from_json_str("{").is_err());
    }
}
