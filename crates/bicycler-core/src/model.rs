//! Linearized Whipple bicycle model.
//!
//! The lean/steer equations of motion near upright, constant-speed travel are
//!
//! ```text
//! M q'' + v C1 q' + (g K0 + v² K2) q = f
//! ```
//!
//! with `q = (φ, δ)` and `f = (T_φ, T_δ)`. The four coefficient matrices depend
//! only on the physical parameters, so they are computed once here and shared
//! read-only by every run. The formulas follow the benchmark bicycle
//! derivation (Meijaard, Papadopoulos, Ruina & Schwab 2007, appendix A).

use nalgebra::{Matrix2, Vector2};

use crate::error::{SimError, SimResult};
use crate::params::BicycleParams;

/// Constant coefficient matrices of the linearized bicycle.
#[derive(Debug, Clone, PartialEq)]
pub struct BicycleModel {
    params: BicycleParams,
    m: Matrix2<f64>,
    c1: Matrix2<f64>,
    k0: Matrix2<f64>,
    k2: Matrix2<f64>,
    m_inv: Matrix2<f64>,
}

impl BicycleModel {
    /// Build the model for `params`.
    ///
    /// Fails with [`SimError::NumericDegeneracy`] when the mass matrix is
    /// singular or any coefficient comes out non-finite.
    pub fn new(params: BicycleParams) -> SimResult<Self> {
        let p = &params;
        let (sin_l, cos_l) = p.lambda.sin_cos();

        // Whole bicycle: total mass and centre of mass
        let m_t = p.m_r + p.m_b + p.m_h + p.m_f;
        let x_t = (p.x_b * p.m_b + p.x_h * p.m_h + p.w * p.m_f) / m_t;
        let z_t = (-p.r_r * p.m_r + p.z_b * p.m_b + p.z_h * p.m_h - p.r_f * p.m_f) / m_t;

        // Wheels are axisymmetric
        let i_rzz = p.i_rxx;
        let i_fzz = p.i_fxx;

        let i_txx = p.i_rxx
            + p.i_bxx
            + p.i_hxx
            + p.i_fxx
            + p.m_r * p.r_r.powi(2)
            + p.m_b * p.z_b.powi(2)
            + p.m_h * p.z_h.powi(2)
            + p.m_f * p.r_f.powi(2);
        let i_txz = p.i_bxz + p.i_hxz - p.m_b * p.x_b * p.z_b - p.m_h * p.x_h * p.z_h
            + p.m_f * p.w * p.r_f;
        let i_tzz = i_rzz
            + p.i_bzz
            + p.i_hzz
            + i_fzz
            + p.m_b * p.x_b.powi(2)
            + p.m_h * p.x_h.powi(2)
            + p.m_f * p.w.powi(2);

        // Front assembly: fork, handlebar and front wheel
        let m_a = p.m_h + p.m_f;
        let x_a = (p.x_h * p.m_h + p.w * p.m_f) / m_a;
        let z_a = (p.z_h * p.m_h - p.r_f * p.m_f) / m_a;

        let i_axx =
            p.i_hxx + p.i_fxx + p.m_h * (p.z_h - z_a).powi(2) + p.m_f * (p.r_f + z_a).powi(2);
        let i_axz = p.i_hxz - p.m_h * (p.x_h - x_a) * (p.z_h - z_a)
            + p.m_f * (p.w - x_a) * (p.r_f + z_a);
        let i_azz = p.i_hzz + i_fzz + p.m_h * (p.x_h - x_a).powi(2) + p.m_f * (p.w - x_a).powi(2);

        // Perpendicular distance of the front assembly CoM ahead of the steer axis
        let u_a = (x_a - p.w - p.c) * cos_l - z_a * sin_l;
        let i_all = m_a * u_a.powi(2)
            + i_axx * sin_l.powi(2)
            + 2.0 * i_axz * sin_l * cos_l
            + i_azz * cos_l.powi(2);
        let i_alx = -m_a * u_a * z_a + i_axx * sin_l + i_axz * cos_l;
        let i_alz = m_a * u_a * x_a + i_axz * sin_l + i_azz * cos_l;

        let mu = p.c / p.w * cos_l;

        // Gyrostatic coefficients of the spinning wheels
        let s_r = p.i_ryy / p.r_r;
        let s_f = p.i_fyy / p.r_f;
        let s_t = s_r + s_f;
        let s_a = m_a * u_a + mu * m_t * x_t;

        let m_pd = i_alx + mu * i_txz;
        let m = Matrix2::new(
            i_txx,
            m_pd,
            m_pd,
            i_all + 2.0 * mu * i_alz + mu.powi(2) * i_tzz,
        );

        let k0 = Matrix2::new(m_t * z_t, -s_a, -s_a, -s_a * sin_l);

        let k2 = Matrix2::new(
            0.0,
            (s_t - m_t * z_t) / p.w * cos_l,
            0.0,
            (s_a + s_f * sin_l) / p.w * cos_l,
        );

        let c1 = Matrix2::new(
            0.0,
            mu * s_t + s_f * cos_l + i_txz / p.w * cos_l - mu * m_t * z_t,
            -(mu * s_t + s_f * cos_l),
            i_alz / p.w * cos_l + mu * (s_a + i_tzz / p.w * cos_l),
        );

        for (label, matrix) in [("M", &m), ("C1", &c1), ("K0", &k0), ("K2", &k2)] {
            if matrix.iter().any(|v| !v.is_finite()) {
                return Err(SimError::degenerate(format!(
                    "matrix {label} has non-finite entries: {:?}",
                    matrix.as_slice()
                )));
            }
        }

        let m_inv = m
            .try_inverse()
            .filter(|inv| inv.iter().all(|v| v.is_finite()))
            .ok_or_else(|| {
                SimError::degenerate(format!(
                    "mass matrix is singular (det = {:e})",
                    m.determinant()
                ))
            })?;

        tracing::debug!(
            default = params.is_default(),
            det_m = m.determinant(),
            "built bicycle model"
        );

        Ok(Self {
            params,
            m,
            c1,
            k0,
            k2,
            m_inv,
        })
    }

    /// The benchmark bicycle.
    pub fn benchmark() -> SimResult<Self> {
        Self::new(BicycleParams::default())
    }

    pub fn params(&self) -> &BicycleParams {
        &self.params
    }

    /// Generalized mass matrix `M`.
    pub fn mass(&self) -> &Matrix2<f64> {
        &self.m
    }

    /// Velocity-proportional damping matrix `C1`.
    pub fn damping(&self) -> &Matrix2<f64> {
        &self.c1
    }

    /// Gravity stiffness matrix `K0`.
    pub fn gravity_stiffness(&self) -> &Matrix2<f64> {
        &self.k0
    }

    /// Velocity-squared stiffness matrix `K2`.
    pub fn velocity_stiffness(&self) -> &Matrix2<f64> {
        &self.k2
    }

    pub fn mass_inverse(&self) -> &Matrix2<f64> {
        &self.m_inv
    }

    pub fn gravity(&self) -> f64 {
        self.params.g
    }

    pub fn steer_axis_tilt(&self) -> f64 {
        self.params.lambda
    }

    pub fn wheelbase(&self) -> f64 {
        self.params.w
    }

    pub fn trail(&self) -> f64 {
        self.params.c
    }

    pub fn is_default(&self) -> bool {
        self.params.is_default()
    }

    /// Solve the equations of motion for `q''` at forward speed `v`.
    pub fn acceleration(
        &self,
        v: f64,
        q: &Vector2<f64>,
        q_dot: &Vector2<f64>,
        f: &Vector2<f64>,
    ) -> Vector2<f64> {
        let stiffness = self.k0 * self.params.g + self.k2 * (v * v);
        self.m_inv * (f - self.c1 * q_dot * v - stiffness * q)
    }

    /// Linearized yaw rate for steer angle `steer` and steer rate `steer_rate`.
    pub fn heading_rate(&self, v: f64, steer: f64, steer_rate: f64) -> f64 {
        let p = &self.params;
        p.c / p.w * steer_rate + v * p.lambda.cos() / p.w * steer
    }
}
