//! Element matrix library for 3D frame and truss members
//!
//! All matrices use the 12-DOF local layout
//! `[ux_i, uy_i, uz_i, rx_i, ry_i, rz_i, ux_j, uy_j, uz_j, rx_j, ry_j, rz_j]`.
//! Every function is pure and fails with [`FEAError::DegenerateGeometry`] when
//! the member length is within [`LENGTH_TOLERANCE`]; the element id is left
//! blank for the caller to fill in with [`FEAError::for_element`].

use serde::{Deserialize, Serialize};

use super::geometry::LENGTH_TOLERANCE;
use super::{Mat12, Vec12};
use crate::error::{FEAError, FEAResult};

/// Axial forces smaller than this produce no geometric stiffness
const NEGLIGIBLE_AXIAL: f64 = 1e-10;

/// Material and section properties a member matrix is built from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemberProperties {
    /// Modulus of elasticity
    pub e: f64,
    /// Shear modulus
    pub g: f64,
    /// Mass density
    pub rho: f64,
    /// Cross-sectional area
    pub a: f64,
    /// Moment of inertia about local y
    pub iy: f64,
    /// Moment of inertia about local z
    pub iz: f64,
    /// Torsional constant
    pub j: f64,
    /// Member length
    pub length: f64,
}

impl MemberProperties {
    /// Polar moment of inertia used for rotational mass
    pub fn polar_inertia(&self) -> f64 {
        self.iy + self.iz
    }

    /// Mass per unit length
    pub fn mass_per_length(&self) -> f64 {
        self.rho * self.a
    }
}

fn check_length(length: f64) -> FEAResult<()> {
    if length.is_finite() && length > LENGTH_TOLERANCE {
        Ok(())
    } else {
        Err(FEAError::DegenerateGeometry {
            element: String::new(),
            length,
        })
    }
}

impl FEAError {
    /// Attach an element id to a geometry error raised by the matrix library
    pub fn for_element(self, id: &str) -> Self {
        match self {
            Self::DegenerateGeometry { element, length } if element.is_empty() => {
                Self::DegenerateGeometry {
                    element: id.to_string(),
                    length,
                }
            }
            other => other,
        }
    }
}

fn set_symmetric(m: &mut Mat12, i: usize, j: usize, value: f64) {
    m[(i, j)] = value;
    m[(j, i)] = value;
}

/// Local stiffness matrix of an Euler-Bernoulli beam/column element
pub fn beam_local_stiffness(p: &MemberProperties) -> FEAResult<Mat12> {
    check_length(p.length)?;
    let l = p.length;
    let l2 = l * l;
    let l3 = l2 * l;

    let ea_l = p.e * p.a / l;
    let gj_l = p.g * p.j / l;

    let eiy_l3 = p.e * p.iy / l3;
    let eiy_l2 = p.e * p.iy / l2;
    let eiy_l = p.e * p.iy / l;

    let eiz_l3 = p.e * p.iz / l3;
    let eiz_l2 = p.e * p.iz / l2;
    let eiz_l = p.e * p.iz / l;

    #[rustfmt::skip]
    let data = [
        ea_l,      0.0,          0.0,           0.0,    0.0,           0.0,          -ea_l,     0.0,          0.0,           0.0,    0.0,           0.0,
        0.0,       12.0*eiz_l3,  0.0,           0.0,    0.0,           6.0*eiz_l2,   0.0,       -12.0*eiz_l3, 0.0,           0.0,    0.0,           6.0*eiz_l2,
        0.0,       0.0,          12.0*eiy_l3,   0.0,    -6.0*eiy_l2,   0.0,          0.0,       0.0,          -12.0*eiy_l3,  0.0,    -6.0*eiy_l2,   0.0,
        0.0,       0.0,          0.0,           gj_l,   0.0,           0.0,          0.0,       0.0,          0.0,           -gj_l,  0.0,           0.0,
        0.0,       0.0,          -6.0*eiy_l2,   0.0,    4.0*eiy_l,     0.0,          0.0,       0.0,          6.0*eiy_l2,    0.0,    2.0*eiy_l,     0.0,
        0.0,       6.0*eiz_l2,   0.0,           0.0,    0.0,           4.0*eiz_l,    0.0,       -6.0*eiz_l2,  0.0,           0.0,    0.0,           2.0*eiz_l,
        -ea_l,     0.0,          0.0,           0.0,    0.0,           0.0,          ea_l,      0.0,          0.0,           0.0,    0.0,           0.0,
        0.0,       -12.0*eiz_l3, 0.0,           0.0,    0.0,           -6.0*eiz_l2,  0.0,       12.0*eiz_l3,  0.0,           0.0,    0.0,           -6.0*eiz_l2,
        0.0,       0.0,          -12.0*eiy_l3,  0.0,    6.0*eiy_l2,    0.0,          0.0,       0.0,          12.0*eiy_l3,   0.0,    6.0*eiy_l2,    0.0,
        0.0,       0.0,          0.0,           -gj_l,  0.0,           0.0,          0.0,       0.0,          0.0,           gj_l,   0.0,           0.0,
        0.0,       0.0,          -6.0*eiy_l2,   0.0,    2.0*eiy_l,     0.0,          0.0,       0.0,          6.0*eiy_l2,    0.0,    4.0*eiy_l,     0.0,
        0.0,       6.0*eiz_l2,   0.0,           0.0,    0.0,           2.0*eiz_l,    0.0,       -6.0*eiz_l2,  0.0,           0.0,    0.0,           4.0*eiz_l,
    ];

    Ok(Mat12::from_row_slice(&data))
}

/// Local stiffness of an axial-only member in the 12-DOF layout
pub fn truss_local_stiffness(p: &MemberProperties) -> FEAResult<Mat12> {
    check_length(p.length)?;
    let ea_l = p.e * p.a / p.length;
    let mut k = Mat12::zeros();
    k[(0, 0)] = ea_l;
    k[(6, 6)] = ea_l;
    set_symmetric(&mut k, 0, 6, -ea_l);
    Ok(k)
}

/// Global stiffness of an axial-only member built from its direction cosines.
///
/// The 6x6 translational matrix `EA/L · [[ccᵀ, −ccᵀ], [−ccᵀ, ccᵀ]]` is placed
/// into the translational slots (0..3, 6..9) of the 12-DOF layout.
pub fn truss_stiffness(cosines: &[f64; 3], p: &MemberProperties) -> FEAResult<Mat12> {
    check_length(p.length)?;
    let ea_l = p.e * p.a / p.length;
    let mut k = Mat12::zeros();
    for r in 0..3 {
        for c in 0..3 {
            let v = ea_l * cosines[r] * cosines[c];
            k[(r, c)] = v;
            k[(r + 6, c + 6)] = v;
            k[(r, c + 6)] = -v;
            k[(r + 6, c)] = -v;
        }
    }
    Ok(k)
}

/// Consistent mass matrix of a beam element
pub fn beam_consistent_mass(p: &MemberProperties) -> FEAResult<Mat12> {
    check_length(p.length)?;
    let l = p.length;
    let l2 = l * l;
    let m = p.mass_per_length();
    let torsion = p.rho * p.polar_inertia() * l;
    let c = m * l / 420.0;

    let mut mass = Mat12::zeros();

    // Axial
    set_symmetric(&mut mass, 0, 0, m * l / 3.0);
    set_symmetric(&mut mass, 6, 6, m * l / 3.0);
    set_symmetric(&mut mass, 0, 6, m * l / 6.0);

    // Torsion
    set_symmetric(&mut mass, 3, 3, torsion / 3.0);
    set_symmetric(&mut mass, 9, 9, torsion / 3.0);
    set_symmetric(&mut mass, 3, 9, torsion / 6.0);

    // Bending in the local x-y plane (v, rz)
    set_symmetric(&mut mass, 1, 1, 156.0 * c);
    set_symmetric(&mut mass, 1, 5, 22.0 * l * c);
    set_symmetric(&mut mass, 1, 7, 54.0 * c);
    set_symmetric(&mut mass, 1, 11, -13.0 * l * c);
    set_symmetric(&mut mass, 5, 5, 4.0 * l2 * c);
    set_symmetric(&mut mass, 5, 7, 13.0 * l * c);
    set_symmetric(&mut mass, 5, 11, -3.0 * l2 * c);
    set_symmetric(&mut mass, 7, 7, 156.0 * c);
    set_symmetric(&mut mass, 7, 11, -22.0 * l * c);
    set_symmetric(&mut mass, 11, 11, 4.0 * l2 * c);

    // Bending in the local x-z plane (w, ry)
    set_symmetric(&mut mass, 2, 2, 156.0 * c);
    set_symmetric(&mut mass, 2, 4, -22.0 * l * c);
    set_symmetric(&mut mass, 2, 8, 54.0 * c);
    set_symmetric(&mut mass, 2, 10, 13.0 * l * c);
    set_symmetric(&mut mass, 4, 4, 4.0 * l2 * c);
    set_symmetric(&mut mass, 4, 8, -13.0 * l * c);
    set_symmetric(&mut mass, 4, 10, -3.0 * l2 * c);
    set_symmetric(&mut mass, 8, 8, 156.0 * c);
    set_symmetric(&mut mass, 8, 10, 22.0 * l * c);
    set_symmetric(&mut mass, 10, 10, 4.0 * l2 * c);

    Ok(mass)
}

/// Lumped mass matrix of a beam element: half the member mass at each node,
/// rotational inertia from the polar moment
pub fn beam_lumped_mass(p: &MemberProperties) -> FEAResult<Mat12> {
    check_length(p.length)?;
    let translational = p.mass_per_length() * p.length / 2.0;
    let rotational = p.rho * p.polar_inertia() * p.length / 2.0;
    let mut mass = Mat12::zeros();
    for node in 0..2 {
        for d in 0..3 {
            mass[(node * 6 + d, node * 6 + d)] = translational;
            mass[(node * 6 + 3 + d, node * 6 + 3 + d)] = rotational;
        }
    }
    Ok(mass)
}

/// Consistent mass of an axial member: rod mass on each translation, no rotary inertia
pub fn truss_consistent_mass(p: &MemberProperties) -> FEAResult<Mat12> {
    check_length(p.length)?;
    let total = p.mass_per_length() * p.length;
    let mut mass = Mat12::zeros();
    for d in 0..3 {
        set_symmetric(&mut mass, d, d, total / 3.0);
        set_symmetric(&mut mass, d + 6, d + 6, total / 3.0);
        set_symmetric(&mut mass, d, d + 6, total / 6.0);
    }
    Ok(mass)
}

/// Lumped mass of an axial member
pub fn truss_lumped_mass(p: &MemberProperties) -> FEAResult<Mat12> {
    check_length(p.length)?;
    let half = p.mass_per_length() * p.length / 2.0;
    let mut mass = Mat12::zeros();
    for d in 0..3 {
        mass[(d, d)] = half;
        mass[(d + 6, d + 6)] = half;
    }
    Ok(mass)
}

/// Geometric stiffness of a beam element for axial force `axial` (tension positive).
///
/// Only the transverse bending blocks are populated.
pub fn beam_geometric_stiffness(axial: f64, length: f64) -> FEAResult<Mat12> {
    check_length(length)?;
    let mut kg = Mat12::zeros();
    if axial.abs() < NEGLIGIBLE_AXIAL {
        return Ok(kg);
    }

    let l = length;
    let l2 = l * l;
    let p_l = axial / l;

    // Local x-y plane (v, rz)
    set_symmetric(&mut kg, 1, 1, 6.0 * p_l / 5.0);
    set_symmetric(&mut kg, 1, 5, p_l * l / 10.0);
    set_symmetric(&mut kg, 1, 7, -6.0 * p_l / 5.0);
    set_symmetric(&mut kg, 1, 11, p_l * l / 10.0);
    set_symmetric(&mut kg, 5, 5, 2.0 * p_l * l2 / 15.0);
    set_symmetric(&mut kg, 5, 7, -p_l * l / 10.0);
    set_symmetric(&mut kg, 5, 11, -p_l * l2 / 30.0);
    set_symmetric(&mut kg, 7, 7, 6.0 * p_l / 5.0);
    set_symmetric(&mut kg, 7, 11, -p_l * l / 10.0);
    set_symmetric(&mut kg, 11, 11, 2.0 * p_l * l2 / 15.0);

    // Local x-z plane (w, ry)
    set_symmetric(&mut kg, 2, 2, 6.0 * p_l / 5.0);
    set_symmetric(&mut kg, 2, 4, -p_l * l / 10.0);
    set_symmetric(&mut kg, 2, 8, -6.0 * p_l / 5.0);
    set_symmetric(&mut kg, 2, 10, -p_l * l / 10.0);
    set_symmetric(&mut kg, 4, 4, 2.0 * p_l * l2 / 15.0);
    set_symmetric(&mut kg, 4, 8, p_l * l / 10.0);
    set_symmetric(&mut kg, 4, 10, -p_l * l2 / 30.0);
    set_symmetric(&mut kg, 8, 8, 6.0 * p_l / 5.0);
    set_symmetric(&mut kg, 8, 10, p_l * l / 10.0);
    set_symmetric(&mut kg, 10, 10, 2.0 * p_l * l2 / 15.0);

    Ok(kg)
}

/// Geometric (string) stiffness of an axial member, transverse translations only
pub fn truss_geometric_stiffness(axial: f64, length: f64) -> FEAResult<Mat12> {
    check_length(length)?;
    let mut kg = Mat12::zeros();
    if axial.abs() < NEGLIGIBLE_AXIAL {
        return Ok(kg);
    }
    let p_l = axial / length;
    for d in [1, 2] {
        kg[(d, d)] = p_l;
        kg[(d + 6, d + 6)] = p_l;
        set_symmetric(&mut kg, d, d + 6, -p_l);
    }
    Ok(kg)
}

/// How a transverse force on a bending member is split between the end shears
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadShares {
    /// Lever rule: `(1−t)·F` at the i-node and `t·F` at the j-node
    #[default]
    Linear,
    /// Cubic Hermite fixed-end shears, in equilibrium with the end moments
    Consistent,
}

/// Equivalent nodal loads (local axes) for a concentrated force.
///
/// End moments `F·t(1−t)²L` and `F·t²(1−t)L` are added on bending members
/// regardless of `shares`, which only selects the transverse end shears.
///
/// # Arguments
/// * `force` - Load magnitude
/// * `t` - Relative position along the member, 0 at the i-node and 1 at the j-node
/// * `length` - Member length
/// * `axis` - Local component the force acts along (0 = x, 1 = y, 2 = z)
/// * `bending` - Whether the member carries end moments (false for axial members)
/// * `shares` - Transverse shear split on bending members
pub fn point_load_shares(
    force: f64,
    t: f64,
    length: f64,
    axis: usize,
    bending: bool,
    shares: LoadShares,
) -> Vec12 {
    let mut q = Vec12::zeros();
    if axis > 2 {
        return q;
    }
    if bending && axis > 0 && shares == LoadShares::Consistent {
        q[axis] += force * (1.0 - t).powi(2) * (1.0 + 2.0 * t);
        q[axis + 6] += force * t * t * (3.0 - 2.0 * t);
    } else {
        q[axis] += force * (1.0 - t);
        q[axis + 6] += force * t;
    }

    if bending {
        let m_i = force * t * (1.0 - t).powi(2) * length;
        let m_j = force * t * t * (1.0 - t) * length;
        match axis {
            1 => {
                q[5] += m_i;
                q[11] -= m_j;
            }
            2 => {
                q[4] -= m_i;
                q[10] += m_j;
            }
            _ => {}
        }
    }
    q
}

/// Equivalent nodal loads (local axes) for a linearly varying line load.
///
/// The intensity runs from `w1` at relative position `t1` to `w2` at `t2`.
/// The point-load shares are integrated with 3-point Gauss quadrature, which
/// is exact for this integrand. Over the full length uniform loads give `wL/2`
/// and `wL²/12`; trapezoids give `(2w1+w2)L/6`, `(w1+2w2)L/6` with linear
/// shares and `(7w1+3w2)L/20`, `(3w1+7w2)L/20` with consistent ones.
#[allow(clippy::too_many_arguments)]
pub fn line_load_shares(
    w1: f64,
    w2: f64,
    t1: f64,
    t2: f64,
    length: f64,
    axis: usize,
    bending: bool,
    shares: LoadShares,
) -> Vec12 {
    const GAUSS: [(f64, f64); 3] = [
        (-0.774_596_669_241_483_4, 5.0 / 9.0),
        (0.0, 8.0 / 9.0),
        (0.774_596_669_241_483_4, 5.0 / 9.0),
    ];

    let mut q = Vec12::zeros();
    let span = t2 - t1;
    if span <= 0.0 {
        return q;
    }
    let mid = 0.5 * (t1 + t2);
    let half = 0.5 * span;
    for (xi, weight) in GAUSS {
        let t = mid + half * xi;
        let w = w1 + (w2 - w1) * (t - t1) / span;
        let force = w * length * half * weight;
        q += point_load_shares(force, t, length, axis, bending, shares);
    }
    q
}
