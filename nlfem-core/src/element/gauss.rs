//! Gauss quadrature rules for numerical integration.
//!
//! Rules are provided for:
//! - 1D line integration (tensor-product base rule)
//! - Hexahedral and tetrahedral volume integration (solid domains)
//! - Quadrilateral and triangular area integration (contact facets)

/// A Gauss quadrature point with natural coordinates and weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussPoint {
    /// Natural coordinates.
    /// - Hexahedral / quadrilateral: [ξ, η, ζ, 0] in [-1, 1]
    /// - Tetrahedral: [L1, L2, L3, L4] barycentric
    /// - Triangular: [L1, L2, L3, 0] area coordinates
    pub coords: [f64; 4],
    /// Integration weight.
    pub weight: f64,
}

impl GaussPoint {
    /// Create a new Gauss point.
    pub fn new(coords: [f64; 4], weight: f64) -> Self {
        Self { coords, weight }
    }

    #[inline]
    pub fn xi(&self) -> f64 {
        self.coords[0]
    }

    #[inline]
    pub fn eta(&self) -> f64 {
        self.coords[1]
    }

    #[inline]
    pub fn zeta(&self) -> f64 {
        self.coords[2]
    }
}

/// 1D Gauss-Legendre points and weights on [-1, 1].
///
/// # Panics
///
/// Panics if `n` is not in 1..=3.
pub fn gauss_1d(n: usize) -> Vec<(f64, f64)> {
    match n {
        1 => vec![(0.0, 2.0)],
        2 => {
            let p = 1.0 / 3.0_f64.sqrt();
            vec![(-p, 1.0), (p, 1.0)]
        }
        3 => {
            let p = (3.0 / 5.0_f64).sqrt();
            vec![(-p, 5.0 / 9.0), (0.0, 8.0 / 9.0), (p, 5.0 / 9.0)]
        }
        _ => panic!("gauss_1d: n must be 1, 2, or 3, got {}", n),
    }
}

/// Tetrahedral rule on the unit tetrahedron (weights sum to 1/6).
///
/// # Panics
///
/// Panics if `n` is not 1 or 4.
pub fn gauss_tet(n: usize) -> Vec<GaussPoint> {
    match n {
        1 => vec![GaussPoint::new([0.25; 4], 1.0 / 6.0)],
        4 => {
            let sqrt5 = 5.0_f64.sqrt();
            let a = (5.0 + 3.0 * sqrt5) / 20.0;
            let b = (5.0 - sqrt5) / 20.0;
            let w = 1.0 / 24.0;
            vec![
                GaussPoint::new([a, b, b, b], w),
                GaussPoint::new([b, a, b, b], w),
                GaussPoint::new([b, b, a, b], w),
                GaussPoint::new([b, b, b, a], w),
            ]
        }
        _ => panic!("gauss_tet: n must be 1 or 4, got {}", n),
    }
}

/// Tensor-product rule on [-1, 1]³ with `n` points per direction.
///
/// # Panics
///
/// Panics if `n` is not 1, 2, or 3.
pub fn gauss_hex(n: usize) -> Vec<GaussPoint> {
    if !(1..=3).contains(&n) {
        panic!("gauss_hex: n must be 1, 2, or 3, got {}", n);
    }

    let rule = gauss_1d(n);
    let mut points = Vec::with_capacity(n * n * n);
    // ξ varies fastest, matching the node ordering of the brick
    for &(zeta, wz) in &rule {
        for &(eta, we) in &rule {
            for &(xi, wx) in &rule {
                points.push(GaussPoint::new([xi, eta, zeta, 0.0], wx * we * wz));
            }
        }
    }
    points
}

/// Triangle rule in area coordinates on the unit triangle (weights sum to 1/2).
///
/// # Panics
///
/// Panics if `n` is not 1 or 3.
pub fn gauss_tri(n: usize) -> Vec<GaussPoint> {
    match n {
        1 => vec![GaussPoint::new([1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0, 0.0], 0.5)],
        3 => {
            let w = 1.0 / 6.0;
            vec![
                GaussPoint::new([2.0 / 3.0, 1.0 / 6.0, 1.0 / 6.0, 0.0], w),
                GaussPoint::new([1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0, 0.0], w),
                GaussPoint::new([1.0 / 6.0, 1.0 / 6.0, 2.0 / 3.0, 0.0], w),
            ]
        }
        _ => panic!("gauss_tri: n must be 1 or 3, got {}", n),
    }
}

/// Tensor-product rule on [-1, 1]² with `n` points per direction.
///
/// # Panics
///
/// Panics if `n` is not 1, 2, or 3.
pub fn gauss_quad(n: usize) -> Vec<GaussPoint> {
    if !(1..=3).contains(&n) {
        panic!("gauss_quad: n must be 1, 2, or 3, got {}", n);
    }

    let rule = gauss_1d(n);
    let mut points = Vec::with_capacity(n * n);
    for &(eta, we) in &rule {
        for &(xi, wx) in &rule {
            points.push(GaussPoint::new([xi, eta, 0.0, 0.0], wx * we));
        }
    }
    points
}
