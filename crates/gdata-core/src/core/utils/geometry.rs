use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};

const DEGENERACY_EPSILON: f64 = 1e-10;

/// Places the third atom of an internal-coordinate chain in the xz-plane.
///
/// The new atom is bonded to `bond_atom` at distance `bond_length` and forms the angle
/// `angle_degrees` with `angle_atom`. Returns `None` if the two references coincide.
pub fn place_in_plane(
    bond_atom: &Point3<f64>,
    angle_atom: &Point3<f64>,
    bond_length: f64,
    angle_degrees: f64,
) -> Option<Point3<f64>> {
    let axis = angle_atom - bond_atom;
    if axis.norm() < DEGENERACY_EPSILON {
        return None;
    }
    let u = axis.normalize();
    let mut perpendicular = Vector3::y().cross(&u);
    if perpendicular.norm() < DEGENERACY_EPSILON {
        perpendicular = Vector3::x().cross(&u);
    }
    let n = perpendicular.normalize();
    let theta = angle_degrees.to_radians();
    Some(bond_atom + (u * theta.cos() + n * theta.sin()) * bond_length)
}

/// Natural-extension reference frame placement of an atom from three references.
///
/// The chain is `dihedral_atom - angle_atom - bond_atom - new`. Returns `None` if the
/// three references are collinear.
pub fn place_from_internal(
    bond_atom: &Point3<f64>,
    angle_atom: &Point3<f64>,
    dihedral_atom: &Point3<f64>,
    bond_length: f64,
    angle_degrees: f64,
    dihedral_degrees: f64,
) -> Option<Point3<f64>> {
    let bc = bond_atom - angle_atom;
    if bc.norm() < DEGENERACY_EPSILON {
        return None;
    }
    let bc = bc.normalize();
    let normal = (angle_atom - dihedral_atom).cross(&bc);
    if normal.norm() < DEGENERACY_EPSILON {
        return None;
    }
    let n = normal.normalize();
    let m = n.cross(&bc);

    let theta = angle_degrees.to_radians();
    let phi = dihedral_degrees.to_radians();
    let local = Vector3::new(
        -bond_length * theta.cos(),
        bond_length * theta.sin() * phi.cos(),
        bond_length * theta.sin() * phi.sin(),
    );
    Some(bond_atom + bc * local.x + m * local.y + n * local.z)
}

/// Mass-weighted average position. A zero total mass yields the origin.
pub fn mass_centre(masses: &[f64], positions: &[Point3<f64>]) -> Point3<f64> {
    let total: f64 = masses.iter().sum();
    if total == 0.0 {
        return Point3::origin();
    }
    let weighted = masses
        .iter()
        .zip(positions)
        .fold(Vector3::zeros(), |acc, (m, p)| acc + p.coords * *m);
    Point3::from(weighted / total)
}

/// Classical inertia tensor about `centre`:
/// `I_jj = sum m (r^2 - r_j^2)`, `I_jk = -sum m r_j r_k`.
pub fn inertia_tensor(
    masses: &[f64],
    positions: &[Point3<f64>],
    centre: &Point3<f64>,
) -> Matrix3<f64> {
    let mut tensor = Matrix3::zeros();
    for (m, p) in masses.iter().zip(positions) {
        let r = p - centre;
        let r2 = r.norm_squared();
        for j in 0..3 {
            for k in 0..3 {
                let delta = if j == k { r2 } else { 0.0 };
                tensor[(j, k)] += m * (delta - r[j] * r[k]);
            }
        }
    }
    tensor
}

/// Eigen-decomposition of an inertia tensor with eigenvalues sorted ascending.
///
/// The returned matrix holds the matching unit eigenvectors as columns.
pub fn principal_axes(tensor: &Matrix3<f64>) -> (Vector3<f64>, Matrix3<f64>) {
    let eigen = SymmetricEigen::new(*tensor);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[a]
            .partial_cmp(&eigen.eigenvalues[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let values = Vector3::new(
        eigen.eigenvalues[order[0]],
        eigen.eigenvalues[order[1]],
        eigen.eigenvalues[order[2]],
    );
    let axes = Matrix3::from_columns(&[
        eigen.eigenvectors.column(order[0]).into_owned(),
        eigen.eigenvectors.column(order[1]).into_owned(),
        eigen.eigenvectors.column(order[2]).into_owned(),
    ]);
    (values, axes)
}

/// Fixes the sign of every axis so that the largest-magnitude projection of
/// `relative_positions` onto it is positive (the first one wins ties).
///
/// Axes onto which every projection vanishes fall back to making the axis' own
/// largest-magnitude component positive.
pub fn orient_axes(axes: &Matrix3<f64>, relative_positions: &[Vector3<f64>]) -> Matrix3<f64> {
    let mut oriented = *axes;
    for k in 0..3 {
        let axis = axes.column(k).into_owned();
        let reference = largest_magnitude(relative_positions.iter().map(|r| r.dot(&axis)))
            .filter(|v| v.abs() > DEGENERACY_EPSILON)
            .or_else(|| largest_magnitude(axis.iter().copied()))
            .unwrap_or(1.0);
        if reference < 0.0 {
            oriented.set_column(k, &(-axis));
        }
    }
    oriented
}

fn largest_magnitude(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |best, v| match best {
        Some(b) if b.abs() >= v.abs() => Some(b),
        _ => Some(v),
    })
}

pub fn bond_angle(a: &Point3<f64>, vertex: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - vertex).angle(&(b - vertex)).to_degrees()
}
