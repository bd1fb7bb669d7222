//! Flat Lambda-CDM luminosity distances with the Planck 2018 parameter set.
//!
//! Radiation is included: photons from the CMB temperature and neutrinos via
//! the Komatsu et al. (2011) fitting formula, one massive species of 0.06 eV.

/// Speed of light in km/s.
const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;
const STEFAN_BOLTZMANN: f64 = 5.670_374_419e-8;
const SPEED_OF_LIGHT_M_S: f64 = 299_792_458.0;
const GRAVITATIONAL_CONSTANT: f64 = 6.674_30e-11;
const METRES_PER_MPC: f64 = 3.085_677_581_491_367_3e22;
const BOLTZMANN_EV_PER_K: f64 = 8.617_333_262e-5;
/// (4/11)^(1/3): neutrino to photon temperature ratio.
const NEUTRINO_TEMPERATURE_RATIO: f64 = 0.713_765_855_503_608_2;

// Komatsu et al. (2011) eq. 26 fitting constants.
const NU_PREFACTOR: f64 = 0.227_107_317_66;
const NU_P: f64 = 1.83;
const NU_INV_P: f64 = 0.546_448_087_43;
const NU_K: f64 = 0.3173;

const QUADRATURE_TOLERANCE: f64 = 1e-12;
const QUADRATURE_MAX_DEPTH: u32 = 48;

#[derive(Debug, Clone, PartialEq)]
pub struct CosmologyParams {
    /// Hubble constant in km/s/Mpc.
    pub h0: f64,
    /// Present-day non-relativistic matter density.
    pub omega_m0: f64,
    /// CMB temperature today in kelvin.
    pub t_cmb0: f64,
    pub n_eff: f64,
    /// Neutrino masses in eV, one entry per species.
    pub neutrino_masses_ev: Vec<f64>,
}

impl CosmologyParams {
    /// Planck 2018 paper VI, table 2 (TT,TE,EE+lowE+lensing+BAO).
    pub fn planck18() -> Self {
        Self {
            h0: 67.66,
            omega_m0: 0.30966,
            t_cmb0: 2.7255,
            n_eff: 3.046,
            neutrino_masses_ev: vec![0.0, 0.0, 0.06],
        }
    }
}

/// Flat FLRW model; immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Cosmology {
    params: CosmologyParams,
    omega_gamma0: f64,
    omega_de0: f64,
    massless_species: f64,
    /// m / (k_B T_nu0) for each massive species.
    massive_nu_y: Vec<f64>,
}

impl Default for Cosmology {
    fn default() -> Self {
        Self::planck18()
    }
}

impl Cosmology {
    pub fn planck18() -> Self {
        Self::new(CosmologyParams::planck18())
    }

    pub fn new(params: CosmologyParams) -> Self {
        let h0_per_second = params.h0 * 1e3 / METRES_PER_MPC;
        let critical_density =
            3.0 * h0_per_second * h0_per_second / (8.0 * std::f64::consts::PI * GRAVITATIONAL_CONSTANT);
        let radiation_constant = 4.0 * STEFAN_BOLTZMANN / SPEED_OF_LIGHT_M_S.powi(3);
        let omega_gamma0 = radiation_constant * params.t_cmb0.powi(4) / critical_density;

        let t_nu0 = NEUTRINO_TEMPERATURE_RATIO * params.t_cmb0;
        let massive_nu_y: Vec<f64> = params
            .neutrino_masses_ev
            .iter()
            .filter(|m| **m > 0.0)
            .map(|m| m / (BOLTZMANN_EV_PER_K * t_nu0))
            .collect();
        let massless_species = (params.neutrino_masses_ev.len() - massive_nu_y.len()) as f64;

        let mut cosmology = Self {
            params,
            omega_gamma0,
            omega_de0: 0.0,
            massless_species,
            massive_nu_y,
        };
        let omega_nu0 = omega_gamma0 * cosmology.neutrino_relative_density(0.0);
        cosmology.omega_de0 = 1.0 - cosmology.params.omega_m0 - omega_gamma0 - omega_nu0;
        cosmology
    }

    pub fn params(&self) -> &CosmologyParams {
        &self.params
    }

    /// Hubble distance c/H0 in Mpc.
    pub fn hubble_distance_mpc(&self) -> f64 {
        SPEED_OF_LIGHT_KM_S / self.params.h0
    }

    /// Neutrino energy density relative to photons at redshift `z`.
    fn neutrino_relative_density(&self, z: f64) -> f64 {
        let species = self.params.neutrino_masses_ev.len() as f64;
        if species == 0.0 {
            return 0.0;
        }
        let n_eff_per_species = self.params.n_eff / species;
        let massive: f64 = self
            .massive_nu_y
            .iter()
            .map(|y| (1.0 + (NU_K * y / (1.0 + z)).powf(NU_P)).powf(NU_INV_P))
            .sum();
        NU_PREFACTOR * n_eff_per_species * (massive + self.massless_species)
    }

    /// 1 / E(z) where E(z) = H(z) / H0.
    fn inverse_efunc(&self, z: f64) -> f64 {
        let zp1 = 1.0 + z;
        let radiation = self.omega_gamma0 * (1.0 + self.neutrino_relative_density(z));
        let e2 = self.params.omega_m0 * zp1.powi(3) + radiation * zp1.powi(4) + self.omega_de0;
        1.0 / e2.sqrt()
    }

    /// Line-of-sight comoving distance in Mpc.
    pub fn comoving_distance_mpc(&self, z: f64) -> Option<f64> {
        if !z.is_finite() || z < 0.0 {
            return None;
        }
        if z == 0.0 {
            return Some(0.0);
        }
        let integral = adaptive_simpson(|x| self.inverse_efunc(x), 0.0, z);
        let distance = self.hubble_distance_mpc() * integral;
        distance.is_finite().then_some(distance)
    }

    /// Luminosity distance in Mpc; `None` for negative or non-finite redshift.
    pub fn luminosity_distance_mpc(&self, z: f64) -> Option<f64> {
        self.comoving_distance_mpc(z).map(|dc| (1.0 + z) * dc)
    }
}

fn adaptive_simpson<F: Fn(f64) -> f64>(f: F, a: f64, b: f64) -> f64 {
    let fa = f(a);
    let fb = f(b);
    let m = 0.5 * (a + b);
    let fm = f(m);
    let whole = simpson(a, b, fa, fm, fb);
    refine(&f, a, b, fa, fm, fb, whole, QUADRATURE_TOLERANCE, QUADRATURE_MAX_DEPTH)
}

fn simpson(a: f64, b: f64, fa: f64, fm: f64, fb: f64) -> f64 {
    (b - a) / 6.0 * (fa + 4.0 * fm + fb)
}

#[allow(clippy::too_many_arguments)]
fn refine<F: Fn(f64) -> f64>(
    f: &F,
    a: f64,
    b: f64,
    fa: f64,
    fm: f64,
    fb: f64,
    whole: f64,
    tolerance: f64,
    depth: u32,
) -> f64 {
    let m = 0.5 * (a + b);
    let lm = 0.5 * (a + m);
    let rm = 0.5 * (m + b);
    let flm = f(lm);
    let frm = f(rm);
    let left = simpson(a, m, fa, flm, fm);
    let right = simpson(m, b, fm, frm, fb);
    let delta = left + right - whole;
    if depth == 0 || delta.abs() <= 15.0 * tolerance {
        return left + right + delta / 15.0;
    }
    refine(f, a, m, fa, flm, fm, left, tolerance / 2.0, depth - 1)
        + refine(f, m, b, fm, frm, fb, right, tolerance / 2.0, depth - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_relative(actual: f64, expected: f64, tolerance: f64) {
        let relative = ((actual - expected) / expected).abs();
        assert!(relative < tolerance, "expected {expected}, got {actual}");
    }

    #[test]
    fn planck18_luminosity_distances() {
        let cosmo = Cosmology::planck18();
        assert_relative(cosmo.luminosity_distance_mpc(0.1).unwrap(), 475.822_267_5, 1e-7);
        assert_relative(cosmo.luminosity_distance_mpc(0.01).unwrap(), 44.647_106_1, 1e-7);
        assert_relative(cosmo.luminosity_distance_mpc(1.0).unwrap(), 6791.268_942, 1e-7);
    }

    #[test]
    fn flatness_closes_the_budget() {
        let cosmo = Cosmology::planck18();
        assert_relative(cosmo.omega_gamma0, 5.402_015e-5, 1e-5);
        assert_relative(cosmo.omega_de0, 0.688_846_3, 1e-6);
    }

    #[test]
    fn rejects_negative_and_non_finite_redshift() {
        let cosmo = Cosmology::planck18();
        assert_eq!(cosmo.luminosity_distance_mpc(-0.2), None);
        assert_eq!(cosmo.luminosity_distance_mpc(f64::NAN), None);
        assert_eq!(cosmo.luminosity_distance_mpc(0.0), Some(0.0));
    }
}
