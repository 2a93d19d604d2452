/// Gaussian beam profile with unit height whose full width at half maximum
/// equals `fwhm`.
pub fn gaussian_profile(position: f64, fwhm: f64) -> f64 {
    let ratio = position / fwhm;
    (-4.0 * std::f64::consts::LN_2 * ratio * ratio).exp()
}
