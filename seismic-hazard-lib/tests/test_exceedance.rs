use seismic_hazard_lib::auxilary::approx_equal;
use seismic_hazard_lib::curve::XySequence;
use seismic_hazard_lib::exceedance::{ccdf_table, joint_exceedance, phi_bar, ExceedanceModel};
use seismic_hazard_lib::imt::Imt;

const EPSILON: f64 = 1e-9;

#[test]
fn test_gaussian_sanity() {
    // untruncated standard normal at the median
    let p = ExceedanceModel::TruncationOff.exceedance(0.0, 1.0, 3.0, Imt::Pga, 0.0);
    assert!(approx_equal(p, 0.5, EPSILON));

    // upper truncation at 3σ re-normalizes the same query
    let p = ExceedanceModel::TruncationUpperOnly.exceedance(0.0, 1.0, 3.0, Imt::Pga, 0.0);
    let expected = (0.5 - phi_bar(3.0)) / (1.0 - phi_bar(3.0));
    assert!(approx_equal(p, expected, EPSILON));
    assert!(approx_equal(p, 0.4993, 1e-4));
}

#[test]
fn test_upper_truncation_clamp() {
    let model = ExceedanceModel::TruncationUpperOnly;
    // exactly at μ + nσ the probability is zero
    assert_eq!(model.exceedance(0.0, 1.0, 3.0, Imt::Pga, 3.0), 0.0);
    assert_eq!(model.exceedance(0.0, 1.0, 3.0, Imt::Pga, 10.0), 0.0);
    // far below the median it saturates at one
    assert!(approx_equal(
        model.exceedance(0.0, 1.0, 3.0, Imt::Pga, -1.0e3),
        1.0,
        EPSILON
    ));
}

#[test]
fn test_ccdf_table_matches_reference() {
    let table = ccdf_table();
    let mut eps = -3.99;
    while eps < 3.99 {
        let from_table = table.get(0.0, 1.0, eps);
        assert!(
            (from_table - phi_bar(eps)).abs() < 1e-5,
            "table disagrees with reference at ε = {eps}"
        );
        eps += 0.173;
    }
    // out-of-range queries saturate
    assert_eq!(table.get(0.0, 1.0, -4.5), 1.0);
    assert_eq!(table.get(0.0, 1.0, 4.5), 0.0);
}

#[test]
fn test_three_sigma_table_path_matches_direct() {
    let table_model = ExceedanceModel::Truncation3SigmaUpper;
    let direct_model = ExceedanceModel::TruncationUpperOnly;
    for value in [-2.0, -0.5, 0.0, 0.8, 2.4, 2.99] {
        let from_table = table_model.exceedance(0.0, 1.0, 99.0, Imt::Pga, value);
        let direct = direct_model.exceedance(0.0, 1.0, 3.0, Imt::Pga, value);
        assert!(
            (from_table - direct).abs() < 1e-5,
            "table and direct paths disagree at {value}"
        );
    }
}

#[test]
fn test_peer_mixture_ignores_supplied_sigma() {
    let model = ExceedanceModel::PeerMixtureModel;
    let a = model.exceedance(0.0, 0.1, 3.0, Imt::Pga, 0.4);
    let b = model.exceedance(0.0, 5.0, 3.0, Imt::Pga, 0.4);
    assert!(approx_equal(a, b, EPSILON));
    // average of two component gaussians at σ 0.65·0.8 and 0.65·1.2
    let expected = 0.5 * (phi_bar(0.4 / 0.52) + phi_bar(0.4 / 0.78));
    assert!(approx_equal(a, expected, EPSILON));
}

#[test]
fn test_ceus_short_period_clamp() {
    // SA 0.2 s clamps at 6 g; queries at and beyond ln(6) return zero
    let model = ExceedanceModel::NshmCeusMaxIntensity;
    let six_g = 6.0_f64.ln();
    assert_eq!(model.exceedance(six_g - 0.2, 1.0, 3.0, Imt::Sa0P2, six_g), 0.0);
    assert!(model.exceedance(six_g - 0.2, 1.0, 3.0, Imt::Sa0P2, six_g - 0.8) > 0.0);
    // long-period SA is unbounded; only the nσ limit applies
    let p = model.exceedance(six_g - 0.2, 1.0, 3.0, Imt::Sa1P0, six_g);
    assert!(p > 0.0);
}

#[test]
fn test_ceus_three_sigma_prefers_table_inside_clamp() {
    let model = ExceedanceModel::NshmCeus3SigmaMaxIntensity;
    // μ + 3σ well inside the 3 g PGA clamp: table path
    let p_table = model.exceedance(-2.0, 0.5, 99.0, Imt::Pga, -1.0);
    let p_direct =
        ExceedanceModel::TruncationUpperOnly.exceedance(-2.0, 0.5, 3.0, Imt::Pga, -1.0);
    assert!((p_table - p_direct).abs() < 1e-5);
    // μ + 3σ outside the clamp: clamped limit takes over
    let three_g = 3.0_f64.ln();
    assert_eq!(model.exceedance(three_g, 1.0, 99.0, Imt::Pga, three_g + 0.1), 0.0);
}

#[test]
fn test_joint_exceedance_flat_curves() {
    let xs = vec![0.0, 1.0, 2.0, 3.0];
    let a = XySequence::new(xs.clone(), vec![0.1; 4]).unwrap();
    let b = XySequence::new(xs, vec![0.1; 4]).unwrap();
    let joint = joint_exceedance(&[a, b]).unwrap();
    for y in joint.ys() {
        assert!(approx_equal(*y, 0.19, 1e-12));
    }
}

#[test]
fn test_heaviside_ignores_sigma() {
    let model = ExceedanceModel::None;
    for sigma in [0.1, 1.0, 10.0] {
        assert_eq!(model.exceedance(1.0, sigma, 3.0, Imt::Pga, 0.5), 1.0);
        assert_eq!(model.exceedance(1.0, sigma, 3.0, Imt::Pga, 1.5), 0.0);
    }
}
