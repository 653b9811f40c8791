//! Determinism tests for the random number generator
//!
//! The entire simulator's reproducibility contract rests on the RNG: same
//! seed, same call sequence, same draws, on every platform.

use epidemic_simulator_core_rs::rng::RngManager;

// ============================================================================
// Test 1: Raw stream determinism
// ============================================================================

#[test]
fn test_same_seed_same_stream() {
    let mut a = RngManager::new(12345);
    let mut b = RngManager::new(12345);
    for _ in 0..1000 {
        assert_eq!(a.next(), b.next());
    }
}

#[test]
fn test_different_seeds_different_streams() {
    let mut a = RngManager::new(1);
    let mut b = RngManager::new(2);
    let same = (0..100).filter(|_| a.next() == b.next()).count();
    assert_eq!(same, 0);
}

#[test]
fn test_zero_seed_is_remapped() {
    // xorshift has an all-zero fixed point; seed 0 must not produce it.
    let mut rng = RngManager::new(0);
    assert_ne!(rng.get_state(), 0);
    for _ in 0..100 {
        assert_ne!(rng.next(), 0);
    }
}

// ============================================================================
// Test 2: Uniform doubles
// ============================================================================

#[test]
fn test_next_f64_in_unit_interval() {
    let mut rng = RngManager::new(99);
    for _ in 0..10_000 {
        let x = rng.next_f64();
        assert!((0.0..1.0).contains(&x));
    }
}

#[test]
fn test_next_f64_mean_near_half() {
    let mut rng = RngManager::new(7);
    let n = 100_000;
    let sum: f64 = (0..n).map(|_| rng.next_f64()).sum();
    let mean = sum / n as f64;
    assert!((mean - 0.5).abs() < 0.01, "mean {} too far from 0.5", mean);
}

// ============================================================================
// Test 3: Binomial sampling
// ============================================================================

#[test]
fn test_binomial_bounds_and_edges() {
    let mut rng = RngManager::new(11);
    for _ in 0..1000 {
        let k = rng.binomial(50, 0.3);
        assert!((0..=50).contains(&k));
    }
    assert_eq!(rng.binomial(100, 0.0), 0);
    assert_eq!(rng.binomial(100, 1.0), 100);
    assert_eq!(rng.binomial(0, 0.5), 0);
}

#[test]
fn test_binomial_mean_matches_np() {
    let mut rng = RngManager::new(13);
    let (n, p, draws) = (200i64, 0.37, 20_000);
    let sum: i64 = (0..draws).map(|_| rng.binomial(n, p)).sum();
    let mean = sum as f64 / draws as f64;
    let expected = n as f64 * p;
    // Standard error of the mean is ~0.05 here; 1.0 is a generous band.
    assert!((mean - expected).abs() < 1.0, "mean {} vs expected {}", mean, expected);
}

#[test]
fn test_binomial_high_p_symmetry() {
    // p > 0.5 goes through the complement path; the mean must still match.
    let mut rng = RngManager::new(17);
    let (n, p, draws) = (200i64, 0.93, 20_000);
    let sum: i64 = (0..draws).map(|_| rng.binomial(n, p)).sum();
    let mean = sum as f64 / draws as f64;
    assert!((mean - 186.0).abs() < 1.0, "mean {} vs expected 186", mean);
}

// ============================================================================
// Test 4: Multinomial sampling
// ============================================================================

#[test]
fn test_multinomial_never_overdraws() {
    let mut rng = RngManager::new(23);
    for _ in 0..1000 {
        let counts = rng.multinomial(100, &[0.2, 0.3, 0.4]);
        assert_eq!(counts.len(), 3);
        let total: i64 = counts.iter().sum();
        assert!(total <= 100);
        assert!(counts.iter().all(|&c| c >= 0));
    }
}

#[test]
fn test_multinomial_exhaustive_probs_partition() {
    // Probabilities summing to 1 must allocate every member.
    let mut rng = RngManager::new(29);
    for _ in 0..1000 {
        let counts = rng.multinomial(100, &[0.25, 0.25, 0.5]);
        let total: i64 = counts.iter().sum();
        assert_eq!(total, 100);
    }
}

#[test]
fn test_multinomial_deterministic() {
    let mut a = RngManager::new(31);
    let mut b = RngManager::new(31);
    for _ in 0..100 {
        assert_eq!(a.multinomial(50, &[0.1, 0.2]), b.multinomial(50, &[0.1, 0.2]));
    }
}
