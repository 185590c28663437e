use statrs::distribution::{ContinuousCDF, StudentsT};

use super::{mean, sample_variance, ComparisonResult, StatisticalTest};

/// Welch's t-test for two independent samples with potentially unequal variances.
#[derive(Debug, Clone)]
pub struct WelchTTest {
    /// Significance threshold on the two-tailed p-value (default: 0.05).
    pub alpha: f64,
}

impl Default for WelchTTest {
    fn default() -> Self {
        Self { alpha: 0.05 }
    }
}

impl WelchTTest {
    /// Create a new Welch's t-test with the given significance threshold.
    ///
    /// # Panics
    /// Panics if alpha is not in the range (0, 1).
    pub fn new(alpha: f64) -> Self {
        assert!(
            alpha > 0.0 && alpha < 1.0,
            "alpha must be between 0 and 1 (exclusive)"
        );
        Self { alpha }
    }

    /// Calculate degrees of freedom using the Welch-Satterthwaite equation.
    ///
    /// df = (var1/n1 + var2/n2)^2 / ((var1/n1)^2/(n1-1) + (var2/n2)^2/(n2-1))
    fn welch_satterthwaite_df(var1: f64, n1: usize, var2: f64, n2: usize) -> f64 {
        let s1 = var1 / n1 as f64;
        let s2 = var2 / n2 as f64;
        let numerator = (s1 + s2).powi(2);
        let denominator = (s1.powi(2) / (n1 - 1) as f64) + (s2.powi(2) / (n2 - 1) as f64);

        if denominator == 0.0 {
            return (n1.min(n2) - 1) as f64;
        }

        numerator / denominator
    }
}

impl StatisticalTest for WelchTTest {
    fn analyze(&self, baseline: &[f64], treatment: &[f64]) -> ComparisonResult {
        let n1 = baseline.len();
        let n2 = treatment.len();

        if n1 < 2 || n2 < 2 {
            return ComparisonResult::undefined();
        }

        let (Some(mean1), Some(mean2)) = (mean(baseline), mean(treatment)) else {
            return ComparisonResult::undefined();
        };
        let var1 = sample_variance(baseline, mean1).unwrap_or(0.0);
        let var2 = sample_variance(treatment, mean2).unwrap_or(0.0);
        let mean_diff = mean1 - mean2;

        let se = (var1 / n1 as f64 + var2 / n2 as f64).sqrt();

        // Both sides collapsed to a single value each.
        if se == 0.0 {
            return if mean_diff == 0.0 {
                ComparisonResult {
                    mean_diff: Some(0.0),
                    p_value: None,
                    significant: false,
                }
            } else {
                ComparisonResult {
                    mean_diff: Some(mean_diff),
                    p_value: Some(0.0),
                    significant: true,
                }
            };
        }

        let t_statistic = mean_diff / se;
        let df = Self::welch_satterthwaite_df(var1, n1, var2, n2);

        // Two-tailed: p = 2 * P(T > |t|)
        let p_value = StudentsT::new(0.0, 1.0, df)
            .ok()
            .map(|t_dist| 2.0 * (1.0 - t_dist.cdf(t_statistic.abs())))
            .filter(|p| p.is_finite());

        ComparisonResult {
            mean_diff: Some(mean_diff),
            p_value,
            significant: p_value.is_some_and(|p| p < self.alpha),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_constant_samples_are_undefined() {
        let test = WelchTTest::default();
        let result = test.analyze(&[10.0; 4], &[10.0; 4]);

        assert!(!result.significant);
        assert_eq!(result.p_value, None);
        assert_eq!(result.mean_diff, Some(0.0));
    }

    #[test]
    fn test_constant_but_different_samples_are_significant() {
        let test = WelchTTest::default();
        let result = test.analyze(&[10.0, 10.0, 10.0, 10.0], &[5.0, 5.0, 5.0, 5.0]);

        assert!(result.significant);
        assert!(result.p_value.unwrap() < 0.05);
        assert_eq!(result.mean_diff, Some(5.0));
    }

    #[test]
    fn test_identical_varied_samples() {
        let test = WelchTTest::default();
        let samples = [9.0, 10.0, 11.0, 10.0];
        let result = test.analyze(&samples, &samples);

        assert!(!result.significant);
        assert!((result.p_value.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_clearly_different_samples() {
        let test = WelchTTest::default();
        let baseline = [1000.0, 1001.0, 1002.0, 999.0, 1000.0];
        let treatment = [100.0, 101.0, 102.0, 99.0, 100.0];

        let result = test.analyze(&baseline, &treatment);

        assert!(result.significant);
        assert!(result.p_value.unwrap() < 0.05);
        assert!(result.mean_diff.unwrap() > 0.0);

        let reversed = test.analyze(&treatment, &baseline);
        assert!(reversed.significant);
        assert!(reversed.mean_diff.unwrap() < 0.0);
    }

    #[test]
    fn test_overlapping_samples_not_significant() {
        let test = WelchTTest::default();
        let result = test.analyze(&[10.0, 12.0, 9.0, 11.0], &[11.0, 9.5, 10.5, 12.0]);

        assert!(!result.significant);
        assert!(result.p_value.unwrap() > 0.05);
    }

    #[test]
    fn test_insufficient_samples() {
        let test = WelchTTest::default();
        let result = test.analyze(&[100.0], &[200.0, 210.0]);

        assert_eq!(result, ComparisonResult::undefined());
    }

    #[test]
    fn test_custom_alpha() {
        let test = WelchTTest::new(0.01);
        assert_eq!(test.alpha, 0.01);
    }

    #[test]
    #[should_panic(expected = "alpha must be between 0 and 1")]
    fn test_invalid_alpha() {
        WelchTTest::new(1.5);
    }
}
