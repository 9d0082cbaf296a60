//! Removal of dark-hour readings from a day's samples.
//!
//! Before sunrise and after sunset the inverter still answers but reports a
//! today-energy of zero. Trimming drops those leading and trailing runs and
//! keeps everything from the first producing sample to the last one,
//! including any zero readings in between.

use omnik_types::Sample;

/// Trim leading and trailing samples whose today-energy is zero.
///
/// `samples` must be in ascending time order. A day with no producing
/// sample (or no samples at all) trims to an empty vector.
pub fn trim_dark(mut samples: Vec<Sample>) -> Vec<Sample> {
    let Some(first) = samples.iter().position(Sample::is_producing) else {
        return Vec::new();
    };
    // A producing sample exists, so rposition finds one too.
    let last = samples
        .iter()
        .rposition(Sample::is_producing)
        .unwrap_or(first);

    samples.truncate(last + 1);
    samples.drain(..first);
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn day(energies: &[f32]) -> Vec<Sample> {
        energies
            .iter()
            .enumerate()
            .map(|(i, &kwh)| {
                let ts = datetime!(2024-01-05 05:00:00 UTC) + time::Duration::hours(i as i64);
                let mut sample = Sample::at(ts);
                sample.energy_today = kwh;
                sample
            })
            .collect()
    }

    fn energies(samples: &[Sample]) -> Vec<f32> {
        samples.iter().map(|s| s.energy_today).collect()
    }

    #[test]
    fn test_trims_leading_and_trailing_zeros() {
        let trimmed = trim_dark(day(&[0.0, 0.0, 2.0, 5.0, 0.0]));
        assert_eq!(energies(&trimmed), vec![2.0, 5.0]);
    }

    #[test]
    fn test_keeps_interior_zeros() {
        let trimmed = trim_dark(day(&[0.0, 1.5, 0.0, 3.0, 0.0, 0.0]));
        assert_eq!(energies(&trimmed), vec![1.5, 0.0, 3.0]);
    }

    #[test]
    fn test_keeps_order_and_timestamps() {
        let input = day(&[0.0, 2.0, 5.0]);
        let expected = input[1..].to_vec();
        assert_eq!(trim_dark(input), expected);
    }

    #[test]
    fn test_all_zero_day_is_empty() {
        assert!(trim_dark(day(&[0.0, 0.0, 0.0])).is_empty());
    }

    #[test]
    fn test_empty_day_is_empty() {
        assert!(trim_dark(Vec::new()).is_empty());
    }

    #[test]
    fn test_single_producing_sample() {
        let trimmed = trim_dark(day(&[0.0, 4.2, 0.0]));
        assert_eq!(energies(&trimmed), vec![4.2]);
    }

    #[test]
    fn test_no_zeros_untouched() {
        let trimmed = trim_dark(day(&[0.5, 1.0, 1.5]));
        assert_eq!(energies(&trimmed), vec![0.5, 1.0, 1.5]);
    }
}
