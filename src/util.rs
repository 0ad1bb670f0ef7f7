pub fn win_rate(wins: u32, games: u32) -> Option<f64> {
    if games == 0 { return None; }
    Some(wins as f64 / games as f64)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() { return None; }
    let mut sum = 0.0;
    for v in values { sum += v }
    Some(sum / values.len() as f64)
}

pub fn percent(rate: f64) -> f64 {
    (rate * 10_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_and_means() {
        assert_eq!(win_rate(3, 4), Some(0.75));
        assert_eq!(win_rate(0, 0), None);
        assert_eq!(mean(&[0.5, 1.0, 0.0]), Some(0.5));
        assert_eq!(mean(&[]), None);
        assert_eq!(percent(1.0 / 3.0), 33.33);
    }
}
