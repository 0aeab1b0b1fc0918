//! OBV (On-Balance Volume).

/// OBV[0] = 0
/// If close[i] > close[i-1]: OBV[i] = OBV[i-1] + volume[i]
/// If close[i] < close[i-1]: OBV[i] = OBV[i-1] - volume[i]
/// If close[i] == close[i-1]: OBV[i] = OBV[i-1]
///
/// Mismatched lengths are truncated to the shorter input.
pub fn obv(close: &[f64], volume: &[f64]) -> Vec<f64> {
    let n = close.len().min(volume.len());
    let mut out = Vec::with_capacity(n);
    let mut total = 0.0;

    for i in 0..n {
        if i > 0 {
            if close[i] > close[i - 1] {
                total += volume[i];
            } else if close[i] < close[i - 1] {
                total -= volume[i];
            }
        }
        out.push(total);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obv_first_point_is_zero() {
        let out = obv(&[100.0], &[1000.0]);
        assert_eq!(out, vec![0.0]);
    }

    #[test]
    fn obv_signed_accumulation() {
        let close = [100.0, 105.0, 102.0, 102.0, 110.0];
        let volume = [1000.0, 500.0, 300.0, 700.0, 200.0];
        let out = obv(&close, &volume);
        assert_eq!(out, vec![0.0, 500.0, 200.0, 200.0, 400.0]);
    }

    #[test]
    fn obv_flat_contributes_nothing() {
        let out = obv(&[10.0, 10.0, 10.0], &[5.0, 6.0, 7.0]);
        assert!(out.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn obv_empty() {
        assert!(obv(&[], &[]).is_empty());
    }
}
