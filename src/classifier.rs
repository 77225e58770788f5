//! Signal classification by signal-strength window

use std::fmt;

/// Accept a capture whose metric lies strictly inside `(lower_bound, upper_bound)`
pub fn classify(metric: i32, lower_bound: i32, upper_bound: i32) -> bool {
    lower_bound < metric && metric < upper_bound
}

/// Open interval of accepted signal-strength metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RssiWindow {
    pub lower_bound: i32,
    pub upper_bound: i32,
}

impl RssiWindow {
    pub fn new(lower_bound: i32, upper_bound: i32) -> Self {
        Self {
            lower_bound,
            upper_bound,
        }
    }

    /// True when no metric can ever satisfy the window
    pub fn is_empty(&self) -> bool {
        self.lower_bound >= self.upper_bound
    }

    pub fn contains(&self, metric: i32) -> bool {
        classify(metric, self.lower_bound, self.upper_bound)
    }
}

impl fmt::Display for RssiWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lower_bound, self.upper_bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_strict_window() {
        for metric in -120..=0 {
            assert_eq!(classify(metric, -100, -20), -100 < metric && metric < -20);
        }
    }

    #[test]
    fn test_classify_rejects_boundaries() {
        assert!(!classify(-100, -100, -20));
        assert!(!classify(-20, -100, -20));
        assert!(classify(-99, -100, -20));
        assert!(classify(-21, -100, -20));
    }

    #[test]
    fn test_inverted_window_accepts_nothing() {
        let window = RssiWindow::new(-20, -100);
        assert!(window.is_empty());
        assert!((-150..50).all(|metric| !window.contains(metric)));
    }

    #[test]
    fn test_window_display() {
        assert_eq!(RssiWindow::new(-100, -20).to_string(), "(-100, -20)");
    }
}
