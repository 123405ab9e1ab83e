//! Size Estimation Module
//!
//! Converts values into approximate byte costs for capacity enforcement.
//!
//! Estimates are approximations, not an accounting system. The same logical
//! value may measure differently under different strategies, and the
//! configured estimator is the only basis the store uses to decide when to
//! evict.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::CachePayload;

/// Multiplier applied to textual length by the fallback heuristic.
pub const TEXT_BYTES_PER_CHAR: u64 = 2;

// == Size Estimator ==
/// Measures the cost of a value. Implementations must never fail.
pub trait SizeEstimator<V>: Send + Sync {
    /// Returns the estimated size of `value` in bytes.
    fn estimate(&self, value: &V) -> u64;
}

/// Deterministic fallback: two bytes per character of textual length.
pub fn text_length_heuristic<V: CachePayload>(value: &V) -> u64 {
    value.text_len() as u64 * TEXT_BYTES_PER_CHAR
}

// == Text Length ==
/// Cheap strategy based on textual length alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLengthEstimator;

impl<V: CachePayload> SizeEstimator<V> for TextLengthEstimator {
    fn estimate(&self, value: &V) -> u64 {
        text_length_heuristic(value)
    }
}

// == Serialized Size ==
/// Measures the bincode-encoded length of the value.
///
/// More expensive than [`TextLengthEstimator`]. Falls back to the text
/// heuristic when the value cannot be serialized.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializedSizeEstimator;

impl<V: CachePayload + Serialize> SizeEstimator<V> for SerializedSizeEstimator {
    fn estimate(&self, value: &V) -> u64 {
        match bincode::serialized_size(value) {
            Ok(size) => size,
            Err(e) => {
                debug!("Serialized size unavailable, using text heuristic: {}", e);
                text_length_heuristic(value)
            }
        }
    }
}

// == Caller-Supplied ==
/// Wraps a caller-supplied size function.
pub struct FnEstimator<F>(pub F);

impl<V, F> SizeEstimator<V> for FnEstimator<F>
where
    F: Fn(&V) -> u64 + Send + Sync,
{
    fn estimate(&self, value: &V) -> u64 {
        (self.0)(value)
    }
}

impl<F> fmt::Debug for FnEstimator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnEstimator")
    }
}

// == Estimator Kind ==
/// Estimator strategies selectable from configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorKind {
    /// [`TextLengthEstimator`]
    #[default]
    Text,
    /// [`SerializedSizeEstimator`]
    Serialized,
}

impl EstimatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimatorKind::Text => "text",
            EstimatorKind::Serialized => "serialized",
        }
    }

    /// Builds the boxed estimator for this strategy.
    pub fn build<V>(self) -> Box<dyn SizeEstimator<V>>
    where
        V: CachePayload + Serialize,
    {
        match self {
            EstimatorKind::Text => Box::new(TextLengthEstimator),
            EstimatorKind::Serialized => Box::new(SerializedSizeEstimator),
        }
    }
}

impl FromStr for EstimatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(EstimatorKind::Text),
            "serialized" => Ok(EstimatorKind::Serialized),
            _ => Err(format!("Invalid size estimator: {}", s)),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_length_estimator() {
        let estimator = TextLengthEstimator;
        assert_eq!(estimator.estimate(&"abcd".to_string()), 8);
        assert_eq!(estimator.estimate(&String::new()), 0);
    }

    #[test]
    fn test_serialized_estimator_includes_length_prefix() {
        let estimator = SerializedSizeEstimator;
        // bincode writes a u64 length prefix before the bytes
        assert_eq!(estimator.estimate(&"abcd".to_string()), 8 + 4);
        assert_eq!(estimator.estimate(&vec![0u8; 10]), 8 + 10);
    }

    #[test]
    fn test_fn_estimator() {
        let estimator = FnEstimator(|v: &String| v.len() as u64 * 10);
        assert_eq!(estimator.estimate(&"abc".to_string()), 30);
    }

    #[test]
    fn test_estimator_kind_parse() {
        assert_eq!("text".parse::<EstimatorKind>(), Ok(EstimatorKind::Text));
        assert_eq!(
            " Serialized ".parse::<EstimatorKind>(),
            Ok(EstimatorKind::Serialized)
        );
        assert!("exact".parse::<EstimatorKind>().is_err());
    }

    #[test]
    fn test_estimator_kind_build() {
        let text = EstimatorKind::Text.build::<String>();
        let serialized = EstimatorKind::Serialized.build::<String>();
        let value = "hello".to_string();

        assert_eq!(text.estimate(&value), 10);
        assert_eq!(serialized.estimate(&value), 13);
    }
}
