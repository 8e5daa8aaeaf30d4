//! Integer value type with optional `min`/`max` bounds.

use std::sync::Arc;

use crate::error::{RangeBound, ValidationError};
use crate::{Error, Result};

use super::{Options, TypeClass, ValueType};

#[derive(Debug)]
pub struct IntType {
    options: Options,
    min: Option<i64>,
    max: Option<i64>,
}

impl IntType {
    pub const NAME: &'static str = "cmdb.types.Int";
    pub const SHORT_NAME: &'static str = "Int";
    pub const CLASS: TypeClass = TypeClass::new(Self::NAME, Self::SHORT_NAME, Self::construct);

    pub fn new(options: Options) -> Result<Self> {
        let min = options.get_i64("min")?;
        let max = options.get_i64("max")?;
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(Error::InvalidMeta(format!(
                    "option 'min' ({min}) is greater than 'max' ({max})"
                )));
            }
        }

        Ok(Self { options, min, max })
    }

    fn construct(options: &Options) -> Result<Arc<dyn ValueType>> {
        Ok(Arc::new(Self::new(options.clone())?))
    }
}

impl ValueType for IntType {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn stringify(&self, raw: &str) -> std::result::Result<String, ValidationError> {
        let value: i64 = raw.trim().parse().map_err(|_| ValidationError::Format {
            value: raw.to_string(),
            expected: "integer",
        })?;

        if let Some(min) = self.min {
            if value < min {
                return Err(ValidationError::Range {
                    value,
                    bound: RangeBound::TooSmall,
                    limit: min,
                });
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Err(ValidationError::Range {
                    value,
                    bound: RangeBound::TooBig,
                    limit: max,
                });
            }
        }

        Ok(value.to_string())
    }

    fn destringify(&self, stored: &str) -> String {
        stored.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(options: Options) -> IntType {
        IntType::new(options).unwrap()
    }

    #[test]
    fn accepts_unbounded_integer() {
        assert_eq!(int(Options::new()).stringify("300").unwrap(), "300");
    }

    #[test]
    fn canonicalizes_sign_and_whitespace() {
        assert_eq!(int(Options::new()).stringify(" +42 ").unwrap(), "42");
        assert_eq!(int(Options::new()).stringify("-7").unwrap(), "-7");
    }

    #[test]
    fn rejects_above_max() {
        let err = int(Options::new().with("max", 100)).stringify("300").unwrap_err();
        assert_eq!(
            err,
            ValidationError::Range {
                value: 300,
                bound: RangeBound::TooBig,
                limit: 100,
            }
        );
    }

    #[test]
    fn rejects_below_min_including_zero_bound() {
        let ty = int(Options::new().with("min", 0));
        assert!(matches!(
            ty.stringify("-1"),
            Err(ValidationError::Range {
                bound: RangeBound::TooSmall,
                ..
            })
        ));
        assert_eq!(ty.stringify("0").unwrap(), "0");
    }

    #[test]
    fn rejects_non_numeric_input() {
        assert!(matches!(
            int(Options::new()).stringify("abc"),
            Err(ValidationError::Format { .. })
        ));
        assert!(matches!(
            int(Options::new()).stringify("1.5"),
            Err(ValidationError::Format { .. })
        ));
    }

    #[test]
    fn inverted_bounds_are_invalid_meta() {
        let result = IntType::new(Options::new().with("min", 10).with("max", 1));
        assert!(matches!(result, Err(Error::InvalidMeta(_))));
    }

    #[test]
    fn destringify_is_identity() {
        assert_eq!(int(Options::new()).destringify("12"), "12");
    }
}
