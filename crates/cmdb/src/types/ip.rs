//! IP address value type (v4 or v6) with an optional textual `prefix`.

use std::net::IpAddr;
use std::sync::Arc;

use crate::error::ValidationError;
use crate::Result;

use super::{Options, TypeClass, ValueType};

#[derive(Debug)]
pub struct IpType {
    options: Options,
    prefix: Option<String>,
}

impl IpType {
    pub const NAME: &'static str = "cmdb.types.IP";
    pub const SHORT_NAME: &'static str = "IP";
    pub const CLASS: TypeClass = TypeClass::new(Self::NAME, Self::SHORT_NAME, Self::construct);

    pub fn new(options: Options) -> Result<Self> {
        let prefix = options.get_str("prefix")?.map(str::to_string);
        Ok(Self { options, prefix })
    }

    fn construct(options: &Options) -> Result<Arc<dyn ValueType>> {
        Ok(Arc::new(Self::new(options.clone())?))
    }
}

impl ValueType for IpType {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn stringify(&self, raw: &str) -> std::result::Result<String, ValidationError> {
        let addr: IpAddr = raw.trim().parse().map_err(|_| ValidationError::Format {
            value: raw.to_string(),
            expected: "IP address",
        })?;
        let canonical = addr.to_string();

        // The prefix is matched against the canonical text, not the input.
        if let Some(prefix) = &self.prefix {
            if !canonical.starts_with(prefix.as_str()) {
                return Err(ValidationError::Prefix {
                    value: canonical,
                    prefix: prefix.clone(),
                });
            }
        }

        Ok(canonical)
    }

    fn destringify(&self, stored: &str) -> String {
        stored.to_string()
    }
}
