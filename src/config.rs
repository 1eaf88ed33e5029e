//! JSON configuration for the `qgate` binary.
//!
//! ```json
//! {
//!   "allow_missing_rotation": false,
//!   "ops": [
//!     { "name": "q.u3", "form": "rotation", "slots": ["plain", "register"], "required": 1 },
//!     { "name": "q.invoke", "form": "call" }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::asm::{Codec, ParseOptions};
use crate::error::{ConfigError, Error};
use crate::ir::catalog::{OpCatalog, OpKind};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodecConfig {
    #[serde(flatten)]
    pub options: ParseOptions,
    /// Instruction kinds added on top of the built-in `q` dialect.
    #[serde(default)]
    pub ops: Vec<OpKind>,
}

impl CodecConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        info!("loaded config from {} ({} extra ops)", path.display(), config.ops.len());
        Ok(config)
    }

    pub fn catalog(&self) -> Result<OpCatalog, ConfigError> {
        let mut catalog = OpCatalog::quantum();
        for op in &self.ops {
            catalog.insert(op.clone())?;
        }
        Ok(catalog)
    }

    pub fn into_codec(self) -> Result<Codec, ConfigError> {
        Ok(Codec::new(self.catalog()?).with_options(self.options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_ops_are_usable() {
        let config = CodecConfig::from_json(
            r#"{
                "allow_missing_rotation": true,
                "ops": [{ "name": "q.u3", "form": "rotation", "slots": ["plain", "register"], "required": 1 }]
            }"#,
        )
        .unwrap();
        assert!(config.options.allow_missing_rotation);
        let codec = config.into_codec().unwrap();
        let instr = codec.parse_instruction("q.u3 %r[1] : register<2>").unwrap();
        assert_eq!(codec.print_instruction(&instr).unwrap(), "q.u3 %r[1] : register<2>");
    }

    #[test]
    fn empty_config_is_the_builtin_dialect() {
        let config = CodecConfig::from_json("{}").unwrap();
        assert!(!config.options.allow_missing_rotation);
        assert_eq!(config.catalog().unwrap().len(), OpCatalog::quantum().len());
    }

    #[test]
    fn redefining_a_builtin_is_rejected() {
        let config = CodecConfig::from_json(r#"{"ops": [{"name": "q.h", "slots": ["register"]}]}"#).unwrap();
        assert!(matches!(config.catalog(), Err(ConfigError::DuplicateOp { .. })));
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(CodecConfig::from_json("{"), Err(ConfigError::Json(_))));
    }
}
