//! Target description (target.toml)
//!
//! The parts of a target the IR core needs: pointer size and the argument
//! registers and stack layout `RegisterAbi` places arguments with.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading a target description
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the file
    #[error("Failed to read target file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse target description: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid target description: {0}")]
    ValidationError(String),
}

/// Target description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetConfig {
    /// Pointer size in bytes (4 or 8)
    #[serde(default = "default_pointer_size")]
    pub pointer_size: u32,

    /// Integer argument registers, in assignment order
    #[serde(default = "default_int_arg_regs")]
    pub int_arg_regs: Vec<u8>,

    /// Floating-point argument registers, in assignment order
    #[serde(default = "default_float_arg_regs")]
    pub float_arg_regs: Vec<u8>,

    /// Size of one outgoing stack slot
    #[serde(default = "default_stack_slot_size")]
    pub stack_slot_size: u32,

    /// Largest struct passed by value in registers
    #[serde(default = "default_max_struct_reg_bytes")]
    pub max_struct_reg_bytes: u32,

    /// Largest struct that can be passed at all
    #[serde(default = "default_max_struct_stack_bytes")]
    pub max_struct_stack_bytes: u32,

    /// Whether a struct may be passed partly in registers, partly on the stack
    #[serde(default)]
    pub split_struct_args: bool,

    /// Dedicated return buffer register, if the target has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ret_buffer_reg: Option<u8>,
}

fn default_pointer_size() -> u32 {
    8
}

fn default_int_arg_regs() -> Vec<u8> {
    (0..6).collect()
}

fn default_float_arg_regs() -> Vec<u8> {
    (16..24).collect()
}

fn default_stack_slot_size() -> u32 {
    8
}

fn default_max_struct_reg_bytes() -> u32 {
    16
}

fn default_max_struct_stack_bytes() -> u32 {
    64 * 1024
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            pointer_size: default_pointer_size(),
            int_arg_regs: default_int_arg_regs(),
            float_arg_regs: default_float_arg_regs(),
            stack_slot_size: default_stack_slot_size(),
            max_struct_reg_bytes: default_max_struct_reg_bytes(),
            max_struct_stack_bytes: default_max_struct_stack_bytes(),
            split_struct_args: false,
            ret_buffer_reg: None,
        }
    }
}

impl TargetConfig {
    /// Parse a target description from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a target description from a string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: TargetConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Write the description to a file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the description
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pointer_size != 4 && self.pointer_size != 8 {
            return Err(ConfigError::ValidationError(format!(
                "pointer_size must be 4 or 8, got {}",
                self.pointer_size
            )));
        }

        if self.stack_slot_size == 0 || !self.stack_slot_size.is_power_of_two() {
            return Err(ConfigError::ValidationError(format!(
                "stack_slot_size must be a power of two, got {}",
                self.stack_slot_size
            )));
        }

        if self.max_struct_reg_bytes > self.max_struct_stack_bytes {
            return Err(ConfigError::ValidationError(
                "max_struct_reg_bytes cannot exceed max_struct_stack_bytes".to_string(),
            ));
        }

        // A register cannot be used for both classes.
        if let Some(reg) = self.int_arg_regs.iter().find(|reg| self.float_arg_regs.contains(reg)) {
            return Err(ConfigError::ValidationError(format!(
                "register {} is listed as both an integer and a float argument register",
                reg
            )));
        }

        if let Some(reg) = self.ret_buffer_reg {
            if self.int_arg_regs.contains(&reg) {
                return Err(ConfigError::ValidationError(format!(
                    "return buffer register {} is also an argument register",
                    reg
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let config = TargetConfig::from_str("").unwrap();
        assert_eq!(config, TargetConfig::default());
        assert_eq!(config.int_arg_regs.len(), 6);
    }

    #[test]
    fn test_parse_target() {
        let toml = r#"
pointer_size = 4
int_arg_regs = [0, 1, 2, 3]
float_arg_regs = []
stack_slot_size = 4
split_struct_args = true
"#;

        let config = TargetConfig::from_str(toml).unwrap();
        assert_eq!(config.pointer_size, 4);
        assert_eq!(config.int_arg_regs, vec![0, 1, 2, 3]);
        assert!(config.float_arg_regs.is_empty());
        assert!(config.split_struct_args);
        assert_eq!(config.max_struct_reg_bytes, 16);
    }

    #[test]
    fn test_invalid_pointer_size() {
        let result = TargetConfig::from_str("pointer_size = 6");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_overlapping_registers() {
        let result = TargetConfig::from_str("int_arg_regs = [0, 1]\nfloat_arg_regs = [1]");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_bad_toml() {
        let result = TargetConfig::from_str("pointer_size = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.toml");
        let config = TargetConfig { ret_buffer_reg: Some(8), ..TargetConfig::default() };
        config.to_file(&path).unwrap();
        assert_eq!(TargetConfig::from_file(&path).unwrap(), config);
    }
}
