//! Converter configuration
//!
//! [`ConverterConfig`] selects which block to convert, where the program
//! descriptor lives inside a model directory, and how variables without a
//! producer or payload are treated.

use std::env;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConvertError, ConvertResult};

/// What to do with a consumed variable that has neither a producer nor a
/// payload file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPayloadPolicy {
    /// Substitute an all-zero constant of the declared shape
    #[default]
    ZeroFill,
    /// Fail with `ConvertError::MissingPayload`
    Reject,
}

impl FromStr for MissingPayloadPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zero" | "zeros" | "zero_fill" | "zerofill" => Ok(MissingPayloadPolicy::ZeroFill),
            "reject" | "error" => Ok(MissingPayloadPolicy::Reject),
            _ => Err(format!("Invalid missing payload policy: {}", s)),
        }
    }
}

impl fmt::Display for MissingPayloadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingPayloadPolicy::ZeroFill => write!(f, "zero_fill"),
            MissingPayloadPolicy::Reject => write!(f, "reject"),
        }
    }
}

/// Configuration for a conversion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterConfig {
    /// Block of the program to convert (0 is the main block)
    pub block_index: usize,

    /// Descriptor file name inside a model directory
    pub descriptor_file: String,

    /// Emit a Constant instead of an Input when a fed variable has a payload
    pub fold_fed_payloads: bool,

    /// Treatment of unproduced variables with no payload
    pub missing_payload: MissingPayloadPolicy,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        ConverterConfig {
            block_index: 0,
            descriptor_file: "__model__.json".to_string(),
            fold_fed_payloads: true,
            missing_payload: MissingPayloadPolicy::ZeroFill,
        }
    }
}

impl ConverterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from the environment
    ///
    /// - `PADDLEFORGE_BLOCK_INDEX`
    /// - `PADDLEFORGE_DESCRIPTOR_FILE`
    /// - `PADDLEFORGE_FOLD_FED`
    /// - `PADDLEFORGE_MISSING_PAYLOAD` (`zero_fill` or `reject`)
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = ConverterConfig::default();

        if let Ok(index) = env::var("PADDLEFORGE_BLOCK_INDEX") {
            if let Ok(index) = index.parse::<usize>() {
                config.block_index = index;
            }
        }

        if let Ok(file) = env::var("PADDLEFORGE_DESCRIPTOR_FILE") {
            config.descriptor_file = file;
        }

        if let Ok(fold) = env::var("PADDLEFORGE_FOLD_FED") {
            config.fold_fed_payloads = fold != "0" && fold.to_lowercase() != "false";
        }

        if let Ok(policy) = env::var("PADDLEFORGE_MISSING_PAYLOAD") {
            if let Ok(policy) = policy.parse() {
                config.missing_payload = policy;
            }
        }

        config
    }

    pub fn with_block_index(mut self, block_index: usize) -> Self {
        self.block_index = block_index;
        self
    }

    pub fn with_descriptor_file(mut self, descriptor_file: impl Into<String>) -> Self {
        self.descriptor_file = descriptor_file.into();
        self
    }

    pub fn with_fold_fed_payloads(mut self, fold: bool) -> Self {
        self.fold_fed_payloads = fold;
        self
    }

    pub fn with_missing_payload(mut self, policy: MissingPayloadPolicy) -> Self {
        self.missing_payload = policy;
        self
    }

    pub fn validate(&self) -> ConvertResult<()> {
        if self.descriptor_file.trim().is_empty() {
            return Err(ConvertError::InvalidConfiguration(
                "descriptor_file must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
