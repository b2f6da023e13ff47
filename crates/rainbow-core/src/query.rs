//! Search queries

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Query identifier, unique per scheduler run
pub type QueryId = u64;

/// Hash function a query target was produced with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMethod {
    #[default]
    Md5,
    Sha1,
    Sha256,
}

impl HashMethod {
    /// Length of a full digest in hex characters
    pub fn digest_hex_len(&self) -> usize {
        match self {
            HashMethod::Md5 => 32,
            HashMethod::Sha1 => 40,
            HashMethod::Sha256 => 64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HashMethod::Md5 => "md5",
            HashMethod::Sha1 => "sha1",
            HashMethod::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "md5" => Ok(HashMethod::Md5),
            "sha1" => Ok(HashMethod::Sha1),
            "sha256" => Ok(HashMethod::Sha256),
            _ => Err(Error::InvalidQuery(format!("Unsupported hash method: {}", s))),
        }
    }
}

/// One search target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub id: QueryId,
    /// Lowercase hex digest (or digest prefix) to find a preimage for
    pub target: String,
    pub method: HashMethod,
}

impl Query {
    /// Check that `target` is 1 to `digest_hex_len` lowercase hex digits
    pub fn validate_target(target: &str, method: HashMethod) -> Result<()> {
        let max = method.digest_hex_len();
        if target.is_empty() || target.len() > max {
            return Err(Error::InvalidQuery(format!(
                "{} target must be 1 to {} hex digits, got {}",
                method,
                max,
                target.len()
            )));
        }
        if !target.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(Error::InvalidQuery(format!(
                "target must be lowercase hex: {}",
                target
            )));
        }
        Ok(())
    }
}

/// Hands out queries with increasing ids
#[derive(Debug, Default)]
pub struct QueryIssuer {
    next_id: QueryId,
}

impl QueryIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and create a query; an invalid target consumes no id
    pub fn issue(&mut self, target: &str, method: HashMethod) -> Result<Query> {
        Query::validate_target(target, method)?;
        let query = Query {
            id: self.next_id,
            target: target.to_string(),
            method,
        };
        self.next_id += 1;
        Ok(query)
    }

    /// Number of queries issued so far
    pub fn issued(&self) -> u64 {
        self.next_id
    }
}
