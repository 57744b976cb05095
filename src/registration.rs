//! # Device Registrations
//!
//! Domain values carried through the adapter. The bridge never looks inside a
//! [`Registration`]; only parsers build them and only consumers read them.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reasons a hex identifier failed to parse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("expected {expected} hex digits, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("contains non-hexadecimal characters")]
    NotHex,
}

fn decode_fixed<const N: usize>(input: &str) -> Result<[u8; N], IdentifierError> {
    if input.len() != N * 2 {
        return Err(IdentifierError::WrongLength {
            expected: N * 2,
            actual: input.len(),
        });
    }
    let mut bytes = [0u8; N];
    hex::decode_to_slice(input, &mut bytes).map_err(|_| IdentifierError::NotHex)?;
    Ok(bytes)
}

macro_rules! hex_identifier {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdentifierError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_fixed::<{ $len }>(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode_upper(self.0))
            }
        }
    };
}

hex_identifier!(
    /// 32-bit LoRaWAN device address
    DevAddr,
    4
);
hex_identifier!(
    /// 64-bit application identifier
    AppEui,
    8
);
hex_identifier!(
    /// 128-bit network session key
    NwkSKey,
    16
);

impl fmt::Debug for DevAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DevAddr({self})")
    }
}

impl fmt::Debug for AppEui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppEui({self})")
    }
}

// Session keys never reach logs.
impl fmt::Debug for NwkSKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NwkSKey([REDACTED])")
    }
}

impl Serialize for DevAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Serialize for AppEui {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A device registration request as understood by the consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub dev_addr: DevAddr,
    #[serde(rename = "appEUI", skip_serializing_if = "Option::is_none")]
    pub app_eui: Option<AppEui>,
    #[serde(skip)]
    pub nwk_s_key: Option<NwkSKey>,
}

impl Registration {
    pub fn new(dev_addr: DevAddr) -> Self {
        Self {
            dev_addr,
            app_eui: None,
            nwk_s_key: None,
        }
    }

    pub fn with_app_eui(mut self, app_eui: AppEui) -> Self {
        self.app_eui = Some(app_eui);
        self
    }

    pub fn with_nwk_s_key(mut self, nwk_s_key: NwkSKey) -> Self {
        self.nwk_s_key = Some(nwk_s_key);
        self
    }
}
