use bech32::{Bech32, Hrp};

use crate::{config::AddressCodecConfig, Address, Error};

/// Turns raw public key bytes into the canonical address string.
pub trait AddressCodec: Send + Sync + 'static {
    fn encode(&self, raw: &[u8]) -> Result<Address, Error>;
}

fn check_length(raw: &[u8], expected: usize) -> Result<(), Error> {
    if raw.len() != expected {
        return Err(Error::Decode(format!(
            "address is {} bytes, expected {expected}",
            raw.len()
        )));
    }

    Ok(())
}

#[derive(Debug, Clone)]
pub struct Bech32Codec {
    hrp: Hrp,
    length: usize,
}

impl Bech32Codec {
    pub fn new(hrp: &str, length: usize) -> Result<Self, Error> {
        let hrp = Hrp::parse(hrp).map_err(Error::config)?;
        Ok(Self { hrp, length })
    }
}

impl AddressCodec for Bech32Codec {
    fn encode(&self, raw: &[u8]) -> Result<Address, Error> {
        check_length(raw, self.length)?;
        bech32::encode::<Bech32>(self.hrp, raw).map_err(Error::decode)
    }
}

#[derive(Debug, Clone)]
pub struct HexCodec {
    length: usize,
}

impl HexCodec {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl AddressCodec for HexCodec {
    fn encode(&self, raw: &[u8]) -> Result<Address, Error> {
        check_length(raw, self.length)?;
        Ok(hex::encode(raw))
    }
}

pub fn from_config(config: &AddressCodecConfig) -> Result<Box<dyn AddressCodec>, Error> {
    let codec: Box<dyn AddressCodec> = match config {
        AddressCodecConfig::Bech32 { hrp, length } => Box::new(Bech32Codec::new(hrp, *length)?),
        AddressCodecConfig::Hex { length } => Box::new(HexCodec::new(*length)),
    };

    Ok(codec)
}
