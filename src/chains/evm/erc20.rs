//! ERC-20 calldata
//!
//! | Function | Selector |
//! |----------|----------|
//! | `transfer(address,uint256)` | `0xa9059cbb` |
//! | `approve(address,uint256)` | `0x095ea7b3` |
//! | `allowance(address,address)` | `0xdd62ed3e` |
//!
//! Every argument occupies one 32-byte ABI word. Addresses sit in the last
//! 20 bytes of their word; amounts are big-endian `uint256`.

use alloy_primitives::{Address, U256};

use crate::error::EngineError;

pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
pub const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];
pub const ALLOWANCE_SELECTOR: [u8; 4] = [0xdd, 0x62, 0xed, 0x3e];

pub fn encode_transfer(to: &str, amount: U256) -> Result<Vec<u8>, EngineError> {
    let mut data = TRANSFER_SELECTOR.to_vec();
    data.extend(address_word(parse_address(to)?));
    data.extend(amount.to_be_bytes::<32>());
    Ok(data)
}

pub fn encode_approve(spender: &str, amount: U256) -> Result<Vec<u8>, EngineError> {
    let mut data = APPROVE_SELECTOR.to_vec();
    data.extend(address_word(parse_address(spender)?));
    data.extend(amount.to_be_bytes::<32>());
    Ok(data)
}

pub fn encode_allowance(owner: &str, spender: &str) -> Result<Vec<u8>, EngineError> {
    let mut data = ALLOWANCE_SELECTOR.to_vec();
    data.extend(address_word(parse_address(owner)?));
    data.extend(address_word(parse_address(spender)?));
    Ok(data)
}

/// Decode a `uint256` returned by `eth_call`. An empty result (`0x`) is zero.
pub fn decode_uint256(hex_value: &str) -> Result<U256, EngineError> {
    let bytes = hex::decode(hex_value.trim_start_matches("0x"))
        .map_err(|e| EngineError::Network(format!("Invalid uint256 {}: {}", hex_value, e)))?;
    if bytes.len() > 32 {
        return Err(EngineError::Network(format!(
            "Invalid uint256 {}: {} bytes",
            hex_value,
            bytes.len()
        )));
    }
    Ok(U256::from_be_slice(&bytes))
}

pub fn parse_address(address: &str) -> Result<Address, EngineError> {
    address
        .parse::<Address>()
        .map_err(|e| EngineError::Validation(format!("Invalid address {}: {}", address, e)))
}

fn address_word(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPIENT: &str = "0x742d35cc6634c0532925a3b844bc454e4438f44e";

    #[test]
    fn test_transfer_layout() {
        let data = encode_transfer(RECIPIENT, U256::from(1_000_000u64)).unwrap();
        assert_eq!(data.len(), 68);
        assert_eq!(&data[..4], &TRANSFER_SELECTOR);
        assert_eq!(hex::encode(&data[16..36]), RECIPIENT.trim_start_matches("0x"));
        assert_eq!(&data[64..], &[0x00, 0x0f, 0x42, 0x40]);
    }

    #[test]
    fn test_unlimited_approval_fills_the_word() {
        let data = encode_approve(RECIPIENT, U256::MAX).unwrap();
        assert_eq!(hex::encode(&data[..4]), "095ea7b3");
        assert!(data[36..].iter().all(|b| *b == 0xff));
    }

    #[test]
    fn test_decode_allowance() {
        let zero = format!("0x{}", "0".repeat(64));
        assert_eq!(decode_uint256(&zero).unwrap(), U256::ZERO);
        assert_eq!(decode_uint256("0x").unwrap(), U256::ZERO);
        // Unlimited approvals keep their full width
        let unlimited = format!("0x{}", "f".repeat(64));
        assert_eq!(decode_uint256(&unlimited).unwrap(), U256::MAX);
        assert_eq!(
            decode_uint256("0x0de0b6b3a7640000").unwrap(),
            U256::from(1_000_000_000_000_000_000u128)
        );
        assert!(decode_uint256(&format!("0x{}", "1".repeat(66))).is_err());
    }

    #[test]
    fn test_invalid_address() {
        assert!(matches!(
            encode_transfer("0x1234", U256::from(1u64)),
            Err(EngineError::Validation(_))
        ));
    }
}
