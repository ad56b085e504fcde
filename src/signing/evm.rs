use alloy_primitives::{Address, Bytes, U256};
use alloy_rlp::{Encodable, Header};
use secp256k1::{Message, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};

use super::EthereumSigningInput;

const EIP1559_TX_TYPE: u8 = 0x02;

/// Sign an EIP-1559 transaction. Returns `0x02 || rlp([..fields, y_parity, r, s])`.
pub(super) fn sign_eip1559(input: &EthereumSigningInput, private_key: &[u8]) -> Result<Vec<u8>, String> {
    let secret = SecretKey::from_slice(private_key).map_err(|e| format!("Invalid private key: {}", e))?;
    let to: Address = input
        .to
        .parse()
        .map_err(|e| format!("Invalid address {}: {}", input.to, e))?;
    let data = Bytes::copy_from_slice(&input.data);
    let value = U256::from(input.value);
    // Empty access list
    let access_list: Vec<Address> = Vec::new();

    let unsigned_fields: [&dyn Encodable; 9] = [
        &input.chain_id,
        &input.nonce,
        &input.max_priority_fee_per_gas,
        &input.max_fee_per_gas,
        &input.gas_limit,
        &to,
        &value,
        &data,
        &access_list,
    ];
    let digest: [u8; 32] = Keccak256::digest(typed_envelope(&unsigned_fields)).into();

    let secp = Secp256k1::signing_only();
    let signature = secp.sign_ecdsa_recoverable(&Message::from_digest(digest), &secret);
    let (recovery_id, compact) = signature.serialize_compact();
    let y_parity = u64::from(recovery_id.to_i32() != 0);
    let r = U256::from_be_slice(&compact[..32]);
    let s = U256::from_be_slice(&compact[32..]);

    let mut signed_fields = unsigned_fields.to_vec();
    signed_fields.push(&y_parity);
    signed_fields.push(&r);
    signed_fields.push(&s);
    Ok(typed_envelope(&signed_fields))
}

/// `type || rlp(list)` for already-typed fields
fn typed_envelope(fields: &[&dyn Encodable]) -> Vec<u8> {
    let payload_length = fields.iter().map(|field| field.length()).sum();
    let header = Header {
        list: true,
        payload_length,
    };
    let mut out = Vec::with_capacity(1 + header.length() + payload_length);
    out.push(EIP1559_TX_TYPE);
    header.encode(&mut out);
    for field in fields {
        field.encode(&mut out);
    }
    out
}

/// Transaction hash of a signed typed transaction
pub fn transaction_hash(signed: &[u8]) -> String {
    format!("0x{}", hex::encode(Keccak256::digest(signed)))
}
