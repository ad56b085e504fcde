use std::str::FromStr;

use bitcoin::blockdata::script::ScriptBuf;
use bitcoin::blockdata::transaction::{Transaction, TxIn, TxOut};
use bitcoin::blockdata::witness::Witness;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::{OutPoint, Sequence};
use bitcoin::{absolute, Address, Amount, CompressedPublicKey, PrivateKey, Txid};

use super::BitcoinSigningInput;

/// Build and sign a P2WPKH spend where every input belongs to `private_key`.
pub(super) fn sign_p2wpkh(input: &BitcoinSigningInput, private_key: &[u8]) -> Result<Vec<u8>, String> {
    if input.utxos.is_empty() {
        return Err("No inputs to sign".to_string());
    }
    if input.outputs.is_empty() {
        return Err("No outputs to sign".to_string());
    }

    let secp = Secp256k1::new();
    let private_key = PrivateKey::from_slice(private_key, input.network)
        .map_err(|e| format!("Invalid private key: {}", e))?;
    let public_key = CompressedPublicKey::from_private_key(&secp, &private_key)
        .map_err(|e| format!("Invalid public key: {}", e))?;
    let script_pubkey = Address::p2wpkh(&public_key, input.network).script_pubkey();

    let mut tx = Transaction {
        version: bitcoin::transaction::Version::TWO,
        lock_time: absolute::LockTime::ZERO,
        input: Vec::with_capacity(input.utxos.len()),
        output: Vec::with_capacity(input.outputs.len()),
    };

    for utxo in &input.utxos {
        let txid = Txid::from_str(&utxo.txid).map_err(|e| format!("Invalid txid: {}", e))?;
        tx.input.push(TxIn {
            previous_output: OutPoint {
                txid,
                vout: utxo.vout,
            },
            script_sig: ScriptBuf::new(),
            // RBF-enabled so a stuck transaction can be fee-bumped
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::new(),
        });
    }

    for output in &input.outputs {
        let address = Address::from_str(&output.address)
            .map_err(|e| format!("Invalid address {}: {}", output.address, e))?
            .require_network(input.network)
            .map_err(|e| format!("Invalid address {}: {}", output.address, e))?;
        tx.output.push(TxOut {
            value: Amount::from_sat(output.amount_sats),
            script_pubkey: address.script_pubkey(),
        });
    }

    let mut witnesses = Vec::with_capacity(input.utxos.len());
    {
        let mut sighash_cache = SighashCache::new(&tx);
        for (input_index, utxo) in input.utxos.iter().enumerate() {
            let sighash = sighash_cache
                .p2wpkh_signature_hash(
                    input_index,
                    &script_pubkey,
                    Amount::from_sat(utxo.amount_sats),
                    EcdsaSighashType::All,
                )
                .map_err(|e| e.to_string())?;

            let message = Message::from_digest(sighash.to_byte_array());
            let signature = secp.sign_ecdsa(&message, &private_key.inner);

            let mut sig_with_hashtype = signature.serialize_der().to_vec();
            sig_with_hashtype.push(EcdsaSighashType::All.to_u32() as u8);
            witnesses.push(sig_with_hashtype);
        }
    }

    for (tx_input, sig) in tx.input.iter_mut().zip(witnesses) {
        tx_input.witness.push(sig);
        tx_input.witness.push(public_key.to_bytes());
    }

    Ok(bitcoin::consensus::encode::serialize(&tx))
}
