use crate::error::EngineError;
use crate::model::Utxo;
use crate::signing::PlannedOutput;

/// Outputs below this value are not relayed
pub const DUST_LIMIT_SATS: u64 = 546;

/// Estimate transaction size in virtual bytes based on number of inputs and outputs
pub fn estimate_vsize(num_inputs: usize, num_outputs: usize) -> u64 {
    let base_size = 10;
    let input_size = 68;
    let output_size = 34;

    (base_size + (num_inputs * input_size) + (num_outputs * output_size)) as u64
}

/// Fee for a two-output spend of `num_inputs` at `fee_rate` sat/vB
fn spend_fee(num_inputs: usize, fee_rate: u64) -> Result<u64, EngineError> {
    estimate_vsize(num_inputs, 2)
        .checked_mul(fee_rate)
        .ok_or_else(|| EngineError::Validation(format!("Fee rate {} sat/vB out of range", fee_rate)))
}

fn total_sats(utxos: &[Utxo]) -> u64 {
    utxos
        .iter()
        .fold(0u64, |total, utxo| total.saturating_add(utxo.amount_sats))
}

fn insufficient(target_amount: u64, available: u64) -> EngineError {
    EngineError::InsufficientFunds(format!(
        "Need {} sats plus fee, but only have {} sats",
        target_amount, available
    ))
}

/// Select UTXOs to cover the target amount plus fees using a largest-first strategy
pub fn select_utxos(
    available: &[Utxo],
    target_amount: u64,
    fee_rate: u64,
) -> Result<Vec<Utxo>, EngineError> {
    let mut sorted = available.to_vec();
    sorted.sort_by(|a, b| b.amount_sats.cmp(&a.amount_sats));

    let mut selected = Vec::new();
    let mut total = 0u64;

    for utxo in sorted {
        total = total.saturating_add(utxo.amount_sats);
        selected.push(utxo);

        let fee = spend_fee(selected.len(), fee_rate)?;
        match target_amount.checked_add(fee) {
            Some(needed) if total >= needed => return Ok(selected),
            Some(_) => {}
            // No set of outputs can cover more than u64::MAX sats
            None => break,
        }
    }

    Err(insufficient(target_amount, total_sats(available)))
}

/// Lay out the recipient output and, when it clears the dust limit, a change
/// output back to `change_address`. Returns the outputs and the fee paid.
pub fn plan_outputs(
    selected: &[Utxo],
    to_address: &str,
    amount_sats: u64,
    change_address: &str,
    fee_rate: u64,
) -> Result<(Vec<PlannedOutput>, u64), EngineError> {
    if amount_sats < DUST_LIMIT_SATS {
        return Err(EngineError::Validation(format!(
            "Amount ({} sats) is below dust limit ({} sats)",
            amount_sats, DUST_LIMIT_SATS
        )));
    }

    let total_input = total_sats(selected);
    let fee = spend_fee(selected.len(), fee_rate)?;
    let needed = match amount_sats.checked_add(fee) {
        Some(needed) if needed <= total_input => needed,
        _ => return Err(insufficient(amount_sats, total_input)),
    };

    let mut outputs = vec![PlannedOutput {
        address: to_address.to_string(),
        amount_sats,
    }];

    let change_amount = total_input - needed;
    if change_amount >= DUST_LIMIT_SATS {
        outputs.push(PlannedOutput {
            address: change_address.to_string(),
            amount_sats: change_amount,
        });
        Ok((outputs, fee))
    } else {
        // Sub-dust change is left to the miner
        Ok((outputs, fee + change_amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utxo(amount_sats: u64) -> Utxo {
        Utxo {
            txid: format!("{:064x}", amount_sats),
            vout: 0,
            amount_sats,
            address: "addr".into(),
            confirmations: 1,
        }
    }

    #[test]
    fn test_vsize() {
        assert_eq!(estimate_vsize(1, 2), 146);
        assert_eq!(estimate_vsize(2, 2), 214);
    }

    #[test]
    fn test_largest_first() {
        let available = vec![utxo(10_000), utxo(80_000), utxo(30_000)];
        let selected = select_utxos(&available, 50_000, 10).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].amount_sats, 80_000);

        let selected = select_utxos(&available, 100_000, 10).unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_insufficient_funds() {
        let available = vec![utxo(1_000)];
        assert!(matches!(
            select_utxos(&available, 5_000, 1),
            Err(EngineError::InsufficientFunds(_))
        ));
    }

    #[test]
    fn test_amount_near_u64_max_is_insufficient() {
        let available = vec![utxo(50_000), utxo(30_000)];
        assert!(matches!(
            select_utxos(&available, u64::MAX, 20),
            Err(EngineError::InsufficientFunds(_))
        ));
        assert!(matches!(
            plan_outputs(&available, "to", u64::MAX, "change", 20),
            Err(EngineError::InsufficientFunds(_))
        ));
    }

    #[test]
    fn test_fee_rate_overflow_is_rejected() {
        let available = vec![utxo(50_000)];
        assert!(matches!(
            select_utxos(&available, 10_000, u64::MAX),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            plan_outputs(&available, "to", 10_000, "change", u64::MAX / 100),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_change_output_above_dust() {
        let selected = vec![utxo(100_000)];
        let (outputs, fee) = plan_outputs(&selected, "to", 50_000, "change", 10).unwrap();
        assert_eq!(fee, 1_460);
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[1].amount_sats, 100_000 - 50_000 - 1_460);
    }

    #[test]
    fn test_dust_change_goes_to_fee() {
        let selected = vec![utxo(51_600)];
        let (outputs, fee) = plan_outputs(&selected, "to", 50_000, "change", 10).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(fee, 1_600);
    }
}
