//! Threshold ECDSA signing of EIP-1559 transactions

use alloy::{
    consensus::{SignableTransaction, TxEip1559, TxEnvelope},
    eips::eip2718::Encodable2718,
};
use alloy_primitives::{keccak256, Address, Parity, Signature, B256, U256};
use ic_exports::ic_cdk::api::management_canister::ecdsa::{
    ecdsa_public_key, sign_with_ecdsa, EcdsaCurve, EcdsaKeyId, EcdsaPublicKeyArgument,
    SignWithEcdsaArgument,
};
use k256::ecdsa::VerifyingKey;

use crate::types::DerivationPath;

use super::{
    common::extract_call_result,
    error::{GatewayError, GatewayResult},
};

/// Secp256k1 key id with the given name
pub fn key_id(name: &str) -> EcdsaKeyId {
    EcdsaKeyId {
        curve: EcdsaCurve::Secp256k1,
        name: name.to_string(),
    }
}

/// Fetches the canister's public key for the derivation path and returns its EVM address
pub async fn get_canister_address(
    key_name: &str,
    derivation_path: DerivationPath,
) -> GatewayResult<Address> {
    let call_result = ecdsa_public_key(EcdsaPublicKeyArgument {
        canister_id: None,
        derivation_path,
        key_id: key_id(key_name),
    })
    .await;

    let response = extract_call_result(call_result)?;
    public_key_to_address(&response.public_key)
}

/// Converts a SEC1 encoded public key into an EVM address
pub fn public_key_to_address(public_key: &[u8]) -> GatewayResult<Address> {
    let verifying_key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|err| GatewayError::DecodingError(format!("Invalid public key: {}", err)))?;
    Ok(Address::from_public_key(&verifying_key))
}

/// Turns a raw 64 byte `r || s` signature into an EVM signature.
/// High `s` values are normalized and the parity is found by recovering the signer.
pub fn to_evm_signature(
    raw_signature: &[u8],
    prehash: &B256,
    signer: Address,
) -> GatewayResult<Signature> {
    let signature = k256::ecdsa::Signature::from_slice(raw_signature)
        .map_err(|err| GatewayError::DecodingError(format!("Invalid signature: {}", err)))?;
    let signature = signature.normalize_s().unwrap_or(signature);
    let bytes = signature.to_bytes();
    let r = U256::from_be_slice(&bytes[..32]);
    let s = U256::from_be_slice(&bytes[32..]);

    [false, true]
        .into_iter()
        .map(|y_parity| Signature::new(r, s, Parity::Parity(y_parity)))
        .find(|candidate| {
            candidate
                .recover_address_from_prehash(prehash)
                .map(|recovered| recovered == signer)
                .unwrap_or(false)
        })
        .ok_or_else(|| {
            GatewayError::DecodingError(
                "The signature does not recover to the signing account.".to_string(),
            )
        })
}

/// Signs the transaction with the canister's key and returns the raw transaction hex
pub async fn sign_eip1559_transaction(
    transaction: TxEip1559,
    key_name: &str,
    derivation_path: DerivationPath,
    signer: Address,
) -> GatewayResult<String> {
    let prehash = transaction.signature_hash();

    let call_result = sign_with_ecdsa(SignWithEcdsaArgument {
        message_hash: prehash.to_vec(),
        derivation_path,
        key_id: key_id(key_name),
    })
    .await;
    let response = extract_call_result(call_result)?;

    let signature = to_evm_signature(&response.signature, &prehash, signer)?;
    Ok(encode_signed(transaction, signature))
}

/// EIP-2718 encodes a signed transaction as `0x` prefixed hex
pub fn encode_signed(transaction: TxEip1559, signature: Signature) -> String {
    let envelope: TxEnvelope = transaction.into_signed(signature).into();
    format!("0x{}", hex::encode(envelope.encoded_2718()))
}

/// Hash of a `0x` prefixed raw EIP-2718 transaction
pub fn raw_transaction_hash(raw_transaction: &str) -> GatewayResult<B256> {
    let bytes = hex::decode(raw_transaction.trim_start_matches("0x"))
        .map_err(|err| GatewayError::DecodingError(err.to_string()))?;
    Ok(keccak256(bytes))
}
