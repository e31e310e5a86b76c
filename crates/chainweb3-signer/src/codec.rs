//! RLP codec for signed legacy transactions.
//!
//! Wire form is the nine-item list
//! `[nonce, gasPrice, gasLimit, to, value, data, v, r, s]`, with an absent
//! `to` (contract creation) encoded as the empty string.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{BufMut, Decodable, Encodable, Header, EMPTY_STRING_CODE};
use thiserror::Error;

use chainweb3_core::{ProviderError, ValidationError};

use crate::transaction::{chain_id_from_v, SignedTransaction};

const FIELD_COUNT: usize = 9;

/// Raw transaction bytes could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid rlp: {0}")]
    Rlp(#[from] alloy_rlp::Error),

    #[error("transaction is not an rlp list")]
    NotAList,

    #[error("transaction field {index} is a list")]
    NestedList { index: usize },

    #[error("expected {FIELD_COUNT} transaction fields, found {0}")]
    WrongArity(usize),

    #[error("`to` must be empty or 20 bytes, got {len}")]
    InvalidAddress { len: usize },

    #[error("{field} does not fit in 64 bits")]
    IntegerOverflow { field: &'static str },
}

impl From<CodecError> for ProviderError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Rlp(e) => ProviderError::Decoding(format!("invalid rlp: {e}")),
            shape => ValidationError::MalformedTransaction(shape.to_string()).into(),
        }
    }
}

fn to_length(to: &Option<Address>) -> usize {
    to.as_ref().map_or(1, Encodable::length)
}

impl SignedTransaction {
    fn payload_length(&self) -> usize {
        self.nonce.length()
            + self.gas_price.length()
            + self.gas_limit.length()
            + to_length(&self.to)
            + self.value.length()
            + self.data.length()
            + self.v.length()
            + self.r.length()
            + self.s.length()
    }

    /// Canonical RLP encoding, as submitted with `eth_sendRawTransaction`.
    pub fn encode_rlp(&self) -> Bytes {
        let mut out = Vec::with_capacity(self.length());
        self.encode(&mut out);
        out.into()
    }

    /// Transaction hash: keccak-256 of the RLP encoding.
    pub fn hash(&self) -> B256 {
        keccak256(self.encode_rlp())
    }

    /// Decode raw bytes, recovering the chain id from `v`.
    pub fn decode_rlp(raw: &[u8]) -> Result<Self, CodecError> {
        Self::decode_with_chain_id(raw, None)
    }

    /// Decode raw bytes. An explicit `chain_id` wins over the one implied by `v`.
    pub fn decode_with_chain_id(raw: &[u8], chain_id: Option<u64>) -> Result<Self, CodecError> {
        let items = split_list(raw)?;
        let [nonce, gas_price, gas_limit, to, value, data, v, r, s] = items[..] else {
            return Err(CodecError::WrongArity(items.len()));
        };

        let v: U256 = decode_item(v)?;
        let chain_id = match chain_id {
            Some(id) => id,
            None => u64::try_from(chain_id_from_v(v))
                .map_err(|_| CodecError::IntegerOverflow { field: "chainId" })?,
        };

        Ok(Self {
            nonce: decode_item(nonce)?,
            gas_price: decode_item(gas_price)?,
            gas_limit: decode_item(gas_limit)?,
            to: decode_to(to)?,
            value: decode_item(value)?,
            data: decode_item(data)?,
            v,
            r: decode_item(r)?,
            s: decode_item(s)?,
            chain_id,
        })
    }
}

impl Encodable for SignedTransaction {
    fn encode(&self, out: &mut dyn BufMut) {
        Header { list: true, payload_length: self.payload_length() }.encode(out);
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        match &self.to {
            Some(to) => to.encode(out),
            None => out.put_u8(EMPTY_STRING_CODE),
        }
        self.value.encode(out);
        self.data.encode(out);
        self.v.encode(out);
        self.r.encode(out);
        self.s.encode(out);
    }

    fn length(&self) -> usize {
        let payload = self.payload_length();
        payload + alloy_rlp::length_of_length(payload)
    }
}

/// Split an RLP list into the full encodings of its (string) items.
fn split_list(raw: &[u8]) -> Result<Vec<&[u8]>, CodecError> {
    let mut buf = raw;
    let header = Header::decode(&mut buf)?;
    if !header.list {
        return Err(CodecError::NotAList);
    }
    if buf.len() != header.payload_length {
        return Err(alloy_rlp::Error::UnexpectedLength.into());
    }

    let mut items = Vec::with_capacity(FIELD_COUNT);
    let mut rest = buf;
    while !rest.is_empty() {
        let mut cursor = rest;
        let item = Header::decode(&mut cursor)?;
        if item.list {
            return Err(CodecError::NestedList { index: items.len() });
        }
        // Single bytes below 0x80 are their own header and leave the cursor in place.
        let len = rest.len() - cursor.len() + item.payload_length;
        let (encoded, tail) = rest.split_at(len);
        items.push(encoded);
        rest = tail;
    }
    Ok(items)
}

fn decode_item<T: Decodable>(mut item: &[u8]) -> Result<T, CodecError> {
    Ok(T::decode(&mut item)?)
}

fn decode_to(item: &[u8]) -> Result<Option<Address>, CodecError> {
    let mut buf = item;
    let header = Header::decode(&mut buf)?;
    match header.payload_length {
        0 => Ok(None),
        20 => decode_item(item).map(Some),
        len => Err(CodecError::InvalidAddress { len }),
    }
}
