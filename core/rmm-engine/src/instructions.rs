//! The `multiprocess` wire format (spec §4.6, §6): a single encoded
//! instruction, or a `JUMP` envelope batching several into one settlement
//! window. "This codec is a peripheral concern; the core only needs its
//! decoders to be bijective with the operation set" (spec §6) — so this
//! module keeps the format simple rather than byte-optimal.

use rmm_types::address::Address;
use rmm_types::error::{Error, Result};
use rmm_types::ids::{PairId, PoolId};

const OP_CREATE_PAIR: u8 = 0;
const OP_CREATE_POOL: u8 = 1;
const OP_ALLOCATE: u8 = 2;
const OP_DEALLOCATE: u8 = 3;
const OP_SWAP: u8 = 4;
const OP_CLAIM: u8 = 5;

/// A leading byte reserved for the batch envelope. No single-instruction
/// frame ever starts with this value: opcodes only occupy the low nibble
/// (0-5) of the first byte, and the `use_max` flag only ever sets one more
/// bit above that, so `0xF0` can never collide with `(use_max << 4) |
/// opcode`.
const JUMP_MARKER: u8 = 0xF0;

/// A decoded instruction, one-to-one with an `Engine` operation (spec
/// §4.6's `CREATE_PAIR | CREATE_POOL | ALLOCATE | DEALLOCATE | SWAP |
/// CLAIM`), minus the fields (`now`, `caller`) that only the dispatcher
/// knows at execution time.
pub enum Instruction {
    CreatePair {
        asset: Address,
        quote: Address,
        asset_decimals: u8,
        quote_decimals: u8,
    },
    CreatePool {
        pair_ref: PairId,
        controller: Option<Address>,
        priority_fee_bps: u16,
        fee_bps: u16,
        volatility_bps: u32,
        duration_seconds: u64,
        jit: u64,
        max_price: u128,
        price: u128,
    },
    Allocate {
        pool_id: PoolId,
        use_max: bool,
        delta_liquidity: u128,
    },
    Deallocate {
        pool_id: PoolId,
        use_max: bool,
        delta_liquidity: u128,
    },
    Swap {
        pool_id: PoolId,
        sell_asset: bool,
        use_max: bool,
        input_amount: u128,
        min_output: u128,
    },
    Claim {
        pool_id: PoolId,
        delta_asset_req: u128,
        delta_quote_req: u128,
    },
}

/// A cursor over a single frame's operand bytes.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(Error::InvalidInstruction)?;
        let slice = self.bytes.get(self.pos..end).ok_or(Error::InvalidInstruction)?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn u128(&mut self) -> Result<u128> {
        Ok(u128::from_be_bytes(self.take(16)?.try_into().unwrap()))
    }

    fn pool_id(&mut self) -> Result<PoolId> {
        Ok(PoolId(self.u64()?))
    }

    fn address(&mut self) -> Result<Address> {
        let bytes: [u8; 20] = self.take(20)?.try_into().unwrap();
        Ok(Address(bytes))
    }

    fn option_address(&mut self) -> Result<Option<Address>> {
        if self.bool()? {
            Ok(Some(self.address()?))
        } else {
            Ok(None)
        }
    }
}

fn decode_one(frame: &[u8]) -> Result<Instruction> {
    let mut cursor = Cursor::new(frame);
    let header = cursor.u8()?;
    let use_max = (header >> 4) & 0x1 == 1;
    let opcode = header & 0x0f;

    match opcode {
        OP_CREATE_PAIR => Ok(Instruction::CreatePair {
            asset: cursor.address()?,
            quote: cursor.address()?,
            asset_decimals: cursor.u8()?,
            quote_decimals: cursor.u8()?,
        }),
        OP_CREATE_POOL => Ok(Instruction::CreatePool {
            pair_ref: cursor.u32()?,
            controller: cursor.option_address()?,
            priority_fee_bps: cursor.u16()?,
            fee_bps: cursor.u16()?,
            volatility_bps: cursor.u32()?,
            duration_seconds: cursor.u64()?,
            jit: cursor.u64()?,
            max_price: cursor.u128()?,
            price: cursor.u128()?,
        }),
        OP_ALLOCATE => Ok(Instruction::Allocate {
            pool_id: cursor.pool_id()?,
            use_max,
            delta_liquidity: cursor.u128()?,
        }),
        OP_DEALLOCATE => Ok(Instruction::Deallocate {
            pool_id: cursor.pool_id()?,
            use_max,
            delta_liquidity: cursor.u128()?,
        }),
        OP_SWAP => Ok(Instruction::Swap {
            pool_id: cursor.pool_id()?,
            sell_asset: cursor.bool()?,
            use_max,
            input_amount: cursor.u128()?,
            min_output: cursor.u128()?,
        }),
        OP_CLAIM => Ok(Instruction::Claim {
            pool_id: cursor.pool_id()?,
            delta_asset_req: cursor.u128()?,
            delta_quote_req: cursor.u128()?,
        }),
        _ => Err(Error::InvalidInstruction),
    }
}

/// Decodes `payload` into the sequence of instructions it encodes: either
/// one instruction (the common case) or, when it opens with
/// [`JUMP_MARKER`], the batch it introduces. The envelope is `[JUMP_MARKER,
/// count, offset_0: u16, .., offset_{count-1}: u16, frame_0, frame_1,
/// ..]`, offsets relative to the first byte after the offset table.
pub fn decode_batch(payload: &[u8]) -> Result<Vec<Instruction>> {
    let &first = payload.first().ok_or(Error::InvalidInstruction)?;
    if first != JUMP_MARKER {
        return Ok(vec![decode_one(payload)?]);
    }

    let count = *payload.get(1).ok_or(Error::InvalidInstruction)? as usize;
    let table_start = 2;
    let table_end = table_start
        .checked_add(count.checked_mul(2).ok_or(Error::InvalidInstruction)?)
        .ok_or(Error::InvalidInstruction)?;
    if payload.len() < table_end {
        return Err(Error::InvalidInstruction);
    }

    let mut offsets = Vec::with_capacity(count);
    for i in 0..count {
        let lo = table_start + 2 * i;
        let offset = u16::from_be_bytes([payload[lo], payload[lo + 1]]) as usize;
        offsets.push(offset);
    }

    let mut instructions = Vec::with_capacity(count);
    for i in 0..count {
        let start = table_end.checked_add(offsets[i]).ok_or(Error::InvalidInstruction)?;
        let end = if i + 1 < count {
            table_end.checked_add(offsets[i + 1]).ok_or(Error::InvalidInstruction)?
        } else {
            payload.len()
        };
        if start > end || end > payload.len() {
            return Err(Error::InvalidInstruction);
        }
        instructions.push(decode_one(&payload[start..end])?);
    }
    Ok(instructions)
}
