use anyhow::{Context, Result, bail};

pub(crate) const IINC: u8 = 0x84;
pub(crate) const TABLESWITCH: u8 = 0xaa;
pub(crate) const LOOKUPSWITCH: u8 = 0xab;
pub(crate) const INVOKEVIRTUAL: u8 = 0xb6;
pub(crate) const INVOKESPECIAL: u8 = 0xb7;
pub(crate) const INVOKESTATIC: u8 = 0xb8;
pub(crate) const INVOKEINTERFACE: u8 = 0xb9;
pub(crate) const INVOKEDYNAMIC: u8 = 0xba;
pub(crate) const WIDE: u8 = 0xc4;

/// Total length in bytes of the instruction at `offset`, operands included.
pub(crate) fn instruction_length(code: &[u8], offset: usize) -> Result<usize> {
    let opcode = *code
        .get(offset)
        .with_context(|| format!("bytecode offset {offset} out of range"))?;
    let length = match opcode {
        0x00..=0x0f => 1,                  // nop, const loads
        0x10 => 2,                         // bipush
        0x11 => 3,                         // sipush
        0x12 => 2,                         // ldc
        0x13 | 0x14 => 3,                  // ldc_w, ldc2_w
        0x15..=0x19 => 2,                  // iload..aload
        0x1a..=0x35 => 1,                  // iload_0..saload
        0x36..=0x3a => 2,                  // istore..astore
        0x3b..=0x83 => 1,                  // istore_0..lxor
        IINC => 3,
        0x85..=0x98 => 1,                  // conversions, comparisons
        0x99..=0xa8 => 3,                  // branches, goto, jsr
        0xa9 => 2,                         // ret
        TABLESWITCH => tableswitch_length(code, offset)?,
        LOOKUPSWITCH => lookupswitch_length(code, offset)?,
        0xac..=0xb1 => 1,                  // returns
        0xb2..=0xb5 => 3,                  // getstatic..putfield
        INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC => 3,
        INVOKEINTERFACE | INVOKEDYNAMIC => 5,
        0xbb => 3,                         // new
        0xbc => 2,                         // newarray
        0xbd => 3,                         // anewarray
        0xbe | 0xbf => 1,                  // arraylength, athrow
        0xc0 | 0xc1 => 3,                  // checkcast, instanceof
        0xc2 | 0xc3 => 1,                  // monitorenter, monitorexit
        WIDE => {
            let widened = *code
                .get(offset + 1)
                .with_context(|| format!("truncated wide instruction at {offset}"))?;
            if widened == IINC { 6 } else { 4 }
        }
        0xc5 => 4,                         // multianewarray
        0xc6 | 0xc7 => 3,                  // ifnull, ifnonnull
        0xc8 | 0xc9 => 5,                  // goto_w, jsr_w
        0xca => 1,                         // breakpoint
        _ => bail!("unknown opcode 0x{opcode:02x} at offset {offset}"),
    };
    Ok(length)
}

/// switch payloads start at the next 4-byte boundary after the opcode.
pub(crate) fn switch_padding(offset: usize) -> usize {
    (4 - (offset + 1) % 4) % 4
}

fn tableswitch_length(code: &[u8], offset: usize) -> Result<usize> {
    let base = offset + 1 + switch_padding(offset);
    let low = read_i32(code, base + 4)?;
    let high = read_i32(code, base + 8)?;
    let count = high
        .checked_sub(low)
        .and_then(|v| v.checked_add(1))
        .filter(|v| *v >= 0)
        .context("invalid tableswitch range")?;
    Ok(base - offset + 12 + count as usize * 4)
}

fn lookupswitch_length(code: &[u8], offset: usize) -> Result<usize> {
    let base = offset + 1 + switch_padding(offset);
    let npairs = read_i32(code, base + 4)?;
    if npairs < 0 {
        bail!("invalid lookupswitch pair count {npairs}");
    }
    Ok(base - offset + 8 + npairs as usize * 8)
}

pub(crate) fn read_u16(code: &[u8], offset: usize) -> Result<u16> {
    let bytes: [u8; 2] = code
        .get(offset..offset + 2)
        .with_context(|| format!("truncated read at offset {offset}"))?
        .try_into()
        .expect("slice length checked");
    Ok(u16::from_be_bytes(bytes))
}

fn read_u32(code: &[u8], offset: usize) -> Result<u32> {
    let bytes: [u8; 4] = code
        .get(offset..offset + 4)
        .with_context(|| format!("truncated read at offset {offset}"))?
        .try_into()
        .expect("slice length checked");
    Ok(u32::from_be_bytes(bytes))
}

fn read_i32(code: &[u8], offset: usize) -> Result<i32> {
    let value = read_u32(code, offset)?;
    Ok(i32::from_be_bytes(value.to_be_bytes()))
}
