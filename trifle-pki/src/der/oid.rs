//! Object identifier arc encoding.

use crate::error::{Result, TrifleError};

/// Check the arc constraints X.660 places on an object identifier
pub fn validate_arcs(arcs: &[u64]) -> Result<()> {
    match arcs {
        [] => Err(TrifleError::InvalidInput(
            "object identifier has no components".to_string(),
        )),
        [_] => Err(TrifleError::InvalidInput(
            "object identifier needs at least two components".to_string(),
        )),
        [first, ..] if *first > 2 => Err(TrifleError::InvalidInput(format!(
            "first object identifier arc {first} is not in 0..=2"
        ))),
        [first, second, ..] if *first < 2 && *second > 39 => Err(TrifleError::InvalidInput(
            format!("second object identifier arc {second} is not in 0..=39"),
        )),
        _ => Ok(()),
    }
}

/// Encode arcs into object identifier content octets
pub fn encode_arcs(arcs: &[u64]) -> Result<Vec<u8>> {
    validate_arcs(arcs)?;

    let first = arcs[0]
        .checked_mul(40)
        .and_then(|v| v.checked_add(arcs[1]))
        .ok_or_else(|| TrifleError::InvalidInput("object identifier arc overflow".to_string()))?;

    let mut out = Vec::with_capacity(arcs.len() * 2);
    write_base128(first, &mut out);
    for arc in &arcs[2..] {
        write_base128(*arc, &mut out);
    }
    Ok(out)
}

/// Decode object identifier content octets back into arcs
pub fn decode_arcs(content: &[u8]) -> Result<Vec<u64>> {
    if content.is_empty() {
        return Err(TrifleError::InvalidInput(
            "empty object identifier content".to_string(),
        ));
    }

    let mut values = Vec::new();
    let mut current: u64 = 0;
    let mut in_arc = false;
    for &byte in content {
        if !in_arc && byte == 0x80 {
            return Err(TrifleError::InvalidInput(
                "object identifier arc has a leading 0x80 octet".to_string(),
            ));
        }
        if current > (u64::MAX >> 7) {
            return Err(TrifleError::Unhandled(
                "object identifier arc exceeds 64 bits".to_string(),
            ));
        }
        current = (current << 7) | (byte & 0x7F) as u64;
        in_arc = byte & 0x80 != 0;
        if !in_arc {
            values.push(current);
            current = 0;
        }
    }
    if in_arc {
        return Err(TrifleError::InvalidInput(
            "truncated object identifier arc".to_string(),
        ));
    }

    let first = values[0];
    let (arc0, arc1) = match first {
        0..=39 => (0, first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };
    let mut arcs = Vec::with_capacity(values.len() + 1);
    arcs.push(arc0);
    arcs.push(arc1);
    arcs.extend_from_slice(&values[1..]);
    Ok(arcs)
}

/// Dotted-decimal rendering, e.g. `1.2.840.10045.2.1`
pub fn to_dotted(arcs: &[u64]) -> String {
    arcs.iter()
        .map(|arc| arc.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

fn write_base128(mut value: u64, out: &mut Vec<u8>) {
    let mut chunk = [0u8; 10];
    let mut idx = chunk.len() - 1;
    chunk[idx] = (value & 0x7F) as u8;
    value >>= 7;
    while value > 0 {
        idx -= 1;
        chunk[idx] = 0x80 | (value & 0x7F) as u8;
        value >>= 7;
    }
    out.extend_from_slice(&chunk[idx..]);
}
